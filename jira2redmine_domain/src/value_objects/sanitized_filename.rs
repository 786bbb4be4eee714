// /////////////////////////////////////////////////////////////////////////////
// Jira2Redmine Migration RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Sanitized Attachment Filename
//!
//! Attachment blobs are written to the working directory and later uploaded
//! to Redmine or SharePoint, so every filename must be acceptable to all
//! three. The policy is fixed:
//!
//! - path separators, control characters and the SharePoint-hostile set
//!   `" * : < > ? / \ | #` collapse to `_`
//! - whitespace runs become a single space, trimmed at the ends
//! - empty results fall back to `attachment`
//! - the unique on-disk / upload name is `{jira_attachment_id}__{sanitized}`,
//!   which guarantees global uniqueness across issues

use once_cell::sync::Lazy;
use regex::Regex;

static FORBIDDEN: Lazy<Regex> = Lazy::new(|| Regex::new(r#"[\x00-\x1f"*:<>?/\\|#]+"#).unwrap());
static WHITESPACE_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Sanitizes a raw attachment filename.
pub fn sanitize_filename(raw: &str) -> String {
    let replaced = FORBIDDEN.replace_all(raw, "_");
    let normalized = WHITESPACE_RUNS.replace_all(&replaced, " ");
    let trimmed = normalized.trim().trim_matches('.');
    if trimmed.is_empty() || trimmed.chars().all(|c| c == '_') {
        "attachment".to_string()
    } else {
        trimmed.to_string()
    }
}

/// The globally unique name used on disk and as the Redmine/SharePoint
/// upload filename.
pub fn unique_filename(jira_attachment_id: &str, raw_filename: &str) -> String {
    format!("{}__{}", jira_attachment_id, sanitize_filename(raw_filename))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_names_pass_through() {
        assert_eq!(sanitize_filename("report.pdf"), "report.pdf");
    }

    #[test]
    fn test_forbidden_characters_become_underscores() {
        assert_eq!(sanitize_filename("a/b\\c:d*e?.txt"), "a_b_c_d_e_.txt");
        assert_eq!(sanitize_filename("quo\"te|pipe#hash.png"), "quo_te_pipe_hash.png");
    }

    #[test]
    fn test_whitespace_collapses() {
        assert_eq!(sanitize_filename("  screen   shot .png "), "screen shot .png");
    }

    #[test]
    fn test_empty_input_falls_back() {
        assert_eq!(sanitize_filename(""), "attachment");
        assert_eq!(sanitize_filename("///"), "attachment");
    }

    #[test]
    fn test_unique_filename_prefixes_attachment_id() {
        assert_eq!(unique_filename("12345", "notes.txt"), "12345__notes.txt");
    }
}
