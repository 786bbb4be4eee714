// /////////////////////////////////////////////////////////////////////////////
// Jira2Redmine Migration RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Project Identifier Value Object
//!
//! Redmine project identifiers are restricted to `[a-z0-9_-]` and at most
//! 100 characters. This value object derives a valid identifier from a Jira
//! project key with a fixed, idempotent policy:
//!
//! 1. lowercase the key
//! 2. collapse every character outside `[a-z0-9_-]` to `-`
//! 3. collapse runs of separators
//! 4. trim leading/trailing `-` and `_`
//! 5. truncate to 100 characters
//!
//! Idempotence (`derive(derive(x)) == derive(x)`) matters because matching
//! against the Redmine snapshot re-derives identifiers on every transform
//! run.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::MigrationError;

/// Maximum identifier length accepted by Redmine.
pub const MAX_IDENTIFIER_LENGTH: usize = 100;

static INVALID_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9_-]+").unwrap());
static DASH_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[-_]*-[-_]*").unwrap());
static UNDERSCORE_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"_{2,}").unwrap());

/// A valid Redmine project identifier derived from a Jira project key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectIdentifier(String);

impl ProjectIdentifier {
    /// Derives an identifier from a Jira project key.
    ///
    /// Returns a validation error when the key is empty or nothing survives
    /// sanitization; those rows go to manual intervention.
    pub fn derive(jira_key: &str) -> Result<Self, MigrationError> {
        if jira_key.trim().is_empty() {
            return Err(MigrationError::validation(
                "cannot derive a Redmine identifier from an empty Jira project key",
            ));
        }

        let lowered = jira_key.trim().to_lowercase();
        let replaced = INVALID_CHARS.replace_all(&lowered, "-");
        let collapsed = DASH_RUNS.replace_all(&replaced, "-");
        let collapsed = UNDERSCORE_RUNS.replace_all(&collapsed, "_");
        let trimmed = collapsed.trim_matches(|c| c == '-' || c == '_');

        if trimmed.is_empty() {
            return Err(MigrationError::validation(format!(
                "Jira project key '{}' sanitizes to an empty Redmine identifier",
                jira_key
            )));
        }

        let truncated: String = trimmed.chars().take(MAX_IDENTIFIER_LENGTH).collect();
        // Truncation can expose a trailing separator again.
        let final_id = truncated.trim_end_matches(|c| c == '-' || c == '_').to_string();
        if final_id.is_empty() {
            return Err(MigrationError::validation(format!(
                "Jira project key '{}' sanitizes to an empty Redmine identifier",
                jira_key
            )));
        }

        Ok(ProjectIdentifier(final_id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ProjectIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
