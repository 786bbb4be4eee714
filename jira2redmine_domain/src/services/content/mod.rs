// /////////////////////////////////////////////////////////////////////////////
// Jira2Redmine Migration RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Content Rewriter
//!
//! Converts Jira rich-text bodies (ADF JSON and/or rendered HTML) into
//! Redmine-ready Markdown and rewrites Jira-specific references. The whole
//! module is pure: the same inputs always produce byte-identical output,
//! which the automation-hash protocol depends on.
//!
//! ## Conversion preference
//!
//! 1. Rendered HTML, when present and free of macro placeholders (Jira
//!    renders unsupported content as HTML comments), via `html2md`.
//! 2. Otherwise the ADF tree, via the work-stack converter in [`adf`].
//! 3. If ADF conversion fails, a plain-text flattening that preserves
//!    paragraph breaks, hard breaks and list item boundaries.
//!
//! ## Reference rewriting
//!
//! Applied in a fixed order on the converted Markdown (see [`rewrite`]):
//! attachment references, user profile links, issue keys, avatar removal,
//! and whitespace normalization around `#123` / `user#123` cross-references.

pub mod adf;
pub mod rewrite;

use std::collections::HashMap;

use serde_json::Value;

/// Where an attachment reference should point after rewriting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentTarget {
    /// Offloaded to SharePoint: rewrite to an external link.
    SharePoint { unique_filename: String, url: String },
    /// Uploaded to Redmine: rewrite to the `attachment:` token Redmine
    /// resolves once the upload is associated.
    Token { unique_filename: String },
    /// Not uploaded anywhere (yet): leave the unique filename as text.
    NameOnly { unique_filename: String },
}

impl AttachmentTarget {
    pub fn unique_filename(&self) -> &str {
        match self {
            AttachmentTarget::SharePoint { unique_filename, .. }
            | AttachmentTarget::Token { unique_filename }
            | AttachmentTarget::NameOnly { unique_filename } => unique_filename,
        }
    }

    /// The Markdown replacement for a reference to this attachment.
    pub fn render(&self) -> String {
        match self {
            AttachmentTarget::SharePoint { unique_filename, url } => {
                format!("[{}]({})", unique_filename, url)
            }
            AttachmentTarget::Token { unique_filename } => format!("attachment:{}", unique_filename),
            AttachmentTarget::NameOnly { unique_filename } => unique_filename.clone(),
        }
    }
}

/// Lookup from Jira attachment ids and filenames to rewrite targets.
#[derive(Debug, Clone, Default)]
pub struct AttachmentIndex {
    by_id: HashMap<String, AttachmentTarget>,
    by_name: HashMap<String, AttachmentTarget>,
}

impl AttachmentIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an attachment under its Jira id, its original filename and
    /// its unique filename.
    pub fn insert(&mut self, jira_attachment_id: &str, original_filename: &str, target: AttachmentTarget) {
        self.by_name
            .insert(target.unique_filename().to_string(), target.clone());
        if !original_filename.is_empty() {
            self.by_name.insert(original_filename.to_string(), target.clone());
        }
        self.by_id.insert(jira_attachment_id.to_string(), target);
    }

    pub fn resolve_id(&self, jira_attachment_id: &str) -> Option<&AttachmentTarget> {
        self.by_id.get(jira_attachment_id)
    }

    pub fn resolve_name(&self, filename: &str) -> Option<&AttachmentTarget> {
        self.by_name.get(filename)
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty() && self.by_name.is_empty()
    }
}

/// Shared input for one rewrite call.
#[derive(Debug, Clone, Default)]
pub struct RewriteContext {
    /// Jira attachment id / filename → rewrite target.
    pub attachments: AttachmentIndex,
    /// Jira account id → Redmine user id (ready mappings only).
    pub users: HashMap<String, i64>,
    /// Jira issue key → Redmine issue id (already mapped issues only).
    pub issues: HashMap<String, i64>,
}

/// Converts a Jira body to Redmine Markdown and applies the rewrite rules.
pub fn rewrite_body(adf: Option<&Value>, html: Option<&str>, ctx: &RewriteContext) -> String {
    let base = match html {
        Some(h) if html_is_usable(h) => html2md::parse_html(h),
        _ => match adf {
            Some(doc) => adf::adf_to_markdown(doc, ctx).unwrap_or_else(|_| adf::adf_to_plain_text(doc)),
            // Last resort: a macro-laden HTML body still beats nothing.
            None => html.map(html2md::parse_html).unwrap_or_default(),
        },
    };
    rewrite::apply_reference_rules(&base, ctx)
}

/// The bullet block that replaces the body of an attachment-only changelog
/// journal. SharePoint offloads become external links, Redmine uploads
/// become `attachment:` tokens.
pub fn attachment_block(targets: &[AttachmentTarget]) -> String {
    targets
        .iter()
        .map(|target| match target {
            AttachmentTarget::SharePoint { unique_filename, url } => {
                format!("> SharePoint attachment: [{}]({})", unique_filename, url)
            }
            AttachmentTarget::Token { unique_filename } => format!("attachment:{}", unique_filename),
            AttachmentTarget::NameOnly { unique_filename } => unique_filename.clone(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// HTML is usable unless Jira rendered macro placeholders into it; those
/// arrive as HTML comments and would be silently dropped by conversion.
fn html_is_usable(html: &str) -> bool {
    !html.trim().is_empty() && !html.contains("<!--")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx_with_issue() -> RewriteContext {
        let mut ctx = RewriteContext::default();
        ctx.issues.insert("PROJ-1".to_string(), 123);
        ctx
    }

    #[test]
    fn test_html_preferred_over_adf() {
        let adf = json!({"type": "doc", "content": [
            {"type": "paragraph", "content": [{"type": "text", "text": "from adf"}]}
        ]});
        let out = rewrite_body(Some(&adf), Some("<p>from html</p>"), &RewriteContext::default());
        assert!(out.contains("from html"));
        assert!(!out.contains("from adf"));
    }

    #[test]
    fn test_macro_placeholder_html_falls_back_to_adf() {
        let adf = json!({"type": "doc", "content": [
            {"type": "paragraph", "content": [{"type": "text", "text": "from adf"}]}
        ]});
        let html = "<p>before</p><!-- macro 'table' --><p>after</p>";
        let out = rewrite_body(Some(&adf), Some(html), &RewriteContext::default());
        assert!(out.contains("from adf"));
    }

    #[test]
    fn test_deterministic_output() {
        let adf = json!({"type": "doc", "content": [
            {"type": "paragraph", "content": [
                {"type": "text", "text": "see PROJ-1 and "},
                {"type": "text", "text": "more", "marks": [{"type": "strong"}]}
            ]}
        ]});
        let ctx = ctx_with_issue();
        let first = rewrite_body(Some(&adf), None, &ctx);
        let second = rewrite_body(Some(&adf), None, &ctx);
        assert_eq!(first, second);
        assert!(first.contains("#123"));
    }

    #[test]
    fn test_plain_text_without_tokens_is_unchanged() {
        let out = rewrite_body(None, Some("<p>nothing special here</p>"), &RewriteContext::default());
        assert_eq!(out.trim(), "nothing special here");
    }

    #[test]
    fn test_attachment_block_rendering() {
        let block = attachment_block(&[
            AttachmentTarget::SharePoint {
                unique_filename: "9__big.zip".into(),
                url: "https://sp.example.com/big.zip".into(),
            },
            AttachmentTarget::Token {
                unique_filename: "10__small.txt".into(),
            },
        ]);
        assert_eq!(
            block,
            "> SharePoint attachment: [9__big.zip](https://sp.example.com/big.zip)\nattachment:10__small.txt"
        );
    }

    #[test]
    fn test_attachment_index_resolves_by_id_and_name() {
        let mut index = AttachmentIndex::new();
        index.insert(
            "42",
            "photo.png",
            AttachmentTarget::Token {
                unique_filename: "42__photo.png".into(),
            },
        );
        assert!(index.resolve_id("42").is_some());
        assert!(index.resolve_name("photo.png").is_some());
        assert!(index.resolve_name("42__photo.png").is_some());
        assert!(index.resolve_id("43").is_none());
    }
}
