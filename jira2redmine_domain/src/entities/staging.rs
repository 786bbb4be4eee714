// /////////////////////////////////////////////////////////////////////////////
// Jira2Redmine Migration RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Staging Entities
//!
//! Typed rows of the staging tables. Source JSON is deeply optional, so every
//! field that is not a primary key is nullable; the complete original payload
//! is preserved verbatim in `raw_payload` for future compatibility.
//!
//! Timestamps coming from Jira keep their original string form here (e.g.
//! `2024-05-01T10:22:33.000+0200`); parsing happens on demand via
//! [`crate::services::datetime`]. Booleans are canonicalized at ingestion:
//! readers must never see `"0"`/`"1"` strings where a bool is meant.

use serde_json::Value;

/// One row of `staging_jira_projects`.
#[derive(Debug, Clone, PartialEq)]
pub struct StagedJiraProject {
    pub jira_project_id: String,
    pub project_key: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub lead_account_id: Option<String>,
    pub is_private: Option<bool>,
    pub raw_payload: Value,
}

/// One row of `staging_jira_users`.
#[derive(Debug, Clone, PartialEq)]
pub struct StagedJiraUser {
    pub jira_account_id: String,
    pub email_address: Option<String>,
    pub display_name: Option<String>,
    pub active: Option<bool>,
    pub account_type: Option<String>,
    pub raw_payload: Value,
}

/// One row of `staging_jira_issues`.
#[derive(Debug, Clone, PartialEq)]
pub struct StagedJiraIssue {
    pub jira_issue_id: String,
    pub jira_issue_key: Option<String>,
    pub jira_project_id: Option<String>,
    pub jira_issue_type_id: Option<String>,
    pub jira_status_id: Option<String>,
    pub jira_status_category: Option<String>,
    pub jira_priority_id: Option<String>,
    pub jira_reporter_account_id: Option<String>,
    pub jira_assignee_account_id: Option<String>,
    pub jira_parent_issue_id: Option<String>,
    pub jira_security_level_id: Option<String>,
    pub summary: Option<String>,
    pub created: Option<String>,
    pub updated: Option<String>,
    pub due_date: Option<String>,
    /// Seconds, as reported by `timeoriginalestimate`.
    pub time_original_estimate: Option<i64>,
    pub raw_payload: Value,
}

/// One row of `staging_jira_comments`.
#[derive(Debug, Clone, PartialEq)]
pub struct StagedJiraComment {
    pub jira_comment_id: String,
    pub jira_issue_id: String,
    pub author_account_id: Option<String>,
    pub created: Option<String>,
    pub updated: Option<String>,
    /// HTML body from `expand=renderedBody`, when Jira produced one.
    pub rendered_body: Option<String>,
    pub raw_payload: Value,
}

/// One row of `staging_jira_changelog`.
#[derive(Debug, Clone, PartialEq)]
pub struct StagedJiraChangelogEntry {
    pub jira_changelog_id: String,
    pub jira_issue_id: String,
    pub author_account_id: Option<String>,
    pub created: Option<String>,
    pub raw_payload: Value,
}

impl StagedJiraChangelogEntry {
    /// Items of this changelog entry as `(field, from_string, to_string)`.
    pub fn items(&self) -> Vec<(String, Option<String>, Option<String>)> {
        self.raw_payload
            .get("items")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .map(|item| {
                        let field = item
                            .get("field")
                            .and_then(Value::as_str)
                            .unwrap_or("unknown")
                            .to_string();
                        let from = item.get("fromString").and_then(Value::as_str).map(String::from);
                        let to = item.get("toString").and_then(Value::as_str).map(String::from);
                        (field, from, to)
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// True when every item of the entry is an attachment announcement.
    pub fn is_attachment_only(&self) -> bool {
        let items = self.items();
        !items.is_empty() && items.iter().all(|(field, _, _)| field.eq_ignore_ascii_case("attachment"))
    }
}

/// One row of `staging_jira_attachments`.
#[derive(Debug, Clone, PartialEq)]
pub struct StagedJiraAttachment {
    pub jira_attachment_id: String,
    pub jira_issue_id: String,
    pub filename: Option<String>,
    pub filesize: Option<i64>,
    pub mime_type: Option<String>,
    pub content_url: Option<String>,
    pub author_account_id: Option<String>,
    pub created: Option<String>,
    pub raw_payload: Value,
}

/// One row of `staging_jira_watchers`.
#[derive(Debug, Clone, PartialEq)]
pub struct StagedJiraWatcher {
    pub jira_issue_id: String,
    pub jira_account_id: String,
    pub raw_payload: Value,
}

/// Outcome kinds tracked per issue detail fetch.
pub mod detail_kind {
    pub const COMMENTS: &str = "comments";
    pub const CHANGELOG: &str = "changelog";
    pub const WATCHERS: &str = "watchers";
}

/// One row of `staging_jira_issue_state`: the recorded outcome of a detail
/// fetch. `FAILED` rows are retried on the next run, `WARNING` rows are not.
#[derive(Debug, Clone, PartialEq)]
pub struct IssueDetailState {
    pub jira_issue_id: String,
    pub detail_kind: String,
    pub status: String,
    pub note: Option<String>,
}

impl IssueDetailState {
    pub const SUCCESS: &'static str = "SUCCESS";
    pub const WARNING: &'static str = "WARNING";
    pub const FAILED: &'static str = "FAILED";

    /// A detail fetch is retried only when the previous attempt failed with
    /// a transport-class error.
    pub fn is_retryable(&self) -> bool {
        self.status == Self::FAILED
    }
}

/// One row of `staging_redmine_projects` (truncate-and-reload snapshot).
#[derive(Debug, Clone, PartialEq)]
pub struct RedmineProjectSnapshot {
    pub redmine_project_id: i64,
    pub identifier: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_public: Option<bool>,
    pub raw_payload: Value,
}

/// One row of `staging_redmine_users` (truncate-and-reload snapshot).
#[derive(Debug, Clone, PartialEq)]
pub struct RedmineUserSnapshot {
    pub redmine_user_id: i64,
    pub login: Option<String>,
    pub mail: Option<String>,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub status: Option<i64>,
    pub raw_payload: Value,
}
