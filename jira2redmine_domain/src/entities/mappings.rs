// /////////////////////////////////////////////////////////////////////////////
// Jira2Redmine Migration RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Mapping Entities
//!
//! Typed rows of the `migration_mapping_*` tables plus the per-entity
//! `*AutomatedFields` structs that define the automation-hash input.
//!
//! ## Hash layout is frozen
//!
//! The serde field order of every `*AutomatedFields` struct is the canonical
//! hash input layout and MUST NOT change: the stored hash of every already
//! reconciled row depends on it. If a field ever has to be added or removed,
//! `HashGuard::compute` must start emitting a `v2:`-prefixed digest instead
//! of silently invalidating every stored hash.

use serde::Serialize;

use crate::value_objects::{AssociationHint, MatchType, MigrationStatus};

// ---------------------------------------------------------------------------
// Projects
// ---------------------------------------------------------------------------

/// One row of `migration_mapping_projects`.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectMapping {
    pub mapping_id: i64,
    pub jira_project_id: String,
    pub redmine_project_id: Option<i64>,
    pub migration_status: MigrationStatus,
    pub notes: Option<String>,
    pub proposed_identifier: Option<String>,
    pub proposed_name: Option<String>,
    pub proposed_description: Option<String>,
    pub proposed_is_public: Option<bool>,
    pub automation_hash: Option<String>,
    pub issues_extracted_at: Option<String>,
}

/// Automated outputs of the project reconciler. Field order is frozen.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectAutomatedFields {
    pub redmine_project_id: Option<i64>,
    pub migration_status: MigrationStatus,
    pub notes: Option<String>,
    pub proposed_identifier: Option<String>,
    pub proposed_name: Option<String>,
    pub proposed_description: Option<String>,
    pub proposed_is_public: Option<bool>,
}

impl ProjectMapping {
    /// The current row state projected onto the hash input layout.
    pub fn automated_fields(&self) -> ProjectAutomatedFields {
        ProjectAutomatedFields {
            redmine_project_id: self.redmine_project_id,
            migration_status: self.migration_status,
            notes: self.notes.clone(),
            proposed_identifier: self.proposed_identifier.clone(),
            proposed_name: self.proposed_name.clone(),
            proposed_description: self.proposed_description.clone(),
            proposed_is_public: self.proposed_is_public,
        }
    }
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

/// One row of `migration_mapping_users`.
#[derive(Debug, Clone, PartialEq)]
pub struct UserMapping {
    pub mapping_id: i64,
    pub jira_account_id: String,
    pub redmine_user_id: Option<i64>,
    pub migration_status: MigrationStatus,
    pub match_type: Option<MatchType>,
    pub notes: Option<String>,
    pub proposed_redmine_login: Option<String>,
    pub proposed_redmine_mail: Option<String>,
    pub proposed_firstname: Option<String>,
    pub proposed_lastname: Option<String>,
    pub proposed_redmine_status: Option<String>,
    pub automation_hash: Option<String>,
    pub jira_display_name: Option<String>,
    pub jira_email_address: Option<String>,
}

/// Automated outputs of the user reconciler. Field order is frozen.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserAutomatedFields {
    pub redmine_user_id: Option<i64>,
    pub migration_status: MigrationStatus,
    pub notes: Option<String>,
    pub proposed_redmine_login: Option<String>,
    pub proposed_redmine_mail: Option<String>,
    pub proposed_firstname: Option<String>,
    pub proposed_lastname: Option<String>,
    pub proposed_redmine_status: Option<String>,
}

impl UserMapping {
    pub fn automated_fields(&self) -> UserAutomatedFields {
        UserAutomatedFields {
            redmine_user_id: self.redmine_user_id,
            migration_status: self.migration_status,
            notes: self.notes.clone(),
            proposed_redmine_login: self.proposed_redmine_login.clone(),
            proposed_redmine_mail: self.proposed_redmine_mail.clone(),
            proposed_firstname: self.proposed_firstname.clone(),
            proposed_lastname: self.proposed_lastname.clone(),
            proposed_redmine_status: self.proposed_redmine_status.clone(),
        }
    }
}

/// A user proposal: the hashed fields plus match provenance, which is
/// recorded on the row but excluded from the hash layout.
#[derive(Debug, Clone, PartialEq)]
pub struct UserProposal {
    pub fields: UserAutomatedFields,
    pub match_type: Option<MatchType>,
}

// ---------------------------------------------------------------------------
// Issues
// ---------------------------------------------------------------------------

/// One row of `migration_mapping_issues`.
#[derive(Debug, Clone, PartialEq)]
pub struct IssueMapping {
    pub mapping_id: i64,
    pub jira_issue_id: String,
    pub jira_issue_key: Option<String>,
    pub jira_project_id: Option<String>,
    pub jira_issue_type_id: Option<String>,
    pub jira_status_id: Option<String>,
    pub jira_priority_id: Option<String>,
    pub jira_reporter_account_id: Option<String>,
    pub jira_assignee_account_id: Option<String>,
    pub jira_parent_issue_id: Option<String>,
    pub redmine_issue_id: Option<i64>,
    pub redmine_project_id: Option<i64>,
    pub redmine_tracker_id: Option<i64>,
    pub redmine_status_id: Option<i64>,
    pub redmine_priority_id: Option<i64>,
    pub redmine_author_id: Option<i64>,
    pub redmine_assigned_to_id: Option<i64>,
    pub redmine_parent_issue_id: Option<i64>,
    pub proposed_subject: Option<String>,
    pub proposed_description: Option<String>,
    pub proposed_start_date: Option<String>,
    pub proposed_due_date: Option<String>,
    pub proposed_done_ratio: Option<i64>,
    pub proposed_estimated_hours: Option<f64>,
    pub proposed_is_private: Option<bool>,
    pub migration_status: MigrationStatus,
    pub notes: Option<String>,
    pub automation_hash: Option<String>,
}

/// Automated outputs of the issue reconciler. Field order is frozen.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IssueAutomatedFields {
    pub redmine_issue_id: Option<i64>,
    pub redmine_project_id: Option<i64>,
    pub redmine_tracker_id: Option<i64>,
    pub redmine_status_id: Option<i64>,
    pub redmine_priority_id: Option<i64>,
    pub redmine_author_id: Option<i64>,
    pub redmine_assigned_to_id: Option<i64>,
    pub redmine_parent_issue_id: Option<i64>,
    pub proposed_subject: Option<String>,
    pub proposed_description: Option<String>,
    pub proposed_start_date: Option<String>,
    pub proposed_due_date: Option<String>,
    pub proposed_done_ratio: Option<i64>,
    pub proposed_estimated_hours: Option<f64>,
    pub proposed_is_private: Option<bool>,
    pub migration_status: MigrationStatus,
    pub notes: Option<String>,
}

impl IssueMapping {
    pub fn automated_fields(&self) -> IssueAutomatedFields {
        IssueAutomatedFields {
            redmine_issue_id: self.redmine_issue_id,
            redmine_project_id: self.redmine_project_id,
            redmine_tracker_id: self.redmine_tracker_id,
            redmine_status_id: self.redmine_status_id,
            redmine_priority_id: self.redmine_priority_id,
            redmine_author_id: self.redmine_author_id,
            redmine_assigned_to_id: self.redmine_assigned_to_id,
            redmine_parent_issue_id: self.redmine_parent_issue_id,
            proposed_subject: self.proposed_subject.clone(),
            proposed_description: self.proposed_description.clone(),
            proposed_start_date: self.proposed_start_date.clone(),
            proposed_due_date: self.proposed_due_date.clone(),
            proposed_done_ratio: self.proposed_done_ratio,
            proposed_estimated_hours: self.proposed_estimated_hours,
            proposed_is_private: self.proposed_is_private,
            migration_status: self.migration_status,
            notes: self.notes.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Attachments
// ---------------------------------------------------------------------------

/// One row of `migration_mapping_attachments`. Attachments carry no
/// automation hash; their state machine is driven entirely by the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct AttachmentMapping {
    pub mapping_id: i64,
    pub jira_attachment_id: String,
    pub jira_issue_id: Option<String>,
    pub jira_filesize: Option<i64>,
    pub association_hint: Option<AssociationHint>,
    pub migration_status: MigrationStatus,
    pub local_filepath: Option<String>,
    pub redmine_upload_token: Option<String>,
    pub redmine_attachment_id: Option<i64>,
    pub redmine_issue_id: Option<i64>,
    pub sharepoint_url: Option<String>,
    pub notes: Option<String>,
    pub download_enabled: bool,
    pub upload_enabled: bool,
}

// ---------------------------------------------------------------------------
// Journals
// ---------------------------------------------------------------------------

/// Journal source kind: a Jira comment or a changelog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JournalEntityType {
    Comment,
    Changelog,
}

impl JournalEntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JournalEntityType::Comment => "COMMENT",
            JournalEntityType::Changelog => "CHANGELOG",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "COMMENT" => Some(JournalEntityType::Comment),
            "CHANGELOG" => Some(JournalEntityType::Changelog),
            _ => None,
        }
    }
}

/// One row of `migration_mapping_journals`.
#[derive(Debug, Clone, PartialEq)]
pub struct JournalMapping {
    pub mapping_id: i64,
    pub jira_entity_id: String,
    pub jira_issue_id: String,
    pub entity_type: JournalEntityType,
    pub migration_status: MigrationStatus,
    pub notes: Option<String>,
    pub proposed_notes: Option<String>,
    pub proposed_author_id: Option<i64>,
    pub proposed_created_on: Option<String>,
    pub proposed_updated_on: Option<String>,
    pub redmine_journal_id: Option<i64>,
    pub automation_hash: Option<String>,
}

/// Automated outputs of the journal reconciler. Field order is frozen.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JournalAutomatedFields {
    pub migration_status: MigrationStatus,
    pub notes: Option<String>,
    pub proposed_notes: Option<String>,
    pub proposed_author_id: Option<i64>,
    pub proposed_created_on: Option<String>,
    pub proposed_updated_on: Option<String>,
    pub redmine_journal_id: Option<i64>,
}

impl JournalMapping {
    pub fn automated_fields(&self) -> JournalAutomatedFields {
        JournalAutomatedFields {
            migration_status: self.migration_status,
            notes: self.notes.clone(),
            proposed_notes: self.proposed_notes.clone(),
            proposed_author_id: self.proposed_author_id,
            proposed_created_on: self.proposed_created_on.clone(),
            proposed_updated_on: self.proposed_updated_on.clone(),
            redmine_journal_id: self.redmine_journal_id,
        }
    }
}

// ---------------------------------------------------------------------------
// Watchers
// ---------------------------------------------------------------------------

/// One row of `migration_mapping_watchers`. Watchers are a pure join over
/// issue and user mappings and carry no automation hash.
#[derive(Debug, Clone, PartialEq)]
pub struct WatcherMapping {
    pub mapping_id: i64,
    pub jira_issue_id: String,
    pub jira_issue_key: Option<String>,
    pub jira_account_id: String,
    pub redmine_issue_id: Option<i64>,
    pub redmine_user_id: Option<i64>,
    pub migration_status: MigrationStatus,
    pub notes: Option<String>,
}

// ---------------------------------------------------------------------------
// Operator lookups
// ---------------------------------------------------------------------------

/// One row of an operator-maintained lookup table
/// (`migration_mapping_trackers` / `_statuses` / `_priorities`).
#[derive(Debug, Clone, PartialEq)]
pub struct LookupMapping {
    pub jira_id: String,
    pub redmine_id: Option<i64>,
    pub migration_status: MigrationStatus,
}

impl LookupMapping {
    /// The resolvable Redmine id, if the operator marked the row ready.
    pub fn resolved_id(&self) -> Option<i64> {
        if self.migration_status.is_ready_reference() {
            self.redmine_id
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_hash_layout_is_stable() {
        let fields = ProjectAutomatedFields {
            redmine_project_id: Some(7),
            migration_status: MigrationStatus::MatchFound,
            notes: None,
            proposed_identifier: Some("proj".into()),
            proposed_name: Some("Project".into()),
            proposed_description: None,
            proposed_is_public: Some(true),
        };
        let json = serde_json::to_string(&fields).unwrap();
        assert_eq!(
            json,
            "{\"redmine_project_id\":7,\"migration_status\":\"MATCH_FOUND\",\
             \"notes\":null,\"proposed_identifier\":\"proj\",\"proposed_name\":\"Project\",\
             \"proposed_description\":null,\"proposed_is_public\":true}"
        );
    }

    #[test]
    fn test_issue_hash_layout_starts_with_redmine_ids() {
        let fields = IssueAutomatedFields {
            redmine_issue_id: None,
            redmine_project_id: Some(1),
            redmine_tracker_id: Some(2),
            redmine_status_id: Some(3),
            redmine_priority_id: Some(4),
            redmine_author_id: Some(5),
            redmine_assigned_to_id: None,
            redmine_parent_issue_id: None,
            proposed_subject: Some("Subject".into()),
            proposed_description: None,
            proposed_start_date: Some("2024-05-01".into()),
            proposed_due_date: None,
            proposed_done_ratio: Some(100),
            proposed_estimated_hours: Some(2.0),
            proposed_is_private: Some(false),
            migration_status: MigrationStatus::ReadyForCreation,
            notes: None,
        };
        let json = serde_json::to_string(&fields).unwrap();
        assert!(json.starts_with("{\"redmine_issue_id\":null,\"redmine_project_id\":1,"));
        assert!(json.ends_with("\"migration_status\":\"READY_FOR_CREATION\",\"notes\":null}"));
    }

    #[test]
    fn test_lookup_resolves_only_when_ready() {
        let ready = LookupMapping {
            jira_id: "10002".into(),
            redmine_id: Some(2),
            migration_status: MigrationStatus::MatchFound,
        };
        let pending = LookupMapping {
            jira_id: "10003".into(),
            redmine_id: Some(3),
            migration_status: MigrationStatus::PendingAnalysis,
        };
        assert_eq!(ready.resolved_id(), Some(2));
        assert_eq!(pending.resolved_id(), None);
    }

    #[test]
    fn test_journal_entity_type_round_trip() {
        assert_eq!(JournalEntityType::parse("COMMENT"), Some(JournalEntityType::Comment));
        assert_eq!(JournalEntityType::parse("CHANGELOG"), Some(JournalEntityType::Changelog));
        assert_eq!(JournalEntityType::Comment.as_str(), "COMMENT");
        assert_eq!(JournalEntityType::parse("OTHER"), None);
    }
}
