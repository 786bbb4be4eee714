// /////////////////////////////////////////////////////////////////////////////
// Jira2Redmine Migration RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Transform Phase
//!
//! Per-entity reconcilers: each loops over its mapping rows in ascending
//! `mapping_id` order, skips manual overrides (stored automation hash that
//! no longer matches the recomputed one), derives a fresh proposal from
//! staging plus foreign lookups, classifies it, and writes the row back with
//! the new hash when anything changed.

pub mod attachments;
pub mod issues;
pub mod journals;
pub mod lookups;
pub mod projects;
pub mod users;
pub mod watchers;

use std::collections::HashMap;

use jira2redmine_domain::entities::{AttachmentMapping, StagedJiraAttachment};
use jira2redmine_domain::services::content::{AttachmentIndex, AttachmentTarget};
use jira2redmine_domain::value_objects::{unique_filename, MigrationStatus};

/// The rewrite target an attachment mapping row currently offers.
pub(crate) fn attachment_target(
    mapping: Option<&AttachmentMapping>,
    jira_attachment_id: &str,
    original_filename: &str,
) -> AttachmentTarget {
    let unique = unique_filename(jira_attachment_id, original_filename);
    match mapping {
        Some(row) => {
            if let Some(url) = &row.sharepoint_url {
                AttachmentTarget::SharePoint {
                    unique_filename: unique,
                    url: url.clone(),
                }
            } else if row.redmine_upload_token.is_some()
                || row.redmine_attachment_id.is_some()
                || matches!(
                    row.migration_status,
                    MigrationStatus::PendingAssociation | MigrationStatus::Success
                )
            {
                AttachmentTarget::Token { unique_filename: unique }
            } else {
                AttachmentTarget::NameOnly { unique_filename: unique }
            }
        }
        None => AttachmentTarget::NameOnly { unique_filename: unique },
    }
}

/// Builds the rewrite index for one issue's attachments.
pub(crate) fn build_attachment_index(
    staged: &[&StagedJiraAttachment],
    mappings: &HashMap<String, AttachmentMapping>,
) -> AttachmentIndex {
    let mut index = AttachmentIndex::new();
    for attachment in staged {
        let original = attachment.filename.as_deref().unwrap_or("attachment");
        let target = attachment_target(
            mappings.get(&attachment.jira_attachment_id),
            &attachment.jira_attachment_id,
            original,
        );
        index.insert(&attachment.jira_attachment_id, original, target);
    }
    index
}

/// Groups staged attachments by their owning issue.
pub(crate) fn group_attachments_by_issue(
    staged: Vec<StagedJiraAttachment>,
) -> HashMap<String, Vec<StagedJiraAttachment>> {
    let mut grouped: HashMap<String, Vec<StagedJiraAttachment>> = HashMap::new();
    for attachment in staged {
        grouped
            .entry(attachment.jira_issue_id.clone())
            .or_default()
            .push(attachment);
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn mapping(status: MigrationStatus) -> AttachmentMapping {
        AttachmentMapping {
            mapping_id: 1,
            jira_attachment_id: "900".into(),
            jira_issue_id: Some("10".into()),
            jira_filesize: Some(10),
            association_hint: None,
            migration_status: status,
            local_filepath: None,
            redmine_upload_token: None,
            redmine_attachment_id: None,
            redmine_issue_id: None,
            sharepoint_url: None,
            notes: None,
            download_enabled: true,
            upload_enabled: true,
        }
    }

    #[test]
    fn test_sharepoint_wins_over_token() {
        let mut row = mapping(MigrationStatus::PendingAssociation);
        row.sharepoint_url = Some("https://sp.example.com/f".into());
        row.redmine_upload_token = Some("1.abc".into());
        let target = attachment_target(Some(&row), "900", "f.zip");
        assert!(matches!(target, AttachmentTarget::SharePoint { .. }));
    }

    #[test]
    fn test_uploaded_attachment_yields_token() {
        let mut row = mapping(MigrationStatus::PendingAssociation);
        row.redmine_upload_token = Some("1.abc".into());
        let target = attachment_target(Some(&row), "900", "f.zip");
        assert_eq!(
            target,
            AttachmentTarget::Token {
                unique_filename: "900__f.zip".into()
            }
        );
    }

    #[test]
    fn test_pending_download_yields_name_only() {
        let row = mapping(MigrationStatus::PendingDownload);
        let target = attachment_target(Some(&row), "900", "f.zip");
        assert_eq!(
            target,
            AttachmentTarget::NameOnly {
                unique_filename: "900__f.zip".into()
            }
        );
    }

    #[test]
    fn test_unknown_mapping_yields_name_only() {
        let target = attachment_target(None, "901", "g.txt");
        assert_eq!(
            target,
            AttachmentTarget::NameOnly {
                unique_filename: "901__g.txt".into()
            }
        );
    }

    #[test]
    fn test_group_attachments_by_issue() {
        let att = |id: &str, issue: &str| StagedJiraAttachment {
            jira_attachment_id: id.into(),
            jira_issue_id: issue.into(),
            filename: None,
            filesize: None,
            mime_type: None,
            content_url: None,
            author_account_id: None,
            created: None,
            raw_payload: json!({}),
        };
        let grouped = group_attachments_by_issue(vec![att("1", "a"), att("2", "a"), att("3", "b")]);
        assert_eq!(grouped.get("a").unwrap().len(), 2);
        assert_eq!(grouped.get("b").unwrap().len(), 1);
    }
}
