// /////////////////////////////////////////////////////////////////////////////
// Jira2Redmine Migration RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Journal Reconciler
//!
//! Builds Redmine journal proposals from Jira comments and changelog
//! entries. A row is `READY_FOR_PUSH` once its owning issue has a Redmine
//! id, `PENDING` until then.
//!
//! Comment bodies go through the content rewriter (rendered HTML preferred,
//! ADF fallback). Changelog entries become bullet lines; an entry that only
//! announces attachments is replaced by the attachment block, or skipped
//! with a warning when none of its attachments are mapped.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use jira2redmine_domain::entities::{
    JournalAutomatedFields, JournalEntityType, JournalMapping, StagedJiraChangelogEntry,
    StagedJiraComment,
};
use jira2redmine_domain::services::content::{attachment_block, rewrite_body, AttachmentIndex, RewriteContext};
use jira2redmine_domain::services::{datetime, hash_guard};
use jira2redmine_domain::value_objects::MigrationStatus;
use jira2redmine_domain::MigrationError;

use crate::application::summary::PhaseSummary;
use crate::application::transform::lookups::DependencyLookups;
use crate::application::transform::{build_attachment_index, group_attachments_by_issue};
use crate::infrastructure::repositories::Store;

const TRANSFORMABLE: [MigrationStatus; 3] = [
    MigrationStatus::Pending,
    MigrationStatus::ReadyForPush,
    MigrationStatus::Failed,
];

/// Runs the journal transform over every mapping row.
pub async fn run(store: &Store, summary: &mut PhaseSummary) -> Result<(), MigrationError> {
    let created = store.mapping.sync_journal_mappings().await?;
    debug!("Journal mapping sync inserted {} rows", created);

    let lookups = DependencyLookups::load(&store.mapping).await?;
    let comments: HashMap<String, StagedJiraComment> = store
        .staging
        .fetch_jira_comments()
        .await?
        .into_iter()
        .map(|c| (c.jira_comment_id.clone(), c))
        .collect();
    let changelog: HashMap<String, StagedJiraChangelogEntry> = store
        .staging
        .fetch_jira_changelog()
        .await?
        .into_iter()
        .map(|c| (c.jira_changelog_id.clone(), c))
        .collect();
    let staged_attachments = group_attachments_by_issue(store.staging.fetch_jira_attachments().await?);
    let attachment_mappings: HashMap<String, _> = store
        .mapping
        .fetch_attachment_mappings()
        .await?
        .into_iter()
        .map(|a| (a.jira_attachment_id.clone(), a))
        .collect();

    for row in store.mapping.fetch_journal_mappings().await? {
        summary.processed += 1;

        let current_fields = row.automated_fields();
        let current_hash = hash_guard::compute(&current_fields)?;
        if hash_guard::is_manual_override(row.automation_hash.as_deref(), &current_hash) {
            summary.overrides += 1;
            continue;
        }
        if !TRANSFORMABLE.contains(&row.migration_status) {
            summary.skipped += 1;
            continue;
        }

        let issue_attachments: Vec<_> = staged_attachments
            .get(&row.jira_issue_id)
            .map(|atts| atts.iter().collect())
            .unwrap_or_default();
        let index = build_attachment_index(&issue_attachments, &attachment_mappings);
        let ctx = RewriteContext {
            attachments: index.clone(),
            users: lookups.users.clone(),
            issues: lookups.issue_keys.clone(),
        };

        let issue_ready = lookups.issues.contains_key(&row.jira_issue_id);
        let proposal = match row.entity_type {
            JournalEntityType::Comment => {
                derive_comment(&row, comments.get(&row.jira_entity_id), &lookups, &ctx, issue_ready)
            }
            JournalEntityType::Changelog => derive_changelog(
                &row,
                changelog.get(&row.jira_entity_id),
                &lookups,
                &index,
                issue_ready,
            ),
        };

        if proposal.migration_status == MigrationStatus::ReadyForPush {
            summary.ready += 1;
        }

        let new_hash = hash_guard::compute(&proposal)?;
        if proposal != current_fields || row.automation_hash.as_deref() != Some(new_hash.as_str()) {
            store
                .mapping
                .update_journal_automated(row.mapping_id, &proposal, new_hash.as_str())
                .await?;
        } else {
            summary.unchanged += 1;
        }
    }

    info!("Journal transform: {}", summary);
    Ok(())
}

fn status_for(issue_ready: bool) -> MigrationStatus {
    if issue_ready {
        MigrationStatus::ReadyForPush
    } else {
        MigrationStatus::Pending
    }
}

fn derive_comment(
    row: &JournalMapping,
    source: Option<&StagedJiraComment>,
    lookups: &DependencyLookups,
    ctx: &RewriteContext,
    issue_ready: bool,
) -> JournalAutomatedFields {
    let Some(comment) = source else {
        return JournalAutomatedFields {
            migration_status: MigrationStatus::Pending,
            notes: Some("No staged comment for this journal row; re-run the jira phase.".to_string()),
            proposed_notes: None,
            proposed_author_id: None,
            proposed_created_on: None,
            proposed_updated_on: None,
            redmine_journal_id: row.redmine_journal_id,
        };
    };

    let adf = comment.raw_payload.get("body").filter(|v| !v.is_null());
    let notes = rewrite_body(adf, comment.rendered_body.as_deref(), ctx);

    JournalAutomatedFields {
        migration_status: status_for(issue_ready),
        notes: None,
        proposed_notes: Some(notes),
        proposed_author_id: comment
            .author_account_id
            .as_deref()
            .and_then(|a| lookups.users.get(a).copied()),
        proposed_created_on: comment
            .created
            .as_deref()
            .and_then(|c| datetime::to_redmine_datetime(c).ok()),
        proposed_updated_on: comment
            .updated
            .as_deref()
            .and_then(|u| datetime::to_redmine_datetime(u).ok()),
        redmine_journal_id: row.redmine_journal_id,
    }
}

fn derive_changelog(
    row: &JournalMapping,
    source: Option<&StagedJiraChangelogEntry>,
    lookups: &DependencyLookups,
    index: &AttachmentIndex,
    issue_ready: bool,
) -> JournalAutomatedFields {
    let Some(entry) = source else {
        return JournalAutomatedFields {
            migration_status: MigrationStatus::Pending,
            notes: Some("No staged changelog entry for this journal row; re-run the jira phase.".to_string()),
            proposed_notes: None,
            proposed_author_id: None,
            proposed_created_on: None,
            proposed_updated_on: None,
            redmine_journal_id: row.redmine_journal_id,
        };
    };

    let (status, notes, proposed_notes) = if entry.is_attachment_only() {
        let targets: Vec<_> = entry
            .items()
            .iter()
            .filter_map(|(_, _, to)| to.as_deref())
            .filter_map(|filename| index.resolve_name(filename).cloned())
            .collect();
        if targets.is_empty() {
            warn!(
                "Changelog entry {} only announces attachments but none are mapped",
                entry.jira_changelog_id
            );
            (
                MigrationStatus::Skipped,
                Some("Attachment-only changelog entry without mapped attachments.".to_string()),
                None,
            )
        } else {
            (status_for(issue_ready), None, Some(attachment_block(&targets)))
        }
    } else {
        let lines: Vec<String> = entry
            .items()
            .iter()
            .map(|(field, from, to)| {
                format!(
                    "• {}: {} → {}",
                    field,
                    from.as_deref().unwrap_or("(none)"),
                    to.as_deref().unwrap_or("(none)")
                )
            })
            .collect();
        (status_for(issue_ready), None, Some(lines.join("\n")))
    };

    JournalAutomatedFields {
        migration_status: status,
        notes,
        proposed_notes,
        proposed_author_id: entry
            .author_account_id
            .as_deref()
            .and_then(|a| lookups.users.get(a).copied()),
        proposed_created_on: entry
            .created
            .as_deref()
            .and_then(|c| datetime::to_redmine_datetime(c).ok()),
        proposed_updated_on: entry
            .created
            .as_deref()
            .and_then(|c| datetime::to_redmine_datetime(c).ok()),
        redmine_journal_id: row.redmine_journal_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jira2redmine_domain::services::content::AttachmentTarget;
    use serde_json::json;

    fn row(entity_type: JournalEntityType) -> JournalMapping {
        JournalMapping {
            mapping_id: 1,
            jira_entity_id: "100".into(),
            jira_issue_id: "10".into(),
            entity_type,
            migration_status: MigrationStatus::Pending,
            notes: None,
            proposed_notes: None,
            proposed_author_id: None,
            proposed_created_on: None,
            proposed_updated_on: None,
            redmine_journal_id: None,
            automation_hash: None,
        }
    }

    fn lookups_with_user() -> DependencyLookups {
        let mut l = DependencyLookups::default();
        l.users.insert("acc-1".into(), 5);
        l.issues.insert("10".into(), 123);
        l
    }

    #[test]
    fn test_comment_uses_rendered_html() {
        let comment = StagedJiraComment {
            jira_comment_id: "100".into(),
            jira_issue_id: "10".into(),
            author_account_id: Some("acc-1".into()),
            created: Some("2024-05-01T10:00:00.000+0200".into()),
            updated: Some("2024-05-01T11:00:00.000+0200".into()),
            rendered_body: Some("<p>hello</p>".into()),
            raw_payload: json!({"body": {"type": "doc", "content": []}}),
        };
        let fields = derive_comment(
            &row(JournalEntityType::Comment),
            Some(&comment),
            &lookups_with_user(),
            &RewriteContext::default(),
            true,
        );
        assert_eq!(fields.migration_status, MigrationStatus::ReadyForPush);
        assert_eq!(fields.proposed_notes.as_deref(), Some("hello"));
        assert_eq!(fields.proposed_author_id, Some(5));
        assert_eq!(fields.proposed_created_on.as_deref(), Some("2024-05-01T08:00:00Z"));
    }

    #[test]
    fn test_comment_without_ready_issue_is_pending() {
        let comment = StagedJiraComment {
            jira_comment_id: "100".into(),
            jira_issue_id: "10".into(),
            author_account_id: None,
            created: None,
            updated: None,
            rendered_body: Some("<p>hi</p>".into()),
            raw_payload: json!({}),
        };
        let fields = derive_comment(
            &row(JournalEntityType::Comment),
            Some(&comment),
            &DependencyLookups::default(),
            &RewriteContext::default(),
            false,
        );
        assert_eq!(fields.migration_status, MigrationStatus::Pending);
    }

    #[test]
    fn test_changelog_bullet_lines() {
        let entry = StagedJiraChangelogEntry {
            jira_changelog_id: "100".into(),
            jira_issue_id: "10".into(),
            author_account_id: Some("acc-1".into()),
            created: Some("2024-05-01T10:00:00.000+0200".into()),
            raw_payload: json!({
                "items": [
                    {"field": "status", "fromString": "Open", "toString": "Done"},
                    {"field": "assignee", "fromString": null, "toString": "Alice"}
                ]
            }),
        };
        let fields = derive_changelog(
            &row(JournalEntityType::Changelog),
            Some(&entry),
            &lookups_with_user(),
            &AttachmentIndex::new(),
            true,
        );
        assert_eq!(
            fields.proposed_notes.as_deref(),
            Some("• status: Open → Done\n• assignee: (none) → Alice")
        );
        assert_eq!(fields.migration_status, MigrationStatus::ReadyForPush);
    }

    #[test]
    fn test_attachment_only_changelog_uses_attachment_block() {
        let entry = StagedJiraChangelogEntry {
            jira_changelog_id: "100".into(),
            jira_issue_id: "10".into(),
            author_account_id: None,
            created: None,
            raw_payload: json!({
                "items": [{"field": "Attachment", "fromString": null, "toString": "big.zip"}]
            }),
        };
        let mut index = AttachmentIndex::new();
        index.insert(
            "900",
            "big.zip",
            AttachmentTarget::SharePoint {
                unique_filename: "900__big.zip".into(),
                url: "https://sp.example.com/big.zip".into(),
            },
        );
        let fields = derive_changelog(
            &row(JournalEntityType::Changelog),
            Some(&entry),
            &lookups_with_user(),
            &index,
            true,
        );
        assert_eq!(
            fields.proposed_notes.as_deref(),
            Some("> SharePoint attachment: [900__big.zip](https://sp.example.com/big.zip)")
        );
    }

    #[test]
    fn test_attachment_only_changelog_without_mapping_is_skipped() {
        let entry = StagedJiraChangelogEntry {
            jira_changelog_id: "100".into(),
            jira_issue_id: "10".into(),
            author_account_id: None,
            created: None,
            raw_payload: json!({
                "items": [{"field": "Attachment", "fromString": null, "toString": "ghost.bin"}]
            }),
        };
        let fields = derive_changelog(
            &row(JournalEntityType::Changelog),
            Some(&entry),
            &lookups_with_user(),
            &AttachmentIndex::new(),
            true,
        );
        assert_eq!(fields.migration_status, MigrationStatus::Skipped);
        assert_eq!(fields.proposed_notes, None);
        assert!(fields.notes.unwrap().contains("without mapped attachments"));
    }
}
