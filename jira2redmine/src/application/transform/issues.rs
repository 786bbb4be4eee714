// /////////////////////////////////////////////////////////////////////////////
// Jira2Redmine Migration RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Issue Reconciler
//!
//! Resolves every foreign dependency of an issue (project, tracker, status,
//! priority, author, assignee, parent) against ready mapping rows, falling
//! back to operator-configured defaults where a dependency is unresolved. A
//! missing dependency without a default sends the row to manual intervention
//! with an itemised note. Parents are best effort: an unavailable parent is
//! left open and closed later by the subtask phase.
//!
//! Derived fields: subject (≤ 255 chars), description (ADF through the
//! content rewriter), start date from `created`, due date, `done_ratio =
//! 100` iff the Jira status category is `done`, estimated hours from
//! `timeoriginalestimate`, and privacy from the security field.

use std::collections::HashMap;

use tracing::{debug, info};

use jira2redmine_domain::entities::{IssueAutomatedFields, IssueMapping, StagedJiraIssue};
use jira2redmine_domain::services::content::{rewrite_body, RewriteContext};
use jira2redmine_domain::services::{datetime, hash_guard};
use jira2redmine_domain::value_objects::MigrationStatus;
use jira2redmine_domain::MigrationError;

use crate::application::summary::PhaseSummary;
use crate::application::transform::lookups::DependencyLookups;
use crate::application::transform::{build_attachment_index, group_attachments_by_issue};
use crate::infrastructure::config::DefaultsConfig;
use crate::infrastructure::repositories::Store;

const TRANSFORMABLE: [MigrationStatus; 4] = [
    MigrationStatus::PendingAnalysis,
    MigrationStatus::ReadyForCreation,
    MigrationStatus::MatchFound,
    // Failed creations are reconsidered so fixes to lookups or defaults
    // flow through without operator surgery.
    MigrationStatus::CreationFailed,
];

const MAX_SUBJECT_LENGTH: usize = 255;

/// Runs the issue transform over every mapping row.
pub async fn run(
    store: &Store,
    defaults: &DefaultsConfig,
    summary: &mut PhaseSummary,
) -> Result<(), MigrationError> {
    store.mapping.sync_issue_mappings().await?;

    let lookups = DependencyLookups::load(&store.mapping).await?;
    let staged: HashMap<String, StagedJiraIssue> = store
        .staging
        .fetch_jira_issues()
        .await?
        .into_iter()
        .map(|i| (i.jira_issue_id.clone(), i))
        .collect();
    let staged_attachments = group_attachments_by_issue(store.staging.fetch_jira_attachments().await?);
    let attachment_mappings: HashMap<String, _> = store
        .mapping
        .fetch_attachment_mappings()
        .await?
        .into_iter()
        .map(|a| (a.jira_attachment_id.clone(), a))
        .collect();

    for row in store.mapping.fetch_issue_mappings().await? {
        summary.processed += 1;

        let current_fields = row.automated_fields();
        let current_hash = hash_guard::compute(&current_fields)?;
        if hash_guard::is_manual_override(row.automation_hash.as_deref(), &current_hash) {
            debug!("Issue {} is manually overridden, preserving", row.jira_issue_id);
            summary.overrides += 1;
            continue;
        }
        if !TRANSFORMABLE.contains(&row.migration_status) {
            summary.skipped += 1;
            continue;
        }

        // Parents become ready mid-run, so resolve against the live table.
        let parent = match row.jira_parent_issue_id.as_deref() {
            Some(parent_id) => store.mapping.resolve_parent_issue_id(parent_id).await?,
            None => None,
        };

        let issue_attachments: Vec<_> = staged_attachments
            .get(&row.jira_issue_id)
            .map(|atts| atts.iter().collect())
            .unwrap_or_default();
        let ctx = RewriteContext {
            attachments: build_attachment_index(&issue_attachments, &attachment_mappings),
            users: lookups.users.clone(),
            issues: lookups.issue_keys.clone(),
        };

        let proposal = derive(&row, staged.get(&row.jira_issue_id), &lookups, defaults, parent, &ctx);
        match proposal.migration_status {
            MigrationStatus::MatchFound => summary.matched += 1,
            MigrationStatus::ReadyForCreation => summary.ready += 1,
            MigrationStatus::ManualInterventionRequired => summary.manual += 1,
            _ => {}
        }

        let new_hash = hash_guard::compute(&proposal)?;
        if proposal != current_fields || row.automation_hash.as_deref() != Some(new_hash.as_str()) {
            store
                .mapping
                .update_issue_automated(row.mapping_id, &proposal, new_hash.as_str())
                .await?;
        } else {
            summary.unchanged += 1;
        }
    }

    info!("Issue transform: {}", summary);
    Ok(())
}

/// Computes the automated proposal for one issue row.
fn derive(
    row: &IssueMapping,
    staged: Option<&StagedJiraIssue>,
    lookups: &DependencyLookups,
    defaults: &DefaultsConfig,
    parent: Option<i64>,
    ctx: &RewriteContext,
) -> IssueAutomatedFields {
    let Some(staged) = staged else {
        return manual(row, "No staged Jira issue for this mapping row; re-run the jira phase.".into());
    };

    let mut missing: Vec<String> = Vec::new();

    let project = staged
        .jira_project_id
        .as_deref()
        .and_then(|id| lookups.projects.get(id).copied())
        .or(defaults.project_id);
    if project.is_none() {
        missing.push(format!(
            "project ({})",
            staged.jira_project_id.as_deref().unwrap_or("unset")
        ));
    }

    let tracker = staged
        .jira_issue_type_id
        .as_deref()
        .and_then(|id| lookups.trackers.get(id).copied())
        .or(defaults.tracker_id);
    if tracker.is_none() {
        missing.push(format!(
            "tracker ({})",
            staged.jira_issue_type_id.as_deref().unwrap_or("unset")
        ));
    }

    let status = staged
        .jira_status_id
        .as_deref()
        .and_then(|id| lookups.statuses.get(id).copied())
        .or(defaults.status_id);
    if status.is_none() {
        missing.push(format!(
            "status ({})",
            staged.jira_status_id.as_deref().unwrap_or("unset")
        ));
    }

    let priority = staged
        .jira_priority_id
        .as_deref()
        .and_then(|id| lookups.priorities.get(id).copied())
        .or(defaults.priority_id);
    if priority.is_none() {
        missing.push(format!(
            "priority ({})",
            staged.jira_priority_id.as_deref().unwrap_or("unset")
        ));
    }

    let author = staged
        .jira_reporter_account_id
        .as_deref()
        .and_then(|id| lookups.users.get(id).copied())
        .or(defaults.author_id);
    if author.is_none() {
        missing.push(format!(
            "author ({})",
            staged.jira_reporter_account_id.as_deref().unwrap_or("unset")
        ));
    }

    // Assignee is a dependency only when Jira has one.
    let assignee = match staged.jira_assignee_account_id.as_deref() {
        Some(account) => {
            let resolved = lookups.users.get(account).copied().or(defaults.assignee_id);
            if resolved.is_none() {
                missing.push(format!("assignee ({})", account));
            }
            resolved
        }
        None => None,
    };

    let subject = staged
        .summary
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.chars().take(MAX_SUBJECT_LENGTH).collect::<String>());
    if subject.is_none() {
        missing.push("subject (empty summary)".to_string());
    }

    if !missing.is_empty() {
        return manual(row, format!("Unresolved dependencies: {}.", missing.join(", ")));
    }

    let description = staged
        .raw_payload
        .pointer("/fields/description")
        .filter(|v| !v.is_null())
        .map(|adf| rewrite_body(Some(adf), None, ctx));

    let start_date = staged
        .created
        .as_deref()
        .and_then(|created| datetime::date_of(created).ok());
    let done_ratio = if staged.jira_status_category.as_deref() == Some("done") {
        100
    } else {
        0
    };
    let estimated_hours = staged
        .time_original_estimate
        .map(|seconds| (seconds as f64 / 3600.0 * 100.0).round() / 100.0);
    let is_private = if staged.jira_security_level_id.is_some() {
        true
    } else {
        defaults.is_private
    };

    // A row matched to an existing Redmine issue keeps its identity; it
    // must never be queued for a second creation.
    let migration_status = if row.migration_status == MigrationStatus::MatchFound
        && row.redmine_issue_id.is_some()
    {
        MigrationStatus::MatchFound
    } else {
        MigrationStatus::ReadyForCreation
    };

    IssueAutomatedFields {
        redmine_issue_id: row.redmine_issue_id,
        redmine_project_id: project,
        redmine_tracker_id: tracker,
        redmine_status_id: status,
        redmine_priority_id: priority,
        redmine_author_id: author,
        redmine_assigned_to_id: assignee,
        redmine_parent_issue_id: parent,
        proposed_subject: subject,
        proposed_description: description,
        proposed_start_date: start_date,
        proposed_due_date: staged.due_date.clone(),
        proposed_done_ratio: Some(done_ratio),
        proposed_estimated_hours: estimated_hours,
        proposed_is_private: Some(is_private),
        migration_status,
        notes: None,
    }
}

fn manual(row: &IssueMapping, note: String) -> IssueAutomatedFields {
    let mut fields = row.automated_fields();
    fields.migration_status = MigrationStatus::ManualInterventionRequired;
    fields.notes = Some(note);
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row() -> IssueMapping {
        IssueMapping {
            mapping_id: 1,
            jira_issue_id: "20001".into(),
            jira_issue_key: Some("PROJ-1".into()),
            jira_project_id: Some("10001".into()),
            jira_issue_type_id: Some("10002".into()),
            jira_status_id: Some("3".into()),
            jira_priority_id: Some("2".into()),
            jira_reporter_account_id: Some("acc-1".into()),
            jira_assignee_account_id: None,
            jira_parent_issue_id: None,
            redmine_issue_id: None,
            redmine_project_id: None,
            redmine_tracker_id: None,
            redmine_status_id: None,
            redmine_priority_id: None,
            redmine_author_id: None,
            redmine_assigned_to_id: None,
            redmine_parent_issue_id: None,
            proposed_subject: None,
            proposed_description: None,
            proposed_start_date: None,
            proposed_due_date: None,
            proposed_done_ratio: None,
            proposed_estimated_hours: None,
            proposed_is_private: None,
            migration_status: MigrationStatus::PendingAnalysis,
            notes: None,
            automation_hash: None,
        }
    }

    fn staged() -> StagedJiraIssue {
        StagedJiraIssue {
            jira_issue_id: "20001".into(),
            jira_issue_key: Some("PROJ-1".into()),
            jira_project_id: Some("10001".into()),
            jira_issue_type_id: Some("10002".into()),
            jira_status_id: Some("3".into()),
            jira_status_category: Some("done".into()),
            jira_priority_id: Some("2".into()),
            jira_reporter_account_id: Some("acc-1".into()),
            jira_assignee_account_id: None,
            jira_parent_issue_id: None,
            jira_security_level_id: None,
            summary: Some("Do the thing".into()),
            created: Some("2024-05-01T10:00:00.000+0200".into()),
            updated: None,
            due_date: Some("2024-05-01".into()),
            time_original_estimate: Some(7200),
            raw_payload: json!({
                "fields": {
                    "description": {
                        "type": "doc",
                        "content": [
                            {"type": "paragraph", "content": [{"type": "text", "text": "body"}]}
                        ]
                    }
                }
            }),
        }
    }

    fn lookups() -> DependencyLookups {
        let mut l = DependencyLookups::default();
        l.projects.insert("10001".into(), 1);
        l.trackers.insert("10002".into(), 2);
        l.statuses.insert("3".into(), 3);
        l.priorities.insert("2".into(), 4);
        l.users.insert("acc-1".into(), 5);
        l
    }

    #[test]
    fn test_fully_resolved_issue_is_ready() {
        let proposal = derive(
            &row(),
            Some(&staged()),
            &lookups(),
            &DefaultsConfig::default(),
            None,
            &RewriteContext::default(),
        );
        assert_eq!(proposal.migration_status, MigrationStatus::ReadyForCreation);
        assert_eq!(proposal.redmine_project_id, Some(1));
        assert_eq!(proposal.redmine_tracker_id, Some(2));
        assert_eq!(proposal.redmine_author_id, Some(5));
        assert_eq!(proposal.proposed_subject.as_deref(), Some("Do the thing"));
        assert_eq!(proposal.proposed_description.as_deref(), Some("body"));
        assert_eq!(proposal.proposed_start_date.as_deref(), Some("2024-05-01"));
        assert_eq!(proposal.proposed_due_date.as_deref(), Some("2024-05-01"));
        assert_eq!(proposal.proposed_done_ratio, Some(100));
        assert_eq!(proposal.proposed_estimated_hours, Some(2.0));
        assert_eq!(proposal.proposed_is_private, Some(false));
        assert_eq!(proposal.notes, None);
    }

    #[test]
    fn test_unresolved_dependency_without_default_goes_manual() {
        let mut l = lookups();
        l.trackers.clear();
        let proposal = derive(
            &row(),
            Some(&staged()),
            &l,
            &DefaultsConfig::default(),
            None,
            &RewriteContext::default(),
        );
        assert_eq!(proposal.migration_status, MigrationStatus::ManualInterventionRequired);
        let notes = proposal.notes.unwrap();
        assert!(notes.contains("tracker (10002)"), "notes were: {}", notes);
    }

    #[test]
    fn test_unresolved_dependency_with_default_falls_back() {
        let mut l = lookups();
        l.trackers.clear();
        let defaults = DefaultsConfig {
            tracker_id: Some(99),
            ..Default::default()
        };
        let proposal = derive(&row(), Some(&staged()), &l, &defaults, None, &RewriteContext::default());
        assert_eq!(proposal.migration_status, MigrationStatus::ReadyForCreation);
        assert_eq!(proposal.redmine_tracker_id, Some(99));
    }

    #[test]
    fn test_security_field_forces_private() {
        let mut source = staged();
        source.jira_security_level_id = Some("100".into());
        let proposal = derive(
            &row(),
            Some(&source),
            &lookups(),
            &DefaultsConfig::default(),
            None,
            &RewriteContext::default(),
        );
        assert_eq!(proposal.proposed_is_private, Some(true));
    }

    #[test]
    fn test_unresolved_assignee_is_itemised() {
        let mut source = staged();
        source.jira_assignee_account_id = Some("acc-unknown".into());
        let proposal = derive(
            &row(),
            Some(&source),
            &lookups(),
            &DefaultsConfig::default(),
            None,
            &RewriteContext::default(),
        );
        assert_eq!(proposal.migration_status, MigrationStatus::ManualInterventionRequired);
        assert!(proposal.notes.unwrap().contains("assignee (acc-unknown)"));
    }

    #[test]
    fn test_long_summary_is_truncated() {
        let mut source = staged();
        source.summary = Some("x".repeat(400));
        let proposal = derive(
            &row(),
            Some(&source),
            &lookups(),
            &DefaultsConfig::default(),
            None,
            &RewriteContext::default(),
        );
        assert_eq!(proposal.proposed_subject.unwrap().chars().count(), 255);
    }

    #[test]
    fn test_parent_is_best_effort() {
        let proposal = derive(
            &row(),
            Some(&staged()),
            &lookups(),
            &DefaultsConfig::default(),
            Some(77),
            &RewriteContext::default(),
        );
        assert_eq!(proposal.redmine_parent_issue_id, Some(77));
    }

    #[test]
    fn test_matched_issue_keeps_match_status() {
        let mut mapped = row();
        mapped.migration_status = MigrationStatus::MatchFound;
        mapped.redmine_issue_id = Some(500);
        let proposal = derive(
            &mapped,
            Some(&staged()),
            &lookups(),
            &DefaultsConfig::default(),
            None,
            &RewriteContext::default(),
        );
        assert_eq!(proposal.migration_status, MigrationStatus::MatchFound);
        assert_eq!(proposal.redmine_issue_id, Some(500));
    }

    #[test]
    fn test_not_done_category_is_zero_ratio() {
        let mut source = staged();
        source.jira_status_category = Some("indeterminate".into());
        let proposal = derive(
            &row(),
            Some(&source),
            &lookups(),
            &DefaultsConfig::default(),
            None,
            &RewriteContext::default(),
        );
        assert_eq!(proposal.proposed_done_ratio, Some(0));
    }
}
