// /////////////////////////////////////////////////////////////////////////////
// Jira2Redmine Migration RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Issue Pusher
//!
//! Creates Redmine issues for `READY_FOR_CREATION` rows. Upload tokens of
//! attachments hinted `ISSUE` ride along in `uploads` so they attach at
//! creation time; immediately afterwards the association step confirms them
//! against the created issue.
//!
//! Rows are pushed in ascending `mapping_id` order, so parents staged before
//! children usually resolve in the same run; whatever stays open is closed
//! by the subtask phase.

use std::collections::HashMap;

use serde_json::{json, Value};
use tracing::{info, warn};

use jira2redmine_domain::entities::{AttachmentMapping, StagedJiraAttachment};
use jira2redmine_domain::services::hash_guard;
use jira2redmine_domain::value_objects::{AssociationHint, MigrationStatus};
use jira2redmine_domain::MigrationError;

use crate::application::attachments::associate::associate_issue_attachments;
use crate::application::summary::PhaseSummary;
use crate::infrastructure::clients::RedmineClient;
use crate::infrastructure::repositories::Store;

/// The `uploads` array for attachments that attach at issue creation.
pub(crate) fn issue_uploads(
    attachments: &[AttachmentMapping],
    staged: &HashMap<String, StagedJiraAttachment>,
) -> Vec<Value> {
    attachments
        .iter()
        .filter(|att| {
            att.association_hint == Some(AssociationHint::Issue)
                && att.migration_status == MigrationStatus::PendingAssociation
                && att.redmine_upload_token.is_some()
        })
        .map(|att| {
            let filename = att
                .local_filepath
                .as_deref()
                .and_then(|p| std::path::Path::new(p).file_name())
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| att.jira_attachment_id.clone());
            let content_type = staged
                .get(&att.jira_attachment_id)
                .and_then(|s| s.mime_type.clone())
                .unwrap_or_else(|| "application/octet-stream".to_string());
            json!({
                "token": att.redmine_upload_token,
                "filename": filename,
                "content_type": content_type,
            })
        })
        .collect()
}

/// Runs the issue push over all ready rows.
pub async fn run(
    store: &Store,
    redmine: &RedmineClient,
    dry_run: bool,
    summary: &mut PhaseSummary,
) -> Result<(), MigrationError> {
    let staged_attachments: HashMap<String, StagedJiraAttachment> = store
        .staging
        .fetch_jira_attachments()
        .await?
        .into_iter()
        .map(|a| (a.jira_attachment_id.clone(), a))
        .collect();

    for row in store.mapping.fetch_ready_issues().await? {
        summary.processed += 1;
        let mut fields = row.automated_fields();

        let (Some(project_id), Some(subject)) =
            (fields.redmine_project_id, fields.proposed_subject.clone())
        else {
            fields.migration_status = MigrationStatus::ManualInterventionRequired;
            fields.notes = Some("Cannot create an issue without a project and a subject.".into());
            let hash = hash_guard::compute(&fields)?;
            store
                .mapping
                .update_issue_automated(row.mapping_id, &fields, hash.as_str())
                .await?;
            summary.manual += 1;
            continue;
        };

        let attachments = store.mapping.fetch_attachments_for_issue(&row.jira_issue_id).await?;
        let uploads = issue_uploads(&attachments, &staged_attachments);

        let mut issue = json!({
            "project_id": project_id,
            "subject": subject,
            "description": fields.proposed_description,
            "tracker_id": fields.redmine_tracker_id,
            "status_id": fields.redmine_status_id,
            "priority_id": fields.redmine_priority_id,
            "author_id": fields.redmine_author_id,
            "assigned_to_id": fields.redmine_assigned_to_id,
            "parent_issue_id": fields.redmine_parent_issue_id,
            "start_date": fields.proposed_start_date,
            "due_date": fields.proposed_due_date,
            "done_ratio": fields.proposed_done_ratio,
            "estimated_hours": fields.proposed_estimated_hours,
            "is_private": fields.proposed_is_private,
        });
        if !uploads.is_empty() {
            issue["uploads"] = Value::Array(uploads);
        }
        let payload = json!({ "issue": issue });

        if dry_run {
            info!(target: "dry_run", "Would POST /issues.json: {}", payload);
            summary.previewed += 1;
            continue;
        }

        match redmine.create_issue(&payload).await {
            Ok(created) => {
                let id = created.pointer("/issue/id").and_then(Value::as_i64);
                fields.redmine_issue_id = id;
                fields.migration_status = MigrationStatus::CreationSuccess;
                fields.notes = None;
                let hash = hash_guard::compute(&fields)?;
                store
                    .mapping
                    .update_issue_automated(row.mapping_id, &fields, hash.as_str())
                    .await?;
                info!(
                    "Created Redmine issue {} for {}",
                    id.unwrap_or(-1),
                    row.jira_issue_key.as_deref().unwrap_or(&row.jira_issue_id)
                );
                summary.succeeded += 1;

                if let Some(redmine_issue_id) = id {
                    associate_issue_attachments(store, redmine, &row.jira_issue_id, redmine_issue_id).await?;
                }
            }
            Err(error) => {
                warn!(
                    "Issue creation for {} failed: {}",
                    row.jira_issue_key.as_deref().unwrap_or(&row.jira_issue_id),
                    error
                );
                fields.migration_status = MigrationStatus::CreationFailed;
                fields.notes = Some(error.message);
                let hash = hash_guard::compute(&fields)?;
                store
                    .mapping
                    .update_issue_automated(row.mapping_id, &fields, hash.as_str())
                    .await?;
                summary.failed += 1;
            }
        }
    }

    info!("Issue push: {}", summary);
    Ok(())
}
