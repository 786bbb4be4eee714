// /////////////////////////////////////////////////////////////////////////////
// Jira2Redmine Migration RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Attachment Push Step
//!
//! Uploads downloaded blobs. Files at or above the configured SharePoint
//! offload threshold stream to SharePoint via a Graph upload session and
//! store the returned `webUrl`; everything else posts to Redmine
//! `uploads.json` and stores the upload token. Either way the row moves to
//! `PENDING_ASSOCIATION`.
//!
//! An offloaded attachment is never also uploaded to Redmine, and a token
//! is requested exactly once per attachment.

use std::collections::HashMap;
use std::path::Path;

use tracing::{info, warn};

use jira2redmine_domain::entities::StagedJiraAttachment;
use jira2redmine_domain::services::datetime;
use jira2redmine_domain::value_objects::MigrationStatus;
use jira2redmine_domain::MigrationError;

use crate::application::summary::PhaseSummary;
use crate::infrastructure::clients::{GraphClient, RedmineClient};
use crate::infrastructure::config::SharePointConfig;
use crate::infrastructure::repositories::Store;

/// The numeric prefix Redmine sometimes carries in upload tokens
/// (`{attachment_id}.{hex}`).
pub(crate) fn attachment_id_from_token(token: &str) -> Option<i64> {
    token.split('.').next()?.parse::<i64>().ok()
}

/// Runs the push step over all `PENDING_UPLOAD` rows.
#[allow(clippy::too_many_arguments)]
pub async fn run(
    store: &Store,
    redmine: &RedmineClient,
    graph: Option<&GraphClient>,
    sharepoint: Option<&SharePointConfig>,
    limit: Option<usize>,
    dry_run: bool,
    summary: &mut PhaseSummary,
) -> Result<(), MigrationError> {
    let staged: HashMap<String, StagedJiraAttachment> = store
        .staging
        .fetch_jira_attachments()
        .await?
        .into_iter()
        .map(|a| (a.jira_attachment_id.clone(), a))
        .collect();
    let users = store.mapping.user_lookup().await?;

    let rows = store
        .mapping
        .fetch_attachments_in_status(MigrationStatus::PendingUpload, limit)
        .await?;

    for mut row in rows {
        summary.processed += 1;
        if !row.upload_enabled {
            summary.skipped += 1;
            continue;
        }

        let Some(local) = row.local_filepath.clone() else {
            row.migration_status = MigrationStatus::Failed;
            row.notes = Some("Row is PENDING_UPLOAD but has no local file; requeued next transform.".into());
            store.mapping.update_attachment(&row).await?;
            summary.failed += 1;
            continue;
        };
        let local_path = Path::new(&local);

        let actual_size = match tokio::fs::metadata(local_path).await {
            Ok(meta) => meta.len(),
            Err(error) => {
                row.migration_status = MigrationStatus::Failed;
                row.notes = Some(format!("Local file {} unreadable: {}", local, error));
                store.mapping.update_attachment(&row).await?;
                summary.failed += 1;
                continue;
            }
        };

        let filename = local_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| row.jira_attachment_id.clone());

        let offload_client = match (graph, sharepoint) {
            (Some(client), Some(config)) if actual_size >= config.offload_threshold_bytes => Some(client),
            _ => None,
        };

        if dry_run {
            let destination = if offload_client.is_some() { "SharePoint" } else { "Redmine" };
            info!(target: "dry_run", "Would upload {} ({} bytes) to {}", filename, actual_size, destination);
            summary.previewed += 1;
            continue;
        }

        if let Some(graph) = offload_client {
            match graph.upload_file(local_path, &filename).await {
                Ok(web_url) => {
                    row.sharepoint_url = Some(web_url);
                    row.redmine_upload_token = None;
                    row.migration_status = MigrationStatus::PendingAssociation;
                    row.notes = None;
                    summary.succeeded += 1;
                }
                Err(error) => {
                    warn!("SharePoint offload of {} failed: {}", filename, error);
                    row.migration_status = MigrationStatus::Failed;
                    row.notes = Some(error.to_string());
                    summary.failed += 1;
                }
            }
        } else {
            let source = staged.get(&row.jira_attachment_id);
            let author_id = source
                .and_then(|s| s.author_account_id.as_deref())
                .and_then(|a| users.get(a).copied());
            let created_on = source
                .and_then(|s| s.created.as_deref())
                .and_then(|c| datetime::to_redmine_datetime(c).ok());

            match redmine
                .upload_file(local_path, &filename, author_id, created_on.as_deref())
                .await
            {
                Ok(token) => {
                    row.redmine_attachment_id = attachment_id_from_token(&token);
                    row.redmine_upload_token = Some(token);
                    row.migration_status = MigrationStatus::PendingAssociation;
                    row.notes = None;
                    summary.succeeded += 1;
                }
                Err(error) => {
                    warn!("Redmine upload of {} failed: {}", filename, error);
                    row.migration_status = MigrationStatus::Failed;
                    row.notes = Some(error.message);
                    summary.failed += 1;
                }
            }
        }

        store.mapping.update_attachment(&row).await?;
    }

    info!("Attachment push: {}", summary);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_with_numeric_prefix() {
        assert_eq!(attachment_id_from_token("1234.0a1b2c"), Some(1234));
    }

    #[test]
    fn test_token_without_numeric_prefix() {
        assert_eq!(attachment_id_from_token("0a1b2c"), None);
        assert_eq!(attachment_id_from_token(""), None);
    }

    #[test]
    fn test_plain_numeric_token() {
        assert_eq!(attachment_id_from_token("77"), Some(77));
    }
}
