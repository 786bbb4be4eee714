// /////////////////////////////////////////////////////////////////////////////
// Jira2Redmine Migration RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Attachment Pull Step
//!
//! Streams attachment binaries from Jira into the working directory. The
//! downloads themselves run in a bounded worker pool; mapping updates are
//! applied afterwards on the single database connection, so concurrency
//! never touches shared mutable state.
//!
//! Blobs land at `{work_dir}/{jira_attachment_id}__{sanitized_filename}`.
//! A failed download removes the partial file and marks the row `FAILED`
//! with the error summary; the transform step requeues it next run.

use std::collections::HashMap;
use std::path::PathBuf;

use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use jira2redmine_domain::entities::{AttachmentMapping, StagedJiraAttachment};
use jira2redmine_domain::value_objects::{unique_filename, MigrationStatus};
use jira2redmine_domain::MigrationError;

use crate::application::summary::PhaseSummary;
use crate::infrastructure::clients::JiraClient;
use crate::infrastructure::config::AttachmentConfig;
use crate::infrastructure::repositories::Store;

struct DownloadJob {
    row: AttachmentMapping,
    content_url: String,
    destination: PathBuf,
}

enum DownloadOutcome {
    Done { row: AttachmentMapping, path: PathBuf, bytes: u64 },
    Failed { row: AttachmentMapping, error: String },
}

/// Runs the pull step over all `PENDING_DOWNLOAD` rows.
pub async fn run(
    jira: &JiraClient,
    store: &Store,
    config: &AttachmentConfig,
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

    let rows = store
        .mapping
        .fetch_attachments_in_status(MigrationStatus::PendingDownload, limit)
        .await?;

    let mut jobs = Vec::new();
    for row in rows {
        summary.processed += 1;
        if !row.download_enabled {
            summary.skipped += 1;
            continue;
        }
        let Some(source) = staged.get(&row.jira_attachment_id) else {
            summary.skipped += 1;
            warn!(
                "Attachment {} has no staged descriptor, skipping",
                row.jira_attachment_id
            );
            continue;
        };
        let Some(content_url) = source.content_url.clone() else {
            summary.skipped += 1;
            warn!("Attachment {} has no content URL, skipping", row.jira_attachment_id);
            continue;
        };

        let filename = unique_filename(
            &row.jira_attachment_id,
            source.filename.as_deref().unwrap_or("attachment"),
        );
        let destination = config.work_dir.join(filename);

        if dry_run {
            info!(target: "dry_run", "Would download {} to {}", content_url, destination.display());
            summary.previewed += 1;
            continue;
        }

        jobs.push(DownloadJob {
            row,
            content_url,
            destination,
        });
    }

    let concurrency = config.download_concurrency.max(1);
    let outcomes: Vec<DownloadOutcome> = stream::iter(jobs)
        .map(|job| async move {
            match jira.download_attachment(&job.content_url, &job.destination).await {
                Ok(bytes) => DownloadOutcome::Done {
                    row: job.row,
                    path: job.destination,
                    bytes,
                },
                Err(error) => {
                    // Drop a half-written blob; the next run restarts clean.
                    let _ = tokio::fs::remove_file(&job.destination).await;
                    DownloadOutcome::Failed {
                        row: job.row,
                        error: error.to_string(),
                    }
                }
            }
        })
        .buffer_unordered(concurrency)
        .collect()
        .await;

    for outcome in outcomes {
        match outcome {
            DownloadOutcome::Done { mut row, path, bytes } => {
                let absolute = std::path::absolute(&path).unwrap_or(path);
                debug!(
                    "Downloaded attachment {} ({} bytes) to {}",
                    row.jira_attachment_id,
                    bytes,
                    absolute.display()
                );
                row.migration_status = MigrationStatus::PendingUpload;
                row.local_filepath = Some(absolute.to_string_lossy().into_owned());
                row.notes = None;
                store.mapping.update_attachment(&row).await?;
                summary.succeeded += 1;
            }
            DownloadOutcome::Failed { mut row, error } => {
                warn!("Download of attachment {} failed: {}", row.jira_attachment_id, error);
                row.migration_status = MigrationStatus::Failed;
                row.local_filepath = None;
                row.notes = Some(error);
                store.mapping.update_attachment(&row).await?;
                summary.failed += 1;
            }
        }
    }

    info!("Attachment pull: {}", summary);
    Ok(())
}
