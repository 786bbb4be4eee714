// /////////////////////////////////////////////////////////////////////////////
// Jira2Redmine Migration RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Attachment Association Step
//!
//! After an issue (or journal) push consumed upload tokens, Redmine is
//! re-fetched with `include=attachments` and the rows whose tokens were
//! consumed are matched by `(filename, filesize)`. Matches transition to
//! `SUCCESS` with the resolved `redmine_attachment_id`; everything else
//! stays `PENDING_ASSOCIATION` with a diagnostic note.
//!
//! SharePoint-offloaded rows have nothing to match on Redmine; the
//! rewritten content carries their link, so they complete here as well.

use std::path::Path;

use serde_json::Value;
use tracing::{debug, info, warn};

use jira2redmine_domain::value_objects::MigrationStatus;
use jira2redmine_domain::MigrationError;

use crate::infrastructure::clients::RedmineClient;
use crate::infrastructure::repositories::Store;

/// One attachment as Redmine reports it.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RemoteAttachment {
    pub id: i64,
    pub filename: String,
    pub filesize: Option<i64>,
}

pub(crate) fn parse_remote_attachments(issue: &Value) -> Vec<RemoteAttachment> {
    issue
        .pointer("/issue/attachments")
        .and_then(Value::as_array)
        .map(|attachments| {
            attachments
                .iter()
                .filter_map(|att| {
                    Some(RemoteAttachment {
                        id: att.get("id").and_then(Value::as_i64)?,
                        filename: att.get("filename").and_then(Value::as_str)?.to_string(),
                        filesize: att.get("filesize").and_then(Value::as_i64),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Matches a mapping row against the remote list by filename, confirmed by
/// filesize when both sides know one.
pub(crate) fn match_remote<'a>(
    remote: &'a [RemoteAttachment],
    filename: &str,
    local_size: Option<i64>,
) -> Option<&'a RemoteAttachment> {
    remote.iter().find(|att| {
        att.filename == filename
            && match (att.filesize, local_size) {
                (Some(a), Some(b)) => a == b,
                _ => true,
            }
    })
}

/// Associates all `PENDING_ASSOCIATION` rows of one Jira issue with the
/// Redmine issue that was just created or updated.
pub async fn associate_issue_attachments(
    store: &Store,
    redmine: &RedmineClient,
    jira_issue_id: &str,
    redmine_issue_id: i64,
) -> Result<(), MigrationError> {
    let rows: Vec<_> = store
        .mapping
        .fetch_attachments_for_issue(jira_issue_id)
        .await?
        .into_iter()
        .filter(|row| row.migration_status == MigrationStatus::PendingAssociation)
        .collect();
    if rows.is_empty() {
        return Ok(());
    }

    let issue = redmine.get_issue(redmine_issue_id, "attachments").await?;
    let remote = parse_remote_attachments(&issue);

    for mut row in rows {
        if row.sharepoint_url.is_some() {
            row.migration_status = MigrationStatus::Success;
            row.redmine_issue_id = Some(redmine_issue_id);
            row.notes = None;
            store.mapping.update_attachment(&row).await?;
            continue;
        }

        // Tokens not consumed yet (e.g. a JOURNAL-hinted row during an
        // issue-create association) simply stay pending.
        if row.redmine_upload_token.is_none() {
            continue;
        }

        let filename = row
            .local_filepath
            .as_deref()
            .and_then(|p| Path::new(p).file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| row.jira_attachment_id.clone());

        let local_size = match row.local_filepath.as_deref() {
            Some(path) => tokio::fs::metadata(path).await.ok().map(|m| m.len() as i64),
            None => row.jira_filesize,
        };

        match match_remote(&remote, &filename, local_size) {
            Some(found) => {
                debug!(
                    "Attachment {} associated as Redmine attachment {}",
                    row.jira_attachment_id, found.id
                );
                row.migration_status = MigrationStatus::Success;
                row.redmine_attachment_id = Some(found.id);
                row.redmine_issue_id = Some(redmine_issue_id);
                row.redmine_upload_token = None;
                row.notes = None;
            }
            None => {
                warn!(
                    "Attachment {} not found on Redmine issue {} after push",
                    row.jira_attachment_id, redmine_issue_id
                );
                row.notes = Some(format!(
                    "Upload token consumed but '{}' was not listed on Redmine issue {}.",
                    filename, redmine_issue_id
                ));
            }
        }
        store.mapping.update_attachment(&row).await?;
    }

    info!(
        "Attachment association for Redmine issue {} complete",
        redmine_issue_id
    );
    Ok(())
}
