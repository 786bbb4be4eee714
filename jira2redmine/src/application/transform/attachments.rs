// /////////////////////////////////////////////////////////////////////////////
// Jira2Redmine Migration RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Attachment Transform
//!
//! Attachments carry no automation hash; their transform step maintains the
//! pipeline state machine instead:
//!
//! - `FAILED` rows are requeued to `PENDING_DOWNLOAD` with their transient
//!   fields (local path, upload token, notes) cleared, and
//! - the `association_hint` and `jira_filesize` are refreshed from staging
//!   by comparing the attachment and issue creation timestamps (≤ 60 s
//!   apart means the attachment rides on the issue-create call).

use std::collections::HashMap;

use tracing::{debug, info};

use jira2redmine_domain::entities::{StagedJiraAttachment, StagedJiraIssue};
use jira2redmine_domain::services::datetime;
use jira2redmine_domain::value_objects::{AssociationHint, MigrationStatus};
use jira2redmine_domain::MigrationError;

use crate::application::summary::PhaseSummary;
use crate::infrastructure::repositories::Store;

/// Derives the association hint from staged timestamps. Defaults to
/// `JOURNAL` when either timestamp is missing or unparseable: attaching too
/// late is recoverable, attaching at creation with a wrong token is not.
pub(crate) fn derive_hint(
    attachment: &StagedJiraAttachment,
    issue: Option<&StagedJiraIssue>,
) -> AssociationHint {
    let attachment_created = attachment.created.as_deref().and_then(|c| datetime::parse_jira_timestamp(c).ok());
    let issue_created = issue
        .and_then(|i| i.created.as_deref())
        .and_then(|c| datetime::parse_jira_timestamp(c).ok());

    match (attachment_created, issue_created) {
        (Some(att), Some(iss)) => AssociationHint::from_timestamps(att, iss),
        _ => AssociationHint::Journal,
    }
}

/// Runs the attachment transform: requeue failures, refresh hints.
pub async fn run(store: &Store, summary: &mut PhaseSummary) -> Result<(), MigrationError> {
    let staged: HashMap<String, StagedJiraAttachment> = store
        .staging
        .fetch_jira_attachments()
        .await?
        .into_iter()
        .map(|a| (a.jira_attachment_id.clone(), a))
        .collect();
    let issues: HashMap<String, StagedJiraIssue> = store
        .staging
        .fetch_jira_issues()
        .await?
        .into_iter()
        .map(|i| (i.jira_issue_id.clone(), i))
        .collect();

    for mut row in store.mapping.fetch_attachment_mappings().await? {
        summary.processed += 1;

        let transformable = matches!(
            row.migration_status,
            MigrationStatus::PendingDownload | MigrationStatus::Failed
        );
        if !transformable {
            summary.skipped += 1;
            continue;
        }

        let source = staged.get(&row.jira_attachment_id);
        let hint = source.map(|att| derive_hint(att, issues.get(&att.jira_issue_id)));
        let filesize = source.and_then(|att| att.filesize);

        let mut changed = false;
        if row.migration_status == MigrationStatus::Failed {
            debug!(
                "Requeueing failed attachment {} for download",
                row.jira_attachment_id
            );
            row.migration_status = MigrationStatus::PendingDownload;
            row.local_filepath = None;
            row.redmine_upload_token = None;
            row.notes = None;
            summary.ready += 1;
            changed = true;
        }
        if let Some(hint) = hint {
            if row.association_hint != Some(hint) {
                row.association_hint = Some(hint);
                changed = true;
            }
        }
        if filesize.is_some() && row.jira_filesize != filesize {
            row.jira_filesize = filesize;
            changed = true;
        }

        if changed {
            store.mapping.update_attachment(&row).await?;
        } else {
            summary.unchanged += 1;
        }
    }

    info!("Attachment transform: {}", summary);
    Ok(())
}
