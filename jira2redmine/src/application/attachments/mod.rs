// /////////////////////////////////////////////////////////////////////////////
// Jira2Redmine Migration RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Attachment Pipeline
//!
//! The four-step state machine that moves attachment blobs from Jira to
//! Redmine (or SharePoint):
//!
//! 1. **sync**: scan staged attachments, insert missing mapping rows,
//!    refresh `association_hint` and `jira_filesize`
//! 2. **pull**: stream binaries into the working directory
//!    ([`pull`])
//! 3. **push**: offload big files to SharePoint, upload the rest to
//!    Redmine `uploads.json` ([`upload`])
//! 4. **associate**: confirm tokens against the created issue and mark
//!    rows `SUCCESS` ([`associate`])
//!
//! Valid transitions: `PENDING_DOWNLOAD` → `PENDING_UPLOAD` →
//! `PENDING_ASSOCIATION` → `SUCCESS`, plus any non-success state → `FAILED`,
//! which the transform step requeues to `PENDING_DOWNLOAD`.

pub mod associate;
pub mod pull;
pub mod upload;

use std::collections::HashMap;

use tracing::info;

use jira2redmine_domain::MigrationError;

use crate::application::summary::PhaseSummary;
use crate::application::transform::attachments::derive_hint;
use crate::infrastructure::repositories::Store;

/// Sync step: one mapping row per staged attachment, hint and size fresh.
pub async fn sync_from_staging(store: &Store, summary: &mut PhaseSummary) -> Result<(), MigrationError> {
    let issues: HashMap<String, _> = store
        .staging
        .fetch_jira_issues()
        .await?
        .into_iter()
        .map(|i| (i.jira_issue_id.clone(), i))
        .collect();

    let staged = store.staging.fetch_jira_attachments().await?;
    for attachment in &staged {
        let hint = derive_hint(attachment, issues.get(&attachment.jira_issue_id));
        store
            .mapping
            .upsert_attachment_sync(
                &attachment.jira_attachment_id,
                &attachment.jira_issue_id,
                attachment.filesize,
                hint,
            )
            .await?;
        summary.processed += 1;
    }

    info!("Attachment sync covered {} staged attachments", staged.len());
    Ok(())
}
