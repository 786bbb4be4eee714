// /////////////////////////////////////////////////////////////////////////////
// Jira2Redmine Migration RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Subtask Link Pusher
//!
//! Closes parent links left open during issue creation: parents created
//! after their children in the same run (or in a later run) are linked here
//! with a `parent_issue_id` update on the child. Only children whose stored
//! parent differs are touched, so a converged tree is a no-op.

use serde_json::json;
use tracing::{info, warn};

use jira2redmine_domain::services::hash_guard;
use jira2redmine_domain::MigrationError;

use crate::application::summary::PhaseSummary;
use crate::infrastructure::clients::RedmineClient;
use crate::infrastructure::repositories::Store;

/// Runs the subtask linking pass over all migrated children.
pub async fn run(
    store: &Store,
    redmine: &RedmineClient,
    dry_run: bool,
    summary: &mut PhaseSummary,
) -> Result<(), MigrationError> {
    for row in store.mapping.fetch_issue_mappings().await? {
        let (Some(jira_parent), Some(child_id)) =
            (row.jira_parent_issue_id.as_deref(), row.redmine_issue_id)
        else {
            continue;
        };
        if !row.migration_status.requires_redmine_id() {
            continue;
        }
        summary.processed += 1;

        let Some(parent_id) = store.mapping.resolve_parent_issue_id(jira_parent).await? else {
            summary.skipped += 1;
            continue;
        };
        if row.redmine_parent_issue_id == Some(parent_id) {
            summary.unchanged += 1;
            continue;
        }

        if dry_run {
            info!(target: "dry_run", "Would set parent of issue {} to {}", child_id, parent_id);
            summary.previewed += 1;
            continue;
        }

        let payload = json!({ "issue": { "parent_issue_id": parent_id } });
        let mut fields = row.automated_fields();
        match redmine.update_issue(child_id, &payload).await {
            Ok(()) => {
                fields.redmine_parent_issue_id = Some(parent_id);
                fields.notes = None;
                summary.succeeded += 1;
            }
            Err(error) => {
                warn!("Parent link for issue {} failed: {}", child_id, error);
                fields.notes = Some(error.message);
                summary.failed += 1;
            }
        }
        let hash = hash_guard::compute(&fields)?;
        store
            .mapping
            .update_issue_automated(row.mapping_id, &fields, hash.as_str())
            .await?;
    }

    info!("Subtask link push: {}", summary);
    Ok(())
}
