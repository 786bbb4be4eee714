// /////////////////////////////////////////////////////////////////////////////
// Jira2Redmine Migration RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Watcher Pusher
//!
//! Adds watchers to migrated issues. A Redmine rejection whose body says the
//! user "is already watching" counts as success, so re-running the push
//! after a partial failure converges without duplicate POSTs: rows that
//! reached `SUCCESS` are never ready again.

use tracing::{info, warn};

use jira2redmine_domain::value_objects::MigrationStatus;
use jira2redmine_domain::MigrationError;

use crate::application::summary::PhaseSummary;
use crate::infrastructure::clients::{RedmineClient, WatcherOutcome};
use crate::infrastructure::repositories::Store;

/// Runs the watcher push over all ready rows.
pub async fn run(
    store: &Store,
    redmine: &RedmineClient,
    dry_run: bool,
    summary: &mut PhaseSummary,
) -> Result<(), MigrationError> {
    for row in store.mapping.fetch_ready_watchers().await? {
        summary.processed += 1;

        let (Some(issue_id), Some(user_id)) = (row.redmine_issue_id, row.redmine_user_id) else {
            summary.skipped += 1;
            continue;
        };

        if dry_run {
            info!(target: "dry_run", "Would POST /issues/{}/watchers.json with user {}", issue_id, user_id);
            summary.previewed += 1;
            continue;
        }

        match redmine.add_watcher(issue_id, user_id).await {
            Ok(WatcherOutcome::Added) => {
                store
                    .mapping
                    .update_watcher(
                        row.mapping_id,
                        Some(issue_id),
                        Some(user_id),
                        MigrationStatus::Success,
                        None,
                    )
                    .await?;
                summary.succeeded += 1;
            }
            Ok(WatcherOutcome::AlreadyWatching) => {
                store
                    .mapping
                    .update_watcher(
                        row.mapping_id,
                        Some(issue_id),
                        Some(user_id),
                        MigrationStatus::Success,
                        Some("Watcher already present."),
                    )
                    .await?;
                summary.succeeded += 1;
            }
            Err(error) => {
                warn!(
                    "Watcher push for issue {} / user {} failed: {}",
                    issue_id, user_id, error
                );
                store
                    .mapping
                    .update_watcher(
                        row.mapping_id,
                        Some(issue_id),
                        Some(user_id),
                        MigrationStatus::Failed,
                        Some(&error.message),
                    )
                    .await?;
                summary.failed += 1;
            }
        }
    }

    info!("Watcher push: {}", summary);
    Ok(())
}
