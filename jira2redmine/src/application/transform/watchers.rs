// /////////////////////////////////////////////////////////////////////////////
// Jira2Redmine Migration RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Watcher Transform
//!
//! Watchers are a pure join: a row is `READY_FOR_PUSH` exactly when both the
//! owning issue and the watching user resolve to ready mapping rows, and
//! `PENDING_ANALYSIS` with a note naming the missing side otherwise. Rows
//! already pushed (`SUCCESS`) are left alone.

use tracing::info;

use jira2redmine_domain::entities::WatcherMapping;
use jira2redmine_domain::value_objects::MigrationStatus;
use jira2redmine_domain::MigrationError;

use crate::application::summary::PhaseSummary;
use crate::application::transform::lookups::DependencyLookups;
use crate::infrastructure::repositories::Store;

/// Computed target state for one watcher row.
fn derive(
    row: &WatcherMapping,
    lookups: &DependencyLookups,
) -> (Option<i64>, Option<i64>, MigrationStatus, Option<String>) {
    let issue = lookups.issues.get(&row.jira_issue_id).copied();
    let user = lookups.users.get(&row.jira_account_id).copied();

    match (issue, user) {
        (Some(issue_id), Some(user_id)) => (Some(issue_id), Some(user_id), MigrationStatus::ReadyForPush, None),
        (None, Some(user_id)) => (
            None,
            Some(user_id),
            MigrationStatus::PendingAnalysis,
            Some(format!(
                "Waiting for issue mapping of {}.",
                row.jira_issue_key.as_deref().unwrap_or(&row.jira_issue_id)
            )),
        ),
        (Some(issue_id), None) => (
            Some(issue_id),
            None,
            MigrationStatus::PendingAnalysis,
            Some(format!("Waiting for user mapping of account {}.", row.jira_account_id)),
        ),
        (None, None) => (
            None,
            None,
            MigrationStatus::PendingAnalysis,
            Some(format!(
                "Waiting for issue mapping of {} and user mapping of account {}.",
                row.jira_issue_key.as_deref().unwrap_or(&row.jira_issue_id),
                row.jira_account_id
            )),
        ),
    }
}

/// Runs the watcher transform over every mapping row.
pub async fn run(store: &Store, summary: &mut PhaseSummary) -> Result<(), MigrationError> {
    let created = store.mapping.sync_watcher_mappings().await?;
    tracing::debug!("Watcher mapping sync inserted {} rows", created);

    let lookups = DependencyLookups::load(&store.mapping).await?;

    for row in store.mapping.fetch_watcher_mappings().await? {
        summary.processed += 1;

        if matches!(row.migration_status, MigrationStatus::Success) {
            summary.skipped += 1;
            continue;
        }

        let (issue_id, user_id, status, notes) = derive(&row, &lookups);
        if status == MigrationStatus::ReadyForPush {
            summary.ready += 1;
        }

        let unchanged = row.redmine_issue_id == issue_id
            && row.redmine_user_id == user_id
            && row.migration_status == status
            && row.notes == notes;
        if unchanged {
            summary.unchanged += 1;
            continue;
        }

        store
            .mapping
            .update_watcher(row.mapping_id, issue_id, user_id, status, notes.as_deref())
            .await?;
    }

    info!("Watcher transform: {}", summary);
    Ok(())
}
