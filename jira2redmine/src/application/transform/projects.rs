// /////////////////////////////////////////////////////////////////////////////
// Jira2Redmine Migration RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Project Reconciler
//!
//! Derives a Redmine identifier from each Jira project key and matches it
//! against the Redmine snapshot. Existing projects are adopted as
//! `MATCH_FOUND`; unknown identifiers become `READY_FOR_CREATION` proposals
//! with `is_public = !jira.isPrivate`; underivable keys go to manual
//! intervention.

use std::collections::HashMap;

use tracing::{debug, info};

use jira2redmine_domain::entities::{ProjectAutomatedFields, ProjectMapping, RedmineProjectSnapshot, StagedJiraProject};
use jira2redmine_domain::services::hash_guard;
use jira2redmine_domain::value_objects::{MigrationStatus, ProjectIdentifier};
use jira2redmine_domain::MigrationError;

use crate::application::summary::PhaseSummary;
use crate::infrastructure::repositories::Store;

const TRANSFORMABLE: [MigrationStatus; 3] = [
    MigrationStatus::PendingAnalysis,
    MigrationStatus::ReadyForCreation,
    MigrationStatus::MatchFound,
];

/// Runs the project transform over every mapping row.
pub async fn run(store: &Store, summary: &mut PhaseSummary) -> Result<(), MigrationError> {
    store.mapping.sync_project_mappings().await?;

    let staged: HashMap<String, StagedJiraProject> = store
        .staging
        .fetch_jira_projects()
        .await?
        .into_iter()
        .map(|p| (p.jira_project_id.clone(), p))
        .collect();
    let snapshot: HashMap<String, RedmineProjectSnapshot> = store
        .staging
        .fetch_redmine_projects()
        .await?
        .into_iter()
        .map(|p| (p.identifier.clone(), p))
        .collect();

    for row in store.mapping.fetch_project_mappings().await? {
        summary.processed += 1;

        let current_fields = row.automated_fields();
        let current_hash = hash_guard::compute(&current_fields)?;
        if hash_guard::is_manual_override(row.automation_hash.as_deref(), &current_hash) {
            debug!("Project {} is manually overridden, preserving", row.jira_project_id);
            summary.overrides += 1;
            continue;
        }
        if !TRANSFORMABLE.contains(&row.migration_status) {
            summary.skipped += 1;
            continue;
        }

        let proposal = derive(&row, staged.get(&row.jira_project_id), &snapshot);
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
                .update_project_automated(row.mapping_id, &proposal, new_hash.as_str())
                .await?;
        } else {
            summary.unchanged += 1;
        }
    }

    info!("Project transform: {}", summary);
    Ok(())
}

/// Computes the automated proposal for one project row.
fn derive(
    row: &ProjectMapping,
    staged: Option<&StagedJiraProject>,
    snapshot: &HashMap<String, RedmineProjectSnapshot>,
) -> ProjectAutomatedFields {
    let Some(staged) = staged else {
        return manual(row, "No staged Jira project for this mapping row; re-run the jira phase.");
    };

    let key = staged.project_key.as_deref().unwrap_or("");
    let identifier = match ProjectIdentifier::derive(key) {
        Ok(identifier) => identifier,
        Err(error) => {
            return manual(
                row,
                &format!("Cannot derive a Redmine identifier from key '{}': {}", key, error),
            );
        }
    };

    if let Some(existing) = snapshot.get(identifier.as_str()) {
        // Adopt the existing project wholesale.
        return ProjectAutomatedFields {
            redmine_project_id: Some(existing.redmine_project_id),
            migration_status: MigrationStatus::MatchFound,
            notes: None,
            proposed_identifier: Some(identifier.into_string()),
            proposed_name: existing.name.clone(),
            proposed_description: existing.description.clone(),
            proposed_is_public: existing.is_public,
        };
    }

    ProjectAutomatedFields {
        redmine_project_id: row.redmine_project_id,
        migration_status: MigrationStatus::ReadyForCreation,
        notes: None,
        proposed_identifier: Some(identifier.into_string()),
        proposed_name: staged
            .name
            .clone()
            .or_else(|| staged.project_key.clone()),
        proposed_description: staged.description.clone(),
        proposed_is_public: Some(!staged.is_private.unwrap_or(false)),
    }
}

fn manual(row: &ProjectMapping, note: &str) -> ProjectAutomatedFields {
    ProjectAutomatedFields {
        redmine_project_id: row.redmine_project_id,
        migration_status: MigrationStatus::ManualInterventionRequired,
        notes: Some(note.to_string()),
        proposed_identifier: row.proposed_identifier.clone(),
        proposed_name: row.proposed_name.clone(),
        proposed_description: row.proposed_description.clone(),
        proposed_is_public: row.proposed_is_public,
    }
}
