// /////////////////////////////////////////////////////////////////////////////
// Jira2Redmine Migration RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Project Pusher
//!
//! Creates Redmine projects for `READY_FOR_CREATION` rows. 201 records the
//! new project id as `CREATION_SUCCESS`; any other response becomes
//! `CREATION_FAILED` with the parsed error in `notes`.

use serde_json::json;
use tracing::{info, warn};

use jira2redmine_domain::services::hash_guard;
use jira2redmine_domain::value_objects::MigrationStatus;
use jira2redmine_domain::MigrationError;

use crate::application::summary::PhaseSummary;
use crate::infrastructure::clients::RedmineClient;
use crate::infrastructure::repositories::Store;

/// Runs the project push over all ready rows.
pub async fn run(
    store: &Store,
    redmine: &RedmineClient,
    dry_run: bool,
    summary: &mut PhaseSummary,
) -> Result<(), MigrationError> {
    for row in store.mapping.fetch_ready_projects().await? {
        summary.processed += 1;
        let mut fields = row.automated_fields();

        let (Some(name), Some(identifier)) = (fields.proposed_name.clone(), fields.proposed_identifier.clone())
        else {
            fields.migration_status = MigrationStatus::ManualInterventionRequired;
            fields.notes = Some("Cannot create a project without proposed_name and proposed_identifier.".into());
            let hash = hash_guard::compute(&fields)?;
            store
                .mapping
                .update_project_automated(row.mapping_id, &fields, hash.as_str())
                .await?;
            summary.manual += 1;
            continue;
        };

        let payload = json!({
            "project": {
                "name": name,
                "identifier": identifier,
                "description": fields.proposed_description,
                "is_public": fields.proposed_is_public.unwrap_or(true),
            }
        });

        if dry_run {
            info!(target: "dry_run", "Would POST /projects.json: {}", payload);
            summary.previewed += 1;
            continue;
        }

        match redmine.create_project(&payload).await {
            Ok(created) => {
                let id = created.pointer("/project/id").and_then(serde_json::Value::as_i64);
                fields.redmine_project_id = id;
                fields.migration_status = MigrationStatus::CreationSuccess;
                fields.notes = None;
                info!("Created Redmine project {} for {}", id.unwrap_or(-1), row.jira_project_id);
                summary.succeeded += 1;
            }
            Err(error) => {
                warn!("Project creation for {} failed: {}", row.jira_project_id, error);
                fields.migration_status = MigrationStatus::CreationFailed;
                fields.notes = Some(error.message);
                summary.failed += 1;
            }
        }

        let hash = hash_guard::compute(&fields)?;
        store
            .mapping
            .update_project_automated(row.mapping_id, &fields, hash.as_str())
            .await?;
    }

    info!("Project push: {}", summary);
    Ok(())
}
