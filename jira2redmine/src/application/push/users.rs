// /////////////////////////////////////////////////////////////////////////////
// Jira2Redmine Migration RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # User Pusher
//!
//! Creates Redmine accounts for `READY_FOR_CREATION` rows. Accounts are
//! created with a generated password that must be changed at first login;
//! the proposed status string maps to Redmine's numeric status (1 = ACTIVE,
//! 3 = LOCKED).

use serde_json::json;
use tracing::{info, warn};

use jira2redmine_domain::services::hash_guard;
use jira2redmine_domain::value_objects::MigrationStatus;
use jira2redmine_domain::MigrationError;

use crate::application::summary::PhaseSummary;
use crate::infrastructure::clients::RedmineClient;
use crate::infrastructure::config::DefaultsConfig;
use crate::infrastructure::repositories::Store;

fn redmine_status(proposed: Option<&str>) -> i64 {
    match proposed {
        Some("ACTIVE") => 1,
        _ => 3,
    }
}

/// Runs the user push over all ready rows.
pub async fn run(
    store: &Store,
    redmine: &RedmineClient,
    defaults: &DefaultsConfig,
    dry_run: bool,
    summary: &mut PhaseSummary,
) -> Result<(), MigrationError> {
    for row in store.mapping.fetch_ready_users().await? {
        summary.processed += 1;
        let mut fields = row.automated_fields();

        let (Some(login), Some(mail), Some(firstname), Some(lastname)) = (
            fields.proposed_redmine_login.clone(),
            fields.proposed_redmine_mail.clone(),
            fields.proposed_firstname.clone(),
            fields.proposed_lastname.clone(),
        ) else {
            fields.migration_status = MigrationStatus::ManualInterventionRequired;
            fields.notes = Some("Cannot create a user without login, mail, firstname and lastname.".into());
            let hash = hash_guard::compute(&fields)?;
            store
                .mapping
                .update_user_automated(
                    row.mapping_id,
                    &fields,
                    row.match_type,
                    row.jira_display_name.as_deref(),
                    row.jira_email_address.as_deref(),
                    hash.as_str(),
                )
                .await?;
            summary.manual += 1;
            continue;
        };

        let mut user = json!({
            "login": login,
            "firstname": firstname,
            "lastname": lastname,
            "mail": mail,
            "generate_password": true,
            "must_change_passwd": true,
            "status": redmine_status(fields.proposed_redmine_status.as_deref()),
        });
        if let Some(auth_source) = defaults.auth_source_id {
            user["auth_source_id"] = json!(auth_source);
        }
        let payload = json!({ "user": user });

        if dry_run {
            info!(target: "dry_run", "Would POST /users.json: {}", payload);
            summary.previewed += 1;
            continue;
        }

        match redmine.create_user(&payload).await {
            Ok(created) => {
                let id = created.pointer("/user/id").and_then(serde_json::Value::as_i64);
                fields.redmine_user_id = id;
                fields.migration_status = MigrationStatus::CreationSuccess;
                fields.notes = None;
                info!("Created Redmine user {} for {}", id.unwrap_or(-1), row.jira_account_id);
                summary.succeeded += 1;
            }
            Err(error) => {
                warn!("User creation for {} failed: {}", row.jira_account_id, error);
                fields.migration_status = MigrationStatus::CreationFailed;
                fields.notes = Some(error.message);
                summary.failed += 1;
            }
        }

        let hash = hash_guard::compute(&fields)?;
        store
            .mapping
            .update_user_automated(
                row.mapping_id,
                &fields,
                row.match_type,
                row.jira_display_name.as_deref(),
                row.jira_email_address.as_deref(),
                hash.as_str(),
            )
            .await?;
    }

    info!("User push: {}", summary);
    Ok(())
}
