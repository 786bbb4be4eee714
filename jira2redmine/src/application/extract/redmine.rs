// /////////////////////////////////////////////////////////////////////////////
// Jira2Redmine Migration RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Redmine Snapshots
//!
//! Truncate-and-reload snapshots of Redmine projects and users, used by the
//! transform phase to match existing objects. The user snapshot needs the
//! per-user detail call because the list endpoint omits `mail` for non-admin
//! keys; a user detail without `mail` is a fatal error for the snapshot.
//!
//! Trackers, statuses and priorities are deliberately NOT snapshotted:
//! those mapping decisions live in operator-maintained lookup tables.

use serde_json::Value;
use tracing::info;

use jira2redmine_domain::entities::{RedmineProjectSnapshot, RedmineUserSnapshot};
use jira2redmine_domain::MigrationError;

use crate::application::summary::PhaseSummary;
use crate::infrastructure::clients::RedmineClient;
use crate::infrastructure::repositories::Store;

const PAGE_LIMIT: usize = 100;

fn value_as_bool(value: Option<&Value>) -> Option<bool> {
    match value? {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|v| v != 0),
        _ => None,
    }
}

/// Snapshots all Redmine projects into staging.
pub async fn snapshot_projects(
    redmine: &RedmineClient,
    store: &Store,
    summary: &mut PhaseSummary,
) -> Result<(), MigrationError> {
    let mut all = Vec::new();
    let mut offset = 0usize;
    loop {
        let page = redmine.list_projects(offset, PAGE_LIMIT).await?;
        let projects = page
            .get("projects")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let fetched = projects.len();

        for project in &projects {
            let Some(id) = project.get("id").and_then(Value::as_i64) else {
                continue;
            };
            let Some(identifier) = project.get("identifier").and_then(Value::as_str) else {
                continue;
            };
            all.push(RedmineProjectSnapshot {
                redmine_project_id: id,
                identifier: identifier.to_string(),
                name: project.get("name").and_then(Value::as_str).map(String::from),
                description: project.get("description").and_then(Value::as_str).map(String::from),
                is_public: value_as_bool(project.get("is_public")),
                raw_payload: project.clone(),
            });
        }

        let total = page.get("total_count").and_then(Value::as_u64).unwrap_or(0) as usize;
        offset += fetched;
        if fetched == 0 || offset >= total {
            break;
        }
    }

    summary.processed += all.len() as u64;
    store.staging.replace_redmine_projects(&all).await?;
    info!("Snapshotted {} Redmine projects", all.len());
    Ok(())
}

/// Snapshots all Redmine users into staging, one detail call per user to
/// capture `mail` and `status`.
pub async fn snapshot_users(
    redmine: &RedmineClient,
    store: &Store,
    summary: &mut PhaseSummary,
) -> Result<(), MigrationError> {
    let mut ids = Vec::new();
    let mut offset = 0usize;
    loop {
        let page = redmine.list_users(offset, PAGE_LIMIT).await?;
        let users = page
            .get("users")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let fetched = users.len();
        ids.extend(users.iter().filter_map(|u| u.get("id").and_then(Value::as_i64)));

        let total = page.get("total_count").and_then(Value::as_u64).unwrap_or(0) as usize;
        offset += fetched;
        if fetched == 0 || offset >= total {
            break;
        }
    }

    let mut all = Vec::with_capacity(ids.len());
    for id in ids {
        let detail = redmine.get_user(id).await?;
        let user = detail.get("user").cloned().unwrap_or(Value::Null);

        let mail = user.get("mail").and_then(Value::as_str).map(String::from);
        if mail.is_none() {
            // The snapshot is unusable for matching without addresses; this
            // means the API key lacks admin rights.
            return Err(MigrationError::RedmineApiError(format!(
                "Redmine user {} has no mail in the API response; an admin API key is required",
                id
            )));
        }

        all.push(RedmineUserSnapshot {
            redmine_user_id: id,
            login: user.get("login").and_then(Value::as_str).map(String::from),
            mail,
            firstname: user.get("firstname").and_then(Value::as_str).map(String::from),
            lastname: user.get("lastname").and_then(Value::as_str).map(String::from),
            status: user.get("status").and_then(Value::as_i64),
            raw_payload: user.clone(),
        });
    }

    summary.processed += all.len() as u64;
    store.staging.replace_redmine_users(&all).await?;
    info!("Snapshotted {} Redmine users", all.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_is_public_canonicalization() {
        assert_eq!(value_as_bool(Some(&json!(true))), Some(true));
        assert_eq!(value_as_bool(Some(&json!(1))), Some(true));
        assert_eq!(value_as_bool(Some(&json!(0))), Some(false));
        assert_eq!(value_as_bool(Some(&json!("1"))), None);
        assert_eq!(value_as_bool(None), None);
    }
}
