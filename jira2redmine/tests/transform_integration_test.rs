// /////////////////////////////////////////////////////////////////////////////
// Jira2Redmine Migration RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Transform-phase integration tests against a real (temporary) SQLite
//! mapping database: matching scenarios, dependency resolution, manual
//! override preservation and transform idempotence.

use serde_json::json;
use sqlx::SqlitePool;

use jira2redmine::application::summary::PhaseSummary;
use jira2redmine::application::transform;
use jira2redmine::infrastructure::config::{DefaultsConfig, NewUserStatus};
use jira2redmine::infrastructure::repositories::{schema, Store};
use jira2redmine_domain::entities::{
    RedmineProjectSnapshot, RedmineUserSnapshot, StagedJiraIssue, StagedJiraProject, StagedJiraUser,
};
use jira2redmine_domain::value_objects::{AutomationHash, MatchType, MigrationStatus};

async fn init_store() -> (Store, SqlitePool) {
    let temp = tempfile::NamedTempFile::new().unwrap();
    let url = format!("sqlite://{}", temp.path().to_str().unwrap());
    std::mem::forget(temp);
    let pool = schema::initialize_database(&url).await.unwrap();
    (Store::new(pool.clone()), pool)
}

fn jira_project(id: &str, key: &str) -> StagedJiraProject {
    StagedJiraProject {
        jira_project_id: id.to_string(),
        project_key: Some(key.to_string()),
        name: Some(format!("{} name", key)),
        description: None,
        lead_account_id: None,
        is_private: Some(false),
        raw_payload: json!({"id": id, "key": key}),
    }
}

fn jira_user(account: &str, email: &str, display: &str) -> StagedJiraUser {
    StagedJiraUser {
        jira_account_id: account.to_string(),
        email_address: Some(email.to_string()),
        display_name: Some(display.to_string()),
        active: Some(true),
        account_type: Some("atlassian".into()),
        raw_payload: json!({"accountId": account}),
    }
}

fn jira_issue(id: &str, key: &str) -> StagedJiraIssue {
    StagedJiraIssue {
        jira_issue_id: id.to_string(),
        jira_issue_key: Some(key.to_string()),
        jira_project_id: Some("10001".into()),
        jira_issue_type_id: Some("10002".into()),
        jira_status_id: Some("3".into()),
        jira_status_category: Some("done".into()),
        jira_priority_id: Some("2".into()),
        jira_reporter_account_id: Some("a1".into()),
        jira_assignee_account_id: None,
        jira_parent_issue_id: None,
        jira_security_level_id: None,
        summary: Some("Ship it".into()),
        created: Some("2024-04-20T09:00:00.000+0200".into()),
        updated: None,
        due_date: Some("2024-05-01".into()),
        time_original_estimate: Some(7200),
        raw_payload: json!({"fields": {}}),
    }
}

async fn seed_lookup_tables(pool: &SqlitePool) {
    sqlx::query(
        "INSERT INTO migration_mapping_trackers (jira_issue_type_id, redmine_tracker_id, migration_status) \
         VALUES ('10002', 2, 'MATCH_FOUND')",
    )
    .execute(pool)
    .await
    .unwrap();
    sqlx::query(
        "INSERT INTO migration_mapping_statuses (jira_status_id, redmine_status_id, migration_status) \
         VALUES ('3', 5, 'MATCH_FOUND')",
    )
    .execute(pool)
    .await
    .unwrap();
    sqlx::query(
        "INSERT INTO migration_mapping_priorities (jira_priority_id, redmine_priority_id, migration_status) \
         VALUES ('2', 4, 'MATCH_FOUND')",
    )
    .execute(pool)
    .await
    .unwrap();
}

/// Marks the project and user mappings ready so issues can resolve them.
async fn make_project_and_user_ready(store: &Store) {
    transform::projects::run(store, &mut PhaseSummary::new()).await.unwrap();
    let project = store.mapping.fetch_project_mappings().await.unwrap().remove(0);
    let mut fields = project.automated_fields();
    fields.redmine_project_id = Some(1);
    fields.migration_status = MigrationStatus::CreationSuccess;
    let hash = jira2redmine_domain::services::hash_guard::compute(&fields).unwrap();
    store
        .mapping
        .update_project_automated(project.mapping_id, &fields, hash.as_str())
        .await
        .unwrap();

    transform::users::run(store, NewUserStatus::Locked, &mut PhaseSummary::new())
        .await
        .unwrap();
    let user = store.mapping.fetch_user_mappings().await.unwrap().remove(0);
    let mut fields = user.automated_fields();
    fields.redmine_user_id = Some(5);
    fields.migration_status = MigrationStatus::CreationSuccess;
    let hash = jira2redmine_domain::services::hash_guard::compute(&fields).unwrap();
    store
        .mapping
        .update_user_automated(user.mapping_id, &fields, user.match_type, None, None, hash.as_str())
        .await
        .unwrap();
}

#[tokio::test]
async fn project_match_scenario() {
    let (store, _pool) = init_store().await;

    store
        .staging
        .upsert_jira_projects(&[jira_project("10001", "PROJ")])
        .await
        .unwrap();
    store
        .staging
        .replace_redmine_projects(&[RedmineProjectSnapshot {
            redmine_project_id: 7,
            identifier: "proj".into(),
            name: Some("Project".into()),
            description: None,
            is_public: Some(true),
            raw_payload: json!({}),
        }])
        .await
        .unwrap();

    let mut summary = PhaseSummary::new();
    transform::projects::run(&store, &mut summary).await.unwrap();

    let row = store.mapping.fetch_project_mappings().await.unwrap().remove(0);
    assert_eq!(row.migration_status, MigrationStatus::MatchFound);
    assert_eq!(row.redmine_project_id, Some(7));
    assert_eq!(row.proposed_identifier.as_deref(), Some("proj"));
    assert!(AutomationHash::is_well_formed(row.automation_hash.as_deref().unwrap()));
    assert_eq!(summary.matched, 1);
}

#[tokio::test]
async fn user_matched_by_login() {
    let (store, _pool) = init_store().await;

    store
        .staging
        .upsert_jira_users(&[jira_user("a1", "alice@example.com", "Alice Smith")])
        .await
        .unwrap();
    store
        .staging
        .replace_redmine_users(&[RedmineUserSnapshot {
            redmine_user_id: 42,
            login: Some("alice@example.com".into()),
            mail: Some("alice@example.com".into()),
            firstname: Some("Alice".into()),
            lastname: Some("Smith".into()),
            status: Some(1),
            raw_payload: json!({}),
        }])
        .await
        .unwrap();

    transform::users::run(&store, NewUserStatus::Locked, &mut PhaseSummary::new())
        .await
        .unwrap();

    let row = store.mapping.fetch_user_mappings().await.unwrap().remove(0);
    assert_eq!(row.migration_status, MigrationStatus::MatchFound);
    assert_eq!(row.match_type, Some(MatchType::Login));
    assert_eq!(row.redmine_user_id, Some(42));
    assert_eq!(row.proposed_redmine_status.as_deref(), Some("ACTIVE"));
}

#[tokio::test]
async fn issue_with_resolved_dependencies_is_ready() {
    let (store, pool) = init_store().await;
    seed_lookup_tables(&pool).await;

    store
        .staging
        .upsert_jira_projects(&[jira_project("10001", "PROJ")])
        .await
        .unwrap();
    store
        .staging
        .upsert_jira_users(&[jira_user("a1", "alice@example.com", "Alice Smith")])
        .await
        .unwrap();
    store.staging.upsert_jira_issues(&[jira_issue("20001", "PROJ-1")]).await.unwrap();
    make_project_and_user_ready(&store).await;

    let mut summary = PhaseSummary::new();
    transform::issues::run(&store, &DefaultsConfig::default(), &mut summary)
        .await
        .unwrap();

    let row = store.mapping.fetch_issue_mappings().await.unwrap().remove(0);
    assert_eq!(row.migration_status, MigrationStatus::ReadyForCreation);
    assert_eq!(row.redmine_project_id, Some(1));
    assert_eq!(row.redmine_tracker_id, Some(2));
    assert_eq!(row.redmine_status_id, Some(5));
    assert_eq!(row.redmine_priority_id, Some(4));
    assert_eq!(row.redmine_author_id, Some(5));
    assert_eq!(row.proposed_due_date.as_deref(), Some("2024-05-01"));
    assert_eq!(row.proposed_estimated_hours, Some(2.0));
    assert_eq!(row.proposed_done_ratio, Some(100));
    assert_eq!(summary.ready, 1);
}

#[tokio::test]
async fn issue_with_unresolved_tracker_goes_manual() {
    let (store, _pool) = init_store().await;

    store
        .staging
        .upsert_jira_projects(&[jira_project("10001", "PROJ")])
        .await
        .unwrap();
    store
        .staging
        .upsert_jira_users(&[jira_user("a1", "alice@example.com", "Alice Smith")])
        .await
        .unwrap();
    store.staging.upsert_jira_issues(&[jira_issue("20001", "PROJ-1")]).await.unwrap();
    make_project_and_user_ready(&store).await;

    // No lookup tables seeded: tracker, status and priority cannot resolve.
    transform::issues::run(&store, &DefaultsConfig::default(), &mut PhaseSummary::new())
        .await
        .unwrap();

    let row = store.mapping.fetch_issue_mappings().await.unwrap().remove(0);
    assert_eq!(row.migration_status, MigrationStatus::ManualInterventionRequired);
    let notes = row.notes.unwrap();
    assert!(notes.contains("tracker (10002)"));
    assert!(notes.contains("status (3)"));
    assert!(notes.contains("priority (2)"));
}

#[tokio::test]
async fn manual_override_is_preserved() {
    let (store, pool) = init_store().await;

    store
        .staging
        .upsert_jira_projects(&[jira_project("10001", "PROJ")])
        .await
        .unwrap();
    transform::projects::run(&store, &mut PhaseSummary::new()).await.unwrap();

    // Operator edits a proposed field directly, leaving the hash untouched.
    sqlx::query("UPDATE migration_mapping_projects SET proposed_name = 'Operator Name'")
        .execute(&pool)
        .await
        .unwrap();

    let mut summary = PhaseSummary::new();
    transform::projects::run(&store, &mut summary).await.unwrap();

    assert_eq!(summary.overrides, 1);
    let row = store.mapping.fetch_project_mappings().await.unwrap().remove(0);
    assert_eq!(row.proposed_name.as_deref(), Some("Operator Name"));
}

#[tokio::test]
async fn transform_is_idempotent() {
    let (store, pool) = init_store().await;
    seed_lookup_tables(&pool).await;

    store
        .staging
        .upsert_jira_projects(&[jira_project("10001", "PROJ")])
        .await
        .unwrap();
    store
        .staging
        .upsert_jira_users(&[jira_user("a1", "alice@example.com", "Alice Smith")])
        .await
        .unwrap();
    store.staging.upsert_jira_issues(&[jira_issue("20001", "PROJ-1")]).await.unwrap();
    make_project_and_user_ready(&store).await;

    let defaults = DefaultsConfig::default();
    transform::issues::run(&store, &defaults, &mut PhaseSummary::new()).await.unwrap();

    let projects_first = store.mapping.fetch_project_mappings().await.unwrap();
    let users_first = store.mapping.fetch_user_mappings().await.unwrap();
    let issues_first = store.mapping.fetch_issue_mappings().await.unwrap();

    // Second pass over identical state must not change a single row.
    let mut summary = PhaseSummary::new();
    transform::projects::run(&store, &mut summary).await.unwrap();
    transform::users::run(&store, NewUserStatus::Locked, &mut summary).await.unwrap();
    transform::issues::run(&store, &defaults, &mut summary).await.unwrap();

    assert_eq!(store.mapping.fetch_project_mappings().await.unwrap(), projects_first);
    assert_eq!(store.mapping.fetch_user_mappings().await.unwrap(), users_first);
    assert_eq!(store.mapping.fetch_issue_mappings().await.unwrap(), issues_first);
}
