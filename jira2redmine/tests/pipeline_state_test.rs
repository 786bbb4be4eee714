// /////////////////////////////////////////////////////////////////////////////
// Jira2Redmine Migration RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! State-machine integration tests for the attachment pipeline, journal and
//! watcher transforms against a temporary SQLite mapping database.

use serde_json::json;
use sqlx::SqlitePool;

use jira2redmine::application::summary::PhaseSummary;
use jira2redmine::application::{attachments, transform};
use jira2redmine::infrastructure::repositories::{schema, Store};
use jira2redmine_domain::entities::{
    StagedJiraAttachment, StagedJiraComment, StagedJiraIssue, StagedJiraUser, StagedJiraWatcher,
};
use jira2redmine_domain::services::hash_guard;
use jira2redmine_domain::value_objects::{AssociationHint, MigrationStatus};

async fn init_store() -> (Store, SqlitePool) {
    let temp = tempfile::NamedTempFile::new().unwrap();
    let url = format!("sqlite://{}", temp.path().to_str().unwrap());
    std::mem::forget(temp);
    let pool = schema::initialize_database(&url).await.unwrap();
    (Store::new(pool.clone()), pool)
}

fn issue(id: &str, created: &str) -> StagedJiraIssue {
    StagedJiraIssue {
        jira_issue_id: id.to_string(),
        jira_issue_key: Some(format!("PROJ-{}", id)),
        jira_project_id: Some("10001".into()),
        jira_issue_type_id: None,
        jira_status_id: None,
        jira_status_category: None,
        jira_priority_id: None,
        jira_reporter_account_id: None,
        jira_assignee_account_id: None,
        jira_parent_issue_id: None,
        jira_security_level_id: None,
        summary: Some("Issue".into()),
        created: Some(created.to_string()),
        updated: None,
        due_date: None,
        time_original_estimate: None,
        raw_payload: json!({}),
    }
}

fn attachment(id: &str, issue_id: &str, created: &str) -> StagedJiraAttachment {
    StagedJiraAttachment {
        jira_attachment_id: id.to_string(),
        jira_issue_id: issue_id.to_string(),
        filename: Some("shot.png".into()),
        filesize: Some(2048),
        mime_type: Some("image/png".into()),
        content_url: Some("https://x.atlassian.net/rest/api/3/attachment/content/900".into()),
        author_account_id: None,
        created: Some(created.to_string()),
        raw_payload: json!({}),
    }
}

/// Marks the issue mapping ready with the given Redmine id.
async fn make_issue_ready(store: &Store, redmine_id: i64) {
    store.mapping.sync_issue_mappings().await.unwrap();
    let row = store.mapping.fetch_issue_mappings().await.unwrap().remove(0);
    let mut fields = row.automated_fields();
    fields.redmine_issue_id = Some(redmine_id);
    fields.migration_status = MigrationStatus::CreationSuccess;
    let hash = hash_guard::compute(&fields).unwrap();
    store
        .mapping
        .update_issue_automated(row.mapping_id, &fields, hash.as_str())
        .await
        .unwrap();
}

#[tokio::test]
async fn attachment_sync_derives_hints() {
    let (store, _pool) = init_store().await;

    store
        .staging
        .upsert_jira_issues(&[issue("10", "2024-05-01T10:00:00.000+0200")])
        .await
        .unwrap();
    store
        .staging
        .upsert_jira_attachments(&[
            attachment("900", "10", "2024-05-01T10:00:30.000+0200"),
            attachment("901", "10", "2024-05-01T12:00:00.000+0200"),
        ])
        .await
        .unwrap();

    attachments::sync_from_staging(&store, &mut PhaseSummary::new()).await.unwrap();

    let rows = store.mapping.fetch_attachment_mappings().await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].migration_status, MigrationStatus::PendingDownload);
    assert_eq!(rows[0].association_hint, Some(AssociationHint::Issue));
    assert_eq!(rows[1].association_hint, Some(AssociationHint::Journal));
    assert_eq!(rows[0].jira_filesize, Some(2048));
}

#[tokio::test]
async fn failed_attachment_is_requeued_by_transform() {
    let (store, _pool) = init_store().await;

    store
        .staging
        .upsert_jira_issues(&[issue("10", "2024-05-01T10:00:00.000+0200")])
        .await
        .unwrap();
    store
        .staging
        .upsert_jira_attachments(&[attachment("900", "10", "2024-05-01T10:00:30.000+0200")])
        .await
        .unwrap();
    attachments::sync_from_staging(&store, &mut PhaseSummary::new()).await.unwrap();

    // Simulate a failed download.
    let mut row = store.mapping.fetch_attachment_mappings().await.unwrap().remove(0);
    row.migration_status = MigrationStatus::Failed;
    row.local_filepath = Some("/tmp/partial".into());
    row.notes = Some("connection reset".into());
    store.mapping.update_attachment(&row).await.unwrap();

    let mut summary = PhaseSummary::new();
    transform::attachments::run(&store, &mut summary).await.unwrap();

    let row = store.mapping.fetch_attachment_mappings().await.unwrap().remove(0);
    assert_eq!(row.migration_status, MigrationStatus::PendingDownload);
    assert_eq!(row.local_filepath, None);
    assert_eq!(row.redmine_upload_token, None);
    assert_eq!(row.notes, None);
    assert_eq!(summary.ready, 1);
}

#[tokio::test]
async fn journal_rows_wait_for_their_issue() {
    let (store, _pool) = init_store().await;

    store
        .staging
        .upsert_jira_issues(&[issue("10", "2024-05-01T10:00:00.000+0200")])
        .await
        .unwrap();
    store
        .staging
        .upsert_jira_comments(&[StagedJiraComment {
            jira_comment_id: "100".into(),
            jira_issue_id: "10".into(),
            author_account_id: None,
            created: Some("2024-05-01T11:00:00.000+0200".into()),
            updated: None,
            rendered_body: Some("<p>first comment</p>".into()),
            raw_payload: json!({}),
        }])
        .await
        .unwrap();

    transform::journals::run(&store, &mut PhaseSummary::new()).await.unwrap();
    let row = store.mapping.fetch_journal_mappings().await.unwrap().remove(0);
    assert_eq!(row.migration_status, MigrationStatus::Pending);
    assert_eq!(row.proposed_notes.as_deref(), Some("first comment"));
    assert_eq!(row.proposed_created_on.as_deref(), Some("2024-05-01T09:00:00Z"));

    // Once the issue is mapped, the journal becomes pushable.
    make_issue_ready(&store, 123).await;
    transform::journals::run(&store, &mut PhaseSummary::new()).await.unwrap();
    let row = store.mapping.fetch_journal_mappings().await.unwrap().remove(0);
    assert_eq!(row.migration_status, MigrationStatus::ReadyForPush);
}

#[tokio::test]
async fn watcher_join_readies_when_both_sides_map() {
    let (store, _pool) = init_store().await;

    store
        .staging
        .upsert_jira_issues(&[issue("10", "2024-05-01T10:00:00.000+0200")])
        .await
        .unwrap();
    store
        .staging
        .upsert_jira_users(&[StagedJiraUser {
            jira_account_id: "a1".into(),
            email_address: Some("alice@example.com".into()),
            display_name: Some("Alice Smith".into()),
            active: Some(true),
            account_type: None,
            raw_payload: json!({}),
        }])
        .await
        .unwrap();
    store
        .staging
        .replace_jira_watchers(
            "10",
            &[StagedJiraWatcher {
                jira_issue_id: "10".into(),
                jira_account_id: "a1".into(),
                raw_payload: json!({}),
            }],
        )
        .await
        .unwrap();

    transform::watchers::run(&store, &mut PhaseSummary::new()).await.unwrap();
    let row = store.mapping.fetch_watcher_mappings().await.unwrap().remove(0);
    assert_eq!(row.migration_status, MigrationStatus::PendingAnalysis);
    assert!(row.notes.as_deref().unwrap().contains("issue mapping"));

    // Ready the issue and the user, then re-join.
    make_issue_ready(&store, 123).await;
    store.mapping.sync_user_mappings().await.unwrap();
    let user = store.mapping.fetch_user_mappings().await.unwrap().remove(0);
    let mut fields = user.automated_fields();
    fields.redmine_user_id = Some(42);
    fields.migration_status = MigrationStatus::CreationSuccess;
    let hash = hash_guard::compute(&fields).unwrap();
    store
        .mapping
        .update_user_automated(user.mapping_id, &fields, None, None, None, hash.as_str())
        .await
        .unwrap();

    transform::watchers::run(&store, &mut PhaseSummary::new()).await.unwrap();
    let row = store.mapping.fetch_watcher_mappings().await.unwrap().remove(0);
    assert_eq!(row.migration_status, MigrationStatus::ReadyForPush);
    assert_eq!(row.redmine_issue_id, Some(123));
    assert_eq!(row.redmine_user_id, Some(42));
    assert_eq!(row.notes, None);
}

#[tokio::test]
async fn attachment_transform_leaves_uploaded_rows_alone() {
    let (store, _pool) = init_store().await;

    store
        .staging
        .upsert_jira_issues(&[issue("10", "2024-05-01T10:00:00.000+0200")])
        .await
        .unwrap();
    store
        .staging
        .upsert_jira_attachments(&[attachment("900", "10", "2024-05-01T10:00:30.000+0200")])
        .await
        .unwrap();
    attachments::sync_from_staging(&store, &mut PhaseSummary::new()).await.unwrap();

    let mut row = store.mapping.fetch_attachment_mappings().await.unwrap().remove(0);
    row.migration_status = MigrationStatus::PendingAssociation;
    row.redmine_upload_token = Some("77.abc".into());
    store.mapping.update_attachment(&row).await.unwrap();

    transform::attachments::run(&store, &mut PhaseSummary::new()).await.unwrap();

    let row = store.mapping.fetch_attachment_mappings().await.unwrap().remove(0);
    assert_eq!(row.migration_status, MigrationStatus::PendingAssociation);
    assert_eq!(row.redmine_upload_token.as_deref(), Some("77.abc"));
}
