// /////////////////////////////////////////////////////////////////////////////
// Jira2Redmine Migration RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Staging Repository
//!
//! Typed access to the staging tables. Jira staging tables are upserted on
//! their source primary key, one transaction per extraction page; Redmine
//! snapshot tables are truncated and reloaded in a single transaction.
//!
//! The staging side is deliberately dumb: raw payloads in, typed rows out,
//! no business decisions. Everything clever happens in the transform phase.

use std::collections::HashMap;

use chrono::Utc;
use serde_json::Value;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use jira2redmine_domain::entities::{
    IssueDetailState, RedmineProjectSnapshot, RedmineUserSnapshot, StagedJiraAttachment,
    StagedJiraChangelogEntry, StagedJiraComment, StagedJiraIssue, StagedJiraProject, StagedJiraUser,
    StagedJiraWatcher,
};
use jira2redmine_domain::MigrationError;

/// Staging-side store operations.
#[derive(Debug, Clone)]
pub struct StagingRepository {
    pool: SqlitePool,
}

fn db_err(context: &str, error: sqlx::Error) -> MigrationError {
    MigrationError::DatabaseError(format!("{}: {}", context, error))
}

fn payload_to_string(payload: &Value) -> String {
    payload.to_string()
}

fn payload_from_string(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or(Value::Null)
}

fn opt_bool(row: &SqliteRow, column: &str) -> Result<Option<bool>, sqlx::Error> {
    Ok(row.try_get::<Option<i64>, _>(column)?.map(|v| v != 0))
}

impl StagingRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // -----------------------------------------------------------------------
    // Jira projects
    // -----------------------------------------------------------------------

    /// Upserts one extraction page of Jira projects.
    pub async fn upsert_jira_projects(&self, rows: &[StagedJiraProject]) -> Result<(), MigrationError> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_err("begin project staging batch", e))?;

        for row in rows {
            sqlx::query(
                "INSERT INTO staging_jira_projects \
                 (jira_project_id, project_key, name, description, lead_account_id, is_private, raw_payload, extracted_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?) \
                 ON CONFLICT(jira_project_id) DO UPDATE SET \
                 project_key = excluded.project_key, name = excluded.name, \
                 description = excluded.description, lead_account_id = excluded.lead_account_id, \
                 is_private = excluded.is_private, raw_payload = excluded.raw_payload, \
                 extracted_at = excluded.extracted_at",
            )
            .bind(&row.jira_project_id)
            .bind(&row.project_key)
            .bind(&row.name)
            .bind(&row.description)
            .bind(&row.lead_account_id)
            .bind(row.is_private.map(i64::from))
            .bind(payload_to_string(&row.raw_payload))
            .bind(&now)
            .execute(&mut *tx)
            .await
            .map_err(|e| db_err("upsert staging_jira_projects", e))?;
        }

        tx.commit().await.map_err(|e| db_err("commit project staging batch", e))
    }

    pub async fn fetch_jira_projects(&self) -> Result<Vec<StagedJiraProject>, MigrationError> {
        let rows = sqlx::query("SELECT * FROM staging_jira_projects ORDER BY jira_project_id")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_err("fetch staging_jira_projects", e))?;

        rows.iter()
            .map(|row| {
                Ok(StagedJiraProject {
                    jira_project_id: row.try_get("jira_project_id").map_err(|e| db_err("jira_project_id", e))?,
                    project_key: row.try_get("project_key").map_err(|e| db_err("project_key", e))?,
                    name: row.try_get("name").map_err(|e| db_err("name", e))?,
                    description: row.try_get("description").map_err(|e| db_err("description", e))?,
                    lead_account_id: row
                        .try_get("lead_account_id")
                        .map_err(|e| db_err("lead_account_id", e))?,
                    is_private: opt_bool(row, "is_private").map_err(|e| db_err("is_private", e))?,
                    raw_payload: payload_from_string(
                        row.try_get::<String, _>("raw_payload")
                            .map_err(|e| db_err("raw_payload", e))?
                            .as_str(),
                    ),
                })
            })
            .collect()
    }

    // -----------------------------------------------------------------------
    // Jira users
    // -----------------------------------------------------------------------

    pub async fn upsert_jira_users(&self, rows: &[StagedJiraUser]) -> Result<(), MigrationError> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await.map_err(|e| db_err("begin user staging batch", e))?;

        for row in rows {
            sqlx::query(
                "INSERT INTO staging_jira_users \
                 (jira_account_id, email_address, display_name, active, account_type, raw_payload, extracted_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?) \
                 ON CONFLICT(jira_account_id) DO UPDATE SET \
                 email_address = excluded.email_address, display_name = excluded.display_name, \
                 active = excluded.active, account_type = excluded.account_type, \
                 raw_payload = excluded.raw_payload, extracted_at = excluded.extracted_at",
            )
            .bind(&row.jira_account_id)
            .bind(&row.email_address)
            .bind(&row.display_name)
            .bind(row.active.map(i64::from))
            .bind(&row.account_type)
            .bind(payload_to_string(&row.raw_payload))
            .bind(&now)
            .execute(&mut *tx)
            .await
            .map_err(|e| db_err("upsert staging_jira_users", e))?;
        }

        tx.commit().await.map_err(|e| db_err("commit user staging batch", e))
    }

    pub async fn fetch_jira_users(&self) -> Result<Vec<StagedJiraUser>, MigrationError> {
        let rows = sqlx::query("SELECT * FROM staging_jira_users ORDER BY jira_account_id")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_err("fetch staging_jira_users", e))?;

        rows.iter()
            .map(|row| {
                Ok(StagedJiraUser {
                    jira_account_id: row.try_get("jira_account_id").map_err(|e| db_err("jira_account_id", e))?,
                    email_address: row.try_get("email_address").map_err(|e| db_err("email_address", e))?,
                    display_name: row.try_get("display_name").map_err(|e| db_err("display_name", e))?,
                    active: opt_bool(row, "active").map_err(|e| db_err("active", e))?,
                    account_type: row.try_get("account_type").map_err(|e| db_err("account_type", e))?,
                    raw_payload: payload_from_string(
                        row.try_get::<String, _>("raw_payload")
                            .map_err(|e| db_err("raw_payload", e))?
                            .as_str(),
                    ),
                })
            })
            .collect()
    }

    // -----------------------------------------------------------------------
    // Jira issues
    // -----------------------------------------------------------------------

    pub async fn upsert_jira_issues(&self, rows: &[StagedJiraIssue]) -> Result<(), MigrationError> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await.map_err(|e| db_err("begin issue staging batch", e))?;

        for row in rows {
            sqlx::query(
                "INSERT INTO staging_jira_issues \
                 (jira_issue_id, jira_issue_key, jira_project_id, jira_issue_type_id, jira_status_id, \
                  jira_status_category, jira_priority_id, jira_reporter_account_id, jira_assignee_account_id, \
                  jira_parent_issue_id, jira_security_level_id, summary, created, updated, due_date, \
                  time_original_estimate, raw_payload, extracted_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
                 ON CONFLICT(jira_issue_id) DO UPDATE SET \
                 jira_issue_key = excluded.jira_issue_key, jira_project_id = excluded.jira_project_id, \
                 jira_issue_type_id = excluded.jira_issue_type_id, jira_status_id = excluded.jira_status_id, \
                 jira_status_category = excluded.jira_status_category, jira_priority_id = excluded.jira_priority_id, \
                 jira_reporter_account_id = excluded.jira_reporter_account_id, \
                 jira_assignee_account_id = excluded.jira_assignee_account_id, \
                 jira_parent_issue_id = excluded.jira_parent_issue_id, \
                 jira_security_level_id = excluded.jira_security_level_id, \
                 summary = excluded.summary, created = excluded.created, updated = excluded.updated, \
                 due_date = excluded.due_date, time_original_estimate = excluded.time_original_estimate, \
                 raw_payload = excluded.raw_payload, extracted_at = excluded.extracted_at",
            )
            .bind(&row.jira_issue_id)
            .bind(&row.jira_issue_key)
            .bind(&row.jira_project_id)
            .bind(&row.jira_issue_type_id)
            .bind(&row.jira_status_id)
            .bind(&row.jira_status_category)
            .bind(&row.jira_priority_id)
            .bind(&row.jira_reporter_account_id)
            .bind(&row.jira_assignee_account_id)
            .bind(&row.jira_parent_issue_id)
            .bind(&row.jira_security_level_id)
            .bind(&row.summary)
            .bind(&row.created)
            .bind(&row.updated)
            .bind(&row.due_date)
            .bind(row.time_original_estimate)
            .bind(payload_to_string(&row.raw_payload))
            .bind(&now)
            .execute(&mut *tx)
            .await
            .map_err(|e| db_err("upsert staging_jira_issues", e))?;
        }

        tx.commit().await.map_err(|e| db_err("commit issue staging batch", e))
    }

    pub async fn fetch_jira_issues(&self) -> Result<Vec<StagedJiraIssue>, MigrationError> {
        let rows = sqlx::query("SELECT * FROM staging_jira_issues ORDER BY CAST(jira_issue_id AS INTEGER)")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_err("fetch staging_jira_issues", e))?;

        rows.iter().map(|row| self.map_issue(row)).collect()
    }

    fn map_issue(&self, row: &SqliteRow) -> Result<StagedJiraIssue, MigrationError> {
        Ok(StagedJiraIssue {
            jira_issue_id: row.try_get("jira_issue_id").map_err(|e| db_err("jira_issue_id", e))?,
            jira_issue_key: row.try_get("jira_issue_key").map_err(|e| db_err("jira_issue_key", e))?,
            jira_project_id: row.try_get("jira_project_id").map_err(|e| db_err("jira_project_id", e))?,
            jira_issue_type_id: row
                .try_get("jira_issue_type_id")
                .map_err(|e| db_err("jira_issue_type_id", e))?,
            jira_status_id: row.try_get("jira_status_id").map_err(|e| db_err("jira_status_id", e))?,
            jira_status_category: row
                .try_get("jira_status_category")
                .map_err(|e| db_err("jira_status_category", e))?,
            jira_priority_id: row.try_get("jira_priority_id").map_err(|e| db_err("jira_priority_id", e))?,
            jira_reporter_account_id: row
                .try_get("jira_reporter_account_id")
                .map_err(|e| db_err("jira_reporter_account_id", e))?,
            jira_assignee_account_id: row
                .try_get("jira_assignee_account_id")
                .map_err(|e| db_err("jira_assignee_account_id", e))?,
            jira_parent_issue_id: row
                .try_get("jira_parent_issue_id")
                .map_err(|e| db_err("jira_parent_issue_id", e))?,
            jira_security_level_id: row
                .try_get("jira_security_level_id")
                .map_err(|e| db_err("jira_security_level_id", e))?,
            summary: row.try_get("summary").map_err(|e| db_err("summary", e))?,
            created: row.try_get("created").map_err(|e| db_err("created", e))?,
            updated: row.try_get("updated").map_err(|e| db_err("updated", e))?,
            due_date: row.try_get("due_date").map_err(|e| db_err("due_date", e))?,
            time_original_estimate: row
                .try_get("time_original_estimate")
                .map_err(|e| db_err("time_original_estimate", e))?,
            raw_payload: payload_from_string(
                row.try_get::<String, _>("raw_payload")
                    .map_err(|e| db_err("raw_payload", e))?
                    .as_str(),
            ),
        })
    }

    // -----------------------------------------------------------------------
    // Jira comments and changelog
    // -----------------------------------------------------------------------

    pub async fn upsert_jira_comments(&self, rows: &[StagedJiraComment]) -> Result<(), MigrationError> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await.map_err(|e| db_err("begin comment staging batch", e))?;

        for row in rows {
            sqlx::query(
                "INSERT INTO staging_jira_comments \
                 (jira_comment_id, jira_issue_id, author_account_id, created, updated, rendered_body, raw_payload, extracted_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?) \
                 ON CONFLICT(jira_comment_id) DO UPDATE SET \
                 jira_issue_id = excluded.jira_issue_id, author_account_id = excluded.author_account_id, \
                 created = excluded.created, updated = excluded.updated, \
                 rendered_body = excluded.rendered_body, raw_payload = excluded.raw_payload, \
                 extracted_at = excluded.extracted_at",
            )
            .bind(&row.jira_comment_id)
            .bind(&row.jira_issue_id)
            .bind(&row.author_account_id)
            .bind(&row.created)
            .bind(&row.updated)
            .bind(&row.rendered_body)
            .bind(payload_to_string(&row.raw_payload))
            .bind(&now)
            .execute(&mut *tx)
            .await
            .map_err(|e| db_err("upsert staging_jira_comments", e))?;
        }

        tx.commit().await.map_err(|e| db_err("commit comment staging batch", e))
    }

    pub async fn fetch_jira_comments(&self) -> Result<Vec<StagedJiraComment>, MigrationError> {
        let rows = sqlx::query("SELECT * FROM staging_jira_comments ORDER BY CAST(jira_comment_id AS INTEGER)")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_err("fetch staging_jira_comments", e))?;

        rows.iter()
            .map(|row| {
                Ok(StagedJiraComment {
                    jira_comment_id: row.try_get("jira_comment_id").map_err(|e| db_err("jira_comment_id", e))?,
                    jira_issue_id: row.try_get("jira_issue_id").map_err(|e| db_err("jira_issue_id", e))?,
                    author_account_id: row
                        .try_get("author_account_id")
                        .map_err(|e| db_err("author_account_id", e))?,
                    created: row.try_get("created").map_err(|e| db_err("created", e))?,
                    updated: row.try_get("updated").map_err(|e| db_err("updated", e))?,
                    rendered_body: row.try_get("rendered_body").map_err(|e| db_err("rendered_body", e))?,
                    raw_payload: payload_from_string(
                        row.try_get::<String, _>("raw_payload")
                            .map_err(|e| db_err("raw_payload", e))?
                            .as_str(),
                    ),
                })
            })
            .collect()
    }

    pub async fn upsert_jira_changelog(
        &self,
        rows: &[StagedJiraChangelogEntry],
    ) -> Result<(), MigrationError> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_err("begin changelog staging batch", e))?;

        for row in rows {
            sqlx::query(
                "INSERT INTO staging_jira_changelog \
                 (jira_changelog_id, jira_issue_id, author_account_id, created, raw_payload, extracted_at) \
                 VALUES (?, ?, ?, ?, ?, ?) \
                 ON CONFLICT(jira_changelog_id) DO UPDATE SET \
                 jira_issue_id = excluded.jira_issue_id, author_account_id = excluded.author_account_id, \
                 created = excluded.created, raw_payload = excluded.raw_payload, \
                 extracted_at = excluded.extracted_at",
            )
            .bind(&row.jira_changelog_id)
            .bind(&row.jira_issue_id)
            .bind(&row.author_account_id)
            .bind(&row.created)
            .bind(payload_to_string(&row.raw_payload))
            .bind(&now)
            .execute(&mut *tx)
            .await
            .map_err(|e| db_err("upsert staging_jira_changelog", e))?;
        }

        tx.commit().await.map_err(|e| db_err("commit changelog staging batch", e))
    }

    pub async fn fetch_jira_changelog(&self) -> Result<Vec<StagedJiraChangelogEntry>, MigrationError> {
        let rows =
            sqlx::query("SELECT * FROM staging_jira_changelog ORDER BY CAST(jira_changelog_id AS INTEGER)")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| db_err("fetch staging_jira_changelog", e))?;

        rows.iter()
            .map(|row| {
                Ok(StagedJiraChangelogEntry {
                    jira_changelog_id: row
                        .try_get("jira_changelog_id")
                        .map_err(|e| db_err("jira_changelog_id", e))?,
                    jira_issue_id: row.try_get("jira_issue_id").map_err(|e| db_err("jira_issue_id", e))?,
                    author_account_id: row
                        .try_get("author_account_id")
                        .map_err(|e| db_err("author_account_id", e))?,
                    created: row.try_get("created").map_err(|e| db_err("created", e))?,
                    raw_payload: payload_from_string(
                        row.try_get::<String, _>("raw_payload")
                            .map_err(|e| db_err("raw_payload", e))?
                            .as_str(),
                    ),
                })
            })
            .collect()
    }

    // -----------------------------------------------------------------------
    // Jira attachments
    // -----------------------------------------------------------------------

    pub async fn upsert_jira_attachments(&self, rows: &[StagedJiraAttachment]) -> Result<(), MigrationError> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_err("begin attachment staging batch", e))?;

        for row in rows {
            sqlx::query(
                "INSERT INTO staging_jira_attachments \
                 (jira_attachment_id, jira_issue_id, filename, filesize, mime_type, content_url, \
                  author_account_id, created, raw_payload, extracted_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
                 ON CONFLICT(jira_attachment_id) DO UPDATE SET \
                 jira_issue_id = excluded.jira_issue_id, filename = excluded.filename, \
                 filesize = excluded.filesize, mime_type = excluded.mime_type, \
                 content_url = excluded.content_url, author_account_id = excluded.author_account_id, \
                 created = excluded.created, raw_payload = excluded.raw_payload, \
                 extracted_at = excluded.extracted_at",
            )
            .bind(&row.jira_attachment_id)
            .bind(&row.jira_issue_id)
            .bind(&row.filename)
            .bind(row.filesize)
            .bind(&row.mime_type)
            .bind(&row.content_url)
            .bind(&row.author_account_id)
            .bind(&row.created)
            .bind(payload_to_string(&row.raw_payload))
            .bind(&now)
            .execute(&mut *tx)
            .await
            .map_err(|e| db_err("upsert staging_jira_attachments", e))?;
        }

        tx.commit().await.map_err(|e| db_err("commit attachment staging batch", e))
    }

    pub async fn fetch_jira_attachments(&self) -> Result<Vec<StagedJiraAttachment>, MigrationError> {
        let rows = sqlx::query(
            "SELECT * FROM staging_jira_attachments ORDER BY CAST(jira_attachment_id AS INTEGER)",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_err("fetch staging_jira_attachments", e))?;

        rows.iter()
            .map(|row| {
                Ok(StagedJiraAttachment {
                    jira_attachment_id: row
                        .try_get("jira_attachment_id")
                        .map_err(|e| db_err("jira_attachment_id", e))?,
                    jira_issue_id: row.try_get("jira_issue_id").map_err(|e| db_err("jira_issue_id", e))?,
                    filename: row.try_get("filename").map_err(|e| db_err("filename", e))?,
                    filesize: row.try_get("filesize").map_err(|e| db_err("filesize", e))?,
                    mime_type: row.try_get("mime_type").map_err(|e| db_err("mime_type", e))?,
                    content_url: row.try_get("content_url").map_err(|e| db_err("content_url", e))?,
                    author_account_id: row
                        .try_get("author_account_id")
                        .map_err(|e| db_err("author_account_id", e))?,
                    created: row.try_get("created").map_err(|e| db_err("created", e))?,
                    raw_payload: payload_from_string(
                        row.try_get::<String, _>("raw_payload")
                            .map_err(|e| db_err("raw_payload", e))?
                            .as_str(),
                    ),
                })
            })
            .collect()
    }

    // -----------------------------------------------------------------------
    // Jira watchers
    // -----------------------------------------------------------------------

    /// Replaces the watcher set of one issue; the watcher endpoint always
    /// returns the complete list.
    pub async fn replace_jira_watchers(
        &self,
        jira_issue_id: &str,
        rows: &[StagedJiraWatcher],
    ) -> Result<(), MigrationError> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_err("begin watcher staging batch", e))?;

        sqlx::query("DELETE FROM staging_jira_watchers WHERE jira_issue_id = ?")
            .bind(jira_issue_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| db_err("clear staging_jira_watchers", e))?;

        for row in rows {
            sqlx::query(
                "INSERT INTO staging_jira_watchers (jira_issue_id, jira_account_id, raw_payload, extracted_at) \
                 VALUES (?, ?, ?, ?)",
            )
            .bind(&row.jira_issue_id)
            .bind(&row.jira_account_id)
            .bind(payload_to_string(&row.raw_payload))
            .bind(&now)
            .execute(&mut *tx)
            .await
            .map_err(|e| db_err("insert staging_jira_watchers", e))?;
        }

        tx.commit().await.map_err(|e| db_err("commit watcher staging batch", e))
    }

    pub async fn fetch_jira_watchers(&self) -> Result<Vec<StagedJiraWatcher>, MigrationError> {
        let rows = sqlx::query("SELECT * FROM staging_jira_watchers ORDER BY jira_issue_id, jira_account_id")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_err("fetch staging_jira_watchers", e))?;

        rows.iter()
            .map(|row| {
                Ok(StagedJiraWatcher {
                    jira_issue_id: row.try_get("jira_issue_id").map_err(|e| db_err("jira_issue_id", e))?,
                    jira_account_id: row
                        .try_get("jira_account_id")
                        .map_err(|e| db_err("jira_account_id", e))?,
                    raw_payload: payload_from_string(
                        row.try_get::<String, _>("raw_payload")
                            .map_err(|e| db_err("raw_payload", e))?
                            .as_str(),
                    ),
                })
            })
            .collect()
    }

    // -----------------------------------------------------------------------
    // Per-issue detail fetch outcomes
    // -----------------------------------------------------------------------

    pub async fn record_issue_detail_state(&self, state: &IssueDetailState) -> Result<(), MigrationError> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO staging_jira_issue_state (jira_issue_id, detail_kind, status, note, recorded_at) \
             VALUES (?, ?, ?, ?, ?) \
             ON CONFLICT(jira_issue_id, detail_kind) DO UPDATE SET \
             status = excluded.status, note = excluded.note, recorded_at = excluded.recorded_at",
        )
        .bind(&state.jira_issue_id)
        .bind(&state.detail_kind)
        .bind(&state.status)
        .bind(&state.note)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| db_err("record staging_jira_issue_state", e))?;
        Ok(())
    }

    /// The recorded outcome per issue for one detail kind.
    pub async fn fetch_issue_detail_states(
        &self,
        kind: &str,
    ) -> Result<HashMap<String, IssueDetailState>, MigrationError> {
        let rows = sqlx::query("SELECT * FROM staging_jira_issue_state WHERE detail_kind = ?")
            .bind(kind)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_err("fetch staging_jira_issue_state", e))?;

        let mut states = HashMap::new();
        for row in &rows {
            let state = IssueDetailState {
                jira_issue_id: row.try_get("jira_issue_id").map_err(|e| db_err("jira_issue_id", e))?,
                detail_kind: row.try_get("detail_kind").map_err(|e| db_err("detail_kind", e))?,
                status: row.try_get("status").map_err(|e| db_err("status", e))?,
                note: row.try_get("note").map_err(|e| db_err("note", e))?,
            };
            states.insert(state.jira_issue_id.clone(), state);
        }
        Ok(states)
    }

    // -----------------------------------------------------------------------
    // Redmine snapshots (truncate and reload)
    // -----------------------------------------------------------------------

    pub async fn replace_redmine_projects(
        &self,
        rows: &[RedmineProjectSnapshot],
    ) -> Result<(), MigrationError> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_err("begin redmine project snapshot", e))?;

        sqlx::query("DELETE FROM staging_redmine_projects")
            .execute(&mut *tx)
            .await
            .map_err(|e| db_err("truncate staging_redmine_projects", e))?;

        for row in rows {
            sqlx::query(
                "INSERT INTO staging_redmine_projects \
                 (redmine_project_id, identifier, name, description, is_public, raw_payload, extracted_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(row.redmine_project_id)
            .bind(&row.identifier)
            .bind(&row.name)
            .bind(&row.description)
            .bind(row.is_public.map(i64::from))
            .bind(payload_to_string(&row.raw_payload))
            .bind(&now)
            .execute(&mut *tx)
            .await
            .map_err(|e| db_err("insert staging_redmine_projects", e))?;
        }

        tx.commit().await.map_err(|e| db_err("commit redmine project snapshot", e))
    }

    pub async fn fetch_redmine_projects(&self) -> Result<Vec<RedmineProjectSnapshot>, MigrationError> {
        let rows = sqlx::query("SELECT * FROM staging_redmine_projects ORDER BY redmine_project_id")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_err("fetch staging_redmine_projects", e))?;

        rows.iter()
            .map(|row| {
                Ok(RedmineProjectSnapshot {
                    redmine_project_id: row
                        .try_get("redmine_project_id")
                        .map_err(|e| db_err("redmine_project_id", e))?,
                    identifier: row.try_get("identifier").map_err(|e| db_err("identifier", e))?,
                    name: row.try_get("name").map_err(|e| db_err("name", e))?,
                    description: row.try_get("description").map_err(|e| db_err("description", e))?,
                    is_public: opt_bool(row, "is_public").map_err(|e| db_err("is_public", e))?,
                    raw_payload: payload_from_string(
                        row.try_get::<String, _>("raw_payload")
                            .map_err(|e| db_err("raw_payload", e))?
                            .as_str(),
                    ),
                })
            })
            .collect()
    }

    pub async fn replace_redmine_users(&self, rows: &[RedmineUserSnapshot]) -> Result<(), MigrationError> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_err("begin redmine user snapshot", e))?;

        sqlx::query("DELETE FROM staging_redmine_users")
            .execute(&mut *tx)
            .await
            .map_err(|e| db_err("truncate staging_redmine_users", e))?;

        for row in rows {
            sqlx::query(
                "INSERT INTO staging_redmine_users \
                 (redmine_user_id, login, mail, firstname, lastname, status, raw_payload, extracted_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(row.redmine_user_id)
            .bind(&row.login)
            .bind(&row.mail)
            .bind(&row.firstname)
            .bind(&row.lastname)
            .bind(row.status)
            .bind(payload_to_string(&row.raw_payload))
            .bind(&now)
            .execute(&mut *tx)
            .await
            .map_err(|e| db_err("insert staging_redmine_users", e))?;
        }

        tx.commit().await.map_err(|e| db_err("commit redmine user snapshot", e))
    }

    pub async fn fetch_redmine_users(&self) -> Result<Vec<RedmineUserSnapshot>, MigrationError> {
        let rows = sqlx::query("SELECT * FROM staging_redmine_users ORDER BY redmine_user_id")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_err("fetch staging_redmine_users", e))?;

        rows.iter()
            .map(|row| {
                Ok(RedmineUserSnapshot {
                    redmine_user_id: row
                        .try_get("redmine_user_id")
                        .map_err(|e| db_err("redmine_user_id", e))?,
                    login: row.try_get("login").map_err(|e| db_err("login", e))?,
                    mail: row.try_get("mail").map_err(|e| db_err("mail", e))?,
                    firstname: row.try_get("firstname").map_err(|e| db_err("firstname", e))?,
                    lastname: row.try_get("lastname").map_err(|e| db_err("lastname", e))?,
                    status: row.try_get("status").map_err(|e| db_err("status", e))?,
                    raw_payload: payload_from_string(
                        row.try_get::<String, _>("raw_payload")
                            .map_err(|e| db_err("raw_payload", e))?
                            .as_str(),
                    ),
                })
            })
            .collect()
    }
}
