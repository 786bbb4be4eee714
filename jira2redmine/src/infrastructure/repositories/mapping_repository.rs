// /////////////////////////////////////////////////////////////////////////////
// Jira2Redmine Migration RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Mapping Repository
//!
//! Typed access to the `migration_mapping_*` tables: skeleton-row sync from
//! staging, ordered fetches for transform, ready-row fetches for push, and
//! single-row automated updates.
//!
//! Update statements are single-row writes committed individually so that a
//! failure mid-phase never loses the progress of earlier rows. Every write
//! of automated output also writes the automation hash computed over it and
//! bumps `last_updated_at`; sync statements never touch existing rows beyond
//! the source columns staging owns.

use std::collections::HashMap;

use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use jira2redmine_domain::entities::{
    AttachmentMapping, IssueAutomatedFields, IssueMapping, JournalAutomatedFields, JournalEntityType,
    JournalMapping, LookupMapping, ProjectAutomatedFields, ProjectMapping, UserAutomatedFields,
    UserMapping, WatcherMapping,
};
use jira2redmine_domain::value_objects::{AssociationHint, MatchType, MigrationStatus};
use jira2redmine_domain::MigrationError;

/// Operator-maintained lookup tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupKind {
    Trackers,
    Statuses,
    Priorities,
}

impl LookupKind {
    fn table(&self) -> &'static str {
        match self {
            LookupKind::Trackers => "migration_mapping_trackers",
            LookupKind::Statuses => "migration_mapping_statuses",
            LookupKind::Priorities => "migration_mapping_priorities",
        }
    }

    fn jira_column(&self) -> &'static str {
        match self {
            LookupKind::Trackers => "jira_issue_type_id",
            LookupKind::Statuses => "jira_status_id",
            LookupKind::Priorities => "jira_priority_id",
        }
    }

    fn redmine_column(&self) -> &'static str {
        match self {
            LookupKind::Trackers => "redmine_tracker_id",
            LookupKind::Statuses => "redmine_status_id",
            LookupKind::Priorities => "redmine_priority_id",
        }
    }
}

/// Mapping-side store operations.
#[derive(Debug, Clone)]
pub struct MappingRepository {
    pool: SqlitePool,
}

fn db_err(context: &str, error: sqlx::Error) -> MigrationError {
    MigrationError::DatabaseError(format!("{}: {}", context, error))
}

fn parse_status(raw: &str) -> Result<MigrationStatus, MigrationError> {
    raw.parse::<MigrationStatus>()
}

impl MappingRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // -----------------------------------------------------------------------
    // Projects
    // -----------------------------------------------------------------------

    /// Inserts a skeleton mapping row for every staged Jira project that has
    /// none yet. Existing rows are never touched.
    pub async fn sync_project_mappings(&self) -> Result<u64, MigrationError> {
        let result = sqlx::query(
            "INSERT INTO migration_mapping_projects (jira_project_id) \
             SELECT s.jira_project_id FROM staging_jira_projects s \
             WHERE NOT EXISTS (SELECT 1 FROM migration_mapping_projects m \
                               WHERE m.jira_project_id = s.jira_project_id)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| db_err("sync migration_mapping_projects", e))?;
        Ok(result.rows_affected())
    }

    pub async fn fetch_project_mappings(&self) -> Result<Vec<ProjectMapping>, MigrationError> {
        let rows = sqlx::query("SELECT * FROM migration_mapping_projects ORDER BY mapping_id")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_err("fetch migration_mapping_projects", e))?;
        rows.iter().map(map_project).collect()
    }

    pub async fn fetch_ready_projects(&self) -> Result<Vec<ProjectMapping>, MigrationError> {
        let rows = sqlx::query(
            "SELECT * FROM migration_mapping_projects \
             WHERE migration_status IN ('READY_FOR_CREATION', 'READY_FOR_PUSH') \
             ORDER BY mapping_id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_err("fetch ready projects", e))?;
        rows.iter().map(map_project).collect()
    }

    /// Writes the automated output of one project row plus its hash.
    pub async fn update_project_automated(
        &self,
        mapping_id: i64,
        fields: &ProjectAutomatedFields,
        automation_hash: &str,
    ) -> Result<(), MigrationError> {
        sqlx::query(
            "UPDATE migration_mapping_projects SET \
             redmine_project_id = ?, migration_status = ?, notes = ?, \
             proposed_identifier = ?, proposed_name = ?, proposed_description = ?, \
             proposed_is_public = ?, automation_hash = ?, last_updated_at = ? \
             WHERE mapping_id = ?",
        )
        .bind(fields.redmine_project_id)
        .bind(fields.migration_status.as_str())
        .bind(&fields.notes)
        .bind(&fields.proposed_identifier)
        .bind(&fields.proposed_name)
        .bind(&fields.proposed_description)
        .bind(fields.proposed_is_public.map(i64::from))
        .bind(automation_hash)
        .bind(Utc::now().to_rfc3339())
        .bind(mapping_id)
        .execute(&self.pool)
        .await
        .map_err(|e| db_err("update migration_mapping_projects", e))?;
        Ok(())
    }

    /// Marks per-project issue extraction complete (or resets it).
    pub async fn mark_project_issues_extracted(
        &self,
        jira_project_id: &str,
        extracted_at: Option<&str>,
    ) -> Result<(), MigrationError> {
        sqlx::query(
            "UPDATE migration_mapping_projects SET issues_extracted_at = ? WHERE jira_project_id = ?",
        )
        .bind(extracted_at)
        .bind(jira_project_id)
        .execute(&self.pool)
        .await
        .map_err(|e| db_err("mark issues_extracted_at", e))?;
        Ok(())
    }

    /// Ready project lookup: Jira project id → Redmine project id.
    pub async fn project_lookup(&self) -> Result<HashMap<String, i64>, MigrationError> {
        self.ready_lookup(
            "SELECT jira_project_id AS k, redmine_project_id AS v FROM migration_mapping_projects \
             WHERE migration_status IN ('MATCH_FOUND', 'CREATION_SUCCESS') AND redmine_project_id IS NOT NULL",
        )
        .await
    }

    // -----------------------------------------------------------------------
    // Users
    // -----------------------------------------------------------------------

    pub async fn sync_user_mappings(&self) -> Result<u64, MigrationError> {
        let result = sqlx::query(
            "INSERT INTO migration_mapping_users (jira_account_id) \
             SELECT s.jira_account_id FROM staging_jira_users s \
             WHERE NOT EXISTS (SELECT 1 FROM migration_mapping_users m \
                               WHERE m.jira_account_id = s.jira_account_id)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| db_err("sync migration_mapping_users", e))?;
        Ok(result.rows_affected())
    }

    pub async fn fetch_user_mappings(&self) -> Result<Vec<UserMapping>, MigrationError> {
        let rows = sqlx::query("SELECT * FROM migration_mapping_users ORDER BY mapping_id")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_err("fetch migration_mapping_users", e))?;
        rows.iter().map(map_user).collect()
    }

    pub async fn fetch_ready_users(&self) -> Result<Vec<UserMapping>, MigrationError> {
        let rows = sqlx::query(
            "SELECT * FROM migration_mapping_users \
             WHERE migration_status IN ('READY_FOR_CREATION', 'READY_FOR_PUSH') \
             ORDER BY mapping_id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_err("fetch ready users", e))?;
        rows.iter().map(map_user).collect()
    }

    pub async fn update_user_automated(
        &self,
        mapping_id: i64,
        fields: &UserAutomatedFields,
        match_type: Option<MatchType>,
        jira_display_name: Option<&str>,
        jira_email_address: Option<&str>,
        automation_hash: &str,
    ) -> Result<(), MigrationError> {
        sqlx::query(
            "UPDATE migration_mapping_users SET \
             redmine_user_id = ?, migration_status = ?, match_type = ?, notes = ?, \
             proposed_redmine_login = ?, proposed_redmine_mail = ?, proposed_firstname = ?, \
             proposed_lastname = ?, proposed_redmine_status = ?, automation_hash = ?, \
             jira_display_name = ?, jira_email_address = ?, last_updated_at = ? \
             WHERE mapping_id = ?",
        )
        .bind(fields.redmine_user_id)
        .bind(fields.migration_status.as_str())
        .bind(match_type.map(|m| m.as_str()))
        .bind(&fields.notes)
        .bind(&fields.proposed_redmine_login)
        .bind(&fields.proposed_redmine_mail)
        .bind(&fields.proposed_firstname)
        .bind(&fields.proposed_lastname)
        .bind(&fields.proposed_redmine_status)
        .bind(automation_hash)
        .bind(jira_display_name)
        .bind(jira_email_address)
        .bind(Utc::now().to_rfc3339())
        .bind(mapping_id)
        .execute(&self.pool)
        .await
        .map_err(|e| db_err("update migration_mapping_users", e))?;
        Ok(())
    }

    /// Ready user lookup: Jira account id → Redmine user id.
    pub async fn user_lookup(&self) -> Result<HashMap<String, i64>, MigrationError> {
        self.ready_lookup(
            "SELECT jira_account_id AS k, redmine_user_id AS v FROM migration_mapping_users \
             WHERE migration_status IN ('MATCH_FOUND', 'CREATION_SUCCESS') AND redmine_user_id IS NOT NULL",
        )
        .await
    }

    // -----------------------------------------------------------------------
    // Issues
    // -----------------------------------------------------------------------

    /// Inserts skeleton issue rows and refreshes the source-side columns
    /// staging owns. Automated and proposed columns are never touched here.
    pub async fn sync_issue_mappings(&self) -> Result<u64, MigrationError> {
        let result = sqlx::query(
            "INSERT INTO migration_mapping_issues \
             (jira_issue_id, jira_issue_key, jira_project_id, jira_issue_type_id, jira_status_id, \
              jira_priority_id, jira_reporter_account_id, jira_assignee_account_id, jira_parent_issue_id) \
             SELECT s.jira_issue_id, s.jira_issue_key, s.jira_project_id, s.jira_issue_type_id, \
                    s.jira_status_id, s.jira_priority_id, s.jira_reporter_account_id, \
                    s.jira_assignee_account_id, s.jira_parent_issue_id \
             FROM staging_jira_issues s \
             WHERE true \
             ON CONFLICT(jira_issue_id) DO UPDATE SET \
             jira_issue_key = excluded.jira_issue_key, jira_project_id = excluded.jira_project_id, \
             jira_issue_type_id = excluded.jira_issue_type_id, jira_status_id = excluded.jira_status_id, \
             jira_priority_id = excluded.jira_priority_id, \
             jira_reporter_account_id = excluded.jira_reporter_account_id, \
             jira_assignee_account_id = excluded.jira_assignee_account_id, \
             jira_parent_issue_id = excluded.jira_parent_issue_id",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| db_err("sync migration_mapping_issues", e))?;
        Ok(result.rows_affected())
    }

    pub async fn fetch_issue_mappings(&self) -> Result<Vec<IssueMapping>, MigrationError> {
        let rows = sqlx::query("SELECT * FROM migration_mapping_issues ORDER BY mapping_id")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_err("fetch migration_mapping_issues", e))?;
        rows.iter().map(map_issue).collect()
    }

    pub async fn fetch_ready_issues(&self) -> Result<Vec<IssueMapping>, MigrationError> {
        let rows = sqlx::query(
            "SELECT * FROM migration_mapping_issues \
             WHERE migration_status IN ('READY_FOR_CREATION', 'READY_FOR_PUSH') \
             ORDER BY mapping_id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_err("fetch ready issues", e))?;
        rows.iter().map(map_issue).collect()
    }

    pub async fn update_issue_automated(
        &self,
        mapping_id: i64,
        fields: &IssueAutomatedFields,
        automation_hash: &str,
    ) -> Result<(), MigrationError> {
        sqlx::query(
            "UPDATE migration_mapping_issues SET \
             redmine_issue_id = ?, redmine_project_id = ?, redmine_tracker_id = ?, \
             redmine_status_id = ?, redmine_priority_id = ?, redmine_author_id = ?, \
             redmine_assigned_to_id = ?, redmine_parent_issue_id = ?, \
             proposed_subject = ?, proposed_description = ?, proposed_start_date = ?, \
             proposed_due_date = ?, proposed_done_ratio = ?, proposed_estimated_hours = ?, \
             proposed_is_private = ?, migration_status = ?, notes = ?, \
             automation_hash = ?, last_updated_at = ? \
             WHERE mapping_id = ?",
        )
        .bind(fields.redmine_issue_id)
        .bind(fields.redmine_project_id)
        .bind(fields.redmine_tracker_id)
        .bind(fields.redmine_status_id)
        .bind(fields.redmine_priority_id)
        .bind(fields.redmine_author_id)
        .bind(fields.redmine_assigned_to_id)
        .bind(fields.redmine_parent_issue_id)
        .bind(&fields.proposed_subject)
        .bind(&fields.proposed_description)
        .bind(&fields.proposed_start_date)
        .bind(&fields.proposed_due_date)
        .bind(fields.proposed_done_ratio)
        .bind(fields.proposed_estimated_hours)
        .bind(fields.proposed_is_private.map(i64::from))
        .bind(fields.migration_status.as_str())
        .bind(&fields.notes)
        .bind(automation_hash)
        .bind(Utc::now().to_rfc3339())
        .bind(mapping_id)
        .execute(&self.pool)
        .await
        .map_err(|e| db_err("update migration_mapping_issues", e))?;
        Ok(())
    }

    /// Jira issue key → Redmine issue id for every mapped issue, used by the
    /// content rewriter.
    pub async fn issue_key_lookup(&self) -> Result<HashMap<String, i64>, MigrationError> {
        self.ready_lookup(
            "SELECT jira_issue_key AS k, redmine_issue_id AS v FROM migration_mapping_issues \
             WHERE jira_issue_key IS NOT NULL AND redmine_issue_id IS NOT NULL",
        )
        .await
    }

    /// Jira issue id → Redmine issue id for ready issue rows.
    pub async fn issue_id_lookup(&self) -> Result<HashMap<String, i64>, MigrationError> {
        self.ready_lookup(
            "SELECT jira_issue_id AS k, redmine_issue_id AS v FROM migration_mapping_issues \
             WHERE migration_status IN ('MATCH_FOUND', 'CREATION_SUCCESS') AND redmine_issue_id IS NOT NULL",
        )
        .await
    }

    /// Live parent resolution: parents become available within a push run,
    /// so this reads the current table instead of a prebuilt lookup.
    pub async fn resolve_parent_issue_id(
        &self,
        jira_parent_id: &str,
    ) -> Result<Option<i64>, MigrationError> {
        let row = sqlx::query(
            "SELECT redmine_issue_id FROM migration_mapping_issues \
             WHERE jira_issue_id = ? \
             AND migration_status IN ('MATCH_FOUND', 'CREATION_SUCCESS') \
             AND redmine_issue_id IS NOT NULL",
        )
        .bind(jira_parent_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_err("resolve parent issue", e))?;

        Ok(match row {
            Some(row) => row.try_get("redmine_issue_id").map_err(|e| db_err("redmine_issue_id", e))?,
            None => None,
        })
    }

    // -----------------------------------------------------------------------
    // Attachments
    // -----------------------------------------------------------------------

    /// Sync step: inserts missing attachment rows and refreshes the columns
    /// the Jira side owns (`jira_filesize`, `association_hint`).
    pub async fn upsert_attachment_sync(
        &self,
        jira_attachment_id: &str,
        jira_issue_id: &str,
        jira_filesize: Option<i64>,
        association_hint: AssociationHint,
    ) -> Result<(), MigrationError> {
        sqlx::query(
            "INSERT INTO migration_mapping_attachments \
             (jira_attachment_id, jira_issue_id, jira_filesize, association_hint, last_updated_at) \
             VALUES (?, ?, ?, ?, ?) \
             ON CONFLICT(jira_attachment_id) DO UPDATE SET \
             jira_issue_id = excluded.jira_issue_id, jira_filesize = excluded.jira_filesize, \
             association_hint = excluded.association_hint, last_updated_at = excluded.last_updated_at",
        )
        .bind(jira_attachment_id)
        .bind(jira_issue_id)
        .bind(jira_filesize)
        .bind(association_hint.as_str())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| db_err("sync migration_mapping_attachments", e))?;
        Ok(())
    }

    pub async fn fetch_attachment_mappings(&self) -> Result<Vec<AttachmentMapping>, MigrationError> {
        let rows = sqlx::query("SELECT * FROM migration_mapping_attachments ORDER BY mapping_id")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_err("fetch migration_mapping_attachments", e))?;
        rows.iter().map(map_attachment).collect()
    }

    pub async fn fetch_attachments_in_status(
        &self,
        status: MigrationStatus,
        limit: Option<usize>,
    ) -> Result<Vec<AttachmentMapping>, MigrationError> {
        let limit = limit.map(|l| l as i64).unwrap_or(i64::MAX);
        let rows = sqlx::query(
            "SELECT * FROM migration_mapping_attachments WHERE migration_status = ? \
             ORDER BY mapping_id LIMIT ?",
        )
        .bind(status.as_str())
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_err("fetch attachments by status", e))?;
        rows.iter().map(map_attachment).collect()
    }

    pub async fn fetch_attachments_for_issue(
        &self,
        jira_issue_id: &str,
    ) -> Result<Vec<AttachmentMapping>, MigrationError> {
        let rows = sqlx::query(
            "SELECT * FROM migration_mapping_attachments WHERE jira_issue_id = ? ORDER BY mapping_id",
        )
        .bind(jira_issue_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_err("fetch attachments for issue", e))?;
        rows.iter().map(map_attachment).collect()
    }

    /// Full-row update of the mutable attachment pipeline columns.
    pub async fn update_attachment(&self, row: &AttachmentMapping) -> Result<(), MigrationError> {
        sqlx::query(
            "UPDATE migration_mapping_attachments SET \
             jira_issue_id = ?, jira_filesize = ?, association_hint = ?, migration_status = ?, \
             local_filepath = ?, redmine_upload_token = ?, redmine_attachment_id = ?, \
             redmine_issue_id = ?, sharepoint_url = ?, notes = ?, \
             download_enabled = ?, upload_enabled = ?, last_updated_at = ? \
             WHERE mapping_id = ?",
        )
        .bind(&row.jira_issue_id)
        .bind(row.jira_filesize)
        .bind(row.association_hint.map(|h| h.as_str()))
        .bind(row.migration_status.as_str())
        .bind(&row.local_filepath)
        .bind(&row.redmine_upload_token)
        .bind(row.redmine_attachment_id)
        .bind(row.redmine_issue_id)
        .bind(&row.sharepoint_url)
        .bind(&row.notes)
        .bind(i64::from(row.download_enabled))
        .bind(i64::from(row.upload_enabled))
        .bind(Utc::now().to_rfc3339())
        .bind(row.mapping_id)
        .execute(&self.pool)
        .await
        .map_err(|e| db_err("update migration_mapping_attachments", e))?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Journals
    // -----------------------------------------------------------------------

    /// Inserts missing journal rows for comments and changelog entries.
    pub async fn sync_journal_mappings(&self) -> Result<u64, MigrationError> {
        let comments = sqlx::query(
            "INSERT INTO migration_mapping_journals (jira_entity_id, jira_issue_id, entity_type) \
             SELECT c.jira_comment_id, c.jira_issue_id, 'COMMENT' FROM staging_jira_comments c \
             WHERE NOT EXISTS (SELECT 1 FROM migration_mapping_journals m \
                               WHERE m.jira_entity_id = c.jira_comment_id AND m.entity_type = 'COMMENT')",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| db_err("sync journal mappings from comments", e))?;

        let changelog = sqlx::query(
            "INSERT INTO migration_mapping_journals (jira_entity_id, jira_issue_id, entity_type) \
             SELECT c.jira_changelog_id, c.jira_issue_id, 'CHANGELOG' FROM staging_jira_changelog c \
             WHERE NOT EXISTS (SELECT 1 FROM migration_mapping_journals m \
                               WHERE m.jira_entity_id = c.jira_changelog_id AND m.entity_type = 'CHANGELOG')",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| db_err("sync journal mappings from changelog", e))?;

        Ok(comments.rows_affected() + changelog.rows_affected())
    }

    pub async fn fetch_journal_mappings(&self) -> Result<Vec<JournalMapping>, MigrationError> {
        let rows = sqlx::query("SELECT * FROM migration_mapping_journals ORDER BY mapping_id")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_err("fetch migration_mapping_journals", e))?;
        rows.iter().map(map_journal).collect()
    }

    pub async fn fetch_ready_journals(&self) -> Result<Vec<JournalMapping>, MigrationError> {
        let rows = sqlx::query(
            "SELECT * FROM migration_mapping_journals \
             WHERE migration_status = 'READY_FOR_PUSH' ORDER BY mapping_id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_err("fetch ready journals", e))?;
        rows.iter().map(map_journal).collect()
    }

    pub async fn update_journal_automated(
        &self,
        mapping_id: i64,
        fields: &JournalAutomatedFields,
        automation_hash: &str,
    ) -> Result<(), MigrationError> {
        sqlx::query(
            "UPDATE migration_mapping_journals SET \
             migration_status = ?, notes = ?, proposed_notes = ?, proposed_author_id = ?, \
             proposed_created_on = ?, proposed_updated_on = ?, redmine_journal_id = ?, \
             automation_hash = ?, last_updated_at = ? \
             WHERE mapping_id = ?",
        )
        .bind(fields.migration_status.as_str())
        .bind(&fields.notes)
        .bind(&fields.proposed_notes)
        .bind(fields.proposed_author_id)
        .bind(&fields.proposed_created_on)
        .bind(&fields.proposed_updated_on)
        .bind(fields.redmine_journal_id)
        .bind(automation_hash)
        .bind(Utc::now().to_rfc3339())
        .bind(mapping_id)
        .execute(&self.pool)
        .await
        .map_err(|e| db_err("update migration_mapping_journals", e))?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Watchers
    // -----------------------------------------------------------------------

    /// Inserts missing watcher rows, carrying the issue key for diagnostics.
    pub async fn sync_watcher_mappings(&self) -> Result<u64, MigrationError> {
        let result = sqlx::query(
            "INSERT INTO migration_mapping_watchers (jira_issue_id, jira_issue_key, jira_account_id) \
             SELECT w.jira_issue_id, i.jira_issue_key, w.jira_account_id \
             FROM staging_jira_watchers w \
             LEFT JOIN staging_jira_issues i ON i.jira_issue_id = w.jira_issue_id \
             WHERE NOT EXISTS (SELECT 1 FROM migration_mapping_watchers m \
                               WHERE m.jira_issue_id = w.jira_issue_id \
                               AND m.jira_account_id = w.jira_account_id)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| db_err("sync migration_mapping_watchers", e))?;
        Ok(result.rows_affected())
    }

    pub async fn fetch_watcher_mappings(&self) -> Result<Vec<WatcherMapping>, MigrationError> {
        let rows = sqlx::query("SELECT * FROM migration_mapping_watchers ORDER BY mapping_id")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_err("fetch migration_mapping_watchers", e))?;
        rows.iter().map(map_watcher).collect()
    }

    pub async fn fetch_ready_watchers(&self) -> Result<Vec<WatcherMapping>, MigrationError> {
        let rows = sqlx::query(
            "SELECT * FROM migration_mapping_watchers \
             WHERE migration_status = 'READY_FOR_PUSH' ORDER BY mapping_id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_err("fetch ready watchers", e))?;
        rows.iter().map(map_watcher).collect()
    }

    pub async fn update_watcher(
        &self,
        mapping_id: i64,
        redmine_issue_id: Option<i64>,
        redmine_user_id: Option<i64>,
        status: MigrationStatus,
        notes: Option<&str>,
    ) -> Result<(), MigrationError> {
        sqlx::query(
            "UPDATE migration_mapping_watchers SET \
             redmine_issue_id = ?, redmine_user_id = ?, migration_status = ?, notes = ?, \
             last_updated_at = ? \
             WHERE mapping_id = ?",
        )
        .bind(redmine_issue_id)
        .bind(redmine_user_id)
        .bind(status.as_str())
        .bind(notes)
        .bind(Utc::now().to_rfc3339())
        .bind(mapping_id)
        .execute(&self.pool)
        .await
        .map_err(|e| db_err("update migration_mapping_watchers", e))?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Operator lookups
    // -----------------------------------------------------------------------

    pub async fn fetch_lookup(&self, kind: LookupKind) -> Result<Vec<LookupMapping>, MigrationError> {
        let sql = format!(
            "SELECT {jira} AS jira_id, {redmine} AS redmine_id, migration_status FROM {table}",
            jira = kind.jira_column(),
            redmine = kind.redmine_column(),
            table = kind.table(),
        );
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_err("fetch lookup table", e))?;

        rows.iter()
            .map(|row| {
                Ok(LookupMapping {
                    jira_id: row.try_get("jira_id").map_err(|e| db_err("jira_id", e))?,
                    redmine_id: row.try_get("redmine_id").map_err(|e| db_err("redmine_id", e))?,
                    migration_status: parse_status(
                        row.try_get::<String, _>("migration_status")
                            .map_err(|e| db_err("migration_status", e))?
                            .as_str(),
                    )?,
                })
            })
            .collect()
    }

    async fn ready_lookup(&self, sql: &str) -> Result<HashMap<String, i64>, MigrationError> {
        let rows = sqlx::query(sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_err("build ready lookup", e))?;

        let mut map = HashMap::with_capacity(rows.len());
        for row in &rows {
            let key: String = row.try_get("k").map_err(|e| db_err("lookup key", e))?;
            let value: i64 = row.try_get("v").map_err(|e| db_err("lookup value", e))?;
            map.insert(key, value);
        }
        Ok(map)
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

fn opt_bool(row: &SqliteRow, column: &str) -> Result<Option<bool>, MigrationError> {
    Ok(row
        .try_get::<Option<i64>, _>(column)
        .map_err(|e| db_err(column, e))?
        .map(|v| v != 0))
}

fn map_project(row: &SqliteRow) -> Result<ProjectMapping, MigrationError> {
    Ok(ProjectMapping {
        mapping_id: row.try_get("mapping_id").map_err(|e| db_err("mapping_id", e))?,
        jira_project_id: row.try_get("jira_project_id").map_err(|e| db_err("jira_project_id", e))?,
        redmine_project_id: row
            .try_get("redmine_project_id")
            .map_err(|e| db_err("redmine_project_id", e))?,
        migration_status: parse_status(
            row.try_get::<String, _>("migration_status")
                .map_err(|e| db_err("migration_status", e))?
                .as_str(),
        )?,
        notes: row.try_get("notes").map_err(|e| db_err("notes", e))?,
        proposed_identifier: row
            .try_get("proposed_identifier")
            .map_err(|e| db_err("proposed_identifier", e))?,
        proposed_name: row.try_get("proposed_name").map_err(|e| db_err("proposed_name", e))?,
        proposed_description: row
            .try_get("proposed_description")
            .map_err(|e| db_err("proposed_description", e))?,
        proposed_is_public: opt_bool(row, "proposed_is_public")?,
        automation_hash: row.try_get("automation_hash").map_err(|e| db_err("automation_hash", e))?,
        issues_extracted_at: row
            .try_get("issues_extracted_at")
            .map_err(|e| db_err("issues_extracted_at", e))?,
    })
}

fn map_user(row: &SqliteRow) -> Result<UserMapping, MigrationError> {
    let match_type: Option<String> = row.try_get("match_type").map_err(|e| db_err("match_type", e))?;
    Ok(UserMapping {
        mapping_id: row.try_get("mapping_id").map_err(|e| db_err("mapping_id", e))?,
        jira_account_id: row.try_get("jira_account_id").map_err(|e| db_err("jira_account_id", e))?,
        redmine_user_id: row.try_get("redmine_user_id").map_err(|e| db_err("redmine_user_id", e))?,
        migration_status: parse_status(
            row.try_get::<String, _>("migration_status")
                .map_err(|e| db_err("migration_status", e))?
                .as_str(),
        )?,
        match_type: match match_type {
            Some(raw) => Some(raw.parse::<MatchType>()?),
            None => None,
        },
        notes: row.try_get("notes").map_err(|e| db_err("notes", e))?,
        proposed_redmine_login: row
            .try_get("proposed_redmine_login")
            .map_err(|e| db_err("proposed_redmine_login", e))?,
        proposed_redmine_mail: row
            .try_get("proposed_redmine_mail")
            .map_err(|e| db_err("proposed_redmine_mail", e))?,
        proposed_firstname: row
            .try_get("proposed_firstname")
            .map_err(|e| db_err("proposed_firstname", e))?,
        proposed_lastname: row
            .try_get("proposed_lastname")
            .map_err(|e| db_err("proposed_lastname", e))?,
        proposed_redmine_status: row
            .try_get("proposed_redmine_status")
            .map_err(|e| db_err("proposed_redmine_status", e))?,
        automation_hash: row.try_get("automation_hash").map_err(|e| db_err("automation_hash", e))?,
        jira_display_name: row
            .try_get("jira_display_name")
            .map_err(|e| db_err("jira_display_name", e))?,
        jira_email_address: row
            .try_get("jira_email_address")
            .map_err(|e| db_err("jira_email_address", e))?,
    })
}

fn map_issue(row: &SqliteRow) -> Result<IssueMapping, MigrationError> {
    Ok(IssueMapping {
        mapping_id: row.try_get("mapping_id").map_err(|e| db_err("mapping_id", e))?,
        jira_issue_id: row.try_get("jira_issue_id").map_err(|e| db_err("jira_issue_id", e))?,
        jira_issue_key: row.try_get("jira_issue_key").map_err(|e| db_err("jira_issue_key", e))?,
        jira_project_id: row.try_get("jira_project_id").map_err(|e| db_err("jira_project_id", e))?,
        jira_issue_type_id: row
            .try_get("jira_issue_type_id")
            .map_err(|e| db_err("jira_issue_type_id", e))?,
        jira_status_id: row.try_get("jira_status_id").map_err(|e| db_err("jira_status_id", e))?,
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
        redmine_issue_id: row.try_get("redmine_issue_id").map_err(|e| db_err("redmine_issue_id", e))?,
        redmine_project_id: row
            .try_get("redmine_project_id")
            .map_err(|e| db_err("redmine_project_id", e))?,
        redmine_tracker_id: row
            .try_get("redmine_tracker_id")
            .map_err(|e| db_err("redmine_tracker_id", e))?,
        redmine_status_id: row
            .try_get("redmine_status_id")
            .map_err(|e| db_err("redmine_status_id", e))?,
        redmine_priority_id: row
            .try_get("redmine_priority_id")
            .map_err(|e| db_err("redmine_priority_id", e))?,
        redmine_author_id: row
            .try_get("redmine_author_id")
            .map_err(|e| db_err("redmine_author_id", e))?,
        redmine_assigned_to_id: row
            .try_get("redmine_assigned_to_id")
            .map_err(|e| db_err("redmine_assigned_to_id", e))?,
        redmine_parent_issue_id: row
            .try_get("redmine_parent_issue_id")
            .map_err(|e| db_err("redmine_parent_issue_id", e))?,
        proposed_subject: row.try_get("proposed_subject").map_err(|e| db_err("proposed_subject", e))?,
        proposed_description: row
            .try_get("proposed_description")
            .map_err(|e| db_err("proposed_description", e))?,
        proposed_start_date: row
            .try_get("proposed_start_date")
            .map_err(|e| db_err("proposed_start_date", e))?,
        proposed_due_date: row
            .try_get("proposed_due_date")
            .map_err(|e| db_err("proposed_due_date", e))?,
        proposed_done_ratio: row
            .try_get("proposed_done_ratio")
            .map_err(|e| db_err("proposed_done_ratio", e))?,
        proposed_estimated_hours: row
            .try_get("proposed_estimated_hours")
            .map_err(|e| db_err("proposed_estimated_hours", e))?,
        proposed_is_private: opt_bool(row, "proposed_is_private")?,
        migration_status: parse_status(
            row.try_get::<String, _>("migration_status")
                .map_err(|e| db_err("migration_status", e))?
                .as_str(),
        )?,
        notes: row.try_get("notes").map_err(|e| db_err("notes", e))?,
        automation_hash: row.try_get("automation_hash").map_err(|e| db_err("automation_hash", e))?,
    })
}

fn map_attachment(row: &SqliteRow) -> Result<AttachmentMapping, MigrationError> {
    let hint: Option<String> = row
        .try_get("association_hint")
        .map_err(|e| db_err("association_hint", e))?;
    Ok(AttachmentMapping {
        mapping_id: row.try_get("mapping_id").map_err(|e| db_err("mapping_id", e))?,
        jira_attachment_id: row
            .try_get("jira_attachment_id")
            .map_err(|e| db_err("jira_attachment_id", e))?,
        jira_issue_id: row.try_get("jira_issue_id").map_err(|e| db_err("jira_issue_id", e))?,
        jira_filesize: row.try_get("jira_filesize").map_err(|e| db_err("jira_filesize", e))?,
        association_hint: match hint {
            Some(raw) => Some(raw.parse::<AssociationHint>()?),
            None => None,
        },
        migration_status: parse_status(
            row.try_get::<String, _>("migration_status")
                .map_err(|e| db_err("migration_status", e))?
                .as_str(),
        )?,
        local_filepath: row.try_get("local_filepath").map_err(|e| db_err("local_filepath", e))?,
        redmine_upload_token: row
            .try_get("redmine_upload_token")
            .map_err(|e| db_err("redmine_upload_token", e))?,
        redmine_attachment_id: row
            .try_get("redmine_attachment_id")
            .map_err(|e| db_err("redmine_attachment_id", e))?,
        redmine_issue_id: row.try_get("redmine_issue_id").map_err(|e| db_err("redmine_issue_id", e))?,
        sharepoint_url: row.try_get("sharepoint_url").map_err(|e| db_err("sharepoint_url", e))?,
        notes: row.try_get("notes").map_err(|e| db_err("notes", e))?,
        download_enabled: row
            .try_get::<i64, _>("download_enabled")
            .map_err(|e| db_err("download_enabled", e))?
            != 0,
        upload_enabled: row
            .try_get::<i64, _>("upload_enabled")
            .map_err(|e| db_err("upload_enabled", e))?
            != 0,
    })
}

fn map_journal(row: &SqliteRow) -> Result<JournalMapping, MigrationError> {
    let entity_type: String = row.try_get("entity_type").map_err(|e| db_err("entity_type", e))?;
    Ok(JournalMapping {
        mapping_id: row.try_get("mapping_id").map_err(|e| db_err("mapping_id", e))?,
        jira_entity_id: row.try_get("jira_entity_id").map_err(|e| db_err("jira_entity_id", e))?,
        jira_issue_id: row.try_get("jira_issue_id").map_err(|e| db_err("jira_issue_id", e))?,
        entity_type: JournalEntityType::parse(&entity_type).ok_or_else(|| {
            MigrationError::DatabaseError(format!("unknown journal entity type '{}'", entity_type))
        })?,
        migration_status: parse_status(
            row.try_get::<String, _>("migration_status")
                .map_err(|e| db_err("migration_status", e))?
                .as_str(),
        )?,
        notes: row.try_get("notes").map_err(|e| db_err("notes", e))?,
        proposed_notes: row.try_get("proposed_notes").map_err(|e| db_err("proposed_notes", e))?,
        proposed_author_id: row
            .try_get("proposed_author_id")
            .map_err(|e| db_err("proposed_author_id", e))?,
        proposed_created_on: row
            .try_get("proposed_created_on")
            .map_err(|e| db_err("proposed_created_on", e))?,
        proposed_updated_on: row
            .try_get("proposed_updated_on")
            .map_err(|e| db_err("proposed_updated_on", e))?,
        redmine_journal_id: row
            .try_get("redmine_journal_id")
            .map_err(|e| db_err("redmine_journal_id", e))?,
        automation_hash: row.try_get("automation_hash").map_err(|e| db_err("automation_hash", e))?,
    })
}

fn map_watcher(row: &SqliteRow) -> Result<WatcherMapping, MigrationError> {
    Ok(WatcherMapping {
        mapping_id: row.try_get("mapping_id").map_err(|e| db_err("mapping_id", e))?,
        jira_issue_id: row.try_get("jira_issue_id").map_err(|e| db_err("jira_issue_id", e))?,
        jira_issue_key: row.try_get("jira_issue_key").map_err(|e| db_err("jira_issue_key", e))?,
        jira_account_id: row.try_get("jira_account_id").map_err(|e| db_err("jira_account_id", e))?,
        redmine_issue_id: row.try_get("redmine_issue_id").map_err(|e| db_err("redmine_issue_id", e))?,
        redmine_user_id: row.try_get("redmine_user_id").map_err(|e| db_err("redmine_user_id", e))?,
        migration_status: parse_status(
            row.try_get::<String, _>("migration_status")
                .map_err(|e| db_err("migration_status", e))?
                .as_str(),
        )?,
        notes: row.try_get("notes").map_err(|e| db_err("notes", e))?,
    })
}
