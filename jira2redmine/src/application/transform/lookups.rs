// /////////////////////////////////////////////////////////////////////////////
// Jira2Redmine Migration RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Dependency Resolver
//!
//! In-memory foreign-reference lookups built once per transform run. Only
//! mapping rows in a ready state (`MATCH_FOUND` / `CREATION_SUCCESS`)
//! contribute; everything else resolves to `None` and either falls back to
//! an operator default or sends the row to manual intervention.
//!
//! Parent issues are the one exception: they become available *within* a
//! push run as parents are created, so parent resolution reads the live
//! issue mapping table (`MappingRepository::resolve_parent_issue_id`)
//! instead of this snapshot.

use std::collections::HashMap;

use jira2redmine_domain::MigrationError;

use crate::infrastructure::repositories::{LookupKind, MappingRepository};

/// Ready-only foreign lookups for one transform run.
#[derive(Debug, Clone, Default)]
pub struct DependencyLookups {
    /// Jira project id → Redmine project id.
    pub projects: HashMap<String, i64>,
    /// Jira issue type id → Redmine tracker id (operator table).
    pub trackers: HashMap<String, i64>,
    /// Jira status id → Redmine status id (operator table).
    pub statuses: HashMap<String, i64>,
    /// Jira priority id → Redmine priority id (operator table).
    pub priorities: HashMap<String, i64>,
    /// Jira account id → Redmine user id.
    pub users: HashMap<String, i64>,
    /// Jira issue id → Redmine issue id (ready rows).
    pub issues: HashMap<String, i64>,
    /// Jira issue key → Redmine issue id (any mapped row).
    pub issue_keys: HashMap<String, i64>,
}

impl DependencyLookups {
    /// Loads every lookup from the mapping database.
    pub async fn load(mapping: &MappingRepository) -> Result<Self, MigrationError> {
        let mut lookups = DependencyLookups {
            projects: mapping.project_lookup().await?,
            users: mapping.user_lookup().await?,
            issues: mapping.issue_id_lookup().await?,
            issue_keys: mapping.issue_key_lookup().await?,
            ..Default::default()
        };

        for row in mapping.fetch_lookup(LookupKind::Trackers).await? {
            if let Some(id) = row.resolved_id() {
                lookups.trackers.insert(row.jira_id.clone(), id);
            }
        }
        for row in mapping.fetch_lookup(LookupKind::Statuses).await? {
            if let Some(id) = row.resolved_id() {
                lookups.statuses.insert(row.jira_id.clone(), id);
            }
        }
        for row in mapping.fetch_lookup(LookupKind::Priorities).await? {
            if let Some(id) = row.resolved_id() {
                lookups.priorities.insert(row.jira_id.clone(), id);
            }
        }

        Ok(lookups)
    }
}
