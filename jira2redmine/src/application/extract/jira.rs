// /////////////////////////////////////////////////////////////////////////////
// Jira2Redmine Migration RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Jira Extraction
//!
//! Pulls projects, users, issues and per-issue details from Jira Cloud into
//! the staging tables. Wire payloads are mapped to explicit nullable staging
//! rows; the complete JSON rides along in `raw_payload`.
//!
//! Issue extraction is resumable per project: `issues_extracted_at` on the
//! project mapping row is set only when every keyset page of a project
//! landed, so a partial run resumes the whole project on the next
//! invocation. Per-issue detail fetches (comments, changelog, watchers)
//! record their outcome in `staging_jira_issue_state`: 401/403/404 become a
//! WARNING that is not retried, everything else FAILED and retried.

use std::collections::HashMap;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info, warn};

use jira2redmine_domain::entities::{
    detail_kind, IssueDetailState, StagedJiraAttachment, StagedJiraChangelogEntry, StagedJiraComment,
    StagedJiraIssue, StagedJiraProject, StagedJiraUser, StagedJiraWatcher,
};
use jira2redmine_domain::MigrationError;

use crate::application::summary::PhaseSummary;
use crate::infrastructure::clients::{JiraClient, JiraRequestError};
use crate::infrastructure::repositories::Store;

/// Canonicalizes the deeply optional boolean shapes Jira emits.
fn value_as_bool(value: Option<&Value>) -> Option<bool> {
    match value? {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|v| v != 0),
        Value::String(s) => match s.as_str() {
            "0" | "false" => Some(false),
            "1" | "true" => Some(true),
            _ => None,
        },
        _ => None,
    }
}

fn string_at(value: &Value, pointer: &str) -> Option<String> {
    value.pointer(pointer).and_then(Value::as_str).map(String::from)
}

// ---------------------------------------------------------------------------
// Projects
// ---------------------------------------------------------------------------

fn project_from_wire(value: &Value) -> Option<StagedJiraProject> {
    Some(StagedJiraProject {
        jira_project_id: string_at(value, "/id")?,
        project_key: string_at(value, "/key"),
        name: string_at(value, "/name"),
        description: string_at(value, "/description"),
        lead_account_id: string_at(value, "/lead/accountId"),
        is_private: value_as_bool(value.get("isPrivate")),
        raw_payload: value.clone(),
    })
}

/// Extracts all Jira projects into staging and creates missing mapping rows.
pub async fn extract_projects(
    jira: &JiraClient,
    store: &Store,
    summary: &mut PhaseSummary,
) -> Result<(), MigrationError> {
    let wire = jira.fetch_projects().await?;
    let rows: Vec<StagedJiraProject> = wire.iter().filter_map(project_from_wire).collect();
    if rows.len() != wire.len() {
        warn!("{} Jira project payloads had no id and were dropped", wire.len() - rows.len());
    }

    store.staging.upsert_jira_projects(&rows).await?;
    let created = store.mapping.sync_project_mappings().await?;
    summary.processed += rows.len() as u64;
    info!("Staged {} Jira projects ({} new mapping rows)", rows.len(), created);
    Ok(())
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

fn user_from_wire(value: &Value) -> Option<StagedJiraUser> {
    Some(StagedJiraUser {
        jira_account_id: string_at(value, "/accountId")?,
        email_address: string_at(value, "/emailAddress"),
        display_name: string_at(value, "/displayName"),
        active: value_as_bool(value.get("active")),
        account_type: string_at(value, "/accountType"),
        raw_payload: value.clone(),
    })
}

/// Extracts all Jira users into staging and creates missing mapping rows.
pub async fn extract_users(
    jira: &JiraClient,
    store: &Store,
    summary: &mut PhaseSummary,
) -> Result<(), MigrationError> {
    let wire = jira.fetch_users().await?;
    let rows: Vec<StagedJiraUser> = wire.iter().filter_map(user_from_wire).collect();

    store.staging.upsert_jira_users(&rows).await?;
    let created = store.mapping.sync_user_mappings().await?;
    summary.processed += rows.len() as u64;
    info!("Staged {} Jira users ({} new mapping rows)", rows.len(), created);
    Ok(())
}

// ---------------------------------------------------------------------------
// Issues
// ---------------------------------------------------------------------------

fn issue_from_wire(value: &Value) -> Option<StagedJiraIssue> {
    let fields = value.get("fields").cloned().unwrap_or(Value::Null);
    Some(StagedJiraIssue {
        jira_issue_id: string_at(value, "/id")?,
        jira_issue_key: string_at(value, "/key"),
        jira_project_id: string_at(&fields, "/project/id"),
        jira_issue_type_id: string_at(&fields, "/issuetype/id"),
        jira_status_id: string_at(&fields, "/status/id"),
        jira_status_category: string_at(&fields, "/status/statusCategory/key"),
        jira_priority_id: string_at(&fields, "/priority/id"),
        jira_reporter_account_id: string_at(&fields, "/reporter/accountId"),
        jira_assignee_account_id: string_at(&fields, "/assignee/accountId"),
        jira_parent_issue_id: string_at(&fields, "/parent/id"),
        jira_security_level_id: string_at(&fields, "/security/id"),
        summary: string_at(&fields, "/summary"),
        created: string_at(&fields, "/created"),
        updated: string_at(&fields, "/updated"),
        due_date: string_at(&fields, "/duedate"),
        time_original_estimate: fields.get("timeoriginalestimate").and_then(Value::as_i64),
        raw_payload: value.clone(),
    })
}

fn attachments_from_wire(issue_id: &str, value: &Value) -> Vec<StagedJiraAttachment> {
    value
        .pointer("/fields/attachment")
        .and_then(Value::as_array)
        .map(|attachments| {
            attachments
                .iter()
                .filter_map(|att| {
                    Some(StagedJiraAttachment {
                        jira_attachment_id: string_at(att, "/id")?,
                        jira_issue_id: issue_id.to_string(),
                        filename: string_at(att, "/filename"),
                        filesize: att.get("size").and_then(Value::as_i64),
                        mime_type: string_at(att, "/mimeType"),
                        content_url: string_at(att, "/content"),
                        author_account_id: string_at(att, "/author/accountId"),
                        created: string_at(att, "/created"),
                        raw_payload: att.clone(),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Extracts issues (and their attachment descriptors) for every project
/// whose mapping row has no `issues_extracted_at` yet.
pub async fn extract_issues(
    jira: &JiraClient,
    store: &Store,
    summary: &mut PhaseSummary,
) -> Result<(), MigrationError> {
    let projects = store.mapping.fetch_project_mappings().await?;

    for project in &projects {
        if project.issues_extracted_at.is_some() {
            debug!("Project {} already extracted, skipping", project.jira_project_id);
            continue;
        }

        let mut last_seen: Option<String> = None;
        let mut staged = 0usize;
        loop {
            let page = jira
                .search_issues_page(&project.jira_project_id, last_seen.as_deref())
                .await?;
            if page.is_empty() {
                break;
            }

            let issues: Vec<StagedJiraIssue> = page.iter().filter_map(issue_from_wire).collect();
            let attachments: Vec<StagedJiraAttachment> = page
                .iter()
                .filter_map(|v| string_at(v, "/id").map(|id| attachments_from_wire(&id, v)))
                .flatten()
                .collect();

            store.staging.upsert_jira_issues(&issues).await?;
            store.staging.upsert_jira_attachments(&attachments).await?;

            staged += issues.len();
            last_seen = issues.last().map(|i| i.jira_issue_id.clone());
            if issues.len() < jira.issue_page_size() {
                break;
            }
        }

        store
            .mapping
            .mark_project_issues_extracted(&project.jira_project_id, Some(&Utc::now().to_rfc3339()))
            .await?;
        summary.processed += staged as u64;
        info!("Staged {} issues for project {}", staged, project.jira_project_id);
    }

    let created = store.mapping.sync_issue_mappings().await?;
    debug!("Issue mapping sync touched {} rows", created);
    Ok(())
}

// ---------------------------------------------------------------------------
// Per-issue details
// ---------------------------------------------------------------------------

fn comment_from_wire(issue_id: &str, value: &Value) -> Option<StagedJiraComment> {
    Some(StagedJiraComment {
        jira_comment_id: string_at(value, "/id")?,
        jira_issue_id: issue_id.to_string(),
        author_account_id: string_at(value, "/author/accountId"),
        created: string_at(value, "/created"),
        updated: string_at(value, "/updated"),
        rendered_body: string_at(value, "/renderedBody"),
        raw_payload: value.clone(),
    })
}

fn changelog_from_wire(issue_id: &str, value: &Value) -> Option<StagedJiraChangelogEntry> {
    Some(StagedJiraChangelogEntry {
        jira_changelog_id: string_at(value, "/id")?,
        jira_issue_id: issue_id.to_string(),
        author_account_id: string_at(value, "/author/accountId"),
        created: string_at(value, "/created"),
        raw_payload: value.clone(),
    })
}

/// Whether a recorded detail state allows skipping the fetch this run.
fn can_skip(states: &HashMap<String, IssueDetailState>, issue_id: &str) -> bool {
    states.get(issue_id).map(|s| !s.is_retryable()).unwrap_or(false)
}

async fn record_outcome(
    store: &Store,
    issue_id: &str,
    kind: &str,
    result: Result<usize, JiraRequestError>,
    summary: &mut PhaseSummary,
) -> Result<(), MigrationError> {
    match result {
        Ok(count) => {
            store
                .staging
                .record_issue_detail_state(&IssueDetailState {
                    jira_issue_id: issue_id.to_string(),
                    detail_kind: kind.to_string(),
                    status: IssueDetailState::SUCCESS.to_string(),
                    note: None,
                })
                .await?;
            summary.succeeded += 1;
            debug!("Fetched {} {} for issue {}", count, kind, issue_id);
        }
        Err(error) if error.is_access_denial() => {
            warn!("Issue {} {} fetch denied: {}", issue_id, kind, error);
            store
                .staging
                .record_issue_detail_state(&IssueDetailState {
                    jira_issue_id: issue_id.to_string(),
                    detail_kind: kind.to_string(),
                    status: IssueDetailState::WARNING.to_string(),
                    note: Some(error.to_string()),
                })
                .await?;
            summary.skipped += 1;
        }
        Err(error) => {
            warn!("Issue {} {} fetch failed: {}", issue_id, kind, error);
            store
                .staging
                .record_issue_detail_state(&IssueDetailState {
                    jira_issue_id: issue_id.to_string(),
                    detail_kind: kind.to_string(),
                    status: IssueDetailState::FAILED.to_string(),
                    note: Some(error.to_string()),
                })
                .await?;
            summary.failed += 1;
        }
    }
    Ok(())
}

/// Fetches comments, changelog and watchers for every staged issue that has
/// no successful (or warned) fetch recorded yet.
pub async fn extract_issue_details(
    jira: &JiraClient,
    store: &Store,
    summary: &mut PhaseSummary,
) -> Result<(), MigrationError> {
    let issues = store.staging.fetch_jira_issues().await?;
    let comment_states = store.staging.fetch_issue_detail_states(detail_kind::COMMENTS).await?;
    let changelog_states = store.staging.fetch_issue_detail_states(detail_kind::CHANGELOG).await?;
    let watcher_states = store.staging.fetch_issue_detail_states(detail_kind::WATCHERS).await?;

    for issue in &issues {
        let issue_id = issue.jira_issue_id.as_str();
        summary.processed += 1;

        if !can_skip(&comment_states, issue_id) {
            let result = match jira.fetch_comments(issue_id).await {
                Ok(wire) => {
                    let rows: Vec<StagedJiraComment> =
                        wire.iter().filter_map(|v| comment_from_wire(issue_id, v)).collect();
                    store.staging.upsert_jira_comments(&rows).await?;
                    Ok(rows.len())
                }
                Err(e) => Err(e),
            };
            record_outcome(store, issue_id, detail_kind::COMMENTS, result, summary).await?;
        }

        if !can_skip(&changelog_states, issue_id) {
            let result = match jira.fetch_changelog(issue_id).await {
                Ok(wire) => {
                    let rows: Vec<StagedJiraChangelogEntry> =
                        wire.iter().filter_map(|v| changelog_from_wire(issue_id, v)).collect();
                    store.staging.upsert_jira_changelog(&rows).await?;
                    Ok(rows.len())
                }
                Err(e) => Err(e),
            };
            record_outcome(store, issue_id, detail_kind::CHANGELOG, result, summary).await?;
        }

        if !can_skip(&watcher_states, issue_id) {
            let result = match jira.fetch_watchers(issue_id).await {
                Ok(wire) => {
                    let rows: Vec<StagedJiraWatcher> = wire
                        .iter()
                        .filter_map(|v| {
                            Some(StagedJiraWatcher {
                                jira_issue_id: issue_id.to_string(),
                                jira_account_id: string_at(v, "/accountId")?,
                                raw_payload: v.clone(),
                            })
                        })
                        .collect();
                    store.staging.replace_jira_watchers(issue_id, &rows).await?;
                    Ok(rows.len())
                }
                Err(e) => Err(e),
            };
            record_outcome(store, issue_id, detail_kind::WATCHERS, result, summary).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_project_from_wire() {
        let wire = json!({
            "id": "10001",
            "key": "PROJ",
            "name": "Project",
            "isPrivate": false,
            "lead": {"accountId": "acc-1"}
        });
        let staged = project_from_wire(&wire).unwrap();
        assert_eq!(staged.jira_project_id, "10001");
        assert_eq!(staged.project_key.as_deref(), Some("PROJ"));
        assert_eq!(staged.is_private, Some(false));
        assert_eq!(staged.lead_account_id.as_deref(), Some("acc-1"));
        assert_eq!(staged.raw_payload, wire);
    }

    #[test]
    fn test_project_without_id_is_dropped() {
        assert!(project_from_wire(&json!({"key": "X"})).is_none());
    }

    #[test]
    fn test_bool_canonicalization() {
        assert_eq!(value_as_bool(Some(&json!(true))), Some(true));
        assert_eq!(value_as_bool(Some(&json!(0))), Some(false));
        assert_eq!(value_as_bool(Some(&json!("1"))), Some(true));
        assert_eq!(value_as_bool(Some(&json!("false"))), Some(false));
        assert_eq!(value_as_bool(Some(&json!("maybe"))), None);
        assert_eq!(value_as_bool(None), None);
    }

    #[test]
    fn test_issue_from_wire_extracts_foreign_keys() {
        let wire = json!({
            "id": "20001",
            "key": "PROJ-1",
            "fields": {
                "project": {"id": "10001"},
                "issuetype": {"id": "10002"},
                "status": {"id": "3", "statusCategory": {"key": "done"}},
                "priority": {"id": "2"},
                "reporter": {"accountId": "acc-1"},
                "assignee": null,
                "parent": {"id": "20000"},
                "summary": "Do the thing",
                "created": "2024-05-01T10:00:00.000+0200",
                "duedate": "2024-05-10",
                "timeoriginalestimate": 7200
            }
        });
        let staged = issue_from_wire(&wire).unwrap();
        assert_eq!(staged.jira_issue_id, "20001");
        assert_eq!(staged.jira_project_id.as_deref(), Some("10001"));
        assert_eq!(staged.jira_status_category.as_deref(), Some("done"));
        assert_eq!(staged.jira_assignee_account_id, None);
        assert_eq!(staged.jira_parent_issue_id.as_deref(), Some("20000"));
        assert_eq!(staged.time_original_estimate, Some(7200));
        assert_eq!(staged.due_date.as_deref(), Some("2024-05-10"));
    }

    #[test]
    fn test_attachments_from_wire() {
        let wire = json!({
            "id": "20001",
            "fields": {
                "attachment": [
                    {
                        "id": "900",
                        "filename": "shot.png",
                        "size": 1024,
                        "mimeType": "image/png",
                        "content": "https://x.atlassian.net/rest/api/3/attachment/content/900",
                        "created": "2024-05-01T10:00:30.000+0200"
                    }
                ]
            }
        });
        let attachments = attachments_from_wire("20001", &wire);
        assert_eq!(attachments.len(), 1);
        assert_eq!(attachments[0].jira_attachment_id, "900");
        assert_eq!(attachments[0].jira_issue_id, "20001");
        assert_eq!(attachments[0].filesize, Some(1024));
    }

    #[test]
    fn test_detail_skip_logic() {
        let mut states = HashMap::new();
        states.insert(
            "1".to_string(),
            IssueDetailState {
                jira_issue_id: "1".into(),
                detail_kind: detail_kind::COMMENTS.into(),
                status: IssueDetailState::WARNING.into(),
                note: None,
            },
        );
        states.insert(
            "2".to_string(),
            IssueDetailState {
                jira_issue_id: "2".into(),
                detail_kind: detail_kind::COMMENTS.into(),
                status: IssueDetailState::FAILED.into(),
                note: None,
            },
        );
        // WARNING rows are not retried, FAILED rows are, unknown rows are fetched.
        assert!(can_skip(&states, "1"));
        assert!(!can_skip(&states, "2"));
        assert!(!can_skip(&states, "3"));
    }
}
