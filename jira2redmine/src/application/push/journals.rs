// /////////////////////////////////////////////////////////////////////////////
// Jira2Redmine Migration RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Journal Pusher
//!
//! Adds one Redmine journal per ready row by updating the owning issue.
//! With the extended API, author and timestamps are set explicitly. Without
//! it, a hidden `<!-- MIGRATE:{mapping_id} -->` token is appended to the
//! notes and the created journal is located by re-fetching the issue with
//! `include=journals`:
//!
//! 1. substring match on the hidden token,
//! 2. failing that, the single journal whose `created_on` is within ±30 s
//!    of the Jira timestamp,
//! 3. failing that, the journal with the largest id.
//!
//! Attachments hinted `JOURNAL` whose unique filename appears in the journal
//! body ride along as uploads and are associated afterwards.

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tracing::{info, warn};

use jira2redmine_domain::services::hash_guard;
use jira2redmine_domain::value_objects::{AssociationHint, MigrationStatus};
use jira2redmine_domain::MigrationError;

use crate::application::attachments::associate::associate_issue_attachments;
use crate::application::summary::PhaseSummary;
use crate::infrastructure::clients::RedmineClient;
use crate::infrastructure::repositories::Store;

/// Time window for locating a journal by its creation timestamp.
const LOCATE_WINDOW_SECS: i64 = 30;

/// One journal as Redmine reports it.
#[derive(Debug, Clone)]
pub(crate) struct RemoteJournal {
    pub id: i64,
    pub notes: Option<String>,
    pub created_on: Option<String>,
}

pub(crate) fn parse_remote_journals(issue: &Value) -> Vec<RemoteJournal> {
    issue
        .pointer("/issue/journals")
        .and_then(Value::as_array)
        .map(|journals| {
            journals
                .iter()
                .filter_map(|journal| {
                    Some(RemoteJournal {
                        id: journal.get("id").and_then(Value::as_i64)?,
                        notes: journal.get("notes").and_then(Value::as_str).map(String::from),
                        created_on: journal.get("created_on").and_then(Value::as_str).map(String::from),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Locates the journal a push created. See the module docs for the
/// three-step protocol.
pub(crate) fn locate_journal(
    journals: &[RemoteJournal],
    hidden_token: &str,
    expected_created_on: Option<&str>,
) -> Option<i64> {
    if let Some(found) = journals
        .iter()
        .find(|j| j.notes.as_deref().is_some_and(|n| n.contains(hidden_token)))
    {
        return Some(found.id);
    }

    if let Some(expected) = expected_created_on.and_then(|e| DateTime::parse_from_rfc3339(e).ok()) {
        let expected = expected.with_timezone(&Utc);
        let close: Vec<&RemoteJournal> = journals
            .iter()
            .filter(|j| {
                j.created_on
                    .as_deref()
                    .and_then(|c| DateTime::parse_from_rfc3339(c).ok())
                    .map(|c| (c.with_timezone(&Utc) - expected).num_seconds().abs() <= LOCATE_WINDOW_SECS)
                    .unwrap_or(false)
            })
            .collect();
        if close.len() == 1 {
            return Some(close[0].id);
        }
    }

    journals.iter().map(|j| j.id).max()
}

/// Runs the journal push over all ready rows.
pub async fn run(
    store: &Store,
    redmine: &RedmineClient,
    dry_run: bool,
    summary: &mut PhaseSummary,
) -> Result<(), MigrationError> {
    let issue_ids = store.mapping.issue_id_lookup().await?;

    for row in store.mapping.fetch_ready_journals().await? {
        summary.processed += 1;

        let Some(&redmine_issue_id) = issue_ids.get(&row.jira_issue_id) else {
            summary.skipped += 1;
            continue;
        };
        let Some(body) = row.proposed_notes.clone().filter(|n| !n.trim().is_empty()) else {
            summary.skipped += 1;
            continue;
        };

        let extended = redmine.extended_api().await;
        let hidden_token = format!("<!-- MIGRATE:{} -->", row.mapping_id);
        let notes = if extended {
            body
        } else {
            format!("{}\n{}", body, hidden_token)
        };

        // Journal-hinted uploads referenced by this journal's body.
        let attachments = store.mapping.fetch_attachments_for_issue(&row.jira_issue_id).await?;
        let uploads: Vec<Value> = attachments
            .iter()
            .filter(|att| {
                att.association_hint == Some(AssociationHint::Journal)
                    && att.migration_status == MigrationStatus::PendingAssociation
                    && att.redmine_upload_token.is_some()
            })
            .filter(|att| {
                att.local_filepath
                    .as_deref()
                    .and_then(|p| std::path::Path::new(p).file_name())
                    .map(|n| notes.contains(&n.to_string_lossy().into_owned()))
                    .unwrap_or(false)
            })
            .map(|att| {
                json!({
                    "token": att.redmine_upload_token,
                    "filename": att
                        .local_filepath
                        .as_deref()
                        .and_then(|p| std::path::Path::new(p).file_name())
                        .map(|n| n.to_string_lossy().into_owned()),
                    "content_type": "application/octet-stream",
                })
            })
            .collect();

        let mut issue = json!({ "notes": notes });
        if !uploads.is_empty() {
            issue["uploads"] = Value::Array(uploads.clone());
        }
        if extended {
            let mut journal = json!({});
            if let Some(author) = row.proposed_author_id {
                journal["user_id"] = json!(author);
                journal["updated_by_id"] = json!(author);
            }
            if let Some(created) = &row.proposed_created_on {
                journal["created_on"] = json!(created);
            }
            if let Some(updated) = &row.proposed_updated_on {
                journal["updated_on"] = json!(updated);
            }
            issue["journal"] = journal;
            if let Some(updated) = &row.proposed_updated_on {
                issue["updated_on"] = json!(updated);
            }
        }
        let payload = json!({ "issue": issue });

        if dry_run {
            info!(target: "dry_run", "Would update issue {}: {}", redmine_issue_id, payload);
            summary.previewed += 1;
            continue;
        }

        let mut fields = row.automated_fields();
        match redmine.update_issue(redmine_issue_id, &payload).await {
            Ok(()) => {
                let fetched = redmine.get_issue(redmine_issue_id, "journals").await?;
                let journals = parse_remote_journals(&fetched);
                fields.redmine_journal_id =
                    locate_journal(&journals, &hidden_token, row.proposed_created_on.as_deref());
                fields.migration_status = MigrationStatus::Success;
                fields.notes = None;
                summary.succeeded += 1;

                if !uploads.is_empty() {
                    associate_issue_attachments(store, redmine, &row.jira_issue_id, redmine_issue_id).await?;
                }
            }
            Err(error) => {
                warn!(
                    "Journal push for issue {} (mapping {}) failed: {}",
                    row.jira_issue_id, row.mapping_id, error
                );
                fields.migration_status = MigrationStatus::Failed;
                fields.notes = Some(error.message);
                summary.failed += 1;
            }
        }

        let hash = hash_guard::compute(&fields)?;
        store
            .mapping
            .update_journal_automated(row.mapping_id, &fields, hash.as_str())
            .await?;
    }

    info!("Journal push: {}", summary);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn journal(id: i64, notes: Option<&str>, created_on: Option<&str>) -> RemoteJournal {
        RemoteJournal {
            id,
            notes: notes.map(String::from),
            created_on: created_on.map(String::from),
        }
    }

    #[test]
    fn test_locate_by_hidden_token() {
        let journals = vec![
            journal(1, Some("first"), None),
            journal(2, Some("body\n<!-- MIGRATE:42 -->"), None),
        ];
        assert_eq!(locate_journal(&journals, "<!-- MIGRATE:42 -->", None), Some(2));
    }

    #[test]
    fn test_locate_by_timestamp_window() {
        let journals = vec![
            journal(1, None, Some("2024-05-01T08:00:00Z")),
            journal(2, None, Some("2024-05-01T12:00:00Z")),
        ];
        assert_eq!(
            locate_journal(&journals, "<!-- MIGRATE:1 -->", Some("2024-05-01T08:00:20Z")),
            Some(1)
        );
    }

    #[test]
    fn test_ambiguous_timestamp_falls_back_to_largest_id() {
        let journals = vec![
            journal(1, None, Some("2024-05-01T08:00:00Z")),
            journal(2, None, Some("2024-05-01T08:00:10Z")),
        ];
        // Both are inside the window, so the largest id wins.
        assert_eq!(
            locate_journal(&journals, "<!-- MIGRATE:1 -->", Some("2024-05-01T08:00:05Z")),
            Some(2)
        );
    }

    #[test]
    fn test_no_journals_yields_none() {
        assert_eq!(locate_journal(&[], "<!-- MIGRATE:1 -->", None), None);
    }

    #[test]
    fn test_parse_remote_journals() {
        let issue = serde_json::json!({
            "issue": {
                "journals": [
                    {"id": 5, "notes": "n", "created_on": "2024-05-01T08:00:00Z"},
                    {"id": 6}
                ]
            }
        });
        let journals = parse_remote_journals(&issue);
        assert_eq!(journals.len(), 2);
        assert_eq!(journals[0].id, 5);
        assert_eq!(journals[1].notes, None);
    }
}
