// /////////////////////////////////////////////////////////////////////////////
// Jira2Redmine Migration RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # User Reconciler
//!
//! Matches Jira users against the Redmine snapshot by lowercased email:
//! exactly one `login` match wins (`match_type = LOGIN`), else exactly one
//! `mail` match (`match_type = MAIL`), multiple matches go to manual. With
//! no match, a creation proposal is built: login and mail are the Jira
//! email, first/last name come from the display name ("Last, First" splits
//! on the comma, anything else first-word/rest), and the account status is
//! the configured default for new users.

use std::collections::HashMap;

use tracing::{debug, info};

use jira2redmine_domain::entities::{
    RedmineUserSnapshot, StagedJiraUser, UserMapping, UserProposal,
};
use jira2redmine_domain::entities::UserAutomatedFields;
use jira2redmine_domain::services::{hash_guard, split_display_name};
use jira2redmine_domain::value_objects::{MatchType, MigrationStatus};
use jira2redmine_domain::MigrationError;

use crate::application::summary::PhaseSummary;
use crate::infrastructure::config::NewUserStatus;
use crate::infrastructure::repositories::Store;

const TRANSFORMABLE: [MigrationStatus; 3] = [
    MigrationStatus::PendingAnalysis,
    MigrationStatus::ReadyForCreation,
    MigrationStatus::MatchFound,
];

/// Redmine numeric account status rendered for the proposal column.
fn status_label(status: Option<i64>) -> String {
    match status {
        Some(1) => "ACTIVE".to_string(),
        Some(2) => "REGISTERED".to_string(),
        Some(3) => "LOCKED".to_string(),
        _ => "LOCKED".to_string(),
    }
}

/// Email-keyed views over the Redmine user snapshot.
struct SnapshotIndex {
    by_login: HashMap<String, Vec<RedmineUserSnapshot>>,
    by_mail: HashMap<String, Vec<RedmineUserSnapshot>>,
}

impl SnapshotIndex {
    fn build(snapshot: Vec<RedmineUserSnapshot>) -> Self {
        let mut by_login: HashMap<String, Vec<RedmineUserSnapshot>> = HashMap::new();
        let mut by_mail: HashMap<String, Vec<RedmineUserSnapshot>> = HashMap::new();
        for user in snapshot {
            if let Some(login) = &user.login {
                by_login.entry(login.to_lowercase()).or_default().push(user.clone());
            }
            if let Some(mail) = &user.mail {
                by_mail.entry(mail.to_lowercase()).or_default().push(user.clone());
            }
        }
        SnapshotIndex { by_login, by_mail }
    }
}

/// Runs the user transform over every mapping row.
pub async fn run(
    store: &Store,
    default_status: NewUserStatus,
    summary: &mut PhaseSummary,
) -> Result<(), MigrationError> {
    store.mapping.sync_user_mappings().await?;

    let staged: HashMap<String, StagedJiraUser> = store
        .staging
        .fetch_jira_users()
        .await?
        .into_iter()
        .map(|u| (u.jira_account_id.clone(), u))
        .collect();
    let index = SnapshotIndex::build(store.staging.fetch_redmine_users().await?);

    for row in store.mapping.fetch_user_mappings().await? {
        summary.processed += 1;

        let current_fields = row.automated_fields();
        let current_hash = hash_guard::compute(&current_fields)?;
        if hash_guard::is_manual_override(row.automation_hash.as_deref(), &current_hash) {
            debug!("User {} is manually overridden, preserving", row.jira_account_id);
            summary.overrides += 1;
            continue;
        }
        if !TRANSFORMABLE.contains(&row.migration_status) {
            summary.skipped += 1;
            continue;
        }

        let source = staged.get(&row.jira_account_id);
        let proposal = derive(&row, source, &index, default_status);
        match proposal.fields.migration_status {
            MigrationStatus::MatchFound => summary.matched += 1,
            MigrationStatus::ReadyForCreation => summary.ready += 1,
            MigrationStatus::ManualInterventionRequired => summary.manual += 1,
            _ => {}
        }

        let new_hash = hash_guard::compute(&proposal.fields)?;
        let display = source.and_then(|s| s.display_name.clone());
        let email = source.and_then(|s| s.email_address.clone());
        if proposal.fields != current_fields
            || row.automation_hash.as_deref() != Some(new_hash.as_str())
            || row.match_type != proposal.match_type
        {
            store
                .mapping
                .update_user_automated(
                    row.mapping_id,
                    &proposal.fields,
                    proposal.match_type,
                    display.as_deref(),
                    email.as_deref(),
                    new_hash.as_str(),
                )
                .await?;
        } else {
            summary.unchanged += 1;
        }
    }

    info!("User transform: {}", summary);
    Ok(())
}

/// Computes the automated proposal for one user row.
fn derive(
    row: &UserMapping,
    staged: Option<&StagedJiraUser>,
    index: &SnapshotIndex,
    default_status: NewUserStatus,
) -> UserProposal {
    let Some(staged) = staged else {
        return manual(row, "No staged Jira user for this mapping row; re-run the jira phase.");
    };

    let Some(email) = staged
        .email_address
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .map(str::to_lowercase)
    else {
        return manual(
            row,
            &format!(
                "Jira user '{}' has no email address; map it manually.",
                staged.display_name.as_deref().unwrap_or(&row.jira_account_id)
            ),
        );
    };

    if let Some(matched) = lookup(&index.by_login, &email) {
        return match matched {
            Lookup::One(user) => adopt(user, MatchType::Login),
            Lookup::Many(count) => manual(
                row,
                &format!("{} Redmine logins equal '{}'; resolve the duplicate accounts.", count, email),
            ),
        };
    }
    if let Some(matched) = lookup(&index.by_mail, &email) {
        return match matched {
            Lookup::One(user) => adopt(user, MatchType::Mail),
            Lookup::Many(count) => manual(
                row,
                &format!("{} Redmine accounts share mail '{}'; resolve the duplicates.", count, email),
            ),
        };
    }

    // No existing account: propose creation.
    let display_name = staged.display_name.as_deref().unwrap_or("");
    let (firstname, lastname) = match split_display_name(display_name) {
        Ok(parts) => parts,
        Err(error) => {
            return manual(
                row,
                &format!("Cannot split display name '{}': {}", display_name, error),
            );
        }
    };

    UserProposal {
        fields: UserAutomatedFields {
            redmine_user_id: None,
            migration_status: MigrationStatus::ReadyForCreation,
            notes: None,
            proposed_redmine_login: Some(email.clone()),
            proposed_redmine_mail: Some(email),
            proposed_firstname: Some(firstname),
            proposed_lastname: Some(lastname),
            proposed_redmine_status: Some(default_status.as_str().to_string()),
        },
        match_type: None,
    }
}

enum Lookup<'a> {
    One(&'a RedmineUserSnapshot),
    Many(usize),
}

fn lookup<'a>(
    map: &'a HashMap<String, Vec<RedmineUserSnapshot>>,
    email: &str,
) -> Option<Lookup<'a>> {
    match map.get(email) {
        Some(users) if users.len() == 1 => Some(Lookup::One(&users[0])),
        Some(users) if users.len() > 1 => Some(Lookup::Many(users.len())),
        _ => None,
    }
}

fn adopt(user: &RedmineUserSnapshot, match_type: MatchType) -> UserProposal {
    UserProposal {
        fields: UserAutomatedFields {
            redmine_user_id: Some(user.redmine_user_id),
            migration_status: MigrationStatus::MatchFound,
            notes: None,
            proposed_redmine_login: user.login.clone(),
            proposed_redmine_mail: user.mail.clone(),
            proposed_firstname: user.firstname.clone(),
            proposed_lastname: user.lastname.clone(),
            proposed_redmine_status: Some(status_label(user.status)),
        },
        match_type: Some(match_type),
    }
}

fn manual(row: &UserMapping, note: &str) -> UserProposal {
    UserProposal {
        fields: UserAutomatedFields {
            redmine_user_id: row.redmine_user_id,
            migration_status: MigrationStatus::ManualInterventionRequired,
            notes: Some(note.to_string()),
            proposed_redmine_login: row.proposed_redmine_login.clone(),
            proposed_redmine_mail: row.proposed_redmine_mail.clone(),
            proposed_firstname: row.proposed_firstname.clone(),
            proposed_lastname: row.proposed_lastname.clone(),
            proposed_redmine_status: row.proposed_redmine_status.clone(),
        },
        match_type: row.match_type,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row() -> UserMapping {
        UserMapping {
            mapping_id: 1,
            jira_account_id: "a1".into(),
            redmine_user_id: None,
            migration_status: MigrationStatus::PendingAnalysis,
            match_type: None,
            notes: None,
            proposed_redmine_login: None,
            proposed_redmine_mail: None,
            proposed_firstname: None,
            proposed_lastname: None,
            proposed_redmine_status: None,
            automation_hash: None,
            jira_display_name: None,
            jira_email_address: None,
        }
    }

    fn jira_user(email: Option<&str>, display: &str) -> StagedJiraUser {
        StagedJiraUser {
            jira_account_id: "a1".into(),
            email_address: email.map(String::from),
            display_name: Some(display.to_string()),
            active: Some(true),
            account_type: Some("atlassian".into()),
            raw_payload: json!({}),
        }
    }

    fn redmine_user(id: i64, login: &str, mail: &str) -> RedmineUserSnapshot {
        RedmineUserSnapshot {
            redmine_user_id: id,
            login: Some(login.to_string()),
            mail: Some(mail.to_string()),
            firstname: Some("Alice".into()),
            lastname: Some("Smith".into()),
            status: Some(1),
            raw_payload: json!({}),
        }
    }

    #[test]
    fn test_login_match_wins() {
        let index = SnapshotIndex::build(vec![redmine_user(42, "alice@example.com", "alice@example.com")]);
        let proposal = derive(
            &row(),
            Some(&jira_user(Some("Alice@Example.com"), "Alice Smith")),
            &index,
            NewUserStatus::Locked,
        );
        assert_eq!(proposal.fields.migration_status, MigrationStatus::MatchFound);
        assert_eq!(proposal.match_type, Some(MatchType::Login));
        assert_eq!(proposal.fields.redmine_user_id, Some(42));
        assert_eq!(proposal.fields.proposed_redmine_status.as_deref(), Some("ACTIVE"));
    }

    #[test]
    fn test_mail_match_when_login_differs() {
        let index = SnapshotIndex::build(vec![redmine_user(43, "asmith", "alice@example.com")]);
        let proposal = derive(
            &row(),
            Some(&jira_user(Some("alice@example.com"), "Alice Smith")),
            &index,
            NewUserStatus::Locked,
        );
        assert_eq!(proposal.match_type, Some(MatchType::Mail));
        assert_eq!(proposal.fields.redmine_user_id, Some(43));
    }

    #[test]
    fn test_ambiguous_mail_goes_manual() {
        let index = SnapshotIndex::build(vec![
            redmine_user(43, "a", "shared@example.com"),
            redmine_user(44, "b", "shared@example.com"),
        ]);
        let proposal = derive(
            &row(),
            Some(&jira_user(Some("shared@example.com"), "Alice Smith")),
            &index,
            NewUserStatus::Locked,
        );
        assert_eq!(
            proposal.fields.migration_status,
            MigrationStatus::ManualInterventionRequired
        );
    }

    #[test]
    fn test_no_match_proposes_creation_with_default_status() {
        let index = SnapshotIndex::build(vec![]);
        let proposal = derive(
            &row(),
            Some(&jira_user(Some("new@example.com"), "Smith, Alice")),
            &index,
            NewUserStatus::Locked,
        );
        assert_eq!(proposal.fields.migration_status, MigrationStatus::ReadyForCreation);
        assert_eq!(proposal.fields.proposed_redmine_login.as_deref(), Some("new@example.com"));
        assert_eq!(proposal.fields.proposed_firstname.as_deref(), Some("Alice"));
        assert_eq!(proposal.fields.proposed_lastname.as_deref(), Some("Smith"));
        assert_eq!(proposal.fields.proposed_redmine_status.as_deref(), Some("LOCKED"));
        assert_eq!(proposal.match_type, None);
    }

    #[test]
    fn test_missing_email_goes_manual() {
        let proposal = derive(
            &row(),
            Some(&jira_user(None, "Alice Smith")),
            &SnapshotIndex::build(vec![]),
            NewUserStatus::Locked,
        );
        assert_eq!(
            proposal.fields.migration_status,
            MigrationStatus::ManualInterventionRequired
        );
        assert!(proposal.fields.notes.unwrap().contains("email"));
    }

    #[test]
    fn test_unsplittable_name_goes_manual() {
        let proposal = derive(
            &row(),
            Some(&jira_user(Some("x@example.com"), "Prince")),
            &SnapshotIndex::build(vec![]),
            NewUserStatus::Locked,
        );
        assert_eq!(
            proposal.fields.migration_status,
            MigrationStatus::ManualInterventionRequired
        );
    }
}
