// /////////////////////////////////////////////////////////////////////////////
// Jira2Redmine Migration RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Phase Orchestrator
//!
//! Sequences the phases of one entity family per invocation. `--phases` and
//! `--skip` intersect with the family's default list; the default order is
//! always preserved. `--confirm-push` gates every Redmine write and
//! `--confirm-pull` every attachment download; `--dry-run` runs the full
//! proposal path but previews pull/push payloads instead of calling out.
//!
//! Families must be migrated in this order across invocations:
//! projects → users → issues → attachments → journals → watchers →
//! subtasks. Later families gate themselves on the mapping state the earlier
//! ones leave behind, so running them early is safe but useless.

use chrono::Utc;
use tracing::info;

use jira2redmine_bootstrap::{EntityCommand, Phase, ValidatedCli};
use jira2redmine_domain::MigrationError;

use crate::application::summary::PhaseSummary;
use crate::application::{attachments, extract, push, transform};
use crate::infrastructure::clients::{GraphClient, JiraClient, RedmineClient};
use crate::infrastructure::config::MigrationConfig;
use crate::infrastructure::repositories::{schema, Store};

/// The default phase list of each entity family.
pub fn default_phases(entity: EntityCommand) -> Vec<Phase> {
    match entity {
        EntityCommand::Projects | EntityCommand::Users => {
            vec![Phase::Jira, Phase::Redmine, Phase::Transform, Phase::Push]
        }
        EntityCommand::Issues => vec![Phase::Jira, Phase::Transform, Phase::Push],
        EntityCommand::Attachments => vec![Phase::Jira, Phase::Transform, Phase::Pull, Phase::Push],
        EntityCommand::Journals | EntityCommand::Watchers => vec![Phase::Transform, Phase::Push],
        EntityCommand::Subtasks => vec![Phase::Push],
    }
}

/// Intersects the family default with `--phases` and removes `--skip`,
/// keeping the default order.
pub fn selected_phases(entity: EntityCommand, requested: &[Phase], skipped: &[Phase]) -> Vec<Phase> {
    default_phases(entity)
        .into_iter()
        .filter(|phase| requested.is_empty() || requested.contains(phase))
        .filter(|phase| !skipped.contains(phase))
        .collect()
}

fn entity_name(entity: EntityCommand) -> &'static str {
    match entity {
        EntityCommand::Projects => "projects",
        EntityCommand::Users => "users",
        EntityCommand::Issues => "issues",
        EntityCommand::Attachments => "attachments",
        EntityCommand::Journals => "journals",
        EntityCommand::Watchers => "watchers",
        EntityCommand::Subtasks => "subtasks",
    }
}

/// Checks the confirmation gates before anything external is touched.
pub fn check_gates(cli: &ValidatedCli, phases: &[Phase]) -> Result<(), MigrationError> {
    if cli.dry_run {
        return Ok(());
    }
    if phases.contains(&Phase::Push) && !cli.confirm_push {
        return Err(MigrationError::InvalidConfiguration(
            "the push phase writes to Redmine; pass --confirm-push (or --dry-run) to proceed".into(),
        ));
    }
    if phases.contains(&Phase::Pull) && !cli.confirm_pull {
        return Err(MigrationError::InvalidConfiguration(
            "the pull phase downloads from Jira; pass --confirm-pull (or --dry-run) to proceed".into(),
        ));
    }
    Ok(())
}

/// Runs one validated invocation end to end.
pub async fn run(cli: ValidatedCli) -> Result<(), MigrationError> {
    let config = MigrationConfig::load(cli.config.as_deref())?;
    let phases = selected_phases(cli.command, &cli.phases, &cli.skip);
    if phases.is_empty() {
        info!("No phases selected for {}; nothing to do", entity_name(cli.command));
        return Ok(());
    }

    check_gates(&cli, &phases)?;

    // The attachments "jira" step is a local scan of staged rows; it needs
    // no Jira credentials.
    let mut credential_phases = phases.clone();
    if matches!(cli.command, EntityCommand::Attachments) {
        credential_phases.retain(|p| *p != Phase::Jira);
    }
    config.validate_for_phases(&credential_phases)?;

    let pool = schema::initialize_database(&config.database.url)
        .await
        .map_err(|e| MigrationError::DatabaseError(format!("cannot initialize mapping database: {}", e)))?;
    let store = Store::new(pool);

    let needs_jira = match cli.command {
        EntityCommand::Projects | EntityCommand::Users | EntityCommand::Issues => {
            phases.contains(&Phase::Jira)
        }
        EntityCommand::Attachments => phases.contains(&Phase::Pull),
        _ => false,
    };
    let jira = if needs_jira {
        Some(JiraClient::new(&config.jira)?)
    } else {
        None
    };

    let needs_redmine = phases.iter().any(|p| matches!(p, Phase::Redmine | Phase::Push));
    let redmine = if needs_redmine {
        Some(RedmineClient::new(&config.redmine, cli.use_extended_api)?)
    } else {
        None
    };

    let graph = match (&config.sharepoint, phases.contains(&Phase::Push)) {
        (Some(sharepoint), true) if matches!(cli.command, EntityCommand::Attachments) => {
            Some(GraphClient::new(sharepoint.clone(), config.sharepoint_chunk_size())?)
        }
        _ => None,
    };

    for phase in &phases {
        let mut summary = PhaseSummary::new();
        info!(
            "=== {} / {} phase started at {} ===",
            entity_name(cli.command),
            phase,
            Utc::now().format("%Y-%m-%dT%H:%M:%SZ")
        );

        run_phase(&cli, &config, &store, jira.as_ref(), redmine.as_ref(), graph.as_ref(), *phase, &mut summary)
            .await?;

        info!("=== {} / {} phase summary: {} ===", entity_name(cli.command), phase, summary);
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn run_phase(
    cli: &ValidatedCli,
    config: &MigrationConfig,
    store: &Store,
    jira: Option<&JiraClient>,
    redmine: Option<&RedmineClient>,
    graph: Option<&GraphClient>,
    phase: Phase,
    summary: &mut PhaseSummary,
) -> Result<(), MigrationError> {
    let jira_client = || {
        jira.ok_or_else(|| MigrationError::InvalidConfiguration("Jira client not configured".into()))
    };
    let redmine_client = || {
        redmine.ok_or_else(|| MigrationError::InvalidConfiguration("Redmine client not configured".into()))
    };

    match (cli.command, phase) {
        (EntityCommand::Projects, Phase::Jira) => {
            extract::jira::extract_projects(jira_client()?, store, summary).await
        }
        (EntityCommand::Projects, Phase::Redmine) => {
            extract::redmine::snapshot_projects(redmine_client()?, store, summary).await
        }
        (EntityCommand::Projects, Phase::Transform) => transform::projects::run(store, summary).await,
        (EntityCommand::Projects, Phase::Push) => {
            push::projects::run(store, redmine_client()?, cli.dry_run, summary).await
        }

        (EntityCommand::Users, Phase::Jira) => {
            extract::jira::extract_users(jira_client()?, store, summary).await
        }
        (EntityCommand::Users, Phase::Redmine) => {
            extract::redmine::snapshot_users(redmine_client()?, store, summary).await
        }
        (EntityCommand::Users, Phase::Transform) => {
            transform::users::run(store, config.defaults.new_user_status, summary).await
        }
        (EntityCommand::Users, Phase::Push) => {
            push::users::run(store, redmine_client()?, &config.defaults, cli.dry_run, summary).await
        }

        (EntityCommand::Issues, Phase::Jira) => {
            extract::jira::extract_issues(jira_client()?, store, summary).await?;
            extract::jira::extract_issue_details(jira_client()?, store, summary).await
        }
        (EntityCommand::Issues, Phase::Transform) => {
            transform::issues::run(store, &config.defaults, summary).await
        }
        (EntityCommand::Issues, Phase::Push) => {
            push::issues::run(store, redmine_client()?, cli.dry_run, summary).await
        }

        (EntityCommand::Attachments, Phase::Jira) => attachments::sync_from_staging(store, summary).await,
        (EntityCommand::Attachments, Phase::Transform) => transform::attachments::run(store, summary).await,
        (EntityCommand::Attachments, Phase::Pull) => {
            attachments::pull::run(
                jira_client()?,
                store,
                &config.attachments,
                cli.download_limit,
                cli.dry_run,
                summary,
            )
            .await
        }
        (EntityCommand::Attachments, Phase::Push) => {
            attachments::upload::run(
                store,
                redmine_client()?,
                graph,
                config.sharepoint.as_ref(),
                cli.upload_limit,
                cli.dry_run,
                summary,
            )
            .await
        }

        (EntityCommand::Journals, Phase::Transform) => transform::journals::run(store, summary).await,
        (EntityCommand::Journals, Phase::Push) => {
            push::journals::run(store, redmine_client()?, cli.dry_run, summary).await
        }

        (EntityCommand::Watchers, Phase::Transform) => transform::watchers::run(store, summary).await,
        (EntityCommand::Watchers, Phase::Push) => {
            push::watchers::run(store, redmine_client()?, cli.dry_run, summary).await
        }

        (EntityCommand::Subtasks, Phase::Push) => {
            push::subtasks::run(store, redmine_client()?, cli.dry_run, summary).await
        }

        (entity, phase) => {
            info!("Phase {} does not apply to {}; skipping", phase, entity_name(entity));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(command: EntityCommand) -> ValidatedCli {
        ValidatedCli {
            command,
            verbose: false,
            config: None,
            phases: Vec::new(),
            skip: Vec::new(),
            confirm_push: false,
            confirm_pull: false,
            dry_run: false,
            use_extended_api: false,
            download_limit: None,
            upload_limit: None,
        }
    }

    #[test]
    fn test_default_phase_lists() {
        assert_eq!(
            default_phases(EntityCommand::Projects),
            vec![Phase::Jira, Phase::Redmine, Phase::Transform, Phase::Push]
        );
        assert_eq!(
            default_phases(EntityCommand::Attachments),
            vec![Phase::Jira, Phase::Transform, Phase::Pull, Phase::Push]
        );
        assert_eq!(default_phases(EntityCommand::Subtasks), vec![Phase::Push]);
    }

    #[test]
    fn test_phase_selection_intersects_and_keeps_order() {
        let selected = selected_phases(
            EntityCommand::Projects,
            &[Phase::Push, Phase::Jira],
            &[],
        );
        assert_eq!(selected, vec![Phase::Jira, Phase::Push]);
    }

    #[test]
    fn test_phases_outside_the_family_default_are_ignored() {
        let selected = selected_phases(EntityCommand::Journals, &[Phase::Jira, Phase::Transform], &[]);
        assert_eq!(selected, vec![Phase::Transform]);
    }

    #[test]
    fn test_skip_removes_phases() {
        let selected = selected_phases(EntityCommand::Projects, &[], &[Phase::Push]);
        assert_eq!(selected, vec![Phase::Jira, Phase::Redmine, Phase::Transform]);
    }

    #[test]
    fn test_push_gate_requires_confirmation() {
        let result = check_gates(&cli(EntityCommand::Projects), &[Phase::Transform, Phase::Push]);
        assert!(matches!(result, Err(MigrationError::InvalidConfiguration(_))));

        let mut confirmed = cli(EntityCommand::Projects);
        confirmed.confirm_push = true;
        assert!(check_gates(&confirmed, &[Phase::Transform, Phase::Push]).is_ok());
    }

    #[test]
    fn test_pull_gate_requires_confirmation() {
        let result = check_gates(&cli(EntityCommand::Attachments), &[Phase::Pull]);
        assert!(result.is_err());

        let mut confirmed = cli(EntityCommand::Attachments);
        confirmed.confirm_pull = true;
        assert!(check_gates(&confirmed, &[Phase::Pull]).is_ok());
    }

    #[test]
    fn test_dry_run_bypasses_gates() {
        let mut dry = cli(EntityCommand::Projects);
        dry.dry_run = true;
        assert!(check_gates(&dry, &[Phase::Push, Phase::Pull]).is_ok());
    }

    #[test]
    fn test_transform_only_needs_no_gate() {
        assert!(check_gates(&cli(EntityCommand::Issues), &[Phase::Transform]).is_ok());
    }
}
