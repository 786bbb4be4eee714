// /////////////////////////////////////////////////////////////////////////////
// Jira2Redmine Migration RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Command-Line Interface Module
//!
//! Bootstrap-layer CLI handling: parse with clap, then validate into a
//! `ValidatedCli` the application layer can trust.
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │  1. parse_cli()                     │  Parse CLI with clap
//! └─────────────────┬───────────────────┘
//!                   ↓
//! ┌─────────────────────────────────────┐
//! │  2. validate_cli()                  │  Phase names, limits, gates
//! └─────────────────┬───────────────────┘
//!                   ↓
//! ┌─────────────────────────────────────┐
//! │  3. ValidatedCli                    │  Safe, validated invocation
//! └─────────────────────────────────────┘
//! ```
//!
//! One subcommand per entity family; `--phases`/`--skip` narrow the family's
//! default phase list, `--confirm-push`/`--confirm-pull` gate writes, and
//! `--dry-run` previews instead of mutating.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use clap::{Parser, Subcommand};
use thiserror::Error;

/// Validation failures for CLI arguments.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid value for --{arg}: {reason}")]
    InvalidValue { arg: String, reason: String },

    #[error("unknown phase '{0}' (expected jira, redmine, transform, push or pull)")]
    UnknownPhase(String),
}

/// A pipeline phase selectable via `--phases` / `--skip`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Jira,
    Redmine,
    Transform,
    Pull,
    Push,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Jira => "jira",
            Phase::Redmine => "redmine",
            Phase::Transform => "transform",
            Phase::Pull => "pull",
            Phase::Push => "push",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "jira" => Ok(Phase::Jira),
            "redmine" => Ok(Phase::Redmine),
            "transform" => Ok(Phase::Transform),
            "pull" => Ok(Phase::Pull),
            "push" => Ok(Phase::Push),
            other => Err(ParseError::UnknownPhase(other.to_string())),
        }
    }
}

/// The entity family a run operates on. Families must be migrated in the
/// order they are declared here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum EntityCommand {
    /// Migrate Jira projects to Redmine projects
    Projects,
    /// Migrate Jira users to Redmine users
    Users,
    /// Migrate Jira issues (requires projects and users)
    Issues,
    /// Download and upload issue attachments
    Attachments,
    /// Migrate comments and changelogs as Redmine journals
    Journals,
    /// Migrate issue watchers
    Watchers,
    /// Close open parent links between migrated issues
    Subtasks,
}

/// Raw CLI surface.
#[derive(Debug, Parser)]
#[command(
    name = "jira2redmine",
    version,
    about = "Staged, resumable migration of a Jira Cloud instance into Redmine"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: EntityCommand,

    /// Increase log verbosity to debug
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to the configuration file (default: jira2redmine.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Comma-separated phases to run (intersected with the family default)
    #[arg(long, global = true, value_delimiter = ',')]
    pub phases: Vec<String>,

    /// Comma-separated phases to skip
    #[arg(long, global = true, value_delimiter = ',')]
    pub skip: Vec<String>,

    /// Allow writes to Redmine (push phase refuses without it)
    #[arg(long, global = true)]
    pub confirm_push: bool,

    /// Allow attachment downloads from Jira (pull phase refuses without it)
    #[arg(long, global = true)]
    pub confirm_pull: bool,

    /// Compute and preview every proposal without calling any remote API
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Use the Redmine extended API for journal author/timestamp overrides
    #[arg(long, global = true)]
    pub use_extended_api: bool,

    /// Maximum number of attachments to download in this run
    #[arg(long, global = true)]
    pub download_limit: Option<usize>,

    /// Maximum number of attachments to upload in this run
    #[arg(long, global = true)]
    pub upload_limit: Option<usize>,
}

/// Validated CLI invocation handed to the application layer.
#[derive(Debug, Clone)]
pub struct ValidatedCli {
    pub command: EntityCommand,
    pub verbose: bool,
    pub config: Option<PathBuf>,
    pub phases: Vec<Phase>,
    pub skip: Vec<Phase>,
    pub confirm_push: bool,
    pub confirm_pull: bool,
    pub dry_run: bool,
    pub use_extended_api: bool,
    pub download_limit: Option<usize>,
    pub upload_limit: Option<usize>,
}

/// Parse and validate CLI arguments from the process environment.
pub fn parse_and_validate() -> Result<ValidatedCli, ParseError> {
    validate_cli(Cli::parse())
}

/// Validate parsed CLI arguments.
pub fn validate_cli(cli: Cli) -> Result<ValidatedCli, ParseError> {
    let phases = parse_phases(&cli.phases)?;
    let skip = parse_phases(&cli.skip)?;

    if let Some(limit) = cli.download_limit {
        if limit == 0 {
            return Err(ParseError::InvalidValue {
                arg: "download-limit".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }
    }
    if let Some(limit) = cli.upload_limit {
        if limit == 0 {
            return Err(ParseError::InvalidValue {
                arg: "upload-limit".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }
    }

    Ok(ValidatedCli {
        command: cli.command,
        verbose: cli.verbose,
        config: cli.config,
        phases,
        skip,
        confirm_push: cli.confirm_push,
        confirm_pull: cli.confirm_pull,
        dry_run: cli.dry_run,
        use_extended_api: cli.use_extended_api,
        download_limit: cli.download_limit,
        upload_limit: cli.upload_limit,
    })
}

fn parse_phases(raw: &[String]) -> Result<Vec<Phase>, ParseError> {
    let mut phases = Vec::new();
    for value in raw {
        if value.trim().is_empty() {
            continue;
        }
        let phase = value.parse::<Phase>()?;
        if !phases.contains(&phase) {
            phases.push(phase);
        }
    }
    Ok(phases)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("jira2redmine").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_minimal_invocation() {
        let validated = validate_cli(cli(&["projects"])).unwrap();
        assert_eq!(validated.command, EntityCommand::Projects);
        assert!(validated.phases.is_empty());
        assert!(!validated.confirm_push);
        assert!(!validated.dry_run);
    }

    #[test]
    fn test_phase_list_parsing() {
        let validated = validate_cli(cli(&["issues", "--phases", "jira,transform,push"])).unwrap();
        assert_eq!(validated.phases, vec![Phase::Jira, Phase::Transform, Phase::Push]);
    }

    #[test]
    fn test_duplicate_phases_are_deduplicated() {
        let validated = validate_cli(cli(&["issues", "--phases", "push,push"])).unwrap();
        assert_eq!(validated.phases, vec![Phase::Push]);
    }

    #[test]
    fn test_unknown_phase_is_rejected() {
        let result = validate_cli(cli(&["issues", "--phases", "teleport"]));
        assert!(matches!(result, Err(ParseError::UnknownPhase(_))));
    }

    #[test]
    fn test_zero_limit_is_rejected() {
        let result = validate_cli(cli(&["attachments", "--download-limit", "0"]));
        assert!(matches!(result, Err(ParseError::InvalidValue { .. })));
    }

    #[test]
    fn test_gates_and_flags() {
        let validated = validate_cli(cli(&[
            "attachments",
            "--confirm-pull",
            "--confirm-push",
            "--dry-run",
            "--upload-limit",
            "25",
        ]))
        .unwrap();
        assert!(validated.confirm_pull);
        assert!(validated.confirm_push);
        assert!(validated.dry_run);
        assert_eq!(validated.upload_limit, Some(25));
    }

    #[test]
    fn test_phase_round_trip() {
        for phase in [Phase::Jira, Phase::Redmine, Phase::Transform, Phase::Pull, Phase::Push] {
            assert_eq!(phase.as_str().parse::<Phase>().unwrap(), phase);
        }
    }
}
