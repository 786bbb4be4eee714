// /////////////////////////////////////////////////////////////////////////////
// Jira2Redmine Migration RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # jira2redmine CLI
//!
//! Entry point for the migration binary. One invocation handles one entity
//! family; families are migrated in order across invocations:
//!
//! ```bash
//! jira2redmine projects --confirm-push
//! jira2redmine users --confirm-push
//! jira2redmine issues --confirm-push
//! jira2redmine attachments --confirm-pull --confirm-push
//! jira2redmine journals --confirm-push
//! jira2redmine watchers --confirm-push
//! jira2redmine subtasks --confirm-push
//! ```
//!
//! Exit codes: 0 on success, 1 on any fatal error (`[ERROR] {message}` on
//! stderr), 64 on CLI usage errors.

use anyhow::Context;

use jira2redmine::application::orchestrator;
use jira2redmine_bootstrap::{cli, init_tracing, ExitCode, ValidatedCli};

fn run(validated: ValidatedCli) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Runtime::new().context("cannot start async runtime")?;
    runtime.block_on(orchestrator::run(validated))?;
    Ok(())
}

fn main() {
    let validated = match cli::parse_and_validate() {
        Ok(validated) => validated,
        Err(error) => {
            eprintln!("[ERROR] {}", error);
            std::process::exit(ExitCode::UsageError.as_i32());
        }
    };

    init_tracing(validated.verbose);

    match run(validated) {
        Ok(()) => std::process::exit(ExitCode::Success.as_i32()),
        Err(error) => {
            eprintln!("[ERROR] {:#}", error);
            std::process::exit(ExitCode::Error.as_i32());
        }
    }
}
