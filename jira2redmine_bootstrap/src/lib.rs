// /////////////////////////////////////////////////////////////////////////////
// Jira2Redmine Migration RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Jira2Redmine Bootstrap Layer
//!
//! Everything that has to happen before the application proper can run:
//! CLI parsing and validation, logging initialisation, and exit codes.
//! This crate knows nothing about Jira, Redmine or the mapping database.

pub mod cli;
pub mod exit_code;
pub mod logger;

pub use cli::{parse_and_validate, Cli, EntityCommand, ParseError, Phase, ValidatedCli};
pub use exit_code::ExitCode;
pub use logger::{init_tracing, try_init_tracing};
