// /////////////////////////////////////////////////////////////////////////////
// Jira2Redmine Migration RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Bootstrap Logger
//!
//! Initialises the process-wide tracing subscriber. `RUST_LOG` wins when
//! set; otherwise `--verbose` raises the default level from info to debug.
//!
//! Phase headers, progress ticks and summaries all go through `tracing`;
//! the `[ERROR]` stderr line for fatal failures is written by `main`
//! directly so it survives even a broken subscriber.

use tracing_subscriber::EnvFilter;

/// Initialise tracing for the process. Safe to call once.
pub fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Variant for tests: never panics when a subscriber is already installed.
pub fn try_init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
