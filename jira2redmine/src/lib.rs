// /////////////////////////////////////////////////////////////////////////////
// Jira2Redmine Migration RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Jira2Redmine Migration Toolkit
//!
//! Staged ETL migration of a Jira Cloud instance into a self-hosted Redmine
//! instance. For each entity family the toolkit extracts from Jira (or
//! snapshots Redmine), transforms staged payloads into Redmine-ready
//! proposals held in a relational mapping database, and pushes ready rows
//! through the Redmine REST API.
//!
//! The mapping database is the single source of truth across runs: every
//! proposal carries an automation hash so operator edits survive re-runs,
//! and every push outcome is recorded on its row, making the whole pipeline
//! resumable and idempotent.
//!
//! See the `jira2redmine-domain` crate for the pure business logic and the
//! `jira2redmine-bootstrap` crate for CLI and logging setup.

pub mod application;
pub mod infrastructure;
