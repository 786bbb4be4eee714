// /////////////////////////////////////////////////////////////////////////////
// Jira2Redmine Migration RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Push Phase
//!
//! Idempotent Redmine mutations. Each pusher only touches rows whose status
//! is `READY_FOR_CREATION` / `READY_FOR_PUSH`; success and failure both
//! write the row back with a fresh automation hash, so re-running a push
//! with no new staging data performs no duplicate mutation.

pub mod issues;
pub mod journals;
pub mod projects;
pub mod subtasks;
pub mod users;
pub mod watchers;
