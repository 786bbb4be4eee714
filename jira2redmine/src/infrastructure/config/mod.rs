// /////////////////////////////////////////////////////////////////////////////
// Jira2Redmine Migration RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Configuration loading and validation.

pub mod settings;

pub use settings::{
    AttachmentConfig, DatabaseConfig, DefaultsConfig, JiraConfig, MigrationConfig, NewUserStatus,
    RedmineConfig, SharePointConfig,
};
