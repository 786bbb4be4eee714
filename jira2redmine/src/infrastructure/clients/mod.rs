// /////////////////////////////////////////////////////////////////////////////
// Jira2Redmine Migration RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! HTTP clients for the three external systems: Jira Cloud (extraction),
//! Redmine (snapshot + push), and Microsoft Graph (SharePoint offload).

pub mod graph_client;
pub mod jira_client;
pub mod redmine_client;

pub use graph_client::GraphClient;
pub use jira_client::{JiraClient, JiraRequestError};
pub use redmine_client::{RedmineClient, RedmineError, WatcherOutcome};
