// /////////////////////////////////////////////////////////////////////////////
// Jira2Redmine Migration RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Configuration Service
//!
//! Loads and validates the typed migration configuration from layered
//! sources: `jira2redmine.toml` (or the `--config` path) first, then
//! environment variables prefixed `J2R_` (nested keys separated by `__`,
//! e.g. `J2R_JIRA__API_TOKEN`).
//!
//! Section requirements depend on the phases a run selects; a missing
//! database URL or missing credentials for a requested phase is a fatal
//! configuration error.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use jira2redmine_bootstrap::Phase;
use jira2redmine_domain::MigrationError;

/// Complete typed configuration for one invocation.
#[derive(Debug, Clone, Deserialize)]
pub struct MigrationConfig {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub jira: JiraConfig,
    #[serde(default)]
    pub redmine: RedmineConfig,
    #[serde(default)]
    pub defaults: DefaultsConfig,
    #[serde(default)]
    pub attachments: AttachmentConfig,
    /// SharePoint offload is optional; absent section disables it.
    #[serde(default)]
    pub sharepoint: Option<SharePointConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite URL of the mapping database, e.g. `sqlite://./jira2redmine.db`.
    pub url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JiraConfig {
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub api_token: String,
    /// Page size for startAt/maxResults pagination.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Page size for the keyset JQL issue search.
    #[serde(default = "default_issue_page_size")]
    pub issue_page_size: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RedmineConfig {
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    /// Prefix of the optional extended API plugin routes.
    #[serde(default = "default_extended_api_prefix")]
    pub extended_api_prefix: String,
}

/// Operator-configured fallbacks for unresolved issue dependencies. A
/// missing default sends the row to manual intervention instead.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DefaultsConfig {
    pub project_id: Option<i64>,
    pub tracker_id: Option<i64>,
    pub status_id: Option<i64>,
    pub priority_id: Option<i64>,
    pub author_id: Option<i64>,
    pub assignee_id: Option<i64>,
    /// LDAP auth source for newly created users, when the instance has one.
    pub auth_source_id: Option<i64>,
    #[serde(default)]
    pub is_private: bool,
    /// Status proposed for newly created Redmine users.
    #[serde(default = "default_new_user_status")]
    pub new_user_status: NewUserStatus,
}

/// Redmine account status for users the migration creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NewUserStatus {
    Active,
    #[default]
    Locked,
}

impl NewUserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NewUserStatus::Active => "ACTIVE",
            NewUserStatus::Locked => "LOCKED",
        }
    }

    /// Redmine numeric status (1 = active, 3 = locked).
    pub fn redmine_status(&self) -> i64 {
        match self {
            NewUserStatus::Active => 1,
            NewUserStatus::Locked => 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AttachmentConfig {
    /// Working directory for downloaded blobs.
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,
    /// Parallel downloads in the pull step.
    #[serde(default = "default_download_concurrency")]
    pub download_concurrency: usize,
    /// Chunk size for streamed SharePoint uploads, clamped to >= 1 MiB.
    #[serde(default = "default_chunk_size_bytes")]
    pub chunk_size_bytes: u64,
}

impl Default for AttachmentConfig {
    fn default() -> Self {
        AttachmentConfig {
            work_dir: default_work_dir(),
            download_concurrency: default_download_concurrency(),
            chunk_size_bytes: default_chunk_size_bytes(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SharePointConfig {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
    pub site_id: String,
    pub drive_id: String,
    #[serde(default = "default_sharepoint_folder")]
    pub folder: String,
    /// Files at or above this size are offloaded instead of uploaded to
    /// Redmine.
    pub offload_threshold_bytes: u64,
}

fn default_sharepoint_folder() -> String {
    "jira-attachments".to_string()
}

fn default_page_size() -> usize {
    50
}

fn default_issue_page_size() -> usize {
    100
}

fn default_extended_api_prefix() -> String {
    "/extended_api".to_string()
}

fn default_new_user_status() -> NewUserStatus {
    NewUserStatus::Locked
}

fn default_work_dir() -> PathBuf {
    std::env::temp_dir().join("attachments").join("jira")
}

fn default_download_concurrency() -> usize {
    4
}

fn default_chunk_size_bytes() -> u64 {
    5 * 1024 * 1024
}

impl MigrationConfig {
    /// Loads configuration from the given file (or `jira2redmine.toml` when
    /// absent) layered with `J2R_*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, MigrationError> {
        let mut builder = config::Config::builder();
        builder = match path {
            Some(explicit) => builder.add_source(
                config::File::from(explicit.to_path_buf()).required(true),
            ),
            None => builder.add_source(config::File::with_name("jira2redmine").required(false)),
        };
        builder = builder.add_source(
            config::Environment::with_prefix("J2R")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .map_err(|e| MigrationError::InvalidConfiguration(format!("cannot load configuration: {}", e)))?;

        let parsed: MigrationConfig = settings
            .try_deserialize()
            .map_err(|e| MigrationError::InvalidConfiguration(format!("malformed configuration: {}", e)))?;

        parsed.validate_base()?;
        Ok(parsed)
    }

    fn validate_base(&self) -> Result<(), MigrationError> {
        if self.database.url.trim().is_empty() {
            return Err(MigrationError::InvalidConfiguration(
                "database.url is required".to_string(),
            ));
        }
        if self.attachments.download_concurrency == 0 {
            return Err(MigrationError::InvalidConfiguration(
                "attachments.download_concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Verifies that every credential needed by the selected phases exists.
    pub fn validate_for_phases(&self, phases: &[Phase]) -> Result<(), MigrationError> {
        for phase in phases {
            match phase {
                Phase::Jira | Phase::Pull => {
                    if self.jira.base_url.trim().is_empty()
                        || self.jira.email.trim().is_empty()
                        || self.jira.api_token.trim().is_empty()
                    {
                        return Err(MigrationError::InvalidConfiguration(format!(
                            "phase '{}' requires jira.base_url, jira.email and jira.api_token",
                            phase
                        )));
                    }
                }
                Phase::Redmine | Phase::Push => {
                    if self.redmine.base_url.trim().is_empty() || self.redmine.api_key.trim().is_empty() {
                        return Err(MigrationError::InvalidConfiguration(format!(
                            "phase '{}' requires redmine.base_url and redmine.api_key",
                            phase
                        )));
                    }
                }
                Phase::Transform => {}
            }
        }
        Ok(())
    }

    /// The Graph upload chunk size, clamped to the 1 MiB Graph minimum.
    pub fn sharepoint_chunk_size(&self) -> u64 {
        self.attachments.chunk_size_bytes.max(1024 * 1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_minimal_config_loads_with_defaults() {
        let file = write_config(
            r#"
            [database]
            url = "sqlite://./test.db"
            "#,
        );
        let config = MigrationConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.database.url, "sqlite://./test.db");
        assert_eq!(config.jira.page_size, 50);
        assert_eq!(config.redmine.extended_api_prefix, "/extended_api");
        assert_eq!(config.defaults.new_user_status, NewUserStatus::Locked);
        assert!(config.sharepoint.is_none());
        assert_eq!(config.attachments.download_concurrency, 4);
    }

    #[test]
    fn test_missing_database_url_is_fatal() {
        let file = write_config(
            r#"
            [database]
            url = ""
            "#,
        );
        let result = MigrationConfig::load(Some(file.path()));
        assert!(matches!(result, Err(MigrationError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_phase_validation_requires_credentials() {
        let file = write_config(
            r#"
            [database]
            url = "sqlite://./test.db"

            [jira]
            base_url = "https://x.atlassian.net"
            email = "ops@example.com"
            api_token = "secret"
            "#,
        );
        let config = MigrationConfig::load(Some(file.path())).unwrap();
        assert!(config.validate_for_phases(&[Phase::Jira]).is_ok());
        assert!(config.validate_for_phases(&[Phase::Transform]).is_ok());
        assert!(config.validate_for_phases(&[Phase::Push]).is_err());
    }

    #[test]
    fn test_sharepoint_section_and_chunk_clamp() {
        let file = write_config(
            r#"
            [database]
            url = "sqlite://./test.db"

            [attachments]
            chunk_size_bytes = 1024

            [sharepoint]
            tenant_id = "t"
            client_id = "c"
            client_secret = "s"
            site_id = "site"
            drive_id = "drive"
            offload_threshold_bytes = 10485760
            "#,
        );
        let config = MigrationConfig::load(Some(file.path())).unwrap();
        let sp = config.sharepoint.as_ref().unwrap();
        assert_eq!(sp.offload_threshold_bytes, 10 * 1024 * 1024);
        assert_eq!(sp.folder, "jira-attachments");
        // Below the Graph minimum, the chunk size is clamped up to 1 MiB.
        assert_eq!(config.sharepoint_chunk_size(), 1024 * 1024);
    }

    #[test]
    fn test_new_user_status_mapping() {
        assert_eq!(NewUserStatus::Active.redmine_status(), 1);
        assert_eq!(NewUserStatus::Locked.redmine_status(), 3);
        assert_eq!(NewUserStatus::Locked.as_str(), "LOCKED");
    }
}
