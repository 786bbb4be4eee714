// /////////////////////////////////////////////////////////////////////////////
// Jira2Redmine Migration RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Redmine REST Client
//!
//! JSON client for the Redmine REST API, authenticated with the
//! `X-Redmine-API-Key` header. Mutations deliberately run one request at a
//! time with no automatic retry: every Redmine write is recorded on a
//! mapping row, and a blind retry could create duplicates.
//!
//! The optional "extended API" plugin (configurable prefix, default
//! `/extended_api`) unlocks `PATCH /issues/{id}.json` with explicit journal
//! author/timestamp overrides; availability is verified once per process by
//! a probe request that must answer with the `X-Redmine-Extended-API`
//! header.

use std::path::Path;
use std::time::Duration;

use reqwest::{Method, RequestBuilder, StatusCode};
use serde_json::{json, Value};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use jira2redmine_domain::MigrationError;

use crate::infrastructure::config::RedmineConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Error notes recorded on mapping rows are capped at this length.
const MAX_ERROR_NOTE: usize = 500;

/// A rejected or failed Redmine request. `message` is already formatted for
/// the mapping row's `notes` column.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct RedmineError {
    pub status: Option<u16>,
    pub message: String,
}

impl From<RedmineError> for MigrationError {
    fn from(error: RedmineError) -> Self {
        MigrationError::RedmineApiError(error.message)
    }
}

/// Extracts the operator-facing error message from a Redmine error body:
/// `errors[]` joined by `; `, else `error`, else the stripped body, prefixed
/// with `HTTP {status}:` and truncated to 500 characters.
pub fn extract_error_message(status: u16, body: &str) -> String {
    let detail = match serde_json::from_str::<Value>(body) {
        Ok(parsed) => {
            if let Some(errors) = parsed.get("errors").and_then(Value::as_array) {
                errors
                    .iter()
                    .map(|e| e.as_str().map(String::from).unwrap_or_else(|| e.to_string()))
                    .collect::<Vec<_>>()
                    .join("; ")
            } else if let Some(error) = parsed.get("error").and_then(Value::as_str) {
                error.to_string()
            } else {
                body.trim().to_string()
            }
        }
        Err(_) => body.trim().to_string(),
    };

    let message = format!("HTTP {}: {}", status, detail);
    if message.chars().count() > MAX_ERROR_NOTE {
        let truncated: String = message.chars().take(MAX_ERROR_NOTE - 1).collect();
        format!("{}…", truncated)
    } else {
        message
    }
}

/// Outcome of a watcher POST.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherOutcome {
    Added,
    AlreadyWatching,
}

/// Redmine REST API client.
#[derive(Debug)]
pub struct RedmineClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    extended_api_prefix: String,
    use_extended_api: bool,
    extended_api_available: OnceCell<bool>,
}

impl RedmineClient {
    pub fn new(config: &RedmineConfig, use_extended_api: bool) -> Result<Self, MigrationError> {
        let http = reqwest::Client::builder()
            .connect_timeout(REQUEST_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| MigrationError::RedmineApiError(format!("cannot build HTTP client: {}", e)))?;

        Ok(RedmineClient {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            extended_api_prefix: config.extended_api_prefix.clone(),
            use_extended_api,
            extended_api_available: OnceCell::new(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn extended_url(&self, path: &str) -> String {
        format!("{}{}{}", self.base_url, self.extended_api_prefix, path)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.http
            .request(method, url)
            .header("X-Redmine-API-Key", &self.api_key)
    }

    async fn expect_json(
        &self,
        builder: RequestBuilder,
        expected: &[StatusCode],
    ) -> Result<Value, RedmineError> {
        let response = builder.send().await.map_err(|e| RedmineError {
            status: None,
            message: e.to_string(),
        })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !expected.contains(&status) {
            return Err(RedmineError {
                status: Some(status.as_u16()),
                message: extract_error_message(status.as_u16(), &body),
            });
        }
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(|e| RedmineError {
            status: Some(status.as_u16()),
            message: format!("invalid JSON in Redmine response: {}", e),
        })
    }

    // -----------------------------------------------------------------------
    // Snapshot reads
    // -----------------------------------------------------------------------

    /// One page of `/projects.json?include=trackers`.
    pub async fn list_projects(&self, offset: usize, limit: usize) -> Result<Value, MigrationError> {
        let builder = self
            .request(Method::GET, &self.url("/projects.json"))
            .query(&[
                ("include", "trackers".to_string()),
                ("limit", limit.to_string()),
                ("offset", offset.to_string()),
            ]);
        Ok(self.expect_json(builder, &[StatusCode::OK]).await?)
    }

    /// One page of `/users.json?status=*` (requires an admin API key).
    pub async fn list_users(&self, offset: usize, limit: usize) -> Result<Value, MigrationError> {
        let builder = self.request(Method::GET, &self.url("/users.json")).query(&[
            ("status", "*".to_string()),
            ("limit", limit.to_string()),
            ("offset", offset.to_string()),
        ]);
        Ok(self.expect_json(builder, &[StatusCode::OK]).await?)
    }

    /// Detail of one user, including `mail` and `status`.
    pub async fn get_user(&self, redmine_user_id: i64) -> Result<Value, MigrationError> {
        let builder = self.request(Method::GET, &self.url(&format!("/users/{}.json", redmine_user_id)));
        Ok(self.expect_json(builder, &[StatusCode::OK]).await?)
    }

    /// Issue detail with includes (`attachments`, `journals`).
    pub async fn get_issue(&self, redmine_issue_id: i64, include: &str) -> Result<Value, MigrationError> {
        let builder = self
            .request(Method::GET, &self.url(&format!("/issues/{}.json", redmine_issue_id)))
            .query(&[("include", include.to_string())]);
        Ok(self.expect_json(builder, &[StatusCode::OK]).await?)
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// `POST /projects.json`; only 201 counts as success.
    pub async fn create_project(&self, payload: &Value) -> Result<Value, RedmineError> {
        let builder = self.request(Method::POST, &self.url("/projects.json")).json(payload);
        self.expect_json(builder, &[StatusCode::CREATED]).await
    }

    /// `POST /users.json`; only 201 counts as success.
    pub async fn create_user(&self, payload: &Value) -> Result<Value, RedmineError> {
        let builder = self.request(Method::POST, &self.url("/users.json")).json(payload);
        self.expect_json(builder, &[StatusCode::CREATED]).await
    }

    /// `POST /issues.json`; only 201 counts as success.
    pub async fn create_issue(&self, payload: &Value) -> Result<Value, RedmineError> {
        let builder = self.request(Method::POST, &self.url("/issues.json")).json(payload);
        self.expect_json(builder, &[StatusCode::CREATED]).await
    }

    /// Updates an issue: `PATCH` through the extended API when available,
    /// plain `PUT` otherwise.
    pub async fn update_issue(&self, redmine_issue_id: i64, payload: &Value) -> Result<(), RedmineError> {
        let builder = if self.extended_api().await {
            self.request(
                Method::PATCH,
                &self.extended_url(&format!("/issues/{}.json", redmine_issue_id)),
            )
            .json(payload)
        } else {
            self.request(Method::PUT, &self.url(&format!("/issues/{}.json", redmine_issue_id)))
                .json(payload)
        };
        self.expect_json(builder, &[StatusCode::OK, StatusCode::NO_CONTENT])
            .await?;
        Ok(())
    }

    /// `POST /issues/{id}/watchers.json`. A rejection whose body says the
    /// user is already watching counts as success.
    pub async fn add_watcher(
        &self,
        redmine_issue_id: i64,
        redmine_user_id: i64,
    ) -> Result<WatcherOutcome, RedmineError> {
        let builder = self
            .request(
                Method::POST,
                &self.url(&format!("/issues/{}/watchers.json", redmine_issue_id)),
            )
            .json(&json!({ "user_id": redmine_user_id }));

        let response = builder.send().await.map_err(|e| RedmineError {
            status: None,
            message: e.to_string(),
        })?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status.is_success() {
            return Ok(WatcherOutcome::Added);
        }
        if body.contains("is already watching") {
            return Ok(WatcherOutcome::AlreadyWatching);
        }
        Err(RedmineError {
            status: Some(status.as_u16()),
            message: extract_error_message(status.as_u16(), &body),
        })
    }

    /// Uploads a file body to `/uploads.json` and returns the token. With
    /// the extended API, author and creation time ride along as
    /// `attachment[...]` overrides.
    pub async fn upload_file(
        &self,
        local_path: &Path,
        filename: &str,
        author_id: Option<i64>,
        created_on: Option<&str>,
    ) -> Result<String, RedmineError> {
        let bytes = tokio::fs::read(local_path).await.map_err(|e| RedmineError {
            status: None,
            message: format!("cannot read {}: {}", local_path.display(), e),
        })?;

        let extended = self.extended_api().await;
        let url = if extended {
            self.extended_url("/uploads.json")
        } else {
            self.url("/uploads.json")
        };

        let mut query: Vec<(String, String)> = vec![("filename".to_string(), filename.to_string())];
        if extended {
            if let Some(author) = author_id {
                query.push(("attachment[author_id]".to_string(), author.to_string()));
            }
            if let Some(created) = created_on {
                query.push(("attachment[created_on]".to_string(), created.to_string()));
            }
        }

        let builder = self
            .request(Method::POST, &url)
            .query(&query)
            .header("Content-Type", "application/octet-stream")
            .body(bytes);

        let parsed = self.expect_json(builder, &[StatusCode::CREATED]).await?;
        parsed
            .pointer("/upload/token")
            .and_then(Value::as_str)
            .map(String::from)
            .ok_or_else(|| RedmineError {
                status: None,
                message: "upload response carried no token".to_string(),
            })
    }

    // -----------------------------------------------------------------------
    // Extended API probe
    // -----------------------------------------------------------------------

    /// Whether journal author/timestamp overrides are available. Probed once
    /// per process; a missing plugin downgrades to the standard protocol.
    pub async fn extended_api(&self) -> bool {
        if !self.use_extended_api {
            return false;
        }
        *self
            .extended_api_available
            .get_or_init(|| async {
                match self.probe_extended_api().await {
                    Ok(true) => {
                        debug!("Redmine extended API detected");
                        true
                    }
                    Ok(false) => {
                        warn!("Redmine extended API not detected, falling back to the standard API");
                        false
                    }
                    Err(error) => {
                        warn!(
                            "Redmine extended API probe failed ({}), falling back to the standard API",
                            error
                        );
                        false
                    }
                }
            })
            .await
    }

    async fn probe_extended_api(&self) -> Result<bool, MigrationError> {
        let response = self
            .request(Method::GET, &self.extended_url("/issues.json"))
            .query(&[("limit", "1")])
            .send()
            .await
            .map_err(|e| MigrationError::RedmineApiError(format!("extended API probe: {}", e)))?;
        Ok(response.headers().contains_key("X-Redmine-Extended-API"))
    }
}
