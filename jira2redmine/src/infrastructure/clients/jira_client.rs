// /////////////////////////////////////////////////////////////////////////////
// Jira2Redmine Migration RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Jira REST Client
//!
//! Read-only client for the Jira Cloud REST API (v3) with the uniform pull
//! discipline: Basic auth, 30 s timeouts, `startAt`/`maxResults` pagination
//! where the API offers it, and exponential backoff on 429/5xx/transport
//! errors (1 s initial delay, doubling, capped at 5 attempts, `Retry-After`
//! honored verbatim, random jitter up to half the base delay).
//!
//! Per-issue detail fetches surface their HTTP status through
//! [`JiraRequestError`] so the extractor can record 401/403/404 as WARNING
//! (not retried) and everything else as FAILED (retried next run).

use std::path::Path;
use std::time::Duration;

use rand::Rng;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde_json::{json, Value};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use jira2redmine_domain::MigrationError;

use crate::infrastructure::config::JiraConfig;

/// Maximum attempts for one logical request.
const MAX_ATTEMPTS: u32 = 5;
/// Initial backoff delay.
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
/// Connect/read timeout for every call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// A failed Jira request, carrying the HTTP status when one was received.
#[derive(Debug, Clone)]
pub struct JiraRequestError {
    pub status: Option<u16>,
    pub message: String,
}

impl JiraRequestError {
    /// 401/403/404 on detail fetches are recorded as WARNING and the issue
    /// is not retried; anything else counts as FAILED and is.
    pub fn is_access_denial(&self) -> bool {
        matches!(self.status, Some(401) | Some(403) | Some(404))
    }
}

impl std::fmt::Display for JiraRequestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(status) => write!(f, "HTTP {}: {}", status, self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl From<JiraRequestError> for MigrationError {
    fn from(error: JiraRequestError) -> Self {
        MigrationError::JiraApiError(error.to_string())
    }
}

/// The backoff delay before the given retry attempt (1-based). A positive
/// integer `Retry-After` is used verbatim; otherwise the delay doubles per
/// attempt starting from one second.
pub fn backoff_delay(attempt: u32, retry_after_secs: Option<u64>) -> Duration {
    if let Some(secs) = retry_after_secs {
        if secs > 0 {
            return Duration::from_secs(secs);
        }
    }
    INITIAL_BACKOFF * 2u32.saturating_pow(attempt.saturating_sub(1))
}

fn retry_after_header(response: &Response) -> Option<u64> {
    response
        .headers()
        .get("Retry-After")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
}

fn jittered(base: Duration) -> Duration {
    let max_jitter_ms = (base.as_millis() / 2) as u64;
    let jitter = if max_jitter_ms == 0 {
        0
    } else {
        rand::rng().random_range(0..=max_jitter_ms)
    };
    base + Duration::from_millis(jitter)
}

/// Jira Cloud REST API client.
#[derive(Debug, Clone)]
pub struct JiraClient {
    http: reqwest::Client,
    base_url: String,
    email: String,
    api_token: String,
    page_size: usize,
    issue_page_size: usize,
}

impl JiraClient {
    pub fn new(config: &JiraConfig) -> Result<Self, MigrationError> {
        let http = reqwest::Client::builder()
            .connect_timeout(REQUEST_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| MigrationError::JiraApiError(format!("cannot build HTTP client: {}", e)))?;

        Ok(JiraClient {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            email: config.email.clone(),
            api_token: config.api_token.clone(),
            page_size: config.page_size,
            issue_page_size: config.issue_page_size,
        })
    }

    pub fn issue_page_size(&self) -> usize {
        self.issue_page_size
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send_with_retry(
        &self,
        build: impl Fn() -> RequestBuilder,
    ) -> Result<Response, JiraRequestError> {
        let mut attempt = 1u32;
        loop {
            let result = build()
                .basic_auth(&self.email, Some(&self.api_token))
                .send()
                .await;

            match result {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response)
                    if response.status() == StatusCode::TOO_MANY_REQUESTS
                        || response.status().is_server_error() =>
                {
                    let status = response.status().as_u16();
                    if attempt >= MAX_ATTEMPTS {
                        return Err(JiraRequestError {
                            status: Some(status),
                            message: format!("retries exhausted after {} attempts", MAX_ATTEMPTS),
                        });
                    }
                    let delay = jittered(backoff_delay(attempt, retry_after_header(&response)));
                    warn!(
                        "Jira returned {}, retrying in {:?} (attempt {}/{})",
                        status, delay, attempt, MAX_ATTEMPTS
                    );
                    tokio::time::sleep(delay).await;
                }
                Ok(response) => {
                    let status = response.status().as_u16();
                    let body = response.text().await.unwrap_or_default();
                    return Err(JiraRequestError {
                        status: Some(status),
                        message: body.chars().take(500).collect(),
                    });
                }
                Err(error) => {
                    if attempt >= MAX_ATTEMPTS {
                        return Err(JiraRequestError {
                            status: None,
                            message: error.to_string(),
                        });
                    }
                    let delay = jittered(backoff_delay(attempt, None));
                    warn!("Jira transport error ({}), retrying in {:?}", error, delay);
                    tokio::time::sleep(delay).await;
                }
            }
            attempt += 1;
        }
    }

    async fn get_json(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Value, JiraRequestError> {
        let url = self.url(path);
        let response = self
            .send_with_retry(|| self.http.get(&url).query(query))
            .await?;
        response.json::<Value>().await.map_err(|e| JiraRequestError {
            status: None,
            message: format!("invalid JSON from {}: {}", url, e),
        })
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<Value, JiraRequestError> {
        let url = self.url(path);
        let response = self
            .send_with_retry(|| self.http.post(&url).json(body))
            .await?;
        response.json::<Value>().await.map_err(|e| JiraRequestError {
            status: None,
            message: format!("invalid JSON from {}: {}", url, e),
        })
    }

    // -----------------------------------------------------------------------
    // Collection endpoints
    // -----------------------------------------------------------------------

    /// All projects, via `/project/search` with `startAt` pagination.
    pub async fn fetch_projects(&self) -> Result<Vec<Value>, MigrationError> {
        let mut all = Vec::new();
        let mut start_at = 0usize;
        loop {
            let page = self
                .get_json(
                    "/rest/api/3/project/search",
                    &[
                        ("expand", "lead,description".to_string()),
                        ("startAt", start_at.to_string()),
                        ("maxResults", self.page_size.to_string()),
                    ],
                )
                .await?;

            let values = page
                .get("values")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            let fetched = values.len();
            all.extend(values);

            let is_last = page.get("isLast").and_then(Value::as_bool).unwrap_or(fetched == 0);
            if is_last || fetched == 0 {
                break;
            }
            start_at += fetched;
        }
        debug!("Fetched {} Jira projects", all.len());
        Ok(all)
    }

    /// All users, including inactive ones. The endpoint returns a bare
    /// array, so the last page is the first short one.
    pub async fn fetch_users(&self) -> Result<Vec<Value>, MigrationError> {
        let mut all = Vec::new();
        let mut start_at = 0usize;
        loop {
            let page = self
                .get_json(
                    "/rest/api/3/users/search",
                    &[
                        ("includeInactiveUsers", "true".to_string()),
                        ("expand", "groups".to_string()),
                        ("startAt", start_at.to_string()),
                        ("maxResults", self.page_size.to_string()),
                    ],
                )
                .await?;

            let users = page.as_array().cloned().unwrap_or_default();
            let fetched = users.len();
            all.extend(users);

            if fetched < self.page_size {
                break;
            }
            start_at += fetched;
        }
        debug!("Fetched {} Jira users", all.len());
        Ok(all)
    }

    /// One keyset page of the JQL issue search for a project: issues with
    /// `id > last_seen_id`, ascending, all fields.
    pub async fn search_issues_page(
        &self,
        jira_project_id: &str,
        last_seen_id: Option<&str>,
    ) -> Result<Vec<Value>, MigrationError> {
        let jql = match last_seen_id {
            Some(last) => format!("project = {} AND id > {} ORDER BY id ASC", jira_project_id, last),
            None => format!("project = {} ORDER BY id ASC", jira_project_id),
        };
        let body = json!({
            "jql": jql,
            "maxResults": self.issue_page_size,
            "fields": ["*all"],
        });

        let page = self.post_json("/rest/api/3/search/jql", &body).await?;
        Ok(page
            .get("issues")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default())
    }

    // -----------------------------------------------------------------------
    // Per-issue detail endpoints (status-aware errors)
    // -----------------------------------------------------------------------

    /// All comments of an issue with rendered HTML bodies.
    pub async fn fetch_comments(&self, jira_issue_id: &str) -> Result<Vec<Value>, JiraRequestError> {
        let path = format!("/rest/api/3/issue/{}/comment", jira_issue_id);
        let mut all = Vec::new();
        let mut start_at = 0usize;
        loop {
            let page = self
                .get_json(
                    &path,
                    &[
                        ("expand", "renderedBody".to_string()),
                        ("startAt", start_at.to_string()),
                        ("maxResults", self.page_size.to_string()),
                    ],
                )
                .await?;

            let comments = page
                .get("comments")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            let fetched = comments.len();
            all.extend(comments);

            let total = page.get("total").and_then(Value::as_u64).unwrap_or(0) as usize;
            start_at += fetched;
            if fetched == 0 || start_at >= total {
                break;
            }
        }
        Ok(all)
    }

    /// The full changelog of an issue.
    pub async fn fetch_changelog(&self, jira_issue_id: &str) -> Result<Vec<Value>, JiraRequestError> {
        let path = format!("/rest/api/3/issue/{}/changelog", jira_issue_id);
        let mut all = Vec::new();
        let mut start_at = 0usize;
        loop {
            let page = self
                .get_json(
                    &path,
                    &[
                        ("startAt", start_at.to_string()),
                        ("maxResults", self.page_size.to_string()),
                    ],
                )
                .await?;

            let values = page
                .get("values")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            let fetched = values.len();
            all.extend(values);

            let is_last = page.get("isLast").and_then(Value::as_bool).unwrap_or(fetched == 0);
            if is_last || fetched == 0 {
                break;
            }
            start_at += fetched;
        }
        Ok(all)
    }

    /// The watcher list of an issue.
    pub async fn fetch_watchers(&self, jira_issue_id: &str) -> Result<Vec<Value>, JiraRequestError> {
        let path = format!("/rest/api/3/issue/{}/watchers", jira_issue_id);
        let page = self.get_json(&path, &[]).await?;
        Ok(page
            .get("watchers")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default())
    }

    // -----------------------------------------------------------------------
    // Attachment binaries
    // -----------------------------------------------------------------------

    /// Streams an attachment `content` URL to disk. Returns the byte count.
    pub async fn download_attachment(
        &self,
        content_url: &str,
        destination: &Path,
    ) -> Result<u64, MigrationError> {
        let response = self
            .send_with_retry(|| self.http.get(content_url))
            .await
            .map_err(MigrationError::from)?;

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::File::create(destination).await?;
        let mut stream = response;
        let mut written = 0u64;
        while let Some(chunk) = stream.chunk().await.map_err(|e| {
            MigrationError::JiraApiError(format!("download stream from {} failed: {}", content_url, e))
        })? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_per_attempt() {
        assert_eq!(backoff_delay(1, None), Duration::from_secs(1));
        assert_eq!(backoff_delay(2, None), Duration::from_secs(2));
        assert_eq!(backoff_delay(3, None), Duration::from_secs(4));
        assert_eq!(backoff_delay(5, None), Duration::from_secs(16));
    }

    #[test]
    fn test_retry_after_is_used_verbatim() {
        // A 429 with Retry-After: 3 waits at least 3000 ms.
        assert!(backoff_delay(1, Some(3)) >= Duration::from_millis(3000));
        assert_eq!(backoff_delay(4, Some(7)), Duration::from_secs(7));
    }

    #[test]
    fn test_zero_retry_after_falls_back_to_backoff() {
        assert_eq!(backoff_delay(2, Some(0)), Duration::from_secs(2));
    }

    #[test]
    fn test_jitter_is_bounded_by_half_base() {
        for _ in 0..50 {
            let base = Duration::from_secs(2);
            let delayed = jittered(base);
            assert!(delayed >= base);
            assert!(delayed <= base + Duration::from_secs(1));
        }
    }

    #[test]
    fn test_access_denial_classification() {
        let denial = JiraRequestError {
            status: Some(404),
            message: "not found".into(),
        };
        let transient = JiraRequestError {
            status: Some(500),
            message: "boom".into(),
        };
        let transport = JiraRequestError {
            status: None,
            message: "timeout".into(),
        };
        assert!(denial.is_access_denial());
        assert!(!transient.is_access_denial());
        assert!(!transport.is_access_denial());
    }

    #[test]
    fn test_error_display_includes_status() {
        let error = JiraRequestError {
            status: Some(403),
            message: "forbidden".into(),
        };
        assert_eq!(error.to_string(), "HTTP 403: forbidden");
    }
}
