// /////////////////////////////////////////////////////////////////////////////
// Jira2Redmine Migration RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Microsoft Graph Client
//!
//! App-only OAuth2 client-credentials flow plus the chunked upload-session
//! protocol used to offload large attachments to SharePoint.
//!
//! Access tokens are cached process-wide, keyed by `(tenant_id, client_id)`,
//! and refreshed 120 seconds before expiry against a monotonic clock.
//!
//! Upload sessions stream the file in `Content-Range` chunks of
//! `max(1 MiB, configured chunk size)`. Transient chunk failures
//! (429/502/503/504) retry with exponential backoff honoring `Retry-After`,
//! up to six attempts per chunk; 401/404/410 invalidate the session, which
//! is recreated at most twice, restarting the stream from offset zero.

use std::collections::HashMap;
use std::path::Path;
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use reqwest::StatusCode;
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, warn};

use jira2redmine_domain::MigrationError;

use crate::infrastructure::config::SharePointConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Tokens are refreshed this long before they would expire.
const TOKEN_REFRESH_WINDOW: Duration = Duration::from_secs(120);
/// Attempts per chunk before the upload fails.
const MAX_CHUNK_ATTEMPTS: u32 = 6;
/// Session recreations after 401/404/410 before the upload fails.
const MAX_SESSION_RECREATIONS: u32 = 2;
/// Graph requires upload chunks of at least this size.
const MIN_CHUNK_SIZE: u64 = 1024 * 1024;

struct CachedToken {
    access_token: String,
    acquired_at: Instant,
    lifetime: Duration,
}

impl CachedToken {
    fn is_fresh(&self) -> bool {
        self.acquired_at.elapsed() + TOKEN_REFRESH_WINDOW < self.lifetime
    }
}

/// Process-global token cache, shared by every client instance.
static TOKEN_CACHE: Lazy<Mutex<HashMap<(String, String), CachedToken>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// The inclusive byte ranges a file of `total` bytes is uploaded in.
pub fn chunk_ranges(total: u64, chunk_size: u64) -> Vec<(u64, u64)> {
    let chunk = chunk_size.max(MIN_CHUNK_SIZE);
    let mut ranges = Vec::new();
    let mut offset = 0u64;
    while offset < total {
        let end = (offset + chunk).min(total) - 1;
        ranges.push((offset, end));
        offset = end + 1;
    }
    ranges
}

/// The `Content-Range` header value for one chunk.
pub fn content_range(start: u64, end: u64, total: u64) -> String {
    format!("bytes {}-{}/{}", start, end, total)
}

/// Microsoft Graph client scoped to one SharePoint drive.
#[derive(Debug)]
pub struct GraphClient {
    http: reqwest::Client,
    config: SharePointConfig,
    chunk_size: u64,
}

impl GraphClient {
    pub fn new(config: SharePointConfig, chunk_size: u64) -> Result<Self, MigrationError> {
        let http = reqwest::Client::builder()
            .connect_timeout(REQUEST_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| MigrationError::SharePointError(format!("cannot build HTTP client: {}", e)))?;

        Ok(GraphClient {
            http,
            config,
            chunk_size: chunk_size.max(MIN_CHUNK_SIZE),
        })
    }

    /// A valid access token, from the cache when fresh.
    async fn token(&self) -> Result<String, MigrationError> {
        let cache_key = (self.config.tenant_id.clone(), self.config.client_id.clone());
        if let Some(cached) = TOKEN_CACHE.lock().get(&cache_key) {
            if cached.is_fresh() {
                return Ok(cached.access_token.clone());
            }
        }

        let url = format!(
            "https://login.microsoftonline.com/{}/oauth2/v2.0/token",
            self.config.tenant_id
        );
        let response = self
            .http
            .post(&url)
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("scope", "https://graph.microsoft.com/.default"),
                ("grant_type", "client_credentials"),
            ])
            .send()
            .await
            .map_err(|e| MigrationError::SharePointError(format!("token request failed: {}", e)))?;

        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| MigrationError::SharePointError(format!("invalid token response: {}", e)))?;
        if !status.is_success() {
            return Err(MigrationError::SharePointError(format!(
                "token request rejected with HTTP {}: {}",
                status,
                body.get("error_description")
                    .and_then(Value::as_str)
                    .unwrap_or("no detail")
            )));
        }

        let access_token = body
            .get("access_token")
            .and_then(Value::as_str)
            .ok_or_else(|| MigrationError::SharePointError("token response without access_token".into()))?
            .to_string();
        let expires_in = body.get("expires_in").and_then(Value::as_u64).unwrap_or(3600);

        TOKEN_CACHE.lock().insert(
            cache_key,
            CachedToken {
                access_token: access_token.clone(),
                acquired_at: Instant::now(),
                lifetime: Duration::from_secs(expires_in),
            },
        );
        Ok(access_token)
    }

    async fn create_upload_session(&self, filename: &str) -> Result<String, MigrationError> {
        let token = self.token().await?;
        let url = format!(
            "https://graph.microsoft.com/v1.0/sites/{}/drives/{}/root:/{}/{}:/createUploadSession",
            self.config.site_id, self.config.drive_id, self.config.folder, filename
        );
        let response = self
            .http
            .post(&url)
            .bearer_auth(&token)
            .json(&json!({
                "item": { "@microsoft.graph.conflictBehavior": "replace" }
            }))
            .send()
            .await
            .map_err(|e| MigrationError::SharePointError(format!("createUploadSession failed: {}", e)))?;

        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| MigrationError::SharePointError(format!("invalid session response: {}", e)))?;
        if !status.is_success() {
            return Err(MigrationError::SharePointError(format!(
                "createUploadSession rejected with HTTP {}",
                status
            )));
        }

        body.get("uploadUrl")
            .and_then(Value::as_str)
            .map(String::from)
            .ok_or_else(|| MigrationError::SharePointError("upload session without uploadUrl".into()))
    }

    /// Streams a local file into the configured drive folder. Returns the
    /// `webUrl` of the created drive item.
    pub async fn upload_file(&self, local_path: &Path, filename: &str) -> Result<String, MigrationError> {
        let total = tokio::fs::metadata(local_path).await?.len();
        if total == 0 {
            return Err(MigrationError::SharePointError(format!(
                "refusing to offload empty file {}",
                local_path.display()
            )));
        }

        let mut recreations = 0u32;
        'session: loop {
            let upload_url = self.create_upload_session(filename).await?;
            let mut file = tokio::fs::File::open(local_path).await?;

            for (start, end) in chunk_ranges(total, self.chunk_size) {
                let len = (end - start + 1) as usize;
                let mut buffer = vec![0u8; len];
                file.seek(std::io::SeekFrom::Start(start)).await?;
                file.read_exact(&mut buffer).await?;

                match self
                    .put_chunk(&upload_url, buffer, start, end, total, filename)
                    .await?
                {
                    ChunkOutcome::Done(web_url) => return Ok(web_url),
                    ChunkOutcome::Continue => {}
                    ChunkOutcome::SessionLost(status) => {
                        if recreations >= MAX_SESSION_RECREATIONS {
                            return Err(MigrationError::SharePointError(format!(
                                "upload session for {} lost (HTTP {}) after {} recreations",
                                filename, status, recreations
                            )));
                        }
                        recreations += 1;
                        warn!(
                            "Upload session for {} lost (HTTP {}), recreating and restarting",
                            filename, status
                        );
                        continue 'session;
                    }
                }
            }

            // Every chunk was accepted but Graph never reported the item.
            return Err(MigrationError::SharePointError(format!(
                "upload of {} finished without a drive item response",
                filename
            )));
        }
    }

    async fn put_chunk(
        &self,
        upload_url: &str,
        buffer: Vec<u8>,
        start: u64,
        end: u64,
        total: u64,
        filename: &str,
    ) -> Result<ChunkOutcome, MigrationError> {
        let mut attempt = 1u32;
        loop {
            let response = self
                .http
                .put(upload_url)
                .header("Content-Range", content_range(start, end, total))
                .header("Content-Length", buffer.len())
                .body(buffer.clone())
                .send()
                .await;

            match response {
                Ok(response) => {
                    let status = response.status();
                    match status {
                        StatusCode::OK | StatusCode::CREATED => {
                            let body: Value = response.json().await.map_err(|e| {
                                MigrationError::SharePointError(format!("invalid drive item response: {}", e))
                            })?;
                            let web_url = body
                                .get("webUrl")
                                .and_then(Value::as_str)
                                .map(String::from)
                                .ok_or_else(|| {
                                    MigrationError::SharePointError("drive item without webUrl".into())
                                })?;
                            debug!("Offloaded {} ({} bytes) to SharePoint", filename, total);
                            return Ok(ChunkOutcome::Done(web_url));
                        }
                        StatusCode::ACCEPTED => return Ok(ChunkOutcome::Continue),
                        StatusCode::UNAUTHORIZED | StatusCode::NOT_FOUND | StatusCode::GONE => {
                            return Ok(ChunkOutcome::SessionLost(status.as_u16()));
                        }
                        StatusCode::TOO_MANY_REQUESTS
                        | StatusCode::BAD_GATEWAY
                        | StatusCode::SERVICE_UNAVAILABLE
                        | StatusCode::GATEWAY_TIMEOUT => {
                            if attempt >= MAX_CHUNK_ATTEMPTS {
                                return Err(MigrationError::SharePointError(format!(
                                    "chunk {}-{} of {} failed with HTTP {} after {} attempts",
                                    start, end, filename, status, attempt
                                )));
                            }
                            let retry_after = response
                                .headers()
                                .get("Retry-After")
                                .and_then(|v| v.to_str().ok())
                                .and_then(|v| v.trim().parse::<u64>().ok());
                            let delay = match retry_after {
                                Some(secs) if secs > 0 => Duration::from_secs(secs),
                                _ => Duration::from_secs(1) * 2u32.saturating_pow(attempt - 1),
                            };
                            warn!(
                                "SharePoint chunk {}-{} returned {}, retrying in {:?}",
                                start, end, status, delay
                            );
                            tokio::time::sleep(delay).await;
                        }
                        other => {
                            let body = response.text().await.unwrap_or_default();
                            return Err(MigrationError::SharePointError(format!(
                                "chunk {}-{} of {} rejected with HTTP {}: {}",
                                start,
                                end,
                                filename,
                                other,
                                body.chars().take(200).collect::<String>()
                            )));
                        }
                    }
                }
                Err(error) => {
                    if attempt >= MAX_CHUNK_ATTEMPTS {
                        return Err(MigrationError::SharePointError(format!(
                            "chunk {}-{} of {} failed after {} attempts: {}",
                            start, end, filename, attempt, error
                        )));
                    }
                    let delay = Duration::from_secs(1) * 2u32.saturating_pow(attempt - 1);
                    warn!("SharePoint transport error ({}), retrying in {:?}", error, delay);
                    tokio::time::sleep(delay).await;
                }
            }
            attempt += 1;
        }
    }
}

enum ChunkOutcome {
    Done(String),
    Continue,
    SessionLost(u16),
}
