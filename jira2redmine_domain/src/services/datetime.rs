// /////////////////////////////////////////////////////////////////////////////
// Jira2Redmine Migration RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Timestamp Handling
//!
//! Jira Cloud emits timestamps as `2024-05-01T10:22:33.000+0200` (millis,
//! offset without colon); Redmine expects ISO-8601 in UTC. These helpers
//! parse the Jira flavors and format the Redmine-facing values so proposals
//! are byte-stable across runs.

use chrono::{DateTime, FixedOffset, Utc};

use crate::error::MigrationError;

/// Parses a Jira timestamp. Accepts the Jira Cloud format with and without
/// milliseconds, plus plain RFC 3339.
pub fn parse_jira_timestamp(value: &str) -> Result<DateTime<FixedOffset>, MigrationError> {
    DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.3f%z")
        .or_else(|_| DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%z"))
        .or_else(|_| DateTime::parse_from_rfc3339(value))
        .map_err(|e| {
            MigrationError::validation(format!("unparseable Jira timestamp '{}': {}", value, e))
        })
}

/// The `YYYY-MM-DD` date part of a Jira timestamp, in its original offset.
///
/// Redmine `start_date`/`due_date` are dates; the issue keeps the day it had
/// in the source timezone rather than shifting over midnight via UTC.
pub fn date_of(value: &str) -> Result<String, MigrationError> {
    let parsed = parse_jira_timestamp(value)?;
    Ok(parsed.format("%Y-%m-%d").to_string())
}

/// Formats a Jira timestamp as the UTC ISO-8601 second-precision form the
/// Redmine extended API accepts for `created_on`/`updated_on`.
pub fn to_redmine_datetime(value: &str) -> Result<String, MigrationError> {
    let parsed = parse_jira_timestamp(value)?;
    Ok(parsed.with_timezone(&Utc).format("%Y-%m-%dT%H:%M:%SZ").to_string())
}
