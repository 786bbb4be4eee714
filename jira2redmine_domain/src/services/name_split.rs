// /////////////////////////////////////////////////////////////////////////////
// Jira2Redmine Migration RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Splits a Jira display name into Redmine first/last name.
//!
//! `"Last, First"` splits on the first comma; anything else splits on
//! whitespace into first word / remaining words. Single-token names cannot
//! be split and send the row to manual intervention.

use crate::error::MigrationError;

/// `(firstname, lastname)` derived from a Jira display name.
pub fn split_display_name(display_name: &str) -> Result<(String, String), MigrationError> {
    let trimmed = display_name.trim();
    if trimmed.is_empty() {
        return Err(MigrationError::validation("display name is empty"));
    }

    if let Some((last, first)) = trimmed.split_once(',') {
        let first = first.trim();
        let last = last.trim();
        if first.is_empty() || last.is_empty() {
            return Err(MigrationError::validation(format!(
                "display name '{}' has an empty side around the comma",
                display_name
            )));
        }
        return Ok((first.to_string(), last.to_string()));
    }

    let mut words = trimmed.split_whitespace();
    let first = words.next().unwrap_or_default();
    let rest: Vec<&str> = words.collect();
    if rest.is_empty() {
        return Err(MigrationError::validation(format!(
            "display name '{}' cannot be split into first and last name",
            display_name
        )));
    }
    Ok((first.to_string(), rest.join(" ")))
}
