// /////////////////////////////////////////////////////////////////////////////
// Jira2Redmine Migration RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Association Hint Value Object
//!
//! Decides when an uploaded attachment token is consumed: at issue creation
//! (`ISSUE`) for attachments added together with the issue, or on a later
//! journal update (`JOURNAL`) for attachments added afterwards.
//!
//! The hint is derived by comparing the attachment's `created` timestamp with
//! the owning issue's `created` timestamp. Anything within the 60 second
//! tolerance counts as created with the issue.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::error::MigrationError;

/// Attachments created within this window of their issue ride along on the
/// issue-create call.
pub const ISSUE_ASSOCIATION_TOLERANCE_SECS: i64 = 60;

/// Where an attachment's upload token is consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssociationHint {
    Issue,
    Journal,
}

impl AssociationHint {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssociationHint::Issue => "ISSUE",
            AssociationHint::Journal => "JOURNAL",
        }
    }

    /// Derives the hint from the attachment and issue creation timestamps.
    pub fn from_timestamps(
        attachment_created: DateTime<FixedOffset>,
        issue_created: DateTime<FixedOffset>,
    ) -> Self {
        let delta = (attachment_created - issue_created).num_seconds();
        if delta <= ISSUE_ASSOCIATION_TOLERANCE_SECS {
            AssociationHint::Issue
        } else {
            AssociationHint::Journal
        }
    }
}

impl fmt::Display for AssociationHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssociationHint {
    type Err = MigrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ISSUE" => Ok(AssociationHint::Issue),
            "JOURNAL" => Ok(AssociationHint::Journal),
            other => Err(MigrationError::validation(format!(
                "unknown association hint '{}'",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(s).unwrap()
    }

    #[test]
    fn test_attachment_created_with_issue_is_issue_hint() {
        let issue = ts("2024-05-01T10:00:00+00:00");
        let att = ts("2024-05-01T10:00:45+00:00");
        assert_eq!(AssociationHint::from_timestamps(att, issue), AssociationHint::Issue);
    }

    #[test]
    fn test_boundary_sixty_seconds_is_issue_hint() {
        let issue = ts("2024-05-01T10:00:00+00:00");
        let att = ts("2024-05-01T10:01:00+00:00");
        assert_eq!(AssociationHint::from_timestamps(att, issue), AssociationHint::Issue);
    }

    #[test]
    fn test_later_attachment_is_journal_hint() {
        let issue = ts("2024-05-01T10:00:00+00:00");
        let att = ts("2024-05-01T10:01:01+00:00");
        assert_eq!(AssociationHint::from_timestamps(att, issue), AssociationHint::Journal);
    }

    #[test]
    fn test_attachment_before_issue_is_issue_hint() {
        // Clock skew can put the attachment before its issue; that still
        // counts as created together.
        let issue = ts("2024-05-01T10:00:00+00:00");
        let att = ts("2024-05-01T09:59:30+00:00");
        assert_eq!(AssociationHint::from_timestamps(att, issue), AssociationHint::Issue);
    }
}
