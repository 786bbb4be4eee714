// /////////////////////////////////////////////////////////////////////////////
// Jira2Redmine Migration RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Migration Status Value Object
//!
//! Type-safe representation of the lifecycle state carried by every mapping
//! row. The full set of states spans all entity families; each family uses
//! the subset documented on its transform and push steps.
//!
//! ## State Families
//!
//! - **Analysis**: `PENDING_ANALYSIS`, `PENDING` (journals awaiting their
//!   issue), `MANUAL_INTERVENTION_REQUIRED`
//! - **Ready**: `READY_FOR_CREATION` (create on push), `READY_FOR_PUSH`
//!   (update on push)
//! - **Terminal success**: `MATCH_FOUND` (pre-existing Redmine object),
//!   `CREATION_SUCCESS`, `SUCCESS`
//! - **Failure**: `CREATION_FAILED`, `FAILED`, `SKIPPED`
//! - **Attachment pipeline**: `PENDING_DOWNLOAD` → `PENDING_UPLOAD` →
//!   `PENDING_ASSOCIATION` → `SUCCESS`
//!
//! A status in { `MATCH_FOUND`, `CREATION_SUCCESS`, `SUCCESS` } implies the
//! row carries a Redmine identifier; foreign references resolve only against
//! rows whose status is `MATCH_FOUND` or `CREATION_SUCCESS`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::MigrationError;

/// Lifecycle state of a mapping row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MigrationStatus {
    PendingAnalysis,
    Pending,
    ReadyForCreation,
    ReadyForPush,
    MatchFound,
    ManualInterventionRequired,
    CreationSuccess,
    Success,
    CreationFailed,
    Failed,
    Skipped,
    PendingDownload,
    PendingUpload,
    PendingAssociation,
}

impl MigrationStatus {
    /// Canonical database representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            MigrationStatus::PendingAnalysis => "PENDING_ANALYSIS",
            MigrationStatus::Pending => "PENDING",
            MigrationStatus::ReadyForCreation => "READY_FOR_CREATION",
            MigrationStatus::ReadyForPush => "READY_FOR_PUSH",
            MigrationStatus::MatchFound => "MATCH_FOUND",
            MigrationStatus::ManualInterventionRequired => "MANUAL_INTERVENTION_REQUIRED",
            MigrationStatus::CreationSuccess => "CREATION_SUCCESS",
            MigrationStatus::Success => "SUCCESS",
            MigrationStatus::CreationFailed => "CREATION_FAILED",
            MigrationStatus::Failed => "FAILED",
            MigrationStatus::Skipped => "SKIPPED",
            MigrationStatus::PendingDownload => "PENDING_DOWNLOAD",
            MigrationStatus::PendingUpload => "PENDING_UPLOAD",
            MigrationStatus::PendingAssociation => "PENDING_ASSOCIATION",
        }
    }

    /// True when a foreign reference may resolve against this row.
    ///
    /// Only matched or freshly created rows contribute to dependency lookups;
    /// rows that merely look ready must not leak unconfirmed identifiers.
    pub fn is_ready_reference(&self) -> bool {
        matches!(self, MigrationStatus::MatchFound | MigrationStatus::CreationSuccess)
    }

    /// True when the invariant "status implies a Redmine id" applies.
    pub fn requires_redmine_id(&self) -> bool {
        matches!(
            self,
            MigrationStatus::MatchFound | MigrationStatus::CreationSuccess | MigrationStatus::Success
        )
    }

    /// True when the push phase acts on a row in this state.
    pub fn is_pushable(&self) -> bool {
        matches!(self, MigrationStatus::ReadyForCreation | MigrationStatus::ReadyForPush)
    }
}

impl fmt::Display for MigrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MigrationStatus {
    type Err = MigrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING_ANALYSIS" => Ok(MigrationStatus::PendingAnalysis),
            "PENDING" => Ok(MigrationStatus::Pending),
            "READY_FOR_CREATION" => Ok(MigrationStatus::ReadyForCreation),
            "READY_FOR_PUSH" => Ok(MigrationStatus::ReadyForPush),
            "MATCH_FOUND" => Ok(MigrationStatus::MatchFound),
            "MANUAL_INTERVENTION_REQUIRED" => Ok(MigrationStatus::ManualInterventionRequired),
            "CREATION_SUCCESS" => Ok(MigrationStatus::CreationSuccess),
            "SUCCESS" => Ok(MigrationStatus::Success),
            "CREATION_FAILED" => Ok(MigrationStatus::CreationFailed),
            "FAILED" => Ok(MigrationStatus::Failed),
            "SKIPPED" => Ok(MigrationStatus::Skipped),
            "PENDING_DOWNLOAD" => Ok(MigrationStatus::PendingDownload),
            "PENDING_UPLOAD" => Ok(MigrationStatus::PendingUpload),
            "PENDING_ASSOCIATION" => Ok(MigrationStatus::PendingAssociation),
            other => Err(MigrationError::validation(format!(
                "unknown migration status '{}'",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_all_variants() {
        let all = [
            MigrationStatus::PendingAnalysis,
            MigrationStatus::Pending,
            MigrationStatus::ReadyForCreation,
            MigrationStatus::ReadyForPush,
            MigrationStatus::MatchFound,
            MigrationStatus::ManualInterventionRequired,
            MigrationStatus::CreationSuccess,
            MigrationStatus::Success,
            MigrationStatus::CreationFailed,
            MigrationStatus::Failed,
            MigrationStatus::Skipped,
            MigrationStatus::PendingDownload,
            MigrationStatus::PendingUpload,
            MigrationStatus::PendingAssociation,
        ];
        for status in all {
            assert_eq!(status.as_str().parse::<MigrationStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        assert!("NOT_A_STATUS".parse::<MigrationStatus>().is_err());
    }

    #[test]
    fn test_ready_reference_subset() {
        assert!(MigrationStatus::MatchFound.is_ready_reference());
        assert!(MigrationStatus::CreationSuccess.is_ready_reference());
        assert!(!MigrationStatus::Success.is_ready_reference());
        assert!(!MigrationStatus::ReadyForCreation.is_ready_reference());
    }

    #[test]
    fn test_redmine_id_invariant_statuses() {
        assert!(MigrationStatus::Success.requires_redmine_id());
        assert!(MigrationStatus::MatchFound.requires_redmine_id());
        assert!(!MigrationStatus::PendingAnalysis.requires_redmine_id());
    }

    #[test]
    fn test_serde_uses_screaming_snake_case() {
        let json = serde_json::to_string(&MigrationStatus::ReadyForCreation).unwrap();
        assert_eq!(json, "\"READY_FOR_CREATION\"");
    }
}
