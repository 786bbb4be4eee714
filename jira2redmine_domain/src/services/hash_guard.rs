// /////////////////////////////////////////////////////////////////////////////
// Jira2Redmine Migration RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Hash Guard
//!
//! Computes and compares the `automation_hash` that separates automated
//! reconciler output from operator edits.
//!
//! ## Canonical encoding
//!
//! The hash input is the JSON serialization of a `*AutomatedFields` struct
//! (see [`crate::entities::mappings`]). serde serializes struct fields in
//! declaration order, which freezes the layout; `None` serializes as JSON
//! `null` so every field is always present; serde_json leaves `/` unescaped
//! and emits UTF-8 directly. Together this makes the encoding stable across
//! runs and across machines.
//!
//! ## Override protocol
//!
//! - Reconciler writes a row ⇒ it also writes `compute(new_fields)`.
//! - Next run recomputes the hash of the row as stored. A mismatch means a
//!   human edited the row since; the reconciler must leave it alone.
//! - A missing or malformed stored hash means the row was never hashed, so
//!   it is fair game for automation.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::MigrationError;
use crate::value_objects::AutomationHash;

/// Computes the automation hash over a frozen field set.
pub fn compute<T: Serialize>(fields: &T) -> Result<AutomationHash, MigrationError> {
    let canonical = serde_json::to_string(fields).map_err(|e| {
        MigrationError::SerializationError(format!("failed to canonicalize automated fields: {}", e))
    })?;
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Ok(AutomationHash::from_digest(hasher.finalize()))
}

/// True iff the stored hash is present, well formed, and differs from the
/// hash of the row as it stands now.
pub fn is_manual_override(stored_hash: Option<&str>, current_hash: &AutomationHash) -> bool {
    match stored_hash.and_then(AutomationHash::parse) {
        Some(stored) => stored.as_str() != current_hash.as_str(),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::mappings::ProjectAutomatedFields;
    use crate::value_objects::MigrationStatus;

    fn sample_fields() -> ProjectAutomatedFields {
        ProjectAutomatedFields {
            redmine_project_id: Some(7),
            migration_status: MigrationStatus::MatchFound,
            notes: None,
            proposed_identifier: Some("proj".into()),
            proposed_name: Some("Project".into()),
            proposed_description: Some("path/with/slashes".into()),
            proposed_is_public: Some(true),
        }
    }

    #[test]
    fn test_compute_is_deterministic() {
        let a = compute(&sample_fields()).unwrap();
        let b = compute(&sample_fields()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_any_field_change_changes_the_hash() {
        let base = compute(&sample_fields()).unwrap();
        let mut edited = sample_fields();
        edited.proposed_name = Some("Renamed".into());
        assert_ne!(base, compute(&edited).unwrap());

        let mut status_changed = sample_fields();
        status_changed.migration_status = MigrationStatus::ReadyForCreation;
        assert_ne!(base, compute(&status_changed).unwrap());
    }

    #[test]
    fn test_null_and_missing_are_distinguished_from_values() {
        let mut with_notes = sample_fields();
        with_notes.notes = Some(String::new());
        // Empty string and null must hash differently.
        assert_ne!(compute(&sample_fields()).unwrap(), compute(&with_notes).unwrap());
    }

    #[test]
    fn test_matching_hash_is_not_an_override() {
        let current = compute(&sample_fields()).unwrap();
        assert!(!is_manual_override(Some(current.as_str()), &current));
    }

    #[test]
    fn test_differing_hash_is_an_override() {
        let current = compute(&sample_fields()).unwrap();
        let other = "b".repeat(64);
        assert!(is_manual_override(Some(&other), &current));
    }

    #[test]
    fn test_absent_or_malformed_stored_hash_is_not_an_override() {
        let current = compute(&sample_fields()).unwrap();
        assert!(!is_manual_override(None, &current));
        assert!(!is_manual_override(Some(""), &current));
        assert!(!is_manual_override(Some("deadbeef"), &current));
        assert!(!is_manual_override(Some(&"A".repeat(64)), &current));
    }
}
