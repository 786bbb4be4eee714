// /////////////////////////////////////////////////////////////////////////////
// Jira2Redmine Migration RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Automation Hash Value Object
//!
//! SHA-256 fingerprint of the reconciler's last automated output for a
//! mapping row, stored as 64 lowercase hex characters. A stored hash that
//! no longer matches the recomputed hash marks the row as a manual override.
//!
//! A malformed stored value (wrong length, non-hex, uppercase) is treated as
//! if the row had never been hashed, not as an override; a row must not be
//! frozen forever by a corrupted hash column.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A well-formed SHA-256 automation hash.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AutomationHash(String);

impl AutomationHash {
    /// Wraps a freshly computed digest.
    pub fn from_digest(digest: impl AsRef<[u8]>) -> Self {
        AutomationHash(hex::encode(digest.as_ref()))
    }

    /// Validates a stored column value. Returns `None` for malformed input.
    pub fn parse(stored: &str) -> Option<Self> {
        if Self::is_well_formed(stored) {
            Some(AutomationHash(stored.to_string()))
        } else {
            None
        }
    }

    /// 64 lowercase hex characters, nothing else.
    pub fn is_well_formed(value: &str) -> bool {
        value.len() == 64 && value.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for AutomationHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_encoding_is_lowercase_hex() {
        let hash = AutomationHash::from_digest([0xABu8; 32]);
        assert_eq!(hash.as_str().len(), 64);
        assert!(AutomationHash::is_well_formed(hash.as_str()));
    }

    #[test]
    fn test_malformed_values_are_rejected() {
        assert!(AutomationHash::parse("").is_none());
        assert!(AutomationHash::parse("abc").is_none());
        assert!(AutomationHash::parse(&"A".repeat(64)).is_none());
        assert!(AutomationHash::parse(&"g".repeat(64)).is_none());
    }

    #[test]
    fn test_well_formed_value_parses() {
        let value = "a".repeat(64);
        assert_eq!(AutomationHash::parse(&value).unwrap().as_str(), value);
    }
}
