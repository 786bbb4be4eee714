// /////////////////////////////////////////////////////////////////////////////
// Jira2Redmine Migration RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Domain Error System
//!
//! Hierarchical error type for the migration domain. Every failure mode the
//! pipeline can encounter is represented by a variant carrying a descriptive,
//! operator-actionable message.
//!
//! ## Error Categories
//!
//! - **Configuration**: `InvalidConfiguration`: malformed or missing config
//!   sections; always fatal (exit 1).
//! - **Validation/mapping**: `ValidationError`: missing email, unresolvable
//!   key, ambiguous match; recorded on the offending mapping row as
//!   `MANUAL_INTERVENTION_REQUIRED` and processing continues.
//! - **Remote APIs**: `JiraApiError`, `RedmineApiError`, `SharePointError`:
//!   transport failures and remote rejections, retried or recorded per the
//!   error-handling policy of the calling phase.
//! - **Infrastructure**: `DatabaseError`, `IoError`, `SerializationError`.
//! - **Content**: `ContentError`: ADF/HTML conversion failures; callers fall
//!   back to plain-text flattening where the rewrite rules allow it.
//! - **System**: `InternalError`: unexpected response shapes and invariant
//!   violations; fatal.
//!
//! Errors are `Clone` so they can be recorded on mapping rows and counted in
//! phase summaries without losing the original.

use thiserror::Error;

/// Domain-specific errors for the migration pipeline.
///
/// Each variant carries a message with enough context to act on: the entity,
/// the identifier, and what went wrong.
#[derive(Error, Debug, Clone)]
pub enum MigrationError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Jira API error: {0}")]
    JiraApiError(String),

    #[error("Redmine API error: {0}")]
    RedmineApiError(String),

    #[error("SharePoint error: {0}")]
    SharePointError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Content conversion error: {0}")]
    ContentError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl MigrationError {
    /// True when the error is a misconfiguration that must abort the process.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            MigrationError::InvalidConfiguration(_) | MigrationError::InternalError(_)
        )
    }

    /// Creates a validation error with context.
    pub fn validation(message: impl Into<String>) -> Self {
        MigrationError::ValidationError(message.into())
    }

    /// Creates an internal error with context.
    pub fn internal(message: impl Into<String>) -> Self {
        MigrationError::InternalError(message.into())
    }
}

impl From<std::io::Error> for MigrationError {
    fn from(error: std::io::Error) -> Self {
        MigrationError::IoError(error.to_string())
    }
}

impl From<serde_json::Error> for MigrationError {
    fn from(error: serde_json::Error) -> Self {
        MigrationError::SerializationError(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_includes_category_and_message() {
        let err = MigrationError::ValidationError("missing email for accountId a1".to_string());
        assert_eq!(err.to_string(), "Validation error: missing email for accountId a1");
    }

    #[test]
    fn test_fatal_classification() {
        assert!(MigrationError::InvalidConfiguration("no DSN".into()).is_fatal());
        assert!(MigrationError::internal("unexpected response shape").is_fatal());
        assert!(!MigrationError::JiraApiError("HTTP 429".into()).is_fatal());
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err: MigrationError = io.into();
        assert!(matches!(err, MigrationError::IoError(_)));
    }
}
