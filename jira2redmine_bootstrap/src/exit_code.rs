// /////////////////////////////////////////////////////////////////////////////
// Jira2Redmine Migration RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Exit Code Management
//!
//! Unix exit codes for the migration binary. The external contract is
//! minimal: 0 on success, 1 on any fatal exception. Usage errors use the
//! BSD `sysexits.h` convention so shells can distinguish operator mistakes
//! from runtime failures.

use std::fmt;

/// Exit codes following Unix conventions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(i32)]
pub enum ExitCode {
    /// Successful termination (0)
    #[default]
    Success = 0,

    /// General fatal error (1)
    Error = 1,

    /// Command line usage error (64)
    UsageError = 64,

    /// Configuration error (78)
    ConfigError = 78,
}

impl ExitCode {
    pub fn as_i32(&self) -> i32 {
        *self as i32
    }
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExitCode::Success => "Success",
            ExitCode::Error => "Error",
            ExitCode::UsageError => "UsageError",
            ExitCode::ConfigError => "ConfigError",
        };
        write!(f, "{} ({})", name, self.as_i32())
    }
}
