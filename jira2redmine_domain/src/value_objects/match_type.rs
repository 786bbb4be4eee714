// /////////////////////////////////////////////////////////////////////////////
// Jira2Redmine Migration RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! User match provenance: whether an existing Redmine user was matched by
//! `login` or by `mail`. Login matches take precedence when both apply.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::MigrationError;

/// How a Jira user was matched to an existing Redmine user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchType {
    Login,
    Mail,
}

impl MatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchType::Login => "LOGIN",
            MatchType::Mail => "MAIL",
        }
    }
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchType {
    type Err = MigrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LOGIN" => Ok(MatchType::Login),
            "MAIL" => Ok(MatchType::Mail),
            other => Err(MigrationError::validation(format!("unknown match type '{}'", other))),
        }
    }
}
