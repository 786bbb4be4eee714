// /////////////////////////////////////////////////////////////////////////////
// Jira2Redmine Migration RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Per-phase tallies, printed as the one-line summary every phase ends with.

use std::fmt;

/// Counters accumulated while a phase processes its rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhaseSummary {
    /// Rows (or remote pages/objects) the phase looked at.
    pub processed: u64,
    /// Rows matched against existing Redmine objects.
    pub matched: u64,
    /// Rows classified ready for creation/push.
    pub ready: u64,
    /// Rows routed to manual intervention.
    pub manual: u64,
    /// Rows preserved because an operator edited them.
    pub overrides: u64,
    /// Rows whose status excluded them from this phase.
    pub skipped: u64,
    /// Rows whose automated output did not change.
    pub unchanged: u64,
    /// Rows that completed a remote mutation successfully.
    pub succeeded: u64,
    /// Rows that failed and were recorded.
    pub failed: u64,
    /// Rows previewed instead of mutated (`--dry-run`).
    pub previewed: u64,
}

impl PhaseSummary {
    pub fn new() -> Self {
        Self::default()
    }
}

impl fmt::Display for PhaseSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "processed={} matched={} ready={} manual={} overrides={} skipped={} unchanged={} \
             succeeded={} failed={} previewed={}",
            self.processed,
            self.matched,
            self.ready,
            self.manual,
            self.overrides,
            self.skipped,
            self.unchanged,
            self.succeeded,
            self.failed,
            self.previewed,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_display_lists_all_counters() {
        let mut summary = PhaseSummary::new();
        summary.processed = 10;
        summary.matched = 2;
        summary.failed = 1;
        let line = summary.to_string();
        assert!(line.contains("processed=10"));
        assert!(line.contains("matched=2"));
        assert!(line.contains("failed=1"));
        assert!(line.contains("previewed=0"));
    }
}
