// /////////////////////////////////////////////////////////////////////////////
// Jira2Redmine Migration RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Domain entities: staging rows and mapping rows.

pub mod mappings;
pub mod staging;

pub use mappings::{
    AttachmentMapping, IssueAutomatedFields, IssueMapping, JournalAutomatedFields, JournalEntityType,
    JournalMapping, LookupMapping, ProjectAutomatedFields, ProjectMapping, UserAutomatedFields,
    UserMapping, UserProposal, WatcherMapping,
};
pub use staging::{
    detail_kind, IssueDetailState, RedmineProjectSnapshot, RedmineUserSnapshot, StagedJiraAttachment,
    StagedJiraChangelogEntry, StagedJiraComment, StagedJiraIssue, StagedJiraProject, StagedJiraUser,
    StagedJiraWatcher,
};
