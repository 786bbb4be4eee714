// /////////////////////////////////////////////////////////////////////////////
// Jira2Redmine Migration RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Persistence for the mapping database: schema management plus the staging
//! and mapping repositories, bundled as the [`Store`] every phase works
//! against.

pub mod mapping_repository;
pub mod schema;
pub mod staging_repository;

use sqlx::SqlitePool;

pub use mapping_repository::{LookupKind, MappingRepository};
pub use staging_repository::StagingRepository;

/// The mapping database, staging side and mapping side together.
#[derive(Debug, Clone)]
pub struct Store {
    pub staging: StagingRepository,
    pub mapping: MappingRepository,
}

impl Store {
    pub fn new(pool: SqlitePool) -> Self {
        Store {
            staging: StagingRepository::new(pool.clone()),
            mapping: MappingRepository::new(pool),
        }
    }
}
