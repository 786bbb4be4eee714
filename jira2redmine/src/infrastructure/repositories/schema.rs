// /////////////////////////////////////////////////////////////////////////////
// Jira2Redmine Migration RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! SQLite schema helpers shared by the staging and mapping repositories.
//!
//! Applies migrations on start-up so every phase and every integration test
//! sees a consistent mapping database.

use sqlx::migrate::MigrateDatabase;
use sqlx::SqlitePool;
use tracing::{debug, info};

/// Runs pending migrations against the provided SQLite pool.
pub async fn ensure_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    debug!("Ensuring mapping database schema is up to date");

    // sqlx tracks applied migrations in its own bookkeeping table.
    sqlx::migrate!("../migrations").run(pool).await?;

    info!("Mapping database schema is up to date");
    Ok(())
}

/// Creates a new SQLite database file if it doesn't exist.
pub async fn create_database_if_missing(database_url: &str) -> Result<(), sqlx::Error> {
    if !sqlx::Sqlite::database_exists(database_url).await? {
        debug!("Database does not exist, creating: {}", database_url);
        sqlx::Sqlite::create_database(database_url).await?;
        info!("Created new SQLite database: {}", database_url);
    } else {
        debug!("Database already exists: {}", database_url);
    }
    Ok(())
}

/// Creates the database when missing, connects, and migrates. The one call
/// application startup needs.
pub async fn initialize_database(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    create_database_if_missing(database_url).await?;
    let pool = SqlitePool::connect(database_url).await?;
    ensure_schema(&pool).await?;
    Ok(pool)
}
