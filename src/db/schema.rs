// src/db/schema.rs

//! Schema version tracking and migration driver
//!
//! The individual migrations live in [`super::migrations`]; this module only
//! records which version a database is at and applies the missing ones in
//! order.

use super::migrations;
use crate::error::{Error, Result};
use rusqlite::Connection;
use tracing::info;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 4;

/// Initialize the schema version tracking table
fn init_schema_version(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;
    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> Result<i32> {
    init_schema_version(conn)?;

    let version: Option<i32> = conn.query_row(
        "SELECT MAX(version) FROM schema_version",
        [],
        |row| row.get(0),
    )?;

    Ok(version.unwrap_or(0))
}

/// Set the schema version
fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        [version],
    )?;
    Ok(())
}

/// Apply all pending migrations to bring the database up to date
pub fn migrate(conn: &Connection) -> Result<()> {
    let current_version = get_schema_version(conn)?;

    if current_version >= SCHEMA_VERSION {
        return Ok(());
    }

    info!(
        "Migrating schema from version {} to {}",
        current_version, SCHEMA_VERSION
    );

    for version in (current_version + 1)..=SCHEMA_VERSION {
        apply_migration(conn, version)?;
        set_schema_version(conn, version)?;
    }

    info!("Schema migration complete. Now at version {}", SCHEMA_VERSION);
    Ok(())
}

/// Apply a specific migration version
fn apply_migration(conn: &Connection, version: i32) -> Result<()> {
    match version {
        1 => migrations::migrate_v1(conn),
        2 => migrations::migrate_v2(conn),
        3 => migrations::migrate_v3(conn),
        4 => migrations::migrate_v4(conn),
        _ => Err(Error::InitError(format!(
            "Unknown migration version: {}",
            version
        ))),
    }
}
