// src/db/mod.rs

//! SQLite persistence for content facets
//!
//! All facet state (hosts, repositories, content views, applicability) lives
//! in a single SQLite database. Callers open a connection with [`open`] and
//! group multi-statement writes with [`transaction`].

pub mod migrations;
pub mod models;
pub mod schema;

use crate::error::{Error, Result};
use rusqlite::{Connection, Transaction};
use std::path::Path;
use tracing::{debug, info};

/// Create the database file (and parent directory) and apply the schema
pub fn init(db_path: &str) -> Result<()> {
    info!("Initializing database at {}", db_path);

    if let Some(parent) = Path::new(db_path).parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        std::fs::create_dir_all(parent)?;
    }

    let conn = open_raw(db_path)?;
    schema::migrate(&conn)?;
    Ok(())
}

/// Open an existing database and bring its schema up to date
pub fn open(db_path: &str) -> Result<Connection> {
    if !Path::new(db_path).exists() {
        return Err(Error::NotFound(format!(
            "Database not found at {} (run init first)",
            db_path
        )));
    }

    let conn = open_raw(db_path)?;
    schema::migrate(&conn)?;
    Ok(conn)
}

/// Open an in-memory database with the full schema applied
pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    configure(&conn)?;
    schema::migrate(&conn)?;
    Ok(conn)
}

fn open_raw(db_path: &str) -> Result<Connection> {
    debug!("Opening database {}", db_path);
    let conn = Connection::open(db_path)?;
    configure(&conn)?;
    Ok(conn)
}

fn configure(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;",
    )?;
    Ok(())
}

/// Run `f` inside a transaction, committing on success
///
/// Any error returned by `f` rolls the transaction back when it is dropped.
pub fn transaction<F, T>(conn: &mut Connection, f: F) -> Result<T>
where
    F: FnOnce(&Transaction) -> Result<T>,
{
    let tx = conn.transaction()?;
    let value = f(&tx)?;
    tx.commit()?;
    Ok(value)
}
