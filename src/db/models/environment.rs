// src/db/models/environment.rs

//! LifecycleEnvironment model - promotion stages such as Library or Dev

use crate::error::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};

/// A named stage a content view version can be promoted to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleEnvironment {
    pub id: Option<i64>,
    pub name: String,
    /// The root environment every path starts from
    pub library: bool,
    pub prior_id: Option<i64>,
}

impl LifecycleEnvironment {
    /// Create a non-library environment following `prior_id`
    pub fn new(name: String, prior_id: Option<i64>) -> Self {
        Self {
            id: None,
            name,
            library: false,
            prior_id,
        }
    }

    /// Create the library environment
    pub fn library(name: String) -> Self {
        Self {
            id: None,
            name,
            library: true,
            prior_id: None,
        }
    }

    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO lifecycle_environments (name, library, prior_id) VALUES (?1, ?2, ?3)",
            params![&self.name, self.library as i32, &self.prior_id],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<Self>> {
        let env = conn
            .query_row(
                "SELECT id, name, library, prior_id FROM lifecycle_environments WHERE id = ?1",
                [id],
                Self::from_row,
            )
            .optional()?;
        Ok(env)
    }

    pub fn find_by_name(conn: &Connection, name: &str) -> Result<Option<Self>> {
        let env = conn
            .query_row(
                "SELECT id, name, library, prior_id FROM lifecycle_environments WHERE name = ?1",
                [name],
                Self::from_row,
            )
            .optional()?;
        Ok(env)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            name: row.get(1)?,
            library: row.get::<_, i32>(2)? != 0,
            prior_id: row.get(3)?,
        })
    }
}
