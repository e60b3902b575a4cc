// src/db/models/repository.rs

//! Repository model - content sources scoped to a content view and environment
//!
//! Promoting or publishing a view copies its repositories, so the same
//! upstream content exists once in the library and once per view and
//! environment. Each copy points back at its origin with
//! `library_instance_id`, an id-only reference that is resolved with a
//! lookup instead of being held as an owned parent.

use crate::error::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};

const COLUMNS: &str = "id, name, relative_path, backend_id, content_view_id, \
                       lifecycle_environment_id, library_instance_id";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    pub id: Option<i64>,
    pub name: String,
    /// Path below the published content root, unique across repositories
    pub relative_path: String,
    /// Identifier the remote consumer registration knows this repository by
    pub backend_id: String,
    pub content_view_id: i64,
    pub lifecycle_environment_id: i64,
    pub library_instance_id: Option<i64>,
}

impl Repository {
    pub fn new(
        name: String,
        relative_path: String,
        backend_id: String,
        content_view_id: i64,
        lifecycle_environment_id: i64,
    ) -> Self {
        Self {
            id: None,
            name,
            relative_path,
            backend_id,
            content_view_id,
            lifecycle_environment_id,
            library_instance_id: None,
        }
    }

    /// Set the library repository this one is a copy of
    pub fn with_library_instance(mut self, library_instance_id: i64) -> Self {
        self.library_instance_id = Some(library_instance_id);
        self
    }

    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO repositories
             (name, relative_path, backend_id, content_view_id, lifecycle_environment_id, library_instance_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                &self.name,
                &self.relative_path,
                &self.backend_id,
                self.content_view_id,
                self.lifecycle_environment_id,
                &self.library_instance_id,
            ],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<Self>> {
        let repo = conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM repositories WHERE id = ?1"),
                [id],
                Self::from_row,
            )
            .optional()?;
        Ok(repo)
    }

    pub fn find_by_relative_path(conn: &Connection, relative_path: &str) -> Result<Option<Self>> {
        let repo = conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM repositories WHERE relative_path = ?1"),
                [relative_path],
                Self::from_row,
            )
            .optional()?;
        Ok(repo)
    }

    /// Repositories belonging to a content view in an environment
    pub fn in_content_source(
        conn: &Connection,
        content_view_id: i64,
        lifecycle_environment_id: i64,
    ) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM repositories
             WHERE content_view_id = ?1 AND lifecycle_environment_id = ?2
             ORDER BY id"
        ))?;
        let repos = stmt
            .query_map([content_view_id, lifecycle_environment_id], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(repos)
    }

    /// The backend id registrations should use for this repository
    ///
    /// View and environment copies resolve to their library instance; a
    /// library repository (or a copy whose origin was deleted) uses its own.
    pub fn library_backend_id(&self, conn: &Connection) -> Result<String> {
        let Some(library_id) = self.library_instance_id else {
            return Ok(self.backend_id.clone());
        };

        let library: Option<String> = conn
            .query_row(
                "SELECT backend_id FROM repositories WHERE id = ?1",
                [library_id],
                |row| row.get(0),
            )
            .optional()?;

        Ok(library.unwrap_or_else(|| self.backend_id.clone()))
    }

    pub fn add_erratum(conn: &Connection, repository_id: i64, erratum_id: i64) -> Result<()> {
        conn.execute(
            "INSERT OR IGNORE INTO repository_errata (repository_id, erratum_id) VALUES (?1, ?2)",
            [repository_id, erratum_id],
        )?;
        Ok(())
    }

    pub fn add_rpm(conn: &Connection, repository_id: i64, rpm_id: i64) -> Result<()> {
        conn.execute(
            "INSERT OR IGNORE INTO repository_rpms (repository_id, rpm_id) VALUES (?1, ?2)",
            [repository_id, rpm_id],
        )?;
        Ok(())
    }

    pub fn delete(conn: &Connection, id: i64) -> Result<()> {
        conn.execute("DELETE FROM repositories WHERE id = ?1", [id])?;
        Ok(())
    }

    pub(crate) fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            name: row.get(1)?,
            relative_path: row.get(2)?,
            backend_id: row.get(3)?,
            content_view_id: row.get(4)?,
            lifecycle_environment_id: row.get(5)?,
            library_instance_id: row.get(6)?,
        })
    }

    pub(crate) fn columns(alias: &str) -> String {
        COLUMNS
            .split(", ")
            .map(|c| format!("{alias}.{c}"))
            .collect::<Vec<_>>()
            .join(", ")
    }
}
