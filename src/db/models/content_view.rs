// src/db/models/content_view.rs

//! ContentView and ContentViewVersion models
//!
//! A content view is a named selection of repository content. Publishing it
//! produces an immutable version, which is then promoted to one or more
//! lifecycle environments. A view has at most one version per environment.

use crate::error::{Error, Result};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentView {
    pub id: Option<i64>,
    pub name: String,
    pub description: Option<String>,
}

impl ContentView {
    pub fn new(name: String) -> Self {
        Self {
            id: None,
            name,
            description: None,
        }
    }

    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO content_views (name, description) VALUES (?1, ?2)",
            params![&self.name, &self.description],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<Self>> {
        let view = conn
            .query_row(
                "SELECT id, name, description FROM content_views WHERE id = ?1",
                [id],
                Self::from_row,
            )
            .optional()?;
        Ok(view)
    }

    /// The version of this view currently promoted to `environment_id`
    pub fn version(
        conn: &Connection,
        view_id: i64,
        environment_id: i64,
    ) -> Result<Option<ContentViewVersion>> {
        let version = conn
            .query_row(
                "SELECT v.id, v.content_view_id, v.major, v.minor
                 FROM content_view_versions v
                 JOIN content_view_environments cve ON cve.content_view_version_id = v.id
                 WHERE cve.content_view_id = ?1 AND cve.lifecycle_environment_id = ?2",
                [view_id, environment_id],
                ContentViewVersion::from_row,
            )
            .optional()?;
        Ok(version)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            name: row.get(1)?,
            description: row.get(2)?,
        })
    }
}

/// An immutable published snapshot of a content view
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentViewVersion {
    pub id: Option<i64>,
    pub content_view_id: i64,
    pub major: i64,
    pub minor: i64,
}

impl ContentViewVersion {
    pub fn new(content_view_id: i64, major: i64, minor: i64) -> Self {
        Self {
            id: None,
            content_view_id,
            major,
            minor,
        }
    }

    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO content_view_versions (content_view_id, major, minor) VALUES (?1, ?2, ?3)",
            params![self.content_view_id, self.major, self.minor],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    /// Promote this version to an environment, replacing whatever version of
    /// the same view was there before
    pub fn promote(&self, conn: &Connection, environment_id: i64) -> Result<()> {
        let id = self.id.ok_or_else(|| {
            Error::InitError("Cannot promote content view version without ID".to_string())
        })?;

        conn.execute(
            "INSERT INTO content_view_environments
                (content_view_id, lifecycle_environment_id, content_view_version_id)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(content_view_id, lifecycle_environment_id)
             DO UPDATE SET content_view_version_id = excluded.content_view_version_id",
            params![self.content_view_id, environment_id, id],
        )?;
        Ok(())
    }

    /// Environments this version is promoted to
    pub fn environment_ids(&self, conn: &Connection) -> Result<Vec<i64>> {
        let Some(id) = self.id else {
            return Ok(Vec::new());
        };

        let mut stmt = conn.prepare(
            "SELECT lifecycle_environment_id FROM content_view_environments
             WHERE content_view_version_id = ?1 ORDER BY lifecycle_environment_id",
        )?;
        let ids = stmt
            .query_map([id], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    pub(crate) fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            content_view_id: row.get(1)?,
            major: row.get(2)?,
            minor: row.get(3)?,
        })
    }
}

impl fmt::Display for ContentViewVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}
