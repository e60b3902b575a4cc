// src/db/models/host.rs

//! Host and InstalledPackage models

use crate::error::Result;
use crate::version::Nevra;
use rusqlite::{Connection, OptionalExtension, Row, params};

/// A managed node; owns at most one content facet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Host {
    pub id: Option<i64>,
    pub name: String,
}

impl Host {
    pub fn new(name: String) -> Self {
        Self { id: None, name }
    }

    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute("INSERT INTO hosts (name) VALUES (?1)", [&self.name])?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<Self>> {
        let host = conn
            .query_row("SELECT id, name FROM hosts WHERE id = ?1", [id], Self::from_row)
            .optional()?;
        Ok(host)
    }

    pub fn find_by_name(conn: &Connection, name: &str) -> Result<Option<Self>> {
        let host = conn
            .query_row(
                "SELECT id, name FROM hosts WHERE name = ?1",
                [name],
                Self::from_row,
            )
            .optional()?;
        Ok(host)
    }

    /// Delete a host; its facet, inventory and statuses go with it
    pub fn delete(conn: &Connection, id: i64) -> Result<()> {
        conn.execute("DELETE FROM hosts WHERE id = ?1", [id])?;
        Ok(())
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            name: row.get(1)?,
        })
    }
}

/// A package the host reports as installed
///
/// The NVRA string has no epoch, so a reported epoch is stored beside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledPackage {
    pub id: Option<i64>,
    pub host_id: i64,
    pub name: String,
    pub nvra: String,
    /// None when the host did not report an epoch
    pub epoch: Option<u64>,
}

impl InstalledPackage {
    pub fn new(host_id: i64, name: String, nvra: String) -> Self {
        Self {
            id: None,
            host_id,
            name,
            nvra,
            epoch: None,
        }
    }

    pub fn with_epoch(mut self, epoch: u64) -> Self {
        self.epoch = Some(epoch);
        self
    }

    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO installed_packages (host_id, name, nvra, epoch) VALUES (?1, ?2, ?3, ?4)",
            params![self.host_id, &self.name, &self.nvra, self.epoch.map(|e| e as i64)],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    pub fn list_for_host(conn: &Connection, host_id: i64) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, host_id, name, nvra, epoch FROM installed_packages
             WHERE host_id = ?1 ORDER BY nvra",
        )?;
        let packages = stmt
            .query_map([host_id], |row| {
                Ok(Self {
                    id: Some(row.get(0)?),
                    host_id: row.get(1)?,
                    name: row.get(2)?,
                    nvra: row.get(3)?,
                    epoch: row.get::<_, Option<i64>>(4)?.map(|e| e as u64),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(packages)
    }

    /// Full identity of the installed package, stored epoch included
    pub fn nevra(&self) -> Result<Nevra> {
        let mut nevra = Nevra::parse(&self.nvra)?;
        if let Some(epoch) = self.epoch {
            nevra.evr.epoch = epoch;
        }
        Ok(nevra)
    }

    /// Whether the epoch of this package is known
    ///
    /// Either stored explicitly or written into the NVRA as `name-E:V-R.A`.
    pub fn reports_epoch(&self) -> bool {
        self.epoch.is_some() || self.nvra.contains(':')
    }

    /// True if the host has a package with this name installed
    pub fn exists_for_host(conn: &Connection, host_id: i64, name: &str) -> Result<bool> {
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM installed_packages WHERE host_id = ?1 AND name = ?2)",
            params![host_id, name],
            |row| row.get(0),
        )?;
        Ok(exists)
    }
}
