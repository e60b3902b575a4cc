// src/db/models/rpm.rs

//! Rpm model - binary packages available in repositories

use crate::error::Result;
use crate::version::{Nevra, RpmVersion};
use rusqlite::{Connection, OptionalExtension, Row, params};

const COLUMNS: &str = "id, uuid, name, epoch, version, release, arch, nvra";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rpm {
    pub id: Option<i64>,
    /// Backend identifier reported by the applicability source
    pub uuid: String,
    pub name: String,
    pub epoch: u64,
    pub version: String,
    pub release: String,
    pub arch: String,
    pub nvra: String,
}

impl Rpm {
    pub fn new(uuid: String, nevra: &Nevra) -> Self {
        Self {
            id: None,
            uuid,
            name: nevra.name.clone(),
            epoch: nevra.evr.epoch,
            version: nevra.evr.version.clone(),
            release: nevra.evr.release.clone().unwrap_or_default(),
            arch: nevra.arch.clone(),
            nvra: nevra.nvra(),
        }
    }

    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO rpms (uuid, name, epoch, version, release, arch, nvra)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                &self.uuid,
                &self.name,
                self.epoch as i64,
                &self.version,
                &self.release,
                &self.arch,
                &self.nvra,
            ],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<Self>> {
        let rpm = conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM rpms WHERE id = ?1"),
                [id],
                Self::from_row,
            )
            .optional()?;
        Ok(rpm)
    }

    pub fn find_by_nvra(conn: &Connection, nvra: &str) -> Result<Option<Self>> {
        let rpm = conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM rpms WHERE nvra = ?1"),
                [nvra],
                Self::from_row,
            )
            .optional()?;
        Ok(rpm)
    }

    pub fn find_by_uuid(conn: &Connection, uuid: &str) -> Result<Option<Self>> {
        let rpm = conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM rpms WHERE uuid = ?1"),
                [uuid],
                Self::from_row,
            )
            .optional()?;
        Ok(rpm)
    }

    pub fn evr(&self) -> RpmVersion {
        RpmVersion {
            epoch: self.epoch,
            version: self.version.clone(),
            release: Some(self.release.clone()),
        }
    }

    pub fn nevra(&self) -> Nevra {
        Nevra {
            name: self.name.clone(),
            evr: self.evr(),
            arch: self.arch.clone(),
        }
    }

    pub(crate) fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            uuid: row.get(1)?,
            name: row.get(2)?,
            epoch: row.get::<_, i64>(3)? as u64,
            version: row.get(4)?,
            release: row.get(5)?,
            arch: row.get(6)?,
            nvra: row.get(7)?,
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
