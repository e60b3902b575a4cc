// src/db/models/erratum.rs

//! Erratum model - advisories identified by an errata id such as RHSA-2024:0101

use crate::error::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::str::FromStr;
use strum_macros::{AsRefStr, Display, EnumString};

const COLUMNS: &str = "id, uuid, errata_id, title, errata_type, severity, issued";

/// Advisory classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum ErratumType {
    Security,
    Bugfix,
    Enhancement,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Erratum {
    pub id: Option<i64>,
    /// Backend identifier reported by the applicability source
    pub uuid: String,
    pub errata_id: String,
    pub title: Option<String>,
    pub errata_type: ErratumType,
    pub severity: Option<String>,
    pub issued: Option<String>,
}

impl Erratum {
    pub fn new(uuid: String, errata_id: String, errata_type: ErratumType) -> Self {
        Self {
            id: None,
            uuid,
            errata_id,
            title: None,
            errata_type,
            severity: None,
            issued: None,
        }
    }

    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO errata (uuid, errata_id, title, errata_type, severity, issued)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                &self.uuid,
                &self.errata_id,
                &self.title,
                self.errata_type.as_ref(),
                &self.severity,
                &self.issued,
            ],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<Self>> {
        let erratum = conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM errata WHERE id = ?1"),
                [id],
                Self::from_row,
            )
            .optional()?;
        Ok(erratum)
    }

    pub fn find_by_errata_id(conn: &Connection, errata_id: &str) -> Result<Option<Self>> {
        let erratum = conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM errata WHERE errata_id = ?1"),
                [errata_id],
                Self::from_row,
            )
            .optional()?;
        Ok(erratum)
    }

    pub fn find_by_uuid(conn: &Connection, uuid: &str) -> Result<Option<Self>> {
        let erratum = conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM errata WHERE uuid = ?1"),
                [uuid],
                Self::from_row,
            )
            .optional()?;
        Ok(erratum)
    }

    /// Repositories containing this erratum
    pub fn repository_ids(&self, conn: &Connection) -> Result<Vec<i64>> {
        let Some(id) = self.id else {
            return Ok(Vec::new());
        };
        let mut stmt = conn.prepare(
            "SELECT repository_id FROM repository_errata WHERE erratum_id = ?1 ORDER BY repository_id",
        )?;
        let ids = stmt
            .query_map([id], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    /// Record that this erratum updates `rpm_id`
    pub fn add_package(conn: &Connection, erratum_id: i64, rpm_id: i64) -> Result<()> {
        conn.execute(
            "INSERT OR IGNORE INTO erratum_packages (erratum_id, rpm_id) VALUES (?1, ?2)",
            [erratum_id, rpm_id],
        )?;
        Ok(())
    }

    /// NVRAs of the packages this erratum updates
    pub fn package_nvras(&self, conn: &Connection) -> Result<Vec<String>> {
        let Some(id) = self.id else {
            return Ok(Vec::new());
        };
        let mut stmt = conn.prepare(
            "SELECT r.nvra FROM rpms r
             JOIN erratum_packages ep ON ep.rpm_id = r.id
             WHERE ep.erratum_id = ?1 ORDER BY r.nvra",
        )?;
        let nvras = stmt
            .query_map([id], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(nvras)
    }

    pub(crate) fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let errata_type: String = row.get(4)?;
        let errata_type = ErratumType::from_str(&errata_type).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
        })?;

        Ok(Self {
            id: Some(row.get(0)?),
            uuid: row.get(1)?,
            errata_id: row.get(2)?,
            title: row.get(3)?,
            errata_type,
            severity: row.get(5)?,
            issued: row.get(6)?,
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
