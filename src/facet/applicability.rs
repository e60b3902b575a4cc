// src/facet/applicability.rs

//! Applicability snapshot: the errata and RPMs that could apply to a host
//!
//! The snapshot reflects the host's installed state only. It does not depend
//! on which repositories are bound; installability is derived from it on
//! read (see [`super::installable`]).

use crate::db::models::{ContentFacet, Erratum, InstalledPackage, Rpm};
use crate::error::Result;
use rusqlite::{Connection, params};
use std::collections::BTreeSet;

/// Which applicability set an operation targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ContentKind {
    Errata,
    Rpms,
}

impl ContentKind {
    /// Content table holding the backend uuid
    pub(crate) fn content_table(self) -> &'static str {
        match self {
            ContentKind::Errata => "errata",
            ContentKind::Rpms => "rpms",
        }
    }

    /// Facet join table and its content column
    pub(crate) fn facet_join(self) -> (&'static str, &'static str) {
        match self {
            ContentKind::Errata => ("content_facet_errata", "erratum_id"),
            ContentKind::Rpms => ("content_facet_rpms", "rpm_id"),
        }
    }
}

impl ContentFacet {
    /// Errata applicable to this host, ordered by errata id
    pub fn applicable_errata(&self, conn: &Connection) -> Result<Vec<Erratum>> {
        let facet_id = self.require_id()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM errata e
             JOIN content_facet_errata cfe ON cfe.erratum_id = e.id
             WHERE cfe.content_facet_id = ?1
             ORDER BY e.errata_id",
            Erratum::columns("e")
        ))?;
        let errata = stmt
            .query_map([facet_id], Erratum::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(errata)
    }

    /// RPMs applicable to this host, ordered by NVRA
    pub fn applicable_rpms(&self, conn: &Connection) -> Result<Vec<Rpm>> {
        let facet_id = self.require_id()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM rpms r
             JOIN content_facet_rpms cfr ON cfr.rpm_id = r.id
             WHERE cfr.content_facet_id = ?1
             ORDER BY r.nvra",
            Rpm::columns("r")
        ))?;
        let rpms = stmt
            .query_map([facet_id], Rpm::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rpms)
    }

    /// Replace the applicable errata with exactly `erratum_ids`
    ///
    /// Run inside [`crate::db::transaction`] when the replacement must be
    /// atomic with other writes.
    pub fn set_applicable_errata(&self, conn: &Connection, erratum_ids: &[i64]) -> Result<()> {
        let facet_id = self.require_id()?;
        write_full(conn, facet_id, ContentKind::Errata, &erratum_ids.iter().copied().collect())
    }

    pub fn add_applicable_erratum(&self, conn: &Connection, erratum_id: i64) -> Result<()> {
        let facet_id = self.require_id()?;
        conn.execute(
            "INSERT OR IGNORE INTO content_facet_errata (content_facet_id, erratum_id) VALUES (?1, ?2)",
            [facet_id, erratum_id],
        )?;
        Ok(())
    }

    /// Replace the applicable RPMs with exactly `rpm_ids`
    pub fn set_applicable_rpms(&self, conn: &Connection, rpm_ids: &[i64]) -> Result<()> {
        let facet_id = self.require_id()?;
        write_full(conn, facet_id, ContentKind::Rpms, &rpm_ids.iter().copied().collect())
    }

    pub fn add_applicable_rpm(&self, conn: &Connection, rpm_id: i64) -> Result<()> {
        let facet_id = self.require_id()?;
        conn.execute(
            "INSERT OR IGNORE INTO content_facet_rpms (content_facet_id, rpm_id) VALUES (?1, ?2)",
            [facet_id, rpm_id],
        )?;
        Ok(())
    }

    /// Whether the host has the agent package installed
    ///
    /// Derived from the installed package inventory on every call.
    pub fn agent_installed(&self, conn: &Connection, package_name: &str) -> Result<bool> {
        InstalledPackage::exists_for_host(conn, self.host_id, package_name)
    }
}

/// Ids currently in one of the facet's applicability sets
pub(crate) fn current_ids(conn: &Connection, facet_id: i64, kind: ContentKind) -> Result<BTreeSet<i64>> {
    let (table, column) = kind.facet_join();
    let mut stmt = conn.prepare(&format!(
        "SELECT {column} FROM {table} WHERE content_facet_id = ?1"
    ))?;
    let ids = stmt
        .query_map([facet_id], |row| row.get(0))?
        .collect::<std::result::Result<BTreeSet<i64>, _>>()?;
    Ok(ids)
}

/// Clear the set and insert `ids`
pub(crate) fn write_full(
    conn: &Connection,
    facet_id: i64,
    kind: ContentKind,
    ids: &BTreeSet<i64>,
) -> Result<()> {
    let (table, _) = kind.facet_join();
    conn.execute(
        &format!("DELETE FROM {table} WHERE content_facet_id = ?1"),
        [facet_id],
    )?;
    insert_ids(conn, facet_id, kind, ids.iter())
}

/// Apply only the difference between the stored set and `ids`
pub(crate) fn write_delta(
    conn: &Connection,
    facet_id: i64,
    kind: ContentKind,
    current: &BTreeSet<i64>,
    ids: &BTreeSet<i64>,
) -> Result<()> {
    let (table, column) = kind.facet_join();
    let mut delete = conn.prepare(&format!(
        "DELETE FROM {table} WHERE content_facet_id = ?1 AND {column} = ?2"
    ))?;
    for id in current.difference(ids) {
        delete.execute(params![facet_id, id])?;
    }
    insert_ids(conn, facet_id, kind, ids.difference(current))
}

fn insert_ids<'a>(
    conn: &Connection,
    facet_id: i64,
    kind: ContentKind,
    ids: impl Iterator<Item = &'a i64>,
) -> Result<()> {
    let (table, column) = kind.facet_join();
    let mut insert = conn.prepare(&format!(
        "INSERT OR IGNORE INTO {table} (content_facet_id, {column}) VALUES (?1, ?2)"
    ))?;
    for id in ids {
        insert.execute(params![facet_id, id])?;
    }
    Ok(())
}
