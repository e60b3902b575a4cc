// src/facet/import.rs

//! Import of applicability reports from the content backend
//!
//! A report is the complete list of backend uuids applicable to one host.
//! It is fetched before anything is written, then applied in a single
//! transaction, so the stored snapshot is either the old set or exactly the
//! reported one.

use super::applicability::{ContentKind, current_ids, write_delta, write_full};
use crate::backend::ApplicabilitySource;
use crate::db;
use crate::db::models::{ContentFacet, ErrataStatus, ErratumType, HostStatus};
use crate::error::{Error, Result};
use rusqlite::{Connection, OptionalExtension};
use std::collections::BTreeSet;
use tracing::{debug, info};

/// How a report is written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportMode {
    /// Remove ids missing from the report and insert new ones
    Partial,
    /// Clear the set and insert every reported id
    Full,
}

impl ImportMode {
    pub fn from_incremental(incremental: bool) -> Self {
        if incremental {
            ImportMode::Partial
        } else {
            ImportMode::Full
        }
    }
}

/// Counts from one import
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub added: usize,
    pub removed: usize,
    /// Reported uuids with no local record
    pub ignored: usize,
}

impl ContentFacet {
    /// Replace the applicable errata with the source's report
    ///
    /// The host's errata status is recomputed in the same transaction.
    pub fn import_errata_applicability(
        &self,
        conn: &mut Connection,
        source: &dyn ApplicabilitySource,
        mode: ImportMode,
    ) -> Result<ImportSummary> {
        let facet_id = self.require_id()?;
        let reported = source
            .applicable_errata_ids(&self.host_ref())
            .map_err(|e| fetch_error(source, self.host_id, e))?;

        let summary = db::transaction(conn, |tx| {
            let summary = apply_report(tx, facet_id, ContentKind::Errata, &reported, mode)?;
            self.refresh_errata_status(tx)?;
            Ok(summary)
        })?;

        info!(
            "Imported errata applicability for host {} from {}: +{} -{} ({} ignored)",
            self.host_id,
            source.name(),
            summary.added,
            summary.removed,
            summary.ignored
        );
        Ok(summary)
    }

    /// Replace the applicable RPMs with the source's report
    pub fn import_rpm_applicability(
        &self,
        conn: &mut Connection,
        source: &dyn ApplicabilitySource,
        mode: ImportMode,
    ) -> Result<ImportSummary> {
        let facet_id = self.require_id()?;
        let reported = source
            .applicable_rpm_ids(&self.host_ref())
            .map_err(|e| fetch_error(source, self.host_id, e))?;

        let summary = db::transaction(conn, |tx| {
            apply_report(tx, facet_id, ContentKind::Rpms, &reported, mode)
        })?;

        info!(
            "Imported rpm applicability for host {} from {}: +{} -{} ({} ignored)",
            self.host_id,
            source.name(),
            summary.added,
            summary.removed,
            summary.ignored
        );
        Ok(summary)
    }

    /// Recompute and store the host's errata status from installable errata
    pub fn refresh_errata_status(&self, conn: &Connection) -> Result<ErrataStatus> {
        let installable = self.installable_errata(conn)?;

        let status = if installable
            .iter()
            .any(|e| e.errata_type == ErratumType::Security)
        {
            ErrataStatus::NeededSecurityErrata
        } else if !installable.is_empty() {
            ErrataStatus::NeededErrata
        } else {
            ErrataStatus::UpToDate
        };

        HostStatus::set_errata(conn, self.host_id, status)?;
        Ok(status)
    }
}

fn fetch_error(source: &dyn ApplicabilitySource, host_id: i64, e: Error) -> Error {
    match e {
        Error::Import(_) => e,
        other => Error::Import(format!(
            "{} failed for host {}: {}",
            source.name(),
            host_id,
            other
        )),
    }
}

fn apply_report(
    conn: &Connection,
    facet_id: i64,
    kind: ContentKind,
    reported: &[String],
    mode: ImportMode,
) -> Result<ImportSummary> {
    let mut next = BTreeSet::new();
    let mut ignored = 0;
    {
        let mut lookup = conn.prepare(&format!(
            "SELECT id FROM {} WHERE uuid = ?1",
            kind.content_table()
        ))?;
        for uuid in reported {
            match lookup.query_row([uuid], |row| row.get::<_, i64>(0)).optional()? {
                Some(id) => {
                    next.insert(id);
                }
                None => {
                    debug!("Ignoring unknown {} uuid {}", kind.content_table(), uuid);
                    ignored += 1;
                }
            }
        }
    }

    let current = current_ids(conn, facet_id, kind)?;
    match mode {
        ImportMode::Partial => write_delta(conn, facet_id, kind, &current, &next)?,
        ImportMode::Full => write_full(conn, facet_id, kind, &next)?,
    }

    Ok(ImportSummary {
        added: next.difference(&current).count(),
        removed: current.difference(&next).count(),
        ignored,
    })
}
