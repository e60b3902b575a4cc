// src/facet/regeneration.rs

//! Applicability regeneration after a binding change
//!
//! A binding change marks the facet as pending regeneration in the same
//! transaction that stores the new binding. The mark is cleared only once a
//! `GenerateApplicability` task has been enqueued, so a dispatch that fails
//! is retried by the next binding update for the host.

use crate::backend::{FacetTask, TaskDispatcher, TaskKind};
use crate::db::models::ContentFacet;
use crate::error::{Error, Result};
use rusqlite::{Connection, params};
use tracing::{debug, info};

impl ContentFacet {
    /// Whether a regeneration task still has to be enqueued for this host
    pub fn regeneration_pending(&self, conn: &Connection) -> Result<bool> {
        let facet_id = self.require_id()?;
        let pending: bool = conn.query_row(
            "SELECT regeneration_pending FROM content_facets WHERE id = ?1",
            [facet_id],
            |row| row.get(0),
        )?;
        Ok(pending)
    }

    /// Enqueue applicability regeneration for this host and clear the mark
    ///
    /// On failure the mark stays set and the error is a Dispatch error.
    pub fn dispatch_regeneration(
        &self,
        conn: &Connection,
        dispatcher: &dyn TaskDispatcher,
    ) -> Result<()> {
        let facet_id = self.require_id()?;
        dispatcher
            .enqueue(TaskKind::GenerateApplicability, &[self.host_ref()])
            .map_err(|e| match e {
                Error::Dispatch(_) => e,
                other => Error::Dispatch(format!(
                    "{} failed for host {}: {}",
                    dispatcher.name(),
                    self.host_id,
                    other
                )),
            })?;
        set_pending(conn, facet_id, false)
    }
}

pub(crate) fn set_pending(conn: &Connection, facet_id: i64, pending: bool) -> Result<()> {
    conn.execute(
        "UPDATE content_facets SET regeneration_pending = ?1 WHERE id = ?2",
        params![pending, facet_id],
    )?;
    Ok(())
}

/// Carry out one claimed task against the local database
///
/// Regeneration recomputes each listed host's errata status from its
/// applicability snapshot and current bindings. Hosts that no longer have
/// a facet are skipped.
pub fn run_task(conn: &Connection, task: &FacetTask) -> Result<()> {
    match task.kind {
        TaskKind::GenerateApplicability => {
            for host in &task.hosts {
                let Some(facet) = ContentFacet::find_by_host(conn, host.host_id)? else {
                    debug!("Task {}: host {} has no content facet", task.id, host.host_id);
                    continue;
                };
                let status = facet.refresh_errata_status(conn)?;
                info!("Host {} errata status is now {}", host.host_id, status);
            }
        }
    }
    Ok(())
}
