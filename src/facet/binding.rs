// src/facet/binding.rs

//! Repository binding: which repositories a host consumes content from
//!
//! The set operations here are plain writes. Path-based updates are the
//! path hosts use to report their repositories, and they carry the side
//! effects: consumer registration and applicability regeneration.

use super::regeneration;
use crate::backend::{ConsumerRegistry, TaskDispatcher};
use crate::db;
use crate::db::models::{ContentFacet, Repository};
use crate::error::{Error, Result};
use rusqlite::{Connection, params};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// Collaborators and settings for a path-based binding update
pub struct BindingContext<'a> {
    pub dispatcher: &'a dyn TaskDispatcher,
    pub registry: &'a dyn ConsumerRegistry,
    /// Accepted path prefixes, each starting and ending with '/'
    pub path_prefixes: &'a [String],
}

/// Outcome of a binding update
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindingChange {
    /// Repository ids newly bound, ascending
    pub added: Vec<i64>,
    /// Repository ids no longer bound, ascending
    pub removed: Vec<i64>,
}

impl BindingChange {
    fn between(current: &BTreeSet<i64>, next: &BTreeSet<i64>) -> Self {
        Self {
            added: next.difference(current).copied().collect(),
            removed: current.difference(next).copied().collect(),
        }
    }

    pub fn changed(&self) -> bool {
        !self.added.is_empty() || !self.removed.is_empty()
    }
}

impl ContentFacet {
    /// Currently bound repositories, ordered by id
    pub fn bound_repositories(&self, conn: &Connection) -> Result<Vec<Repository>> {
        let facet_id = self.require_id()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM repositories r
             JOIN content_facet_repositories cfr ON cfr.repository_id = r.id
             WHERE cfr.content_facet_id = ?1
             ORDER BY r.id",
            Repository::columns("r")
        ))?;
        let repos = stmt
            .query_map([facet_id], Repository::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(repos)
    }

    pub fn bound_repository_ids(&self, conn: &Connection) -> Result<BTreeSet<i64>> {
        let facet_id = self.require_id()?;
        let mut stmt = conn.prepare(
            "SELECT repository_id FROM content_facet_repositories WHERE content_facet_id = ?1",
        )?;
        let ids = stmt
            .query_map([facet_id], |row| row.get(0))?
            .collect::<std::result::Result<BTreeSet<i64>, _>>()?;
        Ok(ids)
    }

    /// Set the bound repositories to exactly `repository_ids`
    ///
    /// No registration or regeneration is triggered.
    pub fn set_bound_repositories(&self, conn: &Connection, repository_ids: &[i64]) -> Result<()> {
        let facet_id = self.require_id()?;
        write_bindings(conn, facet_id, &repository_ids.iter().copied().collect())
    }

    /// Add one repository to the bound set
    pub fn bind_repository(&self, conn: &Connection, repository_id: i64) -> Result<()> {
        let facet_id = self.require_id()?;
        conn.execute(
            "INSERT OR IGNORE INTO content_facet_repositories (content_facet_id, repository_id)
             VALUES (?1, ?2)",
            [facet_id, repository_id],
        )?;
        Ok(())
    }

    /// Resolve reported repository paths to repository ids
    ///
    /// Every path must carry one of `prefixes` and name an existing
    /// repository. Duplicates collapse.
    pub fn resolve_repository_paths<S: AsRef<str>>(
        conn: &Connection,
        paths: &[S],
        prefixes: &[String],
    ) -> Result<BTreeSet<i64>> {
        let mut ids = BTreeSet::new();

        for path in paths {
            let path = path.as_ref();
            let relative = prefixes
                .iter()
                .find_map(|prefix| path.strip_prefix(prefix.as_str()))
                .ok_or_else(|| {
                    Error::Resolution(format!("path '{path}' is not under a known content prefix"))
                })?
                .trim_matches('/');

            let repo = Repository::find_by_relative_path(conn, relative)?.ok_or_else(|| {
                Error::Resolution(format!("no repository found for path '{path}'"))
            })?;

            let id = repo
                .id
                .ok_or_else(|| Error::NotFound(format!("Repository for path '{path}'")))?;
            ids.insert(id);
        }

        Ok(ids)
    }

    /// Bind the host to exactly the repositories named by `paths`
    ///
    /// An unchanged set returns without side effects. Otherwise the new set
    /// is registered with the consumer registry, stored, and a regeneration
    /// task is enqueued for the host. A registration failure leaves the
    /// stored binding as it was.
    ///
    /// An enqueue failure returns a Dispatch error with the new binding
    /// already stored. The host stays marked pending, and the next call
    /// enqueues the task even when the set is unchanged.
    pub fn update_repositories_by_paths<S: AsRef<str>>(
        &self,
        conn: &mut Connection,
        paths: &[S],
        ctx: &BindingContext<'_>,
    ) -> Result<BindingChange> {
        let facet_id = self.require_id()?;
        let next = Self::resolve_repository_paths(conn, paths, ctx.path_prefixes)?;
        let current = self.bound_repository_ids(conn)?;

        let change = BindingChange::between(&current, &next);
        if !change.changed() {
            if self.regeneration_pending(conn)? {
                debug!("Re-dispatching pending regeneration for host {}", self.host_id);
                self.dispatch_regeneration(conn, ctx.dispatcher)?;
            } else {
                debug!("Repository binding unchanged for host {}", self.host_id);
            }
            return Ok(change);
        }

        let backend_ids = registration_ids(conn, &next)?;
        self.register(ctx.registry, &backend_ids)?;

        db::transaction(conn, |tx| {
            write_bindings(tx, facet_id, &next)?;
            regeneration::set_pending(tx, facet_id, true)
        })?;

        info!(
            "Host {} bound to {} repositories (+{} -{})",
            self.host_id,
            next.len(),
            change.added.len(),
            change.removed.len()
        );

        if let Err(e) = self.dispatch_regeneration(conn, ctx.dispatcher) {
            warn!(
                "Binding for host {} stored but regeneration is still pending: {}",
                self.host_id, e
            );
            return Err(e);
        }

        Ok(change)
    }

    /// Register the current bound set with the consumer registry
    ///
    /// Returns the backend ids that were registered.
    pub fn propagate_repositories(
        &self,
        conn: &Connection,
        registry: &dyn ConsumerRegistry,
    ) -> Result<Vec<String>> {
        let bound = self.bound_repository_ids(conn)?;
        let backend_ids = registration_ids(conn, &bound)?;
        self.register(registry, &backend_ids)?;
        Ok(backend_ids)
    }

    fn register(&self, registry: &dyn ConsumerRegistry, backend_ids: &[String]) -> Result<()> {
        registry
            .bind_repositories(&self.host_ref(), backend_ids)
            .map_err(|e| match e {
                Error::Propagation(_) => e,
                other => Error::Propagation(format!(
                    "{} failed for host {}: {}",
                    registry.name(),
                    self.host_id,
                    other
                )),
            })
    }
}

/// Backend ids for a set of repositories, library-resolved, deduped, sorted
fn registration_ids(conn: &Connection, repository_ids: &BTreeSet<i64>) -> Result<Vec<String>> {
    let mut backend_ids = BTreeSet::new();
    for id in repository_ids {
        let repo = Repository::find_by_id(conn, *id)?
            .ok_or_else(|| Error::NotFound(format!("Repository {id}")))?;
        backend_ids.insert(repo.library_backend_id(conn)?);
    }
    Ok(backend_ids.into_iter().collect())
}

fn write_bindings(conn: &Connection, facet_id: i64, repository_ids: &BTreeSet<i64>) -> Result<()> {
    conn.execute(
        "DELETE FROM content_facet_repositories WHERE content_facet_id = ?1",
        [facet_id],
    )?;
    let mut stmt = conn.prepare(
        "INSERT INTO content_facet_repositories (content_facet_id, repository_id) VALUES (?1, ?2)",
    )?;
    for repository_id in repository_ids {
        stmt.execute(params![facet_id, repository_id])?;
    }
    Ok(())
}
