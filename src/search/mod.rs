// src/search/mod.rs

//! Host search over content facet state
//!
//! Each predicate maps to the set of host ids implied by the relational
//! joins at the time of the query. Nothing is indexed ahead of time.

mod parser;

pub use parser::parse;

use crate::db::models::{ContentFacet, ErrataStatus, Erratum, Host, Rpm, TraceStatus};
use crate::error::{Error, Result};
use rusqlite::{Connection, ToSql};
use std::collections::BTreeSet;
use std::str::FromStr;
use tracing::debug;

/// A single searchable condition on hosts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// Content view name
    ContentView(String),
    ContentViewId(i64),
    /// Lifecycle environment name
    LifecycleEnvironment(String),
    LifecycleEnvironmentId(i64),
    /// Errata id (e.g. `RHSA-2024:0001`)
    ApplicableErrata(String),
    InstallableErrata(String),
    /// Package NVRA
    ApplicableRpms(String),
    InstallableRpms(String),
    UpgradableRpms(String),
    /// Bound repository name
    Repository(String),
    ErrataStatus(ErrataStatus),
    TraceStatus(TraceStatus),
    AgentInstalled(bool),
}

impl Predicate {
    /// Build a predicate from a query field and its value
    pub fn from_field(field: &str, value: &str) -> Result<Self> {
        let predicate = match field {
            "content_view" => Predicate::ContentView(value.to_string()),
            "content_view_id" => Predicate::ContentViewId(parse_id(field, value)?),
            "lifecycle_environment" => Predicate::LifecycleEnvironment(value.to_string()),
            "lifecycle_environment_id" => {
                Predicate::LifecycleEnvironmentId(parse_id(field, value)?)
            }
            "applicable_errata" => Predicate::ApplicableErrata(value.to_string()),
            "installable_errata" => Predicate::InstallableErrata(value.to_string()),
            "applicable_rpms" => Predicate::ApplicableRpms(value.to_string()),
            "installable_rpms" => Predicate::InstallableRpms(value.to_string()),
            "upgradable_rpms" => Predicate::UpgradableRpms(value.to_string()),
            "repository" => Predicate::Repository(value.to_string()),
            "errata_status" => Predicate::ErrataStatus(
                ErrataStatus::from_str(value)
                    .map_err(|_| Error::Search(format!("unknown errata status '{value}'")))?,
            ),
            "trace_status" => Predicate::TraceStatus(
                TraceStatus::from_str(value)
                    .map_err(|_| Error::Search(format!("unknown trace status '{value}'")))?,
            ),
            "agent_installed" => Predicate::AgentInstalled(match value {
                "true" => true,
                "false" => false,
                _ => {
                    return Err(Error::Search(format!(
                        "agent_installed expects true or false, got '{value}'"
                    )));
                }
            }),
            _ => return Err(Error::Search(format!("unknown search field '{field}'"))),
        };
        Ok(predicate)
    }

    /// Ids of hosts matching this predicate
    ///
    /// `agent_package` is the package name that marks the agent as installed.
    pub fn host_ids(&self, conn: &Connection, agent_package: &str) -> Result<BTreeSet<i64>> {
        match self {
            Predicate::ContentView(name) => select_ids(
                conn,
                "SELECT cf.host_id FROM content_facets cf
                 JOIN content_views v ON v.id = cf.content_view_id
                 WHERE v.name = ?1",
                &[name],
            ),
            Predicate::ContentViewId(id) => select_ids(
                conn,
                "SELECT host_id FROM content_facets WHERE content_view_id = ?1",
                &[id],
            ),
            Predicate::LifecycleEnvironment(name) => select_ids(
                conn,
                "SELECT cf.host_id FROM content_facets cf
                 JOIN lifecycle_environments le ON le.id = cf.lifecycle_environment_id
                 WHERE le.name = ?1",
                &[name],
            ),
            Predicate::LifecycleEnvironmentId(id) => select_ids(
                conn,
                "SELECT host_id FROM content_facets WHERE lifecycle_environment_id = ?1",
                &[id],
            ),
            Predicate::ApplicableErrata(errata_id) => select_ids(
                conn,
                "SELECT cf.host_id FROM content_facets cf
                 JOIN content_facet_errata cfe ON cfe.content_facet_id = cf.id
                 JOIN errata e ON e.id = cfe.erratum_id
                 WHERE e.errata_id = ?1",
                &[errata_id],
            ),
            Predicate::InstallableErrata(errata_id) => {
                let Some(erratum_id) =
                    Erratum::find_by_errata_id(conn, errata_id)?.and_then(|e| e.id)
                else {
                    return Ok(BTreeSet::new());
                };
                Ok(ContentFacet::with_installable_errata(conn, &[erratum_id])?
                    .into_iter()
                    .map(|f| f.host_id)
                    .collect())
            }
            Predicate::ApplicableRpms(nvra) => select_ids(
                conn,
                "SELECT cf.host_id FROM content_facets cf
                 JOIN content_facet_rpms cfr ON cfr.content_facet_id = cf.id
                 JOIN rpms r ON r.id = cfr.rpm_id
                 WHERE r.nvra = ?1",
                &[nvra],
            ),
            Predicate::InstallableRpms(nvra) => select_ids(conn, INSTALLABLE_RPM_HOSTS, &[nvra]),
            Predicate::UpgradableRpms(nvra) => upgradable_rpm_hosts(conn, nvra),
            Predicate::Repository(name) => select_ids(
                conn,
                "SELECT cf.host_id FROM content_facets cf
                 JOIN content_facet_repositories cfr ON cfr.content_facet_id = cf.id
                 JOIN repositories r ON r.id = cfr.repository_id
                 WHERE r.name = ?1",
                &[name],
            ),
            Predicate::ErrataStatus(status) => select_ids(
                conn,
                "SELECT h.id FROM hosts h
                 LEFT JOIN host_statuses s ON s.host_id = h.id AND s.kind = 'errata'
                 WHERE COALESCE(s.status, ?2) = ?1",
                &[&status.code(), &ErrataStatus::Unknown.code()],
            ),
            Predicate::TraceStatus(status) => select_ids(
                conn,
                "SELECT host_id FROM host_statuses WHERE kind = 'trace' AND status = ?1",
                &[&status.code()],
            ),
            Predicate::AgentInstalled(true) => select_ids(
                conn,
                "SELECT host_id FROM installed_packages WHERE name = ?1",
                &[&agent_package],
            ),
            Predicate::AgentInstalled(false) => select_ids(
                conn,
                "SELECT id FROM hosts
                 WHERE id NOT IN (SELECT host_id FROM installed_packages WHERE name = ?1)",
                &[&agent_package],
            ),
        }
    }
}

const INSTALLABLE_RPM_HOSTS: &str = "SELECT cf.host_id FROM content_facets cf
     JOIN content_facet_rpms cfr ON cfr.content_facet_id = cf.id
     JOIN rpms r ON r.id = cfr.rpm_id
     WHERE r.nvra = ?1
       AND EXISTS (
         SELECT 1 FROM repository_rpms rr
         JOIN content_facet_repositories cfb ON cfb.repository_id = rr.repository_id
         WHERE rr.rpm_id = r.id AND cfb.content_facet_id = cf.id)";

fn parse_id(field: &str, value: &str) -> Result<i64> {
    value
        .parse()
        .map_err(|_| Error::Search(format!("{field} expects an integer, got '{value}'")))
}

fn select_ids(conn: &Connection, sql: &str, params: &[&dyn ToSql]) -> Result<BTreeSet<i64>> {
    let mut stmt = conn.prepare(sql)?;
    let ids = stmt
        .query_map(params, |row| row.get(0))?
        .collect::<std::result::Result<BTreeSet<i64>, _>>()?;
    Ok(ids)
}

fn upgradable_rpm_hosts(conn: &Connection, nvra: &str) -> Result<BTreeSet<i64>> {
    let Some(rpm_id) = Rpm::find_by_nvra(conn, nvra)?.and_then(|r| r.id) else {
        return Ok(BTreeSet::new());
    };

    let mut hosts = BTreeSet::new();
    for host_id in select_ids(conn, INSTALLABLE_RPM_HOSTS, &[&nvra])? {
        let Some(facet) = ContentFacet::find_by_host(conn, host_id)? else {
            continue;
        };
        if facet
            .upgradable_rpms(conn)?
            .iter()
            .any(|rpm| rpm.id == Some(rpm_id))
        {
            hosts.insert(host_id);
        }
    }
    Ok(hosts)
}

/// Ids of hosts matching every predicate
pub fn matching_host_ids(
    conn: &Connection,
    predicates: &[Predicate],
    agent_package: &str,
) -> Result<BTreeSet<i64>> {
    let mut result: Option<BTreeSet<i64>> = None;

    for predicate in predicates {
        let ids = predicate.host_ids(conn, agent_package)?;
        debug!("{:?} matched {} host(s)", predicate, ids.len());
        result = Some(match result {
            Some(acc) => acc.intersection(&ids).copied().collect(),
            None => ids,
        });
    }

    Ok(result.unwrap_or_default())
}

/// Parse `query` and return the matching hosts, ordered by name
pub fn search_hosts(conn: &Connection, query: &str, agent_package: &str) -> Result<Vec<Host>> {
    let predicates = parse(query)?;
    let ids = matching_host_ids(conn, &predicates, agent_package)?;

    let mut hosts = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(host) = Host::find_by_id(conn, id)? {
            hosts.push(host);
        }
    }
    hosts.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(hosts)
}
