// src/db/migrations.rs
//! Database migration implementations
//!
//! Each function upgrades the schema by exactly one version and is applied
//! by [`super::schema::migrate`].

use crate::error::Result;
use rusqlite::Connection;
use tracing::{debug, info};

/// Initial schema - Version 1
///
/// Creates the content model and per-host facet tables:
/// - lifecycle_environments, content_views, content_view_versions
/// - repositories: view/environment scoped, with an optional library instance
/// - errata, rpms and their repository membership
/// - hosts, content_facets and the facet's bound/applicable sets
pub fn migrate_v1(conn: &Connection) -> Result<()> {
    debug!("Creating schema version 1");

    conn.execute_batch(
        "
        CREATE TABLE lifecycle_environments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            library INTEGER NOT NULL DEFAULT 0,
            prior_id INTEGER,
            FOREIGN KEY (prior_id) REFERENCES lifecycle_environments(id) ON DELETE SET NULL
        );

        CREATE TABLE content_views (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            description TEXT
        );

        -- Immutable published snapshots of a content view
        CREATE TABLE content_view_versions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            content_view_id INTEGER NOT NULL,
            major INTEGER NOT NULL,
            minor INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE(content_view_id, major, minor),
            FOREIGN KEY (content_view_id) REFERENCES content_views(id) ON DELETE CASCADE
        );

        -- Which version of a view is promoted to an environment (at most one)
        CREATE TABLE content_view_environments (
            content_view_id INTEGER NOT NULL,
            lifecycle_environment_id INTEGER NOT NULL,
            content_view_version_id INTEGER NOT NULL,
            PRIMARY KEY (content_view_id, lifecycle_environment_id),
            FOREIGN KEY (content_view_id) REFERENCES content_views(id) ON DELETE CASCADE,
            FOREIGN KEY (lifecycle_environment_id) REFERENCES lifecycle_environments(id) ON DELETE CASCADE,
            FOREIGN KEY (content_view_version_id) REFERENCES content_view_versions(id) ON DELETE CASCADE
        );

        CREATE TABLE repositories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            relative_path TEXT NOT NULL UNIQUE,
            backend_id TEXT NOT NULL UNIQUE,
            content_view_id INTEGER NOT NULL,
            lifecycle_environment_id INTEGER NOT NULL,
            library_instance_id INTEGER,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY (content_view_id) REFERENCES content_views(id) ON DELETE CASCADE,
            FOREIGN KEY (lifecycle_environment_id) REFERENCES lifecycle_environments(id) ON DELETE CASCADE,
            FOREIGN KEY (library_instance_id) REFERENCES repositories(id) ON DELETE SET NULL
        );

        CREATE INDEX idx_repositories_source ON repositories(content_view_id, lifecycle_environment_id);

        CREATE TABLE errata (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            uuid TEXT NOT NULL UNIQUE,
            errata_id TEXT NOT NULL UNIQUE,
            title TEXT,
            errata_type TEXT NOT NULL CHECK(errata_type IN ('security', 'bugfix', 'enhancement')),
            severity TEXT,
            issued TEXT
        );

        CREATE TABLE rpms (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            uuid TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            epoch INTEGER NOT NULL DEFAULT 0,
            version TEXT NOT NULL,
            release TEXT NOT NULL,
            arch TEXT NOT NULL,
            nvra TEXT NOT NULL UNIQUE
        );

        CREATE INDEX idx_rpms_name_arch ON rpms(name, arch);

        CREATE TABLE repository_errata (
            repository_id INTEGER NOT NULL,
            erratum_id INTEGER NOT NULL,
            PRIMARY KEY (repository_id, erratum_id),
            FOREIGN KEY (repository_id) REFERENCES repositories(id) ON DELETE CASCADE,
            FOREIGN KEY (erratum_id) REFERENCES errata(id) ON DELETE CASCADE
        );

        CREATE INDEX idx_repository_errata_erratum ON repository_errata(erratum_id);

        CREATE TABLE repository_rpms (
            repository_id INTEGER NOT NULL,
            rpm_id INTEGER NOT NULL,
            PRIMARY KEY (repository_id, rpm_id),
            FOREIGN KEY (repository_id) REFERENCES repositories(id) ON DELETE CASCADE,
            FOREIGN KEY (rpm_id) REFERENCES rpms(id) ON DELETE CASCADE
        );

        CREATE INDEX idx_repository_rpms_rpm ON repository_rpms(rpm_id);

        -- Packages each erratum updates
        CREATE TABLE erratum_packages (
            erratum_id INTEGER NOT NULL,
            rpm_id INTEGER NOT NULL,
            PRIMARY KEY (erratum_id, rpm_id),
            FOREIGN KEY (erratum_id) REFERENCES errata(id) ON DELETE CASCADE,
            FOREIGN KEY (rpm_id) REFERENCES rpms(id) ON DELETE CASCADE
        );

        CREATE TABLE hosts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );

        -- One facet per host; the facet always has a content source
        CREATE TABLE content_facets (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            host_id INTEGER NOT NULL UNIQUE,
            content_view_id INTEGER NOT NULL,
            lifecycle_environment_id INTEGER NOT NULL,
            uuid TEXT UNIQUE,
            FOREIGN KEY (host_id) REFERENCES hosts(id) ON DELETE CASCADE,
            FOREIGN KEY (content_view_id) REFERENCES content_views(id),
            FOREIGN KEY (lifecycle_environment_id) REFERENCES lifecycle_environments(id)
        );

        CREATE INDEX idx_content_facets_source ON content_facets(content_view_id, lifecycle_environment_id);

        CREATE TABLE content_facet_repositories (
            content_facet_id INTEGER NOT NULL,
            repository_id INTEGER NOT NULL,
            PRIMARY KEY (content_facet_id, repository_id),
            FOREIGN KEY (content_facet_id) REFERENCES content_facets(id) ON DELETE CASCADE,
            FOREIGN KEY (repository_id) REFERENCES repositories(id) ON DELETE CASCADE
        );

        CREATE INDEX idx_content_facet_repositories_repo ON content_facet_repositories(repository_id);

        CREATE TABLE content_facet_errata (
            content_facet_id INTEGER NOT NULL,
            erratum_id INTEGER NOT NULL,
            PRIMARY KEY (content_facet_id, erratum_id),
            FOREIGN KEY (content_facet_id) REFERENCES content_facets(id) ON DELETE CASCADE,
            FOREIGN KEY (erratum_id) REFERENCES errata(id) ON DELETE CASCADE
        );

        CREATE INDEX idx_content_facet_errata_erratum ON content_facet_errata(erratum_id);

        CREATE TABLE content_facet_rpms (
            content_facet_id INTEGER NOT NULL,
            rpm_id INTEGER NOT NULL,
            PRIMARY KEY (content_facet_id, rpm_id),
            FOREIGN KEY (content_facet_id) REFERENCES content_facets(id) ON DELETE CASCADE,
            FOREIGN KEY (rpm_id) REFERENCES rpms(id) ON DELETE CASCADE
        );

        CREATE INDEX idx_content_facet_rpms_rpm ON content_facet_rpms(rpm_id);
        ",
    )?;

    info!("Schema version 1 created successfully");
    Ok(())
}

/// Schema Version 2: Installed packages and host status
///
/// - installed_packages: package inventory reported by each host
/// - host_statuses: errata/trace status per host
pub fn migrate_v2(conn: &Connection) -> Result<()> {
    debug!("Migrating to schema version 2");

    conn.execute_batch(
        "
        CREATE TABLE installed_packages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            host_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            nvra TEXT NOT NULL,
            UNIQUE(host_id, nvra),
            FOREIGN KEY (host_id) REFERENCES hosts(id) ON DELETE CASCADE
        );

        CREATE INDEX idx_installed_packages_name ON installed_packages(name);

        CREATE TABLE host_statuses (
            host_id INTEGER NOT NULL,
            kind TEXT NOT NULL CHECK(kind IN ('errata', 'trace')),
            status INTEGER NOT NULL,
            reported_at TEXT NOT NULL,
            PRIMARY KEY (host_id, kind),
            FOREIGN KEY (host_id) REFERENCES hosts(id) ON DELETE CASCADE
        );
        ",
    )?;

    info!("Schema version 2 applied successfully");
    Ok(())
}

/// Schema Version 3: Local task queue and consumer registration
///
/// - facet_tasks: queued applicability regeneration and similar tasks
/// - consumer_bindings: repositories registered for each host's consumer
pub fn migrate_v3(conn: &Connection) -> Result<()> {
    debug!("Migrating to schema version 3");

    conn.execute_batch(
        "
        CREATE TABLE facet_tasks (
            id TEXT PRIMARY KEY,
            kind TEXT NOT NULL,
            hosts_json TEXT NOT NULL,
            status TEXT NOT NULL CHECK(status IN ('queued', 'running', 'completed', 'failed')),
            created_at TEXT NOT NULL,
            finished_at TEXT
        );

        CREATE INDEX idx_facet_tasks_status ON facet_tasks(status);

        CREATE TABLE consumer_bindings (
            host_id INTEGER NOT NULL,
            backend_id TEXT NOT NULL,
            bound_at TEXT NOT NULL,
            PRIMARY KEY (host_id, backend_id),
            FOREIGN KEY (host_id) REFERENCES hosts(id) ON DELETE CASCADE
        );
        ",
    )?;

    info!("Schema version 3 applied successfully");
    Ok(())
}

/// Schema Version 4: Installed epochs and pending regeneration
///
/// - installed_packages.epoch: NULL when the host reported none
/// - content_facets.regeneration_pending: set with a binding change, cleared
///   once the regeneration task is enqueued
pub fn migrate_v4(conn: &Connection) -> Result<()> {
    debug!("Migrating to schema version 4");

    conn.execute_batch(
        "
        ALTER TABLE installed_packages ADD COLUMN epoch INTEGER;
        ALTER TABLE content_facets ADD COLUMN regeneration_pending INTEGER NOT NULL DEFAULT 0;
        ",
    )?;

    info!("Schema version 4 applied successfully");
    Ok(())
}
