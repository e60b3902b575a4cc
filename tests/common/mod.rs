// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use conary_facet::Nevra;
use conary_facet::db;
use conary_facet::db::models::{
    ContentFacet, ContentView, ContentViewVersion, Erratum, ErratumType, Host,
    LifecycleEnvironment, Repository, Rpm,
};
use rusqlite::Connection;
use tempfile::TempDir;

pub const PREFIX: &str = "/pulp/repos/";

/// A small organization: two environments, a default view and a
/// `library_dev_view` whose repositories are copies of the library ones.
///
/// The rhel copy in `library_dev_view` only carries the security erratum and
/// `one`, so it is a strict subset of the library rhel repository.
pub struct Fixture {
    /// Keep alive to prevent cleanup
    pub dir: TempDir,
    pub db_path: String,
    pub conn: Connection,

    pub library: i64,
    pub dev: i64,
    pub default_view: i64,
    pub library_dev_view: i64,
    pub library_dev_version: ContentViewVersion,

    pub rhel: i64,
    pub fedora: i64,
    pub view_rhel: i64,
    pub dev_fedora: i64,

    pub security: i64,
    pub enhancement: i64,
    pub rpm_one: i64,
    pub rpm_two: i64,
    pub rpm_three: i64,

    pub host_one: ContentFacet,
    pub host_two: ContentFacet,
}

impl Fixture {
    pub fn prefixes(&self) -> Vec<String> {
        vec![PREFIX.to_string()]
    }

    /// Full published path for a repository's relative path
    pub fn path(&self, repository_id: i64) -> String {
        let repo = Repository::find_by_id(&self.conn, repository_id)
            .unwrap()
            .unwrap();
        format!("{PREFIX}{}", repo.relative_path)
    }
}

fn repository(
    conn: &Connection,
    name: &str,
    relative_path: &str,
    backend_id: &str,
    view: i64,
    env: i64,
    library_instance: Option<i64>,
) -> i64 {
    let mut repo = Repository::new(
        name.to_string(),
        relative_path.to_string(),
        backend_id.to_string(),
        view,
        env,
    );
    if let Some(origin) = library_instance {
        repo = repo.with_library_instance(origin);
    }
    repo.insert(conn).unwrap()
}

fn rpm(conn: &Connection, nvra: &str) -> i64 {
    Rpm::new(format!("{nvra}-uuid"), &Nevra::parse(nvra).unwrap())
        .insert(conn)
        .unwrap()
}

fn facet(conn: &Connection, host: &str, view: i64, env: i64) -> ContentFacet {
    let host_id = Host::new(host.to_string()).insert(conn).unwrap();
    let mut facet = ContentFacet::new(host_id, view, env);
    facet.uuid = Some(format!("{host}-consumer"));
    facet.insert(conn).unwrap();
    facet
}

/// Create the fixture on a fresh file-backed database.
pub fn setup() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir
        .path()
        .join("facet.db")
        .to_str()
        .unwrap()
        .to_string();

    db::init(&db_path).unwrap();
    let conn = db::open(&db_path).unwrap();

    let library = LifecycleEnvironment::library("Library".to_string())
        .insert(&conn)
        .unwrap();
    let dev = LifecycleEnvironment::new("Dev".to_string(), Some(library))
        .insert(&conn)
        .unwrap();

    let default_view = ContentView::new("Default Organization View".to_string())
        .insert(&conn)
        .unwrap();
    let library_dev_view = ContentView::new("library_dev_view".to_string())
        .insert(&conn)
        .unwrap();
    let mut library_dev_version = ContentViewVersion::new(library_dev_view, 1, 0);
    library_dev_version.insert(&conn).unwrap();
    library_dev_version.promote(&conn, library).unwrap();
    library_dev_version.promote(&conn, dev).unwrap();

    let rhel = repository(
        &conn,
        "rhel_6_x86_64",
        "ACME_Corporation/library/rhel_6_x86_64",
        "pulp-rhel-6-x86_64",
        default_view,
        library,
        None,
    );
    let fedora = repository(
        &conn,
        "fedora_17_x86_64",
        "ACME_Corporation/library/fedora_17_x86_64",
        "pulp-fedora-17-x86_64",
        default_view,
        library,
        None,
    );
    let view_rhel = repository(
        &conn,
        "rhel_6_x86_64",
        "ACME_Corporation/library/library_dev_view/rhel_6_x86_64",
        "pulp-library-dev-view-rhel-6-x86_64",
        library_dev_view,
        library,
        Some(rhel),
    );
    let dev_fedora = repository(
        &conn,
        "fedora_17_x86_64",
        "ACME_Corporation/dev/library_dev_view/fedora_17_x86_64",
        "pulp-dev-library-dev-view-fedora-17-x86_64",
        library_dev_view,
        dev,
        Some(fedora),
    );

    let security = Erratum::new(
        "security-uuid".to_string(),
        "RHSA-1999-1231".to_string(),
        ErratumType::Security,
    )
    .insert(&conn)
    .unwrap();
    let enhancement = Erratum::new(
        "enhancement-uuid".to_string(),
        "RHEA-2014-111".to_string(),
        ErratumType::Enhancement,
    )
    .insert(&conn)
    .unwrap();

    let rpm_one = rpm(&conn, "one-1.0-2.el6.x86_64");
    let rpm_two = rpm(&conn, "two-1.0-2.el6.x86_64");
    let rpm_three = rpm(&conn, "three-1.0-2.el6.x86_64");

    for erratum in [security, enhancement] {
        Repository::add_erratum(&conn, rhel, erratum).unwrap();
    }
    for rpm_id in [rpm_one, rpm_two] {
        Repository::add_rpm(&conn, rhel, rpm_id).unwrap();
    }
    Repository::add_erratum(&conn, view_rhel, security).unwrap();
    Repository::add_rpm(&conn, view_rhel, rpm_one).unwrap();
    Repository::add_rpm(&conn, fedora, rpm_three).unwrap();
    Erratum::add_package(&conn, security, rpm_one).unwrap();
    Erratum::add_package(&conn, enhancement, rpm_two).unwrap();

    let host_one = facet(&conn, "host1.example.com", library_dev_view, library);
    let host_two = facet(&conn, "host2.example.com", library_dev_view, library);

    Fixture {
        dir,
        db_path,
        conn,
        library,
        dev,
        default_view,
        library_dev_view,
        library_dev_version,
        rhel,
        fedora,
        view_rhel,
        dev_fedora,
        security,
        enhancement,
        rpm_one,
        rpm_two,
        rpm_three,
        host_one,
        host_two,
    }
}

/// Ids of a list of errata
pub fn erratum_ids(errata: &[Erratum]) -> Vec<i64> {
    errata.iter().filter_map(|e| e.id).collect()
}

/// Ids of a list of RPMs
pub fn rpm_ids(rpms: &[Rpm]) -> Vec<i64> {
    rpms.iter().filter_map(|r| r.id).collect()
}
