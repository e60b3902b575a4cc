// src/db/models/content_facet.rs

//! ContentFacet model - per-host content configuration
//!
//! The row holds the host's content source (view + environment). Bound
//! repositories and the applicability snapshot live in join tables and are
//! managed by the `facet` module.

use super::{ContentView, ContentViewVersion};
use crate::backend::HostRef;
use crate::error::{Error, Result};
use rusqlite::{Connection, OptionalExtension, Row, params};

const COLUMNS: &str = "id, host_id, content_view_id, lifecycle_environment_id, uuid";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentFacet {
    pub id: Option<i64>,
    pub host_id: i64,
    pub content_view_id: i64,
    pub lifecycle_environment_id: i64,
    /// Consumer identifier at the remote content backend
    pub uuid: Option<String>,
}

impl ContentFacet {
    pub fn new(host_id: i64, content_view_id: i64, lifecycle_environment_id: i64) -> Self {
        Self {
            id: None,
            host_id,
            content_view_id,
            lifecycle_environment_id,
            uuid: None,
        }
    }

    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO content_facets (host_id, content_view_id, lifecycle_environment_id, uuid)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                self.host_id,
                self.content_view_id,
                self.lifecycle_environment_id,
                &self.uuid,
            ],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<Self>> {
        let facet = conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM content_facets WHERE id = ?1"),
                [id],
                Self::from_row,
            )
            .optional()?;
        Ok(facet)
    }

    pub fn find_by_host(conn: &Connection, host_id: i64) -> Result<Option<Self>> {
        let facet = conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM content_facets WHERE host_id = ?1"),
                [host_id],
                Self::from_row,
            )
            .optional()?;
        Ok(facet)
    }

    /// Persist a changed content source or consumer uuid
    pub fn update(&self, conn: &Connection) -> Result<()> {
        let id = self.require_id()?;

        conn.execute(
            "UPDATE content_facets SET content_view_id = ?1, lifecycle_environment_id = ?2, uuid = ?3
             WHERE id = ?4",
            params![
                self.content_view_id,
                self.lifecycle_environment_id,
                &self.uuid,
                id,
            ],
        )?;
        Ok(())
    }

    /// The version of the facet's view promoted to its environment
    pub fn content_view_version(&self, conn: &Connection) -> Result<Option<ContentViewVersion>> {
        ContentView::version(conn, self.content_view_id, self.lifecycle_environment_id)
    }

    /// Facets whose content source is any version's view in one of the
    /// given environments
    pub fn in_content_view_version_environments(
        conn: &Connection,
        pairs: &[(ContentViewVersion, Vec<i64>)],
    ) -> Result<Vec<Self>> {
        let mut facets: Vec<Self> = Vec::new();
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM content_facets
             WHERE content_view_id = ?1 AND lifecycle_environment_id = ?2"
        ))?;

        for (version, environment_ids) in pairs {
            for environment_id in environment_ids {
                let rows = stmt
                    .query_map(params![version.content_view_id, environment_id], Self::from_row)?;
                for facet in rows {
                    let facet = facet?;
                    if !facets.iter().any(|f| f.id == facet.id) {
                        facets.push(facet);
                    }
                }
            }
        }

        facets.sort_by_key(|f| f.id);
        Ok(facets)
    }

    /// Reference handed to external collaborators
    pub fn host_ref(&self) -> HostRef {
        HostRef {
            host_id: self.host_id,
            consumer_uuid: self.uuid.clone(),
        }
    }

    pub(crate) fn require_id(&self) -> Result<i64> {
        self.id.ok_or_else(|| {
            Error::InitError("Content facet has not been saved".to_string())
        })
    }

    pub(crate) fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            host_id: row.get(1)?,
            content_view_id: row.get(2)?,
            lifecycle_environment_id: row.get(3)?,
            uuid: row.get(4)?,
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::db::models::{Host, LifecycleEnvironment};

    struct Fixture {
        conn: Connection,
        library: i64,
        dev: i64,
        view: i64,
        version: ContentViewVersion,
    }

    fn fixture() -> Fixture {
        let conn = db::open_in_memory().unwrap();
        let library = LifecycleEnvironment::library("Library".to_string())
            .insert(&conn)
            .unwrap();
        let dev = LifecycleEnvironment::new("Dev".to_string(), Some(library))
            .insert(&conn)
            .unwrap();
        let view = ContentView::new("library_dev_view".to_string())
            .insert(&conn)
            .unwrap();
        let mut version = ContentViewVersion::new(view, 1, 0);
        version.insert(&conn).unwrap();
        version.promote(&conn, library).unwrap();
        Fixture {
            conn,
            library,
            dev,
            view,
            version,
        }
    }

    #[test]
    fn test_create_for_empty_host() {
        let f = fixture();
        let host_id = Host::new("foobar".to_string()).insert(&f.conn).unwrap();
        assert_eq!(ContentFacet::find_by_host(&f.conn, host_id).unwrap(), None);

        let mut facet = ContentFacet::new(host_id, f.view, f.library);
        facet.insert(&f.conn).unwrap();

        let found = ContentFacet::find_by_host(&f.conn, host_id).unwrap().unwrap();
        assert_eq!(found, facet);
    }

    #[test]
    fn test_one_facet_per_host() {
        let f = fixture();
        let host_id = Host::new("foobar".to_string()).insert(&f.conn).unwrap();
        ContentFacet::new(host_id, f.view, f.library)
            .insert(&f.conn)
            .unwrap();
        assert!(ContentFacet::new(host_id, f.view, f.dev).insert(&f.conn).is_err());
    }

    #[test]
    fn test_content_view_version() {
        let f = fixture();
        let host_id = Host::new("h".to_string()).insert(&f.conn).unwrap();
        let mut facet = ContentFacet::new(host_id, f.view, f.library);
        facet.insert(&f.conn).unwrap();

        assert_eq!(
            facet.content_view_version(&f.conn).unwrap(),
            Some(f.version.clone())
        );

        facet.lifecycle_environment_id = f.dev;
        facet.update(&f.conn).unwrap();
        assert_eq!(facet.content_view_version(&f.conn).unwrap(), None);
    }

    #[test]
    fn test_in_content_view_version_environments() {
        let f = fixture();
        let host_id = Host::new("h".to_string()).insert(&f.conn).unwrap();
        let mut facet = ContentFacet::new(host_id, f.view, f.library);
        facet.insert(&f.conn).unwrap();

        let first = (f.version.clone(), vec![f.library]);
        let second = (f.version.clone(), vec![f.dev]);

        let facets =
            ContentFacet::in_content_view_version_environments(&f.conn, &[first.clone(), second.clone()])
                .unwrap();
        assert_eq!(facets, vec![facet.clone()]);

        let facets = ContentFacet::in_content_view_version_environments(&f.conn, &[first]).unwrap();
        assert_eq!(facets, vec![facet]);

        let facets = ContentFacet::in_content_view_version_environments(&f.conn, &[second]).unwrap();
        assert!(facets.is_empty());
    }

    #[test]
    fn test_facet_destroyed_with_host() {
        let f = fixture();
        let host_id = Host::new("h".to_string()).insert(&f.conn).unwrap();
        ContentFacet::new(host_id, f.view, f.library)
            .insert(&f.conn)
            .unwrap();

        Host::delete(&f.conn, host_id).unwrap();
        assert_eq!(ContentFacet::find_by_host(&f.conn, host_id).unwrap(), None);
    }
}
