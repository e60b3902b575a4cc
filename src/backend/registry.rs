// src/backend/registry.rs

//! Consumer registration recorded in the local database

use super::{ConsumerRegistry, HostRef};
use crate::db;
use crate::error::{Error, Result};
use rusqlite::{Connection, params};
use std::sync::{Mutex, MutexGuard};
use tracing::info;

/// Consumer registry backed by the `consumer_bindings` table
///
/// Must use its own connection: registration runs while the caller is
/// between reading and writing facet state.
pub struct SqliteConsumerRegistry {
    conn: Mutex<Connection>,
}

impl SqliteConsumerRegistry {
    pub fn open(db_path: &str) -> Result<Self> {
        Ok(Self::from_connection(db::open(db_path)?))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Propagation("consumer registry lock poisoned".to_string()))
    }

    /// Backend ids currently registered for a host, sorted
    pub fn registered(&self, host_id: i64) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT backend_id FROM consumer_bindings WHERE host_id = ?1 ORDER BY backend_id",
        )?;
        let ids = stmt
            .query_map([host_id], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(ids)
    }
}

impl ConsumerRegistry for SqliteConsumerRegistry {
    fn bind_repositories(&self, host: &HostRef, backend_ids: &[String]) -> Result<()> {
        let mut conn = self.lock()?;
        let now = chrono::Utc::now().to_rfc3339();

        db::transaction(&mut conn, |tx| {
            tx.execute(
                "DELETE FROM consumer_bindings WHERE host_id = ?1",
                [host.host_id],
            )?;
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO consumer_bindings (host_id, backend_id, bound_at)
                 VALUES (?1, ?2, ?3)",
            )?;
            for backend_id in backend_ids {
                stmt.execute(params![host.host_id, backend_id, &now])?;
            }
            Ok(())
        })
        .map_err(|e| Error::Propagation(format!("host {}: {}", host.host_id, e)))?;

        info!(
            "Registered {} repositories for host {}",
            backend_ids.len(),
            host.host_id
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "sqlite-registry"
    }
}
