// src/backend/queue.rs

//! Persistent local task queue
//!
//! Tasks are rows in `facet_tasks`. Enqueueing only inserts a row; a worker
//! claims queued tasks in creation order and marks them finished.

use super::{HostRef, TaskDispatcher, TaskKind};
use crate::db;
use crate::error::{Error, Result};
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use strum_macros::{AsRefStr, Display, EnumString};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

/// A queued task record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetTask {
    /// Task identifier (UUID)
    pub id: String,
    pub kind: TaskKind,
    pub hosts: Vec<HostRef>,
    pub status: TaskStatus,
    /// RFC 3339 creation timestamp
    pub created_at: String,
    pub finished_at: Option<String>,
}

impl FacetTask {
    pub fn new(kind: TaskKind, hosts: Vec<HostRef>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            hosts,
            status: TaskStatus::Queued,
            created_at: chrono::Utc::now().to_rfc3339(),
            finished_at: None,
        }
    }

    fn insert(&self, conn: &Connection) -> Result<()> {
        let hosts_json = serde_json::to_string(&self.hosts)?;
        conn.execute(
            "INSERT INTO facet_tasks (id, kind, hosts_json, status, created_at, finished_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                &self.id,
                self.kind.as_ref(),
                hosts_json,
                self.status.as_ref(),
                &self.created_at,
                &self.finished_at,
            ],
        )?;
        Ok(())
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        fn conversion<E>(idx: usize, e: E) -> rusqlite::Error
        where
            E: std::error::Error + Send + Sync + 'static,
        {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        }

        let kind: String = row.get(1)?;
        let hosts_json: String = row.get(2)?;
        let status: String = row.get(3)?;

        Ok(Self {
            id: row.get(0)?,
            kind: TaskKind::from_str(&kind).map_err(|e| conversion(1, e))?,
            hosts: serde_json::from_str(&hosts_json).map_err(|e| conversion(2, e))?,
            status: TaskStatus::from_str(&status).map_err(|e| conversion(3, e))?,
            created_at: row.get(4)?,
            finished_at: row.get(5)?,
        })
    }
}

/// Task dispatcher backed by the `facet_tasks` table
pub struct SqliteTaskQueue {
    conn: Mutex<Connection>,
}

impl SqliteTaskQueue {
    /// Open the queue on its own connection to an existing database
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
            .map_err(|_| Error::Dispatch("task queue lock poisoned".to_string()))
    }

    /// All tasks, oldest first
    pub fn list(&self, status: Option<TaskStatus>) -> Result<Vec<FacetTask>> {
        let conn = self.lock()?;
        let tasks = match status {
            Some(status) => {
                let mut stmt = conn.prepare(
                    "SELECT id, kind, hosts_json, status, created_at, finished_at
                     FROM facet_tasks WHERE status = ?1 ORDER BY created_at, rowid",
                )?;
                let tasks = stmt
                    .query_map([status.as_ref()], FacetTask::from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                tasks
            }
            None => {
                let mut stmt = conn.prepare(
                    "SELECT id, kind, hosts_json, status, created_at, finished_at
                     FROM facet_tasks ORDER BY created_at, rowid",
                )?;
                let tasks = stmt
                    .query_map([], FacetTask::from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                tasks
            }
        };
        Ok(tasks)
    }

    /// Take the oldest queued task and mark it running
    pub fn claim_next(&self) -> Result<Option<FacetTask>> {
        let mut conn = self.lock()?;
        db::transaction(&mut conn, |tx| {
            let task = tx
                .query_row(
                    "SELECT id, kind, hosts_json, status, created_at, finished_at
                     FROM facet_tasks WHERE status = 'queued' ORDER BY created_at, rowid LIMIT 1",
                    [],
                    FacetTask::from_row,
                )
                .optional()?;

            let Some(mut task) = task else {
                return Ok(None);
            };

            tx.execute(
                "UPDATE facet_tasks SET status = 'running' WHERE id = ?1",
                [&task.id],
            )?;
            task.status = TaskStatus::Running;
            Ok(Some(task))
        })
    }

    /// Record the outcome of a claimed task
    pub fn finish(&self, id: &str, succeeded: bool) -> Result<()> {
        let status = if succeeded {
            TaskStatus::Completed
        } else {
            TaskStatus::Failed
        };
        let conn = self.lock()?;
        let updated = conn.execute(
            "UPDATE facet_tasks SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![status.as_ref(), chrono::Utc::now().to_rfc3339(), id],
        )?;
        if updated == 0 {
            return Err(Error::NotFound(format!("Task {id}")));
        }
        Ok(())
    }

    /// Claim and run queued tasks until none remain
    ///
    /// Each task is finished as completed or failed by the handler's result;
    /// a failing task does not stop the rest. Returns how many tasks ran.
    pub fn drain<F>(&self, mut handler: F) -> Result<usize>
    where
        F: FnMut(&FacetTask) -> Result<()>,
    {
        let mut ran = 0;
        while let Some(task) = self.claim_next()? {
            let succeeded = match handler(&task) {
                Ok(()) => true,
                Err(e) => {
                    warn!("{} task {} failed: {}", task.kind, task.id, e);
                    false
                }
            };
            self.finish(&task.id, succeeded)?;
            ran += 1;
        }
        Ok(ran)
    }
}

impl TaskDispatcher for SqliteTaskQueue {
    fn enqueue(&self, kind: TaskKind, hosts: &[HostRef]) -> Result<()> {
        let task = FacetTask::new(kind, hosts.to_vec());
        let conn = self.lock()?;
        task.insert(&conn)?;
        debug!("Queued {} task {} for {} host(s)", kind, task.id, hosts.len());
        Ok(())
    }

    fn name(&self) -> &str {
        "sqlite-queue"
    }
}
