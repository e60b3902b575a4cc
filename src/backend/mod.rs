// src/backend/mod.rs

//! External collaborators of the content facet
//!
//! The facet core never talks to a content backend or a task scheduler
//! directly. It goes through three seams:
//! - [`ApplicabilitySource`]: which errata/RPM identifiers apply to a host
//! - [`ConsumerRegistry`]: which repositories a host's consumer is bound to
//! - [`TaskDispatcher`]: fire-and-forget background tasks
//!
//! SQLite-backed implementations of the dispatcher and registry are provided
//! for local use, along with in-memory recording implementations.

pub mod memory;
mod queue;
mod registry;

pub use queue::{FacetTask, SqliteTaskQueue, TaskStatus};
pub use registry::SqliteConsumerRegistry;

use crate::error::Result;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// How a host is identified to external collaborators
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HostRef {
    pub host_id: i64,
    /// Consumer identifier at the content backend, when registered
    pub consumer_uuid: Option<String>,
}

/// Background task types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Recompute applicability for the listed hosts
    GenerateApplicability,
}

/// Dispatches background tasks
///
/// Delivery is at-least-once and completion is never observed by the
/// caller; the facet only relies on the command having been issued.
pub trait TaskDispatcher: Send + Sync {
    fn enqueue(&self, kind: TaskKind, hosts: &[HostRef]) -> Result<()>;

    /// Human-readable name for logging
    fn name(&self) -> &str;
}

/// Reports which content applies to a host
pub trait ApplicabilitySource: Send + Sync {
    /// Backend uuids of errata applicable to the host
    fn applicable_errata_ids(&self, host: &HostRef) -> Result<Vec<String>>;

    /// Backend uuids of RPMs applicable to the host
    fn applicable_rpm_ids(&self, host: &HostRef) -> Result<Vec<String>>;

    fn name(&self) -> &str;
}

/// Registers the repositories a host consumes with the content backend
pub trait ConsumerRegistry: Send + Sync {
    /// Replace the host's registered repositories with `backend_ids`
    ///
    /// Synchronous: an error means the registration did not happen.
    fn bind_repositories(&self, host: &HostRef, backend_ids: &[String]) -> Result<()>;

    fn name(&self) -> &str;
}
