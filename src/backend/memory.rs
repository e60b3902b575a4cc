// src/backend/memory.rs

//! In-memory collaborators that record every call
//!
//! Used by tests and dry runs to observe exactly which commands the facet
//! issued.

use super::{ApplicabilitySource, ConsumerRegistry, HostRef, TaskDispatcher, TaskKind};
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

fn poisoned(what: &str) -> Error {
    Error::InitError(format!("{what} lock poisoned"))
}

/// Dispatcher that records enqueued tasks instead of running them
#[derive(Debug, Default)]
pub struct MemoryDispatcher {
    calls: Mutex<Vec<(TaskKind, Vec<HostRef>)>>,
    fail: AtomicBool,
}

impl MemoryDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent `enqueue` calls fail without recording them
    pub fn fail_enqueue(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Every `enqueue` call so far, in order
    pub fn calls(&self) -> Vec<(TaskKind, Vec<HostRef>)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl TaskDispatcher for MemoryDispatcher {
    fn enqueue(&self, kind: TaskKind, hosts: &[HostRef]) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::Dispatch(format!("{kind} task rejected")));
        }
        self.calls
            .lock()
            .map_err(|_| poisoned("dispatcher"))?
            .push((kind, hosts.to_vec()));
        Ok(())
    }

    fn name(&self) -> &str {
        "memory-dispatcher"
    }
}

/// Registry that records bindings and can be told to reject them
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    calls: Mutex<Vec<(HostRef, Vec<String>)>>,
    reject: AtomicBool,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent `bind_repositories` calls fail
    pub fn reject_bindings(&self, reject: bool) {
        self.reject.store(reject, Ordering::SeqCst);
    }

    /// Every accepted `bind_repositories` call so far, in order
    pub fn calls(&self) -> Vec<(HostRef, Vec<String>)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl ConsumerRegistry for MemoryRegistry {
    fn bind_repositories(&self, host: &HostRef, backend_ids: &[String]) -> Result<()> {
        if self.reject.load(Ordering::SeqCst) {
            return Err(Error::Propagation(format!(
                "registration rejected for host {}",
                host.host_id
            )));
        }
        self.calls
            .lock()
            .map_err(|_| poisoned("registry"))?
            .push((host.clone(), backend_ids.to_vec()));
        Ok(())
    }

    fn name(&self) -> &str {
        "memory-registry"
    }
}

/// Applicability source serving canned per-host reports
#[derive(Debug, Default)]
pub struct MemorySource {
    errata: Mutex<HashMap<i64, Vec<String>>>,
    rpms: Mutex<HashMap<i64, Vec<String>>>,
    unreachable: AtomicBool,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_errata(&self, host_id: i64, uuids: Vec<String>) {
        if let Ok(mut errata) = self.errata.lock() {
            errata.insert(host_id, uuids);
        }
    }

    pub fn set_rpms(&self, host_id: i64, uuids: Vec<String>) {
        if let Ok(mut rpms) = self.rpms.lock() {
            rpms.insert(host_id, uuids);
        }
    }

    /// Make every fetch fail as if the backend were down
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    fn report(&self, table: &Mutex<HashMap<i64, Vec<String>>>, host: &HostRef) -> Result<Vec<String>> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(Error::Import(format!(
                "applicability source unreachable for host {}",
                host.host_id
            )));
        }
        let table = table.lock().map_err(|_| poisoned("applicability source"))?;
        Ok(table.get(&host.host_id).cloned().unwrap_or_default())
    }
}

impl ApplicabilitySource for MemorySource {
    fn applicable_errata_ids(&self, host: &HostRef) -> Result<Vec<String>> {
        self.report(&self.errata, host)
    }

    fn applicable_rpm_ids(&self, host: &HostRef) -> Result<Vec<String>> {
        self.report(&self.rpms, host)
    }

    fn name(&self) -> &str {
        "memory-source"
    }
}
