// src/lib.rs

//! Conary content facet
//!
//! Per-host content state for managed RPM hosts: which content view and
//! lifecycle environment a host consumes, which repositories it is bound
//! to, and which errata and packages apply to it.
//!
//! # Architecture
//!
//! - Database-first: all facet state in SQLite
//! - Applicability is a stored snapshot; installability is derived on read
//! - External systems (content backend, task scheduler) sit behind traits
//!   in [`backend`]

pub mod backend;
pub mod config;
pub mod db;
mod error;
pub mod facet;
pub mod search;
pub mod version;

pub use config::FacetConfig;
pub use error::{Error, Result};
pub use facet::{BindingChange, BindingContext, ImportMode, ImportSummary};
pub use version::{Nevra, RpmVersion};
