// src/db/models/mod.rs

//! Data models for content facet database entities
//!
//! Each struct corresponds to a table and provides methods for creating,
//! reading, updating, and deleting records. Join-table state owned by a
//! content facet (bound repositories, applicability) is handled in
//! [`crate::facet`].

mod content_facet;
mod content_view;
mod environment;
mod erratum;
mod host;
mod repository;
mod rpm;
mod status;

pub use content_facet::ContentFacet;
pub use content_view::{ContentView, ContentViewVersion};
pub use environment::LifecycleEnvironment;
pub use erratum::{Erratum, ErratumType};
pub use host::{Host, InstalledPackage};
pub use repository::Repository;
pub use rpm::Rpm;
pub use status::{ErrataStatus, HostStatus, StatusKind, TraceStatus};
