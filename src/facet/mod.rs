// src/facet/mod.rs

//! Content facet behavior
//!
//! A [`ContentFacet`](crate::db::models::ContentFacet) row records a host's
//! content source. The submodules extend it with:
//! - [`binding`]: which repositories the host is bound to
//! - [`applicability`]: the errata and RPMs that apply to the host
//! - [`installable`]: applicable content reachable through bound repositories
//! - [`import`]: replacing the applicability snapshot from a backend report
//! - [`regeneration`]: dispatching and running applicability regeneration

pub mod applicability;
pub mod binding;
pub mod import;
pub mod installable;
pub mod regeneration;

pub use binding::{BindingChange, BindingContext};
pub use import::{ImportMode, ImportSummary};
pub use regeneration::run_task;
