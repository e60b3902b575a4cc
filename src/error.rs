// src/error.rs

//! Error types for content facet operations

use thiserror::Error;

/// Errors produced by the content facet library
#[derive(Debug, Error)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Initialization error: {0}")]
    InitError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// A repository path could not be resolved to exactly one repository
    #[error("Repository resolution failed: {0}")]
    Resolution(String),

    /// The remote applicability source could not be read
    #[error("Applicability import failed: {0}")]
    Import(String),

    /// The remote consumer registration rejected a binding
    #[error("Repository propagation failed: {0}")]
    Propagation(String),

    /// Task could not be handed to the dispatcher
    #[error("Task dispatch failed: {0}")]
    Dispatch(String),

    #[error("Invalid search query: {0}")]
    Search(String),
}

/// Result type alias using the crate error
pub type Result<T> = std::result::Result<T, Error>;
