// src/error.rs

//! Error types for build-info operations

use thiserror::Error;

/// Errors surfaced by the library to its immediate caller.
///
/// Merging has no error variant: it is total over all inputs. Verification
/// mismatches are reported as values, see [`crate::matching::Verification`].
#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid package id '{input}': expected name, name:version or group:name:version")]
    InvalidPackageId { input: String },

    #[error("Invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Invalid wildcard '{pattern}': {source}")]
    InvalidWildcard {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("Unsupported value '{value}' for {flag}. Expected one of: cyclonedx/xml, cyclonedx/json")]
    UnsupportedFormat { value: String, flag: String },

    #[error("Unknown module type '{0}'")]
    UnknownModuleType(String),

    #[error("Malformed dependency graph: {0}")]
    Graph(String),

    #[error("Dependency callback failed: {0}")]
    Collector(String),

    #[error("Failed to render XML: {0}")]
    Xml(String),

    #[error("Failed to build worker pool: {0}")]
    ThreadPool(String),
}

/// Result type for build-info operations
pub type Result<T> = std::result::Result<T, Error>;
