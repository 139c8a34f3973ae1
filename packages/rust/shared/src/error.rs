//! Error types for dictindex.
//!
//! Library crates use [`DictIndexError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all dictindex operations.
#[derive(Debug, thiserror::Error)]
pub enum DictIndexError {
    /// A source name outside the registry's closed set.
    #[error("unknown source: {name}")]
    UnknownSource { name: String },

    /// A local archive that should exist on disk is missing.
    #[error("source archive not found at {path:?}")]
    SourceNotFound { path: PathBuf },

    /// Archive download failed (non-retryable status or retries exhausted).
    #[error("acquisition error: {0}")]
    Acquisition(String),

    /// Archive extraction produced nothing usable.
    #[error("extraction error: {0}")]
    Extraction(String),

    /// Bank merging found no fragments or no usable entries.
    #[error("merge error: {0}")]
    Merge(String),

    /// Malformed input shape for a pipeline step.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// The search engine rejected settings or documents.
    #[error("index build error: {0}")]
    IndexBuild(String),

    /// Search engine transport or task failure outside of a build.
    #[error("search engine error: {0}")]
    Search(String),

    /// Network/HTTP error during release lookup.
    #[error("network error: {0}")]
    Network(String),

    /// A blocking worker panicked or was cancelled.
    #[error("background task failed: {0}")]
    Task(String),

    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, DictIndexError>;

impl DictIndexError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    pub fn unknown_source(name: impl Into<String>) -> Self {
        Self::UnknownSource { name: name.into() }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
