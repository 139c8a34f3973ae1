//! Shared types, error model, and configuration for dictindex.
//!
//! This crate is the foundation depended on by all other dictindex crates.
//! It provides:
//! - [`DictIndexError`] — the unified error type
//! - Domain types ([`SourceName`], [`CacheStage`], [`IndexSettings`], reports)
//! - Source descriptor types ([`SourceDescriptor`], [`Origin`], [`ExtractMode`])
//! - Configuration ([`AppConfig`], config loading)
//! - Atomic artifact writes ([`fs`])

pub mod config;
pub mod error;
pub mod fs;
pub mod source;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, FoldersConfig, ReleaseConfig, RetryConfig, SearchConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from,
};
pub use error::{DictIndexError, Result};
pub use source::{
    ExtractMode, IdAssignment, LocalOrigin, MergeSpec, Origin, RemoteOrigin, SourceDescriptor,
    Transform, TransformKind,
};
pub use types::{
    BuildMarker, BuildReport, CacheStage, IndexSettings, MinWordSizeForTypos, PurgeReport,
    SourceName, SourceOutcome, TypoTolerance,
};
