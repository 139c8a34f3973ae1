//! Core pipeline orchestration and domain logic for dictindex.
//!
//! This crate ties the acquisition, archive, and search crates together into
//! per-source workflows: the source registry, record transforms, index
//! building, the staged build pipeline, and purge.

pub mod builder;
pub mod cleanup;
pub mod pipeline;
pub mod registry;
pub mod staging;
pub mod transform;

#[cfg(test)]
mod testing;

pub use pipeline::{Pipeline, ProgressReporter, SilentProgress, SourceStatus};
pub use staging::StagePaths;
