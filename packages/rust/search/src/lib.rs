//! Search engine boundary.
//!
//! The ingestion pipeline needs exactly four operations from a search engine;
//! [`SearchEngine`] names them and [`MeiliSearch`] implements them over the
//! Meilisearch REST API. Any service exposing the same semantics can stand in.

mod meili;

use async_trait::async_trait;
use dictindex_shared::{IndexSettings, Result};
use serde_json::Value;

pub use meili::MeiliSearch;

#[async_trait]
pub trait SearchEngine: Send + Sync {
    /// Whether an index with this name exists.
    async fn index_exists(&self, name: &str) -> Result<bool>;

    /// Apply settings, creating the index if it does not exist yet.
    async fn apply_settings(&self, name: &str, settings: &IndexSettings) -> Result<()>;

    /// Load documents, identified by `primary_key`.
    async fn add_documents(&self, name: &str, documents: &[Value], primary_key: &str)
    -> Result<()>;

    /// Delete an index. Deleting an absent index succeeds.
    async fn delete_index(&self, name: &str) -> Result<()>;
}
