//! In-memory search engine for pipeline tests.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use dictindex_search::SearchEngine;
use dictindex_shared::{DictIndexError, IndexSettings, Result};
use serde_json::Value;

#[derive(Debug, Default)]
pub struct StoredIndex {
    pub settings: Option<IndexSettings>,
    pub primary_key: Option<String>,
    pub documents: Vec<Value>,
}

#[derive(Default)]
pub struct MemoryEngine {
    pub indexes: Mutex<BTreeMap<String, StoredIndex>>,
    /// Reject documents for this index name.
    pub reject: Option<String>,
    /// Create this index as a concurrent writer would, on its second existence check.
    pub late: Option<String>,
    pub add_calls: AtomicUsize,
    pub exists_calls: AtomicUsize,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rejecting(index: &str) -> Self {
        Self {
            reject: Some(index.to_string()),
            ..Self::default()
        }
    }

    pub fn appearing_late(index: &str) -> Self {
        Self {
            late: Some(index.to_string()),
            ..Self::default()
        }
    }

    pub fn create(&self, name: &str) {
        self.indexes
            .lock()
            .unwrap()
            .insert(name.to_string(), StoredIndex::default());
    }

    pub fn document_count(&self, name: &str) -> Option<usize> {
        self.indexes
            .lock()
            .unwrap()
            .get(name)
            .map(|i| i.documents.len())
    }

    pub fn settings(&self, name: &str) -> Option<IndexSettings> {
        self.indexes
            .lock()
            .unwrap()
            .get(name)
            .and_then(|i| i.settings.clone())
    }

    pub fn adds(&self) -> usize {
        self.add_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SearchEngine for MemoryEngine {
    async fn index_exists(&self, name: &str) -> Result<bool> {
        let calls = self.exists_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if calls == 2 && self.late.as_deref() == Some(name) {
            self.create(name);
        }
        Ok(self.indexes.lock().unwrap().contains_key(name))
    }

    async fn apply_settings(&self, name: &str, settings: &IndexSettings) -> Result<()> {
        let mut indexes = self.indexes.lock().unwrap();
        indexes.entry(name.to_string()).or_default().settings = Some(settings.clone());
        Ok(())
    }

    async fn add_documents(&self, name: &str, documents: &[Value], primary_key: &str) -> Result<()> {
        self.add_calls.fetch_add(1, Ordering::SeqCst);
        if self.reject.as_deref() == Some(name) {
            return Err(DictIndexError::Search(format!(
                "document rejected by {name} (invalid_document_fields)"
            )));
        }
        let mut indexes = self.indexes.lock().unwrap();
        let index = indexes.entry(name.to_string()).or_default();
        index.primary_key = Some(primary_key.to_string());
        index.documents.extend_from_slice(documents);
        Ok(())
    }

    async fn delete_index(&self, name: &str) -> Result<()> {
        self.indexes.lock().unwrap().remove(name);
        Ok(())
    }
}

/// Write a zip archive of `(name, content)` entries, creating parent dirs.
pub fn write_zip(path: &Path, entries: &[(&str, &str)]) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    let mut zip = zip::ZipWriter::new(std::fs::File::create(path).unwrap());
    let options = zip::write::SimpleFileOptions::default();
    for (name, content) in entries {
        zip.start_file(*name, options).unwrap();
        zip.write_all(content.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
}
