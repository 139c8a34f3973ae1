//! Index builder: settings first, then documents.

use std::collections::HashSet;

use dictindex_search::SearchEngine;
use dictindex_shared::{DictIndexError, IndexSettings, Result};
use serde_json::Value;
use tracing::{info, instrument};

/// Create and populate `name` unless it already exists.
///
/// Returns the number of documents loaded, or `None` when the index was
/// already present and nothing was written. Engine rejections surface as [`DictIndexError::IndexBuild`] with
/// the engine's message.
#[instrument(skip_all, fields(index = name, documents = records.len()))]
pub async fn build_index(
    engine: &dyn SearchEngine,
    name: &str,
    records: &[Value],
    settings: &IndexSettings,
    primary_key: &str,
) -> Result<Option<usize>> {
    if engine.index_exists(name).await.map_err(into_build_error)? {
        info!("index already exists, nothing to build");
        return Ok(None);
    }

    validate_primary_keys(records, primary_key)?;

    engine
        .apply_settings(name, settings)
        .await
        .map_err(into_build_error)?;
    engine
        .add_documents(name, records, primary_key)
        .await
        .map_err(into_build_error)?;

    info!("index built");
    Ok(Some(records.len()))
}

/// Every record carries a unique string or integer `primary_key`.
pub fn validate_primary_keys(records: &[Value], primary_key: &str) -> Result<()> {
    let mut seen = HashSet::with_capacity(records.len());

    for (i, record) in records.iter().enumerate() {
        let key = match record.get(primary_key) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) if n.is_u64() || n.is_i64() => n.to_string(),
            Some(other) => {
                return Err(DictIndexError::validation(format!(
                    "record {i}: primary key '{primary_key}' must be a string or integer, found {other}"
                )));
            }
            None => {
                return Err(DictIndexError::validation(format!(
                    "record {i}: missing primary key '{primary_key}'"
                )));
            }
        };
        if !seen.insert(key) {
            return Err(DictIndexError::validation(format!(
                "record {i}: duplicate primary key {}",
                record[primary_key]
            )));
        }
    }
    Ok(())
}

fn into_build_error(e: DictIndexError) -> DictIndexError {
    match e {
        DictIndexError::Search(message) => DictIndexError::IndexBuild(message),
        DictIndexError::IndexBuild(_) => e,
        other => DictIndexError::IndexBuild(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::testing::MemoryEngine;

    fn settings() -> IndexSettings {
        IndexSettings {
            distinct_attribute: Some("id".into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn builds_a_new_index() {
        let engine = MemoryEngine::new();
        let records = vec![json!({ "id": 1 }), json!({ "id": 2 })];

        let loaded = build_index(&engine, "nhk", &records, &settings(), "id")
            .await
            .unwrap();

        assert_eq!(loaded, Some(2));
        assert_eq!(engine.document_count("nhk"), Some(2));
        assert_eq!(engine.settings("nhk"), Some(settings()));
    }

    #[tokio::test]
    async fn existing_index_is_left_alone() {
        let engine = MemoryEngine::new();
        engine.create("nhk");

        let loaded = build_index(&engine, "nhk", &[json!({ "id": 1 })], &settings(), "id")
            .await
            .unwrap();

        assert_eq!(loaded, None);
        assert_eq!(engine.adds(), 0);
        assert_eq!(engine.document_count("nhk"), Some(0));
    }

    #[tokio::test]
    async fn empty_collection_creates_an_empty_index() {
        let engine = MemoryEngine::new();
        let loaded = build_index(&engine, "nhk", &[], &settings(), "id")
            .await
            .unwrap();
        assert_eq!(loaded, Some(0));
        assert_eq!(engine.document_count("nhk"), Some(0));
    }

    #[tokio::test]
    async fn rejection_keeps_engine_message() {
        let engine = MemoryEngine::rejecting("nhk");
        let err = build_index(&engine, "nhk", &[json!({ "id": 1 })], &settings(), "id")
            .await
            .unwrap_err();

        match err {
            DictIndexError::IndexBuild(message) => {
                assert!(message.contains("invalid_document_fields"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn invalid_keys_fail_before_anything_is_created() {
        let engine = MemoryEngine::new();
        let records = vec![json!({ "id": 1 }), json!({ "word": "猫" })];

        let err = build_index(&engine, "nhk", &records, &settings(), "id")
            .await
            .unwrap_err();

        assert!(matches!(err, DictIndexError::Validation { .. }));
        assert_eq!(engine.document_count("nhk"), None);
    }

    #[test]
    fn duplicate_keys_are_rejected() {
        let records = vec![json!({ "id": "a" }), json!({ "id": "b" }), json!({ "id": "a" })];
        let err = validate_primary_keys(&records, "id").unwrap_err();
        assert!(err.to_string().contains("record 2"));
    }

    #[test]
    fn non_scalar_keys_are_rejected() {
        assert!(validate_primary_keys(&[json!({ "id": 1.5 })], "id").is_err());
        assert!(validate_primary_keys(&[json!({ "id": ["x"] })], "id").is_err());
        assert!(validate_primary_keys(&[json!({ "id": "x" }), json!({ "id": 7 })], "id").is_ok());
    }
}
