//! Per-source record transformation: enrichment, restructuring, and id
//! assignment.

use dictindex_shared::{DictIndexError, IdAssignment, Result, Transform, TransformKind};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

/// Flag added to word entries by enrichment.
pub const KANA_FLAG: &str = "isKana";

/// Apply `transform` to a record collection.
///
/// The collection must be a JSON array. The kind-specific step runs first,
/// then ids are assigned in collection order.
pub fn apply(records: Value, transform: &Transform) -> Result<Vec<Value>> {
    let Value::Array(records) = records else {
        return Err(DictIndexError::validation(format!(
            "expected a record array, found {}",
            kind_of(&records)
        )));
    };

    let records = match transform.kind {
        TransformKind::None => records,
        TransformKind::Enrich => enrich(records)?,
        TransformKind::Restructure => restructure(records)?,
    };

    match transform.ids {
        Some(ids) => assign_ids(records, ids),
        None => Ok(records),
    }
}

/// Flag each word entry with whether it is written purely in kana.
pub fn enrich(records: Vec<Value>) -> Result<Vec<Value>> {
    records
        .into_iter()
        .enumerate()
        .map(|(i, record)| match record {
            Value::Object(mut map) => {
                let flag = is_kana_only(&map);
                map.insert(KANA_FLAG.into(), Value::Bool(flag));
                Ok(Value::Object(map))
            }
            other => Err(not_an_object(i, &other)),
        })
        .collect()
}

/// True when the entry has no kanji writings and at least one kana writing.
pub fn is_kana_only(entry: &Map<String, Value>) -> bool {
    let has_kanji = entry
        .get("kanji")
        .and_then(Value::as_array)
        .is_some_and(|k| !k.is_empty());
    let has_kana = entry
        .get("kana")
        .and_then(Value::as_array)
        .is_some_and(|k| !k.is_empty());
    !has_kanji && has_kana
}

/// `[word, type, { reading, pitches }]` as found in pitch-accent banks.
#[derive(Debug, Deserialize)]
struct PitchTuple(String, String, PitchDetail);

#[derive(Debug, Serialize, Deserialize)]
struct PitchDetail {
    reading: String,
    /// Kept verbatim; pitch objects vary between banks.
    pitches: Vec<Value>,
}

#[derive(Debug, Serialize)]
struct PitchRecord {
    word: String,
    #[serde(rename = "type")]
    kind: String,
    reading: String,
    pitches: Vec<Value>,
}

/// Flatten pitch-accent tuples into named-field records.
pub fn restructure(records: Vec<Value>) -> Result<Vec<Value>> {
    records
        .into_iter()
        .enumerate()
        .map(|(i, record)| {
            let PitchTuple(word, kind, detail) = serde_json::from_value(record).map_err(|e| {
                DictIndexError::validation(format!(
                    "record {i}: expected [word, type, {{reading, pitches}}]: {e}"
                ))
            })?;
            let flat = PitchRecord {
                word,
                kind,
                reading: detail.reading,
                pitches: detail.pitches,
            };
            serde_json::to_value(flat)
                .map_err(|e| DictIndexError::validation(format!("record {i}: {e}")))
        })
        .collect()
}

/// Overwrite `ids.field` of each record with `start + position`.
pub fn assign_ids(records: Vec<Value>, ids: IdAssignment) -> Result<Vec<Value>> {
    let out = records
        .into_iter()
        .enumerate()
        .map(|(i, record)| match record {
            Value::Object(mut map) => {
                map.insert(ids.field.into(), Value::from(ids.start + i as u64));
                Ok(Value::Object(map))
            }
            other => Err(not_an_object(i, &other)),
        })
        .collect::<Result<Vec<_>>>()?;

    debug!(field = ids.field, start = ids.start, count = out.len(), "ids assigned");
    Ok(out)
}

fn not_an_object(index: usize, value: &Value) -> DictIndexError {
    DictIndexError::validation(format!(
        "record {index}: expected an object, found {}",
        kind_of(value)
    ))
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
