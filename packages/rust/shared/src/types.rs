//! Core domain types for dictindex.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DictIndexError;

// ---------------------------------------------------------------------------
// SourceName
// ---------------------------------------------------------------------------

/// The closed set of dictionary sources dictindex knows how to ingest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceName {
    /// Word entries (JMdict, with examples).
    Jmdict,
    /// Named-entity entries (JMnedict).
    Jmnedict,
    /// Character entries (KANJIDIC2).
    Kanjidic2,
    /// Pitch-accent entries (NHK bank archive).
    Nhk,
}

impl SourceName {
    /// Every source, in registry order.
    pub const ALL: [SourceName; 4] = [
        SourceName::Jmdict,
        SourceName::Jmnedict,
        SourceName::Kanjidic2,
        SourceName::Nhk,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SourceName::Jmdict => "jmdict",
            SourceName::Jmnedict => "jmnedict",
            SourceName::Kanjidic2 => "kanjidic2",
            SourceName::Nhk => "nhk",
        }
    }
}

impl std::fmt::Display for SourceName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

impl std::str::FromStr for SourceName {
    type Err = DictIndexError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        SourceName::ALL
            .into_iter()
            .find(|name| name.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| DictIndexError::unknown_source(s))
    }
}

// ---------------------------------------------------------------------------
// CacheStage
// ---------------------------------------------------------------------------

/// One of the four on-disk checkpoints of a source's pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStage {
    Download,
    Extract,
    Merge,
    Processed,
}

impl CacheStage {
    pub const ALL: [CacheStage; 4] = [
        CacheStage::Download,
        CacheStage::Extract,
        CacheStage::Merge,
        CacheStage::Processed,
    ];
}

impl std::fmt::Display for CacheStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CacheStage::Download => "download",
            CacheStage::Extract => "extract",
            CacheStage::Merge => "merge",
            CacheStage::Processed => "processed",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// IndexSettings
// ---------------------------------------------------------------------------

/// Search-engine settings applied to an index before documents are loaded.
///
/// Serialized in the engine's wire casing; unset fields are omitted so the
/// engine keeps its own defaults for them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distinct_attribute: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ranking_rules: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub searchable_attributes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filterable_attributes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sortable_attributes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typo_tolerance: Option<TypoTolerance>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypoTolerance {
    pub enabled: bool,
    pub min_word_size_for_typos: MinWordSizeForTypos,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MinWordSizeForTypos {
    pub one_typo: u32,
    pub two_typos: u32,
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Successful result of one source's build.
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub source: SourceName,
    pub index: String,
    /// Documents loaded by this run; zero when the index already existed.
    pub documents: usize,
    /// The index already existed, so nothing was fetched or loaded.
    pub skipped: bool,
    /// The index exists but no completion marker was found for it.
    pub possibly_partial: bool,
    pub elapsed: Duration,
}

/// Per-source entry of a multi-source run. Failures keep the originating
/// stage's message verbatim.
#[derive(Debug, Clone)]
pub struct SourceOutcome {
    pub source: SourceName,
    pub result: std::result::Result<BuildReport, String>,
}

impl SourceOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Best-effort cleanup report: every deletion is attempted independently.
#[derive(Debug, Clone, Default)]
pub struct PurgeReport {
    pub deleted_paths: Vec<PathBuf>,
    pub errors: Vec<String>,
}

impl PurgeReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Written next to the processed collection once an index is fully loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildMarker {
    pub index: String,
    pub documents: usize,
    pub completed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_name_parses_case_insensitively() {
        let parsed: SourceName = "Kanjidic2".parse().expect("parse");
        assert_eq!(parsed, SourceName::Kanjidic2);
        assert_eq!(parsed.to_string(), "kanjidic2");
        assert_eq!(format!("{:<6}|", SourceName::Nhk), "nhk   |");
    }

    #[test]
    fn unknown_source_name_is_rejected() {
        let err = "wadoku".parse::<SourceName>().unwrap_err();
        assert!(matches!(err, DictIndexError::UnknownSource { ref name } if name == "wadoku"));
    }

    #[test]
    fn index_settings_use_engine_casing() {
        let settings = IndexSettings {
            distinct_attribute: Some("id".into()),
            ranking_rules: vec!["words".into(), "typo".into()],
            typo_tolerance: Some(TypoTolerance {
                enabled: true,
                min_word_size_for_typos: MinWordSizeForTypos {
                    one_typo: 4,
                    two_typos: 8,
                },
            }),
            ..Default::default()
        };

        let json = serde_json::to_value(&settings).expect("serialize");
        assert_eq!(json["distinctAttribute"], "id");
        assert_eq!(json["rankingRules"][1], "typo");
        assert_eq!(json["typoTolerance"]["minWordSizeForTypos"]["twoTypos"], 8);
        // Empty lists are left to the engine's defaults.
        assert!(json.get("sortableAttributes").is_none());
    }

    #[test]
    fn build_marker_serialization() {
        let marker = BuildMarker {
            index: "nhk".into(),
            documents: 42,
            completed_at: Utc::now(),
        };
        let json = serde_json::to_string(&marker).expect("serialize");
        let parsed: BuildMarker = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed.documents, 42);
        assert_eq!(parsed.index, "nhk");
    }
}
