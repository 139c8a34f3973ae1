//! Static registry of every dictionary source.

use dictindex_shared::{
    ExtractMode, IdAssignment, IndexSettings, LocalOrigin, MergeSpec, MinWordSizeForTypos, Origin,
    RemoteOrigin, Result, SourceDescriptor, SourceName, Transform, TransformKind, TypoTolerance,
};

/// Primary key shared by every index.
const PRIMARY_KEY: &str = "id";

/// Look up a source by its logical name.
pub fn describe(name: &str) -> Result<SourceDescriptor> {
    let source: SourceName = name.parse()?;
    Ok(descriptor(source))
}

/// Descriptors for every source, in registry order.
pub fn all() -> Vec<SourceDescriptor> {
    SourceName::ALL.into_iter().map(descriptor).collect()
}

pub fn descriptor(name: SourceName) -> SourceDescriptor {
    match name {
        SourceName::Jmdict => SourceDescriptor {
            name,
            stem: "jmdict",
            origin: Origin::Remote(RemoteOrigin {
                asset_match: "jmdict-examples-eng",
                fallback_url: "https://github.com/scriptin/jmdict-simplified/releases/download/3.6.1%2B20250526122839/jmdict-examples-eng-3.6.1+20250602123110.json.zip",
                record_key: "words",
            }),
            extraction: ExtractMode::SingleRename { extension: "json" },
            transform: Transform {
                kind: TransformKind::Enrich,
                ids: None,
            },
            primary_key: PRIMARY_KEY,
            index_name: "jmdict",
            settings: jmdict_settings(),
        },
        SourceName::Jmnedict => SourceDescriptor {
            name,
            stem: "jmnedict",
            origin: Origin::Remote(RemoteOrigin {
                asset_match: "jmnedict-all",
                fallback_url: "https://github.com/scriptin/jmdict-simplified/releases/download/3.6.1%2B20250526122839/jmnedict-all-3.6.1+20250602123110.json.zip",
                record_key: "words",
            }),
            extraction: ExtractMode::SingleRename { extension: "json" },
            transform: Transform {
                kind: TransformKind::None,
                ids: None,
            },
            primary_key: PRIMARY_KEY,
            index_name: "jmnedict",
            settings: jmnedict_settings(),
        },
        SourceName::Kanjidic2 => SourceDescriptor {
            name,
            stem: "kanjidic2",
            origin: Origin::Remote(RemoteOrigin {
                asset_match: "kanjidic2-en",
                fallback_url: "https://github.com/scriptin/jmdict-simplified/releases/download/3.6.1%2B20250602123110/kanjidic2-en-3.6.1+20250602123110.json.zip",
                record_key: "characters",
            }),
            extraction: ExtractMode::SingleRename { extension: "json" },
            transform: Transform {
                kind: TransformKind::None,
                ids: Some(IdAssignment {
                    field: PRIMARY_KEY,
                    start: 1,
                }),
            },
            primary_key: PRIMARY_KEY,
            index_name: "kanjidic2",
            settings: kanjidic2_settings(),
        },
        SourceName::Nhk => SourceDescriptor {
            name,
            stem: "nhk",
            origin: Origin::Local(LocalOrigin {
                merge: Some(MergeSpec { flat: true }),
            }),
            extraction: ExtractMode::Subdirectory,
            transform: Transform {
                kind: TransformKind::Restructure,
                ids: Some(IdAssignment {
                    field: PRIMARY_KEY,
                    start: 1,
                }),
            },
            primary_key: PRIMARY_KEY,
            index_name: "nhk",
            settings: nhk_settings(),
        },
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn jmdict_settings() -> IndexSettings {
    IndexSettings {
        distinct_attribute: Some("id".into()),
        ranking_rules: strings(&["exactness", "words", "typo", "sort", "proximity", "attribute"]),
        searchable_attributes: strings(&["kana.text", "kanji.text", "id"]),
        filterable_attributes: strings(&[
            "kana",
            "kanji",
            "kana.text",
            "kanji.text",
            "isKana",
            "id",
        ]),
        sortable_attributes: strings(&[
            "kana.text",
            "kanji.text",
            "isKana",
            "kana.common",
            "kanji.common",
        ]),
        typo_tolerance: Some(TypoTolerance {
            enabled: true,
            min_word_size_for_typos: MinWordSizeForTypos {
                one_typo: 4,
                two_typos: 8,
            },
        }),
    }
}

fn jmnedict_settings() -> IndexSettings {
    IndexSettings {
        distinct_attribute: Some("id".into()),
        ranking_rules: strings(&["words", "typo", "proximity", "attribute", "exactness", "sort"]),
        searchable_attributes: strings(&[
            "id",
            "kanji.text",
            "kana.text",
            "translation.translation.text",
        ]),
        ..Default::default()
    }
}

fn kanjidic2_settings() -> IndexSettings {
    IndexSettings {
        distinct_attribute: Some("literal".into()),
        ranking_rules: strings(&["exactness", "typo", "words", "proximity", "attribute", "sort"]),
        searchable_attributes: strings(&["literal", "readingMeaning.groups.meaning.value"]),
        filterable_attributes: strings(&["literal", "readingMeaning"]),
        ..Default::default()
    }
}

fn nhk_settings() -> IndexSettings {
    IndexSettings {
        distinct_attribute: Some("id".into()),
        ranking_rules: strings(&["exactness", "typo", "words", "proximity", "attribute", "sort"]),
        searchable_attributes: strings(&["word", "type", "reading", "pitches"]),
        filterable_attributes: strings(&["pitches", "word", "reading"]),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use dictindex_shared::DictIndexError;

    use super::*;

    #[test]
    fn every_name_resolves_to_its_own_descriptor() {
        for name in SourceName::ALL {
            let d = describe(name.as_str()).expect("describe");
            assert_eq!(d.name, name);
            assert_eq!(d.stem, name.as_str());
            assert_eq!(d.index_name, name.as_str());
        }
        assert_eq!(all().len(), SourceName::ALL.len());
    }

    #[test]
    fn unknown_name_fails() {
        let err = describe("wadoku").unwrap_err();
        assert!(matches!(err, DictIndexError::UnknownSource { .. }));
    }

    #[test]
    fn remote_sources_extract_a_single_json_file() {
        for d in all().into_iter().filter(|d| d.is_remote()) {
            assert_eq!(d.extraction, ExtractMode::SingleRename { extension: "json" });
            assert!(d.merge_spec().is_none());
            let Origin::Remote(remote) = &d.origin else {
                unreachable!()
            };
            assert!(remote.fallback_url.ends_with(".json.zip"));
            assert!(remote.fallback_url.contains(remote.asset_match));
        }
    }

    #[test]
    fn nhk_is_a_merged_local_source() {
        let d = descriptor(SourceName::Nhk);
        assert!(!d.is_remote());
        assert_eq!(d.extraction, ExtractMode::Subdirectory);
        assert!(d.merge_spec().is_some_and(|m| m.flat));
        assert_eq!(d.transform.kind, TransformKind::Restructure);
        assert_eq!(
            d.transform.ids,
            Some(IdAssignment {
                field: "id",
                start: 1
            })
        );
    }

    #[test]
    fn sources_without_natural_keys_get_ids() {
        assert!(descriptor(SourceName::Kanjidic2).transform.ids.is_some());
        assert!(descriptor(SourceName::Jmdict).transform.ids.is_none());
        assert_eq!(descriptor(SourceName::Jmdict).transform.kind, TransformKind::Enrich);
    }
}
