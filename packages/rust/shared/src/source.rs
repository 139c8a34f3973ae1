//! Source descriptor types: how one dictionary is fetched, unpacked, and shaped.
//!
//! The descriptors themselves live in the core crate's registry; these are the
//! types every stage consumes.

use crate::types::{IndexSettings, SourceName};

/// Everything the pipeline needs to know about one source.
#[derive(Debug, Clone)]
pub struct SourceDescriptor {
    pub name: SourceName,
    /// Filename stem shared by every cache stage (`{stem}.zip`, `{stem}.json`, ...).
    pub stem: &'static str,
    pub origin: Origin,
    pub extraction: ExtractMode,
    pub transform: Transform,
    /// Field used as the document identifier when loading the index.
    pub primary_key: &'static str,
    pub index_name: &'static str,
    pub settings: IndexSettings,
}

/// Where the raw archive comes from. Remote-only fields exist only on the
/// remote variant.
#[derive(Debug, Clone)]
pub enum Origin {
    Remote(RemoteOrigin),
    Local(LocalOrigin),
}

#[derive(Debug, Clone)]
pub struct RemoteOrigin {
    /// Substring a release asset's name must contain.
    pub asset_match: &'static str,
    /// Pinned download used when the release lookup fails.
    pub fallback_url: &'static str,
    /// Key under which the record array sits in the extracted JSON.
    pub record_key: &'static str,
}

#[derive(Debug, Clone)]
pub struct LocalOrigin {
    /// Present when records are sharded across bank files that must be merged.
    pub merge: Option<MergeSpec>,
}

#[derive(Debug, Clone, Copy)]
pub struct MergeSpec {
    /// Return the concatenated entries directly instead of wrapping them with
    /// manifest fields.
    pub flat: bool,
}

/// Shape of the extraction step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractMode {
    /// Exactly one entry ending in `.{extension}` becomes `{stem}.{extension}`.
    SingleRename { extension: &'static str },
    /// Every entry lands at the extraction root.
    Flat,
    /// Every entry lands under `{stem}/`, preserving the archive tree.
    Subdirectory,
}

/// Per-source record transformation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transform {
    pub kind: TransformKind,
    pub ids: Option<IdAssignment>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformKind {
    None,
    /// Flag word entries written purely in kana.
    Enrich,
    /// Flatten `(word, type, detail)` pitch-accent tuples into objects.
    Restructure,
}

/// Dense sequential identifiers for sources without a natural key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdAssignment {
    pub field: &'static str,
    pub start: u64,
}

impl SourceDescriptor {
    pub fn is_remote(&self) -> bool {
        matches!(self.origin, Origin::Remote(_))
    }

    /// Merge parameters, for local sources that need them.
    pub fn merge_spec(&self) -> Option<MergeSpec> {
        match &self.origin {
            Origin::Remote(_) => None,
            Origin::Local(local) => local.merge,
        }
    }
}
