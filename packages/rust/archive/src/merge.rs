//! Bank merging: numbered fragment files back into one record collection.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use dictindex_shared::{DictIndexError, MergeSpec, Result, fs};
use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

/// Conventional name of the optional manifest shipped beside the banks.
pub const MANIFEST_FILE: &str = "index.json";

static FIRST_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("static regex"));

/// Whether `file_name` looks like a bank fragment (`term_bank_3.json`, ...).
pub fn is_fragment(file_name: &str) -> bool {
    let lower = file_name.to_ascii_lowercase();
    lower != MANIFEST_FILE
        && lower.ends_with(".json")
        && (lower.contains("term") || lower.contains("bank"))
}

/// First integer embedded in `file_name`, if any.
pub fn fragment_number(file_name: &str) -> Option<u64> {
    FIRST_NUMBER
        .find(file_name)
        .and_then(|m| m.as_str().parse().ok())
}

/// Merge the fragments found under `dir`.
///
/// Fragments are ordered by their first embedded integer (files without one
/// sort last, ties broken by name), so the result does not depend on
/// filesystem listing order. With `flat` the concatenated entries are
/// returned as an array; otherwise they are wrapped as
/// `{ ...manifest, "entries": [...] }`.
#[instrument(skip_all, fields(dir = %dir.display(), flat = flat))]
pub fn merge_banks(dir: &Path, flat: bool) -> Result<Value> {
    let files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(error = %e, "unreadable path while listing banks");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .collect();

    let manifest = load_manifest(dir, &files);

    let mut fragments: Vec<(Option<u64>, String, PathBuf)> = files
        .into_iter()
        .filter_map(|path| {
            let name = path.file_name()?.to_str()?.to_string();
            is_fragment(&name).then(|| (fragment_number(&name), name, path))
        })
        .collect();

    if fragments.is_empty() {
        return Err(DictIndexError::Merge(format!(
            "{}: no matching fragment files",
            dir.display()
        )));
    }

    fragments.sort_by(|a, b| {
        let key = |n: Option<u64>| n.unwrap_or(u64::MAX);
        key(a.0)
            .cmp(&key(b.0))
            .then_with(|| a.1.cmp(&b.1))
            .then_with(|| a.2.cmp(&b.2))
    });

    let mut entries = Vec::new();
    let mut used = 0usize;

    for (_, name, path) in &fragments {
        match fs::read_json(path) {
            Ok(Value::Array(items)) => {
                debug!(fragment = %name, entries = items.len(), "merged fragment");
                entries.extend(items);
                used += 1;
            }
            Ok(_) => warn!(fragment = %name, "fragment is not a JSON array, skipping"),
            Err(e) => warn!(fragment = %name, error = %e, "unreadable fragment, skipping"),
        }
    }

    if used == 0 {
        return Err(DictIndexError::Merge(format!(
            "{}: no usable entries in {} fragment(s)",
            dir.display(),
            fragments.len()
        )));
    }

    info!(
        fragments = used,
        skipped = fragments.len() - used,
        entries = entries.len(),
        "banks merged"
    );

    if flat {
        return Ok(Value::Array(entries));
    }

    let mut out = manifest.unwrap_or_default();
    out.insert("entries".into(), Value::Array(entries));
    Ok(Value::Object(out))
}

/// Manifest fields, preferring the shallowest `index.json`. Missing or
/// malformed manifests are tolerated.
fn load_manifest(dir: &Path, files: &[PathBuf]) -> Option<Map<String, Value>> {
    let path = files
        .iter()
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.eq_ignore_ascii_case(MANIFEST_FILE))
        })
        .min_by_key(|p| p.strip_prefix(dir).map(|r| r.components().count()).unwrap_or(usize::MAX))?;

    match fs::read_json(path) {
        Ok(Value::Object(map)) => {
            debug!(path = %path.display(), "loaded bank manifest");
            Some(map)
        }
        Ok(_) => {
            warn!(path = %path.display(), "manifest is not a JSON object, ignoring");
            None
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "unreadable manifest, ignoring");
            None
        }
    }
}

// ---------------------------------------------------------------------------
// BankMerger
// ---------------------------------------------------------------------------

/// Merges banks and caches the result in the merge cache.
#[derive(Debug, Clone)]
pub struct BankMerger {
    root: PathBuf,
}

impl BankMerger {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Merge cache path for `stem`.
    pub fn merged_path(&self, stem: &str) -> PathBuf {
        self.root.join(format!("{stem}.json"))
    }

    /// Merge `dir` for `stem`, or return the cached merge if present.
    pub fn merge(&self, stem: &str, dir: &Path, spec: MergeSpec) -> Result<Value> {
        let cached = self.merged_path(stem);
        if cached.exists() {
            debug!(path = %cached.display(), "merged collection cached");
            return fs::read_json(&cached);
        }

        let merged = merge_banks(dir, spec.flat)?;
        fs::write_json_atomic(&cached, &merged)?;
        Ok(merged)
    }
}
