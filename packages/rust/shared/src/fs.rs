//! Filesystem helpers for staged artifacts.
//!
//! Artifacts are only ever visible in their final form: content goes to a
//! temporary file in the destination directory which is then renamed over the
//! target path.

use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::error::{DictIndexError, Result};

/// Create `dir` and its parents if needed.
pub fn ensure_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).map_err(|e| DictIndexError::io(dir, e))
}

/// Atomically write `bytes` to `path`.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = parent_dir(path);
    ensure_dir(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| DictIndexError::io(dir, e))?;
    tmp.write_all(bytes)
        .and_then(|()| tmp.flush())
        .map_err(|e| DictIndexError::io(tmp.path(), e))?;
    tmp.persist(path)
        .map_err(|e| DictIndexError::io(path, e.error))?;
    Ok(())
}

/// Atomically write `value` as compact JSON to `path`.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec(value).map_err(|e| {
        DictIndexError::validation(format!("failed to serialize {}: {e}", path.display()))
    })?;
    write_atomic(path, &bytes)
}

/// Read and parse a JSON file.
pub fn read_json(path: &Path) -> Result<serde_json::Value> {
    let file = std::fs::File::open(path).map_err(|e| DictIndexError::io(path, e))?;
    serde_json::from_reader(std::io::BufReader::new(file)).map_err(|e| {
        DictIndexError::validation(format!("invalid JSON in {}: {e}", path.display()))
    })
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}
