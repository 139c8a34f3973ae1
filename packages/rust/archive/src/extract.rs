//! Zip extraction into the extraction cache.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use dictindex_shared::{DictIndexError, ExtractMode, Result, fs};
use tracing::{debug, info, instrument, warn};
use zip::ZipArchive;

/// What an extraction produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extracted {
    /// Single-rename mode: the canonical `{stem}.{extension}` file.
    File(PathBuf),
    /// Flat mode: every file written at the extraction root.
    Files(Vec<PathBuf>),
    /// Subdirectory mode: the per-source directory root.
    Directory(PathBuf),
}

/// Unpacks archives under one extraction cache root.
#[derive(Debug, Clone)]
pub struct Extractor {
    root: PathBuf,
}

impl Extractor {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Canonical output of single-rename extraction.
    pub fn file_path(&self, stem: &str, extension: &str) -> PathBuf {
        self.root.join(format!("{stem}.{extension}"))
    }

    /// Root of subdirectory extraction.
    pub fn subdirectory_path(&self, stem: &str) -> PathBuf {
        self.root.join(stem)
    }

    /// Unpack `archive` for the source `stem` according to `mode`.
    #[instrument(skip_all, fields(archive = %archive.display(), stem = %stem))]
    pub fn extract(&self, archive: &Path, stem: &str, mode: &ExtractMode) -> Result<Extracted> {
        match mode {
            ExtractMode::SingleRename { extension } => self
                .extract_single(archive, stem, extension)
                .map(Extracted::File),
            ExtractMode::Flat => self.extract_flat(archive).map(Extracted::Files),
            ExtractMode::Subdirectory => self
                .extract_subdirectory(archive, stem)
                .map(Extracted::Directory),
        }
    }

    fn extract_single(&self, archive: &Path, stem: &str, extension: &str) -> Result<PathBuf> {
        let target = self.file_path(stem, extension);
        if target.exists() {
            debug!(path = %target.display(), "extracted file cached");
            return Ok(target);
        }

        let mut zip = open_archive(archive)?;
        let suffix = format!(".{extension}");

        let matches: Vec<usize> = (0..zip.len())
            .filter(|&i| {
                zip.by_index(i)
                    .map(|entry| !entry.is_dir() && entry.name().ends_with(&suffix))
                    .unwrap_or(false)
            })
            .collect();

        let index = match matches.as_slice() {
            [only] => *only,
            [] => {
                return Err(DictIndexError::Extraction(format!(
                    "{}: no entry ending in {suffix}",
                    archive.display()
                )));
            }
            many => {
                return Err(DictIndexError::Extraction(format!(
                    "{}: expected exactly one entry ending in {suffix}, found {}",
                    archive.display(),
                    many.len()
                )));
            }
        };

        let mut entry = zip
            .by_index(index)
            .map_err(|e| DictIndexError::Extraction(format!("{}: {e}", archive.display())))?;
        let name = entry.name().to_string();

        write_entry(&mut entry, &target).map_err(|e| {
            DictIndexError::Extraction(format!("{name}: failed to write {}: {e}", target.display()))
        })?;

        info!(entry = %name, path = %target.display(), "extracted");
        Ok(target)
    }

    fn extract_flat(&self, archive: &Path) -> Result<Vec<PathBuf>> {
        let mut zip = open_archive(archive)?;
        let files = unpack_all(&mut zip, &self.root)?;
        ensure_nonempty(archive, &files)?;

        info!(files = files.len(), root = %self.root.display(), "extracted archive");
        Ok(files)
    }

    fn extract_subdirectory(&self, archive: &Path, stem: &str) -> Result<PathBuf> {
        let target = self.subdirectory_path(stem);
        if dir_has_entries(&target) {
            debug!(path = %target.display(), "extracted directory cached");
            return Ok(target);
        }

        fs::ensure_dir(&self.root)?;
        // Unpacked beside the target, then renamed into place.
        let staging = tempfile::Builder::new()
            .prefix(&format!(".{stem}-"))
            .tempdir_in(&self.root)
            .map_err(|e| DictIndexError::io(&self.root, e))?;

        let mut zip = open_archive(archive)?;
        let files = unpack_all(&mut zip, staging.path())?;
        ensure_nonempty(archive, &files)?;

        if target.exists() {
            std::fs::remove_dir_all(&target).map_err(|e| DictIndexError::io(&target, e))?;
        }
        std::fs::rename(staging.path(), &target).map_err(|e| DictIndexError::io(&target, e))?;

        info!(files = files.len(), path = %target.display(), "extracted archive");
        Ok(target)
    }
}

fn open_archive(path: &Path) -> Result<ZipArchive<BufReader<File>>> {
    let file = File::open(path).map_err(|e| DictIndexError::io(path, e))?;
    ZipArchive::new(BufReader::new(file))
        .map_err(|e| DictIndexError::Extraction(format!("{}: not a zip archive: {e}", path.display())))
}

/// Write every entry under `root`, preserving archive paths. Entries that fail
/// are logged and skipped. Returns the files written.
fn unpack_all(zip: &mut ZipArchive<BufReader<File>>, root: &Path) -> Result<Vec<PathBuf>> {
    fs::ensure_dir(root)?;
    let mut written = Vec::new();

    for i in 0..zip.len() {
        let mut entry = match zip.by_index(i) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(index = i, error = %e, "unreadable archive entry, skipping");
                continue;
            }
        };

        let Some(relative) = entry.enclosed_name() else {
            warn!(entry = entry.name(), "entry escapes extraction root, skipping");
            continue;
        };
        let dest = root.join(relative);

        if entry.is_dir() {
            if let Err(e) = std::fs::create_dir_all(&dest) {
                warn!(path = %dest.display(), error = %e, "failed to create directory");
            }
            continue;
        }

        match write_entry(&mut entry, &dest) {
            Ok(()) => written.push(dest),
            Err(e) => warn!(entry = entry.name(), error = %e, "failed to extract entry, skipping"),
        }
    }

    Ok(written)
}

fn ensure_nonempty(archive: &Path, files: &[PathBuf]) -> Result<()> {
    if files.is_empty() {
        return Err(DictIndexError::Extraction(format!(
            "{}: no files were extracted",
            archive.display()
        )));
    }
    Ok(())
}

/// Stream one entry to `dest` through a temp file in the same directory.
fn write_entry(entry: &mut impl Read, dest: &Path) -> std::io::Result<()> {
    let parent = dest.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    std::io::copy(entry, &mut tmp)?;
    tmp.persist(dest).map_err(|e| e.error)?;
    Ok(())
}

fn dir_has_entries(path: &Path) -> bool {
    std::fs::read_dir(path)
        .map(|mut it| it.next().is_some())
        .unwrap_or(false)
}
