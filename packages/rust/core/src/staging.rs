//! Where each cache stage keeps a source's artifact.

use std::path::{Path, PathBuf};

use dictindex_acquire::ARCHIVE_EXTENSION;
use dictindex_shared::{CacheStage, ExtractMode, FoldersConfig, Origin, SourceDescriptor};

/// Suffix of the completion marker written beside a processed collection.
const MARKER_SUFFIX: &str = "built.json";

/// Resolves artifact paths for every stage from the configured folders.
#[derive(Debug, Clone)]
pub struct StagePaths {
    folders: FoldersConfig,
}

impl StagePaths {
    pub fn new(folders: &FoldersConfig) -> Self {
        Self {
            folders: folders.clone(),
        }
    }

    pub fn folders(&self) -> &FoldersConfig {
        &self.folders
    }

    /// Cached archive of a remote source. Local archives are inputs, not
    /// cache, and have no download path.
    pub fn downloaded(&self, d: &SourceDescriptor) -> Option<PathBuf> {
        match d.origin {
            Origin::Remote(_) => Some(archive_path(&self.folders.downloads, d.stem)),
            Origin::Local(_) => None,
        }
    }

    /// Archive of a local source.
    pub fn local_archive(&self, d: &SourceDescriptor) -> Option<PathBuf> {
        match d.origin {
            Origin::Remote(_) => None,
            Origin::Local(_) => Some(archive_path(&self.folders.local, d.stem)),
        }
    }

    /// Extraction output whose presence marks the extract stage as cached.
    ///
    /// Flat extraction writes arbitrary names at the root, so it has no
    /// single artifact and is never treated as cached.
    pub fn extracted(&self, d: &SourceDescriptor) -> Option<PathBuf> {
        match d.extraction {
            ExtractMode::SingleRename { extension } => Some(
                self.folders
                    .extracts
                    .join(format!("{}.{extension}", d.stem)),
            ),
            ExtractMode::Subdirectory => Some(self.folders.extracts.join(d.stem)),
            ExtractMode::Flat => None,
        }
    }

    /// Merge cache file, for sources that merge banks.
    pub fn merged(&self, d: &SourceDescriptor) -> Option<PathBuf> {
        d.merge_spec()
            .map(|_| self.folders.merges.join(format!("{}.json", d.stem)))
    }

    /// Processed collection, the input of the index builder.
    pub fn processed(&self, d: &SourceDescriptor) -> PathBuf {
        self.folders.dictionaries.join(format!("{}.json", d.stem))
    }

    /// Completion marker of a finished index build.
    pub fn marker(&self, d: &SourceDescriptor) -> PathBuf {
        self.folders
            .dictionaries
            .join(format!("{}.{MARKER_SUFFIX}", d.stem))
    }

    /// Artifact path of `stage`, if the source has one.
    pub fn path(&self, d: &SourceDescriptor, stage: CacheStage) -> Option<PathBuf> {
        match stage {
            CacheStage::Download => self.downloaded(d),
            CacheStage::Extract => self.extracted(d),
            CacheStage::Merge => self.merged(d),
            CacheStage::Processed => Some(self.processed(d)),
        }
    }

    /// Stages whose artifact currently exists.
    pub fn present(&self, d: &SourceDescriptor) -> Vec<CacheStage> {
        CacheStage::ALL
            .into_iter()
            .filter(|&stage| self.path(d, stage).is_some_and(|p| artifact_exists(&p)))
            .collect()
    }

    /// Every derived artifact a purge removes: all stage outputs plus the
    /// completion marker. Never includes a local source's own archive.
    pub fn purgeable(&self, d: &SourceDescriptor) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = CacheStage::ALL
            .into_iter()
            .filter_map(|stage| self.path(d, stage))
            .collect();
        paths.push(self.marker(d));
        paths
    }
}

/// A file exists, or a directory exists and is non-empty.
pub fn artifact_exists(path: &Path) -> bool {
    if path.is_dir() {
        return std::fs::read_dir(path).is_ok_and(|mut entries| entries.next().is_some());
    }
    path.is_file()
}

fn archive_path(dir: &Path, stem: &str) -> PathBuf {
    dir.join(format!("{stem}.{ARCHIVE_EXTENSION}"))
}
