//! Per-source ingestion pipeline: acquire → extract → merge → transform → index.
//!
//! Every stage writes its output to a cache, and a run starts from the most
//! downstream artifact that already exists. An existing index short-cuts the
//! whole run before any network or filesystem work.

use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::Utc;
use futures::future::join_all;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use dictindex_acquire::{Acquirer, HttpTransport};
use dictindex_archive::{BankMerger, Extracted, Extractor};
use dictindex_search::{MeiliSearch, SearchEngine};
use dictindex_shared::{
    AppConfig, BuildMarker, BuildReport, CacheStage, DictIndexError, ExtractMode, Origin,
    PurgeReport, Result, SourceDescriptor, SourceName, SourceOutcome, fs,
};

use crate::builder;
use crate::cleanup;
use crate::staging::{StagePaths, artifact_exists};
use crate::transform;

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when a source enters a new stage.
    fn stage(&self, source: SourceName, stage: &str);
    /// Called once per source when its run finishes.
    fn done(&self, outcome: &SourceOutcome);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn stage(&self, _source: SourceName, _stage: &str) {}
    fn done(&self, _outcome: &SourceOutcome) {}
}

/// Snapshot of a source for `list`.
#[derive(Debug, Clone)]
pub struct SourceStatus {
    pub source: SourceName,
    pub index: &'static str,
    /// Whether the index exists, or why the engine could not be asked.
    pub index_exists: std::result::Result<bool, String>,
    /// A completion marker is present.
    pub built: bool,
    pub cached: Vec<CacheStage>,
}

/// Runs sources through every stage against one search engine.
pub struct Pipeline<E, T = reqwest::Client> {
    engine: E,
    acquirer: Acquirer<T>,
    extractor: Extractor,
    merger: BankMerger,
    stages: StagePaths,
}

impl Pipeline<MeiliSearch> {
    /// Pipeline backed by Meilisearch and a `reqwest` client.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let engine = MeiliSearch::new(&config.search)?;
        let acquirer = Acquirer::new(config)?;
        Ok(Self::new(config, engine, acquirer))
    }
}

impl<E: SearchEngine, T: HttpTransport> Pipeline<E, T> {
    pub fn new(config: &AppConfig, engine: E, acquirer: Acquirer<T>) -> Self {
        Self {
            engine,
            acquirer,
            extractor: Extractor::new(&config.folders.extracts),
            merger: BankMerger::new(&config.folders.merges),
            stages: StagePaths::new(&config.folders),
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn stages(&self) -> &StagePaths {
        &self.stages
    }

    /// Build every source concurrently. Outcomes follow the input order and a
    /// failing source never stops the others.
    pub async fn build_all(
        &self,
        sources: &[SourceDescriptor],
        progress: &dyn ProgressReporter,
    ) -> Vec<SourceOutcome> {
        let runs = sources.iter().map(|d| async move {
            let outcome = SourceOutcome {
                source: d.name,
                result: self.build(d, progress).await.map_err(|e| {
                    warn!(source = %d.name, error = %e, "source failed");
                    e.to_string()
                }),
            };
            progress.done(&outcome);
            outcome
        });
        join_all(runs).await
    }

    /// Bring one source's index into existence.
    #[instrument(skip_all, fields(source = %d.name, index = d.index_name))]
    pub async fn build(
        &self,
        d: &SourceDescriptor,
        progress: &dyn ProgressReporter,
    ) -> Result<BuildReport> {
        let start = Instant::now();

        progress.stage(d.name, "checking index");
        if self.engine.index_exists(d.index_name).await? {
            return Ok(self.skipped(d, start));
        }

        let records = self.processed_records(d, progress).await?;

        progress.stage(d.name, "indexing");
        let Some(documents) =
            builder::build_index(&self.engine, d.index_name, &records, &d.settings, d.primary_key)
                .await?
        else {
            // Another writer created the index while this run was preparing records.
            return Ok(self.skipped(d, start));
        };

        let marker = BuildMarker {
            index: d.index_name.to_string(),
            documents,
            completed_at: Utc::now(),
        };
        fs::write_json_atomic(&self.stages.marker(d), &marker)?;

        let elapsed = start.elapsed();
        info!(documents, elapsed_ms = elapsed.as_millis() as u64, "source built");

        Ok(BuildReport {
            source: d.name,
            index: d.index_name.to_string(),
            documents,
            skipped: false,
            possibly_partial: false,
            elapsed,
        })
    }

    /// Report for a source whose index already exists.
    fn skipped(&self, d: &SourceDescriptor, start: Instant) -> BuildReport {
        let possibly_partial = !self.stages.marker(d).is_file();
        if possibly_partial {
            warn!("index exists without a completion marker and may be partial; purge to rebuild");
        } else {
            info!("index already built, skipping");
        }
        BuildReport {
            source: d.name,
            index: d.index_name.to_string(),
            documents: 0,
            skipped: true,
            possibly_partial,
            elapsed: start.elapsed(),
        }
    }

    /// Delete the index and every derived artifact of one source.
    pub async fn purge(&self, d: &SourceDescriptor) -> PurgeReport {
        cleanup::purge(&self.engine, &self.stages, d).await
    }

    /// Purge sources one after another.
    pub async fn purge_all(&self, sources: &[SourceDescriptor]) -> Vec<(SourceName, PurgeReport)> {
        cleanup::purge_all(&self.engine, &self.stages, sources).await
    }

    /// Index and cache state of each source.
    pub async fn status(&self, sources: &[SourceDescriptor]) -> Vec<SourceStatus> {
        let mut out = Vec::with_capacity(sources.len());
        for d in sources {
            out.push(SourceStatus {
                source: d.name,
                index: d.index_name,
                index_exists: self
                    .engine
                    .index_exists(d.index_name)
                    .await
                    .map_err(|e| e.to_string()),
                built: self.stages.marker(d).is_file(),
                cached: self.stages.present(d),
            });
        }
        out
    }

    /// Processed records, from cache or by running the upstream stages.
    async fn processed_records(
        &self,
        d: &SourceDescriptor,
        progress: &dyn ProgressReporter,
    ) -> Result<Vec<Value>> {
        let processed = self.stages.processed(d);
        if processed.is_file() {
            debug!(path = %processed.display(), "processed collection cached");
            return blocking(move || match fs::read_json(&processed)? {
                Value::Array(records) => Ok(records),
                _ => Err(DictIndexError::validation(format!(
                    "{}: processed collection is not an array",
                    processed.display()
                ))),
            })
            .await;
        }

        let raw = self.raw_collection(d, progress).await?;

        progress.stage(d.name, "transforming");
        let records = select_records(d, raw)?;
        let rules = d.transform;
        let records = blocking(move || {
            let records = transform::apply(records, &rules)?;
            fs::write_json_atomic(&processed, &records)?;
            Ok(records)
        })
        .await?;

        info!(records = records.len(), "processed collection written");
        Ok(records)
    }

    /// The collection as merged or extracted, before record selection.
    async fn raw_collection(
        &self,
        d: &SourceDescriptor,
        progress: &dyn ProgressReporter,
    ) -> Result<Value> {
        if let Some(merged) = self.stages.merged(d).filter(|p| p.is_file()) {
            debug!(path = %merged.display(), "merged collection cached");
            return blocking(move || fs::read_json(&merged)).await;
        }

        let extracted = match self.cached_extraction(d) {
            Some(extracted) => {
                debug!(?extracted, "extraction cached");
                extracted
            }
            None => {
                progress.stage(d.name, "acquiring");
                let archive = self.acquirer.acquire(d).await?;

                progress.stage(d.name, "extracting");
                let extractor = self.extractor.clone();
                let (stem, mode) = (d.stem, d.extraction.clone());
                blocking(move || extractor.extract(&archive, stem, &mode)).await?
            }
        };

        if d.merge_spec().is_some() {
            progress.stage(d.name, "merging");
        }
        let merger = self.merger.clone();
        let root = self.extractor.root().to_path_buf();
        let d = d.clone();
        blocking(move || load_extracted(&d, extracted, &merger, &root)).await
    }

    fn cached_extraction(&self, d: &SourceDescriptor) -> Option<Extracted> {
        let path = self.stages.extracted(d).filter(|p| artifact_exists(p))?;
        match d.extraction {
            ExtractMode::SingleRename { .. } => Some(Extracted::File(path)),
            ExtractMode::Subdirectory => Some(Extracted::Directory(path)),
            ExtractMode::Flat => None,
        }
    }
}

/// Read or merge what extraction produced.
fn load_extracted(
    d: &SourceDescriptor,
    extracted: Extracted,
    merger: &BankMerger,
    extract_root: &Path,
) -> Result<Value> {
    let own_file = format!("{}.json", d.stem);
    match (extracted, d.merge_spec()) {
        (Extracted::Directory(dir), Some(spec)) => merger.merge(d.stem, &dir, spec),
        (Extracted::Files(_), Some(spec)) => merger.merge(d.stem, extract_root, spec),
        (Extracted::File(path), Some(_)) => Err(DictIndexError::validation(format!(
            "{}: a single extracted file cannot be merged",
            path.display()
        ))),
        (Extracted::File(path), None) => fs::read_json(&path),
        (Extracted::Directory(dir), None) => fs::read_json(&dir.join(own_file)),
        (Extracted::Files(files), None) => {
            let path: PathBuf = files
                .into_iter()
                .find(|p| p.file_name().and_then(|n| n.to_str()) == Some(own_file.as_str()))
                .ok_or_else(|| {
                    DictIndexError::Extraction(format!("archive contains no {own_file}"))
                })?;
            fs::read_json(&path)
        }
    }
}

/// Pull the record collection out of a raw document.
///
/// Remote collections keep records under their descriptor's record key.
/// Local collections are either the records themselves or a manifest object
/// carrying them under `entries`.
fn select_records(d: &SourceDescriptor, raw: Value) -> Result<Value> {
    match (&d.origin, raw) {
        (Origin::Remote(remote), Value::Object(mut map)) => map
            .remove(remote.record_key)
            .ok_or_else(|| {
                DictIndexError::validation(format!(
                    "{}: no '{}' field in collection",
                    d.name, remote.record_key
                ))
            }),
        (Origin::Remote(remote), _) => Err(DictIndexError::validation(format!(
            "{}: expected an object holding '{}'",
            d.name, remote.record_key
        ))),
        (Origin::Local(_), Value::Object(mut map)) if map.contains_key("entries") => {
            Ok(map.remove("entries").unwrap_or_default())
        }
        (Origin::Local(_), raw) => Ok(raw),
    }
}

async fn blocking<F, R>(f: F) -> Result<R>
where
    F: FnOnce() -> Result<R> + Send + 'static,
    R: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| DictIndexError::Task(e.to_string()))?
}
