//! Purge: drop a source's index and every artifact derived for it.

use std::io::ErrorKind;
use std::path::Path;

use dictindex_search::SearchEngine;
use dictindex_shared::{PurgeReport, SourceDescriptor, SourceName};
use tracing::{debug, info, instrument, warn};

use crate::staging::StagePaths;

/// Remove the index and all cached artifacts of `d`.
///
/// Every deletion is attempted even if an earlier one failed. Absent targets
/// count as already removed. A local source's own archive is never touched.
#[instrument(skip_all, fields(source = %d.name, index = d.index_name))]
pub async fn purge(
    engine: &dyn SearchEngine,
    stages: &StagePaths,
    d: &SourceDescriptor,
) -> PurgeReport {
    let mut report = PurgeReport::default();

    if let Err(e) = engine.delete_index(d.index_name).await {
        warn!(error = %e, "failed to delete index");
        report.errors.push(format!("index {}: {e}", d.index_name));
    }

    for path in stages.purgeable(d) {
        match remove(&path) {
            Ok(true) => {
                debug!(path = %path.display(), "removed");
                report.deleted_paths.push(path);
            }
            Ok(false) => {}
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to remove artifact");
                report.errors.push(format!("{}: {e}", path.display()));
            }
        }
    }

    info!(
        removed = report.deleted_paths.len(),
        errors = report.errors.len(),
        "source purged"
    );
    report
}

/// Purge each source in turn.
pub async fn purge_all(
    engine: &dyn SearchEngine,
    stages: &StagePaths,
    sources: &[SourceDescriptor],
) -> Vec<(SourceName, PurgeReport)> {
    let mut reports = Vec::with_capacity(sources.len());
    for d in sources {
        reports.push((d.name, purge(engine, stages, d).await));
    }
    reports
}

/// Remove a file or directory tree. `Ok(false)` if nothing was there.
fn remove(path: &Path) -> std::io::Result<bool> {
    let result = if path.is_dir() {
        std::fs::remove_dir_all(path)
    } else {
        std::fs::remove_file(path)
    };
    match result {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use dictindex_shared::FoldersConfig;

    use super::*;
    use crate::registry::descriptor;
    use crate::testing::MemoryEngine;

    fn touch(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, "[]").unwrap();
    }

    #[tokio::test]
    async fn removes_index_and_every_stage() {
        let dir = tempfile::tempdir().unwrap();
        let stages = StagePaths::new(&FoldersConfig::default().rooted_at(dir.path()));
        let d = descriptor(SourceName::Nhk);
        let engine = MemoryEngine::new();
        engine.create("nhk");

        let archive = stages.local_archive(&d).unwrap();
        touch(&archive);
        touch(&stages.extracted(&d).unwrap().join("nested/term_meta_bank_1.json"));
        touch(&stages.merged(&d).unwrap());
        touch(&stages.processed(&d));
        touch(&stages.marker(&d));

        let report = purge(&engine, &stages, &d).await;

        assert!(report.is_clean(), "{:?}", report.errors);
        assert_eq!(report.deleted_paths.len(), 4);
        assert_eq!(engine.document_count("nhk"), None);
        assert!(stages.present(&d).is_empty());
        assert!(!stages.marker(&d).exists());
        assert!(archive.is_file());
    }

    #[tokio::test]
    async fn purging_nothing_is_clean() {
        let dir = tempfile::tempdir().unwrap();
        let stages = StagePaths::new(&FoldersConfig::default().rooted_at(dir.path()));
        let engine = MemoryEngine::new();

        let reports = purge_all(
            &engine,
            &stages,
            &[descriptor(SourceName::Jmdict), descriptor(SourceName::Nhk)],
        )
        .await;

        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].0, SourceName::Jmdict);
        for (_, report) in &reports {
            assert!(report.is_clean());
            assert!(report.deleted_paths.is_empty());
        }
    }

    #[tokio::test]
    async fn remote_download_cache_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let stages = StagePaths::new(&FoldersConfig::default().rooted_at(dir.path()));
        let d = descriptor(SourceName::Kanjidic2);
        touch(&stages.downloaded(&d).unwrap());
        touch(&stages.extracted(&d).unwrap());

        let report = purge(&MemoryEngine::new(), &stages, &d).await;

        assert!(report.is_clean());
        assert!(stages.present(&d).is_empty());
        assert_eq!(report.deleted_paths.len(), 2);
    }
}
