//! Archive acquisition: release lookup, cached download, and local lookup.
//!
//! Remote sources resolve their download URL through a release-listing
//! endpoint, falling back to a pinned URL when the lookup fails, then download
//! with bounded retries into the download cache. A cached archive short-cuts
//! everything, including the lookup. Local sources are looked up on disk.

mod release;
mod retry;
mod transport;

use std::path::{Path, PathBuf};
use std::time::Duration;

use dictindex_shared::{
    AppConfig, DictIndexError, Origin, ReleaseConfig, RemoteOrigin, Result, SourceDescriptor, fs,
};
use tracing::{debug, info, instrument, warn};

pub use release::{ReleaseAsset, ReleaseListing, select_asset};
pub use retry::{RetryPolicy, fetch_with_retry};
pub use transport::{HttpResponse, HttpTransport, TransportError};

/// Extension of every archive in the download cache and local directory.
pub const ARCHIVE_EXTENSION: &str = "zip";

/// User-Agent string for lookup and download requests.
const USER_AGENT: &str = concat!("dictindex/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Acquirer
// ---------------------------------------------------------------------------

/// Fetches or locates the raw archive for a source.
pub struct Acquirer<T = reqwest::Client> {
    transport: T,
    policy: RetryPolicy,
    release: ReleaseConfig,
    downloads: PathBuf,
    local: PathBuf,
}

impl Acquirer<reqwest::Client> {
    /// Create an acquirer backed by a `reqwest` client.
    pub fn new(config: &AppConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.release.timeout_secs))
            .build()
            .map_err(|e| DictIndexError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self::with_transport(client, config))
    }
}

impl<T: HttpTransport> Acquirer<T> {
    /// Create an acquirer over any transport.
    pub fn with_transport(transport: T, config: &AppConfig) -> Self {
        Self {
            transport,
            policy: RetryPolicy::from(&config.retry),
            release: config.release.clone(),
            downloads: config.folders.downloads.clone(),
            local: config.folders.local.clone(),
        }
    }

    /// Replace the retry policy derived from config.
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Cache path of a downloaded archive.
    pub fn download_path(&self, stem: &str) -> PathBuf {
        archive_path(&self.downloads, stem)
    }

    /// Path of a local source's archive.
    pub fn local_path(&self, stem: &str) -> PathBuf {
        archive_path(&self.local, stem)
    }

    /// Return the path of the source's raw archive, fetching it if needed.
    #[instrument(skip_all, fields(source = %descriptor.name))]
    pub async fn acquire(&self, descriptor: &SourceDescriptor) -> Result<PathBuf> {
        match &descriptor.origin {
            Origin::Remote(remote) => self.acquire_remote(descriptor.stem, remote).await,
            Origin::Local(_) => self.locate_local(descriptor.stem),
        }
    }

    async fn acquire_remote(&self, stem: &str, remote: &RemoteOrigin) -> Result<PathBuf> {
        let path = self.download_path(stem);

        // Checked before URL resolution so a cached archive costs no network.
        if path.exists() {
            debug!(path = %path.display(), "archive cached, skipping download");
            return Ok(path);
        }

        let url = self.resolve_download_url(remote).await;
        info!(%url, "downloading archive");

        let bytes = fetch_with_retry(&self.transport, &url, &self.policy).await?;
        fs::write_atomic(&path, &bytes)?;

        info!(path = %path.display(), bytes = bytes.len(), "archive downloaded");
        Ok(path)
    }

    fn locate_local(&self, stem: &str) -> Result<PathBuf> {
        let path = self.local_path(stem);
        if !path.is_file() {
            return Err(DictIndexError::SourceNotFound { path });
        }
        debug!(path = %path.display(), "using local archive");
        Ok(path)
    }

    /// Resolve the newest matching asset URL, or the pinned fallback.
    ///
    /// Lookup failures never escalate: they are logged and degrade to
    /// `remote.fallback_url`.
    pub async fn resolve_download_url(&self, remote: &RemoteOrigin) -> String {
        match self.lookup_latest(remote).await {
            Ok(url) => url,
            Err(e) => {
                warn!(
                    error = %e,
                    fallback = remote.fallback_url,
                    "release lookup failed, using fallback URL"
                );
                remote.fallback_url.to_string()
            }
        }
    }

    async fn lookup_latest(&self, remote: &RemoteOrigin) -> Result<String> {
        let url = &self.release.url;
        let response = self
            .transport
            .get(url)
            .await
            .map_err(|e| DictIndexError::Network(e.to_string()))?;

        if !response.is_success() {
            return Err(DictIndexError::Network(format!(
                "{url}: HTTP {}",
                response.status
            )));
        }

        let listing: ReleaseListing = serde_json::from_slice(&response.body)
            .map_err(|e| DictIndexError::Network(format!("{url}: invalid release listing: {e}")))?;

        let asset = select_asset(&listing, remote.asset_match, &self.release.archive_suffix)
            .ok_or_else(|| {
                DictIndexError::Network(format!(
                    "no asset matching '{}' in release {}",
                    remote.asset_match, listing.tag_name
                ))
            })?;

        info!(tag = %listing.tag_name, asset = %asset.name, "found latest release");
        Ok(asset.browser_download_url.clone())
    }
}

fn archive_path(dir: &Path, stem: &str) -> PathBuf {
    dir.join(format!("{stem}.{ARCHIVE_EXTENSION}"))
}

#[cfg(test)]
mod tests {
    use dictindex_shared::{
        ExtractMode, IndexSettings, LocalOrigin, SourceName, Transform, TransformKind,
    };
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn config(root: &Path, release_url: String) -> AppConfig {
        let mut config = AppConfig::default();
        config.folders = config.folders.rooted_at(root);
        config.release.url = release_url;
        config.retry.initial_backoff_ms = 0;
        config.retry.max_backoff_ms = 0;
        config
    }

    fn descriptor(origin: Origin) -> SourceDescriptor {
        SourceDescriptor {
            name: SourceName::Jmnedict,
            stem: "jmnedict",
            origin,
            extraction: ExtractMode::SingleRename { extension: "json" },
            transform: Transform {
                kind: TransformKind::None,
                ids: None,
            },
            primary_key: "id",
            index_name: "jmnedict",
            settings: IndexSettings::default(),
        }
    }

    fn remote(fallback_url: &'static str) -> Origin {
        Origin::Remote(RemoteOrigin {
            asset_match: "jmnedict-all",
            fallback_url,
            record_key: "words",
        })
    }

    fn leak(s: String) -> &'static str {
        Box::leak(s.into_boxed_str())
    }

    #[tokio::test]
    async fn downloads_latest_asset_into_cache() {
        let server = MockServer::start().await;
        let asset_url = format!("{}/assets/jmnedict-all-3.6.1.json.zip", server.uri());

        Mock::given(method("GET"))
            .and(path("/releases/latest"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "tag_name": "3.6.1",
                "assets": [
                    { "name": "jmnedict-all-3.6.1.json.tgz", "browser_download_url": "unused" },
                    { "name": "jmnedict-all-3.6.1.json.zip", "browser_download_url": asset_url }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/assets/jmnedict-all-3.6.1.json.zip"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"PK-archive".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), format!("{}/releases/latest", server.uri()));
        let acquirer = Acquirer::new(&config).unwrap();

        let out = acquirer
            .acquire(&descriptor(remote("http://unused.invalid/x.zip")))
            .await
            .expect("acquire");

        assert_eq!(out, dir.path().join(".downloads/jmnedict.zip"));
        assert_eq!(std::fs::read(&out).unwrap(), b"PK-archive");
    }

    #[tokio::test]
    async fn lookup_failure_falls_back_to_pinned_url() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/releases/latest"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/pinned/jmnedict.json.zip"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"pinned".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), format!("{}/releases/latest", server.uri()));
        let acquirer = Acquirer::new(&config).unwrap();
        let fallback = leak(format!("{}/pinned/jmnedict.json.zip", server.uri()));

        let out = acquirer.acquire(&descriptor(remote(fallback))).await.unwrap();
        assert_eq!(std::fs::read(out).unwrap(), b"pinned");
    }

    #[tokio::test]
    async fn release_without_matching_asset_uses_fallback() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/releases/latest"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "tag_name": "3.6.1",
                "assets": [{ "name": "kanjidic2-en.json.zip", "browser_download_url": "nope" }]
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), format!("{}/releases/latest", server.uri()));
        let acquirer = Acquirer::new(&config).unwrap();

        let remote = RemoteOrigin {
            asset_match: "jmnedict-all",
            fallback_url: "https://example.invalid/pinned.zip",
            record_key: "words",
        };
        let url = acquirer.resolve_download_url(&remote).await;
        assert_eq!(url, "https://example.invalid/pinned.zip");
    }

    #[tokio::test]
    async fn cached_archive_skips_all_network_access() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), format!("{}/releases/latest", server.uri()));
        let cached = dir.path().join(".downloads/jmnedict.zip");
        std::fs::create_dir_all(cached.parent().unwrap()).unwrap();
        std::fs::write(&cached, b"already here").unwrap();

        let acquirer = Acquirer::new(&config).unwrap();
        let fallback = leak(format!("{}/pinned.zip", server.uri()));
        let out = acquirer.acquire(&descriptor(remote(fallback))).await.unwrap();

        assert_eq!(out, cached);
        assert_eq!(std::fs::read(out).unwrap(), b"already here");
    }

    #[tokio::test]
    async fn failed_download_leaves_no_cache_entry() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/releases/latest"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/pinned.zip"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), format!("{}/releases/latest", server.uri()));
        let acquirer = Acquirer::new(&config).unwrap();
        let fallback = leak(format!("{}/pinned.zip", server.uri()));

        let err = acquirer
            .acquire(&descriptor(remote(fallback)))
            .await
            .unwrap_err();
        assert!(matches!(err, DictIndexError::Acquisition(_)));
        assert!(!acquirer.download_path("jmnedict").exists());
    }

    #[tokio::test]
    async fn local_source_resolves_under_local_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), "http://127.0.0.1:9/unused".into());
        let acquirer = Acquirer::new(&config).unwrap();
        let local = descriptor(Origin::Local(LocalOrigin { merge: None }));

        let err = acquirer.acquire(&local).await.unwrap_err();
        assert!(matches!(err, DictIndexError::SourceNotFound { .. }));

        let archive = dir.path().join("dict/jmnedict.zip");
        std::fs::create_dir_all(archive.parent().unwrap()).unwrap();
        std::fs::write(&archive, b"local").unwrap();

        assert_eq!(acquirer.acquire(&local).await.unwrap(), archive);
    }
}
