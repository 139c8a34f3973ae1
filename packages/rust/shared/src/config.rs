//! Application configuration for dictindex.
//!
//! User config lives at `~/.dictindex/dictindex.toml`.
//! CLI flags override config file values, which override defaults.
//! The loaded [`AppConfig`] is built once at startup and passed by reference
//! into every component; nothing reads configuration ambiently.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{DictIndexError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "dictindex.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".dictindex";

// ---------------------------------------------------------------------------
// Config structs (matching dictindex.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Cache and local archive directories.
    #[serde(default)]
    pub folders: FoldersConfig,

    /// Release-listing lookup.
    #[serde(default)]
    pub release: ReleaseConfig,

    /// Download retry policy.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Search engine connection.
    #[serde(default)]
    pub search: SearchConfig,
}

/// `[folders]` section. Relative paths resolve against the working directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoldersConfig {
    /// Download cache (raw archives).
    #[serde(default = "default_downloads")]
    pub downloads: PathBuf,

    /// Extraction cache (single files and per-source subdirectories).
    #[serde(default = "default_extracts")]
    pub extracts: PathBuf,

    /// Merge cache (merged bank collections).
    #[serde(default = "default_merges")]
    pub merges: PathBuf,

    /// Processed collections, ready for indexing.
    #[serde(default = "default_dictionaries")]
    pub dictionaries: PathBuf,

    /// Directory holding archives for local sources.
    #[serde(default = "default_local")]
    pub local: PathBuf,
}

impl Default for FoldersConfig {
    fn default() -> Self {
        Self {
            downloads: default_downloads(),
            extracts: default_extracts(),
            merges: default_merges(),
            dictionaries: default_dictionaries(),
            local: default_local(),
        }
    }
}

impl FoldersConfig {
    /// Re-root every relative folder under `root`. Absolute folders are kept.
    pub fn rooted_at(&self, root: &Path) -> Self {
        let join = |p: &PathBuf| {
            if p.is_absolute() {
                p.clone()
            } else {
                root.join(p)
            }
        };
        Self {
            downloads: join(&self.downloads),
            extracts: join(&self.extracts),
            merges: join(&self.merges),
            dictionaries: join(&self.dictionaries),
            local: join(&self.local),
        }
    }
}

fn default_downloads() -> PathBuf {
    ".downloads".into()
}
fn default_extracts() -> PathBuf {
    ".extracts".into()
}
fn default_merges() -> PathBuf {
    ".merges".into()
}
fn default_dictionaries() -> PathBuf {
    ".dictionaries".into()
}
fn default_local() -> PathBuf {
    "dict".into()
}

/// `[release]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseConfig {
    /// Release-listing endpoint returning `{ tag_name, assets: [...] }`.
    #[serde(default = "default_release_url")]
    pub url: String,

    /// Suffix a release asset must end with to be selected.
    #[serde(default = "default_archive_suffix")]
    pub archive_suffix: String,

    /// Per-request timeout for lookups and downloads.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ReleaseConfig {
    fn default() -> Self {
        Self {
            url: default_release_url(),
            archive_suffix: default_archive_suffix(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_release_url() -> String {
    "https://api.github.com/repos/scriptin/jmdict-simplified/releases/latest".into()
}
fn default_archive_suffix() -> String {
    ".json.zip".into()
}
fn default_timeout_secs() -> u64 {
    300
}

/// `[retry]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per download, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry.
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Upper bound on any single delay.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Growth factor between consecutive delays.
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            multiplier: default_multiplier(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}
fn default_initial_backoff_ms() -> u64 {
    1000
}
fn default_max_backoff_ms() -> u64 {
    30_000
}
fn default_multiplier() -> f64 {
    2.0
}

/// `[search]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Base URL of the search engine.
    #[serde(default = "default_host")]
    pub host: String,

    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Documents sent per add-documents request.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Interval between task status polls.
    #[serde(default = "default_task_poll_ms")]
    pub task_poll_ms: u64,

    /// Give up waiting on a single engine task after this long.
    #[serde(default = "default_task_timeout_secs")]
    pub task_timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            api_key_env: default_api_key_env(),
            batch_size: default_batch_size(),
            task_poll_ms: default_task_poll_ms(),
            task_timeout_secs: default_task_timeout_secs(),
        }
    }
}

impl SearchConfig {
    /// Read the API key from the configured env var, if set and non-empty.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|v| !v.is_empty())
    }

    pub fn task_poll_interval(&self) -> Duration {
        Duration::from_millis(self.task_poll_ms)
    }

    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout_secs)
    }
}

fn default_host() -> String {
    "http://localhost:7700".into()
}
fn default_api_key_env() -> String {
    "MEILI_API_KEY".into()
}
fn default_batch_size() -> usize {
    10_000
}
fn default_task_poll_ms() -> u64 {
    250
}
fn default_task_timeout_secs() -> u64 {
    900
}

impl AppConfig {
    /// Check values that serde alone cannot reject.
    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.release.url).map_err(|e| {
            DictIndexError::config(format!("invalid release.url '{}': {e}", self.release.url))
        })?;
        Url::parse(&self.search.host).map_err(|e| {
            DictIndexError::config(format!("invalid search.host '{}': {e}", self.search.host))
        })?;
        if self.retry.max_attempts == 0 {
            return Err(DictIndexError::config("retry.max_attempts must be at least 1"));
        }
        if !self.retry.multiplier.is_finite() || self.retry.multiplier < 1.0 {
            return Err(DictIndexError::config(format!(
                "retry.multiplier must be a finite number >= 1.0, got {}",
                self.retry.multiplier
            )));
        }
        if self.search.batch_size == 0 {
            return Err(DictIndexError::config("search.batch_size must be at least 1"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.dictindex/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| DictIndexError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.dictindex/dictindex.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| DictIndexError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        DictIndexError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    config.validate()?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| DictIndexError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| DictIndexError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| DictIndexError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
