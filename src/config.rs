//! Ambient configuration — TOML-backed, loaded tolerant of a missing or malformed
//! file. Every field has a default so an absent `.code_indexer.toml` is equivalent to
//! `IndexerConfig::default()`.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

fn default_max_file_bytes() -> u64 {
    crate::filter::DEFAULT_MAX_FILE_BYTES
}

fn default_parallel_workers() -> usize {
    num_cpus::get()
}

fn default_debounce_secs() -> u64 {
    crate::watcher::DEFAULT_DEBOUNCE.as_secs()
}

fn default_search_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
    #[serde(default)]
    pub extra_ignore_globs: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            max_file_bytes: default_max_file_bytes(),
            extra_ignore_globs: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingConfig {
    #[serde(default = "default_parallel_workers")]
    pub parallel_workers: usize,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            parallel_workers: default_parallel_workers(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherConfig {
    #[serde(default = "default_debounce_secs")]
    pub debounce_secs: u64,
    #[serde(default)]
    pub enabled: bool,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            debounce_secs: default_debounce_secs(),
            enabled: true,
        }
    }
}

impl WatcherConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_secs(self.debounce_secs).clamp(crate::watcher::MIN_DEBOUNCE, crate::watcher::MAX_DEBOUNCE)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_search_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub preferred_backend: Option<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_search_timeout_secs(),
            preferred_backend: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScratchConfig {
    #[serde(default)]
    pub base_override: Option<String>,
}

impl Default for ScratchConfig {
    fn default() -> Self {
        Self { base_override: None }
    }
}

/// Top-level on-disk config, read from `.code_indexer.toml` at the project root.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexerConfig {
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub indexing: IndexingConfig,
    #[serde(default)]
    pub watcher: WatcherConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub scratch: ScratchConfig,
}

impl IndexerConfig {
    /// Loads `{project_root}/.code_indexer.toml`. A missing file yields the default
    /// config silently; a present-but-malformed file logs a warning and also falls
    /// back to the default, rather than failing project setup.
    pub fn load(project_root: &Path) -> Self {
        let path = project_root.join(".code_indexer.toml");
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(_) => return Self::default(),
        };

        match toml::from_str(&raw) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::warn!("{} is malformed, using defaults: {e}", path.display());
                Self::default()
            }
        }
    }
}
