//! Settings Store — §4.2. Owns the on-disk `IndexRoot` for one project.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

use crate::index::store::{self, Loaded};
use crate::model::Project;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("no writable scratch directory available")]
    ScratchUnavailable,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config.json is malformed: {0}")]
    Config(#[from] serde_json::Error),
}

/// Mirrors the `config.json` contract in §6.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfigFile {
    pub scratch_base: String,
    pub project_root: String,
    pub schema_version: u32,
    pub shallow: Option<BuildStamp>,
    pub deep: Option<DeepBuildStamp>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildStamp {
    pub built_at: u64,
    pub file_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeepBuildStamp {
    pub built_at: u64,
    pub symbol_count: u64,
    pub edge_count: u64,
}

/// Filesystem directory `{scratch_base}/code_indexer/{project_key}/`.
pub struct IndexRoot {
    pub dir: PathBuf,
}

impl IndexRoot {
    fn config_path(&self) -> PathBuf {
        self.dir.join("config.json")
    }
    fn shallow_path(&self) -> PathBuf {
        self.dir.join("shallow.bin")
    }
    fn deep_path(&self) -> PathBuf {
        self.dir.join("deep.bin")
    }
}

/// Resolves and owns one project's `IndexRoot`.
pub struct SettingsStore {
    root: IndexRoot,
    scratch_base_label: String,
}

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn is_writable_dir(dir: &Path) -> bool {
    if fs::create_dir_all(dir).is_err() {
        return false;
    }
    let probe = dir.join(".write_probe");
    let ok = fs::write(&probe, b"ok").is_ok();
    let _ = fs::remove_file(&probe);
    ok
}

impl SettingsStore {
    /// Resolves a scratch base in order — system temp dir; else
    /// `{project_path}/.code_indexer/`; else user home `~/.code_indexer/` — and
    /// creates the `IndexRoot` lazily. The chosen base is recorded in `config.json`.
    pub fn initialize(project: &Project) -> Result<Self, SettingsError> {
        let candidates: Vec<(PathBuf, String)> = vec![
            (std::env::temp_dir(), "system_temp".to_string()),
            (project.root.join(".code_indexer"), "project_local".to_string()),
            (
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(".code_indexer"),
                "home".to_string(),
            ),
        ];

        for (base, label) in candidates {
            let root_dir = base.join("code_indexer").join(&project.key);
            if is_writable_dir(&root_dir) {
                let store = Self {
                    root: IndexRoot { dir: root_dir },
                    scratch_base_label: label,
                };
                store.write_config_if_absent(project)?;
                return Ok(store);
            }
        }

        Err(SettingsError::ScratchUnavailable)
    }

    fn write_config_if_absent(&self, project: &Project) -> Result<(), SettingsError> {
        if self.root.config_path().exists() {
            return Ok(());
        }
        let cfg = IndexConfigFile {
            scratch_base: self.scratch_base_label.clone(),
            project_root: project.root.to_string_lossy().into_owned(),
            schema_version: store::SCHEMA_VERSION,
            shallow: None,
            deep: None,
        };
        self.write_config(&cfg)
    }

    fn write_config(&self, cfg: &IndexConfigFile) -> Result<(), SettingsError> {
        let bytes = serde_json::to_vec_pretty(cfg)?;
        atomic_write(&self.root.config_path(), &bytes)?;
        Ok(())
    }

    pub fn read_config(&self) -> Result<IndexConfigFile, SettingsError> {
        let bytes = fs::read(self.root.config_path())?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub fn dir(&self) -> &Path {
        &self.root.dir
    }

    pub fn scratch_base_label(&self) -> &str {
        &self.scratch_base_label
    }

    /// Reads and validates a binary blob against its schema version. A version
    /// mismatch (or any other malformed-blob condition) returns `None` — it forces a
    /// rebuild and is not a fatal error.
    fn load<T: DeserializeOwned>(path: &Path) -> Option<T> {
        let bytes = fs::read(path).ok()?;
        let loaded: Loaded<T> = store::decode(&bytes)?;
        Some(loaded.value)
    }

    pub fn load_shallow<T: DeserializeOwned>(&self) -> Option<T> {
        Self::load(&self.root.shallow_path())
    }

    pub fn load_deep<T: DeserializeOwned>(&self) -> Option<T> {
        Self::load(&self.root.deep_path())
    }

    /// Writes a temp file, fsyncs it, then renames it over the target — no reader
    /// ever observes a torn file.
    pub fn persist_shallow<T: Serialize>(
        &self,
        idx: &T,
        file_count: u64,
    ) -> Result<(), SettingsError> {
        let built_at = now_unix();
        let bytes = store::encode(idx, built_at).map_err(|e| {
            SettingsError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
        })?;
        atomic_write(&self.root.shallow_path(), &bytes)?;

        let mut cfg = self.read_config().unwrap_or(IndexConfigFile {
            scratch_base: self.scratch_base_label.clone(),
            project_root: String::new(),
            schema_version: store::SCHEMA_VERSION,
            shallow: None,
            deep: None,
        });
        cfg.shallow = Some(BuildStamp {
            built_at,
            file_count,
        });
        self.write_config(&cfg)
    }

    pub fn persist_deep<T: Serialize>(
        &self,
        idx: &T,
        symbol_count: u64,
        edge_count: u64,
    ) -> Result<(), SettingsError> {
        let built_at = now_unix();
        let bytes = store::encode(idx, built_at).map_err(|e| {
            SettingsError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
        })?;
        atomic_write(&self.root.deep_path(), &bytes)?;

        let mut cfg = self.read_config().unwrap_or(IndexConfigFile {
            scratch_base: self.scratch_base_label.clone(),
            project_root: String::new(),
            schema_version: store::SCHEMA_VERSION,
            shallow: None,
            deep: None,
        });
        cfg.deep = Some(DeepBuildStamp {
            built_at,
            symbol_count,
            edge_count,
        });
        self.write_config(&cfg)
    }

    /// Removes the entire `IndexRoot`; tolerant of an already-missing directory.
    pub fn clear(&self) -> Result<(), SettingsError> {
        match fs::remove_dir_all(&self.root.dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn atomic_write(target: &Path, bytes: &[u8]) -> Result<(), SettingsError> {
    let dir = target.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;
    let tmp_path = dir.join(format!(
        ".{}.tmp-{}",
        target.file_name().and_then(|n| n.to_str()).unwrap_or("blob"),
        std::process::id()
    ));
    {
        let mut f = fs::File::create(&tmp_path)?;
        f.write_all(bytes)?;
        f.sync_all()?;
    }
    fs::rename(&tmp_path, target)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Project;
    use serde::{Deserialize, Serialize};
    use tempfile::tempdir;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Sample {
        n: u32,
    }

    #[test]
    fn persist_then_load_round_trips() {
        let project_dir = tempdir().unwrap();
        let project = Project::new(project_dir.path().to_path_buf());
        let store = SettingsStore::initialize(&project).unwrap();

        let sample = Sample { n: 42 };
        store.persist_shallow(&sample, 1).unwrap();
        let loaded: Sample = store.load_shallow().unwrap();
        assert_eq!(loaded, sample);

        let cfg = store.read_config().unwrap();
        assert!(cfg.shallow.is_some());
        assert!(cfg.deep.is_none());

        store.clear().unwrap();
        assert!(!store.dir().exists());
    }

    #[test]
    fn clear_is_tolerant_of_missing_directory() {
        let project_dir = tempdir().unwrap();
        let project = Project::new(project_dir.path().to_path_buf());
        let store = SettingsStore::initialize(&project).unwrap();
        store.clear().unwrap();
        // Second clear on an already-missing directory must not error.
        store.clear().unwrap();
    }

    #[test]
    fn version_mismatch_returns_none_not_fatal() {
        let project_dir = tempdir().unwrap();
        let project = Project::new(project_dir.path().to_path_buf());
        let store = SettingsStore::initialize(&project).unwrap();
        // No shallow.bin written yet.
        let loaded: Option<Sample> = store.load_shallow();
        assert!(loaded.is_none());
    }
}
