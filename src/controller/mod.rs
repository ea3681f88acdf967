//! Project Controller — §4.9. Owns the single active project's lifecycle and is the
//! only entry point the outer interface (CLI, RPC, whatever embeds this crate) calls
//! into. Coordinates the File Filter, Settings Store, Shallow/Deep Index builders,
//! File Watcher and Search Router behind a single-flight build lock.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::config::IndexerConfig;
use crate::error::{IndexerError, Result};
use crate::filter::FileFilter;
use crate::index::{build_deep_index, build_shallow_index};
use crate::model::{DeepIndex, FileSummary, Project, ShallowIndex, WatcherEvent};
use crate::search::{self, QueryOptions, SearchMatch};
use crate::settings::SettingsStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Uninitialized,
    Initializing,
    Ready,
    TearingDown,
}

struct ActiveProject {
    project: Project,
    settings: SettingsStore,
    shallow: Option<ShallowIndex>,
    deep: Option<DeepIndex>,
    config: IndexerConfig,
    watcher_cancel: Option<CancellationToken>,
}

/// The single active project, guarded by a lock so `build_shallow`/`build_deep`
/// calls from multiple callers serialize rather than race each other's writes.
///
/// Cheaply `Clone`-able (every field is an `Arc`), so the watcher's background task
/// can hold its own handle back into the controller and trigger a rebuild without
/// borrowing `self` across an `.await` in a spawned task.
#[derive(Clone)]
pub struct ProjectController {
    state: Arc<Mutex<ControllerState>>,
    active: Arc<Mutex<Option<ActiveProject>>>,
    build_lock: Arc<Mutex<()>>,
}

impl Default for ProjectController {
    fn default() -> Self {
        Self::new()
    }
}

impl ProjectController {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ControllerState::Uninitialized)),
            active: Arc::new(Mutex::new(None)),
            build_lock: Arc::new(Mutex::new(())),
        }
    }

    pub async fn state(&self) -> ControllerState {
        *self.state.lock().await
    }

    /// Points the controller at a project root, tearing down any previously active
    /// project first. Builds the Settings Store and an initial shallow index, and
    /// starts the watcher if `watcher.enabled` in the loaded config.
    pub async fn set_project_path(&self, root: PathBuf) -> Result<()> {
        if !root.exists() {
            return Err(IndexerError::PathNotFound(root));
        }
        if !root.is_dir() {
            return Err(IndexerError::PathNotDirectory(root));
        }

        *self.state.lock().await = ControllerState::Initializing;
        self.teardown_active().await;

        let project = Project::new(root.clone());
        let config = IndexerConfig::load(&root);
        let settings = SettingsStore::initialize(&project)?;

        let filter = FileFilter::with_size_cap(&root, config.filter.max_file_bytes);
        let shallow = build_shallow_index(&root, &project.key, &filter);
        settings.persist_shallow(&shallow, shallow.files.len() as u64)?;

        let deep: Option<DeepIndex> = settings.load_deep();

        let watcher_enabled = config.watcher.enabled;
        let active = ActiveProject {
            project,
            settings,
            shallow: Some(shallow),
            deep,
            config,
            watcher_cancel: None,
        };

        *self.active.lock().await = Some(active);
        *self.state.lock().await = ControllerState::Ready;

        if watcher_enabled {
            self.start_watcher().await?;
        }

        Ok(())
    }

    async fn teardown_active(&self) {
        *self.state.lock().await = ControllerState::TearingDown;
        let mut active = self.active.lock().await;
        if let Some(prev) = active.take() {
            if let Some(cancel) = prev.watcher_cancel {
                cancel.cancel();
            }
        }
    }

    /// Starts the debounced watcher for the active project. Filesystem events beyond
    /// the debounce window trigger a shallow reindex; a running watcher is replaced,
    /// not stacked, if called again.
    async fn start_watcher(&self) -> Result<()> {
        let mut guard = self.active.lock().await;
        let active = guard.as_mut().ok_or(IndexerError::NotReady)?;

        if let Some(cancel) = active.watcher_cancel.take() {
            cancel.cancel();
        }

        let cancel = CancellationToken::new();
        let root = active.project.root.clone();
        let filter = FileFilter::with_size_cap(&root, active.config.filter.max_file_bytes);
        let debounce = active.config.watcher.debounce();
        let (tx, mut rx) = mpsc::channel::<WatcherEvent>(256);

        active.watcher_cancel = Some(cancel.clone());
        drop(guard);

        tokio::spawn(crate::watcher::run(root, filter, debounce, tx, cancel));

        // Every coalesced event triggers a full shallow rebuild, serialized through
        // `refresh_shallow`'s own build lock — a burst of events queues rebuilds
        // rather than racing them.
        let ctrl = self.clone();
        tokio::spawn(async move {
            while rx.recv().await.is_some() {
                if let Err(e) = ctrl.refresh_shallow().await {
                    tracing::warn!("watcher-triggered shallow rebuild failed: {e}");
                }
            }
        });

        Ok(())
    }

    /// Rebuilds the shallow index from scratch and persists it. Single-flight: a
    /// concurrent caller blocks on `build_lock` rather than racing this one.
    pub async fn refresh_shallow(&self) -> Result<ShallowIndex> {
        let _permit = self.build_lock.lock().await;
        let mut guard = self.active.lock().await;
        let active = guard.as_mut().ok_or(IndexerError::NotReady)?;

        let filter = FileFilter::with_size_cap(&active.project.root, active.config.filter.max_file_bytes);
        let shallow = build_shallow_index(&active.project.root, &active.project.key, &filter);
        active
            .settings
            .persist_shallow(&shallow, shallow.files.len() as u64)?;
        active.shallow = Some(shallow.clone());
        Ok(shallow)
    }

    /// Builds the full symbol table and call graph. Requires a shallow index to
    /// already exist (calls `refresh_shallow` first if one is missing).
    pub async fn build_deep(&self) -> Result<DeepIndex> {
        let _permit = self.build_lock.lock().await;

        let shallow = {
            let guard = self.active.lock().await;
            let active = guard.as_ref().ok_or(IndexerError::NotReady)?;
            match &active.shallow {
                Some(s) => s.clone(),
                None => {
                    drop(guard);
                    self.refresh_shallow().await?
                }
            }
        };

        let mut guard = self.active.lock().await;
        let active = guard.as_mut().ok_or(IndexerError::NotReady)?;

        let deep = build_deep_index(&active.project.root, &active.project.key, &shallow);
        let symbol_count: u64 = deep.files.values().map(|f| f.symbols.len() as u64).sum();
        active
            .settings
            .persist_deep(&deep, symbol_count, deep.edges.len() as u64)?;
        active.deep = Some(deep.clone());
        Ok(deep)
    }

    pub async fn find_files(&self, glob: &str) -> Result<Vec<String>> {
        let guard = self.active.lock().await;
        let active = guard.as_ref().ok_or(IndexerError::NotReady)?;
        let shallow = active.shallow.as_ref().ok_or(IndexerError::NotReady)?;
        shallow.files_matching(glob)
    }

    pub async fn file_summary(&self, relative_path: &str) -> Result<FileSummary> {
        let guard = self.active.lock().await;
        let active = guard.as_ref().ok_or(IndexerError::NotReady)?;
        let deep = active.deep.as_ref().ok_or(IndexerError::DeepIndexMissing)?;
        deep.summarize(relative_path)
    }

    pub async fn search_code(&self, pattern: &str, options: QueryOptions) -> Result<Vec<SearchMatch>> {
        let root = {
            let guard = self.active.lock().await;
            let active = guard.as_ref().ok_or(IndexerError::NotReady)?;
            active.project.root.clone()
        };
        let preferred = {
            let guard = self.active.lock().await;
            guard
                .as_ref()
                .and_then(|a| a.config.search.preferred_backend.clone())
                .and_then(|label| parse_backend_label(&label))
        };
        Ok(search::search(&root, pattern, &options, preferred).await?)
    }

    pub async fn get_settings_info(&self) -> Result<crate::settings::IndexConfigFile> {
        let guard = self.active.lock().await;
        let active = guard.as_ref().ok_or(IndexerError::NotReady)?;
        Ok(active.settings.read_config()?)
    }

    /// Tears down the active project and deletes its on-disk index root.
    pub async fn clear_settings(&self) -> Result<()> {
        let mut guard = self.active.lock().await;
        let active = guard.as_mut().ok_or(IndexerError::NotReady)?;
        active.settings.clear()?;
        if let Some(cancel) = active.watcher_cancel.take() {
            cancel.cancel();
        }
        *guard = None;
        *self.state.lock().await = ControllerState::Uninitialized;
        Ok(())
    }
}

fn parse_backend_label(label: &str) -> Option<search::SearchBackendKind> {
    match label {
        "ugrep" => Some(search::SearchBackendKind::Ugrep),
        "ripgrep" | "rg" => Some(search::SearchBackendKind::Ripgrep),
        "ag" => Some(search::SearchBackendKind::Ag),
        "grep" => Some(search::SearchBackendKind::Grep),
        "builtin" => Some(search::SearchBackendKind::BuiltIn),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[tokio::test]
    async fn set_project_path_rejects_missing_directory() {
        let controller = ProjectController::new();
        let err = controller
            .set_project_path(PathBuf::from("/no/such/path/at/all"))
            .await
            .unwrap_err();
        assert!(matches!(err, IndexerError::PathNotFound(_)));
    }

    #[tokio::test]
    async fn set_project_path_builds_a_shallow_index_and_find_files_sees_it() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.py"), "def f():\n    pass\n").unwrap();

        let controller = ProjectController::new();
        controller
            .set_project_path(dir.path().to_path_buf())
            .await
            .unwrap();

        let matches = controller.find_files("*.py").await.unwrap();
        assert_eq!(matches, vec!["a.py".to_string()]);

        controller.clear_settings().await.unwrap();
        assert_eq!(controller.state().await, ControllerState::Uninitialized);
    }

    #[tokio::test]
    async fn build_deep_requires_no_explicit_shallow_call_first() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.py"), "def f():\n    f()\n").unwrap();

        let controller = ProjectController::new();
        controller
            .set_project_path(dir.path().to_path_buf())
            .await
            .unwrap();

        let deep = controller.build_deep().await.unwrap();
        assert!(deep.files.contains_key("a.py"));

        let summary = controller.file_summary("a.py").await.unwrap();
        assert_eq!(summary.symbols.len(), 1);
    }

    #[tokio::test]
    async fn file_summary_before_build_deep_errors_with_deep_index_missing() {
        let dir = tempdir().unwrap();
        let controller = ProjectController::new();
        controller
            .set_project_path(dir.path().to_path_buf())
            .await
            .unwrap();

        let err = controller.file_summary("a.py").await.unwrap_err();
        assert!(matches!(err, IndexerError::DeepIndexMissing));
    }
}
