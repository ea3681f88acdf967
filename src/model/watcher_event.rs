use std::path::PathBuf;

/// A single filesystem change observed by the watcher. Never stored — consumed
/// directly by the debouncer.
#[derive(Debug, Clone)]
pub struct WatcherEvent {
    pub kind: WatcherEventKind,
    pub old_path: Option<PathBuf>,
    pub new_path: Option<PathBuf>,
    pub timestamp_unix: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherEventKind {
    Create,
    Modify,
    Delete,
    Move,
}
