//! File Watcher — §4.7. Debounces OS filesystem events into coalesced rebuild
//! triggers, with a polling fallback when native watching can't be set up.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, RecvTimeoutError};
use std::time::Duration;

use notify_debouncer_mini::{new_debouncer, notify::RecursiveMode, DebounceEventResult};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::filter::FileFilter;
use crate::model::{WatcherEvent, WatcherEventKind};

pub const MIN_DEBOUNCE: Duration = Duration::from_secs(1);
pub const MAX_DEBOUNCE: Duration = Duration::from_secs(60);
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(6);

fn clamp_debounce(requested: Duration) -> Duration {
    requested.clamp(MIN_DEBOUNCE, MAX_DEBOUNCE)
}

/// Runs the watcher loop until `cancel` is triggered, emitting one coalesced
/// `WatcherEvent` per observed path change on `events_tx`. A path the `filter`
/// rejects at its *source* location is dropped without emitting an event; for a
/// rename/move, only the destination path is evaluated against the filter,
/// matching the "move uses destination path" rule.
///
/// If the native watcher fails to initialize, falls back to polling the tree at
/// twice the debounce interval.
pub async fn run(
    root: PathBuf,
    filter: FileFilter,
    debounce: Duration,
    events_tx: mpsc::Sender<WatcherEvent>,
    cancel: CancellationToken,
) {
    let debounce = clamp_debounce(debounce);
    let (tx, rx) = channel::<DebounceEventResult>();

    let debouncer = new_debouncer(debounce, tx);
    let mut debouncer = match debouncer {
        Ok(mut d) => match d.watcher().watch(&root, RecursiveMode::Recursive) {
            Ok(()) => Some(d),
            Err(e) => {
                tracing::warn!("failed to watch {}: {e}, falling back to polling", root.display());
                None
            }
        },
        Err(e) => {
            tracing::warn!("failed to create debouncer: {e}, falling back to polling");
            None
        }
    };

    if debouncer.is_none() {
        run_polling(&root, &filter, debounce * 2, &events_tx, &cancel).await;
        return;
    }
    // Keep the debouncer (and its underlying watch handle) alive for the loop.
    let _debouncer = debouncer.take();

    let poll_interval = Duration::from_secs(1).min(debounce);
    loop {
        match rx.recv_timeout(poll_interval) {
            Ok(Ok(events)) => {
                for event in events {
                    if let Some(watcher_event) = classify(&event.path, &filter) {
                        if events_tx.send(watcher_event).await.is_err() {
                            return;
                        }
                    }
                }
            }
            Ok(Err(e)) => {
                tracing::warn!("watcher error: {e:?}");
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        if cancel.is_cancelled() {
            break;
        }
    }
}

/// A path existing after the debounce window is a create/modify; absent, a
/// delete. notify-debouncer-mini doesn't distinguish rename-from/rename-to, so a
/// move surfaces as a delete at the source and a create at the destination — both
/// handled here by checking existence, which already implements the "move uses
/// destination path" rule without special-casing it.
fn classify(path: &Path, filter: &FileFilter) -> Option<WatcherEvent> {
    if !filter.included(path) && path.exists() {
        return None;
    }

    let kind = if path.exists() {
        WatcherEventKind::Modify
    } else {
        WatcherEventKind::Delete
    };

    Some(WatcherEvent {
        kind,
        old_path: None,
        new_path: Some(path.to_path_buf()),
        timestamp_unix: now_unix(),
    })
}

fn now_unix() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Polling fallback: rescans the tree every `interval` and diffs modification
/// times against the previous scan. Coarser than native events but never blocks
/// indexing on an unsupported filesystem (e.g. some network mounts).
async fn run_polling(
    root: &Path,
    filter: &FileFilter,
    interval: Duration,
    events_tx: &mpsc::Sender<WatcherEvent>,
    cancel: &CancellationToken,
) {
    use std::collections::HashMap;

    let mut last_seen: HashMap<PathBuf, i64> = HashMap::new();

    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = cancel.cancelled() => break,
        }

        let mut current: HashMap<PathBuf, i64> = HashMap::new();
        for entry in ignore::WalkBuilder::new(root).hidden(false).build().flatten() {
            let path = entry.path();
            if !path.is_file() || !filter.included(path) {
                continue;
            }
            let mtime = path
                .metadata()
                .ok()
                .and_then(|m| m.modified().ok())
                .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                .map(|d| d.as_secs() as i64)
                .unwrap_or(0);
            current.insert(path.to_path_buf(), mtime);
        }

        for (path, mtime) in &current {
            if last_seen.get(path) != Some(mtime) {
                let event = WatcherEvent {
                    kind: WatcherEventKind::Modify,
                    old_path: None,
                    new_path: Some(path.clone()),
                    timestamp_unix: now_unix(),
                };
                if events_tx.send(event).await.is_err() {
                    return;
                }
            }
        }
        for path in last_seen.keys() {
            if !current.contains_key(path) {
                let event = WatcherEvent {
                    kind: WatcherEventKind::Delete,
                    old_path: None,
                    new_path: Some(path.clone()),
                    timestamp_unix: now_unix(),
                };
                if events_tx.send(event).await.is_err() {
                    return;
                }
            }
        }

        last_seen = current;
        if cancel.is_cancelled() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debounce_is_clamped_to_the_configured_range() {
        assert_eq!(clamp_debounce(Duration::from_millis(100)), MIN_DEBOUNCE);
        assert_eq!(clamp_debounce(Duration::from_secs(600)), MAX_DEBOUNCE);
        assert_eq!(clamp_debounce(Duration::from_secs(10)), Duration::from_secs(10));
    }
}
