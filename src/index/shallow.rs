//! Shallow Index build — §4.4. A parallel directory walk plus the File Filter,
//! producing a `FileRecord` per indexable file. No parsing happens here.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use ignore::WalkBuilder;

use crate::filter::FileFilter;
use crate::model::{to_relative_slash, FileRecord, ShallowIndex};
use crate::parser::SupportedLanguage;

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

fn language_label(extension: &str) -> Option<String> {
    SupportedLanguage::from_extension(extension).map(|l| l.name().to_string())
}

/// Walks `root`, applying `filter` to every candidate path, and returns the
/// resulting `ShallowIndex`. Directories the filter rejects are pruned before
/// descent — `ignore::WalkBuilder` does not recurse into a path `filter` excludes.
pub fn build_shallow_index(root: &Path, project_key: &str, filter: &FileFilter) -> ShallowIndex {
    let mut files = Vec::new();

    let walker = WalkBuilder::new(root)
        .hidden(false)
        .git_ignore(false)
        .ignore(false)
        .build();

    for entry in walker.flatten() {
        let path = entry.path();
        if path == root {
            continue;
        }
        if !filter.included(path) {
            continue;
        }
        if path.is_dir() {
            continue;
        }

        let Ok(meta) = path.metadata() else {
            continue;
        };
        let last_modified_unix = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();

        files.push(FileRecord {
            path: to_relative_slash(root, path),
            language: language_label(&extension),
            size_bytes: meta.len(),
            last_modified_unix,
            line_count: None,
        });
    }

    ShallowIndex::new(project_key.to_string(), now_unix(), files)
}
