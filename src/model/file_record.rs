use serde::{Deserialize, Serialize};

/// Minimal per-file metadata kept by the Shallow Index.
///
/// Invariant: `path` always uses forward slashes, regardless of host OS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub path: String,
    pub language: Option<String>,
    pub size_bytes: u64,
    pub last_modified_unix: i64,
    pub line_count: Option<u32>,
}

/// Normalize a path to the project-relative, forward-slash form every FileRecord and
/// Symbol.declaring_file uses.
pub fn to_relative_slash(root: &std::path::Path, path: &std::path::Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
