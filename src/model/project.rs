use std::path::{Path, PathBuf};

/// Stable 12-hex-character project key derived from the canonical project root.
pub fn project_key(root: &Path) -> String {
    let canonical = root
        .canonicalize()
        .unwrap_or_else(|_| root.to_path_buf());
    let digest = blake3::hash(canonical.to_string_lossy().as_bytes());
    digest.to_hex()[..12].to_string()
}

/// A project rooted at an absolute path. At most one is active per controller
/// instance; it is created on `set_project_path` and destroyed on `clear_settings` or
/// process end.
#[derive(Debug, Clone)]
pub struct Project {
    pub root: PathBuf,
    pub key: String,
}

impl Project {
    pub fn new(root: PathBuf) -> Self {
        let key = project_key(&root);
        Self { root, key }
    }
}
