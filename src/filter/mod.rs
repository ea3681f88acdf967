//! File Filter — §4.1. Decides whether a candidate path is indexable.

use std::io::Read;
use std::path::{Path, PathBuf};

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use ignore::overrides::{Override, OverrideBuilder};
use thiserror::Error;

/// Default size cap: 1 MiB.
pub const DEFAULT_MAX_FILE_BYTES: u64 = 1024 * 1024;

/// Bytes inspected at the head of a file when checking for a null byte (binary
/// sniff).
const BINARY_SNIFF_WINDOW: usize = 8 * 1024;

const BLOCKED_DIRS: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    "node_modules",
    "__pycache__",
    ".venv",
    "venv",
    "dist",
    "build",
    "target",
    ".idea",
    ".vscode",
    ".pytest_cache",
    ".mypy_cache",
    ".tox",
    "coverage",
    ".next",
    ".nuxt",
];

const BLOCKED_FILE_GLOBS: &[&str] = &[
    "*.lock",
    "*.min.js",
    "*.pyc",
    "*.class",
    "*.o",
    "*.obj",
    "*.so",
    "*.dylib",
    "*.dll",
    ".DS_Store",
    "Thumbs.db",
];

/// Specialized-strategy and Fallback-strategy extensions — the indexable extension
/// set from the Glossary. Files whose suffix is not in this set are excluded, unless
/// they are extensionless with a recognized shebang.
const INDEXABLE_EXTENSIONS: &[&str] = &[
    // specialized
    "py", "pyw", "js", "jsx", "mjs", "cjs", "ts", "tsx", "java", "go", "m", "mm", "zig", "zon",
    // fallback
    "c", "cc", "cpp", "cxx", "h", "hpp", "rs", "rb", "php", "cs", "kt", "kts", "scala", "swift",
    "lua", "pl", "r", "sh", "bash", "ps1", "html", "css", "scss", "sass", "less", "vue", "svelte",
    "astro", "hbs", "handlebars", "ejs", "pug", "md", "mdx", "json", "xml", "yml", "yaml", "toml",
    "ini", "sql", "ddl", "dml",
];

const SHEBANG_INTERPRETERS: &[(&str, &str)] = &[
    ("python", "py"),
    ("python3", "py"),
    ("node", "js"),
    ("bash", "sh"),
    ("sh", "sh"),
    ("ruby", "rb"),
    ("perl", "pl"),
];

#[derive(Error, Debug)]
pub enum FilterError {
    #[error("failed to read ignore file {path}: {source}")]
    IgnoreFileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Decides inclusion for paths rooted at a single project root.
///
/// IO errors while reading an ignore file are reported once per file (via the
/// returned `warnings`) and treated as "no rule here" — they never abort a scan.
pub struct FileFilter {
    root: PathBuf,
    gitignore: Gitignore,
    blocked_file_overrides: Override,
    max_file_bytes: u64,
    pub warnings: Vec<FilterError>,
}

impl FileFilter {
    /// Builds a filter for `root`, layering built-in blocklists under any
    /// `.gitignore`/`.codeindexignore` found in ancestor directories (nearest rule
    /// wins, `!` negation re-includes, per gitignore semantics).
    pub fn new(root: &Path) -> Self {
        Self::with_size_cap(root, DEFAULT_MAX_FILE_BYTES)
    }

    pub fn with_size_cap(root: &Path, max_file_bytes: u64) -> Self {
        let mut warnings = Vec::new();
        let mut builder = GitignoreBuilder::new(root);
        for dir in BLOCKED_DIRS {
            let _ = builder.add_line(None, dir);
        }

        for name in [".gitignore", ".codeindexignore"] {
            let path = root.join(name);
            if path.exists() {
                if let Some(err) = builder.add(&path) {
                    warnings.push(FilterError::IgnoreFileRead {
                        path,
                        source: std::io::Error::new(std::io::ErrorKind::Other, err.to_string()),
                    });
                }
            }
        }

        let gitignore = builder.build().unwrap_or_else(|_| Gitignore::empty());

        let mut override_builder = OverrideBuilder::new(root);
        for glob in BLOCKED_FILE_GLOBS {
            let _ = override_builder.add(glob);
        }
        let blocked_file_overrides = override_builder.build().unwrap_or_else(|_| Override::empty());

        Self {
            root: root.to_path_buf(),
            gitignore,
            blocked_file_overrides,
            max_file_bytes,
            warnings,
        }
    }

    /// True if `path` (absolute, rooted at this filter's project root) should be
    /// indexed.
    pub fn included(&self, path: &Path) -> bool {
        // `matched_path_or_any_parents` (not plain `matched`) so a bare directory
        // name rule like `node_modules` also excludes every path beneath it.
        if self
            .gitignore
            .matched_path_or_any_parents(path, path.is_dir())
            .is_ignore()
        {
            return false;
        }
        if path.is_dir() {
            return true;
        }
        if self.blocked_file_overrides.matched(path, false).is_ignore() {
            return false;
        }
        if !self.has_indexable_suffix(path) {
            return false;
        }
        if let Ok(meta) = path.metadata() {
            if meta.len() > self.max_file_bytes {
                return false;
            }
        }
        if self.looks_binary(path) {
            return false;
        }
        true
    }

    fn has_indexable_suffix(&self, path: &Path) -> bool {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => INDEXABLE_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext)),
            None => self.shebang_interpreter_known(path),
        }
    }

    fn shebang_interpreter_known(&self, path: &Path) -> bool {
        let Ok(mut file) = std::fs::File::open(path) else {
            return false;
        };
        let mut buf = [0u8; 128];
        let Ok(n) = file.read(&mut buf) else {
            return false;
        };
        let Ok(line) = std::str::from_utf8(&buf[..n]) else {
            return false;
        };
        let Some(first_line) = line.lines().next() else {
            return false;
        };
        if !first_line.starts_with("#!") {
            return false;
        }
        SHEBANG_INTERPRETERS
            .iter()
            .any(|(interp, _)| first_line.contains(interp))
    }

    fn looks_binary(&self, path: &Path) -> bool {
        let Ok(mut file) = std::fs::File::open(path) else {
            return false;
        };
        let mut buf = [0u8; BINARY_SNIFF_WINDOW];
        let Ok(n) = file.read(&mut buf) else {
            return false;
        };
        buf[..n].contains(&0)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn excludes_built_in_blocked_dirs() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("node_modules")).unwrap();
        fs::write(dir.path().join("node_modules/pkg.js"), b"x").unwrap();
        let filter = FileFilter::new(dir.path());
        assert!(!filter.included(&dir.path().join("node_modules")));
    }

    #[test]
    fn excludes_lock_files_and_os_metadata() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("Cargo.lock"), b"x").unwrap();
        fs::write(dir.path().join(".DS_Store"), b"x").unwrap();
        let filter = FileFilter::new(dir.path());
        assert!(!filter.included(&dir.path().join("Cargo.lock")));
        assert!(!filter.included(&dir.path().join(".DS_Store")));
    }

    #[test]
    fn excludes_non_indexable_extension() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("image.png"), b"x").unwrap();
        let filter = FileFilter::new(dir.path());
        assert!(!filter.included(&dir.path().join("image.png")));
    }

    #[test]
    fn includes_indexable_extension() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("main.py"), b"print(1)\n").unwrap();
        let filter = FileFilter::new(dir.path());
        assert!(filter.included(&dir.path().join("main.py")));
    }

    #[test]
    fn excludes_oversized_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("big.py");
        fs::write(&path, vec![b'a'; 2000]).unwrap();
        let filter = FileFilter::with_size_cap(dir.path(), 1000);
        assert!(!filter.included(&path));
    }

    #[test]
    fn excludes_binary_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.py");
        let mut content = vec![b'a'; 10];
        content.push(0);
        content.extend_from_slice(b"more text");
        fs::write(&path, content).unwrap();
        let filter = FileFilter::new(dir.path());
        assert!(!filter.included(&path));
    }

    #[test]
    fn extensionless_shebang_is_included() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run");
        fs::write(&path, b"#!/usr/bin/env python3\nprint(1)\n").unwrap();
        let filter = FileFilter::new(dir.path());
        assert!(filter.included(&path));
    }

    #[test]
    fn extensionless_without_shebang_is_excluded() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("README");
        fs::write(&path, b"hello").unwrap();
        let filter = FileFilter::new(dir.path());
        assert!(!filter.included(&path));
    }

    #[test]
    fn gitignore_rule_excludes() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(".gitignore"), b"generated/\n").unwrap();
        fs::create_dir_all(dir.path().join("generated")).unwrap();
        fs::write(dir.path().join("generated/out.py"), b"x").unwrap();
        let filter = FileFilter::new(dir.path());
        assert!(!filter.included(&dir.path().join("generated/out.py")));
    }

    #[test]
    fn gitignore_negation_reincludes() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(".gitignore"), "*.py\n!keep.py\n").unwrap();
        fs::write(dir.path().join("skip.py"), b"x").unwrap();
        fs::write(dir.path().join("keep.py"), b"x").unwrap();
        let filter = FileFilter::new(dir.path());
        assert!(!filter.included(&dir.path().join("skip.py")));
        assert!(filter.included(&dir.path().join("keep.py")));
    }

    #[test]
    fn codeindexignore_rule_excludes() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(".codeindexignore"), b"vendor/\n").unwrap();
        fs::create_dir_all(dir.path().join("vendor")).unwrap();
        fs::write(dir.path().join("vendor/lib.py"), b"x").unwrap();
        let filter = FileFilter::new(dir.path());
        assert!(!filter.included(&dir.path().join("vendor/lib.py")));
    }
}
