//! External search-tool discovery and dispatch.
//!
//! Probing walks `PATH` via `which` and confirms each candidate actually runs
//! (`--version`), memoizing the result so a project's lifetime only pays the probe
//! cost once. `invalidate()` clears the cache for callers that want to re-probe
//! after e.g. a PATH change.

use std::path::Path;
use std::process::Stdio;
use std::sync::Mutex;

use once_cell::sync::Lazy;
use tokio::process::Command;

use super::{QueryOptions, SearchError, SearchMatch};

/// Whether `kind` can be asked to report a match column (`--column`). Plain `grep`
/// has no portable equivalent, so its matches fall back to a best-effort column.
fn supports_column(kind: SearchBackendKind) -> bool {
    !matches!(kind, SearchBackendKind::Grep)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchBackendKind {
    Ugrep,
    Ripgrep,
    Ag,
    Grep,
    BuiltIn,
}

impl SearchBackendKind {
    fn binary_name(&self) -> &'static str {
        match self {
            Self::Ugrep => "ugrep",
            Self::Ripgrep => "rg",
            Self::Ag => "ag",
            Self::Grep => "grep",
            Self::BuiltIn => "",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Ugrep => "ugrep",
            Self::Ripgrep => "ripgrep",
            Self::Ag => "ag",
            Self::Grep => "grep",
            Self::BuiltIn => "builtin",
        }
    }
}

/// Priority order: the fastest/most-capable backend wins when several are on PATH.
const PROBE_ORDER: &[SearchBackendKind] = &[
    SearchBackendKind::Ugrep,
    SearchBackendKind::Ripgrep,
    SearchBackendKind::Ag,
    SearchBackendKind::Grep,
];

static PROBE_CACHE: Lazy<Mutex<Option<Vec<SearchBackendKind>>>> = Lazy::new(|| Mutex::new(None));

/// A binary present on `PATH` under the expected name but broken (wrong shim,
/// permissions, incompatible build) must not be declared usable — confirm it
/// actually runs before trusting it.
fn binary_runs(binary: &str) -> bool {
    std::process::Command::new(binary)
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

fn probe_once() -> Vec<SearchBackendKind> {
    PROBE_ORDER
        .iter()
        .copied()
        .filter(|kind| which::which(kind.binary_name()).is_ok() && binary_runs(kind.binary_name()))
        .collect()
}

fn available_backends() -> Vec<SearchBackendKind> {
    let mut cache = PROBE_CACHE.lock().unwrap_or_else(|e| e.into_inner());
    if let Some(cached) = &*cache {
        return cached.clone();
    }
    let found = probe_once();
    *cache = Some(found.clone());
    found
}

/// Clears the memoized probe result, forcing the next `detect_best`/`is_available`
/// call to re-scan `PATH`.
pub fn invalidate() {
    let mut cache = PROBE_CACHE.lock().unwrap_or_else(|e| e.into_inner());
    *cache = None;
}

pub fn is_available(kind: SearchBackendKind) -> bool {
    if kind == SearchBackendKind::BuiltIn {
        return true;
    }
    available_backends().contains(&kind)
}

/// The highest-priority backend found on `PATH`, or `BuiltIn` if none is.
pub fn detect_best() -> SearchBackendKind {
    available_backends()
        .into_iter()
        .next()
        .unwrap_or(SearchBackendKind::BuiltIn)
}

fn build_args(kind: SearchBackendKind, pattern: &str, root: &Path, options: &QueryOptions) -> Vec<String> {
    let mut args = Vec::new();
    match kind {
        SearchBackendKind::Ugrep | SearchBackendKind::Ripgrep => {
            args.push("--line-number".to_string());
            args.push("--column".to_string());
            args.push("--no-heading".to_string());
            if !options.regex {
                args.push("--fixed-strings".to_string());
            }
            if !options.case_sensitive {
                args.push("--ignore-case".to_string());
            }
            if options.fuzzy && kind == SearchBackendKind::Ugrep {
                // True edit-distance fuzzy matching, native to ugrep.
                args.push("--fuzzy".to_string());
            }
            if let Some(glob) = &options.file_glob {
                args.push("--glob".to_string());
                args.push(glob.clone());
            }
            if let Some(max) = options.max_matches {
                args.push("--max-count".to_string());
                args.push(max.to_string());
            }
            args.push(pattern.to_string());
            args.push(root.to_string_lossy().into_owned());
        }
        SearchBackendKind::Ag => {
            args.push("--numbers".to_string());
            args.push("--column".to_string());
            args.push("--nogroup".to_string());
            if !options.regex {
                args.push("--literal".to_string());
            }
            if !options.case_sensitive {
                args.push("--ignore-case".to_string());
            }
            args.push(pattern.to_string());
            args.push(root.to_string_lossy().into_owned());
        }
        SearchBackendKind::Grep => {
            args.push("-r".to_string());
            args.push("-n".to_string());
            if !options.regex {
                args.push("-F".to_string());
            } else {
                args.push("-E".to_string());
            }
            if !options.case_sensitive {
                args.push("-i".to_string());
            }
            args.push(pattern.to_string());
            args.push(root.to_string_lossy().into_owned());
        }
        SearchBackendKind::BuiltIn => unreachable!("BuiltIn never dispatches via subprocess"),
    }
    args
}

/// Parses one output line. `ugrep`/`ripgrep`/`ag` are run with `--column` and emit
/// `path:line:column:text`; plain `grep` has no portable column flag, so its
/// `path:line:text` output gets a best-effort column from a literal substring search.
fn parse_line(raw: &str, has_column: bool) -> Option<SearchMatch> {
    if has_column {
        let mut parts = raw.splitn(4, ':');
        let path = parts.next()?;
        let line: u32 = parts.next()?.parse().ok()?;
        let column: u32 = parts.next()?.parse().ok()?;
        let text = parts.next().unwrap_or("").to_string();
        Some(SearchMatch {
            path: path.into(),
            line,
            column,
            text,
            fuzzy_mode: None,
        })
    } else {
        let mut parts = raw.splitn(3, ':');
        let path = parts.next()?;
        let line: u32 = parts.next()?.parse().ok()?;
        let text = parts.next().unwrap_or("").to_string();
        let column = best_effort_column(&text);
        Some(SearchMatch {
            path: path.into(),
            line,
            column,
            text,
            fuzzy_mode: None,
        })
    }
}

/// `grep` doesn't report a column, so default to the start of the line — callers
/// that need an exact column for this backend should prefer `ripgrep`/`ugrep`/`ag`.
fn best_effort_column(_text: &str) -> u32 {
    1
}

/// Invokes the external `kind` binary and parses its `path:line:text` output.
/// Subprocess failure (missing binary, non-zero exit with no matches semantics,
/// timeout) is returned as an error so the caller can fall back to the built-in
/// scanner.
pub async fn run_external(
    kind: SearchBackendKind,
    root: &Path,
    pattern: &str,
    options: &QueryOptions,
) -> Result<Vec<SearchMatch>, SearchError> {
    let args = build_args(kind, pattern, root, options);
    let run = Command::new(kind.binary_name())
        .args(&args)
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .output();

    let output = match tokio::time::timeout(options.timeout, run).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            return Err(SearchError::BackendFailed {
                backend: kind.label().to_string(),
                reason: e.to_string(),
            })
        }
        Err(_) => {
            return Err(SearchError::Timeout {
                backend: kind.label().to_string(),
                elapsed_secs: options.timeout.as_secs(),
            })
        }
    };

    // Exit code 1 means "no matches" for the entire grep family — not a failure.
    if !output.status.success() && output.status.code() != Some(1) {
        return Err(SearchError::BackendFailed {
            backend: kind.label().to_string(),
            reason: format!("exited with {:?}", output.status.code()),
        });
    }

    let has_column = supports_column(kind);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let mut matches: Vec<SearchMatch> = stdout
        .lines()
        .filter_map(|line| parse_line(line, has_column))
        .collect();
    if let Some(max) = options.max_matches {
        matches.truncate(max);
    }
    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_column_style_line() {
        let m = parse_line("src/main.rs:42:5:let x = 1;", true).unwrap();
        assert_eq!(m.path, std::path::PathBuf::from("src/main.rs"));
        assert_eq!(m.line, 42);
        assert_eq!(m.column, 5);
        assert_eq!(m.text, "let x = 1;");
    }

    #[test]
    fn parses_grep_style_line_without_column() {
        let m = parse_line("src/main.rs:42:let x = 1;", false).unwrap();
        assert_eq!(m.path, std::path::PathBuf::from("src/main.rs"));
        assert_eq!(m.line, 42);
        assert_eq!(m.text, "let x = 1;");
    }

    #[test]
    fn builtin_is_always_available() {
        assert!(is_available(SearchBackendKind::BuiltIn));
    }

    #[test]
    fn detect_best_falls_back_to_builtin_when_nothing_found() {
        // Cannot force PATH emptiness in a unit test without affecting the whole
        // process; this only documents the fallback contract.
        let kind = detect_best();
        assert!(matches!(
            kind,
            SearchBackendKind::Ugrep
                | SearchBackendKind::Ripgrep
                | SearchBackendKind::Ag
                | SearchBackendKind::Grep
                | SearchBackendKind::BuiltIn
        ));
    }
}
