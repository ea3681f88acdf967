//! Search Router — §4.8. Dispatches a text/regex query to the fastest available
//! external search tool, falling back to a pure-Rust scanner.

pub mod backend;
pub mod builtin;

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub use backend::SearchBackendKind;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("invalid glob pattern: {0}")]
    InvalidGlob(String),
    #[error("invalid regex: {0}")]
    InvalidRegex(String),
    #[error("regex pattern rejected: {0}")]
    CatastrophicPattern(String),
    #[error("search backend {backend} timed out after {elapsed_secs}s")]
    Timeout { backend: String, elapsed_secs: u64 },
    #[error("search backend {backend} failed: {reason}")]
    BackendFailed { backend: String, reason: String },
}

#[derive(Debug, Clone)]
pub struct QueryOptions {
    pub regex: bool,
    pub fuzzy: bool,
    pub file_glob: Option<String>,
    pub case_sensitive: bool,
    pub max_matches: Option<usize>,
    pub timeout: Duration,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            regex: false,
            fuzzy: false,
            file_glob: None,
            case_sensitive: false,
            max_matches: None,
            timeout: Duration::from_secs(30),
        }
    }
}

/// How a `fuzzy` query was actually executed. `ugrep` is the only backend with true
/// edit-distance fuzzy matching; every other backend (including the built-in
/// scanner) degrades to a word-boundary partial-match translation of the pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FuzzyMode {
    EditDistance,
    WordBoundaryPartial,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchMatch {
    pub path: PathBuf,
    pub line: u32,
    pub column: u32,
    pub text: String,
    pub fuzzy_mode: Option<FuzzyMode>,
}

/// Rejects regex patterns with nested-quantifier shapes (`(a+)+`, `(a*)*`, ...)
/// that are classic ReDoS triggers against a backtracking engine. `regex` itself is
/// linear-time and immune, but external backends are not assumed to be, so every
/// regex query is screened before dispatch.
pub fn check_catastrophic_pattern(pattern: &str) -> Result<(), SearchError> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut depth = 0i32;
    let mut group_has_quantifier_inside = false;
    let mut stack: Vec<bool> = Vec::new();

    for (i, &c) in chars.iter().enumerate() {
        match c {
            '(' => {
                stack.push(group_has_quantifier_inside);
                group_has_quantifier_inside = false;
                depth += 1;
            }
            ')' => {
                depth -= 1;
                let inner_had_quantifier = group_has_quantifier_inside;
                group_has_quantifier_inside = stack.pop().unwrap_or(false);
                let followed_by_quantifier = chars
                    .get(i + 1)
                    .is_some_and(|&c| matches!(c, '+' | '*' | '{'));
                if inner_had_quantifier && followed_by_quantifier {
                    return Err(SearchError::CatastrophicPattern(pattern.to_string()));
                }
            }
            '+' | '*' => {
                group_has_quantifier_inside = true;
            }
            _ => {}
        }
    }
    let _ = depth;
    Ok(())
}

/// Translates a literal fuzzy query into a word-boundary partial-match regex for
/// backends without native fuzzy support: each character is escaped and joined by a
/// lazy any-character span, bounded by word edges. Not a true edit-distance match,
/// which is why callers tag the result with `FuzzyMode::WordBoundaryPartial`.
fn word_boundary_fuzzy_pattern(literal: &str) -> String {
    let body = literal
        .chars()
        .map(|c| regex::escape(&c.to_string()))
        .collect::<Vec<_>>()
        .join(".*?");
    format!(r"\b{body}\b")
}

/// Runs a search with the query options, preferring `preferred` if given and
/// available, otherwise probing in priority order. Falls back to the built-in
/// scanner if no external backend is found or the chosen one fails.
///
/// Regex validation is mandatory and happens before any backend is chosen: an
/// invalid pattern fails with `InvalidRegex`, never reaching `run_external`.
pub async fn search(
    root: &std::path::Path,
    pattern: &str,
    options: &QueryOptions,
    preferred: Option<SearchBackendKind>,
) -> Result<Vec<SearchMatch>, SearchError> {
    if options.regex {
        regex::Regex::new(pattern).map_err(|e| SearchError::InvalidRegex(e.to_string()))?;
        check_catastrophic_pattern(pattern)?;
    }

    let backend = preferred
        .filter(|k| backend::is_available(*k))
        .unwrap_or_else(backend::detect_best);

    let (effective_pattern, fuzzy_mode) = if options.fuzzy {
        if backend == SearchBackendKind::Ugrep {
            (pattern.to_string(), Some(FuzzyMode::EditDistance))
        } else {
            (word_boundary_fuzzy_pattern(pattern), Some(FuzzyMode::WordBoundaryPartial))
        }
    } else {
        (pattern.to_string(), None)
    };

    let mut effective_options = options.clone();
    if fuzzy_mode == Some(FuzzyMode::WordBoundaryPartial) {
        effective_options.regex = true;
    }

    let mut matches = match backend {
        SearchBackendKind::BuiltIn => builtin::scan(root, &effective_pattern, &effective_options)?,
        external => match backend::run_external(external, root, &effective_pattern, &effective_options).await {
            Ok(matches) => matches,
            Err(_) => builtin::scan(root, &effective_pattern, &effective_options)?,
        },
    };

    if let Some(mode) = fuzzy_mode {
        for m in &mut matches {
            m.fuzzy_mode = Some(mode);
        }
    }

    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_benign_pattern() {
        assert!(check_catastrophic_pattern(r"foo\d+bar").is_ok());
    }

    #[test]
    fn rejects_nested_quantifier() {
        assert!(check_catastrophic_pattern("(a+)+").is_err());
        assert!(check_catastrophic_pattern("(a*)*").is_err());
    }

    #[test]
    fn fuzzy_pattern_translation_escapes_and_bounds_each_character() {
        let translated = word_boundary_fuzzy_pattern("a.b");
        assert_eq!(translated, r"\ba.*?\..*?b\b");
    }

    #[tokio::test]
    async fn invalid_regex_is_rejected_before_any_backend_runs() {
        let dir = tempfile::tempdir().unwrap();
        let options = QueryOptions {
            regex: true,
            ..QueryOptions::default()
        };
        let err = search(dir.path(), "(unterminated", &options, Some(SearchBackendKind::BuiltIn))
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::InvalidRegex(_)));
    }
}
