//! Built-in pure-Rust search scanner — the `BuiltIn` backend in §4.8, used when no
//! external search tool is available on `PATH`.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use ignore::WalkBuilder;
use regex::Regex;

use super::{QueryOptions, SearchMatch};

/// Walks `root`, optionally restricted by `options.file_glob`, and scans every
/// file line by line for `pattern`. IO errors on an individual file are skipped,
/// not fatal — mirrors the rest of the crate's per-file error tolerance.
pub fn scan(root: &Path, pattern: &str, options: &QueryOptions) -> Result<Vec<SearchMatch>, super::SearchError> {
    let glob = match &options.file_glob {
        Some(pat) => Some(
            globset::Glob::new(pat)
                .map_err(|e| super::SearchError::InvalidGlob(e.to_string()))?
                .compile_matcher(),
        ),
        None => None,
    };

    let regex = if options.regex {
        Some(
            Regex::new(pattern).map_err(|e| super::SearchError::InvalidRegex(e.to_string()))?,
        )
    } else {
        None
    };

    // Returns the byte offset of the first match in `line`, or `None`.
    let matcher: Box<dyn Fn(&str) -> Option<usize>> = match (&regex, options.case_sensitive) {
        (Some(re), _) => Box::new(move |line: &str| re.find(line).map(|m| m.start())),
        (None, true) => {
            let needle = pattern.to_string();
            Box::new(move |line: &str| line.find(&needle))
        }
        (None, false) => {
            let needle = pattern.to_lowercase();
            Box::new(move |line: &str| line.to_lowercase().find(&needle))
        }
    };

    let max_matches = options.max_matches.unwrap_or(usize::MAX);
    let mut matches = Vec::new();

    'walk: for entry in WalkBuilder::new(root).hidden(false).build().flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if let Some(set) = &glob {
            if !set.is_match(path) {
                continue;
            }
        }

        let Ok(file) = File::open(path) else { continue };
        let reader = BufReader::new(file);
        for (idx, line_result) in reader.lines().enumerate() {
            let Ok(line) = line_result else { break };
            if let Some(byte_offset) = matcher(&line) {
                let column = line[..byte_offset].chars().count() as u32 + 1;
                matches.push(SearchMatch {
                    path: path.to_path_buf(),
                    line: idx as u32 + 1,
                    column,
                    text: line,
                    fuzzy_mode: None,
                });
                if matches.len() >= max_matches {
                    break 'walk;
                }
            }
        }
    }

    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn finds_plain_text_matches() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "hello\nworld\nhello again\n").unwrap();
        let opts = QueryOptions::default();
        let matches = scan(dir.path(), "hello", &opts).unwrap();
        assert_eq!(matches.len(), 2);
    }

    #[test]
    fn case_insensitive_by_default() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "Hello\n").unwrap();
        let opts = QueryOptions::default();
        let matches = scan(dir.path(), "hello", &opts).unwrap();
        assert_eq!(matches.len(), 1);
    }

    #[test]
    fn case_sensitive_true_requires_exact_case() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "Hello\n").unwrap();
        let mut opts = QueryOptions::default();
        opts.case_sensitive = true;
        let matches = scan(dir.path(), "hello", &opts).unwrap();
        assert_eq!(matches.len(), 0);
    }

    #[test]
    fn match_column_is_one_based() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "xx needle\n").unwrap();
        let mut opts = QueryOptions::default();
        opts.case_sensitive = true;
        let matches = scan(dir.path(), "needle", &opts).unwrap();
        assert_eq!(matches[0].column, 4);
    }

    #[test]
    fn respects_file_glob() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.py"), "needle\n").unwrap();
        fs::write(dir.path().join("b.js"), "needle\n").unwrap();
        let mut opts = QueryOptions::default();
        opts.file_glob = Some("*.py".to_string());
        let matches = scan(dir.path(), "needle", &opts).unwrap();
        assert_eq!(matches.len(), 1);
        assert!(matches[0].path.ends_with("a.py"));
    }

    #[test]
    fn regex_mode_matches_pattern() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "foo123\nbar\n").unwrap();
        let mut opts = QueryOptions::default();
        opts.regex = true;
        let matches = scan(dir.path(), r"foo\d+", &opts).unwrap();
        assert_eq!(matches.len(), 1);
    }

    #[test]
    fn max_matches_caps_results() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "x\nx\nx\n").unwrap();
        let mut opts = QueryOptions::default();
        opts.max_matches = Some(2);
        let matches = scan(dir.path(), "x", &opts).unwrap();
        assert_eq!(matches.len(), 2);
    }
}
