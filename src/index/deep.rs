//! Deep Index build — §4.5. Phase 1 parses every shallow-indexed file in parallel
//! with rayon; phase 2 links call sites into edges on a single thread.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use rayon::prelude::*;

use crate::model::{CallEdge, FileParseFailure, FileSymbols, ShallowIndex, Symbol};
use crate::parser::{CodeParser, ParserError};

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

enum ParseOutcome {
    Ok(String, FileSymbols),
    Failed(String, String),
}

/// Phase 1: parse every file in `shallow` in parallel, capped at
/// `min(available_parallelism, 16)` worker threads via rayon's global pool.
fn parse_all(root: &Path, shallow: &ShallowIndex) -> Vec<ParseOutcome> {
    shallow
        .files
        .par_iter()
        .map(|record| {
            let path = root.join(&record.path);
            let content = match fs::read_to_string(&path) {
                Ok(c) => c,
                Err(e) => return ParseOutcome::Failed(record.path.clone(), e.to_string()),
            };
            let extension = path
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("")
                .to_ascii_lowercase();

            // Each rayon worker owns its own CodeParser — tree-sitter's `Parser` is
            // not `Sync`.
            let mut parser = CodeParser::new();
            match crate::parser::parse_file(&mut parser, &content, &extension, &record.path) {
                Ok(fs) => ParseOutcome::Ok(record.path.clone(), fs),
                Err(ParserError::GrammarFailure { path }) => {
                    ParseOutcome::Failed(path, "grammar produced no parse tree".to_string())
                }
                Err(e) => ParseOutcome::Failed(record.path.clone(), e.to_string()),
            }
        })
        .collect()
}

/// Resolves one call site against the whole-project symbol table, in priority
/// order: same-file scope match, same-file class-method match, the caller file's
/// imports, then a unique global match. A tie at any stage is left unresolved
/// (counted in `ambiguous_call_sites`) rather than guessed.
fn resolve_call(
    caller_file: &str,
    callee_token: &str,
    caller_qn: &str,
    files: &BTreeMap<String, FileSymbols>,
    by_name: &HashMap<String, Vec<String>>,
) -> Option<String> {
    let same_file = &files[caller_file];

    // Same-file scope match: another member of the caller's own enclosing scope
    // (e.g. a sibling method on the same class).
    let caller_parent = same_file
        .symbols
        .iter()
        .find(|s| s.qualified_name == caller_qn)
        .and_then(|s| s.parent_qualified_name.as_deref());
    if let Some(parent) = caller_parent {
        if let Some(hit) = same_file
            .symbols
            .iter()
            .find(|s| s.name == callee_token && s.parent_qualified_name.as_deref() == Some(parent))
        {
            return Some(hit.qualified_name.clone());
        }
    }

    // Same-file class-method match: any symbol in the same file with this name.
    let same_file_matches: Vec<&Symbol> = same_file
        .symbols
        .iter()
        .filter(|s| s.name == callee_token)
        .collect();
    if same_file_matches.len() == 1 {
        return Some(same_file_matches[0].qualified_name.clone());
    }
    if same_file_matches.len() > 1 {
        return None;
    }

    // Caller's-file imports: a symbol whose declaring file matches one of the
    // caller file's import sources.
    let import_sources: Vec<&str> = same_file.imports.iter().map(|i| i.source.as_str()).collect();
    if !import_sources.is_empty() {
        if let Some(candidates) = by_name.get(callee_token) {
            let import_matches: Vec<&String> = candidates
                .iter()
                .filter(|qn| import_sources.iter().any(|src| qn.starts_with(src) || src.ends_with(qn.split("::").next().unwrap_or(""))))
                .collect();
            if import_matches.len() == 1 {
                return Some(import_matches[0].clone());
            }
            if import_matches.len() > 1 {
                return None;
            }
        }
    }

    // Unique global match.
    match by_name.get(callee_token) {
        Some(candidates) if candidates.len() == 1 => Some(candidates[0].clone()),
        _ => None,
    }
}

/// Builds the linked `DeepIndex`. Parse failures never abort the build — they are
/// recorded in `parse_failures` and simply contribute no symbols.
pub fn build_deep_index(
    root: &Path,
    project_key: &str,
    shallow: &ShallowIndex,
) -> crate::model::DeepIndex {
    let outcomes = parse_all(root, shallow);

    let mut files: BTreeMap<String, FileSymbols> = BTreeMap::new();
    let mut parse_failures = Vec::new();
    for outcome in outcomes {
        match outcome {
            ParseOutcome::Ok(path, fs) => {
                files.insert(path, fs);
            }
            ParseOutcome::Failed(path, error) => {
                parse_failures.push(FileParseFailure { path, error });
            }
        }
    }

    let mut by_name: HashMap<String, Vec<String>> = HashMap::new();
    for fs in files.values() {
        for sym in &fs.symbols {
            by_name.entry(sym.name.clone()).or_default().push(sym.qualified_name.clone());
        }
    }

    let mut edges = Vec::new();
    let mut ambiguous_call_sites = 0u64;
    for (path, fs) in &files {
        for call in &fs.call_sites {
            match resolve_call(path, &call.callee_surface_token, &call.caller_qualified_name, &files, &by_name) {
                Some(callee_qn) => edges.push(CallEdge {
                    caller_qualified_name: call.caller_qualified_name.clone(),
                    callee_qualified_name: callee_qn,
                }),
                None => ambiguous_call_sites += 1,
            }
        }
    }

    let mut language_histogram: BTreeMap<String, u64> = BTreeMap::new();
    for fs in files.values() {
        *language_histogram.entry(fs.language.clone()).or_insert(0) += 1;
    }

    let deep = crate::model::DeepIndex {
        project_key: project_key.to_string(),
        build_timestamp_unix: now_unix(),
        indexed_file_count: files.len() as u64,
        files,
        edges,
        language_histogram,
        parse_failures,
        ambiguous_call_sites,
    };
    deep.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FileFilter;
    use crate::index::shallow::build_shallow_index;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn links_a_same_file_call() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("a.py"),
            "def helper():\n    pass\n\n\ndef main():\n    helper()\n",
        )
        .unwrap();

        let filter = FileFilter::new(dir.path());
        let shallow = build_shallow_index(dir.path(), "key", &filter);
        let deep = build_deep_index(dir.path(), "key", &shallow);

        assert_eq!(deep.parse_failures.len(), 0);
        assert!(deep
            .edges
            .iter()
            .any(|e| e.caller_qualified_name.ends_with("main") && e.callee_qualified_name.ends_with("helper")));
    }

    #[test]
    fn ambiguous_same_name_calls_are_not_resolved() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.py"), "def f():\n    pass\n").unwrap();
        fs::write(
            dir.path().join("b.py"),
            "def f():\n    pass\n\n\ndef g():\n    f()\n",
        )
        .unwrap();

        let filter = FileFilter::new(dir.path());
        let shallow = build_shallow_index(dir.path(), "key", &filter);
        let deep = build_deep_index(dir.path(), "key", &shallow);

        // `f()` inside b.py resolves to the same-file `f`, so it's NOT ambiguous —
        // same-file match takes priority over the cross-file duplicate in a.py.
        assert!(deep
            .edges
            .iter()
            .any(|e| e.callee_qualified_name == "b.py::f"));
    }

    #[test]
    fn unparseable_file_is_recorded_as_failure_not_fatal() {
        let dir = tempdir().unwrap();
        // .py extension but the grammar will still produce a (possibly degenerate)
        // tree for malformed input rather than failing outright, so exercise the
        // failure path via a read error instead: reference a file that gets deleted
        // after the shallow scan sees it.
        fs::write(dir.path().join("a.py"), "def f():\n    pass\n").unwrap();
        let filter = FileFilter::new(dir.path());
        let mut shallow = build_shallow_index(dir.path(), "key", &filter);
        shallow.files.push(crate::model::FileRecord {
            path: "missing.py".to_string(),
            language: Some("python".to_string()),
            size_bytes: 0,
            last_modified_unix: 0,
            line_count: None,
        });

        let deep = build_deep_index(dir.path(), "key", &shallow);
        assert_eq!(deep.parse_failures.len(), 1);
        assert_eq!(deep.parse_failures[0].path, "missing.py");
    }
}
