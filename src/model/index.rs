use std::collections::BTreeMap;

use globset::{Glob, GlobSetBuilder};
use serde::{Deserialize, Serialize};

use super::file_record::FileRecord;
use super::symbol::{CallEdge, CallSite, ImportInfo, Symbol};
use crate::error::{IndexerError, Result};

/// Per-file collection produced by a Parsing Strategy and consumed by Deep Index
/// assembly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileSymbols {
    pub language: String,
    pub line_count: u32,
    pub imports: Vec<ImportInfo>,
    pub exports: Option<Vec<String>>,
    pub symbols: Vec<Symbol>,
    pub call_sites: Vec<CallSite>,
}

/// Per-file parse failure recorded by the Deep Index's collect phase. The file
/// contributes no symbols but does not abort the build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileParseFailure {
    pub path: String,
    pub error: String,
}

/// Cheap, eagerly-built path-list-plus-metadata index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShallowIndex {
    pub project_key: String,
    pub build_timestamp_unix: i64,
    pub files: Vec<FileRecord>,
    pub language_histogram: BTreeMap<String, u64>,
}

impl ShallowIndex {
    pub fn new(project_key: String, build_timestamp_unix: i64, mut files: Vec<FileRecord>) -> Self {
        files.sort_by(|a, b| a.path.cmp(&b.path));
        let mut language_histogram = BTreeMap::new();
        for f in &files {
            if let Some(lang) = &f.language {
                *language_histogram.entry(lang.clone()).or_insert(0) += 1;
            }
        }
        Self {
            project_key,
            build_timestamp_unix,
            files,
            language_histogram,
        }
    }

    /// `*` matches within a path segment, `**` matches zero or more segments, `?`
    /// matches one character. Case-insensitive on Windows, case-sensitive elsewhere.
    pub fn files_matching(&self, pattern: &str) -> Result<Vec<String>> {
        let glob = Glob::new(pattern)
            .map_err(|e| IndexerError::InvalidGlob(e.to_string()))?;
        let mut builder = GlobSetBuilder::new();
        builder.add(glob);
        let set = builder
            .build()
            .map_err(|e| IndexerError::InvalidGlob(e.to_string()))?;

        let mut out: Vec<String> = self
            .files
            .iter()
            .map(|f| f.path.as_str())
            .filter(|p| {
                if cfg!(windows) {
                    set.is_match(p.to_lowercase())
                } else {
                    set.is_match(p)
                }
            })
            .map(|p| p.to_string())
            .collect();
        out.sort();
        Ok(out)
    }

    pub fn language_histogram(&self) -> &BTreeMap<String, u64> {
        &self.language_histogram
    }
}

/// Full symbol table with cross-file call graph, built only on explicit request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeepIndex {
    pub project_key: String,
    pub build_timestamp_unix: i64,
    pub indexed_file_count: u64,
    /// Keyed by relative path, serialized in path order for determinism.
    pub files: BTreeMap<String, FileSymbols>,
    pub edges: Vec<CallEdge>,
    pub language_histogram: BTreeMap<String, u64>,
    pub parse_failures: Vec<FileParseFailure>,
    pub ambiguous_call_sites: u64,
}

/// Per-symbol summary returned by `summarize`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolSummary {
    pub qualified_name: String,
    pub name: String,
    pub kind: crate::model::symbol::SymbolKind,
    pub line_start: u32,
    pub line_end: u32,
    pub signature: Option<String>,
    pub called_by: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileSummary {
    pub language: String,
    pub line_count: Option<u32>,
    pub imports: Vec<ImportInfo>,
    pub symbols: Vec<SymbolSummary>,
}

impl DeepIndex {
    /// Symbols are serialized in qualified-name order; edges sorted by
    /// `(caller_qn, callee_qn)` — required for byte-identical persistence across
    /// builds of the same snapshot.
    pub fn finalize(mut self) -> Self {
        for fs in self.files.values_mut() {
            fs.symbols.sort_by(|a, b| a.qualified_name.cmp(&b.qualified_name));
        }
        self.edges.sort();
        self.edges.dedup();
        self
    }

    pub fn lookup_qn(&self, qualified_name: &str) -> Option<&Symbol> {
        for fs in self.files.values() {
            if let Some(s) = fs.symbols.iter().find(|s| s.qualified_name == qualified_name) {
                return Some(s);
            }
        }
        None
    }

    fn called_by(&self, qualified_name: &str) -> Vec<String> {
        let mut callers: Vec<String> = self
            .edges
            .iter()
            .filter(|e| e.callee_qualified_name == qualified_name)
            .map(|e| e.caller_qualified_name.clone())
            .collect();
        callers.sort();
        callers.dedup();
        callers
    }

    pub fn summarize(&self, relative_path: &str) -> Result<FileSummary> {
        let fs = self
            .files
            .get(relative_path)
            .ok_or_else(|| IndexerError::UnknownFile(relative_path.into()))?;

        let symbols = fs
            .symbols
            .iter()
            .map(|s| SymbolSummary {
                qualified_name: s.qualified_name.clone(),
                name: s.name.clone(),
                kind: s.kind,
                line_start: s.line_start,
                line_end: s.line_end,
                signature: s.signature.clone(),
                called_by: self.called_by(&s.qualified_name),
            })
            .collect();

        Ok(FileSummary {
            language: fs.language.clone(),
            line_count: Some(fs.line_count),
            imports: fs.imports.clone(),
            symbols,
        })
    }
}
