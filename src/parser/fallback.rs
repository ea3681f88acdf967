//! Fallback strategy — §4.3. Any indexable file whose extension has no dedicated
//! grammar gets line count and import-like lines only; no symbol table, no call
//! sites.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::{FileSymbols, ImportInfo};

static C_LIKE_INCLUDE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^\s*#\s*include\s*[<"]([^>"]+)[>"]"#).unwrap());
static RUST_USE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*use\s+([\w:]+)").unwrap());
static RUBY_REQUIRE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^\s*require(?:_relative)?\s+['"]([^'"]+)['"]"#).unwrap());
static PHP_USE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*use\s+([\w\\]+)\s*;").unwrap());
static CSHARP_USING: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*using\s+([\w.]+)\s*;").unwrap());
static SHELL_SOURCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:source|\.)\s+(\S+)").unwrap());

/// Returns the import-like lines found in `content`, matched against the pattern
/// registered for `extension`'s language family. Extensions with no registered
/// pattern simply yield no imports (not an error).
fn scan_imports(content: &str, extension: &str) -> Vec<ImportInfo> {
    let regex: &Regex = match extension {
        "c" | "cc" | "cpp" | "cxx" | "h" | "hpp" => &C_LIKE_INCLUDE,
        "rs" => &RUST_USE,
        "rb" => &RUBY_REQUIRE,
        "php" => &PHP_USE,
        "cs" => &CSHARP_USING,
        "sh" | "bash" => &SHELL_SOURCE,
        _ => return Vec::new(),
    };

    content
        .lines()
        .enumerate()
        .filter_map(|(i, line)| {
            regex.captures(line).and_then(|c| c.get(1)).map(|m| ImportInfo {
                source: m.as_str().to_string(),
                line: i as u32,
            })
        })
        .collect()
}

/// Builds a `FileSymbols` with no per-symbol detail: line count and import-like
/// lines only, empty call sites.
pub fn parse_fallback(content: &str, extension: &str) -> FileSymbols {
    FileSymbols {
        language: format!("fallback:{extension}"),
        line_count: content.lines().count() as u32,
        imports: scan_imports(content, extension),
        exports: None,
        symbols: Vec::new(),
        call_sites: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_lines() {
        let fs = parse_fallback("a\nb\nc\n", "md");
        assert_eq!(fs.line_count, 3);
        assert!(fs.symbols.is_empty());
        assert!(fs.call_sites.is_empty());
    }

    #[test]
    fn finds_c_include() {
        let fs = parse_fallback("#include <stdio.h>\nint main() {}\n", "c");
        assert_eq!(fs.imports.len(), 1);
        assert_eq!(fs.imports[0].source, "stdio.h");
    }

    #[test]
    fn finds_rust_use() {
        let fs = parse_fallback("use std::fs;\nfn main() {}\n", "rs");
        assert_eq!(fs.imports[0].source, "std::fs");
    }

    #[test]
    fn unregistered_extension_yields_no_imports() {
        let fs = parse_fallback("# Title\nsome text\n", "md");
        assert!(fs.imports.is_empty());
    }
}
