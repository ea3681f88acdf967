//! Parsing Strategies — §4.3. Dispatches a file to its dedicated tree-sitter
//! grammar, or to the Fallback strategy when none is registered.

pub mod core;
pub mod fallback;

pub use core::{CodeParser, ParserError, SupportedLanguage};

use crate::model::FileSymbols;

/// Parses one file's content given its extension (without the leading dot).
///
/// A dedicated grammar's hard failure (`ParserError::GrammarFailure`) propagates to
/// the caller — Deep Index assembly records it as a `FileParseFailure` rather than
/// silently degrading to the Fallback strategy.
pub fn parse_file(
    parser: &mut CodeParser,
    content: &str,
    extension: &str,
    relative_path: &str,
) -> Result<FileSymbols, ParserError> {
    match SupportedLanguage::from_extension(extension) {
        Some(language) => parser.parse_file(content, language, relative_path),
        None => Ok(fallback::parse_fallback(content, extension)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatches_known_extension_to_tree_sitter() {
        let mut parser = CodeParser::new();
        let fs = parse_file(&mut parser, "def f():\n    pass\n", "py", "f.py").unwrap();
        assert_eq!(fs.language, "python");
        assert_eq!(fs.symbols.len(), 1);
    }

    #[test]
    fn dispatches_unknown_extension_to_fallback() {
        let mut parser = CodeParser::new();
        let fs = parse_file(&mut parser, "# notes\n", "md", "notes.md").unwrap();
        assert!(fs.language.starts_with("fallback:"));
        assert!(fs.symbols.is_empty());
    }
}
