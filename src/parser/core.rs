//! Tree-sitter backed Parsing Strategies — §4.3.
//!
//! Symbol and scope extraction walks the tree recursively, tracking an enclosing
//! scope stack to build `file::scope.name` qualified names. Call sites and imports
//! are extracted separately with a tree-sitter query per language, dispatched on
//! `Query::capture_names()`.

use thiserror::Error;
use streaming_iterator::StreamingIterator;
use tree_sitter::{Language, Node, Parser, Query, QueryCursor};

use crate::model::{CallSite, FileSymbols, ImportInfo, Symbol, SymbolKind};

#[derive(Error, Debug)]
pub enum ParserError {
    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),
    #[error("tree-sitter failed to produce a parse tree for {path}")]
    GrammarFailure { path: String },
    #[error("invalid query for {language}: {reason}")]
    QueryError { language: String, reason: String },
}

pub type Result<T> = std::result::Result<T, ParserError>;

/// Languages handled by a dedicated tree-sitter grammar. Anything else falls back
/// to the line/regex-based Fallback strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupportedLanguage {
    Python,
    JavaScript,
    TypeScript,
    Java,
    Go,
    ObjectiveC,
    Zig,
}

impl SupportedLanguage {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "py" | "pyw" => Some(Self::Python),
            "js" | "jsx" | "mjs" | "cjs" => Some(Self::JavaScript),
            "ts" | "tsx" => Some(Self::TypeScript),
            "java" => Some(Self::Java),
            "go" => Some(Self::Go),
            "m" | "mm" => Some(Self::ObjectiveC),
            "zig" | "zon" => Some(Self::Zig),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::JavaScript => "javascript",
            Self::TypeScript => "typescript",
            Self::Java => "java",
            Self::Go => "go",
            Self::ObjectiveC => "objective-c",
            Self::Zig => "zig",
        }
    }

    fn tree_sitter_language(&self) -> Language {
        match self {
            Self::Python => tree_sitter_python::LANGUAGE.into(),
            Self::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
            Self::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Self::Java => tree_sitter_java::LANGUAGE.into(),
            Self::Go => tree_sitter_go::LANGUAGE.into(),
            Self::ObjectiveC => tree_sitter_objc::LANGUAGE.into(),
            Self::Zig => tree_sitter_zig::LANGUAGE.into(),
        }
    }

    fn refs_query_string(&self) -> &'static str {
        match self {
            Self::Python => PYTHON_REFS_QUERY,
            Self::JavaScript | Self::TypeScript => JS_TS_REFS_QUERY,
            Self::Java => JAVA_REFS_QUERY,
            Self::Go => GO_REFS_QUERY,
            Self::ObjectiveC => OBJC_REFS_QUERY,
            Self::Zig => ZIG_REFS_QUERY,
        }
    }
}

const PYTHON_REFS_QUERY: &str = r#"
(call function: (identifier) @call)
(call function: (attribute attribute: (identifier) @call))
(import_statement name: (dotted_name) @import)
(import_from_statement module_name: (dotted_name) @import)
(aliased_import name: (dotted_name) @import)
"#;

const JS_TS_REFS_QUERY: &str = r#"
(call_expression function: (identifier) @call)
(call_expression function: (member_expression property: (property_identifier) @call))
(new_expression constructor: (identifier) @call)
(import_statement source: (string) @import)
"#;

const JAVA_REFS_QUERY: &str = r#"
(method_invocation name: (identifier) @call)
(object_creation_expression type: (type_identifier) @call)
(import_declaration (scoped_identifier) @import)
"#;

const GO_REFS_QUERY: &str = r#"
(call_expression function: (identifier) @call)
(call_expression function: (selector_expression field: (field_identifier) @call))
(import_spec path: (interpreted_string_literal) @import)
"#;

const OBJC_REFS_QUERY: &str = r#"
(message_expression selector: (identifier) @call)
(preproc_include path: (string_literal) @import)
"#;

const ZIG_REFS_QUERY: &str = r#"
(call_expression function: (identifier) @call)
(builtin_call (identifier) @call)
"#;

/// One tree-sitter `Parser` instance, reused across files of the same run.
pub struct CodeParser {
    parser: Parser,
}

impl Default for CodeParser {
    fn default() -> Self {
        Self::new()
    }
}

struct ScopeFrame {
    qualified_name: String,
    end_byte: usize,
}

impl CodeParser {
    pub fn new() -> Self {
        Self {
            parser: Parser::new(),
        }
    }

    /// Parses `content` (the file at `relative_path`) and extracts symbols, imports,
    /// and call sites. A grammar that fails to produce any parse tree is a hard
    /// failure — the caller records it as a `FileParseFailure` rather than silently
    /// degrading to Fallback.
    pub fn parse_file(
        &mut self,
        content: &str,
        language: SupportedLanguage,
        relative_path: &str,
    ) -> Result<FileSymbols> {
        self.parser
            .set_language(&language.tree_sitter_language())
            .map_err(|_| ParserError::UnsupportedLanguage(language.name().to_string()))?;

        let tree = self.parser.parse(content, None).ok_or_else(|| ParserError::GrammarFailure {
            path: relative_path.to_string(),
        })?;

        let mut symbols = Vec::new();
        let mut stack: Vec<ScopeFrame> = Vec::new();

        // Java qualified names are package-prefixed (§4.3: `src/X.java::com.example.C.m`).
        // Seed the scope stack with the package so every top-level symbol inherits it
        // as a parent scope, the same mechanism nested classes/methods already use.
        if language == SupportedLanguage::Java {
            if let Some(package) = java_package_name(tree.root_node(), content.as_bytes()) {
                stack.push(ScopeFrame {
                    qualified_name: format!("{relative_path}::{package}"),
                    end_byte: tree.root_node().end_byte(),
                });
            }
        }

        walk_symbols(
            tree.root_node(),
            content.as_bytes(),
            language,
            relative_path,
            &mut stack,
            &mut symbols,
        );

        let (imports, call_sites) =
            self.extract_refs(&tree, content, language, relative_path, &symbols)?;

        Ok(FileSymbols {
            language: language.name().to_string(),
            line_count: content.lines().count() as u32,
            imports,
            exports: None,
            symbols,
            call_sites,
        })
    }

    fn extract_refs(
        &self,
        tree: &tree_sitter::Tree,
        content: &str,
        language: SupportedLanguage,
        relative_path: &str,
        symbols: &[Symbol],
    ) -> Result<(Vec<ImportInfo>, Vec<CallSite>)> {
        let query = Query::new(&language.tree_sitter_language(), language.refs_query_string())
            .map_err(|e| ParserError::QueryError {
                language: language.name().to_string(),
                reason: e.message().to_string(),
            })?;

        let capture_names = query.capture_names();
        let mut cursor = QueryCursor::new();
        let mut imports = Vec::new();
        let mut call_sites = Vec::new();

        let mut matches = cursor.matches(&query, tree.root_node(), content.as_bytes());
        while let Some(m) = matches.next() {
            for capture in m.captures {
                let capture_name = capture_names[capture.index as usize];
                let node = capture.node;
                let line = node.start_position().row as u32 + 1;
                let text = content[node.byte_range()].trim_matches(['"', '\'']);

                match capture_name {
                    "import" => imports.push(ImportInfo {
                        source: text.to_string(),
                        line,
                    }),
                    "call" => {
                        let caller = enclosing_qualified_name(line, symbols, relative_path);
                        call_sites.push(CallSite {
                            caller_qualified_name: caller,
                            callee_surface_token: text.to_string(),
                            line,
                        });
                    }
                    _ => {}
                }
            }
        }

        Ok((imports, call_sites))
    }
}

/// The tightest-enclosing symbol containing `line` (the innermost symbol whose
/// `[line_start, line_end]` span contains it), or the file-level pseudo-scope if
/// none does.
fn enclosing_qualified_name(line: u32, symbols: &[Symbol], relative_path: &str) -> String {
    symbols
        .iter()
        .filter(|s| s.line_start <= line && line <= s.line_end)
        .min_by_key(|s| s.line_end.saturating_sub(s.line_start))
        .map(|s| s.qualified_name.clone())
        .unwrap_or_else(|| format!("{relative_path}::<module>"))
}

/// Finds the file's `package com.example;` declaration, if any, and returns its
/// dotted name.
fn java_package_name(root: Node, source: &[u8]) -> Option<String> {
    let mut cursor = root.walk();
    for child in root.named_children(&mut cursor) {
        if child.kind() == "package_declaration" {
            // The declaration's name is its only scoped_identifier/identifier child.
            let mut inner = child.walk();
            for part in child.named_children(&mut inner) {
                if matches!(part.kind(), "scoped_identifier" | "identifier") {
                    return part.utf8_text(source).ok().map(|s| s.to_string());
                }
            }
        }
    }
    None
}

fn classify_node(kind: &str, language: SupportedLanguage) -> Option<SymbolKind> {
    use SupportedLanguage::*;
    match (language, kind) {
        (_, "function_declaration") => Some(SymbolKind::Function),
        (_, "function_definition") => Some(SymbolKind::Function),
        (_, "method_declaration") => Some(SymbolKind::Method),
        (_, "method_definition") => Some(SymbolKind::Method),
        (Java, "constructor_declaration") => Some(SymbolKind::Method),
        (_, "class_declaration") => Some(SymbolKind::Class),
        (Python, "class_definition") => Some(SymbolKind::Class),
        (ObjectiveC, "class_interface") | (ObjectiveC, "class_implementation") => {
            Some(SymbolKind::Class)
        }
        (_, "interface_declaration") => Some(SymbolKind::Interface),
        (ObjectiveC, "protocol_declaration") => Some(SymbolKind::Interface),
        (_, "enum_declaration") => Some(SymbolKind::Enum),
        (Go, "type_spec") => Some(SymbolKind::Class),
        (Zig, "variable_declaration") => Some(SymbolKind::Constant),
        (JavaScript, "lexical_declaration") | (TypeScript, "lexical_declaration") => {
            Some(SymbolKind::Variable)
        }
        (_, "field_declaration") => Some(SymbolKind::Variable),
        (Go, "const_declaration") => Some(SymbolKind::Constant),
        (Go, "var_declaration") => Some(SymbolKind::Variable),
        _ => None,
    }
}

fn extract_name<'a>(node: &Node<'a>, source: &'a [u8], language: SupportedLanguage) -> Option<String> {
    if let Some(name_node) = node.child_by_field_name("name") {
        if let Ok(text) = name_node.utf8_text(source) {
            return Some(text.to_string());
        }
    }
    if language == SupportedLanguage::Go && node.kind() == "type_spec" {
        if let Some(child) = node.named_child(0) {
            if let Ok(text) = child.utf8_text(source) {
                return Some(text.to_string());
            }
        }
    }
    if matches!(node.kind(), "lexical_declaration" | "var_declaration" | "const_declaration") {
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            if let Some(name_node) = child.child_by_field_name("name") {
                if let Ok(text) = name_node.utf8_text(source) {
                    return Some(text.to_string());
                }
            }
        }
    }
    None
}

fn extract_signature(node: &Node, source: &[u8]) -> String {
    let text = node.utf8_text(source).unwrap_or("");
    let first_line = text.lines().next().unwrap_or("").trim();
    let sig = first_line.find('{').map(|i| &first_line[..i]).unwrap_or(first_line);
    let sig = sig.trim_end_matches(':').trim();
    if sig.chars().count() > 200 {
        sig.chars().take(200).collect::<String>() + "..."
    } else {
        sig.to_string()
    }
}

/// Recursive descent building qualified names from an explicit scope stack: each
/// frame records the enclosing symbol's qualified name and its end byte, so a child
/// node only inherits a frame while it's still inside that byte range.
fn walk_symbols(
    node: Node,
    source: &[u8],
    language: SupportedLanguage,
    relative_path: &str,
    stack: &mut Vec<ScopeFrame>,
    out: &mut Vec<Symbol>,
) {
    while let Some(top) = stack.last() {
        if node.start_byte() >= top.end_byte {
            stack.pop();
        } else {
            break;
        }
    }

    if let Some(kind) = classify_node(node.kind(), language) {
        if let Some(name) = extract_name(&node, source, language) {
            let parent_qn = stack.last().map(|f| f.qualified_name.clone());
            let qualified_name = match &parent_qn {
                Some(parent) => format!("{parent}.{name}"),
                None => format!("{relative_path}::{name}"),
            };
            let effective_kind = if parent_qn.is_some() && kind == SymbolKind::Function {
                SymbolKind::Method
            } else {
                kind
            };

            out.push(Symbol {
                qualified_name: qualified_name.clone(),
                name,
                kind: effective_kind,
                declaring_file: relative_path.to_string(),
                // tree-sitter positions are 0-based rows; Symbol lines are 1-based.
                line_start: node.start_position().row as u32 + 1,
                line_end: node.end_position().row as u32 + 1,
                signature: Some(extract_signature(&node, source)),
                docstring: extract_docstring(&node, source, language),
                parent_qualified_name: parent_qn,
            });

            stack.push(ScopeFrame {
                qualified_name,
                end_byte: node.end_byte(),
            });
        }
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk_symbols(child, source, language, relative_path, stack, out);
    }
}

/// Python/Java doc-comment extraction: a leading string-literal statement for
/// Python, an immediately preceding `/** ... */` comment for Java.
fn extract_docstring(node: &Node, source: &[u8], language: SupportedLanguage) -> Option<String> {
    match language {
        SupportedLanguage::Python => {
            let body = node.child_by_field_name("body")?;
            let first = body.named_child(0)?;
            if first.kind() == "expression_statement" {
                let expr = first.named_child(0)?;
                if expr.kind() == "string" {
                    return expr.utf8_text(source).ok().map(|s| s.trim_matches(['"', '\'']).to_string());
                }
            }
            None
        }
        SupportedLanguage::Java => {
            let prev = node.prev_sibling()?;
            if prev.kind() == "block_comment" {
                return prev.utf8_text(source).ok().map(|s| s.to_string());
            }
            None
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_extension_covers_every_dedicated_language() {
        assert_eq!(SupportedLanguage::from_extension("py"), Some(SupportedLanguage::Python));
        assert_eq!(SupportedLanguage::from_extension("js"), Some(SupportedLanguage::JavaScript));
        assert_eq!(SupportedLanguage::from_extension("tsx"), Some(SupportedLanguage::TypeScript));
        assert_eq!(SupportedLanguage::from_extension("java"), Some(SupportedLanguage::Java));
        assert_eq!(SupportedLanguage::from_extension("go"), Some(SupportedLanguage::Go));
        assert_eq!(SupportedLanguage::from_extension("m"), Some(SupportedLanguage::ObjectiveC));
        assert_eq!(SupportedLanguage::from_extension("zig"), Some(SupportedLanguage::Zig));
        assert_eq!(SupportedLanguage::from_extension("txt"), None);
    }

    #[test]
    fn parses_python_function_and_nested_method() {
        let mut parser = CodeParser::new();
        let code = "def greet(name):\n    return name\n\n\nclass Greeter:\n    def hello(self):\n        greet(\"x\")\n";
        let fs = parser
            .parse_file(code, SupportedLanguage::Python, "greet.py")
            .unwrap();

        let top_fn = fs
            .symbols
            .iter()
            .find(|s| s.name == "greet")
            .expect("top-level function captured");
        assert_eq!(top_fn.qualified_name, "greet.py::greet");
        assert_eq!(top_fn.kind, SymbolKind::Function);

        let class = fs.symbols.iter().find(|s| s.name == "Greeter").unwrap();
        assert_eq!(class.kind, SymbolKind::Class);

        let method = fs.symbols.iter().find(|s| s.name == "hello").unwrap();
        assert_eq!(method.kind, SymbolKind::Method);
        assert_eq!(method.qualified_name, "greet.py::Greeter.hello");
        assert_eq!(method.parent_qualified_name.as_deref(), Some("greet.py::Greeter"));
    }

    #[test]
    fn records_call_site_against_enclosing_method() {
        let mut parser = CodeParser::new();
        let code = "class Greeter:\n    def hello(self):\n        greet(\"x\")\n";
        let fs = parser
            .parse_file(code, SupportedLanguage::Python, "greet.py")
            .unwrap();
        let site = fs
            .call_sites
            .iter()
            .find(|c| c.callee_surface_token == "greet")
            .expect("call site recorded");
        assert_eq!(site.caller_qualified_name, "greet.py::Greeter.hello");
    }

    #[test]
    fn java_qualified_names_include_the_package_prefix() {
        let mut parser = CodeParser::new();
        let code = "package com.example;\n\nclass C {\n    void m() {\n    }\n}\n";
        let fs = parser
            .parse_file(code, SupportedLanguage::Java, "src/X.java")
            .unwrap();

        let class = fs.symbols.iter().find(|s| s.name == "C").unwrap();
        assert_eq!(class.qualified_name, "src/X.java::com.example.C");

        let method = fs.symbols.iter().find(|s| s.name == "m").unwrap();
        assert_eq!(method.qualified_name, "src/X.java::com.example.C.m");
    }

    #[test]
    fn symbol_lines_are_one_based() {
        let mut parser = CodeParser::new();
        let code = "x = 1\n\n\ndef f():\n    pass\n";
        let fs = parser
            .parse_file(code, SupportedLanguage::Python, "a.py")
            .unwrap();
        let f = fs.symbols.iter().find(|s| s.name == "f").unwrap();
        assert_eq!(f.line_start, 4);
        assert_eq!(f.line_end, 5);
    }

    #[test]
    fn parses_go_function_and_import() {
        let mut parser = CodeParser::new();
        let code = "package main\n\nimport \"fmt\"\n\nfunc main() {\n\tfmt.Println(\"hi\")\n}\n";
        let fs = parser
            .parse_file(code, SupportedLanguage::Go, "main.go")
            .unwrap();
        assert!(fs.symbols.iter().any(|s| s.name == "main"));
        assert!(fs.imports.iter().any(|i| i.source.contains("fmt")));
    }

    #[test]
    fn line_count_reflects_source_lines() {
        let mut parser = CodeParser::new();
        let code = "def a():\n    pass\n";
        let fs = parser
            .parse_file(code, SupportedLanguage::Python, "a.py")
            .unwrap();
        assert_eq!(fs.line_count, 2);
    }
}
