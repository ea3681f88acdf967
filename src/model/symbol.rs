use serde::{Deserialize, Serialize};

/// Kind of a declared symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Function,
    Method,
    Class,
    Interface,
    Enum,
    Module,
    Variable,
    Constant,
}

impl SymbolKind {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "function" | "fn" => Self::Function,
            "method" => Self::Method,
            "class" => Self::Class,
            "interface" | "protocol" => Self::Interface,
            "enum" => Self::Enum,
            "module" | "mod" | "namespace" | "package" => Self::Module,
            "variable" | "var" | "local" => Self::Variable,
            "constant" | "const" | "static" => Self::Constant,
            _ => Self::Function,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Method => "method",
            Self::Class => "class",
            Self::Interface => "interface",
            Self::Enum => "enum",
            Self::Module => "module",
            Self::Variable => "variable",
            Self::Constant => "constant",
        }
    }
}

impl std::fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A declared symbol. `qualified_name` is `file::scope.name`, file-relative to the
/// project root, unique within a DeepIndex. File-scoped symbols that must not leak
/// across files use the `local <id>` qualified-name form instead of a dotted scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    pub qualified_name: String,
    pub name: String,
    pub kind: SymbolKind,
    /// Relative path (forward-slash, project-root-relative) of the declaring file.
    pub declaring_file: String,
    pub line_start: u32,
    pub line_end: u32,
    pub signature: Option<String>,
    pub docstring: Option<String>,
    pub parent_qualified_name: Option<String>,
}

impl Symbol {
    /// `local <id>` qualified names are reserved for symbols that must not resolve
    /// across files (e.g. unexported Fallback-strategy locals).
    pub fn local_qualified_name(declaring_file: &str, id: &str) -> String {
        format!("{declaring_file}::local {id}")
    }
}

/// An import statement observed in a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportInfo {
    pub source: String,
    pub line: u32,
}

/// A call site recorded by a Parsing Strategy, with resolution deferred to the Deep
/// Index's link phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSite {
    pub caller_qualified_name: String,
    pub callee_surface_token: String,
    pub line: u32,
}

/// A resolved call-site edge. Both endpoints must resolve to a Symbol in the same
/// DeepIndex.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CallEdge {
    pub caller_qualified_name: String,
    pub callee_qualified_name: String,
}
