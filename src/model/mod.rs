//! Core data model: §3 of the specification.

pub mod file_record;
pub mod index;
pub mod project;
pub mod symbol;
pub mod watcher_event;

pub use file_record::{to_relative_slash, FileRecord};
pub use index::{DeepIndex, FileParseFailure, FileSummary, FileSymbols, ShallowIndex, SymbolSummary};
pub use project::{project_key, Project};
pub use symbol::{CallEdge, CallSite, ImportInfo, Symbol, SymbolKind};
pub use watcher_event::{WatcherEvent, WatcherEventKind};
