//! On-disk code intelligence engine: walks a source tree, builds a shallow file
//! index and an optional deep symbol/call-graph index, keeps both current via a
//! debounced filesystem watcher, and answers text/regex search queries through
//! whichever external search tool is fastest on the host.

pub mod config;
pub mod controller;
pub mod error;
pub mod filter;
pub mod index;
pub mod model;
pub mod parser;
pub mod search;
pub mod settings;
pub mod watcher;

pub use controller::{ControllerState, ProjectController};
pub use error::{IndexerError, Result};
pub use model::{DeepIndex, FileSummary, Project, ShallowIndex};
