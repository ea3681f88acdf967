//! Unified error type, grouped by locality per the error-handling design.

use std::path::PathBuf;

use thiserror::Error;

use crate::filter::FilterError;
use crate::parser::ParserError;
use crate::search::SearchError;
use crate::settings::SettingsError;

/// Top-level error for every public operation.
///
/// Variants are grouped by locality: configuration errors are reported and never
/// retried, per-file errors are collected into build reports instead of aborting a
/// build, concurrency errors are surfaced immediately, backend errors may trigger a
/// downgrade, persistence errors are either silent discards (logged) or fatal for the
/// in-flight build.
#[derive(Error, Debug)]
pub enum IndexerError {
    // -- Configuration: reported to the caller, never retried -----------------------
    #[error("path not found: {0}")]
    PathNotFound(PathBuf),

    #[error("path is not a directory: {0}")]
    PathNotDirectory(PathBuf),

    #[error("no writable scratch directory available")]
    ScratchUnavailable,

    #[error("invalid glob pattern: {0}")]
    InvalidGlob(String),

    #[error("invalid regex: {reason}")]
    InvalidRegex { reason: String },

    // -- Per-file: collected in build reports, never abort a build ------------------
    #[error("parser error: {0}")]
    Parser(#[from] ParserError),

    #[error("filter error: {0}")]
    Filter(#[from] FilterError),

    // -- Concurrency: surfaced immediately, caller may retry -------------------------
    #[error("another build is already in progress")]
    Busy,

    #[error("project is not ready (call set_project_path first)")]
    NotReady,

    // -- Backend: search subprocess failures -----------------------------------------
    #[error(transparent)]
    Search(#[from] SearchError),

    // -- Persistence ------------------------------------------------------------------
    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error("unknown file: {0}")]
    UnknownFile(PathBuf),

    #[error("deep index has not been built yet")]
    DeepIndexMissing,

    #[error("{0}")]
    Internal(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, IndexerError>;
