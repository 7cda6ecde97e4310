//! Error types emitted by the places CLI.
//!
//! Keep this error type reasonably small, as every command returns
//! `Result<_, CliError>`; large payloads are boxed by the library errors.

use std::sync::Arc;

use camino::Utf8PathBuf;
use places_core::{BackendError, LocationError, NavigationError, PaginateError};
use places_data::{ConnectionError, IngestError, SourceError};
use thiserror::Error;

/// Errors emitted by the places CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (set --{field} or {env})")]
    MissingArgument {
        field: &'static str,
        env: &'static str,
    },
    /// An option has a value outside its accepted range.
    #[error("invalid {field}: {reason}")]
    InvalidArgument {
        field: &'static str,
        reason: &'static str,
    },
    /// A referenced input path does not exist on disk.
    #[error("{field} path {path:?} does not exist")]
    MissingSourceFile {
        field: &'static str,
        path: Utf8PathBuf,
    },
    /// A referenced input path exists but is not a file.
    #[error("{field} path {path:?} exists but is not a file")]
    SourcePathNotFile {
        field: &'static str,
        path: Utf8PathBuf,
    },
    /// A referenced input path could not be inspected due to an IO error.
    #[error("failed to inspect {field} path {path:?}: {source}")]
    InspectSourcePath {
        field: &'static str,
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The search service connection could not be configured.
    #[error(transparent)]
    Connection(#[from] ConnectionError),
    /// The places source file could not be opened.
    #[error(transparent)]
    OpenSource(#[from] SourceError),
    /// Dropping or creating the index failed.
    #[error("failed to recreate index {index:?}: {source}")]
    RecreateIndex {
        index: String,
        #[source]
        source: BackendError,
    },
    /// The search service refused some of the submitted rows.
    #[error("search service rejected {rejected} of {read} rows")]
    BackendRejected { rejected: u64, read: u64 },
    /// The ingestion run ended early.
    #[error(transparent)]
    Ingest(#[from] IngestError),
    /// Fetching places failed.
    #[error("failed to fetch places: {0}")]
    Paginate(#[from] PaginateError),
    /// The requested page is not part of the catalogue.
    #[error(transparent)]
    Navigation(#[from] NavigationError),
    /// The origin coordinates are invalid.
    #[error("invalid origin: {0}")]
    InvalidOrigin(#[from] LocationError),
    /// Serializing command output failed.
    #[error("failed to serialize output: {0}")]
    SerializeOutput(#[source] serde_json::Error),
    /// Writing command output failed.
    #[error("failed to write output: {0}")]
    WriteOutput(#[source] std::io::Error),
}
