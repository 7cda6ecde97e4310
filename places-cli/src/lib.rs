//! Command-line interface for loading and browsing the places catalogue.
#![forbid(unsafe_code)]

use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use clap::{Parser, Subcommand};
use log::{info, warn};
use places_data::{Connection, ConnectionSettings, DEFAULT_INDEX};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

mod error;
mod ingest;
mod list;
mod nearest;

pub use error::CliError;

use ingest::{IngestArgs, run_ingest};
use list::{ListArgs, run_list};
use nearest::{NearestArgs, run_nearest};

const ARG_CACERT: &str = "cacert";
const ARG_INDEX: &str = "index";
const ARG_INGEST_INPUT: &str = "input";
const ARG_INGEST_CONCURRENCY: &str = "concurrency";
const ARG_INGEST_ID_POLICY: &str = "id-policy";
const ARG_INGEST_RECREATE_INDEX: &str = "recreate-index";
const ARG_LIST_PAGE: &str = "page";
const ARG_LIST_PAGE_SIZE: &str = "page-size";
const ARG_NEAREST_LAT: &str = "lat";
const ARG_NEAREST_LON: &str = "lon";
const ARG_NEAREST_COUNT: &str = "count";
const ENV_INGEST_INPUT: &str = "PLACES_CMDS_INGEST_INPUT";
const ENV_NEAREST_LAT: &str = "PLACES_CMDS_NEAREST_LAT";
const ENV_NEAREST_LON: &str = "PLACES_CMDS_NEAREST_LON";

/// Run the places CLI with the current process arguments and environment.
///
/// Ctrl-C cancels the running command; partial work is reported through the
/// returned error.
pub async fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    let cancel = CancellationToken::new();
    let watcher = tokio::spawn(cancel_on_interrupt(cancel.clone()));
    let mut stdout = std::io::stdout().lock();
    let outcome = match cli.command {
        Command::Ingest(args) => run_ingest(args, &cancel, &mut stdout).await,
        Command::List(args) => run_list(args, &cancel, &mut stdout).await,
        Command::Nearest(args) => run_nearest(args, &cancel, &mut stdout).await,
    };
    watcher.abort();
    outcome
}

async fn cancel_on_interrupt(cancel: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("interrupt received; cancelling");
            cancel.cancel();
        }
        Err(err) => warn!("failed to install interrupt handler: {err}"),
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "places",
    about = "Load and browse a places catalogue held in a search service",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Load a tab-separated places file into the index.
    Ingest(IngestArgs),
    /// Print one page of the catalogue.
    List(ListArgs),
    /// Print the places closest to a point.
    Nearest(NearestArgs),
}

/// Open a connection from `ELASTIC_*` settings plus an optional CA file.
fn open_connection(cacert: Option<&Utf8Path>) -> Result<Connection, CliError> {
    let mut settings = ConnectionSettings::from_env();
    if let Some(path) = cacert {
        require_existing(path, ARG_CACERT)?;
        settings = settings.with_ca_cert(path);
    }
    Ok(Connection::open(&settings)?)
}

fn index_or_default(index: Option<String>) -> String {
    index
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_INDEX.to_owned())
}

fn require_existing(path: &Utf8Path, field: &'static str) -> Result<(), CliError> {
    match places_data::fs::file_is_file(path) {
        Ok(true) => Ok(()),
        Ok(false) => Err(CliError::SourcePathNotFile {
            field,
            path: path.to_path_buf(),
        }),
        Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
            Err(CliError::MissingSourceFile {
                field,
                path: path.to_path_buf(),
            })
        }
        Err(source) => Err(CliError::InspectSourcePath {
            field,
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn write_json<T: Serialize>(writer: &mut dyn Write, value: &T) -> Result<(), CliError> {
    let payload = serde_json::to_string_pretty(value).map_err(CliError::SerializeOutput)?;
    writer
        .write_all(payload.as_bytes())
        .map_err(CliError::WriteOutput)?;
    writer.write_all(b"\n").map_err(CliError::WriteOutput)?;
    Ok(())
}

/// Connection options shared by every subcommand.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct Target {
    cacert: Option<Utf8PathBuf>,
    index: String,
}

impl Target {
    fn new(cacert: Option<Utf8PathBuf>, index: Option<String>) -> Self {
        Self {
            cacert,
            index: index_or_default(index),
        }
    }

    fn connect(&self) -> Result<Connection, CliError> {
        open_connection(self.cacert.as_deref())
    }
}

#[cfg(test)]
mod tests;
