//! Ingest command: load a tab-separated places file into the index.

use std::io::Write;
use std::num::NonZeroUsize;
use std::sync::Arc;

use camino::Utf8PathBuf;
use clap::{Parser, ValueEnum};
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use places_core::{BulkSink, BulkStats};
use places_data::{
    BulkIngestor, HttpBulkSink, IdPolicy, IndexAdmin, IngestConfig, IngestError, IngestSummary,
    SourceError, SourceRow, TsvRows,
};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::{
    ARG_CACERT, ARG_INDEX, ARG_INGEST_CONCURRENCY, ARG_INGEST_ID_POLICY, ARG_INGEST_INPUT,
    ARG_INGEST_RECREATE_INDEX, CliError, ENV_INGEST_INPUT, Target, require_existing, write_json,
};

/// Document id policy as accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) enum IdPolicyArg {
    /// Number rows from 1 in file order.
    #[default]
    Row,
    /// Use the file's id column.
    Column,
    /// Let the search service assign ids.
    Auto,
}

impl From<IdPolicyArg> for IdPolicy {
    fn from(value: IdPolicyArg) -> Self {
        match value {
            IdPolicyArg::Row => Self::SourceRow,
            IdPolicyArg::Column => Self::SourceColumn,
            IdPolicyArg::Auto => Self::BackendAssigned,
        }
    }
}

/// CLI arguments for the `ingest` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Load a tab-separated places file (id, name, address, phone, \
                 longitude, latitude, with a header line) into the index. \
                 Malformed rows are reported and skipped.",
    about = "Load a places file into the index"
)]
#[ortho_config(prefix = "PLACES")]
pub(crate) struct IngestArgs {
    /// Path to the tab-separated places file.
    #[arg(long = ARG_INGEST_INPUT, value_name = "path")]
    #[serde(default)]
    pub(crate) input: Option<Utf8PathBuf>,
    /// PEM file with the search service's CA certificate.
    #[arg(long = ARG_CACERT, value_name = "path")]
    #[serde(default)]
    pub(crate) cacert: Option<Utf8PathBuf>,
    /// Index to load into.
    #[arg(long = ARG_INDEX, value_name = "name")]
    #[serde(default)]
    pub(crate) index: Option<String>,
    /// Maximum rows processed at once.
    #[arg(long = ARG_INGEST_CONCURRENCY, value_name = "rows")]
    #[serde(default)]
    pub(crate) concurrency: Option<usize>,
    /// How document ids are chosen.
    #[arg(long = ARG_INGEST_ID_POLICY, value_enum)]
    #[serde(default)]
    pub(crate) id_policy: Option<IdPolicyArg>,
    /// Drop and recreate the index before loading.
    #[arg(long = ARG_INGEST_RECREATE_INDEX)]
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub(crate) recreate_index: bool,
}

impl IngestArgs {
    pub(crate) fn into_config(self) -> Result<IngestCommandConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        IngestCommandConfig::try_from(merged)
    }
}

/// Resolved `ingest` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct IngestCommandConfig {
    pub(crate) input: Utf8PathBuf,
    pub(crate) target: Target,
    pub(crate) ingest: IngestConfig,
    pub(crate) recreate_index: bool,
}

impl IngestCommandConfig {
    pub(crate) fn validate_sources(&self) -> Result<(), CliError> {
        require_existing(&self.input, ARG_INGEST_INPUT)
    }
}

impl TryFrom<IngestArgs> for IngestCommandConfig {
    type Error = CliError;

    fn try_from(args: IngestArgs) -> Result<Self, Self::Error> {
        let input = args.input.ok_or(CliError::MissingArgument {
            field: ARG_INGEST_INPUT,
            env: ENV_INGEST_INPUT,
        })?;
        let mut ingest = IngestConfig::default()
            .with_id_policy(args.id_policy.unwrap_or_default().into());
        if let Some(concurrency) = args.concurrency {
            let concurrency = NonZeroUsize::new(concurrency).ok_or(CliError::InvalidArgument {
                field: ARG_INGEST_CONCURRENCY,
                reason: "must be at least 1",
            })?;
            ingest = ingest.with_concurrency(concurrency);
        }
        Ok(Self {
            input,
            target: Target::new(args.cacert, args.index),
            ingest,
            recreate_index: args.recreate_index,
        })
    }
}

/// Counts printed once the run finishes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct IngestReport {
    pub(crate) read: u64,
    pub(crate) succeeded: u64,
    pub(crate) failed: u64,
    pub(crate) failed_rows: Vec<u64>,
    pub(crate) backend: BulkStats,
}

impl From<&IngestSummary> for IngestReport {
    fn from(summary: &IngestSummary) -> Self {
        let mut failed_rows: Vec<u64> = summary
            .failures
            .iter()
            .map(|failure| failure.source_row_index)
            .collect();
        failed_rows.sort_unstable();
        Self {
            read: summary.read,
            succeeded: summary.succeeded,
            failed: summary.failed,
            failed_rows,
            backend: summary.backend,
        }
    }
}

pub(crate) fn resolve_ingest_config(args: IngestArgs) -> Result<IngestCommandConfig, CliError> {
    let config = args.into_config()?;
    config.validate_sources()?;
    Ok(config)
}

pub(super) async fn run_ingest(
    args: IngestArgs,
    cancel: &CancellationToken,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    let config = resolve_ingest_config(args)?;
    let connection = config.target.connect()?;
    if config.recreate_index {
        IndexAdmin::new(connection.clone(), config.target.index.clone())
            .recreate_index()
            .await
            .map_err(|source| CliError::RecreateIndex {
                index: config.target.index.clone(),
                source,
            })?;
    }
    let rows = TsvRows::open(&config.input)?;
    let sink = Arc::new(HttpBulkSink::new(connection, config.target.index.clone()));
    run_ingest_with(&config, sink, rows, cancel, writer).await
}

/// Ingest `rows` into `sink` and print the resulting counts.
///
/// A cancelled run, or one where the sink rejected rows, still prints what
/// was processed before failing.
pub(crate) async fn run_ingest_with<S, I>(
    config: &IngestCommandConfig,
    sink: Arc<S>,
    rows: I,
    cancel: &CancellationToken,
    writer: &mut dyn Write,
) -> Result<(), CliError>
where
    S: BulkSink + 'static,
    I: IntoIterator<Item = Result<SourceRow, SourceError>>,
{
    let ingestor = BulkIngestor::new(sink, config.ingest);
    match ingestor.ingest(rows, cancel).await {
        Ok(summary) => {
            write_json(writer, &IngestReport::from(&summary))?;
            match summary.backend.rejected {
                0 => Ok(()),
                rejected => Err(CliError::BackendRejected {
                    rejected,
                    read: summary.read,
                }),
            }
        }
        Err(IngestError::Cancelled { summary }) => {
            write_json(writer, &IngestReport::from(summary.as_ref()))?;
            Err(IngestError::Cancelled { summary }.into())
        }
        Err(err) => Err(err.into()),
    }
}
