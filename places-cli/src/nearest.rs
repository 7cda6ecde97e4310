//! Nearest command: recommend the places closest to a point.

use std::io::Write;

use camino::Utf8PathBuf;
use clap::Parser;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use places_core::{CursorPaginator, Location, PlaceRecord, SearchBackend};
use places_data::HttpSearchBackend;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::{
    ARG_CACERT, ARG_INDEX, ARG_NEAREST_COUNT, ARG_NEAREST_LAT, ARG_NEAREST_LON, CliError,
    ENV_NEAREST_LAT, ENV_NEAREST_LON, Target, write_json,
};

pub(crate) const DEFAULT_COUNT: usize = 3;

/// CLI arguments for the `nearest` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Print the places nearest to a latitude/longitude pair, \
                 closest first, using great-circle distance.",
    about = "Recommend places near a point"
)]
#[ortho_config(prefix = "PLACES")]
pub(crate) struct NearestArgs {
    /// Latitude in degrees.
    #[arg(long = ARG_NEAREST_LAT, value_name = "degrees", allow_hyphen_values = true)]
    #[serde(default)]
    pub(crate) lat: Option<f64>,
    /// Longitude in degrees.
    #[arg(long = ARG_NEAREST_LON, value_name = "degrees", allow_hyphen_values = true)]
    #[serde(default)]
    pub(crate) lon: Option<f64>,
    /// Number of places to print.
    #[arg(long = ARG_NEAREST_COUNT, value_name = "count")]
    #[serde(default)]
    pub(crate) count: Option<usize>,
    /// PEM file with the search service's CA certificate.
    #[arg(long = ARG_CACERT, value_name = "path")]
    #[serde(default)]
    pub(crate) cacert: Option<Utf8PathBuf>,
    /// Index to read from.
    #[arg(long = ARG_INDEX, value_name = "name")]
    #[serde(default)]
    pub(crate) index: Option<String>,
}

impl NearestArgs {
    pub(crate) fn into_config(self) -> Result<NearestConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        NearestConfig::try_from(merged)
    }
}

/// Resolved `nearest` command configuration.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct NearestConfig {
    pub(crate) origin: Location,
    pub(crate) count: usize,
    pub(crate) target: Target,
}

impl TryFrom<NearestArgs> for NearestConfig {
    type Error = CliError;

    fn try_from(args: NearestArgs) -> Result<Self, Self::Error> {
        let latitude = args.lat.ok_or(CliError::MissingArgument {
            field: ARG_NEAREST_LAT,
            env: ENV_NEAREST_LAT,
        })?;
        let longitude = args.lon.ok_or(CliError::MissingArgument {
            field: ARG_NEAREST_LON,
            env: ENV_NEAREST_LON,
        })?;
        Ok(Self {
            origin: Location::new(latitude, longitude)?,
            count: args.count.unwrap_or(DEFAULT_COUNT),
            target: Target::new(args.cacert, args.index),
        })
    }
}

/// JSON document printed by `nearest`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct Recommendation {
    pub(crate) name: &'static str,
    pub(crate) places: Vec<PlaceRecord>,
}

pub(super) async fn run_nearest(
    args: NearestArgs,
    cancel: &CancellationToken,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    let config = args.into_config()?;
    let connection = config.target.connect()?;
    let paginator = CursorPaginator::new(HttpSearchBackend::new(
        connection,
        config.target.index.clone(),
    ));
    run_nearest_with(&config, &paginator, cancel, writer).await
}

pub(crate) async fn run_nearest_with<B: SearchBackend>(
    config: &NearestConfig,
    paginator: &CursorPaginator<B>,
    cancel: &CancellationToken,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    let places = paginator
        .nearest_cancellable(config.origin, config.count, cancel)
        .await?;
    write_json(
        writer,
        &Recommendation {
            name: "Recommendation",
            places,
        },
    )
}
