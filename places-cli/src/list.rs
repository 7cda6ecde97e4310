//! List command: print one fixed-size page of the catalogue.

use std::io::Write;

use camino::Utf8PathBuf;
use clap::Parser;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use places_core::{
    CursorPaginator, PageNavigation, PlaceRecord, SearchBackend,
};
use places_data::HttpSearchBackend;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::{ARG_CACERT, ARG_INDEX, ARG_LIST_PAGE, ARG_LIST_PAGE_SIZE, CliError, Target, write_json};

/// Page size used when none is configured.
pub(crate) const DEFAULT_PAGE_SIZE: u64 = 10;

/// CLI arguments for the `list` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Print one page of places in identifier order as JSON, with \
                 links to the first, previous, next and last pages where they \
                 exist.",
    about = "Print a page of places"
)]
#[ortho_config(prefix = "PLACES")]
pub(crate) struct ListArgs {
    /// 1-based page number.
    #[arg(long = ARG_LIST_PAGE, value_name = "number")]
    #[serde(default)]
    pub(crate) page: Option<u64>,
    /// Places per page.
    #[arg(long = ARG_LIST_PAGE_SIZE, value_name = "count")]
    #[serde(default)]
    pub(crate) page_size: Option<u64>,
    /// PEM file with the search service's CA certificate.
    #[arg(long = ARG_CACERT, value_name = "path")]
    #[serde(default)]
    pub(crate) cacert: Option<Utf8PathBuf>,
    /// Index to read from.
    #[arg(long = ARG_INDEX, value_name = "name")]
    #[serde(default)]
    pub(crate) index: Option<String>,
}

impl ListArgs {
    pub(crate) fn into_config(self) -> Result<ListConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        ListConfig::try_from(merged)
    }
}

/// Resolved `list` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ListConfig {
    pub(crate) page: u64,
    pub(crate) page_size: u64,
    pub(crate) target: Target,
}

impl TryFrom<ListArgs> for ListConfig {
    type Error = CliError;

    fn try_from(args: ListArgs) -> Result<Self, Self::Error> {
        let page = args.page.unwrap_or(1);
        if page == 0 {
            return Err(CliError::InvalidArgument {
                field: ARG_LIST_PAGE,
                reason: "pages are numbered from 1",
            });
        }
        let page_size = args.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
        if page_size == 0 {
            return Err(CliError::InvalidArgument {
                field: ARG_LIST_PAGE_SIZE,
                reason: "must be at least 1",
            });
        }
        Ok(Self {
            page,
            page_size,
            target: Target::new(args.cacert, args.index),
        })
    }
}

/// JSON document printed by `list`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct PlacesListing {
    pub(crate) name: &'static str,
    pub(crate) total: u64,
    pub(crate) places: Vec<PlaceRecord>,
    #[serde(flatten)]
    pub(crate) navigation: PageNavigation,
}

pub(super) async fn run_list(
    args: ListArgs,
    cancel: &CancellationToken,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    let config = args.into_config()?;
    let connection = config.target.connect()?;
    let paginator = CursorPaginator::new(HttpSearchBackend::new(
        connection,
        config.target.index.clone(),
    ));
    run_list_with(&config, &paginator, cancel, writer).await
}

/// Fetch the configured page through `paginator` and print it.
pub(crate) async fn run_list_with<B: SearchBackend>(
    config: &ListConfig,
    paginator: &CursorPaginator<B>,
    cancel: &CancellationToken,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    let listing = fetch_listing(config, paginator, cancel).await?;
    write_json(writer, &listing)
}

pub(crate) async fn fetch_listing<B: SearchBackend>(
    config: &ListConfig,
    paginator: &CursorPaginator<B>,
    cancel: &CancellationToken,
) -> Result<PlacesListing, CliError> {
    let offset = PageNavigation::offset(config.page, config.page_size);
    let page = paginator
        .get_places_cancellable(to_i64(config.page_size), to_i64(offset), cancel)
        .await?;
    let navigation = PageNavigation::for_page(config.page, config.page_size, page.total_matched)?;
    Ok(PlacesListing {
        name: "Places",
        total: page.total_matched,
        places: page.records,
        navigation,
    })
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
