//! Focused unit tests covering the list and its page links.

use super::helpers::parse_output;
use super::*;
use crate::list::{DEFAULT_PAGE_SIZE, ListArgs, ListConfig, fetch_listing, run_list_with};
use places_core::test_support::{MemoryIndex, block_on_for_tests, sample_places};
use places_core::{CursorPaginator, NavigationError};
use rstest::{fixture, rstest};
use serde_json::json;

#[fixture]
fn index() -> MemoryIndex {
    MemoryIndex::with_places(sample_places(25))
}

fn config(page: u64) -> ListConfig {
    ListConfig::try_from(ListArgs {
        page: Some(page),
        ..ListArgs::default()
    })
    .expect("config should build")
}

#[rstest]
fn defaults_to_first_page_of_ten() {
    let config = ListConfig::try_from(ListArgs::default()).expect("config should build");
    assert_eq!((config.page, config.page_size), (1, DEFAULT_PAGE_SIZE));
}

#[rstest]
#[case::page(ListArgs { page: Some(0), ..ListArgs::default() }, ARG_LIST_PAGE)]
#[case::page_size(ListArgs { page_size: Some(0), ..ListArgs::default() }, ARG_LIST_PAGE_SIZE)]
fn zero_values_are_rejected(#[case] args: ListArgs, #[case] expected: &'static str) {
    match ListConfig::try_from(args) {
        Err(CliError::InvalidArgument { field, .. }) => assert_eq!(field, expected),
        other => panic!("expected InvalidArgument, found {other:?}"),
    }
}

#[rstest]
#[case::first(1, json!({"next_page": 2, "last_page": 3}))]
#[case::middle(2, json!({"first_page": 1, "prev_page": 1, "next_page": 3, "last_page": 3}))]
#[case::last(3, json!({"first_page": 1, "prev_page": 2}))]
fn prints_page_with_links(
    index: MemoryIndex,
    #[case] page: u64,
    #[case] links: serde_json::Value,
) {
    let paginator = CursorPaginator::new(&index);
    let mut buffer = Vec::new();
    block_on_for_tests(run_list_with(
        &config(page),
        &paginator,
        &CancellationToken::new(),
        &mut buffer,
    ))
    .expect("list succeeds");

    let output = parse_output(&buffer);
    assert_eq!(output["name"], "Places");
    assert_eq!(output["total"], 25);
    for key in ["first_page", "prev_page", "next_page", "last_page"] {
        assert_eq!(output.get(key), links.get(key), "link {key}");
    }
    let first = (page - 1) * 10 + 1;
    assert_eq!(output["places"][0]["name"], format!("Place {first}"));
}

#[rstest]
fn last_page_holds_the_remainder(index: MemoryIndex) {
    let paginator = CursorPaginator::new(&index);
    let listing = block_on_for_tests(fetch_listing(
        &config(3),
        &paginator,
        &CancellationToken::new(),
    ))
    .expect("list succeeds");
    assert_eq!(listing.places.len(), 5);
}

#[rstest]
fn page_past_the_end_is_rejected(index: MemoryIndex) {
    let paginator = CursorPaginator::new(&index);
    let err = block_on_for_tests(fetch_listing(
        &config(4),
        &paginator,
        &CancellationToken::new(),
    ))
    .expect_err("page 4 of 3");
    assert!(matches!(
        err,
        CliError::Navigation(NavigationError::PageOutOfRange {
            page: 4,
            total_pages: 3
        })
    ));
}
