//! Test helpers for building source files and reading command output.

use camino::{Utf8Path, Utf8PathBuf};
use serde_json::Value;
use tempfile::TempDir;

const HEADER: &str = "ID\tName\tAddress\tPhone\tLongitude\tLatitude\n";

pub(super) fn write_utf8(path: &Utf8Path, contents: &[u8]) {
    std::fs::write(path, contents).unwrap_or_else(|err| panic!("failed to write {path}: {err}"));
}

pub(super) fn utf8_root(dir: &TempDir) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 workspace")
}

/// A source body with `count` valid rows named `Place 1..=count`.
pub(super) fn source_body(count: usize) -> String {
    let mut body = HEADER.to_owned();
    for row in 1..=count {
        body.push_str(&format!(
            "{}\tPlace {row}\tStreet {row}\t+7 495 000 {row:04}\t37.6\t55.{row:04}\n",
            row - 1
        ));
    }
    body
}

pub(super) fn parse_output(buffer: &[u8]) -> Value {
    serde_json::from_slice(buffer).expect("command output should be JSON")
}
