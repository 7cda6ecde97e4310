//! Tab-separated place rows.
//!
//! The first record is a header and is always skipped, even when it is not
//! valid UTF-8. Fields follow the usual quoting rules: a quoted field may hold
//! tabs, newlines and doubled quotes. Leading whitespace is trimmed from every
//! field and rows may have any number of fields. Blank rows are ignored. Data
//! rows are numbered from 1 in file order.

use std::io::{self, Read};

use camino::{Utf8Path, Utf8PathBuf};
use csv::{ByteRecord, ReaderBuilder, StringRecord};
use thiserror::Error;

use crate::fs::open_utf8_file;

/// One raw data row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRow {
    /// 1-based data row number.
    pub index: u64,
    /// Field values in column order.
    pub fields: Vec<String>,
}

impl SourceRow {
    /// Field at `column`, if present.
    #[must_use]
    pub fn field(&self, column: usize) -> Option<&str> {
        self.fields.get(column).map(String::as_str)
    }
}

/// Failure reading the source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The file could not be opened.
    #[error("failed to open source file {path}: {source}")]
    Open {
        /// File path.
        path: Utf8PathBuf,
        /// I/O failure.
        #[source]
        source: io::Error,
    },
    /// The header record could not be read.
    #[error("failed to read header: {source}")]
    Header {
        /// Reader failure.
        #[source]
        source: csv::Error,
    },
    /// A data record could not be read. Reading stops after this error.
    #[error("failed to read row {index}: {source}")]
    Read {
        /// 1-based data row number of the unreadable record.
        index: u64,
        /// Reader failure.
        #[source]
        source: csv::Error,
    },
    /// A data record is not valid UTF-8.
    #[error("row {index} is not valid UTF-8: {source}")]
    Encoding {
        /// 1-based data row number.
        index: u64,
        /// Conversion failure.
        #[source]
        source: csv::FromUtf8Error,
    },
}

impl SourceError {
    /// Data row the failure belongs to, if any.
    #[must_use]
    pub const fn row_index(&self) -> Option<u64> {
        match self {
            Self::Read { index, .. } | Self::Encoding { index, .. } => Some(*index),
            Self::Open { .. } | Self::Header { .. } => None,
        }
    }
}

/// Iterator over the data rows of a tab-separated source.
#[derive(Debug)]
pub struct TsvRows<R> {
    reader: csv::Reader<R>,
    header_skipped: bool,
    finished: bool,
    next_index: u64,
}

impl TsvRows<cap_std::fs_utf8::File> {
    /// Open the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Open`] when the file cannot be opened.
    pub fn open(path: &Utf8Path) -> Result<Self, SourceError> {
        let file = open_utf8_file(path).map_err(|source| SourceError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::new(file))
    }
}

impl<R: Read> TsvRows<R> {
    /// Read rows from `reader`.
    pub fn new(reader: R) -> Self {
        let reader = ReaderBuilder::new()
            .delimiter(b'\t')
            .flexible(true)
            .has_headers(false)
            .from_reader(reader);
        Self {
            reader,
            header_skipped: false,
            finished: false,
            next_index: 1,
        }
    }

    fn read_record(&mut self) -> Option<Result<ByteRecord, csv::Error>> {
        let mut record = ByteRecord::new();
        match self.reader.read_byte_record(&mut record) {
            Ok(true) => Some(Ok(record)),
            Ok(false) => None,
            Err(err) => Some(Err(err)),
        }
    }
}

fn is_blank(record: &StringRecord) -> bool {
    record.iter().all(|field| field.trim().is_empty())
}

fn into_fields(record: &StringRecord) -> Vec<String> {
    record
        .iter()
        .map(|field| field.trim_start().to_owned())
        .collect()
}

impl<R: Read> Iterator for TsvRows<R> {
    type Item = Result<SourceRow, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.finished {
            let Some(read) = self.read_record() else {
                self.finished = true;
                return None;
            };
            if !self.header_skipped {
                self.header_skipped = true;
                if let Err(source) = read {
                    self.finished = true;
                    return Some(Err(SourceError::Header { source }));
                }
                continue;
            }
            let index = self.next_index;
            let record = match read {
                Ok(record) => StringRecord::from_byte_record(record),
                Err(source) => {
                    self.finished = true;
                    return Some(Err(SourceError::Read { index, source }));
                }
            };
            match record {
                Ok(record) if is_blank(&record) => {}
                Ok(record) => {
                    self.next_index += 1;
                    return Some(Ok(SourceRow {
                        index,
                        fields: into_fields(&record),
                    }));
                }
                Err(source) => {
                    self.next_index += 1;
                    return Some(Err(SourceError::Encoding { index, source }));
                }
            }
        }
        None
    }
}
