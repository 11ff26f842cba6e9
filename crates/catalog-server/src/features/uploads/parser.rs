//! CSV row parser
//!
//! Turns an uploaded file into a lazy sequence of [`ProductRecord`]s. The
//! first line is a header and is discarded. Column order is positional:
//!
//! | column | field       |
//! |--------|-------------|
//! | 0      | Name        |
//! | 1      | SKU         |
//! | 2      | Description |
//!
//! Rows with fewer than three fields are skipped. Extra trailing fields are
//! ignored.

use std::borrow::Cow;

use catalog_common::types::ProductRecord;
use csv::{ReaderBuilder, StringRecord, StringRecordsIntoIter};

/// Minimum number of fields for a row to be accepted
pub const MIN_FIELDS: usize = 3;

const NAME_COLUMN: usize = 0;
const SKU_COLUMN: usize = 1;
const DESCRIPTION_COLUMN: usize = 2;

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Malformed CSV near line {line}: {message}")]
    Malformed { line: u64, message: String },
}

impl From<csv::Error> for ParseError {
    fn from(err: csv::Error) -> Self {
        let line = err.position().map(|p| p.line()).unwrap_or(0);
        Self::Malformed {
            line,
            message: err.to_string(),
        }
    }
}

/// Decode raw upload bytes. Invalid UTF-8 sequences become U+FFFD instead of
/// failing the upload.
pub fn decode(bytes: &[u8]) -> Cow<'_, str> {
    String::from_utf8_lossy(bytes)
}

fn reader(text: &str) -> csv::Reader<&[u8]> {
    ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes())
}

/// Count the rows [`rows`] would yield, without materializing them
pub fn count_rows(text: &str) -> Result<usize, ParseError> {
    let mut reader = reader(text);
    let mut record = StringRecord::new();
    let mut count = 0;

    while reader.read_record(&mut record)? {
        if record.len() >= MIN_FIELDS {
            count += 1;
        }
    }

    Ok(count)
}

/// Lazily parse product rows from decoded CSV text
pub fn rows(text: &str) -> Rows<'_> {
    Rows {
        inner: reader(text).into_records(),
    }
}

/// Iterator over parsed product rows
pub struct Rows<'a> {
    inner: StringRecordsIntoIter<&'a [u8]>,
}

impl Iterator for Rows<'_> {
    type Item = Result<ProductRecord, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.inner.next()? {
                Ok(record) if record.len() < MIN_FIELDS => {
                    tracing::trace!(fields = record.len(), "Skipping short row");
                }
                Ok(record) => return Some(Ok(to_product(&record))),
                Err(err) => return Some(Err(err.into())),
            }
        }
    }
}

fn to_product(record: &StringRecord) -> ProductRecord {
    let field = |idx| record.get(idx).unwrap_or_default();
    ProductRecord::new(
        field(SKU_COLUMN),
        field(NAME_COLUMN),
        field(DESCRIPTION_COLUMN),
    )
}
