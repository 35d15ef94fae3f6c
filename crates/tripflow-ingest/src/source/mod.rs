//! Record sources
//!
//! A source is a lazy, finite, single-use stream of raw rows. The pipeline only
//! sees `Stream<Item = Result<RawRecord, SourceError>>`, so a file, a network
//! body or an in-memory vector drive it the same way. An `Err` item means the
//! source itself broke and is fatal for the run; a row with bad content is
//! still an `Ok` item and gets rejected by validation.

pub mod csv;

use futures::stream::{self, Stream};
use thiserror::Error;

use crate::models::RawRecord;

pub use self::csv::CsvTripSource;

/// Failure to obtain further rows from a source
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Failed to read source: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to decode source: {0}")]
    Csv(#[from] csv_async::Error),
}

/// Stream over an in-memory list of rows
pub fn memory_source(
    records: Vec<RawRecord>,
) -> impl Stream<Item = Result<RawRecord, SourceError>> {
    stream::iter(records.into_iter().map(Ok))
}
