//! CSV trip export reader
//!
//! Columns are located by header name, so column order does not matter and
//! extra columns are ignored:
//!
//! ```text
//! id,vendor_id,pickup_datetime,dropoff_datetime,passenger_count,pickup_longitude,
//! pickup_latitude,dropoff_longitude,dropoff_latitude,store_and_fwd_flag,trip_duration
//! ```
//!
//! A missing column leaves the field empty, which validation rejects as
//! malformed. Rows that cannot be decoded are handed on as empty records for
//! the same reason. Only IO failures end the stream with an error.

use std::path::Path;

use csv_async::{AsyncReader, AsyncReaderBuilder, ErrorKind, StringRecord, Trim};
use futures::{Stream, StreamExt};
use tokio::io::AsyncRead;
use tracing::{debug, warn};

use super::SourceError;
use crate::models::RawRecord;

/// Header names understood by the reader
pub const EXPECTED_COLUMNS: [&str; 11] = [
    "id",
    "vendor_id",
    "pickup_datetime",
    "dropoff_datetime",
    "passenger_count",
    "pickup_longitude",
    "pickup_latitude",
    "dropoff_longitude",
    "dropoff_latitude",
    "store_and_fwd_flag",
    "trip_duration",
];

/// Position of each known column in the file, if present
#[derive(Debug, Clone, Copy, Default)]
struct ColumnMap {
    positions: [Option<usize>; EXPECTED_COLUMNS.len()],
}

impl ColumnMap {
    fn from_headers(headers: &StringRecord) -> Self {
        let mut positions = [None; EXPECTED_COLUMNS.len()];
        for (slot, name) in positions.iter_mut().zip(EXPECTED_COLUMNS) {
            *slot = headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name));
        }
        Self { positions }
    }

    fn missing(&self) -> Vec<&'static str> {
        EXPECTED_COLUMNS
            .iter()
            .zip(self.positions)
            .filter(|(_, pos)| pos.is_none())
            .map(|(name, _)| *name)
            .collect()
    }

    fn field(&self, row: &StringRecord, column: usize) -> String {
        self.positions[column]
            .and_then(|pos| row.get(pos))
            .unwrap_or_default()
            .to_string()
    }

    fn to_raw(self, row: &StringRecord) -> RawRecord {
        RawRecord {
            id: self.field(row, 0),
            vendor_id: self.field(row, 1),
            pickup_datetime: self.field(row, 2),
            dropoff_datetime: self.field(row, 3),
            passenger_count: self.field(row, 4),
            pickup_longitude: self.field(row, 5),
            pickup_latitude: self.field(row, 6),
            dropoff_longitude: self.field(row, 7),
            dropoff_latitude: self.field(row, 8),
            store_and_fwd_flag: self.field(row, 9),
            trip_duration: self.field(row, 10),
        }
    }
}

/// Streaming reader over a headered CSV trip export
pub struct CsvTripSource<R> {
    reader: AsyncReader<R>,
    columns: ColumnMap,
}

impl CsvTripSource<tokio::fs::File> {
    /// Open a CSV file and read its header row
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let file = tokio::fs::File::open(path).await?;
        debug!(path = %path.display(), "Opened trip source");
        Self::from_reader(file).await
    }
}

impl<R> CsvTripSource<R>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    pub async fn from_reader(reader: R) -> Result<Self, SourceError> {
        let mut reader = AsyncReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(Trim::All)
            .create_reader(reader);

        let columns = ColumnMap::from_headers(reader.headers().await?);
        let missing = columns.missing();
        if !missing.is_empty() {
            warn!(
                missing = ?missing,
                "Trip source lacks expected columns; affected rows will be rejected"
            );
        }

        Ok(Self { reader, columns })
    }

    /// Consume the source as a stream of raw rows
    pub fn into_stream(self) -> impl Stream<Item = Result<RawRecord, SourceError>> {
        let columns = self.columns;
        self.reader.into_records().map(move |row| match row {
            Ok(row) => Ok(columns.to_raw(&row)),
            Err(err) if matches!(err.kind(), ErrorKind::Io(_)) => Err(SourceError::Csv(err)),
            Err(err) => {
                debug!(error = %err, "Undecodable row");
                Ok(RawRecord::default())
            },
        })
    }
}
