//! Streaming ingestion pipeline
//!
//! Drives a record source through dedup check → structural validation →
//! feature derivation → batching → sink. Processing is sequential with respect
//! to the source; each batch flush is awaited before the next row is pulled, so
//! at most one batch is buffered and one is in flight.
//!
//! Bad rows are counted, never fatal. A failed batch insert is logged and the
//! run carries on. Only a failing source aborts the run, and the caller still
//! gets the counters accumulated up to that point.

use std::pin::pin;

use futures::{Stream, StreamExt};
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use crate::config::PipelineConfig;
use crate::dedup::Deduplicator;
use crate::deriver::FeatureDeriver;
use crate::models::{CleanRecord, IngestionStats, RawRecord, Rejection};
use crate::sink::{Sink, SinkError};
use crate::source::SourceError;
use crate::validator::RecordValidator;

/// Rows between progress log lines
const HEARTBEAT_ROWS: u64 = 100_000;

/// How much of the source a run consumes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Consume the entire source
    Full,
    /// Stop pulling once this many rows have been accepted
    Sample { target_valid: u64 },
}

impl RunMode {
    fn target_reached(&self, valid_rows: u64) -> bool {
        match self {
            RunMode::Full => false,
            RunMode::Sample { target_valid } => valid_rows >= *target_valid,
        }
    }
}

#[derive(Error, Debug)]
pub enum IngestError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("Failed to clear store before reload: {0}")]
    Clear(#[source] SinkError),
}

/// A run that had to stop, with the progress it made before stopping
#[derive(Error, Debug)]
#[error("Ingestion aborted after {} rows: {error}", .stats.rows_seen)]
pub struct IngestFailure {
    #[source]
    pub error: IngestError,
    pub stats: IngestionStats,
}

/// Entry point for running the pipeline against a sink
pub struct StreamingIngestor<'s, S: Sink + ?Sized> {
    sink: &'s S,
    validator: RecordValidator,
    batch_size: usize,
}

impl<'s, S: Sink + ?Sized> StreamingIngestor<'s, S> {
    pub fn new(sink: &'s S, config: &PipelineConfig) -> Self {
        Self {
            sink,
            validator: RecordValidator::new(config.rules),
            batch_size: config.batch_size,
        }
    }

    /// Consume the whole source in batches of the configured size
    pub async fn run_full<St>(&self, source: St) -> Result<IngestionStats, IngestFailure>
    where
        St: Stream<Item = Result<RawRecord, SourceError>>,
    {
        self.run(source, RunMode::Full, self.batch_size).await
    }

    /// Stop once `target_valid` rows have been accepted
    pub async fn run_sample<St>(
        &self,
        source: St,
        target_valid: u64,
        batch_size: usize,
    ) -> Result<IngestionStats, IngestFailure>
    where
        St: Stream<Item = Result<RawRecord, SourceError>>,
    {
        self.run(source, RunMode::Sample { target_valid }, batch_size)
            .await
    }

    /// Delete every stored record, then run over the whole source
    pub async fn clear_and_reload<St>(&self, source: St) -> Result<IngestionStats, IngestFailure>
    where
        St: Stream<Item = Result<RawRecord, SourceError>>,
    {
        if let Err(e) = self.sink.delete_all().await {
            error!(error = %e, "Failed to clear trip store, reload not started");
            return Err(IngestFailure {
                error: IngestError::Clear(e),
                stats: IngestionStats::default(),
            });
        }
        info!("Cleared trip store");

        self.run_full(source).await
    }

    #[instrument(skip_all, fields(mode = ?mode, batch_size = batch_size))]
    async fn run<St>(
        &self,
        source: St,
        mode: RunMode,
        batch_size: usize,
    ) -> Result<IngestionStats, IngestFailure>
    where
        St: Stream<Item = Result<RawRecord, SourceError>>,
    {
        let batch_size = batch_size.max(1);
        info!("Starting ingestion run");

        let mut run = Run::new(self.sink, &self.validator, batch_size);
        let mut source = pin!(source);

        loop {
            if mode.target_reached(run.stats.valid_rows) {
                debug!(valid_rows = run.stats.valid_rows, "Sample target reached");
                break;
            }

            let raw = match source.next().await {
                Some(Ok(raw)) => raw,
                Some(Err(e)) => {
                    error!(error = %e, rows_seen = run.stats.rows_seen, "Source read failed");
                    run.flush().await;
                    return Err(IngestFailure {
                        error: IngestError::Source(e),
                        stats: run.stats,
                    });
                },
                None => break,
            };

            run.process(raw);

            if run.batch.len() >= batch_size {
                run.flush().await;
            }
        }

        run.flush().await;

        let stats = run.stats;
        info!(
            rows_seen = stats.rows_seen,
            valid = stats.valid_rows,
            duplicates = stats.duplicates,
            invalid = stats.invalid,
            inserted = stats.inserted,
            failed_batches = stats.failed_batches,
            "Ingestion run finished"
        );
        if stats.uninserted() > 0 {
            warn!(
                uninserted = stats.uninserted(),
                "Some accepted rows were not stored"
            );
        }

        Ok(stats)
    }
}

/// Mutable state of a single run; dropped when the run ends
struct Run<'r, S: Sink + ?Sized> {
    sink: &'r S,
    validator: &'r RecordValidator,
    deriver: FeatureDeriver<'r>,
    dedup: Deduplicator,
    stats: IngestionStats,
    batch: Vec<CleanRecord>,
    batch_size: usize,
    batch_number: u64,
}

impl<'r, S: Sink + ?Sized> Run<'r, S> {
    fn new(sink: &'r S, validator: &'r RecordValidator, batch_size: usize) -> Self {
        Self {
            sink,
            validator,
            deriver: FeatureDeriver::new(validator),
            dedup: Deduplicator::new(),
            stats: IngestionStats::default(),
            batch: Vec::with_capacity(batch_size),
            batch_size,
            batch_number: 0,
        }
    }

    fn process(&mut self, raw: RawRecord) {
        self.stats.rows_seen += 1;
        if self.stats.rows_seen % HEARTBEAT_ROWS == 0 {
            info!(
                rows_seen = self.stats.rows_seen,
                valid = self.stats.valid_rows,
                inserted = self.stats.inserted,
                "Ingestion progress"
            );
        }

        match self.admit(&raw) {
            Ok(record) => {
                self.stats.valid_rows += 1;
                self.batch.push(record);
            },
            Err(rejection) => {
                debug!(
                    id = %raw.id,
                    reason = rejection.code(),
                    detail = %rejection,
                    "Rejected row"
                );
                self.stats.record_rejection(&rejection);
            },
        }
    }

    /// Dedup check, validation and derivation; marks the id seen only on success
    fn admit(&mut self, raw: &RawRecord) -> Result<CleanRecord, Rejection> {
        if self.dedup.seen(&raw.id) {
            return Err(Rejection::Duplicate(raw.id.trim().to_string()));
        }

        let trip = self.validator.validate_structure(raw)?;
        let record = self.deriver.derive(trip)?;
        self.dedup.mark_seen(&record.id);

        Ok(record)
    }

    async fn flush(&mut self) {
        if self.batch.is_empty() {
            return;
        }

        let batch = std::mem::replace(&mut self.batch, Vec::with_capacity(self.batch_size));
        self.batch_number += 1;

        match self.sink.bulk_insert(&batch).await {
            Ok(()) => {
                self.stats.inserted += batch.len() as u64;
                self.stats.batches_flushed += 1;
                debug!(
                    batch = self.batch_number,
                    size = batch.len(),
                    inserted = self.stats.inserted,
                    "Batch flushed"
                );
            },
            Err(e) => {
                self.stats.failed_batches += 1;
                error!(
                    batch = self.batch_number,
                    size = batch.len(),
                    error = %e,
                    "Failed to insert batch, continuing"
                );
            },
        }
    }
}
