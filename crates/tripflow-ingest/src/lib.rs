//! Tripflow Ingest Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Streaming ETL for raw vehicle-trip exports: validate, deduplicate, derive
//! distance/speed/time features and bulk-load clean records into a store.
//!
//! # Pipeline
//!
//! - [`validator`]: structural, geofence, timestamp and plausibility checks
//! - [`dedup`]: run-scoped identifier tracking
//! - [`deriver`] / [`geo`]: derived features
//! - [`pipeline`]: the streaming loop, batching and run modes
//! - [`source`] and [`sink`]: where rows come from and go to
//!
//! # Example
//!
//! ```no_run
//! use tripflow_ingest::config::IngestConfig;
//! use tripflow_ingest::pipeline::StreamingIngestor;
//! use tripflow_ingest::sink::PgSink;
//! use tripflow_ingest::source::CsvTripSource;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = IngestConfig::load()?;
//!     let sink = PgSink::connect(&config.database).await?;
//!     sink.migrate().await?;
//!
//!     let source = CsvTripSource::open("./data/train.csv").await?;
//!     let stats = StreamingIngestor::new(&sink, &config.pipeline)
//!         .run_full(source.into_stream())
//!         .await?;
//!     println!("{} rows stored", stats.inserted);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod dedup;
pub mod deriver;
pub mod geo;
pub mod models;
pub mod pipeline;
pub mod sink;
pub mod source;
pub mod validator;

pub use models::{CleanRecord, IngestionStats, RawRecord, Rejection};
pub use pipeline::{IngestError, IngestFailure, RunMode, StreamingIngestor};
