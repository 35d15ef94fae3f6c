//! Persistent store interface
//!
//! The pipeline only needs three operations from the store: bulk insert,
//! delete everything, and count. Implementations own their own timeout and
//! retry policy; the pipeline never retries a failed batch.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::CleanRecord;

pub use memory::MemorySink;
pub use postgres::PgSink;

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Identifier already stored: {0}")]
    DuplicateKey(String),

    #[error("Sink unavailable: {0}")]
    Unavailable(String),
}

/// Bulk-insert store for clean trip records
#[async_trait]
pub trait Sink: Send + Sync {
    /// Insert a whole batch; on error none of the batch is considered stored
    async fn bulk_insert(&self, batch: &[CleanRecord]) -> Result<(), SinkError>;

    /// Remove every stored record
    async fn delete_all(&self) -> Result<(), SinkError>;

    /// Number of stored records
    async fn count(&self) -> Result<u64, SinkError>;
}
