//! PostgreSQL sink
//!
//! Writes each batch in its own transaction, split into multi-row `INSERT`s
//! small enough for the bind-parameter limit, so a batch is stored completely
//! or not at all. The `trips` table is created by the embedded migrations in
//! `migrations/`.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::{debug, info};

use super::{Sink, SinkError};
use crate::config::DatabaseConfig;
use crate::models::CleanRecord;

const INSERT_PREFIX: &str = "INSERT INTO trips (\
    id, vendor_id, pickup_datetime, dropoff_datetime, passenger_count, \
    pickup_latitude, pickup_longitude, dropoff_latitude, dropoff_longitude, \
    store_and_fwd_flag, trip_duration_secs, distance_km, speed_kmh, \
    hour_of_day, day_of_week, is_weekend) ";

/// Bound parameters per inserted row
const COLUMNS_PER_ROW: usize = 16;

/// Rows per `INSERT` statement, keeping binds under the protocol's u16 limit
const MAX_ROWS_PER_INSERT: usize = u16::MAX as usize / COLUMNS_PER_ROW;

/// Sink backed by a Postgres connection pool
#[derive(Debug, Clone)]
pub struct PgSink {
    pool: PgPool,
}

impl PgSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect a pool sized and timed out according to the configuration
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, SinkError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .connect(&config.url)
            .await?;

        info!(max_connections = config.max_connections, "Connected to trip store");
        Ok(Self { pool })
    }

    /// Apply pending schema migrations
    pub async fn migrate(&self) -> Result<(), SinkError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Load one stored record by identifier
    pub async fn fetch(&self, id: &str) -> Result<Option<CleanRecord>, SinkError> {
        let row = sqlx::query_as::<_, TripRow>("SELECT * FROM trips WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(CleanRecord::from))
    }
}

#[async_trait]
impl Sink for PgSink {
    async fn bulk_insert(&self, batch: &[CleanRecord]) -> Result<(), SinkError> {
        if batch.is_empty() {
            return Ok(());
        }

        // One transaction per batch, however many statements it takes
        let mut tx = self.pool.begin().await?;
        let mut rows_affected = 0;

        for chunk in batch.chunks(MAX_ROWS_PER_INSERT) {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(INSERT_PREFIX);
            builder.push_values(chunk, |mut row, record| {
                row.push_bind(record.id.clone())
                    .push_bind(record.vendor_id)
                    .push_bind(record.pickup_datetime)
                    .push_bind(record.dropoff_datetime)
                    .push_bind(record.passenger_count)
                    .push_bind(record.pickup_latitude)
                    .push_bind(record.pickup_longitude)
                    .push_bind(record.dropoff_latitude)
                    .push_bind(record.dropoff_longitude)
                    .push_bind(record.store_and_fwd_flag.to_string())
                    .push_bind(record.trip_duration_secs)
                    .push_bind(record.distance_km)
                    .push_bind(record.speed_kmh)
                    .push_bind(i16::from(record.hour_of_day))
                    .push_bind(i16::from(record.day_of_week))
                    .push_bind(record.is_weekend);
            });

            rows_affected += builder.build().execute(&mut *tx).await?.rows_affected();
        }

        tx.commit().await?;
        debug!(rows = rows_affected, "Inserted trip batch");

        Ok(())
    }

    async fn delete_all(&self) -> Result<(), SinkError> {
        let result = sqlx::query("DELETE FROM trips").execute(&self.pool).await?;
        info!(rows = result.rows_affected(), "Deleted stored trips");
        Ok(())
    }

    async fn count(&self) -> Result<u64, SinkError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM trips")
            .fetch_one(&self.pool)
            .await?;
        Ok(u64::try_from(count).unwrap_or_default())
    }
}

// Helper struct for sqlx query_as
#[derive(Debug, sqlx::FromRow)]
struct TripRow {
    id: String,
    vendor_id: i32,
    pickup_datetime: NaiveDateTime,
    dropoff_datetime: NaiveDateTime,
    passenger_count: i32,
    pickup_latitude: f64,
    pickup_longitude: f64,
    dropoff_latitude: f64,
    dropoff_longitude: f64,
    store_and_fwd_flag: String,
    trip_duration_secs: i64,
    distance_km: f64,
    speed_kmh: f64,
    hour_of_day: i16,
    day_of_week: i16,
    is_weekend: bool,
}

impl From<TripRow> for CleanRecord {
    fn from(row: TripRow) -> Self {
        Self {
            id: row.id,
            vendor_id: row.vendor_id,
            pickup_datetime: row.pickup_datetime,
            dropoff_datetime: row.dropoff_datetime,
            passenger_count: row.passenger_count,
            pickup_latitude: row.pickup_latitude,
            pickup_longitude: row.pickup_longitude,
            dropoff_latitude: row.dropoff_latitude,
            dropoff_longitude: row.dropoff_longitude,
            store_and_fwd_flag: row.store_and_fwd_flag.chars().next().unwrap_or(' '),
            trip_duration_secs: row.trip_duration_secs,
            distance_km: row.distance_km,
            speed_kmh: row.speed_kmh,
            // CHECK constraints keep both columns inside u8 range
            hour_of_day: u8::try_from(row.hour_of_day).unwrap_or_default(),
            day_of_week: u8::try_from(row.day_of_week).unwrap_or_default(),
            is_weekend: row.is_weekend,
        }
    }
}
