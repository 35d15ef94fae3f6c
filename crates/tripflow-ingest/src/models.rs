//! Trip record data models

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A trip row exactly as read from the source, every field still a string
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub id: String,
    pub vendor_id: String,
    pub pickup_datetime: String,
    pub dropoff_datetime: String,
    pub passenger_count: String,
    pub pickup_latitude: String,
    pub pickup_longitude: String,
    pub dropoff_latitude: String,
    pub dropoff_longitude: String,
    pub store_and_fwd_flag: String,
    pub trip_duration: String,
}

/// A validated, typed and feature-enriched trip, ready for the store
///
/// Built once by the feature deriver and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanRecord {
    /// Unique key in the store
    pub id: String,
    pub vendor_id: i32,
    /// Local wall-clock pickup time
    pub pickup_datetime: NaiveDateTime,
    pub dropoff_datetime: NaiveDateTime,
    pub passenger_count: i32,
    pub pickup_latitude: f64,
    pub pickup_longitude: f64,
    pub dropoff_latitude: f64,
    pub dropoff_longitude: f64,
    pub store_and_fwd_flag: char,
    pub trip_duration_secs: i64,
    /// Great-circle distance between pickup and dropoff
    pub distance_km: f64,
    pub speed_kmh: f64,
    /// 0-23
    pub hour_of_day: u8,
    /// 0 = Sunday .. 6 = Saturday
    pub day_of_week: u8,
    pub is_weekend: bool,
}

/// Why a row was not turned into a [`CleanRecord`]
///
/// Rejections are ordinary outcomes of bad input, counted and logged but never
/// propagated as failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Rejection {
    #[error("malformed: {0}")]
    Malformed(String),

    #[error("out of bounds: {0}")]
    OutOfBounds(String),

    #[error("outlier: {0}")]
    Outlier(String),

    #[error("duplicate identifier: {0}")]
    Duplicate(String),
}

impl Rejection {
    /// Stable reason code used in logs
    pub fn code(&self) -> &'static str {
        match self {
            Rejection::Malformed(_) => "malformed",
            Rejection::OutOfBounds(_) => "out_of_bounds",
            Rejection::Outlier(_) => "outlier",
            Rejection::Duplicate(_) => "duplicate",
        }
    }
}

/// Counters for one ingestion run
///
/// Every row seen lands in exactly one of `valid_rows`, `invalid` or
/// `duplicates`; `invalid` is further split into `malformed`, `out_of_bounds`
/// and `outliers`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionStats {
    pub rows_seen: u64,
    pub valid_rows: u64,
    pub duplicates: u64,
    pub invalid: u64,
    pub malformed: u64,
    pub out_of_bounds: u64,
    pub outliers: u64,
    pub inserted: u64,
    pub batches_flushed: u64,
    pub failed_batches: u64,
}

impl IngestionStats {
    pub fn record_rejection(&mut self, rejection: &Rejection) {
        match rejection {
            Rejection::Duplicate(_) => {
                self.duplicates += 1;
                return;
            },
            Rejection::Malformed(_) => self.malformed += 1,
            Rejection::OutOfBounds(_) => self.out_of_bounds += 1,
            Rejection::Outlier(_) => self.outliers += 1,
        }
        self.invalid += 1;
    }

    /// True when the counters partition the rows seen exactly
    pub fn is_consistent(&self) -> bool {
        self.rows_seen == self.valid_rows + self.invalid + self.duplicates
            && self.invalid == self.malformed + self.out_of_bounds + self.outliers
            && self.inserted <= self.valid_rows
    }

    /// Accepted records that never reached the store because their batch failed
    pub fn uninserted(&self) -> u64 {
        self.valid_rows.saturating_sub(self.inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_rejection_partitions_counters() {
        let mut stats = IngestionStats::default();
        for rejection in [
            Rejection::Malformed("bad vendor".into()),
            Rejection::OutOfBounds("pickup".into()),
            Rejection::Outlier("speed".into()),
            Rejection::Duplicate("id1".into()),
        ] {
            stats.rows_seen += 1;
            stats.record_rejection(&rejection);
        }

        assert_eq!(stats.invalid, 3);
        assert_eq!(stats.duplicates, 1);
        assert_eq!((stats.malformed, stats.out_of_bounds, stats.outliers), (1, 1, 1));
        assert!(stats.is_consistent());
    }

    #[test]
    fn test_uninserted_gap() {
        let stats = IngestionStats {
            rows_seen: 10,
            valid_rows: 10,
            inserted: 6,
            ..Default::default()
        };
        assert_eq!(stats.uninserted(), 4);
        assert!(stats.is_consistent());
    }

    #[test]
    fn test_rejection_codes() {
        assert_eq!(Rejection::OutOfBounds(String::new()).code(), "out_of_bounds");
        assert_eq!(
            Rejection::Outlier("duration 30s".into()).to_string(),
            "outlier: duration 30s"
        );
    }
}
