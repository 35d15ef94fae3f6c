//! Configuration management

use serde::{Deserialize, Serialize};
use tripflow_common::{Result, TripflowError};

use crate::validator::ValidationRules;

// ============================================================================
// Configuration Constants
// ============================================================================

/// Default database URL for local development.
pub const DEFAULT_DATABASE_URL: &str = "postgresql://localhost/tripflow";

/// Default maximum database connections in the pool.
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 5;

/// Default database connection timeout in seconds.
pub const DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default batch size for full runs.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Default batch size for sampled runs.
pub const DEFAULT_SAMPLE_BATCH_SIZE: usize = 500;

/// Default number of valid rows a sampled run accepts.
pub const DEFAULT_SAMPLE_SIZE: usize = 10_000;

/// Ingestion configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestConfig {
    pub database: DatabaseConfig,
    pub pipeline: PipelineConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub connect_timeout_secs: u64,
}

/// Pipeline tuning and validation rules
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub batch_size: usize,
    pub sample_batch_size: usize,
    pub sample_size: usize,
    pub rules: ValidationRules,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: DEFAULT_DATABASE_MAX_CONNECTIONS,
            connect_timeout_secs: DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            sample_batch_size: DEFAULT_SAMPLE_BATCH_SIZE,
            sample_size: DEFAULT_SAMPLE_SIZE,
            rules: ValidationRules::default(),
        }
    }
}

impl IngestConfig {
    /// Load configuration from `.env`, environment and defaults
    ///
    /// Environment variables:
    /// - `DATABASE_URL`, `DATABASE_MAX_CONNECTIONS`, `DATABASE_CONNECT_TIMEOUT`
    /// - `TRIPFLOW_BATCH_SIZE`, `TRIPFLOW_SAMPLE_BATCH_SIZE`, `TRIPFLOW_SAMPLE_SIZE`
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = IngestConfig {
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL")
                    .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
                max_connections: env_parse(
                    "DATABASE_MAX_CONNECTIONS",
                    DEFAULT_DATABASE_MAX_CONNECTIONS,
                )?,
                connect_timeout_secs: env_parse(
                    "DATABASE_CONNECT_TIMEOUT",
                    DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
                )?,
            },
            pipeline: PipelineConfig {
                batch_size: env_parse("TRIPFLOW_BATCH_SIZE", DEFAULT_BATCH_SIZE)?,
                sample_batch_size: env_parse(
                    "TRIPFLOW_SAMPLE_BATCH_SIZE",
                    DEFAULT_SAMPLE_BATCH_SIZE,
                )?,
                sample_size: env_parse("TRIPFLOW_SAMPLE_SIZE", DEFAULT_SAMPLE_SIZE)?,
                rules: ValidationRules::default(),
            },
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.database.url.is_empty() {
            return Err(TripflowError::config("DATABASE_URL", "cannot be empty"));
        }
        if self.database.max_connections == 0 {
            return Err(TripflowError::config(
                "DATABASE_MAX_CONNECTIONS",
                "must be greater than 0",
            ));
        }
        if self.pipeline.batch_size == 0 {
            return Err(TripflowError::config("TRIPFLOW_BATCH_SIZE", "must be greater than 0"));
        }
        if self.pipeline.sample_batch_size == 0 {
            return Err(TripflowError::config(
                "TRIPFLOW_SAMPLE_BATCH_SIZE",
                "must be greater than 0",
            ));
        }
        if !self.pipeline.rules.geofence.is_well_formed() {
            return Err(TripflowError::Config(
                "geofence minimum must be below maximum".to_string(),
            ));
        }
        let limits = &self.pipeline.rules.limits;
        if limits.min_duration_secs > limits.max_duration_secs
            || limits.min_distance_km > limits.max_distance_km
            || limits.min_speed_kmh > limits.max_speed_kmh
        {
            return Err(TripflowError::Config(
                "plausibility limits have min above max".to_string(),
            ));
        }

        Ok(())
    }
}

/// Read and parse an environment variable, falling back to a default when unset
fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|e| TripflowError::config(key, format!("invalid value {:?}: {}", value, e))),
        Err(_) => Ok(default),
    }
}
