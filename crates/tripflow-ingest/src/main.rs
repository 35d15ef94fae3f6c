//! Tripflow Ingest - trip record loader

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::info;
use tripflow_common::logging::{init_logging, LogConfig, LogLevel};
use tripflow_ingest::config::IngestConfig;
use tripflow_ingest::pipeline::{IngestFailure, StreamingIngestor};
use tripflow_ingest::sink::{PgSink, Sink};
use tripflow_ingest::source::CsvTripSource;
use tripflow_ingest::IngestionStats;

#[derive(Parser, Debug)]
#[command(name = "tripflow-ingest")]
#[command(author, version, about = "Load raw trip exports into the trip store")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output (per-row rejection reasons)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print run statistics as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Database URL (overrides configuration)
    #[arg(long, env = "DATABASE_URL", global = true, hide_env_values = true)]
    database_url: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ingest a whole CSV export
    Full {
        /// CSV file to read
        file: PathBuf,

        /// Rows per insert batch
        #[arg(short, long)]
        batch_size: Option<usize>,
    },

    /// Ingest until a number of valid rows have been accepted
    Sample {
        /// CSV file to read
        file: PathBuf,

        /// Valid rows to accept before stopping
        #[arg(short, long)]
        target: Option<u64>,

        /// Rows per insert batch
        #[arg(short, long)]
        batch_size: Option<usize>,
    },

    /// Delete all stored trips, then ingest a whole CSV export
    Reload {
        /// CSV file to read
        file: PathBuf,

        /// Rows per insert batch
        #[arg(short, long)]
        batch_size: Option<usize>,
    },

    /// Print the number of stored trips
    Count,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Environment settings win over the binary's defaults, --verbose over both.
    let mut log_config = LogConfig::from_env().unwrap_or_default();
    if std::env::var("LOG_FILE_PREFIX").is_err() {
        log_config = log_config.with_file_prefix("tripflow-ingest");
    }
    if cli.verbose {
        log_config = log_config.with_level(LogLevel::Debug);
    }
    init_logging(&log_config)?;

    let mut config = IngestConfig::load().context("Failed to load configuration")?;
    if let Some(url) = cli.database_url {
        config.database.url = url;
    }

    let sink = PgSink::connect(&config.database)
        .await
        .context("Failed to connect to trip store")?;
    sink.migrate().await.context("Failed to apply migrations")?;

    let outcome = match cli.command {
        Command::Full { file, batch_size } => {
            if let Some(size) = batch_size {
                config.pipeline.batch_size = size;
            }
            config.validate()?;
            let source = open_source(&file).await?;
            info!(file = %file.display(), "Full ingestion");
            StreamingIngestor::new(&sink, &config.pipeline)
                .run_full(source.into_stream())
                .await
        },
        Command::Sample {
            file,
            target,
            batch_size,
        } => {
            if let Some(size) = batch_size {
                config.pipeline.sample_batch_size = size;
            }
            config.validate()?;
            let target = target.unwrap_or(config.pipeline.sample_size as u64);
            let source = open_source(&file).await?;
            info!(file = %file.display(), target_valid = target, "Sampled ingestion");
            StreamingIngestor::new(&sink, &config.pipeline)
                .run_sample(
                    source.into_stream(),
                    target,
                    config.pipeline.sample_batch_size,
                )
                .await
        },
        Command::Reload { file, batch_size } => {
            if let Some(size) = batch_size {
                config.pipeline.batch_size = size;
            }
            config.validate()?;
            let source = open_source(&file).await?;
            info!(file = %file.display(), "Clear and reload");
            StreamingIngestor::new(&sink, &config.pipeline)
                .clear_and_reload(source.into_stream())
                .await
        },
        Command::Count => {
            let count = sink.count().await?;
            if cli.json {
                println!("{}", serde_json::json!({ "count": count }));
            } else {
                println!("{} {}", count.to_string().bold(), "trips stored".dimmed());
            }
            return Ok(());
        },
    };

    match outcome {
        Ok(stats) => {
            report(&stats, cli.json)?;
            Ok(())
        },
        Err(IngestFailure { error, stats }) => {
            report(&stats, cli.json)?;
            Err(anyhow::Error::new(error).context("Ingestion aborted"))
        },
    }
}

async fn open_source(file: &Path) -> Result<CsvTripSource<tokio::fs::File>> {
    CsvTripSource::open(file)
        .await
        .with_context(|| format!("Failed to open {}", file.display()))
}

fn report(stats: &IngestionStats, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(stats)?);
        return Ok(());
    }

    println!("{}", "Ingestion summary".bold());
    println!("  {:<16} {}", "rows seen", stats.rows_seen);
    println!("  {:<16} {}", "valid", stats.valid_rows.to_string().green());
    println!("  {:<16} {}", "duplicates", stats.duplicates.to_string().yellow());
    println!(
        "  {:<16} {} {}",
        "invalid",
        stats.invalid.to_string().yellow(),
        format!(
            "(malformed {}, out of bounds {}, outliers {})",
            stats.malformed, stats.out_of_bounds, stats.outliers
        )
        .dimmed()
    );
    println!("  {:<16} {}", "inserted", stats.inserted.to_string().cyan());

    if stats.failed_batches > 0 {
        println!(
            "{} {} batches failed, {} accepted rows not stored",
            "!".red(),
            stats.failed_batches,
            stats.uninserted()
        );
    } else {
        println!("{} {} batches stored", "✓".green(), stats.batches_flushed);
    }

    Ok(())
}
