//! trials-ingest binary.
//!
//! Reads `config.toml` (or the path given with `--config`), opens the SQLite
//! trial store, and upserts every record of a JSON-lines file.
//!
//! ```
//! trials-ingest --input trials.jsonl
//! TRIALS_WORKERS=8 trials-ingest --config ingest.toml --input trials.jsonl
//! ```

use std::path::PathBuf;

use anyhow::Context as _;
use clap::Parser;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use trials_ingest::{IngestConfig, expand_tilde, ingest, load_records};
use trials_store_sqlite::SqliteStore;

#[derive(Parser)]
#[command(author, version, about = "Load clinical-trial records into a SQLite store")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// JSON-lines file with one trial record per line.
  #[arg(short, long)]
  input: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Nested keys use a double underscore, e.g. TRIALS_STORE__CONNECTIONS.
  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(
      config::Environment::with_prefix("TRIALS")
        .prefix_separator("_")
        .separator("__"),
    )
    .build()
    .context("failed to read config file")?;

  let cfg: IngestConfig = settings
    .try_deserialize()
    .context("failed to deserialise IngestConfig")?;

  let store_path = expand_tilde(&cfg.store_path);
  let store = SqliteStore::with_config(&store_path, cfg.store.clone())
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  let records = load_records(&cli.input)?;
  tracing::info!(records = records.len(), input = %cli.input.display(), "ingesting");

  let report = ingest(store, records, cfg.workers).await;
  tracing::info!("ingest finished: {report}");

  if report.failed > 0 {
    anyhow::bail!("{} of {} records failed", report.failed, report.total());
  }
  Ok(())
}
