//! Batch ingestion of trial records into any [`TrialStore`].
//!
//! Records arrive as JSON lines, one [`TrialRecord`] per line. Parsing a
//! registry feed into that shape happens upstream.

use std::{
  fmt,
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use serde::Deserialize;
use tokio::{sync::Semaphore, task::JoinSet};
use tracing::warn;
use trials_core::{store::TrialStore, trial::TrialRecord};
use trials_store_sqlite::StoreConfig;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime configuration, deserialised from `config.toml` and `TRIALS_*`
/// environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct IngestConfig {
  pub store_path: PathBuf,
  /// Upper bound on upserts in flight at once.
  #[serde(default = "default_workers")]
  pub workers:    usize,
  #[serde(default)]
  pub store:      StoreConfig,
}

fn default_workers() -> usize { 4 }

// ─── Input ────────────────────────────────────────────────────────────────────

/// Parse a JSON-lines file of trial records. Blank lines are ignored.
pub fn load_records(path: &Path) -> anyhow::Result<Vec<TrialRecord>> {
  let text = std::fs::read_to_string(path)
    .with_context(|| format!("failed to read {}", path.display()))?;
  parse_records(&text)
}

fn parse_records(text: &str) -> anyhow::Result<Vec<TrialRecord>> {
  text
    .lines()
    .enumerate()
    .filter(|(_, line)| !line.trim().is_empty())
    .map(|(n, line)| {
      serde_json::from_str(line).with_context(|| format!("invalid trial record on line {}", n + 1))
    })
    .collect()
}

// ─── Runner ───────────────────────────────────────────────────────────────────

/// Tally of one ingest run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
  pub created: usize,
  pub updated: usize,
  pub failed:  usize,
}

impl IngestReport {
  pub fn total(&self) -> usize { self.created + self.updated + self.failed }
}

impl fmt::Display for IngestReport {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "{} created, {} updated, {} failed",
      self.created, self.updated, self.failed
    )
  }
}

/// Upsert every record, at most `workers` at a time.
///
/// A failing record is logged and counted; it never stops the run.
pub async fn ingest<S>(
  store: S,
  records: impl IntoIterator<Item = TrialRecord>,
  workers: usize,
) -> IngestReport
where
  S: TrialStore + Clone + 'static,
{
  let permits = Arc::new(Semaphore::new(workers.max(1)));
  let mut tasks = JoinSet::new();

  for record in records {
    let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
      break;
    };
    let store = store.clone();
    tasks.spawn(async move {
      let _permit = permit;
      let nct_id = record.nct_id.clone();
      (nct_id, store.upsert_trial(record).await)
    });
  }

  let mut report = IngestReport::default();
  while let Some(joined) = tasks.join_next().await {
    match joined {
      Ok((_, Ok(outcome))) if outcome.was_created => report.created += 1,
      Ok((_, Ok(_))) => report.updated += 1,
      Ok((nct_id, Err(e))) => {
        warn!(nct_id, error = %e, "failed to ingest trial");
        report.failed += 1;
      }
      Err(e) => {
        warn!(error = %e, "ingest task aborted");
        report.failed += 1;
      }
    }
  }
  report
}

/// Expand a leading `~/` to `$HOME`.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
