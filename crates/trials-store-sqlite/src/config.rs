//! Connection settings for [`crate::SqliteStore`].

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tuning knobs for the SQLite backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
  /// Number of connections opened against the database file. In-memory
  /// stores always use exactly one.
  #[serde(default = "default_connections")]
  pub connections: usize,

  /// SQLite busy timeout in milliseconds.
  #[serde(default = "default_busy_timeout_ms")]
  pub busy_timeout_ms: u64,

  /// How many times a write transaction is re-run after `SQLITE_BUSY` or
  /// `SQLITE_LOCKED` before the error is surfaced.
  #[serde(default = "default_max_busy_retries")]
  pub max_busy_retries: u32,
}

fn default_connections() -> usize { 4 }

fn default_busy_timeout_ms() -> u64 { 5000 }

fn default_max_busy_retries() -> u32 { 5 }

impl Default for StoreConfig {
  fn default() -> Self {
    Self {
      connections:      default_connections(),
      busy_timeout_ms:  default_busy_timeout_ms(),
      max_busy_retries: default_max_busy_retries(),
    }
  }
}

impl StoreConfig {
  pub fn busy_timeout(&self) -> Duration { Duration::from_millis(self.busy_timeout_ms) }

  /// Linear backoff between busy retries.
  pub(crate) fn retry_delay(&self, attempt: u32) -> Duration {
    Duration::from_millis(25 * u64::from(attempt))
  }
}
