//! Error type for `trials-store-sqlite`.

use rusqlite::ErrorCode;
use thiserror::Error;
use trials_core::{ErrorKind, entity::EntityKey};

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Core(#[from] trials_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("sqlite error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("trial not found: {0}")]
  TrialNotFound(String),

  /// Entity creation kept colliding with concurrent writers.
  #[error("upsert of trial {nct_id} failed: {source}")]
  Upsert {
    nct_id: String,
    #[source]
    source: Box<Error>,
  },

  #[error("could not resolve {key} after {attempts} attempts")]
  ResolveConflict { key: EntityKey, attempts: u32 },
}

impl Error {
  pub fn kind(&self) -> ErrorKind {
    match self {
      Self::Core(e) => e.kind(),
      Self::Upsert { source, .. } => source.kind(),
      Self::TrialNotFound(_) => ErrorKind::NotFound,
      Self::ResolveConflict { .. } => ErrorKind::Conflict,
      _ => ErrorKind::Storage,
    }
  }

  /// Attach the `nct_id` of the trial whose upsert failed.
  pub(crate) fn for_trial(self, nct_id: &str) -> Self {
    Self::Upsert { nct_id: nct_id.to_owned(), source: Box::new(self) }
  }

  /// Lock contention that a fresh transaction may get past.
  pub(crate) fn is_busy(&self) -> bool {
    let sqlite = match self {
      Self::Sqlite(e) | Self::Database(tokio_rusqlite::Error::Rusqlite(e)) => e,
      _ => return false,
    };
    matches!(
      sqlite.sqlite_error_code(),
      Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
    )
  }
}

/// `true` if `e` is a UNIQUE / PRIMARY KEY violation.
pub(crate) fn is_unique_violation(e: &rusqlite::Error) -> bool {
  match e {
    rusqlite::Error::SqliteFailure(err, _) => {
      err.code == ErrorCode::ConstraintViolation
        && matches!(
          err.extended_code,
          rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
            | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
        )
    }
    _ => false,
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
