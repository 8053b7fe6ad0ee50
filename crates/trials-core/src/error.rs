//! Error types for `trials-core`.

use thiserror::Error;

use crate::entity::EntityKind;

#[derive(Debug, Error)]
pub enum Error {
  #[error("nct_id is missing or empty")]
  MissingNctId,

  #[error("malformed nct_id {0:?}: expected 1-20 ASCII letters or digits")]
  MalformedNctId(String),

  #[error("{kind} name {raw:?} is empty after normalization")]
  EmptyEntityName { kind: EntityKind, raw: String },

  #[error("{field} {value} is out of range [{min}, {max}]")]
  InvalidCoordinate {
    field: &'static str,
    value: f64,
    min:   f64,
    max:   f64,
  },

  #[error("location {index}: {source}")]
  InvalidLocation {
    index:  usize,
    #[source]
    source: Box<Error>,
  },

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

/// Coarse classification shared by every backend error type, so callers can
/// branch on the failure class without matching backend-specific variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  /// A required field is missing or malformed. Retrying will not help.
  Validation,
  /// Entity resolution kept losing a uniqueness race and ran out of retries.
  Conflict,
  /// The addressed trial does not exist.
  NotFound,
  /// The underlying persistence layer failed.
  Storage,
}

impl Error {
  pub fn kind(&self) -> ErrorKind {
    match self {
      Self::Serialization(_) => ErrorKind::Storage,
      _ => ErrorKind::Validation,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
