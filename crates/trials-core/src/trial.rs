//! Trial types: the incoming record shape, the stored row and read models.
//!
//! A trial is addressed externally by its registry id (`nct_id`) and
//! internally by a store-assigned [`TrialId`]. The upstream ingestion pipeline
//! is responsible for turning feed payloads into [`TrialRecord`] values; this
//! crate never parses registry wire formats.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  entity::{Condition, Intervention, NewEntity, NewIntervention},
  location::{Location, NewLocation},
};

/// Longest `nct_id` the store accepts.
pub const MAX_NCT_ID_LEN: usize = 20;

// ─── Identity ────────────────────────────────────────────────────────────────

/// Store-assigned trial id; ascending with insertion order.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TrialId(pub i64);

impl fmt::Display for TrialId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { self.0.fmt(f) }
}

/// Trim and check an external registry id.
pub fn validate_nct_id(raw: &str) -> Result<&str> {
  let id = raw.trim();
  if id.is_empty() {
    return Err(Error::MissingNctId);
  }
  if id.len() > MAX_NCT_ID_LEN || !id.chars().all(|c| c.is_ascii_alphanumeric()) {
    return Err(Error::MalformedNctId(raw.to_owned()));
  }
  Ok(id)
}

// ─── Field groups ────────────────────────────────────────────────────────────

/// Eligibility criteria: free text plus the structured fields the registry
/// publishes alongside it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Eligibility {
  pub criteria:    Option<String>,
  pub gender:      Option<String>,
  /// Kept verbatim, e.g. "18 Years".
  pub minimum_age: Option<String>,
  pub maximum_age: Option<String>,
}

/// Calendar milestones of a trial.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrialDates {
  pub start_date:              Option<NaiveDate>,
  pub primary_completion_date: Option<NaiveDate>,
  pub completion_date:         Option<NaiveDate>,
  pub first_posted:            Option<NaiveDate>,
  pub last_update_posted:      Option<NaiveDate>,
}

/// Two milestones that are recorded in the wrong order.
///
/// The store accepts such records; the pair is only reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateOrderWarning {
  pub earlier:       &'static str,
  pub earlier_value: NaiveDate,
  pub later:         &'static str,
  pub later_value:   NaiveDate,
}

impl fmt::Display for DateOrderWarning {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "{} ({}) is after {} ({})",
      self.earlier, self.earlier_value, self.later, self.later_value
    )
  }
}

impl TrialDates {
  /// Soft monotonicity check over the milestone pairs that must not invert.
  pub fn order_warnings(&self) -> Vec<DateOrderWarning> {
    let pairs = [
      ("start_date", self.start_date, "primary_completion_date", self.primary_completion_date),
      ("primary_completion_date", self.primary_completion_date, "completion_date", self.completion_date),
      ("start_date", self.start_date, "completion_date", self.completion_date),
      ("first_posted", self.first_posted, "last_update_posted", self.last_update_posted),
    ];

    pairs
      .into_iter()
      .filter_map(|(earlier, a, later, b)| match (a, b) {
        (Some(a), Some(b)) if a > b => Some(DateOrderWarning {
          earlier,
          earlier_value: a,
          later,
          later_value: b,
        }),
        _ => None,
      })
      .collect()
  }
}

/// Every mutable trial column. Replaced wholesale on each upsert.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrialFields {
  pub brief_title:          Option<String>,
  pub official_title:       Option<String>,
  pub overall_status:       Option<String>,
  pub phase:                Option<String>,
  pub study_type:           Option<String>,
  pub eligibility:          Eligibility,
  pub dates:                TrialDates,
  // Structured blobs are stored opaquely.
  pub detailed_description: Option<serde_json::Value>,
  pub arms_groups:          Option<serde_json::Value>,
  pub outcomes:             Option<serde_json::Value>,
  pub contacts:             Option<serde_json::Value>,
}

// ─── Incoming record ─────────────────────────────────────────────────────────

/// Input to [`crate::store::TrialStore::upsert_trial`].
///
/// The record is the complete current state of the trial: conditions,
/// interventions and locations absent from it are removed from the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
  pub nct_id:        String,
  #[serde(flatten)]
  pub fields:        TrialFields,
  #[serde(default)]
  pub conditions:    Vec<String>,
  #[serde(default)]
  pub interventions: Vec<NewIntervention>,
  #[serde(default)]
  pub locations:     Vec<NewLocation>,
}

impl TrialRecord {
  /// Convenience constructor with every optional field left empty.
  pub fn new(nct_id: impl Into<String>) -> Self {
    Self { nct_id: nct_id.into(), ..Default::default() }
  }

  /// Validate the record and return its trimmed `nct_id`.
  pub fn validate(&self) -> Result<&str> {
    let nct_id = validate_nct_id(&self.nct_id)?;
    for (index, location) in self.locations.iter().enumerate() {
      location
        .validate()
        .map_err(|e| Error::InvalidLocation { index, source: Box::new(e) })?;
    }
    Ok(nct_id)
  }

  /// Conditions and interventions as resolver input, conditions first.
  pub fn entities(&self) -> impl Iterator<Item = NewEntity> + '_ {
    self
      .conditions
      .iter()
      .map(|c| NewEntity::Condition(c.clone()))
      .chain(self.interventions.iter().cloned().map(NewEntity::Intervention))
  }
}

// ─── Stored row and read models ──────────────────────────────────────────────

/// A persisted trial row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trial {
  pub trial_id:   TrialId,
  pub nct_id:     String,
  #[serde(flatten)]
  pub fields:     TrialFields,
  /// Set once at first insert.
  pub created_at: DateTime<Utc>,
  /// Set on every successful upsert.
  pub updated_at: DateTime<Utc>,
}

/// The compact projection returned by the query facade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialSummary {
  pub trial_id:       TrialId,
  pub nct_id:         String,
  pub brief_title:    Option<String>,
  pub overall_status: Option<String>,
  pub phase:          Option<String>,
  pub study_type:     Option<String>,
}

/// A trial with its relationships resolved. Computed on read, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialView {
  pub trial:         Trial,
  /// Ordered by normalized name.
  pub conditions:    Vec<Condition>,
  /// Ordered by normalized name, then type.
  pub interventions: Vec<Intervention>,
  /// In insertion order.
  pub locations:     Vec<Location>,
}
