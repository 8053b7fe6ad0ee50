//! The `TrialStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g. `trials-store-sqlite`).
//! Ingestion runners and API layers depend on this abstraction, not on any
//! concrete backend.

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::{
  entity::{Condition, EntityId, Intervention, NewEntity},
  trial::{TrialId, TrialRecord, TrialSummary, TrialView},
};

// ─── Query types ─────────────────────────────────────────────────────────────

/// Offset pagination for the query facade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Page {
  pub offset: usize,
  pub limit:  usize,
}

impl Page {
  pub const DEFAULT_LIMIT: usize = 100;
  /// Larger requested limits are silently clamped.
  pub const MAX_LIMIT: usize = 1000;

  pub fn new(offset: usize, limit: usize) -> Self { Self { offset, limit } }

  pub fn effective_limit(&self) -> usize { self.limit.min(Self::MAX_LIMIT) }
}

impl Default for Page {
  fn default() -> Self { Self { offset: 0, limit: Self::DEFAULT_LIMIT } }
}

/// Result of [`TrialStore::upsert_trial`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsertOutcome {
  pub trial_id:    TrialId,
  /// `true` when no trial with this `nct_id` existed before the call.
  pub was_created: bool,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a clinical-trial store backend.
///
/// Every write is atomic: an upsert or delete either commits in full or
/// leaves the prior state untouched. Upserts of the same `nct_id` serialize;
/// upserts of different ids do not wait on each other.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes.
pub trait TrialStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Writes ────────────────────────────────────────────────────────────

  /// Create or fully replace the trial identified by `record.nct_id`,
  /// including its condition and intervention links and its locations.
  fn upsert_trial(
    &self,
    record: TrialRecord,
  ) -> impl Future<Output = Result<UpsertOutcome, Self::Error>> + Send + '_;

  /// Delete a trial together with its links and locations.
  ///
  /// Returns a not-found error if no trial has this `nct_id`.
  fn delete_trial<'a>(
    &'a self,
    nct_id: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Resolve a raw name to its canonical entity, creating it if needed.
  /// Repeated calls with names sharing a key return the same id.
  fn resolve_entity(
    &self,
    entity: NewEntity,
  ) -> impl Future<Output = Result<EntityId, Self::Error>> + Send + '_;

  // ── Reads ─────────────────────────────────────────────────────────────

  /// Materialise a trial with its relationships. `None` if absent.
  fn get_trial<'a>(
    &'a self,
    nct_id: &'a str,
  ) -> impl Future<Output = Result<Option<TrialView>, Self::Error>> + Send + 'a;

  /// Trials linked to the condition with this key, by trial id ascending.
  /// The key is normalized before lookup.
  fn find_by_condition<'a>(
    &'a self,
    key: &'a str,
    page: Page,
  ) -> impl Future<Output = Result<Vec<TrialSummary>, Self::Error>> + Send + 'a;

  /// Trials linked to an intervention with this name (any type), by trial
  /// id ascending. The key is normalized before lookup.
  fn find_by_intervention<'a>(
    &'a self,
    key: &'a str,
    page: Page,
  ) -> impl Future<Output = Result<Vec<TrialSummary>, Self::Error>> + Send + 'a;

  /// Trials with at least one site in `country`, by trial id ascending.
  fn find_by_location_country<'a>(
    &'a self,
    country: &'a str,
    page: Page,
  ) -> impl Future<Output = Result<Vec<TrialSummary>, Self::Error>> + Send + 'a;

  /// Canonical conditions by id.
  fn list_conditions(
    &self,
    page: Page,
  ) -> impl Future<Output = Result<Vec<Condition>, Self::Error>> + Send + '_;

  /// Canonical interventions by id.
  fn list_interventions(
    &self,
    page: Page,
  ) -> impl Future<Output = Result<Vec<Intervention>, Self::Error>> + Send + '_;
}
