//! Trial↔entity join rows.
//!
//! Each upsert states the complete desired entity set for a trial; the
//! difference against the stored join rows decides what is inserted and what
//! is removed. Applying the same set twice changes nothing.

use std::collections::BTreeSet;

use rusqlite::{Transaction, params};
use trials_core::{entity::{EntityId, EntityKind}, trial::TrialId};

use crate::Result;

/// Join table and entity column for one relationship.
struct JoinTable {
  table:  &'static str,
  column: &'static str,
}

const fn join_table(kind: EntityKind) -> JoinTable {
  match kind {
    EntityKind::Condition => JoinTable { table: "trial_condition", column: "condition_id" },
    EntityKind::Intervention => {
      JoinTable { table: "trial_intervention", column: "intervention_id" }
    }
  }
}

/// Rows changed by [`diff_and_apply`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffCounts {
  pub added:   usize,
  pub removed: usize,
}

/// Rows removed by [`cascade_delete`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CascadeCounts {
  pub conditions:    usize,
  pub interventions: usize,
  pub locations:     usize,
}

/// `(desired − current, current − desired)`.
pub fn set_diff(
  current: &BTreeSet<EntityId>,
  desired: &BTreeSet<EntityId>,
) -> (Vec<EntityId>, Vec<EntityId>) {
  (
    desired.difference(current).copied().collect(),
    current.difference(desired).copied().collect(),
  )
}

/// Entity ids currently joined to `trial_id`.
pub fn current_ids(
  tx: &Transaction<'_>,
  trial_id: TrialId,
  kind: EntityKind,
) -> Result<BTreeSet<EntityId>> {
  let JoinTable { table, column } = join_table(kind);
  let mut stmt =
    tx.prepare_cached(&format!("SELECT {column} FROM {table} WHERE trial_id = ?1"))?;
  let ids = stmt
    .query_map(params![trial_id.0], |r| r.get(0).map(EntityId))?
    .collect::<rusqlite::Result<BTreeSet<_>>>()?;
  Ok(ids)
}

/// Make the join rows of `kind` for `trial_id` equal `desired`.
pub fn diff_and_apply(
  tx: &Transaction<'_>,
  trial_id: TrialId,
  kind: EntityKind,
  desired: &BTreeSet<EntityId>,
) -> Result<DiffCounts> {
  let current = current_ids(tx, trial_id, kind)?;
  let (additions, removals) = set_diff(&current, desired);
  let JoinTable { table, column } = join_table(kind);

  if !additions.is_empty() {
    let mut insert = tx.prepare_cached(&format!(
      "INSERT INTO {table} (trial_id, {column}) VALUES (?1, ?2) ON CONFLICT DO NOTHING"
    ))?;
    for id in &additions {
      insert.execute(params![trial_id.0, id.0])?;
    }
  }

  if !removals.is_empty() {
    let mut delete = tx.prepare_cached(&format!(
      "DELETE FROM {table} WHERE trial_id = ?1 AND {column} = ?2"
    ))?;
    for id in &removals {
      delete.execute(params![trial_id.0, id.0])?;
    }
  }

  Ok(DiffCounts { added: additions.len(), removed: removals.len() })
}

/// Remove every join row and location of `trial_id`.
///
/// The schema also declares `ON DELETE CASCADE`; deleting explicitly keeps
/// the guarantee when foreign-key enforcement is off on a connection.
pub fn cascade_delete(tx: &Transaction<'_>, trial_id: TrialId) -> Result<CascadeCounts> {
  Ok(CascadeCounts {
    conditions:    tx
      .execute("DELETE FROM trial_condition WHERE trial_id = ?1", params![trial_id.0])?,
    interventions: tx
      .execute("DELETE FROM trial_intervention WHERE trial_id = ?1", params![trial_id.0])?,
    locations:     tx
      .execute("DELETE FROM location WHERE trial_id = ?1", params![trial_id.0])?,
  })
}
