//! Write units of work. Each function here runs one complete transaction on a
//! borrowed connection and is called from [`crate::SqliteStore`] on a
//! connection thread.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use rusqlite::{
  Connection, OptionalExtension as _, ToSql, Transaction, TransactionBehavior, params,
};
use tracing::{debug, info, warn};
use trials_core::{
  entity::{EntityId, EntityKind, NewEntity},
  store::UpsertOutcome,
  trial::{TrialFields, TrialId, TrialRecord},
};

use crate::{
  Error, Result,
  encode::{TRIAL_FIELD_COLUMNS, TrialColumns, encode_dt},
  locations, relations, resolver,
};

fn begin(conn: &mut Connection) -> Result<Transaction<'_>> {
  Ok(conn.transaction_with_behavior(TransactionBehavior::Immediate)?)
}

pub fn find_trial_id(conn: &Connection, nct_id: &str) -> Result<Option<TrialId>> {
  let id: Option<i64> = conn
    .query_row(
      "SELECT trial_id FROM trial WHERE nct_id = ?1",
      params![nct_id],
      |r| r.get(0),
    )
    .optional()?;
  Ok(id.map(TrialId))
}

// ─── Upsert ──────────────────────────────────────────────────────────────────

/// Create or replace the trial described by `record` in one transaction.
pub fn upsert_trial(
  conn: &mut Connection,
  record: &TrialRecord,
  now: DateTime<Utc>,
) -> Result<UpsertOutcome> {
  let nct_id = record.validate()?;
  for w in record.fields.dates.order_warnings() {
    warn!(nct_id, "trial dates out of order: {w}");
  }

  let tx = begin(conn)?;

  let (trial_id, was_created) = match find_trial_id(&tx, nct_id)? {
    Some(id) => {
      update_trial(&tx, id, &record.fields, now)?;
      (id, false)
    }
    None => (insert_trial(&tx, nct_id, &record.fields, now)?, true),
  };

  // Resolve every id before touching any join row.
  let mut conditions = BTreeSet::new();
  let mut interventions = BTreeSet::new();
  for entity in record.entities() {
    let Some(id) = resolve_listed(&tx, nct_id, &entity, now)? else {
      continue;
    };
    match entity.kind() {
      EntityKind::Condition => conditions.insert(id),
      EntityKind::Intervention => interventions.insert(id),
    };
  }

  let c = relations::diff_and_apply(&tx, trial_id, EntityKind::Condition, &conditions)?;
  let i = relations::diff_and_apply(&tx, trial_id, EntityKind::Intervention, &interventions)?;
  let sites = locations::replace_locations(&tx, trial_id, &record.locations)?;

  tx.commit()?;

  if was_created {
    info!(nct_id, %trial_id, "created trial");
  }
  debug!(
    nct_id,
    conditions_added = c.added,
    conditions_removed = c.removed,
    interventions_added = i.added,
    interventions_removed = i.removed,
    sites,
    "applied trial record"
  );

  Ok(UpsertOutcome { trial_id, was_created })
}

/// Resolve an entity named inside a trial record. Names that normalize to
/// nothing are skipped rather than failing the whole record.
fn resolve_listed(
  tx: &Transaction<'_>,
  nct_id: &str,
  entity: &NewEntity,
  now: DateTime<Utc>,
) -> Result<Option<EntityId>> {
  match resolver::resolve_or_create(tx, entity, now) {
    Ok(id) => Ok(Some(id)),
    Err(Error::Core(trials_core::Error::EmptyEntityName { kind, raw })) => {
      warn!(nct_id, %kind, %raw, "skipping blank entity name");
      Ok(None)
    }
    Err(e) => Err(e),
  }
}

fn insert_trial(
  tx: &Transaction<'_>,
  nct_id: &str,
  fields: &TrialFields,
  now: DateTime<Utc>,
) -> Result<TrialId> {
  let columns = TrialColumns::encode(fields)?;
  let at = encode_dt(now);

  let mut values: Vec<&dyn ToSql> = Vec::with_capacity(columns.0.len() + 3);
  values.push(&nct_id);
  values.extend(columns.0.iter().map(|c| c as &dyn ToSql));
  values.push(&at);
  values.push(&at);

  let placeholders = (1..=values.len()).map(|n| format!("?{n}")).collect::<Vec<_>>();
  tx.execute(
    &format!(
      "INSERT INTO trial (nct_id, {TRIAL_FIELD_COLUMNS}, created_at, updated_at)
       VALUES ({})",
      placeholders.join(", ")
    ),
    values.as_slice(),
  )?;

  Ok(TrialId(tx.last_insert_rowid()))
}

/// Overwrite every mutable column; `nct_id` and `created_at` never change.
fn update_trial(
  tx: &Transaction<'_>,
  trial_id: TrialId,
  fields: &TrialFields,
  now: DateTime<Utc>,
) -> Result<()> {
  let columns = TrialColumns::encode(fields)?;
  let at = encode_dt(now);

  let mut values: Vec<&dyn ToSql> = columns.0.iter().map(|c| c as &dyn ToSql).collect();
  values.push(&at);
  values.push(&trial_id.0);

  let assignments = TRIAL_FIELD_COLUMNS
    .split(", ")
    .chain(["updated_at"])
    .enumerate()
    .map(|(n, column)| format!("{column} = ?{}", n + 1))
    .collect::<Vec<_>>();

  tx.execute(
    &format!(
      "UPDATE trial SET {} WHERE trial_id = ?{}",
      assignments.join(", "),
      values.len()
    ),
    values.as_slice(),
  )?;
  Ok(())
}

// ─── Delete ──────────────────────────────────────────────────────────────────

/// Delete a trial and everything it owns in one transaction.
pub fn delete_trial(conn: &mut Connection, nct_id: &str) -> Result<()> {
  let tx = begin(conn)?;
  let trial_id =
    find_trial_id(&tx, nct_id)?.ok_or_else(|| Error::TrialNotFound(nct_id.to_owned()))?;

  let removed = relations::cascade_delete(&tx, trial_id)?;
  tx.execute("DELETE FROM trial WHERE trial_id = ?1", params![trial_id.0])?;
  tx.commit()?;

  info!(
    nct_id,
    %trial_id,
    conditions = removed.conditions,
    interventions = removed.interventions,
    locations = removed.locations,
    "deleted trial"
  );
  Ok(())
}

// ─── Standalone resolution ───────────────────────────────────────────────────

pub fn resolve_entity(
  conn: &mut Connection,
  entity: &NewEntity,
  now: DateTime<Utc>,
) -> Result<EntityId> {
  let tx = begin(conn)?;
  let id = resolver::resolve_or_create(&tx, entity, now)?;
  tx.commit()?;
  Ok(id)
}
