//! Identity resolution: raw entity names to canonical ids.
//!
//! Resolution is look-up-then-insert guarded by the UNIQUE index on the
//! normalized key. A writer that loses the insert race re-reads and returns
//! the winner's id, so callers never see the collision.

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension as _, Transaction, params};
use tracing::debug;
use trials_core::entity::{EntityId, EntityKey, EntityKind, NewEntity};

use crate::{
  Error, Result,
  encode::encode_dt,
  error::is_unique_violation,
};

/// Insert attempts before a resolve gives up with
/// [`Error::ResolveConflict`].
pub const MAX_RESOLVE_ATTEMPTS: u32 = 3;

/// Resolve `entity` to its canonical id inside `tx`, creating it on first
/// sight.
pub fn resolve_or_create(
  tx: &Transaction<'_>,
  entity: &NewEntity,
  now: DateTime<Utc>,
) -> Result<EntityId> {
  let key = entity.key()?;

  for attempt in 1..=MAX_RESOLVE_ATTEMPTS {
    if let Some(id) = lookup(tx, &key)? {
      fill_description(tx, entity, id)?;
      return Ok(id);
    }

    match insert(tx, entity, &key, now) {
      Ok(id) => {
        debug!(%key, %id, "created canonical entity");
        return Ok(id);
      }
      Err(Error::Sqlite(e)) if is_unique_violation(&e) => {
        debug!(%key, attempt, "lost entity creation race; re-reading");
      }
      Err(e) => return Err(e),
    }
  }

  Err(Error::ResolveConflict { key, attempts: MAX_RESOLVE_ATTEMPTS })
}

/// Find the canonical id for `key`, if one exists.
pub fn lookup(tx: &Transaction<'_>, key: &EntityKey) -> Result<Option<EntityId>> {
  let id: Option<i64> = match key.kind {
    EntityKind::Condition => tx
      .query_row(
        "SELECT condition_id FROM condition WHERE normalized_name = ?1",
        params![key.name],
        |r| r.get(0),
      )
      .optional()?,
    EntityKind::Intervention => tx
      .query_row(
        "SELECT intervention_id FROM intervention
          WHERE normalized_name = ?1 AND normalized_type = ?2",
        params![key.name, key.qualifier.as_deref().unwrap_or_default()],
        |r| r.get(0),
      )
      .optional()?,
  };
  Ok(id.map(EntityId))
}

fn insert(
  tx: &Transaction<'_>,
  entity: &NewEntity,
  key: &EntityKey,
  now: DateTime<Utc>,
) -> Result<EntityId> {
  let at = encode_dt(now);
  match entity {
    NewEntity::Condition(_) => {
      tx.execute(
        "INSERT INTO condition (name, normalized_name, created_at) VALUES (?1, ?2, ?3)",
        params![entity.display_name(), key.name, at],
      )?;
    }
    NewEntity::Intervention(i) => {
      tx.execute(
        "INSERT INTO intervention (
           name, normalized_name, intervention_type, normalized_type,
           description, created_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
          entity.display_name(),
          key.name,
          i.intervention_type.as_deref().map(str::trim),
          key.qualifier.as_deref().unwrap_or_default(),
          i.description,
          at,
        ],
      )?;
    }
  }
  Ok(EntityId(tx.last_insert_rowid()))
}

/// The first description seen sticks; later ones only fill a gap.
fn fill_description(tx: &Transaction<'_>, entity: &NewEntity, id: EntityId) -> Result<()> {
  if let NewEntity::Intervention(i) = entity
    && let Some(description) = i.description.as_deref()
  {
    tx.execute(
      "UPDATE intervention SET description = ?2
        WHERE intervention_id = ?1 AND description IS NULL",
      params![id.0, description],
    )?;
  }
  Ok(())
}
