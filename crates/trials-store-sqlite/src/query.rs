//! Read-only lookups. Nothing here takes the per-trial lock or opens a write
//! transaction.

use rusqlite::{Connection, OptionalExtension as _, params};
use trials_core::{
  entity::{Condition, Intervention},
  normalize,
  store::Page,
  trial::{TrialId, TrialSummary, TrialView},
};

use crate::{
  Result,
  encode::{
    LOCATION_COLUMNS, RawCondition, RawIntervention, RawTrial, SUMMARY_COLUMNS, TRIAL_SELECT,
    location_from_row, summary_from_row,
  },
};

/// `(limit, offset)` as SQLite integers. Offsets past `i64::MAX` saturate so
/// they still land beyond the last row.
fn bounds(page: Page) -> (i64, i64) {
  (
    i64::try_from(page.effective_limit()).unwrap_or(i64::MAX),
    i64::try_from(page.offset).unwrap_or(i64::MAX),
  )
}

fn summaries(conn: &Connection, sql: &str, key: &str, page: Page) -> Result<Vec<TrialSummary>> {
  let (limit, offset) = bounds(page);
  let mut stmt = conn.prepare_cached(sql)?;
  let rows = stmt
    .query_map(params![key, limit, offset], summary_from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(rows)
}

pub fn find_by_condition(conn: &Connection, key: &str, page: Page) -> Result<Vec<TrialSummary>> {
  summaries(
    conn,
    &format!(
      "SELECT {SUMMARY_COLUMNS}
         FROM trial t
         JOIN trial_condition tc ON tc.trial_id = t.trial_id
         JOIN condition c        ON c.condition_id = tc.condition_id
        WHERE c.normalized_name = ?1
        ORDER BY t.trial_id
        LIMIT ?2 OFFSET ?3"
    ),
    &normalize(key),
    page,
  )
}

/// Interventions sharing a name across types all match, hence `DISTINCT`.
pub fn find_by_intervention(
  conn: &Connection,
  key: &str,
  page: Page,
) -> Result<Vec<TrialSummary>> {
  summaries(
    conn,
    &format!(
      "SELECT DISTINCT {SUMMARY_COLUMNS}
         FROM trial t
         JOIN trial_intervention ti ON ti.trial_id = t.trial_id
         JOIN intervention i        ON i.intervention_id = ti.intervention_id
        WHERE i.normalized_name = ?1
        ORDER BY t.trial_id
        LIMIT ?2 OFFSET ?3"
    ),
    &normalize(key),
    page,
  )
}

pub fn find_by_location_country(
  conn: &Connection,
  country: &str,
  page: Page,
) -> Result<Vec<TrialSummary>> {
  summaries(
    conn,
    &format!(
      "SELECT {SUMMARY_COLUMNS}
         FROM trial t
        WHERE EXISTS (
          SELECT 1 FROM location l
           WHERE l.trial_id = t.trial_id AND l.country_key = ?1
        )
        ORDER BY t.trial_id
        LIMIT ?2 OFFSET ?3"
    ),
    &normalize(country),
    page,
  )
}

// ─── Materialised view ───────────────────────────────────────────────────────

pub fn get_trial(conn: &Connection, nct_id: &str) -> Result<Option<TrialView>> {
  let raw = conn
    .query_row(
      &format!("{TRIAL_SELECT} WHERE nct_id = ?1"),
      params![nct_id],
      RawTrial::from_row,
    )
    .optional()?;
  let Some(raw) = raw else {
    return Ok(None);
  };
  let trial = raw.into_trial()?;

  Ok(Some(TrialView {
    conditions: trial_conditions(conn, trial.trial_id)?,
    interventions: trial_interventions(conn, trial.trial_id)?,
    locations: trial_locations(conn, trial.trial_id)?,
    trial,
  }))
}

fn trial_conditions(conn: &Connection, trial_id: TrialId) -> Result<Vec<Condition>> {
  let mut stmt = conn.prepare_cached(&format!(
    "SELECT {} FROM condition c
       JOIN trial_condition tc ON tc.condition_id = c.condition_id
      WHERE tc.trial_id = ?1
      ORDER BY c.normalized_name",
    RawCondition::COLUMNS
  ))?;
  let raws = stmt
    .query_map(params![trial_id.0], RawCondition::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawCondition::into_condition).collect()
}

fn trial_interventions(conn: &Connection, trial_id: TrialId) -> Result<Vec<Intervention>> {
  let mut stmt = conn.prepare_cached(&format!(
    "SELECT {} FROM intervention i
       JOIN trial_intervention ti ON ti.intervention_id = i.intervention_id
      WHERE ti.trial_id = ?1
      ORDER BY i.normalized_name, i.normalized_type",
    RawIntervention::COLUMNS
  ))?;
  let raws = stmt
    .query_map(params![trial_id.0], RawIntervention::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawIntervention::into_intervention).collect()
}

fn trial_locations(
  conn: &Connection,
  trial_id: TrialId,
) -> Result<Vec<trials_core::location::Location>> {
  let mut stmt = conn.prepare_cached(&format!(
    "SELECT {LOCATION_COLUMNS} FROM location WHERE trial_id = ?1 ORDER BY location_id"
  ))?;
  let rows = stmt
    .query_map(params![trial_id.0], location_from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(rows)
}

// ─── Catalogue ───────────────────────────────────────────────────────────────

pub fn list_conditions(conn: &Connection, page: Page) -> Result<Vec<Condition>> {
  let (limit, offset) = bounds(page);
  let mut stmt = conn.prepare_cached(&format!(
    "SELECT {} FROM condition c ORDER BY c.condition_id LIMIT ?1 OFFSET ?2",
    RawCondition::COLUMNS
  ))?;
  let raws = stmt
    .query_map(params![limit, offset], RawCondition::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawCondition::into_condition).collect()
}

pub fn list_interventions(conn: &Connection, page: Page) -> Result<Vec<Intervention>> {
  let (limit, offset) = bounds(page);
  let mut stmt = conn.prepare_cached(&format!(
    "SELECT {} FROM intervention i ORDER BY i.intervention_id LIMIT ?1 OFFSET ?2",
    RawIntervention::COLUMNS
  ))?;
  let raws = stmt
    .query_map(params![limit, offset], RawIntervention::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawIntervention::into_intervention).collect()
}
