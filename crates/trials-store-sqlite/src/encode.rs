//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings, calendar dates as `YYYY-MM-DD`,
//! and opaque structured blobs as compact JSON.

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::Row;
use trials_core::{
  entity::{Condition, EntityId, Intervention},
  location::Location,
  trial::{Eligibility, Trial, TrialDates, TrialFields, TrialId, TrialSummary},
};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── NaiveDate ───────────────────────────────────────────────────────────────

const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn encode_date(d: NaiveDate) -> String { d.format(DATE_FORMAT).to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, DATE_FORMAT)
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

fn decode_opt_date(s: Option<String>) -> Result<Option<NaiveDate>> {
  s.as_deref().map(decode_date).transpose()
}

// ─── Opaque JSON blobs ───────────────────────────────────────────────────────

pub fn encode_blob(v: &Option<serde_json::Value>) -> Result<Option<String>> {
  Ok(v.as_ref().map(serde_json::to_string).transpose()?)
}

fn decode_blob(s: Option<String>) -> Result<Option<serde_json::Value>> {
  Ok(s.as_deref().map(serde_json::from_str).transpose()?)
}

// ─── Trial columns ───────────────────────────────────────────────────────────

/// Mutable trial columns, in the order [`TrialColumns`] binds them.
pub const TRIAL_FIELD_COLUMNS: &str = "brief_title, official_title, overall_status, phase, \
   study_type, eligibility_criteria, gender, minimum_age, maximum_age, start_date, \
   primary_completion_date, completion_date, first_posted, last_update_posted, \
   detailed_description, arms_groups, outcomes, contacts";

/// Owned, column-ordered encoding of [`TrialFields`], ready to bind.
pub struct TrialColumns(pub [Option<String>; 18]);

impl TrialColumns {
  pub fn encode(f: &TrialFields) -> Result<Self> {
    let d = &f.dates;
    Ok(Self([
      f.brief_title.clone(),
      f.official_title.clone(),
      f.overall_status.clone(),
      f.phase.clone(),
      f.study_type.clone(),
      f.eligibility.criteria.clone(),
      f.eligibility.gender.clone(),
      f.eligibility.minimum_age.clone(),
      f.eligibility.maximum_age.clone(),
      d.start_date.map(encode_date),
      d.primary_completion_date.map(encode_date),
      d.completion_date.map(encode_date),
      d.first_posted.map(encode_date),
      d.last_update_posted.map(encode_date),
      encode_blob(&f.detailed_description)?,
      encode_blob(&f.arms_groups)?,
      encode_blob(&f.outcomes)?,
      encode_blob(&f.contacts)?,
    ]))
  }
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Select list matching [`RawTrial::from_row`].
pub const TRIAL_SELECT: &str = "SELECT trial_id, nct_id, brief_title, official_title, \
   overall_status, phase, study_type, eligibility_criteria, gender, minimum_age, \
   maximum_age, start_date, primary_completion_date, completion_date, first_posted, \
   last_update_posted, detailed_description, arms_groups, outcomes, contacts, \
   created_at, updated_at FROM trial";

/// Raw values read directly from a `trial` row.
pub struct RawTrial {
  pub trial_id:   i64,
  pub nct_id:     String,
  pub text:       [Option<String>; 18],
  pub created_at: String,
  pub updated_at: String,
}

impl RawTrial {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    let mut text: [Option<String>; 18] = Default::default();
    for (i, slot) in text.iter_mut().enumerate() {
      *slot = row.get(i + 2)?;
    }
    Ok(Self {
      trial_id: row.get(0)?,
      nct_id: row.get(1)?,
      text,
      created_at: row.get(20)?,
      updated_at: row.get(21)?,
    })
  }

  pub fn into_trial(self) -> Result<Trial> {
    let [
      brief_title,
      official_title,
      overall_status,
      phase,
      study_type,
      criteria,
      gender,
      minimum_age,
      maximum_age,
      start_date,
      primary_completion_date,
      completion_date,
      first_posted,
      last_update_posted,
      detailed_description,
      arms_groups,
      outcomes,
      contacts,
    ] = self.text;

    let fields = TrialFields {
      brief_title,
      official_title,
      overall_status,
      phase,
      study_type,
      eligibility: Eligibility { criteria, gender, minimum_age, maximum_age },
      dates: TrialDates {
        start_date:              decode_opt_date(start_date)?,
        primary_completion_date: decode_opt_date(primary_completion_date)?,
        completion_date:         decode_opt_date(completion_date)?,
        first_posted:            decode_opt_date(first_posted)?,
        last_update_posted:      decode_opt_date(last_update_posted)?,
      },
      detailed_description: decode_blob(detailed_description)?,
      arms_groups: decode_blob(arms_groups)?,
      outcomes: decode_blob(outcomes)?,
      contacts: decode_blob(contacts)?,
    };

    Ok(Trial {
      trial_id: TrialId(self.trial_id),
      nct_id: self.nct_id,
      fields,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}

/// Select list matching [`summary_from_row`]; expects the trial aliased `t`.
pub const SUMMARY_COLUMNS: &str =
  "t.trial_id, t.nct_id, t.brief_title, t.overall_status, t.phase, t.study_type";

pub fn summary_from_row(row: &Row<'_>) -> rusqlite::Result<TrialSummary> {
  Ok(TrialSummary {
    trial_id:       TrialId(row.get(0)?),
    nct_id:         row.get(1)?,
    brief_title:    row.get(2)?,
    overall_status: row.get(3)?,
    phase:          row.get(4)?,
    study_type:     row.get(5)?,
  })
}

/// Raw values read directly from a `condition` row.
pub struct RawCondition {
  pub condition_id:    i64,
  pub name:            String,
  pub normalized_name: String,
  pub created_at:      String,
}

impl RawCondition {
  pub const COLUMNS: &'static str = "c.condition_id, c.name, c.normalized_name, c.created_at";

  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      condition_id:    row.get(0)?,
      name:            row.get(1)?,
      normalized_name: row.get(2)?,
      created_at:      row.get(3)?,
    })
  }

  pub fn into_condition(self) -> Result<Condition> {
    Ok(Condition {
      condition_id:    EntityId(self.condition_id),
      name:            self.name,
      normalized_name: self.normalized_name,
      created_at:      decode_dt(&self.created_at)?,
    })
  }
}

/// Raw values read directly from an `intervention` row.
pub struct RawIntervention {
  pub intervention_id:   i64,
  pub name:              String,
  pub normalized_name:   String,
  pub intervention_type: Option<String>,
  pub description:       Option<String>,
  pub created_at:        String,
}

impl RawIntervention {
  pub const COLUMNS: &'static str = "i.intervention_id, i.name, i.normalized_name, \
     i.intervention_type, i.description, i.created_at";

  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      intervention_id:   row.get(0)?,
      name:              row.get(1)?,
      normalized_name:   row.get(2)?,
      intervention_type: row.get(3)?,
      description:       row.get(4)?,
      created_at:        row.get(5)?,
    })
  }

  pub fn into_intervention(self) -> Result<Intervention> {
    Ok(Intervention {
      intervention_id:   EntityId(self.intervention_id),
      name:              self.name,
      normalized_name:   self.normalized_name,
      intervention_type: self.intervention_type,
      description:       self.description,
      created_at:        decode_dt(&self.created_at)?,
    })
  }
}

pub const LOCATION_COLUMNS: &str =
  "location_id, trial_id, facility, city, state, country, latitude, longitude";

pub fn location_from_row(row: &Row<'_>) -> rusqlite::Result<Location> {
  Ok(Location {
    location_id: row.get(0)?,
    trial_id:    TrialId(row.get(1)?),
    facility:    row.get(2)?,
    city:        row.get(3)?,
    state:       row.get(4)?,
    country:     row.get(5)?,
    latitude:    row.get(6)?,
    longitude:   row.get(7)?,
  })
}
