//! Location replacement. A trial's sites are rewritten wholesale on every
//! upsert, inside the upsert's transaction.

use rusqlite::{Transaction, params};
use trials_core::{location::NewLocation, normalize, trial::TrialId};

use crate::Result;

/// Replace every location of `trial_id` with `locations`. Returns the number
/// of rows inserted.
pub fn replace_locations(
  tx: &Transaction<'_>,
  trial_id: TrialId,
  locations: &[NewLocation],
) -> Result<usize> {
  for location in locations {
    location.validate()?;
  }

  tx.execute("DELETE FROM location WHERE trial_id = ?1", params![trial_id.0])?;

  let mut insert = tx.prepare_cached(
    "INSERT INTO location (
       trial_id, facility, city, state, country, country_key, latitude, longitude
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
  )?;
  for l in locations {
    let country_key = l.country.as_deref().map(normalize).filter(|k| !k.is_empty());
    insert.execute(params![
      trial_id.0,
      l.facility,
      l.city,
      l.state,
      l.country,
      country_key,
      l.latitude,
      l.longitude,
    ])?;
  }

  Ok(locations.len())
}
