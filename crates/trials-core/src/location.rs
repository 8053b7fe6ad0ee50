//! Trial sites. A location has no identity outside its owning trial.

use serde::{Deserialize, Serialize};

use crate::{Error, Result, trial::TrialId};

const LATITUDE_RANGE: (f64, f64) = (-90.0, 90.0);
const LONGITUDE_RANGE: (f64, f64) = (-180.0, 180.0);

/// A site as it appears in an incoming trial record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewLocation {
  pub facility:  Option<String>,
  pub city:      Option<String>,
  /// State, province, or region.
  pub state:     Option<String>,
  pub country:   Option<String>,
  pub latitude:  Option<f64>,
  pub longitude: Option<f64>,
}

impl NewLocation {
  /// Check that coordinates, when present, are finite and in range.
  pub fn validate(&self) -> Result<()> {
    check_coordinate("latitude", self.latitude, LATITUDE_RANGE)?;
    check_coordinate("longitude", self.longitude, LONGITUDE_RANGE)
  }
}

fn check_coordinate(
  field: &'static str,
  value: Option<f64>,
  (min, max): (f64, f64),
) -> Result<()> {
  match value {
    // `contains` is false for NaN, which is what we want.
    Some(v) if !(min..=max).contains(&v) => {
      Err(Error::InvalidCoordinate { field, value: v, min, max })
    }
    _ => Ok(()),
  }
}

/// A persisted site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
  pub location_id: i64,
  pub trial_id:    TrialId,
  pub facility:    Option<String>,
  pub city:        Option<String>,
  pub state:       Option<String>,
  pub country:     Option<String>,
  pub latitude:    Option<f64>,
  pub longitude:   Option<f64>,
}
