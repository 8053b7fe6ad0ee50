//! Canonical entities: the conditions and interventions shared across trials.
//!
//! A raw name from the registry feed is never stored as a relationship target
//! directly. It is first reduced to an [`EntityKey`]; every raw name with the
//! same key resolves to the same canonical entity.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result, normalize};

// ─── Identity ────────────────────────────────────────────────────────────────

/// The two kinds of canonical entity a trial can reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
  Condition,
  Intervention,
}

impl fmt::Display for EntityKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Self::Condition => "condition",
      Self::Intervention => "intervention",
    })
  }
}

/// Store-assigned id of a canonical condition or intervention.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct EntityId(pub i64);

impl fmt::Display for EntityId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { self.0.fmt(f) }
}

/// The deduplication key of a canonical entity.
///
/// Conditions are keyed by normalized name alone. Interventions are keyed by
/// normalized name plus normalized type; an absent type normalizes to `""`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityKey {
  pub kind:      EntityKind,
  pub name:      String,
  pub qualifier: Option<String>,
}

impl fmt::Display for EntityKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.qualifier {
      Some(q) if !q.is_empty() => write!(f, "{}:{}[{}]", self.kind, self.name, q),
      _ => write!(f, "{}:{}", self.kind, self.name),
    }
  }
}

// ─── Input ───────────────────────────────────────────────────────────────────

/// An intervention as it appears in an incoming trial record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewIntervention {
  pub name:              String,
  /// Registry category, e.g. "Drug", "Device", "Behavioral".
  #[serde(default)]
  pub intervention_type: Option<String>,
  #[serde(default)]
  pub description:       Option<String>,
}

impl NewIntervention {
  pub fn new(name: impl Into<String>, intervention_type: Option<&str>) -> Self {
    Self {
      name:              name.into(),
      intervention_type: intervention_type.map(str::to_owned),
      description:       None,
    }
  }
}

/// A raw entity name to be resolved to a canonical id.
#[derive(Debug, Clone, PartialEq)]
pub enum NewEntity {
  Condition(String),
  Intervention(NewIntervention),
}

impl NewEntity {
  pub fn kind(&self) -> EntityKind {
    match self {
      Self::Condition(_) => EntityKind::Condition,
      Self::Intervention(_) => EntityKind::Intervention,
    }
  }

  /// The raw name as supplied by the caller.
  pub fn raw_name(&self) -> &str {
    match self {
      Self::Condition(name) => name,
      Self::Intervention(i) => &i.name,
    }
  }

  /// The display name stored on first creation.
  pub fn display_name(&self) -> &str { self.raw_name().trim() }

  /// Compute the deduplication key. Fails if the name is blank once
  /// normalized.
  pub fn key(&self) -> Result<EntityKey> {
    let name = normalize(self.raw_name());
    if name.is_empty() {
      return Err(Error::EmptyEntityName {
        kind: self.kind(),
        raw:  self.raw_name().to_owned(),
      });
    }

    let qualifier = match self {
      Self::Condition(_) => None,
      Self::Intervention(i) => {
        Some(i.intervention_type.as_deref().map(normalize).unwrap_or_default())
      }
    };

    Ok(EntityKey { kind: self.kind(), name, qualifier })
  }
}

// ─── Stored entities ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
  pub condition_id:    EntityId,
  pub name:            String,
  pub normalized_name: String,
  pub created_at:      DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intervention {
  pub intervention_id:   EntityId,
  pub name:              String,
  pub normalized_name:   String,
  pub intervention_type: Option<String>,
  pub description:       Option<String>,
  pub created_at:        DateTime<Utc>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn condition_key_ignores_case_and_spacing() {
    let a = NewEntity::Condition("Type 2 Diabetes Mellitus".into());
    let b = NewEntity::Condition("  type 2  diabetes mellitus".into());
    assert_eq!(a.key().unwrap(), b.key().unwrap());
    assert_eq!(a.key().unwrap().qualifier, None);
  }

  #[test]
  fn intervention_key_includes_type() {
    let drug = NewEntity::Intervention(NewIntervention::new("Metformin", Some("Drug")));
    let other = NewEntity::Intervention(NewIntervention::new("metformin", Some("Other")));
    let drug_again =
      NewEntity::Intervention(NewIntervention::new("METFORMIN ", Some("DRUG")));

    assert_ne!(drug.key().unwrap(), other.key().unwrap());
    assert_eq!(drug.key().unwrap(), drug_again.key().unwrap());
  }

  #[test]
  fn untyped_intervention_has_empty_qualifier() {
    let e = NewEntity::Intervention(NewIntervention::new("Placebo", None));
    assert_eq!(e.key().unwrap().qualifier.as_deref(), Some(""));
  }

  #[test]
  fn blank_name_is_rejected() {
    let err = NewEntity::Condition(" -- ".into()).key().unwrap_err();
    assert!(matches!(
      err,
      Error::EmptyEntityName { kind: EntityKind::Condition, .. }
    ));
  }

  #[test]
  fn key_display() {
    let key = NewEntity::Intervention(NewIntervention::new("Aspirin", Some("Drug")))
      .key()
      .unwrap();
    assert_eq!(key.to_string(), "intervention:aspirin[drug]");
  }
}
