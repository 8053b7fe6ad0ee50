//! Integration tests for `SqliteStore` against in-memory and on-disk
//! databases.

use std::{collections::BTreeSet, time::Duration};

use chrono::NaiveDate;
use trials_core::{
  ErrorKind,
  entity::{EntityKind, NewEntity, NewIntervention},
  location::NewLocation,
  store::{Page, TrialStore},
  trial::{TrialDates, TrialRecord},
};

use crate::{SqliteStore, StoreConfig};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

async fn file_store(dir: &tempfile::TempDir) -> SqliteStore {
  SqliteStore::with_config(
    dir.path().join("trials.db"),
    StoreConfig { connections: 4, ..StoreConfig::default() },
  )
  .await
  .expect("on-disk store")
}

async fn count(s: &SqliteStore, sql: &'static str) -> i64 {
  s.read(move |conn| Ok(conn.query_row(sql, [], |r| r.get(0))?))
    .await
    .unwrap()
}

fn record(nct_id: &str, conditions: &[&str]) -> TrialRecord {
  let mut r = TrialRecord::new(nct_id);
  r.fields.brief_title = Some(format!("Study {nct_id}"));
  r.conditions = conditions.iter().map(|c| c.to_string()).collect();
  r
}

fn site(city: &str, country: &str) -> NewLocation {
  NewLocation {
    facility: Some(format!("{city} General Hospital")),
    city: Some(city.into()),
    country: Some(country.into()),
    ..Default::default()
  }
}

async fn condition_keys(s: &SqliteStore, nct_id: &str) -> Vec<String> {
  s.get_trial(nct_id)
    .await
    .unwrap()
    .expect("trial exists")
    .conditions
    .into_iter()
    .map(|c| c.normalized_name)
    .collect()
}

// ─── Upsert ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn upsert_creates_then_updates() {
  let s = store().await;

  let first = s.upsert_trial(record("NCT00000001", &["Asthma"])).await.unwrap();
  assert!(first.was_created);

  let mut changed = record("NCT00000001", &["Asthma"]);
  changed.fields.overall_status = Some("RECRUITING".into());
  let second = s.upsert_trial(changed).await.unwrap();
  assert!(!second.was_created);
  assert_eq!(first.trial_id, second.trial_id);

  let view = s.get_trial("NCT00000001").await.unwrap().unwrap();
  assert_eq!(view.trial.fields.overall_status.as_deref(), Some("RECRUITING"));
  assert_eq!(count(&s, "SELECT COUNT(*) FROM trial").await, 1);
}

#[tokio::test]
async fn unchanged_upsert_is_idempotent() {
  let s = store().await;

  let mut r = record("NCT00000002", &["Asthma", "COPD"]);
  r.interventions = vec![
    NewIntervention::new("Budesonide", Some("Drug")),
    NewIntervention::new("Placebo", None),
  ];
  r.locations = vec![site("Boston", "United States")];

  s.upsert_trial(r.clone()).await.unwrap();
  let again = s.upsert_trial(r).await.unwrap();
  assert!(!again.was_created);

  assert_eq!(count(&s, "SELECT COUNT(*) FROM condition").await, 2);
  assert_eq!(count(&s, "SELECT COUNT(*) FROM intervention").await, 2);
  assert_eq!(count(&s, "SELECT COUNT(*) FROM trial_condition").await, 2);
  assert_eq!(count(&s, "SELECT COUNT(*) FROM trial_intervention").await, 2);
  assert_eq!(count(&s, "SELECT COUNT(*) FROM location").await, 1);
}

#[tokio::test]
async fn created_at_is_kept_and_updated_at_advances() {
  let s = store().await;

  s.upsert_trial(record("NCT00000003", &[])).await.unwrap();
  let before = s.get_trial("NCT00000003").await.unwrap().unwrap().trial;
  assert_eq!(before.created_at, before.updated_at);

  tokio::time::sleep(Duration::from_millis(10)).await;
  s.upsert_trial(record("NCT00000003", &[])).await.unwrap();
  let after = s.get_trial("NCT00000003").await.unwrap().unwrap().trial;

  assert_eq!(after.created_at, before.created_at);
  assert!(after.updated_at > before.updated_at);
}

#[tokio::test]
async fn trial_fields_roundtrip() {
  let s = store().await;

  let mut r = record("NCT00000004", &[]);
  r.fields.official_title = Some("A Randomised Trial".into());
  r.fields.phase = Some("PHASE3".into());
  r.fields.study_type = Some("INTERVENTIONAL".into());
  r.fields.eligibility.criteria = Some("Inclusion: adults".into());
  r.fields.eligibility.minimum_age = Some("18 Years".into());
  r.fields.dates = TrialDates {
    start_date: NaiveDate::from_ymd_opt(2020, 1, 15),
    completion_date: NaiveDate::from_ymd_opt(2023, 6, 30),
    ..Default::default()
  };
  r.fields.arms_groups = Some(serde_json::json!([{ "label": "Arm A" }]));

  s.upsert_trial(r.clone()).await.unwrap();
  let view = s.get_trial("NCT00000004").await.unwrap().unwrap();

  assert_eq!(view.trial.nct_id, "NCT00000004");
  assert_eq!(view.trial.fields, r.fields);
}

#[tokio::test]
async fn nct_id_is_trimmed_before_keying() {
  let s = store().await;
  s.upsert_trial(record(" NCT00000005 ", &[])).await.unwrap();
  let again = s.upsert_trial(record("NCT00000005", &[])).await.unwrap();
  assert!(!again.was_created);
}

#[tokio::test]
async fn missing_nct_id_is_rejected() {
  let s = store().await;

  let err = s.upsert_trial(record("  ", &["Asthma"])).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Validation);
  assert_eq!(count(&s, "SELECT COUNT(*) FROM trial").await, 0);
  assert_eq!(count(&s, "SELECT COUNT(*) FROM condition").await, 0);
}

#[tokio::test]
async fn invalid_coordinates_leave_prior_state() {
  let s = store().await;

  let mut good = record("NCT00000006", &["Asthma"]);
  good.locations = vec![site("Lyon", "France")];
  s.upsert_trial(good).await.unwrap();

  let mut bad = record("NCT00000006", &["Influenza"]);
  bad.locations = vec![NewLocation { latitude: Some(91.0), ..site("Nowhere", "France") }];
  let err = s.upsert_trial(bad).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Validation);
  let msg = err.to_string();
  assert!(msg.contains("NCT00000006") && msg.contains("location 0"), "{msg}");

  assert_eq!(condition_keys(&s, "NCT00000006").await, ["asthma"]);
  let view = s.get_trial("NCT00000006").await.unwrap().unwrap();
  assert_eq!(view.locations.len(), 1);
  assert_eq!(view.locations[0].city.as_deref(), Some("Lyon"));
  assert_eq!(count(&s, "SELECT COUNT(*) FROM condition").await, 1);
}

#[tokio::test]
async fn failure_mid_transaction_rolls_back_everything() {
  let s = store().await;
  s.upsert_trial(record("NCT00000007", &["Asthma"])).await.unwrap();

  // Any location named "explode" aborts the statement inserting it.
  s.read(|conn| {
    conn.execute_batch(
      "CREATE TRIGGER explode BEFORE INSERT ON location
         WHEN NEW.facility = 'explode'
       BEGIN SELECT RAISE(ABORT, 'injected failure'); END;",
    )?;
    Ok(())
  })
  .await
  .unwrap();

  let boom = NewLocation { facility: Some("explode".into()), ..Default::default() };

  let mut update = record("NCT00000007", &["Influenza"]);
  update.locations = vec![boom.clone()];
  let err = s.upsert_trial(update).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Storage);
  assert!(err.to_string().contains("NCT00000007"), "{err}");
  assert!(matches!(err, crate::Error::Upsert { ref nct_id, .. } if nct_id == "NCT00000007"));

  let mut create = record("NCT00000008", &["Measles"]);
  create.locations = vec![boom];
  assert!(s.upsert_trial(create).await.is_err());

  assert_eq!(condition_keys(&s, "NCT00000007").await, ["asthma"]);
  assert!(s.get_trial("NCT00000008").await.unwrap().is_none());
  assert_eq!(count(&s, "SELECT COUNT(*) FROM condition").await, 1);
  assert_eq!(count(&s, "SELECT COUNT(*) FROM trial").await, 1);
}

#[tokio::test]
async fn inverted_dates_are_accepted() {
  let s = store().await;
  let mut r = record("NCT00000009", &[]);
  r.fields.dates.start_date = NaiveDate::from_ymd_opt(2024, 1, 1);
  r.fields.dates.completion_date = NaiveDate::from_ymd_opt(2020, 1, 1);
  assert!(s.upsert_trial(r).await.unwrap().was_created);
}

// ─── Identity resolution ─────────────────────────────────────────────────────

#[tokio::test]
async fn resolve_is_insensitive_to_case_and_whitespace() {
  let s = store().await;

  let a = s
    .resolve_entity(NewEntity::Condition("Type 2 Diabetes Mellitus".into()))
    .await
    .unwrap();
  let b = s
    .resolve_entity(NewEntity::Condition("  type 2   DIABETES mellitus".into()))
    .await
    .unwrap();

  assert_eq!(a, b);
  let conditions = s.list_conditions(Page::default()).await.unwrap();
  assert_eq!(conditions.len(), 1);
  assert_eq!(conditions[0].name, "Type 2 Diabetes Mellitus");
  assert_eq!(conditions[0].normalized_name, "type 2 diabetes mellitus");
}

#[tokio::test]
async fn resolve_blank_name_is_a_validation_error() {
  let s = store().await;
  let err = s
    .resolve_entity(NewEntity::Condition(" ?! ".into()))
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Validation);
  assert!(err.to_string().contains("condition"));
}

#[tokio::test]
async fn repeated_collisions_surface_as_conflict() {
  let s = store().await;

  // Every insert of "race" first plants a duplicate key, so the insert keeps
  // hitting the UNIQUE index and the planted row is undone with it.
  s.read(|conn| {
    conn.execute_batch(
      "CREATE TRIGGER collide BEFORE INSERT ON condition
         WHEN NEW.normalized_name = 'race'
       BEGIN
         INSERT INTO condition (name, normalized_name, created_at)
         VALUES (NEW.name, NEW.normalized_name, NEW.created_at);
       END;",
    )?;
    Ok(())
  })
  .await
  .unwrap();

  let err = s
    .resolve_entity(NewEntity::Condition("Race".into()))
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Conflict);
  assert!(matches!(
    err,
    crate::Error::ResolveConflict { attempts: crate::resolver::MAX_RESOLVE_ATTEMPTS, .. }
  ));

  let err = s
    .upsert_trial(record("NCT00000078", &["Asthma", "Race"]))
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Conflict);
  let msg = err.to_string();
  assert!(msg.contains("NCT00000078") && msg.contains("condition:race"), "{msg}");

  assert_eq!(count(&s, "SELECT COUNT(*) FROM trial").await, 0);
  assert_eq!(count(&s, "SELECT COUNT(*) FROM condition").await, 0);

  // Other names are unaffected.
  s.upsert_trial(record("NCT00000078", &["Asthma"])).await.unwrap();
}

#[tokio::test]
async fn blank_names_in_a_record_are_skipped() {
  let s = store().await;
  s.upsert_trial(record("NCT00000010", &["Asthma", "   ", "--"]))
    .await
    .unwrap();
  assert_eq!(condition_keys(&s, "NCT00000010").await, ["asthma"]);
}

#[tokio::test]
async fn interventions_dedupe_by_name_and_type() {
  let s = store().await;

  let drug = s
    .resolve_entity(NewEntity::Intervention(NewIntervention::new("Metformin", Some("Drug"))))
    .await
    .unwrap();
  let drug_again = s
    .resolve_entity(NewEntity::Intervention(NewIntervention::new("METFORMIN", Some("drug"))))
    .await
    .unwrap();
  let other = s
    .resolve_entity(NewEntity::Intervention(NewIntervention::new("Metformin", Some("Other"))))
    .await
    .unwrap();
  let untyped = s
    .resolve_entity(NewEntity::Intervention(NewIntervention::new("Metformin", None)))
    .await
    .unwrap();

  assert_eq!(drug, drug_again);
  assert_ne!(drug, other);
  assert_ne!(drug, untyped);
  assert_eq!(count(&s, "SELECT COUNT(*) FROM intervention").await, 3);
}

#[tokio::test]
async fn intervention_description_fills_gap_only() {
  let s = store().await;

  let bare = NewIntervention::new("Aspirin", Some("Drug"));
  let described = NewIntervention {
    description: Some("81 mg daily".into()),
    ..bare.clone()
  };
  let redescribed = NewIntervention {
    description: Some("325 mg daily".into()),
    ..bare.clone()
  };

  let id = s.resolve_entity(NewEntity::Intervention(bare)).await.unwrap();
  s.resolve_entity(NewEntity::Intervention(described)).await.unwrap();
  let same = s.resolve_entity(NewEntity::Intervention(redescribed)).await.unwrap();
  assert_eq!(id, same);

  let all = s.list_interventions(Page::default()).await.unwrap();
  assert_eq!(all.len(), 1);
  assert_eq!(all[0].description.as_deref(), Some("81 mg daily"));
  assert_eq!(all[0].intervention_type.as_deref(), Some("Drug"));
}

// ─── Relationship diffing ────────────────────────────────────────────────────

#[tokio::test]
async fn condition_set_is_replaced_not_merged() {
  let s = store().await;

  s.upsert_trial(record("NCT00000011", &["Alpha", "Beta"])).await.unwrap();
  let beta_before = s
    .resolve_entity(NewEntity::Condition("beta".into()))
    .await
    .unwrap();

  s.upsert_trial(record("NCT00000011", &["Beta", "Gamma"])).await.unwrap();
  let beta_after = s
    .resolve_entity(NewEntity::Condition("BETA".into()))
    .await
    .unwrap();

  assert_eq!(beta_before, beta_after);
  assert_eq!(condition_keys(&s, "NCT00000011").await, ["beta", "gamma"]);
  assert_eq!(count(&s, "SELECT COUNT(*) FROM trial_condition").await, 2);
  // Canonical entities outlive their links.
  assert_eq!(count(&s, "SELECT COUNT(*) FROM condition").await, 3);
}

#[tokio::test]
async fn intervention_links_follow_the_record() {
  let s = store().await;

  let mut r = record("NCT00000012", &[]);
  r.interventions = vec![
    NewIntervention::new("Drug A", Some("Drug")),
    NewIntervention::new("Counselling", Some("Behavioral")),
  ];
  s.upsert_trial(r.clone()).await.unwrap();

  r.interventions.remove(0);
  s.upsert_trial(r).await.unwrap();

  let view = s.get_trial("NCT00000012").await.unwrap().unwrap();
  assert_eq!(view.interventions.len(), 1);
  assert_eq!(view.interventions[0].normalized_name, "counselling");
  assert_eq!(count(&s, "SELECT COUNT(*) FROM trial_intervention").await, 1);
}

#[tokio::test]
async fn clearing_all_entities_removes_all_links() {
  let s = store().await;
  s.upsert_trial(record("NCT00000013", &["Alpha", "Beta"])).await.unwrap();
  s.upsert_trial(record("NCT00000013", &[])).await.unwrap();
  assert_eq!(count(&s, "SELECT COUNT(*) FROM trial_condition").await, 0);
}

// ─── Locations ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn locations_are_replaced_on_update() {
  let s = store().await;

  let mut r = record("NCT00000014", &[]);
  r.locations = vec![site("Paris", "France"), site("Berlin", "Germany")];
  s.upsert_trial(r.clone()).await.unwrap();

  r.locations = vec![NewLocation {
    latitude: Some(-33.86),
    longitude: Some(151.2),
    ..site("Sydney", "Australia")
  }];
  s.upsert_trial(r).await.unwrap();

  let view = s.get_trial("NCT00000014").await.unwrap().unwrap();
  assert_eq!(view.locations.len(), 1);
  assert_eq!(view.locations[0].city.as_deref(), Some("Sydney"));
  assert_eq!(view.locations[0].latitude, Some(-33.86));
  assert_eq!(count(&s, "SELECT COUNT(*) FROM location").await, 1);
}

// ─── Deletion ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn delete_leaves_no_orphans() {
  let s = store().await;

  let mut r = record("NCT00000015", &["Asthma", "COPD"]);
  r.interventions = vec![NewIntervention::new("Salbutamol", Some("Drug"))];
  r.locations = vec![site("Oslo", "Norway"), site("Bergen", "Norway")];
  s.upsert_trial(r).await.unwrap();
  s.upsert_trial(record("NCT00000016", &["Asthma"])).await.unwrap();

  s.delete_trial("NCT00000015").await.unwrap();

  assert!(s.get_trial("NCT00000015").await.unwrap().is_none());
  assert_eq!(count(&s, "SELECT COUNT(*) FROM trial_intervention").await, 0);
  assert_eq!(count(&s, "SELECT COUNT(*) FROM location").await, 0);
  // The other trial's link survives.
  assert_eq!(count(&s, "SELECT COUNT(*) FROM trial_condition").await, 1);
  assert_eq!(
    count(
      &s,
      "SELECT COUNT(*) FROM trial_condition
        WHERE trial_id NOT IN (SELECT trial_id FROM trial)"
    )
    .await,
    0
  );

  let err = s.delete_trial("NCT00000015").await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);
  assert!(matches!(err, crate::Error::TrialNotFound(ref id) if id == "NCT00000015"));
}

#[tokio::test]
async fn delete_unknown_trial_is_not_found() {
  let s = store().await;
  let err = s.delete_trial("NCT99999999").await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn deleted_trial_can_be_ingested_again() {
  let s = store().await;
  s.upsert_trial(record("NCT00000017", &["Asthma"])).await.unwrap();
  s.delete_trial("NCT00000017").await.unwrap();
  let again = s.upsert_trial(record("NCT00000017", &["Asthma"])).await.unwrap();
  assert!(again.was_created);
  assert_eq!(count(&s, "SELECT COUNT(*) FROM condition").await, 1);
}

// ─── End to end ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn duplicate_spellings_collapse_to_one_link() {
  let s = store().await;

  s.upsert_trial(record(
    "NCT00000001",
    &["Type 2 Diabetes Mellitus", "type 2 diabetes mellitus"],
  ))
  .await
  .unwrap();
  assert_eq!(count(&s, "SELECT COUNT(*) FROM condition").await, 1);
  assert_eq!(count(&s, "SELECT COUNT(*) FROM trial_condition").await, 1);
  let before = s.list_conditions(Page::default()).await.unwrap();

  s.upsert_trial(record("NCT00000001", &["Type 2 Diabetes Mellitus"]))
    .await
    .unwrap();
  assert_eq!(count(&s, "SELECT COUNT(*) FROM condition").await, 1);
  assert_eq!(count(&s, "SELECT COUNT(*) FROM trial_condition").await, 1);
  let after = s.list_conditions(Page::default()).await.unwrap();
  assert_eq!(before[0].condition_id, after[0].condition_id);
}

// ─── Query facade ────────────────────────────────────────────────────────────

#[tokio::test]
async fn find_by_condition_orders_and_paginates() {
  let s = store().await;
  for id in ["NCT00000021", "NCT00000022", "NCT00000023"] {
    s.upsert_trial(record(id, &["Asthma"])).await.unwrap();
  }
  s.upsert_trial(record("NCT00000024", &["Migraine"])).await.unwrap();

  let first = s.find_by_condition("asthma", Page::new(0, 2)).await.unwrap();
  let rest = s.find_by_condition("asthma", Page::new(2, 2)).await.unwrap();

  let ids: Vec<_> = first.iter().chain(&rest).map(|t| t.nct_id.as_str()).collect();
  assert_eq!(ids, ["NCT00000021", "NCT00000022", "NCT00000023"]);
  assert!(first[0].trial_id < first[1].trial_id);
  assert_eq!(first[0].brief_title.as_deref(), Some("Study NCT00000021"));
}

#[tokio::test]
async fn find_by_condition_normalizes_the_key() {
  let s = store().await;
  s.upsert_trial(record("NCT00000025", &["Crohn's Disease"])).await.unwrap();

  let hits = s
    .find_by_condition("  CROHNS disease", Page::default())
    .await
    .unwrap();
  assert_eq!(hits.len(), 1);
  assert!(s.find_by_condition("colitis", Page::default()).await.unwrap().is_empty());
}

#[tokio::test]
async fn find_by_intervention_spans_types() {
  let s = store().await;

  let mut a = record("NCT00000026", &[]);
  a.interventions = vec![
    NewIntervention::new("Exercise", Some("Behavioral")),
    NewIntervention::new("Exercise", Some("Other")),
  ];
  s.upsert_trial(a).await.unwrap();

  let mut b = record("NCT00000027", &[]);
  b.interventions = vec![NewIntervention::new("exercise", None)];
  s.upsert_trial(b).await.unwrap();

  let hits = s.find_by_intervention("Exercise", Page::default()).await.unwrap();
  let ids: Vec<_> = hits.iter().map(|t| t.nct_id.as_str()).collect();
  assert_eq!(ids, ["NCT00000026", "NCT00000027"]);
}

#[tokio::test]
async fn find_by_location_country() {
  let s = store().await;

  let mut a = record("NCT00000028", &[]);
  a.locations = vec![site("Kyoto", "Japan"), site("Osaka", "Japan")];
  s.upsert_trial(a).await.unwrap();

  let mut b = record("NCT00000029", &[]);
  b.locations = vec![site("Seoul", "Korea, Republic of")];
  s.upsert_trial(b).await.unwrap();

  let japan = s.find_by_location_country("JAPAN", Page::default()).await.unwrap();
  assert_eq!(japan.len(), 1);
  assert_eq!(japan[0].nct_id, "NCT00000028");

  let korea = s
    .find_by_location_country("korea republic of", Page::default())
    .await
    .unwrap();
  assert_eq!(korea.len(), 1);
}

#[tokio::test]
async fn zero_limit_returns_nothing() {
  let s = store().await;
  s.upsert_trial(record("NCT00000030", &["Asthma"])).await.unwrap();
  assert!(s.find_by_condition("asthma", Page::new(0, 0)).await.unwrap().is_empty());
}

#[tokio::test]
async fn offset_beyond_i64_is_past_the_end() {
  let s = store().await;
  s.upsert_trial(record("NCT00000031", &["Asthma"])).await.unwrap();
  let hits = s
    .find_by_condition("asthma", Page::new(usize::MAX, 10))
    .await
    .unwrap();
  assert!(hits.is_empty());
  assert!(s.list_conditions(Page::new(usize::MAX, 10)).await.unwrap().is_empty());
}

#[tokio::test]
async fn get_trial_unknown_is_none() {
  let s = store().await;
  assert!(s.get_trial("NCT12345678").await.unwrap().is_none());
}

// ─── Concurrency ─────────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_resolution_creates_one_entity() {
  let dir = tempfile::tempdir().unwrap();
  let s = file_store(&dir).await;

  let spellings = [
    "Type 2 Diabetes Mellitus",
    "type 2 diabetes mellitus",
    "TYPE 2 DIABETES-MELLITUS",
    " Type  2 Diabetes Mellitus ",
  ];

  let mut tasks = tokio::task::JoinSet::new();
  for i in 0..16 {
    let s = s.clone();
    let name = spellings[i % spellings.len()].to_string();
    tasks.spawn(async move { s.resolve_entity(NewEntity::Condition(name)).await });
  }

  let mut ids = BTreeSet::new();
  while let Some(joined) = tasks.join_next().await {
    ids.insert(joined.unwrap().unwrap());
  }

  assert_eq!(ids.len(), 1);
  assert_eq!(count(&s, "SELECT COUNT(*) FROM condition").await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_upserts_of_one_trial_serialize() {
  let dir = tempfile::tempdir().unwrap();
  let s = file_store(&dir).await;

  let mut tasks = tokio::task::JoinSet::new();
  for i in 0..8 {
    let s = s.clone();
    tasks.spawn(async move {
      let only = format!("Only {i}");
      s.upsert_trial(record("NCT00000042", &["Shared", only.as_str()])).await
    });
  }

  let mut created = 0;
  while let Some(joined) = tasks.join_next().await {
    if joined.unwrap().unwrap().was_created {
      created += 1;
    }
  }
  assert_eq!(created, 1);

  let keys = condition_keys(&s, "NCT00000042").await;
  assert_eq!(keys.len(), 2);
  assert!(keys.contains(&"shared".to_string()));
  assert_eq!(count(&s, "SELECT COUNT(*) FROM trial").await, 1);
  assert_eq!(count(&s, "SELECT COUNT(*) FROM trial_condition").await, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_upserts_of_distinct_trials_share_entities() {
  let dir = tempfile::tempdir().unwrap();
  let s = file_store(&dir).await;

  let mut tasks = tokio::task::JoinSet::new();
  for i in 0..8 {
    let s = s.clone();
    tasks.spawn(async move {
      let mut r = record(&format!("NCT1000000{i}"), &["Hypertension"]);
      r.interventions = vec![NewIntervention::new("Lisinopril", Some("Drug"))];
      s.upsert_trial(r).await
    });
  }

  while let Some(joined) = tasks.join_next().await {
    assert!(joined.unwrap().unwrap().was_created);
  }

  assert_eq!(count(&s, "SELECT COUNT(*) FROM trial").await, 8);
  assert_eq!(count(&s, "SELECT COUNT(*) FROM condition").await, 1);
  assert_eq!(count(&s, "SELECT COUNT(*) FROM intervention").await, 1);
  assert_eq!(count(&s, "SELECT COUNT(*) FROM trial_condition").await, 8);

  let hits = s.find_by_condition("hypertension", Page::default()).await.unwrap();
  assert_eq!(hits.len(), 8);
  assert!(hits.windows(2).all(|w| w[0].trial_id < w[1].trial_id));
}

#[tokio::test]
async fn entity_kinds_are_reported_in_errors() {
  let err = NewEntity::Intervention(NewIntervention::new("", None))
    .key()
    .unwrap_err();
  assert!(matches!(
    err,
    trials_core::Error::EmptyEntityName { kind: EntityKind::Intervention, .. }
  ));
}
