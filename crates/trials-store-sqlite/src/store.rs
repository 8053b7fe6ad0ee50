//! [`SqliteStore`], the SQLite implementation of [`TrialStore`].

use std::{
  path::Path,
  sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
  },
};

use chrono::Utc;
use rusqlite::Connection;
use tracing::debug;
use trials_core::{
  entity::{Condition, EntityId, Intervention, NewEntity},
  store::{Page, TrialStore, UpsertOutcome},
  trial::{TrialRecord, TrialSummary, TrialView, validate_nct_id},
};

use crate::{
  Result, StoreConfig,
  locks::KeyedLocks,
  query,
  schema::{CONNECTION_PRAGMAS, SCHEMA},
  upsert,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A clinical-trial store backed by a single SQLite file.
///
/// Clones share the connections and the per-trial lock table.
#[derive(Clone)]
pub struct SqliteStore {
  conns:  Arc<[tokio_rusqlite::Connection]>,
  next:   Arc<AtomicUsize>,
  locks:  KeyedLocks,
  config: StoreConfig,
}

impl SqliteStore {
  /// Open (or create) a store at `path` with default settings.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    Self::with_config(path, StoreConfig::default()).await
  }

  /// Open (or create) a store at `path`, run schema initialisation, and open
  /// `config.connections` connections against it.
  pub async fn with_config(path: impl AsRef<Path>, config: StoreConfig) -> Result<Self> {
    let path = path.as_ref();
    let first = tokio_rusqlite::Connection::open(path).await?;
    init_connection(&first, &config, true).await?;

    let mut conns = vec![first];
    for _ in 1..config.connections.max(1) {
      let conn = tokio_rusqlite::Connection::open(path).await?;
      init_connection(&conn, &config, false).await?;
      conns.push(conn);
    }

    debug!(path = %path.display(), connections = conns.len(), "opened trial store");
    Ok(Self::from_parts(conns, config))
  }

  /// Open a single-connection in-memory store.
  pub async fn open_in_memory() -> Result<Self> {
    let config = StoreConfig { connections: 1, ..StoreConfig::default() };
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    init_connection(&conn, &config, true).await?;
    Ok(Self::from_parts(vec![conn], config))
  }

  fn from_parts(conns: Vec<tokio_rusqlite::Connection>, config: StoreConfig) -> Self {
    Self {
      conns: conns.into(),
      next: Arc::new(AtomicUsize::new(0)),
      locks: KeyedLocks::new(),
      config,
    }
  }

  /// Round-robin over the open connections.
  fn conn(&self) -> &tokio_rusqlite::Connection {
    let i = self.next.fetch_add(1, Ordering::Relaxed) % self.conns.len();
    &self.conns[i]
  }

  /// Run a read on some connection.
  pub(crate) async fn read<T, F>(&self, f: F) -> Result<T>
  where
    F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    T: Send + 'static,
  {
    self.conn().call(move |conn| Ok(f(conn))).await?
  }

  /// Run a write unit of work, re-running it from scratch while the database
  /// reports lock contention.
  async fn write<T, F>(&self, f: F) -> Result<T>
  where
    F: Fn(&mut Connection) -> Result<T> + Send + Sync + 'static,
    T: Send + 'static,
  {
    let f = Arc::new(f);
    let mut attempt = 0;
    loop {
      attempt += 1;
      let op = Arc::clone(&f);
      let result = self.conn().call(move |conn| Ok((*op)(conn))).await?;
      match result {
        Err(e) if e.is_busy() && attempt <= self.config.max_busy_retries => {
          debug!(attempt, error = %e, "database busy; retrying write");
          tokio::time::sleep(self.config.retry_delay(attempt)).await;
        }
        other => return other,
      }
    }
  }
}

async fn init_connection(
  conn: &tokio_rusqlite::Connection,
  config: &StoreConfig,
  create_schema: bool,
) -> Result<()> {
  let busy_timeout = config.busy_timeout();
  conn
    .call(move |conn| {
      conn.busy_timeout(busy_timeout)?;
      conn.execute_batch(CONNECTION_PRAGMAS)?;
      if create_schema {
        conn.execute_batch(SCHEMA)?;
      }
      Ok(())
    })
    .await?;
  Ok(())
}

// ─── TrialStore impl ─────────────────────────────────────────────────────────

impl TrialStore for SqliteStore {
  type Error = crate::Error;

  // ── Writes ────────────────────────────────────────────────────────────────

  async fn upsert_trial(&self, record: TrialRecord) -> Result<UpsertOutcome> {
    let nct_id = validate_nct_id(&record.nct_id)?.to_owned();
    let _guard = self.locks.acquire(&nct_id).await;

    let record = Arc::new(record);
    self
      .write(move |conn| upsert::upsert_trial(conn, &record, Utc::now()))
      .await
      .map_err(|e| e.for_trial(&nct_id))
  }

  async fn delete_trial(&self, nct_id: &str) -> Result<()> {
    let nct_id = validate_nct_id(nct_id)?.to_owned();
    let _guard = self.locks.acquire(&nct_id).await;

    self
      .write(move |conn| upsert::delete_trial(conn, &nct_id))
      .await
  }

  async fn resolve_entity(&self, entity: NewEntity) -> Result<EntityId> {
    // Fail fast on blank names without touching the database.
    entity.key()?;
    self
      .write(move |conn| upsert::resolve_entity(conn, &entity, Utc::now()))
      .await
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  async fn get_trial(&self, nct_id: &str) -> Result<Option<TrialView>> {
    let nct_id = validate_nct_id(nct_id)?.to_owned();
    self.read(move |conn| query::get_trial(conn, &nct_id)).await
  }

  async fn find_by_condition(&self, key: &str, page: Page) -> Result<Vec<TrialSummary>> {
    let key = key.to_owned();
    self
      .read(move |conn| query::find_by_condition(conn, &key, page))
      .await
  }

  async fn find_by_intervention(&self, key: &str, page: Page) -> Result<Vec<TrialSummary>> {
    let key = key.to_owned();
    self
      .read(move |conn| query::find_by_intervention(conn, &key, page))
      .await
  }

  async fn find_by_location_country(
    &self,
    country: &str,
    page: Page,
  ) -> Result<Vec<TrialSummary>> {
    let country = country.to_owned();
    self
      .read(move |conn| query::find_by_location_country(conn, &country, page))
      .await
  }

  async fn list_conditions(&self, page: Page) -> Result<Vec<Condition>> {
    self.read(move |conn| query::list_conditions(conn, page)).await
  }

  async fn list_interventions(&self, page: Page) -> Result<Vec<Intervention>> {
    self.read(move |conn| query::list_interventions(conn, page)).await
  }
}
