//! Record persistence on SQLite
//!
//! - `StoreHandle` - process-wide connection owner, opened lazily, closed at shutdown
//! - `RecordGateway` - deduplicating writer and recent-record reader
//! - `SqliteRecordGateway` - `RecordGateway` over one collection table
//!
//! Deduplication is done by the store: a unique index on `created_at`
//! rejects repeated timestamps, including ones written by overlapping runs.

use super::config::{Settings, StoreConfig};
use super::error::PipelineError;
use super::types::{format_feed_timestamp, parse_feed_timestamp, Record, FIELD_COUNT};
use async_trait::async_trait;
use rusqlite::{params_from_iter, Connection};
use std::sync::{Arc, Mutex, MutexGuard};

/// Default size of the recent-records window
pub const RECENT_LIMIT: usize = 50;

#[async_trait]
pub trait RecordGateway: Send + Sync {
    /// Insert each record independently
    ///
    /// Returns the number of newly inserted records. Duplicates and
    /// per-record failures are skipped, never raised.
    async fn save(&self, records: Vec<Record>) -> Result<usize, PipelineError>;

    /// Newest records first, at most `limit`
    async fn find_recent(&self, limit: usize) -> Result<Vec<Record>, PipelineError>;
}

struct OpenStore {
    config: StoreConfig,
    conn: Arc<Mutex<Connection>>,
}

/// Shared, lazily opened store connection
///
/// Clone to share; all clones refer to the same connection.
#[derive(Clone)]
pub struct StoreHandle {
    settings: Arc<Settings>,
    inner: Arc<Mutex<Option<OpenStore>>>,
}

impl StoreHandle {
    pub fn new(settings: Arc<Settings>) -> Self {
        Self {
            settings,
            inner: Arc::new(Mutex::new(None)),
        }
    }

    /// Poisoning is recovered: `inner` is only written after a successful open
    fn lock_inner(&self) -> MutexGuard<'_, Option<OpenStore>> {
        self.inner.lock().unwrap_or_else(|poisoned| {
            log::warn!("⚠️  Store handle lock was poisoned by a panicked task, recovering");
            self.inner.clear_poison();
            poisoned.into_inner()
        })
    }

    /// Connection and collection config, opening the database on first use
    fn acquire(&self) -> Result<(Arc<Mutex<Connection>>, StoreConfig), PipelineError> {
        let mut guard = self.lock_inner();

        if let Some(open) = guard.as_ref() {
            return Ok((open.conn.clone(), open.config.clone()));
        }

        let config = self.settings.store()?;
        let db_file = config.db_file();
        if let Some(parent) = db_file.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(&db_file)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        log::info!("✅ Store connection established: {}", db_file.display());

        let conn = Arc::new(Mutex::new(conn));
        *guard = Some(OpenStore {
            config: config.clone(),
            conn: conn.clone(),
        });

        Ok((conn, config))
    }

    fn open_gateway(&self) -> Result<SqliteRecordGateway, PipelineError> {
        let (conn, config) = self.acquire()?;
        SqliteRecordGateway::new(conn, &config.collection)
    }

    /// Gateway over the configured collection
    ///
    /// Opening the file and running the table DDL happen on the blocking pool.
    pub async fn gateway(&self) -> Result<SqliteRecordGateway, PipelineError> {
        let handle = self.clone();
        tokio::task::spawn_blocking(move || handle.open_gateway()).await?
    }

    pub fn is_open(&self) -> bool {
        self.lock_inner().is_some()
    }

    /// Drop the shared connection; the next `gateway()` call reopens it
    ///
    /// Gateways created earlier keep their own reference until dropped.
    pub fn close(&self) {
        if self.lock_inner().take().is_some() {
            log::info!("🔒 Store connection closed");
        }
    }
}

pub struct SqliteRecordGateway {
    conn: Arc<Mutex<Connection>>,
    table: String,
}

impl SqliteRecordGateway {
    /// Create the collection table if needed and ensure the unique index
    ///
    /// `table` must be a plain identifier (see `Settings::store`).
    pub fn new(conn: Arc<Mutex<Connection>>, table: &str) -> Result<Self, PipelineError> {
        let gateway = Self {
            conn,
            table: table.to_string(),
        };

        {
            let conn = gateway.lock()?;
            let columns: Vec<String> = (1..=FIELD_COUNT)
                .map(|n| format!("field{} REAL", n))
                .collect();
            conn.execute(
                &format!(
                    "CREATE TABLE IF NOT EXISTS {} (
                        id INTEGER PRIMARY KEY AUTOINCREMENT,
                        created_at TEXT NOT NULL,
                        {}
                    )",
                    gateway.table,
                    columns.join(", ")
                ),
                [],
            )?;

            if let Err(e) = Self::ensure_unique_index(&conn, &gateway.table) {
                log::warn!("⚠️  Could not create unique index on created_at: {}", e);
            }
        }

        Ok(gateway)
    }

    /// Idempotent: a no-op when the index already exists
    fn ensure_unique_index(conn: &Connection, table: &str) -> Result<(), rusqlite::Error> {
        conn.execute(
            &format!(
                "CREATE UNIQUE INDEX IF NOT EXISTS idx_{0}_created_at ON {0}(created_at)",
                table
            ),
            [],
        )?;
        log::debug!("Unique index on {}.created_at ensured", table);
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, PipelineError> {
        lock_connection(&self.conn)
    }
}

fn lock_connection(conn: &Mutex<Connection>) -> Result<std::sync::MutexGuard<'_, Connection>, PipelineError> {
    conn.lock()
        .map_err(|_| PipelineError::Task("store connection lock poisoned".to_string()))
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

#[derive(Debug, Default, PartialEq)]
struct InsertSummary {
    inserted: usize,
    duplicates: usize,
    failed: usize,
}

fn insert_records(conn: &Connection, table: &str, records: &[Record]) -> InsertSummary {
    let columns: Vec<String> = (1..=FIELD_COUNT).map(|n| format!("field{}", n)).collect();
    let placeholders: Vec<String> = (1..=FIELD_COUNT + 1).map(|n| format!("?{}", n)).collect();
    let sql = format!(
        "INSERT INTO {} (created_at, {}) VALUES ({})",
        table,
        columns.join(", "),
        placeholders.join(", ")
    );

    let mut summary = InsertSummary::default();

    for record in records {
        let created_at = format_feed_timestamp(&record.created_at());
        let values = std::iter::once(rusqlite::types::Value::Text(created_at.clone())).chain(
            record.fields().iter().map(|v| match v {
                Some(v) => rusqlite::types::Value::Real(*v),
                None => rusqlite::types::Value::Null,
            }),
        );

        match conn.execute(&sql, params_from_iter(values)) {
            Ok(_) => summary.inserted += 1,
            Err(e) if is_unique_violation(&e) => summary.duplicates += 1,
            Err(e) => {
                log::error!("❌ Unexpected error saving record {}: {}", created_at, e);
                summary.failed += 1;
            }
        }
    }

    log::debug!(
        "Saved {} of {} records to {} ({} duplicates, {} failed)",
        summary.inserted,
        records.len(),
        table,
        summary.duplicates,
        summary.failed
    );
    summary
}

fn select_recent(conn: &Connection, table: &str, limit: usize) -> Result<Vec<Record>, PipelineError> {
    let columns: Vec<String> = (1..=FIELD_COUNT).map(|n| format!("field{}", n)).collect();
    let mut stmt = conn.prepare(&format!(
        "SELECT id, created_at, {} FROM {} ORDER BY created_at DESC LIMIT ?1",
        columns.join(", "),
        table
    ))?;

    let rows = stmt.query_map([limit as i64], |row| {
        let id: i64 = row.get(0)?;
        let created_at: String = row.get(1)?;
        let mut fields = [None; FIELD_COUNT];
        for (idx, slot) in fields.iter_mut().enumerate() {
            *slot = row.get::<_, Option<f64>>(idx + 2)?;
        }
        Ok((id, created_at, fields))
    })?;

    let mut records = Vec::new();
    for row in rows {
        let (id, created_at, fields) = row?;
        match parse_feed_timestamp(&created_at) {
            Ok(ts) => records.push(Record::persisted(id.to_string(), ts, fields)),
            Err(e) => log::warn!("⚠️  Stored record {} has bad created_at '{}': {}", id, created_at, e),
        }
    }

    Ok(records)
}

#[async_trait]
impl RecordGateway for SqliteRecordGateway {
    async fn save(&self, records: Vec<Record>) -> Result<usize, PipelineError> {
        if records.is_empty() {
            return Ok(0);
        }

        let conn = self.conn.clone();
        let table = self.table.clone();

        tokio::task::spawn_blocking(move || -> Result<usize, PipelineError> {
            let conn = lock_connection(&conn)?;
            Ok(insert_records(&conn, &table, &records).inserted)
        })
        .await?
    }

    async fn find_recent(&self, limit: usize) -> Result<Vec<Record>, PipelineError> {
        let conn = self.conn.clone();
        let table = self.table.clone();

        tokio::task::spawn_blocking(move || -> Result<Vec<Record>, PipelineError> {
            let conn = lock_connection(&conn)?;
            select_recent(&conn, &table, limit)
        })
        .await?
    }
}
