//! SQLite-backed durable store.
//!
//! All namespaces share one [`SqliteAdapter`] (one connection, process-wide).
//! The expiry sweeper never touches that connection: it asks a
//! [`SqliteConnector`] for a fresh one per run.
//!
//! rusqlite is synchronous, so every call hops onto tokio's blocking pool.

use crate::error::{Result, StoreError};
use crate::storage::adapter::{Capability, KvAdapter, RawQuery, SqlParam};
use crate::storage::expiry::{SweepConnection, SweepConnector};
use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::types::ToSqlOutput;
use rusqlite::{params, params_from_iter, Connection, OpenFlags, OptionalExtension, ToSql};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// How long a connection waits on a lock held by another connection.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const CREATE_TABLE_SQL: &str =
    "CREATE TABLE IF NOT EXISTS keyv (key VARCHAR(255) PRIMARY KEY, value TEXT)";

/// Refreshes the `expires` field of one live record without touching its value.
///
/// `?1` is the new expiry in epoch milliseconds, `?2` the composite key.
/// Rows whose stored expiry has already elapsed are left alone so a touch
/// can never revive a logically absent record.
///
/// The elapsed check reads SQLite's wall clock at second precision, not the
/// store's [`Clock`](crate::storage::Clock). A record whose expiry falls in
/// the gap between the two (under a second on a real clock, arbitrary under
/// a pinned test clock) can be refreshed here while a read through the store
/// already treats it as absent, or the other way round.
pub const TOUCH_EXPIRES_SQL: &str = "UPDATE keyv \
     SET value = json_set(value, '$.expires', ?1) \
     WHERE key = ?2 \
     AND (json_extract(value, '$.expires') IS NULL \
     OR json_extract(value, '$.expires') > CAST(strftime('%s', 'now') AS INTEGER) * 1000)";

/// Deletes every record, in every namespace, whose expiry (ms, truncated to
/// seconds) is at or before `?1` (epoch seconds).
pub const DELETE_EXPIRED_SQL: &str =
    "DELETE FROM keyv WHERE CAST(json_extract(value, '$.expires') AS INTEGER) / 1000 <= ?1";

impl ToSql for SqlParam {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            SqlParam::Integer(i) => ToSqlOutput::from(*i),
            SqlParam::Text(s) => ToSqlOutput::from(s.as_str()),
        })
    }
}

/// Where the SQLite database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqliteTarget {
    /// A database file on disk.
    File(PathBuf),
    /// A named shared-cache in-memory database (an SQLite URI).
    Memory(String),
}

impl SqliteTarget {
    /// Parses a `STORAGE_URI` connection string.
    ///
    /// Accepts `sqlite://<path>`, `sqlite:<path>`, a bare path, or
    /// `sqlite::memory:` / `:memory:`.
    pub fn parse(uri: &str) -> Result<Self> {
        let uri = uri.trim();
        let rest = uri
            .strip_prefix("sqlite://")
            .or_else(|| uri.strip_prefix("sqlite:"))
            .unwrap_or(uri);

        if rest.is_empty() {
            return Err(StoreError::InvalidUri(uri.to_string()));
        }
        if rest.contains("://") {
            return Err(StoreError::InvalidUri(format!(
                "{uri} (only sqlite connection strings are supported)"
            )));
        }
        if rest == ":memory:" {
            let name = uuid::Uuid::new_v4().simple();
            return Ok(SqliteTarget::Memory(format!(
                "file:stashkv-{name}?mode=memory&cache=shared"
            )));
        }

        Ok(SqliteTarget::File(PathBuf::from(rest)))
    }
}

/// Opens a configured connection and makes sure the table exists.
fn open_connection(target: &SqliteTarget) -> Result<Connection> {
    let conn = match target {
        SqliteTarget::File(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let conn = Connection::open(path)?;
            conn.execute_batch("PRAGMA journal_mode = WAL;")?;
            conn
        }
        SqliteTarget::Memory(uri) => Connection::open_with_flags(
            uri,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?,
    };
    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.execute(CREATE_TABLE_SQL, [])?;
    Ok(conn)
}

/// The shared durable store used by request traffic.
#[derive(Clone)]
pub struct SqliteAdapter {
    conn: Arc<Mutex<Option<Connection>>>,
    target: SqliteTarget,
}

impl SqliteAdapter {
    /// Opens (or creates) the database behind `target`.
    pub async fn open(target: SqliteTarget) -> Result<Self> {
        let opened = target.clone();
        let conn = tokio::task::spawn_blocking(move || open_connection(&opened)).await??;
        info!(db = ?target, "Opened SQLite backing store");

        Ok(Self {
            conn: Arc::new(Mutex::new(Some(conn))),
            target,
        })
    }

    pub fn target(&self) -> &SqliteTarget {
        &self.target
    }

    /// Runs `op` against the shared connection on the blocking pool.
    async fn run<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock();
            let conn = guard.as_ref().ok_or(StoreError::Closed)?;
            op(conn)
        })
        .await?
    }
}

#[async_trait]
impl KvAdapter for SqliteAdapter {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let key = key.to_string();
        self.run(move |conn| {
            let raw = conn
                .query_row("SELECT value FROM keyv WHERE key = ?1", [&key], |row| {
                    row.get::<_, String>(0)
                })
                .optional()?;
            Ok(raw)
        })
        .await
    }

    async fn set(&self, key: &str, raw: String) -> Result<()> {
        let key = key.to_string();
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO keyv (key, value) VALUES (?1, ?2) \
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, raw],
            )?;
            Ok(())
        })
        .await
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let key = key.to_string();
        self.run(move |conn| Ok(conn.execute("DELETE FROM keyv WHERE key = ?1", [&key])? > 0))
            .await
    }

    async fn disconnect(&self) -> Result<()> {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let taken = conn.lock().take();
            match taken {
                Some(conn) => conn.close().map_err(|(_, e)| StoreError::from(e)),
                None => Ok(()),
            }
        })
        .await?
    }

    fn capability(&self) -> Capability<'_> {
        Capability::RawQuery(self)
    }

    fn kind(&self) -> &'static str {
        "sqlite"
    }
}

#[async_trait]
impl RawQuery for SqliteAdapter {
    async fn execute(&self, sql: &str, params: &[SqlParam]) -> Result<u64> {
        let sql = sql.to_string();
        let params = params.to_vec();
        self.run(move |conn| Ok(conn.execute(&sql, params_from_iter(params.iter()))? as u64))
            .await
    }
}

/// Opens a dedicated connection per sweep run.
#[derive(Debug, Clone)]
pub struct SqliteConnector {
    target: SqliteTarget,
}

impl SqliteConnector {
    pub fn new(target: SqliteTarget) -> Self {
        Self { target }
    }
}

#[async_trait]
impl SweepConnector for SqliteConnector {
    async fn connect(&self) -> Result<Box<dyn SweepConnection>> {
        let target = self.target.clone();
        let conn = tokio::task::spawn_blocking(move || open_connection(&target)).await??;
        debug!("Opened dedicated sweep connection");
        Ok(Box::new(SqliteSweepConnection { conn: Some(conn) }))
    }
}

struct SqliteSweepConnection {
    conn: Option<Connection>,
}

#[async_trait]
impl SweepConnection for SqliteSweepConnection {
    async fn execute(&mut self, sql: &str, params: &[SqlParam]) -> Result<u64> {
        let conn = self.conn.take().ok_or(StoreError::Closed)?;
        let sql = sql.to_string();
        let params = params.to_vec();

        let (conn, result) = tokio::task::spawn_blocking(move || {
            let result = conn.execute(&sql, params_from_iter(params.iter()));
            (conn, result)
        })
        .await?;

        self.conn = Some(conn);
        Ok(result? as u64)
    }

    async fn close(&mut self) -> Result<()> {
        let Some(conn) = self.conn.take() else {
            return Ok(());
        };
        tokio::task::spawn_blocking(move || conn.close().map_err(|(_, e)| StoreError::from(e)))
            .await?
    }
}
