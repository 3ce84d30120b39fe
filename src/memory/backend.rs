//! Trace persistence backends.
//!
//! A backend is an append-only keyed store with a full scan, used to
//! rehydrate the working set at startup. Keys look like
//! `trace:{timestamp_ms}:{seq}`; values are JSON-serialised [`Trace`]s.

use super::{MemoryError, Trace};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;

/// Key prefix shared by every persisted trace.
pub const TRACE_KEY_PREFIX: &str = "trace:";

/// Build the key for a trace.
pub fn trace_key(timestamp_ms: u64, seq: u64) -> String {
    format!("{TRACE_KEY_PREFIX}{timestamp_ms}:{seq}")
}

/// Append-only keyed trace storage.
#[async_trait]
pub trait TraceBackend: Send + Sync {
    /// Store `trace` under `key`.
    async fn append(&self, key: &str, trace: &Trace) -> Result<(), MemoryError>;

    /// Every stored `(key, trace)` pair whose key carries the trace prefix,
    /// oldest first.
    async fn scan(&self) -> Result<Vec<(String, Trace)>, MemoryError>;
}

// ── In-memory ────────────────────────────────────────────────────────────

/// Process-local backend; useful in tests and when no database is wanted.
#[derive(Default)]
pub struct InMemoryBackend {
    entries: Mutex<BTreeMap<String, Trace>>,
}

impl InMemoryBackend {
    /// Empty backend.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TraceBackend for InMemoryBackend {
    async fn append(&self, key: &str, trace: &Trace) -> Result<(), MemoryError> {
        let mut entries = self.entries.lock().map_err(|_| MemoryError::LockPoisoned)?;
        entries.insert(key.to_string(), trace.clone());
        Ok(())
    }

    async fn scan(&self) -> Result<Vec<(String, Trace)>, MemoryError> {
        let entries = self.entries.lock().map_err(|_| MemoryError::LockPoisoned)?;
        let mut out: Vec<(String, Trace)> = entries
            .iter()
            .filter(|(k, _)| k.starts_with(TRACE_KEY_PREFIX))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        out.sort_by_key(|(_, t)| t.timestamp_ms);
        Ok(out)
    }
}

// ── SQLite ───────────────────────────────────────────────────────────────

#[cfg(feature = "persistence")]
pub use sqlite::SqliteTraceBackend;

#[cfg(feature = "persistence")]
mod sqlite {
    use super::{MemoryError, Trace, TraceBackend, TRACE_KEY_PREFIX};
    use async_trait::async_trait;
    use rusqlite::{params, Connection};
    use std::path::Path;
    use std::sync::{Arc, Mutex};
    use tracing::warn;

    const SCHEMA: &str = r"
        CREATE TABLE IF NOT EXISTS traces (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );
    ";

    /// SQLite key/value store of JSON traces.
    ///
    /// Every statement runs on `spawn_blocking`; the connection is shared
    /// behind a mutex.
    pub struct SqliteTraceBackend {
        conn: Arc<Mutex<Connection>>,
    }

    fn storage(e: rusqlite::Error) -> MemoryError {
        MemoryError::Storage(e.to_string())
    }

    impl SqliteTraceBackend {
        /// Open (creating if needed) the database at `path`.
        ///
        /// # Errors
        ///
        /// [`MemoryError::Storage`] if the directory, file or schema cannot
        /// be created.
        pub async fn open(path: impl AsRef<Path>) -> Result<Self, MemoryError> {
            let path = path.as_ref().to_path_buf();
            let conn = tokio::task::spawn_blocking(move || -> Result<Connection, MemoryError> {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        MemoryError::Storage(format!(
                            "failed to create {}: {e}",
                            parent.display()
                        ))
                    })?;
                }
                let conn = Connection::open(&path).map_err(storage)?;
                Self::initialize(&conn)?;
                Ok(conn)
            })
            .await
            .map_err(|e| MemoryError::Join(e.to_string()))??;
            Ok(Self {
                conn: Arc::new(Mutex::new(conn)),
            })
        }

        /// In-memory database.
        ///
        /// # Errors
        ///
        /// [`MemoryError::Storage`] if the schema cannot be created.
        pub fn open_in_memory() -> Result<Self, MemoryError> {
            let conn = Connection::open_in_memory().map_err(storage)?;
            Self::initialize(&conn)?;
            Ok(Self {
                conn: Arc::new(Mutex::new(conn)),
            })
        }

        #[cfg(test)]
        pub(crate) fn connection(&self) -> &Mutex<Connection> {
            &self.conn
        }

        fn initialize(conn: &Connection) -> Result<(), MemoryError> {
            conn.execute_batch("PRAGMA journal_mode=WAL;")
                .map_err(storage)?;
            conn.execute_batch(SCHEMA).map_err(storage)
        }
    }

    #[async_trait]
    impl TraceBackend for SqliteTraceBackend {
        async fn append(&self, key: &str, trace: &Trace) -> Result<(), MemoryError> {
            let value = serde_json::to_string(trace)?;
            let key = key.to_string();
            let conn = Arc::clone(&self.conn);
            tokio::task::spawn_blocking(move || -> Result<(), MemoryError> {
                let conn = conn.lock().map_err(|_| MemoryError::LockPoisoned)?;
                conn.execute(
                    "INSERT OR REPLACE INTO traces (key, value) VALUES (?1, ?2)",
                    params![key, value],
                )
                .map_err(storage)?;
                Ok(())
            })
            .await
            .map_err(|e| MemoryError::Join(e.to_string()))?
        }

        async fn scan(&self) -> Result<Vec<(String, Trace)>, MemoryError> {
            let conn = Arc::clone(&self.conn);
            let rows = tokio::task::spawn_blocking(
                move || -> Result<Vec<(String, String)>, MemoryError> {
                    let conn = conn.lock().map_err(|_| MemoryError::LockPoisoned)?;
                    let mut stmt = conn
                        .prepare("SELECT key, value FROM traces WHERE key LIKE ?1 ORDER BY rowid")
                        .map_err(storage)?;
                    let pattern = format!("{TRACE_KEY_PREFIX}%");
                    let rows = stmt
                        .query_map(params![pattern], |row| Ok((row.get(0)?, row.get(1)?)))
                        .map_err(storage)?
                        .collect::<Result<Vec<(String, String)>, _>>()
                        .map_err(storage)?;
                    Ok(rows)
                },
            )
            .await
            .map_err(|e| MemoryError::Join(e.to_string()))??;

            let mut traces = Vec::with_capacity(rows.len());
            for (key, value) in rows {
                match serde_json::from_str::<Trace>(&value) {
                    Ok(trace) => traces.push((key, trace)),
                    Err(e) => warn!(key = %key, error = %e, "skipping unreadable trace"),
                }
            }
            traces.sort_by_key(|(_, t)| t.timestamp_ms);
            Ok(traces)
        }
    }
}
