//! Entry persistence store.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::params;
use tokio::sync::RwLock;
use tokio_rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::entry::{EntryId, QueueEntry, StoredEntry};
use crate::error::QueueError;
use crate::schema::init_schema;

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;

/// Entry store trait for persistence.
///
/// Every call is atomic on its own; nothing spans several calls.
#[async_trait]
pub trait EntryStore: Send + Sync {
    /// Insert a new entry and return the identifier assigned to it.
    async fn add(&self, entry: &QueueEntry) -> Result<EntryId, QueueError>;

    /// Read every entry, in identifier order.
    async fn get_all(&self) -> Result<Vec<StoredEntry>, QueueError>;

    /// Insert or replace the entry stored under `entry.id`.
    async fn put(&self, entry: &StoredEntry) -> Result<(), QueueError>;

    /// Remove an entry. Removing an unknown id is not an error.
    async fn delete(&self, id: EntryId) -> Result<(), QueueError>;

    /// Number of stored entries.
    async fn count(&self) -> Result<usize, QueueError>;
}

#[derive(Default)]
struct MemoryState {
    entries: BTreeMap<EntryId, QueueEntry>,
    last_id: i64,
}

/// In-memory entry store.
pub struct MemoryEntryStore {
    state: RwLock<MemoryState>,
}

impl MemoryEntryStore {
    /// Create a new memory store.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(MemoryState::default()),
        }
    }
}

impl Default for MemoryEntryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EntryStore for MemoryEntryStore {
    async fn add(&self, entry: &QueueEntry) -> Result<EntryId, QueueError> {
        let mut state = self.state.write().await;
        state.last_id += 1;
        let id = EntryId(state.last_id);
        state.entries.insert(id, entry.clone());
        Ok(id)
    }

    async fn get_all(&self) -> Result<Vec<StoredEntry>, QueueError> {
        let state = self.state.read().await;
        Ok(state
            .entries
            .iter()
            .map(|(id, entry)| StoredEntry::new(*id, entry.clone()))
            .collect())
    }

    async fn put(&self, entry: &StoredEntry) -> Result<(), QueueError> {
        let mut state = self.state.write().await;
        state.last_id = state.last_id.max(entry.id.0);
        state.entries.insert(entry.id, entry.entry.clone());
        Ok(())
    }

    async fn delete(&self, id: EntryId) -> Result<(), QueueError> {
        self.state.write().await.entries.remove(&id);
        Ok(())
    }

    async fn count(&self) -> Result<usize, QueueError> {
        Ok(self.state.read().await.entries.len())
    }
}

/// SQLite-backed entry store.
///
/// One connection is held for the lifetime of the store; each trait call runs
/// as its own statement or transaction on the connection thread.
pub struct SqliteEntryStore {
    conn: Connection,
}

impl SqliteEntryStore {
    /// Open or create the store at `path`, applying pending migrations.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, QueueError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                QueueError::StoreUnavailable(format!(
                    "Failed to create {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let conn = Connection::open(&path).await.map_err(store_err)?;
        let store = Self::init(conn).await?;
        info!("Entry store opened at {}", path.display());
        Ok(store)
    }

    /// Create a store backed by a private in-memory database.
    pub async fn in_memory() -> Result<Self, QueueError> {
        let conn = Connection::open_in_memory().await.map_err(store_err)?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> Result<Self, QueueError> {
        let previous = conn
            .call(|conn| {
                conn.busy_timeout(Duration::from_secs(5))?;
                init_schema(conn)
            })
            .await
            .map_err(store_err)?;

        debug!("Entry store schema ready (previous version {})", previous);
        Ok(Self { conn })
    }

    /// Number of rows whose payload no longer parses as JSON.
    ///
    /// These rows are left in place and still counted by [`EntryStore::count`],
    /// but `get_all` never returns them, so they are never delivered.
    pub async fn count_unreadable(&self) -> Result<usize, QueueError> {
        let payloads = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare("SELECT payload FROM queue_entries")?;
                let payloads = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(payloads)
            })
            .await
            .map_err(store_err)?;

        Ok(payloads
            .iter()
            .filter(|p| serde_json::from_str::<serde_json::Value>(p).is_err())
            .count())
    }
}

#[async_trait]
impl EntryStore for SqliteEntryStore {
    async fn add(&self, entry: &QueueEntry) -> Result<EntryId, QueueError> {
        let payload = serde_json::to_string(&entry.payload)?;
        let retry_count = entry.retry_count;

        let id = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT INTO queue_entries (payload, retry_count) VALUES (?1, ?2)",
                    params![payload, retry_count],
                )?;
                let id = tx.last_insert_rowid();
                tx.commit()?;
                Ok(id)
            })
            .await
            .map_err(store_err)?;

        debug!("Stored entry {}", id);
        Ok(EntryId(id))
    }

    async fn get_all(&self) -> Result<Vec<StoredEntry>, QueueError> {
        let rows = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, payload, retry_count FROM queue_entries ORDER BY id ASC",
                )?;
                let rows = stmt
                    .query_map([], |row| {
                        Ok((
                            row.get::<_, i64>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, u32>(2)?,
                        ))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(store_err)?;

        let mut entries = Vec::with_capacity(rows.len());
        for (id, payload, retry_count) in rows {
            match serde_json::from_str(&payload) {
                Ok(payload) => entries.push(StoredEntry::new(
                    EntryId(id),
                    QueueEntry {
                        payload,
                        retry_count,
                    },
                )),
                Err(e) => warn!("Skipping entry {} with unreadable payload: {}", id, e),
            }
        }

        Ok(entries)
    }

    async fn put(&self, entry: &StoredEntry) -> Result<(), QueueError> {
        let id = entry.id.0;
        let payload = serde_json::to_string(&entry.entry.payload)?;
        let retry_count = entry.entry.retry_count;

        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO queue_entries (id, payload, retry_count) VALUES (?1, ?2, ?3)
                     ON CONFLICT(id) DO UPDATE SET
                        payload = excluded.payload,
                        retry_count = excluded.retry_count",
                    params![id, payload, retry_count],
                )?;
                Ok(())
            })
            .await
            .map_err(store_err)
    }

    async fn delete(&self, id: EntryId) -> Result<(), QueueError> {
        let id = id.0;
        self.conn
            .call(move |conn| {
                conn.execute("DELETE FROM queue_entries WHERE id = ?1", [id])?;
                Ok(())
            })
            .await
            .map_err(store_err)?;

        debug!("Deleted entry {}", id);
        Ok(())
    }

    async fn count(&self) -> Result<usize, QueueError> {
        self.conn
            .call(|conn| {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM queue_entries", [], |row| row.get(0))?;
                Ok(count as usize)
            })
            .await
            .map_err(store_err)
    }
}

fn store_err(e: tokio_rusqlite::Error) -> QueueError {
    QueueError::StoreUnavailable(e.to_string())
}
