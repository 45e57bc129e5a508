use crate::app_dirs::AppDirs;
use crate::session::SessionResult;
use crate::transport::{SavedSession, SessionRecord, SessionStore};
use crate::util::epoch_millis;
use rand::Rng;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;
use tracing::{debug, error, info, warn};

pub const DEFAULT_PENDING_CAPACITY: usize = 20;

const GUEST_ID_KEY: &str = "guest_session_id";
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("local database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("could not encode pending session: {0}")]
    Json(#[from] serde_json::Error),
    #[error("could not prepare database directory: {0}")]
    Io(#[from] std::io::Error),
    #[error("local database lock poisoned")]
    Poisoned,
}

/// A save request that has not reached the server yet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingSessionRecord {
    #[serde(flatten)]
    pub record: SessionRecord,
    /// epoch millis of the failed save
    #[serde(rename = "savedAt")]
    pub saved_at: i64,
}

impl PendingSessionRecord {
    pub fn new(record: SessionRecord) -> Self {
        Self {
            record,
            saved_at: epoch_millis(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingEntry {
    pub id: i64,
    pub pending: PendingSessionRecord,
}

/// Bounded FIFO of unsynced sessions backed by SQLite
#[derive(Debug)]
pub struct PendingStore {
    conn: Mutex<Connection>,
    capacity: usize,
}

impl PendingStore {
    pub fn open<P: AsRef<Path>>(path: P, capacity: usize) -> Result<Self, StoreError> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::init(Connection::open(path)?, capacity)
    }

    pub fn open_default(capacity: usize) -> Result<Self, StoreError> {
        let path = AppDirs::db_path().unwrap_or_else(|| PathBuf::from("tadak.db"));
        debug!(path = %path.display(), "opening local session store");
        Self::open(path, capacity)
    }

    pub fn in_memory(capacity: usize) -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?, capacity)
    }

    fn init(conn: Connection, capacity: usize) -> Result<Self, StoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS pending_sessions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                payload TEXT NOT NULL,
                saved_at INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
            capacity: capacity.max(1),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Appends `pending`, evicting the oldest entries beyond capacity
    pub fn push(&self, pending: &PendingSessionRecord) -> Result<i64, StoreError> {
        let payload = serde_json::to_string(pending)?;
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO pending_sessions (payload, saved_at) VALUES (?1, ?2)",
            params![payload, pending.saved_at],
        )?;
        let id = tx.last_insert_rowid();
        let evicted = tx.execute(
            r#"
            DELETE FROM pending_sessions WHERE id NOT IN (
                SELECT id FROM pending_sessions ORDER BY id DESC LIMIT ?1
            )
            "#,
            params![self.capacity as i64],
        )?;
        tx.commit()?;

        if evicted > 0 {
            warn!(evicted, capacity = self.capacity, "pending queue full, dropped oldest sessions");
        }
        Ok(id)
    }

    /// Entries oldest first. Rows that no longer decode are skipped.
    pub fn pending(&self) -> Result<Vec<PendingEntry>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT id, payload FROM pending_sessions ORDER BY id ASC")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))?;

        let mut entries = Vec::new();
        for row in rows {
            let (id, payload) = row?;
            match serde_json::from_str::<PendingSessionRecord>(&payload) {
                Ok(pending) => entries.push(PendingEntry { id, pending }),
                Err(err) => warn!(id, error = %err, "skipping unreadable pending session"),
            }
        }
        Ok(entries)
    }

    pub fn remove(&self, id: i64) -> Result<(), StoreError> {
        self.lock()?
            .execute("DELETE FROM pending_sessions WHERE id = ?1", params![id])?;
        Ok(())
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        let count: i64 =
            self.lock()?
                .query_row("SELECT COUNT(*) FROM pending_sessions", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    pub fn clear(&self) -> Result<(), StoreError> {
        self.lock()?.execute("DELETE FROM pending_sessions", [])?;
        Ok(())
    }

    /// The id that identifies this install to the server, created on first use
    pub fn guest_session_id(&self) -> Result<String, StoreError> {
        let conn = self.lock()?;
        let existing: Option<String> = conn
            .query_row(
                "SELECT value FROM kv WHERE key = ?1",
                params![GUEST_ID_KEY],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(id) = existing {
            return Ok(id);
        }

        let id = new_guest_id(&mut rand::thread_rng());
        conn.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)",
            params![GUEST_ID_KEY, id],
        )?;
        debug!(guest_session_id = %id, "created guest session id");
        Ok(id)
    }
}

fn new_guest_id<R: Rng>(rng: &mut R) -> String {
    let suffix: String = (0..9)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();
    format!("guest_{}_{}", epoch_millis(), suffix)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub synced: usize,
    pub failed: usize,
    /// Saved remotely but still queued locally; sent again on the next sync
    pub unremoved: usize,
}

/// Saves finished sessions remotely, falling back to the local queue
pub struct PersistenceGateway<S: SessionStore> {
    remote: S,
    pending: PendingStore,
}

impl<S: SessionStore> PersistenceGateway<S> {
    pub fn new(remote: S, pending: PendingStore) -> Self {
        Self { remote, pending }
    }

    pub fn remote(&self) -> &S {
        &self.remote
    }

    pub fn pending_store(&self) -> &PendingStore {
        &self.pending
    }

    /// Builds the save request for `result` with this install's guest id
    pub async fn save_result(&self, result: &SessionResult) -> Option<SavedSession> {
        let guest_id = match self.pending.guest_session_id() {
            Ok(id) => Some(id),
            Err(err) => {
                error!(error = %err, "could not read guest session id");
                None
            }
        };
        self.save_with_backup(&SessionRecord::from_result(result, guest_id))
            .await
    }

    /// One remote save. `None` means the record was kept locally for a later
    /// [`sync_pending`](Self::sync_pending).
    pub async fn save_with_backup(&self, record: &SessionRecord) -> Option<SavedSession> {
        match self.remote.save_session(record).await {
            Ok(saved) => {
                debug!(id = saved.id, "session saved");
                Some(saved)
            }
            Err(err) => {
                warn!(error = %err, "session save failed, keeping it locally");
                if let Err(err) = self.pending.push(&PendingSessionRecord::new(record.clone())) {
                    error!(error = %err, "could not store session locally");
                }
                None
            }
        }
    }

    /// Sends every queued session once; sent ones leave the queue
    pub async fn sync_pending(&self) -> Result<SyncReport, StoreError> {
        let mut report = SyncReport::default();
        for entry in self.pending.pending()? {
            match self.remote.save_session(&entry.pending.record).await {
                Ok(_) => {
                    report.synced += 1;
                    if let Err(err) = self.pending.remove(entry.id) {
                        error!(id = entry.id, error = %err, "synced session could not be dequeued");
                        report.unremoved += 1;
                    }
                }
                Err(err) => {
                    warn!(id = entry.id, error = %err, "pending session still not saved");
                    report.failed += 1;
                }
            }
        }
        if report.synced > 0 {
            info!(
                synced = report.synced,
                failed = report.failed,
                unremoved = report.unremoved,
                "synced pending sessions"
            );
        }
        Ok(report)
    }

    pub fn pending_count(&self) -> Result<usize, StoreError> {
        self.pending.len()
    }
}
