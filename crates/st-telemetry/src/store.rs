//! Append-only telemetry store.
//!
//! Records live in a single logical bucket: a SQLite table clustered on its
//! text key (`WITHOUT ROWID`), so key order is byte order of the record ID
//! and therefore insertion order. The bucket is created lazily by the first
//! write.
//!
//! Writers are serialized through one mutex-guarded connection and an
//! immediate transaction. Readers of a file-backed store borrow their own
//! connection from a small pool and run inside a read transaction, which in
//! WAL mode pins a point-in-time snapshot.

use crate::error::{Result, StoreError};
use crate::record::TelemetryRecord;
use chrono::Utc;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, TransactionBehavior};
use st_common::{RecordId, RecordIdGenerator};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info};

/// Name of the bucket (table) holding telemetry records.
pub const BUCKET_NAME: &str = "speedtest";

/// How long a connection waits on a locked database before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Idle reader connections kept for reuse.
const MAX_IDLE_READERS: usize = 8;

#[derive(Debug, Clone)]
enum Location {
    File(PathBuf),
    Memory,
}

/// Persistent, append-only store of [`TelemetryRecord`]s.
pub struct TelemetryStore {
    location: Location,
    writer: Mutex<Connection>,
    readers: Mutex<Vec<Connection>>,
    ids: RecordIdGenerator,
}

impl std::fmt::Debug for TelemetryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryStore")
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

impl TelemetryStore {
    /// Open (or create) a file-backed store.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let conn = Connection::open(&path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        info!(path = %path.display(), journal_mode = %mode, "telemetry store opened");

        Ok(Self {
            location: Location::File(path),
            writer: Mutex::new(conn),
            readers: Mutex::new(Vec::new()),
            ids: RecordIdGenerator::new(),
        })
    }

    /// Open a process-local store that disappears on drop.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        debug!("in-memory telemetry store opened");
        Ok(Self {
            location: Location::Memory,
            writer: Mutex::new(conn),
            readers: Mutex::new(Vec::new()),
            ids: RecordIdGenerator::new(),
        })
    }

    /// Path of the backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        match &self.location {
            Location::File(path) => Some(path),
            Location::Memory => None,
        }
    }

    /// Persist a record, assigning its `id` and `timestamp`.
    ///
    /// Returns the assigned identifier; `record` is updated in place.
    pub fn save(&self, record: &mut TelemetryRecord) -> Result<RecordId> {
        let mut conn = lock(&self.writer);
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        // Stamp inside the write lock so key order follows commit order.
        let now = Utc::now();
        record.timestamp = now;
        record.id = self.ids.next_id_at(now.timestamp_millis().max(0) as u64);

        let value = serde_json::to_vec(record).map_err(StoreError::Encode)?;

        tx.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {BUCKET_NAME} (
                key TEXT PRIMARY KEY NOT NULL,
                value BLOB NOT NULL
            ) WITHOUT ROWID;"
        ))?;
        tx.execute(
            &format!("INSERT INTO {BUCKET_NAME} (key, value) VALUES (?1, ?2)"),
            params![record.id.as_str(), value],
        )?;
        tx.commit()?;

        debug!(id = %record.id, "telemetry record saved");
        Ok(record.id.clone())
    }

    /// Point lookup by identifier.
    pub fn get_by_id(&self, id: &str) -> Result<TelemetryRecord> {
        self.read(|conn| {
            let tx = conn.transaction()?;
            ensure_bucket(&tx)?;
            let value: Option<Vec<u8>> = tx
                .query_row(
                    &format!("SELECT value FROM {BUCKET_NAME} WHERE key = ?1"),
                    params![id],
                    |row| row.get(0),
                )
                .optional()?;
            tx.finish()?;

            let value = value.ok_or_else(|| StoreError::NotFound(id.to_string()))?;
            decode(id, &value)
        })
    }

    /// Up to `limit` most recently inserted records, newest first.
    pub fn get_last_n(&self, limit: usize) -> Result<Vec<TelemetryRecord>> {
        let records = self.read(|conn| {
            let tx = conn.transaction()?;
            ensure_bucket(&tx)?;
            let records = {
                let mut stmt = tx.prepare(&format!(
                    "SELECT key, value FROM {BUCKET_NAME} ORDER BY key DESC LIMIT ?1"
                ))?;
                let limit = i64::try_from(limit).unwrap_or(i64::MAX);
                let rows = stmt.query_map(params![limit], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, Vec<u8>>(1)?))
                })?;
                let mut records = Vec::new();
                for row in rows {
                    let (key, value) = row?;
                    records.push(decode(&key, &value)?);
                }
                records
            };
            tx.finish()?;
            Ok(records)
        })?;

        info!(count = records.len(), limit, "fetched records from storage");
        Ok(records)
    }

    /// Every record, oldest first. Intended for diagnostics only.
    pub fn get_all(&self) -> Result<Vec<TelemetryRecord>> {
        let records = self.read(|conn| {
            let tx = conn.transaction()?;
            ensure_bucket(&tx)?;
            let records = {
                let mut stmt =
                    tx.prepare(&format!("SELECT key, value FROM {BUCKET_NAME} ORDER BY key ASC"))?;
                let rows = stmt.query_map([], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, Vec<u8>>(1)?))
                })?;
                let mut records = Vec::new();
                for row in rows {
                    let (key, value) = row?;
                    records.push(decode(&key, &value)?);
                }
                records
            };
            tx.finish()?;
            Ok(records)
        })?;

        for record in &records {
            debug!(
                id = %record.id,
                timestamp = %record.timestamp.to_rfc3339(),
                ip_address = %record.client_address,
                isp_info = %record.isp_info,
                extra = %record.extra,
                user_agent = %record.user_agent,
                language = %record.language,
                download = %record.download,
                upload = %record.upload,
                ping = %record.ping,
                jitter = %record.jitter,
                log = %record.log,
                "record"
            );
        }
        Ok(records)
    }

    /// Number of stored records (0 when the bucket does not exist yet).
    pub fn count(&self) -> Result<usize> {
        self.read(|conn| {
            let tx = conn.transaction()?;
            if !bucket_exists(&tx)? {
                return Ok(0);
            }
            let n: i64 =
                tx.query_row(&format!("SELECT COUNT(*) FROM {BUCKET_NAME}"), [], |row| {
                    row.get(0)
                })?;
            tx.finish()?;
            Ok(usize::try_from(n).unwrap_or(0))
        })
    }

    /// Run `f` against a reader connection.
    ///
    /// In-memory databases are private to one connection, so reads share the
    /// writer there.
    fn read<T>(&self, f: impl FnOnce(&mut Connection) -> Result<T>) -> Result<T> {
        let path = match &self.location {
            Location::Memory => return f(&mut lock(&self.writer)),
            Location::File(path) => path,
        };

        let pooled = lock(&self.readers).pop();
        let mut conn = match pooled {
            Some(conn) => conn,
            None => open_reader(path)?,
        };

        let result = f(&mut conn);

        let mut idle = lock(&self.readers);
        if idle.len() < MAX_IDLE_READERS {
            idle.push(conn);
        }
        result
    }
}

fn open_reader(path: &Path) -> Result<Connection> {
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    Ok(conn)
}

fn bucket_exists(conn: &Connection) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![BUCKET_NAME],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

fn ensure_bucket(conn: &Connection) -> Result<()> {
    if bucket_exists(conn)? {
        Ok(())
    } else {
        Err(StoreError::BucketMissing)
    }
}

fn decode(key: &str, value: &[u8]) -> Result<TelemetryRecord> {
    serde_json::from_slice(value).map_err(|source| StoreError::Decode {
        key: key.to_string(),
        source,
    })
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
