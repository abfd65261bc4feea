//! SQLite-backed document store.

use crate::clock::{LogicalClock, Version};
use crate::document::{Document, RoomId};
use crate::error::{StoreError, StoreResult};
use crate::store::DocumentStore;
use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;

const CREATE_NOTE_CONTENT: &str = "
CREATE TABLE IF NOT EXISTS note_content (
    room_id TEXT PRIMARY KEY,
    content TEXT NOT NULL,
    version INTEGER NOT NULL
)";

/// A durable document store backed by SQLite.
///
/// Compare-and-swap is a conditional `UPDATE ... WHERE room_id = ? AND
/// version = ?`; the row count tells the caller whether its write won. Lazy
/// creation relies on `INSERT OR IGNORE` followed by a re-read, so a
/// duplicate-key race between two processes resolves to the winning row.
///
/// The version column holds a logical-clock token, but the clock of the
/// writing process is not trusted on its own: several processes may share
/// one database file, each with an independently seeded clock. Every write
/// therefore floors the stored version at the previous one plus one, so the
/// row's version strictly increases and a token is never reissued even when
/// one process's wall clock stalls or lags the others.
///
/// All statements run on the blocking thread pool; the connection itself is
/// shared behind a mutex.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    clock: Arc<LogicalClock>,
}

impl SqliteStore {
    /// Opens (or creates) a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let conn = Connection::open(path).map_err(map_sqlite_error)?;
        Self::with_connection(conn)
    }

    /// Opens an in-memory database, for tests.
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory().map_err(map_sqlite_error)?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> StoreResult<Self> {
        conn.busy_timeout(std::time::Duration::from_secs(5))
            .map_err(map_sqlite_error)?;
        conn.execute(CREATE_NOTE_CONTENT, [])
            .map_err(map_sqlite_error)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            clock: Arc::new(LogicalClock::new()),
        })
    }

    async fn blocking<T, F>(&self, call: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, rusqlite::Error> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock();
            call(&conn).map_err(map_sqlite_error)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }

    fn row_to_document(room_id: RoomId, content: String, version: u64) -> Document {
        Document {
            room_id,
            content,
            version: Version::from_micros(version),
        }
    }
}

fn map_sqlite_error(err: rusqlite::Error) -> StoreError {
    use rusqlite::ErrorCode;

    match &err {
        rusqlite::Error::SqliteFailure(code, _) => match code.code {
            ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => StoreError::Busy(err.to_string()),
            ErrorCode::CannotOpen | ErrorCode::DiskFull => StoreError::Connection(err.to_string()),
            _ => StoreError::Backend(err.to_string()),
        },
        _ => StoreError::Backend(err.to_string()),
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn get_or_create(&self, room_id: &RoomId) -> StoreResult<Document> {
        let room = room_id.clone();
        let version = self.clock.next().as_micros();
        self.blocking(move |conn| {
            conn.execute(
                "INSERT OR IGNORE INTO note_content (room_id, content, version) VALUES (?1, '', ?2)",
                rusqlite::params![room.as_str(), version],
            )?;
            conn.query_row(
                "SELECT content, version FROM note_content WHERE room_id = ?1",
                rusqlite::params![room.as_str()],
                |row| {
                    let content: String = row.get(0)?;
                    let version: u64 = row.get(1)?;
                    Ok(Self::row_to_document(room.clone(), content, version))
                },
            )
        })
        .await
    }

    async fn compare_and_swap(
        &self,
        room_id: &RoomId,
        new_content: &str,
        expected_version: Version,
    ) -> StoreResult<bool> {
        let room = room_id.clone();
        let content = new_content.to_owned();
        let next = self.clock.next().as_micros();
        let expected = expected_version.as_micros();
        self.blocking(move |conn| {
            let changed = conn.execute(
                "UPDATE note_content SET content = ?1, version = MAX(?2, version + 1) \
                 WHERE room_id = ?3 AND version = ?4",
                rusqlite::params![content, next, room.as_str(), expected],
            )?;
            Ok(changed > 0)
        })
        .await
    }

    async fn write_unconditional(
        &self,
        room_id: &RoomId,
        new_content: &str,
    ) -> StoreResult<Document> {
        let room = room_id.clone();
        let content = new_content.to_owned();
        let version = self.clock.next().as_micros();
        self.blocking(move |conn| {
            conn.execute(
                "INSERT INTO note_content (room_id, content, version) VALUES (?1, ?2, ?3) \
                 ON CONFLICT(room_id) DO UPDATE SET \
                 content = excluded.content, \
                 version = MAX(excluded.version, note_content.version + 1)",
                rusqlite::params![room.as_str(), content, version],
            )?;
            // The floor may have bumped the version past this process's
            // clock value; report what the row actually says.
            conn.query_row(
                "SELECT content, version FROM note_content WHERE room_id = ?1",
                rusqlite::params![room.as_str()],
                |row| {
                    let content: String = row.get(0)?;
                    let version: u64 = row.get(1)?;
                    Ok(Self::row_to_document(room.clone(), content, version))
                },
            )
        })
        .await
    }

    async fn delete(&self, room_id: &RoomId) -> StoreResult<()> {
        let room = room_id.clone();
        self.blocking(move |conn| {
            conn.execute(
                "DELETE FROM note_content WHERE room_id = ?1",
                rusqlite::params![room.as_str()],
            )?;
            Ok(())
        })
        .await
    }
}
