use crate::error::StorageError;
use crate::models::EnrichedMovie;
use chrono::Utc;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Slot holding the last processed movie set.
pub const SESSION_KEY: &str = "processed_movies";
/// Bumped whenever the stored `EnrichedMovie` shape changes incompatibly.
pub const FORMAT_VERSION: i64 = 1;

const DB_SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS session_slots (
        key TEXT PRIMARY KEY,
        format_version INTEGER NOT NULL,
        payload TEXT NOT NULL,
        saved_at TEXT NOT NULL
    );
"#;

/// Single-slot persistence of the processed movie set.
pub struct SessionStore {
    conn: Connection,
}

impl SessionStore {
    /// Opens the session database at `path`.
    ///
    /// A file that is not a readable SQLite database is moved aside to
    /// `<path>.corrupt` and replaced by an empty one.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path = path.as_ref();
        match Self::open_file(path) {
            Err(StorageError::Database(e)) if is_unreadable_database(&e) => {
                let backup = corrupt_backup_path(path);
                warn!(
                    "Session database {:?} is unreadable ({}); moving it to {:?}",
                    path, e, backup
                );
                fs::rename(path, &backup)?;
                Self::open_file(path)
            }
            result => result,
        }
    }

    fn open_file(path: &Path) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(DB_SCHEMA)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(DB_SCHEMA)?;
        Ok(Self { conn })
    }

    /// Replaces the stored movie set.
    pub fn save(&self, movies: &[Arc<EnrichedMovie>]) -> Result<(), StorageError> {
        let payload = serde_json::to_string(movies)?;
        self.conn
            .execute(
                "INSERT INTO session_slots (key, format_version, payload, saved_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(key) DO UPDATE SET
                    format_version=excluded.format_version,
                    payload=excluded.payload,
                    saved_at=excluded.saved_at",
                params![SESSION_KEY, FORMAT_VERSION, payload, Utc::now().to_rfc3339()],
            )
            .map_err(|e| match e.sqlite_error_code() {
                Some(ErrorCode::DiskFull) => StorageError::QuotaExceeded,
                _ => StorageError::Database(e),
            })?;
        info!("Saved session with {} movies ({} bytes)", movies.len(), payload.len());
        Ok(())
    }

    /// Returns the stored movie set, if a usable one exists.
    ///
    /// An empty set counts as absent. A payload that does not decode, or was
    /// written by another format version, is removed and reported as absent.
    pub fn load(&self) -> Result<Option<Vec<EnrichedMovie>>, StorageError> {
        let row: Option<(i64, String)> = self
            .conn
            .query_row(
                "SELECT format_version, payload FROM session_slots WHERE key = ?1",
                params![SESSION_KEY],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((version, payload)) = row else {
            debug!("No stored session");
            return Ok(None);
        };

        if version != FORMAT_VERSION {
            warn!(
                "Discarding stored session written with format version {} (expected {})",
                version, FORMAT_VERSION
            );
            self.clear()?;
            return Ok(None);
        }

        match serde_json::from_str::<Vec<EnrichedMovie>>(&payload) {
            Ok(movies) if movies.is_empty() => Ok(None),
            Ok(movies) => {
                info!("Restored session with {} movies", movies.len());
                Ok(Some(movies))
            }
            Err(e) => {
                warn!("Discarding unreadable stored session: {}", e);
                self.clear()?;
                Ok(None)
            }
        }
    }

    pub fn clear(&self) -> Result<(), StorageError> {
        self.conn.execute(
            "DELETE FROM session_slots WHERE key = ?1",
            params![SESSION_KEY],
        )?;
        Ok(())
    }

    /// RFC 3339 time of the last successful save.
    pub fn saved_at(&self) -> Result<Option<String>, StorageError> {
        let saved_at = self
            .conn
            .query_row(
                "SELECT saved_at FROM session_slots WHERE key = ?1",
                params![SESSION_KEY],
                |row| row.get(0),
            )
            .optional()?;
        Ok(saved_at)
    }
}

fn is_unreadable_database(e: &rusqlite::Error) -> bool {
    matches!(
        e.sqlite_error_code(),
        Some(ErrorCode::NotADatabase) | Some(ErrorCode::DatabaseCorrupt)
    )
}

fn corrupt_backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".corrupt");
    PathBuf::from(name)
}

/// Caps the database at its current size so the next growing write fails.
#[cfg(test)]
pub(crate) fn freeze_size(store: &SessionStore) {
    let pages: i64 = store
        .conn
        .query_row("PRAGMA page_count", [], |row| row.get(0))
        .unwrap();
    store
        .conn
        .query_row(&format!("PRAGMA max_page_count = {}", pages), [], |row| row.get::<_, i64>(0))
        .unwrap();
}
