//! Persistent storage for pitscout.
//!
//! This module provides `SQLite`-backed storage of text values under a small
//! set of well-known keys. Every write replaces a whole value in a single
//! statement, so readers see either the previous value or the new one.

pub mod migrations;
pub mod schema;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Default per-value quota, matching the usual browser storage limit.
pub const DEFAULT_QUOTA_BYTES: usize = 5 * 1024 * 1024;

/// Well-known keys under which state is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageKey {
    /// The ordered submission sequence.
    Submissions,
    /// Team number to team name lookup table.
    TeamNames,
    /// Identifier of the remote spreadsheet.
    SpreadsheetId,
    /// Identifier of the sheet inside the spreadsheet.
    SheetId,
}

impl StorageKey {
    /// Every well-known key.
    pub const ALL: [StorageKey; 4] = [
        StorageKey::Submissions,
        StorageKey::TeamNames,
        StorageKey::SpreadsheetId,
        StorageKey::SheetId,
    ];

    /// The key as stored in the database.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Submissions => "submissions",
            Self::TeamNames => "team_names",
            Self::SpreadsheetId => "spreadsheet_id",
            Self::SheetId => "sheet_id",
        }
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key-value storage engine shared by every open view.
#[derive(Debug)]
pub struct Storage {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Mutex<Connection>,
    /// Largest value, in bytes, that `put` accepts.
    quota: usize,
}

impl Storage {
    /// Open or create a storage database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>, quota: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let mut conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        // Several processes may share one profile
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        migrations::initialize_schema(&mut conn)?;

        info!("Database opened successfully at {}", path.display());
        Ok(Self {
            path,
            conn: Mutex::new(conn),
            quota,
        })
    }

    /// Create an in-memory storage instance for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory(quota: usize) -> Result<Self> {
        let mut conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;
        migrations::initialize_schema(&mut conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn: Mutex::new(conn),
            quota,
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Largest value `put` accepts, in bytes.
    #[must_use]
    pub fn quota(&self) -> usize {
        self.quota
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| Error::poisoned("storage"))
    }

    /// Read the raw text stored under a key.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get(&self, key: StorageKey) -> Result<Option<String>> {
        let value = self
            .conn()?
            .query_row(
                "SELECT value FROM entries WHERE key = ?1",
                [key.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Replace the text stored under a key.
    ///
    /// Nothing is written when the value exceeds the quota.
    ///
    /// # Errors
    ///
    /// Returns [`Error::QuotaExceeded`] for oversized values, or an error if
    /// the database operation fails.
    pub fn put(&self, key: StorageKey, value: &str) -> Result<()> {
        if value.len() > self.quota {
            warn!(key = %key, needed = value.len(), quota = self.quota, "Storage quota exceeded");
            return Err(Error::QuotaExceeded {
                needed: value.len(),
                quota: self.quota,
            });
        }

        self.conn()?.execute(
            "INSERT OR REPLACE INTO entries (key, value, updated_at) VALUES (?1, ?2, ?3)",
            params![key.as_str(), value, Utc::now().to_rfc3339()],
        )?;
        debug!(key = %key, bytes = value.len(), "Persisted value");
        Ok(())
    }

    /// Delete the value stored under a key.
    ///
    /// Returns `true` if a value was deleted, `false` if none was stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn remove(&self, key: StorageKey) -> Result<bool> {
        let affected = self
            .conn()?
            .execute("DELETE FROM entries WHERE key = ?1", [key.as_str()])?;
        Ok(affected > 0)
    }

    /// Get database statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn stats(&self) -> Result<StorageStats> {
        let (entries, value_bytes, last_write): (i64, i64, Option<String>) =
            self.conn()?.query_row(
                "SELECT COUNT(*), COALESCE(SUM(LENGTH(CAST(value AS BLOB))), 0), MAX(updated_at)
                 FROM entries",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )?;

        let last_write = last_write
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc));

        let db_size_bytes = if self.path.to_string_lossy() == ":memory:" {
            0
        } else {
            std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
        };

        Ok(StorageStats {
            entries: u64::try_from(entries).unwrap_or(0),
            value_bytes: u64::try_from(value_bytes).unwrap_or(0),
            last_write,
            db_size_bytes,
        })
    }
}

/// Statistics about the storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageStats {
    /// Number of keys holding a value.
    pub entries: u64,
    /// Total size of stored values in bytes.
    pub value_bytes: u64,
    /// When the most recent write happened.
    pub last_write: Option<DateTime<Utc>>,
    /// Size of the database file in bytes.
    pub db_size_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_storage() -> Storage {
        Storage::open_in_memory(DEFAULT_QUOTA_BYTES).expect("failed to create test storage")
    }

    #[test]
    fn test_get_absent_key() {
        let storage = create_test_storage();
        assert_eq!(storage.get(StorageKey::Submissions).unwrap(), None);
    }

    #[test]
    fn test_put_and_get() {
        let storage = create_test_storage();
        storage.put(StorageKey::SheetId, "Sheet1").unwrap();
        assert_eq!(
            storage.get(StorageKey::SheetId).unwrap(),
            Some("Sheet1".to_string())
        );
        assert_eq!(storage.get(StorageKey::SpreadsheetId).unwrap(), None);
    }

    #[test]
    fn test_put_replaces() {
        let storage = create_test_storage();
        storage.put(StorageKey::Submissions, "[]").unwrap();
        storage.put(StorageKey::Submissions, "[{}]").unwrap();
        assert_eq!(
            storage.get(StorageKey::Submissions).unwrap(),
            Some("[{}]".to_string())
        );
    }

    #[test]
    fn test_quota_exceeded_writes_nothing() {
        let storage = Storage::open_in_memory(8).unwrap();
        storage.put(StorageKey::Submissions, "[]").unwrap();

        let err = storage
            .put(StorageKey::Submissions, "[1,2,3,4,5]")
            .unwrap_err();
        assert!(matches!(
            err,
            Error::QuotaExceeded {
                needed: 11,
                quota: 8
            }
        ));
        assert_eq!(
            storage.get(StorageKey::Submissions).unwrap(),
            Some("[]".to_string())
        );
    }

    #[test]
    fn test_value_at_quota_is_accepted() {
        let storage = Storage::open_in_memory(4).unwrap();
        assert!(storage.put(StorageKey::SheetId, "abcd").is_ok());
    }

    #[test]
    fn test_remove() {
        let storage = create_test_storage();
        storage.put(StorageKey::TeamNames, "{}").unwrap();
        assert!(storage.remove(StorageKey::TeamNames).unwrap());
        assert!(!storage.remove(StorageKey::TeamNames).unwrap());
        assert_eq!(storage.get(StorageKey::TeamNames).unwrap(), None);
    }

    #[test]
    fn test_stats() {
        let storage = create_test_storage();
        let stats = storage.stats().unwrap();
        assert_eq!(stats.entries, 0);
        assert!(stats.last_write.is_none());

        storage.put(StorageKey::SheetId, "Sheet1").unwrap();
        storage.put(StorageKey::SpreadsheetId, "abc").unwrap();
        let stats = storage.stats().unwrap();
        assert_eq!(stats.entries, 2);
        assert_eq!(stats.value_bytes, 9);
        assert!(stats.last_write.is_some());
        assert_eq!(stats.db_size_bytes, 0);
    }

    #[test]
    fn test_key_names() {
        assert_eq!(StorageKey::Submissions.to_string(), "submissions");
        assert_eq!(StorageKey::TeamNames.as_str(), "team_names");
    }

    #[test]
    fn test_open_file_based_survives_reopen() {
        let db_path =
            std::env::temp_dir().join(format!("pitscout_storage_test_{}.db", std::process::id()));

        {
            let storage = Storage::open(&db_path, DEFAULT_QUOTA_BYTES).unwrap();
            storage.put(StorageKey::SheetId, "Sheet7").unwrap();
            assert_eq!(storage.path(), db_path);
        }

        let storage = Storage::open(&db_path, DEFAULT_QUOTA_BYTES).unwrap();
        assert_eq!(
            storage.get(StorageKey::SheetId).unwrap(),
            Some("Sheet7".to_string())
        );
        assert!(storage.stats().unwrap().db_size_bytes > 0);

        drop(storage);
        let _ = std::fs::remove_file(&db_path);
        let _ = std::fs::remove_file(db_path.with_extension("db-wal"));
        let _ = std::fs::remove_file(db_path.with_extension("db-shm"));
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let root = std::env::temp_dir().join(format!("pitscout_test_{}", std::process::id()));
        let nested_path = root.join("nested/db.sqlite");
        let _ = std::fs::remove_dir_all(&root);

        let storage = Storage::open(&nested_path, DEFAULT_QUOTA_BYTES).unwrap();
        assert!(nested_path.exists());

        drop(storage);
        let _ = std::fs::remove_dir_all(&root);
    }
}
