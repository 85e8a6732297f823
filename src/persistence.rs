//! SQLite-backed key/value store for settings, stats and collections.

use crate::models::{Settings, DEFAULT_DAILY_GOAL};
use directories::ProjectDirs;
use rusqlite::{Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tracing::warn;

/// Keys under which each piece of state is stored.
pub mod keys {
    pub const SETTINGS: &str = "focus_settings";
    pub const NOTES: &str = "focus_notes";
    pub const TASKS: &str = "focus_tasks";
    pub const STATS: &str = "focus_stats";
    pub const DAILY_GOAL: &str = "focus_daily_goal";
    pub const SESSIONS_COMPLETED: &str = "sessions_completed";
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Failed to create database directory")]
    DirectoryCreation,
}

/// Durable get/set-by-key storage of JSON values.
pub trait Store: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;
    fn set(&self, key: &str, value: &Value) -> Result<(), StoreError>;
    /// Removes every key.
    fn clear(&self) -> Result<(), StoreError>;
}

/// Reads `key` as a `T`, falling back to `default` when it is missing,
/// unreadable or malformed.
pub fn load_or<T, F>(store: &dyn Store, key: &str, default: F) -> T
where
    T: DeserializeOwned,
    F: FnOnce() -> T,
{
    match store.get(key) {
        Ok(Some(value)) => match serde_json::from_value(value) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(key, error = %e, "malformed stored value, using default");
                default()
            }
        },
        Ok(None) => default(),
        Err(e) => {
            warn!(key, error = %e, "failed to read stored value, using default");
            default()
        }
    }
}

/// Serializes `value` and writes it under `key`.
pub fn save<T: Serialize>(store: &dyn Store, key: &str, value: &T) -> Result<(), StoreError> {
    let json = serde_json::to_value(value)?;
    store.set(key, &json)
}

/// Loads the settings, falling back to the defaults when the stored ones
/// are missing, malformed or fail validation.
pub fn load_settings(store: &dyn Store) -> Settings {
    let settings: Settings = load_or(store, keys::SETTINGS, Settings::default);
    match settings.validate() {
        Ok(()) => settings,
        Err(e) => {
            warn!(error = %e, "stored settings are invalid, using defaults");
            Settings::default()
        }
    }
}

/// Loads the daily goal. A stored goal of 0 counts as unset.
pub fn load_daily_goal(store: &dyn Store) -> u32 {
    match load_or(store, keys::DAILY_GOAL, || DEFAULT_DAILY_GOAL) {
        0 => {
            warn!("stored daily goal is 0, using default");
            DEFAULT_DAILY_GOAL
        }
        goal => goal,
    }
}

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Opens the database in the platform data directory.
    pub fn new() -> Result<Self, StoreError> {
        Self::open(&db_path())
    }

    /// Opens or creates a database file at `path`, initializing tables if needed.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|_| StoreError::DirectoryCreation)?;
            }
        }

        let conn = Connection::open(path)?;
        Self::initialize_tables(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory database. Nothing survives the process.
    pub fn new_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::initialize_tables(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_tables(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
        "#,
        )?;
        Ok(())
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the stored text for `key` without parsing it.
    pub fn get_raw(&self, key: &str) -> Result<Option<String>, StoreError> {
        let text = self
            .conn()
            .query_row("SELECT value FROM kv WHERE key = ?", [key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(text)
    }

    /// Writes `text` for `key` verbatim.
    pub fn set_raw(&self, key: &str, text: &str) -> Result<(), StoreError> {
        self.conn().execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?, ?)",
            [key, text],
        )?;
        Ok(())
    }
}

impl Store for Database {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        match self.get_raw(key)? {
            Some(text) => Ok(Some(serde_json::from_str(&text)?)),
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: &Value) -> Result<(), StoreError> {
        let text = serde_json::to_string(value)?;
        self.set_raw(key, &text)
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.conn().execute("DELETE FROM kv", [])?;
        Ok(())
    }
}

/// Location of the default database file.
pub fn db_path() -> PathBuf {
    ProjectDirs::from("com", "focusflow", "FocusFlow")
        .map(|dirs| dirs.data_dir().join("focusflow.db"))
        .unwrap_or_else(|| PathBuf::from("focusflow.db"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::StatsLedger;
    use crate::models::{Settings, Theme};
    use chrono::NaiveDate;
    use serde_json::json;

    #[test]
    fn test_database_creation() {
        let db = Database::new_in_memory();
        assert!(db.is_ok());
    }

    #[test]
    fn test_get_missing_key() {
        let db = Database::new_in_memory().unwrap();
        assert_eq!(db.get("nothing").unwrap(), None);
    }

    #[test]
    fn test_set_and_get_overwrite() {
        let db = Database::new_in_memory().unwrap();

        db.set(keys::DAILY_GOAL, &json!(4)).unwrap();
        db.set(keys::DAILY_GOAL, &json!(6)).unwrap();

        assert_eq!(db.get(keys::DAILY_GOAL).unwrap(), Some(json!(6)));
    }

    #[test]
    fn test_clear_removes_everything() {
        let db = Database::new_in_memory().unwrap();
        db.set(keys::DAILY_GOAL, &json!(4)).unwrap();
        db.set(keys::SESSIONS_COMPLETED, &json!(12)).unwrap();

        db.clear().unwrap();

        assert_eq!(db.get(keys::DAILY_GOAL).unwrap(), None);
        assert_eq!(db.get(keys::SESSIONS_COMPLETED).unwrap(), None);
    }

    #[test]
    fn test_load_or_falls_back_on_malformed_json() {
        let db = Database::new_in_memory().unwrap();
        db.set_raw(keys::SETTINGS, "{not json").unwrap();

        let settings: Settings = load_or(&db, keys::SETTINGS, Settings::default);
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_load_or_falls_back_on_wrong_shape() {
        let db = Database::new_in_memory().unwrap();
        db.set(keys::SESSIONS_COMPLETED, &json!("seven")).unwrap();

        let count: u32 = load_or(&db, keys::SESSIONS_COMPLETED, || 0);
        assert_eq!(count, 0);
    }

    #[test]
    fn test_settings_round_trip_is_byte_identical() {
        let db = Database::new_in_memory().unwrap();
        let settings = Settings {
            theme: Theme::Orange,
            focus_duration: 50 * 60,
            volume: 0.25,
            sound_enabled: false,
            ..Settings::default()
        };

        save(&db, keys::SETTINGS, &settings).unwrap();
        let first = db.get_raw(keys::SETTINGS).unwrap().unwrap();

        let loaded: Settings = load_or(&db, keys::SETTINGS, Settings::default);
        assert_eq!(loaded, settings);

        save(&db, keys::SETTINGS, &loaded).unwrap();
        let second = db.get_raw(keys::SETTINGS).unwrap().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_stats_round_trip_is_byte_identical() {
        let db = Database::new_in_memory().unwrap();
        let mut ledger = StatsLedger::default();
        let day = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        for _ in 0..45 {
            ledger.record_second(day);
        }
        ledger.record_pomodoro(day);
        ledger.record_pomodoro(day.pred_opt().unwrap());

        save(&db, keys::STATS, &ledger).unwrap();
        let first = db.get_raw(keys::STATS).unwrap().unwrap();

        let loaded: StatsLedger = load_or(&db, keys::STATS, StatsLedger::default);
        assert_eq!(loaded, ledger);

        save(&db, keys::STATS, &loaded).unwrap();
        let second = db.get_raw(keys::STATS).unwrap().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_file_database_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("focusflow.db");

        {
            let db = Database::open(&path).unwrap();
            db.set(keys::SESSIONS_COMPLETED, &json!(9)).unwrap();
        }

        let db = Database::open(&path).unwrap();
        assert_eq!(db.get(keys::SESSIONS_COMPLETED).unwrap(), Some(json!(9)));
    }
}
