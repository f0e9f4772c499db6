//! SQLite-backed document store.
//!
//! Persists event definitions (one JSON document per event, matching
//! the shape in [`crate::model`]) and a key-value table used to carry
//! engine state across CLI invocations.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use super::data_dir;
use crate::error::{CoreError, StorageError};
use crate::model::EventDef;

/// SQLite database for event documents and engine state.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the database at `~/.config/cuetimer/cuetimer.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, CoreError> {
        let path = data_dir()?.join("cuetimer.db");
        let conn = Connection::open(&path).map_err(|source| StorageError::OpenFailed {
            path,
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database (for tests).
    pub fn open_memory() -> Result<Self, CoreError> {
        let conn = Connection::open_in_memory().map_err(StorageError::from)?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), StorageError> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS events (
                    id         TEXT PRIMARY KEY,
                    doc        TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS kv (
                    key   TEXT PRIMARY KEY,
                    value TEXT NOT NULL
                );",
            )
            .map_err(|e| StorageError::MigrationFailed(e.to_string()))
    }

    // ── Event documents ──────────────────────────────────────────────

    /// Insert or replace an event document.
    ///
    /// # Errors
    /// Returns an error if serialization or the upsert fails.
    pub fn put_event(&self, event: &EventDef) -> Result<(), CoreError> {
        let doc = serde_json::to_string(event)?;
        self.conn
            .execute(
                "INSERT INTO events (id, doc, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(id) DO UPDATE SET doc = ?2, updated_at = ?3",
                params![event.id, doc, Utc::now().to_rfc3339()],
            )
            .map_err(StorageError::from)?;
        Ok(())
    }

    /// Load one event document by id.
    ///
    /// # Errors
    /// Returns [`StorageError::NotFound`] if no such event exists.
    pub fn get_event(&self, id: &str) -> Result<EventDef, CoreError> {
        let doc: Option<String> = self
            .conn
            .query_row("SELECT doc FROM events WHERE id = ?1", params![id], |row| {
                row.get(0)
            })
            .optional()
            .map_err(StorageError::from)?;
        let doc = doc.ok_or_else(|| StorageError::NotFound(format!("event {id}")))?;
        Ok(serde_json::from_str(&doc)?)
    }

    /// All stored events, most recently updated first.
    pub fn list_events(&self) -> Result<Vec<EventDef>, CoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT doc FROM events ORDER BY updated_at DESC")
            .map_err(StorageError::from)?;
        let docs = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(StorageError::from)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(StorageError::from)?;
        docs.iter()
            .map(|doc| serde_json::from_str(doc).map_err(CoreError::from))
            .collect()
    }

    /// Delete an event document. Returns whether a row was removed.
    pub fn delete_event(&self, id: &str) -> Result<bool, CoreError> {
        let n = self
            .conn
            .execute("DELETE FROM events WHERE id = ?1", params![id])
            .map_err(StorageError::from)?;
        Ok(n > 0)
    }

    // ── Key-value store ──────────────────────────────────────────────

    pub fn kv_get(&self, key: &str) -> Result<Option<String>, CoreError> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()
            .map_err(StorageError::from)?;
        Ok(value)
    }

    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), CoreError> {
        self.conn
            .execute(
                "INSERT INTO kv (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = ?2",
                params![key, value],
            )
            .map_err(StorageError::from)?;
        Ok(())
    }

    pub fn kv_delete(&self, key: &str) -> Result<(), CoreError> {
        self.conn
            .execute("DELETE FROM kv WHERE key = ?1", params![key])
            .map_err(StorageError::from)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Direction, Segment};

    fn sample_event(id: &str) -> EventDef {
        EventDef {
            id: id.into(),
            title: "Town Hall".into(),
            segments: vec![Segment {
                id: "s1".into(),
                name: "Welcome".into(),
                duration_seconds: 180,
                direction: Direction::Countdown,
                alerts: vec![],
                completion_sound_enabled: true,
                completion_flash_enabled: true,
                tick_sound_enabled: false,
            }],
            scheduled_start_epoch_ms: None,
        }
    }

    #[test]
    fn event_round_trip() {
        let db = Database::open_memory().unwrap();
        let event = sample_event("e1");
        db.put_event(&event).unwrap();
        assert_eq!(db.get_event("e1").unwrap(), event);
    }

    #[test]
    fn put_replaces_existing() {
        let db = Database::open_memory().unwrap();
        let mut event = sample_event("e1");
        db.put_event(&event).unwrap();
        event.title = "All Hands".into();
        db.put_event(&event).unwrap();
        assert_eq!(db.get_event("e1").unwrap().title, "All Hands");
        assert_eq!(db.list_events().unwrap().len(), 1);
    }

    #[test]
    fn missing_event_is_not_found() {
        let db = Database::open_memory().unwrap();
        let err = db.get_event("ghost").unwrap_err();
        assert!(matches!(
            err,
            CoreError::Storage(StorageError::NotFound(_))
        ));
    }

    #[test]
    fn delete_reports_whether_removed() {
        let db = Database::open_memory().unwrap();
        db.put_event(&sample_event("e1")).unwrap();
        assert!(db.delete_event("e1").unwrap());
        assert!(!db.delete_event("e1").unwrap());
    }

    #[test]
    fn kv_round_trip() {
        let db = Database::open_memory().unwrap();
        assert_eq!(db.kv_get("run_state").unwrap(), None);
        db.kv_set("run_state", "{}").unwrap();
        db.kv_set("run_state", "{\"phase\":\"idle\"}").unwrap();
        assert_eq!(
            db.kv_get("run_state").unwrap().as_deref(),
            Some("{\"phase\":\"idle\"}")
        );
        db.kv_delete("run_state").unwrap();
        assert_eq!(db.kv_get("run_state").unwrap(), None);
    }
}
