use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};

use super::{validate_name, DocumentStore, StoreError, StoreResult, Versioned};

/// Thread-safe SQLite document store
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Create a new store with the given database path
    pub fn new(db_path: impl AsRef<Path>) -> StoreResult<Self> {
        let conn = Connection::open(db_path.as_ref())?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store for testing
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> StoreResult<()> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                name TEXT PRIMARY KEY,
                body TEXT NOT NULL,
                version INTEGER NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }
}

impl DocumentStore for SqliteStore {
    fn load(&self, name: &str) -> StoreResult<Option<Versioned>> {
        validate_name(name)?;
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let doc = conn
            .query_row(
                "SELECT body, version FROM documents WHERE name = ?1",
                params![name],
                |row| {
                    Ok(Versioned {
                        body: row.get(0)?,
                        version: row.get::<_, i64>(1)? as u64,
                    })
                },
            )
            .optional()?;
        Ok(doc)
    }

    fn save(&self, name: &str, body: &str, expected_version: u64) -> StoreResult<u64> {
        validate_name(name)?;
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let now = Utc::now().to_rfc3339();
        let next = expected_version + 1;

        let changed = if expected_version == 0 {
            conn.execute(
                "INSERT INTO documents (name, body, version, updated_at) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(name) DO NOTHING",
                params![name, body, next as i64, now],
            )?
        } else {
            conn.execute(
                "UPDATE documents SET body = ?1, version = ?2, updated_at = ?3
                 WHERE name = ?4 AND version = ?5",
                params![body, next as i64, now, name, expected_version as i64],
            )?
        };

        if changed == 0 {
            return Err(StoreError::Conflict(name.to_string()));
        }
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_then_update() {
        let store = SqliteStore::in_memory().unwrap();
        assert!(store.load("projects").unwrap().is_none());

        assert_eq!(store.save("projects", "[]", 0).unwrap(), 1);
        assert_eq!(store.save("projects", "[{}]", 1).unwrap(), 2);

        let doc = store.load("projects").unwrap().unwrap();
        assert_eq!(doc.body, "[{}]");
        assert_eq!(doc.version, 2);
    }

    #[test]
    fn test_double_create_conflicts() {
        let store = SqliteStore::in_memory().unwrap();
        store.save("faq", "[]", 0).unwrap();
        assert!(matches!(store.save("faq", "[]", 0), Err(StoreError::Conflict(_))));
    }

    #[test]
    fn test_lost_update_is_detected() {
        let store = SqliteStore::in_memory().unwrap();
        store.save("content", "[]", 0).unwrap();

        // Two writers both read version 1
        store.save("content", "[\"first\"]", 1).unwrap();
        let second = store.save("content", "[\"second\"]", 1);

        assert!(matches!(second, Err(StoreError::Conflict(_))));
        assert_eq!(store.load("content").unwrap().unwrap().body, "[\"first\"]");
    }
}
