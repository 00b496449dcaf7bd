//! SQLite state snapshot.
//!
//! One `seen` table. A save replaces its contents inside a single
//! transaction, so an interrupted save leaves the previous snapshot intact.

use super::StateSnapshot;
use crate::error::StateError;
use rusqlite::{params, Connection};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// State snapshot stored in a SQLite database
pub struct SqliteSnapshot {
    path: PathBuf,
}

impl SqliteSnapshot {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    fn read_error(&self, e: impl ToString) -> StateError {
        StateError::Read {
            path: self.path.clone(),
            reason: e.to_string(),
        }
    }

    fn write_error(&self, e: impl ToString) -> StateError {
        StateError::Write {
            path: self.path.clone(),
            reason: e.to_string(),
        }
    }

    fn connect(&self) -> Result<Connection, rusqlite::Error> {
        let conn = Connection::open(&self.path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS seen (
                key TEXT PRIMARY KEY,
                fingerprint TEXT NOT NULL
            )",
            [],
        )?;
        Ok(conn)
    }
}

impl StateSnapshot for SqliteSnapshot {
    fn load(&self) -> Result<HashMap<String, String>, StateError> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }

        let conn = self.connect().map_err(|e| match e {
            rusqlite::Error::SqliteFailure(err, _)
                if err.code == rusqlite::ErrorCode::NotADatabase =>
            {
                StateError::Corrupted {
                    path: self.path.clone(),
                }
            }
            other => self.read_error(other),
        })?;

        let mut stmt = conn
            .prepare("SELECT key, fingerprint FROM seen")
            .map_err(|e| self.read_error(e))?;

        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
            .map_err(|e| self.read_error(e))?;

        let mut seen = HashMap::new();
        for row in rows {
            let (key, fingerprint) = row.map_err(|e| self.read_error(e))?;
            seen.insert(key, fingerprint);
        }

        Ok(seen)
    }

    fn save(&self, seen: &HashMap<String, String>) -> Result<(), StateError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| self.write_error(e))?;
            }
        }

        let mut conn = self.connect().map_err(|e| self.write_error(e))?;
        let tx = conn.transaction().map_err(|e| self.write_error(e))?;

        tx.execute("DELETE FROM seen", [])
            .map_err(|e| self.write_error(e))?;
        {
            let mut insert = tx
                .prepare("INSERT INTO seen (key, fingerprint) VALUES (?1, ?2)")
                .map_err(|e| self.write_error(e))?;
            for (key, fingerprint) in seen {
                insert
                    .execute(params![key, fingerprint])
                    .map_err(|e| self.write_error(e))?;
            }
        }

        tx.commit().map_err(|e| self.write_error(e))
    }

    fn path(&self) -> &Path {
        &self.path
    }
}
