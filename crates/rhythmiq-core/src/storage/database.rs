//! SQLite connection, users and the key-value store.

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::data_dir;
use super::migrations;
use crate::error::{CoreError, DatabaseError, ValidationError};

const CURRENT_USER_KEY: &str = "current_user";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// SQLite database holding every Rhythmiq table.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Get a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub(crate) fn conn_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    /// Open the database at `~/.config/rhythmiq/rhythmiq.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, CoreError> {
        let path = data_dir()?.join("rhythmiq.db");
        Ok(Self::open_at(&path)?)
    }

    pub fn open_at(path: &Path) -> Result<Self, DatabaseError> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::init(conn)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self, DatabaseError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, DatabaseError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        migrations::migrate(&conn).map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        Ok(Self { conn })
    }

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, rusqlite::Error> {
        self.conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn kv_delete(&self, key: &str) -> Result<(), rusqlite::Error> {
        self.conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }

    /// Register a user with a zero XP row.
    pub fn create_user(&self, name: &str, now: DateTime<Utc>) -> Result<User, CoreError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyText("User name").into());
        }
        if self.find_user_by_name(name)?.is_some() {
            return Err(ValidationError::InvalidValue {
                field: "name".into(),
                message: format!("user '{name}' already exists"),
            }
            .into());
        }
        let user = User {
            id: Uuid::new_v4(),
            name: name.to_string(),
            created_at: now,
        };
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO users (id, name, created_at) VALUES (?1, ?2, ?3)",
            params![user.id.to_string(), user.name, now.to_rfc3339()],
        )?;
        tx.execute(
            "INSERT INTO user_xp (user_id, xp, level, updated_at) VALUES (?1, 0, 1, ?2)",
            params![user.id.to_string(), now.to_rfc3339()],
        )?;
        tx.commit()?;
        Ok(user)
    }

    pub fn find_user_by_name(&self, name: &str) -> Result<Option<User>, rusqlite::Error> {
        self.conn
            .query_row(
                "SELECT id, name, created_at FROM users WHERE name = ?1",
                params![name],
                row_to_user,
            )
            .optional()
    }

    pub fn user(&self, id: Uuid) -> Result<Option<User>, rusqlite::Error> {
        self.conn
            .query_row(
                "SELECT id, name, created_at FROM users WHERE id = ?1",
                params![id.to_string()],
                row_to_user,
            )
            .optional()
    }

    /// The signed-in user, if any.
    pub fn current_user(&self) -> Result<Option<User>, rusqlite::Error> {
        let Some(raw) = self.kv_get(CURRENT_USER_KEY)? else {
            return Ok(None);
        };
        match Uuid::parse_str(&raw) {
            Ok(id) => self.user(id),
            Err(_) => Ok(None),
        }
    }

    pub fn set_current_user(&self, id: Uuid) -> Result<(), rusqlite::Error> {
        self.kv_set(CURRENT_USER_KEY, &id.to_string())
    }

    pub fn clear_current_user(&self) -> Result<(), rusqlite::Error> {
        self.kv_delete(CURRENT_USER_KEY)
    }
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: parse_uuid(row, 0)?,
        name: row.get(1)?,
        created_at: parse_time(row, 2)?,
    })
}

pub(crate) fn parse_uuid(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

pub(crate) fn parse_time(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kv_store() {
        let db = Database::open_memory().unwrap();
        assert!(db.kv_get("test").unwrap().is_none());
        db.kv_set("test", "hello").unwrap();
        assert_eq!(db.kv_get("test").unwrap(), Some("hello".to_string()));
        db.kv_delete("test").unwrap();
        assert!(db.kv_get("test").unwrap().is_none());
    }

    #[test]
    fn users_are_unique_by_name() {
        let db = Database::open_memory().unwrap();
        let ana = db.create_user("ana", Utc::now()).unwrap();
        assert_eq!(db.find_user_by_name("ana").unwrap(), Some(ana));
        assert!(matches!(
            db.create_user("ana", Utc::now()),
            Err(CoreError::Validation(ValidationError::InvalidValue { .. }))
        ));
        assert!(matches!(
            db.create_user("  ", Utc::now()),
            Err(CoreError::Validation(ValidationError::EmptyText(_)))
        ));
    }

    #[test]
    fn current_user_round_trips_through_kv() {
        let db = Database::open_memory().unwrap();
        assert!(db.current_user().unwrap().is_none());

        let bo = db.create_user("bo", Utc::now()).unwrap();
        db.set_current_user(bo.id).unwrap();
        assert_eq!(db.current_user().unwrap().map(|u| u.name), Some("bo".into()));

        db.clear_current_user().unwrap();
        assert!(db.current_user().unwrap().is_none());
    }

    #[test]
    fn open_at_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rhythmiq.db");
        drop(Database::open_at(&path).unwrap());
        assert!(path.exists());
        // Reopening an existing file applies no migrations twice.
        Database::open_at(&path).unwrap();
    }
}
