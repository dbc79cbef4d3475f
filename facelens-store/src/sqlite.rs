//! Durable SQLite backend.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use uuid::Uuid;

use crate::{
    AnalysisStore, FaceAnalysisRecord, NewAnalysis, NewUser, StoreError, User, created_timestamp,
};

/// SQLite-backed store. The connection sits behind a `Mutex` because
/// `rusqlite::Connection` is not `Sync` and the store is shared via `Arc`.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        // performance pragmas
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        let store = SqliteStore {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// In-memory SQLite database, used by tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let store = SqliteStore {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        conn.execute_batch(
            "BEGIN;
            CREATE TABLE IF NOT EXISTS analyses (
                id TEXT PRIMARY KEY,
                image_file_name TEXT NOT NULL,
                width INTEGER NOT NULL,
                height INTEGER NOT NULL,
                faces TEXT NOT NULL,
                processing_time TEXT,
                created_ts_us INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS analyses_created_idx ON analyses(created_ts_us);
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                username TEXT NOT NULL UNIQUE,
                password TEXT NOT NULL
            );
            COMMIT;",
        )?;
        Ok(())
    }
}

fn record_from_row(row: &Row<'_>) -> Result<FaceAnalysisRecord, StoreError> {
    let faces_json: String = row.get("faces")?;
    let faces = serde_json::from_str(&faces_json)?;
    let ts_us: i64 = row.get("created_ts_us")?;
    let created_at = DateTime::<Utc>::from_timestamp_micros(ts_us)
        .ok_or_else(|| StoreError::Corrupt(format!("timestamp out of range: {ts_us}")))?;

    Ok(FaceAnalysisRecord {
        id: row.get("id")?,
        image_file_name: row.get("image_file_name")?,
        width: row.get::<_, i64>("width")? as u32,
        height: row.get::<_, i64>("height")? as u32,
        faces,
        processing_time: row.get("processing_time")?,
        created_at,
    })
}

const SELECT_COLUMNS: &str =
    "id, image_file_name, width, height, faces, processing_time, created_ts_us";

impl AnalysisStore for SqliteStore {
    fn create_analysis(&self, new: NewAnalysis) -> Result<FaceAnalysisRecord, StoreError> {
        new.validate()?;

        let record = FaceAnalysisRecord {
            id: Uuid::new_v4().to_string(),
            image_file_name: new.image_file_name,
            width: new.width,
            height: new.height,
            faces: new.faces,
            processing_time: new.processing_time,
            created_at: created_timestamp(),
        };
        let faces_json = serde_json::to_string(&record.faces)?;

        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        conn.execute(
            "INSERT INTO analyses (id, image_file_name, width, height, faces, processing_time, created_ts_us)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                record.id,
                record.image_file_name,
                record.width as i64,
                record.height as i64,
                faces_json,
                record.processing_time,
                record.created_at.timestamp_micros(),
            ],
        )?;

        Ok(record)
    }

    fn recent_analyses(&self, limit: usize) -> Result<Vec<FaceAnalysisRecord>, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM analyses
             ORDER BY created_ts_us DESC, rowid DESC LIMIT ?1"
        ))?;

        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(record_from_row(row))
        })?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row??);
        }
        Ok(records)
    }

    fn analysis_by_id(&self, id: &str) -> Result<Option<FaceAnalysisRecord>, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let row = conn
            .query_row(
                &format!("SELECT {SELECT_COLUMNS} FROM analyses WHERE id = ?1"),
                params![id],
                |row| Ok(record_from_row(row)),
            )
            .optional()?;

        row.transpose()
    }

    fn create_user(&self, new: NewUser) -> Result<User, StoreError> {
        new.validate()?;

        let user = User {
            id: Uuid::new_v4().to_string(),
            username: new.username,
            password: new.password,
        };

        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        conn.execute(
            "INSERT INTO users (id, username, password) VALUES (?1, ?2, ?3)",
            params![user.id, user.username, user.password],
        )?;

        Ok(user)
    }

    fn user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        conn.query_row(
            "SELECT id, username, password FROM users WHERE username = ?1",
            params![username],
            |row| {
                Ok(User {
                    id: row.get(0)?,
                    username: row.get(1)?,
                    password: row.get(2)?,
                })
            },
        )
        .optional()
        .map_err(StoreError::from)
    }
}
