//! Persistence gateway for analysis records and user credentials.
//!
//! Two interchangeable backends implement [`AnalysisStore`]: a SQLite store
//! for durable persistence and an in-memory store the factory falls back to
//! when no database path is configured. The backend is chosen once at startup
//! and never switched mid-process.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use facelens_core::RefinedFace;
use facelens_utils::config::ServerSettings;

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sql(#[from] rusqlite::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("invalid record: {0}")]
    Invalid(String),
    #[error("corrupt record: {0}")]
    Corrupt(String),
    #[error("store lock poisoned")]
    Poisoned,
}

/// A persisted analysis. Immutable after creation; there is no update surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaceAnalysisRecord {
    pub id: String,
    pub image_file_name: String,
    pub width: u32,
    pub height: u32,
    pub faces: Vec<RefinedFace>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_time: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Input for creating an analysis record.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAnalysis {
    pub image_file_name: String,
    pub width: u32,
    pub height: u32,
    pub faces: Vec<RefinedFace>,
    pub processing_time: Option<String>,
}

impl NewAnalysis {
    /// Reject records that cannot describe a real image.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.image_file_name.trim().is_empty() {
            return Err(StoreError::Invalid("imageFileName must not be empty".into()));
        }
        if self.width == 0 || self.height == 0 {
            return Err(StoreError::Invalid(
                "imageDimensions must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

/// A stored user credential record. Lookup only; nothing enforces auth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub password: String,
}

/// Input for creating a user.
#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub username: String,
    pub password: String,
}

impl NewUser {
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.username.trim().is_empty() {
            return Err(StoreError::Invalid("username must not be empty".into()));
        }
        Ok(())
    }
}

/// Creation timestamp for a new record, truncated to microseconds.
///
/// Rows store `timestamp_micros()`, so anything finer would make the record
/// returned by create disagree with what a later fetch reads back.
pub(crate) fn created_timestamp() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_micros(now.timestamp_micros()).unwrap_or(now)
}

/// Storage operations shared by both backends.
pub trait AnalysisStore: Send + Sync {
    /// Persist a new analysis and return the stored record.
    fn create_analysis(&self, new: NewAnalysis) -> Result<FaceAnalysisRecord, StoreError>;

    /// Up to `limit` most recent analyses, newest first.
    fn recent_analyses(&self, limit: usize) -> Result<Vec<FaceAnalysisRecord>, StoreError>;

    /// Look up a single analysis by id.
    fn analysis_by_id(&self, id: &str) -> Result<Option<FaceAnalysisRecord>, StoreError>;

    /// Persist a new user and return the stored record.
    fn create_user(&self, new: NewUser) -> Result<User, StoreError>;

    /// Look up a user by username.
    fn user_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;
}

/// Select the storage backend once at startup.
///
/// A configured database path means SQLite, and failing to open it is an
/// error. Without a path the process degrades to an in-memory store; that
/// degrade is deliberate and only announced at info level.
pub fn open_store(settings: &ServerSettings) -> Result<Arc<dyn AnalysisStore>, StoreError> {
    match settings.database_path.as_ref() {
        Some(path) => {
            let store = SqliteStore::open(path)?;
            info!("opened sqlite analysis store at {}", path.display());
            Ok(Arc::new(store))
        }
        None => {
            info!("no database configured; analyses will be kept in memory only");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}
