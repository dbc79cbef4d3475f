//! Process-local fallback backend.

use std::sync::Mutex;

use uuid::Uuid;

use crate::{
    AnalysisStore, FaceAnalysisRecord, NewAnalysis, NewUser, StoreError, User, created_timestamp,
};

#[derive(Default)]
struct Inner {
    analyses: Vec<FaceAnalysisRecord>,
    users: Vec<User>,
}

/// In-memory store used when no database path is configured.
///
/// Insertion order is preserved, so "recent" is reverse insertion order.
/// Everything is lost when the process exits.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AnalysisStore for MemoryStore {
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

        let mut inner = self.inner.lock().map_err(|_| StoreError::Poisoned)?;
        inner.analyses.push(record.clone());
        Ok(record)
    }

    fn recent_analyses(&self, limit: usize) -> Result<Vec<FaceAnalysisRecord>, StoreError> {
        let inner = self.inner.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(inner.analyses.iter().rev().take(limit).cloned().collect())
    }

    fn analysis_by_id(&self, id: &str) -> Result<Option<FaceAnalysisRecord>, StoreError> {
        let inner = self.inner.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(inner.analyses.iter().find(|r| r.id == id).cloned())
    }

    fn create_user(&self, new: NewUser) -> Result<User, StoreError> {
        new.validate()?;

        let mut inner = self.inner.lock().map_err(|_| StoreError::Poisoned)?;
        if inner.users.iter().any(|u| u.username == new.username) {
            return Err(StoreError::Invalid(format!(
                "username already taken: {}",
                new.username
            )));
        }

        let user = User {
            id: Uuid::new_v4().to_string(),
            username: new.username,
            password: new.password,
        };
        inner.users.push(user.clone());
        Ok(user)
    }

    fn user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let inner = self.inner.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(inner.users.iter().find(|u| u.username == username).cloned())
    }
}
