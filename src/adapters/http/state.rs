use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tempfile::NamedTempFile;
use uuid::Uuid;

use crate::application::{
    ports::{DetectorLoader, MediaOpener},
    registry::ModelRegistry,
    session::DetectionSession,
};
use crate::domain::errors::{DomainError, DomainResult};

/// Shared state for the axum handlers.
#[derive(Clone)]
pub struct HttpState {
    /// Read-only model and asset lookup.
    pub registry: Arc<ModelRegistry>,
    pub loader: Arc<dyn DetectorLoader>,
    pub opener: Arc<dyn MediaOpener>,
    pub sessions: Arc<SessionStore>,
}

/// A session plus the last video the user uploaded for it.
pub struct SessionEntry {
    pub session: Arc<Mutex<DetectionSession>>,
    pub upload: Mutex<Option<NamedTempFile>>,
}

#[derive(Default)]
pub struct SessionStore {
    inner: RwLock<HashMap<Uuid, Arc<SessionEntry>>>,
}

impl SessionStore {
    pub fn insert(&self, session: DetectionSession) -> Uuid {
        let id = Uuid::new_v4();
        let entry = Arc::new(SessionEntry {
            session: Arc::new(Mutex::new(session)),
            upload: Mutex::new(None),
        });
        self.inner.write().unwrap_or_else(PoisonError::into_inner).insert(id, entry);
        id
    }

    pub fn get(&self, id: Uuid) -> DomainResult<Arc<SessionEntry>> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
            .ok_or_else(|| DomainError::NotFound(format!("session {}", id)))
    }

    pub fn remove(&self, id: Uuid) -> bool {
        self.inner.write().unwrap_or_else(PoisonError::into_inner).remove(&id).is_some()
    }
}
