//! Credential store — passive holder of the live session.
//!
//! One store instance per connected user; a multi-user deployment creates
//! one store per user session, never a process-wide global. The store
//! performs no network I/O itself.

use sightline_domain::Session;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Holds at most one live [`Session`], keyed by an opaque store id.
#[derive(Debug)]
pub struct CredentialStore {
    store_id: String,
    slot: RwLock<Option<Session>>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self {
            store_id: Uuid::new_v4().to_string(),
            slot: RwLock::new(None),
        }
    }

    /// Opaque identifier for this store instance (used in logs only).
    pub fn store_id(&self) -> &str {
        &self.store_id
    }

    pub async fn get(&self) -> Option<Session> {
        self.slot.read().await.clone()
    }

    pub async fn set(&self, session: Session) {
        *self.slot.write().await = Some(session);
    }

    /// Remove and return the live session, if any.
    pub async fn take(&self) -> Option<Session> {
        self.slot.write().await.take()
    }

    pub async fn clear(&self) {
        *self.slot.write().await = None;
    }

    pub async fn is_logged_in(&self) -> bool {
        self.slot.read().await.is_some()
    }

    /// Mutate the live session in place. Returns false when no session is
    /// live (the mutation is skipped).
    pub async fn update<F>(&self, f: F) -> bool
    where
        F: FnOnce(&mut Session),
    {
        let mut slot = self.slot.write().await;
        match slot.as_mut() {
            Some(session) => {
                f(session);
                true
            }
            None => false,
        }
    }
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::new()
    }
}
