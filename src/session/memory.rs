//! Ephemeral in-process session store.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::store::SessionStore;
use super::SessionState;
use crate::error::WeaveError;

type SessionKey = (String, String);

/// Keeps sessions in a map for the lifetime of the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    sessions: RwLock<HashMap<SessionKey, SessionState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn key(app_name: &str, session_id: &str) -> SessionKey {
    (app_name.to_string(), session_id.to_string())
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn load(&self, app_name: &str, session_id: &str) -> Result<Option<SessionState>, WeaveError> {
        Ok(self.sessions.read().await.get(&key(app_name, session_id)).cloned())
    }

    async fn save(&self, state: &SessionState) -> Result<(), WeaveError> {
        state
            .check_integrity()
            .map_err(|reason| WeaveError::corrupted(&state.session_id, reason))?;
        self.sessions
            .write()
            .await
            .insert(key(&state.app_name, &state.session_id), state.clone());
        Ok(())
    }

    async fn delete(&self, app_name: &str, session_id: &str) -> Result<bool, WeaveError> {
        Ok(self
            .sessions
            .write()
            .await
            .remove(&key(app_name, session_id))
            .is_some())
    }

    async fn list(&self, app_name: &str) -> Result<Vec<String>, WeaveError> {
        let mut ids: Vec<String> = self
            .sessions
            .read()
            .await
            .keys()
            .filter(|(app, _)| app == app_name)
            .map(|(_, id)| id.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn close(&self) -> Result<(), WeaveError> {
        self.sessions.write().await.clear();
        Ok(())
    }

    fn is_durable(&self) -> bool {
        false
    }
}
