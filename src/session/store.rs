//! Persistence backend contract for sessions.

use async_trait::async_trait;

use super::SessionState;
use crate::error::WeaveError;

/// Loads and saves whole session records, keyed by `(app_name, session_id)`.
///
/// Implementations must make `save` visible to every later `load` before
/// returning, and must report malformed records as
/// [`WeaveError::SessionCorruption`] for that id alone. The same session id
/// under two app names names two unrelated sessions.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, app_name: &str, session_id: &str) -> Result<Option<SessionState>, WeaveError>;

    /// Insert or replace the record at `(state.app_name, state.session_id)`.
    async fn save(&self, state: &SessionState) -> Result<(), WeaveError>;

    /// Returns whether a session was removed.
    async fn delete(&self, app_name: &str, session_id: &str) -> Result<bool, WeaveError>;

    /// Ids of sessions belonging to `app_name`, sorted.
    async fn list(&self, app_name: &str) -> Result<Vec<String>, WeaveError>;

    /// Flush and release resources.
    async fn close(&self) -> Result<(), WeaveError> {
        Ok(())
    }

    /// Whether saved sessions survive a process restart.
    fn is_durable(&self) -> bool;
}
