//! Sessions: ordered turn logs plus key-value state, over pluggable stores.

pub mod compaction;
pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod store;

pub use compaction::{
    CompactionConfig, CompactionReport, EngineSummarizer, ExtractiveSummarizer, Summarizer,
};
pub use memory::MemoryStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;
pub use store::SessionStore;

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::WeaveError;
use crate::types::{NewTurn, Turn};

/// Key-value session state.
pub type StateMap = BTreeMap<String, serde_json::Value>;

/// Persisted record of one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub session_id: String,
    pub app_name: String,
    /// Ordered by ordinal; a compaction summary, if any, comes first.
    pub turns: Vec<Turn>,
    pub values: StateMap,
    /// Ordinal the next appended turn receives.
    pub next_ordinal: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SessionState {
    pub fn new(app_name: impl Into<String>, session_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.into(),
            app_name: app_name.into(),
            turns: Vec::new(),
            values: StateMap::new(),
            next_ordinal: 1,
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a turn, assigning the next ordinal.
    pub fn push(&mut self, turn: NewTurn) -> Turn {
        let now = Utc::now();
        let turn = Turn {
            ordinal: self.next_ordinal,
            role: turn.role,
            author: turn.author,
            content: turn.content,
            timestamp: now,
        };
        self.next_ordinal += 1;
        self.updated_at = now;
        self.turns.push(turn.clone());
        turn
    }

    /// Ordinals must strictly increase and stay below `next_ordinal`.
    pub fn check_integrity(&self) -> Result<(), String> {
        let mut previous = None;
        for turn in &self.turns {
            if let Some(prev) = previous {
                if turn.ordinal <= prev {
                    return Err(format!(
                        "turn ordinal {} does not follow {prev}",
                        turn.ordinal
                    ));
                }
            }
            previous = Some(turn.ordinal);
        }
        match previous {
            Some(last) if last >= self.next_ordinal => Err(format!(
                "next ordinal {} is not past last turn {last}",
                self.next_ordinal
            )),
            _ => Ok(()),
        }
    }

    /// Rough token estimate used by compaction (chars / 4).
    pub fn estimated_tokens(&self) -> usize {
        self.turns
            .iter()
            .map(|t| t.content.render().chars().count())
            .sum::<usize>()
            / 4
    }
}

/// A loaded session.
///
/// Holds a snapshot of the stored record; [`SessionService`] methods update
/// the snapshot only after the store accepted the write.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    state: SessionState,
}

impl Session {
    pub fn id(&self) -> &str {
        &self.state.session_id
    }

    pub fn app_name(&self) -> &str {
        &self.state.app_name
    }

    pub fn turns(&self) -> &[Turn] {
        &self.state.turns
    }

    pub fn values(&self) -> &StateMap {
        &self.state.values
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.state.values.get(key)
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn into_state(self) -> SessionState {
        self.state
    }
}

impl From<SessionState> for Session {
    fn from(state: SessionState) -> Self {
        Self { state }
    }
}

/// Session operations over any [`SessionStore`].
///
/// Every mutation is written through the store before it returns; with a
/// durable store that means the write is on disk.
#[derive(Clone)]
pub struct SessionService {
    store: Arc<dyn SessionStore>,
    app_name: String,
}

impl SessionService {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self {
            store,
            app_name: "default".to_string(),
        }
    }

    /// Service over an ephemeral in-process store.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// Service over a SQLite file, created if missing.
    #[cfg(feature = "sqlite")]
    pub fn sqlite(path: impl AsRef<std::path::Path>) -> Result<Self, WeaveError> {
        Ok(Self::new(Arc::new(SqliteStore::open(path)?)))
    }

    pub fn with_app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = app_name.into();
        self
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    pub fn is_durable(&self) -> bool {
        self.store.is_durable()
    }

    /// Sessions are scoped to this service's app name; another app's session
    /// with the same id is not visible here.
    pub async fn get(&self, session_id: &str) -> Result<Option<Session>, WeaveError> {
        Ok(self.store.load(&self.app_name, session_id).await?.map(Session::from))
    }

    pub async fn get_or_create(&self, session_id: &str) -> Result<Session, WeaveError> {
        if session_id.trim().is_empty() {
            return Err(WeaveError::InvalidArgument("session id must not be empty".into()));
        }
        if let Some(existing) = self.get(session_id).await? {
            return Ok(existing);
        }
        let state = SessionState::new(&self.app_name, session_id);
        self.store.save(&state).await?;
        debug!(session_id, app = %self.app_name, durable = self.is_durable(), "created session");
        Ok(Session::from(state))
    }

    pub async fn append_turn(&self, session: &mut Session, turn: NewTurn) -> Result<Turn, WeaveError> {
        let mut appended = self.append_turns(session, vec![turn]).await?;
        appended
            .pop()
            .ok_or_else(|| WeaveError::corrupted(session.id(), "appended turn missing after save"))
    }

    /// Append several turns with one store write.
    pub async fn append_turns(
        &self,
        session: &mut Session,
        turns: Vec<NewTurn>,
    ) -> Result<Vec<Turn>, WeaveError> {
        self.commit(session, turns, StateMap::new()).await
    }

    pub fn get_state(&self, session: &Session, key: &str) -> Option<serde_json::Value> {
        session.get(key).cloned()
    }

    pub async fn set_state(
        &self,
        session: &mut Session,
        key: impl Into<String>,
        value: serde_json::Value,
    ) -> Result<(), WeaveError> {
        let mut delta = StateMap::new();
        delta.insert(key.into(), value);
        self.apply_state_delta(session, delta).await
    }

    pub async fn apply_state_delta(&self, session: &mut Session, delta: StateMap) -> Result<(), WeaveError> {
        self.commit(session, Vec::new(), delta).await.map(|_| ())
    }

    /// Append turns and apply a state delta in one store write.
    pub async fn commit(
        &self,
        session: &mut Session,
        turns: Vec<NewTurn>,
        delta: StateMap,
    ) -> Result<Vec<Turn>, WeaveError> {
        if turns.is_empty() && delta.is_empty() {
            return Ok(Vec::new());
        }
        let mut next = session.state.clone();
        let appended: Vec<Turn> = turns.into_iter().map(|t| next.push(t)).collect();
        if !delta.is_empty() {
            next.values.extend(delta);
            next.updated_at = Utc::now();
        }
        self.store.save(&next).await?;
        session.state = next;
        Ok(appended)
    }

    /// Compact the session's history if it exceeds the configured thresholds.
    pub async fn compact(
        &self,
        session: &mut Session,
        config: &CompactionConfig,
        summarizer: &dyn Summarizer,
    ) -> Result<Option<CompactionReport>, WeaveError> {
        let Some((compacted, report)) = compaction::compact(&session.state, config, summarizer).await?
        else {
            return Ok(None);
        };
        self.store.save(&compacted).await?;
        session.state = compacted;
        info!(
            session_id = session.id(),
            replaced = report.replaced_turns,
            retained = report.retained_turns,
            "compacted session history"
        );
        Ok(Some(report))
    }

    /// Reload the session from the store.
    pub async fn refresh(&self, session: &mut Session) -> Result<(), WeaveError> {
        let state = self
            .store
            .load(session.app_name(), session.id())
            .await?
            .ok_or_else(|| WeaveError::corrupted(session.id(), "session disappeared from store"))?;
        session.state = state;
        Ok(())
    }

    pub async fn delete(&self, session_id: &str) -> Result<bool, WeaveError> {
        self.store.delete(&self.app_name, session_id).await
    }

    /// Session ids belonging to this service's app, sorted.
    pub async fn list_sessions(&self) -> Result<Vec<String>, WeaveError> {
        self.store.list(&self.app_name).await
    }

    /// Flush and release the store.
    pub async fn close(&self) -> Result<(), WeaveError> {
        self.store.close().await
    }
}

impl std::fmt::Debug for SessionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionService")
            .field("app_name", &self.app_name)
            .field("durable", &self.is_durable())
            .finish()
    }
}
