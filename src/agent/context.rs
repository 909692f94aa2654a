//! Per-invocation context shared by every agent in one runner call.

use std::sync::{Arc, Mutex, MutexGuard};

use uuid::Uuid;

use crate::session::{Session, StateMap};
use crate::types::Turn;

/// Everything an agent can see during one runner invocation.
///
/// Cloning is cheap and clones share the same staged writes. Session state
/// writes are staged here and only reach the store when the runner commits a
/// successful run. Output-key values live in a separate scratchpad that is
/// never persisted.
#[derive(Debug, Clone)]
pub struct InvocationContext {
    invocation_id: Uuid,
    session_id: Arc<str>,
    history: Arc<[Turn]>,
    committed: Arc<StateMap>,
    staged: Arc<Mutex<StateMap>>,
    outputs: Arc<Mutex<StateMap>>,
}

fn lock(map: &Mutex<StateMap>) -> MutexGuard<'_, StateMap> {
    map.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl InvocationContext {
    /// Context over a session snapshot.
    pub fn new(session: &Session) -> Self {
        Self::from_parts(session.id(), session.turns().to_vec(), session.values().clone())
    }

    pub fn from_parts(session_id: &str, history: Vec<Turn>, state: StateMap) -> Self {
        Self {
            invocation_id: Uuid::new_v4(),
            session_id: Arc::from(session_id),
            history: Arc::from(history),
            committed: Arc::new(state),
            staged: Arc::new(Mutex::new(StateMap::new())),
            outputs: Arc::new(Mutex::new(StateMap::new())),
        }
    }

    /// Context with no history or state, for running agents outside a session.
    pub fn detached(session_id: &str) -> Self {
        Self::from_parts(session_id, Vec::new(), StateMap::new())
    }

    pub fn invocation_id(&self) -> Uuid {
        self.invocation_id
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Session turns as they were before this invocation started.
    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    /// Staged value first, then the committed one.
    pub fn get_state(&self, key: &str) -> Option<serde_json::Value> {
        lock(&self.staged)
            .get(key)
            .cloned()
            .or_else(|| self.committed.get(key).cloned())
    }

    pub fn set_state(&self, key: impl Into<String>, value: serde_json::Value) {
        lock(&self.staged).insert(key.into(), value);
    }

    /// Writes made during this invocation, not yet committed.
    pub fn staged_state(&self) -> StateMap {
        lock(&self.staged).clone()
    }

    pub fn output(&self, key: &str) -> Option<serde_json::Value> {
        lock(&self.outputs).get(key).cloned()
    }

    pub fn set_output(&self, key: impl Into<String>, value: serde_json::Value) {
        lock(&self.outputs).insert(key.into(), value);
    }

    /// Resolve a template key: output scratchpad, then session state.
    pub fn lookup(&self, key: &str) -> Option<serde_json::Value> {
        self.output(key).or_else(|| self.get_state(key))
    }

    /// Isolated copy for a concurrent branch.
    ///
    /// The branch sees everything staged so far; its own writes stay private
    /// until [`InvocationContext::absorb`] merges them back.
    pub fn fork(&self) -> Self {
        Self {
            invocation_id: self.invocation_id,
            session_id: Arc::clone(&self.session_id),
            history: Arc::clone(&self.history),
            committed: Arc::clone(&self.committed),
            staged: Arc::new(Mutex::new(self.staged_state())),
            outputs: Arc::new(Mutex::new(lock(&self.outputs).clone())),
        }
    }

    /// Merge a forked branch's staged writes and outputs into this context.
    pub fn absorb(&self, branch: &InvocationContext) {
        if Arc::ptr_eq(&self.staged, &branch.staged) {
            return;
        }
        let staged = branch.staged_state();
        lock(&self.staged).extend(staged);
        let outputs = lock(&branch.outputs).clone();
        lock(&self.outputs).extend(outputs);
    }
}
