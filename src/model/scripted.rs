//! Deterministic engine driven by a closure or a fixed reply queue.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::WeaveError;
use crate::types::Generation;

use super::{GenerateRequest, ReasoningEngine};

type Script = dyn Fn(&GenerateRequest) -> Result<Generation, WeaveError> + Send + Sync;

/// A [`ReasoningEngine`] that never leaves the process.
///
/// Useful for offline demos and for tests that need to pin down exactly which
/// tools get requested.
pub struct ScriptedEngine {
    name: String,
    script: Arc<Script>,
    calls: AtomicUsize,
}

impl ScriptedEngine {
    pub fn new<F>(name: impl Into<String>, script: F) -> Self
    where
        F: Fn(&GenerateRequest) -> Result<Generation, WeaveError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            script: Arc::new(script),
            calls: AtomicUsize::new(0),
        }
    }

    /// Replay `replies` in order; once exhausted, every call fails.
    pub fn replies(name: impl Into<String>, replies: impl IntoIterator<Item = Generation>) -> Self {
        let name = name.into();
        let queue = Mutex::new(replies.into_iter().collect::<VecDeque<_>>());
        let service = name.clone();
        Self::new(name, move |_req| {
            queue
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .pop_front()
                .ok_or_else(|| WeaveError::upstream(service.clone(), "scripted replies exhausted"))
        })
    }

    /// Answer every request with the latest user text.
    pub fn echo(name: impl Into<String>) -> Self {
        Self::new(name, |req| {
            Ok(Generation::text(req.last_user_text().unwrap_or_default()))
        })
    }

    /// Number of `generate` calls served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReasoningEngine for ScriptedEngine {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<Generation, WeaveError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.script)(request)
    }
}

impl std::fmt::Debug for ScriptedEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedEngine")
            .field("name", &self.name)
            .field("calls", &self.calls())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Message;

    #[tokio::test]
    async fn replies_are_served_in_order_then_fail() {
        let engine = ScriptedEngine::replies("s", [Generation::text("one"), Generation::text("two")]);
        let req = GenerateRequest::default();

        assert_eq!(engine.generate(&req).await.unwrap().text, "one");
        assert_eq!(engine.generate(&req).await.unwrap().text, "two");
        assert!(engine.generate(&req).await.is_err());
        assert_eq!(engine.calls(), 3);
    }

    #[tokio::test]
    async fn echo_returns_last_user_text() {
        let engine = ScriptedEngine::echo("echo");
        let req = GenerateRequest::new("", vec![Message::user("first"), Message::agent("x"), Message::user("second")]);

        assert_eq!(engine.generate(&req).await.unwrap().text, "second");
    }
}
