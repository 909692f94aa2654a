//! Runner: drives one query through session resolution, agent execution
//! and persistence.

pub mod events;

pub use events::{RunEvent, RunEventPayload, RunEventSink, RunId};

use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::agent::{Agent, Effect, InvocationContext};
use crate::error::{FailureReport, WeaveError};
use crate::session::{CompactionConfig, CompactionReport, Session, SessionService, Summarizer};
use crate::types::{NewTurn, Turn};
use events::RunEventEmitter;

/// Result of a successful run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run_id: RunId,
    pub session_id: String,
    /// Final text of the top-level agent.
    pub output: String,
    /// Everything the agents did, in order.
    pub effects: Vec<Effect>,
    /// Turns persisted by this run, the user turn first.
    pub appended: Vec<Turn>,
    pub compaction: Option<CompactionReport>,
    /// Set when the run committed but the follow-up compaction failed.
    pub compaction_error: Option<FailureReport>,
}

#[derive(Clone)]
struct Compaction {
    config: CompactionConfig,
    summarizer: Arc<dyn Summarizer>,
}

/// Runs a top-level agent against sessions.
///
/// Callers must not run two queries against the same session id at once.
#[derive(Clone)]
pub struct Runner {
    agent: Arc<dyn Agent>,
    sessions: SessionService,
    compaction: Option<Compaction>,
    event_sink: Option<RunEventSink>,
}

impl Runner {
    pub fn new(agent: Arc<dyn Agent>, sessions: SessionService) -> Self {
        Self {
            agent,
            sessions,
            compaction: None,
            event_sink: None,
        }
    }

    /// Compact session history after each committed run.
    pub fn with_compaction(
        mut self,
        config: CompactionConfig,
        summarizer: Arc<dyn Summarizer>,
    ) -> Result<Self, WeaveError> {
        config.validate()?;
        self.compaction = Some(Compaction { config, summarizer });
        Ok(self)
    }

    pub fn with_event_sink(mut self, sink: RunEventSink) -> Self {
        self.event_sink = Some(sink);
        self
    }

    pub fn agent(&self) -> &Arc<dyn Agent> {
        &self.agent
    }

    pub fn sessions(&self) -> &SessionService {
        &self.sessions
    }

    /// Run `query` in `session_id`, or in a fresh session when `None`.
    ///
    /// The user turn is persisted before the agent runs. Agent and tool turns
    /// and the staged state delta are committed together only when the agent
    /// succeeds; on failure they are dropped and the error is returned.
    pub async fn run(
        &self,
        session_id: Option<&str>,
        query: impl Into<String>,
    ) -> Result<RunOutcome, WeaveError> {
        let query = query.into();
        let run_id = Uuid::new_v4();
        let session_id = session_id
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let emitter = RunEventEmitter::new(run_id, self.event_sink.clone());

        emitter.emit(RunEventPayload::Started {
            session_id: session_id.clone(),
            query: query.clone(),
        });

        match self.execute(run_id, &session_id, query, &emitter).await {
            Ok(outcome) => {
                emitter.emit(RunEventPayload::Completed {
                    output: outcome.output.clone(),
                });
                Ok(outcome)
            }
            Err(e) => {
                warn!(%run_id, session_id = %session_id, error = %e, "run failed");
                emitter.emit(RunEventPayload::Failed { report: e.report() });
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        run_id: RunId,
        session_id: &str,
        query: String,
        emitter: &RunEventEmitter,
    ) -> Result<RunOutcome, WeaveError> {
        let mut session = self.sessions.get_or_create(session_id).await?;
        let ctx = InvocationContext::new(&session);
        let user_turn = self
            .sessions
            .append_turn(&mut session, NewTurn::user(query.clone()))
            .await?;

        debug!(%run_id, session_id, agent = self.agent.name(), "running agent");
        let output = self.agent.run(&ctx, query).await?;

        let mut turns = Vec::new();
        for effect in &output.effects {
            if let Effect::ToolCall {
                call,
                result,
                is_error,
                ..
            } = effect
            {
                turns.push(NewTurn::tool(call.clone(), result.clone(), *is_error));
            }
            emitter.emit(effect.clone().into());
        }
        turns.push(NewTurn::agent(self.agent.name(), output.text.clone()));

        let mut appended = vec![user_turn];
        appended.extend(
            self.sessions
                .commit(&mut session, turns, ctx.staged_state())
                .await?,
        );

        let (compaction, compaction_error) = self.maybe_compact(&mut session, emitter).await;

        info!(
            %run_id,
            session_id,
            turns = appended.len(),
            effects = output.effects.len(),
            "run completed"
        );
        Ok(RunOutcome {
            run_id,
            session_id: session_id.to_string(),
            output: output.text,
            effects: output.effects,
            appended,
            compaction,
            compaction_error,
        })
    }

    async fn maybe_compact(
        &self,
        session: &mut Session,
        emitter: &RunEventEmitter,
    ) -> (Option<CompactionReport>, Option<FailureReport>) {
        let Some(compaction) = &self.compaction else {
            return (None, None);
        };
        match self
            .sessions
            .compact(session, &compaction.config, compaction.summarizer.as_ref())
            .await
        {
            Ok(Some(report)) => {
                emitter.emit(RunEventPayload::Compacted {
                    report: report.clone(),
                });
                (Some(report), None)
            }
            Ok(None) => (None, None),
            Err(e) => {
                warn!(session_id = session.id(), error = %e, "compaction failed; history left as is");
                (None, Some(e.report()))
            }
        }
    }
}

impl std::fmt::Debug for Runner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runner")
            .field("agent", &self.agent.name())
            .field("sessions", &self.sessions)
            .field("compaction", &self.compaction.as_ref().map(|c| &c.config))
            .field("event_sink", &self.event_sink.as_ref().map(|_| ".."))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::FnAgent;
    use crate::error::FailureKind;
    use serde_json::json;
    use std::sync::Mutex;

    fn echo() -> Arc<dyn Agent> {
        Arc::new(FnAgent::map("echo", |s| format!("echo: {s}")))
    }

    #[tokio::test]
    async fn run_persists_user_and_agent_turns() {
        let runner = Runner::new(echo(), SessionService::in_memory());

        let outcome = runner.run(Some("s1"), "hello").await.unwrap();
        let session = runner.sessions().get("s1").await.unwrap().unwrap();

        assert_eq!(outcome.output, "echo: hello");
        assert_eq!(session.turns().len(), 2);
        assert_eq!(outcome.appended[1].author.as_deref(), Some("echo"));
    }

    #[tokio::test]
    async fn missing_session_id_gets_a_fresh_session() {
        let runner = Runner::new(echo(), SessionService::in_memory());

        let a = runner.run(None, "x").await.unwrap();
        let b = runner.run(None, "x").await.unwrap();

        assert_ne!(a.session_id, b.session_id);
    }

    #[tokio::test]
    async fn failed_run_drops_staged_state_but_keeps_user_turn() {
        let agent: Arc<dyn Agent> = Arc::new(FnAgent::new("broken", |_input, ctx: InvocationContext| async move {
            ctx.set_state("user:user_name", json!("Ana"));
            Err::<String, _>(WeaveError::agent("broken", "gave up"))
        }));
        let runner = Runner::new(agent, SessionService::in_memory());

        let err = runner.run(Some("s1"), "hi").await.unwrap_err();
        let session = runner.sessions().get("s1").await.unwrap().unwrap();

        assert_eq!(err.kind(), FailureKind::Workflow);
        assert_eq!(session.turns().len(), 1);
        assert!(session.get("user:user_name").is_none());
    }

    #[tokio::test]
    async fn events_are_numbered_from_one() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = Arc::clone(&seen);
        let sink: RunEventSink = Arc::new(move |event: RunEvent| {
            sink_seen.lock().unwrap().push(event);
        });
        let runner = Runner::new(echo(), SessionService::in_memory()).with_event_sink(sink);

        runner.run(Some("s1"), "hi").await.unwrap();

        let events = seen.lock().unwrap();
        let seqs: Vec<u64> = events.iter().map(|e| e.seq).collect();
        assert_eq!(seqs, (1..=events.len() as u64).collect::<Vec<_>>());
        assert!(matches!(events[0].payload, RunEventPayload::Started { .. }));
        assert!(matches!(
            events.last().map(|e| &e.payload),
            Some(RunEventPayload::Completed { .. })
        ));
    }
}
