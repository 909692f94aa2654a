//! Run event types and the emitter that numbers them.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::agent::Effect;
use crate::error::FailureReport;
use crate::session::CompactionReport;
use crate::types::ToolCall;

/// Unique run identifier.
pub type RunId = Uuid;

/// Callback used for observing run events.
pub type RunEventSink = Arc<dyn Fn(RunEvent) + Send + Sync>;

/// Concrete event payloads emitted by the runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEventPayload {
    Started {
        session_id: String,
        query: String,
    },
    ToolCall {
        agent: String,
        call: ToolCall,
        result: serde_json::Value,
        is_error: bool,
    },
    AgentInvoked {
        agent: String,
        input: String,
        output: String,
    },
    Compacted {
        report: CompactionReport,
    },
    Completed {
        output: String,
    },
    Failed {
        report: FailureReport,
    },
}

impl From<Effect> for RunEventPayload {
    fn from(effect: Effect) -> Self {
        match effect {
            Effect::ToolCall {
                agent,
                call,
                result,
                is_error,
            } => Self::ToolCall {
                agent,
                call,
                result,
                is_error,
            },
            Effect::AgentInvocation {
                agent,
                input,
                output,
            } => Self::AgentInvoked {
                agent,
                input,
                output,
            },
        }
    }
}

/// Envelope for run events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunEvent {
    pub run_id: RunId,
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub payload: RunEventPayload,
}

pub(crate) struct RunEventEmitter {
    run_id: RunId,
    seq: AtomicU64,
    sink: Option<RunEventSink>,
}

impl RunEventEmitter {
    pub(crate) fn new(run_id: RunId, sink: Option<RunEventSink>) -> Self {
        Self {
            run_id,
            seq: AtomicU64::new(1),
            sink,
        }
    }

    pub(crate) fn emit(&self, payload: RunEventPayload) {
        let Some(sink) = &self.sink else { return; };
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        (sink)(RunEvent {
            run_id: self.run_id,
            seq,
            timestamp: Utc::now(),
            payload,
        });
    }
}
