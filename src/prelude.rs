//! Convenience re-exports for common use.

pub use crate::agent::{Agent, AgentOutput, AgentTool, Effect, FnAgent, InvocationContext, LlmAgent};
pub use crate::config::WeaveConfig;
pub use crate::error::{FailureKind, FailureReport, Result, WeaveError};
#[cfg(feature = "gemini")]
pub use crate::model::GeminiEngine;
pub use crate::model::{GenerateRequest, ReasoningEngine, ScriptedEngine};
pub use crate::runner::{RunEvent, RunEventPayload, RunOutcome, Runner};
pub use crate::session::{
    CompactionConfig, ExtractiveSummarizer, Session, SessionService, SessionStore,
};
pub use crate::stop::StopCondition;
pub use crate::tools::{FunctionTool, Tool, ToolArguments, ToolContext, ToolParameters};
pub use crate::types::{Generation, GenerationSettings, Message, Role, ServerTool, ToolCall, Turn};
pub use crate::workflow::{concat_merge, ParallelPolicy, Topology, Workflow};
