//! Agent system: the uniform invocable unit, its outputs, and concrete agents.

pub mod agent_tool;
pub mod context;
pub mod function;
pub mod llm;

pub use agent_tool::AgentTool;
pub use context::InvocationContext;
pub use function::FnAgent;
pub use llm::{LlmAgent, LlmAgentBuilder};

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::WeaveError;
use crate::types::ToolCall;

/// A side effect performed while producing an output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Effect {
    /// A tool call dispatched on behalf of `agent`.
    ToolCall {
        agent: String,
        call: ToolCall,
        result: serde_json::Value,
        is_error: bool,
    },
    /// One completed run of `agent`.
    AgentInvocation {
        agent: String,
        input: String,
        output: String,
    },
}

impl Effect {
    /// Name of the agent that performed the effect.
    pub fn agent(&self) -> &str {
        match self {
            Self::ToolCall { agent, .. } | Self::AgentInvocation { agent, .. } => agent,
        }
    }
}

/// Result of one agent run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentOutput {
    pub text: String,
    /// Effects in the order they happened, nested agents included.
    pub effects: Vec<Effect>,
    /// Set when a tool asked an enclosing loop to stop.
    pub escalate: bool,
}

impl AgentOutput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    /// Names of agents that completed a run, in completion order.
    pub fn invoked_agents(&self) -> Vec<&str> {
        self.effects
            .iter()
            .filter_map(|e| match e {
                Effect::AgentInvocation { agent, .. } => Some(agent.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Tool calls performed, nested agents included.
    pub fn tool_calls(&self) -> impl Iterator<Item = &Effect> {
        self.effects
            .iter()
            .filter(|e| matches!(e, Effect::ToolCall { .. }))
    }
}

/// Anything that can be invoked with an input and produce an output.
///
/// Implemented by model-backed agents, plain function agents, and every
/// workflow topology, so topologies compose freely.
#[async_trait]
pub trait Agent: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    /// Agents this one may invoke, used for delegation graph validation.
    fn sub_agents(&self) -> Vec<Arc<dyn Agent>> {
        Vec::new()
    }

    /// Run once. Implementations record their own completion as the last
    /// [`Effect::AgentInvocation`] in the returned effects.
    async fn run(&self, ctx: &InvocationContext, input: String) -> Result<AgentOutput, WeaveError>;
}
