//! Agent-as-tool: lets one agent call another through its tool registry.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use super::Agent;
use crate::error::WeaveError;
use crate::tools::{Tool, ToolArguments, ToolContext, ToolParameters};

/// Exposes an [`Agent`] as a [`Tool`] named after the agent.
///
/// The tool takes one `request` string, runs the wrapped agent on it, and
/// returns `{"result": <agent output>}`. The child's effects are recorded on
/// the calling context so callers see the full delegation trail.
///
/// A failed child returns only its error. Effects it produced before
/// failing, such as tool calls it already ran, are not recorded.
pub struct AgentTool {
    agent: Arc<dyn Agent>,
    description: String,
    parameters: ToolParameters,
}

impl AgentTool {
    pub fn new(agent: Arc<dyn Agent>) -> Self {
        let description = match agent.description() {
            "" => format!("Delegate the request to the '{}' agent", agent.name()),
            d => d.to_string(),
        };
        Self {
            agent,
            description,
            parameters: ToolParameters::object()
                .string("request", "The request to hand to this agent", true)
                .build(),
        }
    }

    pub fn agent(&self) -> &Arc<dyn Agent> {
        &self.agent
    }
}

#[async_trait]
impl Tool for AgentTool {
    fn name(&self) -> &str {
        self.agent.name()
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> &ToolParameters {
        &self.parameters
    }

    async fn execute(
        &self,
        args: &ToolArguments,
        ctx: &ToolContext,
    ) -> Result<serde_json::Value, WeaveError> {
        let request = args.get_str("request")?.to_string();
        tracing::debug!(caller = ctx.agent_name(), delegate = self.agent.name(), "delegating to sub-agent");

        let output = self.agent.run(ctx.invocation(), request).await?;
        if output.escalate {
            ctx.escalate();
        }
        ctx.record_effects(output.effects);
        Ok(json!({ "result": output.text }))
    }
}
