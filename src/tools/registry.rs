//! Per-agent tool registry: name → tool, with checked dispatch.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use super::arguments::ToolArguments;
use super::tool::{Tool, ToolContext};
use super::types::ToolDeclaration;
use super::validation::validate_arguments;
use crate::error::{FailureKind, WeaveError};
use crate::types::{ToolCall, ToolResult};

/// The closed set of tools one agent may call.
///
/// Dispatch resolves the requested name and checks the arguments against the
/// tool's schema before anything executes. Unknown names and schema
/// mismatches are contract violations and never reach a tool.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Names must be unique within the registry.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), WeaveError> {
        let name = tool.name().to_string();
        if name.is_empty() {
            return Err(WeaveError::Configuration("tool name must not be empty".into()));
        }
        if self.index.contains_key(&name) {
            return Err(WeaveError::Configuration(format!(
                "tool '{name}' is registered twice"
            )));
        }
        self.index.insert(name, self.tools.len());
        self.tools.push(tool);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Tool names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn declarations(&self) -> Vec<ToolDeclaration> {
        self.tools.iter().map(|t| t.declaration()).collect()
    }

    /// Validate and execute one requested call.
    ///
    /// A tool that fails with a workflow-level error (bad input it detected
    /// itself, a failing sub-agent step) yields an error result for the engine
    /// to react to. Upstream, corruption and configuration failures propagate.
    pub async fn dispatch(
        &self,
        agent: &str,
        call: &ToolCall,
        ctx: &ToolContext,
    ) -> Result<ToolResult, WeaveError> {
        let tool = self.get(&call.name).ok_or_else(|| WeaveError::ToolContractViolation {
            agent: agent.to_string(),
            tool: call.name.clone(),
            reason: format!("unknown tool; available: [{}]", self.names().join(", ")),
        })?;

        validate_arguments(&call.arguments, &tool.parameters().schema).map_err(|reason| {
            WeaveError::ToolContractViolation {
                agent: agent.to_string(),
                tool: call.name.clone(),
                reason,
            }
        })?;

        debug!(agent, tool = %call.name, call_id = %call.id, "dispatching tool call");

        let args = ToolArguments::new(call.arguments.clone());
        match tool.execute(&args, ctx).await {
            Ok(result) => Ok(ToolResult {
                tool_call_id: call.id.clone(),
                name: call.name.clone(),
                result,
                is_error: false,
            }),
            Err(err) if err.kind() == FailureKind::Workflow => {
                debug!(agent, tool = %call.name, error = %err, "tool returned an error result");
                Ok(ToolResult {
                    tool_call_id: call.id.clone(),
                    name: call.name.clone(),
                    result: serde_json::json!({ "error": err.to_string() }),
                    is_error: true,
                })
            }
            Err(err) => Err(err),
        }
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}
