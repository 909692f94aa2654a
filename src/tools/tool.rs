//! Tool trait, the per-call tool context, and the closure-based tool wrapper.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::arguments::ToolArguments;
use super::types::{ToolDeclaration, ToolParameters};
use crate::agent::{Effect, InvocationContext};
use crate::error::WeaveError;

/// Context handed to a tool for one call.
///
/// Gives access to the invocation's staged session state, lets the tool ask
/// an enclosing loop to stop, and collects effects produced by nested agents.
#[derive(Debug, Clone)]
pub struct ToolContext {
    invocation: InvocationContext,
    agent_name: String,
    call_id: String,
    escalate: Arc<AtomicBool>,
    nested: Arc<Mutex<Vec<Effect>>>,
}

impl ToolContext {
    pub fn new(
        invocation: InvocationContext,
        agent_name: impl Into<String>,
        call_id: impl Into<String>,
    ) -> Self {
        Self {
            invocation,
            agent_name: agent_name.into(),
            call_id: call_id.into(),
            escalate: Arc::new(AtomicBool::new(false)),
            nested: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn invocation(&self) -> &InvocationContext {
        &self.invocation
    }

    /// Name of the agent that issued the call.
    pub fn agent_name(&self) -> &str {
        &self.agent_name
    }

    pub fn call_id(&self) -> &str {
        &self.call_id
    }

    /// Read a session state value (staged writes first, then persisted state).
    pub fn state(&self, key: &str) -> Option<serde_json::Value> {
        self.invocation.get_state(key)
    }

    /// Stage a session state write; the runner commits it when the run succeeds.
    pub fn set_state(&self, key: impl Into<String>, value: serde_json::Value) {
        self.invocation.set_state(key, value);
    }

    /// Ask the enclosing loop to stop after the current iteration.
    pub fn escalate(&self) {
        self.escalate.store(true, Ordering::SeqCst);
    }

    pub fn escalated(&self) -> bool {
        self.escalate.load(Ordering::SeqCst)
    }

    /// Record effects performed on behalf of this call (sub-agent work).
    pub fn record_effects(&self, effects: impl IntoIterator<Item = Effect>) {
        self.nested
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .extend(effects);
    }

    pub(crate) fn take_effects(&self) -> Vec<Effect> {
        std::mem::take(&mut *self.nested.lock().unwrap_or_else(|poisoned| poisoned.into_inner()))
    }
}

/// Core tool trait. Implement it to create custom tools.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name (must match what the engine calls).
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON Schema of the accepted arguments.
    fn parameters(&self) -> &ToolParameters;

    /// Execute the tool with arguments already validated against [`Tool::parameters`].
    async fn execute(
        &self,
        args: &ToolArguments,
        ctx: &ToolContext,
    ) -> Result<serde_json::Value, WeaveError>;

    /// Declaration advertised to the reasoning engine.
    fn declaration(&self) -> ToolDeclaration {
        ToolDeclaration {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters().schema.clone(),
        }
    }
}

type ToolHandler = dyn Fn(
        ToolArguments,
        ToolContext,
    ) -> Pin<Box<dyn Future<Output = Result<serde_json::Value, WeaveError>> + Send>>
    + Send
    + Sync;

/// Closure-based tool for plain functions.
pub struct FunctionTool {
    name: String,
    description: String,
    parameters: ToolParameters,
    handler: Arc<ToolHandler>,
}

impl FunctionTool {
    /// Create a tool from an async closure.
    pub fn new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: ToolParameters,
        handler: F,
    ) -> Self
    where
        F: Fn(ToolArguments, ToolContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<serde_json::Value, WeaveError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            handler: Arc::new(move |args, ctx| Box::pin(handler(args, ctx))),
        }
    }

    /// Create a tool from a synchronous function of its arguments.
    pub fn sync<F>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: ToolParameters,
        handler: F,
    ) -> Self
    where
        F: Fn(&ToolArguments, &ToolContext) -> Result<serde_json::Value, WeaveError>
            + Send
            + Sync
            + 'static,
    {
        let handler = Arc::new(handler);
        Self::new(name, description, parameters, move |args, ctx| {
            let handler = Arc::clone(&handler);
            async move { handler(&args, &ctx) }
        })
    }
}

#[async_trait]
impl Tool for FunctionTool {
    fn name(&self) -> &str {
        &self.name
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
        (self.handler)(args.clone(), ctx.clone()).await
    }
}

impl std::fmt::Debug for FunctionTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionTool")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish()
    }
}
