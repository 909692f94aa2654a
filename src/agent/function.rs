//! Agents backed by plain async functions.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;

use super::{Agent, AgentOutput, Effect, InvocationContext};
use crate::error::WeaveError;

type AgentFn = dyn Fn(String, InvocationContext) -> Pin<Box<dyn Future<Output = Result<String, WeaveError>> + Send>>
    + Send
    + Sync;

/// An agent whose output is computed by a closure instead of a model.
///
/// Handy for deterministic pipeline steps (formatting, merging, routing) and
/// for exercising topologies without a reasoning engine.
#[derive(Clone)]
pub struct FnAgent {
    name: String,
    description: String,
    func: Arc<AgentFn>,
}

impl FnAgent {
    pub fn new<F, Fut>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(String, InvocationContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, WeaveError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: String::new(),
            func: Arc::new(move |input, ctx| Box::pin(func(input, ctx))),
        }
    }

    /// Agent from a synchronous, infallible transform of its input.
    pub fn map<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        let func = Arc::new(func);
        Self::new(name, move |input, _ctx| {
            let func = Arc::clone(&func);
            async move { Ok(func(&input)) }
        })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

#[async_trait]
impl Agent for FnAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn run(&self, ctx: &InvocationContext, input: String) -> Result<AgentOutput, WeaveError> {
        let output = (self.func)(input.clone(), ctx.clone()).await?;
        Ok(AgentOutput {
            text: output.clone(),
            effects: vec![Effect::AgentInvocation {
                agent: self.name.clone(),
                input,
                output,
            }],
            escalate: false,
        })
    }
}

impl std::fmt::Debug for FnAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnAgent").field("name", &self.name).finish()
    }
}
