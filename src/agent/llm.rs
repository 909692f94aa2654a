//! Model-backed agent: instruction + tools + reasoning engine, with a tool loop.

use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use tracing::debug;

use super::{Agent, AgentOutput, AgentTool, Effect, InvocationContext};
use crate::error::WeaveError;
use crate::model::{GenerateRequest, ReasoningEngine};
use crate::tools::{Tool, ToolContext, ToolRegistry};
use crate::types::{GenerationSettings, Message, ServerTool, Turn};

/// Default bound on generate → tool rounds before the agent gives up.
pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 20;

const PLACEHOLDER: &str = r"\{([A-Za-z_][A-Za-z0-9_.:]*)(\?)?\}";

/// Instruction text with `{key}` / `{key?}` placeholders.
#[derive(Debug, Clone)]
struct InstructionTemplate {
    raw: String,
    pattern: Regex,
}

impl InstructionTemplate {
    fn parse(raw: String) -> Result<Self, WeaveError> {
        let pattern = Regex::new(PLACEHOLDER)
            .map_err(|e| WeaveError::Configuration(format!("instruction pattern: {e}")))?;
        Ok(Self { raw, pattern })
    }

    /// Fill placeholders from the output scratchpad, then session state.
    fn render(&self, agent: &str, ctx: &InvocationContext) -> Result<String, WeaveError> {
        let mut rendered = String::with_capacity(self.raw.len());
        let mut last = 0;
        for caps in self.pattern.captures_iter(&self.raw) {
            let (Some(whole), Some(key)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let optional = caps.get(2).is_some();
            rendered.push_str(&self.raw[last..whole.start()]);
            match ctx.lookup(key.as_str()) {
                Some(serde_json::Value::String(s)) => rendered.push_str(&s),
                Some(serde_json::Value::Null) | None if optional => {}
                Some(other) => rendered.push_str(&other.to_string()),
                None => {
                    return Err(WeaveError::Configuration(format!(
                        "agent '{agent}': instruction references '{}' but no output or state value is set",
                        key.as_str()
                    )))
                }
            }
            last = whole.end();
        }
        rendered.push_str(&self.raw[last..]);
        Ok(rendered)
    }
}

/// An agent whose decisions come from a [`ReasoningEngine`].
///
/// Each run sends the instruction, the session history (optional) and the
/// input to the engine, executes any requested tool calls through the
/// agent's registry, and repeats until the engine answers without calls.
pub struct LlmAgent {
    name: String,
    description: String,
    instruction: InstructionTemplate,
    engine: Arc<dyn ReasoningEngine>,
    tools: ToolRegistry,
    sub_agents: Vec<Arc<dyn Agent>>,
    output_key: Option<String>,
    settings: GenerationSettings,
    max_tool_rounds: usize,
    include_history: bool,
}

impl LlmAgent {
    pub fn builder(name: impl Into<String>, engine: Arc<dyn ReasoningEngine>) -> LlmAgentBuilder {
        LlmAgentBuilder::new(name, engine)
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn output_key(&self) -> Option<&str> {
        self.output_key.as_deref()
    }

    fn initial_context(&self, ctx: &InvocationContext, input: &str) -> Vec<Message> {
        let mut messages: Vec<Message> = if self.include_history {
            ctx.history().iter().filter_map(Turn::to_message).collect()
        } else {
            Vec::new()
        };
        if !input.is_empty() {
            messages.push(Message::user(input));
        }
        messages
    }
}

#[async_trait]
impl Agent for LlmAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn sub_agents(&self) -> Vec<Arc<dyn Agent>> {
        self.sub_agents.clone()
    }

    async fn run(&self, ctx: &InvocationContext, input: String) -> Result<AgentOutput, WeaveError> {
        let instruction = self.instruction.render(&self.name, ctx)?;
        let declarations = self.tools.declarations();
        let mut messages = self.initial_context(ctx, &input);
        let mut effects = Vec::new();
        let mut escalate = false;

        for round in 0..self.max_tool_rounds {
            let request = GenerateRequest {
                instruction: instruction.clone(),
                context: messages.clone(),
                tools: declarations.clone(),
                settings: self.settings.clone(),
            };

            debug!(agent = %self.name, engine = self.engine.name(), round, "calling reasoning engine");
            let generation = self.engine.generate(&request).await?;

            if generation.tool_calls.is_empty() || escalate {
                let text = generation.text;
                if let Some(ref key) = self.output_key {
                    ctx.set_output(key.clone(), serde_json::Value::String(text.clone()));
                }
                effects.push(Effect::AgentInvocation {
                    agent: self.name.clone(),
                    input,
                    output: text.clone(),
                });
                return Ok(AgentOutput {
                    text,
                    effects,
                    escalate,
                });
            }

            messages.push(Message::agent_with_calls(
                generation.text.clone(),
                &generation.tool_calls,
            ));

            for call in &generation.tool_calls {
                let tool_ctx = ToolContext::new(ctx.clone(), self.name.clone(), call.id.clone());
                let result = self.tools.dispatch(&self.name, call, &tool_ctx).await?;

                effects.extend(tool_ctx.take_effects());
                escalate |= tool_ctx.escalated();
                effects.push(Effect::ToolCall {
                    agent: self.name.clone(),
                    call: call.clone(),
                    result: result.result.clone(),
                    is_error: result.is_error,
                });
                messages.push(Message::tool_result(result));
            }
        }

        Err(WeaveError::agent(
            &self.name,
            format!(
                "no final answer after {} tool rounds",
                self.max_tool_rounds
            ),
        ))
    }
}

impl std::fmt::Debug for LlmAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmAgent")
            .field("name", &self.name)
            .field("engine", &self.engine.name())
            .field("tools", &self.tools)
            .field("output_key", &self.output_key)
            .finish()
    }
}

/// Builder for [`LlmAgent`].
pub struct LlmAgentBuilder {
    name: String,
    description: String,
    instruction: String,
    engine: Arc<dyn ReasoningEngine>,
    tools: Vec<Arc<dyn Tool>>,
    sub_agents: Vec<Arc<dyn Agent>>,
    output_key: Option<String>,
    settings: GenerationSettings,
    max_tool_rounds: usize,
    include_history: bool,
}

impl LlmAgentBuilder {
    pub fn new(name: impl Into<String>, engine: Arc<dyn ReasoningEngine>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            instruction: String::new(),
            engine,
            tools: Vec::new(),
            sub_agents: Vec::new(),
            output_key: None,
            settings: GenerationSettings::default(),
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
            include_history: true,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Instruction text; `{key}` and `{key?}` are filled at run time.
    pub fn instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = instruction.into();
        self
    }

    pub fn tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn tools(mut self, tools: impl IntoIterator<Item = Arc<dyn Tool>>) -> Self {
        self.tools.extend(tools);
        self
    }

    /// Make another agent callable as a tool named after it.
    pub fn sub_agent(mut self, agent: Arc<dyn Agent>) -> Self {
        self.sub_agents.push(agent);
        self
    }

    /// Store the final text under `key` in the invocation's output scratchpad.
    pub fn output_key(mut self, key: impl Into<String>) -> Self {
        self.output_key = Some(key.into());
        self
    }

    pub fn settings(mut self, settings: GenerationSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Enable a provider-side tool such as search grounding or code execution.
    pub fn server_tool(mut self, tool: ServerTool) -> Self {
        if !self.settings.server_tools.contains(&tool) {
            self.settings.server_tools.push(tool);
        }
        self
    }

    pub fn max_tool_rounds(mut self, rounds: usize) -> Self {
        self.max_tool_rounds = rounds;
        self
    }

    /// Whether prior session turns are sent as context (default `true`).
    pub fn include_history(mut self, include: bool) -> Self {
        self.include_history = include;
        self
    }

    pub fn build(self) -> Result<LlmAgent, WeaveError> {
        if self.name.trim().is_empty() {
            return Err(WeaveError::Configuration("agent name must not be empty".into()));
        }
        if self.max_tool_rounds == 0 {
            return Err(WeaveError::Configuration(format!(
                "agent '{}': max_tool_rounds must be at least 1",
                self.name
            )));
        }

        let mut registry = ToolRegistry::new();
        for tool in self.tools {
            registry.register(tool)?;
        }
        for agent in &self.sub_agents {
            registry.register(Arc::new(AgentTool::new(Arc::clone(agent))))?;
        }

        Ok(LlmAgent {
            name: self.name,
            description: self.description,
            instruction: InstructionTemplate::parse(self.instruction)?,
            engine: self.engine,
            tools: registry,
            sub_agents: self.sub_agents,
            output_key: self.output_key,
            settings: self.settings,
            max_tool_rounds: self.max_tool_rounds,
            include_history: self.include_history,
        })
    }
}
