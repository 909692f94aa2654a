//! Reasoning engine trait and implementations.

pub mod http;
pub mod scripted;

#[cfg(feature = "gemini")]
pub mod gemini;

#[cfg(feature = "gemini")]
pub use gemini::GeminiEngine;
pub use scripted::ScriptedEngine;

use async_trait::async_trait;

use crate::error::WeaveError;
use crate::tools::ToolDeclaration;
use crate::types::{Generation, GenerationSettings, Message, Role};

/// One call to a reasoning engine: instruction, conversation context, available tools.
#[derive(Debug, Clone, Default)]
pub struct GenerateRequest {
    pub instruction: String,
    pub context: Vec<Message>,
    pub tools: Vec<ToolDeclaration>,
    pub settings: GenerationSettings,
}

impl GenerateRequest {
    pub fn new(instruction: impl Into<String>, context: Vec<Message>) -> Self {
        Self {
            instruction: instruction.into(),
            context,
            ..Default::default()
        }
    }

    /// Text of the most recent user message, if any.
    pub fn last_user_text(&self) -> Option<String> {
        self.context
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(Message::text)
    }

    /// Whether the last message in context carries tool results.
    pub fn is_tool_followup(&self) -> bool {
        self.context.last().is_some_and(|m| m.role == Role::Tool)
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.iter().any(|t| t.name == name)
    }
}

/// The external reasoning collaborator.
///
/// `generate(instruction, context, tools) -> (output, requested tool calls)`.
/// Which tools get requested is entirely up to the engine; callers check
/// every request against the agent's registry before executing anything.
#[async_trait]
pub trait ReasoningEngine: Send + Sync {
    /// Identifier used in logs (model id or engine name).
    fn name(&self) -> &str;

    async fn generate(&self, request: &GenerateRequest) -> Result<Generation, WeaveError>;
}
