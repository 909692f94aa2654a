//! Turns: the append-only entries of a session log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::message::{Message, ToolCall};

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    User,
    Agent,
    Tool,
}

/// Payload of a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnContent {
    Text {
        text: String,
    },
    ToolCall {
        call: ToolCall,
        result: serde_json::Value,
        #[serde(default)]
        is_error: bool,
    },
    /// Stands in for the turns `first_ordinal..=last_ordinal` after compaction.
    Summary {
        text: String,
        first_ordinal: u64,
        last_ordinal: u64,
    },
}

impl TurnContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Human-readable rendering, used for summaries and token estimates.
    pub fn render(&self) -> String {
        match self {
            Self::Text { text } => text.clone(),
            Self::ToolCall {
                call,
                result,
                is_error,
            } => {
                let status = if *is_error { "error" } else { "ok" };
                format!("{}({}) -> {status}: {result}", call.name, call.arguments)
            }
            Self::Summary { text, .. } => text.clone(),
        }
    }
}

/// One entry of a session's ordered log. Ordinals strictly increase per session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub ordinal: u64,
    pub role: Role,
    /// Agent or tool name for non-user turns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    pub content: TurnContent,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    pub fn is_summary(&self) -> bool {
        matches!(self.content, TurnContent::Summary { .. })
    }

    /// Convert into the message shape the reasoning engine consumes.
    ///
    /// Tool turns are left out: the agent turn that follows them already
    /// carries their outcome.
    pub fn to_message(&self) -> Option<Message> {
        match (&self.role, &self.content) {
            (_, TurnContent::Summary { text, .. }) => Some(Message::user(format!(
                "Summary of the earlier conversation:\n{text}"
            ))),
            (Role::User, content) => Some(Message::user(content.render())),
            (Role::Agent, content) => Some(Message::agent(content.render())),
            (Role::Tool, _) => None,
        }
    }
}

/// A turn before the session assigns its ordinal and timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTurn {
    pub role: Role,
    pub author: Option<String>,
    pub content: TurnContent,
}

impl NewTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            author: None,
            content: TurnContent::text(text),
        }
    }

    pub fn agent(author: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            role: Role::Agent,
            author: Some(author.into()),
            content: TurnContent::text(text),
        }
    }

    pub fn tool(call: ToolCall, result: serde_json::Value, is_error: bool) -> Self {
        Self {
            role: Role::Tool,
            author: Some(call.name.clone()),
            content: TurnContent::ToolCall {
                call,
                result,
                is_error,
            },
        }
    }
}
