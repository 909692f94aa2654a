//! Failure classification shared by every error surfaced to a runner caller.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Broad failure kind, stable across error variants.
///
/// Callers branch on the kind rather than on message text. Loop
/// non-convergence is deliberately absent: hitting the iteration cap is a
/// normal termination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FailureKind {
    /// Unknown tool requested, or arguments not matching the tool schema.
    ToolContractViolation,
    /// Reasoning engine or persistence backend unreachable or erroring.
    UpstreamFailure,
    /// Persisted session state unreadable or malformed.
    SessionCorruption,
    /// Invalid configuration or topology.
    Configuration,
    /// A workflow step failed for a reason internal to an agent.
    Workflow,
    Internal,
}

/// Failure result handed to runner callers: a kind plus a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureReport {
    pub kind: FailureKind,
    pub message: String,
}

impl FailureReport {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FailureReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

/// Suggested recovery action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoverySuggestion {
    RetryWithBackoff,
    CheckCredentials,
    CheckConfiguration,
    FixToolCall,
    InspectSessionStore,
    None,
}
