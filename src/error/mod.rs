//! Error types for agentweave.

pub mod unified;

pub use unified::{FailureKind, FailureReport, RecoverySuggestion};

use thiserror::Error;

/// Primary error type for all agentweave operations.
#[derive(Error, Debug)]
pub enum WeaveError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Tool contract violation: agent '{agent}' called '{tool}': {reason}")]
    ToolContractViolation {
        agent: String,
        tool: String,
        reason: String,
    },

    #[error("Tool execution error: {tool_name} — {message}")]
    ToolExecution { tool_name: String, message: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Upstream error from {service}{}: {message}", .status.map(|s| format!(" (status {s})")).unwrap_or_default())]
    Upstream {
        service: String,
        status: Option<u16>,
        message: String,
    },

    #[error("Rate limited: retry after {retry_after_ms:?}ms")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Session '{session_id}' is corrupted: {message}")]
    SessionCorruption { session_id: String, message: String },

    #[cfg(feature = "sqlite")]
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Workflow '{workflow}': {} branch(es) failed: {}", .failures.len(), describe_failures(.failures))]
    BranchesFailed {
        workflow: String,
        failures: Vec<(String, FailureReport)>,
    },

    #[error("Agent '{agent}' failed: {message}")]
    Agent { agent: String, message: String },
}

fn describe_failures(failures: &[(String, FailureReport)]) -> String {
    failures
        .iter()
        .map(|(branch, report)| format!("{branch}: {report}"))
        .collect::<Vec<_>>()
        .join("; ")
}

impl WeaveError {
    /// Create an upstream error without an HTTP status.
    pub fn upstream(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Upstream {
            service: service.into(),
            status: None,
            message: message.into(),
        }
    }

    /// Create an upstream error carrying the HTTP status that produced it.
    pub fn upstream_status(service: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        Self::Upstream {
            service: service.into(),
            status: Some(status),
            message: message.into(),
        }
    }

    pub fn corrupted(session_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SessionCorruption {
            session_id: session_id.into(),
            message: message.into(),
        }
    }

    pub fn agent(agent: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Agent {
            agent: agent.into(),
            message: message.into(),
        }
    }

    /// Classify this error into a failure kind.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Configuration(_) => FailureKind::Configuration,
            Self::ToolContractViolation { .. } => FailureKind::ToolContractViolation,
            Self::Upstream { .. }
            | Self::RateLimited { .. }
            | Self::Network(_)
            | Self::Timeout(_)
            | Self::Io(_) => FailureKind::UpstreamFailure,
            #[cfg(feature = "sqlite")]
            Self::Storage(_) => FailureKind::UpstreamFailure,
            Self::SessionCorruption { .. } => FailureKind::SessionCorruption,
            // A failed parallel step keeps the kind of its first failing branch.
            Self::BranchesFailed { failures, .. } => failures
                .first()
                .map(|(_, report)| report.kind)
                .unwrap_or(FailureKind::Workflow),
            Self::ToolExecution { .. } | Self::InvalidArgument(_) | Self::Agent { .. } => {
                FailureKind::Workflow
            }
            Self::Serialization(_) => FailureKind::Internal,
        }
    }

    /// Kind plus message, the shape returned to runner callers.
    pub fn report(&self) -> FailureReport {
        FailureReport::new(self.kind(), self.to_string())
    }

    /// HTTP status attached to an upstream failure, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Upstream { status, .. } => *status,
            Self::RateLimited { .. } => Some(429),
            Self::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Whether this error is potentially retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::Network(_) | Self::Timeout(_) => true,
            Self::Upstream {
                status: Some(status),
                ..
            } => matches!(status, 429 | 500..=599),
            _ => false,
        }
    }

    /// Suggest recovery actions.
    pub fn recovery_suggestion(&self) -> RecoverySuggestion {
        match self.kind() {
            FailureKind::UpstreamFailure if self.is_retryable() => RecoverySuggestion::RetryWithBackoff,
            FailureKind::UpstreamFailure => match self.status() {
                Some(401 | 403) => RecoverySuggestion::CheckCredentials,
                _ => RecoverySuggestion::None,
            },
            FailureKind::Configuration => RecoverySuggestion::CheckConfiguration,
            FailureKind::ToolContractViolation => RecoverySuggestion::FixToolCall,
            FailureKind::SessionCorruption => RecoverySuggestion::InspectSessionStore,
            _ => RecoverySuggestion::None,
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, WeaveError>;
