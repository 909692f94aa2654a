//! Context compaction: replace an old prefix of a session's turns with one summary turn.

use std::sync::Arc;

use async_trait::async_trait;
use bon::Builder;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::SessionState;
use crate::error::WeaveError;
use crate::model::{GenerateRequest, ReasoningEngine};
use crate::types::{Message, Role, Turn, TurnContent};

/// Author recorded on summary turns.
pub const SUMMARY_AUTHOR: &str = "compactor";

const DEFAULT_SUMMARY_INSTRUCTION: &str = "You condense conversation transcripts. \
Summarize the transcript you are given in a few sentences, keeping names, facts the user \
shared, decisions made and open questions. Reply with the summary only.";

/// When and how much to compact.
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
pub struct CompactionConfig {
    /// Compact once the session holds more turns than this.
    pub max_turns: Option<usize>,
    /// Compact once the estimated token count (chars / 4) exceeds this.
    pub max_tokens: Option<usize>,
    /// Newest turns kept verbatim.
    #[builder(default = 4)]
    #[serde(default = "default_retain_recent")]
    pub retain_recent: usize,
}

fn default_retain_recent() -> usize {
    4
}

impl CompactionConfig {
    pub fn validate(&self) -> Result<(), WeaveError> {
        if self.max_turns.is_none() && self.max_tokens.is_none() {
            return Err(WeaveError::Configuration(
                "compaction needs max_turns or max_tokens".into(),
            ));
        }
        if let Some(max_turns) = self.max_turns {
            if self.retain_recent >= max_turns {
                return Err(WeaveError::Configuration(format!(
                    "compaction retain_recent ({}) must be below max_turns ({max_turns})",
                    self.retain_recent
                )));
            }
        }
        if self.max_tokens == Some(0) {
            return Err(WeaveError::Configuration("compaction max_tokens must be positive".into()));
        }
        Ok(())
    }

    /// Whether `state` is over either threshold.
    pub fn should_compact(&self, state: &SessionState) -> bool {
        let over_turns = self.max_turns.is_some_and(|max| state.turns.len() > max);
        let over_tokens = self
            .max_tokens
            .is_some_and(|max| state.estimated_tokens() > max);
        over_turns || over_tokens
    }
}

/// What a compaction did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompactionReport {
    pub replaced_turns: usize,
    pub retained_turns: usize,
    pub first_ordinal: u64,
    /// Ordinal of the summary turn, the last ordinal it replaced.
    pub summary_ordinal: u64,
}

/// Produces the summary text for a run of turns.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// `turns` may start with an earlier summary turn.
    async fn summarize(&self, turns: &[Turn]) -> Result<String, WeaveError>;
}

/// Deterministic summary: one clipped line per turn.
#[derive(Debug, Clone)]
pub struct ExtractiveSummarizer {
    max_line_chars: usize,
}

impl ExtractiveSummarizer {
    pub fn new(max_line_chars: usize) -> Self {
        Self { max_line_chars }
    }
}

impl Default for ExtractiveSummarizer {
    fn default() -> Self {
        Self::new(160)
    }
}

#[async_trait]
impl Summarizer for ExtractiveSummarizer {
    async fn summarize(&self, turns: &[Turn]) -> Result<String, WeaveError> {
        Ok(turns
            .iter()
            .map(|turn| {
                if turn.is_summary() {
                    return turn.content.render();
                }
                let text = turn.content.render();
                let clipped: String = text.chars().take(self.max_line_chars).collect();
                let ellipsis = if clipped.len() < text.len() { "…" } else { "" };
                format!("{}: {clipped}{ellipsis}", speaker(turn))
            })
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

/// Summary written by a reasoning engine.
pub struct EngineSummarizer {
    engine: Arc<dyn ReasoningEngine>,
    instruction: String,
}

impl EngineSummarizer {
    pub fn new(engine: Arc<dyn ReasoningEngine>) -> Self {
        Self {
            engine,
            instruction: DEFAULT_SUMMARY_INSTRUCTION.to_string(),
        }
    }

    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = instruction.into();
        self
    }
}

#[async_trait]
impl Summarizer for EngineSummarizer {
    async fn summarize(&self, turns: &[Turn]) -> Result<String, WeaveError> {
        let transcript = turns
            .iter()
            .map(|t| format!("{}: {}", speaker(t), t.content.render()))
            .collect::<Vec<_>>()
            .join("\n");
        let request = GenerateRequest::new(self.instruction.clone(), vec![Message::user(transcript)]);
        let generation = self.engine.generate(&request).await?;
        let text = generation.text.trim();
        if text.is_empty() {
            return Err(WeaveError::upstream(self.engine.name(), "engine returned an empty summary"));
        }
        Ok(text.to_string())
    }
}

fn speaker(turn: &Turn) -> String {
    match (&turn.role, &turn.author) {
        (Role::User, _) => "user".to_string(),
        (_, Some(author)) => format!("{}({author})", turn.role),
        (role, None) => role.to_string(),
    }
}

/// Compact `state` if it is over threshold.
///
/// Keeps the newest `retain_recent` turns and replaces everything before them
/// with one summary turn. Returns `None` when nothing would change, which
/// makes a second call with no new turns a no-op.
pub async fn compact(
    state: &SessionState,
    config: &CompactionConfig,
    summarizer: &dyn Summarizer,
) -> Result<Option<(SessionState, CompactionReport)>, WeaveError> {
    if !config.should_compact(state) {
        return Ok(None);
    }

    let keep = config.retain_recent.min(state.turns.len());
    let cut = state.turns.len() - keep;
    let (prefix, retained) = state.turns.split_at(cut);
    let only_summary = prefix.len() == 1 && prefix[0].is_summary();
    let (Some(first), Some(last)) = (prefix.first(), prefix.last()) else {
        return Ok(None);
    };
    if only_summary {
        return Ok(None);
    }

    let first_ordinal = match &first.content {
        TurnContent::Summary { first_ordinal, .. } => *first_ordinal,
        _ => first.ordinal,
    };
    let text = summarizer.summarize(prefix).await?;
    let summary = Turn {
        ordinal: last.ordinal,
        role: Role::Agent,
        author: Some(SUMMARY_AUTHOR.to_string()),
        content: TurnContent::Summary {
            text,
            first_ordinal,
            last_ordinal: last.ordinal,
        },
        timestamp: Utc::now(),
    };

    let report = CompactionReport {
        replaced_turns: prefix.len(),
        retained_turns: retained.len(),
        first_ordinal,
        summary_ordinal: summary.ordinal,
    };

    let mut compacted = state.clone();
    compacted.turns = std::iter::once(summary).chain(retained.iter().cloned()).collect();
    compacted.updated_at = Utc::now();
    Ok(Some((compacted, report)))
}
