//! Stop predicates for loop workflows.

use async_trait::async_trait;

/// Decides whether a loop should end after an iteration.
///
/// The predicate only sees the iteration output. It may never accept; the
/// loop's iteration cap bounds execution regardless.
#[async_trait]
pub trait StopCondition: Send + Sync {
    /// `iteration` is 1-based.
    async fn should_stop(&self, output: &str, iteration: u32) -> bool;

    /// Reset internal state before a new loop run.
    async fn reset(&self) {}
}

/// Never accepts; the loop runs until its cap or an escalation.
pub struct NeverStop;

#[async_trait]
impl StopCondition for NeverStop {
    async fn should_stop(&self, _output: &str, _iteration: u32) -> bool {
        false
    }
}

/// Stop when a specific string is found in the output.
pub struct StringStop {
    pattern: String,
}

impl StringStop {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
        }
    }
}

#[async_trait]
impl StopCondition for StringStop {
    async fn should_stop(&self, output: &str, _iteration: u32) -> bool {
        output.contains(&self.pattern)
    }
}

/// Stop when a regex pattern matches.
pub struct RegexStop {
    regex: regex::Regex,
}

impl RegexStop {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            regex: regex::Regex::new(pattern)?,
        })
    }
}

#[async_trait]
impl StopCondition for RegexStop {
    async fn should_stop(&self, output: &str, _iteration: u32) -> bool {
        self.regex.is_match(output)
    }
}

/// Stop once the output is longer than `min_chars` characters.
pub struct LengthStop {
    min_chars: usize,
}

impl LengthStop {
    pub fn new(min_chars: usize) -> Self {
        Self { min_chars }
    }
}

#[async_trait]
impl StopCondition for LengthStop {
    async fn should_stop(&self, output: &str, _iteration: u32) -> bool {
        output.chars().count() > self.min_chars
    }
}

/// Stop once a wall-clock budget has elapsed since the first check.
pub struct TimeoutStop {
    deadline: std::sync::Mutex<Option<std::time::Instant>>,
    duration: std::time::Duration,
}

impl TimeoutStop {
    pub fn new(duration: std::time::Duration) -> Self {
        Self {
            deadline: std::sync::Mutex::new(None),
            duration,
        }
    }
}

#[async_trait]
impl StopCondition for TimeoutStop {
    async fn should_stop(&self, _output: &str, _iteration: u32) -> bool {
        let mut deadline = self
            .deadline
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let dl = *deadline.get_or_insert_with(|| std::time::Instant::now() + self.duration);
        std::time::Instant::now() >= dl
    }

    async fn reset(&self) {
        *self
            .deadline
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
    }
}

/// Stop when a custom predicate returns true.
pub struct PredicateStop<F: Fn(&str) -> bool + Send + Sync> {
    predicate: F,
}

impl<F: Fn(&str) -> bool + Send + Sync> PredicateStop<F> {
    pub fn new(predicate: F) -> Self {
        Self { predicate }
    }
}

#[async_trait]
impl<F: Fn(&str) -> bool + Send + Sync> StopCondition for PredicateStop<F> {
    async fn should_stop(&self, output: &str, _iteration: u32) -> bool {
        (self.predicate)(output)
    }
}
