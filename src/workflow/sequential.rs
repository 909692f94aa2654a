//! Ordered chain: output of step i is the input of step i+1.

use std::sync::Arc;

use tracing::debug;

use crate::agent::{Agent, AgentOutput, InvocationContext};
use crate::error::WeaveError;

/// Run `steps` in order, failing fast on the first error.
///
/// Staged state writes of a failed chain are never committed because the
/// runner discards the whole invocation on error.
pub(crate) async fn run(
    workflow: &str,
    steps: &[Arc<dyn Agent>],
    ctx: &InvocationContext,
    input: String,
) -> Result<AgentOutput, WeaveError> {
    let mut current = input;
    let mut effects = Vec::new();
    let mut escalate = false;

    for (index, step) in steps.iter().enumerate() {
        debug!(workflow, step = step.name(), index, "sequential step");
        let output = step.run(ctx, current).await?;
        effects.extend(output.effects);
        escalate |= output.escalate;
        current = output.text;
    }

    Ok(AgentOutput {
        text: current,
        effects,
        escalate,
    })
}
