//! Bounded refinement loop.

use std::sync::Arc;

use tracing::{debug, info};

use crate::agent::{Agent, AgentOutput, InvocationContext};
use crate::error::WeaveError;
use crate::stop::StopCondition;

/// Run `body` at most `max_iterations` times.
///
/// Each iteration receives the text carried from the previous one. An empty
/// output does not replace the carried text. Hitting the cap without the stop
/// condition accepting is a normal finish.
pub(crate) async fn run(
    workflow: &str,
    body: &Arc<dyn Agent>,
    max_iterations: u32,
    stop: &dyn StopCondition,
    ctx: &InvocationContext,
    input: String,
) -> Result<AgentOutput, WeaveError> {
    stop.reset().await;

    let mut current = input;
    let mut effects = Vec::new();

    for iteration in 1..=max_iterations {
        let output = body.run(ctx, current.clone()).await?;
        effects.extend(output.effects);
        if !output.text.is_empty() {
            current = output.text;
        }

        if output.escalate {
            debug!(workflow, iteration, "loop body escalated");
            break;
        }
        if stop.should_stop(&current, iteration).await {
            debug!(workflow, iteration, "stop condition accepted");
            break;
        }
        if iteration == max_iterations {
            info!(workflow, max_iterations, "loop reached max iterations without converging");
        }
    }

    Ok(AgentOutput {
        text: current,
        effects,
        escalate: false,
    })
}
