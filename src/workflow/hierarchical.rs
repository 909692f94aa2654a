//! Root agent that delegates to sub-agents exposed as tools.

use std::collections::HashSet;
use std::sync::Arc;

use crate::agent::{Agent, AgentOutput, InvocationContext};
use crate::error::WeaveError;

/// Delegate names must be unique, must not shadow the root, and must be
/// among the root's sub-agents, since those are the only ones it can call.
pub(crate) fn check_delegates(
    workflow: &str,
    root: &Arc<dyn Agent>,
    delegates: &[Arc<dyn Agent>],
) -> Result<(), WeaveError> {
    let reachable: HashSet<String> = root.sub_agents().iter().map(|a| a.name().to_string()).collect();
    let mut seen = HashSet::new();
    for delegate in delegates {
        if !reachable.contains(delegate.name()) {
            return Err(WeaveError::Configuration(format!(
                "hierarchical workflow '{workflow}': delegate '{}' is not a sub-agent of root '{}'",
                delegate.name(),
                root.name()
            )));
        }
        if delegate.name() == root.name() {
            return Err(WeaveError::Configuration(format!(
                "hierarchical workflow '{workflow}': root '{}' cannot delegate to itself",
                root.name()
            )));
        }
        if !seen.insert(delegate.name()) {
            return Err(WeaveError::Configuration(format!(
                "hierarchical workflow '{workflow}': delegate '{}' appears twice",
                delegate.name()
            )));
        }
    }
    Ok(())
}

/// The root decides per call whether to answer or delegate; delegation
/// happens through its tool registry, so nothing else is needed here.
pub(crate) async fn run(
    root: &Arc<dyn Agent>,
    ctx: &InvocationContext,
    input: String,
) -> Result<AgentOutput, WeaveError> {
    root.run(ctx, input).await
}
