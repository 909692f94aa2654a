//! Concurrent branches joined at a barrier, then merged.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::agent::{Agent, AgentOutput, InvocationContext};
use crate::error::{FailureKind, FailureReport, WeaveError};

/// Combines branch results, in branch declaration order, into one output.
pub type MergeFn = Arc<dyn Fn(&[BranchResult]) -> Result<String, WeaveError> + Send + Sync>;

/// Outcome of one branch.
#[derive(Debug, Clone, PartialEq)]
pub struct BranchResult {
    pub name: String,
    pub outcome: Result<String, FailureReport>,
}

impl BranchResult {
    pub fn output(&self) -> Option<&str> {
        self.outcome.as_deref().ok()
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// How a parallel step treats slow and failed branches.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParallelPolicy {
    /// Call the merge function with failed entries present, as long as at
    /// least one branch succeeded. When false any failure fails the step.
    pub merge_on_partial_failure: bool,
    /// Shared deadline for the join barrier; branches still running are aborted.
    pub join_timeout: Option<Duration>,
}

/// Default merge: successful outputs as `name:\ntext` blocks separated by a blank line.
pub fn concat_merge() -> MergeFn {
    Arc::new(|results: &[BranchResult]| {
        Ok(results
            .iter()
            .filter_map(|r| r.output().map(|text| format!("{}:\n{text}", r.name)))
            .collect::<Vec<_>>()
            .join("\n\n"))
    })
}

pub(crate) fn check_unique_names(workflow: &str, branches: &[Arc<dyn Agent>]) -> Result<(), WeaveError> {
    let mut seen = HashSet::new();
    for branch in branches {
        if !seen.insert(branch.name()) {
            return Err(WeaveError::Configuration(format!(
                "parallel workflow '{workflow}': branch '{}' appears twice",
                branch.name()
            )));
        }
    }
    Ok(())
}

pub(crate) async fn run(
    workflow: &str,
    branches: &[Arc<dyn Agent>],
    merge: &MergeFn,
    policy: &ParallelPolicy,
    ctx: &InvocationContext,
    input: String,
) -> Result<AgentOutput, WeaveError> {
    let mut handles = Vec::with_capacity(branches.len());
    for branch in branches {
        let agent = Arc::clone(branch);
        let branch_ctx = ctx.fork();
        let task_ctx = branch_ctx.clone();
        let input = input.clone();
        handles.push((
            branch.name().to_string(),
            branch_ctx,
            tokio::spawn(async move { agent.run(&task_ctx, input).await }),
        ));
    }

    let deadline = policy
        .join_timeout
        .map(|timeout| (tokio::time::Instant::now() + timeout, timeout));

    let mut results = Vec::with_capacity(handles.len());
    let mut failures = Vec::new();
    let mut effects = Vec::new();
    let mut escalate = false;

    for (name, branch_ctx, mut handle) in handles {
        let joined = match deadline {
            Some((at, timeout)) => match tokio::time::timeout_at(at, &mut handle).await {
                Ok(joined) => joined,
                Err(_) => {
                    handle.abort();
                    Ok(Err(WeaveError::Timeout(timeout.as_millis() as u64)))
                }
            },
            None => handle.await,
        };

        let outcome = match joined {
            Ok(Ok(output)) => {
                ctx.absorb(&branch_ctx);
                effects.extend(output.effects);
                escalate |= output.escalate;
                Ok(output.text)
            }
            Ok(Err(e)) => {
                warn!(workflow, branch = %name, error = %e, "parallel branch failed");
                Err(e.report())
            }
            Err(join_err) => {
                warn!(workflow, branch = %name, error = %join_err, "parallel branch task did not complete");
                Err(FailureReport::new(FailureKind::Internal, format!("branch task failed: {join_err}")))
            }
        };
        if let Err(ref report) = outcome {
            failures.push((name.clone(), report.clone()));
        }
        results.push(BranchResult { name, outcome });
    }

    let any_success = results.iter().any(BranchResult::is_success);
    if !failures.is_empty() && !(policy.merge_on_partial_failure && any_success) {
        return Err(WeaveError::BranchesFailed {
            workflow: workflow.to_string(),
            failures,
        });
    }

    debug!(workflow, branches = results.len(), failed = failures.len(), "merging branch outputs");
    let text = merge(&results)?;

    Ok(AgentOutput {
        text,
        effects,
        escalate,
    })
}
