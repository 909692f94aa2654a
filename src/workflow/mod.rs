//! Workflow composer: combines agents into sequential, parallel, loop and
//! hierarchical topologies.
//!
//! A [`Workflow`] is itself an [`Agent`], so topologies nest.

pub mod hierarchical;
pub mod loop_flow;
pub mod parallel;
pub mod sequential;

pub use parallel::{concat_merge, BranchResult, MergeFn, ParallelPolicy};

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::agent::{Agent, AgentOutput, Effect, InvocationContext};
use crate::error::WeaveError;
use crate::stop::StopCondition;

/// Control-flow shape of a workflow. Exactly one shape per instance.
#[derive(Clone)]
pub enum Topology {
    /// Run steps in order; each step's output is the next step's input.
    Sequential { steps: Vec<Arc<dyn Agent>> },
    /// Run branches concurrently on the same input and merge their outputs.
    Parallel {
        branches: Vec<Arc<dyn Agent>>,
        merge: MergeFn,
        policy: ParallelPolicy,
    },
    /// Re-run `body` on its own previous output until `stop` accepts, the
    /// body escalates, or `max_iterations` runs have happened.
    Loop {
        body: Arc<dyn Agent>,
        max_iterations: u32,
        stop: Arc<dyn StopCondition>,
    },
    /// `root` answers directly or delegates to one of `delegates` as a tool.
    Hierarchical {
        root: Arc<dyn Agent>,
        delegates: Vec<Arc<dyn Agent>>,
    },
}

impl Topology {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Sequential { .. } => "sequential",
            Self::Parallel { .. } => "parallel",
            Self::Loop { .. } => "loop",
            Self::Hierarchical { .. } => "hierarchical",
        }
    }

    fn children(&self) -> Vec<Arc<dyn Agent>> {
        match self {
            Self::Sequential { steps } => steps.clone(),
            Self::Parallel { branches, .. } => branches.clone(),
            Self::Loop { body, .. } => vec![Arc::clone(body)],
            Self::Hierarchical { root, .. } => vec![Arc::clone(root)],
        }
    }
}

impl std::fmt::Debug for Topology {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<String> = self.children().iter().map(|a| a.name().to_string()).collect();
        let mut s = f.debug_struct("Topology");
        s.field("kind", &self.kind()).field("children", &names);
        match self {
            Self::Parallel { policy, .. } => s.field("policy", policy),
            Self::Loop { max_iterations, .. } => s.field("max_iterations", max_iterations),
            Self::Hierarchical { delegates, .. } => s.field(
                "delegates",
                &delegates.iter().map(|d| d.name()).collect::<Vec<_>>(),
            ),
            Self::Sequential { .. } => &mut s,
        };
        s.finish()
    }
}

/// A named, validated topology.
#[derive(Debug, Clone)]
pub struct Workflow {
    name: String,
    description: String,
    topology: Topology,
}

impl Workflow {
    /// Validate and wrap a topology.
    pub fn new(name: impl Into<String>, topology: Topology) -> Result<Self, WeaveError> {
        let workflow = Self {
            name: name.into(),
            description: String::new(),
            topology,
        };
        workflow.validate()?;
        Ok(workflow)
    }

    pub fn sequential(
        name: impl Into<String>,
        steps: impl IntoIterator<Item = Arc<dyn Agent>>,
    ) -> Result<Self, WeaveError> {
        Self::new(
            name,
            Topology::Sequential {
                steps: steps.into_iter().collect(),
            },
        )
    }

    /// Parallel branches merged with `merge`; failed branches fail the step.
    pub fn parallel(
        name: impl Into<String>,
        branches: impl IntoIterator<Item = Arc<dyn Agent>>,
        merge: MergeFn,
    ) -> Result<Self, WeaveError> {
        Self::parallel_with_policy(name, branches, merge, ParallelPolicy::default())
    }

    pub fn parallel_with_policy(
        name: impl Into<String>,
        branches: impl IntoIterator<Item = Arc<dyn Agent>>,
        merge: MergeFn,
        policy: ParallelPolicy,
    ) -> Result<Self, WeaveError> {
        Self::new(
            name,
            Topology::Parallel {
                branches: branches.into_iter().collect(),
                merge,
                policy,
            },
        )
    }

    pub fn looping(
        name: impl Into<String>,
        body: Arc<dyn Agent>,
        max_iterations: u32,
        stop: Arc<dyn StopCondition>,
    ) -> Result<Self, WeaveError> {
        Self::new(
            name,
            Topology::Loop {
                body,
                max_iterations,
                stop,
            },
        )
    }

    /// Hierarchy rooted at `root`; the delegates are the root's sub-agents.
    pub fn hierarchical(name: impl Into<String>, root: Arc<dyn Agent>) -> Result<Self, WeaveError> {
        let delegates = root.sub_agents();
        Self::new(name, Topology::Hierarchical { root, delegates })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Check structural constraints and that delegation edges form a DAG.
    pub fn validate(&self) -> Result<(), WeaveError> {
        if self.name.trim().is_empty() {
            return Err(WeaveError::Configuration("workflow name must not be empty".into()));
        }
        match &self.topology {
            Topology::Sequential { steps } if steps.is_empty() => {
                return Err(self.invalid("needs at least one step"));
            }
            Topology::Parallel { branches, .. } => {
                if branches.is_empty() {
                    return Err(self.invalid("needs at least one branch"));
                }
                parallel::check_unique_names(&self.name, branches)?;
            }
            Topology::Loop { max_iterations, .. } if *max_iterations == 0 => {
                return Err(self.invalid("max_iterations must be at least 1"));
            }
            Topology::Hierarchical { root, delegates } => {
                hierarchical::check_delegates(&self.name, root, delegates)?;
            }
            _ => {}
        }
        check_acyclic(self, &mut Vec::new())
    }

    fn invalid(&self, reason: &str) -> WeaveError {
        WeaveError::Configuration(format!(
            "{} workflow '{}' {reason}",
            self.topology.kind(),
            self.name
        ))
    }
}

/// Walk the agent graph depth-first; an agent name repeated along one path is a cycle.
fn check_acyclic(agent: &dyn Agent, path: &mut Vec<String>) -> Result<(), WeaveError> {
    let name = agent.name().to_string();
    if path.contains(&name) {
        path.push(name);
        return Err(WeaveError::Configuration(format!(
            "delegation cycle: {}",
            path.join(" -> ")
        )));
    }
    path.push(name);
    for child in agent.sub_agents() {
        check_acyclic(child.as_ref(), path)?;
    }
    path.pop();
    Ok(())
}

#[async_trait]
impl Agent for Workflow {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn sub_agents(&self) -> Vec<Arc<dyn Agent>> {
        self.topology.children()
    }

    async fn run(&self, ctx: &InvocationContext, input: String) -> Result<AgentOutput, WeaveError> {
        debug!(workflow = %self.name, topology = self.topology.kind(), "running workflow");

        let mut output = match &self.topology {
            Topology::Sequential { steps } => sequential::run(&self.name, steps, ctx, input.clone()).await?,
            Topology::Parallel {
                branches,
                merge,
                policy,
            } => parallel::run(&self.name, branches, merge, policy, ctx, input.clone()).await?,
            Topology::Loop {
                body,
                max_iterations,
                stop,
            } => {
                loop_flow::run(&self.name, body, *max_iterations, stop.as_ref(), ctx, input.clone())
                    .await?
            }
            Topology::Hierarchical { root, .. } => hierarchical::run(root, ctx, input.clone()).await?,
        };

        output.effects.push(Effect::AgentInvocation {
            agent: self.name.clone(),
            input,
            output: output.text.clone(),
        });
        Ok(output)
    }
}
