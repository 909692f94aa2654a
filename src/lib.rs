//! agentweave — composable agent workflows
//!
//! Combine reasoning agents and plain functions into sequential, parallel,
//! loop and hierarchical topologies, give them tools, and run them against
//! persistent sessions with optional context compaction.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use agentweave::prelude::*;
//!
//! # async fn example() -> agentweave::error::Result<()> {
//! let config = WeaveConfig::from_env()?;
//! let engine: Arc<dyn ReasoningEngine> = Arc::new(GeminiEngine::from_config(&config)?);
//! let agent = LlmAgent::builder("assistant", engine)
//!     .instruction("You are a helpful banking assistant.")
//!     .tools(agentweave::tools::builtin::lookup_tools())
//!     .build()?;
//!
//! let runner = Runner::new(Arc::new(agent), config.session_service()?);
//! let outcome = runner.run(Some("demo"), "What is the fee for paying by card?").await?;
//! println!("{}", outcome.output);
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod config;
pub mod error;
pub mod model;
pub mod prelude;
pub mod runner;
pub mod session;
pub mod stop;
pub mod tools;
pub mod types;
pub mod util;
pub mod workflow;

#[cfg(feature = "cli")]
pub mod cli;
