//! CLI argument types for the `agentweave` binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::types::ServerTool;

/// agentweave CLI
#[derive(Parser, Debug)]
#[command(name = "agentweave", version, about = "Run agent workflows against persistent sessions")]
pub struct Cli {
    /// Config file (defaults to the per-user config if present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one query through an assistant with the built-in tools
    Run(RunArgs),
    /// Inspect a session database
    Sessions(SessionsArgs),
}

/// Arguments for `agentweave run`.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// User query
    pub query: String,

    /// Session to continue (a new one is created when omitted)
    #[arg(short, long)]
    pub session: Option<String>,

    /// SQLite file for durable sessions
    #[arg(long)]
    pub db: Option<PathBuf>,

    /// Gemini model name
    #[arg(short, long)]
    pub model: Option<String>,

    /// Instruction for the assistant
    #[arg(short, long)]
    pub instruction: Option<String>,

    /// Ground answers with Google Search (replaces the local tools)
    #[arg(long)]
    pub search: bool,

    /// Let the model run code it writes (replaces the local tools)
    #[arg(long)]
    pub code_execution: bool,
}

impl RunArgs {
    /// Provider-side tools requested on the command line.
    pub fn server_tools(&self) -> Vec<ServerTool> {
        let mut tools = Vec::new();
        if self.search {
            tools.push(ServerTool::GoogleSearch);
        }
        if self.code_execution {
            tools.push(ServerTool::CodeExecution);
        }
        tools
    }
}

/// Arguments for the `sessions` subcommand group.
#[derive(Parser, Debug)]
pub struct SessionsArgs {
    /// SQLite file to inspect
    #[arg(long)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: SessionCommands,
}

/// Session subcommands.
#[derive(Subcommand, Debug)]
pub enum SessionCommands {
    /// List session ids for the configured app
    List,
    /// Print a session's turns and state
    Show { id: String },
    /// Delete a session
    Delete { id: String },
}

impl Cli {
    /// Parse CLI arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
