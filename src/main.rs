//! agentweave CLI binary entry point.

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use agentweave::agent::LlmAgent;
use agentweave::cli::{Cli, Commands, RunArgs, SessionCommands, SessionsArgs};
use agentweave::config::WeaveConfig;
use agentweave::error::WeaveError;
use agentweave::model::{GeminiEngine, ReasoningEngine};
use agentweave::runner::{RunEvent, RunEventPayload, Runner};
use agentweave::session::EngineSummarizer;
use agentweave::tools::builtin;

const DEFAULT_INSTRUCTION: &str = "You are a helpful banking assistant. Use the available tools \
to look up payment fees and exchange rates, and to save or recall facts the user shares about \
themselves. Answer concisely.";

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match WeaveConfig::discover(cli.config.as_deref()) {
        Ok(config) => match cli.command {
            Commands::Run(args) => handle_run(config, args).await,
            Commands::Sessions(args) => handle_sessions(config, args).await,
        },
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        eprintln!("error [{}]: {e}", e.kind());
        std::process::exit(1);
    }
}

async fn handle_run(mut config: WeaveConfig, args: RunArgs) -> Result<(), WeaveError> {
    if let Some(model) = args.model {
        config = config.with_model(model);
    }
    if let Some(db) = args.db {
        config = config.with_database_path(db);
    }
    config.validate()?;

    let engine: Arc<dyn ReasoningEngine> = Arc::new(GeminiEngine::from_config(&config)?);
    let mut builder = LlmAgent::builder("assistant", Arc::clone(&engine))
        .instruction(args.instruction.as_deref().unwrap_or(DEFAULT_INSTRUCTION));
    let server_tools = args.server_tools();
    if server_tools.is_empty() {
        builder = builder
            .tools(builtin::lookup_tools())
            .tools(builtin::memory_tools());
    }
    for tool in server_tools {
        builder = builder.server_tool(tool);
    }
    let agent = builder.build()?;

    let sink = Arc::new(|event: RunEvent| match &event.payload {
        RunEventPayload::ToolCall {
            call,
            result,
            is_error,
            ..
        } => {
            let status = if *is_error { "error" } else { "ok" };
            eprintln!("  tool {} -> {status}: {result}", call.name);
        }
        RunEventPayload::Compacted { report } => {
            eprintln!("  compacted {} turns", report.replaced_turns);
        }
        _ => {}
    });

    let sessions = config.session_service()?;
    let mut runner = Runner::new(Arc::new(agent), sessions.clone()).with_event_sink(sink);
    if let Some(compaction) = config.compaction.clone() {
        runner = runner.with_compaction(compaction, Arc::new(EngineSummarizer::new(engine)))?;
    }

    let outcome = runner.run(args.session.as_deref(), args.query).await;
    sessions.close().await?;
    let outcome = outcome?;

    println!("{}", outcome.output);
    eprintln!("session: {}", outcome.session_id);
    Ok(())
}

async fn handle_sessions(mut config: WeaveConfig, args: SessionsArgs) -> Result<(), WeaveError> {
    if let Some(db) = args.db {
        config = config.with_database_path(db);
    }
    if config.database_path.is_none() {
        return Err(WeaveError::Configuration(
            "no session database configured (pass --db or set AGENTWEAVE_DB)".into(),
        ));
    }
    let sessions = config.session_service()?;

    match args.command {
        SessionCommands::List => {
            for id in sessions.list_sessions().await? {
                println!("{id}");
            }
        }
        SessionCommands::Show { id } => {
            let session = sessions
                .get(&id)
                .await?
                .ok_or_else(|| WeaveError::InvalidArgument(format!("no session '{id}'")))?;
            for turn in session.turns() {
                let who = turn.author.as_deref().unwrap_or("user");
                println!("#{} {} {who}: {}", turn.ordinal, turn.role, turn.content.render());
            }
            println!("{}", serde_json::to_string_pretty(session.values())?);
        }
        SessionCommands::Delete { id } => {
            if !sessions.delete(&id).await? {
                return Err(WeaveError::InvalidArgument(format!("no session '{id}'")));
            }
        }
    }
    sessions.close().await
}
