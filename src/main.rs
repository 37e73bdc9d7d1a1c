#![forbid(unsafe_code)]

//! `toolwire` — stdio RPC client binary.
//!
//! Launches the configured worker process, performs the handshake, and
//! either lists the worker's capability surface or executes a named tool,
//! printing the result as JSON.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use toolwire::{AppError, Result, Session, SessionConfig};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "toolwire", about = "Stdio RPC client with result memoization", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: PathBuf,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Override the configured worker command.
    #[arg(long)]
    worker: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Launch the worker and print its advertised tools.
    List,

    /// Execute a named tool and print its result.
    Call {
        /// Tool name.
        tool: String,

        /// Tool parameters as a JSON object.
        #[arg(long, default_value = "{}")]
        params: String,
    },
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;
    info!("toolwire bootstrap");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    let mut config = SessionConfig::load_from_path(&args.config)?;

    // Override worker command from CLI if provided.
    if let Some(worker) = args.worker {
        config.worker_cmd = worker;
    }
    info!("configuration loaded");

    let session = Session::launch(config).await?;
    info!(session_id = %session.id(), "session established");

    let outcome = dispatch(&session, args.command).await;
    session.shutdown().await;
    outcome
}

async fn dispatch(session: &Session, command: Command) -> Result<()> {
    match command {
        Command::List => {
            for tool in session.tools().await {
                println!("{}\t{}", tool.name, tool.description);
            }
            Ok(())
        }
        Command::Call { tool, params } => {
            let params: serde_json::Value = serde_json::from_str(&params)
                .map_err(|err| AppError::Config(format!("invalid --params JSON: {err}")))?;

            match session.execute_tool(&tool, params).await {
                Ok(result) => {
                    let rendered = serde_json::to_string_pretty(&result)
                        .map_err(|err| AppError::Rpc(format!("failed to render result: {err}")))?;
                    println!("{rendered}");
                    Ok(())
                }
                Err(AppError::Worker(err)) => {
                    error!(code = err.code, message = %err.message, "tool call failed");
                    Err(AppError::Worker(err))
                }
                Err(err) => Err(err),
            }
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(env_filter);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
