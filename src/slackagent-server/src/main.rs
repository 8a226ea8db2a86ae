//! Slackagent - agent servers, Slack ingress and reply poster in one binary.

use std::io::Read;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde_json::json;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use slackagent_engine::Persona;
use slackagent_guard::{analyze, route_reply};
use slackagent_server::{AppConfig, run_agent, run_ingress, run_poster};

/// Slack multi-agent assistant
#[derive(Parser)]
#[command(name = "slackagent")]
#[command(about = "Slack multi-agent assistant")]
#[command(version)]
struct Args {
    /// Configuration file path (JSON)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Log level
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Enable JSON logging
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve one agent persona over A2A
    Agent {
        /// verification, execution, time, docs or fetch-url
        #[arg(long, env = "AGENT_PERSONA")]
        persona: Persona,
    },
    /// Receive Slack events
    Ingress,
    /// Deliver queued replies to Slack
    Poster,
    /// Show how a reply would be delivered
    Classify {
        /// Reply text; read from stdin when omitted
        text: Option<String>,
    },
}

fn setup_logging(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if json {
        subscriber
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        subscriber
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }
}

fn classify(text: Option<String>) -> ExitCode {
    let text = match text {
        Some(text) => text,
        None => {
            let mut buffer = String::new();
            if let Err(e) = std::io::stdin().read_to_string(&mut buffer) {
                eprintln!("Failed to read stdin: {e}");
                return ExitCode::FAILURE;
            }
            buffer
        }
    };
    let report = json!({
        "surface": route_reply(&text),
        "report": analyze(&text),
    });
    match serde_json::to_string_pretty(&report) {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Failed to render report: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn shutdown_signal(shutdown_timeout: u64) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down (timeout: {}s)", shutdown_timeout),
        _ = terminate => info!("Received SIGTERM, shutting down (timeout: {}s)", shutdown_timeout),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let command = match args.command {
        Command::Classify { text } => return classify(text),
        command => command,
    };

    setup_logging(&args.log_level, args.json_logs);

    let loaded = match &args.config {
        Some(path) => AppConfig::load(path),
        None => AppConfig::from_env(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let shutdown = shutdown_signal(config.server.shutdown_timeout);
    let result = match command {
        Command::Agent { persona } => run_agent(config, persona, shutdown).await,
        Command::Ingress => run_ingress(config, shutdown).await,
        Command::Poster => run_poster(config, shutdown).await,
        Command::Classify { .. } => Ok(()),
    };

    if let Err(e) = result {
        error!("Fatal: {:#}", e);
        return ExitCode::FAILURE;
    }

    info!("Stopped");
    ExitCode::SUCCESS
}
