//! goal-roadmap server and one-shot CLI.
//!
//! Usage:
//!   goal-roadmap serve [--bind 127.0.0.1:8790]
//!   goal-roadmap refine --goal "computers" --duration "2 years"
//!   goal-roadmap roadmap --refined-goal "I want to ..." --duration "18 months"

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use goal_roadmap::{RawRequest, RoadmapService, config::Config, http::start_http_server};
use tracing::info;

#[derive(Parser)]
#[command(name = "goal-roadmap")]
#[command(about = "Goal refinement and roadmap generation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server
    Serve {
        /// Override the bind address (ROADMAP_HTTP_BIND)
        #[arg(long)]
        bind: Option<std::net::SocketAddr>,
    },
    /// Classify a goal once and print the clarify/review response
    Refine {
        #[arg(long)]
        goal: String,
        #[arg(long)]
        duration: String,
        #[arg(long)]
        temperature: Option<f32>,
    },
    /// Generate a roadmap for an approved goal and print it
    Roadmap {
        #[arg(long)]
        refined_goal: String,
        #[arg(long)]
        duration: String,
        #[arg(long)]
        temperature: Option<f32>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        e
    })?;

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&config.runtime.log_level))
        .with_ansi(false)
        .with_writer(std::io::stderr)
        .init();

    info!(
        "Configuration loaded: models={:?}, tiers_ms={:?}, max_retries={}",
        config.provider.models, config.provider.timeout_tiers_ms, config.provider.max_retries
    );

    match cli.command {
        Commands::Serve { bind } => {
            if let Some(bind) = bind {
                config.runtime.http_bind = bind;
            }
            let service = RoadmapService::from_config(&config)?;
            start_http_server(Arc::new(config), service).await?;
            Ok(())
        }
        Commands::Refine {
            goal,
            duration,
            temperature,
        } => {
            let raw = RawRequest {
                goal: Some(goal),
                duration: Some(duration),
                refined_goal: None,
                temperature,
            };
            one_shot(&config, raw).await
        }
        Commands::Roadmap {
            refined_goal,
            duration,
            temperature,
        } => {
            let raw = RawRequest {
                goal: None,
                duration: Some(duration),
                refined_goal: Some(refined_goal),
                temperature,
            };
            one_shot(&config, raw).await
        }
    }
}

async fn one_shot(config: &Config, raw: RawRequest) -> Result<()> {
    let service = RoadmapService::from_config(config)?;
    let reply = service.respond(raw).await;
    println!("{}", serde_json::to_string_pretty(&reply.body)?);
    if reply.status >= 400 {
        anyhow::bail!("request {} failed with status {}", reply.request_id, reply.status);
    }
    Ok(())
}
