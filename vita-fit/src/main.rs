//! vita-fit - Fitness Agent Microservice
//!
//! Workout and step logging, energy estimation, and cross-agent fitness
//! events. Runs independently of the diet agent: an unreachable message
//! store only degrades cross-notification, never the agent.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;
use vita_common::channel::MessageChannel;
use vita_fit::config::FitConfig;
use vita_fit::AppState;

#[derive(Debug, Parser)]
#[command(name = "vita-fit", about = "Fitness agent microservice")]
struct Args {
    /// Configuration file path
    #[arg(long, env = "VITA_FIT_CONFIG")]
    config: Option<PathBuf>,

    /// Override the HTTP port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    info!("Starting vita-fit (Fitness Agent) microservice");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config_path =
        vita_common::config::resolve_config_path(args.config.as_deref(), "VITA_FIT_CONFIG", "vita-fit");
    let mut config: FitConfig = vita_common::config::load_config(config_path.as_deref())?;
    if let Some(port) = args.port {
        config.http.port = port;
    }

    let channel = MessageChannel::connect(&config.channel.store_path).await;
    let state = AppState::new(config, channel.clone());

    // Consume diet → fitness events in the background
    let dispatcher = vita_fit::handlers::build_dispatcher(
        state.ledger.clone(),
        channel.clone(),
        state.activity.clone(),
    );
    tokio::spawn(async move {
        dispatcher.run(channel).await;
    });

    let addr = format!("{}:{}", state.config.http.bind, state.config.http.port);
    let app = vita_fit::build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
