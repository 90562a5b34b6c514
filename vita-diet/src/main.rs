//! vita-diet - Diet Agent Microservice
//!
//! Meal analysis (image and/or text), nutrition tracking, and cross-agent
//! diet events. Runs independently of the fitness agent: an unreachable
//! message store only degrades cross-notification, never the agent.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;
use vita_common::channel::MessageChannel;
use vita_diet::config::DietConfig;

#[derive(Debug, Parser)]
#[command(name = "vita-diet", about = "Diet agent microservice")]
struct Args {
    /// Configuration file path
    #[arg(long, env = "VITA_DIET_CONFIG")]
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

    info!("Starting vita-diet (Diet Agent) microservice");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config_path =
        vita_common::config::resolve_config_path(args.config.as_deref(), "VITA_DIET_CONFIG", "vita-diet");
    let mut config: DietConfig = vita_common::config::load_config(config_path.as_deref())?;
    if let Some(port) = args.port {
        config.http.port = port;
    }

    // Degraded mode is acceptable: the agent stays independently operable
    let channel = MessageChannel::connect(&config.channel.store_path).await;

    let state = vita_diet::build_state(config, channel.clone())?;

    // Consume fitness → diet events in the background
    let dispatcher =
        vita_diet::handlers::build_dispatcher(state.ledger.clone(), state.activity.clone());
    let consumer_channel = channel.clone();
    tokio::spawn(async move {
        dispatcher.run(consumer_channel).await;
    });

    let addr = format!("{}:{}", state.config.http.bind, state.config.http.port);
    let app = vita_diet::build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
