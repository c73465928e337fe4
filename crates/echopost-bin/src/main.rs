//! echopost - buffers producer logs locally while the remote server is down.

mod app;

use anyhow::Context;
use clap::Parser;
use echopost_core::{AgentConfig, DEFAULT_BASE_DIR, DEFAULT_LOG_LEVEL, DEFAULT_SERVER};
use observability::LogConfig;
use std::path::PathBuf;

/// echopost agent command-line interface.
#[derive(Parser)]
#[command(name = "echopost")]
#[command(about = "Local log-buffering agent for the Data Nadhi server")]
#[command(version)]
struct Cli {
    /// Directory holding the socket, queue and session logs
    #[arg(long, env = "ECHOPOST_BASE_DIR", default_value = DEFAULT_BASE_DIR)]
    base_dir: PathBuf,

    /// API key sent with every delivery
    #[arg(long, env = "ECHOPOST_API_KEY", default_value = "")]
    api_key: String,

    /// Remote server address; `GET` on it is the health check
    #[arg(long, env = "ECHOPOST_SERVER", default_value = DEFAULT_SERVER)]
    server: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = DEFAULT_LOG_LEVEL)]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    observability::init_with_config(LogConfig {
        service_name: "echopost".into(),
        default_level: cli.log_level.clone(),
        ..Default::default()
    })
    .context("failed to initialize logging")?;

    let mut config = AgentConfig::new(cli.base_dir, cli.api_key, &cli.server);
    config.log_level = cli.log_level;

    app::run_agent(config).await
}
