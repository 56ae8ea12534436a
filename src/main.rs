//! Foundry Agent - a chat agent running on a local Foundry model.
//!
//! Starts (or finds) the Foundry Local service, loads a small language model,
//! points an OpenAI-compatible RIG client at the local endpoint, wraps it in an
//! agent with a fixed instruction and asks it one question.

mod config;
mod driver;
mod foundry;
mod llm;

use anyhow::Result;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::LocalTime;

use config::AppConfig;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let config = AppConfig::from_args();

    // Respect RUST_LOG env var, fallback to verbose flag, default to info.
    // Logs go to stderr; stdout carries only the program output.
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| if config.verbose { EnvFilter::try_new("debug") } else { EnvFilter::try_new("info") })?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_timer(LocalTime::new(time::macros::format_description!("[hour]:[minute]:[second]")))
        .init();

    info!("🤖 Foundry Agent v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = config.validate() {
        error!("❌ Configuration error: {}", e);
        std::process::exit(1);
    }

    if config.list_models {
        let mut stdout = std::io::stdout().lock();
        return driver::list_models(&config, &mut stdout).await;
    }

    config.log_config();

    let mut stdout = std::io::stdout().lock();
    driver::run(&config, &mut stdout).await
}
