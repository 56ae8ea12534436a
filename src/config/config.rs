//! Application configuration and CLI argument parsing.

use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Foundry agent configuration.
///
/// Every option has a default, so running without arguments performs the
/// standard demo: load `qwen2.5-0.5b` and ask the Joker for a pirate joke.
#[derive(Parser, Debug, Clone, Serialize, Deserialize)]
#[command(name = "foundry-agent")]
#[command(author, version, about = "Run a chat agent on a Foundry Local model", long_about = None)]
pub struct AppConfig {
    /// List the Foundry Local model catalog and exit
    #[arg(long)]
    pub list_models: bool,

    /// Model alias or full model id to load
    #[arg(long, short = 'm', env = "FOUNDRY_MODEL", default_value = "qwen2.5-0.5b")]
    pub model: String,

    /// Foundry Local service URL (discovered through the `foundry` CLI if not set)
    #[arg(long, short = 'u', env = "FOUNDRY_SERVICE_URL")]
    pub service_url: Option<String>,

    /// API key for the OpenAI-compatible endpoint (not checked by the local service)
    #[arg(long, env = "OPENAI_API_KEY", default_value = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// System instruction for the agent
    #[arg(long, default_value = "You are good at telling jokes.")]
    pub instructions: String,

    /// Agent display name
    #[arg(long, default_value = "Joker")]
    pub name: String,

    /// Message sent to the agent
    #[arg(long, short = 'p', default_value = "Tell me a joke about a pirate.")]
    pub prompt: String,

    /// Print the reply as it is generated
    #[arg(long)]
    pub stream: bool,

    /// Seconds the service keeps the model loaded while idle
    #[arg(long, default_value = "600")]
    pub ttl_secs: u64,

    /// Enable verbose logging
    #[arg(long, short = 'v')]
    pub verbose: bool,
}

impl AppConfig {
    /// Parse configuration from command line arguments.
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Idle time-to-live for the loaded model.
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        let required = [("model", &self.model), ("prompt", &self.prompt), ("instructions", &self.instructions), ("name", &self.name)];
        for (field, value) in required {
            if value.trim().is_empty() {
                anyhow::bail!("{} must not be empty", field);
            }
        }

        if self.ttl_secs == 0 {
            anyhow::bail!("TTL must be positive");
        }

        if let Some(ref url) = self.service_url
            && !(url.starts_with("http://") || url.starts_with("https://"))
        {
            anyhow::bail!("Service URL must start with http:// or https://, got {}", url);
        }

        Ok(())
    }

    /// Log the current configuration.
    pub fn log_config(&self) {
        info!("Configuration:");
        info!("  Model: {}", self.model);
        match self.service_url {
            Some(ref url) => info!("  Service URL: {}", url),
            None => info!("  Service URL: (discover via foundry CLI)"),
        }
        info!("  Agent name: {}", self.name);
        info!("  Instructions: {}...", &self.instructions.chars().take(50).collect::<String>());
        info!("  Model TTL: {}s", self.ttl_secs);
        info!("  Streaming: {}", self.stream);
    }
}
