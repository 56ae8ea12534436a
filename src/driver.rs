//! The demo sequence: load a model, build a chat client and agent, ask one question.

use std::io::Write;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::foundry::{self, FoundryLocalManager};
use crate::llm::{self, ChatAgent};

/// Attach to the configured service, or discover it through the `foundry` CLI.
async fn manager(config: &AppConfig) -> Result<FoundryLocalManager> {
    let manager = match config.service_url {
        Some(ref url) => FoundryLocalManager::with_service_uri(url, &config.api_key)?,
        None => FoundryLocalManager::start(&config.api_key).await.context("Failed to start Foundry Local service")?,
    };

    info!("Foundry Local service URL: {}", manager.service_uri());
    info!("Foundry Local service status: running={}", manager.is_service_running().await);
    Ok(manager)
}

/// Run the agent sequence, writing status lines and the reply to `out`.
///
/// # Errors
/// Any failure ends the sequence; nothing is retried.
pub async fn run<W: Write>(config: &AppConfig, out: &mut W) -> Result<()> {
    let manager = manager(config).await?;

    let model = manager.load_model(&config.model, config.ttl()).await.with_context(|| format!("Failed to load model '{}'", config.model))?;
    writeln!(out, "Loaded model: {}", model.id)?;
    writeln!(out, "Model details: {}", manager.endpoint())?;

    match manager.list_loaded_models().await {
        Ok(loaded) => info!("Models running in the service: {:?}", loaded),
        Err(e) => warn!("Could not list loaded models: {}", e),
    }

    let client = llm::connect(&manager.endpoint(), manager.api_key(), &model.id)?;
    let agent = ChatAgent::new(client, &config.instructions, &config.name);

    info!("Asking {}: {}", agent.name(), config.prompt);
    let response = if config.stream {
        let response = agent.run_stream(&config.prompt, out).await?;
        writeln!(out)?;
        response
    } else {
        let response = agent.run(&config.prompt).await?;
        writeln!(out, "{}", response)?;
        response
    };
    debug!("Reply from {} ({})", response.agent_name, response.model_id);

    Ok(())
}

/// Write the service catalog to `out`, marking cached models.
pub async fn list_models<W: Write>(config: &AppConfig, out: &mut W) -> Result<()> {
    let manager = manager(config).await?;
    let catalog = manager.list_catalog_models().await.context("Failed to fetch model catalog")?;
    let cached = manager.list_cached_models().await.context("Failed to list cached models")?;
    foundry::print_catalog(out, catalog, &cached)?;
    Ok(())
}
