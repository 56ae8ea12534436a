//! OpenAI-compatible chat client using RIG.

use anyhow::{Context, Result};
use reqwest::Url;
use rig::client::CompletionClient;
use rig::completion::CompletionModel;
use rig::providers::openai;
use tracing::info;

/// Chat client bound to one model on an OpenAI-compatible endpoint.
///
/// The model is held as RIG's generic [`CompletionModel`], so anything built on
/// top of it (agents in particular) is independent of the provider.
pub struct ChatClient<M: CompletionModel> {
    model: M,         // Provider-agnostic completion model
    model_id: String, // Model identifier sent with each request
}

impl<M: CompletionModel> ChatClient<M> {
    /// Wrap an existing completion model.
    pub fn new(model: M, model_id: impl Into<String>) -> Self {
        Self { model, model_id: model_id.into() }
    }

    /// Model identifier this client targets.
    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// Give up the client, returning the underlying completion model.
    pub fn into_model(self) -> M {
        self.model
    }
}

/// Create a chat client for an OpenAI-compatible endpoint.
///
/// Requests go to `<endpoint>/chat/completions` (Chat Completions API, which
/// is what local servers implement).
///
/// # Arguments
/// * `endpoint` - Base URL of the OpenAI-compatible API (e.g. `http://127.0.0.1:5273/v1`)
/// * `api_key` - Bearer credential
/// * `model_id` - Model identifier
///
/// # Errors
/// Returns an error if the credential is empty or the HTTP client cannot be built.
pub fn connect(endpoint: &Url, api_key: &str, model_id: &str) -> Result<ChatClient<impl CompletionModel + 'static>> {
    if api_key.trim().is_empty() {
        anyhow::bail!("API key must not be empty");
    }

    let base_url = endpoint.as_str().trim_end_matches('/');
    info!("Connecting chat client to {}", base_url);
    info!("Using model: {}", model_id);

    let client = openai::Client::builder()
        .api_key(api_key)
        .base_url(base_url)
        .build()
        .context("Failed to create OpenAI client")?
        .completions_api();

    Ok(ChatClient::new(client.completion_model(model_id), model_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_keeps_model_id() {
        let endpoint = Url::parse("http://127.0.0.1:5273/v1").unwrap();
        let client = connect(&endpoint, "OPENAI_API_KEY", "qwen2.5-0.5b-instruct-generic-cpu:4").unwrap();
        assert_eq!(client.model_id(), "qwen2.5-0.5b-instruct-generic-cpu:4");
    }

    #[test]
    fn test_connect_rejects_empty_key() {
        let endpoint = Url::parse("http://127.0.0.1:5273/v1").unwrap();
        assert!(connect(&endpoint, "  ", "m").is_err());
    }
}
