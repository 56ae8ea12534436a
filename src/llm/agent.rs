//! Single-turn conversational agent.

use std::fmt;
use std::io::Write;
use std::time::Instant;

use anyhow::{Context, Result};
use futures::StreamExt;
use rig::agent::{Agent, AgentBuilder, MultiTurnStreamItem, Text};
use rig::completion::{CompletionModel, Prompt};
use rig::streaming::{StreamedAssistantContent, StreamingPrompt};
use tracing::{debug, info, warn};

use super::ChatClient;

/// Reply produced by one agent run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentResponse {
    pub text: String,
    pub agent_name: String,
    pub model_id: String,
}

impl fmt::Display for AgentResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Agent binding a fixed system instruction and a name to a chat client.
///
/// Runs are independent: no history is carried from one run to the next.
pub struct ChatAgent<M: CompletionModel> {
    agent: Agent<M>,  // RIG agent with the instruction as preamble
    name: String,     // Display name
    model_id: String, // Model the agent talks to
}

impl<M: CompletionModel + 'static> ChatAgent<M> {
    /// Create a new agent.
    ///
    /// # Arguments
    /// * `client` - Chat client the agent sends requests through
    /// * `instructions` - System instruction sent with every request
    /// * `name` - Agent display name
    pub fn new(client: ChatClient<M>, instructions: &str, name: &str) -> Self {
        let model_id = client.model_id().to_string();
        info!("Creating agent \"{}\" on {}", name, model_id);

        let agent = AgentBuilder::new(client.into_model()).name(name).preamble(instructions).build();

        Self { agent, name: name.to_string(), model_id }
    }

    /// Agent display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Send one user message and return the reply.
    ///
    /// # Errors
    /// Returns an error if the chat request fails.
    pub async fn run(&self, message: &str) -> Result<AgentResponse> {
        debug!("{} <- {}", self.name, message);
        let started = Instant::now();

        let reply = self.agent.prompt(message).await.with_context(|| format!("Agent \"{}\" request failed", self.name))?;

        debug!("{} -> {} ({} ms)", self.name, reply, started.elapsed().as_millis());
        if reply.trim().is_empty() {
            warn!("Agent \"{}\" returned an empty reply", self.name);
        }

        Ok(self.response(&reply))
    }

    /// Send one user message, writing the reply to `out` as it is generated.
    ///
    /// Text deltas are written and flushed as they arrive; the joined reply is
    /// returned once the stream ends.
    ///
    /// # Errors
    /// Returns an error if the chat request fails, the stream breaks, or `out`
    /// cannot be written.
    pub async fn run_stream<W: Write>(&self, message: &str, out: &mut W) -> Result<AgentResponse> {
        debug!("{} <- {} (streaming)", self.name, message);
        let started = Instant::now();

        let mut stream = self.agent.stream_prompt(message).await;
        let mut reply = String::new();
        while let Some(item) = stream.next().await {
            let item = item.with_context(|| format!("Agent \"{}\" stream failed", self.name))?;
            if let MultiTurnStreamItem::StreamAssistantItem(StreamedAssistantContent::Text(Text { text })) = item {
                out.write_all(text.as_bytes())?;
                out.flush()?;
                reply.push_str(&text);
            }
        }

        debug!("{} -> {} ({} ms, streamed)", self.name, reply, started.elapsed().as_millis());
        if reply.trim().is_empty() {
            warn!("Agent \"{}\" returned an empty reply", self.name);
        }

        Ok(self.response(&reply))
    }

    fn response(&self, reply: &str) -> AgentResponse {
        AgentResponse { text: reply.trim().to_string(), agent_name: self.name.clone(), model_id: self.model_id.clone() }
    }
}
