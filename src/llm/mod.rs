//! LLM module: chat client and agent for an OpenAI-compatible endpoint.
//!
//! Uses RIG's OpenAI provider against the local Foundry endpoint.

mod agent;
mod client;

pub use agent::ChatAgent;
pub use client::{ChatClient, connect};

#[cfg(test)]
pub(crate) use agent::tests as agent_tests;
