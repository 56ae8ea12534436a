//! Foundry Local error types.

use thiserror::Error;

/// Errors raised while talking to the Foundry Local service.
#[derive(Debug, Error)]
pub enum FoundryError {
    /// The `foundry` CLI is not on `PATH`.
    #[error("foundry CLI not found on PATH; install Foundry Local first")]
    NotInstalled,

    /// The `foundry` CLI could not be executed.
    #[error("failed to run `foundry {args}`: {source}")]
    Command {
        args: String,
        #[source]
        source: std::io::Error,
    },

    /// The service never reported an endpoint.
    #[error("Foundry Local service did not report an endpoint")]
    ServiceUnavailable,

    /// A service URI could not be parsed.
    #[error("invalid service URI '{uri}': {reason}")]
    InvalidServiceUri { uri: String, reason: String },

    /// Transport-level failure (connect, timeout, body read).
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Non-2xx HTTP response from the service.
    #[error("HTTP {status} from {url}: {body}")]
    Http { url: String, status: u16, body: String },

    /// The service answered with something we could not decode.
    #[error("unexpected response from {url}: {reason}")]
    Decode { url: String, reason: String },

    /// No catalog entry matches the requested alias or id.
    #[error("model '{0}' not found in the Foundry Local catalog")]
    ModelNotFound(String),

    /// The service reported a failed download.
    #[error("download of '{model}' failed: {reason}")]
    Download { model: String, reason: String },
}
