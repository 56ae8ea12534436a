//! Foundry Local service discovery through the `foundry` CLI.

use std::ffi::OsString;
use std::io::ErrorKind;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use reqwest::Url;
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::FoundryError;

/// Number of status polls after `foundry service start`.
const START_POLL_ATTEMPTS: usize = 10;

/// Delay between status polls.
const START_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Matches the service address in CLI output (hostname or dotted IPv4, with port).
static SERVICE_URI_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"http://(?:[a-zA-Z0-9.-]+|\d{1,3}(?:\.\d{1,3}){3}):\d+").expect("valid service URI regex"));

/// Extract the service URI from `foundry service ...` output.
pub fn parse_service_uri(output: &str) -> Option<Url> {
    SERVICE_URI_RE.find(output).and_then(|m| Url::parse(m.as_str()).ok())
}

/// Handle on the `foundry` command line tool.
pub struct FoundryCli {
    program: OsString,           // Executable to spawn
    leading_args: Vec<OsString>, // Arguments placed before every subcommand
}

impl Default for FoundryCli {
    fn default() -> Self {
        Self { program: "foundry".into(), leading_args: Vec::new() }
    }
}

impl FoundryCli {
    /// Use a different executable (plus leading arguments) in place of `foundry`.
    pub fn with_command(program: impl Into<OsString>, leading_args: impl IntoIterator<Item = impl Into<OsString>>) -> Self {
        Self { program: program.into(), leading_args: leading_args.into_iter().map(Into::into).collect() }
    }

    /// Run the CLI and return its stdout.
    async fn run(&self, args: &[&str]) -> Result<String, FoundryError> {
        debug!("Running foundry {}", args.join(" "));

        let output = Command::new(&self.program).args(&self.leading_args).args(args).output().await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => FoundryError::NotInstalled,
            _ => FoundryError::Command { args: args.join(" "), source: e },
        })?;

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// URI of the running service, or `None` if it is not running.
    pub async fn service_uri(&self) -> Result<Option<Url>, FoundryError> {
        let stdout = self.run(&["service", "status"]).await?;
        Ok(parse_service_uri(&stdout))
    }

    /// Return the URI of the running service, starting it first if needed.
    pub async fn start_service(&self) -> Result<Url, FoundryError> {
        if let Some(uri) = self.service_uri().await? {
            debug!("Foundry Local service already running at {}", uri);
            return Ok(uri);
        }

        info!("Starting Foundry Local service...");
        let stdout = self.run(&["service", "start"]).await?;
        if let Some(uri) = parse_service_uri(&stdout) {
            return Ok(uri);
        }

        for _ in 0..START_POLL_ATTEMPTS {
            if let Some(uri) = self.service_uri().await? {
                return Ok(uri);
            }
            tokio::time::sleep(START_POLL_INTERVAL).await;
        }

        warn!("Foundry Local service did not start within the expected time");
        Err(FoundryError::ServiceUnavailable)
    }
}
