//! Foundry Local model catalog entries and alias resolution.
//!
//! The service lists every model it knows about under `/foundry/list`. One alias
//! (e.g. `qwen2.5-0.5b`) usually maps to several variants, one per execution
//! provider; the service returns them ordered by device preference.

use std::fmt;
use std::io::{self, Write};

use serde::Deserialize;

/// Hardware backend a model variant is compiled for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
pub enum ExecutionProvider {
    #[default]
    #[serde(rename = "CPUExecutionProvider")]
    Cpu,
    #[serde(rename = "WebGpuExecutionProvider")]
    WebGpu,
    #[serde(rename = "CUDAExecutionProvider")]
    Cuda,
    #[serde(rename = "QNNExecutionProvider")]
    Qnn,
    #[serde(other)]
    Other,
}

impl ExecutionProvider {
    /// Value of the `ep` query parameter the load endpoint expects, if any.
    pub fn load_hint(&self) -> Option<&'static str> {
        match self {
            ExecutionProvider::Cuda => Some("cuda"),
            ExecutionProvider::WebGpu => Some("webgpu"),
            _ => None,
        }
    }
}

impl fmt::Display for ExecutionProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionProvider::Cpu => write!(f, "cpu"),
            ExecutionProvider::WebGpu => write!(f, "webgpu"),
            ExecutionProvider::Cuda => write!(f, "cuda"),
            ExecutionProvider::Qnn => write!(f, "qnn"),
            ExecutionProvider::Other => write!(f, "other"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct Runtime {
    #[serde(default)]
    execution_provider: ExecutionProvider,
}

/// A model variant as described by the service catalog.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoundryModelInfo {
    #[serde(rename = "name")]
    pub id: String,
    pub alias: String,
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub provider_type: String,
    #[serde(default)]
    pub publisher: String,
    #[serde(default)]
    pub license: Option<String>,
    #[serde(default)]
    pub task: Option<String>,
    #[serde(default)]
    pub file_size_mb: Option<f64>,
    #[serde(default)]
    pub prompt_template: Option<serde_json::Value>,
    #[serde(default)]
    runtime: Runtime,
}

impl FoundryModelInfo {
    pub fn execution_provider(&self) -> ExecutionProvider {
        self.runtime.execution_provider
    }

    /// Provider type as the download endpoint wants it.
    pub fn download_provider_type(&self) -> String {
        if self.provider_type == "AzureFoundry" { format!("{}Local", self.provider_type) } else { self.provider_type.clone() }
    }
}

impl fmt::Display for FoundryModelInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FoundryModelInfo(alias={}, id={}, runtime={}", self.alias, self.id, self.execution_provider())?;
        if let Some(size) = self.file_size_mb {
            write!(f, ", file_size={} MB", size)?;
        }
        if let Some(ref license) = self.license {
            write!(f, ", license={}", license)?;
        }
        write!(f, ")")
    }
}

/// Split `name:3` into `("name", 3)`. Ids without a numeric suffix have version 0.
fn split_version(id: &str) -> (&str, u32) {
    match id.rsplit_once(':') {
        Some((base, version)) => match version.parse() {
            Ok(v) => (base, v),
            Err(_) => (id, 0),
        },
        None => (id, 0),
    }
}

/// Find the catalog entry for an alias or model id.
///
/// Exact ids win, then ids without their version suffix (latest version),
/// then aliases (first entry, since the catalog is already in preference order).
pub fn resolve<'a>(catalog: &'a [FoundryModelInfo], alias_or_id: &str) -> Option<&'a FoundryModelInfo> {
    catalog
        .iter()
        .find(|m| m.id == alias_or_id)
        .or_else(|| {
            catalog
                .iter()
                .filter(|m| split_version(&m.id).0 == alias_or_id)
                .max_by_key(|m| split_version(&m.id).1)
        })
        .or_else(|| catalog.iter().find(|m| m.alias == alias_or_id))
}

/// Write the catalog as a table, marking downloaded variants.
pub fn print_catalog<W: Write>(out: &mut W, catalog: &[FoundryModelInfo], cached: &[String]) -> io::Result<()> {
    writeln!(out, "{:<24} {:<48} {:<8} {:<16} {:>9} {:<10} CACHED", "ALIAS", "MODEL ID", "DEVICE", "TASK", "SIZE (MB)", "LICENSE")?;
    writeln!(out, "{}", "─".repeat(127))?;

    for model in catalog {
        let size = model.file_size_mb.map(|s| format!("{:.0}", s)).unwrap_or_else(|| "-".to_string());
        let task = model.task.as_deref().unwrap_or("-");
        let license = model.license.as_deref().unwrap_or("-");
        let cached = if cached.iter().any(|c| c == &model.id) { "yes" } else { "" };
        writeln!(
            out,
            "{:<24} {:<48} {:<8} {:<16} {:>9} {:<10} {}",
            model.alias,
            model.id,
            model.execution_provider().to_string(),
            task,
            size,
            license,
            cached
        )?;
    }

    writeln!(out)?;
    writeln!(out, "{} model(s) in catalog, {} cached", catalog.len(), cached.len())
}
