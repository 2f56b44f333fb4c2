use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Where the caller is running, which decides how the service URL is shown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionContext {
    /// Interactive notebook kernel that renders HTML output directly
    ManagedNotebook,
    /// Hosted notebook whose local ports are only reachable through a proxy
    CloudNotebook,
    /// Anything else; the URL goes to the desktop browser
    PlainHost,
}

impl ExecutionContext {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionContext::ManagedNotebook => "notebook",
            ExecutionContext::CloudNotebook => "cloud",
            ExecutionContext::PlainHost => "browser",
        }
    }
}

impl fmt::Display for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutionContext {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "notebook" | "jupyter" | "managed-notebook" => Ok(ExecutionContext::ManagedNotebook),
            "cloud" | "colab" | "cloud-notebook" => Ok(ExecutionContext::CloudNotebook),
            "browser" | "host" | "plain-host" => Ok(ExecutionContext::PlainHost),
            other => Err(format!("unknown execution context: {other}")),
        }
    }
}
