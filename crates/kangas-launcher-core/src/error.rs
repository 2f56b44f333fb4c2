use std::time::Duration;
use thiserror::Error;

/// Error types for launching and presenting the Kangas service pair
#[derive(Error, Debug)]
pub enum LauncherError {
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Failed to spawn `{command}`: {source}")]
    SpawnFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Proxy acquisition failed for port {port}: {reason}")]
    ProxyAcquisition { port: u16, reason: String },

    #[error("Service at {address} not ready after {waited:?}")]
    ReadinessTimeout { address: String, waited: Duration },

    #[error("Timed out after {0:?} waiting for the service lease")]
    LeaseTimeout(Duration),

    #[error("Registry error: {0}")]
    Registry(#[from] std::io::Error),

    #[error("Display failed: {0}")]
    Display(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl LauncherError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LauncherError::ReadinessTimeout { .. }
                | LauncherError::LeaseTimeout(_)
                | LauncherError::ProxyAcquisition { .. }
        )
    }

    /// Check if this error indicates a permanent failure
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            LauncherError::InvalidEndpoint(_)
                | LauncherError::Configuration(_)
                | LauncherError::SpawnFailed { .. }
        )
    }

    pub fn spawn_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        LauncherError::SpawnFailed {
            command: command.into(),
            source,
        }
    }

    pub fn proxy(port: u16, reason: impl Into<String>) -> Self {
        LauncherError::ProxyAcquisition {
            port,
            reason: reason.into(),
        }
    }
}
