use crate::endpoint::DEFAULT_FRONTEND_PORT;
use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Connect-and-retry settings used to decide that a freshly spawned
/// frontend is accepting connections
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReadinessConfig {
    /// Delay before the second connection attempt (in milliseconds)
    #[serde(default = "default_min_delay_ms")]
    pub min_delay_ms: u64,

    /// Upper bound for the delay between attempts (in milliseconds)
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Overall budget for all attempts (in milliseconds)
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Whether to randomize delays
    #[serde(default = "default_use_jitter")]
    pub use_jitter: bool,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: default_min_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            timeout_ms: default_timeout_ms(),
            use_jitter: default_use_jitter(),
        }
    }
}

impl ReadinessConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Short budget for tests and hosts where the servers are known to be warm
    pub fn eager() -> Self {
        Self {
            min_delay_ms: 20,
            max_delay_ms: 200,
            timeout_ms: 2_000,
            use_jitter: false,
        }
    }

    /// Long budget for cold starts (first `npm` run, slow disks)
    pub fn patient() -> Self {
        Self {
            min_delay_ms: 250,
            max_delay_ms: 5_000,
            timeout_ms: 120_000,
            use_jitter: true,
        }
    }

    /// Validate the configuration and return errors if invalid
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.min_delay_ms == 0 {
            return Err(anyhow::anyhow!("min_delay_ms must be greater than zero"));
        }

        if self.min_delay_ms > self.max_delay_ms {
            return Err(anyhow::anyhow!(
                "min_delay_ms cannot be greater than max_delay_ms"
            ));
        }

        if self.timeout_ms < self.min_delay_ms {
            return Err(anyhow::anyhow!(
                "timeout_ms must allow at least one retry delay"
            ));
        }

        if self.timeout_ms > 600_000 {
            return Err(anyhow::anyhow!("timeout_ms should not exceed 10 minutes"));
        }

        Ok(())
    }

    pub fn min_delay(&self) -> Duration {
        Duration::from_millis(self.min_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Launcher configuration
#[derive(Debug, Clone, PartialEq, Builder)]
#[builder(setter(into, strip_option))]
pub struct LauncherConfig {
    /// Host the servers listen on; resolved to `localhost` when unset
    #[builder(default)]
    pub host: Option<String>,
    #[builder(default = "DEFAULT_FRONTEND_PORT")]
    pub port: u16,
    #[builder(default)]
    pub debug: bool,
    /// Program that starts the server pair
    #[builder(default = "default_server_command()")]
    pub server_command: String,
    /// Arguments placed before the generated `--frontend-port ...` flags
    #[builder(default = "default_server_args()")]
    #[builder(setter(custom))]
    pub server_args: Vec<String>,
    #[builder(default)]
    #[builder(setter(custom))]
    pub env: HashMap<String, String>,
    #[builder(default)]
    pub working_directory: Option<PathBuf>,
    #[builder(default)]
    pub readiness: ReadinessConfig,
    /// Directory holding lease and record files; platform cache dir when unset
    #[builder(default)]
    pub registry_dir: Option<PathBuf>,
    #[builder(default = "default_lease_timeout_ms()")]
    pub lease_timeout_ms: u64,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: DEFAULT_FRONTEND_PORT,
            debug: false,
            server_command: default_server_command(),
            server_args: default_server_args(),
            env: HashMap::new(),
            working_directory: None,
            readiness: ReadinessConfig::default(),
            registry_dir: None,
            lease_timeout_ms: default_lease_timeout_ms(),
        }
    }
}

impl LauncherConfig {
    pub fn builder() -> LauncherConfigBuilder {
        LauncherConfigBuilder::default()
    }

    pub fn lease_timeout(&self) -> Duration {
        Duration::from_millis(self.lease_timeout_ms)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server_command.trim().is_empty() {
            return Err(anyhow::anyhow!("server_command cannot be empty"));
        }
        self.readiness.validate()
    }
}

impl LauncherConfigBuilder {
    pub fn server_args<S: ToString, I: IntoIterator<Item = S>>(&mut self, iter: I) -> &mut Self {
        let args: Vec<String> = iter.into_iter().map(|s| s.to_string()).collect();
        self.server_args = Some(args);
        self
    }

    pub fn env<T: ToString>(&mut self, key: T, value: T) -> &mut Self {
        let map = self.env.get_or_insert_with(HashMap::new);
        map.insert(key.to_string(), value.to_string());

        self
    }

    pub fn env_multi<T: ToString, I: IntoIterator<Item = (T, T)>>(&mut self, iter: I) -> &mut Self {
        let env = self.env.get_or_insert_with(HashMap::new);
        for (key, value) in iter {
            env.insert(key.to_string(), value.to_string());
        }
        self
    }
}

// Default value functions for serde and the builder
fn default_min_delay_ms() -> u64 {
    50
}
fn default_max_delay_ms() -> u64 {
    1_000
}
fn default_timeout_ms() -> u64 {
    30_000
}
fn default_use_jitter() -> bool {
    true
}
fn default_server_command() -> String {
    "python3".to_string()
}
fn default_server_args() -> Vec<String> {
    vec!["-m".to_string(), "kangas.cli.server".to_string()]
}
fn default_lease_timeout_ms() -> u64 {
    60_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_readiness() {
        let config = ReadinessConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_presets_are_valid() {
        assert!(ReadinessConfig::eager().validate().is_ok());
        assert!(ReadinessConfig::patient().validate().is_ok());
        assert!(!ReadinessConfig::eager().use_jitter);
    }

    #[test]
    fn test_invalid_readiness() {
        let mut config = ReadinessConfig {
            min_delay_ms: 1000,
            max_delay_ms: 500,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config.max_delay_ms = 2000;
        config.timeout_ms = 10;
        assert!(config.validate().is_err());

        config.timeout_ms = 700_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_readiness_partial_deserialization() {
        let config: ReadinessConfig = serde_json::from_str(r#"{"timeoutMs": 5000}"#).unwrap();
        assert_eq!(config.timeout_ms, 5000);
        assert_eq!(config.min_delay_ms, 50);
        assert!(config.use_jitter);
    }

    #[test]
    fn test_builder_defaults_match_default() {
        let built = LauncherConfig::builder().build().unwrap();
        assert_eq!(built, LauncherConfig::default());
        assert_eq!(built.port, 4000);
        assert_eq!(built.server_args, vec!["-m", "kangas.cli.server"]);
        assert!(built.validate().is_ok());
    }

    #[test]
    fn test_builder_custom_setters() {
        let config = LauncherConfig::builder()
            .host("0.0.0.0")
            .port(5000u16)
            .debug(true)
            .server_command("kangas")
            .server_args(["server"])
            .env("NODE_ENV", "production")
            .env_multi([("A", "1"), ("B", "2")])
            .build()
            .unwrap();

        assert_eq!(config.host.as_deref(), Some("0.0.0.0"));
        assert_eq!(config.port, 5000);
        assert!(config.debug);
        assert_eq!(config.server_args, vec!["server"]);
        assert_eq!(config.env.len(), 3);
        assert_eq!(config.env["NODE_ENV"], "production");
    }

    #[test]
    fn test_empty_command_is_rejected() {
        let config = LauncherConfig::builder().server_command("  ").build().unwrap();
        assert!(config.validate().is_err());
    }
}
