use async_trait::async_trait;
use kangas_launcher_core::{LauncherError, ProxyService};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

/// Placeholder substituted with the port in helper arguments
pub const PORT_PLACEHOLDER: &str = "{port}";

const COLAB_PROXY_SCRIPT: &str = "import sys\n\
from google.colab.output import eval_js\n\
print(eval_js('google.colab.kernel.proxyPort(%s)' % sys.argv[1]))\n";

/// Asks the hosted kernel for a proxy URL by running a helper program that
/// prints it on stdout. The default helper calls Colab's `proxyPort`.
#[derive(Debug, Clone)]
pub struct CommandProxyService {
    program: String,
    args: Vec<String>,
}

impl Default for CommandProxyService {
    fn default() -> Self {
        Self::new(
            "python3",
            ["-c", COLAB_PROXY_SCRIPT, PORT_PLACEHOLDER].map(String::from),
        )
    }
}

impl CommandProxyService {
    pub fn new(program: impl Into<String>, args: impl IntoIterator<Item = String>) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().collect(),
        }
    }

    async fn request(&self, port: u16) -> Result<String, LauncherError> {
        let port_text = port.to_string();
        let args: Vec<String> = self
            .args
            .iter()
            .map(|arg| arg.replace(PORT_PLACEHOLDER, &port_text))
            .collect();

        debug!(program = %self.program, port = port, "Requesting proxy URL");
        let output = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| LauncherError::proxy(port, format!("cannot run {}: {e}", self.program)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(LauncherError::proxy(
                port,
                format!("{} exited with {}: {}", self.program, output.status, stderr.trim()),
            ));
        }

        let value = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if value.is_empty() {
            return Err(LauncherError::proxy(port, "helper printed nothing"));
        }
        Ok(value)
    }
}

#[async_trait]
impl ProxyService for CommandProxyService {
    async fn acquire_proxy_token(&self, port: u16) -> Result<String, LauncherError> {
        let token = self.request(port).await?;
        info!(port = port, "Acquired backend proxy token");
        Ok(token)
    }

    async fn resolve_proxy_url(&self, port: u16) -> Result<String, LauncherError> {
        self.request(port).await
    }
}
