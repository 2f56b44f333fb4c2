use super::DisplayChannel;
use async_trait::async_trait;
use kangas_launcher_core::{
    DisplayRequest, ExecutionContext, LauncherError, NotebookDisplay, ProxyService,
    ServiceEndpoint,
};
use std::sync::Arc;
use tracing::info;

/// Hosted notebook: the kernel's ports are only reachable through the
/// notebook proxy, so the frame is created client-side with the proxied URL.
pub struct CloudNotebookChannel {
    proxy: Arc<dyn ProxyService>,
    display: Arc<dyn NotebookDisplay>,
}

impl CloudNotebookChannel {
    pub fn new(proxy: Arc<dyn ProxyService>, display: Arc<dyn NotebookDisplay>) -> Self {
        Self { proxy, display }
    }
}

#[async_trait]
impl DisplayChannel for CloudNotebookChannel {
    fn context(&self) -> ExecutionContext {
        ExecutionContext::CloudNotebook
    }

    async fn display(
        &self,
        request: &DisplayRequest,
        endpoint: &ServiceEndpoint,
    ) -> Result<(), LauncherError> {
        let base = self.proxy.resolve_proxy_url(endpoint.frontend_port()).await?;
        let src = format!("{}{}", base, request.query_string());
        info!(src = %src, "Embedding Kangas through the notebook proxy");

        let script = frame_script(&src, &request.width, &request.height)?;
        self.display.run_script(&script)
    }
}

fn frame_script(src: &str, width: &str, height: &str) -> Result<String, LauncherError> {
    let literal = |value: &str| {
        serde_json::to_string(value).map_err(|e| LauncherError::Display(e.to_string()))
    };

    Ok(format!(
        "(async () => {{
  const fm = document.createElement('iframe');
  fm.src = {};
  fm.width = {};
  fm.height = {};
  fm.frameBorder = 0;
  document.body.append(fm);
}})();",
        literal(src)?,
        literal(width)?,
        literal(height)?
    ))
}
