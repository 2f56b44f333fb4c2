use super::DisplayChannel;
use async_trait::async_trait;
use kangas_launcher_core::{
    DisplayRequest, ExecutionContext, LauncherError, ServiceEndpoint, UrlOpener,
};
use std::sync::Arc;
use tracing::info;

/// Default browser of the desktop session
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemBrowser;

impl UrlOpener for SystemBrowser {
    fn open(&self, url: &str) -> Result<(), LauncherError> {
        open::that_detached(url)
            .map_err(|e| LauncherError::Display(format!("failed to open {url} in a browser: {e}")))
    }
}

/// Plain host: hand the full URL to a browser
pub struct BrowserChannel {
    opener: Arc<dyn UrlOpener>,
}

impl BrowserChannel {
    pub fn new(opener: Arc<dyn UrlOpener>) -> Self {
        Self { opener }
    }
}

#[async_trait]
impl DisplayChannel for BrowserChannel {
    fn context(&self) -> ExecutionContext {
        ExecutionContext::PlainHost
    }

    async fn display(
        &self,
        request: &DisplayRequest,
        _endpoint: &ServiceEndpoint,
    ) -> Result<(), LauncherError> {
        let url = request.full_url();
        info!(url = %url, "Opening Kangas in the default browser");
        self.opener.open(&url)
    }
}
