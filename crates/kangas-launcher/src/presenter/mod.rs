//! Shows the UI in whichever surface fits the current execution context.

mod browser;
mod cloud;
mod notebook;

pub use browser::{BrowserChannel, SystemBrowser};
pub use cloud::CloudNotebookChannel;
pub use notebook::{EvcxrDisplay, NotebookChannel};

use crate::environment::EnvironmentDetector;
use crate::proxy::CommandProxyService;
use async_trait::async_trait;
use kangas_launcher_core::{
    DisplayRequest, ExecutionContext, LauncherError, NotebookDisplay, ProxyService,
    ServiceEndpoint, UrlOpener,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// One display surface
#[async_trait]
pub trait DisplayChannel: Send + Sync {
    /// Context this channel serves
    fn context(&self) -> ExecutionContext;

    async fn display(
        &self,
        request: &DisplayRequest,
        endpoint: &ServiceEndpoint,
    ) -> Result<(), LauncherError>;
}

/// Dispatches a display request to exactly one channel
pub struct Presenter {
    detector: EnvironmentDetector,
    browser: Arc<dyn DisplayChannel>,
    notebook: Arc<dyn DisplayChannel>,
    cloud: Arc<dyn DisplayChannel>,
}

impl Default for Presenter {
    fn default() -> Self {
        Self::new(
            EnvironmentDetector::default(),
            Arc::new(CommandProxyService::default()),
            Arc::new(EvcxrDisplay::stdout()),
            Arc::new(SystemBrowser),
        )
    }
}

impl Presenter {
    pub fn new(
        detector: EnvironmentDetector,
        proxy: Arc<dyn ProxyService>,
        display: Arc<dyn NotebookDisplay>,
        opener: Arc<dyn UrlOpener>,
    ) -> Self {
        Self {
            detector,
            browser: Arc::new(BrowserChannel::new(opener)),
            notebook: Arc::new(NotebookChannel::new(display.clone())),
            cloud: Arc::new(CloudNotebookChannel::new(proxy, display)),
        }
    }

    /// Replace the channel serving `channel.context()`
    pub fn with_channel(mut self, channel: Arc<dyn DisplayChannel>) -> Self {
        match channel.context() {
            ExecutionContext::PlainHost => self.browser = channel,
            ExecutionContext::ManagedNotebook => self.notebook = channel,
            ExecutionContext::CloudNotebook => self.cloud = channel,
        }
        self
    }

    pub fn detector(&self) -> &EnvironmentDetector {
        &self.detector
    }

    pub fn channel_for(&self, context: ExecutionContext) -> &Arc<dyn DisplayChannel> {
        match context {
            ExecutionContext::PlainHost => &self.browser,
            ExecutionContext::ManagedNotebook => &self.notebook,
            ExecutionContext::CloudNotebook => &self.cloud,
        }
    }

    /// Build the request and hand it to the channel for the detected context
    pub async fn present(
        &self,
        endpoint: &ServiceEndpoint,
        query_params: BTreeMap<String, String>,
        width: &str,
        height: &str,
    ) -> Result<DisplayRequest, LauncherError> {
        let request = DisplayRequest::new(endpoint, query_params, width, height);
        let context = self.detector.detect();
        info!(context = %context, url = %request.full_url(), "Presenting Kangas UI");

        self.channel_for(context).display(&request, endpoint).await?;
        Ok(request)
    }
}
