use crate::endpoint::ServiceEndpoint;
use crate::error::LauncherError;
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Default iframe width used by notebook channels
pub const DEFAULT_FRAME_WIDTH: &str = "100%";
/// Default iframe height used by notebook channels
pub const DEFAULT_FRAME_HEIGHT: &str = "750px";

/// What to show and how large to show it
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayRequest {
    pub url: String,
    pub query_params: BTreeMap<String, String>,
    pub width: String,
    pub height: String,
}

impl DisplayRequest {
    pub fn new(
        endpoint: &ServiceEndpoint,
        query_params: BTreeMap<String, String>,
        width: impl Into<String>,
        height: impl Into<String>,
    ) -> Self {
        Self {
            url: endpoint.url(),
            query_params,
            width: width.into(),
            height: height.into(),
        }
    }

    /// `?a=b&c=d`, or empty when there are no parameters
    pub fn query_string(&self) -> String {
        if self.query_params.is_empty() {
            return String::new();
        }

        let encoded = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.query_params.iter())
            .finish();
        format!("?{encoded}")
    }

    /// Base URL followed by the encoded query string
    pub fn full_url(&self) -> String {
        format!("{}{}", self.url, self.query_string())
    }
}

/// Cloud notebook proxy able to expose a local port outside the kernel
#[async_trait]
pub trait ProxyService: Send + Sync {
    /// Credential handed to the backend so it can build externally valid URLs
    async fn acquire_proxy_token(&self, port: u16) -> Result<String, LauncherError>;

    /// Externally reachable URL for `port`
    async fn resolve_proxy_url(&self, port: u16) -> Result<String, LauncherError>;
}

/// Output area of the current notebook cell
pub trait NotebookDisplay: Send + Sync {
    fn render_frame(&self, url: &str, width: &str, height: &str) -> Result<(), LauncherError>;

    fn run_script(&self, script: &str) -> Result<(), LauncherError>;
}

/// The user's default browser
pub trait UrlOpener: Send + Sync {
    fn open(&self, url: &str) -> Result<(), LauncherError>;
}
