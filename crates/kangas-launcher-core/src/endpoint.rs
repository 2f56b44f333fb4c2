use crate::error::LauncherError;
use std::fmt;

/// Default port of the Kangas frontend server
pub const DEFAULT_FRONTEND_PORT: u16 = 4000;

/// Address of a frontend/backend server pair.
///
/// The backend always listens on `frontend_port + 1`; the only way to obtain a
/// `ServiceEndpoint` is [`ServiceEndpoint::new`], which rejects ports where
/// that would overflow.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceEndpoint {
    host: String,
    frontend_port: u16,
}

impl ServiceEndpoint {
    pub fn new(host: impl Into<String>, frontend_port: u16) -> Result<Self, LauncherError> {
        let host = host.into();
        if host.trim().is_empty() {
            return Err(LauncherError::InvalidEndpoint(
                "host cannot be empty".to_string(),
            ));
        }
        if frontend_port == 0 {
            return Err(LauncherError::InvalidEndpoint(
                "frontend port must be non-zero".to_string(),
            ));
        }
        if frontend_port.checked_add(1).is_none() {
            return Err(LauncherError::InvalidEndpoint(format!(
                "no backend port available above frontend port {frontend_port}"
            )));
        }

        Ok(Self {
            host,
            frontend_port,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn frontend_port(&self) -> u16 {
        self.frontend_port
    }

    pub fn backend_port(&self) -> u16 {
        // Checked in `new`
        self.frontend_port + 1
    }

    /// Frontend URL, always with a trailing slash
    pub fn url(&self) -> String {
        format!("http://{}:{}/", self.url_host(), self.frontend_port)
    }

    /// `host:port` pair suitable for a TCP connect to the frontend
    pub fn frontend_address(&self) -> String {
        format!("{}:{}", self.url_host(), self.frontend_port)
    }

    fn url_host(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        }
    }
}

impl fmt::Display for ServiceEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url())
    }
}

/// Arguments for one spawn of the server entry point
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchSpec {
    host: Option<String>,
    frontend_port: u16,
    backend_port: u16,
    open_in_browser: bool,
    backend_proxy_token: Option<String>,
    debug: bool,
}

impl LaunchSpec {
    /// Launch arguments for `endpoint`. The spawned servers never open a
    /// browser themselves; presentation belongs to the caller.
    pub fn for_endpoint(
        endpoint: &ServiceEndpoint,
        backend_proxy_token: Option<String>,
        debug: bool,
    ) -> Self {
        Self {
            host: Some(endpoint.host().to_string()),
            frontend_port: endpoint.frontend_port(),
            backend_port: endpoint.backend_port(),
            open_in_browser: false,
            backend_proxy_token,
            debug,
        }
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn frontend_port(&self) -> u16 {
        self.frontend_port
    }

    pub fn backend_port(&self) -> u16 {
        self.backend_port
    }

    pub fn open_in_browser(&self) -> bool {
        self.open_in_browser
    }

    pub fn backend_proxy_token(&self) -> Option<&str> {
        self.backend_proxy_token.as_deref()
    }

    pub fn debug(&self) -> bool {
        self.debug
    }

    /// Command-line arguments understood by the Kangas server entry point
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![
            "--frontend-port".to_string(),
            self.frontend_port.to_string(),
            "--backend-port".to_string(),
            self.backend_port.to_string(),
            "--open".to_string(),
            if self.open_in_browser { "yes" } else { "no" }.to_string(),
        ];

        if let Some(host) = &self.host {
            args.push("--host".to_string());
            args.push(host.clone());
        }
        if let Some(token) = &self.backend_proxy_token {
            args.push("--backend-proxy".to_string());
            args.push(token.clone());
        }
        if self.debug {
            args.push("--debug".to_string());
        }

        args
    }
}
