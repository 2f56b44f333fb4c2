use crate::environment::EnvironmentDetector;
use crate::factory::{PlatformProcessManager, PlatformProcessManagerFactory};
use crate::presenter::{EvcxrDisplay, Presenter, SystemBrowser};
use crate::proxy::CommandProxyService;
use crate::supervisor::{InstanceSupervisor, ServiceStatus};
use kangas_launcher_core::{
    DEFAULT_FRAME_HEIGHT, DEFAULT_FRAME_WIDTH, DisplayRequest, LauncherConfig, LauncherError,
    NotebookDisplay, ProcessManager, ProcessManagerFactory, ProxyService, UrlOpener,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// Arguments of a single `show` call. Unset fields fall back to the launcher configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ShowOptions {
    /// DataGrid to open, passed to the UI as the `datagrid` query parameter
    pub datagrid: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub debug: Option<bool>,
    pub width: String,
    pub height: String,
}

impl Default for ShowOptions {
    fn default() -> Self {
        Self {
            datagrid: None,
            host: None,
            port: None,
            debug: None,
            width: DEFAULT_FRAME_WIDTH.to_string(),
            height: DEFAULT_FRAME_HEIGHT.to_string(),
        }
    }
}

impl ShowOptions {
    pub fn datagrid(path: impl Into<String>) -> Self {
        Self {
            datagrid: Some(path.into()),
            ..Self::default()
        }
    }

    fn query_params(&self) -> BTreeMap<String, String> {
        self.datagrid
            .iter()
            .filter(|path| !path.is_empty())
            .map(|path| ("datagrid".to_string(), path.clone()))
            .collect()
    }
}

/// Supervisor and presenter behind one handle
pub struct KangasLauncher<M = PlatformProcessManager> {
    supervisor: InstanceSupervisor<M>,
    presenter: Presenter,
}

impl KangasLauncher<PlatformProcessManager> {
    /// Launcher using this platform's process manager and the default collaborators
    pub fn new(config: LauncherConfig) -> Self {
        info!(
            platform = PlatformProcessManagerFactory::platform_name(),
            "Creating Kangas launcher"
        );
        let manager = PlatformProcessManagerFactory::create_process_manager();
        Self::with_manager(config, Arc::new(manager))
    }
}

impl<M: ProcessManager> KangasLauncher<M> {
    pub fn with_manager(config: LauncherConfig, manager: Arc<M>) -> Self {
        Self::with_collaborators(
            config,
            manager,
            EnvironmentDetector::default(),
            Arc::new(CommandProxyService::default()),
            Arc::new(EvcxrDisplay::stdout()),
            Arc::new(SystemBrowser),
        )
    }

    /// Supervisor and presenter share the detector and proxy
    pub fn with_collaborators(
        config: LauncherConfig,
        manager: Arc<M>,
        detector: EnvironmentDetector,
        proxy: Arc<dyn ProxyService>,
        display: Arc<dyn NotebookDisplay>,
        opener: Arc<dyn UrlOpener>,
    ) -> Self {
        let supervisor = InstanceSupervisor::new(config, manager)
            .with_detector(detector.clone())
            .with_proxy(proxy.clone());
        let presenter = Presenter::new(detector, proxy, display, opener);
        Self {
            supervisor,
            presenter,
        }
    }

    pub fn supervisor(&self) -> &InstanceSupervisor<M> {
        &self.supervisor
    }

    pub fn presenter(&self) -> &Presenter {
        &self.presenter
    }

    /// Start the servers for the configured endpoint if needed; returns the UI URL
    pub async fn launch(&self) -> Result<String, LauncherError> {
        let config = self.supervisor.config();
        let endpoint = self
            .supervisor
            .launch(config.host.as_deref(), config.port, config.debug)
            .await?;
        Ok(endpoint.url())
    }

    /// Launch if needed, then present the UI in the surface fitting the current context
    pub async fn show(&self, options: &ShowOptions) -> Result<DisplayRequest, LauncherError> {
        let config = self.supervisor.config();
        let host = options.host.as_deref().or(config.host.as_deref());
        let port = options.port.unwrap_or(config.port);
        let debug = options.debug.unwrap_or(config.debug);

        let endpoint = self.supervisor.launch(host, port, debug).await?;
        self.presenter
            .present(&endpoint, options.query_params(), &options.width, &options.height)
            .await
    }

    pub async fn terminate(&self) {
        self.supervisor.terminate().await
    }

    pub async fn status(&self) -> Result<ServiceStatus, LauncherError> {
        let config = self.supervisor.config();
        self.supervisor
            .status(config.host.as_deref(), config.port)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_show_options_query() {
        assert!(ShowOptions::default().query_params().is_empty());

        let options = ShowOptions::datagrid("./example.dg");
        assert_eq!(options.query_params()["datagrid"], "./example.dg");
        assert_eq!(options.width, "100%");
        assert_eq!(options.height, "750px");
    }

    #[test]
    fn test_empty_datagrid_adds_no_query() {
        assert!(ShowOptions::datagrid("").query_params().is_empty());
    }
}
