use crate::environment::EnvironmentDetector;
use crate::proxy::CommandProxyService;
use crate::readiness::wait_until_ready;
use crate::registry::{ServiceRecord, ServiceRegistry};
use kangas_launcher_core::{
    ExecutionContext, LaunchSpec, LauncherConfig, LauncherError, ProcessHandle, ProcessManager,
    ProcessProbe, ProxyService, ServiceEndpoint, SpawnOptions, TerminationResult,
};
use serde::Serialize;
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

/// Host used when neither the call nor the configuration names one
pub const DEFAULT_HOST: &str = "localhost";

/// Snapshot of one endpoint: its last launch record and the live service processes
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatus {
    pub endpoint: String,
    pub record: Option<ServiceRecord>,
    pub frontend: Vec<ProcessHandle>,
    pub backend: Vec<ProcessHandle>,
}

impl ServiceStatus {
    pub fn is_running(&self) -> bool {
        self.frontend.iter().any(|p| p.status.is_alive())
    }
}

/// Owns the lifecycle of the frontend/backend server pair
pub struct InstanceSupervisor<M> {
    manager: Arc<M>,
    config: LauncherConfig,
    registry: ServiceRegistry,
    detector: EnvironmentDetector,
    proxy: Arc<dyn ProxyService>,
    proxy_token: RwLock<Option<String>>,
}

impl<M: ProcessManager> InstanceSupervisor<M> {
    pub fn new(config: LauncherConfig, manager: Arc<M>) -> Self {
        let registry = ServiceRegistry::new(
            config
                .registry_dir
                .clone()
                .unwrap_or_else(ServiceRegistry::default_dir),
        );
        Self {
            manager,
            config,
            registry,
            detector: EnvironmentDetector::default(),
            proxy: Arc::new(CommandProxyService::default()),
            proxy_token: RwLock::new(None),
        }
    }

    pub fn with_detector(mut self, detector: EnvironmentDetector) -> Self {
        self.detector = detector;
        self
    }

    pub fn with_proxy(mut self, proxy: Arc<dyn ProxyService>) -> Self {
        self.proxy = proxy;
        self
    }

    pub fn config(&self) -> &LauncherConfig {
        &self.config
    }

    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    pub fn manager(&self) -> &Arc<M> {
        &self.manager
    }

    /// Most recently acquired backend proxy token
    pub fn proxy_token(&self) -> Option<String> {
        self.proxy_token
            .read()
            .map(|token| token.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    fn store_proxy_token(&self, token: String) {
        match self.proxy_token.write() {
            Ok(mut slot) => *slot = Some(token),
            Err(poisoned) => *poisoned.into_inner() = Some(token),
        }
    }

    /// Explicit argument, else configured host, else `localhost`
    pub fn resolve_host(&self, host: Option<&str>) -> String {
        host.or(self.config.host.as_deref())
            .filter(|h| !h.trim().is_empty())
            .unwrap_or(DEFAULT_HOST)
            .to_string()
    }

    /// Terminate every frontend match, then every backend match. Best effort.
    pub async fn terminate(&self) {
        for probe in [ProcessProbe::frontend(), ProcessProbe::backend()] {
            for process in self.manager.matching(&probe).await {
                match self.manager.terminate(process.pid).await {
                    TerminationResult::Success => {
                        info!(
                            pid = process.pid,
                            name = %process.executable_name,
                            "Terminated service process"
                        );
                    }
                    TerminationResult::ProcessNotFound => {
                        debug!(pid = process.pid, "Service process already gone");
                    }
                    TerminationResult::AccessDenied => {
                        warn!(
                            pid = process.pid,
                            name = %process.executable_name,
                            "Access denied terminating service process"
                        );
                    }
                    TerminationResult::Failed(reason) => {
                        warn!(
                            pid = process.pid,
                            reason = %reason,
                            "Failed to terminate service process"
                        );
                    }
                }
            }
        }

        if let Err(e) = self.registry.clear_records() {
            warn!(error = %e, "Failed to clear service records");
        }
    }

    /// Ensure the server pair is up for `host:port` and return its endpoint.
    /// Spawns nothing when a frontend is already running.
    pub async fn launch(
        &self,
        host: Option<&str>,
        port: u16,
        debug: bool,
    ) -> Result<ServiceEndpoint, LauncherError> {
        let endpoint = ServiceEndpoint::new(self.resolve_host(host), port)?;
        let lease = self
            .registry
            .lease(&endpoint, self.config.lease_timeout())
            .await?;

        if self.manager.is_running(&ProcessProbe::frontend()).await {
            info!(url = %endpoint, "Kangas servers already running");
            return Ok(endpoint);
        }

        self.terminate().await;

        if self.detector.detect() == ExecutionContext::CloudNotebook {
            let token = self
                .proxy
                .acquire_proxy_token(endpoint.backend_port())
                .await?;
            self.store_proxy_token(token);
        }

        let spec = LaunchSpec::for_endpoint(&endpoint, self.proxy_token(), debug);
        let mut args = self.config.server_args.clone();
        args.extend(spec.to_args());
        let options = SpawnOptions {
            env: self.config.env.clone(),
            working_directory: self.config.working_directory.clone(),
            inherit_output: debug,
        };

        info!(
            command = %self.config.server_command,
            args = ?args,
            "Starting Kangas servers"
        );
        let pid = self
            .manager
            .spawn_detached(&self.config.server_command, &args, &options)?;

        lease.write_record(&ServiceRecord::new(&endpoint, Some(pid)))?;
        wait_until_ready(&endpoint, &self.config.readiness).await?;

        info!(url = %endpoint, pid = pid, "Kangas servers started");
        Ok(endpoint)
    }

    /// Registry record and live matches for `host:port`
    pub async fn status(
        &self,
        host: Option<&str>,
        port: u16,
    ) -> Result<ServiceStatus, LauncherError> {
        let endpoint = ServiceEndpoint::new(self.resolve_host(host), port)?;

        let mut frontend = Vec::new();
        self.manager
            .for_each_matching(&ProcessProbe::frontend(), &mut |p: &ProcessHandle| {
                frontend.push(p.clone())
            })
            .await;

        let mut backend = Vec::new();
        self.manager
            .for_each_matching(&ProcessProbe::backend(), &mut |p: &ProcessHandle| {
                backend.push(p.clone())
            })
            .await;

        Ok(ServiceStatus {
            endpoint: endpoint.url(),
            record: self.registry.read_record(&endpoint),
            frontend,
            backend,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Event, FakeProcessManager, FakeProxy, detector, process};
    use kangas_launcher_core::{ProcessScanner, ProcessStatus, ReadinessConfig};
    use tokio::net::TcpListener;

    struct Harness {
        _dir: tempfile::TempDir,
        _listener: TcpListener,
        port: u16,
        manager: Arc<FakeProcessManager>,
        proxy: Arc<FakeProxy>,
        supervisor: InstanceSupervisor<FakeProcessManager>,
    }

    async fn harness(manager: FakeProcessManager, vars: &[(&str, &str)]) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let config = LauncherConfig::builder()
            .host("127.0.0.1")
            .port(port)
            .readiness(ReadinessConfig::eager())
            .registry_dir(dir.path().to_path_buf())
            .lease_timeout_ms(5_000u64)
            .build()
            .unwrap();

        let manager = Arc::new(manager);
        let proxy = Arc::new(FakeProxy::default());
        let supervisor = InstanceSupervisor::new(config, manager.clone())
            .with_detector(detector(vars))
            .with_proxy(proxy.clone());

        Harness {
            _dir: dir,
            _listener: listener,
            port,
            manager,
            proxy,
            supervisor,
        }
    }

    #[tokio::test]
    async fn test_launch_spawns_with_expected_arguments() {
        let h = harness(FakeProcessManager::new(), &[]).await;
        let endpoint = h.supervisor.launch(None, h.port, false).await.unwrap();

        assert_eq!(endpoint.url(), format!("http://127.0.0.1:{}/", h.port));
        let spawns = h.manager.spawns();
        assert_eq!(spawns.len(), 1);
        let (command, args, options) = &spawns[0];
        assert_eq!(command, "python3");
        let expected: Vec<String> = [
            "-m",
            "kangas.cli.server",
            "--frontend-port",
            &h.port.to_string(),
            "--backend-port",
            &(h.port + 1).to_string(),
            "--open",
            "no",
            "--host",
            "127.0.0.1",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        assert_eq!(args, &expected);
        assert!(!options.inherit_output);
        assert!(h.proxy.calls().is_empty());
        assert_eq!(h.supervisor.proxy_token(), None);
    }

    #[tokio::test]
    async fn test_launch_when_running_spawns_nothing_and_keeps_processes() {
        let h = harness(FakeProcessManager::running(), &[]).await;
        let endpoint = h.supervisor.launch(Some("localhost"), 4000, false).await.unwrap();

        assert_eq!(endpoint.url(), "http://localhost:4000/");
        assert!(h.manager.events().is_empty());
    }

    #[tokio::test]
    async fn test_launch_cleans_up_stale_backend_before_spawning() {
        let stale = FakeProcessManager::with_processes(vec![
            process(300, "kangas", "kangas server --backend-port 4001"),
            process(301, "node", "node unrelated.js"),
        ]);
        let h = harness(stale, &[]).await;
        h.supervisor.launch(None, h.port, true).await.unwrap();

        let events = h.manager.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], Event::Terminate(300));
        assert!(matches!(&events[1], Event::Spawn { args, options, .. }
            if args.last().map(String::as_str) == Some("--debug") && options.inherit_output));
    }

    #[tokio::test]
    async fn test_zombie_frontend_does_not_count_as_running() {
        let mut zombie = process(400, "node", "node kangas/frontend/server.js");
        zombie.status = ProcessStatus::Zombie;
        let h = harness(FakeProcessManager::with_processes(vec![zombie]), &[]).await;

        h.supervisor.launch(None, h.port, false).await.unwrap();
        assert_eq!(h.manager.terminated(), vec![400]);
        assert_eq!(h.manager.spawns().len(), 1);
    }

    #[tokio::test]
    async fn test_second_launch_spawns_nothing() {
        let h = harness(FakeProcessManager::new(), &[]).await;
        let first = h.supervisor.launch(None, h.port, false).await.unwrap();
        let second = h.supervisor.launch(None, h.port, false).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(h.manager.spawns().len(), 1);
        assert!(h.manager.terminated().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_launches_spawn_one_pair() {
        let h = harness(FakeProcessManager::new(), &[]).await;
        let (a, b) = tokio::join!(
            h.supervisor.launch(None, h.port, false),
            h.supervisor.launch(None, h.port, false)
        );

        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(h.manager.spawns().len(), 1);
    }

    #[tokio::test]
    async fn test_cloud_launch_acquires_token_for_backend_port() {
        let h = harness(FakeProcessManager::new(), &[("COLAB_RELEASE_TAG", "r1")]).await;
        h.supervisor.launch(None, h.port, false).await.unwrap();

        let token = format!("https://proxy.example/{}/", h.port + 1);
        assert_eq!(h.proxy.calls(), vec![("token".to_string(), h.port + 1)]);
        assert_eq!(h.supervisor.proxy_token(), Some(token.clone()));

        let (_, args, _) = &h.manager.spawns()[0];
        let at = args.iter().position(|a| a == "--backend-proxy").unwrap();
        assert_eq!(args[at + 1], token);
    }

    #[tokio::test]
    async fn test_cloud_proxy_failure_aborts_before_spawn() {
        let dir = tempfile::tempdir().unwrap();
        let config = LauncherConfig::builder()
            .registry_dir(dir.path().to_path_buf())
            .build()
            .unwrap();
        let manager = Arc::new(FakeProcessManager::new());
        let supervisor = InstanceSupervisor::new(config, manager.clone())
            .with_detector(detector(&[("COLAB_GPU", "1")]))
            .with_proxy(Arc::new(FakeProxy::failing()));

        let err = supervisor.launch(None, 4000, false).await.unwrap_err();
        assert!(matches!(err, LauncherError::ProxyAcquisition { port: 4001, .. }));
        assert!(manager.spawns().is_empty());
    }

    #[tokio::test]
    async fn test_spawn_failure_is_surfaced() {
        let h = harness(FakeProcessManager::new(), &[]).await;
        h.manager.fail_spawns();

        let err = h.supervisor.launch(None, h.port, false).await.unwrap_err();
        assert!(matches!(err, LauncherError::SpawnFailed { .. }));
        assert!(h.supervisor.registry().read_record(
            &ServiceEndpoint::new("127.0.0.1", h.port).unwrap()
        ).is_none());
    }

    #[tokio::test]
    async fn test_readiness_timeout_is_surfaced() {
        let dir = tempfile::tempdir().unwrap();
        let port = {
            let probe = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            probe.local_addr().unwrap().port()
        };
        let config = LauncherConfig::builder()
            .host("127.0.0.1")
            .registry_dir(dir.path().to_path_buf())
            .readiness(ReadinessConfig {
                min_delay_ms: 10,
                max_delay_ms: 50,
                timeout_ms: 250,
                use_jitter: false,
            })
            .build()
            .unwrap();
        let manager = Arc::new(FakeProcessManager::new());
        let supervisor =
            InstanceSupervisor::new(config, manager.clone()).with_detector(detector(&[]));

        let err = supervisor.launch(None, port, false).await.unwrap_err();
        assert!(matches!(err, LauncherError::ReadinessTimeout { .. }));
        // Spawned and recorded before the wait
        assert_eq!(manager.spawns().len(), 1);
        let record = supervisor
            .registry()
            .read_record(&ServiceEndpoint::new("127.0.0.1", port).unwrap())
            .unwrap();
        assert_eq!(record.frontend_port, port);
    }

    #[tokio::test]
    async fn test_terminate_without_matches_is_noop() {
        let h = harness(
            FakeProcessManager::with_processes(vec![process(9, "bash", "bash -l")]),
            &[],
        )
        .await;
        h.supervisor.terminate().await;
        h.supervisor.terminate().await;
        assert!(h.manager.events().is_empty());
    }

    #[tokio::test]
    async fn test_terminate_frontend_before_backend() {
        let h = harness(FakeProcessManager::running(), &[]).await;
        h.supervisor.terminate().await;
        assert_eq!(h.manager.terminated(), vec![100, 101]);
        assert!(h.manager.scan().await.is_empty());
    }

    #[tokio::test]
    async fn test_terminate_and_launch_spare_the_launcher_itself() {
        let own_pid = std::process::id();
        let h = harness(
            FakeProcessManager::with_processes(vec![
                process(
                    own_pid,
                    "kangas-launcher",
                    "kangas-launcher --server-command x terminate",
                ),
                process(101, "kangas", "kangas server --backend-port 4001"),
            ]),
            &[],
        )
        .await;

        h.supervisor.terminate().await;
        assert_eq!(h.manager.terminated(), vec![101]);

        h.supervisor.launch(None, h.port, false).await.unwrap();
        assert!(!h.manager.terminated().contains(&own_pid));
        assert!(h.manager.scan().await.iter().any(|p| p.pid == own_pid));
    }

    #[tokio::test]
    async fn test_status_reports_record_and_processes() {
        let h = harness(FakeProcessManager::new(), &[]).await;
        let before = h.supervisor.status(None, h.port).await.unwrap();
        assert!(!before.is_running());
        assert!(before.record.is_none());

        h.supervisor.launch(None, h.port, false).await.unwrap();
        let after = h.supervisor.status(None, h.port).await.unwrap();
        assert!(after.is_running());
        assert_eq!(after.frontend.len(), 1);
        assert_eq!(after.backend.len(), 1);
        assert_eq!(after.record.and_then(|r| r.pid), Some(after.frontend[0].pid));

        h.supervisor.terminate().await;
        let cleared = h.supervisor.status(None, h.port).await.unwrap();
        assert!(cleared.record.is_none());
        assert!(!cleared.is_running());
    }

    #[test]
    fn test_host_resolution_order() {
        let config = LauncherConfig::builder().host("0.0.0.0").build().unwrap();
        let supervisor =
            InstanceSupervisor::new(config, Arc::new(FakeProcessManager::new()));
        assert_eq!(supervisor.resolve_host(Some("10.0.0.2")), "10.0.0.2");
        assert_eq!(supervisor.resolve_host(None), "0.0.0.0");

        let supervisor = InstanceSupervisor::new(
            LauncherConfig::default(),
            Arc::new(FakeProcessManager::new()),
        );
        assert_eq!(supervisor.resolve_host(None), DEFAULT_HOST);
        assert_eq!(supervisor.resolve_host(Some("")), DEFAULT_HOST);
    }
}
