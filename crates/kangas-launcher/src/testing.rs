//! In-memory collaborators for unit tests.

use crate::environment::EnvironmentDetector;
use async_trait::async_trait;
use kangas_launcher_core::{
    DetachedSpawner, LauncherError, NotebookDisplay, ProcessHandle, ProcessId, ProcessManager,
    ProcessScanner, ProcessStatus, ProcessTerminator, ProxyService, SpawnOptions,
    TerminationResult, UrlOpener,
};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

pub fn detector(vars: &[(&str, &str)]) -> EnvironmentDetector {
    let env: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    EnvironmentDetector::new(env)
}

pub fn process(pid: u32, name: &str, command_line: &str) -> ProcessHandle {
    ProcessHandle {
        pid,
        executable_name: name.to_string(),
        command_line: command_line.to_string(),
        status: ProcessStatus::Running,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Terminate(ProcessId),
    Spawn {
        command: String,
        args: Vec<String>,
        options: SpawnOptions,
    },
}

/// Process table that spawning and termination mutate
pub struct FakeProcessManager {
    processes: Mutex<Vec<ProcessHandle>>,
    events: Mutex<Vec<Event>>,
    next_pid: AtomicU32,
    fail_spawn: AtomicBool,
}

impl FakeProcessManager {
    pub fn with_processes(processes: Vec<ProcessHandle>) -> Self {
        Self {
            processes: Mutex::new(processes),
            events: Mutex::new(Vec::new()),
            next_pid: AtomicU32::new(5000),
            fail_spawn: AtomicBool::new(false),
        }
    }

    /// A frontend and a backend already up
    pub fn running() -> Self {
        Self::with_processes(vec![
            process(100, "node", "node /opt/kangas/frontend/server.js"),
            process(101, "kangas", "kangas server --backend-port 4001"),
        ])
    }

    pub fn fail_spawns(&self) {
        self.fail_spawn.store(true, Ordering::SeqCst);
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn spawns(&self) -> Vec<(String, Vec<String>, SpawnOptions)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Spawn {
                    command,
                    args,
                    options,
                } => Some((command, args, options)),
                Event::Terminate(_) => None,
            })
            .collect()
    }

    pub fn terminated(&self) -> Vec<ProcessId> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Terminate(pid) => Some(pid),
                Event::Spawn { .. } => None,
            })
            .collect()
    }
}

#[async_trait]
impl ProcessScanner for FakeProcessManager {
    async fn scan(&self) -> Vec<ProcessHandle> {
        self.processes.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProcessTerminator for FakeProcessManager {
    async fn terminate(&self, pid: ProcessId) -> TerminationResult {
        self.events.lock().unwrap().push(Event::Terminate(pid));
        let mut processes = self.processes.lock().unwrap();
        let before = processes.len();
        processes.retain(|p| p.pid != pid);
        if processes.len() < before {
            TerminationResult::Success
        } else {
            TerminationResult::ProcessNotFound
        }
    }
}

impl DetachedSpawner for FakeProcessManager {
    fn spawn_detached(
        &self,
        command: &str,
        args: &[String],
        options: &SpawnOptions,
    ) -> Result<ProcessId, LauncherError> {
        if self.fail_spawn.load(Ordering::SeqCst) {
            return Err(LauncherError::spawn_failed(
                command,
                std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
            ));
        }

        let pid = self.next_pid.fetch_add(2, Ordering::SeqCst);
        self.events.lock().unwrap().push(Event::Spawn {
            command: command.to_string(),
            args: args.to_vec(),
            options: options.clone(),
        });

        // The entry point brings up both servers
        let mut processes = self.processes.lock().unwrap();
        processes.push(process(pid, "node", "node kangas/frontend/server.js"));
        processes.push(process(pid + 1, "kangas", "kangas server"));
        Ok(pid)
    }
}

impl ProcessManager for FakeProcessManager {
    fn new() -> Self {
        Self::with_processes(Vec::new())
    }
}

/// Proxy that answers with a predictable URL per port
#[derive(Default)]
pub struct FakeProxy {
    calls: Mutex<Vec<(String, u16)>>,
    fail: bool,
}

impl FakeProxy {
    pub fn failing() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    /// `("token" | "url", port)` per call
    pub fn calls(&self) -> Vec<(String, u16)> {
        self.calls.lock().unwrap().clone()
    }

    fn answer(&self, kind: &str, port: u16) -> Result<String, LauncherError> {
        self.calls.lock().unwrap().push((kind.to_string(), port));
        if self.fail {
            return Err(LauncherError::proxy(port, "kernel refused"));
        }
        Ok(format!("https://proxy.example/{port}/"))
    }
}

#[async_trait]
impl ProxyService for FakeProxy {
    async fn acquire_proxy_token(&self, port: u16) -> Result<String, LauncherError> {
        self.answer("token", port)
    }

    async fn resolve_proxy_url(&self, port: u16) -> Result<String, LauncherError> {
        self.answer("url", port)
    }
}

#[derive(Default)]
pub struct RecordingDisplay {
    frames: Mutex<Vec<(String, String, String)>>,
    scripts: Mutex<Vec<String>>,
}

impl RecordingDisplay {
    pub fn frames(&self) -> Vec<(String, String, String)> {
        self.frames.lock().unwrap().clone()
    }

    pub fn scripts(&self) -> Vec<String> {
        self.scripts.lock().unwrap().clone()
    }
}

impl NotebookDisplay for RecordingDisplay {
    fn render_frame(&self, url: &str, width: &str, height: &str) -> Result<(), LauncherError> {
        self.frames
            .lock()
            .unwrap()
            .push((url.to_string(), width.to_string(), height.to_string()));
        Ok(())
    }

    fn run_script(&self, script: &str) -> Result<(), LauncherError> {
        self.scripts.lock().unwrap().push(script.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingOpener {
    urls: Mutex<Vec<String>>,
}

impl RecordingOpener {
    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }
}

impl UrlOpener for RecordingOpener {
    fn open(&self, url: &str) -> Result<(), LauncherError> {
        self.urls.lock().unwrap().push(url.to_string());
        Ok(())
    }
}
