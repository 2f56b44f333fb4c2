use crate::error::LauncherError;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;

/// Unique identifier for a process
pub type ProcessId = u32;

/// Coarse state of a scanned process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessStatus {
    /// Running, sleeping or otherwise scheduled
    Running,
    /// Stopped by a signal or debugger
    Stopped,
    /// Exited but not yet reaped by its parent
    Zombie,
    /// Exited
    Dead,
}

impl ProcessStatus {
    /// Zombie and dead processes never count as running
    pub fn is_alive(&self) -> bool {
        !matches!(self, ProcessStatus::Zombie | ProcessStatus::Dead)
    }
}

/// One process as seen by a single scan. Never cached across scans.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessHandle {
    pub pid: ProcessId,
    pub executable_name: String,
    /// Arguments joined with single spaces
    pub command_line: String,
    pub status: ProcessStatus,
}

/// Name-prefix plus command-substring matcher identifying a service process
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProcessProbe {
    name_prefix: String,
    command_substring: String,
}

impl ProcessProbe {
    pub fn new(name_prefix: impl Into<String>, command_substring: impl Into<String>) -> Self {
        Self {
            name_prefix: name_prefix.into(),
            command_substring: command_substring.into(),
        }
    }

    /// The node frontend server
    pub fn frontend() -> Self {
        Self::new("node", "kangas")
    }

    /// The kangas backend server
    pub fn backend() -> Self {
        Self::new("kangas", "server")
    }

    pub fn name_prefix(&self) -> &str {
        &self.name_prefix
    }

    pub fn command_substring(&self) -> &str {
        &self.command_substring
    }

    pub fn matches(&self, process: &ProcessHandle) -> bool {
        process.executable_name.starts_with(&self.name_prefix)
            && process.command_line.contains(&self.command_substring)
    }
}

/// Result of a process termination operation
#[derive(Debug, Clone, PartialEq)]
pub enum TerminationResult {
    /// Process was successfully terminated
    Success,
    /// Process was not found (already exited)
    ProcessNotFound,
    /// Insufficient privileges
    AccessDenied,
    /// Operation failed with specific error message
    Failed(String),
}

/// Spawn-time settings that do not belong on the server command line
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpawnOptions {
    pub env: HashMap<String, String>,
    pub working_directory: Option<PathBuf>,
    /// Keep the child's stdout/stderr attached to ours
    pub inherit_output: bool,
}

/// Read-only view over the processes of the host
#[async_trait]
pub trait ProcessScanner: Send + Sync {
    /// Enumerate all live processes. Processes that cannot be inspected are skipped.
    async fn scan(&self) -> Vec<ProcessHandle>;

    /// Every scanned process matching `probe`, whatever its state. The
    /// calling process never matches: the launcher binary is itself named
    /// `kangas-...` and may carry `server` in its arguments.
    async fn matching(&self, probe: &ProcessProbe) -> Vec<ProcessHandle> {
        let own_pid = std::process::id();
        self.scan()
            .await
            .into_iter()
            .filter(|process| process.pid != own_pid && probe.matches(process))
            .collect()
    }

    /// Whether a non-zombie process matches `probe`
    async fn is_running(&self, probe: &ProcessProbe) -> bool {
        self.matching(probe)
            .await
            .iter()
            .any(|process| process.status.is_alive())
    }

    async fn for_each_matching(
        &self,
        probe: &ProcessProbe,
        action: &mut (dyn for<'p> FnMut(&'p ProcessHandle) + Send),
    ) {
        for process in self.matching(probe).await {
            action(&process);
        }
    }
}

/// Best-effort termination of a single process by pid
#[async_trait]
pub trait ProcessTerminator: Send + Sync {
    async fn terminate(&self, pid: ProcessId) -> TerminationResult;
}

/// Starts a process that outlives the launcher and is never waited on
pub trait DetachedSpawner: Send + Sync {
    fn spawn_detached(
        &self,
        command: &str,
        args: &[String],
        options: &SpawnOptions,
    ) -> Result<ProcessId, LauncherError>;
}

/// Platform process manager: scanning, termination and detached spawning
pub trait ProcessManager: ProcessScanner + ProcessTerminator + DetachedSpawner {
    /// Create a new process manager instance
    fn new() -> Self
    where
        Self: Sized;
}

/// Factory trait for creating platform-specific process managers
pub trait ProcessManagerFactory {
    /// The type of process manager this factory creates
    type Manager: ProcessManager;

    /// Create a process manager for the current platform
    fn create_process_manager() -> Self::Manager;

    /// Get the platform name for logging and debugging
    fn platform_name() -> &'static str;
}
