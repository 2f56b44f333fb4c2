use anyhow::{Context, Result};
use async_trait::async_trait;
use kangas_launcher_core::{
    DetachedSpawner, LauncherError, ProcessHandle, ProcessId, ProcessManager, ProcessScanner,
    ProcessTerminator, SpawnOptions, SystemScanner, TerminationResult,
};
use std::os::windows::process::CommandExt;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{info, warn};
use windows::Win32::Foundation::CloseHandle;
use windows::Win32::System::Threading::{OpenProcess, PROCESS_TERMINATE, TerminateProcess};

const DETACHED_PROCESS: u32 = 0x0000_0008;
const CREATE_NO_WINDOW: u32 = 0x0800_0000;
const GRACE_PERIOD: Duration = Duration::from_millis(1000);

/// Windows process manager: sysinfo scanning, taskkill with a
/// `TerminateProcess` fallback, detached console-less spawning
pub struct WindowsProcessManager {
    scanner: SystemScanner,
}

impl Default for WindowsProcessManager {
    fn default() -> Self {
        <Self as ProcessManager>::new()
    }
}

impl WindowsProcessManager {
    /// Use taskkill to ask a single process to exit
    async fn taskkill(&self, pid: u32) -> Result<bool> {
        let output = Command::new("taskkill")
            .args(["/PID", &pid.to_string()])
            .output()
            .await
            .context("failed to run taskkill")?;

        Ok(output.status.success())
    }

    fn is_alive(&self, pid: u32) -> bool {
        self.scanner.is_alive(pid)
    }

    fn force_terminate(pid: u32) -> TerminationResult {
        // SAFETY: the handle is checked by `OpenProcess` and closed before returning
        unsafe {
            let handle = match OpenProcess(PROCESS_TERMINATE, false, pid) {
                Ok(handle) => handle,
                Err(e) => {
                    warn!(pid = %pid, error = %e, "Cannot open process for termination");
                    return TerminationResult::AccessDenied;
                }
            };
            let result = TerminateProcess(handle, 1);
            let _ = CloseHandle(handle);
            match result {
                Ok(()) => {
                    info!(pid = %pid, "Force terminated process");
                    TerminationResult::Success
                }
                Err(e) => TerminationResult::Failed(format!("TerminateProcess failed: {e}")),
            }
        }
    }
}

#[async_trait]
impl ProcessScanner for WindowsProcessManager {
    async fn scan(&self) -> Vec<ProcessHandle> {
        self.scanner.snapshot()
    }
}

#[async_trait]
impl ProcessTerminator for WindowsProcessManager {
    async fn terminate(&self, pid: ProcessId) -> TerminationResult {
        if !self.is_alive(pid) {
            info!(pid = %pid, "Process not found (already terminated)");
            return TerminationResult::ProcessNotFound;
        }

        match self.taskkill(pid).await {
            Ok(true) => {
                info!(pid = %pid, "Sent graceful termination to process");
                tokio::time::sleep(GRACE_PERIOD).await;
                if self.is_alive(pid) {
                    Self::force_terminate(pid)
                } else {
                    TerminationResult::Success
                }
            }
            Ok(false) => Self::force_terminate(pid),
            Err(e) => {
                warn!(pid = %pid, error = %e, "taskkill unavailable, terminating directly");
                Self::force_terminate(pid)
            }
        }
    }
}

impl DetachedSpawner for WindowsProcessManager {
    fn spawn_detached(
        &self,
        command: &str,
        args: &[String],
        options: &SpawnOptions,
    ) -> Result<ProcessId, LauncherError> {
        let mut cmd = std::process::Command::new(command);
        cmd.args(args);

        if let Some(dir) = &options.working_directory {
            cmd.current_dir(dir);
        }

        for (key, value) in &options.env {
            cmd.env(key, value);
        }

        cmd.stdin(Stdio::null());
        if options.inherit_output {
            cmd.creation_flags(CREATE_NO_WINDOW);
        } else {
            cmd.stdout(Stdio::null()).stderr(Stdio::null());
            cmd.creation_flags(DETACHED_PROCESS | CREATE_NO_WINDOW);
        }

        let child = cmd
            .spawn()
            .map_err(|e| LauncherError::spawn_failed(command, e))?;
        let pid = child.id();

        info!(
            pid = %pid,
            command = %command,
            args = ?args,
            "Spawned Windows process"
        );

        Ok(pid)
    }
}

impl ProcessManager for WindowsProcessManager {
    fn new() -> Self {
        info!("Initializing Windows process manager with system monitoring");
        Self {
            scanner: SystemScanner::new(),
        }
    }
}
