use async_trait::async_trait;
use kangas_launcher_core::{
    DetachedSpawner, LauncherError, ProcessHandle, ProcessId, ProcessManager, ProcessScanner,
    ProcessTerminator, SpawnOptions, SystemScanner, TerminationResult,
};
use nix::sys::signal::{self, Signal};
use nix::sys::wait::{WaitPidFlag, waitpid};
use nix::unistd::Pid as NixPid;
use std::os::unix::process::CommandExt;
use std::process::{Command, Stdio};
use std::time::Duration;
use tracing::{info, warn};

const DEFAULT_GRACE_PERIOD: Duration = Duration::from_millis(2000);
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Unix process manager: sysinfo scanning, signal based termination and
/// spawning into a fresh process group
pub struct UnixProcessManager {
    scanner: SystemScanner,
    grace_period: Duration,
}

impl Default for UnixProcessManager {
    fn default() -> Self {
        <Self as ProcessManager>::new()
    }
}

impl UnixProcessManager {
    /// How long a process gets between SIGTERM and SIGKILL
    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// Terminate a single process by PID with escalation
    async fn terminate_single_process(&self, pid: ProcessId) -> TerminationResult {
        let nix_pid = NixPid::from_raw(pid as i32);

        match signal::kill(nix_pid, Signal::SIGTERM) {
            Ok(()) => {
                info!("Sent SIGTERM to process {}", pid);

                if self.wait_for_exit(nix_pid).await {
                    return TerminationResult::Success;
                }

                match signal::kill(nix_pid, Signal::SIGKILL) {
                    Ok(()) => {
                        info!("Sent SIGKILL to process {}", pid);
                        TerminationResult::Success
                    }
                    Err(nix::errno::Errno::ESRCH) => {
                        info!("Process {} already terminated", pid);
                        TerminationResult::Success
                    }
                    Err(e) => {
                        warn!("Failed to kill process {}: {}", pid, e);
                        TerminationResult::Failed(format!("SIGKILL failed: {e}"))
                    }
                }
            }
            Err(nix::errno::Errno::ESRCH) => {
                info!("Process {} not found (already terminated)", pid);
                TerminationResult::ProcessNotFound
            }
            Err(nix::errno::Errno::EPERM) => {
                warn!("Permission denied to terminate process {}", pid);
                TerminationResult::AccessDenied
            }
            Err(e) => {
                warn!("Failed to send SIGTERM to process {}: {}", pid, e);
                TerminationResult::Failed(format!("SIGTERM failed: {e}"))
            }
        }
    }

    /// Poll the process state until it is gone or a zombie, or the grace period ends.
    /// Signal 0 is no use here: it succeeds on zombies.
    async fn wait_for_exit(&self, pid: NixPid) -> bool {
        let deadline = tokio::time::Instant::now() + self.grace_period;
        while tokio::time::Instant::now() < deadline {
            // Reaps the process when it is our own child; ECHILD otherwise
            let _ = waitpid(pid, Some(WaitPidFlag::WNOHANG));
            if !self.scanner.is_alive(pid.as_raw() as u32) {
                return true;
            }
            tokio::time::sleep(EXIT_POLL_INTERVAL).await;
        }
        false
    }
}

#[async_trait]
impl ProcessScanner for UnixProcessManager {
    async fn scan(&self) -> Vec<ProcessHandle> {
        self.scanner.snapshot()
    }
}

#[async_trait]
impl ProcessTerminator for UnixProcessManager {
    async fn terminate(&self, pid: ProcessId) -> TerminationResult {
        self.terminate_single_process(pid).await
    }
}

impl DetachedSpawner for UnixProcessManager {
    fn spawn_detached(
        &self,
        command: &str,
        args: &[String],
        options: &SpawnOptions,
    ) -> Result<ProcessId, LauncherError> {
        let mut cmd = Command::new(command);
        cmd.args(args);

        if let Some(dir) = &options.working_directory {
            cmd.current_dir(dir);
        }

        for (key, value) in &options.env {
            cmd.env(key, value);
        }

        cmd.stdin(Stdio::null());
        if !options.inherit_output {
            cmd.stdout(Stdio::null()).stderr(Stdio::null());
        }

        // Own process group so terminal signals aimed at the caller leave the servers alone
        cmd.process_group(0);

        let child = cmd
            .spawn()
            .map_err(|e| LauncherError::spawn_failed(command, e))?;
        let pid = child.id();

        info!(
            "Spawned Unix process: {} (PID: {}) with args: {:?}",
            command, pid, args
        );

        // Detached: the handle is dropped without waiting
        drop(child);
        Ok(pid)
    }
}

impl ProcessManager for UnixProcessManager {
    fn new() -> Self {
        info!("Initializing Unix process manager with system monitoring");
        Self {
            scanner: SystemScanner::new(),
            grace_period: DEFAULT_GRACE_PERIOD,
        }
    }
}
