use crate::process::{ProcessHandle, ProcessStatus};
use std::sync::Mutex;
use sysinfo::{Pid, Process, ProcessRefreshKind, ProcessesToUpdate, System, UpdateKind};
use tracing::debug;

/// Process table reader backed by `sysinfo`, shared by the platform managers
pub struct SystemScanner {
    system: Mutex<System>,
}

impl Default for SystemScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemScanner {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }

    /// Refresh the process table and return every inspectable process
    pub fn snapshot(&self) -> Vec<ProcessHandle> {
        let mut system = match self.system.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        system.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::nothing().with_cmd(UpdateKind::Always),
        );

        let processes: Vec<ProcessHandle> = system
            .processes()
            .iter()
            .filter(|(_, process)| process.thread_kind().is_none())
            .filter_map(|(pid, process)| to_handle(*pid, process))
            .collect();

        debug!(count = processes.len(), "Scanned process table");
        processes
    }

    /// Whether `pid` exists and is neither a zombie nor dead. Refreshes only that pid.
    pub fn is_alive(&self, pid: u32) -> bool {
        let mut system = match self.system.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let target = Pid::from_u32(pid);
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[target]),
            true,
            ProcessRefreshKind::nothing(),
        );

        system
            .process(target)
            .is_some_and(|process| map_status(process.status()).is_alive())
    }
}

fn to_handle(pid: Pid, process: &Process) -> Option<ProcessHandle> {
    let executable_name = process.name().to_string_lossy().into_owned();
    if executable_name.is_empty() {
        // Exited mid-scan or unreadable
        return None;
    }

    let command_line = process
        .cmd()
        .iter()
        .map(|arg| arg.to_string_lossy())
        .collect::<Vec<_>>()
        .join(" ");

    Some(ProcessHandle {
        pid: pid.as_u32(),
        executable_name,
        command_line,
        status: map_status(process.status()),
    })
}

fn map_status(status: sysinfo::ProcessStatus) -> ProcessStatus {
    match status {
        sysinfo::ProcessStatus::Zombie => ProcessStatus::Zombie,
        sysinfo::ProcessStatus::Dead => ProcessStatus::Dead,
        sysinfo::ProcessStatus::Stop | sysinfo::ProcessStatus::Tracing => ProcessStatus::Stopped,
        _ => ProcessStatus::Running,
    }
}
