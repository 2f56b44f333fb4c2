//! Unix-specific process management implementation

#[cfg(unix)]
mod unix_process_manager;

#[cfg(unix)]
pub use unix_process_manager::UnixProcessManager;

#[cfg(unix)]
pub struct UnixProcessManagerFactory;

#[cfg(unix)]
impl kangas_launcher_core::ProcessManagerFactory for UnixProcessManagerFactory {
    type Manager = UnixProcessManager;

    fn create_process_manager() -> UnixProcessManager {
        <UnixProcessManager as kangas_launcher_core::ProcessManager>::new()
    }

    fn platform_name() -> &'static str {
        "Unix"
    }
}
