//! Windows-specific process management implementation

#[cfg(windows)]
mod windows_process_manager;

#[cfg(windows)]
pub use windows_process_manager::WindowsProcessManager;

/// Windows-specific process manager factory
#[cfg(windows)]
pub struct WindowsProcessManagerFactory;

#[cfg(windows)]
impl kangas_launcher_core::ProcessManagerFactory for WindowsProcessManagerFactory {
    type Manager = WindowsProcessManager;

    fn create_process_manager() -> WindowsProcessManager {
        <WindowsProcessManager as kangas_launcher_core::ProcessManager>::new()
    }

    fn platform_name() -> &'static str {
        "Windows"
    }
}
