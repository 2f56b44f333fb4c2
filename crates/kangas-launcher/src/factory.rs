use kangas_launcher_core::ProcessManagerFactory;

/// Process manager of the platform this crate was compiled for
#[cfg(unix)]
pub type PlatformProcessManager = kangas_launcher_unix::UnixProcessManager;

#[cfg(windows)]
pub type PlatformProcessManager = kangas_launcher_windows::WindowsProcessManager;

/// Platform-independent factory that selects the appropriate implementation at compile time
pub struct PlatformProcessManagerFactory;

impl ProcessManagerFactory for PlatformProcessManagerFactory {
    type Manager = PlatformProcessManager;

    fn create_process_manager() -> Self::Manager {
        #[cfg(unix)]
        return kangas_launcher_unix::UnixProcessManagerFactory::create_process_manager();

        #[cfg(windows)]
        return kangas_launcher_windows::WindowsProcessManagerFactory::create_process_manager();
    }

    fn platform_name() -> &'static str {
        #[cfg(unix)]
        return kangas_launcher_unix::UnixProcessManagerFactory::platform_name();

        #[cfg(windows)]
        return kangas_launcher_windows::WindowsProcessManagerFactory::platform_name();
    }
}
