//! Kangas launcher
//!
//! Starts the Kangas frontend/backend server pair at most once per host and
//! port, and shows the UI in a browser, a notebook cell, or a hosted notebook
//! through its port proxy.
//!
//! ```no_run
//! use kangas_launcher::{KangasLauncher, LauncherConfig, ShowOptions};
//!
//! # async fn run() -> Result<(), kangas_launcher::LauncherError> {
//! let launcher = KangasLauncher::new(LauncherConfig::default());
//! launcher.show(&ShowOptions::datagrid("./example.datagrid")).await?;
//! # Ok(())
//! # }
//! ```

pub mod environment;
pub mod factory;
pub mod launcher;
pub mod presenter;
pub mod proxy;
pub mod readiness;
pub mod registry;
pub mod supervisor;

#[cfg(test)]
pub(crate) mod testing;

pub use environment::{EnvironmentDetector, EnvironmentSource, ProcessEnvironment};
pub use factory::{PlatformProcessManager, PlatformProcessManagerFactory};
pub use launcher::{KangasLauncher, ShowOptions};
pub use presenter::{DisplayChannel, Presenter};
pub use proxy::CommandProxyService;
pub use registry::{ServiceLease, ServiceRecord, ServiceRegistry};
pub use supervisor::{InstanceSupervisor, ServiceStatus};

// Re-export core functionality
pub use kangas_launcher_core::*;
