use kangas_launcher_core::ExecutionContext;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Forces a context, bypassing marker detection
pub const CONTEXT_OVERRIDE_VAR: &str = "KANGAS_EXECUTION_CONTEXT";

/// Set by the Colab runtime
const CLOUD_NOTEBOOK_MARKERS: &[&str] =
    &["COLAB_RELEASE_TAG", "COLAB_GPU", "COLAB_BACKEND_VERSION"];

/// Set by Jupyter kernels and the evcxr Rust kernel
const NOTEBOOK_KERNEL_MARKERS: &[&str] =
    &["EVCXR_IS_RUNTIME", "JPY_PARENT_PID", "JPY_SESSION_NAME"];

/// Source of environment variables
pub trait EnvironmentSource: Send + Sync {
    fn var(&self, key: &str) -> Option<String>;
}

/// The variables of the current process
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnvironment;

impl EnvironmentSource for ProcessEnvironment {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvironmentSource for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// Classifies where the caller runs. Recomputed on every call.
#[derive(Clone)]
pub struct EnvironmentDetector {
    source: Arc<dyn EnvironmentSource>,
}

impl Default for EnvironmentDetector {
    fn default() -> Self {
        Self::new(ProcessEnvironment)
    }
}

impl EnvironmentDetector {
    pub fn new(source: impl EnvironmentSource + 'static) -> Self {
        Self {
            source: Arc::new(source),
        }
    }

    pub fn detect(&self) -> ExecutionContext {
        if let Some(forced) = self.forced_context() {
            return forced;
        }

        let context = if self.in_cloud_notebook() {
            ExecutionContext::CloudNotebook
        } else if self.in_notebook_kernel() {
            ExecutionContext::ManagedNotebook
        } else {
            ExecutionContext::PlainHost
        };
        debug!(context = %context, "Detected execution context");
        context
    }

    pub fn in_cloud_notebook(&self) -> bool {
        self.any_marker(CLOUD_NOTEBOOK_MARKERS)
    }

    pub fn in_notebook_kernel(&self) -> bool {
        self.any_marker(NOTEBOOK_KERNEL_MARKERS)
    }

    fn forced_context(&self) -> Option<ExecutionContext> {
        let value = self.source.var(CONTEXT_OVERRIDE_VAR)?;
        if value.trim().is_empty() {
            return None;
        }
        match value.parse() {
            Ok(context) => Some(context),
            Err(e) => {
                warn!("Ignoring {}: {}", CONTEXT_OVERRIDE_VAR, e);
                None
            }
        }
    }

    fn any_marker(&self, markers: &[&str]) -> bool {
        markers
            .iter()
            .any(|key| self.source.var(key).is_some_and(|value| !value.is_empty()))
    }
}
