use super::DisplayChannel;
use async_trait::async_trait;
use kangas_launcher_core::{
    DisplayRequest, ExecutionContext, LauncherError, NotebookDisplay, ServiceEndpoint,
};
use std::io::Write;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Writes rich output in the evcxr kernel protocol: a MIME-tagged block
/// delimited by `EVCXR_BEGIN_CONTENT` / `EVCXR_END_CONTENT` on stdout.
pub struct EvcxrDisplay {
    out: Mutex<Box<dyn Write + Send>>,
}

impl EvcxrDisplay {
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }

    fn emit(&self, mime: &str, content: &str) -> Result<(), LauncherError> {
        let mut out = self
            .out
            .lock()
            .map_err(|_| LauncherError::Display("notebook output lock poisoned".to_string()))?;
        write!(out, "EVCXR_BEGIN_CONTENT {mime}\n{content}\nEVCXR_END_CONTENT\n")
            .and_then(|()| out.flush())
            .map_err(|e| LauncherError::Display(format!("cannot write notebook output: {e}")))?;
        debug!(mime = %mime, "Emitted notebook output");
        Ok(())
    }
}

impl NotebookDisplay for EvcxrDisplay {
    fn render_frame(&self, url: &str, width: &str, height: &str) -> Result<(), LauncherError> {
        self.emit("text/html", &iframe_html(url, width, height))
    }

    fn run_script(&self, script: &str) -> Result<(), LauncherError> {
        self.emit("application/javascript", script)
    }
}

pub(crate) fn iframe_html(url: &str, width: &str, height: &str) -> String {
    format!(
        r#"<iframe src="{}" width="{}" height="{}" frameborder="0" allowfullscreen></iframe>"#,
        escape_attribute(url),
        escape_attribute(width),
        escape_attribute(height)
    )
}

fn escape_attribute(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Local notebook kernel: embed the UI in the cell output
pub struct NotebookChannel {
    display: Arc<dyn NotebookDisplay>,
}

impl NotebookChannel {
    pub fn new(display: Arc<dyn NotebookDisplay>) -> Self {
        Self { display }
    }
}

#[async_trait]
impl DisplayChannel for NotebookChannel {
    fn context(&self) -> ExecutionContext {
        ExecutionContext::ManagedNotebook
    }

    async fn display(
        &self,
        request: &DisplayRequest,
        _endpoint: &ServiceEndpoint,
    ) -> Result<(), LauncherError> {
        self.display
            .render_frame(&request.full_url(), &request.width, &request.height)
    }
}
