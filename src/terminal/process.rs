//! Terminal session process
//!
//! Owns the shell spawned under a PTY, forwards its output as tagged events,
//! and routes input bytes to the shell's stdin.

use std::any::Any;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use super::TerminalConfig;
use crate::adapter::{AdapterError, AdapterResult, SessionProcess};
use crate::event::EventCallback;
use crate::pty::PtyProcess;
use crate::session::{SessionCore, SessionKind};

/// A live terminal session backed by a PTY-spawned shell
pub struct TerminalProcess {
    core: Arc<SessionCore>,
    config: TerminalConfig,
    pty: RwLock<Option<PtyProcess>>,
}

impl TerminalProcess {
    /// Construct an uninitialized terminal process from a resolved config
    pub fn new(config: TerminalConfig, on_event: EventCallback) -> Self {
        let core = Arc::new(SessionCore::new(
            SessionKind::Terminal,
            config.cwd.clone(),
            on_event,
        ));
        Self {
            core,
            config,
            pty: RwLock::new(None),
        }
    }

    /// Resolved configuration backing this session
    pub fn config(&self) -> &TerminalConfig {
        &self.config
    }

    /// Resize the terminal window.
    ///
    /// No-op when the session is not active; resize failures surface as
    /// error events like every other runtime failure.
    pub async fn resize(&self, cols: u16, rows: u16) {
        if !self.core.is_active().await {
            return;
        }
        let pty = self.pty.read().await;
        if let Some(pty) = pty.as_ref() {
            match pty.resize(cols, rows).await {
                Ok(()) => {
                    self.core
                        .emit("system", "resized", json!({ "cols": cols, "rows": rows }))
                        .await;
                }
                Err(e) => self.core.send_error(e.to_string()).await,
            }
        }
    }

    /// Forward PTY output chunks to the event channel until the backend
    /// exits, then close the session from the backend side
    fn start_output_forwarder(
        core: Arc<SessionCore>,
        mut output: tokio::sync::mpsc::Receiver<Vec<u8>>,
    ) {
        tokio::spawn(async move {
            while let Some(chunk) = output.recv().await {
                core.emit(
                    "result",
                    "data",
                    json!({ "data": String::from_utf8_lossy(&chunk) }),
                )
                .await;
            }

            // Backend exited: report it, then run the normal close path.
            // Redundant when the close came from the caller first; the
            // active-flag guard swallows both emissions in that case.
            core.emit("system", "exited", json!({})).await;
            core.close().await;
        });
    }
}

#[async_trait]
impl SessionProcess for TerminalProcess {
    fn kind(&self) -> SessionKind {
        SessionKind::Terminal
    }

    fn id(&self) -> Uuid {
        self.core.id()
    }

    fn cwd(&self) -> &Path {
        self.core.cwd()
    }

    async fn initialize(&self) -> AdapterResult<()> {
        if !self.core.begin_initialize().await {
            return Err(AdapterError::AlreadyInitialized);
        }

        if !self.config.cwd.is_dir() {
            self.core.abort_initialize().await;
            return Err(AdapterError::WorkingDirectory(format!(
                "not an accessible directory: {}",
                self.config.cwd.display()
            )));
        }

        let pty = match PtyProcess::spawn(&self.config.to_command()) {
            Ok(pty) => pty,
            Err(e) => {
                self.core.abort_initialize().await;
                return Err(AdapterError::Backend(e));
            }
        };

        // The receiver exists exactly once, straight after spawn; keep it
        // until the initialized event is out so no chunk can precede it
        let output = pty.take_output().await;
        *self.pty.write().await = Some(pty);

        self.core
            .complete_initialize(json!({
                "cols": self.config.cols,
                "rows": self.config.rows,
                "shell": self.config.shell,
                "term": self.config.term,
            }))
            .await;

        if let Some(output) = output {
            Self::start_output_forwarder(Arc::clone(&self.core), output);
        }

        info!(config = ?self.config.redacted(), "terminal session started");
        Ok(())
    }

    async fn handle_input(&self, data: &[u8]) {
        if !self.core.is_active().await {
            return;
        }
        let pty = self.pty.read().await;
        if let Some(pty) = pty.as_ref() {
            if let Err(e) = pty.write(data).await {
                self.core.send_error(e.to_string()).await;
            }
        }
    }

    async fn close(&self) {
        if !self.core.close().await {
            return;
        }
        let pty = self.pty.read().await;
        if let Some(pty) = pty.as_ref() {
            pty.kill().await;
        }
    }

    async fn is_alive(&self) -> bool {
        self.core.is_active().await
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
