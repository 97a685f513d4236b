//! Agent session process
//!
//! Spawns the agent CLI under a PTY in the session's working directory and
//! bridges it to the event channel. The backend is opaque: spawn with
//! config, stream output, accept input, report exit.

use std::any::Any;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use crate::adapter::{AdapterError, AdapterResult, SessionProcess};
use crate::event::EventCallback;
use crate::pty::{PtyCommand, PtyProcess, WindowSize};
use crate::session::{SessionCore, SessionKind};

/// Default agent CLI executable
pub const DEFAULT_AGENT_COMMAND: &str = "claude";

/// Options accepted by the agent adapter
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AgentOptions {
    /// Agent CLI executable
    pub command: String,
    /// Arguments; empty starts the agent in interactive mode
    pub args: Vec<String>,
    /// Extra environment entries for the agent process
    pub env: HashMap<String, String>,
    /// Terminal columns for the agent's PTY
    pub cols: u16,
    /// Terminal rows for the agent's PTY
    pub rows: u16,
}

impl Default for AgentOptions {
    fn default() -> Self {
        Self {
            command: DEFAULT_AGENT_COMMAND.to_string(),
            args: Vec::new(),
            env: HashMap::new(),
            cols: 80,
            rows: 24,
        }
    }
}

/// A live agent session backed by a PTY-spawned agent CLI
pub struct AgentProcess {
    core: Arc<SessionCore>,
    options: AgentOptions,
    pty: RwLock<Option<PtyProcess>>,
}

impl AgentProcess {
    /// Construct an uninitialized agent process
    pub fn new(cwd: PathBuf, options: AgentOptions, on_event: EventCallback) -> Self {
        let core = Arc::new(SessionCore::new(SessionKind::Agent, cwd, on_event));
        Self {
            core,
            options,
            pty: RwLock::new(None),
        }
    }

    fn to_command(&self) -> PtyCommand {
        PtyCommand::new(&self.options.command, self.core.cwd())
            .args(self.options.args.iter().cloned())
            .env(self.options.env.clone())
            .size(WindowSize::new(self.options.cols, self.options.rows))
    }

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

            // Agent exited on its own or was killed; either way the session
            // ends here. The guard swallows the duplicate when the caller
            // closed first.
            core.emit("system", "exited", json!({})).await;
            core.close().await;
        });
    }
}

#[async_trait]
impl SessionProcess for AgentProcess {
    fn kind(&self) -> SessionKind {
        SessionKind::Agent
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

        if !self.core.cwd().is_dir() {
            self.core.abort_initialize().await;
            return Err(AdapterError::WorkingDirectory(format!(
                "not an accessible directory: {}",
                self.core.cwd().display()
            )));
        }

        let pty = match PtyProcess::spawn(&self.to_command()) {
            Ok(pty) => pty,
            Err(e) => {
                self.core.abort_initialize().await;
                return Err(AdapterError::Backend(e));
            }
        };

        let output = pty.take_output().await;
        *self.pty.write().await = Some(pty);

        self.core
            .complete_initialize(json!({ "command": self.options.command }))
            .await;

        if let Some(output) = output {
            Self::start_output_forwarder(Arc::clone(&self.core), output);
        }

        info!(
            command = %self.options.command,
            cwd = %self.core.cwd().display(),
            "agent session started"
        );
        Ok(())
    }

    /// Forward prompt text to the agent's stdin
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
