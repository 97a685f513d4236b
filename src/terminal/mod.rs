//! Terminal session kind
//!
//! Wraps an interactive shell spawned under a PTY. Configuration resolution
//! (working directory, dimensions, environment layering, shell selection)
//! lives in [`config`]; the live process and its output forwarding live in
//! [`process`].

mod config;
mod process;

pub use config::*;
pub use process::*;

use std::sync::Arc;

use async_trait::async_trait;

use crate::adapter::{AdapterResult, CreateParams, SessionAdapter, SessionHandle};
use crate::config::WorkspaceSettings;
use crate::session::SessionKind;

/// Factory for terminal sessions
#[derive(Debug, Default)]
pub struct TerminalAdapter {
    settings: WorkspaceSettings,
}

impl TerminalAdapter {
    /// Adapter with default workspace settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Adapter applying workspace-level defaults (root, env, shell)
    pub fn with_settings(settings: WorkspaceSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl SessionAdapter for TerminalAdapter {
    fn kind(&self) -> SessionKind {
        SessionKind::Terminal
    }

    async fn create(&self, params: CreateParams) -> AdapterResult<SessionHandle> {
        let options: TerminalOptions = if params.options.is_null() {
            TerminalOptions::default()
        } else {
            serde_json::from_value(params.options)?
        };
        let config = TerminalConfig::resolve(&options, &self.settings, params.cwd.as_deref())?;
        let process = Arc::new(TerminalProcess::new(config, params.on_event));
        SessionHandle::start(process).await
    }
}
