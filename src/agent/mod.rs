//! Agent session kind
//!
//! Wraps an AI agent CLI (Claude Code by default) spawned under a PTY in
//! the session's working directory. Prompt text written to the session is
//! forwarded to the agent's stdin; the conversation stream comes back as
//! tagged result events.

mod process;

pub use process::*;

use std::sync::Arc;

use async_trait::async_trait;

use crate::adapter::{AdapterResult, CreateParams, SessionAdapter, SessionHandle};
use crate::config::WorkspaceSettings;
use crate::session::SessionKind;

/// Factory for agent sessions
#[derive(Debug, Default)]
pub struct AgentAdapter {
    settings: WorkspaceSettings,
}

impl AgentAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adapter applying the workspace root as the cwd fallback
    pub fn with_settings(settings: WorkspaceSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl SessionAdapter for AgentAdapter {
    fn kind(&self) -> SessionKind {
        SessionKind::Agent
    }

    async fn create(&self, params: CreateParams) -> AdapterResult<SessionHandle> {
        let options: AgentOptions = if params.options.is_null() {
            AgentOptions::default()
        } else {
            serde_json::from_value(params.options)?
        };
        let cwd = crate::adapter::resolve_cwd(params.cwd.as_deref(), &self.settings)?;
        let process = Arc::new(AgentProcess::new(cwd, options, params.on_event));
        SessionHandle::start(process).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventCallback, SessionEvent};
    use std::sync::Mutex;

    fn collecting_callback() -> (EventCallback, Arc<Mutex<Vec<SessionEvent>>>) {
        let events: Arc<Mutex<Vec<SessionEvent>>> = Arc::new(Mutex::new(Vec::new()));
        let events_clone = Arc::clone(&events);
        (
            Arc::new(move |evt| events_clone.lock().unwrap().push(evt)),
            events,
        )
    }

    #[tokio::test]
    async fn test_create_with_substitute_backend() {
        let (callback, events) = collecting_callback();
        let adapter = AgentAdapter::new();
        let handle = adapter
            .create(
                CreateParams::new(callback)
                    .with_cwd("/tmp")
                    .with_options(serde_json::json!({ "command": "cat", "args": [] })),
            )
            .await
            .unwrap();

        assert_eq!(handle.kind(), SessionKind::Agent);
        {
            let events = events.lock().unwrap();
            assert_eq!(events[0].channel, "agent:system");
            assert_eq!(events[0].event_type, "initialized");
            assert_eq!(events[0].payload["command"], "cat");
        }

        handle.close().await;
        assert!(!handle.is_alive().await);
    }

    #[tokio::test]
    async fn test_create_fails_on_missing_cwd() {
        let (callback, _events) = collecting_callback();
        let adapter = AgentAdapter::new();
        let result = adapter
            .create(CreateParams::new(callback).with_cwd("/nonexistent/path/nowhere"))
            .await;
        assert!(result.is_err());
    }
}
