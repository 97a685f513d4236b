//! Adapter registry
//!
//! Maps a session-kind tag to the adapter that constructs it, so an
//! orchestrator can create sessions from a wire-level kind string without
//! knowing the concrete types.

use std::collections::HashMap;

use tracing::debug;

use super::{AdapterError, AdapterResult, CreateParams, SessionAdapter, SessionHandle};
use crate::agent::AgentAdapter;
use crate::config::WorkspaceSettings;
use crate::editor::FileEditorAdapter;
use crate::session::SessionKind;
use crate::terminal::TerminalAdapter;
use crate::webview::WebViewAdapter;

/// Registry of session adapters keyed by kind
pub struct AdapterRegistry {
    adapters: HashMap<SessionKind, Box<dyn SessionAdapter>>,
}

impl AdapterRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self {
            adapters: HashMap::new(),
        }
    }

    /// Registry with all four built-in adapters sharing one set of
    /// workspace settings
    pub fn with_defaults(settings: WorkspaceSettings) -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(TerminalAdapter::with_settings(settings.clone())));
        registry.register(Box::new(FileEditorAdapter::with_settings(settings.clone())));
        registry.register(Box::new(WebViewAdapter::with_settings(settings.clone())));
        registry.register(Box::new(AgentAdapter::with_settings(settings)));
        registry
    }

    /// Register an adapter under its own kind, replacing any previous one
    pub fn register(&mut self, adapter: Box<dyn SessionAdapter>) {
        debug!("registered session adapter: {}", adapter.kind());
        self.adapters.insert(adapter.kind(), adapter);
    }

    /// Look up the adapter for a kind
    pub fn get(&self, kind: SessionKind) -> Option<&dyn SessionAdapter> {
        self.adapters.get(&kind).map(Box::as_ref)
    }

    /// Registered kinds
    pub fn kinds(&self) -> impl Iterator<Item = SessionKind> + '_ {
        self.adapters.keys().copied()
    }

    /// Create a session of the given kind
    pub async fn create(
        &self,
        kind: SessionKind,
        params: CreateParams,
    ) -> AdapterResult<SessionHandle> {
        let adapter = self.get(kind).ok_or(AdapterError::UnknownKind(kind))?;
        adapter.create(params).await
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::with_defaults(WorkspaceSettings::default())
    }
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("kinds", &self.adapters.keys().collect::<Vec<_>>())
            .finish()
    }
}
