//! Session lifecycle primitives
//!
//! Shared state machine and guarded event emission used by every session
//! process kind. A process moves `Uninitialized -> Initializing -> Active ->
//! Closed` and never leaves `Closed`; every emitting operation checks the
//! state first and silently no-ops once the session is inactive, which keeps
//! teardown idempotent across competing close paths.

mod lifecycle;

pub use lifecycle::*;

use serde::{Deserialize, Serialize};

/// Tag identifying a session type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionKind {
    /// Interactive shell in a pseudo-terminal
    Terminal,
    /// File-editor session backed by external file I/O
    FileEditor,
    /// Embedded browser navigation state
    WebView,
    /// AI agent conversation driven through a CLI backend
    Agent,
}

impl SessionKind {
    /// Stable string tag, used as the event channel prefix
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionKind::Terminal => "terminal",
            SessionKind::FileEditor => "file-editor",
            SessionKind::WebView => "web-view",
            SessionKind::Agent => "agent",
        }
    }
}

impl std::fmt::Display for SessionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a session process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Constructed, backend not yet acquired
    Uninitialized,
    /// `initialize()` in progress; not yet observable as alive
    Initializing,
    /// Fully initialized and accepting input
    Active,
    /// Torn down; terminal state, never left
    Closed,
}

impl SessionState {
    /// Whether the session accepts input and may emit events
    pub fn is_active(&self) -> bool {
        matches!(self, SessionState::Active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_tags() {
        assert_eq!(SessionKind::Terminal.as_str(), "terminal");
        assert_eq!(SessionKind::FileEditor.as_str(), "file-editor");
        assert_eq!(SessionKind::WebView.as_str(), "web-view");
        assert_eq!(SessionKind::Agent.as_str(), "agent");
    }

    #[test]
    fn test_kind_serde_round_trip() {
        let json = serde_json::to_string(&SessionKind::FileEditor).unwrap();
        assert_eq!(json, "\"file-editor\"");
        let kind: SessionKind = serde_json::from_str("\"web-view\"").unwrap();
        assert_eq!(kind, SessionKind::WebView);
    }

    #[test]
    fn test_only_active_is_active() {
        assert!(!SessionState::Uninitialized.is_active());
        assert!(!SessionState::Initializing.is_active());
        assert!(SessionState::Active.is_active());
        assert!(!SessionState::Closed.is_active());
    }
}
