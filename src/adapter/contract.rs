//! Adapter and process contracts
//!
//! `SessionProcess` is the trait every kind-specific process satisfies;
//! `SessionAdapter` is the factory that builds one and hands back a uniform
//! `SessionHandle`. Initialization must complete, and emit its `initialized`
//! system event, before a handle is ever returned; a failed initialization
//! fails `create` outright rather than producing a half-built handle.

use std::any::Any;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::config::{expand_tilde, WorkspaceSettings};
use crate::event::EventCallback;
use crate::pty::PtyError;
use crate::session::SessionKind;

/// Errors that can occur while creating a session
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("Invalid session options: {0}")]
    InvalidOptions(#[from] serde_json::Error),

    #[error("Cannot resolve working directory: {0}")]
    WorkingDirectory(String),

    #[error("Failed to acquire session backend: {0}")]
    Backend(#[from] PtyError),

    #[error("Session was already initialized")]
    AlreadyInitialized,

    #[error("No adapter registered for session kind: {0}")]
    UnknownKind(SessionKind),
}

/// Result type for adapter operations
pub type AdapterResult<T> = Result<T, AdapterError>;

/// Parameters for creating a session of any kind
pub struct CreateParams {
    /// Working directory; falls back to the workspace root, then the home
    /// directory, when absent
    pub cwd: Option<PathBuf>,
    /// Kind-specific options map; defaults to empty
    pub options: Value,
    /// Callback receiving every event the session emits
    pub on_event: EventCallback,
}

impl CreateParams {
    /// Create params with default cwd resolution and empty options
    pub fn new(on_event: EventCallback) -> Self {
        Self {
            cwd: None,
            options: Value::Null,
            on_event,
        }
    }

    /// Set an explicit working directory
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Set the kind-specific options map
    pub fn with_options(mut self, options: Value) -> Self {
        self.options = options;
        self
    }
}

impl std::fmt::Debug for CreateParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreateParams")
            .field("cwd", &self.cwd)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// The stateful object backing one active session.
///
/// Not necessarily an OS process: the terminal and agent kinds wrap a
/// spawned PTY, the file-editor and web-view kinds are in-memory state
/// machines. One live instance per session, never reused.
#[async_trait]
pub trait SessionProcess: Send + Sync {
    /// Session kind tag
    fn kind(&self) -> SessionKind;

    /// Session identifier
    fn id(&self) -> Uuid;

    /// Working directory, immutable for the session's lifetime
    fn cwd(&self) -> &Path;

    /// Acquire the backend and emit the `initialized` system event.
    ///
    /// Must complete before the owning handle is handed out. Errors here
    /// fail session creation.
    async fn initialize(&self) -> AdapterResult<()>;

    /// Feed input to the session. Kind-specific semantics; failures surface
    /// as error events on the session's own channel, never as return
    /// values. Silent no-op when the session is not active.
    async fn handle_input(&self, data: &[u8]);

    /// Tear the session down, emitting the terminal `closed` event.
    /// Idempotent; never errors after close.
    async fn close(&self);

    /// True strictly between a successful initialize and the first close
    async fn is_alive(&self) -> bool;

    /// Downcast support for [`SessionHandle::process`]
    fn as_any(&self) -> &dyn Any;
}

/// Uniform handle to a running session of any kind.
///
/// Exclusively owned by the orchestrator; dropping it does not close the
/// session (close is explicit).
pub struct SessionHandle {
    kind: SessionKind,
    process: Arc<dyn SessionProcess>,
}

impl SessionHandle {
    /// Initialize the process and wrap it; the handle only exists once the
    /// `initialized` event has been emitted
    pub(crate) async fn start(process: Arc<dyn SessionProcess>) -> AdapterResult<Self> {
        process.initialize().await?;
        Ok(Self {
            kind: process.kind(),
            process,
        })
    }

    /// Session kind tag
    pub fn kind(&self) -> SessionKind {
        self.kind
    }

    /// Session identifier
    pub fn id(&self) -> Uuid {
        self.process.id()
    }

    /// Write raw bytes into the session (keystrokes, commands, prompt text
    /// depending on the kind)
    pub async fn write(&self, data: &[u8]) {
        self.process.handle_input(data).await;
    }

    /// Convenience wrapper around [`SessionHandle::write`]
    pub async fn write_str(&self, data: &str) {
        self.process.handle_input(data.as_bytes()).await;
    }

    /// Close the session; safe to call any number of times
    pub async fn close(&self) {
        self.process.close().await;
    }

    /// Resolved working directory
    pub fn cwd(&self) -> &Path {
        self.process.cwd()
    }

    /// Whether the session is still live
    pub async fn is_alive(&self) -> bool {
        self.process.is_alive().await
    }

    /// Direct access to the underlying process.
    ///
    /// Deliberate encapsulation break for advanced callers that need
    /// kind-specific operations (e.g. the file-editor emitters or terminal
    /// resize); downcast via [`SessionProcess::as_any`]. Use sparingly.
    pub fn process(&self) -> &Arc<dyn SessionProcess> {
        &self.process
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("kind", &self.kind)
            .field("cwd", &self.process.cwd())
            .finish_non_exhaustive()
    }
}

/// Factory for one session kind
#[async_trait]
pub trait SessionAdapter: Send + Sync {
    /// The kind this adapter constructs
    fn kind(&self) -> SessionKind;

    /// Build and initialize a session process, returning its handle.
    ///
    /// On success the underlying process has emitted exactly one
    /// `initialized` system event before any other event.
    async fn create(&self, params: CreateParams) -> AdapterResult<SessionHandle>;
}

/// Resolve a session working directory.
///
/// Precedence: explicit path (tilde-expanded) > workspace root (settings,
/// then the `WORKBENCH_WORKSPACE_ROOT` environment variable) > home
/// directory. The result must be an accessible directory, otherwise session
/// creation fails.
pub fn resolve_cwd(
    explicit: Option<&Path>,
    workspace: &WorkspaceSettings,
) -> AdapterResult<PathBuf> {
    let candidate = match explicit {
        Some(path) => expand_tilde(&path.to_string_lossy()),
        None => workspace
            .workspace_root()
            .or_else(dirs::home_dir)
            .ok_or_else(|| {
                AdapterError::WorkingDirectory(
                    "no explicit cwd, workspace root, or home directory available".to_string(),
                )
            })?,
    };

    if !candidate.is_dir() {
        return Err(AdapterError::WorkingDirectory(format!(
            "not an accessible directory: {}",
            candidate.display()
        )));
    }
    Ok(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn noop_callback() -> EventCallback {
        Arc::new(|_| {})
    }

    #[test]
    fn test_create_params_defaults() {
        let params = CreateParams::new(noop_callback());
        assert!(params.cwd.is_none());
        assert!(params.options.is_null());
    }

    #[test]
    fn test_create_params_builders() {
        let params = CreateParams::new(noop_callback())
            .with_cwd("/tmp")
            .with_options(serde_json::json!({ "cols": 120 }));
        assert_eq!(params.cwd, Some(PathBuf::from("/tmp")));
        assert_eq!(params.options["cols"], 120);
    }

    #[test]
    fn test_resolve_cwd_explicit() {
        let cwd = resolve_cwd(Some(Path::new("/tmp")), &WorkspaceSettings::default()).unwrap();
        assert_eq!(cwd, PathBuf::from("/tmp"));
    }

    #[test]
    fn test_resolve_cwd_rejects_missing_directory() {
        let result = resolve_cwd(
            Some(Path::new("/nonexistent/path/nowhere")),
            &WorkspaceSettings::default(),
        );
        assert!(matches!(result, Err(AdapterError::WorkingDirectory(_))));
    }

    #[test]
    fn test_resolve_cwd_expands_tilde() {
        if let Some(home) = dirs::home_dir() {
            let cwd = resolve_cwd(Some(Path::new("~")), &WorkspaceSettings::default()).unwrap();
            assert_eq!(cwd, home);
        }
    }

    #[test]
    fn test_resolve_cwd_uses_settings_root() {
        let workspace = WorkspaceSettings {
            root: Some(PathBuf::from("/tmp")),
            ..Default::default()
        };
        let cwd = resolve_cwd(None, &workspace).unwrap();
        assert_eq!(cwd, PathBuf::from("/tmp"));
    }

    #[test]
    fn test_resolve_cwd_explicit_wins_over_settings_root() {
        let workspace = WorkspaceSettings {
            root: Some(PathBuf::from("/var")),
            ..Default::default()
        };
        let cwd = resolve_cwd(Some(Path::new("/tmp")), &workspace).unwrap();
        assert_eq!(cwd, PathBuf::from("/tmp"));
    }

    #[test]
    fn test_resolve_cwd_default_falls_back() {
        // Without an explicit path the resolver lands on the workspace root
        // or the home directory, both of which must exist
        let cwd = resolve_cwd(None, &WorkspaceSettings::default()).unwrap();
        assert!(cwd.is_dir());
    }
}
