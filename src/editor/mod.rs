//! File-editor session kind
//!
//! An in-memory state machine: input on the uniform channel is acknowledged
//! but not executed (the command protocol over this channel is reserved),
//! while the code that actually performs file I/O reports through the
//! dedicated `send_result` / `send_file_content` emitters.

use std::any::Any;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::adapter::{
    resolve_cwd, AdapterError, AdapterResult, CreateParams, SessionAdapter, SessionHandle,
    SessionProcess,
};
use crate::config::WorkspaceSettings;
use crate::event::EventCallback;
use crate::session::{SessionCore, SessionKind};

/// A live file-editor session
pub struct FileEditorProcess {
    core: SessionCore,
}

impl FileEditorProcess {
    /// Construct an uninitialized file-editor process
    pub fn new(cwd: PathBuf, on_event: EventCallback) -> Self {
        Self {
            core: SessionCore::new(SessionKind::FileEditor, cwd, on_event),
        }
    }

    /// Report the outcome of a file operation performed by the caller
    /// (e.g. save, rename, delete)
    pub async fn send_result(&self, result: Value) {
        self.core
            .emit("result", "operation", json!({ "result": result }))
            .await;
    }

    /// Deliver raw file contents to the observers
    pub async fn send_file_content(&self, path: impl AsRef<Path>, content: impl Into<String>) {
        self.core
            .emit(
                "content",
                "file",
                json!({
                    "path": path.as_ref().display().to_string(),
                    "content": content.into(),
                }),
            )
            .await;
    }

    /// Report an editor-side error without ending the session
    pub async fn send_error(&self, message: impl Into<String>) {
        self.core.send_error(message).await;
    }
}

#[async_trait]
impl SessionProcess for FileEditorProcess {
    fn kind(&self) -> SessionKind {
        SessionKind::FileEditor
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
        self.core.complete_initialize(json!({})).await;
        Ok(())
    }

    /// Acknowledge input without executing it.
    ///
    /// No editor command is carried over this channel yet; the acknowledgment
    /// keeps callers of the uniform adapter contract from special-casing
    /// this kind.
    async fn handle_input(&self, data: &[u8]) {
        let text = String::from_utf8_lossy(data).into_owned();
        self.core
            .emit("input", "received", json!({ "data": text }))
            .await;
    }

    async fn close(&self) {
        self.core.close().await;
    }

    async fn is_alive(&self) -> bool {
        self.core.is_active().await
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Factory for file-editor sessions
#[derive(Debug, Default)]
pub struct FileEditorAdapter {
    settings: WorkspaceSettings,
}

impl FileEditorAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adapter applying the workspace root as the cwd fallback
    pub fn with_settings(settings: WorkspaceSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl SessionAdapter for FileEditorAdapter {
    fn kind(&self) -> SessionKind {
        SessionKind::FileEditor
    }

    async fn create(&self, params: CreateParams) -> AdapterResult<SessionHandle> {
        let cwd = resolve_cwd(params.cwd.as_deref(), &self.settings)?;
        let process = Arc::new(FileEditorProcess::new(cwd, params.on_event));
        SessionHandle::start(process).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::SessionEvent;
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
    async fn test_create_emits_initialized_with_cwd() {
        let (callback, events) = collecting_callback();
        let adapter = FileEditorAdapter::new();
        let handle = adapter
            .create(CreateParams::new(callback).with_cwd("/tmp"))
            .await
            .unwrap();

        {
            let events = events.lock().unwrap();
            assert_eq!(events.len(), 1);
            assert_eq!(events[0].channel, "file-editor:system");
            assert_eq!(events[0].event_type, "initialized");
            assert_eq!(events[0].payload["cwd"], "/tmp");
        }
        assert_eq!(handle.cwd(), Path::new("/tmp"));
        assert!(handle.is_alive().await);

        handle.close().await;
    }

    #[tokio::test]
    async fn test_settings_root_used_when_cwd_absent() {
        let (callback, _events) = collecting_callback();
        let adapter = FileEditorAdapter::with_settings(WorkspaceSettings {
            root: Some(PathBuf::from("/tmp")),
            ..Default::default()
        });
        let handle = adapter.create(CreateParams::new(callback)).await.unwrap();

        assert_eq!(handle.cwd(), Path::new("/tmp"));
        handle.close().await;
    }

    #[tokio::test]
    async fn test_input_is_acknowledged_not_executed() {
        let (callback, events) = collecting_callback();
        let process = FileEditorProcess::new(PathBuf::from("/tmp"), callback);
        process.initialize().await.unwrap();

        process.handle_input(b"open src/main.rs").await;

        let events = events.lock().unwrap();
        let ack = events.last().unwrap();
        assert_eq!(ack.channel, "file-editor:input");
        assert_eq!(ack.event_type, "received");
        assert_eq!(ack.payload["data"], "open src/main.rs");
        assert!(ack.payload["timestamp"].is_i64());
    }

    #[tokio::test]
    async fn test_no_ack_while_inactive() {
        let (callback, events) = collecting_callback();
        let process = FileEditorProcess::new(PathBuf::from("/tmp"), callback);

        process.handle_input(b"too early").await;
        assert!(events.lock().unwrap().is_empty());

        process.initialize().await.unwrap();
        process.close().await;
        let count = events.lock().unwrap().len();

        process.handle_input(b"too late").await;
        assert_eq!(events.lock().unwrap().len(), count);
    }

    #[tokio::test]
    async fn test_emitters_deliver_in_call_order() {
        let (callback, events) = collecting_callback();
        let process = FileEditorProcess::new(PathBuf::from("/tmp"), callback);
        process.initialize().await.unwrap();

        process.send_result(json!({ "saved": "a.txt" })).await;
        process.send_file_content("a.txt", "contents").await;
        process.send_error("disk full").await;
        process.send_result(json!({ "saved": "b.txt" })).await;

        let events = events.lock().unwrap();
        let sequence: Vec<(&str, &str)> = events
            .iter()
            .skip(1)
            .map(|e| (e.channel.as_str(), e.event_type.as_str()))
            .collect();
        assert_eq!(
            sequence,
            vec![
                ("file-editor:result", "operation"),
                ("file-editor:content", "file"),
                ("file-editor:error", "error"),
                ("file-editor:result", "operation"),
            ]
        );
        assert_eq!(events[2].payload["path"], "a.txt");
        assert_eq!(events[2].payload["content"], "contents");
    }

    #[tokio::test]
    async fn test_emitters_silent_after_close() {
        let (callback, events) = collecting_callback();
        let process = FileEditorProcess::new(PathBuf::from("/tmp"), callback);
        process.initialize().await.unwrap();
        process.close().await;
        let count = events.lock().unwrap().len();

        process.send_result(json!({})).await;
        process.send_file_content("x", "y").await;
        process.send_error("late").await;
        assert_eq!(events.lock().unwrap().len(), count);
    }

    #[tokio::test]
    async fn test_escape_hatch_downcast() {
        let (callback, events) = collecting_callback();
        let adapter = FileEditorAdapter::new();
        let handle = adapter
            .create(CreateParams::new(callback).with_cwd("/tmp"))
            .await
            .unwrap();

        let editor = handle
            .process()
            .as_any()
            .downcast_ref::<FileEditorProcess>()
            .expect("file-editor process");
        editor.send_file_content("note.md", "# hi").await;

        let events = events.lock().unwrap();
        assert_eq!(events.last().unwrap().channel, "file-editor:content");
    }
}
