//! Shared lifecycle core for session processes
//!
//! Each process kind embeds a [`SessionCore`] that owns the working
//! directory, the lifecycle state and the event sink. All event emission
//! funnels through the core so the no-op-after-close guard holds uniformly.

use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde_json::{json, Map, Value};
use tracing::debug;
use uuid::Uuid;

use super::{SessionKind, SessionState};
use crate::event::{now_ms, EventCallback, EventSink, SessionEvent};

/// State, identity and event plumbing shared by every session kind.
///
/// The core is exclusively owned by its process and never shared across
/// sessions; concurrent sessions each hold their own core with no shared
/// mutable state between them.
///
/// The state lock is held across sink delivery, which serializes `close`
/// with every in-flight emission: once the `closed` event is out, no other
/// event can reach the observer. The callback therefore must not call back
/// into the session.
pub struct SessionCore {
    id: Uuid,
    kind: SessionKind,
    cwd: PathBuf,
    // Sync lock: sink delivery is synchronous and never awaits
    state: RwLock<SessionState>,
    sink: EventSink,
}

impl SessionCore {
    /// Create a core in the `Uninitialized` state
    pub fn new(kind: SessionKind, cwd: PathBuf, on_event: EventCallback) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            cwd,
            state: RwLock::new(SessionState::Uninitialized),
            sink: EventSink::new(on_event),
        }
    }

    /// Session identifier
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Session kind tag
    pub fn kind(&self) -> SessionKind {
        self.kind
    }

    /// Working directory, immutable for the session's lifetime
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Current lifecycle state
    pub async fn state(&self) -> SessionState {
        *self.read_state()
    }

    /// Whether the session is between a successful initialize and close
    pub async fn is_active(&self) -> bool {
        self.read_state().is_active()
    }

    // The sink contains observer panics, so the lock cannot poison
    fn read_state(&self) -> RwLockReadGuard<'_, SessionState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, SessionState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Channel tag for a category under this session's kind
    fn channel(&self, category: &str) -> String {
        format!("{}:{}", self.kind.as_str(), category)
    }

    /// Enter the `Initializing` state.
    ///
    /// Returns `false` if the session has already been initialized or
    /// closed, in which case the caller must not proceed.
    pub async fn begin_initialize(&self) -> bool {
        let mut state = self.write_state();
        if *state != SessionState::Uninitialized {
            return false;
        }
        *state = SessionState::Initializing;
        true
    }

    /// Complete initialization: flip to `Active` and emit the one
    /// `initialized` system event, carrying the resolved cwd, any
    /// kind-specific fields and a timestamp.
    pub async fn complete_initialize(&self, extra: Value) {
        let mut state = self.write_state();
        if *state != SessionState::Initializing {
            return;
        }
        *state = SessionState::Active;

        let mut payload = Map::new();
        payload.insert("sessionId".into(), json!(self.id.to_string()));
        payload.insert("cwd".into(), json!(self.cwd.display().to_string()));
        if let Value::Object(extra) = extra {
            for (k, v) in extra {
                payload.insert(k, v);
            }
        }
        payload.insert("timestamp".into(), json!(now_ms()));

        // Emitted under the write guard, so no other emission can precede
        // the initialized event
        self.sink.emit(SessionEvent::new(
            self.channel("system"),
            "initialized",
            Value::Object(payload),
        ));
        drop(state);
        debug!("session {} ({}) initialized", self.id, self.kind);
    }

    /// Abandon a failed initialization without emitting anything.
    ///
    /// The session lands in `Closed` so the half-built process can never be
    /// observed as alive.
    pub async fn abort_initialize(&self) {
        *self.write_state() = SessionState::Closed;
        debug!("session {} ({}) initialization aborted", self.id, self.kind);
    }

    /// Close the session.
    ///
    /// Flips `Active -> Closed` and emits the terminal `closed` system
    /// event. Returns `true` only on the first effective close so callers
    /// can tear down their backend exactly once; redundant calls are silent
    /// no-ops.
    ///
    /// The write guard is held across the emission, so close waits out any
    /// in-flight delivery and `closed` is the last event observed.
    pub async fn close(&self) -> bool {
        let mut state = self.write_state();
        if !state.is_active() {
            return false;
        }
        *state = SessionState::Closed;

        self.sink.emit(SessionEvent::new(
            self.channel("system"),
            "closed",
            json!({ "timestamp": now_ms() }),
        ));
        drop(state);
        debug!("session {} ({}) closed", self.id, self.kind);
        true
    }

    /// Emit an event on `<kind>:<category>` while Active; silent no-op
    /// otherwise. A timestamp is appended to object payloads.
    ///
    /// The active check and the delivery happen under one read guard, so a
    /// concurrent close cannot slip an event past the `closed` terminator.
    pub async fn emit(&self, category: &str, event_type: &str, payload: Value) {
        let state = self.read_state();
        if !state.is_active() {
            return;
        }
        let payload = match payload {
            Value::Object(mut map) => {
                map.entry("timestamp").or_insert_with(|| json!(now_ms()));
                Value::Object(map)
            }
            other => other,
        };
        self.sink
            .emit(SessionEvent::new(self.channel(category), event_type, payload));
    }

    /// Report an error on the session's error channel.
    ///
    /// Callable only while Active; the session stays alive afterwards, the
    /// caller decides whether to retry.
    pub async fn send_error(&self, message: impl Into<String>) {
        let message = message.into();
        debug!("session {} ({}) error: {}", self.id, self.kind, message);
        // The stack slot is part of the payload shape; no backtrace is
        // captured for session-level errors
        self.emit(
            "error",
            "error",
            json!({ "message": message, "stack": Value::Null }),
        )
        .await;
    }
}

impl std::fmt::Debug for SessionCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCore")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("cwd", &self.cwd)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn core_with_sink(kind: SessionKind) -> (SessionCore, Arc<Mutex<Vec<SessionEvent>>>) {
        let events: Arc<Mutex<Vec<SessionEvent>>> = Arc::new(Mutex::new(Vec::new()));
        let events_clone = Arc::clone(&events);
        let core = SessionCore::new(
            kind,
            PathBuf::from("/tmp"),
            Arc::new(move |evt| events_clone.lock().unwrap().push(evt)),
        );
        (core, events)
    }

    #[tokio::test]
    async fn test_initialized_event_is_first_and_carries_cwd() {
        let (core, events) = core_with_sink(SessionKind::FileEditor);

        assert!(core.begin_initialize().await);
        core.complete_initialize(json!({ "readOnly": false })).await;
        core.emit("input", "received", json!({ "data": "x" })).await;

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].channel, "file-editor:system");
        assert_eq!(events[0].event_type, "initialized");
        assert_eq!(events[0].payload["cwd"], "/tmp");
        assert_eq!(events[0].payload["readOnly"], false);
        assert!(events[0].payload["timestamp"].is_i64());
    }

    #[tokio::test]
    async fn test_is_alive_strictly_between_initialize_and_close() {
        let (core, _events) = core_with_sink(SessionKind::Terminal);

        assert!(!core.is_active().await);
        assert!(core.begin_initialize().await);
        assert!(!core.is_active().await);
        core.complete_initialize(json!({})).await;
        assert!(core.is_active().await);
        assert!(core.close().await);
        assert!(!core.is_active().await);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (core, events) = core_with_sink(SessionKind::WebView);
        core.begin_initialize().await;
        core.complete_initialize(json!({})).await;

        assert!(core.close().await);
        assert!(!core.close().await);
        assert!(!core.close().await);

        let closed = events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.event_type == "closed")
            .count();
        assert_eq!(closed, 1);
    }

    #[tokio::test]
    async fn test_never_resurrected_after_close() {
        let (core, _events) = core_with_sink(SessionKind::Agent);
        core.begin_initialize().await;
        core.complete_initialize(json!({})).await;
        core.close().await;

        // A second initialize attempt must be rejected
        assert!(!core.begin_initialize().await);
        assert!(!core.is_active().await);
    }

    #[tokio::test]
    async fn test_emit_noops_when_inactive() {
        let (core, events) = core_with_sink(SessionKind::FileEditor);

        // Before initialize
        core.emit("result", "operation", json!({})).await;
        core.send_error("too early").await;
        assert!(events.lock().unwrap().is_empty());

        core.begin_initialize().await;
        core.complete_initialize(json!({})).await;
        core.close().await;
        let count = events.lock().unwrap().len();

        // After close
        core.emit("result", "operation", json!({})).await;
        core.send_error("too late").await;
        assert_eq!(events.lock().unwrap().len(), count);
    }

    #[tokio::test]
    async fn test_emission_order_preserved() {
        let (core, events) = core_with_sink(SessionKind::FileEditor);
        core.begin_initialize().await;
        core.complete_initialize(json!({})).await;

        core.emit("result", "operation", json!({ "seq": 0 })).await;
        core.emit("content", "file", json!({ "seq": 1 })).await;
        core.send_error("seq 2").await;
        core.emit("result", "operation", json!({ "seq": 3 })).await;

        let events = events.lock().unwrap();
        let types: Vec<&str> = events
            .iter()
            .skip(1) // initialized
            .map(|e| e.event_type.as_str())
            .collect();
        assert_eq!(types, vec!["operation", "file", "error", "operation"]);
    }

    #[tokio::test]
    async fn test_error_payload_shape() {
        let (core, events) = core_with_sink(SessionKind::WebView);
        core.begin_initialize().await;
        core.complete_initialize(json!({})).await;
        core.send_error("bad navigation").await;

        let events = events.lock().unwrap();
        let err = events.last().unwrap();
        assert_eq!(err.channel, "web-view:error");
        assert_eq!(err.payload["message"], "bad navigation");
        assert!(err.payload["timestamp"].is_i64());
        // The stack slot is always present, null when nothing was captured
        let fields = err.payload.as_object().unwrap();
        assert!(fields.contains_key("stack"));
        assert!(fields["stack"].is_null());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_closed_is_last_delivery_under_race() {
        let events: Arc<Mutex<Vec<SessionEvent>>> = Arc::new(Mutex::new(Vec::new()));
        let events_clone = Arc::clone(&events);
        let core = Arc::new(SessionCore::new(
            SessionKind::FileEditor,
            PathBuf::from("/tmp"),
            Arc::new(move |evt: SessionEvent| {
                // A slow observer widens the window between the active
                // check and the delivery
                if evt.event_type == "operation" {
                    std::thread::sleep(Duration::from_millis(400));
                }
                events_clone.lock().unwrap().push(evt);
            }),
        ));
        core.begin_initialize().await;
        core.complete_initialize(json!({})).await;

        let emitter = Arc::clone(&core);
        let emission = tokio::spawn(async move {
            emitter.emit("result", "operation", json!({})).await;
        });
        // Close while the emission is mid-delivery; it must wait it out
        tokio::time::sleep(Duration::from_millis(100)).await;
        core.close().await;
        emission.await.unwrap();

        let events = events.lock().unwrap();
        let types: Vec<&str> = events.iter().map(|e| e.event_type.as_str()).collect();
        assert_eq!(types, vec!["initialized", "operation", "closed"]);
    }

    #[tokio::test]
    async fn test_abort_initialize_lands_closed() {
        let (core, events) = core_with_sink(SessionKind::Terminal);
        core.begin_initialize().await;
        core.abort_initialize().await;

        assert_eq!(core.state().await, SessionState::Closed);
        assert!(events.lock().unwrap().is_empty());
    }
}
