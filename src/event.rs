//! Session event channel
//!
//! Every running session reports structured events to its owner through a
//! single stored callback. Delivery is a direct synchronous invocation in
//! emission order; there is no intermediate queue and no backpressure.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// A single tagged event emitted by a session process.
///
/// `channel` is a `<kind>:<category>` tag (e.g. `terminal:system`,
/// `web-view:navigation`), `event_type` names the specific occurrence
/// (`initialized`, `closed`, `url-changed`, ...), and `payload` carries the
/// kind- and type-specific fields, including a millisecond timestamp where
/// applicable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionEvent {
    /// Channel tag, `<kind>:<category>`
    pub channel: String,
    /// Event type within the channel
    #[serde(rename = "type")]
    pub event_type: String,
    /// Type-specific payload
    pub payload: Value,
}

impl SessionEvent {
    /// Create a new event record
    pub fn new(
        channel: impl Into<String>,
        event_type: impl Into<String>,
        payload: Value,
    ) -> Self {
        Self {
            channel: channel.into(),
            event_type: event_type.into(),
            payload,
        }
    }
}

/// Callback through which all session output flows.
///
/// Supplied by the owner at creation time, held by the process for its whole
/// lifetime, and never invoked again once the process reports inactive.
/// Invocation happens while the session holds its state lock, so the
/// callback must not call back into the session that emitted the event.
pub type EventCallback = Arc<dyn Fn(SessionEvent) + Send + Sync>;

/// Guarded wrapper around the owner-supplied callback.
///
/// The callback crosses the ownership boundary, so it is treated as
/// potentially panicking: a failure is logged and never propagated into
/// session state.
#[derive(Clone)]
pub struct EventSink {
    callback: EventCallback,
}

impl EventSink {
    /// Wrap an owner-supplied callback
    pub fn new(callback: EventCallback) -> Self {
        Self { callback }
    }

    /// Deliver one event to the owner.
    ///
    /// A panicking observer must not crash the session; the panic is caught
    /// and reported on the log channel instead.
    pub fn emit(&self, event: SessionEvent) {
        let channel = event.channel.clone();
        let event_type = event.event_type.clone();
        if catch_unwind(AssertUnwindSafe(|| (self.callback)(event))).is_err() {
            warn!(
                "event callback panicked while handling {} {}",
                channel, event_type
            );
        }
    }
}

impl std::fmt::Debug for EventSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSink").finish_non_exhaustive()
    }
}

/// Current time as epoch milliseconds, used for event payload timestamps
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn collecting_sink() -> (EventSink, Arc<Mutex<Vec<SessionEvent>>>) {
        let events: Arc<Mutex<Vec<SessionEvent>>> = Arc::new(Mutex::new(Vec::new()));
        let events_clone = Arc::clone(&events);
        let sink = EventSink::new(Arc::new(move |evt| {
            events_clone.lock().unwrap().push(evt);
        }));
        (sink, events)
    }

    #[test]
    fn test_emit_delivers_in_order() {
        let (sink, events) = collecting_sink();

        for i in 0..5 {
            sink.emit(SessionEvent::new(
                "test:result",
                "operation",
                serde_json::json!({ "seq": i }),
            ));
        }

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 5);
        for (i, evt) in events.iter().enumerate() {
            assert_eq!(evt.payload["seq"], i);
        }
    }

    #[test]
    fn test_panicking_callback_is_contained() {
        let sink = EventSink::new(Arc::new(|_| panic!("misbehaving observer")));

        // Must not propagate
        sink.emit(SessionEvent::new("test:system", "initialized", Value::Null));
        sink.emit(SessionEvent::new("test:system", "closed", Value::Null));
    }

    #[test]
    fn test_event_serializes_type_field() {
        let evt = SessionEvent::new(
            "terminal:system",
            "initialized",
            serde_json::json!({ "cwd": "/tmp" }),
        );
        let json = serde_json::to_value(&evt).unwrap();
        assert_eq!(json["channel"], "terminal:system");
        assert_eq!(json["type"], "initialized");
        assert_eq!(json["payload"]["cwd"], "/tmp");
    }

    #[test]
    fn test_now_ms_is_plausible() {
        // 2020-01-01 in epoch millis
        assert!(now_ms() > 1_577_836_800_000);
    }
}
