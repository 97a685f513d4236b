//! Unified run-session adapter layer
//!
//! A small family of session adapters — terminal, file-editor, web-view and
//! agent — that each wrap a long-lived stateful backend, normalize it behind
//! a single write/close/cwd/liveness contract, and report output as a tagged
//! event stream to the owner-supplied callback.
//!
//! The orchestrator that routes sessions to clients sits above this crate;
//! here live the adapter contract, the event channel, and the lifecycle
//! state machine every session kind shares.

pub mod adapter;
pub mod agent;
pub mod config;
pub mod editor;
pub mod event;
pub mod pty;
pub mod session;
pub mod terminal;
pub mod webview;

pub use adapter::{
    AdapterError, AdapterRegistry, AdapterResult, CreateParams, SessionAdapter, SessionHandle,
    SessionProcess,
};
pub use event::{EventCallback, SessionEvent};
pub use session::{SessionKind, SessionState};
