//! Session adapter layer
//!
//! The uniform contract by which an orchestrator drives every session kind
//! identically: a factory (`SessionAdapter`) builds a kind-specific process,
//! waits for it to initialize, and returns a `SessionHandle` exposing
//! write/close/liveness/cwd regardless of what sits behind it.

mod contract;
mod registry;

pub use contract::*;
pub use registry::*;
