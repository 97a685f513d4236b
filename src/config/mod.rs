//! Configuration module
//!
//! Workspace-level settings used as defaults when resolving a session's
//! working directory, environment and shell.

mod workspace;

pub use workspace::*;
