//! PTY backend module
//!
//! Spawns processes under pseudo-terminal emulation for the terminal and
//! agent session kinds. Uses portable-pty for cross-platform support.

mod process;

pub use process::*;
