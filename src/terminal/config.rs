//! Terminal configuration resolution
//!
//! Pure value-object resolver consumed when constructing a terminal session:
//! working directory with tilde expansion, dimensions, terminal type,
//! layered environment, shell selection, and platform passthrough fields.
//! No I/O happens here beyond reading the ambient environment.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::adapter::{AdapterError, AdapterResult};
use crate::config::{expand_tilde, workspace_root_from_env, WorkspaceSettings};
use crate::pty::{PtyCommand, WindowSize};

/// Default terminal type reported to the spawned shell
pub const DEFAULT_TERM: &str = "xterm-256color";

/// Prompt injected when no `PS1` survives environment layering, so shells
/// without profile scripts still show a prompt
pub const DEFAULT_PROMPT: &str = "\\u@\\h:\\w\\$ ";

/// Caller-supplied terminal options, all optional
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TerminalOptions {
    /// Working directory, may start with `~/`
    pub cwd: Option<String>,
    /// Terminal columns
    pub cols: Option<u16>,
    /// Terminal rows
    pub rows: Option<u16>,
    /// Terminal type name (`TERM`)
    pub term: Option<String>,
    /// Shell executable
    pub shell: Option<String>,
    /// Shell argument list
    pub shell_args: Option<Vec<String>>,
    /// Session-specific environment overrides (highest precedence)
    pub env: HashMap<String, String>,
    /// Workspace-level environment overrides
    pub workspace_env: HashMap<String, String>,
    /// POSIX user id for the spawned process, passed through unmodified
    pub uid: Option<u32>,
    /// POSIX group id for the spawned process, passed through unmodified
    pub gid: Option<u32>,
    /// Windows ConPTY emulation flag, passed through unmodified
    pub use_conpty: Option<bool>,
}

/// Fully resolved terminal configuration
#[derive(Debug, Clone)]
pub struct TerminalConfig {
    pub cwd: PathBuf,
    pub cols: u16,
    pub rows: u16,
    pub term: String,
    pub shell: String,
    pub shell_args: Vec<String>,
    /// Effective environment: ambient < workspace overrides < session
    /// overrides, with `TERM` and a default `PS1` applied
    pub env: HashMap<String, String>,
    pub uid: Option<u32>,
    pub gid: Option<u32>,
    pub use_conpty: Option<bool>,
}

/// Logging-safe projection of a terminal configuration.
///
/// Omits the environment map, which may carry secrets, while keeping the
/// path, dimension and shell metadata.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedactedTerminalConfig {
    pub cwd: PathBuf,
    pub cols: u16,
    pub rows: u16,
    pub term: String,
    pub shell: String,
    pub shell_args: Vec<String>,
    /// Number of environment entries withheld
    pub env_entries: usize,
}

impl TerminalConfig {
    /// Resolve options against workspace settings and an optional explicit
    /// working directory.
    ///
    /// cwd precedence: options > explicit parameter > workspace root (from
    /// settings or `WORKBENCH_WORKSPACE_ROOT`) > home directory.
    pub fn resolve(
        options: &TerminalOptions,
        workspace: &WorkspaceSettings,
        explicit_cwd: Option<&Path>,
    ) -> AdapterResult<Self> {
        let cwd = options
            .cwd
            .as_deref()
            .map(expand_tilde)
            .or_else(|| explicit_cwd.map(|p| expand_tilde(&p.to_string_lossy())))
            .or_else(|| workspace.root.clone())
            .or_else(workspace_root_from_env)
            .or_else(dirs::home_dir)
            .ok_or_else(|| {
                AdapterError::WorkingDirectory(
                    "no cwd, workspace root, or home directory available".to_string(),
                )
            })?;

        let cols = options.cols.unwrap_or(80);
        let rows = options.rows.unwrap_or(24);

        // Layer the environment in increasing precedence
        let mut env: HashMap<String, String> = std::env::vars().collect();
        for (k, v) in &workspace.env {
            env.insert(k.clone(), v.clone());
        }
        for (k, v) in &options.workspace_env {
            env.insert(k.clone(), v.clone());
        }
        for (k, v) in &options.env {
            env.insert(k.clone(), v.clone());
        }

        // Terminal type: the dedicated option, then a TERM set in any
        // override layer (highest first), then the default. Ambient TERM
        // does not carry over.
        let term = options
            .term
            .clone()
            .or_else(|| {
                [&options.env, &options.workspace_env, &workspace.env]
                    .into_iter()
                    .find_map(|layer| layer.get("TERM"))
                    .filter(|t| !t.is_empty())
                    .cloned()
            })
            .unwrap_or_else(|| DEFAULT_TERM.to_string());
        env.insert("TERM".to_string(), term.clone());
        if !env.get("PS1").is_some_and(|v| !v.is_empty()) {
            env.insert("PS1".to_string(), DEFAULT_PROMPT.to_string());
        }

        let shell = options
            .shell
            .clone()
            .or_else(|| workspace.shell.clone())
            .or_else(|| std::env::var("SHELL").ok().filter(|s| !s.is_empty()))
            .unwrap_or_else(|| default_shell().to_string());
        let shell_args = options
            .shell_args
            .clone()
            .or_else(|| {
                (!workspace.shell_args.is_empty()).then(|| workspace.shell_args.clone())
            })
            .unwrap_or_else(default_shell_args);

        Ok(Self {
            cwd,
            cols,
            rows,
            term,
            shell,
            shell_args,
            env,
            uid: options.uid,
            gid: options.gid,
            use_conpty: options.use_conpty,
        })
    }

    /// Projection safe to log: everything except the environment
    pub fn redacted(&self) -> RedactedTerminalConfig {
        RedactedTerminalConfig {
            cwd: self.cwd.clone(),
            cols: self.cols,
            rows: self.rows,
            term: self.term.clone(),
            shell: self.shell.clone(),
            shell_args: self.shell_args.clone(),
            env_entries: self.env.len(),
        }
    }

    /// Describe the shell invocation for the PTY backend.
    ///
    /// The resolved environment replaces the inherited one so that layering
    /// precedence holds exactly.
    pub fn to_command(&self) -> PtyCommand {
        PtyCommand::new(&self.shell, &self.cwd)
            .args(self.shell_args.iter().cloned())
            .env(self.env.clone())
            .clear_env(true)
            .size(WindowSize::new(self.cols, self.rows))
    }
}

/// Platform fallback shell when nothing is configured
fn default_shell() -> &'static str {
    if cfg!(windows) {
        "powershell.exe"
    } else {
        "/bin/sh"
    }
}

/// Default invocation arguments: interactive on POSIX platforms
fn default_shell_args() -> Vec<String> {
    if cfg!(windows) {
        Vec::new()
    } else {
        vec!["-i".to_string()]
    }
}
