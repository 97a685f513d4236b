//! PTY process backend
//!
//! Wraps a process spawned under a pseudo-terminal: window size control,
//! stdin writes, a take-once output stream fed by a reader thread, and kill.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, Mutex, RwLock};
use tracing::debug;

/// Errors that can occur during PTY operations
#[derive(Error, Debug)]
pub enum PtyError {
    #[error("Failed to open PTY: {0}")]
    OpenFailed(String),

    #[error("Failed to spawn process: {0}")]
    SpawnFailed(String),

    #[error("Failed to write to PTY: {0}")]
    WriteFailed(String),

    #[error("Failed to resize PTY: {0}")]
    ResizeFailed(String),

    #[error("Process already exited")]
    ProcessExited,

    #[error("PTY system error: {0}")]
    SystemError(String),
}

/// Result type for PTY operations
pub type PtyResult<T> = Result<T, PtyError>;

/// Window dimensions in character cells
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSize {
    pub cols: u16,
    pub rows: u16,
}

impl Default for WindowSize {
    fn default() -> Self {
        Self { cols: 80, rows: 24 }
    }
}

impl WindowSize {
    pub fn new(cols: u16, rows: u16) -> Self {
        Self { cols, rows }
    }

    fn to_pty_size(self) -> PtySize {
        PtySize {
            rows: self.rows,
            cols: self.cols,
            pixel_width: 0,
            pixel_height: 0,
        }
    }
}

/// Description of a process to run under a PTY
#[derive(Debug, Clone)]
pub struct PtyCommand {
    /// Executable to run
    pub program: String,
    /// Arguments
    pub args: Vec<String>,
    /// Working directory
    pub cwd: PathBuf,
    /// Environment entries set on the child (replacing nothing; entries are
    /// layered on top of whatever portable-pty inherits unless `clear_env`)
    pub env: HashMap<String, String>,
    /// Drop the inherited environment before applying `env`
    pub clear_env: bool,
    /// Initial window size
    pub size: WindowSize,
}

impl PtyCommand {
    /// Describe a command with default window size and inherited environment
    pub fn new(program: impl Into<String>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: cwd.into(),
            env: HashMap::new(),
            clear_env: false,
            size: WindowSize::default(),
        }
    }

    pub fn args(mut self, args: impl IntoIterator<Item = String>) -> Self {
        self.args.extend(args);
        self
    }

    pub fn env(mut self, env: HashMap<String, String>) -> Self {
        self.env = env;
        self
    }

    pub fn clear_env(mut self, clear: bool) -> Self {
        self.clear_env = clear;
        self
    }

    pub fn size(mut self, size: WindowSize) -> Self {
        self.size = size;
        self
    }
}

/// A process running under a pseudo-terminal.
///
/// Output is streamed through a channel filled by a dedicated reader thread;
/// the receiver is handed out once via [`PtyProcess::take_output`]. The
/// channel closing signals process exit (EOF on the master side).
pub struct PtyProcess {
    master: Arc<Mutex<Box<dyn MasterPty + Send>>>,
    writer: Arc<Mutex<Box<dyn Write + Send>>>,
    child: Arc<Mutex<Box<dyn Child + Send + Sync>>>,
    size: Arc<RwLock<WindowSize>>,
    output_rx: Mutex<Option<mpsc::Receiver<Vec<u8>>>>,
    shutdown_tx: broadcast::Sender<()>,
    exited: Arc<AtomicBool>,
}

impl PtyProcess {
    /// Spawn the described command under a new PTY
    pub fn spawn(command: &PtyCommand) -> PtyResult<Self> {
        let pty_system = native_pty_system();

        let pair = pty_system
            .openpty(command.size.to_pty_size())
            .map_err(|e| PtyError::OpenFailed(e.to_string()))?;

        let mut cmd = CommandBuilder::new(&command.program);
        cmd.args(&command.args);
        cmd.cwd(&command.cwd);
        if command.clear_env {
            cmd.env_clear();
        }
        for (key, value) in &command.env {
            cmd.env(key, value);
        }

        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| PtyError::SpawnFailed(e.to_string()))?;

        // Only the master side is needed from here on
        drop(pair.slave);

        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| PtyError::SystemError(e.to_string()))?;
        let writer = pair
            .master
            .take_writer()
            .map_err(|e| PtyError::SystemError(e.to_string()))?;

        let (output_tx, output_rx) = mpsc::channel(1024);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let exited = Arc::new(AtomicBool::new(false));

        let exited_clone = Arc::clone(&exited);
        std::thread::spawn(move || {
            Self::reader_loop(reader, output_tx, shutdown_rx, exited_clone);
        });

        debug!(
            "spawned {} in {} ({}x{})",
            command.program,
            command.cwd.display(),
            command.size.cols,
            command.size.rows
        );

        Ok(Self {
            master: Arc::new(Mutex::new(pair.master)),
            writer: Arc::new(Mutex::new(writer)),
            child: Arc::new(Mutex::new(child)),
            size: Arc::new(RwLock::new(command.size)),
            output_rx: Mutex::new(Some(output_rx)),
            shutdown_tx,
            exited,
        })
    }

    /// Reader loop running on its own thread; forwards chunks until EOF,
    /// error, or shutdown
    fn reader_loop(
        mut reader: Box<dyn Read + Send>,
        output_tx: mpsc::Sender<Vec<u8>>,
        mut shutdown_rx: broadcast::Receiver<()>,
        exited: Arc<AtomicBool>,
    ) {
        let mut buffer = [0u8; 4096];

        loop {
            match shutdown_rx.try_recv() {
                Ok(()) | Err(broadcast::error::TryRecvError::Closed) => break,
                Err(broadcast::error::TryRecvError::Empty)
                | Err(broadcast::error::TryRecvError::Lagged(_)) => {}
            }

            match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => {
                    if output_tx.blocking_send(buffer[..n].to_vec()).is_err() {
                        break;
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    std::thread::sleep(std::time::Duration::from_millis(10));
                }
                Err(_) => break,
            }
        }

        // Dropping output_tx closes the stream, which consumers read as exit
        exited.store(true, Ordering::SeqCst);
    }

    /// Take the output stream. Returns `None` after the first call.
    pub async fn take_output(&self) -> Option<mpsc::Receiver<Vec<u8>>> {
        self.output_rx.lock().await.take()
    }

    /// Whether the backing process has exited
    pub fn has_exited(&self) -> bool {
        self.exited.load(Ordering::SeqCst)
    }

    /// Current window size
    pub async fn size(&self) -> WindowSize {
        *self.size.read().await
    }

    /// Write bytes to the process stdin
    pub async fn write(&self, data: &[u8]) -> PtyResult<()> {
        if self.has_exited() {
            return Err(PtyError::ProcessExited);
        }

        let mut writer = self.writer.lock().await;
        writer
            .write_all(data)
            .map_err(|e| PtyError::WriteFailed(e.to_string()))?;
        writer
            .flush()
            .map_err(|e| PtyError::WriteFailed(e.to_string()))?;
        Ok(())
    }

    /// Resize the window
    pub async fn resize(&self, cols: u16, rows: u16) -> PtyResult<()> {
        if self.has_exited() {
            return Err(PtyError::ProcessExited);
        }

        let new_size = WindowSize::new(cols, rows);
        self.master
            .lock()
            .await
            .resize(new_size.to_pty_size())
            .map_err(|e| PtyError::ResizeFailed(e.to_string()))?;
        *self.size.write().await = new_size;
        Ok(())
    }

    /// Kill the process and stop the reader thread.
    ///
    /// Unconditional teardown: does not wait for pending output to drain.
    pub async fn kill(&self) {
        let _ = self.shutdown_tx.send(());
        if let Err(e) = self.child.lock().await.kill() {
            debug!("kill after exit: {}", e);
        }
        self.exited.store(true, Ordering::SeqCst);
    }
}

impl Drop for PtyProcess {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(());
    }
}

impl std::fmt::Debug for PtyProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PtyProcess").finish_non_exhaustive()
    }
}
