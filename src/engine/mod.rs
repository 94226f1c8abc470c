//! Terminal engine capability
//!
//! The character grid, VT parsing and rendering live behind the
//! `TerminalEngine` trait. The session core only feeds advisory text, binds
//! a process, pushes appearance updates and listens for `EngineEvent`s.
//!
//! Notifications are produced on the engine's own I/O threads and delivered
//! through an mpsc channel, so the controller consumes them on the UI thread
//! whenever it pumps.

pub mod headless;
pub mod pty;

pub use headless::HeadlessEngine;
pub use pty::PtyProcess;

use crate::error::SpawnError;
use crate::shell::Environment;
use crate::theme::AppearanceUpdate;
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::sync::mpsc::{Receiver, Sender, channel};
use std::time::Duration;

/// OS process id of a shell bound to a surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProcessId(pub u32);

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Everything needed to spawn one shell process into a pty
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartRequest {
    pub executable: PathBuf,
    pub args: Vec<String>,
    pub environment: Environment,
    /// Directory the child switches to before exec; the host's own cwd is untouched
    pub working_directory: PathBuf,
    /// argv[0] handed to the shell (`-zsh` for a login shell)
    pub exec_name: String,
    pub cols: u16,
    pub rows: u16,
}

/// Notifications an engine delivers back to the session controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// The bound process ended. `None` means the code is unknown (killed by a signal).
    ProcessTerminated {
        pid: ProcessId,
        exit_code: Option<i32>,
    },
    SizeChanged { cols: u16, rows: u16 },
    TitleChanged(String),
}

pub type EventSender = Sender<EngineEvent>;
pub type EventReceiver = Receiver<EngineEvent>;

/// Create the notification channel shared by an engine and its controller
pub fn event_channel() -> (EventSender, EventReceiver) {
    channel()
}

/// Capability surface of the terminal-emulation engine used by the core
pub trait TerminalEngine {
    /// Inject display-only text that did not come from the process
    fn feed(&mut self, text: &str);

    /// Spawn a process and bind it to this surface
    fn start_process(&mut self, request: &StartRequest) -> Result<ProcessId, SpawnError>;

    /// Apply the changed parts of the appearance; unchanged groups are `None`
    fn configure_appearance(&mut self, update: &AppearanceUpdate);

    /// Ask the surface to repaint on its next frame
    fn request_redraw(&mut self);

    /// Forward keyboard input to the bound process
    fn write_input(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Resize the grid and the pty window
    fn resize(&mut self, cols: u16, rows: u16);

    /// Hang up the process, escalating to a kill after `grace`.
    ///
    /// Returns true once the process is known to have exited.
    fn terminate(&mut self, pid: ProcessId, grace: Duration) -> bool;
}
