//! Rustty Session - Embedded Terminal Session Lifecycle
//!
//! This library keeps a shell-backed terminal pane alive inside a host
//! window whose UI layer re-renders it at will:
//! - Shell resolution with fallback and login-shell environment (`shell`)
//! - PTY-backed process supervision with exit reporting (`supervisor`)
//! - Exactly-once session bring-up (`gate`)
//! - Focus requests deferred until the surface is in a window (`focus`)
//! - Appearance updates that never touch the running shell (`theme`)
//!
//! Terminal emulation and windowing are capabilities supplied by the host
//! through the `TerminalEngine` and `HostSurface` traits. `HeadlessEngine`
//! is a PTY-backed reference engine; `WinitHost` adapts a winit window.
//!
//! ## Quick Start
//!
//! ```no_run
//! use rustty_session::{
//!     AppearanceConfig, HeadlessEngine, HostSurface, ResponderTarget, SessionController,
//!     SessionOptions, WindowHandle, event_channel,
//! };
//! use std::time::Instant;
//!
//! struct Pane;
//!
//! impl HostSurface for Pane {
//!     fn attached_window(&self) -> Option<WindowHandle> {
//!         Some(WindowHandle(1))
//!     }
//!     fn designate_responder(&mut self, _target: ResponderTarget) -> bool {
//!         true
//!     }
//! }
//!
//! let (events, rx) = event_channel();
//! let engine = HeadlessEngine::new(events, 80, 24);
//! let mut controller = SessionController::new(engine, Pane, rx, SessionOptions::default());
//!
//! let config = AppearanceConfig::default();
//! loop {
//!     // Called on every UI refresh; only the first call starts the shell
//!     controller.reconcile(&config)?;
//!     controller.engine_mut().process_output();
//!     controller.pump(Instant::now());
//! #   break;
//! }
//! # Ok::<(), rustty_session::SessionError>(())
//! ```

pub mod color;
pub mod config;
pub mod engine;
pub mod error;
pub mod focus;
pub mod gate;
pub mod host;
pub mod logging;
pub mod session;
pub mod shell;
pub mod supervisor;
pub mod theme;

// Keyboard translation for winit hosts
#[cfg(feature = "host-winit")]
pub mod input;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used types
pub use color::Color;
pub use config::EmbedConfig;
pub use engine::{
    EngineEvent, EventReceiver, EventSender, HeadlessEngine, ProcessId, PtyProcess, StartRequest,
    TerminalEngine, event_channel,
};
pub use error::{ConfigError, SessionError, SpawnError};
pub use focus::{FocusCoordinator, FocusOutcome, FocusPolicy};
pub use gate::{GateState, SessionInitGate};
pub use host::{HostSurface, ResponderTarget, WindowHandle};
pub use session::{Reconciled, Session, SessionController, SessionId, SessionOptions};
pub use shell::{Environment, ResolvedShell, ShellCandidate, ShellResolver, UserInfo};
pub use supervisor::{ProcessHandle, ProcessSupervisor, TerminationReport};
pub use theme::{
    AppearanceChanges, AppearanceConfig, AppearanceUpdate, CursorBlink, CursorConfig, CursorShape,
    FontSpec, Palette, SelectionStyle, ThemeApplicator,
};

#[cfg(feature = "host-winit")]
pub use host::WinitHost;
