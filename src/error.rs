//! Error types for session bring-up
//!
//! Only failures that leave the host without a usable session are returned
//! as values. Everything that happens after initialization (process exit,
//! dropped focus requests) is reported as advisory text or a log line.

use std::path::PathBuf;

use thiserror::Error;

/// Failure to create the shell process bound to a session surface
#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("failed to open pty: {0}")]
    Pty(#[source] nix::Error),

    #[error("failed to fork shell process: {0}")]
    Fork(#[source] nix::Error),

    #[error("spawn argument contains an interior NUL byte: {0}")]
    InvalidArgument(#[from] std::ffi::NulError),

    #[error("failed to execute {}: {source}", executable.display())]
    Exec {
        executable: PathBuf,
        #[source]
        source: nix::Error,
    },

    #[error("a process is already bound to this surface")]
    AlreadyRunning,
}

/// Errors surfaced synchronously from `SessionController::reconcile`
#[derive(Debug, Error)]
pub enum SessionError {
    /// No shell candidate could be used; nothing was started
    #[error("no usable shell found (tried {tried} candidates)")]
    NoShellAvailable { tried: usize },

    /// The shell process could not be created
    #[error(transparent)]
    Spawn(#[from] SpawnError),

    /// First-time initialization was entered again before it finished
    #[error("session initialization is already in progress")]
    ReentrantInitialization,

    /// Restart was requested before the session was ever initialized
    #[error("session has not been initialized")]
    NotInitialized,

    /// The session was disposed and can no longer start processes
    #[error("session has been disposed")]
    Disposed,
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}
