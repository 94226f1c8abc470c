//! Shell process supervision
//!
//! Starts the resolved shell on a session's surface, greets the user, and
//! turns engine notifications into session state and advisory text. Exit is
//! final: the supervisor never restarts a shell on its own.

use crate::engine::{EngineEvent, ProcessId, StartRequest, TerminalEngine};
use crate::error::SpawnError;
use crate::session::Session;
use crate::shell::ResolvedShell;
use std::time::{Duration, SystemTime};

/// Trailer appended to every termination message
pub const RESTART_HINT: &str = "[Press Enter to start a new session]";

/// Running shell bound to a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessHandle {
    pub pid: ProcessId,
    pub started_at: SystemTime,
}

/// One process's end of life
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminationReport {
    /// `None` when the process was killed or its status is unknown
    pub exit_code: Option<i32>,
    pub at: SystemTime,
}

impl TerminationReport {
    pub fn new(exit_code: Option<i32>) -> Self {
        Self {
            exit_code,
            at: SystemTime::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Text shown in the surface once the shell is gone
    pub fn advisory_text(&self) -> String {
        let status = match self.exit_code {
            Some(0) => "[Process completed successfully]".to_string(),
            Some(code) => format!("[Process exited with code {code}]"),
            None => "[Process terminated abnormally (exit code unknown)]".to_string(),
        };
        format!("\r\n{status}\r\n{RESTART_HINT}\r\n")
    }
}

/// What handling an engine event changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorEvent {
    Terminated(TerminationReport),
    Resized { cols: u16, rows: u16 },
    TitleChanged(String),
    /// Report for a process this session no longer owns
    Ignored,
}

#[derive(Debug)]
pub struct ProcessSupervisor {
    app_name: String,
}

impl ProcessSupervisor {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
        }
    }

    /// Spawn `shell` on the session's surface.
    ///
    /// The welcome line is fed before this returns, so it precedes any input
    /// the host can forward. On failure the error is fed once as advisory
    /// text and the session is left without a process.
    pub fn start<E: TerminalEngine>(
        &self,
        session: &mut Session,
        engine: &mut E,
        shell: &ResolvedShell,
    ) -> Result<ProcessHandle, SpawnError> {
        if session.process().is_some() {
            return Err(SpawnError::AlreadyRunning);
        }

        let (cols, rows) = session.grid_size();
        let request = StartRequest {
            executable: shell.executable.clone(),
            args: shell.args.clone(),
            environment: shell.environment.clone(),
            working_directory: shell.working_directory.clone(),
            exec_name: shell.exec_name.clone(),
            cols,
            rows,
        };

        match engine.start_process(&request) {
            Ok(pid) => {
                engine.feed(&self.welcome_text(shell));
                let handle = ProcessHandle {
                    pid,
                    started_at: SystemTime::now(),
                };
                session.bind_process(handle);
                tracing::info!(
                    session = %session.identity(),
                    %pid,
                    shell = %shell.executable.display(),
                    "shell started"
                );
                Ok(handle)
            }
            Err(e) => {
                tracing::warn!(session = %session.identity(), error = %e, "shell failed to start");
                engine.feed(&format!(
                    "\r\n[Failed to start {}: {e}]\r\n",
                    shell.executable.display()
                ));
                Err(e)
            }
        }
    }

    pub fn welcome_text(&self, shell: &ResolvedShell) -> String {
        format!(
            "Welcome to {}. Shell: {}\r\n",
            self.app_name,
            shell.executable.display()
        )
    }

    /// Apply one engine notification to the session
    pub fn handle_event<E: TerminalEngine>(
        &self,
        session: &mut Session,
        engine: &mut E,
        event: EngineEvent,
    ) -> SupervisorEvent {
        match event {
            EngineEvent::ProcessTerminated { pid, exit_code } => {
                if session.process().map(|p| p.pid) != Some(pid) {
                    tracing::debug!(session = %session.identity(), %pid, "ignoring exit of unowned process");
                    return SupervisorEvent::Ignored;
                }
                session.clear_process();

                let report = TerminationReport::new(exit_code);
                tracing::info!(session = %session.identity(), %pid, ?exit_code, "shell exited");
                engine.feed(&report.advisory_text());
                SupervisorEvent::Terminated(report)
            }
            EngineEvent::SizeChanged { cols, rows } => {
                session.set_grid_size((cols, rows));
                engine.request_redraw();
                SupervisorEvent::Resized { cols, rows }
            }
            EngineEvent::TitleChanged(title) => {
                tracing::debug!(session = %session.identity(), %title, "title changed");
                session.set_title(title.clone());
                SupervisorEvent::TitleChanged(title)
            }
        }
    }

    /// Hang up the running shell, waiting at most `grace` before killing it
    pub fn terminate<E: TerminalEngine>(
        &self,
        session: &mut Session,
        engine: &mut E,
        grace: Duration,
    ) -> bool {
        let Some(handle) = session.process() else {
            return true;
        };
        let exited = engine.terminate(handle.pid, grace);
        if !exited {
            tracing::warn!(session = %session.identity(), pid = %handle.pid, "shell still running after kill");
        }
        session.clear_process();
        exited
    }
}
