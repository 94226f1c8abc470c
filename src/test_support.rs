//! Recording doubles for the engine and host capabilities

use crate::engine::{ProcessId, StartRequest, TerminalEngine};
use crate::error::SpawnError;
use crate::host::{HostSurface, ResponderTarget, WindowHandle};
use crate::session::SessionId;
use crate::shell::ResolvedShell;
use crate::theme::AppearanceUpdate;
use std::ffi::OsString;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

pub fn test_shell() -> ResolvedShell {
    ResolvedShell {
        executable: PathBuf::from("/bin/bash"),
        args: vec!["-l".to_string()],
        exec_name: "-bash".to_string(),
        environment: [("HOME", "/home/ada"), ("TERM", "xterm-256color")]
            .into_iter()
            .map(|(k, v)| (OsString::from(k), OsString::from(v)))
            .collect(),
        working_directory: PathBuf::from("/home/ada"),
    }
}

#[derive(Debug, Default)]
pub struct RecordingEngine {
    pub fed: Vec<String>,
    pub starts: Vec<StartRequest>,
    pub appearance_updates: Vec<AppearanceUpdate>,
    pub inputs: Vec<Vec<u8>>,
    pub resizes: Vec<(u16, u16)>,
    pub terminated: Vec<ProcessId>,
    pub redraws: usize,
    pub fail_spawn: bool,
    /// Order of calls, by kind
    pub log: Vec<&'static str>,
    next_pid: u32,
}

impl RecordingEngine {
    pub fn new() -> Self {
        Self {
            next_pid: 1000,
            ..Default::default()
        }
    }
}

impl TerminalEngine for RecordingEngine {
    fn feed(&mut self, text: &str) {
        self.log.push("feed");
        self.fed.push(text.to_string());
    }

    fn start_process(&mut self, request: &StartRequest) -> Result<ProcessId, SpawnError> {
        self.log.push("start");
        self.starts.push(request.clone());
        if self.fail_spawn {
            return Err(SpawnError::Exec {
                executable: request.executable.clone(),
                source: nix::Error::EACCES,
            });
        }
        self.next_pid += 1;
        Ok(ProcessId(self.next_pid))
    }

    fn configure_appearance(&mut self, update: &AppearanceUpdate) {
        self.log.push("appearance");
        self.appearance_updates.push(update.clone());
    }

    fn request_redraw(&mut self) {
        self.redraws += 1;
    }

    fn write_input(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.log.push("input");
        self.inputs.push(bytes.to_vec());
        Ok(())
    }

    fn resize(&mut self, cols: u16, rows: u16) {
        self.resizes.push((cols, rows));
    }

    fn terminate(&mut self, pid: ProcessId, _grace: Duration) -> bool {
        self.terminated.push(pid);
        true
    }
}

#[derive(Debug)]
pub struct FakeHost {
    pub window: Option<WindowHandle>,
    /// Whether `designate_responder` succeeds when a window exists
    pub accept: bool,
    pub designations: Vec<ResponderTarget>,
    pub log: Vec<&'static str>,
}

impl FakeHost {
    pub fn with_window() -> Self {
        Self {
            window: Some(WindowHandle(1)),
            accept: true,
            designations: Vec::new(),
            log: Vec::new(),
        }
    }

    pub fn without_window() -> Self {
        Self {
            window: None,
            ..Self::with_window()
        }
    }
}

impl HostSurface for FakeHost {
    fn attached_window(&self) -> Option<WindowHandle> {
        self.window
    }

    fn designate_responder(&mut self, target: ResponderTarget) -> bool {
        self.log.push("designate");
        self.designations.push(target);
        self.accept && self.window.is_some()
    }

    fn attach_surface(&mut self, _session: SessionId) -> bool {
        self.log.push("attach");
        self.window.is_some()
    }
}
