//! Headless reference engine
//!
//! Binds a `PtyProcess`, runs its output through a VTE parser and keeps a
//! plain-text transcript instead of a character grid. OSC 0/2 sequences are
//! surfaced as `TitleChanged` notifications. Hosts that render their own
//! grid can use it as-is and read `take_display` each frame.

use super::{EngineEvent, EventSender, ProcessId, PtyProcess, StartRequest, TerminalEngine};
use crate::error::SpawnError;
use crate::theme::{AppearanceUpdate, CursorConfig, FontSpec, Palette, SelectionStyle};
use std::io;
use std::sync::mpsc::TryRecvError;
use std::time::Duration;
use vte::{Parser, Perform};

/// Past this many bytes the transcript is cut back to half its size in one step
const MAX_TRANSCRIPT_BYTES: usize = 256 * 1024;

/// Undisplayed text is bounded the same way when the host never takes it
const MAX_PENDING_BYTES: usize = 64 * 1024;

/// Drop the oldest text so at most `keep` bytes remain, on a char boundary
fn trim_front(text: &mut String, keep: usize) {
    let excess = text.len().saturating_sub(keep);
    let cut = (excess..=text.len())
        .find(|&i| text.is_char_boundary(i))
        .unwrap_or(text.len());
    text.drain(..cut);
}

/// VTE performer that keeps printable text and the window title
#[derive(Default)]
struct Transcript {
    text: String,
    /// Text not yet handed to the host
    pending: String,
    title: Option<String>,
    trims: usize,
}

impl Transcript {
    fn push(&mut self, c: char) {
        self.text.push(c);
        self.pending.push(c);
        if self.text.len() > MAX_TRANSCRIPT_BYTES {
            trim_front(&mut self.text, MAX_TRANSCRIPT_BYTES / 2);
            self.trims += 1;
        }
        if self.pending.len() > MAX_PENDING_BYTES {
            trim_front(&mut self.pending, MAX_PENDING_BYTES / 2);
        }
    }
}

impl Perform for Transcript {
    fn print(&mut self, c: char) {
        self.push(c);
    }

    fn execute(&mut self, byte: u8) {
        match byte {
            b'\n' => self.push('\n'),
            b'\t' => self.push('\t'),
            _ => {}
        }
    }

    fn osc_dispatch(&mut self, params: &[&[u8]], _bell_terminated: bool) {
        // OSC 0 sets icon name and title, OSC 2 the title alone
        if let [kind, rest @ ..] = params
            && (*kind == b"0" || *kind == b"2")
            && !rest.is_empty()
        {
            let title = rest.join(&b';');
            self.title = Some(String::from_utf8_lossy(&title).into_owned());
        }
    }
}

/// Appearance groups the engine has been configured with so far
#[derive(Debug, Default, Clone, PartialEq)]
pub struct AppearanceState {
    pub font: Option<FontSpec>,
    pub palette: Option<Palette>,
    pub cursor: Option<CursorConfig>,
    pub selection: Option<SelectionStyle>,
}

impl AppearanceState {
    /// Overwrite only the groups present in `update`
    fn merge(&mut self, update: &AppearanceUpdate) {
        if let Some(font) = &update.font {
            self.font = Some(font.clone());
        }
        if let Some(palette) = &update.palette {
            self.palette = Some(palette.clone());
        }
        if let Some(cursor) = update.cursor {
            self.cursor = Some(cursor);
        }
        if let Some(selection) = update.selection {
            self.selection = Some(selection);
        }
    }
}

/// Reference `TerminalEngine` backed by a real PTY
pub struct HeadlessEngine {
    events: EventSender,
    process: Option<PtyProcess>,
    parser: Parser,
    transcript: Transcript,
    appearance: AppearanceState,
    size: (u16, u16),
    redraw_pending: bool,
}

impl HeadlessEngine {
    pub fn new(events: EventSender, cols: u16, rows: u16) -> Self {
        Self {
            events,
            process: None,
            parser: Parser::new(),
            transcript: Transcript::default(),
            appearance: AppearanceState::default(),
            size: (cols, rows),
            redraw_pending: false,
        }
    }

    /// Drain available shell output through the parser.
    ///
    /// Non-blocking. Returns false once there is no live process to read from.
    pub fn process_output(&mut self) -> bool {
        let Some(process) = &self.process else {
            return false;
        };

        let mut chunks = Vec::new();
        let mut alive = true;
        loop {
            match process.receiver.try_recv() {
                Ok(data) => chunks.push(data),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    alive = false;
                    break;
                }
            }
        }

        for data in chunks {
            self.process_bytes(&data);
        }
        alive
    }

    fn process_bytes(&mut self, bytes: &[u8]) {
        let previous_title = self.transcript.title.clone();
        for &byte in bytes {
            self.parser.advance(&mut self.transcript, byte);
        }
        if !bytes.is_empty() {
            self.redraw_pending = true;
        }
        if self.transcript.title != previous_title
            && let Some(title) = self.transcript.title.clone()
        {
            let _ = self.events.send(EngineEvent::TitleChanged(title));
        }
    }

    /// Full retained transcript
    pub fn transcript(&self) -> &str {
        &self.transcript.text
    }

    /// Text produced since the last call
    pub fn take_display(&mut self) -> String {
        std::mem::take(&mut self.transcript.pending)
    }

    /// Whether a repaint was requested since the last call
    pub fn take_redraw(&mut self) -> bool {
        std::mem::take(&mut self.redraw_pending)
    }

    pub fn title(&self) -> Option<&str> {
        self.transcript.title.as_deref()
    }

    pub fn appearance(&self) -> &AppearanceState {
        &self.appearance
    }

    pub fn size(&self) -> (u16, u16) {
        self.size
    }

    pub fn pid(&self) -> Option<ProcessId> {
        self.process.as_ref().map(PtyProcess::pid)
    }
}

impl TerminalEngine for HeadlessEngine {
    fn feed(&mut self, text: &str) {
        for c in text.chars().filter(|&c| c != '\r') {
            self.transcript.push(c);
        }
        self.redraw_pending = true;
    }

    fn start_process(&mut self, request: &StartRequest) -> Result<ProcessId, SpawnError> {
        if self.process.as_ref().is_some_and(|p| !p.has_exited()) {
            return Err(SpawnError::AlreadyRunning);
        }

        let process = PtyProcess::spawn(request, self.events.clone())?;
        self.size = (request.cols, request.rows);
        let pid = process.pid();
        self.parser = Parser::new();
        self.process = Some(process);
        Ok(pid)
    }

    fn configure_appearance(&mut self, update: &AppearanceUpdate) {
        if update.is_empty() {
            return;
        }
        self.appearance.merge(update);
        self.redraw_pending = true;
    }

    fn request_redraw(&mut self) {
        self.redraw_pending = true;
    }

    fn write_input(&mut self, bytes: &[u8]) -> io::Result<()> {
        match &mut self.process {
            Some(process) => process.write(bytes).map(|_| ()),
            None => Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "no shell bound to surface",
            )),
        }
    }

    fn resize(&mut self, cols: u16, rows: u16) {
        self.size = (cols, rows);
        if let Some(process) = &mut self.process
            && let Err(e) = process.resize(cols, rows)
        {
            tracing::warn!(error = %e, "failed to resize pty");
        }
        let _ = self.events.send(EngineEvent::SizeChanged { cols, rows });
    }

    fn terminate(&mut self, pid: ProcessId, grace: Duration) -> bool {
        match &self.process {
            Some(process) if process.pid() == pid => process.terminate(grace),
            _ => true,
        }
    }
}
