//! Terminal session lifecycle
//!
//! `Session` is the state of one embedded terminal pane. `SessionController`
//! ties it to an engine and a host and exposes `reconcile`, the entry point
//! the host UI calls on every refresh.

use crate::engine::{EventReceiver, TerminalEngine};
use crate::error::SessionError;
use crate::focus::{FocusCoordinator, FocusOutcome, FocusPolicy};
use crate::gate::{GateEntry, SessionInitGate};
use crate::host::HostSurface;
use crate::shell::{Environment, ResolvedShell, ShellResolver};
use crate::supervisor::{ProcessHandle, ProcessSupervisor, SupervisorEvent, TerminationReport};
use crate::theme::{AppearanceChanges, AppearanceConfig, ThemeApplicator};
use std::fmt;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::TryRecvError;
use std::time::{Duration, Instant};

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one host-visible terminal pane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    fn next() -> Self {
        Self(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// State of one terminal pane
#[derive(Debug)]
pub struct Session {
    identity: SessionId,
    initialized: bool,
    process: Option<ProcessHandle>,
    shell: Option<ResolvedShell>,
    appearance: Option<AppearanceConfig>,
    attached_to_host: bool,
    terminated: bool,
    title: Option<String>,
    grid_size: (u16, u16),
}

impl Session {
    pub fn new(grid_size: (u16, u16)) -> Self {
        Self {
            identity: SessionId::next(),
            initialized: false,
            process: None,
            shell: None,
            appearance: None,
            attached_to_host: false,
            terminated: false,
            title: None,
            grid_size,
        }
    }

    pub fn identity(&self) -> SessionId {
        self.identity
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn process(&self) -> Option<ProcessHandle> {
        self.process
    }

    /// Shell chosen at initialization
    pub fn shell(&self) -> Option<&ResolvedShell> {
        self.shell.as_ref()
    }

    pub fn environment(&self) -> Option<&Environment> {
        self.shell.as_ref().map(|shell| &shell.environment)
    }

    pub fn working_directory(&self) -> Option<&Path> {
        self.shell
            .as_ref()
            .map(|shell| shell.working_directory.as_path())
    }

    pub fn appearance(&self) -> Option<&AppearanceConfig> {
        self.appearance.as_ref()
    }

    pub fn is_attached(&self) -> bool {
        self.attached_to_host
    }

    /// True once a shell has ended and no new one was started
    pub fn has_terminated(&self) -> bool {
        self.terminated && self.process.is_none()
    }

    /// Last title the shell advertised
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn grid_size(&self) -> (u16, u16) {
        self.grid_size
    }

    /// Record the resolved shell and flip `initialized`; happens once
    pub(crate) fn mark_initialized(&mut self, shell: ResolvedShell) {
        debug_assert!(!self.initialized, "session initialized twice");
        self.shell = Some(shell);
        self.initialized = true;
    }

    pub(crate) fn bind_process(&mut self, handle: ProcessHandle) {
        self.process = Some(handle);
        self.terminated = false;
    }

    pub(crate) fn clear_process(&mut self) {
        if self.process.take().is_some() {
            self.terminated = true;
        }
    }

    pub(crate) fn set_appearance(&mut self, config: AppearanceConfig) {
        self.appearance = Some(config);
    }

    pub(crate) fn set_attached(&mut self, attached: bool) {
        self.attached_to_host = attached;
    }

    pub(crate) fn set_title(&mut self, title: String) {
        self.title = Some(title);
    }

    pub(crate) fn set_grid_size(&mut self, grid_size: (u16, u16)) {
        self.grid_size = grid_size;
    }
}

/// What a `reconcile` call did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciled {
    /// First call: shell resolved, surface attached, process started
    Initialized,
    /// Later call that changed some appearance groups
    Updated(AppearanceChanges),
    /// Later call with nothing to change
    Unchanged,
    /// Initialization failed earlier; the session stays inert
    Unavailable,
}

/// Construction options for a controller
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub app_name: String,
    pub grid_size: (u16, u16),
    pub focus: FocusPolicy,
    /// How long `dispose` waits for the shell to exit after hangup
    pub dispose_grace: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            app_name: "rustty".to_string(),
            grid_size: (80, 24),
            focus: FocusPolicy::default(),
            dispose_grace: Duration::from_millis(500),
        }
    }
}

/// Lifecycle controller for one embedded terminal session
pub struct SessionController<E: TerminalEngine, H: HostSurface> {
    session: Session,
    gate: SessionInitGate,
    resolver: ShellResolver,
    supervisor: ProcessSupervisor,
    focus: FocusCoordinator,
    theme: ThemeApplicator,
    engine: E,
    host: H,
    events: EventReceiver,
    dispose_grace: Duration,
    disposed: bool,
}

impl<E: TerminalEngine, H: HostSurface> SessionController<E, H> {
    /// Controller over the current process environment.
    ///
    /// `events` must be the receiving half of the channel the engine reports to.
    pub fn new(engine: E, host: H, events: EventReceiver, options: SessionOptions) -> Self {
        let resolver = ShellResolver::new(options.app_name.clone());
        Self::with_resolver(engine, host, events, resolver, options)
    }

    pub fn with_resolver(
        engine: E,
        host: H,
        events: EventReceiver,
        resolver: ShellResolver,
        options: SessionOptions,
    ) -> Self {
        Self {
            session: Session::new(options.grid_size),
            gate: SessionInitGate::new(),
            resolver,
            supervisor: ProcessSupervisor::new(options.app_name),
            focus: FocusCoordinator::new(options.focus),
            theme: ThemeApplicator::new(),
            engine,
            host,
            events,
            dispose_grace: options.dispose_grace,
            disposed: false,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn resolver(&self) -> &ShellResolver {
        &self.resolver
    }

    pub fn gate(&self) -> &SessionInitGate {
        &self.gate
    }

    pub fn is_focused(&self) -> bool {
        self.focus.is_focused()
    }

    /// Bring the session in line with `config`; safe to call on every refresh.
    ///
    /// The first call resolves the shell, applies the appearance, attaches the
    /// surface, marks the session initialized and only then starts the shell
    /// and asks for focus. Every later call only reapplies appearance.
    pub fn reconcile(&mut self, config: &AppearanceConfig) -> Result<Reconciled, SessionError> {
        if self.disposed {
            return Err(SessionError::Disposed);
        }

        let ticket = match self.gate.enter() {
            GateEntry::First(ticket) => ticket,
            GateEntry::Ready => {
                let changes = self.theme.apply(&mut self.session, &mut self.engine, config);
                return Ok(if changes.any() {
                    Reconciled::Updated(changes)
                } else {
                    Reconciled::Unchanged
                });
            }
            GateEntry::InProgress => {
                tracing::debug!(session = %self.session.identity(), "reconcile rejected, initialization in progress");
                return Err(SessionError::ReentrantInitialization);
            }
            GateEntry::Failed => return Ok(Reconciled::Unavailable),
        };

        let id = self.session.identity();
        tracing::debug!(session = %id, "initializing session");

        let shell = match self.resolver.resolve() {
            Ok(shell) => shell,
            Err(e) => {
                tracing::error!(session = %id, error = %e, "no shell available");
                ticket.fail();
                return Err(e);
            }
        };

        self.theme.apply(&mut self.session, &mut self.engine, config);
        if self.host.attach_surface(id) {
            self.session.set_attached(true);
        }
        self.session.mark_initialized(shell.clone());
        ticket.complete();

        // Focus is requested even when the shell fails to start
        let started = self
            .supervisor
            .start(&mut self.session, &mut self.engine, &shell);
        self.focus
            .request_focus(&self.session, &mut self.host, Instant::now());
        started?;

        Ok(Reconciled::Initialized)
    }

    /// The host reports the surface is now in a displayable window
    pub fn host_attached(&mut self) -> FocusOutcome {
        self.session.set_attached(true);
        let now = Instant::now();
        match self
            .focus
            .host_attached(&self.session, &mut self.host, now)
        {
            FocusOutcome::Idle if self.session.is_initialized() => {
                self.focus.request_focus(&self.session, &mut self.host, now)
            }
            outcome => outcome,
        }
    }

    pub fn host_detached(&mut self) {
        self.session.set_attached(false);
        self.focus.host_detached();
    }

    /// The host moved keyboard input away from this surface
    pub fn focus_lost(&mut self) {
        self.focus.focus_lost();
    }

    /// Ask for keyboard input, e.g. after a click on the surface
    pub fn request_focus(&mut self) -> FocusOutcome {
        self.focus
            .request_focus(&self.session, &mut self.host, Instant::now())
    }

    /// Drain engine notifications and run due focus retries.
    ///
    /// Returns the termination report if the shell ended during this pump.
    pub fn pump(&mut self, now: Instant) -> Option<TerminationReport> {
        let mut terminated = None;
        loop {
            match self.events.try_recv() {
                Ok(event) => {
                    if let SupervisorEvent::Terminated(report) =
                        self.supervisor
                            .handle_event(&mut self.session, &mut self.engine, event)
                    {
                        terminated = Some(report);
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    tracing::debug!(session = %self.session.identity(), "engine event channel closed");
                    break;
                }
            }
        }

        self.focus.poll(&self.session, &mut self.host, now);
        terminated
    }

    /// Forward user input to the shell.
    ///
    /// After the shell has exited, Enter starts a new one; other input is
    /// dropped. Input before initialization is dropped too.
    pub fn handle_input(&mut self, bytes: &[u8]) -> io::Result<()> {
        if self.session.process().is_some() {
            return self.engine.write_input(bytes);
        }

        if self.session.has_terminated() && bytes.contains(&b'\r') {
            if let Err(e) = self.restart() {
                tracing::warn!(session = %self.session.identity(), error = %e, "restart failed");
            }
        }
        Ok(())
    }

    /// Resize the grid; the engine reports the change back as a notification
    pub fn resize(&mut self, cols: u16, rows: u16) {
        if self.session.grid_size() != (cols, rows) {
            self.engine.resize(cols, rows);
        }
    }

    /// Start a new shell after the previous one exited.
    ///
    /// Reuses the shell, environment and working directory resolved at
    /// initialization.
    pub fn restart(&mut self) -> Result<ProcessHandle, SessionError> {
        if self.disposed {
            return Err(SessionError::Disposed);
        }
        let Some(shell) = self.session.shell().cloned() else {
            return Err(SessionError::NotInitialized);
        };
        tracing::info!(session = %self.session.identity(), "restarting shell");
        Ok(self
            .supervisor
            .start(&mut self.session, &mut self.engine, &shell)?)
    }

    /// Tear the session down: hang up the shell and wait a bounded grace period.
    ///
    /// Idempotent; also runs on drop.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        tracing::debug!(session = %self.session.identity(), "disposing session");
        self.supervisor
            .terminate(&mut self.session, &mut self.engine, self.dispose_grace);
        self.focus.host_detached();
    }
}

impl<E: TerminalEngine, H: HostSurface> Drop for SessionController<E, H> {
    fn drop(&mut self) {
        self.dispose();
    }
}
