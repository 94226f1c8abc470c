//! Demo host: one terminal session embedded in a winit window.
//!
//! The host re-runs `reconcile` on every event it sees, the way a
//! declarative UI re-renders a view, and mirrors the session's text to
//! stdout instead of drawing a grid.

use anyhow::{Context as _, Result};
use clap::Parser;
use rustty_session::input::key_to_bytes;
use rustty_session::logging::{self, LogFormat};
use rustty_session::{
    EmbedConfig, HeadlessEngine, Reconciled, SessionController, SessionError, WinitHost,
    event_channel,
};
use std::io::Write as _;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use winit::application::ApplicationHandler;
use winit::event::{ElementState, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::ModifiersState;
use winit::window::{Window, WindowId};

const FRAME: Duration = Duration::from_millis(16);

#[derive(Debug, Parser)]
#[command(name = "rustty-embed", about = "Embedded terminal session demo host", version)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log output format (text or json)
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

struct EmbedApp {
    config: EmbedConfig,
    controller: SessionController<HeadlessEngine, WinitHost>,
    modifiers: ModifiersState,
    shown_title: Option<String>,
    fatal: Option<SessionError>,
}

impl EmbedApp {
    fn new(config: EmbedConfig) -> Self {
        let (events, rx) = event_channel();
        let engine = HeadlessEngine::new(events, config.cols, config.rows);
        let controller =
            SessionController::new(engine, WinitHost::new(), rx, config.session_options());

        Self {
            config,
            controller,
            modifiers: ModifiersState::empty(),
            shown_title: None,
            fatal: None,
        }
    }

    /// One host refresh cycle
    fn refresh(&mut self, event_loop: &ActiveEventLoop) {
        match self.controller.reconcile(&self.config.appearance) {
            Ok(Reconciled::Initialized) => info!("session started"),
            Ok(_) => {}
            Err(SessionError::Spawn(e)) => warn!(error = %e, "shell could not be started"),
            Err(e) => {
                error!(error = %e, "session unavailable");
                self.fatal = Some(e);
                event_loop.exit();
            }
        }
    }

    /// Grid size for a window, same layout offsets as the renderer uses
    fn grid_size(&self, width: u32, height: u32) -> (u16, u16) {
        let font_size = self.config.appearance.font.size;
        let char_width = font_size * 0.6;
        let char_height = font_size * 1.25;
        let cols = ((width as f32 - 20.0) / char_width).floor().max(10.0);
        let rows = ((height as f32 - 40.0) / char_height).floor().max(3.0);
        (cols.min(u16::MAX as f32) as u16, rows.min(u16::MAX as f32) as u16)
    }

    fn update_title(&mut self) {
        let title = self.controller.session().title().map(str::to_owned);
        if title != self.shown_title {
            if let (Some(window), Some(title)) = (self.controller.host().window(), &title) {
                window.set_title(title);
            }
            self.shown_title = title;
        }
    }
}

impl ApplicationHandler for EmbedApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        // The UI layer renders the pane before its window exists
        self.refresh(event_loop);

        if self.controller.host().window().is_some() {
            return;
        }
        let attributes = Window::default_attributes().with_title(self.config.app_name.clone());
        match event_loop.create_window(attributes) {
            Ok(window) => {
                self.controller.host_mut().set_window(Arc::new(window));
                let outcome = self.controller.host_attached();
                info!(?outcome, "surface attached");
            }
            Err(e) => {
                error!(error = %e, "failed to create window");
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                self.controller.dispose();
                self.controller.host_mut().clear_window();
                event_loop.exit();
                return;
            }
            WindowEvent::Focused(false) => self.controller.focus_lost(),
            WindowEvent::ModifiersChanged(modifiers) => self.modifiers = modifiers.state(),
            WindowEvent::MouseInput {
                state: ElementState::Pressed,
                ..
            } => {
                self.controller.request_focus();
            }
            WindowEvent::KeyboardInput { event, .. } if event.state == ElementState::Pressed => {
                if let Some(bytes) =
                    key_to_bytes(&event.logical_key, event.text.as_deref(), &self.modifiers)
                    && let Err(e) = self.controller.handle_input(&bytes)
                {
                    warn!(error = %e, "failed to write to shell");
                }
            }
            WindowEvent::Resized(size) => {
                let (cols, rows) = self.grid_size(size.width, size.height);
                self.controller.resize(cols, rows);
            }
            _ => {}
        }

        self.refresh(event_loop);
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        self.controller.engine_mut().process_output();
        if let Some(report) = self.controller.pump(Instant::now()) {
            info!(exit_code = ?report.exit_code, "shell exited");
        }

        let text = self.controller.engine_mut().take_display();
        if !text.is_empty() {
            let mut stdout = std::io::stdout().lock();
            let _ = stdout.write_all(text.as_bytes());
            let _ = stdout.flush();
        }

        self.update_title();
        if self.controller.engine_mut().take_redraw()
            && let Some(window) = self.controller.host().window()
        {
            window.request_redraw();
        }

        event_loop.set_control_flow(ControlFlow::WaitUntil(Instant::now() + FRAME));
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.log_format)?;

    let config = match &cli.config {
        Some(path) => EmbedConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => EmbedConfig::default(),
    };

    let event_loop = EventLoop::new().context("Failed to create event loop")?;
    let mut app = EmbedApp::new(config);
    event_loop.run_app(&mut app)?;

    if let Some(err) = app.fatal.take() {
        return Err(err.into());
    }
    Ok(())
}
