//! Host windowing surface capability
//!
//! The host owns the window hierarchy and is the only authority on which
//! target receives keyboard input. The session asks; it never seizes focus
//! on its own.

use crate::session::SessionId;

/// Opaque handle to the window a surface is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowHandle(pub u64);

/// The input-routing target of one session's surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResponderTarget {
    pub session: SessionId,
}

pub trait HostSurface {
    /// Window the session surface currently lives in, if any
    fn attached_window(&self) -> Option<WindowHandle>;

    /// Ask the host to route keyboard input to `target`.
    ///
    /// Returns false if the host refused or had no window to route through.
    fn designate_responder(&mut self, target: ResponderTarget) -> bool;

    /// Add the session's surface to the host hierarchy.
    ///
    /// Returns true if the surface is displayable right away. Hosts that
    /// attach asynchronously return false and later notify the controller
    /// through `SessionController::host_attached`.
    fn attach_surface(&mut self, session: SessionId) -> bool {
        let _ = session;
        self.attached_window().is_some()
    }
}

#[cfg(feature = "host-winit")]
pub use winit_host::WinitHost;

#[cfg(feature = "host-winit")]
mod winit_host {
    use super::{HostSurface, ResponderTarget, WindowHandle};
    use crate::session::SessionId;
    use std::sync::Arc;
    use winit::window::Window;

    /// `HostSurface` backed by a winit window
    #[derive(Default)]
    pub struct WinitHost {
        window: Option<Arc<Window>>,
        responder: Option<ResponderTarget>,
        surfaces: Vec<SessionId>,
    }

    impl WinitHost {
        pub fn new() -> Self {
            Self::default()
        }

        /// Install (or replace) the window once the event loop has created it
        pub fn set_window(&mut self, window: Arc<Window>) {
            self.window = Some(window);
        }

        pub fn clear_window(&mut self) {
            self.window = None;
            self.responder = None;
        }

        pub fn window(&self) -> Option<&Arc<Window>> {
            self.window.as_ref()
        }

        pub fn responder(&self) -> Option<ResponderTarget> {
            self.responder
        }
    }

    impl HostSurface for WinitHost {
        fn attached_window(&self) -> Option<WindowHandle> {
            self.window
                .as_ref()
                .map(|window| WindowHandle(u64::from(window.id())))
        }

        fn designate_responder(&mut self, target: ResponderTarget) -> bool {
            let Some(window) = &self.window else {
                return false;
            };
            if !window.has_focus() {
                window.focus_window();
            }
            self.responder = Some(target);
            true
        }

        fn attach_surface(&mut self, session: SessionId) -> bool {
            if !self.surfaces.contains(&session) {
                self.surfaces.push(session);
            }
            self.window.is_some()
        }
    }
}
