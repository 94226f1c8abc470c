//! Keyboard focus coordination
//!
//! Focus requests can arrive before the surface is in a window. Instead of
//! firing delayed callbacks, a request is parked until the host reports the
//! attachment, then tried a bounded number of times with a short backoff
//! driven by `poll`. Nothing here sleeps.

use crate::host::{HostSurface, ResponderTarget};
use crate::session::Session;
use serde::Deserialize;
use std::time::{Duration, Instant};

/// Retry policy for deferred focus requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FocusPolicy {
    /// Designation attempts after attachment before the request is dropped
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles for each later attempt
    #[serde(rename = "initial_backoff_ms", with = "millis")]
    pub initial_backoff: Duration,
}

impl Default for FocusPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(50),
        }
    }
}

mod millis {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FocusState {
    Idle,
    /// Waiting for the surface to be attached
    Queued,
    /// Attached, retrying designation
    Retrying { attempts: u32, next_attempt: Instant },
    Focused,
}

/// What a focus call did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusOutcome {
    /// The host designated the session as responder
    Designated,
    /// Already the responder; nothing was asked of the host
    AlreadyFocused,
    /// Parked until attachment or the next retry
    Deferred,
    /// Dropped after the final attempt found no window
    DeferralExhausted,
    /// No request pending
    Idle,
}

#[derive(Debug)]
pub struct FocusCoordinator {
    policy: FocusPolicy,
    state: FocusState,
}

impl FocusCoordinator {
    pub fn new(policy: FocusPolicy) -> Self {
        Self {
            policy,
            state: FocusState::Idle,
        }
    }

    pub fn is_focused(&self) -> bool {
        self.state == FocusState::Focused
    }

    pub fn is_pending(&self) -> bool {
        matches!(
            self.state,
            FocusState::Queued | FocusState::Retrying { .. }
        )
    }

    /// Ask for keyboard input to be routed to `session`
    pub fn request_focus<H: HostSurface>(
        &mut self,
        session: &Session,
        host: &mut H,
        now: Instant,
    ) -> FocusOutcome {
        match self.state {
            FocusState::Focused => FocusOutcome::AlreadyFocused,
            FocusState::Retrying { .. } => FocusOutcome::Deferred,
            FocusState::Idle | FocusState::Queued if !session.is_attached() => {
                tracing::debug!(session = %session.identity(), "focus deferred until attached");
                self.state = FocusState::Queued;
                FocusOutcome::Deferred
            }
            FocusState::Idle | FocusState::Queued => self.attempt(session, host, 0, now),
        }
    }

    /// The surface joined a displayable hierarchy; run any parked request now
    pub fn host_attached<H: HostSurface>(
        &mut self,
        session: &Session,
        host: &mut H,
        now: Instant,
    ) -> FocusOutcome {
        match self.state {
            FocusState::Queued => self.attempt(session, host, 0, now),
            FocusState::Focused => FocusOutcome::AlreadyFocused,
            FocusState::Retrying { .. } => self.poll(session, host, now),
            FocusState::Idle => FocusOutcome::Idle,
        }
    }

    /// Retry a pending designation whose backoff has elapsed
    pub fn poll<H: HostSurface>(
        &mut self,
        session: &Session,
        host: &mut H,
        now: Instant,
    ) -> FocusOutcome {
        match self.state {
            FocusState::Retrying {
                attempts,
                next_attempt,
            } if now >= next_attempt => self.attempt(session, host, attempts, now),
            FocusState::Retrying { .. } | FocusState::Queued => FocusOutcome::Deferred,
            FocusState::Focused => FocusOutcome::AlreadyFocused,
            FocusState::Idle => FocusOutcome::Idle,
        }
    }

    /// The host moved input elsewhere; the next request designates again
    pub fn focus_lost(&mut self) {
        if self.state == FocusState::Focused {
            self.state = FocusState::Idle;
        }
    }

    /// Surface left its window; a pending request waits for re-attachment
    pub fn host_detached(&mut self) {
        self.state = match self.state {
            FocusState::Idle => FocusState::Idle,
            FocusState::Focused => FocusState::Idle,
            FocusState::Queued | FocusState::Retrying { .. } => FocusState::Queued,
        };
    }

    fn attempt<H: HostSurface>(
        &mut self,
        session: &Session,
        host: &mut H,
        previous: u32,
        now: Instant,
    ) -> FocusOutcome {
        let attempts = previous + 1;
        let has_window = host.attached_window().is_some();

        if has_window
            && host.designate_responder(ResponderTarget {
                session: session.identity(),
            })
        {
            tracing::debug!(session = %session.identity(), attempts, "responder designated");
            self.state = FocusState::Focused;
            return FocusOutcome::Designated;
        }

        if attempts >= self.policy.max_attempts {
            tracing::info!(
                session = %session.identity(),
                attempts,
                has_window,
                "dropping focus request, host never designated the surface"
            );
            self.state = FocusState::Idle;
            return FocusOutcome::DeferralExhausted;
        }

        let backoff = self
            .policy
            .initial_backoff
            .saturating_mul(2u32.saturating_pow(previous));
        self.state = FocusState::Retrying {
            attempts,
            next_attempt: now + backoff,
        };
        FocusOutcome::Deferred
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeHost;

    fn attached_session() -> Session {
        let mut session = Session::new((80, 24));
        session.set_attached(true);
        session
    }

    #[test]
    fn test_request_before_attachment_is_deferred() {
        let session = Session::new((80, 24));
        let mut host = FakeHost::with_window();
        let mut focus = FocusCoordinator::new(FocusPolicy::default());

        let outcome = focus.request_focus(&session, &mut host, Instant::now());

        assert_eq!(outcome, FocusOutcome::Deferred);
        assert!(host.designations.is_empty());
        assert!(focus.is_pending());
    }

    #[test]
    fn test_attachment_runs_exactly_one_designation() {
        let mut session = Session::new((80, 24));
        let mut host = FakeHost::with_window();
        let mut focus = FocusCoordinator::new(FocusPolicy::default());
        let now = Instant::now();

        focus.request_focus(&session, &mut host, now);
        focus.request_focus(&session, &mut host, now);
        assert!(host.designations.is_empty());

        session.set_attached(true);
        assert_eq!(
            focus.host_attached(&session, &mut host, now),
            FocusOutcome::Designated
        );
        assert_eq!(
            focus.host_attached(&session, &mut host, now),
            FocusOutcome::AlreadyFocused
        );
        assert_eq!(focus.poll(&session, &mut host, now), FocusOutcome::AlreadyFocused);

        assert_eq!(
            host.designations,
            vec![ResponderTarget {
                session: session.identity()
            }]
        );
    }

    #[test]
    fn test_request_when_focused_is_a_no_op() {
        let session = attached_session();
        let mut host = FakeHost::with_window();
        let mut focus = FocusCoordinator::new(FocusPolicy::default());
        let now = Instant::now();

        assert_eq!(
            focus.request_focus(&session, &mut host, now),
            FocusOutcome::Designated
        );
        for _ in 0..5 {
            assert_eq!(
                focus.request_focus(&session, &mut host, now),
                FocusOutcome::AlreadyFocused
            );
        }
        assert_eq!(host.designations.len(), 1);
    }

    #[test]
    fn test_focus_lost_allows_designation_again() {
        let session = attached_session();
        let mut host = FakeHost::with_window();
        let mut focus = FocusCoordinator::new(FocusPolicy::default());
        let now = Instant::now();

        focus.request_focus(&session, &mut host, now);
        focus.focus_lost();
        assert_eq!(
            focus.request_focus(&session, &mut host, now),
            FocusOutcome::Designated
        );
        assert_eq!(host.designations.len(), 2);
    }

    #[test]
    fn test_retries_back_off_then_succeed() {
        let session = attached_session();
        let mut host = FakeHost::without_window();
        let mut focus = FocusCoordinator::new(FocusPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(50),
        });
        let start = Instant::now();

        assert_eq!(
            focus.request_focus(&session, &mut host, start),
            FocusOutcome::Deferred
        );
        // backoff not yet elapsed
        assert_eq!(
            focus.poll(&session, &mut host, start + Duration::from_millis(10)),
            FocusOutcome::Deferred
        );

        host.window = Some(crate::host::WindowHandle(7));
        assert_eq!(
            focus.poll(&session, &mut host, start + Duration::from_millis(50)),
            FocusOutcome::Designated
        );
        assert_eq!(host.designations.len(), 1);
    }

    #[test]
    fn test_request_dropped_after_final_attempt() {
        let session = attached_session();
        let mut host = FakeHost::without_window();
        let mut focus = FocusCoordinator::new(FocusPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(50),
        });
        let start = Instant::now();

        focus.request_focus(&session, &mut host, start);
        assert_eq!(
            focus.poll(&session, &mut host, start + Duration::from_millis(50)),
            FocusOutcome::Deferred
        );
        // second backoff is 100ms
        assert_eq!(
            focus.poll(&session, &mut host, start + Duration::from_millis(100)),
            FocusOutcome::Deferred
        );
        assert_eq!(
            focus.poll(&session, &mut host, start + Duration::from_millis(150)),
            FocusOutcome::DeferralExhausted
        );
        assert_eq!(
            focus.poll(&session, &mut host, start + Duration::from_secs(10)),
            FocusOutcome::Idle
        );
        assert!(host.designations.is_empty());
        assert!(!focus.is_pending());
    }

    #[test]
    fn test_refused_designation_counts_as_attempt() {
        let session = attached_session();
        let mut host = FakeHost::with_window();
        host.accept = false;
        let mut focus = FocusCoordinator::new(FocusPolicy {
            max_attempts: 1,
            initial_backoff: Duration::from_millis(50),
        });

        assert_eq!(
            focus.request_focus(&session, &mut host, Instant::now()),
            FocusOutcome::DeferralExhausted
        );
        assert_eq!(host.designations.len(), 1);
    }

    #[test]
    fn test_detach_requeues_pending_request() {
        let session = attached_session();
        let mut host = FakeHost::without_window();
        let mut focus = FocusCoordinator::new(FocusPolicy::default());
        let now = Instant::now();

        focus.request_focus(&session, &mut host, now);
        focus.host_detached();
        assert!(focus.is_pending());

        host.window = Some(crate::host::WindowHandle(1));
        assert_eq!(
            focus.host_attached(&session, &mut host, now),
            FocusOutcome::Designated
        );
    }

    #[test]
    fn test_policy_from_toml() {
        let policy: FocusPolicy = toml::from_str("max_attempts = 5\ninitial_backoff_ms = 20").unwrap();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.initial_backoff, Duration::from_millis(20));
    }
}
