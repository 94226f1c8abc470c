//! Exactly-once guard for session bring-up
//!
//! The host may call `reconcile` on every refresh, from any point of its
//! update cycle. The gate is an atomic state machine so the check and the
//! transition into `Initializing` happen in one step, and a call that lands
//! while bring-up is still running is turned away instead of interleaving.

use std::sync::atomic::{AtomicU8, Ordering};

const UNINITIALIZED: u8 = 0;
const INITIALIZING: u8 = 1;
const READY: u8 = 2;
const FAILED: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Uninitialized,
    Initializing,
    Ready,
    /// Bring-up failed before a session existed; it is not retried
    Failed,
}

/// Result of entering the gate
#[derive(Debug)]
pub enum GateEntry<'a> {
    /// This caller owns first-time initialization
    First(InitTicket<'a>),
    Ready,
    InProgress,
    Failed,
}

#[derive(Debug, Default)]
pub struct SessionInitGate {
    state: AtomicU8,
}

impl SessionInitGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> GateState {
        match self.state.load(Ordering::Acquire) {
            UNINITIALIZED => GateState::Uninitialized,
            INITIALIZING => GateState::Initializing,
            READY => GateState::Ready,
            _ => GateState::Failed,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state() == GateState::Ready
    }

    /// Claim first-time initialization, or report why it is not ours to run
    pub fn enter(&self) -> GateEntry<'_> {
        match self.state.compare_exchange(
            UNINITIALIZED,
            INITIALIZING,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => GateEntry::First(InitTicket {
                gate: self,
                settled: false,
            }),
            Err(READY) => GateEntry::Ready,
            Err(INITIALIZING) => GateEntry::InProgress,
            Err(_) => GateEntry::Failed,
        }
    }
}

/// Ownership of an in-flight initialization.
///
/// Dropping an unsettled ticket (e.g. while unwinding) marks the gate failed,
/// so a half-built session is never initialized a second time.
#[derive(Debug)]
pub struct InitTicket<'a> {
    gate: &'a SessionInitGate,
    settled: bool,
}

impl InitTicket<'_> {
    /// Publish the session as initialized
    pub fn complete(mut self) {
        self.settle(READY);
    }

    /// Initialization could not produce a session
    pub fn fail(mut self) {
        self.settle(FAILED);
    }

    fn settle(&mut self, state: u8) {
        self.gate.state.store(state, Ordering::Release);
        self.settled = true;
    }
}

impl Drop for InitTicket<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.settle(FAILED);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    #[test]
    fn test_first_entry_owns_initialization() {
        let gate = SessionInitGate::new();
        assert_eq!(gate.state(), GateState::Uninitialized);

        let ticket = match gate.enter() {
            GateEntry::First(ticket) => ticket,
            other => panic!("expected first entry, got {other:?}"),
        };
        assert_eq!(gate.state(), GateState::Initializing);
        ticket.complete();

        assert!(gate.is_ready());
        assert!(matches!(gate.enter(), GateEntry::Ready));
    }

    #[test]
    fn test_reentry_during_initialization_is_rejected() {
        let gate = SessionInitGate::new();
        let ticket = match gate.enter() {
            GateEntry::First(ticket) => ticket,
            other => panic!("expected first entry, got {other:?}"),
        };

        assert!(matches!(gate.enter(), GateEntry::InProgress));
        assert!(matches!(gate.enter(), GateEntry::InProgress));

        ticket.complete();
        assert!(matches!(gate.enter(), GateEntry::Ready));
    }

    #[test]
    fn test_failed_initialization_is_sticky() {
        let gate = SessionInitGate::new();
        if let GateEntry::First(ticket) = gate.enter() {
            ticket.fail();
        }
        assert_eq!(gate.state(), GateState::Failed);
        assert!(matches!(gate.enter(), GateEntry::Failed));
    }

    #[test]
    fn test_dropped_ticket_marks_failed() {
        let gate = SessionInitGate::new();
        if let GateEntry::First(ticket) = gate.enter() {
            drop(ticket);
        }
        assert_eq!(gate.state(), GateState::Failed);
    }

    #[test]
    fn test_only_one_thread_wins() {
        let gate = Arc::new(SessionInitGate::new());
        let winners = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let gate = Arc::clone(&gate);
                let winners = Arc::clone(&winners);
                thread::spawn(move || {
                    if let GateEntry::First(ticket) = gate.enter() {
                        winners.fetch_add(1, Ordering::SeqCst);
                        ticket.complete();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(winners.load(Ordering::SeqCst), 1);
        assert!(gate.is_ready());
    }
}
