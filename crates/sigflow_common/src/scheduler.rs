//! Scheduler collaborator contract.
//!
//! The statistics engine asks its host to "call me again after D" so it can
//! re-extrapolate even when no samples arrive. The trait keeps the engine
//! decoupled from any particular runtime: the daemon backs it with tokio
//! timers, tests with `ManualScheduler`.

use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Handle for a single pending callback request.
pub type TickToken = u64;

/// One-shot callback scheduling offered by the host.
///
/// `cancel` must be idempotent: cancelling an unknown, expired, or
/// already-cancelled token is a no-op.
pub trait TickScheduler: Send {
    /// Request a single callback after at least `delay` has elapsed.
    fn schedule_after(&mut self, delay: Duration) -> TickToken;

    /// Drop a pending request if it is still pending.
    fn cancel(&mut self, token: TickToken);
}

#[derive(Debug, Default)]
struct ManualState {
    next_token: TickToken,
    pending: Vec<(TickToken, Duration)>,
}

/// Deterministic in-memory scheduler for tests and embedders without a
/// timer runtime. Requests are recorded; the caller decides when a request
/// is "due" and delivers the tick to the node itself.
#[derive(Debug, Clone, Default)]
pub struct ManualScheduler {
    state: Arc<Mutex<ManualState>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Currently pending requests, oldest first.
    pub fn pending(&self) -> Vec<(TickToken, Duration)> {
        self.state.lock().expect("scheduler state poisoned").pending.clone()
    }

    pub fn pending_count(&self) -> usize {
        self.state.lock().expect("scheduler state poisoned").pending.len()
    }

    /// Remove and return the oldest pending request, as if its timer fired.
    pub fn fire_next(&self) -> Option<(TickToken, Duration)> {
        let mut state = self.state.lock().expect("scheduler state poisoned");
        if state.pending.is_empty() {
            None
        } else {
            Some(state.pending.remove(0))
        }
    }
}

impl TickScheduler for ManualScheduler {
    fn schedule_after(&mut self, delay: Duration) -> TickToken {
        let mut state = self.state.lock().expect("scheduler state poisoned");
        state.next_token += 1;
        let token = state.next_token;
        state.pending.push((token, delay));
        token
    }

    fn cancel(&mut self, token: TickToken) {
        let mut state = self.state.lock().expect("scheduler state poisoned");
        state.pending.retain(|(pending, _)| *pending != token);
    }
}
