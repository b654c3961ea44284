//! Tokio-backed scheduler collaborator and the daemon's monotonic clock.
//!
//! Each node that schedules gets its own `TokioScheduler` carrying the
//! node's name; a request spawns a sleep task that posts a `TickMessage`
//! back to the runtime's channel, so tick delivery goes through the same
//! serialized event loop as sample delivery.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use sigflow_common::{TickScheduler, TickToken};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

/// Posted to the runtime when a scheduled delay elapses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickMessage {
    pub node: String,
    pub token: TickToken,
}

pub struct TokioScheduler {
    node: String,
    tx: UnboundedSender<TickMessage>,
    next_token: TickToken,
    tasks: HashMap<TickToken, JoinHandle<()>>,
}

impl TokioScheduler {
    pub fn new(node: impl Into<String>, tx: UnboundedSender<TickMessage>) -> Self {
        Self {
            node: node.into(),
            tx,
            next_token: 0,
            tasks: HashMap::new(),
        }
    }
}

impl TickScheduler for TokioScheduler {
    fn schedule_after(&mut self, delay: Duration) -> TickToken {
        // Fired tasks linger in the map until the next request comes by.
        self.tasks.retain(|_, handle| !handle.is_finished());

        self.next_token += 1;
        let token = self.next_token;
        let tx = self.tx.clone();
        let node = self.node.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // The runtime may already be gone during shutdown.
            let _ = tx.send(TickMessage { node, token });
        });
        self.tasks.insert(token, handle);
        token
    }

    fn cancel(&mut self, token: TickToken) {
        if let Some(handle) = self.tasks.remove(&token) {
            handle.abort();
        }
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        for handle in self.tasks.values() {
            handle.abort();
        }
    }
}

/// Seconds since daemon start, from a monotonic source well below the
/// 0.5 s resolution the engine requires.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    start: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn now_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}
