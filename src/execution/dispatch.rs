//! Bounded in-flight dispatch.
//!
//! [`DispatchQueue`] caps how many remote operations run at once against one
//! endpoint. Callers above the cap wait in a [`PriorityRequestQueue`]; a finished
//! operation hands its slot directly to the next waiter so the in-flight count
//! never dips below the cap while work is queued.

use super::priority_queue::PriorityRequestQueue;
use crate::config::QueueConfig;
use crate::models::OperationPriority;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug)]
struct DispatchState {
    waiting: PriorityRequestQueue<oneshot::Sender<DispatchSlot>>,
    in_flight: usize,
    max_in_flight: usize,
}

/// Concurrency gate shared by every caller of one endpoint
#[derive(Debug, Clone)]
pub struct DispatchQueue {
    state: Arc<Mutex<DispatchState>>,
}

/// One of the bounded in-flight slots; releasing happens on drop
#[derive(Debug)]
#[must_use = "dropping the slot releases it immediately"]
pub struct DispatchSlot {
    state: Arc<Mutex<DispatchState>>,
    armed: bool,
}

impl DispatchQueue {
    pub fn new(config: &QueueConfig) -> Self {
        Self {
            state: Arc::new(Mutex::new(DispatchState {
                waiting: PriorityRequestQueue::new(config.starvation_threshold()),
                in_flight: 0,
                max_in_flight: config.max_in_flight.max(1),
            })),
        }
    }

    /// Wait for an in-flight slot.
    ///
    /// Returns immediately when below the cap and nobody is queued. Otherwise the
    /// caller queues at `priority` and is woken when a slot is handed over.
    /// Dropping the returned future gives up the place in line.
    pub async fn acquire(&self, priority: OperationPriority) -> DispatchSlot {
        loop {
            let receiver = {
                let mut state = self.state.lock();
                if state.in_flight < state.max_in_flight && state.waiting.is_empty() {
                    state.in_flight += 1;
                    return DispatchSlot {
                        state: self.state.clone(),
                        armed: true,
                    };
                }

                let (sender, receiver) = oneshot::channel();
                state.waiting.push_at(priority, sender, Instant::now());
                debug!(
                    priority = %priority,
                    in_flight = state.in_flight,
                    waiting = state.waiting.len(),
                    "⏳ Operation queued for dispatch"
                );
                receiver
            };

            if let Ok(slot) = receiver.await {
                return slot;
            }
        }
    }

    pub fn in_flight(&self) -> usize {
        self.state.lock().in_flight
    }

    pub fn waiting(&self) -> usize {
        self.state.lock().waiting.len()
    }

    pub fn max_in_flight(&self) -> usize {
        self.state.lock().max_in_flight
    }
}

impl DispatchSlot {
    fn release(&mut self) {
        if !self.armed {
            return;
        }
        self.armed = false;

        let mut state = self.state.lock();
        let now = Instant::now();
        while let Some(sender) = state.waiting.pop_at(now) {
            let handoff = DispatchSlot {
                state: self.state.clone(),
                armed: true,
            };
            match sender.send(handoff) {
                Ok(()) => return,
                // Waiter went away; disarm the returned slot so it does not re-enter release
                Err(mut unclaimed) => unclaimed.armed = false,
            }
        }
        state.in_flight = state.in_flight.saturating_sub(1);
    }
}

impl Drop for DispatchSlot {
    fn drop(&mut self) {
        self.release();
    }
}
