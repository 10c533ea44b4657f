//! Panel attachment tracking for the background context.
//!
//! Several panel surfaces can watch the same browser window. Pick mode is
//! stopped only once the last one goes away, after a short grace delay so a
//! surface being replaced by another does not flicker the overlay.

use std::collections::HashSet;

#[cfg(not(target_arch = "wasm32"))]
use std::time::{Duration, Instant};

#[cfg(target_arch = "wasm32")]
use web_time::{Duration, Instant};

/// A scheduled stop. Only valid while no surface re-attaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopTicket {
    pub generation: u64,
    /// How long the caller should wait before calling [`SessionCoordinator::fire`].
    pub delay: Duration,
    due: Instant,
}

#[derive(Debug)]
pub struct SessionCoordinator {
    attached: HashSet<u64>,
    generation: u64,
    grace: Duration,
}

impl SessionCoordinator {
    pub fn new(grace: Duration) -> Self {
        Self {
            attached: HashSet::new(),
            generation: 0,
            grace,
        }
    }

    pub fn attached(&self) -> usize {
        self.attached.len()
    }

    /// Register a surface. Cancels any pending stop.
    pub fn attach(&mut self, surface: u64) -> bool {
        self.generation += 1;
        let added = self.attached.insert(surface);
        log::debug!("Panel {} attached ({} open)", surface, self.attached.len());
        added
    }

    /// Unregister a surface, scheduling a stop when it was the last one.
    pub fn detach(&mut self, surface: u64, now: Instant) -> Option<StopTicket> {
        if !self.attached.remove(&surface) {
            return None;
        }
        log::debug!("Panel {} detached ({} open)", surface, self.attached.len());
        if !self.attached.is_empty() {
            return None;
        }
        self.generation += 1;
        Some(StopTicket {
            generation: self.generation,
            delay: self.grace,
            due: now + self.grace,
        })
    }

    /// Whether a scheduled stop should go ahead.
    pub fn fire(&self, ticket: StopTicket, now: Instant) -> bool {
        ticket.generation == self.generation && self.attached.is_empty() && now >= ticket.due
    }
}

impl Default for SessionCoordinator {
    fn default() -> Self {
        Self::new(Duration::from_millis(crate::config::DEFAULT_DETACH_GRACE_MS))
    }
}
