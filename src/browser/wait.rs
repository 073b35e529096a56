//! Bounded condition waits.
//!
//! Every suspension point in the workflow goes through [`wait_until`] with an
//! explicit timeout; there is no unbounded polling anywhere in the crate.

use std::time::{Duration, Instant};

/// Poll `condition` until it returns `true` or `timeout` elapses.
///
/// The condition is always evaluated at least once, so a zero timeout is a
/// single probe. Errors from the condition count as "not yet" because probes
/// routinely fail while the page is being replaced.
pub fn wait_until<F>(timeout: Duration, poll: Duration, mut condition: F) -> bool
where
    F: FnMut() -> crate::error::Result<bool>,
{
    let deadline = Instant::now() + timeout;
    loop {
        match condition() {
            Ok(true) => return true,
            Ok(false) => {}
            Err(e) => log::debug!("Wait probe failed: {}", e),
        }

        let now = Instant::now();
        if now >= deadline {
            return false;
        }
        std::thread::sleep(poll.min(deadline - now));
    }
}

/// Fixed delay that absorbs debounced client-side rendering
pub fn settle(delay: Duration) {
    if !delay.is_zero() {
        log::debug!("Settling for {:?}", delay);
        std::thread::sleep(delay);
    }
}

/// Exponential backoff schedule: `initial`, doubled after every attempt, capped at `max`
#[derive(Debug, Clone)]
pub struct Backoff {
    next: Duration,
    max: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self { next: initial.min(max), max }
    }

    /// Delay to apply now; advances the schedule
    pub fn next_delay(&mut self) -> Duration {
        let current = self.next;
        self.next = (self.next * 2).min(self.max);
        current
    }
}
