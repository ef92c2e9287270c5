//! Adaptive condition waiting.
//!
//! Bounded geometric backoff: each attempt polls the condition under a
//! timeout budget; a failed attempt doubles the budget, and the engine stops
//! once the next budget would reach the ceiling. Short transient
//! unreadiness resolves within the first short attempts; genuinely broken
//! state fails without waiting the full ceiling on every attempt. The
//! worst-case total wall time is the geometric sum, boundable up front.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::config::WaitConfig;
use crate::errors::WaitError;
use crate::events::{CoreEvent, EventSink};

/// Geometric-backoff wait engine. Cheap to clone per action facade.
#[derive(Clone)]
pub struct AdaptiveWait {
    initial: Duration,
    ceiling: Duration,
    factor: u32,
    poll: Duration,
    sink: Arc<dyn EventSink>,
}

impl AdaptiveWait {
    pub fn new(config: &WaitConfig, sink: Arc<dyn EventSink>) -> Self {
        Self {
            initial: Duration::from_millis(config.initial_ms),
            ceiling: Duration::from_millis(config.ceiling_ms),
            // Config loading rejects factors below 2; for hand-built
            // configs this clamp keeps the escalation loop terminating.
            factor: config.growth_factor.max(2),
            poll: Duration::from_millis(config.poll_interval_ms.max(1)),
            sink,
        }
    }

    /// Poll `condition` until it yields a value, escalating the budget
    /// geometrically. Fails with [`WaitError::ConditionTimeout`] once the
    /// next budget would reach the ceiling.
    pub fn until<T>(&self, mut condition: impl FnMut() -> Option<T>) -> Result<T, WaitError> {
        let started = Instant::now();
        let mut budget = self.initial;
        loop {
            if let Some(value) = self.poll_within(budget, &mut condition) {
                return Ok(value);
            }
            let next = budget.saturating_mul(self.factor);
            if next >= self.ceiling {
                return Err(WaitError::ConditionTimeout {
                    waited_ms: started.elapsed().as_millis() as u64,
                    ceiling_ms: self.ceiling.as_millis() as u64,
                });
            }
            budget = next;
            debug!(timeout_ms = budget.as_millis() as u64, "wait timeout increased");
            self.sink.record(CoreEvent::WaitEscalated {
                timeout_ms: budget.as_millis() as u64,
            });
        }
    }

    /// Poll `condition` under a single fixed budget.
    pub fn with_timeout<T>(
        &self,
        mut condition: impl FnMut() -> Option<T>,
        timeout: Duration,
    ) -> Result<T, WaitError> {
        let started = Instant::now();
        self.poll_within(timeout, &mut condition)
            .ok_or(WaitError::ConditionTimeout {
                waited_ms: started.elapsed().as_millis() as u64,
                ceiling_ms: timeout.as_millis() as u64,
            })
    }

    /// One attempt: evaluate at least once, then keep polling until the
    /// budget elapses.
    fn poll_within<T>(
        &self,
        budget: Duration,
        condition: &mut impl FnMut() -> Option<T>,
    ) -> Option<T> {
        let deadline = Instant::now() + budget;
        loop {
            if let Some(value) = condition() {
                return Some(value);
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            thread::sleep(self.poll.min(deadline - now));
        }
    }
}
