//! Structured event stream.
//!
//! The core emits events for lease lifecycle, wait escalation, and fallback
//! dispatch; it never formats or persists them. Callers inject an
//! [`EventSink`]; [`TracingSink`] is the default, [`MemorySink`] keeps a
//! bounded in-memory window for tests and diagnostics.

use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::types::{FailureKind, Op, SessionId};

/// One structured event emitted by the core.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "event")]
pub enum CoreEvent {
    SessionCreated { session: SessionId },
    SessionDestroyed { session: SessionId },
    LeaseAcquired { session: SessionId },
    LeaseReleased { session: SessionId },
    WaitEscalated { timeout_ms: u64 },
    FallbackTriggered { op: Op, kind: FailureKind },
    LocatorHealed { key: String, alternate: String },
    PoolClosed,
}

/// Event consumer injected into the core.
pub trait EventSink: Send + Sync {
    fn record(&self, event: CoreEvent);
}

/// Default sink: structured logs via `tracing`.
#[derive(Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn record(&self, event: CoreEvent) {
        match &event {
            CoreEvent::SessionCreated { session } => debug!(%session, "session created"),
            CoreEvent::SessionDestroyed { session } => debug!(%session, "session destroyed"),
            CoreEvent::LeaseAcquired { session } => debug!(%session, "lease acquired"),
            CoreEvent::LeaseReleased { session } => debug!(%session, "lease released"),
            CoreEvent::WaitEscalated { timeout_ms } => {
                debug!(timeout_ms, "wait timeout increased")
            }
            CoreEvent::FallbackTriggered { op, kind } => {
                warn!(%op, %kind, "fallback triggered")
            }
            CoreEvent::LocatorHealed { key, alternate } => {
                info!(%key, %alternate, "locator healed via alternate")
            }
            CoreEvent::PoolClosed => info!("pool closed"),
        }
    }
}

/// An event with its capture time, as kept by [`MemorySink`].
#[derive(Clone, Debug, Serialize)]
pub struct RecordedEvent {
    pub timestamp_ms: i64,
    #[serde(flatten)]
    pub event: CoreEvent,
}

const MEMORY_SINK_CAP: usize = 200;

/// Bounded in-memory sink; oldest entries are dropped past the cap.
#[derive(Default)]
pub struct MemorySink {
    events: Mutex<Vec<RecordedEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the retained events, oldest first.
    pub fn snapshot(&self) -> Vec<CoreEvent> {
        self.events
            .lock()
            .iter()
            .map(|recorded| recorded.event.clone())
            .collect()
    }

    /// Retained events matching a predicate.
    pub fn count_matching(&self, predicate: impl Fn(&CoreEvent) -> bool) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|recorded| predicate(&recorded.event))
            .count()
    }
}

impl EventSink for MemorySink {
    fn record(&self, event: CoreEvent) {
        let mut guard = self.events.lock();
        guard.push(RecordedEvent {
            timestamp_ms: Utc::now().timestamp_millis(),
            event,
        });
        let len = guard.len();
        if len > MEMORY_SINK_CAP {
            guard.drain(0..len - MEMORY_SINK_CAP);
        }
    }
}
