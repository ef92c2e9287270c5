//! Bounded session pool.
//!
//! The ledger mutex serializes all bookkeeping; handle I/O (create,
//! validate, destroy) always runs outside it so one slow session never
//! blocks other workers' acquires (create-outside/register-inside).

use std::collections::HashMap;
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, warn};

use crate::config::PoolConfig;
use crate::errors::PoolError;
use crate::events::{CoreEvent, EventSink};
use crate::factory::HandleFactory;
use crate::handle::SessionHandle;
use crate::types::SessionId;

struct Loan {
    owner: ThreadId,
    handle: SessionHandle,
}

#[derive(Default)]
struct Ledger {
    idle: Vec<SessionHandle>,
    on_loan: HashMap<SessionId, Loan>,
    /// Live handles including reserved in-flight creations.
    total: usize,
    /// Monotonic created-counter, for diagnostics only.
    created: u64,
    closed: bool,
}

/// Snapshot of the pool's ledger.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub idle: usize,
    pub on_loan: usize,
    pub live: usize,
    pub created: u64,
}

enum Claim {
    Reuse(SessionHandle),
    Create,
}

/// Bounded concurrent pool of session handles with at-most-one-owner
/// semantics enforced by its lending ledger.
pub struct SessionPool {
    factory: Arc<dyn HandleFactory>,
    config: PoolConfig,
    ledger: Mutex<Ledger>,
    available: Condvar,
    sink: Arc<dyn EventSink>,
}

impl SessionPool {
    pub fn new(factory: Arc<dyn HandleFactory>, config: PoolConfig, sink: Arc<dyn EventSink>) -> Self {
        Self {
            factory,
            config,
            ledger: Mutex::new(Ledger::default()),
            available: Condvar::new(),
            sink,
        }
    }

    /// Borrow a handle, blocking up to the configured acquire timeout.
    ///
    /// Reuses the most recently returned idle handle when one exists
    /// (validated first; invalid ones are destroyed and the claim retried),
    /// creates a new one while below `max_total`, and otherwise waits for a
    /// release. The successful caller's thread becomes the handle's owner.
    pub fn acquire(&self) -> Result<SessionHandle, PoolError> {
        let started = Instant::now();
        let deadline = started + Duration::from_millis(self.config.acquire_timeout_ms);
        loop {
            let claim = {
                let mut ledger = self.ledger.lock();
                loop {
                    if ledger.closed {
                        return Err(PoolError::Closed);
                    }
                    if let Some(handle) = ledger.idle.pop() {
                        break Claim::Reuse(handle);
                    }
                    if ledger.total < self.config.max_total {
                        // Reserve the slot so concurrent acquirers cannot
                        // overshoot max_total while we create outside the lock.
                        ledger.total += 1;
                        break Claim::Create;
                    }
                    if self.available.wait_until(&mut ledger, deadline).timed_out() {
                        return Err(PoolError::Exhausted {
                            waited_ms: started.elapsed().as_millis() as u64,
                        });
                    }
                }
            };

            match claim {
                Claim::Reuse(handle) => {
                    if self.factory.validate(&handle) {
                        return self.register(handle);
                    }
                    debug!(session = %handle.id(), "idle handle failed validation");
                    self.factory.destroy(&handle);
                    let mut ledger = self.ledger.lock();
                    ledger.total = ledger.total.saturating_sub(1);
                    drop(ledger);
                    self.available.notify_one();
                }
                Claim::Create => match self.factory.create() {
                    Ok(handle) => {
                        self.ledger.lock().created += 1;
                        return self.register(handle);
                    }
                    Err(err) => {
                        let mut ledger = self.ledger.lock();
                        ledger.total = ledger.total.saturating_sub(1);
                        drop(ledger);
                        self.available.notify_one();
                        return Err(err);
                    }
                },
            }
        }
    }

    fn register(&self, handle: SessionHandle) -> Result<SessionHandle, PoolError> {
        let owner = thread::current().id();
        {
            let mut ledger = self.ledger.lock();
            if ledger.closed {
                // Shutdown ran while we were validating/creating.
                ledger.total = ledger.total.saturating_sub(1);
                drop(ledger);
                self.factory.destroy(&handle);
                return Err(PoolError::Closed);
            }
            ledger.on_loan.insert(
                handle.id().clone(),
                Loan {
                    owner,
                    handle: handle.clone(),
                },
            );
        }
        debug!(session = %handle.id(), "handle leased");
        self.sink.record(CoreEvent::LeaseAcquired {
            session: handle.id().clone(),
        });
        Ok(handle)
    }

    /// Return a handle. A no-op (with a warning) when the handle is not on
    /// loan to the calling thread, so double-release and foreign-release are
    /// harmless.
    pub fn release(&self, handle: &SessionHandle) {
        let caller = thread::current().id();
        let destroy = {
            let mut ledger = self.ledger.lock();
            match ledger.on_loan.get(handle.id()) {
                Some(loan) if loan.owner == caller => {}
                _ => {
                    warn!(session = %handle.id(), "release ignored: not on loan to caller");
                    return;
                }
            }
            ledger.on_loan.remove(handle.id());
            // The most recently returned handle is the one discarded when
            // the idle set is full, keeping warm handles warm.
            let destroy =
                ledger.closed || !handle.is_alive() || ledger.idle.len() >= self.config.max_idle;
            if destroy {
                ledger.total = ledger.total.saturating_sub(1);
            } else {
                ledger.idle.push(handle.clone());
            }
            destroy
        };
        if destroy {
            self.factory.destroy(handle);
        }
        self.sink.record(CoreEvent::LeaseReleased {
            session: handle.id().clone(),
        });
        self.available.notify_one();
    }

    /// Close the pool: invalidate and destroy every idle and on-loan handle,
    /// wake all waiters. Idempotent; subsequent `acquire` calls fail with
    /// [`PoolError::Closed`].
    pub fn shutdown(&self) {
        let doomed = {
            let mut ledger = self.ledger.lock();
            if ledger.closed {
                return;
            }
            ledger.closed = true;
            let mut doomed: Vec<SessionHandle> = ledger.idle.drain(..).collect();
            doomed.extend(ledger.on_loan.drain().map(|(_, loan)| loan.handle));
            ledger.total = 0;
            doomed
        };
        self.available.notify_all();
        for handle in &doomed {
            self.factory.destroy(handle);
        }
        debug!(destroyed = doomed.len(), "pool shut down");
        self.sink.record(CoreEvent::PoolClosed);
    }

    pub fn stats(&self) -> PoolStats {
        let ledger = self.ledger.lock();
        PoolStats {
            idle: ledger.idle.len(),
            on_loan: ledger.on_loan.len(),
            live: ledger.total,
            created: ledger.created,
        }
    }
}

impl Drop for SessionPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}
