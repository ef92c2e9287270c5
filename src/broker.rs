//! The crate's external interface: an explicit context object wiring
//! configuration, factory, pool, registry, and wait engine together.
//!
//! No process-wide singletons: a worker's unit-of-work entry point receives
//! a broker (usually behind an `Arc`) and gets the "current thread's
//! handle" ergonomics from the registry inside it.

use std::sync::Arc;
use std::time::Duration;

use crate::actions::Actions;
use crate::config::CoreConfig;
use crate::errors::{CoreError, RegistryError, StoreError, WaitError};
use crate::events::{EventSink, TracingSink};
use crate::factory::{SessionConstructor, SessionFactory};
use crate::handle::SessionHandle;
use crate::heal::FileLocatorStore;
use crate::pool::{PoolStats, SessionPool};
use crate::registry::ThreadAffinityRegistry;
use crate::waiting::AdaptiveWait;

/// Session lease lifecycle plus action execution for worker threads.
pub struct SessionBroker {
    pool: SessionPool,
    registry: ThreadAffinityRegistry,
    wait: AdaptiveWait,
    sink: Arc<dyn EventSink>,
}

impl SessionBroker {
    /// Build a broker from configuration and an injected session
    /// constructor, reporting events to `sink`.
    pub fn with_sink(
        config: CoreConfig,
        constructor: SessionConstructor,
        sink: Arc<dyn EventSink>,
    ) -> Result<Self, StoreError> {
        let mut factory = SessionFactory::new(constructor, sink.clone());
        if config.heal.enabled {
            let store = FileLocatorStore::load_from_path(config.heal.store_path.clone())?;
            factory = factory.with_healing(Arc::new(store));
        }
        let pool = SessionPool::new(Arc::new(factory), config.pool.clone(), sink.clone());
        let wait = AdaptiveWait::new(&config.wait, sink.clone());
        Ok(Self {
            pool,
            registry: ThreadAffinityRegistry::new(),
            wait,
            sink,
        })
    }

    /// Build a broker that logs events via `tracing`.
    pub fn new(config: CoreConfig, constructor: SessionConstructor) -> Result<Self, StoreError> {
        Self::with_sink(config, constructor, Arc::new(TracingSink))
    }

    /// Lease a handle for the calling thread's unit of work.
    pub fn acquire_session(&self) -> Result<SessionHandle, CoreError> {
        let handle = self.pool.acquire()?;
        if let Err(err) = self.registry.bind(handle.clone()) {
            // Programming error (rebind without unbind); return the handle
            // before surfacing so it does not leak from the pool.
            self.pool.release(&handle);
            return Err(err.into());
        }
        Ok(handle)
    }

    /// End the lease: clears the thread binding when it matches and returns
    /// the handle to the pool.
    pub fn release_session(&self, handle: &SessionHandle) {
        if let Ok(current) = self.registry.current() {
            if current.id() == handle.id() {
                self.registry.unbind();
            }
        }
        self.pool.release(handle);
    }

    /// The handle leased to the calling thread.
    pub fn current(&self) -> Result<SessionHandle, RegistryError> {
        self.registry.current()
    }

    /// Action facade over the calling thread's current handle.
    pub fn actions(&self) -> Result<Actions, CoreError> {
        let handle = self.registry.current()?;
        Ok(Actions::new(handle, self.wait.clone(), self.sink.clone()))
    }

    /// Acquire, run `work` against the leased session, release. The lease is
    /// returned on success, on failure, and when `work` unwinds.
    pub fn with_session<T>(
        &self,
        work: impl FnOnce(&Actions) -> Result<T, CoreError>,
    ) -> Result<T, CoreError> {
        let guard = LeaseGuard {
            broker: self,
            handle: self.acquire_session()?,
        };
        let actions = Actions::new(guard.handle.clone(), self.wait.clone(), self.sink.clone());
        work(&actions)
    }

    /// Adaptive wait on a caller-defined condition.
    pub fn until<T>(&self, condition: impl FnMut() -> Option<T>) -> Result<T, WaitError> {
        self.wait.until(condition)
    }

    /// Fixed-budget wait on a caller-defined condition.
    pub fn with_timeout<T>(
        &self,
        condition: impl FnMut() -> Option<T>,
        timeout: Duration,
    ) -> Result<T, WaitError> {
        self.wait.with_timeout(condition, timeout)
    }

    pub fn stats(&self) -> PoolStats {
        self.pool.stats()
    }

    /// Invalidate and destroy every handle; subsequent acquires fail.
    pub fn shutdown(&self) {
        self.pool.shutdown();
    }
}

/// Returns the lease when dropped, so a panicking unit of work does not
/// leak its handle from the pool.
struct LeaseGuard<'a> {
    broker: &'a SessionBroker,
    handle: SessionHandle,
}

impl Drop for LeaseGuard<'_> {
    fn drop(&mut self) {
        self.broker.release_session(&self.handle);
    }
}
