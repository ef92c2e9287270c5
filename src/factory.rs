//! Session handle creation, validation, and teardown.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::driver::SessionDriver;
use crate::errors::PoolError;
use crate::events::{CoreEvent, EventSink};
use crate::handle::SessionHandle;
use crate::heal::{DirectResolver, LocatorStore, SelfHealingResolver};

/// How to start one external automation session. Injected, not hardcoded:
/// transport and browser choice live outside the crate.
pub type SessionConstructor = Box<dyn Fn() -> anyhow::Result<Box<dyn SessionDriver>> + Send + Sync>;

/// Pool-facing handle lifecycle.
pub trait HandleFactory: Send + Sync {
    /// Create a fresh handle. A constructor failure (driver/binary mismatch,
    /// dead transport) is fatal and never retried here.
    fn create(&self) -> Result<SessionHandle, PoolError>;

    /// Cheap liveness check before a pooled handle is handed out again.
    fn validate(&self, handle: &SessionHandle) -> bool;

    /// Invalidate and tear down. Best-effort: close errors are logged and
    /// swallowed so pool shutdown completes even if one session hangs.
    fn destroy(&self, handle: &SessionHandle);
}

/// Default factory over an injected constructor, optionally layering the
/// self-healing resolution capability onto every handle it creates.
pub struct SessionFactory {
    constructor: SessionConstructor,
    heal_store: Option<Arc<dyn LocatorStore>>,
    sink: Arc<dyn EventSink>,
}

impl SessionFactory {
    pub fn new(constructor: SessionConstructor, sink: Arc<dyn EventSink>) -> Self {
        Self {
            constructor,
            heal_store: None,
            sink,
        }
    }

    /// Wrap freshly created handles with self-healing resolution backed by
    /// `store`.
    pub fn with_healing(mut self, store: Arc<dyn LocatorStore>) -> Self {
        self.heal_store = Some(store);
        self
    }
}

impl HandleFactory for SessionFactory {
    fn create(&self) -> Result<SessionHandle, PoolError> {
        let driver =
            (self.constructor)().map_err(|err| PoolError::CreationFailed(format!("{err:#}")))?;
        let handle = match &self.heal_store {
            Some(store) => SessionHandle::new(
                driver,
                Box::new(SelfHealingResolver::new(store.clone(), self.sink.clone())),
                true,
            ),
            None => SessionHandle::new(driver, Box::new(DirectResolver), false),
        };
        debug!(session = %handle.id(), healing = handle.self_healing(), "session created");
        self.sink.record(CoreEvent::SessionCreated {
            session: handle.id().clone(),
        });
        Ok(handle)
    }

    fn validate(&self, handle: &SessionHandle) -> bool {
        handle.is_alive() && handle.driver().probe()
    }

    fn destroy(&self, handle: &SessionHandle) {
        handle.invalidate();
        if let Err(err) = handle.driver().close() {
            warn!(session = %handle.id(), error = %err, "session close failed");
        }
        self.sink.record(CoreEvent::SessionDestroyed {
            session: handle.id().clone(),
        });
    }
}
