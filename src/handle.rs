//! Session handles.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::driver::{DriverResult, SessionDriver};
use crate::heal::LocatorResolver;
use crate::types::{Locator, NodeRef, SessionId};

struct HandleInner {
    id: SessionId,
    driver: Box<dyn SessionDriver>,
    resolver: Box<dyn LocatorResolver>,
    alive: AtomicBool,
    self_healing: bool,
}

/// One live automation session.
///
/// Cloning shares the underlying session; the pool keeps a clone of every
/// on-loan handle so shutdown can invalidate handles it no longer physically
/// holds. Exclusivity of *use* is the lease invariant's job, not the type's.
#[derive(Clone)]
pub struct SessionHandle {
    inner: Arc<HandleInner>,
}

impl SessionHandle {
    pub fn new(
        driver: Box<dyn SessionDriver>,
        resolver: Box<dyn LocatorResolver>,
        self_healing: bool,
    ) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                id: SessionId::new(),
                driver,
                resolver,
                alive: AtomicBool::new(true),
                self_healing,
            }),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.inner.id
    }

    /// False once the pool has invalidated this handle (shutdown or failed
    /// validation). Operations against a dead handle fail with
    /// `ActionError::SessionGone`.
    pub fn is_alive(&self) -> bool {
        self.inner.alive.load(Ordering::Acquire)
    }

    pub(crate) fn invalidate(&self) {
        self.inner.alive.store(false, Ordering::Release);
    }

    pub fn self_healing(&self) -> bool {
        self.inner.self_healing
    }

    pub fn driver(&self) -> &dyn SessionDriver {
        self.inner.driver.as_ref()
    }

    /// Resolve a locator through this handle's resolution capability.
    pub fn resolve(&self, locator: &Locator) -> DriverResult<NodeRef> {
        self.inner.resolver.resolve(self.driver(), locator)
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.inner.id)
            .field("alive", &self.is_alive())
            .field("self_healing", &self.inner.self_healing)
            .finish()
    }
}
