//! Per-thread handle affinity.
//!
//! Gives call sites a zero-argument "current handle" accessor while a lease
//! is active, without process-wide singletons: the registry is owned by the
//! broker and keyed on the calling thread's id.

use std::thread::{self, ThreadId};

use dashmap::DashMap;

use crate::errors::RegistryError;
use crate::handle::SessionHandle;

/// Binding of worker threads to the handle each currently owns.
#[derive(Default)]
pub struct ThreadAffinityRegistry {
    slots: DashMap<ThreadId, SessionHandle>,
}

impl ThreadAffinityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `handle` to the calling thread. Rebinding without an intervening
    /// [`unbind`](Self::unbind) fails fast rather than silently overwriting.
    pub fn bind(&self, handle: SessionHandle) -> Result<(), RegistryError> {
        let thread = thread::current().id();
        if let Some(existing) = self.slots.get(&thread) {
            return Err(RegistryError::AlreadyBound {
                thread: format!("{thread:?}"),
                session: existing.id().clone(),
            });
        }
        self.slots.insert(thread, handle);
        Ok(())
    }

    /// The handle bound to the calling thread.
    pub fn current(&self) -> Result<SessionHandle, RegistryError> {
        let thread = thread::current().id();
        self.slots
            .get(&thread)
            .map(|entry| entry.value().clone())
            .ok_or(RegistryError::NoActiveLease {
                thread: format!("{thread:?}"),
            })
    }

    /// Clear the calling thread's binding.
    pub fn unbind(&self) -> Option<SessionHandle> {
        self.slots
            .remove(&thread::current().id())
            .map(|(_, handle)| handle)
    }
}
