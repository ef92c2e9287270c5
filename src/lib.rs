//! Pooled browser-automation sessions with adaptive waits and self-healing
//! actions.
//!
//! Three subsystems, leaf-first:
//!
//! - [`waiting::AdaptiveWait`] polls a condition with geometrically
//!   increasing timeout budgets up to a hard ceiling.
//! - [`pool::SessionPool`] lends exclusive session handles to worker
//!   threads, bounded by `max_total`/`max_idle`, with all bookkeeping in one
//!   critical section and all session I/O outside it.
//! - [`actions::Actions`] executes primitives (locate, click, type, read)
//!   with a primary strategy plus classified one-shot fallbacks for stale
//!   references, intercepted interactions, and locator drift.
//!
//! [`broker::SessionBroker`] wires them into a single context object:
//!
//! ```no_run
//! use driverpool::{CoreConfig, Locator, SessionBroker};
//! # fn start_session() -> anyhow::Result<Box<dyn driverpool::SessionDriver>> { unimplemented!() }
//!
//! # fn main() -> Result<(), driverpool::CoreError> {
//! let broker = SessionBroker::new(CoreConfig::default(), Box::new(start_session))?;
//! broker.with_session(|actions| {
//!     actions.navigate("https://example.test/login")?;
//!     actions.type_text(&Locator::new("login.user", "#user"), "alice")?;
//!     actions.click(&Locator::new("login.submit", "#submit"))?;
//!     Ok(())
//! })?;
//! # Ok(())
//! # }
//! ```

pub mod actions;
pub mod broker;
pub mod config;
pub mod driver;
pub mod errors;
pub mod events;
pub mod factory;
pub mod handle;
pub mod heal;
pub mod pool;
pub mod registry;
pub mod types;
pub mod waiting;

pub use actions::Actions;
pub use broker::SessionBroker;
pub use config::{CoreConfig, HealConfig, PoolConfig, WaitConfig};
pub use driver::{DriverResult, Scripted, SessionDriver};
pub use errors::{
    ActionError, ConfigError, CoreError, PoolError, RegistryError, StoreError, WaitError,
};
pub use events::{CoreEvent, EventSink, MemorySink, TracingSink};
pub use factory::{HandleFactory, SessionConstructor, SessionFactory};
pub use handle::SessionHandle;
pub use heal::{DirectResolver, FileLocatorStore, LocatorResolver, LocatorStore, SelfHealingResolver};
pub use pool::{PoolStats, SessionPool};
pub use registry::ThreadAffinityRegistry;
pub use types::{FailureKind, Locator, NodeRef, Op, SessionId};
pub use waiting::AdaptiveWait;
