//! Error types for every layer of the crate.
//!
//! Pool-level and creation errors are fatal to the calling unit of work.
//! Action-level failures carry the operation identity and the last failure
//! tag so callers can tell "never found" from "found but uninteractable".

use thiserror::Error;

use crate::types::{FailureKind, Op, SessionId};

/// Pool lifecycle errors. None of these are retried internally.
#[derive(Debug, Error)]
pub enum PoolError {
    /// No handle became available within the bounded acquire wait.
    #[error("session pool exhausted after waiting {waited_ms}ms")]
    Exhausted { waited_ms: u64 },

    /// The pool has been shut down.
    #[error("session pool is closed")]
    Closed,

    /// The injected session constructor failed. Fatal, never retried.
    #[error("failed to create session: {0}")]
    CreationFailed(String),
}

/// Thread-affinity registry errors.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("no active lease for thread {thread}")]
    NoActiveLease { thread: String },

    /// Rebinding without an intervening unbind is a programming error.
    #[error("thread {thread} already holds a lease for session {session}")]
    AlreadyBound { thread: String, session: SessionId },
}

/// Adaptive-wait errors.
#[derive(Debug, Error)]
pub enum WaitError {
    /// The bounded geometric retry budget ran out.
    #[error("condition not met within {waited_ms}ms (ceiling {ceiling_ms}ms)")]
    ConditionTimeout { waited_ms: u64, ceiling_ms: u64 },
}

/// Failure of one action-facade primitive, after any fallback ran.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("{op} failed on '{locator}': stale element reference")]
    Stale { op: Op, locator: String },

    #[error("{op} failed on '{locator}': interaction intercepted")]
    Intercepted { op: Op, locator: String },

    #[error("{op} failed on '{locator}': element not found")]
    ElementNotFound { op: Op, locator: String },

    /// The readiness wait exhausted its bounded budget, or the driver itself
    /// reported a timeout. Surfaced unchanged; never retried at this layer.
    #[error("{op} timed out on '{locator}'")]
    Timeout {
        op: Op,
        locator: String,
        #[source]
        source: Option<WaitError>,
    },

    /// The session handle was invalidated (pool shutdown or explicit
    /// invalidation) while still leased.
    #[error("{op} failed on '{locator}': session is no longer alive")]
    SessionGone { op: Op, locator: String },
}

impl ActionError {
    pub(crate) fn from_failure(op: Op, locator: &crate::types::Locator, kind: FailureKind) -> Self {
        let locator = locator.to_string();
        match kind {
            FailureKind::Stale => ActionError::Stale { op, locator },
            FailureKind::Intercepted => ActionError::Intercepted { op, locator },
            FailureKind::NotFound => ActionError::ElementNotFound { op, locator },
            FailureKind::Timeout => ActionError::Timeout {
                op,
                locator,
                source: None,
            },
        }
    }

    /// The failure tag this error surfaces, if any.
    pub fn kind(&self) -> Option<FailureKind> {
        match self {
            ActionError::Stale { .. } => Some(FailureKind::Stale),
            ActionError::Intercepted { .. } => Some(FailureKind::Intercepted),
            ActionError::ElementNotFound { .. } => Some(FailureKind::NotFound),
            ActionError::Timeout { .. } => Some(FailureKind::Timeout),
            ActionError::SessionGone { .. } => None,
        }
    }

    /// The operation that failed.
    pub fn op(&self) -> Op {
        match self {
            ActionError::Stale { op, .. }
            | ActionError::Intercepted { op, .. }
            | ActionError::ElementNotFound { op, .. }
            | ActionError::Timeout { op, .. }
            | ActionError::SessionGone { op, .. } => *op,
        }
    }
}

/// Alternate-locator store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read locator store: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse locator store: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Configuration file errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
    /// A value parsed but cannot be honored (for example a growth factor
    /// that would never reach the wait ceiling).
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level error for broker entry points.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Pool(#[from] PoolError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Wait(#[from] WaitError),
    #[error(transparent)]
    Action(#[from] ActionError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
