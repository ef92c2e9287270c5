//! The injected session abstraction.
//!
//! The pool and action layers depend only on [`SessionDriver`]; which
//! browser or transport backs it is a configuration concern outside this
//! crate. All methods are blocking with driver-internal timeouts and return
//! classified failures via [`FailureKind`].

use crate::types::{FailureKind, NodeRef};

/// Result of one driver-level attempt.
pub type DriverResult<T> = Result<T, FailureKind>;

/// A scripted invocation executed directly on a resolved node, bypassing the
/// interaction layer. This is the fallback channel for intercepted
/// interactions and for operations (scrolling) that are script-only.
#[derive(Clone, Copy, Debug)]
pub enum Scripted<'a> {
    Click,
    SetValue(&'a str),
    ReadText,
    ScrollIntoView,
    Hover,
    DoubleClick,
    DragTo(NodeRef),
}

/// One live external automation session.
///
/// Implementations must be shareable across the lease handoffs the pool
/// performs, but a session is never *driven* by two threads at once (the
/// lease invariant guarantees this), so no internal serialization of
/// element operations is required.
pub trait SessionDriver: Send + Sync {
    /// Cheap liveness probe used before a pooled handle is reused.
    fn probe(&self) -> bool;

    /// Resolve a concrete query to a node.
    fn find(&self, query: &str) -> DriverResult<NodeRef>;

    /// Visible in the layout (readiness precondition for reads).
    fn is_visible(&self, node: NodeRef) -> DriverResult<bool>;

    /// Visible, enabled, and not obscured (readiness precondition for
    /// clicks and typing).
    fn is_interactable(&self, node: NodeRef) -> DriverResult<bool>;

    fn click(&self, node: NodeRef) -> DriverResult<()>;

    /// Move the pointer over the node.
    fn hover(&self, node: NodeRef) -> DriverResult<()>;

    fn double_click(&self, node: NodeRef) -> DriverResult<()>;

    /// Drag `source` onto `target`.
    fn drag_and_drop(&self, source: NodeRef, target: NodeRef) -> DriverResult<()>;

    /// Replace the node's value with `text`.
    fn type_text(&self, node: NodeRef, text: &str) -> DriverResult<()>;

    fn read_text(&self, node: NodeRef) -> DriverResult<String>;

    /// Drive the session to a new document.
    fn navigate(&self, url: &str) -> DriverResult<()>;

    /// Execute a scripted invocation on the node. Returns the script's
    /// textual result where one exists ([`Scripted::ReadText`]).
    fn exec_scripted(&self, node: NodeRef, call: Scripted<'_>) -> DriverResult<Option<String>>;

    /// Tear the session down. Best-effort; the factory logs and swallows
    /// errors so pool shutdown always completes.
    fn close(&self) -> anyhow::Result<()>;
}
