//! Core identity and classification types shared across the crate.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of one live automation session.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A logical element locator: a stable key naming the element plus the
/// concrete query the driver resolves. The key is what the alternate-locator
/// store indexes on when the query drifts.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Locator {
    pub key: String,
    pub query: String,
}

impl Locator {
    pub fn new(key: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            query: query.into(),
        }
    }

    /// Locator whose logical key is the query itself (anonymous elements).
    pub fn css(query: impl Into<String>) -> Self {
        let query = query.into();
        Self {
            key: query.clone(),
            query,
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.key == self.query {
            write!(f, "{}", self.query)
        } else {
            write!(f, "{} ({})", self.key, self.query)
        }
    }
}

/// Opaque reference to a resolved node inside a session's document.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct NodeRef(pub u64);

/// Identity of a primitive operation, carried on every surfaced failure.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Op {
    Locate,
    Click,
    TypeText,
    ReadState,
    Navigate,
    ScrollIntoView,
    Hover,
    DoubleClick,
    DragAndDrop,
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Op::Locate => "locate",
            Op::Click => "click",
            Op::TypeText => "type_text",
            Op::ReadState => "read_state",
            Op::Navigate => "navigate",
            Op::ScrollIntoView => "scroll_into_view",
            Op::Hover => "hover",
            Op::DoubleClick => "double_click",
            Op::DragAndDrop => "drag_and_drop",
        };
        f.write_str(name)
    }
}

/// Classified failure of one driver-level attempt. The fallback dispatcher
/// matches on this tag.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The node reference no longer corresponds to a live DOM node.
    Stale,
    /// Something overlays the target; the interaction layer refused.
    Intercepted,
    /// The query resolved to nothing.
    NotFound,
    /// A bounded wait ran out.
    Timeout,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::Stale => "stale",
            FailureKind::Intercepted => "intercepted",
            FailureKind::NotFound => "not_found",
            FailureKind::Timeout => "timeout",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_ids_are_unique() {
        assert_ne!(SessionId::new(), SessionId::new());
    }

    #[test]
    fn css_locator_displays_query_once() {
        let locator = Locator::css("#submit");
        assert_eq!(locator.to_string(), "#submit");
        let named = Locator::new("login.submit", "#submit");
        assert_eq!(named.to_string(), "login.submit (#submit)");
    }
}
