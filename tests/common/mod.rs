//! Shared fake browser driver for integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use driverpool::{DriverResult, FailureKind, NodeRef, Scripted, SessionDriver};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// Counters shared across every driver a constructor produces.
#[derive(Default)]
pub struct DriverCounters {
    pub started: AtomicUsize,
    pub closed: AtomicUsize,
}

/// In-memory stand-in for one browser session.
pub struct FakeBrowser {
    counters: Arc<DriverCounters>,
    live: AtomicBool,
    /// Queries that resolve; empty means every query resolves.
    known_queries: Vec<String>,
}

impl FakeBrowser {
    pub fn new(counters: Arc<DriverCounters>) -> Self {
        counters.started.fetch_add(1, Ordering::SeqCst);
        Self {
            counters,
            live: AtomicBool::new(true),
            known_queries: Vec::new(),
        }
    }

    pub fn resolving_only(counters: Arc<DriverCounters>, queries: &[&str]) -> Self {
        let mut browser = Self::new(counters);
        browser.known_queries = queries.iter().map(|q| q.to_string()).collect();
        browser
    }
}

impl SessionDriver for FakeBrowser {
    fn probe(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }
    fn find(&self, query: &str) -> DriverResult<NodeRef> {
        if self.known_queries.is_empty() || self.known_queries.iter().any(|q| q == query) {
            Ok(NodeRef(1))
        } else {
            Err(FailureKind::NotFound)
        }
    }
    fn is_visible(&self, _node: NodeRef) -> DriverResult<bool> {
        Ok(true)
    }
    fn is_interactable(&self, _node: NodeRef) -> DriverResult<bool> {
        Ok(true)
    }
    fn click(&self, _node: NodeRef) -> DriverResult<()> {
        Ok(())
    }
    fn hover(&self, _node: NodeRef) -> DriverResult<()> {
        Ok(())
    }
    fn double_click(&self, _node: NodeRef) -> DriverResult<()> {
        Ok(())
    }
    fn drag_and_drop(&self, _source: NodeRef, _target: NodeRef) -> DriverResult<()> {
        Ok(())
    }
    fn type_text(&self, _node: NodeRef, _text: &str) -> DriverResult<()> {
        Ok(())
    }
    fn read_text(&self, _node: NodeRef) -> DriverResult<String> {
        Ok("ok".to_string())
    }
    fn navigate(&self, _url: &str) -> DriverResult<()> {
        Ok(())
    }
    fn exec_scripted(&self, _node: NodeRef, _call: Scripted<'_>) -> DriverResult<Option<String>> {
        Ok(None)
    }
    fn close(&self) -> anyhow::Result<()> {
        self.live.store(false, Ordering::SeqCst);
        self.counters.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
