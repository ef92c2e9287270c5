//! Self-healing locator resolution.
//!
//! A [`LocatorResolver`] turns a [`Locator`] into a live node. The direct
//! variant just runs the query; the self-healing variant consults a
//! persisted store of previously-successful alternate queries for the same
//! logical key before surfacing `NotFound`.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::driver::{DriverResult, SessionDriver};
use crate::errors::StoreError;
use crate::events::{CoreEvent, EventSink};
use crate::types::{FailureKind, Locator, NodeRef};

/// Read/write access to the alternate-locator mapping. Population and
/// training of the mapping are external concerns.
pub trait LocatorStore: Send + Sync {
    /// Alternate queries for a logical key, best candidates first.
    fn alternates(&self, key: &str) -> Vec<String>;

    /// Record a query as a known-good alternate for a key.
    fn record(&self, key: &str, query: &str) -> Result<(), StoreError>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    #[serde(default)]
    locators: HashMap<String, Vec<String>>,
}

/// YAML-file-backed locator store. Purely in-memory when no path is set.
#[derive(Debug)]
pub struct FileLocatorStore {
    entries: RwLock<HashMap<String, Vec<String>>>,
    path: Option<PathBuf>,
}

impl FileLocatorStore {
    /// Load from a YAML file; an absent file yields an empty store.
    pub fn load_from_path(path: Option<PathBuf>) -> Result<Self, StoreError> {
        let entries = match &path {
            Some(path) if path.exists() => {
                let raw = fs::read_to_string(path)?;
                let parsed: StoreFile = serde_yaml::from_str(&raw)?;
                parsed.locators
            }
            _ => HashMap::new(),
        };
        Ok(Self {
            entries: RwLock::new(entries),
            path,
        })
    }

    /// Empty in-memory store.
    pub fn in_memory() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            path: None,
        }
    }

    fn persist(&self) -> Result<(), StoreError> {
        let Some(path) = self.path.as_ref() else {
            return Ok(());
        };
        let snapshot = StoreFile {
            locators: self.entries.read().clone(),
        };
        let yaml = serde_yaml::to_string(&snapshot)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, yaml)?;
        Ok(())
    }
}

impl LocatorStore for FileLocatorStore {
    fn alternates(&self, key: &str) -> Vec<String> {
        self.entries.read().get(key).cloned().unwrap_or_default()
    }

    fn record(&self, key: &str, query: &str) -> Result<(), StoreError> {
        {
            let mut guard = self.entries.write();
            let queries = guard.entry(key.to_string()).or_default();
            if !queries.iter().any(|existing| existing == query) {
                queries.push(query.to_string());
            }
        }
        self.persist()
    }
}

/// Resolution capability attached to a handle at construction time. The
/// action facade depends on this interface, not on a concrete variant.
pub trait LocatorResolver: Send + Sync {
    fn resolve(&self, driver: &dyn SessionDriver, locator: &Locator) -> DriverResult<NodeRef>;
}

/// Runs the primary query, nothing else.
#[derive(Default)]
pub struct DirectResolver;

impl LocatorResolver for DirectResolver {
    fn resolve(&self, driver: &dyn SessionDriver, locator: &Locator) -> DriverResult<NodeRef> {
        driver.find(&locator.query)
    }
}

/// On `NotFound`, walks the store's alternates for the locator's key and
/// returns the first that resolves, recording a `LocatorHealed` event.
pub struct SelfHealingResolver {
    store: Arc<dyn LocatorStore>,
    sink: Arc<dyn EventSink>,
}

impl SelfHealingResolver {
    pub fn new(store: Arc<dyn LocatorStore>, sink: Arc<dyn EventSink>) -> Self {
        Self { store, sink }
    }
}

impl LocatorResolver for SelfHealingResolver {
    fn resolve(&self, driver: &dyn SessionDriver, locator: &Locator) -> DriverResult<NodeRef> {
        match driver.find(&locator.query) {
            Ok(node) => Ok(node),
            Err(FailureKind::NotFound) => {
                let alternates = self.store.alternates(&locator.key);
                if alternates.is_empty() {
                    debug!(key = %locator.key, "no alternates known for locator");
                    return Err(FailureKind::NotFound);
                }
                for alternate in &alternates {
                    match driver.find(alternate) {
                        Ok(node) => {
                            self.sink.record(CoreEvent::LocatorHealed {
                                key: locator.key.clone(),
                                alternate: alternate.clone(),
                            });
                            return Ok(node);
                        }
                        Err(FailureKind::NotFound) => continue,
                        Err(kind) => {
                            warn!(key = %locator.key, %alternate, %kind, "alternate lookup failed");
                            return Err(kind);
                        }
                    }
                }
                Err(FailureKind::NotFound)
            }
            Err(kind) => Err(kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::Scripted;
    use crate::events::MemorySink;

    /// Driver that only resolves one known query.
    struct OneQueryDriver {
        known: &'static str,
    }

    impl SessionDriver for OneQueryDriver {
        fn probe(&self) -> bool {
            true
        }
        fn find(&self, query: &str) -> DriverResult<NodeRef> {
            if query == self.known {
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
            Ok(String::new())
        }
        fn navigate(&self, _url: &str) -> DriverResult<()> {
            Ok(())
        }
        fn exec_scripted(&self, _node: NodeRef, _call: Scripted<'_>) -> DriverResult<Option<String>> {
            Ok(None)
        }
        fn close(&self) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn store_roundtrips_through_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("locators.yaml");
        let store = FileLocatorStore::load_from_path(Some(path.clone())).unwrap();
        store.record("login.submit", "button[type=submit]").unwrap();
        store.record("login.submit", "#submit").unwrap();

        let reloaded = FileLocatorStore::load_from_path(Some(path)).unwrap();
        assert_eq!(
            reloaded.alternates("login.submit"),
            vec!["button[type=submit]".to_string(), "#submit".to_string()]
        );
        assert!(reloaded.alternates("unknown").is_empty());
    }

    #[test]
    fn record_deduplicates() {
        let store = FileLocatorStore::in_memory();
        store.record("k", "#a").unwrap();
        store.record("k", "#a").unwrap();
        assert_eq!(store.alternates("k").len(), 1);
    }

    #[test]
    fn healing_resolver_walks_alternates() {
        let driver = OneQueryDriver { known: "#new-id" };
        let store = Arc::new(FileLocatorStore::in_memory());
        store.record("login.submit", "#dead-id").unwrap();
        store.record("login.submit", "#new-id").unwrap();
        let sink = Arc::new(MemorySink::new());
        let resolver = SelfHealingResolver::new(store, sink.clone());

        let locator = Locator::new("login.submit", "#old-id");
        let node = resolver.resolve(&driver, &locator).unwrap();
        assert_eq!(node, NodeRef(1));
        assert_eq!(
            sink.count_matching(|e| matches!(e, CoreEvent::LocatorHealed { .. })),
            1
        );
    }

    #[test]
    fn healing_resolver_surfaces_not_found_when_exhausted() {
        let driver = OneQueryDriver { known: "#present" };
        let store = Arc::new(FileLocatorStore::in_memory());
        store.record("k", "#also-dead").unwrap();
        let resolver = SelfHealingResolver::new(store, Arc::new(MemorySink::new()));
        let outcome = resolver.resolve(&driver, &Locator::new("k", "#dead"));
        assert_eq!(outcome, Err(FailureKind::NotFound));
    }

    #[test]
    fn direct_resolver_does_not_heal() {
        let driver = OneQueryDriver { known: "#present" };
        let outcome = DirectResolver.resolve(&driver, &Locator::css("#absent"));
        assert_eq!(outcome, Err(FailureKind::NotFound));
    }
}
