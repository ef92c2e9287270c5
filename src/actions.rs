//! Primitive operations against the current session handle.
//!
//! Every element primitive runs a two-tier protocol: wait (adaptively) for
//! the element-level precondition, perform the native operation, and on a
//! classified failure dispatch at most one fallback:
//!
//! - `Intercepted` — re-issue via the driver's scripted channel, bypassing
//!   the interaction layer.
//! - `Stale` — re-resolve the locator and retry the primary path once.
//! - `NotFound` — healing already ran inside the handle's resolver; what
//!   survives resolution surfaces as `ElementNotFound`.
//! - `Timeout` — surfaced unchanged; the wait engine's bound is the only
//!   retry budget.
//!
//! A fallback that itself fails surfaces the fallback's failure, so callers
//! can distinguish "never found" from "found but uninteractable".

use std::sync::Arc;

use tracing::{debug, info};

use crate::driver::{DriverResult, Scripted, SessionDriver};
use crate::errors::{ActionError, WaitError};
use crate::events::{CoreEvent, EventSink};
use crate::handle::SessionHandle;
use crate::types::{FailureKind, Locator, NodeRef, Op};
use crate::waiting::AdaptiveWait;

/// Element-level precondition waited on before the native operation.
#[derive(Clone, Copy, Debug)]
enum Readiness {
    Interactable,
    Visible,
}

/// Outcome of one primary-path attempt, before fallback dispatch.
enum Attempt<T> {
    Done(T),
    Failed(FailureKind),
    TimedOut(WaitError),
}

/// Action facade over one leased session handle.
///
/// The lease invariant guarantees a handle is driven by one thread at a
/// time, so the facade holds no locks of its own.
pub struct Actions {
    handle: SessionHandle,
    wait: AdaptiveWait,
    sink: Arc<dyn EventSink>,
}

impl Actions {
    pub fn new(handle: SessionHandle, wait: AdaptiveWait, sink: Arc<dyn EventSink>) -> Self {
        Self { handle, wait, sink }
    }

    pub fn handle(&self) -> &SessionHandle {
        &self.handle
    }

    /// Resolve a locator to a live node (self-healing inside the resolver
    /// when the handle carries that capability).
    pub fn locate(&self, locator: &Locator) -> Result<NodeRef, ActionError> {
        self.ensure_alive(Op::Locate, locator)?;
        self.resolve(Op::Locate, locator)
    }

    /// Click, waiting for the target to become interactable.
    pub fn click(&self, locator: &Locator) -> Result<(), ActionError> {
        info!(%locator, "click");
        self.run(
            Op::Click,
            locator,
            Readiness::Interactable,
            |driver, node| driver.click(node),
            |driver, node| driver.exec_scripted(node, Scripted::Click).map(|_| ()),
        )
    }

    /// Replace the target's value with `text`, waiting for interactability.
    pub fn type_text(&self, locator: &Locator, text: &str) -> Result<(), ActionError> {
        info!(%locator, chars = text.len(), "type_text");
        self.run(
            Op::TypeText,
            locator,
            Readiness::Interactable,
            |driver, node| driver.type_text(node, text),
            |driver, node| {
                driver
                    .exec_scripted(node, Scripted::SetValue(text))
                    .map(|_| ())
            },
        )
    }

    /// Read the target's visible text, waiting for visibility.
    pub fn read_state(&self, locator: &Locator) -> Result<String, ActionError> {
        debug!(%locator, "read_state");
        self.run(
            Op::ReadState,
            locator,
            Readiness::Visible,
            |driver, node| driver.read_text(node),
            |driver, node| {
                driver
                    .exec_scripted(node, Scripted::ReadText)
                    .map(Option::unwrap_or_default)
            },
        )
    }

    /// Move the pointer over the target, waiting for visibility.
    pub fn hover(&self, locator: &Locator) -> Result<(), ActionError> {
        debug!(%locator, "hover");
        self.run(
            Op::Hover,
            locator,
            Readiness::Visible,
            |driver, node| driver.hover(node),
            |driver, node| driver.exec_scripted(node, Scripted::Hover).map(|_| ()),
        )
    }

    /// Double-click, waiting for the target to become interactable.
    pub fn double_click(&self, locator: &Locator) -> Result<(), ActionError> {
        info!(%locator, "double_click");
        self.run(
            Op::DoubleClick,
            locator,
            Readiness::Interactable,
            |driver, node| driver.double_click(node),
            |driver, node| {
                driver
                    .exec_scripted(node, Scripted::DoubleClick)
                    .map(|_| ())
            },
        )
    }

    /// Drag the source element onto the target, waiting for the source to
    /// become interactable. Both locators are re-resolved on a stale retry.
    pub fn drag_and_drop(&self, source: &Locator, target: &Locator) -> Result<(), ActionError> {
        let op = Op::DragAndDrop;
        info!(%source, %target, "drag_and_drop");
        self.ensure_alive(op, source)?;
        let src = self.resolve(op, source)?;
        let dst = self.resolve(op, target)?;
        match self.attempt(src, Readiness::Interactable, &|driver, node| {
            driver.drag_and_drop(node, dst)
        }) {
            Attempt::Done(()) => Ok(()),
            Attempt::TimedOut(err) => Err(ActionError::Timeout {
                op,
                locator: source.to_string(),
                source: Some(err),
            }),
            Attempt::Failed(FailureKind::Intercepted) => {
                self.record_fallback(op, FailureKind::Intercepted);
                self.handle
                    .driver()
                    .exec_scripted(src, Scripted::DragTo(dst))
                    .map(|_| ())
                    .map_err(|kind| ActionError::from_failure(op, source, kind))
            }
            Attempt::Failed(FailureKind::Stale) => {
                self.record_fallback(op, FailureKind::Stale);
                let src = self.resolve(op, source)?;
                let dst = self.resolve(op, target)?;
                match self.attempt(src, Readiness::Interactable, &|driver, node| {
                    driver.drag_and_drop(node, dst)
                }) {
                    Attempt::Done(()) => Ok(()),
                    Attempt::TimedOut(err) => Err(ActionError::Timeout {
                        op,
                        locator: source.to_string(),
                        source: Some(err),
                    }),
                    Attempt::Failed(kind) => Err(ActionError::from_failure(op, source, kind)),
                }
            }
            Attempt::Failed(kind) => Err(ActionError::from_failure(op, source, kind)),
        }
    }

    /// Non-waiting probe: is the element currently displayed?
    pub fn is_displayed(&self, locator: &Locator) -> Result<bool, ActionError> {
        self.ensure_alive(Op::ReadState, locator)?;
        let node = self.resolve(Op::ReadState, locator)?;
        self.handle
            .driver()
            .is_visible(node)
            .map_err(|kind| ActionError::from_failure(Op::ReadState, locator, kind))
    }

    /// Bring the target into the viewport via the scripted channel.
    pub fn scroll_into_view(&self, locator: &Locator) -> Result<(), ActionError> {
        debug!(%locator, "scroll_into_view");
        self.run(
            Op::ScrollIntoView,
            locator,
            Readiness::Visible,
            |driver, node| {
                driver
                    .exec_scripted(node, Scripted::ScrollIntoView)
                    .map(|_| ())
            },
            |driver, node| {
                driver
                    .exec_scripted(node, Scripted::ScrollIntoView)
                    .map(|_| ())
            },
        )
    }

    /// Drive the session to a URL. No element precondition; driver timeouts
    /// surface as `ActionError::Timeout`.
    pub fn navigate(&self, url: &str) -> Result<(), ActionError> {
        let locator = Locator::css(url);
        info!(url, "navigate");
        self.ensure_alive(Op::Navigate, &locator)?;
        self.handle
            .driver()
            .navigate(url)
            .map_err(|kind| ActionError::from_failure(Op::Navigate, &locator, kind))
    }

    fn ensure_alive(&self, op: Op, locator: &Locator) -> Result<(), ActionError> {
        if self.handle.is_alive() {
            Ok(())
        } else {
            Err(ActionError::SessionGone {
                op,
                locator: locator.to_string(),
            })
        }
    }

    fn resolve(&self, op: Op, locator: &Locator) -> Result<NodeRef, ActionError> {
        self.handle
            .resolve(locator)
            .map_err(|kind| ActionError::from_failure(op, locator, kind))
    }

    /// The two-tier execution protocol shared by the element primitives.
    fn run<T>(
        &self,
        op: Op,
        locator: &Locator,
        readiness: Readiness,
        primary: impl Fn(&dyn SessionDriver, NodeRef) -> DriverResult<T>,
        scripted: impl Fn(&dyn SessionDriver, NodeRef) -> DriverResult<T>,
    ) -> Result<T, ActionError> {
        self.ensure_alive(op, locator)?;
        let node = self.resolve(op, locator)?;
        match self.attempt(node, readiness, &primary) {
            Attempt::Done(value) => Ok(value),
            Attempt::TimedOut(err) => Err(ActionError::Timeout {
                op,
                locator: locator.to_string(),
                source: Some(err),
            }),
            Attempt::Failed(FailureKind::Intercepted) => {
                self.record_fallback(op, FailureKind::Intercepted);
                scripted(self.handle.driver(), node)
                    .map_err(|kind| ActionError::from_failure(op, locator, kind))
            }
            Attempt::Failed(FailureKind::Stale) => {
                self.record_fallback(op, FailureKind::Stale);
                let fresh = self.resolve(op, locator)?;
                match self.attempt(fresh, readiness, &primary) {
                    Attempt::Done(value) => Ok(value),
                    Attempt::TimedOut(err) => Err(ActionError::Timeout {
                        op,
                        locator: locator.to_string(),
                        source: Some(err),
                    }),
                    // Second failure surfaces as-is: fallbacks run at most once.
                    Attempt::Failed(kind) => Err(ActionError::from_failure(op, locator, kind)),
                }
            }
            Attempt::Failed(kind) => Err(ActionError::from_failure(op, locator, kind)),
        }
    }

    /// Primary path: adaptive readiness wait, then the native operation.
    fn attempt<T>(
        &self,
        node: NodeRef,
        readiness: Readiness,
        primary: &impl Fn(&dyn SessionDriver, NodeRef) -> DriverResult<T>,
    ) -> Attempt<T> {
        let driver = self.handle.driver();
        let ready = self.wait.until(|| {
            let probe = match readiness {
                Readiness::Interactable => driver.is_interactable(node),
                Readiness::Visible => driver.is_visible(node),
            };
            match probe {
                Ok(true) => Some(Ok(())),
                Ok(false) => None,
                // Hard failure while waiting aborts the wait immediately and
                // goes to fallback dispatch.
                Err(kind) => Some(Err(kind)),
            }
        });
        match ready {
            Ok(Ok(())) => {}
            Ok(Err(kind)) => return Attempt::Failed(kind),
            Err(err) => return Attempt::TimedOut(err),
        }
        match primary(driver, node) {
            Ok(value) => Attempt::Done(value),
            Err(kind) => Attempt::Failed(kind),
        }
    }

    fn record_fallback(&self, op: Op, kind: FailureKind) {
        debug!(%op, %kind, "dispatching fallback");
        self.sink.record(CoreEvent::FallbackTriggered { op, kind });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WaitConfig;
    use crate::events::MemorySink;
    use crate::heal::{DirectResolver, FileLocatorStore, LocatorStore, SelfHealingResolver};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use parking_lot::Mutex;

    #[derive(Default)]
    struct FakeState {
        find_queue: Mutex<VecDeque<DriverResult<NodeRef>>>,
        click_queue: Mutex<VecDeque<DriverResult<()>>>,
        gesture_queue: Mutex<VecDeque<DriverResult<()>>>,
        interactable: Mutex<Option<DriverResult<bool>>>,
        scripted_result: Mutex<Option<DriverResult<Option<String>>>>,
        find_calls: AtomicUsize,
        scripted_calls: AtomicUsize,
    }

    /// Driver whose per-method outcomes are scripted by the test.
    #[derive(Clone, Default)]
    struct FakeDriver {
        state: Arc<FakeState>,
    }

    impl SessionDriver for FakeDriver {
        fn probe(&self) -> bool {
            true
        }
        fn find(&self, _query: &str) -> DriverResult<NodeRef> {
            self.state.find_calls.fetch_add(1, Ordering::SeqCst);
            self.state
                .find_queue
                .lock()
                .pop_front()
                .unwrap_or(Ok(NodeRef(1)))
        }
        fn is_visible(&self, node: NodeRef) -> DriverResult<bool> {
            self.is_interactable(node)
        }
        fn is_interactable(&self, _node: NodeRef) -> DriverResult<bool> {
            self.state.interactable.lock().clone().unwrap_or(Ok(true))
        }
        fn click(&self, _node: NodeRef) -> DriverResult<()> {
            self.state.click_queue.lock().pop_front().unwrap_or(Ok(()))
        }
        fn hover(&self, _node: NodeRef) -> DriverResult<()> {
            self.state
                .gesture_queue
                .lock()
                .pop_front()
                .unwrap_or(Ok(()))
        }
        fn double_click(&self, _node: NodeRef) -> DriverResult<()> {
            self.state
                .gesture_queue
                .lock()
                .pop_front()
                .unwrap_or(Ok(()))
        }
        fn drag_and_drop(&self, _source: NodeRef, _target: NodeRef) -> DriverResult<()> {
            self.state
                .gesture_queue
                .lock()
                .pop_front()
                .unwrap_or(Ok(()))
        }
        fn type_text(&self, _node: NodeRef, _text: &str) -> DriverResult<()> {
            Ok(())
        }
        fn read_text(&self, _node: NodeRef) -> DriverResult<String> {
            Ok("ready".to_string())
        }
        fn navigate(&self, _url: &str) -> DriverResult<()> {
            Ok(())
        }
        fn exec_scripted(&self, _node: NodeRef, _call: Scripted<'_>) -> DriverResult<Option<String>> {
            self.state.scripted_calls.fetch_add(1, Ordering::SeqCst);
            self.state
                .scripted_result
                .lock()
                .clone()
                .unwrap_or(Ok(None))
        }
        fn close(&self) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn fast_wait(sink: Arc<MemorySink>) -> AdaptiveWait {
        AdaptiveWait::new(
            &WaitConfig {
                initial_ms: 5,
                ceiling_ms: 40,
                growth_factor: 2,
                poll_interval_ms: 1,
            },
            sink,
        )
    }

    fn facade(driver: FakeDriver) -> (Actions, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let handle = SessionHandle::new(Box::new(driver), Box::new(DirectResolver), false);
        let actions = Actions::new(handle, fast_wait(sink.clone()), sink.clone());
        (actions, sink)
    }

    fn fallback_count(sink: &MemorySink) -> usize {
        sink.count_matching(|e| matches!(e, CoreEvent::FallbackTriggered { .. }))
    }

    #[test]
    fn intercepted_click_falls_back_to_scripted_invocation() {
        let driver = FakeDriver::default();
        driver
            .state
            .click_queue
            .lock()
            .push_back(Err(FailureKind::Intercepted));
        let state = driver.state.clone();
        let (actions, sink) = facade(driver);

        actions.click(&Locator::css("#submit")).unwrap();
        assert_eq!(state.scripted_calls.load(Ordering::SeqCst), 1);
        assert_eq!(fallback_count(&sink), 1);
    }

    #[test]
    fn failed_scripted_fallback_surfaces_fallback_failure() {
        let driver = FakeDriver::default();
        driver
            .state
            .click_queue
            .lock()
            .push_back(Err(FailureKind::Intercepted));
        *driver.state.scripted_result.lock() = Some(Err(FailureKind::NotFound));
        let (actions, _sink) = facade(driver);

        let err = actions.click(&Locator::css("#submit")).unwrap_err();
        // The fallback's failure, not the original interception.
        assert!(matches!(err, ActionError::ElementNotFound { .. }));
    }

    #[test]
    fn stale_click_re_resolves_and_retries_once() {
        let driver = FakeDriver::default();
        driver
            .state
            .click_queue
            .lock()
            .push_back(Err(FailureKind::Stale));
        let state = driver.state.clone();
        let (actions, sink) = facade(driver);

        actions.click(&Locator::css("#submit")).unwrap();
        // One resolve for the primary path, one for the stale retry.
        assert_eq!(state.find_calls.load(Ordering::SeqCst), 2);
        assert_eq!(fallback_count(&sink), 1);
    }

    #[test]
    fn second_stale_failure_surfaces() {
        let driver = FakeDriver::default();
        {
            let mut clicks = driver.state.click_queue.lock();
            clicks.push_back(Err(FailureKind::Stale));
            clicks.push_back(Err(FailureKind::Stale));
        }
        let (actions, sink) = facade(driver);

        let err = actions.click(&Locator::css("#submit")).unwrap_err();
        assert!(matches!(err, ActionError::Stale { .. }));
        assert_eq!(fallback_count(&sink), 1);
    }

    #[test]
    fn readiness_timeout_surfaces_without_fallback() {
        let driver = FakeDriver::default();
        *driver.state.interactable.lock() = Some(Ok(false));
        let state = driver.state.clone();
        let (actions, sink) = facade(driver);

        let err = actions.click(&Locator::css("#slow")).unwrap_err();
        assert!(matches!(err, ActionError::Timeout { .. }));
        assert_eq!(err.kind(), Some(FailureKind::Timeout));
        assert_eq!(fallback_count(&sink), 0);
        assert_eq!(state.scripted_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn stale_detected_during_readiness_wait_goes_to_fallback() {
        let driver = FakeDriver::default();
        *driver.state.interactable.lock() = Some(Err(FailureKind::Stale));
        let (actions, _sink) = facade(driver);

        // The retry hits the same stale readiness probe and surfaces it.
        let err = actions.click(&Locator::css("#gone")).unwrap_err();
        assert!(matches!(err, ActionError::Stale { .. }));
    }

    #[test]
    fn not_found_without_healing_is_element_not_found() {
        let driver = FakeDriver::default();
        driver
            .state
            .find_queue
            .lock()
            .push_back(Err(FailureKind::NotFound));
        let (actions, _sink) = facade(driver);

        let err = actions.click(&Locator::css("#missing")).unwrap_err();
        assert!(matches!(err, ActionError::ElementNotFound { .. }));
    }

    #[test]
    fn not_found_with_healing_resolves_via_alternate() {
        let driver = FakeDriver::default();
        {
            let mut finds = driver.state.find_queue.lock();
            finds.push_back(Err(FailureKind::NotFound)); // primary query
            finds.push_back(Ok(NodeRef(7))); // stored alternate
        }
        let sink = Arc::new(MemorySink::new());
        let store = Arc::new(FileLocatorStore::in_memory());
        store.record("login.submit", "#submit-v2").unwrap();
        let handle = SessionHandle::new(
            Box::new(driver),
            Box::new(SelfHealingResolver::new(store, sink.clone())),
            true,
        );
        let actions = Actions::new(handle, fast_wait(sink.clone()), sink.clone());

        actions
            .click(&Locator::new("login.submit", "#submit"))
            .unwrap();
        assert_eq!(
            sink.count_matching(|e| matches!(e, CoreEvent::LocatorHealed { .. })),
            1
        );
    }

    #[test]
    fn intercepted_hover_falls_back_to_scripted_invocation() {
        let driver = FakeDriver::default();
        driver
            .state
            .gesture_queue
            .lock()
            .push_back(Err(FailureKind::Intercepted));
        let state = driver.state.clone();
        let (actions, sink) = facade(driver);

        actions.hover(&Locator::css("#menu")).unwrap();
        assert_eq!(state.scripted_calls.load(Ordering::SeqCst), 1);
        assert_eq!(fallback_count(&sink), 1);
    }

    #[test]
    fn intercepted_double_click_falls_back_to_scripted_invocation() {
        let driver = FakeDriver::default();
        driver
            .state
            .gesture_queue
            .lock()
            .push_back(Err(FailureKind::Intercepted));
        let state = driver.state.clone();
        let (actions, sink) = facade(driver);

        actions.double_click(&Locator::css("#row")).unwrap();
        assert_eq!(state.scripted_calls.load(Ordering::SeqCst), 1);
        assert_eq!(fallback_count(&sink), 1);
    }

    #[test]
    fn stale_drag_re_resolves_both_endpoints_and_retries_once() {
        let driver = FakeDriver::default();
        driver
            .state
            .gesture_queue
            .lock()
            .push_back(Err(FailureKind::Stale));
        let state = driver.state.clone();
        let (actions, sink) = facade(driver);

        actions
            .drag_and_drop(&Locator::css("#card"), &Locator::css("#column"))
            .unwrap();
        // Source and target each resolved twice: primary path plus retry.
        assert_eq!(state.find_calls.load(Ordering::SeqCst), 4);
        assert_eq!(fallback_count(&sink), 1);
    }

    #[test]
    fn intercepted_drag_falls_back_to_scripted_invocation() {
        let driver = FakeDriver::default();
        driver
            .state
            .gesture_queue
            .lock()
            .push_back(Err(FailureKind::Intercepted));
        let state = driver.state.clone();
        let (actions, sink) = facade(driver);

        actions
            .drag_and_drop(&Locator::css("#card"), &Locator::css("#column"))
            .unwrap();
        assert_eq!(state.scripted_calls.load(Ordering::SeqCst), 1);
        assert_eq!(fallback_count(&sink), 1);
    }

    #[test]
    fn dead_handle_fails_with_session_gone() {
        let (actions, _sink) = facade(FakeDriver::default());
        actions.handle().invalidate();
        let err = actions.click(&Locator::css("#any")).unwrap_err();
        assert!(matches!(err, ActionError::SessionGone { .. }));
    }

    #[test]
    fn read_state_returns_text() {
        let (actions, _sink) = facade(FakeDriver::default());
        let text = actions.read_state(&Locator::css("#status")).unwrap();
        assert_eq!(text, "ready");
    }
}
