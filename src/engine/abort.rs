//! Abort Manager (§4.D): a hierarchy of cancellation scopes tagged by
//! [`AbortTier`] so the orchestrator can tell an external cancel (the caller
//! closed the connection) apart from an internal one (the waterfall gave up
//! on one losing engine after another already won).
//!
//! `External > Scrape > Engine`: a higher-tier abort always propagates down
//! through children; a lower-tier abort (e.g. sniping one losing engine)
//! never propagates up to its scrape-level or external-level parent.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Notify;

use crate::error::AbortTier;

struct Node {
    tier: AbortTier,
    reason: std::sync::Mutex<Option<String>>,
    aborted: AtomicBool,
    notify: Notify,
    parent: Option<Arc<Node>>,
    deadline: Option<Instant>,
}

impl Node {
    fn is_aborted(&self) -> bool {
        if self.aborted.load(Ordering::Acquire) {
            return true;
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return true;
            }
        }
        match &self.parent {
            Some(parent) => parent.is_aborted(),
            None => false,
        }
    }

    fn own_reason(&self) -> Option<String> {
        self.reason.lock().unwrap().clone()
    }
}

/// A handle into one node of the abort hierarchy (§4.D `AbortInstance`).
#[derive(Clone)]
pub struct AbortInstance(Arc<Node>);

/// Error surfaced by [`AbortInstance::throw_if_aborted`], carrying the tier
/// the cancellation originated at so callers can decide whether to absorb it
/// (engine tier) or propagate it (scrape/external tier).
#[derive(Debug, Clone, thiserror::Error)]
#[error("aborted at {tier:?} tier: {reason}")]
pub struct AbortedError {
    pub tier: AbortTier,
    pub reason: String,
}

impl AbortInstance {
    /// A fresh top-level instance at the given tier, optionally with a
    /// deadline (used for `scrapeTimeout`/`engineNearestTimeout`, §4.D).
    pub fn root(tier: AbortTier, deadline: Option<Duration>) -> Self {
        AbortInstance(Arc::new(Node {
            tier,
            reason: std::sync::Mutex::new(None),
            aborted: AtomicBool::new(false),
            notify: Notify::new(),
            parent: None,
            deadline: deadline.map(|d| Instant::now() + d),
        }))
    }

    /// `child(tier)` (§4.D): a new instance below this one in the hierarchy.
    /// Aborting the parent aborts the child; aborting the child never
    /// affects the parent.
    pub fn child(&self, tier: AbortTier, deadline: Option<Duration>) -> AbortInstance {
        AbortInstance(Arc::new(Node {
            tier,
            reason: std::sync::Mutex::new(None),
            aborted: AtomicBool::new(false),
            notify: Notify::new(),
            parent: Some(self.0.clone()),
            deadline: deadline.map(|d| Instant::now() + d),
        }))
    }

    /// Marks this instance (and all its descendants) as aborted.
    pub fn abort(&self, reason: impl Into<String>) {
        *self.0.reason.lock().unwrap() = Some(reason.into());
        self.0.aborted.store(true, Ordering::Release);
        self.0.notify.notify_waiters();
    }

    pub fn is_aborted(&self) -> bool {
        self.0.is_aborted()
    }

    pub fn tier(&self) -> AbortTier {
        self.0.tier
    }

    /// `throwIfAborted` (§4.D): returns the originating tier/reason if this
    /// instance or any ancestor has been aborted.
    pub fn throw_if_aborted(&self) -> Result<(), AbortedError> {
        let mut node = &self.0;
        loop {
            if node.aborted.load(Ordering::Acquire) {
                return Err(AbortedError {
                    tier: node.tier,
                    reason: node.own_reason().unwrap_or_else(|| "aborted".to_string()),
                });
            }
            if let Some(deadline) = node.deadline {
                if Instant::now() >= deadline {
                    return Err(AbortedError {
                        tier: node.tier,
                        reason: "deadline exceeded".to_string(),
                    });
                }
            }
            match &node.parent {
                Some(parent) => node = parent,
                None => return Ok(()),
            }
        }
    }

    /// `asSignal` (§4.D): a future that resolves once this instance (or any
    /// ancestor) is aborted or its deadline passes, suitable for racing in a
    /// `tokio::select!` alongside the actual engine work.
    pub async fn cancelled(&self) {
        loop {
            if self.is_aborted() {
                return;
            }
            let notified = self.0.notify.notified();
            if let Some(deadline) = self.nearest_deadline() {
                let remaining = deadline.saturating_duration_since(Instant::now());
                tokio::select! {
                    _ = notified => {}
                    _ = tokio::time::sleep(remaining) => {}
                }
            } else {
                notified.await;
            }
        }
    }

    /// `engineNearestTimeout` (§4.D): the soonest deadline among this
    /// instance and its ancestors, if any is set.
    fn nearest_deadline(&self) -> Option<Instant> {
        let mut node = &self.0;
        let mut nearest = node.deadline;
        while let Some(parent) = &node.parent {
            node = parent;
            nearest = match (nearest, node.deadline) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, None) => a,
                (None, b) => b,
            };
        }
        nearest
    }

    pub fn remaining(&self) -> Option<Duration> {
        self.nearest_deadline()
            .map(|d| d.saturating_duration_since(Instant::now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_inherits_parent_abort() {
        let parent = AbortInstance::root(AbortTier::Scrape, None);
        let child = parent.child(AbortTier::Engine, None);
        assert!(!child.is_aborted());
        parent.abort("caller cancelled");
        assert!(child.is_aborted());
        let err = child.throw_if_aborted().unwrap_err();
        assert_eq!(err.tier, AbortTier::Scrape);
    }

    #[test]
    fn aborting_child_does_not_affect_parent() {
        let parent = AbortInstance::root(AbortTier::Scrape, None);
        let child = parent.child(AbortTier::Engine, None);
        child.abort("sniped");
        assert!(child.is_aborted());
        assert!(!parent.is_aborted());
    }

    #[test]
    fn deadline_trips_is_aborted_without_explicit_abort_call() {
        let instance = AbortInstance::root(AbortTier::Scrape, Some(Duration::from_millis(0)));
        std::thread::sleep(Duration::from_millis(5));
        assert!(instance.is_aborted());
    }

    #[tokio::test]
    async fn cancelled_future_resolves_on_abort() {
        let instance = AbortInstance::root(AbortTier::Scrape, None);
        let waiter = instance.clone();
        let handle = tokio::spawn(async move {
            waiter.cancelled().await;
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        instance.abort("done");
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("cancelled() should resolve promptly after abort")
            .unwrap();
    }

    #[test]
    fn nearest_deadline_picks_tightest_ancestor() {
        let parent = AbortInstance::root(AbortTier::Scrape, Some(Duration::from_secs(10)));
        let child = parent.child(AbortTier::Engine, Some(Duration::from_secs(1)));
        let remaining = child.remaining().unwrap();
        assert!(remaining <= Duration::from_secs(1));
    }
}
