//! # Cooperating Future
//!
//! One in-flight fetch for one key, shared by its primary and all waiters.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::content::Content;
use crate::error::ProxyResult;

/// Terminal or in-progress outcome shared with every cooperating caller.
pub type Outcome = ProxyResult<Content>;

/// Lifecycle of a cooperating fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FutureState {
    /// Registered, fetch not started yet
    Pending,
    /// The primary is inside the fetch
    Running,
    /// Resolved with content
    ResolvedOk,
    /// Resolved with an error
    ResolvedFailed,
}

impl FutureState {
    pub fn is_terminal(self) -> bool {
        matches!(self, FutureState::ResolvedOk | FutureState::ResolvedFailed)
    }
}

#[derive(Debug)]
pub struct CooperatingFuture {
    key: String,
    created_at: Instant,
    state: Mutex<FutureState>,
    /// Single-writer slot; `None` until the primary publishes
    outcome: watch::Sender<Option<Outcome>>,
    /// Callers currently attached (primary + waiters)
    cooperators: AtomicUsize,
    /// Stagger slots handed out so far
    stagger_slots: AtomicU32,
    /// When the first waiter gave up; retry hints are spaced from here
    retry_anchor: Mutex<Option<Instant>>,
    retry_slots: AtomicU32,
}

impl CooperatingFuture {
    pub fn new(key: impl Into<String>) -> Self {
        let (outcome, _) = watch::channel(None);
        Self {
            key: key.into(),
            created_at: Instant::now(),
            state: Mutex::new(FutureState::Pending),
            outcome,
            cooperators: AtomicUsize::new(0),
            stagger_slots: AtomicU32::new(0),
            retry_anchor: Mutex::new(None),
            retry_slots: AtomicU32::new(0),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn state(&self) -> FutureState {
        *self.state.lock()
    }

    /// Number of callers attached right now, the primary included.
    pub fn cooperators(&self) -> usize {
        self.cooperators.load(Ordering::Acquire)
    }

    /// Waiters attached right now.
    pub fn waiters(&self) -> usize {
        self.cooperators().saturating_sub(1)
    }

    /// How long to sleep so that successive callers wake `expected_gap` apart.
    ///
    /// Slot `n` (counting from one) targets `created_at + n * expected_gap`;
    /// callers already past their slot get a zero duration.
    pub fn stagger_timeout(&self, expected_gap: Duration) -> Duration {
        let slot = self.stagger_slots.fetch_add(1, Ordering::AcqRel).saturating_add(1);
        let Some(target) = expected_gap
            .checked_mul(slot)
            .and_then(|offset| self.created_at.checked_add(offset))
        else {
            return Duration::MAX;
        };
        target.saturating_duration_since(Instant::now())
    }

    /// Delay a waiter that gave up should observe before retrying.
    ///
    /// Slots are anchored at the first give-up rather than at creation, so
    /// waiters that all hit the same passive timeout still come back
    /// `expected_gap` apart.
    pub fn retry_after(&self, expected_gap: Duration) -> Duration {
        let now = Instant::now();
        let anchor = *self.retry_anchor.lock().get_or_insert(now);
        let slot = self.retry_slots.fetch_add(1, Ordering::AcqRel).saturating_add(1);
        let Some(target) = expected_gap
            .checked_mul(slot)
            .and_then(|offset| anchor.checked_add(offset))
        else {
            return Duration::MAX;
        };
        target.saturating_duration_since(now)
    }

    pub(crate) fn attach(&self) {
        self.cooperators.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn detach(&self) {
        self.cooperators.fetch_sub(1, Ordering::AcqRel);
    }

    pub(crate) fn mark_running(&self) {
        let mut state = self.state.lock();
        if *state == FutureState::Pending {
            *state = FutureState::Running;
        }
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<Option<Outcome>> {
        self.outcome.subscribe()
    }

    /// Publish the outcome and wake every subscriber. Only the first call
    /// has any effect; returns whether this call won.
    pub(crate) fn resolve(&self, outcome: Outcome) -> bool {
        let mut state = self.state.lock();
        if state.is_terminal() {
            return false;
        }
        *state = if outcome.is_ok() {
            FutureState::ResolvedOk
        } else {
            FutureState::ResolvedFailed
        };
        self.outcome.send_if_modified(|slot| {
            *slot = Some(outcome);
            true
        })
    }
}
