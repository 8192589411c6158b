//! Deferred values: the settlement state machine and continuation registry.
//!
//! A [`Deferred`] is a handle for a result not yet known. It settles exactly
//! once, to fulfilled or rejected, through the [`Settler`] returned by
//! [`Deferred::create`]. Continuations registered while pending fire exactly
//! once each, in registration order; continuations registered after
//! settlement are scheduled, never invoked inline, preserving
//! always-asynchronous semantics.
//!
//! Settlement is the drain trigger: `fulfill`/`reject` start a scheduler
//! pass when none is active, so queued continuations run before control
//! returns past the trigger call site.

use crate::observability;
use crate::scheduler;
use crate::types::{Completion, Fault, Settlement, Value};
use parking_lot::Mutex;
use smallvec::SmallVec;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Handler for the fulfilled branch of a continuation.
pub type OnFulfilled = Box<dyn FnOnce(Value) -> Completion + Send>;

/// Handler for the rejected branch of a continuation.
pub type OnRejected = Box<dyn FnOnce(Fault) -> Completion + Send>;

/// A continuation stored while pending, fired with the settlement.
type SettleCallback = Box<dyn FnOnce(Settlement) + Send>;

enum State {
    Pending {
        /// Stored continuations, in registration order.
        waiters: SmallVec<[SettleCallback; 2]>,
    },
    Settled(Settlement),
}

pub(crate) struct Inner {
    state: Mutex<State>,
    /// Set once any continuation is registered; an unobserved rejection is
    /// reported as unhandled at the end of a drain pass.
    observed: AtomicBool,
    /// Set once the rejection has been reported, so it reports at most once.
    reported: AtomicBool,
}

impl Inner {
    fn pending() -> Self {
        Self {
            state: Mutex::new(State::Pending {
                waiters: SmallVec::new(),
            }),
            observed: AtomicBool::new(false),
            reported: AtomicBool::new(false),
        }
    }

    fn settled(settlement: Settlement) -> Self {
        Self {
            state: Mutex::new(State::Settled(settlement)),
            observed: AtomicBool::new(false),
            reported: AtomicBool::new(false),
        }
    }

    /// Takes the fault for unhandled reporting, once, if the rejection was
    /// never observed by a continuation.
    pub(crate) fn unreported_rejection(&self) -> Option<Fault> {
        if self.observed.load(Ordering::Acquire) {
            return None;
        }
        if self.reported.swap(true, Ordering::AcqRel) {
            return None;
        }
        match &*self.state.lock() {
            State::Settled(Settlement::Rejected(fault)) => Some(fault.clone()),
            _ => None,
        }
    }
}

/// A handle for a result not yet known, settled exactly once.
#[derive(Clone)]
pub struct Deferred {
    inner: Arc<Inner>,
}

/// The one-shot triggers for a pending [`Deferred`].
///
/// Both triggers are no-ops after the first settlement. The settler may be
/// cloned and handed to an external producer; the settle-once invariant is
/// enforced on the shared state, not the handle.
#[derive(Clone)]
pub struct Settler {
    inner: Arc<Inner>,
}

impl Deferred {
    /// Creates a pending deferred value and its settlement triggers.
    #[must_use]
    pub fn create() -> (Self, Settler) {
        let inner = Arc::new(Inner::pending());
        (
            Self {
                inner: Arc::clone(&inner),
            },
            Settler { inner },
        )
    }

    /// An already-fulfilled deferred value.
    ///
    /// Fulfilling with a value that wraps a deferred returns that deferred
    /// instead: nested deferred values never appear.
    #[must_use]
    pub fn fulfilled(value: Value) -> Self {
        if let Some(existing) = value.downcast_ref::<Self>() {
            return existing.clone();
        }
        Self {
            inner: Arc::new(Inner::settled(Settlement::Fulfilled(value))),
        }
    }

    /// An already-rejected deferred value.
    #[must_use]
    pub fn rejected(fault: Fault) -> Self {
        let inner = Arc::new(Inner::settled(Settlement::Rejected(fault)));
        observability::note_rejection(Arc::downgrade(&inner));
        Self { inner }
    }

    /// A snapshot of the settlement, if settled.
    #[must_use]
    pub fn settlement(&self) -> Option<Settlement> {
        match &*self.inner.state.lock() {
            State::Pending { .. } => None,
            State::Settled(settlement) => Some(settlement.clone()),
        }
    }

    /// Returns true once the value has settled.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.settlement().is_some()
    }

    /// Low-level registration: fires the callback with the settlement,
    /// exactly once, always through the scheduler.
    ///
    /// Marks the rejection as observed; every public continuation form routes
    /// an eventual rejection somewhere downstream.
    pub(crate) fn when_settled(&self, callback: SettleCallback) {
        self.inner.observed.store(true, Ordering::Release);
        let already = {
            let mut state = self.inner.state.lock();
            match &mut *state {
                State::Pending { waiters } => {
                    waiters.push(callback);
                    None
                }
                State::Settled(settlement) => Some((callback, settlement.clone())),
            }
        };
        if let Some((callback, settlement)) = already {
            // Scheduled, never inline; the next drain pass fires it.
            scheduler::enqueue(Box::new(move || callback(settlement)));
        }
    }

    /// Registers a continuation and returns the downstream deferred it
    /// settles.
    ///
    /// - A handler returning [`Completion::Value`] fulfills the downstream.
    /// - A handler returning [`Completion::Chained`] makes the downstream
    ///   adopt that deferred's eventual settlement (flattening).
    /// - A handler returning [`Completion::Failed`] or panicking rejects the
    ///   downstream; a handler's failure never escapes.
    /// - A missing handler for the occurring branch forwards the settlement
    ///   unchanged.
    #[must_use]
    pub fn subscribe(
        &self,
        on_fulfilled: Option<OnFulfilled>,
        on_rejected: Option<OnRejected>,
    ) -> Self {
        let (downstream, settler) = Self::create();
        self.when_settled(Box::new(move |settlement| match settlement {
            Settlement::Fulfilled(value) => match on_fulfilled {
                Some(handler) => apply(run_on_fulfilled(handler, value), &settler),
                None => settler.fulfill(value),
            },
            Settlement::Rejected(fault) => match on_rejected {
                Some(handler) => apply(run_on_rejected(handler, fault), &settler),
                None => settler.reject(fault),
            },
        }));
        downstream
    }

    /// Registers a fulfillment handler; rejections pass through.
    #[must_use]
    pub fn then(&self, handler: impl FnOnce(Value) -> Completion + Send + 'static) -> Self {
        self.subscribe(Some(Box::new(handler)), None)
    }

    /// Registers a rejection handler; fulfillments pass through.
    #[must_use]
    pub fn catch(&self, handler: impl FnOnce(Fault) -> Completion + Send + 'static) -> Self {
        self.subscribe(None, Some(Box::new(handler)))
    }

    /// Runs a cleanup action on either branch and re-forwards the settlement
    /// unchanged.
    ///
    /// A panicking cleanup is caught and logged; it never alters the
    /// settlement.
    #[must_use]
    pub fn finally(&self, cleanup: impl FnOnce() + Send + 'static) -> Self {
        let (downstream, settler) = Self::create();
        self.when_settled(Box::new(move |settlement| {
            if catch_unwind(AssertUnwindSafe(cleanup)).is_err() {
                tracing::error!("cleanup panicked; settlement re-forwarded");
            }
            match settlement {
                Settlement::Fulfilled(value) => settler.fulfill(value),
                Settlement::Rejected(fault) => settler.reject(fault),
            }
        }));
        downstream
    }
}

impl std::fmt::Debug for Deferred {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &*self.inner.state.lock() {
            State::Pending { .. } => "pending",
            State::Settled(Settlement::Fulfilled(_)) => "fulfilled",
            State::Settled(Settlement::Rejected(_)) => "rejected",
        };
        f.debug_struct("Deferred").field("state", &state).finish()
    }
}

impl std::fmt::Debug for Settler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settler").finish_non_exhaustive()
    }
}

impl Settler {
    /// Fulfills the deferred value. A no-op after the first settlement.
    ///
    /// Fulfilling with a value that wraps a deferred adopts that deferred's
    /// eventual settlement instead (flattening); fulfilling with the
    /// deferred's own handle is a chaining cycle and rejects.
    pub fn fulfill(&self, value: Value) {
        if let Some(chained) = value.downcast_ref::<Deferred>() {
            self.adopt(&chained.clone());
            return;
        }
        self.settle(Settlement::Fulfilled(value));
    }

    /// Rejects the deferred value. A no-op after the first settlement.
    pub fn reject(&self, fault: Fault) {
        self.settle(Settlement::Rejected(fault));
    }

    /// Adopts another deferred's eventual settlement.
    pub(crate) fn adopt(&self, source: &Deferred) {
        if Arc::ptr_eq(&self.inner, &source.inner) {
            self.settle(Settlement::Rejected(Fault::new(
                "deferred chaining cycle detected",
            )));
            return;
        }
        let settler = self.clone();
        source.when_settled(Box::new(move |settlement| match settlement {
            Settlement::Fulfilled(value) => settler.fulfill(value),
            Settlement::Rejected(fault) => settler.reject(fault),
        }));
    }

    /// First settlement wins; stored continuations are enqueued in
    /// registration order, then a drain pass is triggered if none is active.
    fn settle(&self, settlement: Settlement) {
        let waiters = {
            let mut state = self.inner.state.lock();
            match &mut *state {
                State::Settled(_) => return,
                State::Pending { waiters } => {
                    let waiters = std::mem::take(waiters);
                    *state = State::Settled(settlement.clone());
                    waiters
                }
            }
        };
        match &settlement {
            Settlement::Fulfilled(_) => tracing::trace!(waiters = waiters.len(), "fulfilled"),
            Settlement::Rejected(fault) => {
                tracing::trace!(waiters = waiters.len(), %fault, "rejected");
                observability::note_rejection(Arc::downgrade(&self.inner));
            }
        }
        for waiter in waiters {
            let settlement = settlement.clone();
            scheduler::enqueue(Box::new(move || waiter(settlement)));
        }
        scheduler::drain();
    }
}

/// Runs a fulfillment handler, converting a panic into a failed completion.
fn run_on_fulfilled(handler: OnFulfilled, value: Value) -> Completion {
    catch_unwind(AssertUnwindSafe(move || handler(value)))
        .unwrap_or_else(|panic| Completion::Failed(Fault::from_panic(panic)))
}

/// Runs a rejection handler, converting a panic into a failed completion.
fn run_on_rejected(handler: OnRejected, fault: Fault) -> Completion {
    catch_unwind(AssertUnwindSafe(move || handler(fault)))
        .unwrap_or_else(|panic| Completion::Failed(Fault::from_panic(panic)))
}

/// Settles the downstream deferred according to the handler's completion.
fn apply(completion: Completion, settler: &Settler) {
    match completion {
        Completion::Value(value) => settler.fulfill(value),
        Completion::Chained(deferred) => settler.adopt(&deferred),
        Completion::Failed(fault) => settler.reject(fault),
    }
}
