//! Continuation scheduler.
//!
//! A thread-confined FIFO queue of zero-argument jobs with cooperative,
//! run-to-completion draining: at most one job executes at a time, and a
//! drain pass processes the queue to exhaustion, including jobs enqueued
//! mid-pass, before yielding back past the triggering call site.
//!
//! Settlement is the drain trigger: `fulfill`/`reject` start a pass when
//! none is active. Registering a continuation never does; an idle host calls
//! [`drain`] as its event-loop tick. At the end of each pass the
//! unhandled-rejection ledger is swept.

use crate::observability;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

/// A scheduled zero-argument action.
pub(crate) type Job = Box<dyn FnOnce() + Send>;

thread_local! {
    static QUEUE: RefCell<VecDeque<Job>> = const { RefCell::new(VecDeque::new()) };
    static DRAINING: Cell<bool> = const { Cell::new(false) };
}

/// Resets the drain flag when a pass ends, including on unwind.
struct DrainGuard;

impl DrainGuard {
    fn begin() -> Option<Self> {
        if DRAINING.get() {
            return None;
        }
        DRAINING.set(true);
        Some(Self)
    }
}

impl Drop for DrainGuard {
    fn drop(&mut self) {
        DRAINING.set(false);
    }
}

/// Appends a job to the queue. Never runs it inline.
pub(crate) fn enqueue(job: Job) {
    QUEUE.with_borrow_mut(|q| q.push_back(job));
}

fn pop() -> Option<Job> {
    QUEUE.with_borrow_mut(VecDeque::pop_front)
}

/// Drains the queue to exhaustion.
///
/// A nested call during an active pass is a no-op; the active pass picks up
/// any jobs the nested caller enqueued. Each pass ends with a sweep of the
/// unhandled-rejection ledger; jobs enqueued by the sweep hook extend the
/// pass.
pub fn drain() {
    let Some(_guard) = DrainGuard::begin() else {
        return;
    };
    loop {
        let mut ran: usize = 0;
        while let Some(job) = pop() {
            job();
            ran += 1;
        }
        if ran > 0 {
            tracing::trace!(jobs = ran, "drain pass segment complete");
        }
        observability::sweep();
        if QUEUE.with_borrow(VecDeque::is_empty) {
            break;
        }
    }
}

/// The number of jobs currently queued on this thread.
#[must_use]
pub fn pending() -> usize {
    QUEUE.with_borrow(VecDeque::len)
}

/// Clears the queue and the unhandled-rejection ledger.
///
/// Intended for test isolation; queued continuations are dropped unfired.
pub fn reset() {
    QUEUE.with_borrow_mut(VecDeque::clear);
    observability::reset();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn jobs_run_in_fifo_order() {
        reset();
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
        for label in ["a", "b", "c"] {
            let order = Arc::clone(&order);
            enqueue(Box::new(move || order.lock().push(label)));
        }
        drain();
        assert_eq!(*order.lock(), vec!["a", "b", "c"]);
    }

    #[test]
    fn jobs_enqueued_mid_pass_run_in_the_same_pass() {
        reset();
        let hits = Arc::new(AtomicUsize::new(0));
        let inner = Arc::clone(&hits);
        enqueue(Box::new(move || {
            let deeper = Arc::clone(&inner);
            enqueue(Box::new(move || {
                deeper.fetch_add(1, Ordering::SeqCst);
            }));
            inner.fetch_add(1, Ordering::SeqCst);
        }));
        drain();
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(pending(), 0);
    }

    #[test]
    fn nested_drain_is_a_no_op() {
        reset();
        let hits = Arc::new(AtomicUsize::new(0));
        let inner = Arc::clone(&hits);
        enqueue(Box::new(move || {
            // Reentrant drain must not run the sibling job inline.
            drain();
            inner.fetch_add(1, Ordering::SeqCst);
        }));
        let sibling = Arc::clone(&hits);
        enqueue(Box::new(move || {
            sibling.fetch_add(1, Ordering::SeqCst);
        }));
        drain();
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn reset_discards_queued_jobs() {
        reset();
        enqueue(Box::new(|| panic!("must not run")));
        reset();
        assert_eq!(pending(), 0);
        drain();
    }
}
