//! Unhandled-rejection observation.
//!
//! Every rejection settlement registers a weak entry in a thread-local
//! ledger; registering any continuation on a deferred marks its rejection
//! observed. At the end of each drain pass the ledger is swept: entries that
//! are still alive, rejected, unobserved, and not yet reported fire the
//! unhandled-rejection hook exactly once each.
//!
//! Reporting is the whole contract: the engine never aborts the process.
//! Termination policy belongs to the host, which registers the hook.

use crate::deferred::Inner;
use crate::types::Fault;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Weak;

type Hook = Rc<dyn Fn(&Fault)>;

thread_local! {
    static LEDGER: RefCell<Vec<Weak<Inner>>> = const { RefCell::new(Vec::new()) };
    static HOOK: RefCell<Option<Hook>> = const { RefCell::new(None) };
}

/// Registers the host hook invoked once per unhandled rejection.
///
/// Replaces any previously registered hook. Without a hook, unhandled
/// rejections are logged at warn level.
pub fn set_unhandled_hook(hook: impl Fn(&Fault) + 'static) {
    HOOK.with_borrow_mut(|slot| *slot = Some(Rc::new(hook)));
}

/// Removes the host hook, restoring the logging default.
pub fn clear_unhandled_hook() {
    HOOK.with_borrow_mut(|slot| *slot = None);
}

/// Records a rejection settlement as a report candidate.
pub(crate) fn note_rejection(entry: Weak<Inner>) {
    LEDGER.with_borrow_mut(|ledger| ledger.push(entry));
}

/// Sweeps the ledger; called by the scheduler at the end of a drain pass.
pub(crate) fn sweep() {
    let entries = LEDGER.with_borrow_mut(std::mem::take);
    for weak in entries {
        let Some(inner) = weak.upgrade() else {
            continue;
        };
        let Some(fault) = inner.unreported_rejection() else {
            continue;
        };
        report(&fault);
    }
}

/// Clears the ledger; part of test-run reset.
pub(crate) fn reset() {
    LEDGER.with_borrow_mut(Vec::clear);
}

fn report(fault: &Fault) {
    // Clone the hook out so it can re-enter this module.
    let hook = HOOK.with_borrow(Clone::clone);
    match hook {
        Some(hook) => hook(fault),
        None => tracing::warn!(%fault, "unhandled rejection"),
    }
}
