//! The resumable state machine behind a coroutine invocation.

use crate::coroutine::plan::{Awaited, Plan, PlanStep, Scope, StepOutcome};
use crate::deferred::{Deferred, Settler};
use crate::types::{Fault, Settlement, Value};
use parking_lot::Mutex;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

/// A resumable record of a coroutine invocation.
struct Machine {
    steps: Vec<PlanStep>,
    scope: Scope,
    /// Next step index to run on resumption.
    pos: usize,
    /// Program position for fault dispatch: the step that raised or awaited.
    fault_pos: usize,
    /// Settles the deferred returned by the invocation.
    settler: Settler,
    done: bool,
}

enum Signal {
    Resume(Value),
    Fail(Fault),
}

enum Terminal {
    Fulfill(Value),
    Reject(Fault),
}

enum Input {
    Value(Value),
    Fault(Fault),
}

/// Launches a coroutine invocation.
///
/// Runs synchronously until the first suspension point, a synchronous
/// failure, or completion, and returns the invocation's deferred value
/// immediately. Past the first suspension, nothing is ever thrown
/// synchronously out of the invocation: all failures reach the caller solely
/// through the returned deferred's rejection.
///
/// Successive suspension points execute strictly in program order; awaited
/// values settle the resumption through the scheduler, so the host drives
/// progress with [`drain`](crate::scheduler::drain) or by settling triggers.
#[must_use]
pub fn launch(plan: Plan) -> Deferred {
    let (result, settler) = Deferred::create();
    let pos = next_run_index(&plan.steps, 0);
    let machine = Arc::new(Mutex::new(Machine {
        steps: plan.steps,
        scope: Scope::new(),
        pos,
        fault_pos: 0,
        settler,
        done: false,
    }));
    advance(&machine, Signal::Resume(Value::unit()));
    result
}

fn advance(machine: &Arc<Mutex<Machine>>, signal: Signal) {
    let terminal = {
        let mut m = machine.lock();
        if m.done {
            return;
        }
        let terminal = drive(&mut m, machine, signal);
        if terminal.is_some() {
            m.done = true;
        }
        terminal.map(|t| (m.settler.clone(), t))
    };
    // Settle outside the machine lock; settlement triggers a drain pass.
    if let Some((settler, terminal)) = terminal {
        match terminal {
            Terminal::Fulfill(value) => settler.fulfill(value),
            Terminal::Reject(fault) => settler.reject(fault),
        }
    }
}

/// Runs steps until the coroutine suspends or finishes.
fn drive(m: &mut Machine, handle: &Arc<Mutex<Machine>>, signal: Signal) -> Option<Terminal> {
    let mut next = signal;
    loop {
        let (pos, outcome) = match next {
            Signal::Resume(value) => {
                if m.pos >= m.steps.len() {
                    // Ran off the end: fulfill with the last carried value.
                    return Some(Terminal::Fulfill(value));
                }
                let pos = m.pos;
                (pos, run_at(&mut m.steps, &mut m.scope, pos, Input::Value(value)))
            }
            Signal::Fail(fault) => {
                // Nearest enclosing guard of the raising or awaiting step.
                let Some(recover) = m.steps.get(m.fault_pos).and_then(PlanStep::guard) else {
                    return Some(Terminal::Reject(fault));
                };
                tracing::trace!(position = m.fault_pos, recover, "fault dispatched to guard");
                (
                    recover,
                    run_at(&mut m.steps, &mut m.scope, recover, Input::Fault(fault)),
                )
            }
        };
        match outcome {
            StepOutcome::Next(value) => {
                m.pos = next_run_index(&m.steps, pos + 1);
                next = Signal::Resume(value);
            }
            StepOutcome::Return(value) => return Some(Terminal::Fulfill(value)),
            StepOutcome::Raise(fault) => {
                m.fault_pos = pos;
                next = Signal::Fail(fault);
            }
            StepOutcome::Await(awaited) => {
                m.fault_pos = pos;
                m.pos = next_run_index(&m.steps, pos + 1);
                suspend(handle, awaited);
                return None;
            }
        }
    }
}

/// Registers the resumption continuation on the awaited value.
///
/// A rejection resumes as a fault at the awaiting position, exactly as a
/// synchronous raise there: the unification contract.
fn suspend(handle: &Arc<Mutex<Machine>>, awaited: Awaited) {
    let deferred = awaited.normalize();
    tracing::trace!("coroutine suspended");
    let handle = Arc::clone(handle);
    deferred.when_settled(Box::new(move |settlement| match settlement {
        Settlement::Fulfilled(value) => advance(&handle, Signal::Resume(value)),
        Settlement::Rejected(fault) => advance(&handle, Signal::Fail(fault)),
    }));
}

/// Runs the step at `pos`, converting a panic into a fault at that position.
fn run_at(steps: &mut [PlanStep], scope: &mut Scope, pos: usize, input: Input) -> StepOutcome {
    let run = AssertUnwindSafe(move || match (&mut steps[pos], input) {
        (PlanStep::Run { f, .. }, Input::Value(value)) => f(scope, value),
        (PlanStep::Recover { f, .. }, Input::Fault(fault)) => f(scope, fault),
        // Unreachable by construction; forward rather than fail.
        (PlanStep::Run { .. }, Input::Fault(fault)) => StepOutcome::Raise(fault),
        (PlanStep::Recover { .. }, Input::Value(value)) => StepOutcome::Next(value),
    });
    catch_unwind(run).unwrap_or_else(|panic| StepOutcome::Raise(Fault::from_panic(panic)))
}

/// The next ordinary step at or after `from`; recovery steps are skipped in
/// normal flow.
fn next_run_index(steps: &[PlanStep], from: usize) -> usize {
    let mut index = from;
    while index < steps.len() && matches!(steps[index], PlanStep::Recover { .. }) {
        index += 1;
    }
    index
}
