//! Sequential step descriptions.

use crate::deferred::Deferred;
use crate::types::{Fault, Value};
use std::collections::HashMap;

/// Captured local bindings of a coroutine invocation.
///
/// Step closures are separate functions; bindings that must survive a
/// suspension point live here, keyed by name.
#[derive(Default)]
pub struct Scope {
    slots: HashMap<&'static str, Value>,
}

impl Scope {
    /// An empty scope.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a value under a name, replacing any previous binding.
    pub fn set(&mut self, name: &'static str, value: Value) {
        self.slots.insert(name, value);
    }

    /// Borrows a binding.
    #[must_use]
    pub fn get(&self, name: &'static str) -> Option<&Value> {
        self.slots.get(name)
    }

    /// Clones a binding's payload out as `T`.
    #[must_use]
    pub fn get_as<T: std::any::Any + Clone>(&self, name: &'static str) -> Option<T> {
        self.slots.get(name).and_then(Value::get::<T>)
    }

    /// Removes and returns a binding.
    pub fn take(&mut self, name: &'static str) -> Option<Value> {
        self.slots.remove(name)
    }
}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope")
            .field("bindings", &self.slots.len())
            .finish()
    }
}

/// What a step awaits.
///
/// Plain values are normalized to an already-fulfilled deferred, so every
/// suspension point behaves identically regardless of the producer.
#[derive(Debug)]
pub enum Awaited {
    /// An external or chained deferred value.
    Deferred(Deferred),
    /// A plain value, wrapped as already fulfilled.
    Ready(Value),
}

impl Awaited {
    pub(crate) fn normalize(self) -> Deferred {
        match self {
            Self::Deferred(deferred) => deferred,
            Self::Ready(value) => Deferred::fulfilled(value),
        }
    }
}

impl From<Deferred> for Awaited {
    fn from(deferred: Deferred) -> Self {
        Self::Deferred(deferred)
    }
}

impl From<Value> for Awaited {
    fn from(value: Value) -> Self {
        Self::Ready(value)
    }
}

/// The outcome of running one step.
#[derive(Debug)]
pub enum StepOutcome {
    /// Suspend until the awaited value settles; the next step receives the
    /// unwrapped fulfillment value.
    Await(Awaited),
    /// Continue to the next step with this value.
    Next(Value),
    /// Finish the coroutine with this return value.
    Return(Value),
    /// Synchronous failure at this program position.
    Raise(Fault),
}

pub(crate) type StepFn = Box<dyn FnMut(&mut Scope, Value) -> StepOutcome + Send>;
pub(crate) type RecoverFn = Box<dyn FnMut(&mut Scope, Fault) -> StepOutcome + Send>;

pub(crate) enum PlanStep {
    /// An ordinary step; `guard` is the index of the nearest enclosing
    /// recovery step, if any.
    Run {
        f: StepFn,
        guard: Option<usize>,
    },
    /// A recovery step: skipped in normal flow, entered on a fault raised
    /// within its region.
    Recover {
        f: RecoverFn,
        guard: Option<usize>,
    },
}

impl PlanStep {
    pub(crate) fn guard(&self) -> Option<usize> {
        match self {
            Self::Run { guard, .. } | Self::Recover { guard, .. } => *guard,
        }
    }

    fn set_guard(&mut self, index: usize) {
        match self {
            Self::Run { guard, .. } | Self::Recover { guard, .. } => {
                if guard.is_none() {
                    *guard = Some(index);
                }
            }
        }
    }
}

/// A sequential step description with guarded regions.
#[derive(Default)]
pub struct Plan {
    pub(crate) steps: Vec<PlanStep>,
}

impl Plan {
    /// An empty plan; launching it fulfills immediately with unit.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a step.
    ///
    /// The step receives the scope and its input: the previous step's `Next`
    /// value, the unwrapped fulfillment of an awaited value, or unit for the
    /// first step.
    #[must_use]
    pub fn step(
        mut self,
        f: impl FnMut(&mut Scope, Value) -> StepOutcome + Send + 'static,
    ) -> Self {
        self.steps.push(PlanStep::Run {
            f: Box::new(f),
            guard: None,
        });
        self
    }

    /// Appends a guarded region followed by its recovery handler.
    ///
    /// A fault raised anywhere within the region, synchronously or through a
    /// rejected await, resumes at the handler with the fault as input. Guards
    /// nest; a fault inside the handler itself propagates to the next
    /// enclosing guard. After the handler completes, execution continues with
    /// the steps following the region.
    #[must_use]
    pub fn guarded(
        mut self,
        region: impl FnOnce(Self) -> Self,
        handler: impl FnMut(&mut Scope, Fault) -> StepOutcome + Send + 'static,
    ) -> Self {
        let start = self.steps.len();
        self = region(self);
        let recover_index = self.steps.len();
        for step in &mut self.steps[start..] {
            step.set_guard(recover_index);
        }
        self.steps.push(PlanStep::Recover {
            f: Box::new(handler),
            guard: None,
        });
        self
    }

    /// The number of steps, recovery handlers included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns true if the plan has no steps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl std::fmt::Debug for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Plan").field("steps", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guarded_region_steps_point_at_their_handler() {
        let plan = Plan::new()
            .step(|_, v| StepOutcome::Next(v))
            .guarded(
                |p| p.step(|_, v| StepOutcome::Next(v)).step(|_, v| StepOutcome::Next(v)),
                |_, f| StepOutcome::Raise(f),
            )
            .step(|_, v| StepOutcome::Return(v));

        assert_eq!(plan.steps[0].guard(), None);
        assert_eq!(plan.steps[1].guard(), Some(3));
        assert_eq!(plan.steps[2].guard(), Some(3));
        assert!(matches!(plan.steps[3], PlanStep::Recover { .. }));
        assert_eq!(plan.steps[3].guard(), None);
        assert_eq!(plan.steps[4].guard(), None);
    }

    #[test]
    fn nested_guards_keep_the_nearest_handler() {
        let plan = Plan::new().guarded(
            |outer| {
                outer
                    .step(|_, v| StepOutcome::Next(v))
                    .guarded(
                        |inner| inner.step(|_, v| StepOutcome::Next(v)),
                        |_, f| StepOutcome::Raise(f),
                    )
                    .step(|_, v| StepOutcome::Next(v))
            },
            |_, f| StepOutcome::Raise(f),
        );

        // Layout: 0 run (outer), 1 run (inner), 2 inner recover, 3 run (outer), 4 outer recover.
        assert_eq!(plan.steps[0].guard(), Some(4));
        assert_eq!(plan.steps[1].guard(), Some(2));
        assert_eq!(plan.steps[2].guard(), Some(4));
        assert_eq!(plan.steps[3].guard(), Some(4));
        assert_eq!(plan.steps[4].guard(), None);
    }

    #[test]
    fn scope_bindings_round_trip() {
        let mut scope = Scope::new();
        scope.set("n", Value::new(5i64));
        assert_eq!(scope.get_as::<i64>("n"), Some(5));
        assert!(scope.take("n").is_some());
        assert!(scope.get("n").is_none());
    }
}
