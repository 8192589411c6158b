//! Coroutine layer: sequential step plans with suspension points.
//!
//! A [`Plan`] describes sequential logic as restartable step closures over a
//! shared [`Scope`] of captured bindings. [`launch`] compiles the plan into
//! an explicit resumable state machine: execution runs synchronously until
//! the first suspension point, a synchronous failure, or completion, and the
//! invocation returns a deferred value immediately. Resumption is driven by
//! the scheduler through the settlement of awaited values.
//!
//! Guarded regions are the structured-error-handling boundary: a synchronous
//! raise, a step panic, and the rejection of an awaited value all resume at
//! the nearest enclosing guard, indistinguishable to the recovery handler.

pub mod machine;
pub mod plan;

pub use machine::launch;
pub use plan::{Awaited, Plan, Scope, StepOutcome};
