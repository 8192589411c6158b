//! Deferral: deferred-value execution engine with cooperative scheduling.
//!
//! # Overview
//!
//! Deferral provides a settlement state machine for values that are not yet
//! known, a strictly FIFO continuation scheduler, chain/join combinators, and
//! a coroutine layer that makes suspension points look like ordinary
//! sequential control flow. Synchronous raises and asynchronous rejections
//! converge on a single error channel: callers observing only the error
//! cannot tell the two origins apart.
//!
//! # Core Guarantees
//!
//! - **Settle-once**: a deferred value settles exactly once; later triggers are no-ops
//! - **Registration order**: continuations on one deferred fire in the order they were registered
//! - **Always asynchronous**: handlers are scheduled, never invoked inline, even for settled values
//! - **Flattening**: a handler returning another deferred is adopted; nested deferreds never appear
//! - **Run-to-completion**: a drain pass processes the queue to exhaustion, including jobs enqueued mid-pass
//! - **No silent failures**: a handler's failure becomes the downstream rejection; unobserved
//!   rejections are reported through a registrable host hook
//!
//! # Module Structure
//!
//! - [`types`]: Core types ([`Value`], [`Fault`], [`Settlement`], [`Completion`])
//! - [`scheduler`]: Thread-confined FIFO queue with run-to-completion drain passes
//! - [`deferred`]: Settlement state machine, triggers, and chaining
//! - [`combinator`]: Fan-in aggregation (`all`) and first-settlement-wins (`race`)
//! - [`coroutine`]: Resumable step plans with guarded error boundaries
//! - [`observability`]: Unhandled-rejection ledger and host hook
//!
//! # Example
//!
//! ```
//! use deferral::{Completion, Deferred, Value, scheduler};
//!
//! let (first, trigger) = Deferred::create();
//! let doubled = first.then(|v| {
//!     let n = v.get::<i64>().unwrap_or(0);
//!     Completion::of(n * 2)
//! });
//! trigger.fulfill(Value::new(21i64));
//! scheduler::drain();
//! assert_eq!(doubled.settlement().unwrap().value().unwrap().get::<i64>(), Some(42));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod combinator;
pub mod coroutine;
pub mod deferred;
pub mod observability;
pub mod scheduler;
pub mod types;

pub use combinator::{all, race};
pub use coroutine::{Awaited, Plan, Scope, StepOutcome, launch};
pub use deferred::{Deferred, OnFulfilled, OnRejected, Settler};
pub use observability::{clear_unhandled_hook, set_unhandled_hook};
pub use scheduler::drain;
pub use types::{Completion, Fault, Settlement, Value};
