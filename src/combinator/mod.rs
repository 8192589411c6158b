//! Combinators over deferred values.
//!
//! - [`all`]: fan-in aggregation, first-rejection-wins by real settlement order
//! - [`race`]: first settlement wins, either branch
//!
//! Sequential chaining (`then` / `catch` / `finally`) lives on
//! [`Deferred`](crate::deferred::Deferred) itself; these combinators cover
//! the explicit-concurrency cases. Timeout-style abandonment is composed from
//! [`race`], not built in.

pub mod join;
pub mod race;

pub use join::all;
pub use race::race;
