//! Tagged result variant returned by continuation handlers.
//!
//! A handler's return shape decides how the downstream deferred settles:
//! a plain value fulfills it, another deferred is adopted (flattening), and
//! a failure rejects it. The explicit variant keeps the dispatch in
//! [`subscribe`](crate::deferred::Deferred::subscribe) a plain `match`.

use crate::deferred::Deferred;
use crate::types::{Fault, Value};

/// The outcome of running a continuation handler.
#[derive(Debug)]
pub enum Completion {
    /// Fulfill the downstream deferred with this value.
    Value(Value),
    /// The downstream deferred adopts this deferred's eventual settlement.
    Chained(Deferred),
    /// Reject the downstream deferred with this fault.
    Failed(Fault),
}

impl Completion {
    /// Wraps a plain payload.
    #[must_use]
    pub fn of<T: std::any::Any + Send + Sync>(payload: T) -> Self {
        Self::Value(Value::new(payload))
    }
}

impl From<Value> for Completion {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<Deferred> for Completion {
    fn from(deferred: Deferred) -> Self {
        Self::Chained(deferred)
    }
}

impl From<Fault> for Completion {
    fn from(fault: Fault) -> Self {
        Self::Failed(fault)
    }
}
