//! The one-time transition of a deferred value out of pending.

use crate::types::{Fault, Value};

/// The final state of a deferred value.
#[derive(Debug, Clone)]
pub enum Settlement {
    /// Settled with a value.
    Fulfilled(Value),
    /// Settled with a fault.
    Rejected(Fault),
}

impl Settlement {
    /// Returns true if the settlement is a fulfillment.
    #[must_use]
    pub fn is_fulfilled(&self) -> bool {
        matches!(self, Self::Fulfilled(_))
    }

    /// Returns true if the settlement is a rejection.
    #[must_use]
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }

    /// The fulfillment value, if fulfilled.
    #[must_use]
    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::Fulfilled(v) => Some(v),
            Self::Rejected(_) => None,
        }
    }

    /// The rejection fault, if rejected.
    #[must_use]
    pub fn fault(&self) -> Option<&Fault> {
        match self {
            Self::Fulfilled(_) => None,
            Self::Rejected(f) => Some(f),
        }
    }
}
