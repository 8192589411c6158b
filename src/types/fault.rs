//! Error payload carried by rejections.
//!
//! A `Fault` is the single error channel of the engine: synchronous raises
//! inside a coroutine segment, rejections of awaited values, and handler
//! panics all surface as a `Fault`. Equality compares the message, which is
//! what callers observe; the optional payload is for the host.

use crate::types::Value;
use std::sync::Arc;
use thiserror::Error;

/// A cloneable error payload.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct Fault {
    message: Arc<str>,
    payload: Option<Value>,
}

impl Fault {
    /// Creates a fault from a message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into().into(),
            payload: None,
        }
    }

    /// Attaches a host payload to the fault.
    #[must_use]
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Converts a caught panic payload into a fault.
    ///
    /// String panics keep their message; anything else becomes an opaque
    /// "handler panicked" fault.
    #[must_use]
    pub fn from_panic(panic: Box<dyn std::any::Any + Send>) -> Self {
        if let Some(s) = panic.downcast_ref::<&str>() {
            Self::new(*s)
        } else if let Some(s) = panic.downcast_ref::<String>() {
            Self::new(s.clone())
        } else {
            Self::new("handler panicked")
        }
    }

    /// The fault message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The host payload, if any.
    #[must_use]
    pub fn payload(&self) -> Option<&Value> {
        self.payload.as_ref()
    }
}

impl PartialEq for Fault {
    fn eq(&self, other: &Self) -> bool {
        self.message == other.message
    }
}

impl Eq for Fault {}

impl From<&str> for Fault {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for Fault {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}
