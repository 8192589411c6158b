//! Dynamically typed settlement payload.
//!
//! The engine is agnostic to the payloads that flow through it: external
//! producers fulfill deferred values with whatever result type they have.
//! `Value` erases that type behind a cheaply clonable handle and offers
//! downcast accessors at the consumption boundary.

use std::any::Any;
use std::sync::Arc;

/// A dynamically typed, cheaply clonable settlement payload.
#[derive(Clone)]
pub struct Value(Arc<dyn Any + Send + Sync>);

impl Value {
    /// Wraps an arbitrary payload.
    #[must_use]
    pub fn new<T: Any + Send + Sync>(payload: T) -> Self {
        Self(Arc::new(payload))
    }

    /// The unit payload, used where no meaningful value exists.
    #[must_use]
    pub fn unit() -> Self {
        Self::new(())
    }

    /// Returns true if the payload is of type `T`.
    #[must_use]
    pub fn is<T: Any>(&self) -> bool {
        self.0.is::<T>()
    }

    /// Borrows the payload as `T`, if it is one.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    /// Clones the payload out as `T`, if it is one.
    #[must_use]
    pub fn get<T: Any + Clone>(&self) -> Option<T> {
        self.0.downcast_ref::<T>().cloned()
    }
}

impl Default for Value {
    fn default() -> Self {
        Self::unit()
    }
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Value").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_downcasts_to_its_payload_type() {
        let v = Value::new(42i64);
        assert!(v.is::<i64>());
        assert_eq!(v.get::<i64>(), Some(42));
        assert_eq!(v.downcast_ref::<String>(), None);
    }

    #[test]
    fn value_clones_share_the_payload() {
        let v = Value::new(String::from("shared"));
        let w = v.clone();
        assert_eq!(w.get::<String>().as_deref(), Some("shared"));
        assert_eq!(v.get::<String>().as_deref(), Some("shared"));
    }

    #[test]
    fn unit_value_is_unit() {
        assert!(Value::unit().is::<()>());
        assert!(Value::default().is::<()>());
    }
}
