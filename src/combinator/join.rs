//! Fan-in aggregation over a list of deferred values.

use crate::deferred::Deferred;
use crate::types::{Settlement, Value};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Aggregates a list of deferred values into one.
///
/// On all-fulfilled, the aggregate fulfills with a `Vec<Value>` mirroring
/// input order. The first input to actually settle rejected rejects the
/// aggregate with that fault, independent of slot index; settle-once on the
/// aggregate makes later settlements no-ops, so no fulfilled value from the
/// other inputs ever appears in the result. An empty input list fulfills
/// immediately with an empty vector.
#[must_use]
pub fn all(inputs: Vec<Deferred>) -> Deferred {
    let count = inputs.len();
    if count == 0 {
        return Deferred::fulfilled(Value::new(Vec::<Value>::new()));
    }
    let (aggregate, settler) = Deferred::create();
    let slots = Arc::new(Mutex::new(vec![None::<Value>; count]));
    let remaining = Arc::new(AtomicUsize::new(count));
    for (index, input) in inputs.into_iter().enumerate() {
        let slots = Arc::clone(&slots);
        let remaining = Arc::clone(&remaining);
        let settler = settler.clone();
        input.when_settled(Box::new(move |settlement| match settlement {
            Settlement::Fulfilled(value) => {
                slots.lock()[index] = Some(value);
                if remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
                    let values: Vec<Value> = slots
                        .lock()
                        .iter_mut()
                        .map(|slot| slot.take().expect("every slot filled before assembly"))
                        .collect();
                    settler.fulfill(Value::new(values));
                }
            }
            Settlement::Rejected(fault) => settler.reject(fault),
        }));
    }
    aggregate
}
