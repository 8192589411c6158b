//! First-settlement-wins over a list of deferred values.

use crate::deferred::Deferred;
use crate::types::Settlement;

/// Settles with whichever input settles first, either branch.
///
/// Settle-once on the result makes later settlements no-ops. An empty input
/// list never settles; timeout composition pairs an operation with a
/// host-produced deadline deferred.
#[must_use]
pub fn race(inputs: Vec<Deferred>) -> Deferred {
    let (winner, settler) = Deferred::create();
    for input in inputs {
        let settler = settler.clone();
        input.when_settled(Box::new(move |settlement| match settlement {
            Settlement::Fulfilled(value) => settler.fulfill(value),
            Settlement::Rejected(fault) => settler.reject(fault),
        }));
    }
    winner
}
