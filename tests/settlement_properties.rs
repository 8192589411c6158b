//! End-to-end properties of the settlement machine and combinators.

use deferral::{Completion, Deferred, Fault, Value, all, scheduler};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[test]
fn settle_once_later_triggers_are_no_ops() {
    init_tracing();
    scheduler::reset();

    let (d, trigger) = Deferred::create();
    let fired = Arc::new(AtomicUsize::new(0));
    let probe = Arc::clone(&fired);
    let _chained = d.then(move |v| {
        probe.fetch_add(1, Ordering::SeqCst);
        Completion::Value(v)
    });

    trigger.fulfill(Value::new(1i64));
    trigger.reject(Fault::new("too late"));
    trigger.fulfill(Value::new(2i64));
    scheduler::drain();

    assert_eq!(fired.load(Ordering::SeqCst), 1);
    let settlement = d.settlement().expect("settled");
    assert_eq!(settlement.value().and_then(Value::get::<i64>), Some(1));
}

#[test]
fn continuations_on_a_settled_value_fire_in_registration_order_never_inline() {
    init_tracing();
    scheduler::reset();

    let settled = Deferred::fulfilled(Value::new(0i64));
    let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
    for label in ["r1", "r2", "r3"] {
        let order = Arc::clone(&order);
        let _chained = settled.then(move |v| {
            order.lock().push(label);
            Completion::Value(v)
        });
    }

    // The registering code completes with nothing fired.
    assert!(order.lock().is_empty());
    scheduler::drain();
    assert_eq!(*order.lock(), vec!["r1", "r2", "r3"]);
}

#[test]
fn chained_deferred_settles_exactly_when_the_inner_one_does() {
    init_tracing();
    scheduler::reset();

    let (inner, inner_trigger) = Deferred::create();
    let (outer, outer_trigger) = Deferred::create();
    let chained = outer.then(move |_| Completion::Chained(inner));

    outer_trigger.fulfill(Value::unit());
    scheduler::drain();
    assert!(!chained.is_settled());

    inner_trigger.fulfill(Value::new(99i64));
    scheduler::drain();
    let settlement = chained.settlement().expect("settled");
    // The inner payload directly: never a value-of-a-value.
    assert_eq!(settlement.value().and_then(Value::get::<i64>), Some(99));
    assert!(settlement.value().is_some_and(|v| !v.is::<Deferred>()));
}

#[test]
fn join_rejects_with_the_first_real_rejection() {
    init_tracing();
    scheduler::reset();

    let (d1, s1) = Deferred::create();
    let (d2, s2) = Deferred::create();
    let (d3, s3) = Deferred::create();
    let aggregate = all(vec![d1, d2, d3]);
    let observed = aggregate.catch(|f| Completion::of(f.message().to_string()));

    // d2 rejects strictly before d1/d3 settle.
    s2.reject(Fault::new("d2 error"));
    s1.fulfill(Value::new(1i64));
    s3.fulfill(Value::new(3i64));
    scheduler::drain();

    let settlement = observed.settlement().expect("settled");
    assert_eq!(
        settlement.value().and_then(Value::get::<String>).as_deref(),
        Some("d2 error")
    );
}

#[test]
fn handler_failure_becomes_the_downstream_rejection() {
    init_tracing();
    scheduler::reset();

    let (d, trigger) = Deferred::create();
    let failing = d.then(|_| Completion::Failed(Fault::new("handler said no")));
    let recovered = failing.catch(|f| Completion::of(format!("caught: {f}")));

    trigger.fulfill(Value::unit());
    scheduler::drain();

    let settlement = recovered.settlement().expect("settled");
    assert_eq!(
        settlement.value().and_then(Value::get::<String>).as_deref(),
        Some("caught: handler said no")
    );
}

#[test]
fn unhandled_rejection_reaches_the_host_hook_once() {
    init_tracing();
    scheduler::reset();

    let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let probe = Arc::clone(&seen);
    deferral::set_unhandled_hook(move |fault| {
        probe.lock().push(fault.message().to_string());
    });

    let (d, trigger) = Deferred::create();
    let tail = d.then(Completion::Value); // observes upstream, exposes the tail
    trigger.reject(Fault::new("nobody caught this"));
    scheduler::drain();
    scheduler::drain();

    assert_eq!(*seen.lock(), vec!["nobody caught this".to_string()]);
    drop(tail);
    deferral::clear_unhandled_hook();
}

#[test]
fn finally_runs_on_both_branches_without_altering_settlements() {
    init_tracing();
    scheduler::reset();

    let cleanups = Arc::new(AtomicUsize::new(0));

    let (ok, ok_trigger) = Deferred::create();
    let probe = Arc::clone(&cleanups);
    let forwarded = ok.finally(move || {
        probe.fetch_add(1, Ordering::SeqCst);
    });
    ok_trigger.fulfill(Value::new(5i64));
    scheduler::drain();
    assert_eq!(
        forwarded
            .settlement()
            .and_then(|s| s.value().and_then(Value::get::<i64>)),
        Some(5)
    );

    let (bad, bad_trigger) = Deferred::create();
    let probe = Arc::clone(&cleanups);
    let forwarded = bad.finally(move || {
        probe.fetch_add(1, Ordering::SeqCst);
    });
    let observed = forwarded.catch(|f| Completion::of(f.message().to_string()));
    bad_trigger.reject(Fault::new("still the same fault"));
    scheduler::drain();
    assert_eq!(
        observed
            .settlement()
            .and_then(|s| s.value().and_then(Value::get::<String>)),
        Some("still the same fault".to_string())
    );

    assert_eq!(cleanups.load(Ordering::SeqCst), 2);
}
