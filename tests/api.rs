//! End-to-end scenarios against the public API.

use std::cell::RefCell;
use std::rc::Rc;

use uthreads::{self as ut, SchedPolicy, ThreadError};

/// S1: a single create + join round-trips the exact return value, and the
/// joined thread's slot is free afterward (observed indirectly through
/// `live_count`, since the slot itself is private).
#[test]
fn simple_join_returns_the_exact_retval() {
    ut::init(SchedPolicy::Fifo, 64 * 1024).unwrap();
    let before = ut::live_count();

    let t1 = ut::create(|| 42i32, 0).unwrap();
    let retval = ut::join(t1).unwrap();
    assert_eq!(*retval.downcast::<i32>().unwrap(), 42);
    assert_eq!(ut::live_count(), before);
}

/// S2: under FIFO, two threads that each yield repeatedly interleave in
/// strict creation order.
#[test]
fn fifo_fairness_interleaves_in_creation_order() {
    ut::init(SchedPolicy::Fifo, 64 * 1024).unwrap();
    let log = Rc::new(RefCell::new(Vec::new()));

    let log_a = log.clone();
    let a = ut::create(
        move || {
            for _ in 0..3 {
                log_a.borrow_mut().push('A');
                ut::yield_now();
            }
        },
        0,
    )
    .unwrap();

    let log_b = log.clone();
    let b = ut::create(
        move || {
            for _ in 0..3 {
                log_b.borrow_mut().push('B');
                ut::yield_now();
            }
        },
        0,
    )
    .unwrap();

    ut::join(a).unwrap();
    ut::join(b).unwrap();

    assert_eq!(log.borrow().as_slice(), ['A', 'B', 'A', 'B', 'A', 'B']);
}

/// S3: under priority scheduling, the higher-priority thread always runs
/// first when both are ready simultaneously.
#[test]
fn priority_strict_ordering_dispatches_highest_first() {
    ut::init(SchedPolicy::Priority, 64 * 1024).unwrap();
    let log = Rc::new(RefCell::new(Vec::new()));

    let log_lo = log.clone();
    ut::create(move || log_lo.borrow_mut().push("Lo"), -5).unwrap();
    let log_hi = log.clone();
    ut::create(move || log_hi.borrow_mut().push("Hi"), 10).unwrap();

    ut::yield_now();
    ut::yield_now();
    ut::yield_now();

    assert_eq!(log.borrow()[0], "Hi");
}

/// S4: a detached thread's resources are reclaimed by the reaper without
/// ever being joined.
#[test]
fn detach_and_reaper_reclaim_restores_live_count() {
    ut::init(SchedPolicy::Fifo, 64 * 1024).unwrap();
    let before = ut::live_count();

    let d = ut::create(|| (), 0).unwrap();
    ut::detach(d).unwrap();

    for _ in 0..8 {
        ut::yield_now();
    }

    assert_eq!(ut::live_count(), before);
}

/// S5: joining an already-reclaimed thread id is rejected.
#[test]
fn double_join_is_rejected() {
    ut::init(SchedPolicy::Fifo, 64 * 1024).unwrap();
    let t = ut::create(|| (), 0).unwrap();
    ut::join(t).unwrap();
    assert_eq!(ut::join(t).unwrap_err(), ThreadError::InvalidThreadId(t));
}

/// S6: the table rejects creation once it is at capacity, without
/// allocating a stack for the rejected request.
#[test]
fn capacity_limit_rejects_without_allocating() {
    ut::init(SchedPolicy::Fifo, 16 * 1024).unwrap();
    let mut joined = Vec::new();
    loop {
        match ut::create(|| (), 0) {
            Ok(id) => joined.push(id),
            Err(ThreadError::TableFull) => break,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(ut::create(|| (), 0).unwrap_err(), ThreadError::TableFull);

    for id in joined {
        ut::join(id).unwrap();
    }
}
