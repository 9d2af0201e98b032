//! A cooperative user-level threading library.
//!
//! Threads created through this crate run on stacks this crate allocates,
//! are scheduled by this crate's runqueue, and switch between each other
//! with a hand-written x86-64 context switch -- the host operating system
//! never learns more than one of its own threads exists. Nothing here is
//! preemptive: a thread runs until it calls [`yield_now`], [`exit`],
//! blocks on [`join`], or otherwise asks the scheduler for something.
//!
//! ```no_run
//! uthreads::init(uthreads::SchedPolicy::Fifo, uthreads::config::DEFAULT_STACK_SIZE).unwrap();
//! let worker = uthreads::create(|| {
//!     println!("hello from a green thread");
//!     7i32
//! }, 0).unwrap();
//! let result = uthreads::join(worker).unwrap();
//! assert_eq!(*result.downcast::<i32>().unwrap(), 7);
//! ```

pub mod config;
mod context;
mod error;
mod queue;
mod runtime;
mod scheduler;
mod stack;
mod tcb;

use std::any::Any;
use std::cell::RefCell;

pub use config::SchedPolicy;
pub use error::ThreadError;
pub use tcb::{JoinState, ThreadId, ThreadState};

use runtime::Runtime;
use tcb::Entry;

thread_local! {
    static RUNTIME: RefCell<Runtime> = RefCell::new(Runtime::new());
}

/// Borrow the runtime just long enough to run `f`. `f` must never itself
/// cross a context switch; anything that does must split into a
/// "prepare" half that runs inside `with_runtime` and a raw-pointer half
/// that runs after it returns (see [`scheduler::thread_switch`]).
pub(crate) fn with_runtime<R>(f: impl FnOnce(&mut Runtime) -> R) -> R {
    RUNTIME.with(|cell| f(&mut cell.borrow_mut()))
}

fn ensure_initialized() {
    with_runtime(|rt| {
        if !rt.initialized {
            rt.init(SchedPolicy::Fifo, config::DEFAULT_STACK_SIZE)
                .expect("default policy is always implemented");
        }
    });
}

/// Initialize the scheduler for the calling OS thread. Idempotent: a
/// second call is a no-op, even if it names a different policy or stack
/// size.
///
/// Fails with [`ThreadError::UnimplementedPolicy`] if `policy` is one of
/// the scheduling policies this library only declares (round-robin, CFS,
/// MLFQ) and does not actually implement.
pub fn init(policy: SchedPolicy, stack_size: usize) -> Result<(), ThreadError> {
    with_runtime(|rt| rt.init(policy, stack_size))
}

/// Spawn a new cooperative thread running `f`, at the given scheduling
/// `priority` (clamped to `[MIN_PRIORITY, MAX_PRIORITY]` by validation,
/// not silently). Implicitly calls [`init`] with the default policy if
/// nothing has initialized the scheduler yet.
///
/// `f`'s return value is boxed and type-erased; retrieve and downcast it
/// with [`join`].
pub fn create<F, T>(f: F, priority: i32) -> Result<ThreadId, ThreadError>
where
    F: FnOnce() -> T + 'static,
    T: 'static,
{
    ensure_initialized();
    let entry: Entry = Box::new(move || Box::new(f()) as Box<dyn Any>);
    with_runtime(|rt| rt.spawn(entry, priority))
}

/// Voluntarily give up the CPU. Returns once this thread is scheduled
/// again. A no-op if no other thread is currently ready.
pub fn yield_now() {
    scheduler::thread_switch(ThreadState::Ready);
}

/// Terminate the calling thread, handing `retval` to whichever thread
/// eventually calls [`join`] on it (or discarding it, if this thread is
/// detached). Never returns.
///
/// Calling this from the main thread (id `0`) ends the process, matching
/// the behavior of returning from `main`.
pub fn exit(retval: Box<dyn Any>) -> ! {
    scheduler::exit(retval)
}

/// Block until `tid` terminates, then return the value it passed to
/// [`exit`].
///
/// Fails if `tid` does not name a live thread, names the caller itself,
/// is already detached, or already has another thread waiting on it.
pub fn join(tid: ThreadId) -> Result<Box<dyn Any>, ThreadError> {
    let must_block = with_runtime(|rt| rt.begin_join(tid))?;
    if must_block {
        scheduler::thread_switch(ThreadState::Sleeping);
    }
    Ok(with_runtime(|rt| rt.finish_join(tid)))
}

/// Mark `tid` as detached: it will reclaim its own resources on exit
/// rather than waiting for a joiner. If `tid` has already exited and is
/// sitting as an unclaimed zombie, detaching it wakes the reaper
/// immediately instead of leaking it until someone asks for an id
/// collision.
///
/// Fails if `tid` does not name a live thread, is already detached, or
/// already has a joiner waiting on it.
pub fn detach(tid: ThreadId) -> Result<(), ThreadError> {
    with_runtime(|rt| rt.detach(tid))
}

/// The id of the currently running thread.
pub fn current() -> ThreadId {
    with_runtime(|rt| rt.current)
}

/// Number of live threads, including the main thread but not the reaper.
pub fn live_count() -> usize {
    with_runtime(|rt| rt.live_count())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn create_and_join_returns_the_exit_value() {
        init(SchedPolicy::Fifo, 64 * 1024).unwrap();
        let tid = create(|| 42i32, 0).unwrap();
        let retval = join(tid).unwrap();
        assert_eq!(*retval.downcast::<i32>().unwrap(), 42);
    }

    #[test]
    fn yield_now_round_trips_between_two_threads() {
        init(SchedPolicy::Fifo, 64 * 1024).unwrap();
        let turns = Rc::new(Cell::new(0));
        let t1 = turns.clone();
        let a = create(
            move || {
                for _ in 0..3 {
                    t1.set(t1.get() + 1);
                    yield_now();
                }
            },
            0,
        )
        .unwrap();
        let t2 = turns.clone();
        let b = create(
            move || {
                for _ in 0..3 {
                    t2.set(t2.get() + 1);
                    yield_now();
                }
            },
            0,
        )
        .unwrap();
        join(a).unwrap();
        join(b).unwrap();
        assert_eq!(turns.get(), 6);
    }

    #[test]
    fn self_join_is_rejected() {
        init(SchedPolicy::Fifo, 64 * 1024).unwrap();
        let err = join(current()).unwrap_err();
        assert_eq!(err, ThreadError::SelfJoin(current()));
    }

    #[test]
    fn double_detach_is_rejected() {
        init(SchedPolicy::Fifo, 64 * 1024).unwrap();
        let tid = create(|| (), 0).unwrap();
        detach(tid).unwrap();
        assert_eq!(detach(tid).unwrap_err(), ThreadError::AlreadyDetached(tid));
    }

    #[test]
    fn unimplemented_policy_is_rejected() {
        with_runtime(|rt| *rt = Runtime::new());
        assert_eq!(
            init(SchedPolicy::RoundRobin, 64 * 1024).unwrap_err(),
            ThreadError::UnimplementedPolicy
        );
    }
}
