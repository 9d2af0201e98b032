//! Thread control block: the per-thread metadata record.

use std::any::Any;
use std::fmt;

use crate::stack::Stack;

/// A thread identifier. `0` always names the main thread; `MAX_THREADS`
/// always names the reaper; everything in between names a user thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ThreadId(pub(crate) u32);

impl ThreadId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "thread {}", self.0)
    }
}

/// Where a thread sits in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    /// Eligible to run, sitting in the runqueue.
    Ready,
    /// Currently executing; exactly one TCB holds this state.
    Running,
    /// Blocked, off the runqueue, waiting to be woken.
    Sleeping,
    /// Terminated; stack and TCB are pending reclamation.
    Zombie,
}

/// The monotone join/detach tag. Replaces the C library's habit of
/// overloading an integer `join_id` with sentinel values: `-1` for
/// "nobody waiting", `-2` for detached, and a non-negative tid otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinState {
    /// Joinable; nobody has called `join` on this thread yet.
    Joinable,
    /// A thread has begun joining and is recorded here.
    Waiting(ThreadId),
    /// Self-reaps on exit; no joiner will ever collect its return value.
    Detached,
}

/// A boxed, type-erased thread entry point. Invoked exactly once by the
/// trampoline, which forwards its result to `exit`.
pub(crate) type Entry = Box<dyn FnOnce() -> Box<dyn Any> + 'static>;

pub(crate) struct Tcb {
    pub(crate) id: ThreadId,
    /// `None` for the main thread, whose stack is the host's.
    pub(crate) stack: Option<Stack>,
    /// Saved stack pointer. Valid only while this thread is not running.
    pub(crate) sp: usize,
    pub(crate) entry: Option<Entry>,
    pub(crate) retval: Option<Box<dyn Any>>,
    pub(crate) state: ThreadState,
    pub(crate) priority: i32,
    pub(crate) join_state: JoinState,
}

impl Tcb {
    pub(crate) fn main(id: ThreadId) -> Self {
        Tcb {
            id,
            stack: None,
            sp: 0,
            entry: None,
            retval: None,
            state: ThreadState::Running,
            priority: 0,
            join_state: JoinState::Joinable,
        }
    }
}
