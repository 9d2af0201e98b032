//! Error type returned by the fallible public operations.

use core::fmt;

use crate::tcb::ThreadId;

/// Failure modes for the public API.
///
/// Every variant here corresponds to an argument or state error from the
/// error taxonomy: invalid input, a target in the wrong lifecycle state, or
/// resource exhaustion. Invariant violations inside the library itself are
/// not represented here -- those are bugs, and the library panics rather
/// than returning a value a caller could ignore.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadError {
    /// `priority` fell outside `[MIN_PRIORITY, MAX_PRIORITY]`.
    InvalidPriority(i32),
    /// `tid` does not name a live, joinable/detachable thread slot.
    InvalidThreadId(ThreadId),
    /// The table is at `MAX_THREADS` live threads; `create` cannot proceed.
    TableFull,
    /// The backing allocator could not provide a stack of the configured size.
    StackAllocationFailed,
    /// The target is already detached.
    AlreadyDetached(ThreadId),
    /// Another thread has already begun a `join` on this target.
    AlreadyJoining(ThreadId),
    /// A thread attempted to join itself.
    SelfJoin(ThreadId),
    /// `init` was asked for a scheduling policy that is declared but not
    /// implemented (round-robin, CFS, MLFQ).
    UnimplementedPolicy,
}

impl fmt::Display for ThreadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThreadError::InvalidPriority(p) => {
                write!(f, "priority {p} is outside the allowed range")
            }
            ThreadError::InvalidThreadId(tid) => write!(f, "{tid} does not name a live thread"),
            ThreadError::TableFull => write!(f, "thread table is full"),
            ThreadError::StackAllocationFailed => write!(f, "failed to allocate a thread stack"),
            ThreadError::AlreadyDetached(tid) => write!(f, "{tid} is already detached"),
            ThreadError::AlreadyJoining(tid) => write!(f, "{tid} already has a waiting joiner"),
            ThreadError::SelfJoin(tid) => write!(f, "{tid} cannot join itself"),
            ThreadError::UnimplementedPolicy => {
                write!(f, "requested scheduling policy is declared but not implemented")
            }
        }
    }
}

impl std::error::Error for ThreadError {}
