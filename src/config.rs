//! Process-wide constants and the scheduling policy selector.

/// Upper bound on live threads, not counting the reaper. Also the thread id
/// reserved for the reaper itself, which lives one slot past the user range.
pub const MAX_THREADS: usize = 64;

/// Default stack size handed to `init` when a caller never calls it
/// explicitly.
pub const DEFAULT_STACK_SIZE: usize = 64 * 1024;

pub const MIN_PRIORITY: i32 = -20;
pub const MAX_PRIORITY: i32 = 20;

/// Scheduling policies named in the original header. Only `Fifo` and
/// `Priority` are implemented; the rest are declared so callers can name
/// them and get a clear rejection instead of a missing variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedPolicy {
    Fifo,
    Priority,
    RoundRobin,
    Cfs,
    Mlfq,
}

impl SchedPolicy {
    pub(crate) fn is_implemented(self) -> bool {
        matches!(self, SchedPolicy::Fifo | SchedPolicy::Priority)
    }
}

impl Default for SchedPolicy {
    fn default() -> Self {
        SchedPolicy::Fifo
    }
}
