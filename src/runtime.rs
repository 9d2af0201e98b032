//! The process-wide scheduler state: thread table, runqueue, zombie list,
//! and the bookkeeping that glues them together.
//!
//! A single instance lives behind a `thread_local!` (see [`crate::with_runtime`]).
//! Every cooperative thread this library manages shares the one host OS
//! thread, so that instance really is singleton state touched only by
//! whichever logical thread happens to be running -- no atomics, no locks.
//! The subtlety is that a `RefCell` borrow must never be held across a
//! context switch: the borrowed-flag lives in this thread_local, and a
//! switch can resume a *different* logical thread that reaches back into
//! the same cell. Every method that crosses a switch therefore returns
//! raw materials for the switch (an `sp` pointer/value) and lets the
//! caller drop its borrow before acting on them.

use std::any::Any;
use std::collections::VecDeque;

use crate::config::{SchedPolicy, MAX_PRIORITY, MAX_THREADS, MIN_PRIORITY};
use crate::context::build_initial_stack;
use crate::error::ThreadError;
use crate::queue::RunQueue;
use crate::stack::Stack;
use crate::tcb::{Entry, JoinState, Tcb, ThreadId, ThreadState};

pub(crate) const REAPER_ID: ThreadId = ThreadId(MAX_THREADS as u32);

pub(crate) struct Runtime {
    pub(crate) initialized: bool,
    policy: SchedPolicy,
    stack_size: usize,
    /// Slots `0..=MAX_THREADS`: user threads in `1..MAX_THREADS`, main at
    /// `0`, reaper at `MAX_THREADS`.
    tcbs: Vec<Option<Box<Tcb>>>,
    alloc_cursor: usize,
    live_count: usize,
    pub(crate) current: ThreadId,
    runqueue: RunQueue,
    zombies: VecDeque<ThreadId>,
}

/// What `exit` should do once the bookkeeping for the terminating thread
/// is settled.
pub(crate) enum ExitAction {
    TerminateProcess,
    BecomeZombie,
}

/// Everything [`crate::thread_switch`] needs to perform the actual switch
/// after the `Runtime` borrow guarding this struct's preparation is gone.
pub(crate) struct SwitchPlan {
    pub(crate) should_switch: bool,
    pub(crate) save_sp: *mut usize,
    pub(crate) new_sp: usize,
}

impl Runtime {
    pub(crate) fn new() -> Self {
        Runtime {
            initialized: false,
            policy: SchedPolicy::Fifo,
            stack_size: crate::config::DEFAULT_STACK_SIZE,
            tcbs: Vec::new(),
            alloc_cursor: 1,
            live_count: 0,
            current: ThreadId(0),
            runqueue: RunQueue::new(SchedPolicy::Fifo),
            zombies: VecDeque::new(),
        }
    }

    /// `init`. A no-op if already initialized, per the public contract.
    pub(crate) fn init(&mut self, policy: SchedPolicy, stack_size: usize) -> Result<(), ThreadError> {
        if self.initialized {
            return Ok(());
        }
        if !policy.is_implemented() {
            return Err(ThreadError::UnimplementedPolicy);
        }

        self.policy = policy;
        self.stack_size = stack_size;
        self.runqueue = RunQueue::new(policy);
        self.tcbs = (0..=MAX_THREADS).map(|_| None).collect();
        self.alloc_cursor = 1;
        self.current = ThreadId(0);

        self.tcbs[0] = Some(Box::new(Tcb::main(ThreadId(0))));
        self.live_count = 1;
        self.initialized = true;

        let reaper_entry: Entry = Box::new(|| crate::scheduler::reaper_loop());
        let stack = Stack::new(stack_size).expect("reaper stack allocation must succeed at init");
        // Safety: `stack` was just allocated with `stack_size` bytes and
        // nothing else can reach it yet.
        let sp = unsafe { build_initial_stack(stack.top(), crate::scheduler::trampoline as usize) };
        let tcb = Tcb {
            id: REAPER_ID,
            stack: Some(stack),
            sp,
            entry: Some(reaper_entry),
            retval: None,
            state: ThreadState::Ready,
            priority: MIN_PRIORITY,
            join_state: JoinState::Detached,
        };
        self.tcbs[REAPER_ID.index()] = Some(Box::new(tcb));
        self.runqueue
            .enqueue(REAPER_ID, MIN_PRIORITY)
            .expect("fresh runqueue has room for the reaper");

        log::debug!("runtime initialized: policy={:?} stack_size={}", policy, stack_size);
        Ok(())
    }

    fn tcb(&self, id: ThreadId) -> &Tcb {
        self.tcbs[id.index()]
            .as_deref()
            .unwrap_or_else(|| panic!("{id} has no TCB"))
    }

    fn tcb_mut(&mut self, id: ThreadId) -> &mut Tcb {
        self.tcbs[id.index()]
            .as_deref_mut()
            .unwrap_or_else(|| panic!("{id} has no TCB"))
    }

    fn slot_occupied(&self, id: ThreadId) -> bool {
        self.tcbs[id.index()].is_some()
    }

    /// `create`. Validates, allocates a stack and TCB, assigns an id, and
    /// wakes the new thread (`Sleeping -> Ready`, enqueued).
    pub(crate) fn spawn(&mut self, entry: Entry, priority: i32) -> Result<ThreadId, ThreadError> {
        if !(MIN_PRIORITY..=MAX_PRIORITY).contains(&priority) {
            return Err(ThreadError::InvalidPriority(priority));
        }
        if self.live_count + 1 > MAX_THREADS {
            return Err(ThreadError::TableFull);
        }

        let stack = Stack::new(self.stack_size).ok_or(ThreadError::StackAllocationFailed)?;
        // Safety: `stack` was just allocated with `self.stack_size` bytes
        // and nothing else can reach it yet.
        let sp = unsafe { build_initial_stack(stack.top(), crate::scheduler::trampoline as usize) };

        // Advance the cursor until an empty slot is found. Termination is
        // guaranteed because live_count < MAX_THREADS is a precondition
        // here, so at least one of slots 1..MAX_THREADS is free.
        let mut idx = self.alloc_cursor;
        while self.slot_occupied(ThreadId(idx as u32)) {
            idx += 1;
            if idx == MAX_THREADS {
                idx = 1;
            }
        }
        self.alloc_cursor = idx + 1;
        if self.alloc_cursor == MAX_THREADS {
            self.alloc_cursor = 1;
        }

        let id = ThreadId(idx as u32);
        let tcb = Tcb {
            id,
            stack: Some(stack),
            sp,
            entry: Some(entry),
            retval: None,
            state: ThreadState::Sleeping,
            priority,
            join_state: JoinState::Joinable,
        };
        self.tcbs[idx] = Some(Box::new(tcb));
        self.live_count += 1;

        self.wake(id);
        log::trace!("{id} created (priority {priority})");
        Ok(id)
    }

    /// Transition a sleeping thread to ready and enqueue it.
    fn wake(&mut self, id: ThreadId) {
        let priority = self.tcb(id).priority;
        self.tcb_mut(id).state = ThreadState::Ready;
        self.runqueue
            .enqueue(id, priority)
            .unwrap_or_else(|_| panic!("runqueue overflow waking {id}"));
    }

    /// Free a terminated thread's stack and TCB. Must never be called for
    /// the currently running thread.
    fn destroy(&mut self, id: ThreadId) {
        assert_ne!(id, self.current, "a thread cannot destroy itself");
        assert_ne!(id, ThreadId(0), "the main thread's TCB is never destroyed");
        let tcb = self.tcbs[id.index()]
            .take()
            .unwrap_or_else(|| panic!("{id} has no TCB to destroy"));
        assert_eq!(tcb.state, ThreadState::Zombie, "{id} destroyed while not a zombie");
        drop(tcb); // drops the Stack, freeing the backing allocation
        if id != REAPER_ID {
            self.live_count -= 1;
        }
        log::trace!("{id} destroyed");
    }

    /// Prepare a `thread_switch(target)`. Picks the next ready thread
    /// under the active policy, updates both TCBs' states, and hands back
    /// the raw stack-pointer materials for the caller to pass to
    /// `context_switch` once this borrow is gone.
    pub(crate) fn prepare_switch(&mut self, target: ThreadState) -> SwitchPlan {
        debug_assert!(matches!(
            target,
            ThreadState::Ready | ThreadState::Sleeping | ThreadState::Zombie
        ));

        let next = match self.runqueue.dequeue() {
            Some(id) => id,
            None => {
                if target == ThreadState::Ready {
                    // Nobody else is ready: yielding is a no-op.
                    return SwitchPlan {
                        should_switch: false,
                        save_sp: std::ptr::null_mut(),
                        new_sp: 0,
                    };
                }
                panic!("deadlock: runqueue empty while current thread targets {target:?}");
            }
        };

        let prev = self.current;
        self.tcb_mut(next).state = ThreadState::Running;
        self.current = next;

        if target == ThreadState::Ready {
            let priority = self.tcb(prev).priority;
            self.runqueue
                .enqueue(prev, priority)
                .unwrap_or_else(|_| panic!("runqueue overflow re-enqueuing {prev}"));
        }
        self.tcb_mut(prev).state = target;

        let save_sp = std::ptr::addr_of_mut!(self.tcb_mut(prev).sp);
        let new_sp = self.tcb(next).sp;

        log::trace!("switching {prev} -> {next} (prev now {target:?})");

        SwitchPlan {
            should_switch: true,
            save_sp,
            new_sp,
        }
    }

    /// `join`, phase 1: validate and mark ourselves as the waiter. Returns
    /// whether the caller must block (the target has not exited yet).
    pub(crate) fn begin_join(&mut self, target: ThreadId) -> Result<bool, ThreadError> {
        if target.index() >= MAX_THREADS || !self.slot_occupied(target) {
            return Err(ThreadError::InvalidThreadId(target));
        }
        if target == self.current {
            return Err(ThreadError::SelfJoin(target));
        }
        match self.tcb(target).join_state {
            JoinState::Detached => return Err(ThreadError::AlreadyDetached(target)),
            JoinState::Waiting(_) => return Err(ThreadError::AlreadyJoining(target)),
            JoinState::Joinable => {}
        }

        self.tcb_mut(target).join_state = JoinState::Waiting(self.current);
        Ok(self.tcb(target).state != ThreadState::Zombie)
    }

    /// `join`, phase 2: the target is now a zombie (either it already was,
    /// or we were just woken because it became one). Collect its return
    /// value and destroy its TCB.
    pub(crate) fn finish_join(&mut self, target: ThreadId) -> Box<dyn Any> {
        assert_eq!(self.tcb(target).state, ThreadState::Zombie);
        let retval = self
            .tcb_mut(target)
            .retval
            .take()
            .unwrap_or_else(|| Box::new(()) as Box<dyn Any>);
        self.destroy(target);
        retval
    }

    /// `detach`.
    pub(crate) fn detach(&mut self, target: ThreadId) -> Result<(), ThreadError> {
        if target.index() >= MAX_THREADS || !self.slot_occupied(target) {
            return Err(ThreadError::InvalidThreadId(target));
        }
        match self.tcb(target).join_state {
            JoinState::Detached => return Err(ThreadError::AlreadyDetached(target)),
            JoinState::Waiting(_) => return Err(ThreadError::AlreadyJoining(target)),
            JoinState::Joinable => {}
        }

        self.tcb_mut(target).join_state = JoinState::Detached;

        // A thread can legally exit with join_state == Joinable and then
        // be detached afterwards; the original source never handles this
        // and the zombie leaks. We route it into the zombie queue here
        // instead, so the reaper still collects it.
        if self.tcb(target).state == ThreadState::Zombie {
            self.zombies.push_back(target);
            self.wake_reaper_if_sleeping();
        }
        Ok(())
    }

    /// `exit`, phase 1: settle the bookkeeping for the current thread and
    /// report what the caller should do next. The actual suspend (which
    /// needs a switch) happens outside this borrow.
    pub(crate) fn begin_exit(&mut self, retval: Box<dyn Any>) -> ExitAction {
        let id = self.current;
        if id == ThreadId(0) {
            return ExitAction::TerminateProcess;
        }

        match self.tcb(id).join_state {
            JoinState::Detached => {
                self.tcb_mut(id).retval = Some(retval);
                self.zombies.push_back(id);
                self.wake_reaper_if_sleeping();
            }
            JoinState::Joinable => {
                self.tcb_mut(id).retval = Some(retval);
            }
            JoinState::Waiting(waiter) => {
                self.tcb_mut(id).retval = Some(retval);
                self.wake(waiter);
            }
        }
        ExitAction::BecomeZombie
    }

    /// Take the entry closure out of `id`'s TCB. Called exactly once, by
    /// the trampoline the first time it runs on a thread's stack.
    pub(crate) fn take_entry(&mut self, id: ThreadId) -> Entry {
        self.tcb_mut(id)
            .entry
            .take()
            .unwrap_or_else(|| panic!("{id} trampoline invoked with no entry"))
    }

    fn wake_reaper_if_sleeping(&mut self) {
        if self.tcb(REAPER_ID).state == ThreadState::Sleeping {
            self.wake(REAPER_ID);
        }
    }

    /// Drain the zombie queue, destroying every detached zombie it holds.
    /// Called by the reaper after it wakes.
    pub(crate) fn reap(&mut self) {
        while let Some(id) = self.zombies.pop_front() {
            self.destroy(id);
        }
    }

    pub(crate) fn live_count(&self) -> usize {
        self.live_count
    }
}
