//! The free functions that actually cross a context switch.
//!
//! Every one of these follows the same shape: borrow the thread-local
//! `Runtime` just long enough to decide *what* to do and produce raw stack
//! pointers, drop the borrow, then call [`context_switch`] with those raw
//! values. The switch itself resumes a different logical thread's call
//! stack, and that thread may re-enter the same `RefCell` before ever
//! returning to us -- holding the borrow across the switch would panic the
//! first time that happened.

use std::any::Any;

use crate::context::context_switch;
use crate::runtime::ExitAction;
use crate::tcb::{Entry, ThreadState};
use crate::with_runtime;

/// Give up the CPU voluntarily. The current thread goes back to `Ready`
/// and the next ready thread (if any) runs; a no-op when no other thread
/// is ready.
pub(crate) fn thread_switch(target: ThreadState) {
    let plan = with_runtime(|rt| rt.prepare_switch(target));
    if !plan.should_switch {
        return;
    }
    unsafe {
        context_switch(plan.save_sp, plan.new_sp);
    }
}

/// The first code that ever runs on a freshly built stack. Pulled out of
/// the TCB by whichever thread switches into this stack for the first
/// time, so by the time this function's body executes we are already
/// "the current thread" as far as the runtime is concerned.
pub(crate) extern "C" fn trampoline() -> ! {
    let entry: Entry = with_runtime(|rt| {
        let id = rt.current;
        rt.take_entry(id)
    });
    let retval = entry();
    exit(retval);
}

/// `exit`. Never returns: the thread that calls this is suspended for the
/// last time inside [`thread_switch`] and its stack is reclaimed by the
/// reaper, never resumed.
pub(crate) fn exit(retval: Box<dyn Any>) -> ! {
    let action = with_runtime(|rt| rt.begin_exit(retval));
    match action {
        ExitAction::TerminateProcess => {
            log::info!("main thread exited; terminating process");
            std::process::exit(0);
        }
        ExitAction::BecomeZombie => {
            thread_switch(ThreadState::Zombie);
            unreachable!("a zombie thread is never switched back into");
        }
    }
}

/// Body of the reaper's thread, a system thread created at `init` time
/// whose only job is freeing detached zombies' stacks -- a thread cannot
/// free the stack it is still running on, so something else has to.
pub(crate) fn reaper_loop() -> Box<dyn Any> {
    loop {
        with_runtime(|rt| rt.reap());
        thread_switch(ThreadState::Sleeping);
    }
}
