//! Machine-level context switch (x86-64 System V).
//!
//! This is the one genuinely platform-specific piece of the library: saving
//! the callee-saved register set and the return address of the calling
//! thread onto its own stack, then loading a new stack pointer and
//! restoring that thread's set. All other unsafety in the crate reduces to
//! "construct a stack pointer this routine will accept."

use std::arch::naked_asm;

/// Number of 8-byte words [`context_switch`] pushes per switch: `rbp`,
/// `rbx`, `r12`, `r13`, `r14`, `r15`. The return address pushed by the
/// caller's `call` makes a seventh word, but that one is never written by
/// us directly -- it is either a real return address (ordinary switch) or
/// the trampoline address we seed by hand (first entry into a new stack).
pub(crate) const SAVED_WORDS: usize = 6;

/// Save the current thread's callee-saved registers onto its own stack,
/// record the resulting stack pointer at `*save_sp`, switch to `new_sp`,
/// and restore the registers found there.
///
/// # Safety
/// `new_sp` must point at a stack previously prepared either by a prior
/// call to this function (a normal switch target) or by
/// [`build_initial_stack`] (a thread that has never run). `save_sp` must be
/// a valid, exclusively-owned location to receive the outgoing stack
/// pointer.
#[unsafe(naked)]
pub(crate) unsafe extern "C" fn context_switch(save_sp: *mut usize, new_sp: usize) {
    naked_asm!(
        "push rbp",
        "push rbx",
        "push r12",
        "push r13",
        "push r14",
        "push r15",
        "mov [rdi], rsp",
        "mov rsp, rsi",
        "pop r15",
        "pop r14",
        "pop r13",
        "pop r12",
        "pop rbx",
        "pop rbp",
        "ret",
    )
}

/// Lay out a fresh stack so that the first [`context_switch`] into it pops
/// straight through to `entry` as though `entry` were a normal return
/// address, with every callee-saved register zeroed.
///
/// Returns the stack pointer to store in the new thread's TCB.
///
/// # Safety
/// `stack_top` must be the top (high address, exclusive) of a writable
/// allocation at least `(SAVED_WORDS + 1) * 8` bytes large, and that
/// region must not be concurrently accessed for as long as the returned
/// `sp` may still be switched into.
pub(crate) unsafe fn build_initial_stack(stack_top: usize, entry: usize) -> usize {
    // 16-byte align the top, then drop one more word: the ABI requires
    // rsp ≡ 8 (mod 16) at a function's first instruction (a `call` pushes
    // an 8-byte return address onto a 16-aligned rsp). context_switch's
    // `ret` reproduces a `call`'s pop, so the sp we hand it must unwind,
    // after SAVED_WORDS pops plus the ret's own pop, back to that residue.
    let mut sp = (stack_top & !0xf) - 8;

    sp -= 8;
    unsafe { (sp as *mut usize).write(entry) };

    for _ in 0..SAVED_WORDS {
        sp -= 8;
        unsafe { (sp as *mut usize).write(0) };
    }

    sp
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_stack_points_at_the_zeroed_register_block() {
        let backing = vec![0u8; 4096];
        let top = backing.as_ptr() as usize + backing.len();
        let sp = unsafe { build_initial_stack(top, 0xdead_beef) };
        // SAVED_WORDS zero words, then the entry address just above them.
        let words = sp as *const usize;
        for i in 0..SAVED_WORDS {
            assert_eq!(unsafe { *words.add(i) }, 0);
        }
        assert_eq!(unsafe { *words.add(SAVED_WORDS) }, 0xdead_beef);
    }

    /// `context_switch` pops `SAVED_WORDS` registers off `sp` and then
    /// `ret`s, which pops one more word and jumps there. The resulting
    /// `rsp` at the entry point's first instruction must be ≡ 8 (mod 16),
    /// matching what a normal `call` leaves behind.
    #[test]
    fn unwound_stack_pointer_satisfies_the_abi_call_residue() {
        let backing = vec![0u8; 4096];
        let top = backing.as_ptr() as usize + backing.len();
        let sp = unsafe { build_initial_stack(top, 0xdead_beef) };
        let rsp_at_entry = sp + SAVED_WORDS * 8 + 8;
        assert_eq!(rsp_at_entry % 16, 8);
    }
}
