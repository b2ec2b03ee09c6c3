//! Contracts for the architecture-specific context primitives.
//!
//! The core never touches saved register state itself. Everything
//! architecture-dependent sits behind these three traits; the crate's test
//! suite substitutes simulated implementations for all of them.

use core::ptr::NonNull;

/// Swaps CPU state between two tasks and reports why control came back.
///
/// `switch` saves all caller-visible CPU state onto `prev`'s stack and
/// updates `prev`'s stack pointer, loads state from `next`'s stack, marks
/// `next` as the running task, and resumes it in user mode. The call returns
/// only when a trap, interrupt or exception re-enters the kernel on this
/// core, and the returned identifier names the cause (e.g. the trap number).
///
/// The core runs the switcher with interrupts in a defined state and never
/// re-enables them itself.
pub trait ContextSwitcher {
    type Task;
    type ServiceIdentifier;

    /// # Safety
    ///
    /// Both handles must point at live TCBs, and `next`'s stack pointer must
    /// point at a restorable saved execution context.
    unsafe fn switch(
        prev: NonNull<Self::Task>,
        next: NonNull<Self::Task>,
    ) -> Self::ServiceIdentifier;
}

/// Writes a fresh saved execution context onto `next`'s stack so that
/// resuming `next` starts a designated entry path.
///
/// In the event-driven model the builder snapshots the current shared stack
/// top into the trampoline's `old_stack` argument, rebases the shared stack
/// pointer below the new frame, and arranges for the resume path to enter
/// the trampoline with the handler and snapshot as arguments.
pub trait ContextBuilder<T> {
    fn build(prev: NonNull<T>, next: NonNull<T>);
}

/// Thread-model variant used while initializing a brand new task: prepares
/// `task`'s stack so that the return-from-interrupt path begins executing at
/// `entry` in user mode. Requires a stack to be assigned already.
pub trait EntryContextBuilder<T> {
    fn build(task: &mut T, entry: *const u8);
}
