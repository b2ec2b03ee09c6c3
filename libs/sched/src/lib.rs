#![cfg_attr(not(test), no_std)]

//! Scheduler contracts consumed by the execution core.
//!
//! The core never schedules anything itself. It hands every scheduling
//! decision to the embedding kernel through the two hooks below, plus the
//! priority comparison used by the preemption injector. Concrete scheduling
//! policies live outside this workspace.

use core::ptr::NonNull;

/// A task that carries a totally ordered priority. Larger is higher.
pub trait Prioritized {
    type Priority: Ord + Copy;

    fn priority(&self) -> Self::Priority;
    fn set_priority(&mut self, priority: Self::Priority);
}

/// Coarse run state recorded on a task for the scheduler's benefit.
/// The execution core treats it as opaque.
#[derive(Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Clone, Copy)]
#[repr(u8)]
pub enum RunState {
    Ready,
    Running,
}

/// Hook invoked when a service routine has brought a new task into
/// existence (a created thread, or an event handler selected to run).
///
/// The scheduler decides whether the new task preempts the current one: the
/// returned handle becomes the next task to run and may be either argument.
/// Returning an invalid handle is a fatal kernel bug.
pub trait TaskCreationHandler<T> {
    fn on_task_created(&self, current: NonNull<T>, new_task: NonNull<T>) -> NonNull<T>;
}

/// Hook invoked when the current task has run to completion.
///
/// The scheduler returns the task that should run next. It must not return
/// the finished task.
pub trait TaskTerminationHandler<T> {
    fn on_task_finished(&self, current: NonNull<T>) -> NonNull<T>;
}

/// Access to the scheduler serving the current processor.
///
/// Service routines reach the scheduler only through this trait, so a
/// single-core kernel can hand out one static instance while a multi-core
/// kernel indexes a per-core registry.
pub trait SchedulerProvider {
    type Scheduler: 'static;

    fn task_scheduler() -> &'static Self::Scheduler;
}
