//! Service routines for the simple event-driven execution model.
//!
//! Event handlers are one-shot: they share a single user stack, run to
//! completion through the trampoline, and hand control back with the
//! private event-handler-return system call.

use core::cell::UnsafeCell;
use core::marker::PhantomData;
use core::ptr::NonNull;

use sched::{SchedulerProvider, TaskCreationHandler, TaskTerminationHandler};
use task::{EventHandlerAccess, EventHandlerFn, StackPointerAccess, SyscallAccess};

use super::KernelServiceRoutine;
use crate::KernelStatus;

/// Fixed mapping from event number to the TCB that handles it.
///
/// Each event owns a pre-allocated TCB for its entire lifetime; registering
/// a handler stores the handler function inside that TCB rather than
/// swapping the block itself.
pub struct EventTable<T, const N: usize> {
    tasks: UnsafeCell<[T; N]>,
}

// Handler slots are written only by the registration routine and read only
// by event sends, both of which run serially inside the kernel.
unsafe impl<T: Send, const N: usize> Sync for EventTable<T, N> {}

impl<T, const N: usize> EventTable<T, N> {
    pub const fn new(tasks: [T; N]) -> Self {
        Self {
            tasks: UnsafeCell::new(tasks),
        }
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    /// The control block registered for `event`, or `None` if the event
    /// number is outside the table.
    pub fn task_for_event(&self, event: u32) -> Option<NonNull<T>> {
        if (event as usize) < N {
            Some(unsafe { NonNull::new_unchecked(self.tasks.get().cast::<T>().add(event as usize)) })
        } else {
            None
        }
    }

    /// Install `handler` for `event`, replacing any previous handler.
    /// An event number outside the table is fatal.
    pub fn register(&self, event: u32, handler: EventHandlerFn)
    where
        T: EventHandlerAccess,
    {
        let Some(mut task) = self.task_for_event(event) else {
            log::error!("cannot register a handler for the unrecognized event {}", event);
            panic!("unrecognized event {}", event);
        };
        unsafe { task.as_mut() }.set_event_handler(handler);
    }
}

/// Pure mapping from an event number to its handler control block,
/// implemented by the embedding kernel over its event table.
pub trait EventTaskMapper {
    type Task;

    fn task_for_event(event: u32) -> Option<NonNull<Self::Task>>;
}

/// Handler registration as exposed to the set-event-handler routine.
pub trait EventRegistrar {
    fn register(event: u32, handler: EventHandlerFn);
}

/// Service routine for the request of sending an event.
///
/// Fetches the event number from the caller's argument cursor, resolves the
/// handler's control block and notifies the scheduler that a new task has
/// been created. The scheduler owns the tie-breaking policy: it may keep the
/// caller running and queue the handler, or let the handler preempt.
pub struct SendEvent<P, M> {
    _config: PhantomData<(P, M)>,
}

impl<T, P, M> KernelServiceRoutine<T> for SendEvent<P, M>
where
    T: SyscallAccess,
    P: SchedulerProvider,
    P::Scheduler: TaskCreationHandler<T>,
    M: EventTaskMapper<Task = T>,
{
    fn service(mut task: NonNull<T>) -> NonNull<T> {
        let event = unsafe { task.as_mut() }.syscall_argument::<i32>();
        log::info!("task at {:p} sends event {}", task, event);

        let handler = match u32::try_from(event).ok().and_then(M::task_for_event) {
            Some(handler) => handler,
            None => {
                log::error!("cannot send the unrecognized event {}", event);
                panic!("unrecognized event {}", event);
            }
        };

        P::task_scheduler().on_task_created(task, handler)
    }
}

/// Service routine for a task whose event handler has finished.
///
/// Restores the shared stack top to the value it held before the handler
/// began, then asks the scheduler for the next task. Only the trampoline
/// issues this request.
pub struct EventHandlerReturn<P> {
    _config: PhantomData<P>,
}

impl<T, P> KernelServiceRoutine<T> for EventHandlerReturn<P>
where
    T: SyscallAccess,
    P: SchedulerProvider,
    P::Scheduler: TaskTerminationHandler<T>,
{
    fn service(mut task: NonNull<T>) -> NonNull<T> {
        let old_stack = unsafe { task.as_mut() }.syscall_argument::<*mut u8>();
        unsafe { task.as_mut() }.set_stack_pointer(old_stack);
        log::info!("task stack pointer restored to {:p}", old_stack);

        P::task_scheduler().on_task_finished(task)
    }
}

/// Service routine for installing an event handler.
///
/// Fetches the event number and the handler from the caller's argument
/// cursor, stores the handler in the event's control block, and keeps the
/// caller running.
pub struct SetEventHandler<R> {
    _config: PhantomData<R>,
}

impl<T, R> KernelServiceRoutine<T> for SetEventHandler<R>
where
    T: SyscallAccess,
    R: EventRegistrar,
{
    fn service(mut task: NonNull<T>) -> NonNull<T> {
        let event = unsafe { task.as_mut() }.syscall_argument::<i32>();
        let handler = unsafe { task.as_mut() }.syscall_argument::<EventHandlerFn>();

        let Ok(event) = u32::try_from(event) else {
            log::error!("cannot register a handler for the unrecognized event {}", event);
            panic!("unrecognized event {}", event);
        };
        R::register(event, handler);

        unsafe { task.as_mut() }.set_syscall_return_value(KernelStatus::Success.code());
        task
    }
}
