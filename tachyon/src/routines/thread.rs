//! Service routines for the thread-based execution model.
//!
//! Creating a thread is a pipeline of tiny single-responsibility
//! initializers applied to a freshly allocated control block. The list of
//! initializers is chosen at compile time, and its declaration order is
//! load-bearing: the syscall form consumes its arguments from the caller's
//! stateful cursor in exactly that order.

use core::marker::PhantomData;
use core::ptr::NonNull;

use alloc::alloc::{alloc, dealloc, Layout};

use sched::{Prioritized, SchedulerProvider, TaskCreationHandler, TaskTerminationHandler};
use task::{
    ControllerProvider, RecyclableStackAccess, StackPointerAccess, StackRegion, SyscallAccess,
    TaskController, UniqueIdAccess,
};

use super::KernelServiceRoutine;
use crate::switch::EntryContextBuilder;
use crate::KernelStatus;

const STACK_ALIGNMENT: usize = 16;

fn allocate_stack(size: usize) -> Option<*mut u8> {
    if size == 0 {
        return None;
    }
    let layout = Layout::from_size_align(size, STACK_ALIGNMENT).ok()?;
    let stack = unsafe { alloc(layout) };
    if stack.is_null() {
        log::error!("failed to allocate a {} byte stack", size);
        return None;
    }
    log::info!("allocated stack at {:p}, length = {} bytes", stack, size);
    Some(stack)
}

fn release_stack(region: StackRegion) {
    if let Ok(layout) = Layout::from_size_align(region.size, STACK_ALIGNMENT) {
        unsafe { dealloc(region.base, layout) };
    }
}

/// One step of building up a new task control block.
///
/// Each initializer declares the argument it consumes and reports `false`
/// on failure, which aborts the remaining steps and undoes the creation.
pub trait TaskInitializer<T> {
    type Arg: Copy;

    fn apply(task: &mut T, arg: Self::Arg) -> bool;
}

/// Allocate a dedicated stack of the given size and point the task's stack
/// pointer at its top. The kernel never reclaims the memory, which suits
/// tasks known to run forever. Fails on out-of-memory.
pub struct AllocateDedicatedStack;

impl<T: StackPointerAccess> TaskInitializer<T> for AllocateDedicatedStack {
    type Arg = usize;

    fn apply(task: &mut T, stack_size: usize) -> bool {
        let Some(stack) = allocate_stack(stack_size) else {
            return false;
        };
        task.set_stack_pointer(stack.wrapping_add(stack_size));
        true
    }
}

/// Allocate a dedicated stack and record its region on the control block so
/// the finish-thread finalizers can release it. Fails on out-of-memory.
pub struct AllocateDedicatedRecyclableStack;

impl<T: RecyclableStackAccess> TaskInitializer<T> for AllocateDedicatedRecyclableStack {
    type Arg = usize;

    fn apply(task: &mut T, stack_size: usize) -> bool {
        let Some(stack) = allocate_stack(stack_size) else {
            return false;
        };
        task.set_stack_region(StackRegion::new(stack, stack_size));
        task.set_stack_pointer(stack.wrapping_add(stack_size));
        true
    }
}

/// Install a caller-provided stack. The kernel records the region but does
/// not own the memory, so finish-thread finalizer lists for tasks built
/// this way must not include the release step.
pub struct AssignDedicatedStackWithSize;

impl<T: RecyclableStackAccess> TaskInitializer<T> for AssignDedicatedStackWithSize {
    type Arg = StackRegion;

    fn apply(task: &mut T, region: StackRegion) -> bool {
        task.set_stack_region(region);
        task.set_stack_pointer(region.top());
        true
    }
}

/// Prepare the task's stack so that resuming it begins executing at the
/// given entry point in user mode. Requires a stack to be assigned already;
/// running it against a task without one is a fatal misconfiguration.
pub struct SetupExecutionContext<B> {
    _builder: PhantomData<B>,
}

impl<T, B> TaskInitializer<T> for SetupExecutionContext<B>
where
    T: StackPointerAccess,
    B: EntryContextBuilder<T>,
{
    type Arg = *const u8;

    fn apply(task: &mut T, entry: *const u8) -> bool {
        assert!(
            !task.stack_pointer().is_null(),
            "no stack is assigned to the task"
        );
        B::build(task, entry);
        true
    }
}

/// Record the task's unique identifier.
pub struct AssignUniqueIdentifier;

impl<T: UniqueIdAccess> TaskInitializer<T> for AssignUniqueIdentifier {
    type Arg = T::Id;

    fn apply(task: &mut T, id: T::Id) -> bool {
        task.set_unique_id(id);
        true
    }
}

/// Record the task's priority level.
pub struct AssignPriority;

impl<T: Prioritized> TaskInitializer<T> for AssignPriority {
    type Arg = T::Priority;

    fn apply(task: &mut T, priority: T::Priority) -> bool {
        task.set_priority(priority);
        true
    }
}

/// A statically ordered list of initializers. Implemented for tuples of
/// [`TaskInitializer`]s up to six entries; `()` applies nothing.
///
/// `read_args` materializes every argument from the caller's stateful
/// cursor, in declaration order, before any initializer runs. The split
/// matters: evaluating cursor reads lazily inside the application step
/// would tie argument order to expression evaluation order, which is
/// exactly the trap the original design warns about.
pub trait InitializerList<T> {
    type Args;

    fn read_args(task: &mut T) -> Self::Args
    where
        T: SyscallAccess;

    fn apply(task: &mut T, args: Self::Args) -> bool;
}

impl<T> InitializerList<T> for () {
    type Args = ();

    fn read_args(_task: &mut T) -> Self::Args
    where
        T: SyscallAccess,
    {
    }

    fn apply(_task: &mut T, _args: Self::Args) -> bool {
        true
    }
}

macro_rules! impl_initializer_list {
    ($(($init:ident, $arg:ident, $index:tt)),+) => {
        impl<T, $($init: TaskInitializer<T>),+> InitializerList<T> for ($($init,)+) {
            type Args = ($($init::Arg,)+);

            fn read_args(task: &mut T) -> Self::Args
            where
                T: SyscallAccess,
            {
                $(let $arg = task.syscall_argument::<$init::Arg>();)+
                ($($arg,)+)
            }

            fn apply(task: &mut T, args: Self::Args) -> bool {
                $(
                    if !$init::apply(task, args.$index) {
                        return false;
                    }
                )+
                true
            }
        }
    };
}

impl_initializer_list!((I0, a0, 0));
impl_initializer_list!((I0, a0, 0), (I1, a1, 1));
impl_initializer_list!((I0, a0, 0), (I1, a1, 1), (I2, a2, 2));
impl_initializer_list!((I0, a0, 0), (I1, a1, 1), (I2, a2, 2), (I3, a3, 3));
impl_initializer_list!(
    (I0, a0, 0),
    (I1, a1, 1),
    (I2, a2, 2),
    (I3, a3, 3),
    (I4, a4, 4)
);
impl_initializer_list!(
    (I0, a0, 0),
    (I1, a1, 1),
    (I2, a2, 2),
    (I3, a3, 3),
    (I4, a4, 4),
    (I5, a5, 5)
);

/// Service routine that creates a new thread.
///
/// `P` supplies the scheduler and the task controller; `L` is the ordered
/// initializer list. Allocation failures are recoverable: they are reported
/// through the caller's return-value slot and the caller keeps running.
pub struct CreateThread<P, L> {
    _config: PhantomData<(P, L)>,
}

impl<P, L> CreateThread<P, L> {
    /// In-kernel form, with the initializer arguments already materialized.
    /// Useful for creating threads at kernel initialization time.
    pub fn create<T>(mut task: NonNull<T>, args: L::Args) -> NonNull<T>
    where
        T: SyscallAccess,
        P: SchedulerProvider + ControllerProvider,
        P::Controller: TaskController<Task = T>,
        P::Scheduler: TaskCreationHandler<T>,
        L: InitializerList<T>,
    {
        let controller = P::task_controller();

        let Some(mut new_task) = controller.allocate() else {
            log::error!("failed to allocate a task control block");
            unsafe { task.as_mut() }.set_syscall_return_value(KernelStatus::Failure.code());
            return task;
        };

        if !L::apply(unsafe { new_task.as_mut() }, args) {
            log::error!("failed to initialize the task control block");
            controller.release(new_task);
            unsafe { task.as_mut() }.set_syscall_return_value(KernelStatus::Failure.code());
            return task;
        }

        P::task_scheduler().on_task_created(task, new_task)
    }
}

impl<T, P, L> KernelServiceRoutine<T> for CreateThread<P, L>
where
    T: SyscallAccess,
    P: SchedulerProvider + ControllerProvider,
    P::Controller: TaskController<Task = T>,
    P::Scheduler: TaskCreationHandler<T>,
    L: InitializerList<T>,
{
    fn service(mut task: NonNull<T>) -> NonNull<T> {
        let args = L::read_args(unsafe { task.as_mut() });
        Self::create(task, args)
    }
}

/// One step of tearing down a finishing task control block.
pub trait TaskFinalizer<T> {
    fn finalize(task: &mut T);
}

/// Release the recyclable stack recorded on the control block and clear the
/// task's stack fields. Pair it with [`AllocateDedicatedRecyclableStack`];
/// caller-provided stacks are not the kernel's to free.
pub struct ReleaseDedicatedRecyclableStack;

impl<T: RecyclableStackAccess> TaskFinalizer<T> for ReleaseDedicatedRecyclableStack {
    fn finalize(task: &mut T) {
        let region = task.stack_region();
        if region.base.is_null() {
            return;
        }
        task.set_stack_pointer(core::ptr::null_mut());
        task.set_stack_region(StackRegion::EMPTY);
        release_stack(region);
        log::info!("released the stack at {:p}", region.base);
    }
}

/// A statically ordered list of finalizers, mirroring [`InitializerList`].
pub trait FinalizerList<T> {
    fn finalize_all(task: &mut T);
}

impl<T> FinalizerList<T> for () {
    fn finalize_all(_task: &mut T) {}
}

macro_rules! impl_finalizer_list {
    ($($finalizer:ident),+) => {
        impl<T, $($finalizer: TaskFinalizer<T>),+> FinalizerList<T> for ($($finalizer,)+) {
            fn finalize_all(task: &mut T) {
                $($finalizer::finalize(task);)+
            }
        }
    };
}

impl_finalizer_list!(F0);
impl_finalizer_list!(F0, F1);
impl_finalizer_list!(F0, F1, F2);
impl_finalizer_list!(F0, F1, F2, F3);

/// Service routine that retires a thread that has run to completion.
///
/// Finalizers run while the control block still owns its resources, the
/// scheduler then picks the next task, and the block goes back to the pool
/// last. The scheduler must not return the finishing task.
pub struct FinishThread<P, F> {
    _config: PhantomData<(P, F)>,
}

impl<T, P, F> KernelServiceRoutine<T> for FinishThread<P, F>
where
    P: SchedulerProvider + ControllerProvider,
    P::Controller: TaskController<Task = T>,
    P::Scheduler: TaskTerminationHandler<T>,
    F: FinalizerList<T>,
{
    fn service(mut task: NonNull<T>) -> NonNull<T> {
        F::finalize_all(unsafe { task.as_mut() });

        let next = P::task_scheduler().on_task_finished(task);
        assert!(next != task, "the scheduler returned the finished task");

        P::task_controller().release(task);
        next
    }
}
