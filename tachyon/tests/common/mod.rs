//! Simulated architecture shared by the integration suites.
//!
//! The suites drive the real dispatcher, routines, injectors and trampoline;
//! only the architecture-dependent pieces are simulated: traps push a
//! [`SavedContext`] onto the task's (possibly shared) stack, and the context
//! builder reserves a trampoline frame and records what it primed.

#![allow(dead_code)]

use std::cell::UnsafeCell;
use std::collections::VecDeque;
use std::mem;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use sched::{Prioritized, RunState, TaskCreationHandler, TaskTerminationHandler};
use task::{
    ArgumentCursor, EventHandlerFn, ExecutionContext, StackPointerAccess, StateAccess,
    SyscallAccess,
};

pub const MAX_ARG_BYTES: usize = 64;

/// Register frame the simulated architecture pushes when a task traps. The
/// syscall arguments are inlined behind the frame header, exactly where the
/// argument cursor expects them.
#[repr(C)]
pub struct SavedContext {
    pub syscall_id: u32,
    pub return_value: i32,
    pub cursor: ArgumentCursor,
    pub args: [u8; MAX_ARG_BYTES],
}

impl SavedContext {
    pub fn new(syscall_id: u32) -> Self {
        Self {
            syscall_id,
            return_value: 0,
            cursor: ArgumentCursor::default(),
            args: [0; MAX_ARG_BYTES],
        }
    }
}

impl ExecutionContext for SavedContext {
    fn syscall_identifier(&self) -> u32 {
        self.syscall_id
    }

    fn syscall_argument_list(&mut self) -> &mut ArgumentCursor {
        &mut self.cursor
    }

    fn set_syscall_return_value(&mut self, value: i32) {
        self.return_value = value;
    }
}

/// Push a trap frame holding `args` onto `task`'s current stack and move
/// the task's stack pointer down onto it.
pub fn push_trap_frame<T: StackPointerAccess>(task: &mut T, syscall_id: u32, args: &[u8]) {
    assert!(args.len() <= MAX_ARG_BYTES, "argument pack too large");
    let sp = task.stack_pointer();
    assert!(!sp.is_null(), "no stack to trap on");
    let addr = (sp as usize - mem::size_of::<SavedContext>()) & !0xf;
    let frame = addr as *mut SavedContext;
    unsafe {
        frame.write(SavedContext::new(syscall_id));
        (&mut (*frame).args)[..args.len()].copy_from_slice(args);
        (*frame).cursor = ArgumentCursor::new((*frame).args.as_ptr());
    }
    task.set_stack_pointer(addr as *mut u8);
}

/// The kernel return value sitting in `task`'s saved context.
pub fn kernel_return_value<T: SyscallAccess<Context = SavedContext>>(task: &mut T) -> i32 {
    task.execution_context().return_value
}

/// Byte-packs syscall arguments the way user-side stubs inline them.
#[derive(Default)]
pub struct ArgPack {
    bytes: Vec<u8>,
}

impl ArgPack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<A: Copy>(mut self, value: A) -> Self {
        let ptr = &value as *const A as *const u8;
        self.bytes
            .extend_from_slice(unsafe { std::slice::from_raw_parts(ptr, mem::size_of::<A>()) });
        self
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// A statically placed TCB with interior mutability, standing in for the
/// kernel image's task storage.
pub struct TaskSlot<T>(UnsafeCell<T>);

unsafe impl<T> Sync for TaskSlot<T> {}

impl<T> TaskSlot<T> {
    pub const fn new(task: T) -> Self {
        Self(UnsafeCell::new(task))
    }

    pub fn handle(&self) -> NonNull<T> {
        unsafe { NonNull::new_unchecked(self.0.get()) }
    }
}

/// Backing memory for a simulated stack.
#[repr(align(16))]
pub struct StackArena<const N: usize>(UnsafeCell<[u8; N]>);

unsafe impl<const N: usize> Sync for StackArena<N> {}

impl<const N: usize> StackArena<N> {
    pub const fn new() -> Self {
        Self(UnsafeCell::new([0; N]))
    }

    pub fn base(&self) -> *mut u8 {
        self.0.get().cast()
    }

    pub fn top(&self) -> *mut u8 {
        self.base().wrapping_add(N)
    }

    pub fn contents(&self) -> Vec<u8> {
        unsafe { (*self.0.get()).to_vec() }
    }
}

struct SendPtr<T>(NonNull<T>);

unsafe impl<T> Send for SendPtr<T> {}

/// Priority-aware scheduler implementing the two hooks the core consumes:
/// a new task preempts iff its priority is strictly higher, and the highest
/// priority ready task runs when the current one finishes.
pub struct TestScheduler<T> {
    ready: Mutex<Vec<SendPtr<T>>>,
}

impl<T> TestScheduler<T>
where
    T: Prioritized + StateAccess<State = RunState>,
{
    pub const fn new() -> Self {
        Self {
            ready: Mutex::new(Vec::new()),
        }
    }

    pub fn reset(&self) {
        self.ready.lock().unwrap().clear();
    }

    pub fn ready_len(&self) -> usize {
        self.ready.lock().unwrap().len()
    }

    pub fn enqueue(&self, task: NonNull<T>) {
        let mut task = task;
        unsafe { task.as_mut() }.set_state(RunState::Ready);
        self.ready.lock().unwrap().push(SendPtr(task));
    }

    pub fn pop_highest(&self) -> Option<NonNull<T>> {
        let mut ready = self.ready.lock().unwrap();
        let mut best: Option<(usize, T::Priority)> = None;
        for (index, entry) in ready.iter().enumerate() {
            let priority = unsafe { entry.0.as_ref() }.priority();
            match best {
                Some((_, current)) if priority <= current => {}
                _ => best = Some((index, priority)),
            }
        }
        best.map(|(index, _)| ready.remove(index).0)
    }

    fn run(&self, task: NonNull<T>) -> NonNull<T> {
        let mut task = task;
        unsafe { task.as_mut() }.set_state(RunState::Running);
        task
    }
}

impl<T> TaskCreationHandler<T> for TestScheduler<T>
where
    T: Prioritized + StateAccess<State = RunState>,
{
    fn on_task_created(&self, current: NonNull<T>, new_task: NonNull<T>) -> NonNull<T> {
        let preempts =
            unsafe { new_task.as_ref().priority() > current.as_ref().priority() };
        if preempts {
            self.enqueue(current);
            self.run(new_task)
        } else {
            self.enqueue(new_task);
            current
        }
    }
}

impl<T> TaskTerminationHandler<T> for TestScheduler<T>
where
    T: Prioritized + StateAccess<State = RunState>,
{
    fn on_task_finished(&self, _current: NonNull<T>) -> NonNull<T> {
        let next = self.pop_highest().expect("no runnable task left");
        self.run(next)
    }
}

/// What the simulated user world does next, consumed one entry per context
/// switch.
pub enum UserOp {
    /// The resumed task performs a system call with the given arguments.
    Syscall { id: u32, args: Vec<u8> },
    /// The resumed task enters its freshly primed trampoline frame and the
    /// handler runs to completion, producing the handler-return trap.
    RunHandler,
    /// A previously interrupted handler finishes, producing the
    /// handler-return trap from its recorded frame.
    FinishHandler,
}

pub struct Script(Mutex<VecDeque<UserOp>>);

impl Script {
    pub const fn new() -> Self {
        Self(Mutex::new(VecDeque::new()))
    }

    pub fn load(&self, ops: Vec<UserOp>) {
        *self.0.lock().unwrap() = ops.into();
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }

    pub fn pop(&self) -> Option<UserOp> {
        self.0.lock().unwrap().pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.0.lock().unwrap().is_empty()
    }
}

/// One trampoline frame primed by the simulated context builder.
#[derive(Debug, Clone, Copy)]
pub struct Launch {
    pub task: usize,
    pub handler: EventHandlerFn,
    pub old_stack: usize,
}

pub struct LaunchLog(Mutex<Vec<Launch>>);

impl LaunchLog {
    pub const fn new() -> Self {
        Self(Mutex::new(Vec::new()))
    }

    pub fn reset(&self) {
        self.0.lock().unwrap().clear();
    }

    pub fn record(&self, launch: Launch) {
        self.0.lock().unwrap().push(launch);
    }

    pub fn count(&self) -> usize {
        self.0.lock().unwrap().len()
    }

    pub fn first(&self) -> Option<Launch> {
        self.0.lock().unwrap().first().copied()
    }

    pub fn last_for(&self, task: usize) -> Option<Launch> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|launch| launch.task == task)
            .copied()
    }
}

/// Tracks the single running task per core; every context switch must hand
/// off from the task that was running.
pub struct RunningCell(AtomicUsize);

impl RunningCell {
    pub const fn new() -> Self {
        Self(AtomicUsize::new(0))
    }

    pub fn reset<T>(&self, task: NonNull<T>) {
        self.0.store(task.as_ptr() as usize, Ordering::SeqCst);
    }

    pub fn transition<T>(&self, prev: NonNull<T>, next: NonNull<T>) {
        let was = self.0.swap(next.as_ptr() as usize, Ordering::SeqCst);
        assert_eq!(
            was,
            prev.as_ptr() as usize,
            "switched away from a task that was not running"
        );
    }
}

/// The suites share process-wide kernel state, so they run one at a time.
pub fn serial() -> MutexGuard<'static, ()> {
    static LOCK: Mutex<()> = Mutex::new(());
    match LOCK.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
