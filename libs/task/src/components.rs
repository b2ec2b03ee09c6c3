//! Storage components a concrete TCB embeds to satisfy its stack
//! capabilities.

use core::marker::PhantomData;
use core::ptr;
use core::sync::atomic::{AtomicPtr, Ordering};

use crate::constraints::StackRegion;

/// The process-wide stack top shared by every task in the simple
/// event-driven model.
///
/// Only the kernel writes it: the context builder rebases it when a
/// preempting handler is launched, and the event-handler-return routine
/// restores it. User code observes it only as its own live stack.
pub struct SharedStackCell(AtomicPtr<u8>);

impl SharedStackCell {
    pub const fn new() -> Self {
        Self(AtomicPtr::new(ptr::null_mut()))
    }

    pub fn get(&self) -> *mut u8 {
        self.0.load(Ordering::SeqCst)
    }

    pub fn set(&self, sp: *mut u8) {
        self.0.store(sp, Ordering::SeqCst);
    }
}

impl Default for SharedStackCell {
    fn default() -> Self {
        Self::new()
    }
}

/// Access to the shared stack cell serving the current processor. A
/// customization point, like the scheduler and controller providers.
pub trait SharedStackProvider {
    fn shared_stack() -> &'static SharedStackCell;
}

/// Zero-sized stack component for tasks that run on the shared stack.
/// Reads and writes go straight to the provider's cell.
pub struct SharedStack<P> {
    _provider: PhantomData<P>,
}

impl<P: SharedStackProvider> SharedStack<P> {
    pub const fn new() -> Self {
        Self {
            _provider: PhantomData,
        }
    }

    pub fn get(&self) -> *mut u8 {
        P::shared_stack().get()
    }

    pub fn set(&self, sp: *mut u8) {
        P::shared_stack().set(sp);
    }
}

impl<P> Clone for SharedStack<P> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<P> Copy for SharedStack<P> {}

/// Stack component for a task with its own stack the kernel never reclaims.
#[derive(Debug, Clone, Copy)]
pub struct DedicatedStack {
    sp: *mut u8,
}

impl DedicatedStack {
    pub const fn new() -> Self {
        Self {
            sp: ptr::null_mut(),
        }
    }

    pub fn get(&self) -> *mut u8 {
        self.sp
    }

    pub fn set(&mut self, sp: *mut u8) {
        self.sp = sp;
    }
}

/// Stack component for a task whose stack the kernel owns and releases.
/// Extends the dedicated component with the allocation's region.
#[derive(Debug, Clone, Copy)]
pub struct RecyclableStack {
    sp: *mut u8,
    region: StackRegion,
}

impl RecyclableStack {
    pub const fn new() -> Self {
        Self {
            sp: ptr::null_mut(),
            region: StackRegion::EMPTY,
        }
    }

    pub fn get(&self) -> *mut u8 {
        self.sp
    }

    pub fn set(&mut self, sp: *mut u8) {
        debug_assert!(
            self.region.base.is_null() || sp.is_null() || self.region.contains(sp),
            "stack pointer left the task's own stack"
        );
        self.sp = sp;
    }

    pub fn region(&self) -> StackRegion {
        self.region
    }

    pub fn set_region(&mut self, region: StackRegion) {
        self.region = region;
    }
}
