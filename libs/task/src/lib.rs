#![cfg_attr(not(test), no_std)]

//! Task control block composition framework.
//!
//! A concrete kernel assembles its TCB from the capability traits in
//! [`constraints`] and the storage components in [`components`], picking
//! exactly the subset its execution model needs. Kernel code states its
//! requirements as trait bounds, so a TCB lacking a capability is rejected
//! at compile time rather than at run time.

pub mod components;
pub mod constraints;
pub mod context;
pub mod controller;

pub use components::{
    DedicatedStack, RecyclableStack, SharedStack, SharedStackCell, SharedStackProvider,
};
pub use constraints::{
    EventHandlerAccess, RecyclableStackAccess, StackPointerAccess, StackRegion, StateAccess,
    SyscallAccess, UniqueIdAccess,
};
pub use context::{ArgumentCursor, ExecutionContext};
pub use controller::{ControllerProvider, PooledTaskController, TaskController};

/// A parameterless one-shot event handler.
pub type EventHandlerFn = fn();

/// Conventional numeric task identifier.
#[derive(Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Clone, Copy)]
pub struct TaskId(pub usize);

impl TaskId {
    pub const NULL: Self = Self(0);
}
