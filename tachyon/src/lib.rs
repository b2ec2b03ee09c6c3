#![cfg_attr(not(test), no_std)]

//! Execution core of a small embeddable multitasking kernel.
//!
//! The core is the glue between three things a concrete kernel supplies:
//! a task control block assembled from the capabilities in the [`task`]
//! crate, an architecture layer satisfying the contracts in [`switch`], and
//! a scheduler satisfying the hooks in the [`sched`] crate. The
//! [`Dispatcher`] loops forever: it fires the configured code injectors,
//! switches to the selected task, and when control re-enters the kernel it
//! maps the returned service identifier to a service routine that picks the
//! next task.
//!
//! Two execution models share the core. In the simple event-driven model,
//! one-shot event handlers share a single user stack and run to completion
//! through the [`trampoline`]; in the thread-based model, each task owns a
//! stack installed by the `create_thread` initializers.

extern crate alloc;

pub mod dispatch;
pub mod routines;
pub mod switch;
pub mod trampoline;

pub use dispatch::{CodeInjector, Dispatcher, InjectorChain};
pub use routines::{
    route_by_table, KernelServiceRoutine, ServiceRoutineFn, ServiceRoutineMapper,
    UnknownServiceIdentifier,
};
pub use switch::{ContextBuilder, ContextSwitcher, EntryContextBuilder};

// The customization points a concrete kernel implements; gathered here so an
// embedding kernel finds the whole surface in one place.
pub use sched::SchedulerProvider;
pub use task::{ControllerProvider, SharedStackProvider};

/// Status a service routine reports back through the caller's syscall
/// return-value slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum KernelStatus {
    Success = 0,
    Failure = -1,
}

impl KernelStatus {
    pub const fn code(self) -> i32 {
        self as i32
    }
}

/// Conventional service identifiers for the system calls the core services.
///
/// The numbering is this crate's convention: a kernel's trap glue must hand
/// the same values to the dispatcher for the canonical routine tables to
/// line up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Syscall {
    SetEventHandler = 0,
    SendEvent = 1,
    /// Private: issued only by the event handler trampoline.
    EventHandlerReturn = 2,
    CreateThread = 3,
    FinishThread = 4,
}

impl Syscall {
    pub const fn identifier(self) -> u32 {
        self as u32
    }
}
