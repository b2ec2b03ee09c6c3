//! Kernel service routines and the identifier-to-routine mapping.
//!
//! Every routine has the same shape: it consumes the interrupted task and
//! returns the task that should run next. Routines are stateless unit
//! structs, so `R::service` coerces directly to [`ServiceRoutineFn`] and a
//! kernel's routine table is a plain array of function pointers.

pub mod event;
pub mod thread;

use core::ptr::NonNull;

/// A service routine as stored in a routine table.
pub type ServiceRoutineFn<T> = fn(NonNull<T>) -> NonNull<T>;

/// A modular kernel service routine block.
pub trait KernelServiceRoutine<T> {
    /// Service the request of the interrupted `task` and return the task
    /// selected to run next (possibly `task` itself).
    fn service(task: NonNull<T>) -> NonNull<T>;
}

/// Pure, stateless mapping from a service identifier to the routine that
/// services it. Consulted by the dispatcher on every kernel re-entry.
pub trait ServiceRoutineMapper {
    type Task;
    type ServiceIdentifier;

    fn map(identifier: Self::ServiceIdentifier) -> ServiceRoutineFn<Self::Task>;
}

/// The canonical mapper implementation: a fixed table indexed by the
/// identifier. An identifier outside the table is fatal; panicking here,
/// before any routine runs, closes the hole a null routine would open.
pub fn route_by_table<T, const N: usize>(
    table: &'static [ServiceRoutineFn<T>; N],
    identifier: u32,
) -> ServiceRoutineFn<T> {
    match table.get(identifier as usize) {
        Some(routine) => *routine,
        None => {
            log::error!("unrecognized service identifier {:#x}", identifier);
            panic!("unrecognized service identifier {:#x}", identifier);
        }
    }
}

/// Routine for table slots that have no service assigned. Reaching it means
/// the kernel's invariants are already broken, so it never returns.
pub struct UnknownServiceIdentifier;

impl<T> KernelServiceRoutine<T> for UnknownServiceIdentifier {
    fn service(task: NonNull<T>) -> NonNull<T> {
        log::error!("unknown service identifier raised by the task at {:p}", task);
        panic!("unknown service identifier");
    }
}
