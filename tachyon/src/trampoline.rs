//! The event handler trampoline and the injectors that prime it.
//!
//! A one-shot event handler never talks to the kernel directly: the context
//! builder arranges for the selected task to resume inside
//! [`event_handler_trampoline`], which runs the handler and then hands
//! control back through the private event-handler-return system call. The
//! `old_stack` argument is the shared stack top captured before the
//! trampoline frame was written, so the kernel can rewind exactly.

use core::marker::PhantomData;
use core::ptr::NonNull;

use sched::Prioritized;
use task::EventHandlerFn;

use crate::dispatch::CodeInjector;
use crate::switch::ContextBuilder;

/// The architecture's way of issuing the event-handler-return system call.
/// Behind a trait so the trampoline itself stays architecture-free.
pub trait EventReturnGateway {
    fn event_handler_return(old_stack: *mut u8);
}

/// Bootstraps a one-shot event handler and returns control to the kernel
/// once it completes. Handlers must run to completion without blocking.
#[allow(improper_ctypes_definitions)]
pub extern "C" fn event_handler_trampoline<G: EventReturnGateway>(
    handler: EventHandlerFn,
    old_stack: *mut u8,
) {
    handler();

    G::event_handler_return(old_stack);
}

/// Injector for the preemptive event-driven model: primes the trampoline
/// context iff the selected task has a strictly higher priority than the
/// interrupted one. A task that is merely resuming (the same task, or a
/// handler whose preemptor finished) must not get a fresh frame.
pub struct PreemptiveTrampolineInjector<B> {
    _builder: PhantomData<B>,
}

impl<T, B> CodeInjector<T> for PreemptiveTrampolineInjector<B>
where
    T: Prioritized,
    B: ContextBuilder<T>,
{
    fn inject(prev: NonNull<T>, next: NonNull<T>) {
        let preempts = unsafe { next.as_ref().priority() > prev.as_ref().priority() };
        if preempts {
            log::info!("the selected event handler preempts the interrupted one");
            B::build(prev, next);
        }
    }
}

/// Injector for the cooperative event-driven model: primes the trampoline
/// context iff the selected task differs from the interrupted one.
/// Preemption by higher-priority tasks is assumed not to occur.
pub struct CooperativeTrampolineInjector<B> {
    _builder: PhantomData<B>,
}

impl<T, B> CodeInjector<T> for CooperativeTrampolineInjector<B>
where
    B: ContextBuilder<T>,
{
    fn inject(prev: NonNull<T>, next: NonNull<T>) {
        if next != prev {
            log::info!("the selected event handler is not the interrupted one");
            B::build(prev, next);
        }
    }
}
