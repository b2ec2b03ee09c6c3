//! The kernel dispatcher loop.

use core::marker::PhantomData;
use core::ptr::NonNull;

use crate::routines::ServiceRoutineMapper;
use crate::switch::ContextSwitcher;

/// Code run on `(prev, next)` right before every context switch.
///
/// Injectors compose side effects such as priming a trampoline frame for a
/// preempting event handler, tracing, or performance counters. An injector
/// is responsible for suppressing its own no-op cases; the dispatcher
/// invokes the whole chain unconditionally, even when a routine returned the
/// task that was already running.
pub trait CodeInjector<T> {
    fn inject(prev: NonNull<T>, next: NonNull<T>);
}

/// A statically ordered list of injectors, fired in declaration order.
/// Implemented for tuples of [`CodeInjector`]s; `()` injects nothing.
pub trait InjectorChain<T> {
    fn inject_all(prev: NonNull<T>, next: NonNull<T>);
}

impl<T> InjectorChain<T> for () {
    fn inject_all(_prev: NonNull<T>, _next: NonNull<T>) {}
}

macro_rules! impl_injector_chain {
    ($($injector:ident),+) => {
        impl<T, $($injector: CodeInjector<T>),+> InjectorChain<T> for ($($injector,)+) {
            fn inject_all(prev: NonNull<T>, next: NonNull<T>) {
                $($injector::inject(prev, next);)+
            }
        }
    };
}

impl_injector_chain!(I0);
impl_injector_chain!(I0, I1);
impl_injector_chain!(I0, I1, I2);
impl_injector_chain!(I0, I1, I2, I3);

/// The front desk for all system calls, hardware interrupts and exceptions.
///
/// The dispatcher owns two task handles: `prev`, the task that was
/// interrupted, and `next`, the task selected to run. Each iteration fires
/// the injector chain, exits the kernel through the context switcher, and on
/// re-entry asks the routine mapper for the service routine matching the
/// returned identifier. The routine consumes the interrupted task and
/// returns the next one, which may be the same task.
pub struct Dispatcher<T, Switcher, Mapper, Injectors = ()> {
    prev: NonNull<T>,
    next: NonNull<T>,
    _config: PhantomData<(Switcher, Mapper, Injectors)>,
}

impl<T, Switcher, Mapper, Injectors> Dispatcher<T, Switcher, Mapper, Injectors>
where
    Switcher: ContextSwitcher<Task = T>,
    Mapper: ServiceRoutineMapper<Task = T, ServiceIdentifier = Switcher::ServiceIdentifier>,
    Injectors: InjectorChain<T>,
{
    /// Create a dispatcher with its initial tasks.
    ///
    /// Pass the idle task (if the system has one) as `prev`, assuming it was
    /// running before the kernel was entered, and the first task that will
    /// run as `next`.
    pub const fn new(prev: NonNull<T>, next: NonNull<T>) -> Self {
        Self {
            prev,
            next,
            _config: PhantomData,
        }
    }

    /// The task that was interrupted by the last kernel entry.
    pub fn prev(&self) -> NonNull<T> {
        self.prev
    }

    /// The task selected to run at the next kernel exit.
    pub fn next(&self) -> NonNull<T> {
        self.next
    }

    /// One dispatch iteration: inject, switch out, service the re-entry.
    pub fn step(&mut self) {
        Injectors::inject_all(self.prev, self.next);

        // Exit the kernel. When the call returns, a trap has brought us back
        // and the identifier names the reason.
        let identifier = unsafe { Switcher::switch(self.prev, self.next) };

        self.prev = self.next;
        self.next = Mapper::map(identifier)(self.prev);
    }

    /// The dispatcher loop. Never returns.
    pub fn run(&mut self) -> ! {
        loop {
            self.step();
        }
    }
}
