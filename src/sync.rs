//! # Synchronization Primitives
//!
//! Interrupt-safe critical section abstractions. The event table and the
//! RTC registers are shared between the foreground command loop and the
//! dispatch interrupt handlers, so every multi-step access to them runs
//! inside one of these sections.
//!
//! On the target the implementation comes from `cortex-m`'s single-core
//! provider (PRIMASK save/disable/restore). Host tests link the `std`
//! provider of the `critical-section` crate instead.

use core::cell::RefCell;

pub use critical_section::CriticalSection;

/// Execute a closure within a critical section (interrupts disabled).
///
/// Sections nest: the interrupt state on entry is restored on exit, so an
/// ISR-side caller that already holds a section may call this again.
///
/// # Usage
/// ```ignore
/// sync::critical_section(|_cs| {
///     // swap two table blocks without being preempted
/// });
/// ```
#[inline]
pub fn critical_section<F, R>(f: F) -> R
where
    F: FnOnce(CriticalSection<'_>) -> R,
{
    critical_section::with(f)
}

/// A value shared with interrupt handlers, reachable only inside a
/// critical section.
pub struct Shared<T> {
    inner: critical_section::Mutex<RefCell<T>>,
}

impl<T> Shared<T> {
    pub const fn new(value: T) -> Self {
        Self {
            inner: critical_section::Mutex::new(RefCell::new(value)),
        }
    }

    /// Run `f` with exclusive access to the value.
    ///
    /// # Panics
    /// If called re-entrantly on the same value from inside `f`.
    pub fn lock<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut T) -> R,
    {
        critical_section(|cs| f(&mut self.inner.borrow_ref_mut(cs)))
    }
}
