//! # Shared Clock Peripheral
//!
//! The RTC is one free-running seconds counter plus one absolute match
//! register. Both the foreground command loop and the dispatch interrupt
//! handlers touch it, and the hardware only accepts an access after its
//! write-complete bit is set.
//!
//! [`SharedClockPeripheral`] is the single capability through which the
//! rest of the crate reaches those registers. Every method:
//! 1. enters a critical section,
//! 2. polls the write gate before each register read or write,
//! 3. leaves the section before returning.
//!
//! Read-counter → compute → write-match therefore happens as one unit
//! with respect to every other user of the registers.

use crate::sync::Shared;

/// Raw register access to a hibernation-style RTC.
///
/// Implementations do no gating of their own; the shared wrapper polls
/// [`write_complete`](RtcRegisters::write_complete) before every call.
pub trait RtcRegisters {
    /// Write-gate status: `true` when the next access may proceed.
    fn write_complete(&self) -> bool;

    /// Current value of the free-running seconds counter.
    fn counter(&self) -> u32;

    /// Load the counter with a new value.
    fn load_counter(&mut self, seconds: u32);

    fn match_value(&self) -> u32;

    fn set_match(&mut self, value: u32);

    /// Clear the pending alarm-match interrupt.
    fn clear_alarm_interrupt(&mut self);
}

/// Result of programming the match register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ProgrammedMatch {
    /// Counter value sampled before the write.
    pub now: u32,
    /// Match register contents read back after the write.
    pub readback: u32,
}

/// The RTC registers behind a critical-section mutex, shared between the
/// foreground and the interrupt handlers.
pub struct SharedClockPeripheral<R> {
    regs: Shared<R>,
}

impl<R: RtcRegisters> SharedClockPeripheral<R> {
    pub const fn new(regs: R) -> Self {
        Self {
            regs: Shared::new(regs),
        }
    }

    #[inline]
    fn wait_write_complete(regs: &R) {
        while !regs.write_complete() {
            core::hint::spin_loop();
        }
    }

    /// Current counter value in seconds.
    pub fn now(&self) -> u32 {
        self.regs.lock(|regs| {
            Self::wait_write_complete(regs);
            regs.counter()
        })
    }

    /// Load the counter, e.g. when the user sets the clock.
    pub fn set_counter(&self, seconds: u32) {
        self.regs.lock(|regs| {
            Self::wait_write_complete(regs);
            regs.load_counter(seconds);
        })
    }

    pub fn match_value(&self) -> u32 {
        self.regs.lock(|regs| {
            Self::wait_write_complete(regs);
            regs.match_value()
        })
    }

    /// Atomically sample the counter, let `delta` pick the distance to the
    /// next deadline, and write `now + delta` (wrapping) to the match
    /// register. The register is read back inside the same section.
    pub fn program_match<F>(&self, delta: F) -> ProgrammedMatch
    where
        F: FnOnce(u32) -> u32,
    {
        self.regs.lock(|regs| {
            Self::wait_write_complete(regs);
            let now = regs.counter();
            let target = now.wrapping_add(delta(now));

            Self::wait_write_complete(regs);
            regs.set_match(target);

            Self::wait_write_complete(regs);
            let readback = regs.match_value();
            ProgrammedMatch { now, readback }
        })
    }

    /// Acknowledge an alarm-match interrupt.
    pub fn acknowledge_alarm(&self) {
        self.regs.lock(|regs| {
            Self::wait_write_complete(regs);
            regs.clear_alarm_interrupt();
        })
    }

    /// Direct access for tests and board bring-up.
    pub fn with_registers<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&mut R) -> T,
    {
        self.regs.lock(f)
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeRtc;

    #[test]
    fn test_gate_polled_before_every_access() {
        let clock = SharedClockPeripheral::new(FakeRtc::at(100).with_gate_delay(3));
        assert_eq!(clock.now(), 100);
        clock.with_registers(|r| {
            assert_eq!(r.gate_polls(), 4, "Three busy polls then one ready poll");
            assert_eq!(r.ungated_accesses(), 0);
        });
    }

    #[test]
    fn test_program_match_wraps() {
        let clock = SharedClockPeripheral::new(FakeRtc::at(100));
        let programmed = clock.program_match(|now| 50u32.wrapping_sub(now));
        assert_eq!(programmed.now, 100);
        assert_eq!(programmed.readback, 50, "now + (target - now) lands on target");
        clock.with_registers(|r| assert_eq!(r.ungated_accesses(), 0));
    }

    #[test]
    fn test_set_counter_and_acknowledge() {
        let clock = SharedClockPeripheral::new(FakeRtc::at(0));
        clock.set_counter(3600);
        assert_eq!(clock.now(), 3600);

        clock.with_registers(|r| r.alarm_pending = true);
        clock.acknowledge_alarm();
        clock.with_registers(|r| assert!(!r.alarm_pending));
    }
}
