//! Host-side fakes for the hardware capabilities.

use core::cell::Cell;

use crate::clock::RtcRegisters;
use crate::dispatch::{Actuator, OneShotTimer};

/// Hibernation RTC register block with a programmable write gate.
///
/// The gate reports busy `gate_delay` times before every access; any
/// access made without a preceding ready poll is counted as ungated.
#[derive(Default)]
pub struct FakeRtc {
    pub counter: u32,
    pub match_reg: u32,
    pub alarm_pending: bool,
    pub match_writes: u32,
    gate_delay: u32,
    busy_left: Cell<u32>,
    granted: Cell<bool>,
    polls: Cell<u32>,
    ungated: Cell<u32>,
}

impl FakeRtc {
    pub fn at(counter: u32) -> Self {
        Self {
            counter,
            ..Self::default()
        }
    }

    pub fn with_gate_delay(mut self, delay: u32) -> Self {
        self.gate_delay = delay;
        self.busy_left.set(delay);
        self
    }

    pub fn gate_polls(&self) -> u32 {
        self.polls.get()
    }

    pub fn ungated_accesses(&self) -> u32 {
        self.ungated.get()
    }

    /// Let simulated time pass.
    pub fn advance(&mut self, seconds: u32) {
        self.counter = self.counter.wrapping_add(seconds);
    }

    fn access(&self) {
        if !self.granted.get() {
            self.ungated.set(self.ungated.get() + 1);
        }
        self.granted.set(false);
        self.busy_left.set(self.gate_delay);
    }
}

impl RtcRegisters for FakeRtc {
    fn write_complete(&self) -> bool {
        self.polls.set(self.polls.get() + 1);
        let left = self.busy_left.get();
        if left > 0 {
            self.busy_left.set(left - 1);
            false
        } else {
            self.granted.set(true);
            true
        }
    }

    fn counter(&self) -> u32 {
        self.access();
        self.counter
    }

    fn load_counter(&mut self, seconds: u32) {
        self.access();
        self.counter = seconds;
    }

    fn match_value(&self) -> u32 {
        self.access();
        self.match_reg
    }

    fn set_match(&mut self, value: u32) {
        self.access();
        self.match_writes += 1;
        self.match_reg = value;
    }

    fn clear_alarm_interrupt(&mut self) {
        self.access();
        self.alarm_pending = false;
    }
}

#[derive(Default)]
pub struct RecordingActuator {
    /// Duty of the current run, `None` when stopped.
    pub running: Option<u8>,
    pub starts: u32,
    pub stops: u32,
}

impl Actuator for RecordingActuator {
    fn start(&mut self, intensity: u8) {
        self.running = Some(intensity);
        self.starts += 1;
    }

    fn stop(&mut self) {
        self.running = None;
        self.stops += 1;
    }
}

#[derive(Default)]
pub struct RecordingTimer {
    pub armed: Option<u16>,
    pub interrupts_cleared: u32,
}

impl OneShotTimer for RecordingTimer {
    fn start(&mut self, seconds: u16) {
        self.armed = Some(seconds);
    }

    fn stop(&mut self) {
        self.armed = None;
    }

    fn clear_interrupt(&mut self) {
        self.interrupts_cleared += 1;
    }
}
