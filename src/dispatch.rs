//! # Dispatch
//!
//! The interrupt-side state machine that turns an alarm match into a
//! feeding run and, when the run's timer expires, retires the event and
//! re-arms the alarm for the next one.
//!
//! ```text
//!            alarm match (slot 0 live)
//!   ┌──────┐ ─────────────────────────► ┌────────────┐
//!   │ Idle │                            │ Actuating  │
//!   └──────┘ ◄──────┐                   └────────────┘
//!                   │ sort + rearm            │ duration timeout
//!              ┌────────────┐                 │
//!              │ Concluding │ ◄───────────────┘
//!              └────────────┘
//! ```
//!
//! The record that fired is kept as the armed cursor while the auger runs.
//! On timeout the slot still holding that record is cleared; normally slot
//! 0, but the foreground may have re-sorted or moved it to tomorrow in
//! the meantime. If retiring fails on a storage fault the alarm is still
//! re-armed, so the events behind it keep firing, and the fault is
//! returned.
//!
//! Only slot 0 is ever dispatched. An alarm that arrives with slot 0 dead,
//! or while a run is in progress, is acknowledged and otherwise ignored.

use crate::alarm::{self, AlarmStatus};
use crate::clock::{RtcRegisters, SharedClockPeripheral};
use crate::error::Result;
use crate::event::{EventRecord, Slot};
use crate::sorter;
use crate::store::WordStore;
use crate::table::EventTable;

// ---------------------------------------------------------------------------
// Hardware capabilities
// ---------------------------------------------------------------------------

/// The feeder auger (or any PWM-driven actuator).
pub trait Actuator {
    /// Start at `intensity` percent duty.
    fn start(&mut self, intensity: u8);

    fn stop(&mut self);
}

/// A one-shot timer whose expiry interrupt ends a feeding run.
pub trait OneShotTimer {
    /// Arm the timer to expire `seconds` from now.
    fn start(&mut self, seconds: u16);

    fn stop(&mut self);

    /// Clear the pending expiry interrupt.
    fn clear_interrupt(&mut self);
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DispatchState {
    /// No run in progress; the hardware alarm is armed for slot 0, if any.
    Idle,
    /// The auger runs for `record`, waiting for the duration timeout.
    Actuating { record: EventRecord },
    /// Retiring the fired record; transient inside the timeout handler.
    Concluding,
}

/// What an alarm interrupt did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AlarmFired {
    Started { duration: u16, intensity: u8 },
    /// Slot 0 held no live event.
    Dormant,
    /// A run was already in progress.
    Busy,
}

pub struct Dispatcher<A, T> {
    actuator: A,
    timer: T,
    state: DispatchState,
}

impl<A: Actuator, T: OneShotTimer> Dispatcher<A, T> {
    pub const fn new(actuator: A, timer: T) -> Self {
        Self {
            actuator,
            timer,
            state: DispatchState::Idle,
        }
    }

    pub fn state(&self) -> DispatchState {
        self.state
    }

    pub fn actuator(&self) -> &A {
        &self.actuator
    }

    pub fn timer(&self) -> &T {
        &self.timer
    }

    /// Alarm-match interrupt: start feeding for slot 0.
    pub fn on_alarm<S, R>(
        &mut self,
        table: &mut EventTable<S>,
        clock: &SharedClockPeripheral<R>,
    ) -> Result<AlarmFired>
    where
        S: WordStore,
        R: RtcRegisters,
    {
        if let DispatchState::Actuating { .. } = self.state {
            warn!("alarm while actuating, ignored");
            clock.acknowledge_alarm();
            return Ok(AlarmFired::Busy);
        }

        let head = match table.read(Slot::HEAD) {
            Ok(head) => head,
            Err(e) => {
                clock.acknowledge_alarm();
                return Err(e);
            }
        };
        if !head.is_armable() {
            debug!("alarm with empty head slot");
            clock.acknowledge_alarm();
            return Ok(AlarmFired::Dormant);
        }

        let duration = head.duration.unwrap_or(0);
        let intensity = head.intensity.unwrap_or(0);
        self.actuator.start(intensity);
        self.timer.start(duration);
        self.state = DispatchState::Actuating { record: head };
        clock.acknowledge_alarm();

        info!("feeding: {}s at {}%", duration, intensity);
        Ok(AlarmFired::Started { duration, intensity })
    }

    /// Duration-timer interrupt: stop feeding, retire the fired record,
    /// sort and re-arm.
    pub fn on_timeout<S, R>(
        &mut self,
        table: &mut EventTable<S>,
        clock: &SharedClockPeripheral<R>,
    ) -> Result<AlarmStatus>
    where
        S: WordStore,
        R: RtcRegisters,
    {
        self.actuator.stop();
        self.timer.clear_interrupt();
        self.timer.stop();

        let fired = match core::mem::replace(&mut self.state, DispatchState::Concluding) {
            DispatchState::Actuating { record } => Some(record),
            _ => None,
        };

        let result = match fired {
            Some(record) => Self::conclude(table, clock, &record),
            None => {
                warn!("spurious feeding timeout");
                alarm::rearm(table, clock)
            }
        };
        self.state = DispatchState::Idle;
        result
    }

    fn conclude<S, R>(
        table: &mut EventTable<S>,
        clock: &SharedClockPeripheral<R>,
        fired: &EventRecord,
    ) -> Result<AlarmStatus>
    where
        S: WordStore,
        R: RtcRegisters,
    {
        match Self::retire(table, fired) {
            Ok(()) => alarm::rearm(table, clock),
            Err(e) => {
                // The match register still holds the deadline that just
                // fired; keep later events alive. A record that could not
                // be cleared rolls to tomorrow and fires again then.
                error!("retiring fired event failed: {}", e);
                if sorter::sort(table).is_err() {
                    warn!("sort after fault failed");
                }
                match alarm::rearm(table, clock) {
                    Ok(status) => warn!("rearmed after fault: {}", status),
                    Err(_) => error!("rearm after fault failed"),
                }
                Err(e)
            }
        }
    }

    /// Clear the slot still holding `fired`, then sort.
    fn retire<S: WordStore>(table: &mut EventTable<S>, fired: &EventRecord) -> Result<()> {
        let mut retired = None;
        for slot in Slot::all() {
            let record = table.read(slot)?;
            if record.is_armable() && record.same_feeding(fired) {
                table.clear(slot)?;
                retired = Some(slot);
                break;
            }
        }
        match retired {
            Some(slot) => info!("feeding done, slot {} retired", slot.index()),
            None => warn!("fired event deleted during feeding"),
        }

        sorter::sort(table)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::STORE_WORDS;
    use crate::event::TimeOfDay;
    use crate::store::RamStore;
    use crate::testing::{FakeRtc, RecordingActuator, RecordingTimer};

    type Table = EventTable<RamStore<STORE_WORDS>>;

    fn slot(n: usize) -> Slot {
        Slot::new(n).unwrap()
    }

    fn event(duration: u16, intensity: u8, hour: u8, minute: u8) -> EventRecord {
        EventRecord::new(duration, intensity, TimeOfDay::new(hour, minute).unwrap()).unwrap()
    }

    fn dispatcher() -> Dispatcher<RecordingActuator, RecordingTimer> {
        Dispatcher::new(RecordingActuator::default(), RecordingTimer::default())
    }

    #[test]
    fn test_alarm_starts_feeding_from_head() {
        let mut table = Table::new(RamStore::new());
        table.write(slot(0), &event(5, 50, 1, 0)).unwrap();
        let clock = SharedClockPeripheral::new(FakeRtc::at(3600));
        clock.with_registers(|r| r.alarm_pending = true);
        let mut d = dispatcher();

        let fired = d.on_alarm(&mut table, &clock).unwrap();
        assert_eq!(fired, AlarmFired::Started { duration: 5, intensity: 50 });
        assert_eq!(d.actuator().running, Some(50));
        assert_eq!(d.timer().armed, Some(5));
        assert!(matches!(d.state(), DispatchState::Actuating { .. }));
        clock.with_registers(|r| assert!(!r.alarm_pending, "Alarm flag cleared"));
    }

    #[test]
    fn test_alarm_with_empty_head_is_dormant() {
        let mut table = Table::new(RamStore::new());
        let clock = SharedClockPeripheral::new(FakeRtc::at(0));
        clock.with_registers(|r| r.alarm_pending = true);
        let mut d = dispatcher();

        assert_eq!(d.on_alarm(&mut table, &clock), Ok(AlarmFired::Dormant));
        assert_eq!(d.actuator().running, None);
        assert_eq!(d.state(), DispatchState::Idle);
        clock.with_registers(|r| assert!(!r.alarm_pending));
    }

    #[test]
    fn test_second_alarm_while_actuating_is_ignored() {
        let mut table = Table::new(RamStore::new());
        table.write(slot(0), &event(5, 50, 1, 0)).unwrap();
        let clock = SharedClockPeripheral::new(FakeRtc::at(3600));
        let mut d = dispatcher();

        d.on_alarm(&mut table, &clock).unwrap();
        assert_eq!(d.on_alarm(&mut table, &clock), Ok(AlarmFired::Busy));
        assert_eq!(d.actuator().starts, 1);
    }

    #[test]
    fn test_timeout_retires_head_and_rearms_next() {
        let mut table = Table::new(RamStore::new());
        table.write(slot(0), &event(5, 50, 1, 0)).unwrap();
        table.write(slot(1), &event(7, 80, 2, 30)).unwrap();
        let clock = SharedClockPeripheral::new(FakeRtc::at(3600));
        let mut d = dispatcher();

        d.on_alarm(&mut table, &clock).unwrap();
        let status = d.on_timeout(&mut table, &clock).unwrap();

        assert_eq!(d.actuator().running, None, "Auger stopped");
        assert_eq!(d.timer().interrupts_cleared, 1);
        assert_eq!(d.state(), DispatchState::Idle);
        assert_eq!(status.armed_at(), Some(TimeOfDay::new(2, 30).unwrap()));

        let head = table.read(slot(0)).unwrap();
        assert_eq!(head.duration, Some(7), "Next event moved to the head");
        assert_eq!(head.index, Some(0));
        assert!(table.read(slot(1)).unwrap().same_event(&EventRecord::EMPTY));
    }

    #[test]
    fn test_timeout_retires_fired_record_after_foreground_resort() {
        let mut table = Table::new(RamStore::new());
        table.write(slot(0), &event(5, 50, 1, 0)).unwrap();
        let clock = SharedClockPeripheral::new(FakeRtc::at(3600));
        let mut d = dispatcher();
        d.on_alarm(&mut table, &clock).unwrap();

        // The foreground slips an earlier event in while the auger runs.
        table.write(slot(1), &event(9, 20, 0, 30)).unwrap();
        sorter::sort(&mut table).unwrap();
        assert_eq!(table.read(slot(0)).unwrap().duration, Some(9));

        d.on_timeout(&mut table, &clock).unwrap();
        let events = table.active_events().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].duration, Some(9), "The newcomer survives");
    }

    #[test]
    fn test_timeout_storage_fault_still_rearms() {
        let mut table = Table::new(RamStore::new());
        table.write(slot(0), &event(5, 50, 1, 0)).unwrap();
        table.write(slot(1), &event(5, 50, 2, 0)).unwrap();
        let clock = SharedClockPeripheral::new(FakeRtc::at(3600));
        let mut d = dispatcher();
        d.on_alarm(&mut table, &clock).unwrap();
        clock.with_registers(|r| r.advance(5));

        table.store_mut().fail_write_after(0);
        assert_eq!(
            d.on_timeout(&mut table, &clock),
            Err(crate::error::FeederError::StorageUnavailable)
        );
        assert_eq!(d.state(), DispatchState::Idle);
        assert_eq!(d.actuator().running, None);
        assert_eq!(clock.match_value(), 7200, "Next event armed despite the fault");

        let events = table.active_events().unwrap();
        assert_eq!(events[0].time, Some(TimeOfDay::new(2, 0).unwrap()));
        assert_eq!(
            events[1].time,
            Some(TimeOfDay::new(25, 0).unwrap()),
            "Uncleared record comes back tomorrow"
        );
    }

    #[test]
    fn test_spurious_timeout_keeps_events() {
        let mut table = Table::new(RamStore::new());
        table.write(slot(0), &event(5, 50, 1, 0)).unwrap();
        let clock = SharedClockPeripheral::new(FakeRtc::at(0));
        let mut d = dispatcher();

        let status = d.on_timeout(&mut table, &clock).unwrap();
        assert_eq!(status.armed_at(), Some(TimeOfDay::new(1, 0).unwrap()));
        assert_eq!(table.active_events().unwrap().len(), 1);
        assert_eq!(d.actuator().stops, 1, "Auger forced off regardless");
    }
}
