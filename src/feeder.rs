//! # Feeder
//!
//! Top-level API of the feeder core: the operations the command layer
//! invokes, plus the two interrupt entry points.
//!
//! Every mutating operation closes the same loop:
//!
//! ```text
//! command ─► validate ─► write slot ─► sort ─► rearm ─► AlarmStatus
//!                                                         │
//!  hardware alarm ─► on_alarm() ─► auger on, timer armed  │
//!  timer expiry   ─► on_timeout() ─► retire ─► sort ─► rearm
//! ```
//!
//! Inputs are fully validated before the first storage write.

use crate::alarm::{self, AlarmStatus};
use crate::clock::{RtcRegisters, SharedClockPeripheral};
use crate::config::CLOCK_DISPLAY_HOURS;
use crate::dispatch::{Actuator, AlarmFired, DispatchState, Dispatcher, OneShotTimer};
use crate::error::{FeederError, Result};
use crate::event::{AlertMode, DeviceConfig, EventRecord, FillMode, Slot, TimeOfDay};
use crate::sorter::{self, SortOutcome};
use crate::store::WordStore;
use crate::table::{EventList, EventTable};

/// The feeder core: event table, shared clock and dispatcher.
pub struct Feeder<'c, S, R, A, T> {
    table: EventTable<S>,
    clock: &'c SharedClockPeripheral<R>,
    dispatcher: Dispatcher<A, T>,
}

impl<'c, S, R, A, T> Feeder<'c, S, R, A, T>
where
    S: WordStore,
    R: RtcRegisters,
    A: Actuator,
    T: OneShotTimer,
{
    pub fn new(store: S, clock: &'c SharedClockPeripheral<R>, actuator: A, timer: T) -> Self {
        Self {
            table: EventTable::new(store),
            clock,
            dispatcher: Dispatcher::new(actuator, timer),
        }
    }

    /// Bring the persisted state in line after reset: migrate legacy
    /// settings, sort, and arm the alarm for the earliest event.
    pub fn start(&mut self) -> Result<AlarmStatus> {
        self.table.migrate_legacy_config()?;
        self.resort()?;
        self.rearm_alarm()
    }

    // -----------------------------------------------------------------------
    // Event commands
    // -----------------------------------------------------------------------

    /// Write a feeding event into `slot`, replacing whatever it held.
    ///
    /// `hour:minute` is wall-clock time. A time already passed today is
    /// stored as tomorrow (hour + 24).
    pub fn create_or_replace_event(
        &mut self,
        slot: usize,
        duration: u16,
        intensity: u8,
        hour: u8,
        minute: u8,
    ) -> Result<AlarmStatus> {
        let slot = Slot::new(slot)?;
        let mut time = TimeOfDay::wall_clock(hour, minute)?;
        if time.seconds() < self.clock.now() {
            time = time.next_day()?;
        }
        let record = EventRecord::new(duration, intensity, time)?;

        self.table.write(slot, &record)?;
        info!(
            "event scheduled in slot {}: {}:{} for {}s",
            slot.index(),
            time.hour(),
            time.minute(),
            duration
        );
        self.resort()?;
        self.rearm_alarm()
    }

    /// Remove the live event in `slot`.
    ///
    /// A slot outside the table or without a live event yields
    /// `SlotOutOfRange` and nothing is written.
    pub fn delete_event(&mut self, slot: usize) -> Result<AlarmStatus> {
        let slot = Slot::new(slot)?;
        if !self.table.read(slot)?.is_armable() {
            return Err(FeederError::SlotOutOfRange);
        }
        self.table.clear(slot)?;
        info!("event in slot {} deleted", slot.index());
        self.resort()?;
        self.rearm_alarm()
    }

    pub fn resort(&mut self) -> Result<SortOutcome> {
        sorter::sort(&mut self.table)
    }

    pub fn rearm_alarm(&mut self) -> Result<AlarmStatus> {
        alarm::rearm(&mut self.table, self.clock)
    }

    /// Live events in table order (sorted once the table has been sorted).
    pub fn list_events(&mut self) -> Result<EventList> {
        self.table.active_events()
    }

    // -----------------------------------------------------------------------
    // Clock
    // -----------------------------------------------------------------------

    /// Load the RTC with a wall-clock time, then sort and rearm so the
    /// absolute match register follows the new time base.
    pub fn set_time(&mut self, hour: u8, minute: u8) -> Result<AlarmStatus> {
        let time = TimeOfDay::wall_clock(hour, minute)?;
        self.clock.set_counter(time.seconds());
        info!("clock set to {}:{}", hour, minute);
        self.resort()?;
        self.rearm_alarm()
    }

    /// Current clock reading; the hour wraps after two days.
    pub fn current_time(&self) -> TimeOfDay {
        TimeOfDay::from_seconds(self.clock.now(), CLOCK_DISPLAY_HOURS)
    }

    // -----------------------------------------------------------------------
    // Settings
    // -----------------------------------------------------------------------

    pub fn device_config(&mut self) -> Result<DeviceConfig> {
        self.table.device_config()
    }

    fn update_config<F>(&mut self, f: F) -> Result<DeviceConfig>
    where
        F: FnOnce(&mut DeviceConfig),
    {
        let mut config = self.table.device_config()?;
        f(&mut config);
        self.table.set_device_config(&config)?;
        Ok(config)
    }

    /// Target water volume in mL; 0 disables regulation.
    pub fn set_water_volume(&mut self, volume: u16) -> Result<DeviceConfig> {
        self.update_config(|c| c.water_volume = volume)
    }

    pub fn set_fill_mode(&mut self, mode: FillMode) -> Result<DeviceConfig> {
        self.update_config(|c| c.fill_mode = mode)
    }

    pub fn set_alert_mode(&mut self, mode: AlertMode) -> Result<DeviceConfig> {
        self.update_config(|c| c.alert_mode = mode)
    }

    // -----------------------------------------------------------------------
    // Interrupt entry points
    // -----------------------------------------------------------------------

    /// RTC alarm-match interrupt.
    pub fn on_alarm(&mut self) -> Result<AlarmFired> {
        self.dispatcher.on_alarm(&mut self.table, self.clock)
    }

    /// Feeding-duration timer interrupt.
    pub fn on_timeout(&mut self) -> Result<AlarmStatus> {
        self.dispatcher.on_timeout(&mut self.table, self.clock)
    }

    pub fn dispatch_state(&self) -> DispatchState {
        self.dispatcher.state()
    }

    pub fn dispatcher(&self) -> &Dispatcher<A, T> {
        &self.dispatcher
    }

    pub fn table_mut(&mut self) -> &mut EventTable<S> {
        &mut self.table
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{STORE_WORDS, UNSET_WORD};
    use crate::store::RamStore;
    use crate::testing::{FakeRtc, RecordingActuator, RecordingTimer};

    type TestFeeder<'c> =
        Feeder<'c, RamStore<STORE_WORDS>, FakeRtc, RecordingActuator, RecordingTimer>;

    fn feeder(clock: &SharedClockPeripheral<FakeRtc>) -> TestFeeder<'_> {
        Feeder::new(
            RamStore::new(),
            clock,
            RecordingActuator::default(),
            RecordingTimer::default(),
        )
    }

    fn t(hour: u8, minute: u8) -> TimeOfDay {
        TimeOfDay::new(hour, minute).unwrap()
    }

    #[test]
    fn test_end_to_end_feeding_cycle() {
        let clock = SharedClockPeripheral::new(FakeRtc::at(0));
        let mut f = feeder(&clock);
        assert_eq!(f.start(), Ok(AlarmStatus::NotScheduled));

        let status = f.create_or_replace_event(3, 5, 50, 1, 0).unwrap();
        assert_eq!(status.armed_at(), Some(t(1, 0)));
        assert_eq!(clock.match_value(), 3600);

        let head = f.table_mut().read(Slot::HEAD).unwrap();
        assert_eq!(head.index, Some(0), "Relocated to slot 0");
        assert_eq!(head.duration, Some(5));
        assert_eq!(head.intensity, Some(50));
        assert_eq!(head.time, Some(t(1, 0)));

        clock.with_registers(|r| r.advance(3600));
        assert_eq!(
            f.on_alarm(),
            Ok(AlarmFired::Started { duration: 5, intensity: 50 })
        );
        assert_eq!(f.dispatcher().actuator().running, Some(50));
        assert_eq!(f.dispatcher().timer().armed, Some(5));

        clock.with_registers(|r| r.advance(5));
        assert_eq!(f.on_timeout(), Ok(AlarmStatus::NotScheduled));
        assert_eq!(f.dispatcher().actuator().running, None);

        let head = f.table_mut().read(Slot::HEAD).unwrap();
        assert!(!head.active);
        assert_eq!(head.duration, None);
        assert_eq!(head.time, None);
        assert_eq!(f.rearm_alarm(), Ok(AlarmStatus::NotScheduled));
        assert!(f.list_events().unwrap().is_empty());
    }

    #[test]
    fn test_passed_head_does_not_block_later_events() {
        let clock = SharedClockPeripheral::new(FakeRtc::at(0));
        let mut f = feeder(&clock);
        f.create_or_replace_event(0, 120, 50, 1, 0).unwrap();
        f.create_or_replace_event(1, 5, 50, 1, 1).unwrap();

        clock.with_registers(|r| r.advance(3600));
        f.on_alarm().unwrap();
        clock.with_registers(|r| r.advance(120));
        // 01:01 went by while the 01:00 run was still going.
        let status = f.on_timeout().unwrap();
        assert_eq!(status.armed_at(), Some(t(1, 1)));
        assert_eq!(clock.match_value(), 25 * 3600 + 60, "Rolled to tomorrow");

        let status = f.create_or_replace_event(2, 5, 50, 5, 0).unwrap();
        assert_eq!(status.armed_at(), Some(t(5, 0)));
        assert_eq!(clock.match_value(), 5 * 3600, "Later today comes first");
        let times: std::vec::Vec<_> = f.list_events().unwrap().iter().map(|e| e.time).collect();
        assert_eq!(times, [Some(t(5, 0)), Some(t(25, 1))]);
    }

    #[test]
    fn test_rearm_during_run_still_retires_fired_event() {
        let clock = SharedClockPeripheral::new(FakeRtc::at(0));
        let mut f = feeder(&clock);
        f.create_or_replace_event(0, 120, 50, 1, 0).unwrap();
        f.create_or_replace_event(1, 5, 60, 3, 0).unwrap();

        clock.with_registers(|r| r.advance(3600));
        f.on_alarm().unwrap();
        clock.with_registers(|r| r.advance(10));
        // The running event is moved to tomorrow by this rearm.
        let status = f.create_or_replace_event(2, 5, 70, 2, 0).unwrap();
        assert_eq!(status.armed_at(), Some(t(2, 0)));

        clock.with_registers(|r| r.advance(110));
        let status = f.on_timeout().unwrap();
        assert_eq!(status.armed_at(), Some(t(2, 0)));
        let times: std::vec::Vec<_> = f.list_events().unwrap().iter().map(|e| e.time).collect();
        assert_eq!(times, [Some(t(2, 0)), Some(t(3, 0))], "01:00 retired, not repeated");
    }

    #[test]
    fn test_create_validates_before_writing() {
        let clock = SharedClockPeripheral::new(FakeRtc::at(0));
        let mut f = feeder(&clock);

        assert_eq!(
            f.create_or_replace_event(10, 5, 50, 1, 0),
            Err(FeederError::SlotOutOfRange)
        );
        assert_eq!(
            f.create_or_replace_event(0, 5, 50, 24, 0),
            Err(FeederError::InvalidTime)
        );
        assert_eq!(
            f.create_or_replace_event(0, 5, 50, 1, 60),
            Err(FeederError::InvalidTime)
        );
        assert_eq!(
            f.create_or_replace_event(0, 5, 101, 1, 0),
            Err(FeederError::InvalidIntensity)
        );
        assert!(
            f.table_mut().store().words().iter().all(|&w| w == UNSET_WORD),
            "Rejected input must not touch storage"
        );
    }

    #[test]
    fn test_past_time_is_scheduled_tomorrow() {
        let clock = SharedClockPeripheral::new(FakeRtc::at(10 * 3600));
        let mut f = feeder(&clock);

        let status = f.create_or_replace_event(0, 5, 50, 8, 0).unwrap();
        let events = f.list_events().unwrap();
        assert_eq!(events[0].time, Some(t(32, 0)), "Stored biased past 24h");
        assert_eq!(events[0].display_time(), Some(t(8, 0)));
        assert_eq!(status.armed_at(), Some(t(8, 0)));
        assert_eq!(clock.match_value(), 32 * 3600);
    }

    #[test]
    fn test_events_listed_in_time_order() {
        let clock = SharedClockPeripheral::new(FakeRtc::at(0));
        let mut f = feeder(&clock);
        f.create_or_replace_event(0, 1, 10, 18, 0).unwrap();
        f.create_or_replace_event(1, 2, 20, 7, 30).unwrap();
        let status = f.create_or_replace_event(2, 3, 30, 12, 0).unwrap();

        assert_eq!(status.armed_at(), Some(t(7, 30)));
        let times: std::vec::Vec<_> = f.list_events().unwrap().iter().map(|e| e.time).collect();
        assert_eq!(times, [Some(t(7, 30)), Some(t(12, 0)), Some(t(18, 0))]);
    }

    #[test]
    fn test_replace_overwrites_slot() {
        let clock = SharedClockPeripheral::new(FakeRtc::at(0));
        let mut f = feeder(&clock);
        f.create_or_replace_event(0, 1, 10, 9, 0).unwrap();
        f.create_or_replace_event(0, 4, 40, 6, 0).unwrap();

        let events = f.list_events().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].duration, Some(4));
    }

    #[test]
    fn test_delete_event() {
        let clock = SharedClockPeripheral::new(FakeRtc::at(0));
        let mut f = feeder(&clock);
        f.create_or_replace_event(0, 1, 10, 9, 0).unwrap();
        f.create_or_replace_event(1, 2, 20, 10, 0).unwrap();

        let status = f.delete_event(0).unwrap();
        assert_eq!(status.armed_at(), Some(t(10, 0)));
        assert_eq!(f.list_events().unwrap().len(), 1);

        assert_eq!(f.delete_event(0).map(|_| ()), Ok(()));
        assert_eq!(f.rearm_alarm(), Ok(AlarmStatus::NotScheduled));
    }

    #[test]
    fn test_delete_inactive_slot_does_not_mutate() {
        let clock = SharedClockPeripheral::new(FakeRtc::at(0));
        let mut f = feeder(&clock);
        f.create_or_replace_event(0, 1, 10, 9, 0).unwrap();
        let before = *f.table_mut().store().words();

        assert_eq!(f.delete_event(5), Err(FeederError::SlotOutOfRange));
        assert_eq!(f.delete_event(10), Err(FeederError::SlotOutOfRange));
        assert_eq!(*f.table_mut().store().words(), before);
    }

    #[test]
    fn test_identical_times_keep_creation_order() {
        let clock = SharedClockPeripheral::new(FakeRtc::at(0));
        let mut f = feeder(&clock);
        f.create_or_replace_event(4, 40, 10, 9, 0).unwrap();
        f.create_or_replace_event(7, 70, 10, 9, 0).unwrap();

        let events = f.list_events().unwrap();
        assert_eq!(events[0].duration, Some(40));
        assert_eq!(events[1].duration, Some(70));
    }

    #[test]
    fn test_set_time_rearms() {
        let clock = SharedClockPeripheral::new(FakeRtc::at(0));
        let mut f = feeder(&clock);
        f.create_or_replace_event(0, 1, 10, 9, 0).unwrap();

        assert_eq!(f.set_time(24, 0), Err(FeederError::InvalidTime));
        let status = f.set_time(8, 30).unwrap();
        assert_eq!(f.current_time(), t(8, 30));
        assert_eq!(
            status,
            AlarmStatus::Armed {
                at: t(9, 0),
                in_seconds: 1800
            }
        );
    }

    #[test]
    fn test_current_time_wraps_after_two_days() {
        let clock = SharedClockPeripheral::new(FakeRtc::at(49 * 3600 + 5 * 60));
        let f = feeder(&clock);
        assert_eq!(f.current_time(), t(1, 5));
    }

    #[test]
    fn test_settings_survive_sorting() {
        let clock = SharedClockPeripheral::new(FakeRtc::at(0));
        let mut f = feeder(&clock);
        f.set_water_volume(300).unwrap();
        f.set_fill_mode(FillMode::Auto).unwrap();
        f.set_alert_mode(AlertMode::On).unwrap();

        f.create_or_replace_event(5, 1, 10, 9, 0).unwrap();
        f.create_or_replace_event(2, 2, 10, 4, 0).unwrap();

        let cfg = f.device_config().unwrap();
        assert_eq!(cfg.water_volume, 300);
        assert_eq!(cfg.fill_mode, FillMode::Auto);
        assert_eq!(cfg.alert_mode, AlertMode::On);
    }

    #[test]
    fn test_storage_fault_leaves_slot_unchanged() {
        let clock = SharedClockPeripheral::new(FakeRtc::at(0));
        let mut f = feeder(&clock);
        f.create_or_replace_event(0, 1, 10, 9, 0).unwrap();

        f.table_mut().store_mut().fail_write_after(1);
        assert_eq!(
            f.create_or_replace_event(0, 2, 20, 10, 0),
            Err(FeederError::StorageUnavailable)
        );
        let events = f.list_events().unwrap();
        assert_eq!(events[0].duration, Some(1));
        assert_eq!(events[0].time, Some(t(9, 0)));
    }
}
