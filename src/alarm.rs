//! # Alarm Scheduler
//!
//! Derives the single hardware deadline from the head of the sorted event
//! table and programs the RTC match register with it.
//!
//! ## Rearm procedure
//!
//! 1. Read slot 0. If it is not a live event, report
//!    [`AlarmStatus::NotScheduled`] and leave the hardware alone.
//!    If its time has already passed today, store it as tomorrow
//!    (hour + 24) and re-sort, so that events still due today move ahead
//!    of it. Repeat until the head lies ahead of the counter.
//! 2. `target = hour * 3600 + minute * 60`; hours past 23 denote the next
//!    day and simply produce a larger target.
//! 3. Inside one critical section: sample the counter `now`, compute
//!    `delta = target - now` with wrapping arithmetic, write
//!    `now + delta` to the match register and read it back.
//! 4. If the target is not strictly ahead of `now`, `delta` is pushed
//!    forward by whole days so the alarm fires at the next occurrence of
//!    that time of day instead of only after the counter wraps.
//! 5. Report the time decoded from the read-back match value, folded into
//!    24 hours, so callers display exactly what the hardware holds.
//!
//! A storage fault is an `Err`, distinct from "nothing scheduled".

use crate::clock::{RtcRegisters, SharedClockPeripheral};
use crate::config::{HOURS_PER_DAY, SECONDS_PER_DAY};
use crate::error::Result;
use crate::event::{EventRecord, Slot, TimeOfDay};
use crate::sorter;
use crate::store::WordStore;
use crate::table::EventTable;

/// Outcome of a rearm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AlarmStatus {
    /// The match register holds a deadline.
    Armed {
        /// Time of day decoded from the match register, hour in `0..24`.
        at: TimeOfDay,
        /// Seconds from the counter sample to the deadline.
        in_seconds: u32,
    },
    /// Slot 0 holds no live event; the match register was not touched.
    NotScheduled,
}

impl AlarmStatus {
    pub fn armed_at(&self) -> Option<TimeOfDay> {
        match self {
            AlarmStatus::Armed { at, .. } => Some(*at),
            AlarmStatus::NotScheduled => None,
        }
    }
}

impl core::fmt::Display for AlarmStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            AlarmStatus::Armed { at, .. } => write!(f, "Alarm time is {}", at),
            AlarmStatus::NotScheduled => f.write_str("No alarm scheduled."),
        }
    }
}

/// Distance from `now` to the next occurrence of `target`, in seconds.
///
/// Always in `1..=` a few days: a target at or behind `now` is moved
/// forward by as many whole days as needed.
pub fn delta_to(target: u32, now: u32) -> u32 {
    let delta = target.wrapping_sub(now);
    if (delta as i32) > 0 {
        return delta;
    }
    let behind = now.wrapping_sub(target);
    let days = behind / SECONDS_PER_DAY + 1;
    delta.wrapping_add(days * SECONDS_PER_DAY)
}

/// Reprogram the hardware alarm from slot 0.
pub fn rearm<S, R>(table: &mut EventTable<S>, clock: &SharedClockPeripheral<R>) -> Result<AlarmStatus>
where
    S: WordStore,
    R: RtcRegisters,
{
    let time = loop {
        let head = table.read(Slot::HEAD)?;
        let time = match head.time {
            Some(time) if head.is_armable() => time,
            _ => {
                info!("no alarm scheduled");
                return Ok(AlarmStatus::NotScheduled);
            }
        };
        if time.is_tomorrow() || time.seconds() > clock.now() {
            break time;
        }

        // Passed today; every roll biases one more record, so this ends.
        let rolled = EventRecord {
            time: Some(time.next_day()?),
            ..head
        };
        table.write(Slot::HEAD, &rolled)?;
        debug!("head {}:{} passed, moved to tomorrow", time.hour(), time.minute());
        sorter::sort(table)?;
    };

    let target = time.seconds();
    let programmed = clock.program_match(|now| delta_to(target, now));

    let at = TimeOfDay::from_seconds(programmed.readback, HOURS_PER_DAY as u32);
    let in_seconds = programmed.readback.wrapping_sub(programmed.now);
    if programmed.readback % SECONDS_PER_DAY != target % SECONDS_PER_DAY {
        warn!(
            "match register reads back {} for target {}",
            programmed.readback,
            target
        );
    }
    info!("alarm armed for {}:{} in {}s", at.hour(), at.minute(), in_seconds);
    Ok(AlarmStatus::Armed { at, in_seconds })
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{STORE_WORDS, UNSET_WORD};
    use crate::event::EventRecord;
    use crate::store::RamStore;
    use crate::testing::FakeRtc;

    type Table = EventTable<RamStore<STORE_WORDS>>;

    fn table_with_head(hour: u8, minute: u8) -> Table {
        let mut table = Table::new(RamStore::new());
        let rec = EventRecord::new(5, 50, TimeOfDay::new(hour, minute).unwrap()).unwrap();
        table.write(Slot::HEAD, &rec).unwrap();
        table
    }

    #[test]
    fn test_delta_forward() {
        assert_eq!(delta_to(120, 100), 20);
        assert_eq!(delta_to(90_000, 100), 89_900, "Tomorrow-biased target");
    }

    #[test]
    fn test_delta_rolls_past_targets_to_next_day() {
        assert_eq!(delta_to(50, 100), SECONDS_PER_DAY - 50);
        assert_eq!(delta_to(100, 100), SECONDS_PER_DAY, "Due now means next day");
        assert_eq!(
            delta_to(3600, 3 * SECONDS_PER_DAY),
            3600,
            "Several days behind lands on the next occurrence"
        );
    }

    #[test]
    fn test_rearm_round_trip() {
        let mut table = table_with_head(0, 2);
        let clock = SharedClockPeripheral::new(FakeRtc::at(100));

        let status = rearm(&mut table, &clock).unwrap();
        assert_eq!(
            status,
            AlarmStatus::Armed {
                at: TimeOfDay::new(0, 2).unwrap(),
                in_seconds: 20,
            }
        );
        assert_eq!(clock.match_value(), 120);
    }

    #[test]
    fn test_rearm_past_target_fires_later_not_never() {
        // Target 00:00:50 is behind the counter at 100 s.
        let mut table = Table::new(RamStore::new());
        let rec = EventRecord::new(1, 10, TimeOfDay::new(0, 0).unwrap()).unwrap();
        table.write(Slot::HEAD, &rec).unwrap();
        let clock = SharedClockPeripheral::new(FakeRtc::at(100));

        let status = rearm(&mut table, &clock).unwrap();
        let programmed = clock.match_value();
        assert!(programmed > 100, "Match must lie ahead of the counter");
        assert_eq!(programmed, SECONDS_PER_DAY);
        assert_eq!(status.armed_at(), Some(TimeOfDay::new(0, 0).unwrap()));
    }

    #[test]
    fn test_rearm_tomorrow_bias_displays_normalized() {
        let mut table = table_with_head(25, 30);
        let clock = SharedClockPeripheral::new(FakeRtc::at(20 * 3600));

        let status = rearm(&mut table, &clock).unwrap();
        assert_eq!(clock.match_value(), 25 * 3600 + 30 * 60);
        assert_eq!(status.armed_at(), Some(TimeOfDay::new(1, 30).unwrap()));
    }

    #[test]
    fn test_rearm_rolls_passed_head_behind_later_events() {
        let mut table = table_with_head(1, 0);
        let later = EventRecord::new(7, 70, TimeOfDay::new(5, 0).unwrap()).unwrap();
        table.write(Slot::new(1).unwrap(), &later).unwrap();
        let clock = SharedClockPeripheral::new(FakeRtc::at(2 * 3600));

        let status = rearm(&mut table, &clock).unwrap();
        assert_eq!(status.armed_at(), Some(TimeOfDay::new(5, 0).unwrap()));
        assert_eq!(clock.match_value(), 5 * 3600, "Today's event armed first");

        let events = table.active_events().unwrap();
        assert_eq!(events[0].duration, Some(7));
        assert_eq!(
            events[1].time,
            Some(TimeOfDay::new(25, 0).unwrap()),
            "Passed event persisted as tomorrow"
        );
    }

    #[test]
    fn test_status_display() {
        let armed = AlarmStatus::Armed {
            at: TimeOfDay::new(7, 5).unwrap(),
            in_seconds: 1,
        };
        assert_eq!(armed.to_string(), "Alarm time is 07:05");
        assert_eq!(AlarmStatus::NotScheduled.to_string(), "No alarm scheduled.");
    }

    #[test]
    fn test_rearm_without_event_leaves_hardware_alone() {
        let mut table = Table::new(RamStore::new());
        let clock = SharedClockPeripheral::new(FakeRtc::at(100));
        clock.with_registers(|r| r.set_match(UNSET_WORD - 1));

        assert_eq!(rearm(&mut table, &clock), Ok(AlarmStatus::NotScheduled));
        assert_eq!(clock.match_value(), UNSET_WORD - 1);
        clock.with_registers(|r| assert_eq!(r.match_writes, 1, "Only the setup write"));
    }

    #[test]
    fn test_rearm_storage_fault_is_an_error() {
        struct Broken;
        impl WordStore for Broken {
            type Error = ();
            fn read_word(&mut self, _: u32) -> core::result::Result<u32, ()> {
                Err(())
            }
            fn write_word(&mut self, _: u32, _: u32) -> core::result::Result<(), ()> {
                Err(())
            }
        }
        let mut table = EventTable::new(Broken);
        let clock = SharedClockPeripheral::new(FakeRtc::at(0));
        assert_eq!(
            rearm(&mut table, &clock),
            Err(crate::error::FeederError::StorageUnavailable)
        );
    }
}
