//! # PetFeeder: scheduled feeder firmware core
//!
//! Keeps a table of feeding events in non-volatile storage, sorted by time
//! of day, and keeps the single RTC alarm comparator primed for the
//! earliest one. When the alarm fires the auger runs for the event's
//! duration; when that run ends the event is retired and the alarm is
//! re-armed for the next event. The loop closes on itself.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │         Console commands (command.rs) · firmware        │
//! ├────────────────────────────────────────────────────────┤
//! │                 Feeder API (feeder.rs)                  │
//! │   create_or_replace_event · delete_event · resort ·     │
//! │   rearm_alarm · list_events · on_alarm · on_timeout     │
//! ├──────────────┬────────────────────┬───────────────────┤
//! │  Sorter      │  Alarm Scheduler   │  Dispatch         │
//! │  sorter.rs   │  alarm.rs          │  dispatch.rs      │
//! │  ─ sort()    │  ─ rearm()         │  ─ on_alarm()     │
//! │              │  ─ delta_to()      │  ─ on_timeout()   │
//! ├──────────────┴─────────┬──────────┴───────────────────┤
//! │  Event Table (table.rs) │  SharedClockPeripheral       │
//! │  EventRecord (event.rs) │  (clock.rs, sync.rs)         │
//! ├─────────────────────────┼──────────────────────────────┤
//! │  WordStore (store.rs)   │  RtcRegisters                │
//! ├─────────────────────────┴──────────────────────────────┤
//! │     TM4C123 port (arch/tm4c123.rs): EEPROM · HIB RTC ·  │
//! │     PWM0 auger · WTIMER2 one-shot · UART0 console       │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Invariants
//!
//! - The table always has exactly [`config::SLOT_COUNT`] slots.
//! - After every sort, live events occupy the leading slots in ascending
//!   `(hour, minute)` order, ties in prior slot order, and every slot's
//!   index word equals its position.
//! - Only slot 0 is ever armed in hardware.
//! - Device settings live in their own block and never move.
//!
//! ## Memory Model
//!
//! - **No heap**: fixed arrays and `heapless` collections only
//! - **Critical sections**: `critical-section` for all state shared with
//!   interrupt handlers; `cortex-m` provides the single-core impl on target

#![cfg_attr(not(test), no_std)]

// This module must come first so the others see its macros.
mod fmt;

pub mod config;
pub mod error;
pub mod sync;
pub mod store;
pub mod event;
pub mod table;
pub mod sorter;
pub mod clock;
pub mod alarm;
pub mod dispatch;
pub mod feeder;
pub mod command;
#[cfg(feature = "tm4c123")]
pub mod arch;

#[cfg(test)]
mod testing;

pub use alarm::AlarmStatus;
pub use error::FeederError;
pub use event::{AlertMode, DeviceConfig, EventRecord, FillMode, Slot, TimeOfDay};
pub use feeder::Feeder;
