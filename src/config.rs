//! # Feeder Configuration
//!
//! Compile-time constants governing the event table layout, the RTC
//! time base and the actuator hardware. Runtime settings chosen by the
//! user live in [`crate::event::DeviceConfig`], persisted in its own block.

// ---------------------------------------------------------------------------
// Event table layout
// ---------------------------------------------------------------------------

/// Number of event slots in the table. Fixed; only slot contents change.
pub const SLOT_COUNT: usize = 10;

/// Storage words per block. Every record occupies a whole block so that
/// block addresses stay `WORDS_PER_BLOCK * block + field`.
pub const WORDS_PER_BLOCK: u32 = 16;

/// Block holding the [`DeviceConfig`](crate::event::DeviceConfig) record.
/// Sits directly after the event table so the sorter can never swap it.
pub const CONFIG_BLOCK: u32 = SLOT_COUNT as u32;

/// Total number of words the firmware touches in the record store.
pub const STORE_WORDS: usize = (CONFIG_BLOCK as usize + 1) * WORDS_PER_BLOCK as usize;

/// All-ones pattern meaning "field unset". Erased EEPROM reads as this.
pub const UNSET_WORD: u32 = 0xFFFF_FFFF;

/// Word offsets of the event record fields inside a block.
pub mod field {
    pub const INDEX: u32 = 0;
    pub const DURATION: u32 = 1;
    pub const INTENSITY: u32 = 2;
    pub const HOUR: u32 = 3;
    pub const MINUTE: u32 = 4;
    pub const ACTIVE: u32 = 5;

    /// Number of leading words that carry event data (index..=active).
    pub const EVENT_WORDS: u32 = 6;
}

/// Word offsets of the device settings inside [`CONFIG_BLOCK`].
pub mod setting {
    pub const VOLUME: u32 = 0;
    pub const FILL_MODE: u32 = 1;
    pub const ALERT_MODE: u32 = 2;

    /// Offsets 6..=8 of block 0 where older images kept the same three
    /// settings, in the order volume, fill mode, alert mode.
    pub const LEGACY_VOLUME: u32 = 6;
    pub const LEGACY_FILL_MODE: u32 = 7;
    pub const LEGACY_ALERT_MODE: u32 = 8;
}

// ---------------------------------------------------------------------------
// Time base
// ---------------------------------------------------------------------------

pub const SECONDS_PER_MINUTE: u32 = 60;
pub const SECONDS_PER_HOUR: u32 = 3600;
pub const SECONDS_PER_DAY: u32 = 24 * SECONDS_PER_HOUR;

/// Hours in a day. Stored hours at or above this value mean "tomorrow".
pub const HOURS_PER_DAY: u8 = 24;

/// Largest stored hour plus one. A biased event never exceeds 47:59.
pub const MAX_STORED_HOUR: u8 = 2 * HOURS_PER_DAY;

/// The clock display wraps after two days, matching the stored hour range.
pub const CLOCK_DISPLAY_HOURS: u32 = MAX_STORED_HOUR as u32;

// ---------------------------------------------------------------------------
// Actuators
// ---------------------------------------------------------------------------

/// Highest accepted feeding intensity, in percent of full duty.
pub const MAX_INTENSITY: u8 = 100;

/// System clock frequency in Hz (TM4C123 PLL at 40 MHz).
pub const SYSTEM_CLOCK_HZ: u32 = 40_000_000;

/// PWM generator period in counts; the auger duty is scaled against it.
pub const PWM_PERIOD: u32 = 1023;

/// UART0 baud rate for the command console.
pub const CONSOLE_BAUD: u32 = 115_200;
