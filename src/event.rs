//! # Event Records
//!
//! The data model of the feeder: validated slot numbers, times of day,
//! the per-slot [`EventRecord`] and the process-wide [`DeviceConfig`].
//!
//! ## Storage encoding
//!
//! Each event occupies one 16-word block; only the first six words carry
//! data:
//!
//! | word | field     | unset encoding |
//! |------|-----------|----------------|
//! | 0    | index     | `0xFFFF_FFFF`  |
//! | 1    | duration  | `0xFFFF_FFFF`  |
//! | 2    | intensity | `0xFFFF_FFFF`  |
//! | 3    | hour      | `0xFFFF_FFFF`  |
//! | 4    | minute    | `0xFFFF_FFFF`  |
//! | 5    | active    | `0`            |
//!
//! In memory every unset field is `None`. Words that decode outside their
//! domain (a corrupted cell) are also read back as `None`.

use crate::config::{
    field, setting, HOURS_PER_DAY, MAX_INTENSITY, MAX_STORED_HOUR, SECONDS_PER_HOUR,
    SECONDS_PER_MINUTE, SLOT_COUNT, UNSET_WORD, WORDS_PER_BLOCK,
};
use crate::error::{FeederError, Result};

// ---------------------------------------------------------------------------
// Slot
// ---------------------------------------------------------------------------

/// Position of a record in the event table, always in `0..SLOT_COUNT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Slot(u8);

impl Slot {
    /// The head of the sorted table, the only slot ever dispatched.
    pub const HEAD: Slot = Slot(0);

    pub fn new(slot: usize) -> Result<Self> {
        if slot < SLOT_COUNT {
            Ok(Slot(slot as u8))
        } else {
            Err(FeederError::SlotOutOfRange)
        }
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Word address of this slot's block.
    #[inline]
    pub const fn base_address(self) -> u32 {
        self.0 as u32 * WORDS_PER_BLOCK
    }

    pub fn all() -> impl Iterator<Item = Slot> {
        (0..SLOT_COUNT as u8).map(Slot)
    }
}

// ---------------------------------------------------------------------------
// Time of day
// ---------------------------------------------------------------------------

/// Hour and minute of an event as stored: hours 24..=47 mean "tomorrow".
///
/// Ordering is chronological, hour first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimeOfDay {
    hour: u8,
    minute: u8,
}

impl TimeOfDay {
    /// A stored time, hour in `0..48`.
    pub fn new(hour: u8, minute: u8) -> Result<Self> {
        if hour < MAX_STORED_HOUR && minute < 60 {
            Ok(Self { hour, minute })
        } else {
            Err(FeederError::InvalidTime)
        }
    }

    /// A wall-clock time as typed by a user, hour in `0..24`.
    pub fn wall_clock(hour: u8, minute: u8) -> Result<Self> {
        if hour < HOURS_PER_DAY {
            Self::new(hour, minute)
        } else {
            Err(FeederError::InvalidTime)
        }
    }

    /// Decode a seconds count into hour and minute, hour reduced modulo
    /// `wrap_hours`.
    pub fn from_seconds(seconds: u32, wrap_hours: u32) -> Self {
        let hour = (seconds / SECONDS_PER_HOUR) % wrap_hours;
        let minute = (seconds % SECONDS_PER_HOUR) / SECONDS_PER_MINUTE;
        Self {
            hour: hour as u8,
            minute: minute as u8,
        }
    }

    #[inline]
    pub const fn hour(self) -> u8 {
        self.hour
    }

    #[inline]
    pub const fn minute(self) -> u8 {
        self.minute
    }

    /// Seconds since midnight of the day the counter was loaded.
    pub const fn seconds(self) -> u32 {
        self.hour as u32 * SECONDS_PER_HOUR + self.minute as u32 * SECONDS_PER_MINUTE
    }

    /// Whether the stored hour is biased into the next day.
    pub const fn is_tomorrow(self) -> bool {
        self.hour >= HOURS_PER_DAY
    }

    /// Same time one day later. Only valid on a wall-clock time.
    pub(crate) fn next_day(self) -> Result<Self> {
        Self::new(self.hour + HOURS_PER_DAY, self.minute)
    }

    /// The time with the hour folded into `0..24` for display.
    pub const fn normalized(self) -> Self {
        Self {
            hour: self.hour % HOURS_PER_DAY,
            minute: self.minute,
        }
    }
}

impl core::fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

// ---------------------------------------------------------------------------
// Event record
// ---------------------------------------------------------------------------

/// One feeding event as held in a table slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EventRecord {
    /// Redundant copy of the slot position, rewritten after every sort.
    /// Display only; never used for addressing.
    pub index: Option<u8>,
    /// Auger run length in seconds.
    pub duration: Option<u16>,
    /// Auger duty cycle in percent.
    pub intensity: Option<u8>,
    pub time: Option<TimeOfDay>,
    pub active: bool,
}

impl EventRecord {
    /// The sentinel pattern of a free slot.
    pub const EMPTY: Self = Self {
        index: None,
        duration: None,
        intensity: None,
        time: None,
        active: false,
    };

    /// A live event. The index is filled in by the sorter.
    pub fn new(duration: u16, intensity: u8, time: TimeOfDay) -> Result<Self> {
        if intensity > MAX_INTENSITY {
            return Err(FeederError::InvalidIntensity);
        }
        Ok(Self {
            index: None,
            duration: Some(duration),
            intensity: Some(intensity),
            time: Some(time),
            active: true,
        })
    }

    /// Whether this record can drive the alarm: active with a known time.
    pub fn is_armable(&self) -> bool {
        self.active && self.time.is_some()
    }

    /// Time folded into `0..24` hours, for listings.
    pub fn display_time(&self) -> Option<TimeOfDay> {
        self.time.map(TimeOfDay::normalized)
    }

    /// Content equality ignoring the index word.
    pub fn same_event(&self, other: &EventRecord) -> bool {
        self.duration == other.duration
            && self.intensity == other.intensity
            && self.time == other.time
            && self.active == other.active
    }

    /// The same feeding, allowing for its time to have been moved into
    /// tomorrow since it was read.
    pub fn same_feeding(&self, other: &EventRecord) -> bool {
        self.duration == other.duration
            && self.intensity == other.intensity
            && self.display_time() == other.display_time()
            && self.active == other.active
    }

    /// The record with its index set to `slot`.
    pub fn at(mut self, slot: Slot) -> Self {
        self.index = Some(slot.index() as u8);
        self
    }

    pub fn to_words(&self) -> [u32; field::EVENT_WORDS as usize] {
        let mut words = [UNSET_WORD; field::EVENT_WORDS as usize];
        words[field::INDEX as usize] = encode(self.index.map(u32::from));
        words[field::DURATION as usize] = encode(self.duration.map(u32::from));
        words[field::INTENSITY as usize] = encode(self.intensity.map(u32::from));
        words[field::HOUR as usize] = encode(self.time.map(|t| t.hour as u32));
        words[field::MINUTE as usize] = encode(self.time.map(|t| t.minute as u32));
        words[field::ACTIVE as usize] = self.active as u32;
        words
    }

    pub fn from_words(words: &[u32; field::EVENT_WORDS as usize]) -> Self {
        let hour = decode_below(words[field::HOUR as usize], MAX_STORED_HOUR as u32);
        let minute = decode_below(words[field::MINUTE as usize], 60);
        Self {
            index: decode_below(words[field::INDEX as usize], SLOT_COUNT as u32).map(|i| i as u8),
            duration: decode_below(words[field::DURATION as usize], u16::MAX as u32 + 1)
                .map(|d| d as u16),
            intensity: decode_below(words[field::INTENSITY as usize], MAX_INTENSITY as u32 + 1)
                .map(|i| i as u8),
            time: hour.zip(minute).map(|(h, m)| TimeOfDay {
                hour: h as u8,
                minute: m as u8,
            }),
            active: words[field::ACTIVE as usize] == 1,
        }
    }
}

#[inline]
fn encode(value: Option<u32>) -> u32 {
    value.unwrap_or(UNSET_WORD)
}

#[inline]
fn decode_below(word: u32, limit: u32) -> Option<u32> {
    (word < limit).then_some(word)
}

// ---------------------------------------------------------------------------
// Device configuration
// ---------------------------------------------------------------------------

/// How the water pump refills the bowl.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FillMode {
    #[default]
    Off,
    /// Top up whenever the sensed level is below the target volume.
    Auto,
    /// Run the pump when the motion sensor sees the pet.
    Motion,
}

impl FillMode {
    fn from_word(word: u32) -> Option<Self> {
        match word {
            0 => Some(FillMode::Off),
            1 => Some(FillMode::Auto),
            2 => Some(FillMode::Motion),
            _ => None,
        }
    }

    fn to_word(self) -> u32 {
        match self {
            FillMode::Off => 0,
            FillMode::Auto => 1,
            FillMode::Motion => 2,
        }
    }
}

/// Low-water alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AlertMode {
    #[default]
    Off,
    On,
}

impl AlertMode {
    fn from_word(word: u32) -> Option<Self> {
        match word {
            0 => Some(AlertMode::Off),
            1 => Some(AlertMode::On),
            _ => None,
        }
    }

    fn to_word(self) -> u32 {
        match self {
            AlertMode::Off => 0,
            AlertMode::On => 1,
        }
    }
}

/// Process-wide settings, persisted in [`CONFIG_BLOCK`](crate::config::CONFIG_BLOCK).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceConfig {
    /// Target water volume in mL; 0 disables regulation.
    pub water_volume: u16,
    pub fill_mode: FillMode,
    pub alert_mode: AlertMode,
}

pub(crate) const CONFIG_WORDS: usize = 3;

impl DeviceConfig {
    pub fn to_words(&self) -> [u32; CONFIG_WORDS] {
        let mut words = [0; CONFIG_WORDS];
        words[setting::VOLUME as usize] = self.water_volume as u32;
        words[setting::FILL_MODE as usize] = self.fill_mode.to_word();
        words[setting::ALERT_MODE as usize] = self.alert_mode.to_word();
        words
    }

    /// Lenient decode: unreadable fields fall back to their defaults.
    pub fn from_words(words: &[u32; CONFIG_WORDS]) -> Self {
        Self {
            water_volume: decode_below(words[setting::VOLUME as usize], u16::MAX as u32 + 1)
                .map_or(0, |v| v as u16),
            fill_mode: FillMode::from_word(words[setting::FILL_MODE as usize]).unwrap_or_default(),
            alert_mode: AlertMode::from_word(words[setting::ALERT_MODE as usize])
                .unwrap_or_default(),
        }
    }

    /// Strict decode of settings found at the legacy block-0 offsets.
    /// `None` unless every word is in range.
    pub(crate) fn from_legacy_words(words: &[u32; CONFIG_WORDS]) -> Option<Self> {
        Some(Self {
            water_volume: decode_below(words[0], u16::MAX as u32 + 1)? as u16,
            fill_mode: FillMode::from_word(words[1])?,
            alert_mode: AlertMode::from_word(words[2])?,
        })
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------
