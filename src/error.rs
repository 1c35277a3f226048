//! # Errors
//!
//! Failure kinds reported by the feeder core. "No alarm scheduled" is not
//! among them: it is a normal [`AlarmStatus`](crate::alarm::AlarmStatus).

use core::fmt;

/// Error returned by every fallible feeder operation.
///
/// Validation errors are raised before any storage word is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FeederError {
    /// Hour or minute outside the accepted range.
    InvalidTime,
    /// Intensity above 100 %.
    InvalidIntensity,
    /// Slot number not in `0..SLOT_COUNT`, or the slot holds no live event.
    SlotOutOfRange,
    /// The record store reported a fault; the operation was abandoned.
    StorageUnavailable,
}

impl fmt::Display for FeederError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            FeederError::InvalidTime => "time must be between 00:00 and 23:59",
            FeederError::InvalidIntensity => "intensity must be between 0 and 100",
            FeederError::SlotOutOfRange => "event slot out of range",
            FeederError::StorageUnavailable => "storage unavailable",
        };
        f.write_str(msg)
    }
}

pub type Result<T> = core::result::Result<T, FeederError>;
