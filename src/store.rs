//! # Record Store
//!
//! Word-addressed non-volatile storage as the event table sees it. A word
//! address is `WORDS_PER_BLOCK * block + field`.
//!
//! Two implementations ship with the crate:
//! - [`ByteStorage`] adapts any byte-addressed `embedded_storage::Storage`
//!   (flash, external EEPROM) by packing each word little-endian into four
//!   bytes.
//! - [`RamStore`] keeps the image in RAM, starting erased. It backs the host
//!   tests and can inject write faults.
//!
//! The on-chip TM4C123 EEPROM driver lives in [`crate::arch`].

use embedded_storage::{ReadStorage, Storage};

use crate::config::UNSET_WORD;

/// Read/write-by-address primitives of the non-volatile record store.
///
/// Implementations report faults through `Self::Error`; the table turns any
/// such error into [`FeederError::StorageUnavailable`](crate::error::FeederError).
pub trait WordStore {
    type Error;

    fn read_word(&mut self, address: u32) -> Result<u32, Self::Error>;

    fn write_word(&mut self, address: u32, word: u32) -> Result<(), Self::Error>;
}

// ---------------------------------------------------------------------------
// embedded-storage adapter
// ---------------------------------------------------------------------------

const WORD_BYTES: u32 = 4;

/// Word view over a byte-addressed `embedded_storage::Storage`.
pub struct ByteStorage<S> {
    storage: S,
    base: u32,
}

impl<S> ByteStorage<S> {
    /// Place word 0 at byte `base` of `storage`.
    pub const fn new(storage: S, base: u32) -> Self {
        Self { storage, base }
    }

    pub fn release(self) -> S {
        self.storage
    }

    fn offset(&self, address: u32) -> u32 {
        self.base + address * WORD_BYTES
    }
}

impl<S: Storage> WordStore for ByteStorage<S> {
    type Error = S::Error;

    fn read_word(&mut self, address: u32) -> Result<u32, Self::Error> {
        let mut bytes = [0u8; WORD_BYTES as usize];
        let offset = self.offset(address);
        self.storage.read(offset, &mut bytes)?;
        Ok(u32::from_le_bytes(bytes))
    }

    fn write_word(&mut self, address: u32, word: u32) -> Result<(), Self::Error> {
        let offset = self.offset(address);
        self.storage.write(offset, &word.to_le_bytes())
    }
}

// ---------------------------------------------------------------------------
// RAM image
// ---------------------------------------------------------------------------

/// Fault raised by [`RamStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RamStoreFault {
    OutOfBounds,
    /// An injected write failure.
    WriteFailed,
}

/// In-memory word store of `N` words, initialised to the erased pattern.
pub struct RamStore<const N: usize> {
    words: [u32; N],
    fail_in: Option<usize>,
}

impl<const N: usize> RamStore<N> {
    pub const fn new() -> Self {
        Self {
            words: [UNSET_WORD; N],
            fail_in: None,
        }
    }

    /// Let `count` more writes succeed, then fail the next one. Writes
    /// after the failed one succeed again.
    pub fn fail_write_after(&mut self, count: usize) {
        self.fail_in = Some(count);
    }

    pub fn heal(&mut self) {
        self.fail_in = None;
    }

    pub fn words(&self) -> &[u32; N] {
        &self.words
    }
}

impl<const N: usize> Default for RamStore<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> WordStore for RamStore<N> {
    type Error = RamStoreFault;

    fn read_word(&mut self, address: u32) -> Result<u32, Self::Error> {
        self.words
            .get(address as usize)
            .copied()
            .ok_or(RamStoreFault::OutOfBounds)
    }

    fn write_word(&mut self, address: u32, word: u32) -> Result<(), Self::Error> {
        match self.fail_in {
            Some(0) => {
                self.fail_in = None;
                return Err(RamStoreFault::WriteFailed);
            }
            Some(left) => self.fail_in = Some(left - 1),
            None => {}
        }
        let slot = self
            .words
            .get_mut(address as usize)
            .ok_or(RamStoreFault::OutOfBounds)?;
        *slot = word;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------
