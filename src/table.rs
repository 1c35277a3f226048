//! # Event Table
//!
//! The fixed array of [`SLOT_COUNT`] event blocks living in the record store,
//! plus the separate device configuration block.
//!
//! ## Write discipline
//!
//! - Words that already hold the wanted value are not rewritten.
//! - A multi-word write reads the old words first. If the store faults
//!   part-way through, the words already written are put back (best
//!   effort) and the operation fails with `StorageUnavailable`.
//! - A block swap runs inside one critical section so that no interrupt
//!   handler can observe a half-swapped pair of records.

use heapless::Vec;

use crate::config::{field, setting, CONFIG_BLOCK, SLOT_COUNT, WORDS_PER_BLOCK};
use crate::error::{FeederError, Result};
use crate::event::{DeviceConfig, EventRecord, Slot, CONFIG_WORDS};
use crate::store::WordStore;
use crate::sync;

const BLOCK_WORDS: usize = WORDS_PER_BLOCK as usize;
const EVENT_WORDS: usize = field::EVENT_WORDS as usize;

/// Ordered sequence of live events, as returned by listings.
pub type EventList = Vec<EventRecord, SLOT_COUNT>;

/// The event table over a word store.
pub struct EventTable<S> {
    store: S,
}

impl<S: WordStore> EventTable<S> {
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn release(self) -> S {
        self.store
    }

    // -----------------------------------------------------------------------
    // Word access
    // -----------------------------------------------------------------------

    fn read_word(&mut self, address: u32) -> Result<u32> {
        self.store.read_word(address).map_err(|_| {
            error!("store read failed at word {}", address);
            FeederError::StorageUnavailable
        })
    }

    fn read_words<const N: usize>(&mut self, base: u32) -> Result<[u32; N]> {
        let mut words = [0u32; N];
        for (offset, word) in words.iter_mut().enumerate() {
            *word = self.read_word(base + offset as u32)?;
        }
        Ok(words)
    }

    /// Write `new` over `old` starting at `base`, rolling back on a fault.
    fn write_words(&mut self, base: u32, new: &[u32], old: &[u32]) -> Result<()> {
        for (offset, (&word, &prior)) in new.iter().zip(old).enumerate() {
            if word == prior {
                continue;
            }
            let address = base + offset as u32;
            if self.store.write_word(address, word).is_err() {
                error!("store write failed at word {}, rolling back", address);
                for (undo, (&written, &prior)) in new.iter().zip(old).enumerate().take(offset) {
                    if written != prior {
                        let _ = self.store.write_word(base + undo as u32, prior);
                    }
                }
                return Err(FeederError::StorageUnavailable);
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Event slots
    // -----------------------------------------------------------------------

    pub fn read(&mut self, slot: Slot) -> Result<EventRecord> {
        let words = self.read_words::<EVENT_WORDS>(slot.base_address())?;
        Ok(EventRecord::from_words(&words))
    }

    /// Overwrite the data words of `slot` with `record`.
    pub fn write(&mut self, slot: Slot, record: &EventRecord) -> Result<()> {
        let base = slot.base_address();
        let old = self.read_words::<EVENT_WORDS>(base)?;
        self.write_words(base, &record.to_words(), &old)
    }

    /// Reset `slot` to the sentinel pattern with `active = 0`.
    pub fn clear(&mut self, slot: Slot) -> Result<()> {
        self.write(slot, &EventRecord::EMPTY)
    }

    /// Rewrite only the index word of `slot` to its position.
    pub fn write_index(&mut self, slot: Slot) -> Result<()> {
        let address = slot.base_address() + field::INDEX;
        let old = self.read_word(address)?;
        self.write_words(address, &[slot.index() as u32], &[old])
    }

    /// Exchange the full 16-word blocks of `a` and `b`.
    ///
    /// Both blocks are read before the first write; on a fault the blocks
    /// are restored as far as the store allows.
    pub fn swap(&mut self, a: Slot, b: Slot) -> Result<()> {
        if a == b {
            return Ok(());
        }
        sync::critical_section(|_cs| {
            let block_a = self.read_words::<BLOCK_WORDS>(a.base_address())?;
            let block_b = self.read_words::<BLOCK_WORDS>(b.base_address())?;

            self.write_words(a.base_address(), &block_b, &block_a)?;
            if let Err(e) = self.write_words(b.base_address(), &block_a, &block_b) {
                let _ = self.write_words(a.base_address(), &block_a, &block_b);
                return Err(e);
            }
            Ok(())
        })
    }

    /// Active records in slot order.
    pub fn active_events(&mut self) -> Result<EventList> {
        let mut events = EventList::new();
        for slot in Slot::all() {
            let record = self.read(slot)?;
            if record.is_armable() {
                // Capacity equals the slot count, so this cannot overflow.
                let _ = events.push(record);
            }
        }
        Ok(events)
    }

    // -----------------------------------------------------------------------
    // Device configuration
    // -----------------------------------------------------------------------

    pub fn device_config(&mut self) -> Result<DeviceConfig> {
        let words = self.read_words::<CONFIG_WORDS>(CONFIG_BLOCK * WORDS_PER_BLOCK)?;
        Ok(DeviceConfig::from_words(&words))
    }

    pub fn set_device_config(&mut self, config: &DeviceConfig) -> Result<()> {
        let base = CONFIG_BLOCK * WORDS_PER_BLOCK;
        let old = self.read_words::<CONFIG_WORDS>(base)?;
        self.write_words(base, &config.to_words(), &old)
    }

    /// Copy settings from the legacy block-0 offsets into the configuration
    /// block when the latter has never been written.
    ///
    /// Returns whether a migration happened. The legacy words are left in
    /// place; they travel with block 0 during sorts and are ignored.
    pub fn migrate_legacy_config(&mut self) -> Result<bool> {
        let base = CONFIG_BLOCK * WORDS_PER_BLOCK;
        let current = self.read_words::<CONFIG_WORDS>(base)?;
        if current.iter().any(|&w| w != crate::config::UNSET_WORD) {
            return Ok(false);
        }
        let legacy = self.read_words::<CONFIG_WORDS>(setting::LEGACY_VOLUME)?;
        debug_assert_eq!(setting::LEGACY_FILL_MODE, setting::LEGACY_VOLUME + 1);
        debug_assert_eq!(setting::LEGACY_ALERT_MODE, setting::LEGACY_VOLUME + 2);
        match DeviceConfig::from_legacy_words(&legacy) {
            Some(config) => {
                info!("migrating legacy settings into block {}", CONFIG_BLOCK);
                self.write_words(base, &config.to_words(), &current)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------
