//! # Schedule Sorter
//!
//! Reorders the event table so that live events appear in ascending
//! time-of-day order from slot 0, and rewrites every slot's index word.
//!
//! ## Algorithm
//!
//! 1. Read all ten records once into RAM.
//! 2. Any slot that cannot drive the alarm (inactive, or active with a
//!    missing time) is reset to the sentinel pattern.
//! 3. Bubble sort on the key `(not armable, hour, minute)`. Adjacent
//!    records swap only when strictly out of order, so equal times keep
//!    their slot order and free slots collect at the tail. Each swap moves
//!    both full 16-word blocks in the store under one critical section.
//! 4. Rewrite the index word of every slot to its position.
//!
//! The table is tiny and fixed, so the quadratic pass is fine. Sorting an
//! already sorted table performs no swaps and no writes.

use crate::config::SLOT_COUNT;
use crate::error::Result;
use crate::event::{EventRecord, Slot, TimeOfDay};
use crate::store::WordStore;
use crate::table::EventTable;

/// What a sort run changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SortOutcome {
    /// Block swaps performed.
    pub swaps: usize,
    /// Dead slots reset to the sentinel pattern.
    pub cleared: usize,
}

/// Sort key: live events first, then chronological.
#[inline]
fn sort_key(record: &EventRecord) -> (bool, Option<TimeOfDay>) {
    (!record.is_armable(), record.time)
}

/// Sort the table in place. See the module docs for the contract.
pub fn sort<S: WordStore>(table: &mut EventTable<S>) -> Result<SortOutcome> {
    let mut outcome = SortOutcome::default();
    let mut records = [EventRecord::EMPTY; SLOT_COUNT];

    for slot in Slot::all() {
        let mut record = table.read(slot)?;
        if !record.is_armable() && !record.same_event(&EventRecord::EMPTY) {
            table.clear(slot)?;
            record = EventRecord::EMPTY;
            outcome.cleared += 1;
        }
        records[slot.index()] = record;
    }

    for pass in 0..SLOT_COUNT - 1 {
        let mut swapped = false;
        for j in 0..SLOT_COUNT - 1 - pass {
            if sort_key(&records[j]) > sort_key(&records[j + 1]) {
                table.swap(Slot::new(j)?, Slot::new(j + 1)?)?;
                records.swap(j, j + 1);
                outcome.swaps += 1;
                swapped = true;
                trace!("sort: swapped slots {} and {}", j, j + 1);
            }
        }
        if !swapped {
            break;
        }
    }

    for slot in Slot::all() {
        table.write_index(slot)?;
    }

    debug!("sort: {} swaps, {} slots cleared", outcome.swaps, outcome.cleared);
    Ok(outcome)
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------
