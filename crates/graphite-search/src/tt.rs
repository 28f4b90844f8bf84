//! The transposition table.
//!
//! A fixed-size power-of-two table of 16-byte entries, shared freely
//! between Lazy SMP threads. Each slot holds two `AtomicU64`s: the packed
//! entry data and the position key XORed with that data. A torn write
//! leaves the pair inconsistent, so [`TranspositionTable::probe`] simply
//! fails to match instead of returning garbage. Entries carry a generation
//! counter so stale searches lose replacement fights.

use crate::SearchError;
use graphite_core::Move;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

/// How a stored score bounds the true value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    Exact = 0,
    Lower = 1,
    Upper = 2,
}

/// A decoded table entry.
#[derive(Debug, Clone, Copy)]
pub struct TtEntry {
    pub mv: Move,
    pub score: i32,
    pub depth: u8,
    pub bound: Bound,
    pub generation: u8,
}

#[derive(Default)]
struct Slot {
    /// Position key XOR packed data; zero in empty slots.
    key: AtomicU64,
    data: AtomicU64,
}

/// The shared table. Sized once at startup; never resized mid-search.
pub struct TranspositionTable {
    slots: Vec<Slot>,
    mask: u64,
    generation: AtomicU8,
}

const ENTRY_BYTES: usize = 16;

impl TranspositionTable {
    /// Allocates a table of at most `mb` MiB (rounded down to a power of
    /// two of entries). Fails with [`SearchError::ResourceExhausted`] when
    /// the allocation cannot be satisfied.
    pub fn new(mb: usize) -> Result<Self, SearchError> {
        let bytes = mb.max(1) * 1024 * 1024;
        // Largest power of two that fits the requested size.
        let count = (bytes / ENTRY_BYTES).max(1024);
        let count = 1usize << (usize::BITS - 1 - count.leading_zeros());

        let mut slots = Vec::new();
        slots
            .try_reserve_exact(count)
            .map_err(|_| SearchError::ResourceExhausted(mb))?;
        slots.resize_with(count, Slot::default);

        Ok(TranspositionTable {
            slots,
            mask: (count - 1) as u64,
            generation: AtomicU8::new(0),
        })
    }

    /// Number of entries.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Advances the generation; called once per `go`.
    pub fn new_generation(&self) {
        self.generation.fetch_add(1, Ordering::Relaxed);
    }

    /// Wipes every entry.
    pub fn clear(&self) {
        for slot in &self.slots {
            slot.key.store(0, Ordering::Relaxed);
            slot.data.store(0, Ordering::Relaxed);
        }
    }

    /// Looks up `key`. Scores inside are ply-normalized mate scores; the
    /// caller is responsible for denormalizing (see `alphabeta`).
    pub fn probe(&self, key: u64) -> Option<TtEntry> {
        let slot = &self.slots[(key & self.mask) as usize];
        let data = slot.data.load(Ordering::Relaxed);
        let stored_key = slot.key.load(Ordering::Relaxed);
        if data == 0 || stored_key ^ data != key {
            return None;
        }
        Some(unpack(data))
    }

    /// Stores an entry, preferring depth within the current generation and
    /// always evicting entries from older generations.
    pub fn store(&self, key: u64, mv: Move, score: i32, depth: u8, bound: Bound) {
        let generation = self.generation.load(Ordering::Relaxed);
        let slot = &self.slots[(key & self.mask) as usize];

        let old_data = slot.data.load(Ordering::Relaxed);
        if old_data != 0 {
            let old = unpack(old_data);
            let same_position = slot.key.load(Ordering::Relaxed) ^ old_data == key;
            let keep_old =
                old.generation == generation && old.depth > depth && !same_position;
            if keep_old {
                return;
            }
        }

        let data = pack(mv, score, depth, bound, generation);
        slot.data.store(data, Ordering::Relaxed);
        slot.key.store(key ^ data, Ordering::Relaxed);
    }

    /// Occupancy of the current generation, in permille of a sample.
    pub fn hashfull(&self) -> u32 {
        let generation = self.generation.load(Ordering::Relaxed);
        let sample = self.slots.len().min(1000);
        let mut used = 0;
        for slot in &self.slots[..sample] {
            let data = slot.data.load(Ordering::Relaxed);
            if data != 0 && unpack(data).generation == generation {
                used += 1;
            }
        }
        (used * 1000 / sample as u32).min(1000)
    }
}

/// Packs move (16) | score (16) | depth (8) | bound (2) | generation (8).
fn pack(mv: Move, score: i32, depth: u8, bound: Bound, generation: u8) -> u64 {
    debug_assert!((i16::MIN as i32..=i16::MAX as i32).contains(&score));
    (mv.raw() as u64)
        | (((score as i16) as u16 as u64) << 16)
        | ((depth as u64) << 32)
        | ((bound as u64) << 40)
        | ((generation as u64) << 42)
}

fn unpack(data: u64) -> TtEntry {
    TtEntry {
        mv: Move::from_raw(data as u16),
        score: ((data >> 16) as u16 as i16) as i32,
        depth: (data >> 32) as u8,
        bound: match (data >> 40) & 0b11 {
            0 => Bound::Exact,
            1 => Bound::Lower,
            _ => Bound::Upper,
        },
        generation: (data >> 42) as u8,
    }
}
