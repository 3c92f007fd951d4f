use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

const SEGMENT_BITS: u32 = 24;
const SEGMENT_COUNT: usize = 1 << (32 - SEGMENT_BITS); // 256
const WORDS_PER_SEGMENT: usize = (1 << SEGMENT_BITS) / 64; // 2MB per segment (16,777,216 IPs)

type Segment = Box<[AtomicU64]>;

/// One bit for every IPv4 address.
///
/// The space is cut into 256 segments keyed by the high byte of the address.
/// A segment is materialized the first time one of its addresses is set, so
/// a run never holds more than 512 MiB and sparse inputs hold far less.
/// All operations take `&self` and are safe to call from many threads.
pub struct PresenceSet {
    segments: Box<[OnceLock<Segment>]>,
}

impl PresenceSet {
    pub fn new() -> Self {
        PresenceSet {
            segments: (0..SEGMENT_COUNT).map(|_| OnceLock::new()).collect(),
        }
    }

    #[inline]
    fn locate(key: u32) -> (usize, usize, u64) {
        let segment_id = (key >> SEGMENT_BITS) as usize; // High 8 bits
        let bit_offset = key & ((1 << SEGMENT_BITS) - 1); // Low 24 bits
        let word_index = (bit_offset / 64) as usize;
        let mask = 1u64 << (bit_offset % 64);
        (segment_id, word_index, mask)
    }

    // Segments are allocated lazily, one 2 MiB block per high byte, on the
    // first insert that lands in them. Inputs confined to a few /8 networks
    // stay small; a full sweep of the address space tops out at 512 MiB.
    // Racing first inserts are settled by `OnceLock`, the loser's block is
    // never built.
    fn segment(&self, segment_id: usize) -> &Segment {
        self.segments[segment_id].get_or_init(|| {
            tracing::debug!(segment = segment_id, "Allocating presence segment");
            (0..WORDS_PER_SEGMENT).map(|_| AtomicU64::new(0)).collect()
        })
    }

    /// Sets the bit for `key`. Returns `true` only for the caller that
    /// flipped it from unset to set.
    #[inline]
    pub fn test_and_set(&self, key: u32) -> bool {
        let (segment_id, word_index, mask) = Self::locate(key);
        let previous = self.segment(segment_id)[word_index].fetch_or(mask, Ordering::AcqRel);
        previous & mask == 0
    }

    #[allow(dead_code)]
    pub fn contains(&self, key: u32) -> bool {
        let (segment_id, word_index, mask) = Self::locate(key);
        match self.segments[segment_id].get() {
            Some(segment) => segment[word_index].load(Ordering::Acquire) & mask != 0,
            None => false,
        }
    }

    pub fn count_ones(&self) -> u64 {
        self.segments
            .iter()
            .filter_map(OnceLock::get)
            .map(|segment| {
                segment
                    .iter()
                    .map(|word| word.load(Ordering::Acquire).count_ones() as u64)
                    .sum::<u64>()
            })
            .sum()
    }

    pub fn allocated_bytes(&self) -> usize {
        let segments = self.segments.iter().filter(|s| s.get().is_some()).count();
        segments * WORDS_PER_SEGMENT * std::mem::size_of::<u64>()
    }
}

impl Default for PresenceSet {
    fn default() -> Self {
        Self::new()
    }
}
