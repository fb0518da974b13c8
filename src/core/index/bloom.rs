//! In-memory Bloom filter used as the fast negative pre-filter of the
//! dedup index.
//!
//! The filter is never persisted; it is rebuilt from the exact set on
//! startup. Bit positions come from double hashing: `h1 + i * h2` over
//! two independently seeded 64-bit hashes.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

const MIN_HASHES: u32 = 1;
const MAX_HASHES: u32 = 32;

/// Fixed-size Bloom filter over hashable keys
#[derive(Debug, Clone)]
pub struct BloomFilter {
    words: Vec<u64>,
    num_bits: u64,
    num_hashes: u32,
}

impl BloomFilter {
    /// Size a filter for `expected_items` at `false_positive_rate`
    ///
    /// Zero items is treated as one; rates outside (0, 1) are clamped.
    pub fn with_rate(expected_items: usize, false_positive_rate: f64) -> Self {
        let n = expected_items.max(1) as f64;
        let p = false_positive_rate.clamp(f64::MIN_POSITIVE, 0.5);
        let ln2 = std::f64::consts::LN_2;

        let num_bits = (-(n * p.ln()) / (ln2 * ln2)).ceil().max(64.0) as u64;
        let num_hashes = ((num_bits as f64 / n) * ln2).round() as u32;

        Self::with_size(num_bits, num_hashes)
    }

    /// Build a filter with an explicit bit count and hash count
    pub fn with_size(num_bits: u64, num_hashes: u32) -> Self {
        let words = num_bits.div_ceil(64).max(1);
        Self {
            words: vec![0; words as usize],
            num_bits: words * 64,
            num_hashes: num_hashes.clamp(MIN_HASHES, MAX_HASHES),
        }
    }

    pub fn insert<T: Hash + ?Sized>(&mut self, item: &T) {
        let (h1, h2) = hash_pair(item);
        for i in 0..self.num_hashes {
            let bit = self.bit_index(h1, h2, i);
            self.words[(bit / 64) as usize] |= 1 << (bit % 64);
        }
    }

    /// `false` means definitely absent; `true` means possibly present
    pub fn might_contain<T: Hash + ?Sized>(&self, item: &T) -> bool {
        let (h1, h2) = hash_pair(item);
        (0..self.num_hashes).all(|i| {
            let bit = self.bit_index(h1, h2, i);
            self.words[(bit / 64) as usize] & (1 << (bit % 64)) != 0
        })
    }

    pub fn num_bits(&self) -> u64 {
        self.num_bits
    }

    pub fn num_hashes(&self) -> u32 {
        self.num_hashes
    }

    /// Fraction of bits set
    pub fn fill_ratio(&self) -> f64 {
        let set: u64 = self.words.iter().map(|w| u64::from(w.count_ones())).sum();
        set as f64 / self.num_bits as f64
    }

    fn bit_index(&self, h1: u64, h2: u64, i: u32) -> u64 {
        h1.wrapping_add(u64::from(i).wrapping_mul(h2)) % self.num_bits
    }
}

fn hash_pair<T: Hash + ?Sized>(item: &T) -> (u64, u64) {
    let seeded = |seed: u64| {
        let mut hasher = DefaultHasher::new();
        seed.hash(&mut hasher);
        item.hash(&mut hasher);
        hasher.finish()
    };
    // Odd step so every probe sequence visits distinct bits
    (seeded(0x9e37_79b9_7f4a_7c15), seeded(0xc2b2_ae3d_27d4_eb4f) | 1)
}
