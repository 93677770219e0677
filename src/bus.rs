//! Hardware address space access
//!
//! [`RegisterBus`] is the seam between the register region and whatever
//! backs it: a `/dev/mem` mapping on the target, or [`SimBus`] when running
//! without hardware and in tests.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::regmap::WORD_SIZE;

/// 32-bit register access at byte offsets from a base address.
pub trait RegisterBus: Send + Sync {
    /// Read a 32-bit word at byte offset
    fn read32(&self, offset: usize) -> Option<u32>;

    /// Write a 32-bit word at byte offset
    fn write32(&self, offset: usize, value: u32) -> bool;

    /// Size of the accessible range in bytes
    fn size(&self) -> usize;
}

/// Memory-backed register file.
pub struct SimBus {
    words: Vec<AtomicU32>,
}

impl SimBus {
    /// A zeroed register file covering `size` bytes (rounded up to a word).
    pub fn new(size: usize) -> Self {
        let count = size.div_ceil(WORD_SIZE);
        Self {
            words: (0..count).map(|_| AtomicU32::new(0)).collect(),
        }
    }

    pub fn with_words(words: &[u32]) -> Self {
        Self {
            words: words.iter().map(|&w| AtomicU32::new(w)).collect(),
        }
    }

    fn slot(&self, offset: usize) -> Option<&AtomicU32> {
        if offset % WORD_SIZE != 0 {
            return None;
        }
        self.words.get(offset / WORD_SIZE)
    }
}

impl RegisterBus for SimBus {
    fn read32(&self, offset: usize) -> Option<u32> {
        self.slot(offset).map(|w| w.load(Ordering::SeqCst))
    }

    fn write32(&self, offset: usize, value: u32) -> bool {
        match self.slot(offset) {
            Some(w) => {
                w.store(value, Ordering::SeqCst);
                true
            }
            None => false,
        }
    }

    fn size(&self) -> usize {
        self.words.len() * WORD_SIZE
    }
}
