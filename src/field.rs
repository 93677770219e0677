//! Masked bit-field codec
//!
//! A field is a contiguous run of bits inside one 32-bit register, described
//! by its mask. The mask's lowest set bit is the field's rank: the shift used
//! to move values into and out of position.

use crate::regmap::WORD_SIZE;

/// Position of the lowest set bit of `mask`. `mask` must be non-zero.
#[inline]
pub const fn rank(mask: u32) -> u32 {
    debug_assert!(mask != 0, "rank of an empty mask");
    mask.trailing_zeros()
}

/// Largest value the field can hold.
#[inline]
pub const fn max_value(mask: u32) -> u32 {
    mask >> rank(mask)
}

/// True if `value` fits the field described by `mask`.
#[inline]
pub const fn fits(mask: u32, value: u32) -> bool {
    value <= max_value(mask)
}

/// Read the field out of `word`.
#[inline]
pub const fn extract(word: u32, mask: u32) -> u32 {
    (word & mask) >> rank(mask)
}

/// Replace the field in `word` with `value`. No range check; see [`fits`].
#[inline]
pub const fn insert(word: u32, mask: u32, value: u32) -> u32 {
    (word & !mask) | (value << rank(mask))
}

/// True if the set bits of `mask` form a single run.
pub const fn is_contiguous(mask: u32) -> bool {
    if mask == 0 {
        return false;
    }
    let m = mask >> rank(mask);
    m & m.wrapping_add(1) == 0
}

/// A named, masked quantity inside one register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    name: &'static str,
    offset: usize,
    mask: u32,
}

impl Field {
    /// Panics at compile time when used in a const with a zero mask or an
    /// unaligned offset.
    pub const fn new(name: &'static str, offset: usize, mask: u32) -> Self {
        assert!(mask != 0, "field mask must have at least one bit set");
        assert!(is_contiguous(mask), "field mask must be one run of bits");
        assert!(offset % WORD_SIZE == 0, "field offset must be word aligned");
        Self { name, offset, mask }
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Byte offset of the register holding this field.
    pub const fn offset(&self) -> usize {
        self.offset
    }

    pub const fn mask(&self) -> u32 {
        self.mask
    }

    pub const fn max_value(&self) -> u32 {
        max_value(self.mask)
    }

    pub const fn fits(&self, value: u32) -> bool {
        fits(self.mask, value)
    }

    pub const fn extract(&self, word: u32) -> u32 {
        extract(word, self.mask)
    }

    pub const fn insert(&self, word: u32, value: u32) -> u32 {
        insert(word, self.mask, value)
    }
}

/// LED register of the indicator core, exposed as a text attribute.
pub const INDICATOR_LED: Field = Field::new("indicator_led", 0x00, 0xFF);

/// Color bits of the LED register: R, G, B from bit 0 up.
pub const INDICATOR_COLOR: Field = Field::new("color", 0x00, 0x07);
