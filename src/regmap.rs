//! Register map descriptors
//!
//! A descriptor packs one 2-bit group per register slot, lowest group first:
//! bit 0 of a group marks the slot readable, bit 1 writable. Slot `n` lives
//! at byte offset `n * 4`. A `00` group is a reserved hole: it has no mirror
//! word, so mirror indices count declared registers only.

/// Bytes per register.
pub const WORD_SIZE: usize = 4;

const READ: u32 = 0b01;
const WRITE: u32 = 0b10;

/// Capability of one slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotAccess(u32);

impl SlotAccess {
    pub const NONE: Self = Self(0);
    pub const RO: Self = Self(READ);
    pub const WO: Self = Self(WRITE);
    pub const RW: Self = Self(READ | WRITE);

    #[inline]
    pub const fn readable(self) -> bool {
        self.0 & READ != 0
    }

    #[inline]
    pub const fn writable(self) -> bool {
        self.0 & WRITE != 0
    }
}

/// One register position in the region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    /// Dense mirror index.
    pub index: usize,
    /// Byte offset from the region base.
    pub offset: usize,
    pub access: SlotAccess,
}

/// Bit-encoded description of a register block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterMap(u32);

impl RegisterMap {
    pub const fn new(bits: u32) -> Self {
        Self(bits)
    }

    /// Build a map from per-slot capabilities, slot 0 first.
    pub const fn from_slots(slots: &[SlotAccess]) -> Self {
        assert!(slots.len() <= 16, "at most 16 slots fit a 32-bit descriptor");
        let mut bits = 0;
        let mut i = 0;
        while i < slots.len() {
            bits |= slots[i].0 << (2 * i);
            i += 1;
        }
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Number of slots up to and including the highest declared one,
    /// reserved holes included.
    pub const fn slot_count(self) -> usize {
        let used = (u32::BITS - self.0.leading_zeros()) as usize;
        (used + 1) / 2
    }

    /// Number of declared registers: the mirror length.
    pub const fn register_count(self) -> usize {
        let mut count = 0;
        let mut i = 0;
        while i < self.slot_count() {
            if self.access(i).0 != 0 {
                count += 1;
            }
            i += 1;
        }
        count
    }

    /// Size of the mirror, and of every bulk transfer, in bytes.
    pub const fn byte_len(self) -> usize {
        self.register_count() * WORD_SIZE
    }

    /// Bytes of hardware address space the registers cover.
    pub const fn span(self) -> usize {
        self.slot_count() * WORD_SIZE
    }

    pub const fn access(self, index: usize) -> SlotAccess {
        if index >= 16 {
            return SlotAccess::NONE;
        }
        SlotAccess((self.0 >> (2 * index)) & (READ | WRITE))
    }

    pub const fn readable_count(self) -> usize {
        (self.0 & 0x5555_5555).count_ones() as usize
    }

    pub const fn writable_count(self) -> usize {
        (self.0 & 0xAAAA_AAAA).count_ones() as usize
    }

    /// Declared registers in descriptor order, reserved holes skipped.
    /// `pull` and `push` both walk this, so they agree on every index.
    pub fn slots(self) -> impl Iterator<Item = Slot> {
        (0..self.slot_count())
            .map(move |n| (n, self.access(n)))
            .filter(|(_, access)| *access != SlotAccess::NONE)
            .enumerate()
            .map(|(index, (n, access))| Slot {
                index,
                offset: n * WORD_SIZE,
                access,
            })
    }

    /// Mirror index of the register at byte `offset`, if one is declared
    /// there.
    pub fn index_of(self, offset: usize) -> Option<usize> {
        if offset % WORD_SIZE != 0 {
            return None;
        }
        self.slots().find(|s| s.offset == offset).map(|s| s.index)
    }

    pub fn readable(self) -> impl Iterator<Item = Slot> {
        self.slots().filter(|s| s.access.readable())
    }

    pub fn writable(self) -> impl Iterator<Item = Slot> {
        self.slots().filter(|s| s.access.writable())
    }
}

/// The indicator IP core: a single read/write LED register at 0x00.
pub const INDICATOR_MAP: RegisterMap = RegisterMap::new(0b11);

#[cfg(test)]
mod tests {
    use super::*;

    // (descriptor, registers, readable, writable, slots spanned)
    const TABLE: &[(u32, usize, usize, usize, usize)] = &[
        (0b00, 0, 0, 0, 0),
        (0b01, 1, 1, 0, 1),
        (0b10, 1, 0, 1, 1),
        (0b11, 1, 1, 1, 1),
        (0b10_01_11, 3, 2, 2, 3),
        (0b11_00_11, 2, 2, 2, 3),
        (0b01_00_00_00, 1, 1, 0, 4),
        (0xFFFF_FFFF, 16, 16, 16, 16),
    ];

    #[test]
    fn descriptor_table() {
        for &(bits, registers, readable, writable, slots) in TABLE {
            let map = RegisterMap::new(bits);
            assert_eq!(map.register_count(), registers, "registers of {:#b}", bits);
            assert_eq!(map.slot_count(), slots, "slots of {:#b}", bits);
            assert_eq!(map.readable_count(), readable, "readable of {:#b}", bits);
            assert_eq!(map.writable_count(), writable, "writable of {:#b}", bits);
            assert_eq!(map.readable().count(), readable);
            assert_eq!(map.writable().count(), writable);
            assert_eq!(map.slots().count(), registers);
            assert_eq!(map.byte_len(), registers * WORD_SIZE);
            assert_eq!(map.span(), slots * WORD_SIZE);
        }
    }

    #[test]
    fn indicator_map() {
        assert_eq!(INDICATOR_MAP.slot_count(), 1);
        assert_eq!(INDICATOR_MAP.byte_len(), 4);
        assert_eq!(INDICATOR_MAP.access(0), SlotAccess::RW);
    }

    #[test]
    fn mixed_map_keeps_offsets_aligned_with_indices() {
        let map = RegisterMap::from_slots(&[SlotAccess::RW, SlotAccess::RO, SlotAccess::WO]);
        assert_eq!(map.bits(), 0b10_01_11);

        let slots: Vec<_> = map.slots().collect();
        for (i, slot) in slots.iter().enumerate() {
            assert_eq!(slot.index, i);
            assert_eq!(slot.offset, i * WORD_SIZE);
        }

        let r: Vec<_> = map.readable().map(|s| s.index).collect();
        let w: Vec<_> = map.writable().map(|s| s.index).collect();
        assert_eq!(r, [0, 1]);
        assert_eq!(w, [0, 2]);
    }

    #[test]
    fn reserved_hole_takes_no_mirror_word() {
        let map = RegisterMap::from_slots(&[SlotAccess::RW, SlotAccess::NONE, SlotAccess::RO]);
        assert_eq!(map.register_count(), 2);
        assert_eq!(map.byte_len(), 8);
        assert_eq!(map.span(), 12);

        let slots: Vec<_> = map.slots().map(|s| (s.index, s.offset)).collect();
        assert_eq!(slots, [(0, 0), (1, 8)]);
        assert_eq!(map.index_of(0), Some(0));
        assert_eq!(map.index_of(4), None);
        assert_eq!(map.index_of(8), Some(1));
        assert_eq!(map.index_of(2), None);
        assert_eq!(map.access(20), SlotAccess::NONE);
    }
}
