//! Local register region mirror
//!
//! A [`Region`] keeps one word per declared register of its [`RegisterMap`]
//! behind a single mutex and synchronizes it with hardware as a whole:
//! [`pull`] copies every readable register into the mirror, [`push`] copies
//! the mirror into every writable register. Both walk the same slot
//! sequence, so a register keeps one mirror index in either direction.
//!
//! [`RegisterRegion`] is the capability shared with the user-space
//! [`RegionClient`](crate::client::RegionClient): whole-region pull/push plus
//! masked field access on the local mirror.
//!
//! [`pull`]: RegisterRegion::pull
//! [`push`]: RegisterRegion::push

use std::io::{Read, Write};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::bus::RegisterBus;
use crate::error::{Error, Result};
use crate::field::Field;
use crate::regmap::{RegisterMap, WORD_SIZE};

/// Conversion between a field's raw bits and a typed value.
pub trait FieldValue: Sized {
    fn from_bits(bits: u32) -> Option<Self>;
    fn into_bits(self) -> u32;
}

macro_rules! uint_field_value {
    ($($t:ty),*) => {$(
        impl FieldValue for $t {
            fn from_bits(bits: u32) -> Option<Self> {
                <$t>::try_from(bits).ok()
            }

            fn into_bits(self) -> u32 {
                self as u32
            }
        }
    )*};
}

uint_field_value!(u8, u16, u32);

impl FieldValue for bool {
    fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            0 => Some(false),
            1 => Some(true),
            _ => None,
        }
    }

    fn into_bits(self) -> u32 {
        self as u32
    }
}

/// A register block mirrored in local memory.
pub trait RegisterRegion {
    fn map(&self) -> RegisterMap;

    /// Refresh the whole mirror from hardware.
    fn pull(&self) -> Result<()>;

    /// Write the whole mirror to hardware.
    fn push(&self) -> Result<()>;

    /// Run `f` on the mirror words while holding the region lock.
    fn with_mirror<R>(&self, f: impl FnOnce(&mut [u32]) -> R) -> Result<R>;

    /// Region size in bytes.
    fn size(&self) -> usize {
        self.map().byte_len()
    }

    /// Zero the mirror. Hardware is left alone.
    fn reset(&self) -> Result<()> {
        self.with_mirror(|words| words.fill(0))
    }

    /// Read a field from the mirror.
    fn get(&self, field: &Field) -> Result<u32> {
        let index = mirror_index(self.map(), field)?;
        self.with_mirror(|words| words.get(index).map(|w| field.extract(*w)))?
            .ok_or(Error::OutOfBounds { offset: field.offset() })
    }

    /// Write a field into the mirror. Nothing reaches hardware before `push`.
    fn set(&self, field: &Field, value: u32) -> Result<()> {
        if !field.fits(value) {
            return Err(Error::OutOfRange {
                value: value as u64,
                mask: field.mask(),
            });
        }
        let index = mirror_index(self.map(), field)?;
        self.with_mirror(|words| match words.get_mut(index) {
            Some(w) => {
                *w = field.insert(*w, value);
                Ok(())
            }
            None => Err(Error::OutOfBounds { offset: field.offset() }),
        })?
    }

    fn get_as<V: FieldValue>(&self, field: &Field) -> Result<V>
    where
        Self: Sized,
    {
        let bits = self.get(field)?;
        V::from_bits(bits).ok_or(Error::OutOfRange {
            value: bits as u64,
            mask: field.mask(),
        })
    }

    fn set_as<V: FieldValue>(&self, field: &Field, value: V) -> Result<()>
    where
        Self: Sized,
    {
        self.set(field, value.into_bits())
    }
}

impl<T: RegisterRegion> RegisterRegion for &T {
    fn map(&self) -> RegisterMap {
        (**self).map()
    }

    fn pull(&self) -> Result<()> {
        (**self).pull()
    }

    fn push(&self) -> Result<()> {
        (**self).push()
    }

    fn with_mirror<R>(&self, f: impl FnOnce(&mut [u32]) -> R) -> Result<R> {
        (**self).with_mirror(f)
    }
}

fn mirror_index(map: RegisterMap, field: &Field) -> Result<usize> {
    map.index_of(field.offset())
        .ok_or(Error::OutOfBounds { offset: field.offset() })
}

pub(crate) fn encode_words(words: &[u32], out: &mut [u8]) {
    for (chunk, word) in out.chunks_exact_mut(WORD_SIZE).zip(words) {
        chunk.copy_from_slice(&word.to_ne_bytes());
    }
}

pub(crate) fn decode_words(bytes: &[u8], words: &mut [u32]) {
    for (word, chunk) in words.iter_mut().zip(bytes.chunks_exact(WORD_SIZE)) {
        *word = u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }
}

struct Mirror {
    words: Vec<u32>,
    closed: bool,
}

/// Hardware-backed register region.
pub struct Region {
    bus: Arc<dyn RegisterBus>,
    map: RegisterMap,
    mirror: Mutex<Mirror>,
}

impl Region {
    /// Ready a region over `bus`. The bus must cover every slot of `map`.
    pub fn new(bus: Arc<dyn RegisterBus>, map: RegisterMap) -> Result<Self> {
        if bus.size() < map.span() {
            return Err(Error::OutOfBounds {
                offset: map.span() - WORD_SIZE,
            });
        }
        Ok(Self {
            bus,
            map,
            mirror: Mutex::new(Mirror {
                words: vec![0; map.register_count()],
                closed: false,
            }),
        })
    }

    /// Enter the terminal state. Every later operation fails with `Closed`.
    pub fn close(&self) {
        self.mirror.lock().closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.mirror.lock().closed
    }

    /// Pull the region and copy it to `dst`, all under the lock.
    pub fn transfer_out<W: Write>(&self, dst: &mut W) -> Result<()> {
        let mut mirror = self.lock_open()?;
        self.pull_locked(&mut mirror.words)?;

        let mut bytes = vec![0u8; self.map.byte_len()];
        encode_words(&mirror.words, &mut bytes);
        dst.write_all(&bytes).map_err(|e| {
            tracing::error!("can't copy local region to caller: {}", e);
            Error::Fault
        })
    }

    /// Fill the mirror from `src` and push it, all under the lock. A failed
    /// copy aborts before anything reaches hardware.
    pub fn transfer_in<R: Read>(&self, src: &mut R) -> Result<()> {
        let mut mirror = self.lock_open()?;

        let mut bytes = vec![0u8; self.map.byte_len()];
        src.read_exact(&mut bytes).map_err(|e| {
            tracing::error!("can't copy data from caller to local region: {}", e);
            Error::Fault
        })?;
        decode_words(&bytes, &mut mirror.words);
        self.push_locked(&mirror.words)
    }

    fn lock_open(&self) -> Result<parking_lot::MutexGuard<'_, Mirror>> {
        let mirror = self.mirror.lock();
        if mirror.closed {
            return Err(Error::Closed);
        }
        Ok(mirror)
    }

    fn pull_locked(&self, words: &mut [u32]) -> Result<()> {
        for slot in self.map.readable() {
            words[slot.index] = self
                .bus
                .read32(slot.offset)
                .ok_or(Error::OutOfBounds { offset: slot.offset })?;
        }
        Ok(())
    }

    fn push_locked(&self, words: &[u32]) -> Result<()> {
        for slot in self.map.writable() {
            if !self.bus.write32(slot.offset, words[slot.index]) {
                return Err(Error::OutOfBounds { offset: slot.offset });
            }
        }
        Ok(())
    }
}

impl RegisterRegion for Region {
    fn map(&self) -> RegisterMap {
        self.map
    }

    fn pull(&self) -> Result<()> {
        let mut mirror = self.lock_open()?;
        self.pull_locked(&mut mirror.words)
    }

    fn push(&self) -> Result<()> {
        let mirror = self.lock_open()?;
        self.push_locked(&mirror.words)
    }

    fn with_mirror<R>(&self, f: impl FnOnce(&mut [u32]) -> R) -> Result<R> {
        let mut mirror = self.lock_open()?;
        Ok(f(mirror.words.as_mut_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::SimBus;
    use crate::field::INDICATOR_LED;
    use crate::regmap::{SlotAccess, INDICATOR_MAP};

    // rw, ro, wo, reserved, rw: four mirror words over five hardware slots
    const MIXED: RegisterMap = RegisterMap::from_slots(&[
        SlotAccess::RW,
        SlotAccess::RO,
        SlotAccess::WO,
        SlotAccess::NONE,
        SlotAccess::RW,
    ]);

    fn mixed_region(hw: &[u32]) -> (Arc<SimBus>, Region) {
        let bus = Arc::new(SimBus::with_words(hw));
        let region = Region::new(bus.clone(), MIXED).unwrap();
        (bus, region)
    }

    #[test]
    fn pull_reads_only_readable_slots_at_their_own_index() {
        let (_bus, region) = mixed_region(&[10, 11, 12, 13, 14]);
        region.with_mirror(|w| w.fill(0xEE)).unwrap();
        region.pull().unwrap();
        let words = region.with_mirror(|w| w.to_vec()).unwrap();
        assert_eq!(words, [10, 11, 0xEE, 14]);
    }

    #[test]
    fn push_writes_only_writable_slots_from_their_own_index() {
        let (bus, region) = mixed_region(&[0; 5]);
        region.with_mirror(|w| w.copy_from_slice(&[1, 2, 3, 5])).unwrap();
        region.push().unwrap();
        let hw: Vec<_> = (0..5).map(|i| bus.read32(i * 4).unwrap()).collect();
        assert_eq!(hw, [1, 0, 3, 0, 5]);
    }

    #[test]
    fn bus_too_small_is_rejected() {
        let bus = Arc::new(SimBus::new(8));
        assert!(matches!(
            Region::new(bus, MIXED),
            Err(Error::OutOfBounds { offset: 16 })
        ));
    }

    #[test]
    fn field_access_stays_in_the_mirror() {
        let bus = Arc::new(SimBus::with_words(&[0xAB00]));
        let region = Region::new(bus.clone(), INDICATOR_MAP).unwrap();
        region.pull().unwrap();
        region.set(&INDICATOR_LED, 0x05).unwrap();
        assert_eq!(region.get(&INDICATOR_LED).unwrap(), 0x05);
        assert_eq!(bus.read32(0), Some(0xAB00));
        region.push().unwrap();
        assert_eq!(bus.read32(0), Some(0xAB05));
    }

    #[test]
    fn out_of_range_field_write_leaves_mirror() {
        let bus = Arc::new(SimBus::new(4));
        let region = Region::new(bus, INDICATOR_MAP).unwrap();
        let err = region.set(&INDICATOR_LED, 0x107).unwrap_err();
        assert!(matches!(err, Error::OutOfRange { value: 0x107, mask: 0xFF }));
        assert_eq!(region.get(&INDICATOR_LED).unwrap(), 0);
    }

    #[test]
    fn typed_access() {
        let bus = Arc::new(SimBus::new(4));
        let region = Region::new(bus, INDICATOR_MAP).unwrap();
        region.set_as(&INDICATOR_LED, 0x42u8).unwrap();
        assert_eq!(region.get_as::<u8>(&INDICATOR_LED).unwrap(), 0x42);
        assert!(region.get_as::<bool>(&INDICATOR_LED).is_err());
    }

    #[test]
    fn closed_region_refuses_everything() {
        let (_bus, region) = mixed_region(&[0; 5]);
        region.close();
        assert!(region.is_closed());
        assert!(matches!(region.pull(), Err(Error::Closed)));
        assert!(matches!(region.push(), Err(Error::Closed)));
        assert!(matches!(region.reset(), Err(Error::Closed)));
        let mut out = Vec::new();
        assert!(matches!(region.transfer_out(&mut out), Err(Error::Closed)));
    }

    #[test]
    fn transfer_round_trip() {
        let (bus, region) = mixed_region(&[0; 5]);
        assert_eq!(region.size(), 16);
        let mut payload = Vec::new();
        for w in [0x11u32, 0x22, 0x33, 0x55] {
            payload.extend_from_slice(&w.to_ne_bytes());
        }
        region.transfer_in(&mut payload.as_slice()).unwrap();
        assert_eq!(bus.read32(8), Some(0x33));
        assert_eq!(bus.read32(4), Some(0));
        assert_eq!(bus.read32(12), Some(0));
        assert_eq!(bus.read32(16), Some(0x55));

        let mut out = Vec::new();
        region.transfer_out(&mut out).unwrap();
        assert_eq!(out.len(), 16);
        let mut words = [0u32; 4];
        decode_words(&out, &mut words);
        // words 0 and 3 are RW, word 1 is read back from hardware
        assert_eq!(words[0], 0x11);
        assert_eq!(words[1], 0);
        assert_eq!(words[3], 0x55);
    }

    #[test]
    fn fields_past_a_hole_use_the_dense_index() {
        let (bus, region) = mixed_region(&[0, 0, 0, 0, 0x0700]);
        let high = Field::new("high", 0x10, 0xFF00);
        region.pull().unwrap();
        assert_eq!(region.get(&high).unwrap(), 0x07);
        region.set(&high, 0x09).unwrap();
        assert_eq!(region.with_mirror(|w| w[3]).unwrap(), 0x0900);
        region.push().unwrap();
        assert_eq!(bus.read32(16), Some(0x0900));

        let hole = Field::new("hole", 0x0C, 0x1);
        assert!(matches!(region.get(&hole), Err(Error::OutOfBounds { offset: 0x0C })));
    }

    #[test]
    fn short_source_faults_before_push() {
        let (bus, region) = mixed_region(&[7; 5]);
        let short = [0u8; 6];
        assert!(matches!(region.transfer_in(&mut &short[..]), Err(Error::Fault)));
        assert_eq!(bus.read32(0), Some(7));
    }
}
