//! User-space region mirror
//!
//! [`RegionClient`] keeps its own copy of a device region and moves it as a
//! whole through any byte transport with bulk handle semantics: a character
//! device file, or an in-process [`BulkHandle`](crate::bulk::BulkHandle).
//! Field accessors only touch the local copy; `recv` and `send` are the only
//! points where the transport is used.

use std::io::{Read, Write};

use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::region::{decode_words, encode_words, RegisterRegion};
use crate::regmap::RegisterMap;

pub struct RegionClient<T> {
    map: RegisterMap,
    words: Mutex<Vec<u32>>,
    transport: Mutex<T>,
}

impl<T: Read + Write> RegionClient<T> {
    pub fn new(map: RegisterMap, transport: T) -> Self {
        Self {
            map,
            words: Mutex::new(vec![0; map.register_count()]),
            transport: Mutex::new(transport),
        }
    }

    /// Replace the local mirror with the device region.
    pub fn recv(&self) -> Result<()> {
        let mut bytes = vec![0u8; self.map.byte_len()];
        let n = self.transport.lock().read(&mut bytes)?;
        if n != bytes.len() {
            return Err(Error::InvalidLength {
                expected: bytes.len(),
                actual: n,
            });
        }
        decode_words(&bytes, &mut self.words.lock());
        Ok(())
    }

    /// Write the local mirror to the device region.
    pub fn send(&self) -> Result<()> {
        let mut bytes = vec![0u8; self.map.byte_len()];
        encode_words(&self.words.lock(), &mut bytes);
        let n = self.transport.lock().write(&bytes)?;
        if n != bytes.len() {
            return Err(Error::InvalidLength {
                expected: bytes.len(),
                actual: n,
            });
        }
        Ok(())
    }

    pub fn into_transport(self) -> T {
        self.transport.into_inner()
    }
}

impl<T: Read + Write> RegisterRegion for RegionClient<T> {
    fn map(&self) -> RegisterMap {
        self.map
    }

    fn pull(&self) -> Result<()> {
        self.recv()
    }

    fn push(&self) -> Result<()> {
        self.send()
    }

    fn with_mirror<R>(&self, f: impl FnOnce(&mut [u32]) -> R) -> Result<R> {
        Ok(f(self.words.lock().as_mut_slice()))
    }
}
