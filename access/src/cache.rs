// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Per-device configuration space cache.
//!
//! Backend reads can be expensive (a syscall per register on live hardware),
//! while consumers tend to read the same few registers over and over. The cache
//! tracks the state of every byte individually:
//!
//! * [`ByteState::Unknown`]: never requested.
//! * [`ByteState::Present`]: holds the result of the latest successful read.
//! * [`ByteState::Unavailable`]: a read covering it failed; it is never retried.
//!
//! The cache itself does no I/O. Callers hand [`ConfigCache::fetch`] a closure
//! which reads from the backend.

use hardware::pci::config::EXTENDED_CONFIG_SPACE_SIZE;
use tracing::trace;

use crate::backend::ReadError;

/// State of a single cached byte.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, strum::Display, strum::EnumIs)]
#[strum(serialize_all = "snake_case")]
pub enum ByteState {
    /// Never requested.
    #[default]
    Unknown,
    /// Read successfully.
    Present,
    /// A read covering this byte failed.
    Unavailable,
}

/// Reasons a fetch did not produce bytes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// The window leaves extended configuration space.
    #[error("config window {offset:#x}+{length} is outside of the config space")]
    OutOfBounds {
        /// Start of the window.
        offset: usize,
        /// Length of the window.
        length: usize,
    },
    /// Part of the window failed to read earlier.
    #[error("config window {offset:#x}+{length} is not available")]
    Unavailable {
        /// Start of the window.
        offset: usize,
        /// Length of the window.
        length: usize,
    },
    /// The backend refused the read just now.
    #[error(transparent)]
    Read(#[from] ReadError),
}

/// Cached configuration space of one device.
#[derive(Debug, Default, Clone)]
pub struct ConfigCache {
    data: Vec<u8>,
    state: Vec<ByteState>,
}

fn window(offset: usize, length: usize) -> Result<std::ops::Range<usize>, FetchError> {
    match offset.checked_add(length) {
        Some(end) if end <= EXTENDED_CONFIG_SPACE_SIZE => Ok(offset..end),
        _ => Err(FetchError::OutOfBounds { offset, length }),
    }
}

impl ConfigCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of bytes the cache currently tracks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if nothing was ever requested.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// State of the byte at `offset`.
    #[must_use]
    pub fn state(&self, offset: usize) -> ByteState {
        self.state.get(offset).copied().unwrap_or_default()
    }

    /// Makes sure `[offset, offset + length)` is present.
    ///
    /// `read` is called at most once, with the start of the window and a
    /// scratch buffer covering all of it, and only if some byte of the window
    /// is still unknown.
    ///
    /// # Errors
    ///
    /// * [`FetchError::OutOfBounds`] if the window ends past 4096 bytes.
    /// * [`FetchError::Unavailable`] if a byte of the window failed before.
    /// * [`FetchError::Read`] if `read` fails. Every byte of the window which
    ///   was not already present becomes unavailable.
    pub fn fetch<F>(&mut self, offset: usize, length: usize, read: F) -> Result<(), FetchError>
    where
        F: FnOnce(usize, &mut [u8]) -> Result<(), ReadError>,
    {
        let range = window(offset, length)?;
        if length == 0 {
            return Ok(());
        }
        if range.end > self.data.len() {
            self.data.resize(range.end, 0);
            self.state.resize(range.end, ByteState::Unknown);
        }
        let states = &mut self.state[range.clone()];
        if states.iter().any(|s| s.is_unavailable()) {
            return Err(FetchError::Unavailable { offset, length });
        }
        if states.iter().all(|s| s.is_present()) {
            return Ok(());
        }
        trace!("reading config window {offset:#x}+{length}");
        let mut scratch = vec![0u8; length];
        match read(offset, &mut scratch) {
            Ok(()) => {
                self.data[range].copy_from_slice(&scratch);
                states.fill(ByteState::Present);
                Ok(())
            }
            Err(e) => {
                states
                    .iter_mut()
                    .filter(|s| !s.is_present())
                    .for_each(|s| *s = ByteState::Unavailable);
                Err(FetchError::Read(e))
            }
        }
    }

    /// The window as a slice, if every byte of it is present.
    #[must_use]
    pub fn bytes(&self, offset: usize, length: usize) -> Option<&[u8]> {
        let range = window(offset, length).ok()?;
        let states = self.state.get(range.clone())?;
        if states.iter().all(|s| s.is_present()) {
            self.data.get(range)
        } else {
            None
        }
    }

    /// Fetches one byte.
    ///
    /// # Errors
    ///
    /// As [`ConfigCache::fetch`].
    pub fn read_u8<F>(&mut self, offset: usize, read: F) -> Result<u8, FetchError>
    where
        F: FnOnce(usize, &mut [u8]) -> Result<(), ReadError>,
    {
        Ok(self.fetch_array::<1, F>(offset, read)?[0])
    }

    /// Fetches a little-endian 16-bit register.
    ///
    /// # Errors
    ///
    /// As [`ConfigCache::fetch`].
    pub fn read_u16<F>(&mut self, offset: usize, read: F) -> Result<u16, FetchError>
    where
        F: FnOnce(usize, &mut [u8]) -> Result<(), ReadError>,
    {
        Ok(u16::from_le_bytes(self.fetch_array(offset, read)?))
    }

    /// Fetches a little-endian 32-bit register.
    ///
    /// # Errors
    ///
    /// As [`ConfigCache::fetch`].
    pub fn read_u32<F>(&mut self, offset: usize, read: F) -> Result<u32, FetchError>
    where
        F: FnOnce(usize, &mut [u8]) -> Result<(), ReadError>,
    {
        Ok(u32::from_le_bytes(self.fetch_array(offset, read)?))
    }

    fn fetch_array<const N: usize, F>(
        &mut self,
        offset: usize,
        read: F,
    ) -> Result<[u8; N], FetchError>
    where
        F: FnOnce(usize, &mut [u8]) -> Result<(), ReadError>,
    {
        self.fetch(offset, N, read)?;
        let mut out = [0u8; N];
        out.copy_from_slice(&self.data[offset..offset + N]);
        Ok(out)
    }

    /// Forgets the window, so the next fetch goes back to the backend.
    ///
    /// Unavailable bytes are forgotten too.
    pub fn invalidate(&mut self, offset: usize, length: usize) {
        let end = offset.saturating_add(length).min(self.state.len());
        if offset < end {
            self.state[offset..end].fill(ByteState::Unknown);
        }
    }

    /// Forgets everything.
    pub fn clear(&mut self) {
        self.data.clear();
        self.state.clear();
    }
}

#[cfg(test)]
mod test {
    use std::cell::Cell;

    use hardware::pci::address::PciAddress;
    use pretty_assertions::assert_eq;

    use crate::backend::ReadError;
    use crate::cache::{ByteState, ConfigCache, FetchError};

    #[allow(clippy::cast_possible_truncation)]
    fn pattern(offset: usize, buf: &mut [u8]) -> Result<(), ReadError> {
        for (i, b) in buf.iter_mut().enumerate() {
            *b = (offset + i) as u8;
        }
        Ok(())
    }

    fn refuse(offset: usize, buf: &mut [u8]) -> Result<(), ReadError> {
        Err(ReadError::OutOfRange {
            address: PciAddress::default(),
            offset,
            length: buf.len(),
            valid: 0,
        })
    }

    #[test]
    fn registers_are_little_endian() {
        let mut cache = ConfigCache::new();
        assert_eq!(cache.read_u8(0x10, pattern).unwrap(), 0x10);
        assert_eq!(cache.read_u16(0x02, pattern).unwrap(), 0x0302);
        assert_eq!(cache.read_u32(0x04, pattern).unwrap(), 0x0706_0504);
        assert_eq!(cache.bytes(0x02, 2), Some(&[0x02, 0x03][..]));
        assert_eq!(cache.bytes(0x00, 2), None);
    }

    #[test]
    fn repeated_fetch_reads_once() {
        bolero::check!()
            .with_type()
            .for_each(|&(offset, length): &(u16, u8)| {
                let offset = usize::from(offset % 4096);
                let length = usize::from(length);
                let calls = Cell::new(0);
                let counting = |o: usize, buf: &mut [u8]| {
                    calls.set(calls.get() + 1);
                    pattern(o, buf)
                };
                let mut cache = ConfigCache::new();
                let first = cache.fetch(offset, length, counting);
                let second = cache.fetch(offset, length, counting);
                if offset + length > 4096 {
                    assert!(matches!(first, Err(FetchError::OutOfBounds { .. })));
                    assert_eq!(first, second);
                    assert_eq!(calls.get(), 0);
                } else {
                    assert!(first.is_ok() && second.is_ok());
                    assert_eq!(calls.get(), usize::from(length > 0));
                }
            });
    }

    #[test]
    fn failures_are_sticky() {
        let mut cache = ConfigCache::new();
        assert!(matches!(
            cache.fetch(0x40, 4, refuse),
            Err(FetchError::Read(ReadError::OutOfRange { .. }))
        ));
        assert_eq!(cache.state(0x40), ByteState::Unavailable);
        let called = Cell::new(false);
        let result = cache.fetch(0x42, 4, |o, buf| {
            called.set(true);
            pattern(o, buf)
        });
        assert_eq!(
            result,
            Err(FetchError::Unavailable {
                offset: 0x42,
                length: 4
            })
        );
        assert!(!called.get());
        // bytes outside the failed window are unaffected
        assert_eq!(cache.read_u16(0x44, pattern).unwrap(), 0x4544);
    }

    #[test]
    fn failure_keeps_present_bytes() {
        let mut cache = ConfigCache::new();
        cache.fetch(0, 4, pattern).unwrap();
        assert!(cache.fetch(0, 8, refuse).is_err());
        assert_eq!(cache.state(3), ByteState::Present);
        assert_eq!(cache.state(4), ByteState::Unavailable);
        assert_eq!(cache.read_u32(0, refuse).unwrap(), 0x0302_0100);
    }

    #[test]
    fn bounds() {
        let mut cache = ConfigCache::new();
        assert!(cache.fetch(4095, 1, pattern).is_ok());
        assert_eq!(
            cache.fetch(4095, 2, pattern),
            Err(FetchError::OutOfBounds {
                offset: 4095,
                length: 2
            })
        );
        assert_eq!(cache.len(), 4096);
        assert!(cache.fetch(0, 0, refuse).is_ok());
    }

    #[test]
    fn invalidate_forces_a_reread() {
        let mut cache = ConfigCache::new();
        assert!(cache.fetch(0, 4, refuse).is_err());
        cache.invalidate(0, 2);
        assert_eq!(cache.state(0), ByteState::Unknown);
        assert_eq!(cache.state(2), ByteState::Unavailable);
        assert_eq!(cache.read_u16(0, pattern).unwrap(), 0x0100);
        cache.invalidate(4000, 200);
        cache.clear();
        assert!(cache.is_empty());
    }
}
