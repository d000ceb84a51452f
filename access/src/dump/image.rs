// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Register images captured from a dump.

use hardware::pci::config::{CONFIG_SPACE_SIZE, EXTENDED_CONFIG_SPACE_SIZE};
use tracing::debug;

/// Fill value for bytes a dump never mentioned.
pub const UNWRITTEN: u8 = 0xff;

/// Offset past the end of extended configuration space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("offset {0:#x} is beyond the extended config space")]
pub struct OffsetTooLarge(pub usize);

/// The configuration space of one device as written in a dump.
///
/// Starts out as 256 bytes of [`UNWRITTEN`] and grows once to 4096 bytes the
/// first time a byte beyond conventional config space is stored. Bytes below
/// [`RegisterImage::valid_length`] that were skipped by the dump read back as
/// [`UNWRITTEN`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterImage {
    data: Vec<u8>,
    valid: usize,
}

impl Default for RegisterImage {
    fn default() -> Self {
        Self {
            data: vec![UNWRITTEN; CONFIG_SPACE_SIZE],
            valid: 0,
        }
    }
}

impl RegisterImage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current storage size: 256 or 4096.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// One past the highest offset ever stored.
    #[must_use]
    pub fn valid_length(&self) -> usize {
        self.valid
    }

    /// Stores `byte` at `offset`, growing the image if needed.
    ///
    /// # Errors
    ///
    /// [`OffsetTooLarge`] if `offset` is 4096 or more.
    pub fn store(&mut self, offset: usize, byte: u8) -> Result<(), OffsetTooLarge> {
        if offset >= EXTENDED_CONFIG_SPACE_SIZE {
            return Err(OffsetTooLarge(offset));
        }
        if offset >= self.data.len() {
            debug!(
                "growing register image from {} to {EXTENDED_CONFIG_SPACE_SIZE} bytes",
                self.data.len()
            );
            self.data.resize(EXTENDED_CONFIG_SPACE_SIZE, UNWRITTEN);
        }
        self.data[offset] = byte;
        self.valid = self.valid.max(offset + 1);
        Ok(())
    }

    /// Copies `[offset, offset + buf.len())` into `buf`.
    ///
    /// Returns false and leaves `buf` untouched if the window reaches past
    /// [`RegisterImage::valid_length`].
    #[must_use]
    pub fn read(&self, offset: usize, buf: &mut [u8]) -> bool {
        match offset.checked_add(buf.len()) {
            Some(end) if end <= self.valid => {
                buf.copy_from_slice(&self.data[offset..end]);
                true
            }
            _ => false,
        }
    }

    /// The stored bytes up to the valid length.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.valid]
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use crate::dump::image::{OffsetTooLarge, RegisterImage, UNWRITTEN};

    #[test]
    fn growth_boundary() {
        let mut image = RegisterImage::new();
        image.store(0, 0x86).unwrap();
        image.store(255, 0x01).unwrap();
        assert_eq!(image.capacity(), 256);
        assert_eq!(image.valid_length(), 256);
        image.store(256, 0x02).unwrap();
        assert_eq!(image.capacity(), 4096);
        assert_eq!(image.valid_length(), 257);
        assert_eq!(image.as_slice()[0], 0x86);
        assert_eq!(image.as_slice()[255], 0x01);
        assert_eq!(image.store(4096, 0), Err(OffsetTooLarge(4096)));
        image.store(4095, 0x03).unwrap();
        assert_eq!(image.valid_length(), 4096);
    }

    #[test]
    fn skipped_bytes_read_as_unwritten() {
        let mut image = RegisterImage::new();
        image.store(3, 0x10).unwrap();
        let mut buf = [0u8; 4];
        assert!(image.read(0, &mut buf));
        assert_eq!(buf, [UNWRITTEN, UNWRITTEN, UNWRITTEN, 0x10]);
    }

    #[test]
    fn reads_past_valid_length_fail_untouched() {
        let mut image = RegisterImage::new();
        image.store(1, 0x10).unwrap();
        let mut buf = [0xaa; 4];
        assert!(!image.read(0, &mut buf));
        assert_eq!(buf, [0xaa; 4]);
        assert!(!image.read(usize::MAX, &mut buf));
        assert!(image.read(2, &mut []));
    }
}
