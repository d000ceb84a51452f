// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! PCI device (slot) numbers and device IDs.
//!
//! - [`Device`]: the slot number on a bus (5-bit value, 0-31)
//! - [`DeviceId`]: the 16-bit model identifier assigned by the vendor, read from
//!   configuration space offset [`crate::pci::config::offset::DEVICE_ID`]
//!
//! # Examples
//!
//! ```
//! # use pcitree_hardware::pci::device::{Device, DeviceId};
//! #
//! let device = Device::try_from(0x1f).unwrap();
//! assert_eq!(format!("{device}"), "1f");
//!
//! let device_id = DeviceId::new(0x10d3);
//! assert_eq!(format!("{device_id}"), "10d3");
//! ```

/// A 16-bit PCI device ID.
#[derive(
    Clone,
    Copy,
    Debug,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    num_derive::FromPrimitive,
    num_derive::ToPrimitive,
    rkyv::Archive,
    rkyv::Deserialize,
    rkyv::Serialize,
)]
#[cfg_attr(
    any(test, feature = "serde"),
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "String", into = "String")
)]
#[repr(transparent)]
pub struct DeviceId(u16);

impl DeviceId {
    /// Creates a new device ID.
    #[must_use]
    pub const fn new(id: u16) -> Self {
        Self(id)
    }

    /// Returns the raw device ID value.
    #[must_use]
    pub const fn value(self) -> u16 {
        self.0
    }
}

impl std::fmt::LowerHex for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04x}", self.0)
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:x}")
    }
}

impl From<DeviceId> for String {
    fn from(id: DeviceId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for DeviceId {
    type Error = std::num::ParseIntError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        u16::from_str_radix(&value, 16).map(DeviceId)
    }
}

/// A PCI device (slot) number on a bus, 0 through 31.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    bytecheck::CheckBytes,
    num_derive::ToPrimitive,
    rkyv::Archive,
    rkyv::Deserialize,
    rkyv::Serialize,
)]
#[cfg_attr(
    any(test, feature = "serde"),
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "u8", into = "u8")
)]
#[repr(transparent)]
#[rkyv(attr(derive(PartialEq, Eq, Debug)))]
pub struct Device(u8);

impl Device {
    /// Maximum valid device number (31, or 0x1F).
    pub const MAX: u8 = 0b1_1111;

    /// Returns the raw device number value.
    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }
}

impl From<Device> for u8 {
    fn from(value: Device) -> Self {
        value.0
    }
}

impl std::fmt::LowerHex for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02x}", self.0)
    }
}

impl std::fmt::Display for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:x}")
    }
}

/// Error type for invalid device numbers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidDevice {
    /// Device number exceeds the 5-bit maximum.
    #[error("device number maximum is 5 bits: {0:#x} is too large")]
    TooLarge(u8),
}

/// Error type for device parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeviceParseError {
    /// Not exactly two hex digits.
    #[error("invalid PCI device syntax (expected two hex digits): {0:?}")]
    Syntax(String),
    /// Well formed, but out of range.
    #[error(transparent)]
    Invalid(InvalidDevice),
}

impl TryFrom<u8> for Device {
    type Error = InvalidDevice;

    /// Creates a device number from a u8 value.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidDevice::TooLarge`] if the value exceeds 31.
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if value > Self::MAX {
            Err(InvalidDevice::TooLarge(value))
        } else {
            Ok(Self(value))
        }
    }
}

impl TryFrom<&str> for Device {
    type Error = DeviceParseError;

    /// Parses a device number from exactly two hexadecimal digits (00-1f).
    ///
    /// ```
    /// # use pcitree_hardware::pci::device::Device;
    /// #
    /// assert!(Device::try_from("1f").is_ok());
    /// assert!(Device::try_from("20").is_err());
    /// assert!(Device::try_from("1").is_err());
    /// ```
    fn try_from(value: &str) -> Result<Self, Self::Error> {
        if value.len() != 2 || !value.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(DeviceParseError::Syntax(value.to_string()));
        }
        let raw = u8::from_str_radix(value, 16)
            .map_err(|_| DeviceParseError::Syntax(value.to_string()))?;
        Device::try_from(raw).map_err(DeviceParseError::Invalid)
    }
}

/// Test contract support for property-based testing.
#[cfg(any(test, feature = "bolero"))]
mod contract {
    use crate::pci::device::Device;

    impl bolero::TypeGenerator for Device {
        fn generate<D: bolero::Driver>(driver: &mut D) -> Option<Self> {
            Some(
                Device::try_from(driver.produce::<u8>()? & Self::MAX)
                    .unwrap_or_else(|_| unreachable!()),
            )
        }
    }
}
