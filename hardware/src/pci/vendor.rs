// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! PCI vendor IDs.
//!
//! Vendor IDs are assigned by the PCI-SIG. A read of all ones from the vendor ID
//! register is how configuration space says "nothing here", so `0xFFFF` is not a
//! representable [`VendorId`].
//!
//! ```
//! # use pcitree_hardware::pci::vendor::VendorId;
//! #
//! let intel = VendorId::new(0x8086).unwrap();
//! assert_eq!(format!("{intel}"), "8086");
//! assert!(VendorId::new(0xffff).is_err());
//! ```

/// A 16-bit PCI vendor identifier.
#[derive(
    Clone,
    Copy,
    Debug,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
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
pub struct VendorId(u16);

/// The all-ones vendor ID was read, meaning no function responded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("the vendor 0xFFFF is reserved as an invalid vendor ID")]
pub struct InvalidVendorId;

impl VendorId {
    /// The value read back from an empty slot.
    pub const ABSENT: u16 = u16::MAX;

    /// Creates a new vendor ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the vendor ID is [`VendorId::ABSENT`].
    pub const fn new(id: u16) -> Result<Self, InvalidVendorId> {
        if id == Self::ABSENT {
            Err(InvalidVendorId)
        } else {
            Ok(Self(id))
        }
    }

    /// Returns the raw vendor ID value.
    #[must_use]
    pub const fn value(self) -> u16 {
        self.0
    }
}

impl std::fmt::LowerHex for VendorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04x}", self.0)
    }
}

impl std::fmt::Display for VendorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:x}")
    }
}

impl From<VendorId> for String {
    fn from(value: VendorId) -> String {
        value.to_string()
    }
}

/// Error type for vendor ID parsing failures.
#[derive(Debug, thiserror::Error)]
pub enum VendorIdParseError {
    /// Not a hex number that fits 16 bits.
    #[error(transparent)]
    InvalidSyntax(std::num::ParseIntError),
    /// Parsed to the reserved value.
    #[error(transparent)]
    ReservedInvalid(InvalidVendorId),
}

impl TryFrom<String> for VendorId {
    type Error = VendorIdParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let id = u16::from_str_radix(&value, 16).map_err(VendorIdParseError::InvalidSyntax)?;
        VendorId::new(id).map_err(VendorIdParseError::ReservedInvalid)
    }
}
