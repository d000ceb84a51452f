// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! PCI bus numbers.
//!
//! A bus is identified by an 8-bit number within its domain. Bridges forward a
//! contiguous window of bus numbers downstream (see [`crate::pci::bridge`]).
//!
//! # Examples
//!
//! ```
//! use pcitree_hardware::pci::bus::Bus;
//!
//! let bus = Bus::from(0x03);
//! assert_eq!(format!("{bus}"), "03");
//!
//! let parsed = Bus::try_from("0a").unwrap();
//! assert_eq!(parsed.value(), 0x0a);
//! ```

/// A PCI bus number.
///
/// `Display` and `LowerHex` both render two zero-padded hex digits.
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
    num_derive::FromPrimitive,
    num_derive::ToPrimitive,
    rkyv::Archive,
    rkyv::Deserialize,
    rkyv::Serialize,
)]
#[cfg_attr(
    any(test, feature = "serde"),
    derive(serde::Serialize, serde::Deserialize),
    serde(transparent)
)]
#[cfg_attr(any(test, feature = "bolero"), derive(bolero::TypeGenerator))]
#[repr(transparent)]
#[rkyv(attr(derive(PartialEq, Eq, Debug)))]
pub struct Bus(u8);

impl Bus {
    /// The lowest bus number (root bus of most domains).
    pub const MIN: Bus = Bus(u8::MIN);
    /// The highest bus number in a domain.
    pub const MAX: Bus = Bus(u8::MAX);

    /// Creates a new bus number.
    #[must_use]
    pub const fn new(bus: u8) -> Self {
        Self(bus)
    }

    /// Returns the raw bus number value.
    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }
}

impl std::fmt::LowerHex for Bus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02x}", self.0)
    }
}

impl std::fmt::Display for Bus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:x}")
    }
}

impl From<u8> for Bus {
    fn from(value: u8) -> Self {
        Bus(value)
    }
}

/// Error type for bus parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BusParseError {
    /// Not exactly two hex digits.
    #[error("invalid bus syntax (expected two hex digits): {0:?}")]
    Syntax(String),
}

impl TryFrom<&str> for Bus {
    type Error = BusParseError;

    /// Parses a bus number from exactly two hexadecimal digits.
    ///
    /// # Examples
    ///
    /// ```
    /// use pcitree_hardware::pci::bus::Bus;
    ///
    /// assert!(Bus::try_from("00").is_ok());
    /// assert!(Bus::try_from("ff").is_ok());
    /// assert!(Bus::try_from("0").is_err());
    /// assert!(Bus::try_from("100").is_err());
    /// ```
    fn try_from(value: &str) -> Result<Self, Self::Error> {
        if value.len() != 2 || !value.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(BusParseError::Syntax(value.to_string()));
        }
        u8::from_str_radix(value, 16)
            .map(Bus)
            .map_err(|_| BusParseError::Syntax(value.to_string()))
    }
}
