// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! PCI domain (segment group) numbers.
//!
//! Domains let a machine expose more than 256 buses: every domain carries its own
//! independent bus numbering. Most machines only have domain `0000`, but some
//! (for example, systems with VMD controllers) report domains wider than 16 bits,
//! which is why the domain is stored as a `u32`.
//!
//! # Examples
//!
//! ```
//! # use pcitree_hardware::pci::domain::Domain;
//! #
//! let domain = Domain::new(0);
//! assert_eq!(format!("{domain}"), "0000");
//!
//! // five digit domains are displayed in full
//! let wide = Domain::try_from("10000").unwrap();
//! assert_eq!(format!("{wide}"), "10000");
//! ```

/// A PCI domain number (also known as segment group).
///
/// Displayed as at least four lower-case hexadecimal digits.
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
#[cfg_attr(any(test, feature = "bolero"), derive(bolero::TypeGenerator))]
#[cfg_attr(
    any(test, feature = "serde"),
    derive(serde::Serialize, serde::Deserialize),
    serde(transparent)
)]
#[repr(transparent)]
#[rkyv(attr(derive(Debug, PartialEq, Eq)))]
pub struct Domain(u32);

impl Domain {
    /// Domain zero, the only domain on most machines.
    pub const ZERO: Domain = Domain(0);

    /// Longest accepted textual form, in hex digits.
    pub const MAX_DIGITS: usize = 8;

    /// Creates a new domain number.
    #[must_use]
    pub const fn new(domain: u32) -> Self {
        Self(domain)
    }

    /// Returns the raw domain number value.
    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }
}

impl From<u32> for Domain {
    fn from(value: u32) -> Self {
        Domain(value)
    }
}

impl From<u16> for Domain {
    fn from(value: u16) -> Self {
        Domain(u32::from(value))
    }
}

impl std::fmt::LowerHex for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04x}", self.0)
    }
}

impl std::fmt::Display for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:x}")
    }
}

/// Error type for domain parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PciDomainParseError {
    /// The string is empty, too long, or contains something other than hex digits.
    #[error("invalid PCI domain syntax (expected 1 to 8 hex digits): {0:?}")]
    Syntax(String),
}

impl TryFrom<&str> for Domain {
    type Error = PciDomainParseError;

    /// Parses a domain number from a hexadecimal string.
    ///
    /// Leading zeros are optional.
    ///
    /// # Examples
    ///
    /// ```
    /// # use pcitree_hardware::pci::domain::Domain;
    /// #
    /// assert!(Domain::try_from("0000").is_ok());
    /// assert!(Domain::try_from("0").is_ok());
    /// assert!(Domain::try_from("1ffff").is_ok());
    /// assert!(Domain::try_from("").is_err());
    /// assert!(Domain::try_from("+1").is_err());
    /// assert!(Domain::try_from("123456789").is_err());
    /// ```
    fn try_from(value: &str) -> Result<Self, Self::Error> {
        if value.is_empty()
            || value.len() > Self::MAX_DIGITS
            || !value.bytes().all(|b| b.is_ascii_hexdigit())
        {
            return Err(PciDomainParseError::Syntax(value.to_string()));
        }
        u32::from_str_radix(value, 16)
            .map(Domain)
            .map_err(|_| PciDomainParseError::Syntax(value.to_string()))
    }
}
