// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! PCI class codes.
//!
//! The 16-bit register at [`crate::pci::config::offset::CLASS_DEVICE`] holds the
//! base class in its high byte and the sub class in its low byte.

/// Base class shared by every kind of bridge.
pub const BASE_CLASS_BRIDGE: u8 = 0x06;

/// A 16-bit (base class, sub class) pair.
///
/// ```
/// # use pcitree_hardware::pci::class::DeviceClass;
/// #
/// let pci_bridge = DeviceClass::new(0x0604);
/// assert_eq!(pci_bridge.base_class(), 0x06);
/// assert_eq!(pci_bridge.sub_class(), 0x04);
/// assert!(pci_bridge.is_bridge());
/// ```
#[derive(
    Clone,
    Copy,
    Debug,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    rkyv::Archive,
    rkyv::Deserialize,
    rkyv::Serialize,
)]
#[cfg_attr(
    any(test, feature = "serde"),
    derive(serde::Serialize, serde::Deserialize),
    serde(transparent)
)]
#[repr(transparent)]
pub struct DeviceClass(u16);

impl DeviceClass {
    /// Wraps a raw class register value.
    #[must_use]
    pub const fn new(raw: u16) -> Self {
        Self(raw)
    }

    /// Returns the raw register value.
    #[must_use]
    pub const fn value(self) -> u16 {
        self.0
    }

    /// High byte of the register.
    #[must_use]
    pub const fn base_class(self) -> u8 {
        self.0.to_be_bytes()[0]
    }

    /// Low byte of the register.
    #[must_use]
    pub const fn sub_class(self) -> u8 {
        self.0.to_be_bytes()[1]
    }

    /// Returns true for any class in the bridge base class.
    #[must_use]
    pub const fn is_bridge(self) -> bool {
        self.base_class() == BASE_CLASS_BRIDGE
    }
}

impl std::fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04x}", self.0)
    }
}
