// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! PCI bridge kinds and bus-number windows.
//!
//! A bridge sits on its *primary* bus and forwards configuration cycles for the
//! contiguous window `[secondary, subordinate]` of bus numbers downstream.
//!
//! # Examples
//!
//! ```
//! use pcitree_hardware::pci::bridge::{BridgeBuses, BridgeKind};
//! use pcitree_hardware::pci::bus::Bus;
//!
//! let root_port = BridgeBuses::new(Bus::new(0), Bus::new(1), Bus::new(4));
//! assert!(root_port.contains(Bus::new(3)));
//! assert!(!root_port.contains(Bus::new(0)));
//! assert_eq!(root_port.span(), Some(3));
//! assert!(BridgeKind::Host.is_host());
//! ```

use crate::pci::{bus::Bus, header::HeaderType};

/// Kind of PCI bridge.
///
/// Rendered in lower case (`"host"`, `"pci"`, `"card_bus"`).
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
    strum::Display,
    strum::EnumIs,
    strum::EnumString,
    strum::FromRepr,
    strum::IntoStaticStr,
)]
#[cfg_attr(
    any(test, feature = "serde"),
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
#[strum(serialize_all = "snake_case")]
pub enum BridgeKind {
    /// Synthetic root standing in for the host bridge of a domain.
    Host,
    /// PCI-to-PCI bridge (type 1 header).
    Pci,
    /// CardBus bridge (type 2 header).
    CardBus,
}

impl BridgeKind {
    /// The bridge kind implied by a header layout, if that layout is a bridge.
    #[must_use]
    pub const fn from_header(header: HeaderType) -> Option<BridgeKind> {
        match header {
            HeaderType::Normal => None,
            HeaderType::Bridge => Some(BridgeKind::Pci),
            HeaderType::CardBus => Some(BridgeKind::CardBus),
        }
    }
}

/// The three bus numbers programmed into a bridge.
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
    derive(serde::Serialize, serde::Deserialize)
)]
#[cfg_attr(any(test, feature = "bolero"), derive(bolero::TypeGenerator))]
pub struct BridgeBuses {
    /// Bus the bridge itself sits on.
    pub primary: Bus,
    /// First bus below the bridge.
    pub secondary: Bus,
    /// Last bus below the bridge.
    pub subordinate: Bus,
}

impl BridgeBuses {
    /// Bus numbers of the synthetic host bridge: primary, secondary and
    /// subordinate are all bus 0.
    pub const HOST: BridgeBuses = BridgeBuses::new(Bus::MIN, Bus::MIN, Bus::MIN);

    /// Creates a new set of bridge bus numbers.
    #[must_use]
    pub const fn new(primary: Bus, secondary: Bus, subordinate: Bus) -> Self {
        Self {
            primary,
            secondary,
            subordinate,
        }
    }

    /// Returns false when the window is inverted (secondary above subordinate).
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.secondary.value() <= self.subordinate.value()
    }

    /// Returns true if `bus` lies in `[secondary, subordinate]`.
    ///
    /// An inverted window contains nothing.
    #[must_use]
    pub const fn contains(&self, bus: Bus) -> bool {
        self.secondary.value() <= bus.value() && bus.value() <= self.subordinate.value()
    }

    /// Width of the downstream window minus one, or `None` if the window is inverted.
    ///
    /// Narrower windows are nearer to the buses they contain.
    #[must_use]
    pub const fn span(&self) -> Option<u8> {
        self.subordinate.value().checked_sub(self.secondary.value())
    }
}

impl std::fmt::Display for BridgeBuses {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} -> {}-{}",
            self.primary, self.secondary, self.subordinate
        )
    }
}

#[cfg(test)]
mod test {
    use crate::pci::bridge::BridgeBuses;
    use crate::pci::bus::Bus;

    #[test]
    fn contains_matches_span() {
        bolero::check!()
            .with_type()
            .cloned()
            .for_each(|(buses, bus): (BridgeBuses, Bus)| {
                let expected = buses.secondary <= bus && bus <= buses.subordinate;
                assert_eq!(buses.contains(bus), expected);
                assert_eq!(buses.is_valid(), buses.span().is_some());
                if !buses.is_valid() {
                    assert!(!buses.contains(bus));
                }
            });
    }

    #[test]
    fn host_window_is_bus_zero() {
        assert!(BridgeBuses::HOST.contains(Bus::MIN));
        for bus in 1..=u8::MAX {
            assert!(!BridgeBuses::HOST.contains(Bus::new(bus)));
        }
        assert_eq!(BridgeBuses::HOST.span(), Some(0));
        assert_eq!(BridgeBuses::HOST.to_string(), "00 -> 00-00");
    }
}
