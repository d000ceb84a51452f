// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Configuration header layouts.
//!
//! The header type register selects how bytes `0x10..0x40` (and, for CardBus,
//! beyond) are laid out. Only the bridge layouts matter to topology
//! reconstruction, since they carry the bus-number window registers.

use num_traits::FromPrimitive;

use crate::pci::config::{CARDBUS_HEADER_SIZE, HEADER_SIZE, offset};

/// Bit of the header type register which marks a multi-function device.
pub const MULTI_FUNCTION: u8 = 0x80;

/// Layout of a function's configuration header.
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
    strum::Display,
    strum::EnumIs,
    strum::IntoStaticStr,
)]
#[cfg_attr(
    any(test, feature = "serde"),
    derive(serde::Serialize, serde::Deserialize)
)]
#[strum(serialize_all = "snake_case")]
#[repr(u8)]
pub enum HeaderType {
    /// Type 0: endpoints.
    Normal = 0,
    /// Type 1: PCI-to-PCI bridges.
    Bridge = 1,
    /// Type 2: CardBus bridges.
    CardBus = 2,
}

impl HeaderType {
    /// Decodes the raw header type register, ignoring the multi-function bit.
    ///
    /// Returns `None` for layouts this crate does not know.
    ///
    /// ```
    /// # use pcitree_hardware::pci::header::HeaderType;
    /// #
    /// assert_eq!(HeaderType::decode(0x81), Some(HeaderType::Bridge));
    /// assert_eq!(HeaderType::decode(0x7f), None);
    /// ```
    #[must_use]
    pub fn decode(raw: u8) -> Option<HeaderType> {
        HeaderType::from_u8(raw & !MULTI_FUNCTION)
    }

    /// Number of leading configuration bytes that make up this header.
    #[must_use]
    pub const fn size(self) -> usize {
        match self {
            HeaderType::Normal | HeaderType::Bridge => HEADER_SIZE,
            HeaderType::CardBus => CARDBUS_HEADER_SIZE,
        }
    }

    /// Offsets of the (primary, secondary, subordinate) bus registers, for bridge layouts.
    #[must_use]
    pub const fn bus_registers(self) -> Option<(usize, usize, usize)> {
        match self {
            HeaderType::Normal => None,
            HeaderType::Bridge => Some((
                offset::PRIMARY_BUS,
                offset::SECONDARY_BUS,
                offset::SUBORDINATE_BUS,
            )),
            HeaderType::CardBus => Some((
                offset::CB_PRIMARY_BUS,
                offset::CB_CARD_BUS,
                offset::CB_SUBORDINATE_BUS,
            )),
        }
    }
}

/// Returns true if the raw header type register flags a multi-function device.
#[must_use]
pub const fn is_multi_function(raw: u8) -> bool {
    raw & MULTI_FUNCTION != 0
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn decode_masks_multi_function_bit() {
        bolero::check!().with_type().cloned().for_each(|raw: u8| {
            assert_eq!(HeaderType::decode(raw), HeaderType::decode(raw | MULTI_FUNCTION));
            assert_eq!(is_multi_function(raw), raw >= 0x80);
        });
    }

    #[test]
    fn only_bridges_have_bus_registers() {
        assert_eq!(HeaderType::Normal.bus_registers(), None);
        assert_eq!(
            HeaderType::Bridge.bus_registers(),
            Some((0x18, 0x19, 0x1a))
        );
        assert!(HeaderType::CardBus.bus_registers().is_some());
        assert_eq!(HeaderType::CardBus.size(), 128);
    }
}
