// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Inconsistencies found while building a topology.
//!
//! None of these abort the build. The bridges and devices concerned are left
//! out of the tree.

use hardware::pci::address::PciAddress;
use hardware::pci::bridge::BridgeBuses;
use hardware::pci::bus::Bus;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TopologyWarning {
    /// Secondary bus above subordinate bus; the bridge encloses nothing.
    #[error("bridge {address}: inverted bus range {numbers}")]
    InvertedRange {
        address: PciAddress,
        numbers: BridgeBuses,
    },
    /// The primary bus of a bridge is claimed by two bridges whose windows
    /// are equally narrow or overlap without nesting.
    #[error("bridge {address}: primary bus {bus} is claimed by both {first} and {second}")]
    AmbiguousParent {
        address: PciAddress,
        bus: Bus,
        first: PciAddress,
        second: PciAddress,
    },
    /// Neither the host nor any bridge forwards the primary bus of a bridge.
    #[error("bridge {address}: no bridge forwards its primary bus {bus}")]
    NoUpstream { address: PciAddress, bus: Bus },
    /// Following parents from this bridge leads back to it.
    #[error("bridge {address}: bus numbers form a cycle")]
    Cycle { address: PciAddress },
    /// The bus of a device is claimed by two bridges whose windows are
    /// equally narrow or overlap without nesting.
    #[error("device {address}: bus is claimed by both {first} and {second}")]
    AmbiguousBus {
        address: PciAddress,
        first: PciAddress,
        second: PciAddress,
    },
    /// A bus wanted below one bridge already hangs below another.
    #[error(
        "{address}: bus {bus} already hangs below {}",
        .owner.map_or_else(|| "the host bridge".to_string(), |a| format!("bridge {a}"))
    )]
    BusTaken {
        /// The bridge or device asking for the bus.
        address: PciAddress,
        bus: Bus,
        /// Current owner, `None` for the host bridge.
        owner: Option<PciAddress>,
    },
    /// The bridge enclosing a device is not connected to a host.
    #[error("device {address}: bridge {bridge} is not connected to the host")]
    Detached {
        address: PciAddress,
        bridge: PciAddress,
    },
}
