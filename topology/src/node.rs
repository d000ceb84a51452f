// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Bridge and bus records.
//!
//! Both live in arenas owned by [`crate::Topology`]. The tree structure is
//! expressed with ids, and the order of the bridge arena is the chain of all
//! bridges: the synthetic hosts first, then real bridges in registry order.

use access::registry::DeviceHandle;
use hardware::pci::address::PciAddress;
use hardware::pci::bridge::{BridgeBuses, BridgeKind};
use hardware::pci::bus::Bus;
use hardware::pci::domain::Domain;

/// Index of a bridge in its topology.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct BridgeId(pub(crate) usize);

/// Index of a bus in its topology.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct BusId(pub(crate) usize);

/// A host bridge or a bridge device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeNode {
    pub(crate) domain: Domain,
    pub(crate) kind: BridgeKind,
    pub(crate) numbers: BridgeBuses,
    pub(crate) device: Option<(DeviceHandle, PciAddress)>,
    pub(crate) parent: Option<BridgeId>,
    pub(crate) children: Vec<BridgeId>,
    pub(crate) buses: Vec<BusId>,
}

impl BridgeNode {
    pub(crate) fn host(domain: Domain) -> Self {
        Self {
            domain,
            kind: BridgeKind::Host,
            numbers: BridgeBuses::HOST,
            device: None,
            parent: None,
            children: Vec::new(),
            buses: Vec::new(),
        }
    }

    pub(crate) fn device(
        handle: DeviceHandle,
        address: PciAddress,
        kind: BridgeKind,
        numbers: BridgeBuses,
    ) -> Self {
        Self {
            domain: address.domain,
            kind,
            numbers,
            device: Some((handle, address)),
            parent: None,
            children: Vec::new(),
            buses: Vec::new(),
        }
    }

    #[must_use]
    pub fn domain(&self) -> Domain {
        self.domain
    }

    #[must_use]
    pub fn kind(&self) -> BridgeKind {
        self.kind
    }

    /// Primary, secondary and subordinate bus numbers.
    #[must_use]
    pub fn numbers(&self) -> BridgeBuses {
        self.numbers
    }

    /// The device implementing this bridge; `None` for a host bridge.
    #[must_use]
    pub fn handle(&self) -> Option<DeviceHandle> {
        self.device.map(|(handle, _)| handle)
    }

    /// Address of the device implementing this bridge.
    #[must_use]
    pub fn address(&self) -> Option<PciAddress> {
        self.device.map(|(_, address)| address)
    }

    #[must_use]
    pub fn is_host(&self) -> bool {
        self.device.is_none()
    }

    /// Bridge this one hangs off, `None` for hosts and detached bridges.
    #[must_use]
    pub fn parent(&self) -> Option<BridgeId> {
        self.parent
    }

    /// Bridges directly below, in chain order.
    #[must_use]
    pub fn children(&self) -> &[BridgeId] {
        &self.children
    }

    /// Buses directly below, in order of creation.
    #[must_use]
    pub fn buses(&self) -> &[BusId] {
        &self.buses
    }
}

impl std::fmt::Display for BridgeNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.device {
            Some((_, address)) => write!(f, "{address}: {}", self.numbers),
            None => write!(f, "{} host: {}", self.domain, self.numbers),
        }
    }
}

/// One bus number below a bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusNode {
    pub(crate) domain: Domain,
    pub(crate) number: Bus,
    pub(crate) bridge: BridgeId,
    pub(crate) devices: Vec<DeviceHandle>,
}

impl BusNode {
    #[must_use]
    pub fn domain(&self) -> Domain {
        self.domain
    }

    #[must_use]
    pub fn number(&self) -> Bus {
        self.number
    }

    /// Bridge the bus sits below.
    #[must_use]
    pub fn bridge(&self) -> BridgeId {
        self.bridge
    }

    /// Devices on the bus, in registry order.
    #[must_use]
    pub fn devices(&self) -> &[DeviceHandle] {
        &self.devices
    }
}
