// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use std::collections::{BTreeMap, HashMap};

use access::registry::DeviceHandle;
use hardware::pci::bus::Bus;
use hardware::pci::domain::Domain;

use crate::node::{BridgeId, BridgeNode, BusId, BusNode};
use crate::warning::TopologyWarning;

/// The bridge and bus hierarchy of every domain seen.
///
/// Built by [`crate::builder::TopologyBuilder`] or [`Topology::scan`].
#[derive(Debug, Default, Clone)]
pub struct Topology {
    pub(crate) bridges: Vec<BridgeNode>,
    pub(crate) buses: Vec<BusNode>,
    pub(crate) hosts: BTreeMap<Domain, BridgeId>,
    pub(crate) device_bus: HashMap<DeviceHandle, BusId>,
    pub(crate) device_bridge: HashMap<DeviceHandle, BridgeId>,
    pub(crate) warnings: Vec<TopologyWarning>,
}

impl Topology {
    /// Host bridges by domain, in domain order.
    pub fn hosts(&self) -> impl Iterator<Item = (Domain, BridgeId)> {
        self.hosts.iter().map(|(domain, id)| (*domain, *id))
    }

    /// Host bridge of a domain.
    #[must_use]
    pub fn host(&self, domain: Domain) -> Option<BridgeId> {
        self.hosts.get(&domain).copied()
    }

    #[must_use]
    pub fn bridge(&self, id: BridgeId) -> Option<&BridgeNode> {
        self.bridges.get(id.0)
    }

    #[must_use]
    pub fn bus(&self, id: BusId) -> Option<&BusNode> {
        self.buses.get(id.0)
    }

    /// Every bridge, attached or not: hosts first, then in registry order.
    pub fn chain(&self) -> impl Iterator<Item = (BridgeId, &BridgeNode)> {
        self.bridges
            .iter()
            .enumerate()
            .map(|(i, bridge)| (BridgeId(i), bridge))
    }

    /// Every bus node, in order of creation.
    pub fn buses(&self) -> impl Iterator<Item = (BusId, &BusNode)> {
        self.buses
            .iter()
            .enumerate()
            .map(|(i, bus)| (BusId(i), bus))
    }

    /// `root` and every bridge below it, depth first.
    pub fn subtree(&self, root: BridgeId) -> impl Iterator<Item = BridgeId> + use<> {
        let mut order = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let Some(bridge) = self.bridge(id) else {
                continue;
            };
            order.push(id);
            stack.extend(bridge.children().iter().rev());
        }
        order.into_iter()
    }

    /// Bus the device sits on, unless it was left out of the tree.
    #[must_use]
    pub fn parent_bus(&self, device: DeviceHandle) -> Option<BusId> {
        self.device_bus.get(&device).copied()
    }

    /// Bridge node of a bridge device.
    #[must_use]
    pub fn bridge_of(&self, device: DeviceHandle) -> Option<BridgeId> {
        self.device_bridge.get(&device).copied()
    }

    /// The bus node for `number` in `domain`, if anything attached to it.
    #[must_use]
    pub fn find_bus(&self, domain: Domain, number: Bus) -> Option<BusId> {
        self.buses()
            .find(|(_, bus)| bus.domain == domain && bus.number == number)
            .map(|(id, _)| id)
    }

    /// Returns true if following parents from `id` ends at a host bridge.
    #[must_use]
    pub fn is_attached(&self, id: BridgeId) -> bool {
        self.bridge(id)
            .is_some_and(|bridge| self.host(bridge.domain) == Some(self.root_of(id)))
    }

    fn root_of(&self, mut id: BridgeId) -> BridgeId {
        // cycles were broken while building, so this terminates
        while let Some(parent) = self.bridge(id).and_then(BridgeNode::parent) {
            id = parent;
        }
        id
    }

    /// Inconsistencies met while building, in the order found.
    #[must_use]
    pub fn warnings(&self) -> &[TopologyWarning] {
        &self.warnings
    }
}
