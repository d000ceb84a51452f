// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Builds a [`Topology`] out of device records.
//!
//! Bridges are placed by containment: a bridge hangs below the narrowest other
//! bridge of its domain whose downstream window holds its primary bus, or below
//! the host bridge if that bus is bus 0. Devices then go onto the bus node for
//! their own bus number, under the narrowest bridge enclosing that bus, or
//! under the host bridge when no bridge encloses it.
//!
//! Windows which hold the same bus without one nesting inside the other are
//! reported and settle nothing. Each bus number of a domain gets at most one
//! bus node.

use std::collections::BTreeSet;

use access::registry::DeviceHandle;
use hardware::pci::address::PciAddress;
use hardware::pci::bridge::{BridgeBuses, BridgeKind};
use hardware::pci::bus::Bus;
use hardware::pci::domain::Domain;
use tracing::{debug, warn};

use crate::node::{BridgeId, BridgeNode, BusId, BusNode};
use crate::tree::Topology;
use crate::warning::TopologyWarning;

/// What the builder needs to know about one registered device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceRecord {
    pub handle: DeviceHandle,
    pub address: PciAddress,
    /// Set for bridge devices.
    pub bridge: Option<(BridgeKind, BridgeBuses)>,
}

/// Outcome of looking for the narrowest bridge enclosing a bus.
enum Enclosing {
    /// No real bridge encloses the bus.
    Host,
    Bridge(BridgeId),
    /// The narrowest window and a rival it does not nest in.
    Overlap(BridgeId, BridgeId),
}

/// Collects device records, in registry order, and builds the topology.
#[derive(Debug, Default)]
pub struct TopologyBuilder {
    records: Vec<DeviceRecord>,
}

impl TopologyBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the next device in registry order.
    pub fn add(&mut self, record: DeviceRecord) -> &mut Self {
        self.records.push(record);
        self
    }

    #[must_use]
    pub fn build(&self) -> Topology {
        let mut topology = Topology::default();
        topology.create_hosts(&self.records);
        topology.create_bridges(&self.records);
        topology.link_bridges();
        topology.place_devices(&self.records);
        topology
    }
}

impl Topology {
    fn warn(&mut self, warning: TopologyWarning) {
        warn!("{warning}");
        self.warnings.push(warning);
    }

    fn create_hosts(&mut self, records: &[DeviceRecord]) {
        let domains: BTreeSet<Domain> = records.iter().map(|r| r.address.domain).collect();
        for domain in domains {
            let id = BridgeId(self.bridges.len());
            self.bridges.push(BridgeNode::host(domain));
            self.hosts.insert(domain, id);
        }
    }

    fn create_bridges(&mut self, records: &[DeviceRecord]) {
        for record in records {
            let Some((kind, numbers)) = record.bridge else {
                continue;
            };
            debug!("bridge {}: {numbers}", record.address);
            let id = BridgeId(self.bridges.len());
            self.bridges
                .push(BridgeNode::device(record.handle, record.address, kind, numbers));
            self.device_bridge.insert(record.handle, id);
            if !numbers.is_valid() {
                self.warn(TopologyWarning::InvertedRange {
                    address: record.address,
                    numbers,
                });
            }
        }
    }

    /// Narrowest real bridge of `domain` whose window holds `bus`, ignoring `skip`.
    ///
    /// Every other window holding `bus` must strictly contain the narrowest one.
    fn enclosing(&self, domain: Domain, bus: Bus, skip: Option<BridgeId>) -> Enclosing {
        let candidates: Vec<(BridgeId, BridgeBuses, u8)> = self
            .chain()
            .filter(|(id, bridge)| {
                !bridge.is_host()
                    && bridge.domain == domain
                    && Some(*id) != skip
                    && bridge.numbers.contains(bus)
            })
            .filter_map(|(id, bridge)| bridge.numbers.span().map(|span| (id, bridge.numbers, span)))
            .collect();
        let Some(&(best, window, narrowest)) = candidates.iter().min_by_key(|(.., span)| *span)
        else {
            return Enclosing::Host;
        };
        let rival = candidates.iter().find(|(id, numbers, span)| {
            *id != best
                && (*span == narrowest
                    || !numbers.contains(window.secondary)
                    || !numbers.contains(window.subordinate))
        });
        match rival {
            Some(&(other, ..)) => Enclosing::Overlap(best, other),
            None => Enclosing::Bridge(best),
        }
    }

    fn address_of(&self, id: BridgeId) -> PciAddress {
        self.bridges[id.0].address().unwrap_or_default()
    }

    fn link_bridges(&mut self) {
        let real: Vec<BridgeId> = self
            .chain()
            .filter(|(_, bridge)| !bridge.is_host())
            .map(|(id, _)| id)
            .collect();

        for &id in &real {
            let bridge = &self.bridges[id.0];
            let (domain, primary) = (bridge.domain, bridge.numbers.primary);
            let parent = match self.enclosing(domain, primary, Some(id)) {
                Enclosing::Host => {
                    let host = self
                        .host(domain)
                        .filter(|host| self.bridges[host.0].numbers.contains(primary));
                    if host.is_none() {
                        let warning = TopologyWarning::NoUpstream {
                            address: self.address_of(id),
                            bus: primary,
                        };
                        self.warn(warning);
                    }
                    host
                }
                Enclosing::Bridge(parent) => Some(parent),
                Enclosing::Overlap(first, second) => {
                    let warning = TopologyWarning::AmbiguousParent {
                        address: self.address_of(id),
                        bus: primary,
                        first: self.address_of(first),
                        second: self.address_of(second),
                    };
                    self.warn(warning);
                    None
                }
            };
            self.bridges[id.0].parent = parent;
        }

        let looped: Vec<BridgeId> = real
            .iter()
            .copied()
            .filter(|&id| self.loops_back(id))
            .collect();
        for id in looped {
            let warning = TopologyWarning::Cycle {
                address: self.address_of(id),
            };
            self.warn(warning);
            self.bridges[id.0].parent = None;
        }

        for id in real {
            if let Some(parent) = self.bridges[id.0].parent {
                self.bridges[parent.0].children.push(id);
            }
        }

        for id in self.hosts.values().copied().collect::<Vec<_>>() {
            for below in self.subtree(id).collect::<Vec<_>>() {
                let bridge = &self.bridges[below.0];
                if !bridge.is_host() && bridge.numbers.is_valid() {
                    let (domain, secondary) = (bridge.domain, bridge.numbers.secondary);
                    if let Err(owner) = self.bus_below(below, domain, secondary) {
                        let warning = self.bus_taken(self.address_of(below), secondary, owner);
                        self.warn(warning);
                    }
                }
            }
        }
    }

    /// Returns true if walking up from `id` comes back to `id`.
    fn loops_back(&self, id: BridgeId) -> bool {
        let mut current = self.bridges[id.0].parent;
        for _ in 0..self.bridges.len() {
            match current {
                Some(next) if next == id => return true,
                Some(next) => current = self.bridges[next.0].parent,
                None => return false,
            }
        }
        // stuck in a cycle which does not include `id`
        false
    }

    /// The bus node numbered `number` below `bridge`, created on first use.
    ///
    /// Fails with the owning bridge if the bus already hangs below another one.
    fn bus_below(
        &mut self,
        bridge: BridgeId,
        domain: Domain,
        number: Bus,
    ) -> Result<BusId, BridgeId> {
        if let Some(bus) = self.find_bus(domain, number) {
            let owner = self.buses[bus.0].bridge;
            return if owner == bridge { Ok(bus) } else { Err(owner) };
        }
        let id = BusId(self.buses.len());
        self.buses.push(BusNode {
            domain,
            number,
            bridge,
            devices: Vec::new(),
        });
        self.bridges[bridge.0].buses.push(id);
        Ok(id)
    }

    fn bus_taken(&self, address: PciAddress, bus: Bus, owner: BridgeId) -> TopologyWarning {
        TopologyWarning::BusTaken {
            address,
            bus,
            owner: self.bridges[owner.0].address(),
        }
    }

    fn place_devices(&mut self, records: &[DeviceRecord]) {
        for record in records {
            let address = record.address;
            let own = self.bridge_of(record.handle);
            let bridge = match self.enclosing(address.domain, address.bus, own) {
                Enclosing::Host => match self.host(address.domain) {
                    Some(host) => host,
                    None => continue,
                },
                Enclosing::Bridge(id) => id,
                Enclosing::Overlap(first, second) => {
                    let warning = TopologyWarning::AmbiguousBus {
                        address,
                        first: self.address_of(first),
                        second: self.address_of(second),
                    };
                    self.warn(warning);
                    continue;
                }
            };
            if !self.is_attached(bridge) {
                let warning = TopologyWarning::Detached {
                    address,
                    bridge: self.address_of(bridge),
                };
                self.warn(warning);
                continue;
            }
            let bus = match self.bus_below(bridge, address.domain, address.bus) {
                Ok(bus) => bus,
                Err(owner) => {
                    let warning = self.bus_taken(address, address.bus, owner);
                    self.warn(warning);
                    continue;
                }
            };
            self.buses[bus.0].devices.push(record.handle);
            self.device_bus.insert(record.handle, bus);
        }
    }
}
