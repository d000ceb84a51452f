// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Building a topology straight from an access session.

use access::registry::DeviceHandle;
use access::session::{Session, SessionError};
use hardware::pci::bridge::{BridgeBuses, BridgeKind};
use hardware::pci::bus::Bus;
use hardware::pci::class::DeviceClass;
use hardware::pci::config::offset;
use hardware::pci::header::HeaderType;
use tracing::debug;

use crate::builder::{DeviceRecord, TopologyBuilder};
use crate::tree::Topology;

/// Reads the bus number registers of a device, if it is a bridge.
fn bridge_registers(
    session: &mut Session,
    handle: DeviceHandle,
) -> Result<Option<(BridgeKind, BridgeBuses)>, SessionError> {
    let mut config = session.config(handle)?;
    if !DeviceClass::new(config.read_u16(offset::CLASS_DEVICE)?).is_bridge() {
        return Ok(None);
    }
    let Some(header) = HeaderType::decode(config.read_u8(offset::HEADER_TYPE)?) else {
        return Ok(None);
    };
    let (Some(kind), Some((primary, secondary, subordinate))) =
        (BridgeKind::from_header(header), header.bus_registers())
    else {
        return Ok(None);
    };
    Ok(Some((
        kind,
        BridgeBuses::new(
            Bus::new(config.read_u8(primary)?),
            Bus::new(config.read_u8(secondary)?),
            Bus::new(config.read_u8(subordinate)?),
        ),
    )))
}

impl Topology {
    /// Builds the topology of every device registered in `session`.
    ///
    /// Devices whose bridge registers cannot be read are taken for plain
    /// devices.
    pub fn scan(session: &mut Session) -> Topology {
        let mut builder = TopologyBuilder::new();
        let handles: Vec<DeviceHandle> = session.devices().handles().collect();
        for handle in handles {
            let Some(address) = session.devices().get(handle).map(|d| d.address()) else {
                continue;
            };
            let bridge = bridge_registers(session, handle).unwrap_or_else(|e| {
                debug!("{address}: not treated as a bridge: {e}");
                None
            });
            builder.add(DeviceRecord {
                handle,
                address,
                bridge,
            });
        }
        builder.build()
    }
}
