// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The list of known devices.

use hardware::pci::address::PciAddress;
use ordermap::OrderMap;
use ordermap::map::Entry;
use tracing::debug;

use crate::cache::ConfigCache;

/// Stable reference to a registered device.
///
/// Handles index the registry in insertion order and stay valid until the
/// registry is cleared.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct DeviceHandle(usize);

impl DeviceHandle {
    /// Position of the device in the registry.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for DeviceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A registered device and its configuration space cache.
#[derive(Debug)]
pub struct Device {
    address: PciAddress,
    cache: ConfigCache,
}

impl Device {
    fn new(address: PciAddress) -> Self {
        Self {
            address,
            cache: ConfigCache::new(),
        }
    }

    /// Address of the device.
    #[must_use]
    pub fn address(&self) -> PciAddress {
        self.address
    }

    /// The device's config cache.
    #[must_use]
    pub fn cache(&self) -> &ConfigCache {
        &self.cache
    }

    /// Mutable access to the device's config cache.
    pub fn cache_mut(&mut self) -> &mut ConfigCache {
        &mut self.cache
    }
}

/// Insertion ordered device registry with lookup by address.
#[derive(Debug, Default)]
pub struct Devices {
    devices: OrderMap<PciAddress, Device>,
}

impl Devices {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the handle for `address`, appending a new device if there is none.
    pub fn get_or_insert(&mut self, address: PciAddress) -> DeviceHandle {
        match self.devices.entry(address) {
            Entry::Occupied(entry) => DeviceHandle(entry.index()),
            Entry::Vacant(entry) => {
                let handle = DeviceHandle(entry.index());
                debug!("new device {address} ({handle})");
                entry.insert(Device::new(address));
                handle
            }
        }
    }

    /// Looks a device up by address.
    #[must_use]
    pub fn find(&self, address: PciAddress) -> Option<DeviceHandle> {
        self.devices.get_index_of(&address).map(DeviceHandle)
    }

    #[must_use]
    pub fn get(&self, handle: DeviceHandle) -> Option<&Device> {
        self.devices.get_index(handle.0).map(|(_, device)| device)
    }

    pub fn get_mut(&mut self, handle: DeviceHandle) -> Option<&mut Device> {
        self.devices.get_index_mut(handle.0).map(|(_, device)| device)
    }

    /// Devices in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (DeviceHandle, &Device)> {
        self.devices
            .values()
            .enumerate()
            .map(|(i, device)| (DeviceHandle(i), device))
    }

    /// Handles in registration order.
    pub fn handles(&self) -> impl Iterator<Item = DeviceHandle> + use<> {
        (0..self.devices.len()).map(DeviceHandle)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Forgets every device registered after the first `len`.
    ///
    /// Handles below `len` stay valid.
    pub fn truncate(&mut self, len: usize) {
        self.devices.truncate(len);
    }

    /// Forgets every device. Previously issued handles become dangling.
    pub fn clear(&mut self) {
        self.devices.clear();
    }
}

#[cfg(test)]
mod test {
    use hardware::pci::address::PciAddress;
    use pretty_assertions::assert_eq;

    use crate::registry::Devices;

    fn addr(text: &str) -> PciAddress {
        PciAddress::try_from(text).unwrap()
    }

    #[test]
    fn insertion_order_is_kept() {
        let mut devices = Devices::new();
        let b = devices.get_or_insert(addr("01:00.0"));
        let a = devices.get_or_insert(addr("00:00.0"));
        assert_eq!(devices.get_or_insert(addr("01:00.0")), b);
        assert_eq!(devices.len(), 2);
        let order: Vec<_> = devices.iter().map(|(_, d)| d.address().to_string()).collect();
        assert_eq!(order, vec!["0000:01:00.0", "0000:00:00.0"]);
        assert_eq!(devices.handles().collect::<Vec<_>>(), vec![b, a]);
        assert_eq!(devices.find(addr("0000:00:00.0")), Some(a));
        assert_eq!(devices.find(addr("00:00.1")), None);
    }

    #[test]
    fn clear_forgets_everything() {
        let mut devices = Devices::new();
        let handle = devices.get_or_insert(addr("00:1f.3"));
        devices.clear();
        assert!(devices.is_empty());
        assert!(devices.get(handle).is_none());
        assert_eq!(devices.find(addr("00:1f.3")), None);
    }

    #[test]
    fn truncate_keeps_earlier_handles() {
        let mut devices = Devices::new();
        let kept = devices.get_or_insert(addr("00:1f.3"));
        devices.get_or_insert(addr("00:1f.4"));
        devices.truncate(1);
        assert_eq!(devices.len(), 1);
        assert_eq!(devices.find(addr("00:1f.3")), Some(kept));
        assert_eq!(devices.find(addr("00:1f.4")), None);
        assert_eq!(devices.get(kept).unwrap().address(), addr("00:1f.3"));
    }
}
