// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! PCI device addressing.
//!
//! A function is addressed by its domain, bus, device and function numbers,
//! written `domain:bus:device.function` (e.g. `0000:03:00.0`). The short form
//! `bus:device.function` (e.g. `00:1f.3`) implies domain `0000`.
//!
//! # Examples
//!
//! ```
//! use pcitree_hardware::pci::address::PciAddress;
//!
//! let addr = PciAddress::try_from("00:1f.3").unwrap();
//! assert_eq!(addr.to_string(), "0000:00:1f.3");
//!
//! let wide = PciAddress::try_from("10000:e1:00.0").unwrap();
//! assert_eq!(wide.domain.value(), 0x10000);
//! ```

use crate::pci::{
    bus::{Bus, BusParseError},
    device::{Device, DeviceParseError},
    domain::{Domain, PciDomainParseError},
    function::{Function, FunctionParseError},
};

/// A PCI function address.
///
/// Ordering follows (domain, bus, device, function), which is also the order
/// functions appear in when a bus is walked.
///
/// ```
/// use pcitree_hardware::pci::address::PciAddress;
/// use pcitree_hardware::pci::{bus::Bus, device::Device, domain::Domain, function::Function};
///
/// let addr = PciAddress::new(
///     Domain::new(1),
///     Bus::new(2),
///     Device::try_from(3).unwrap(),
///     Function::try_from(4).unwrap(),
/// );
/// assert_eq!(addr, PciAddress::try_from("0001:02:03.4").unwrap());
/// ```
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
    rkyv::Archive,
    rkyv::Deserialize,
    rkyv::Serialize,
)]
#[cfg_attr(
    any(test, feature = "serde"),
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "String", into = "String")
)]
pub struct PciAddress {
    /// PCI domain (segment group) number.
    pub domain: Domain,
    /// PCI bus number.
    pub bus: Bus,
    /// Device number on the bus.
    pub device: Device,
    /// Function number within the device.
    pub function: Function,
}

impl PciAddress {
    /// Creates a new PCI address from its components.
    #[must_use]
    pub fn new(domain: Domain, bus: Bus, device: Device, function: Function) -> Self {
        Self {
            domain,
            bus,
            device,
            function,
        }
    }
}

impl std::fmt::Display for PciAddress {
    /// Formats the address as `DDDD:BB:DD.F`.
    ///
    /// Domains wider than 16 bits print all of their digits.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}:{}.{}",
            self.domain, self.bus, self.device, self.function
        )
    }
}

/// Errors that can occur when parsing a PCI address.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidPciAddress {
    /// The overall shape is wrong.
    #[error("invalid PCI address syntax (expected [domain:]bus:device.function): {0:?}")]
    Syntax(String),
    /// Invalid domain component.
    #[error(transparent)]
    Domain(PciDomainParseError),
    /// Invalid bus component.
    #[error(transparent)]
    Bus(BusParseError),
    /// Invalid device component.
    #[error(transparent)]
    Device(DeviceParseError),
    /// Invalid function component.
    #[error(transparent)]
    Function(FunctionParseError),
}

impl TryFrom<&str> for PciAddress {
    type Error = InvalidPciAddress;

    /// Parses `[domain:]bus:device.function`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidPciAddress::Syntax`] if the separators are wrong, or the
    /// component specific variant if a component is malformed or out of range.
    ///
    /// ```
    /// use pcitree_hardware::pci::address::{InvalidPciAddress, PciAddress};
    ///
    /// assert!(PciAddress::try_from("0000:00:00.0").is_ok());
    /// assert!(matches!(PciAddress::try_from("00:00"), Err(InvalidPciAddress::Syntax(_))));
    /// assert!(matches!(PciAddress::try_from("00:20.0"), Err(InvalidPciAddress::Device(_))));
    /// assert!(matches!(PciAddress::try_from("00:00.8"), Err(InvalidPciAddress::Function(_))));
    /// ```
    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let syntax = || InvalidPciAddress::Syntax(value.to_string());
        if !value.is_ascii() {
            return Err(syntax());
        }
        let (slot, function_str) = value.rsplit_once('.').ok_or_else(syntax)?;
        let mut parts = slot.rsplit(':');
        let device_str = parts.next().ok_or_else(syntax)?;
        let bus_str = parts.next().ok_or_else(syntax)?;
        let domain = match parts.next() {
            None => Domain::ZERO,
            Some(domain_str) => Domain::try_from(domain_str).map_err(InvalidPciAddress::Domain)?,
        };
        if parts.next().is_some() {
            return Err(syntax());
        }
        Ok(Self {
            domain,
            bus: Bus::try_from(bus_str).map_err(InvalidPciAddress::Bus)?,
            device: Device::try_from(device_str).map_err(InvalidPciAddress::Device)?,
            function: Function::try_from(function_str).map_err(InvalidPciAddress::Function)?,
        })
    }
}

impl TryFrom<String> for PciAddress {
    type Error = InvalidPciAddress;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_from(value.as_str())
    }
}

impl std::str::FromStr for PciAddress {
    type Err = InvalidPciAddress;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(s)
    }
}

impl From<PciAddress> for String {
    fn from(value: PciAddress) -> String {
        value.to_string()
    }
}

#[cfg(any(test, feature = "bolero"))]
mod contract {
    use bolero::{Driver, TypeGenerator};

    use crate::pci::address::PciAddress;

    impl TypeGenerator for PciAddress {
        fn generate<D: Driver>(driver: &mut D) -> Option<Self> {
            Some(PciAddress {
                domain: driver.produce()?,
                bus: driver.produce()?,
                device: driver.produce()?,
                function: driver.produce()?,
            })
        }
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use crate::pci::address::{InvalidPciAddress, PciAddress};
    use crate::pci::domain::Domain;

    #[test]
    fn display_parses_back() {
        bolero::check!().with_type().for_each(|addr: &PciAddress| {
            let printed = addr.to_string();
            assert_eq!(PciAddress::try_from(printed.as_str()).unwrap(), *addr);
        });
    }

    #[test]
    fn short_form_implies_domain_zero() {
        let addr = PciAddress::try_from("3a:1f.7").unwrap();
        assert_eq!(addr.domain, Domain::ZERO);
        assert_eq!(addr.bus.value(), 0x3a);
        assert_eq!(addr.device.value(), 0x1f);
        assert_eq!(addr.function.value(), 7);
    }

    #[test]
    fn arbitrary_text_never_panics() {
        bolero::check!().with_type().for_each(|text: &String| {
            if let Ok(addr) = PciAddress::try_from(text.as_str()) {
                // anything accepted must at least survive a second trip
                assert_eq!(PciAddress::try_from(addr.to_string()).unwrap(), addr);
            }
        });
    }

    #[test]
    fn extra_components_are_rejected() {
        match PciAddress::try_from("0:0000:00:00.0") {
            Err(InvalidPciAddress::Syntax(_)) => {}
            e => unreachable!("expected a syntax error, got {e:?}"),
        }
        match PciAddress::try_from("00:00.0.0") {
            Err(InvalidPciAddress::Device(_)) => {}
            e => unreachable!("expected a device error, got {e:?}"),
        }
    }

    #[test]
    fn serde_uses_string_form() {
        let addr = PciAddress::try_from("0001:02:03.4").unwrap();
        let yaml = serde_yaml_ng::to_string(&addr).unwrap();
        assert!(yaml.contains("0001:02:03.4"));
        let parsed: PciAddress = serde_yaml_ng::from_str(&yaml).unwrap();
        assert_eq!(parsed, addr);
    }
}
