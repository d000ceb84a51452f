// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Ties options, backends, the device registry and the config caches together.

use hardware::pci::address::PciAddress;
use hardware::pci::class::DeviceClass;
use hardware::pci::config::offset;
use hardware::pci::device::DeviceId;
use hardware::pci::header::HeaderType;
use hardware::pci::vendor::VendorId;
use tracing::{debug, error, info};

use crate::backend::{Backend, BackendError};
use crate::cache::{ConfigCache, FetchError};
use crate::dump::DumpBackend;
use crate::options::Options;
use crate::registry::{DeviceHandle, Devices};

/// Errors raised by a [`Session`].
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No registered backend wants to run with the current options.
    #[error("no configuration space access method is available")]
    NoBackend,
    /// `init_with` named a backend nobody registered.
    #[error("unknown access method {0:?}")]
    UnknownBackend(String),
    /// A backend is already active.
    #[error("session is already initialized")]
    AlreadyInitialized,
    /// Register access before `init`.
    #[error("session is not initialized")]
    NotInitialized,
    /// The handle does not name a registered device.
    #[error("no device {0}")]
    UnknownDevice(DeviceHandle),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// The identification registers of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceInfo {
    /// `None` when the vendor register reads back as all ones.
    pub vendor_id: Option<VendorId>,
    pub device_id: DeviceId,
    pub class: DeviceClass,
    /// `None` for header layouts we do not know.
    pub header_type: Option<HeaderType>,
    /// Raw header type register, multi-function bit included.
    pub header_type_raw: u8,
}

/// A configuration space access session.
///
/// Backends are registered as candidates; [`Session::init`] activates one of
/// them and lets it populate the device registry.
#[derive(Debug)]
pub struct Session {
    options: Options,
    candidates: Vec<Box<dyn Backend>>,
    active: Option<Box<dyn Backend>>,
    devices: Devices,
}

impl Default for Session {
    /// A session with every built-in backend registered.
    fn default() -> Self {
        Self::new().with_backend(DumpBackend::new())
    }
}

impl Session {
    /// A session with no backends registered.
    #[must_use]
    pub fn new() -> Self {
        Self {
            options: Options::new(),
            candidates: Vec::new(),
            active: None,
            devices: Devices::new(),
        }
    }

    /// Registers a candidate backend and lets it declare its options.
    #[must_use]
    pub fn with_backend<B: Backend + 'static>(mut self, backend: B) -> Self {
        self.register(Box::new(backend));
        self
    }

    /// Registers a candidate backend and lets it declare its options.
    pub fn register(&mut self, backend: Box<dyn Backend>) {
        debug!("registering access method {}", backend.name());
        backend.configure(&mut self.options);
        self.candidates.push(backend);
    }

    #[must_use]
    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut Options {
        &mut self.options
    }

    /// Names and help lines of the registered backends.
    pub fn backends(&self) -> impl Iterator<Item = (&'static str, &'static str)> {
        self.candidates
            .iter()
            .chain(self.active.iter())
            .map(|b| (b.name(), b.help()))
    }

    /// Name of the active backend.
    #[must_use]
    pub fn backend_name(&self) -> Option<&'static str> {
        self.active.as_ref().map(|b| b.name())
    }

    /// Activates the first candidate which detects itself as usable.
    ///
    /// # Errors
    ///
    /// [`SessionError::NoBackend`] if none does, or whatever the backend
    /// fails with while initializing or enumerating. On failure the devices
    /// the backend enumerated are dropped again; devices referenced through
    /// [`Session::device`] beforehand are kept.
    pub fn init(&mut self) -> Result<(), SessionError> {
        if self.active.is_some() {
            return Err(SessionError::AlreadyInitialized);
        }
        let Some(position) = self.candidates.iter().position(|b| b.detect(&self.options)) else {
            error!("no configuration space access method is available");
            return Err(SessionError::NoBackend);
        };
        self.activate(position)
    }

    /// Activates the candidate called `name`, whether it detects or not.
    ///
    /// # Errors
    ///
    /// [`SessionError::UnknownBackend`] if there is no such candidate, or
    /// whatever the backend fails with while initializing or enumerating.
    pub fn init_with(&mut self, name: &str) -> Result<(), SessionError> {
        if self.active.is_some() {
            return Err(SessionError::AlreadyInitialized);
        }
        let position = self
            .candidates
            .iter()
            .position(|b| b.name() == name)
            .ok_or_else(|| SessionError::UnknownBackend(name.to_string()))?;
        self.activate(position)
    }

    fn activate(&mut self, position: usize) -> Result<(), SessionError> {
        let mut backend = self.candidates.remove(position);
        let known = self.devices.len();
        info!("trying access method {}", backend.name());
        let result = backend
            .initialize(&self.options)
            .and_then(|()| backend.enumerate(&mut self.devices));
        match result {
            Ok(()) => {
                info!(
                    "access method {} found {} devices",
                    backend.name(),
                    self.devices.len()
                );
                self.active = Some(backend);
                Ok(())
            }
            Err(e) => {
                // devices referenced before init stay, enumerated ones go
                backend.cleanup();
                self.devices.truncate(known);
                self.candidates.insert(position, backend);
                Err(e.into())
            }
        }
    }

    #[must_use]
    pub fn devices(&self) -> &Devices {
        &self.devices
    }

    /// Handle of the device at `address`, registering it on first reference.
    pub fn device(&mut self, address: PciAddress) -> DeviceHandle {
        self.devices.get_or_insert(address)
    }

    /// Register access for one device.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotInitialized`] before [`Session::init`], and
    /// [`SessionError::UnknownDevice`] for handles the registry does not know.
    pub fn config(&mut self, handle: DeviceHandle) -> Result<ConfigAccess<'_>, SessionError> {
        let backend = self.active.as_deref_mut().ok_or(SessionError::NotInitialized)?;
        let device = self
            .devices
            .get_mut(handle)
            .ok_or(SessionError::UnknownDevice(handle))?;
        let address = device.address();
        Ok(ConfigAccess {
            address,
            cache: device.cache_mut(),
            backend,
        })
    }

    /// Reads the identification registers of a device.
    ///
    /// # Errors
    ///
    /// As [`Session::config`], plus [`SessionError::Fetch`] if the registers
    /// cannot be read.
    pub fn info(&mut self, handle: DeviceHandle) -> Result<DeviceInfo, SessionError> {
        let mut config = self.config(handle)?;
        let vendor = config.read_u16(offset::VENDOR_ID)?;
        let device_id = config.read_u16(offset::DEVICE_ID)?;
        let class = config.read_u16(offset::CLASS_DEVICE)?;
        let header_type_raw = config.read_u8(offset::HEADER_TYPE)?;
        Ok(DeviceInfo {
            vendor_id: VendorId::new(vendor).ok(),
            device_id: DeviceId::new(device_id),
            class: DeviceClass::new(class),
            header_type: HeaderType::decode(header_type_raw),
            header_type_raw,
        })
    }

    /// Releases every device and the active backend.
    ///
    /// The session can be initialized again afterwards.
    pub fn cleanup(&mut self) {
        if let Some(mut backend) = self.active.take() {
            for (_, device) in self.devices.iter() {
                backend.cleanup_device(device.address());
            }
            backend.cleanup();
            debug!("access method {} released", backend.name());
            self.candidates.push(backend);
        }
        self.devices.clear();
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.cleanup();
    }
}

/// Cached register access to one device through the active backend.
#[derive(Debug)]
pub struct ConfigAccess<'a> {
    address: PciAddress,
    cache: &'a mut ConfigCache,
    backend: &'a mut dyn Backend,
}

impl ConfigAccess<'_> {
    #[must_use]
    pub fn address(&self) -> PciAddress {
        self.address
    }

    /// Makes sure `[offset, offset + length)` is cached.
    ///
    /// # Errors
    ///
    /// See [`ConfigCache::fetch`].
    pub fn fetch(&mut self, offset: usize, length: usize) -> Result<(), FetchError> {
        let (address, backend) = (self.address, &mut *self.backend);
        self.cache
            .fetch(offset, length, |o, buf| backend.read_range(address, o, buf))
    }

    /// # Errors
    ///
    /// See [`ConfigCache::fetch`].
    pub fn read_u8(&mut self, offset: usize) -> Result<u8, FetchError> {
        let (address, backend) = (self.address, &mut *self.backend);
        self.cache
            .read_u8(offset, |o, buf| backend.read_range(address, o, buf))
    }

    /// # Errors
    ///
    /// See [`ConfigCache::fetch`].
    pub fn read_u16(&mut self, offset: usize) -> Result<u16, FetchError> {
        let (address, backend) = (self.address, &mut *self.backend);
        self.cache
            .read_u16(offset, |o, buf| backend.read_range(address, o, buf))
    }

    /// # Errors
    ///
    /// See [`ConfigCache::fetch`].
    pub fn read_u32(&mut self, offset: usize) -> Result<u32, FetchError> {
        let (address, backend) = (self.address, &mut *self.backend);
        self.cache
            .read_u32(offset, |o, buf| backend.read_range(address, o, buf))
    }

    /// Fetches the window and returns it.
    ///
    /// # Errors
    ///
    /// See [`ConfigCache::fetch`].
    pub fn bytes(&mut self, offset: usize, length: usize) -> Result<&[u8], FetchError> {
        self.fetch(offset, length)?;
        self.cache
            .bytes(offset, length)
            .ok_or(FetchError::Unavailable { offset, length })
    }

    /// Writes through to the backend and forgets the cached copy of the window.
    ///
    /// # Errors
    ///
    /// Whatever the backend refuses the write with.
    pub fn write(&mut self, offset: usize, data: &[u8]) -> Result<(), BackendError> {
        self.backend.write_range(self.address, offset, data)?;
        self.cache.invalidate(offset, data.len());
        Ok(())
    }

    /// Pulls in the standard header in one read: 64 bytes, or 128 for CardBus
    /// bridges.
    ///
    /// # Errors
    ///
    /// See [`ConfigCache::fetch`].
    pub fn prefetch_header(&mut self) -> Result<(), FetchError> {
        self.fetch(0, HeaderType::Normal.size())?;
        let raw = self.read_u8(offset::HEADER_TYPE)?;
        if let Some(header) = HeaderType::decode(raw) {
            self.fetch(0, header.size())?;
        }
        Ok(())
    }
}
