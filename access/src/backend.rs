// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The capability set every configuration space acquisition method provides.
//!
//! A session holds a list of candidate backends and activates exactly one of
//! them. Everything above this trait (the registry, the config cache, the
//! topology builder) is oblivious to where register bytes actually come from.

use std::path::PathBuf;

use hardware::pci::address::PciAddress;

use crate::dump::DumpError;
use crate::options::Options;
use crate::registry::Devices;

/// Errors which make a backend unusable for the rest of the session.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// A required option was left empty.
    #[error("{backend}: option {option} must be set")]
    MissingOption {
        /// Backend name.
        backend: &'static str,
        /// Option name.
        option: &'static str,
    },
    /// The data source could not be opened.
    #[error("cannot open {}: {source}", .path.display())]
    Open {
        /// What we tried to open.
        path: PathBuf,
        /// Underlying failure.
        source: std::io::Error,
    },
    /// A register dump was rejected.
    #[error(transparent)]
    Parse(#[from] DumpError),
    /// Writes are not supported.
    #[error("{backend}: writing to config space is not supported")]
    ReadOnly {
        /// Backend name.
        backend: &'static str,
    },
    /// Any other I/O failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A read the backend could not satisfy.
///
/// These are not fatal: the config cache records the affected bytes as
/// unavailable and carries on.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReadError {
    /// The backend holds no data for this address.
    #[error("no register data for {0}")]
    NoDevice(PciAddress),
    /// The requested window reaches past the data the backend holds.
    #[error("{address}: cannot read {length} bytes at {offset:#x} (only {valid:#x} available)")]
    OutOfRange {
        /// Device address.
        address: PciAddress,
        /// Start of the requested window.
        offset: usize,
        /// Length of the requested window.
        length: usize,
        /// Bytes the backend actually has.
        valid: usize,
    },
}

/// A way of getting at configuration space.
///
/// Implementations must make `read_range` all-or-nothing: either the whole
/// buffer is filled and `Ok` returned, or the buffer is left untouched.
pub trait Backend: std::fmt::Debug {
    /// Short name used for explicit selection.
    fn name(&self) -> &'static str;

    /// One line description for help listings.
    fn help(&self) -> &'static str;

    /// Declares the options this backend understands. Must not do any I/O.
    fn configure(&self, options: &mut Options);

    /// Decides from the options alone whether this backend should be used.
    fn detect(&self, options: &Options) -> bool;

    /// One-time setup after selection.
    ///
    /// # Errors
    ///
    /// Any [`BackendError`]; the session cannot continue without its backend.
    fn initialize(&mut self, options: &Options) -> Result<(), BackendError>;

    /// Registers the devices this backend knows about.
    ///
    /// # Errors
    ///
    /// Any [`BackendError`].
    fn enumerate(&mut self, devices: &mut Devices) -> Result<(), BackendError>;

    /// Fills `buf` with the registers of `address` starting at `offset`.
    ///
    /// # Errors
    ///
    /// [`ReadError`] if the window cannot be read in full.
    fn read_range(
        &mut self,
        address: PciAddress,
        offset: usize,
        buf: &mut [u8],
    ) -> Result<(), ReadError>;

    /// Writes `data` to the registers of `address` starting at `offset`.
    ///
    /// # Errors
    ///
    /// [`BackendError::ReadOnly`] for backends without write support.
    fn write_range(
        &mut self,
        address: PciAddress,
        offset: usize,
        data: &[u8],
    ) -> Result<(), BackendError>;

    /// Releases everything the backend holds. Must be idempotent.
    fn cleanup(&mut self);

    /// Releases whatever the backend holds for one device. Must be idempotent.
    fn cleanup_device(&mut self, address: PciAddress);
}
