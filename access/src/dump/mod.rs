// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Backend replaying register dumps.
//!
//! The whole dump is parsed during [`Backend::initialize`]; reads are then
//! served from memory. Writes are refused.

mod image;
mod parse;

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use hardware::pci::address::PciAddress;
use tracing::{debug, error, info};

pub use image::{OffsetTooLarge, RegisterImage, UNWRITTEN};
pub use parse::{DumpCapture, DumpError};

use crate::backend::{Backend, BackendError, ReadError};
use crate::options::Options;
use crate::registry::Devices;

/// Option naming the dump file.
pub const DUMP_NAME: &str = "dump.name";

const NAME: &str = "dump";

/// Serves configuration space out of a parsed dump file.
#[derive(Debug, Default)]
pub struct DumpBackend {
    capture: DumpCapture,
}

impl DumpBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend over an already parsed capture, skipping the file.
    #[must_use]
    pub fn from_capture(capture: DumpCapture) -> Self {
        Self { capture }
    }

    /// The register images currently held.
    #[must_use]
    pub fn capture(&self) -> &DumpCapture {
        &self.capture
    }
}

impl Backend for DumpBackend {
    fn name(&self) -> &'static str {
        NAME
    }

    fn help(&self) -> &'static str {
        "Reading of register dumps (set the `dump.name' parameter)"
    }

    fn configure(&self, options: &mut Options) {
        options.define(DUMP_NAME, "", "Name of the bus dump file to read from");
    }

    fn detect(&self, options: &Options) -> bool {
        options.get(DUMP_NAME).is_some_and(|name| !name.is_empty())
    }

    fn initialize(&mut self, options: &Options) -> Result<(), BackendError> {
        let path = match options.get(DUMP_NAME) {
            Some(name) if !name.is_empty() => PathBuf::from(name),
            _ => {
                error!("dump: file name not given");
                return Err(BackendError::MissingOption {
                    backend: NAME,
                    option: DUMP_NAME,
                });
            }
        };
        let file = File::open(&path).map_err(|source| {
            error!("dump: cannot open {}: {source}", path.display());
            BackendError::Open {
                path: path.clone(),
                source,
            }
        })?;
        let capture = DumpCapture::parse(BufReader::new(file)).inspect_err(|e| error!("{e}"))?;
        info!(
            "dump: read {} devices from {}",
            capture.len(),
            path.display()
        );
        self.capture = capture;
        Ok(())
    }

    fn enumerate(&mut self, devices: &mut Devices) -> Result<(), BackendError> {
        for address in self.capture.addresses() {
            devices.get_or_insert(address);
        }
        Ok(())
    }

    fn read_range(
        &mut self,
        address: PciAddress,
        offset: usize,
        buf: &mut [u8],
    ) -> Result<(), ReadError> {
        let image = self
            .capture
            .get(&address)
            .ok_or(ReadError::NoDevice(address))?;
        if image.read(offset, buf) {
            Ok(())
        } else {
            Err(ReadError::OutOfRange {
                address,
                offset,
                length: buf.len(),
                valid: image.valid_length(),
            })
        }
    }

    fn write_range(
        &mut self,
        address: PciAddress,
        offset: usize,
        _data: &[u8],
    ) -> Result<(), BackendError> {
        error!("dump: cannot write {address} at {offset:#x}: dump files are read-only");
        Err(BackendError::ReadOnly { backend: NAME })
    }

    fn cleanup(&mut self) {
        self.capture.clear();
    }

    fn cleanup_device(&mut self, address: PciAddress) {
        if self.capture.remove(&address).is_some() {
            debug!("dump: released {address}");
        }
    }
}

#[cfg(test)]
mod test {
    use std::io::Write;

    use hardware::pci::address::PciAddress;
    use pretty_assertions::assert_eq;

    use crate::backend::{Backend, BackendError, ReadError};
    use crate::dump::{DUMP_NAME, DumpBackend, DumpCapture, DumpError};
    use crate::options::Options;
    use crate::registry::Devices;

    fn addr(text: &str) -> PciAddress {
        PciAddress::try_from(text).unwrap()
    }

    fn configured() -> (DumpBackend, Options) {
        let backend = DumpBackend::new();
        let mut options = Options::new();
        backend.configure(&mut options);
        (backend, options)
    }

    #[test]
    fn detection_follows_the_option() {
        let (backend, mut options) = configured();
        assert_eq!(options.get(DUMP_NAME), Some(""));
        assert!(!backend.detect(&options));
        options.set(DUMP_NAME, "lspci.txt").unwrap();
        assert!(backend.detect(&options));
    }

    #[test]
    fn initialize_errors() {
        let (mut backend, mut options) = configured();
        assert!(matches!(
            backend.initialize(&options),
            Err(BackendError::MissingOption { option: DUMP_NAME, .. })
        ));
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.txt");
        options.set(DUMP_NAME, missing.to_string_lossy()).unwrap();
        match backend.initialize(&options) {
            Err(BackendError::Open { path, source }) => {
                assert_eq!(path, missing);
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
            }
            other => unreachable!("expected an open error, got {other:?}"),
        }
    }

    #[test]
    fn failed_parse_keeps_nothing() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "00:1f.0 \n00: 86 80\n00:1f.1 \n00: gg\n").unwrap();
        let (mut backend, mut options) = configured();
        options.set(DUMP_NAME, file.path().to_string_lossy()).unwrap();
        assert!(matches!(
            backend.initialize(&options),
            Err(BackendError::Parse(DumpError::Malformed { line: 4 }))
        ));
        let mut devices = Devices::new();
        backend.enumerate(&mut devices).unwrap();
        assert!(devices.is_empty());
    }

    #[test]
    fn reads_alias_by_address() {
        let capture = DumpCapture::parse(&b"00:1f.0 \n00: 86 80 00 10\n"[..]).unwrap();
        let mut backend = DumpBackend::from_capture(capture);
        let mut devices = Devices::new();
        backend.enumerate(&mut devices).unwrap();
        assert_eq!(devices.len(), 1);

        let mut buf = [0u8; 2];
        backend.read_range(addr("0000:00:1f.0"), 0, &mut buf).unwrap();
        assert_eq!(buf, [0x86, 0x80]);
        assert_eq!(
            backend.read_range(addr("00:1f.0"), 3, &mut buf),
            Err(ReadError::OutOfRange {
                address: addr("00:1f.0"),
                offset: 3,
                length: 2,
                valid: 4
            })
        );
        assert_eq!(
            backend.read_range(addr("00:1f.1"), 0, &mut buf),
            Err(ReadError::NoDevice(addr("00:1f.1")))
        );
    }

    #[test]
    fn writes_are_refused() {
        let mut backend = DumpBackend::new();
        assert!(matches!(
            backend.write_range(addr("00:00.0"), 0, &[0]),
            Err(BackendError::ReadOnly { backend: "dump" })
        ));
    }

    #[test]
    fn cleanup_is_idempotent() {
        let capture = DumpCapture::parse(&b"00:01.0 \n00: 01\n00:02.0 \n00: 02\n"[..]).unwrap();
        let mut backend = DumpBackend::from_capture(capture);
        backend.cleanup_device(addr("00:01.0"));
        backend.cleanup_device(addr("00:01.0"));
        assert_eq!(backend.capture().len(), 1);
        backend.cleanup();
        backend.cleanup();
        assert!(backend.capture().is_empty());
    }
}
