// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Parser for textual register dumps, as produced by `lspci -x`.
//!
//! ```text
//! 00:1f.0 ISA bridge: Intel Corporation ...
//! 00: 86 80 00 10 07 00 10 02 00 00 01 06 00 00 80 00
//! 10: 00 00 00 00 00 00 00 00 00 00 00 00 00 00 00 00
//!
//! 0000:03:00.0 Ethernet controller: ...
//! 00: 86 80 ...
//! ```
//!
//! A device header is an address followed by a space; anything after that is
//! ignored. A data line is a hex offset, a colon and a space, then
//! space-separated bytes. A blank line ends the current device. Every other
//! line is skipped.

use std::io::BufRead;

use hardware::pci::address::{InvalidPciAddress, PciAddress};
use ordermap::OrderMap;
use tracing::{debug, error};

use crate::dump::image::RegisterImage;

/// Prefixes that introduce a device, `#` standing for one hex digit.
const HEADER_TEMPLATES: [&[u8]; 3] = [b"##:##.# ", b"####:##:##.# ", b"#####:##:##.# "];

/// Number of hex digits allowed in the offset of a data line.
const OFFSET_DIGITS: std::ops::RangeInclusive<usize> = 2..=8;

/// Reasons a dump is rejected.
#[derive(Debug, thiserror::Error)]
pub enum DumpError {
    /// The last line has no line terminator.
    #[error("dump: line {line}: line unterminated")]
    Unterminated {
        /// 1-based line number.
        line: usize,
    },
    /// A byte lands beyond extended config space.
    #[error("dump: line {line}: at most 4096 bytes of config space are supported")]
    TooLarge {
        /// 1-based line number.
        line: usize,
    },
    /// A data line has trailing garbage.
    #[error("dump: line {line}: malformed line")]
    Malformed {
        /// 1-based line number.
        line: usize,
    },
    /// A device header names an impossible address.
    #[error("dump: line {line}: {source}")]
    Address {
        /// 1-based line number.
        line: usize,
        /// Why the address was refused.
        source: InvalidPciAddress,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Every device found in a dump, in order of first appearance.
#[derive(Debug, Default, Clone)]
pub struct DumpCapture {
    images: OrderMap<PciAddress, RegisterImage>,
}

fn matches_template(line: &[u8], template: &[u8]) -> bool {
    line.len() >= template.len()
        && line
            .iter()
            .zip(template)
            .all(|(c, t)| if *t == b'#' { c.is_ascii_hexdigit() } else { c == t })
}

/// The address text of a device header line, without the trailing space.
///
/// The function number is decimal: `00:00.a ` is not a header.
fn header(line: &[u8]) -> Option<&str> {
    HEADER_TEMPLATES
        .iter()
        .find(|template| matches_template(line, template))
        .filter(|template| line[template.len() - 2].is_ascii_digit())
        .and_then(|template| std::str::from_utf8(&line[..template.len() - 1]).ok())
}

fn nibble(c: u8) -> Option<u8> {
    char::from(c)
        .to_digit(16)
        .and_then(|d| u8::try_from(d).ok())
}

/// Splits the offset off a data line, returning it with the rest of the line.
fn data_offset(line: &[u8]) -> Option<(usize, &[u8])> {
    let digits = line.iter().take_while(|c| c.is_ascii_hexdigit()).count();
    if !OFFSET_DIGITS.contains(&digits) || !line[digits..].starts_with(b": ") {
        return None;
    }
    let text = std::str::from_utf8(&line[..digits]).ok()?;
    let offset = usize::from_str_radix(text, 16).ok()?;
    Some((offset, &line[digits + 2..]))
}

/// Splits one byte token off the front of `rest`.
///
/// A token is two hex digits followed by either a single space (which is
/// consumed) or the end of the line.
fn byte_token(rest: &[u8]) -> Option<(u8, &[u8])> {
    match rest {
        [hi, lo, tail @ ..] if tail.is_empty() || tail[0] == b' ' => {
            let byte = (nibble(*hi)? << 4) | nibble(*lo)?;
            Some((byte, tail.get(1..).unwrap_or_default()))
        }
        _ => None,
    }
}

impl DumpCapture {
    /// Parses a whole dump.
    ///
    /// Nothing is returned unless every line was acceptable.
    ///
    /// # Errors
    ///
    /// [`DumpError`] naming the first offending line.
    pub fn parse<R: BufRead>(mut reader: R) -> Result<Self, DumpError> {
        let mut capture = DumpCapture::default();
        let mut current: Option<PciAddress> = None;
        let mut buf = Vec::new();
        let mut line = 0;
        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            line += 1;
            let Some(text) = buf.strip_suffix(b"\n") else {
                error!("dump: line {line} is unterminated");
                return Err(DumpError::Unterminated { line });
            };
            let text = text.strip_suffix(b"\r").unwrap_or(text);
            if let Some(addr) = header(text) {
                let address = PciAddress::try_from(addr)
                    .map_err(|source| DumpError::Address { line, source })?;
                debug!("dump: line {line}: device {address}");
                capture.images.insert(address, RegisterImage::new());
                current = Some(address);
            } else if text.is_empty() {
                current = None;
            } else if let Some(image) = current.and_then(|a| capture.images.get_mut(&a)) {
                let Some((mut offset, mut rest)) = data_offset(text) else {
                    continue;
                };
                while let Some((byte, tail)) = byte_token(rest) {
                    image
                        .store(offset, byte)
                        .map_err(|_| DumpError::TooLarge { line })?;
                    offset += 1;
                    rest = tail;
                }
                if !rest.is_empty() {
                    return Err(DumpError::Malformed { line });
                }
            }
        }
        Ok(capture)
    }

    /// The image of a device, if the dump had one.
    #[must_use]
    pub fn get(&self, address: &PciAddress) -> Option<&RegisterImage> {
        self.images.get(address)
    }

    /// Captured addresses in order of first appearance.
    pub fn addresses(&self) -> impl Iterator<Item = PciAddress> + '_ {
        self.images.keys().copied()
    }

    /// Drops the image of one device.
    pub fn remove(&mut self, address: &PciAddress) -> Option<RegisterImage> {
        self.images.remove(address)
    }

    pub fn clear(&mut self) {
        self.images.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.images.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

#[cfg(test)]
mod test {
    use std::fmt::Write;

    use hardware::pci::address::PciAddress;
    use pretty_assertions::assert_eq;

    use crate::dump::parse::{DumpCapture, DumpError};

    fn parse(text: &str) -> Result<DumpCapture, DumpError> {
        DumpCapture::parse(text.as_bytes())
    }

    fn addr(text: &str) -> PciAddress {
        PciAddress::try_from(text).unwrap()
    }

    /// Renders bytes the way `lspci -xxxx` does, sixteen to a line.
    fn render(header: &str, bytes: &[u8]) -> String {
        let mut out = format!("{header} Some device\n");
        for (n, chunk) in bytes.chunks(16).enumerate() {
            write!(out, "{:02x}:", n * 16).unwrap();
            for byte in chunk {
                write!(out, " {byte:02x}").unwrap();
            }
            out.push('\n');
        }
        out.push('\n');
        out
    }

    #[test]
    fn single_device() {
        let capture = parse("00:1f.0 ISA bridge\n00: 86 80 00 10\n\n").unwrap();
        assert_eq!(capture.len(), 1);
        let image = capture.get(&addr("0000:00:1f.0")).unwrap();
        assert_eq!(image.valid_length(), 4);
        assert_eq!(image.as_slice(), &[0x86, 0x80, 0x00, 0x10]);
    }

    #[test]
    fn round_trip() {
        bolero::check!().with_type().for_each(|bytes: &Vec<u8>| {
            let bytes = &bytes[..bytes.len().min(4096)];
            let capture = parse(&render("0001:02:03.4", bytes)).unwrap();
            let image = capture.get(&addr("0001:02:03.4")).unwrap();
            assert_eq!(image.valid_length(), bytes.len());
            assert_eq!(image.as_slice(), bytes);
            let expected = if bytes.len() > 256 { 4096 } else { 256 };
            assert_eq!(image.capacity(), expected);
        });
    }

    #[test]
    fn header_forms() {
        let text = "00:00.0 \n\n0001:00:00.0 \n\n10000:e1:1f.7 Host bridge\n00: 01\n";
        let capture = parse(text).unwrap();
        let found: Vec<_> = capture.addresses().map(|a| a.to_string()).collect();
        assert_eq!(found, vec!["0000:00:00.0", "0001:00:00.0", "10000:e1:1f.7"]);
        // no trailing space: not a header, and with no device the data is ignored
        let capture = parse("00:00.0\n00: 01\n").unwrap();
        assert!(capture.is_empty());
    }

    #[test]
    fn offsets_and_gaps() {
        let capture = parse("00:02.0 \n0010: 01 02\r\n04: aa\n").unwrap();
        let image = capture.get(&addr("00:02.0")).unwrap();
        assert_eq!(image.valid_length(), 0x12);
        assert_eq!(image.as_slice()[0x04], 0xaa);
        assert_eq!(image.as_slice()[0x00], 0xff);
        assert_eq!(image.as_slice()[0x11], 0x02);
    }

    #[test]
    fn blank_line_ends_the_device() {
        let capture = parse("00:02.0 \n00: 01\n\n04: aa\nrandom text\n").unwrap();
        assert_eq!(capture.get(&addr("00:02.0")).unwrap().valid_length(), 1);
    }

    #[test]
    fn repeated_header_starts_over_in_place() {
        let capture = parse("00:01.0 \n00: 01 02\n00:02.0 \n00: 03\n00:01.0 \n00: 04\n").unwrap();
        let found: Vec<_> = capture.addresses().map(|a| a.to_string()).collect();
        assert_eq!(found, vec!["0000:00:01.0", "0000:00:02.0"]);
        assert_eq!(capture.get(&addr("00:01.0")).unwrap().as_slice(), &[0x04]);
    }

    #[test]
    fn growth_limits() {
        let capture = parse("00:00.0 \nff: 01\n").unwrap();
        assert_eq!(capture.get(&addr("00:00.0")).unwrap().capacity(), 256);
        let capture = parse("00:00.0 \n100: 01\n").unwrap();
        assert_eq!(capture.get(&addr("00:00.0")).unwrap().capacity(), 4096);
        let capture = parse("00:00.0 \nffe: 01 02\n").unwrap();
        assert_eq!(capture.get(&addr("00:00.0")).unwrap().valid_length(), 4096);
        assert!(matches!(
            parse("00:00.0 \nfff: 01 02\n"),
            Err(DumpError::TooLarge { line: 2 })
        ));
        // an offset alone stores nothing
        assert!(parse("00:00.0 \n1000: \n").is_ok());
    }

    #[test]
    fn malformed_lines() {
        for bad in ["00: gg", "00: 86  80", "00: 868", "00: 86 8", "00: 86\t"] {
            let text = format!("00:1f.0 \n{bad}\n");
            assert!(
                matches!(parse(&text), Err(DumpError::Malformed { line: 2 })),
                "{bad:?} should be malformed"
            );
        }
        assert!(parse("00:1f.0 \n00: 86 \n").is_ok());
    }

    #[test]
    fn unterminated_last_line() {
        assert!(matches!(
            parse("00:1f.0 \n00: 86"),
            Err(DumpError::Unterminated { line: 2 })
        ));
        assert!(parse("").unwrap().is_empty());
    }

    #[test]
    fn impossible_addresses() {
        assert!(matches!(
            parse("\n00:20.0 \n"),
            Err(DumpError::Address { line: 2, .. })
        ));
        assert!(matches!(
            parse("00:00.8 \n"),
            Err(DumpError::Address { line: 1, .. })
        ));
    }

    #[test]
    fn hex_function_is_not_a_header() {
        let capture = parse("00:01.0 \n00: 01\n00:00.a foo\n01: 02\n").unwrap();
        let found: Vec<_> = capture.addresses().map(|a| a.to_string()).collect();
        assert_eq!(found, vec!["0000:00:01.0"]);
        // the skipped line does not end the current device
        assert_eq!(capture.get(&addr("00:01.0")).unwrap().as_slice(), &[0x01, 0x02]);
        assert!(parse("0000:00:1f.b \n").unwrap().is_empty());
    }
}
