// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Configuration space sizes and the register offsets this workspace reads.
//!
//! All multi-byte registers in configuration space are little-endian.

/// Size of conventional (PCI 3.0) configuration space.
pub const CONFIG_SPACE_SIZE: usize = 256;

/// Size of PCI Express extended configuration space; no function exposes more.
pub const EXTENDED_CONFIG_SPACE_SIZE: usize = 4096;

/// Size of the standard header shared by every header layout.
pub const HEADER_SIZE: usize = 64;

/// Size of the CardBus bridge header, which spills past the standard header.
pub const CARDBUS_HEADER_SIZE: usize = 128;

/// Register offsets within configuration space.
pub mod offset {
    /// Vendor ID (16 bits).
    pub const VENDOR_ID: usize = 0x00;
    /// Device ID (16 bits).
    pub const DEVICE_ID: usize = 0x02;
    /// Sub class and base class (16 bits, base class in the high byte).
    pub const CLASS_DEVICE: usize = 0x0a;
    /// Header type (8 bits, bit 7 flags a multi-function device).
    pub const HEADER_TYPE: usize = 0x0e;

    /// Type 1 header: bus number immediately upstream of the bridge.
    pub const PRIMARY_BUS: usize = 0x18;
    /// Type 1 header: bus number immediately downstream of the bridge.
    pub const SECONDARY_BUS: usize = 0x19;
    /// Type 1 header: highest bus number reachable through the bridge.
    pub const SUBORDINATE_BUS: usize = 0x1a;

    /// Type 2 header: upstream bus number.
    pub const CB_PRIMARY_BUS: usize = 0x18;
    /// Type 2 header: the CardBus bus number.
    pub const CB_CARD_BUS: usize = 0x19;
    /// Type 2 header: highest bus number reachable through the bridge.
    pub const CB_SUBORDINATE_BUS: usize = 0x1a;
}
