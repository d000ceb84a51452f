// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! PCI identity types and configuration space layout.

/// Full device addresses (`domain:bus:device.function`).
pub mod address;
/// Bridge kinds and bus-number windows.
pub mod bridge;
/// PCI bus representation.
pub mod bus;
/// Class codes.
pub mod class;
/// Configuration space sizes and register offsets.
pub mod config;
/// PCI device numbers and IDs.
pub mod device;
/// PCI domain (segment) representation.
pub mod domain;
/// PCI function numbers.
pub mod function;
/// Header layouts.
pub mod header;
/// PCI vendor IDs.
pub mod vendor;
