// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

#![doc = include_str!("../README.md")]
#![deny(clippy::pedantic, clippy::unwrap_used)]

pub mod backend;
pub mod cache;
pub mod dump;
pub mod options;
pub mod registry;
pub mod session;
