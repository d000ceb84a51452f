// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

#![doc = include_str!("../README.md")]
#![deny(clippy::pedantic, clippy::unwrap_used)]

pub mod builder;
pub mod node;
pub mod scan;
mod tree;
pub mod warning;

pub use tree::Topology;
