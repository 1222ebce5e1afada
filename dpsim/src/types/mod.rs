// DpSim: Data-Plane Simulator written in Rust
// Copyright (C) 2022-2023 Tibor Schneider <sctibor@ethz.ch>
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! Module containing all type definitions

use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::topology::Edge;

mod prefix;
pub(crate) use prefix::ip_bit;
pub use prefix::{Prefix, MAX_PREFIX_LENGTH};

/// Index of a routing instance (one device and one VRF) in the network.
pub type RouterId = usize;

/// AS Number
#[derive(
    PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default, Clone, Copy, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct AsId(pub u32);

impl std::fmt::Display for AsId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AS{}", self.0)
    }
}

impl From<u32> for AsId {
    fn from(x: u32) -> Self {
        Self(x)
    }
}

impl From<u64> for AsId {
    fn from(x: u64) -> Self {
        Self(x as u32)
    }
}

impl From<usize> for AsId {
    fn from(x: usize) -> Self {
        Self(x as u32)
    }
}

impl From<i32> for AsId {
    fn from(x: i32) -> Self {
        Self(x as u32)
    }
}

impl<T> From<&T> for AsId
where
    T: Into<AsId> + Copy,
{
    fn from(x: &T) -> Self {
        (*x).into()
    }
}

/// An interface of a specific device.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeInterfacePair {
    /// Hostname of the device
    pub hostname: String,
    /// Name of the interface on that device
    pub interface: String,
}

impl NodeInterfacePair {
    /// Create a new pair
    pub fn new(hostname: impl Into<String>, interface: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            interface: interface.into(),
        }
    }
}

impl std::fmt::Display for NodeInterfacePair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.hostname, self.interface)
    }
}

/// Configuration Error. These errors describe configurations that are internally inconsistent,
/// and cannot be interpreted.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigError {
    /// The control flow of a routing policy is invalid.
    #[error("Routing policy {1} on {0} is invalid: {2}")]
    InvalidRoutingPolicy(String, String, String),
    /// A static route has neither a next-hop IP nor a next-hop interface.
    #[error("Static route for {1} on {0} has neither a next-hop IP nor a next-hop interface")]
    InvalidStaticRoute(String, Prefix),
    /// Two configurations use the same hostname.
    #[error("Hostname {0} is used by multiple configurations")]
    DuplicateHostname(String),
}

/// Network Errors. Any of these errors aborts the data plane computation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    /// Configuration error
    #[error("Configuration Error: {0}")]
    ConfigError(#[from] ConfigError),
    /// The routing instance is not present in the network
    #[error("Routing instance was not found: {0} (vrf {1})")]
    RouterNotFound(String, String),
    /// The interface is not present in the network
    #[error("Interface was not found: {0}")]
    InterfaceNotFound(NodeInterfacePair),
    /// Recursive next-hop resolution did not terminate within the maximum depth.
    #[error("Exceeded the maximum FIB recursion depth while resolving {1} on {0}")]
    FibRecursionLimit(String, Prefix),
    /// A flow was forwarded over an edge that connects a device to itself.
    #[error("Self-loop detected while tracing a flow over {0}")]
    SelfLoop(Edge),
    /// The BGP router-id is required to originate a route into iBGP, but it is not configured.
    #[error("BGP router-id of {0} (vrf {1}) is required but not configured")]
    MissingRouterId(String, String),
    /// The local AS of a BGP neighbor is neither configured on the neighbor nor on the process.
    #[error("Local AS of BGP neighbor {1} on {0} is not configured")]
    MissingLocalAs(String, Ipv4Addr),
    /// Convergence Problem
    #[error("Network did not converge within {0} iterations!")]
    NoConvergence(usize),
    /// The data plane must be computed before it can be queried.
    #[error("The data plane was not computed yet")]
    FibNotComputed,
}
