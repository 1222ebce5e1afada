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

#![deny(missing_docs, missing_debug_implementations)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! # DpSim
//!
//! This is a library for computing the converged data plane of a network from the configuration
//! of its devices, without running any routing daemon. It computes the routing tables (RIBs) of
//! every device and every VRF, derives the forwarding tables (FIBs), and traces individual flows
//! through the network.
//!
//! ## Main Concepts
//!
//! The [`network::Network`] is the main datastructure to operate on. It is created from a set of
//! [`config::Configuration`]s (one per device) and the physical [`topology::Topology`]. Each VRF of
//! each device is represented as a [`router::VirtualRouter`], which owns one [`rib::Rib`] per
//! protocol. A [`rib::Rib`] is a binary trie over the prefix bits, where the preferred routes of
//! each prefix are selected with a [`rib::RibPreference`].
//!
//! The network computes the data plane as a fixed point (see
//! [`network::Network::compute_data_plane`]). All routing instances are processed in parallel
//! using [rayon](https://docs.rs/rayon/latest/rayon/index.html). Afterwards, the
//! [`forwarding_state::ForwardingState`] traces flows through the forwarding tables.
//!
//! The engine supports connected and static routes, generated (aggregate) routes, OSPF (intra-area,
//! inter-area, and external routes), and BGP (eBGP and iBGP with route reflection). Route
//! redistribution and filtering is configured with [`route_map::RoutingPolicy`], and packet
//! filters with [`acl::IpAccessList`].
//!
//! ## Example usage
//!
//! The following example creates two routers connected with OSPF, and traces a flow from `r1` to
//! the loopback address of `r2`.
//!
//! ```
//! use dpsim::prelude::*;
//!
//! fn main() -> Result<(), NetworkError> {
//!     let mut r1 = Configuration::new("r1");
//!     r1.add_interface("eth0", Interface::new(prefix!("10.0.0.1/30")).ospf(0, 1));
//!     r1.add_interface("lo", Interface::new(prefix!("1.1.1.1/32")).ospf(0, 1));
//!     r1.vrf_mut(DEFAULT_VRF_NAME).ospf = Some(OspfProcess::default());
//!
//!     let mut r2 = Configuration::new("r2");
//!     r2.add_interface("eth0", Interface::new(prefix!("10.0.0.2/30")).ospf(0, 1));
//!     r2.add_interface("lo", Interface::new(prefix!("2.2.2.2/32")).ospf(0, 1));
//!     r2.vrf_mut(DEFAULT_VRF_NAME).ospf = Some(OspfProcess::default());
//!
//!     let mut net = Network::new([r1, r2], [Edge::new("r1", "eth0", "r2", "eth0")])?;
//!     net.compute_data_plane()?;
//!
//!     let fw_state = net.get_forwarding_state()?;
//!     let traces = fw_state.trace(&Flow::new("r1", ip!("1.1.1.1"), ip!("2.2.2.2")))?;
//!     assert_eq!(traces.len(), 1);
//!     assert_eq!(traces[0].disposition, FlowDisposition::Accepted);
//!     assert_eq!(traces[0].hops.len(), 1);
//!
//!     Ok(())
//! }
//! ```

pub mod acl;
pub mod bgp;
pub mod config;
pub mod fib;
pub mod forwarding_state;
pub mod network;
pub mod ospf;
pub mod prelude;
pub mod rib;
pub mod route;
pub mod route_map;
pub mod router;
pub mod topology;
pub mod types;

#[cfg(test)]
#[cfg(not(tarpaulin_include))]
mod test;

pub use dpsim_macros::*;
