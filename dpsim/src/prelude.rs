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

//! Convenience re-export of common members.

pub use crate::acl::{IpAccessList, IpAccessListLine, LineAction};
pub use crate::bgp::{AdvertisementType, BgpAdvertisement, BgpSessionType};
pub use crate::config::{
    BgpNeighbor, BgpProcess, Configuration, GeneratedRoute, Interface, OspfProcess, StaticRoute,
    Vrf, DEFAULT_VRF_NAME, NULL_INTERFACE_NAME,
};
pub use crate::forwarding_state::{Flow, FlowDisposition, FlowTrace, ForwardingState};
pub use crate::network::{ConvergenceReport, Network};
pub use crate::ospf::{OspfArea, OspfMetricType};
pub use crate::rib::{BgpPreference, MainPreference, Rib, RibPreference};
pub use crate::route::{Route, RouteBuilder, RoutingProtocol};
pub use crate::route_map::{RouteMapBuilder, RoutingPolicy};
pub use crate::topology::{Edge, Topology};
pub use crate::types::{AsId, ConfigError, NetworkError, Prefix, RouterId};
pub use dpsim_macros::*;
