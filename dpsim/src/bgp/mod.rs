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

//! Module containing definitions for BGP

mod advertisement;
mod propagation;
pub use advertisement::*;

use std::{collections::BTreeSet, net::Ipv4Addr};

use serde::{Deserialize, Serialize};

use crate::{
    route::RoutingProtocol,
    types::{AsId, RouterId},
};

/// Local preference of routes that did not set it explicitly.
pub const DEFAULT_LOCAL_PREF: u32 = 100;

/// BGP attributes of a route.
/// The following attributes are omitted
/// - ORIGIN: assumed to be always set to IGP
/// - ATOMIC_AGGREGATE: not used
/// - AGGREGATOR: not used
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct BgpAttributes {
    /// AS-PATH, where the origin of the route is last, and the ID of a new AS is prepended.
    pub as_path: Vec<AsId>,
    /// Communities
    pub communities: BTreeSet<u32>,
    /// LOCAL-PREF
    pub local_pref: u32,
    /// Optional field ORIGINATOR_ID
    pub originator_ip: Option<Ipv4Addr>,
    /// Optional field CLUSTER_LIST
    pub cluster_list: BTreeSet<u32>,
    /// Whether the route was learned from a route-reflector client
    pub received_from_rr_client: bool,
    /// Protocol from which the route was learned
    pub src_protocol: Option<RoutingProtocol>,
}

impl Default for BgpAttributes {
    fn default() -> Self {
        Self {
            as_path: Vec::new(),
            communities: BTreeSet::new(),
            local_pref: DEFAULT_LOCAL_PREF,
            originator_ip: None,
            cluster_list: BTreeSet::new(),
            received_from_rr_client: false,
            src_protocol: None,
        }
    }
}

/// Type of a BGP session, seen from the local router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BgpSessionType {
    /// iBGP session with a peer (or from a client with a Route Reflector)
    IBgpPeer,
    /// iBGP session from a Route Reflector with a client
    IBgpClient,
    /// eBGP session
    EBgp,
}

impl std::fmt::Display for BgpSessionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BgpSessionType::IBgpPeer => write!(f, "iBGP"),
            BgpSessionType::IBgpClient => write!(f, "iBGP RR"),
            BgpSessionType::EBgp => write!(f, "eBGP"),
        }
    }
}

impl BgpSessionType {
    /// Determine the session type from the local and remote AS, and whether the neighbor is a
    /// route-reflector client.
    pub fn new(local_as: AsId, remote_as: AsId, rr_client: bool) -> Self {
        match (local_as == remote_as, rr_client) {
            (false, _) => Self::EBgp,
            (true, true) => Self::IBgpClient,
            (true, false) => Self::IBgpPeer,
        }
    }

    /// returns true if the session type is EBgp
    pub fn is_ebgp(&self) -> bool {
        matches!(self, Self::EBgp)
    }

    /// returns true if the session type is IBgp
    pub fn is_ibgp(&self) -> bool {
        !self.is_ebgp()
    }

    /// Protocol of routes learned over this session
    pub fn protocol(&self) -> RoutingProtocol {
        match self {
            Self::EBgp => RoutingProtocol::Bgp,
            Self::IBgpPeer | Self::IBgpClient => RoutingProtocol::Ibgp,
        }
    }
}

/// An established BGP session, seen from the local router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BgpPeer {
    /// Routing instance on the other end of the session.
    pub router: RouterId,
    /// Key of the neighbor configuration on the remote end, which is the local address of the
    /// session.
    pub remote_neighbor: Ipv4Addr,
    /// Local AS of the session
    pub local_as: AsId,
    /// Type of the session
    pub session_type: BgpSessionType,
}
