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

//! # Routes
//!
//! A [`Route`] is an immutable candidate path towards a [`Prefix`]. Every route carries the
//! attributes common to all protocols (next-hop, administrative distance, metric, tag) and the
//! attributes specific to its protocol family ([`RouteAttributes`]). Routes are never modified in
//! place. Instead, use a [`RouteBuilder`] (for instance obtained with [`Route::to_builder`]) to
//! derive a new route.

use std::{collections::BTreeSet, fmt, net::Ipv4Addr};

use serde::{Deserialize, Serialize};

use crate::{
    bgp::{BgpAttributes, DEFAULT_LOCAL_PREF},
    ospf::{OspfArea, OspfAttributes, OspfMetricType},
    types::{AsId, Prefix},
};

/// The protocol (or stage) from which a route originates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingProtocol {
    /// Network of an active interface
    Connected,
    /// Statically configured route
    Static,
    /// Generated (aggregate) route
    Aggregate,
    /// OSPF intra-area route
    Ospf,
    /// OSPF inter-area route
    OspfIa,
    /// OSPF external route of type 1
    OspfE1,
    /// OSPF external route of type 2
    OspfE2,
    /// Route learned over eBGP
    Bgp,
    /// Route learned over iBGP
    Ibgp,
}

impl RoutingProtocol {
    /// Default administrative distance of a route from this protocol.
    pub fn default_admin(&self) -> u32 {
        match self {
            Self::Connected => 0,
            Self::Static => 1,
            Self::Aggregate => 200,
            Self::Ospf | Self::OspfIa | Self::OspfE1 | Self::OspfE2 => 110,
            Self::Bgp => 20,
            Self::Ibgp => 200,
        }
    }

    /// Returns `true` for routes learned over a BGP session.
    pub fn is_bgp(&self) -> bool {
        matches!(self, Self::Bgp | Self::Ibgp)
    }

    /// Returns `true` for any kind of OSPF route.
    pub fn is_ospf(&self) -> bool {
        matches!(
            self,
            Self::Ospf | Self::OspfIa | Self::OspfE1 | Self::OspfE2
        )
    }
}

impl fmt::Display for RoutingProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Connected => "connected",
            Self::Static => "static",
            Self::Aggregate => "aggregate",
            Self::Ospf => "ospf",
            Self::OspfIa => "ospfIA",
            Self::OspfE1 => "ospfE1",
            Self::OspfE2 => "ospfE2",
            Self::Bgp => "bgp",
            Self::Ibgp => "ibgp",
        })
    }
}

/// Protocol-specific attributes of a route.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteAttributes {
    /// The route has no protocol-specific attributes.
    #[default]
    None,
    /// Attributes of OSPF routes
    Ospf(OspfAttributes),
    /// Attributes of BGP and aggregate routes
    Bgp(BgpAttributes),
}

/// A candidate path towards a prefix.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Route {
    /// Destination network
    pub network: Prefix,
    /// Protocol that produced this route
    pub protocol: RoutingProtocol,
    /// Next-hop IP that must be resolved recursively
    pub next_hop_ip: Option<Ipv4Addr>,
    /// Interface over which the destination is directly reachable
    pub next_hop_interface: Option<String>,
    /// Administrative distance
    pub admin: u32,
    /// Protocol-specific metric
    pub metric: u32,
    /// Route tag
    pub tag: Option<u32>,
    /// Non-routing routes are never installed in the main RIB.
    #[serde(default)]
    pub non_routing: bool,
    /// Protocol-specific attributes
    #[serde(default)]
    pub attrs: RouteAttributes,
}

impl Route {
    /// Get the BGP attributes, if this is a BGP (or aggregate) route.
    pub fn bgp(&self) -> Option<&BgpAttributes> {
        match &self.attrs {
            RouteAttributes::Bgp(a) => Some(a),
            _ => None,
        }
    }

    /// Get the OSPF attributes, if this is an OSPF route.
    pub fn ospf(&self) -> Option<&OspfAttributes> {
        match &self.attrs {
            RouteAttributes::Ospf(a) => Some(a),
            _ => None,
        }
    }

    /// Create a builder that is initialized with all attributes of this route.
    pub fn to_builder(&self) -> RouteBuilder {
        let mut b = RouteBuilder::new(self.network, self.protocol);
        b.next_hop_ip = self.next_hop_ip;
        b.next_hop_interface = self.next_hop_interface.clone();
        b.admin = Some(self.admin);
        b.metric = self.metric;
        b.tag = self.tag;
        b.non_routing = self.non_routing;
        match &self.attrs {
            RouteAttributes::None => {}
            RouteAttributes::Ospf(o) => {
                b.area = o.area;
                b.cost_to_advertiser = o.cost_to_advertiser;
                b.advertiser = o.advertiser.clone();
                if self.protocol == RoutingProtocol::OspfE1 {
                    b.ospf_metric_type = OspfMetricType::E1;
                }
            }
            RouteAttributes::Bgp(a) => {
                b.as_path = a.as_path.clone();
                b.communities = a.communities.clone();
                b.local_pref = a.local_pref;
                b.originator_ip = a.originator_ip;
                b.cluster_list = a.cluster_list.clone();
                b.received_from_rr_client = a.received_from_rr_client;
                b.src_protocol = a.src_protocol;
            }
        }
        b
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{} {}/{}]",
            self.network, self.protocol, self.admin, self.metric
        )?;
        if let Some(ip) = self.next_hop_ip {
            write!(f, " via {ip}")?;
        }
        if let Some(iface) = &self.next_hop_interface {
            write!(f, " dev {iface}")?;
        }
        if let Some(tag) = self.tag {
            write!(f, " tag {tag}")?;
        }
        Ok(())
    }
}

/// # Route Builder
///
/// Mutable collection of all route attributes. Routing policies write their set actions into a
/// builder, and the engine uses builders to construct every new route. Calling [`Self::build`]
/// produces the immutable [`Route`], keeping only the attributes relevant to the protocol family.
///
/// ```
/// # use dpsim::route::*;
/// # use dpsim::prefix;
/// # use dpsim::types::Prefix;
/// let route = RouteBuilder::new(prefix!("10.0.0.0/8" as), RoutingProtocol::Static)
///     .next_hop_ip("192.168.0.1".parse().unwrap())
///     .tag(10)
///     .build();
/// assert_eq!(route.admin, 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteBuilder {
    /// Destination network
    pub network: Prefix,
    /// Protocol of the resulting route
    pub protocol: RoutingProtocol,
    /// Next-hop IP
    pub next_hop_ip: Option<Ipv4Addr>,
    /// Next-hop interface
    pub next_hop_interface: Option<String>,
    /// Administrative distance. If unset, the default distance of the protocol is used.
    pub admin: Option<u32>,
    /// Metric (MED for BGP routes)
    pub metric: u32,
    /// Route tag
    pub tag: Option<u32>,
    /// Whether the route is non-routing
    pub non_routing: bool,
    /// BGP AS path
    pub as_path: Vec<AsId>,
    /// BGP communities
    pub communities: BTreeSet<u32>,
    /// BGP local preference
    pub local_pref: u32,
    /// BGP originator
    pub originator_ip: Option<Ipv4Addr>,
    /// BGP cluster list
    pub cluster_list: BTreeSet<u32>,
    /// Whether the route was received from a route-reflector client
    pub received_from_rr_client: bool,
    /// Protocol of the route before it entered BGP
    pub src_protocol: Option<RoutingProtocol>,
    /// Metric type of OSPF external routes created from this builder
    pub ospf_metric_type: OspfMetricType,
    /// OSPF area
    pub area: Option<OspfArea>,
    /// Cost to reach the router that advertised an OSPF external route
    pub cost_to_advertiser: u32,
    /// Router that advertised an OSPF external route
    pub advertiser: Option<String>,
}

impl RouteBuilder {
    /// Create an empty builder for a route of the given protocol.
    pub fn new(network: Prefix, protocol: RoutingProtocol) -> Self {
        Self {
            network,
            protocol,
            next_hop_ip: None,
            next_hop_interface: None,
            admin: None,
            metric: 0,
            tag: None,
            non_routing: false,
            as_path: Vec::new(),
            communities: BTreeSet::new(),
            local_pref: DEFAULT_LOCAL_PREF,
            originator_ip: None,
            cluster_list: BTreeSet::new(),
            received_from_rr_client: false,
            src_protocol: None,
            ospf_metric_type: OspfMetricType::default(),
            area: None,
            cost_to_advertiser: 0,
            advertiser: None,
        }
    }

    /// Set the next-hop IP
    pub fn next_hop_ip(&mut self, ip: Ipv4Addr) -> &mut Self {
        self.next_hop_ip = Some(ip);
        self
    }

    /// Set the next-hop interface
    pub fn next_hop_interface(&mut self, iface: impl Into<String>) -> &mut Self {
        self.next_hop_interface = Some(iface.into());
        self
    }

    /// Set the administrative distance
    pub fn admin(&mut self, admin: u32) -> &mut Self {
        self.admin = Some(admin);
        self
    }

    /// Set the metric
    pub fn metric(&mut self, metric: u32) -> &mut Self {
        self.metric = metric;
        self
    }

    /// Set the tag
    pub fn tag(&mut self, tag: u32) -> &mut Self {
        self.tag = Some(tag);
        self
    }

    /// Mark the route as non-routing
    pub fn non_routing(&mut self) -> &mut Self {
        self.non_routing = true;
        self
    }

    /// Set the AS path
    pub fn as_path<A>(&mut self, path: A) -> &mut Self
    where
        A: IntoIterator,
        A::Item: Into<AsId>,
    {
        self.as_path = path.into_iter().map(|x| x.into()).collect();
        self
    }

    /// Set the local preference
    pub fn local_pref(&mut self, local_pref: u32) -> &mut Self {
        self.local_pref = local_pref;
        self
    }

    /// Add a community
    pub fn community(&mut self, community: u32) -> &mut Self {
        self.communities.insert(community);
        self
    }

    /// Set the OSPF area
    pub fn area(&mut self, area: impl Into<OspfArea>) -> &mut Self {
        self.area = Some(area.into());
        self
    }

    /// Set the cost to the advertiser
    pub fn cost_to_advertiser(&mut self, cost: u32) -> &mut Self {
        self.cost_to_advertiser = cost;
        self
    }

    /// Build the route.
    pub fn build(&self) -> Route {
        let attrs = match self.protocol {
            RoutingProtocol::Bgp | RoutingProtocol::Ibgp | RoutingProtocol::Aggregate => {
                RouteAttributes::Bgp(BgpAttributes {
                    as_path: self.as_path.clone(),
                    communities: self.communities.clone(),
                    local_pref: self.local_pref,
                    originator_ip: self.originator_ip,
                    cluster_list: self.cluster_list.clone(),
                    received_from_rr_client: self.received_from_rr_client,
                    src_protocol: self.src_protocol,
                })
            }
            RoutingProtocol::Ospf
            | RoutingProtocol::OspfIa
            | RoutingProtocol::OspfE1
            | RoutingProtocol::OspfE2 => RouteAttributes::Ospf(OspfAttributes {
                area: self.area,
                cost_to_advertiser: self.cost_to_advertiser,
                advertiser: self.advertiser.clone(),
            }),
            RoutingProtocol::Connected | RoutingProtocol::Static => RouteAttributes::None,
        };
        Route {
            network: self.network,
            protocol: self.protocol,
            next_hop_ip: self.next_hop_ip,
            next_hop_interface: self.next_hop_interface.clone(),
            admin: self.admin.unwrap_or_else(|| self.protocol.default_admin()),
            metric: self.metric,
            tag: self.tag,
            non_routing: self.non_routing,
            attrs,
        }
    }
}
