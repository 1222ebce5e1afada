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

//! # Device Configuration
//!
//! This module contains the vendor-independent configuration object model of a single device. A
//! [`Configuration`] consists of the following parts:
//!
//! - [`Interface`]: Addresses, state, OSPF settings and packet filters of each interface. Every
//!   interface belongs to exactly one VRF.
//! - [`Vrf`]: An isolated routing context with its own static routes, generated routes, and
//!   optional [`OspfProcess`] and [`BgpProcess`].
//! - Named objects that are referenced from the parts above: routing policies
//!   ([`RoutingPolicy`]), route filter lists ([`RouteFilterList`]) and IP access lists
//!   ([`IpAccessList`]).
//!
//! All structures can be (de-)serialized. Optional fields can be omitted.
//!
//! ```
//! # use dpsim::config::*;
//! # use dpsim::prefix;
//! let mut c = Configuration::new("r1");
//! c.add_interface("eth0", Interface::new(prefix!("10.0.0.1/30")));
//! c.vrf_mut(DEFAULT_VRF_NAME).static_routes.push(StaticRoute::via_ip(
//!     prefix!("0.0.0.0/0" as),
//!     "10.0.0.2".parse().unwrap(),
//! ));
//! assert!(c.validate().is_ok());
//! ```

use std::{
    collections::{BTreeMap, BTreeSet},
    net::Ipv4Addr,
};

use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};
use serde_with::{As, Same};

use crate::{
    acl::IpAccessList,
    ospf::OspfArea,
    route::{Route, RouteBuilder, RoutingProtocol},
    route_map::{referenced_filter_lists, RouteFilterList, RoutingPolicy},
    types::{AsId, ConfigError, Prefix},
};

/// Name of the VRF used when nothing else is configured.
pub const DEFAULT_VRF_NAME: &str = "default";
/// Name of the interface that discards all packets.
pub const NULL_INTERFACE_NAME: &str = "null_interface";

/// Configuration of a single device.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    /// Name of the device
    pub hostname: String,
    /// All interfaces, indexed by their name
    pub interfaces: BTreeMap<String, Interface>,
    /// All VRFs, indexed by their name
    pub vrfs: BTreeMap<String, Vrf>,
    /// Named routing policies
    pub routing_policies: BTreeMap<String, RoutingPolicy>,
    /// Named route filter lists
    pub route_filter_lists: BTreeMap<String, RouteFilterList>,
    /// Named IP access lists
    pub ip_access_lists: BTreeMap<String, IpAccessList>,
}

impl Configuration {
    /// Create an empty configuration with only the default VRF.
    pub fn new(hostname: impl Into<String>) -> Self {
        let mut vrfs = BTreeMap::new();
        vrfs.insert(DEFAULT_VRF_NAME.to_string(), Vrf::default());
        Self {
            hostname: hostname.into(),
            vrfs,
            ..Default::default()
        }
    }

    /// Add an interface. If its VRF does not yet exist, an empty VRF is created.
    pub fn add_interface(&mut self, name: impl Into<String>, iface: Interface) -> &mut Self {
        self.vrfs.entry(iface.vrf.clone()).or_default();
        self.interfaces.insert(name.into(), iface);
        self
    }

    /// Get a mutable reference to a VRF, creating it if it does not exist.
    pub fn vrf_mut(&mut self, name: impl Into<String>) -> &mut Vrf {
        self.vrfs.entry(name.into()).or_default()
    }

    /// Iterate over all interfaces that belong to the given VRF.
    pub fn interfaces_in_vrf<'a>(
        &'a self,
        vrf: &'a str,
    ) -> impl Iterator<Item = (&'a String, &'a Interface)> + 'a {
        self.interfaces.iter().filter(move |(_, i)| i.vrf == vrf)
    }

    /// Check that the configuration is internally consistent. This checks the control flow of all
    /// routing policies, and that every static route has a next hop.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, policy) in self.routing_policies.iter() {
            policy.validate().map_err(|reason| {
                ConfigError::InvalidRoutingPolicy(self.hostname.clone(), name.clone(), reason)
            })?;
        }
        for vrf in self.vrfs.values() {
            for sr in vrf.static_routes.iter() {
                if sr.next_hop_ip.is_none() && sr.next_hop_interface.is_none() {
                    return Err(ConfigError::InvalidStaticRoute(
                        self.hostname.clone(),
                        sr.network,
                    ));
                }
            }
        }
        Ok(())
    }

    /// Collect all references to named objects of a VRF that do not exist in this configuration.
    /// Each entry is a human-readable description of the missing reference.
    pub fn missing_references(&self, vrf_name: &str) -> BTreeSet<String> {
        let mut missing = BTreeSet::new();
        let mut policy = |name: &Option<String>, context: &str| {
            if let Some(name) = name {
                if !self.routing_policies.contains_key(name) {
                    missing.insert(format!("missing routing policy {name} ({context})"));
                }
            }
        };
        if let Some(vrf) = self.vrfs.get(vrf_name) {
            for gr in vrf.generated_routes.iter() {
                policy(
                    &gr.generation_policy,
                    &format!("generation policy of {}", gr.network),
                );
                policy(
                    &gr.attribute_policy,
                    &format!("attribute policy of {}", gr.network),
                );
            }
            if let Some(ospf) = vrf.ospf.as_ref() {
                policy(&ospf.export_policy, "ospf export policy");
            }
            if let Some(bgp) = vrf.bgp.as_ref() {
                for (addr, n) in bgp.neighbors.iter() {
                    policy(&n.import_policy, &format!("import policy of neighbor {addr}"));
                    policy(&n.export_policy, &format!("export policy of neighbor {addr}"));
                }
            }
            if let Some(ospf) = vrf.ospf.as_ref() {
                for (area, cfg) in ospf.areas.iter() {
                    if let Some(name) = cfg.summary_filter.as_ref() {
                        if !self.route_filter_lists.contains_key(name) {
                            missing.insert(format!(
                                "missing route filter list {name} (summary filter of {area})"
                            ));
                        }
                    }
                }
            }
        }
        for (iface_name, iface) in self.interfaces_in_vrf(vrf_name) {
            for acl in [&iface.incoming_filter, &iface.outgoing_filter]
                .into_iter()
                .flatten()
            {
                if !self.ip_access_lists.contains_key(acl) {
                    missing.insert(format!("missing ip access list {acl} (on {iface_name})"));
                }
            }
        }
        for name in referenced_filter_lists(&self.routing_policies) {
            if !self.route_filter_lists.contains_key(name) {
                missing.insert(format!("missing route filter list {name} (in routing policy)"));
            }
        }
        missing
    }
}

/// Configuration of an interface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Interface {
    /// Name of the VRF to which the interface belongs
    pub vrf: String,
    /// Addresses of the interface (including the host bits). The first one is the primary address.
    pub addresses: Vec<Ipv4Net>,
    /// Whether the interface is up
    pub active: bool,
    /// Bandwidth in bits per second, used to derive the OSPF cost.
    pub bandwidth: Option<f64>,
    /// Explicit OSPF cost
    pub ospf_cost: Option<u32>,
    /// OSPF area. OSPF is enabled on the interface if and only if an area is set.
    pub ospf_area: Option<OspfArea>,
    /// Passive interfaces advertise their networks, but do not form adjacencies.
    pub ospf_passive: bool,
    /// Whether the interface answers ARP requests for addresses that it does not own
    pub proxy_arp: bool,
    /// Name of the access list applied to incoming packets
    pub incoming_filter: Option<String>,
    /// Name of the access list applied to outgoing packets
    pub outgoing_filter: Option<String>,
}

impl Default for Interface {
    fn default() -> Self {
        Self {
            vrf: DEFAULT_VRF_NAME.to_string(),
            addresses: Vec::new(),
            active: true,
            bandwidth: None,
            ospf_cost: None,
            ospf_area: None,
            ospf_passive: false,
            proxy_arp: false,
            incoming_filter: None,
            outgoing_filter: None,
        }
    }
}

impl Interface {
    /// Create an active interface in the default VRF with a single address.
    pub fn new(address: Ipv4Net) -> Self {
        Self {
            addresses: vec![address],
            ..Default::default()
        }
    }

    /// Enable OSPF on the interface in the given area.
    pub fn ospf(mut self, area: impl Into<OspfArea>, cost: u32) -> Self {
        self.ospf_area = Some(area.into());
        self.ospf_cost = Some(cost);
        self
    }

    /// Move the interface into a different VRF.
    pub fn in_vrf(mut self, vrf: impl Into<String>) -> Self {
        self.vrf = vrf.into();
        self
    }

    /// The primary address of the interface
    pub fn primary_address(&self) -> Option<Ipv4Addr> {
        self.addresses.first().map(|a| a.addr())
    }

    /// Networks of all interface addresses
    pub fn networks(&self) -> impl Iterator<Item = Prefix> + '_ {
        self.addresses.iter().map(|a| Prefix::from(*a))
    }

    /// Returns `true` if OSPF is enabled on this interface.
    pub fn ospf_enabled(&self) -> bool {
        self.ospf_area.is_some()
    }

    /// Check whether an interface name denotes a loopback interface.
    pub fn is_loopback(name: &str) -> bool {
        let name = name.to_lowercase();
        name.starts_with("loopback") || name == "lo" || name.starts_with("lo.")
    }
}

/// A routing context with its own routing tables.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Vrf {
    /// Static routes
    pub static_routes: Vec<StaticRoute>,
    /// Generated (aggregate) routes
    pub generated_routes: Vec<GeneratedRoute>,
    /// OSPF process
    pub ospf: Option<OspfProcess>,
    /// BGP process
    pub bgp: Option<BgpProcess>,
}

fn default_static_admin() -> u32 {
    RoutingProtocol::Static.default_admin()
}

fn default_aggregate_admin() -> u32 {
    RoutingProtocol::Aggregate.default_admin()
}

/// A statically configured route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticRoute {
    /// Destination network
    pub network: Prefix,
    /// Next-hop IP address
    #[serde(default)]
    pub next_hop_ip: Option<Ipv4Addr>,
    /// Next-hop interface (use [`NULL_INTERFACE_NAME`] to discard packets)
    #[serde(default)]
    pub next_hop_interface: Option<String>,
    /// Administrative distance
    #[serde(default = "default_static_admin")]
    pub admin: u32,
    /// Metric
    #[serde(default)]
    pub metric: u32,
    /// Route tag
    #[serde(default)]
    pub tag: Option<u32>,
}

impl StaticRoute {
    /// Static route towards a next-hop IP
    pub fn via_ip(network: Prefix, next_hop: Ipv4Addr) -> Self {
        Self {
            network,
            next_hop_ip: Some(next_hop),
            next_hop_interface: None,
            admin: default_static_admin(),
            metric: 0,
            tag: None,
        }
    }

    /// Static route out of an interface
    pub fn via_interface(network: Prefix, iface: impl Into<String>) -> Self {
        Self {
            network,
            next_hop_ip: None,
            next_hop_interface: Some(iface.into()),
            admin: default_static_admin(),
            metric: 0,
            tag: None,
        }
    }

    /// Convert the configured static route into a route.
    pub fn to_route(&self) -> Route {
        let mut b = RouteBuilder::new(self.network, RoutingProtocol::Static);
        b.next_hop_ip = self.next_hop_ip;
        b.next_hop_interface = self.next_hop_interface.clone();
        b.admin(self.admin).metric(self.metric);
        b.tag = self.tag;
        b.build()
    }
}

/// A route that is generated if a contributing route exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedRoute {
    /// Destination network
    pub network: Prefix,
    /// Administrative distance
    #[serde(default = "default_aggregate_admin")]
    pub admin: u32,
    /// Metric
    #[serde(default)]
    pub metric: Option<u32>,
    /// Policy that selects contributing routes. Without a policy, the route is always active.
    #[serde(default)]
    pub generation_policy: Option<String>,
    /// Policy that sets the attributes of the generated route.
    #[serde(default)]
    pub attribute_policy: Option<String>,
    /// Discard packets matching the generated route
    #[serde(default)]
    pub discard: bool,
}

impl GeneratedRoute {
    /// Create a generated route without any policy.
    pub fn new(network: Prefix) -> Self {
        Self {
            network,
            admin: default_aggregate_admin(),
            metric: None,
            generation_policy: None,
            attribute_policy: None,
            discard: false,
        }
    }
}

fn default_reference_bandwidth() -> f64 {
    100e6
}

/// OSPF process of a VRF
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OspfProcess {
    /// Reference bandwidth (bits per second) used to compute interface costs
    #[serde(default = "default_reference_bandwidth")]
    pub reference_bandwidth: f64,
    /// Policy deciding which routes of the main RIB are exported as external routes
    #[serde(default)]
    pub export_policy: Option<String>,
    /// Configured areas
    #[serde(default, with = "As::<Vec<(Same, Same)>>")]
    pub areas: BTreeMap<OspfArea, OspfAreaConfig>,
}

impl Default for OspfProcess {
    fn default() -> Self {
        Self {
            reference_bandwidth: default_reference_bandwidth(),
            export_policy: None,
            areas: BTreeMap::new(),
        }
    }
}

impl OspfProcess {
    /// OSPF cost of an interface. Without an explicit cost, the cost is derived from the
    /// reference bandwidth and the interface bandwidth (at least 1).
    pub fn interface_cost(&self, iface: &Interface) -> u32 {
        match (iface.ospf_cost, iface.bandwidth) {
            (Some(cost), _) => cost,
            (None, Some(bw)) if bw > 0.0 => (self.reference_bandwidth / bw).max(1.0) as u32,
            (None, _) => 1,
        }
    }
}

/// Per-area configuration of an OSPF process
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OspfAreaConfig {
    /// Route filter list restricting which inter-area routes are sent into this area.
    pub summary_filter: Option<String>,
}

/// BGP process of a VRF
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BgpProcess {
    /// BGP router-id
    pub router_id: Option<Ipv4Addr>,
    /// Default local AS for all neighbors
    pub local_as: Option<AsId>,
    /// Neighbors, indexed by their remote address
    pub neighbors: BTreeMap<Ipv4Addr, BgpNeighbor>,
}

/// Configuration of a BGP neighbor
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BgpNeighbor {
    /// AS of the neighbor
    pub remote_as: AsId,
    /// Local AS. Falls back to the local AS of the process if unset.
    pub local_as: Option<AsId>,
    /// Local address of the session
    pub local_ip: Option<Ipv4Addr>,
    /// Policy applied to routes received from the neighbor
    pub import_policy: Option<String>,
    /// Policy applied to routes sent to the neighbor
    pub export_policy: Option<String>,
    /// The neighbor is a route-reflector client of this router.
    pub route_reflector_client: bool,
    /// Cluster ID. Falls back to the router-id if unset.
    pub cluster_id: Option<u32>,
    /// Also send the best eBGP route to iBGP neighbors, even if it is not installed.
    pub advertise_external: bool,
    /// Also send BGP routes that are not installed in the main RIB.
    pub advertise_inactive: bool,
    /// Send communities to the neighbor
    pub send_community: bool,
    /// Accept routes whose AS path contains the local AS
    pub allow_local_as_in: bool,
    /// Send routes whose AS path contains the AS of the neighbor
    pub allow_remote_as_out: bool,
}

impl BgpNeighbor {
    /// Create a neighbor in the remote AS using the given local address.
    pub fn new(remote_as: impl Into<AsId>, local_ip: Ipv4Addr) -> Self {
        Self {
            remote_as: remote_as.into(),
            local_ip: Some(local_ip),
            ..Default::default()
        }
    }
}
