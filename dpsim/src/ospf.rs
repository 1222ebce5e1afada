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

//! # OSPF
//!
//! OSPF is computed as a distance-vector fixed point over the established adjacencies, instead of
//! simulating the link-state database. This module contains two separate computations:
//!
//! - *Internal routes* (intra-area and inter-area) depend only on the topology and the interface
//!   configuration. They are computed once, before any other protocol.
//! - *External routes* (type 1 and type 2) are redistributed from the main RIB through the export
//!   policy, and hence depend on every other protocol. They are recomputed in every round.
//!
//! Inter-area routes are only exchanged through the backbone area: An area border router
//! summarizes intra-area routes of any area into the backbone, and routes of the backbone (both
//! intra- and inter-area) into all other areas. The summary filter of the target area restricts
//! which prefixes cross the area boundary.

use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use crate::{
    config::OspfProcess,
    rib::Rib,
    route::{Route, RouteBuilder, RoutingProtocol},
    router::VirtualRouter,
    topology::Edge,
    types::{Prefix, RouterId},
};

/// Metric assigned to external routes if the export policy does not set it.
pub const DEFAULT_EXTERNAL_METRIC: u32 = 20;

/// OSPF Area as a regular number. Area 0 (default) is the backbone area.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OspfArea(pub(crate) u32);

impl std::fmt::Display for OspfArea {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_backbone() {
            f.write_str("Backbone")
        } else {
            write!(f, "Area {}", self.0)
        }
    }
}

impl std::fmt::Debug for OspfArea {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_backbone() {
            f.write_str("backbone")
        } else {
            write!(f, "area{}", self.0)
        }
    }
}

impl OspfArea {
    /// The backbone area (area 0)
    pub const BACKBONE: OspfArea = OspfArea(0);

    /// Return the backbone area
    pub const fn backbone() -> Self {
        OspfArea(0)
    }

    /// Checks if self is the backbone area
    pub const fn is_backbone(&self) -> bool {
        self.0 == 0
    }

    /// Get the number of the area.
    pub const fn num(&self) -> u32 {
        self.0
    }
}

impl From<u32> for OspfArea {
    fn from(x: u32) -> Self {
        OspfArea(x)
    }
}

// integer literals fall back to `i32`, as in `Interface::ospf(0, 1)`
impl From<i32> for OspfArea {
    fn from(x: i32) -> Self {
        OspfArea(x as u32)
    }
}

/// Metric type of an external route.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum OspfMetricType {
    /// The metric grows with every hop.
    E1,
    /// The metric stays constant, and only the cost to the advertiser grows.
    #[default]
    E2,
}

impl OspfMetricType {
    /// Protocol of routes with this metric type
    pub fn to_protocol(self) -> RoutingProtocol {
        match self {
            Self::E1 => RoutingProtocol::OspfE1,
            Self::E2 => RoutingProtocol::OspfE2,
        }
    }
}

/// OSPF-specific attributes of a route
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct OspfAttributes {
    /// Area of intra-area and inter-area routes
    pub area: Option<OspfArea>,
    /// Cost to the router that advertised an external route
    pub cost_to_advertiser: u32,
    /// Hostname of the router that advertised an external route
    pub advertiser: Option<String>,
}

/// An OSPF adjacency, seen from the local instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OspfAdjacency {
    /// Edge from the local interface to the interface of the neighbor
    pub edge: Edge,
    /// Instance of the neighbor
    pub neighbor: RouterId,
    /// Area of both interfaces
    pub area: OspfArea,
    /// OSPF cost of the local interface
    pub cost: u32,
    /// Primary address of the neighbor interface, used as next-hop.
    pub neighbor_ip: Ipv4Addr,
}

/// Candidate routes computed in one round of the internal computation.
#[derive(Debug, Default)]
pub(crate) struct OspfInternalCandidates {
    pub(crate) intra: Vec<Route>,
    pub(crate) inter: Vec<Route>,
}

/// Candidate routes computed in one round of the external computation.
#[derive(Debug, Default)]
pub(crate) struct OspfExternalCandidates {
    pub(crate) e1: Vec<Route>,
    pub(crate) e2: Vec<Route>,
}

/// Check whether `nb` may send an inter-area route for `network` into `area`.
fn summary_permitted(
    nb: &VirtualRouter,
    process: &OspfProcess,
    area: OspfArea,
    network: &Prefix,
) -> bool {
    match process
        .areas
        .get(&area)
        .and_then(|a| a.summary_filter.as_ref())
    {
        None => true,
        Some(name) => nb
            .config
            .route_filter_lists
            .get(name)
            .map(|l| l.permits(network))
            .unwrap_or(false),
    }
}

fn cost_to_advertiser(r: &Route) -> u32 {
    r.ospf().map(|o| o.cost_to_advertiser).unwrap_or(0)
}

impl VirtualRouter {
    /// Add an intra-area route for every network of every OSPF-enabled interface. Passive
    /// interfaces are included.
    pub(crate) fn init_ospf_rib(&mut self) {
        let Some(process) = self.vrf.ospf.as_ref() else {
            return;
        };
        let routes: Vec<Route> = self
            .interfaces()
            .filter(|(_, i)| i.active)
            .filter_map(|(name, i)| i.ospf_area.map(|area| (name, i, area)))
            .flat_map(|(name, i, area)| {
                let cost = process.interface_cost(i);
                i.networks().map(move |net| {
                    RouteBuilder::new(net, RoutingProtocol::Ospf)
                        .metric(cost)
                        .area(area)
                        .next_hop_interface(name.clone())
                        .build()
                })
            })
            .collect();
        self.ospf_intra_rib.extend(routes);
    }

    /// Compute intra-area and inter-area candidates from the committed RIBs of all neighbors.
    pub(crate) fn ospf_internal_candidates(
        &self,
        routers: &[VirtualRouter],
    ) -> OspfInternalCandidates {
        let mut candidates = OspfInternalCandidates::default();
        for adj in self.ospf_adjacencies.iter() {
            let nb = &routers[adj.neighbor];
            let Some(nb_process) = nb.vrf.ospf.as_ref() else {
                continue;
            };
            let a = adj.area;
            let derive = |r: &Route, protocol: RoutingProtocol| {
                RouteBuilder::new(r.network, protocol)
                    .metric(r.metric.saturating_add(adj.cost))
                    .area(a)
                    .next_hop_ip(adj.neighbor_ip)
                    .build()
            };

            for r in nb.ospf_intra_rib.iter() {
                let Some(b) = r.ospf().and_then(|o| o.area) else {
                    continue;
                };
                if b == a {
                    candidates.intra.push(derive(r, RoutingProtocol::Ospf));
                } else if (a.is_backbone() || b.is_backbone())
                    && summary_permitted(nb, nb_process, a, &r.network)
                {
                    candidates.inter.push(derive(r, RoutingProtocol::OspfIa));
                }
            }

            for r in nb.ospf_inter_rib.iter() {
                let Some(b) = r.ospf().and_then(|o| o.area) else {
                    continue;
                };
                if b == a
                    || (b.is_backbone() && summary_permitted(nb, nb_process, a, &r.network))
                {
                    candidates.inter.push(derive(r, RoutingProtocol::OspfIa));
                }
            }
        }
        candidates
    }

    /// Merge the internal candidates. Returns `true` if the intra-area or inter-area RIB changed.
    pub(crate) fn commit_ospf_internal(&mut self, candidates: OspfInternalCandidates) -> bool {
        self.staging.ospf_intra = Rib::new();
        self.staging.ospf_inter = Rib::new();
        self.staging.ospf_intra.extend(candidates.intra);
        self.staging.ospf_inter.extend(candidates.inter);
        let intra = self.ospf_intra_rib.import(&self.staging.ospf_intra);
        let inter = self.ospf_inter_rib.import(&self.staging.ospf_inter);
        intra || inter
    }

    /// Publish the converged internal routes into the OSPF, independent, and main RIBs.
    pub(crate) fn finalize_ospf_internal(&mut self) {
        self.ospf_rib.import(&self.ospf_intra_rib);
        self.ospf_rib.import(&self.ospf_inter_rib);
        self.independent_rib.import(&self.ospf_rib);
        self.main_rib.import(&self.ospf_rib);
    }

    /// Redistribute routes of the previous main RIB into OSPF through the export policy. The
    /// exported routes are non-routing on the exporting instance.
    pub(crate) fn init_ospf_exports(&mut self) {
        let Some(policy) = self
            .vrf
            .ospf
            .as_ref()
            .and_then(|p| p.export_policy.as_ref())
        else {
            return;
        };
        let mut exported = Vec::new();
        for r in self.prev.main.iter() {
            let mut b = RouteBuilder::new(r.network, RoutingProtocol::OspfE2);
            b.metric(DEFAULT_EXTERNAL_METRIC);
            if !self.apply_policy(Some(policy), r, &mut b, None) {
                continue;
            }
            b.protocol = b.ospf_metric_type.to_protocol();
            b.cost_to_advertiser(0).non_routing();
            b.advertiser = Some(self.hostname.clone());
            exported.push(b.build());
        }
        for r in exported {
            match r.protocol {
                RoutingProtocol::OspfE1 => self.ospf_e1_rib.merge_route(r),
                _ => self.ospf_e2_rib.merge_route(r),
            };
        }
    }

    /// Compute external candidates from the current external RIBs of all neighbors.
    pub(crate) fn ospf_external_candidates(
        &self,
        routers: &[VirtualRouter],
    ) -> OspfExternalCandidates {
        let mut candidates = OspfExternalCandidates::default();
        let own = |r: &Route| {
            r.ospf().and_then(|o| o.advertiser.as_deref()) == Some(self.hostname.as_str())
        };
        for adj in self.ospf_adjacencies.iter() {
            let nb = &routers[adj.neighbor];
            for r in nb.ospf_e1_rib.iter().filter(|r| !own(r)) {
                let mut b = RouteBuilder::new(r.network, RoutingProtocol::OspfE1);
                b.metric(r.metric.saturating_add(adj.cost))
                    .cost_to_advertiser(cost_to_advertiser(r).saturating_add(adj.cost))
                    .next_hop_ip(adj.neighbor_ip);
                b.advertiser = r.ospf().and_then(|o| o.advertiser.clone());
                b.tag = r.tag;
                candidates.e1.push(b.build());
            }
            for r in nb.ospf_e2_rib.iter().filter(|r| !own(r)) {
                let mut b = RouteBuilder::new(r.network, RoutingProtocol::OspfE2);
                b.metric(r.metric)
                    .cost_to_advertiser(cost_to_advertiser(r).saturating_add(adj.cost))
                    .next_hop_ip(adj.neighbor_ip);
                b.advertiser = r.ospf().and_then(|o| o.advertiser.clone());
                b.tag = r.tag;
                candidates.e2.push(b.build());
            }
        }
        candidates
    }

    /// Merge the external candidates. Returns `true` if any external RIB changed.
    pub(crate) fn commit_ospf_external(&mut self, candidates: OspfExternalCandidates) -> bool {
        self.staging.ospf_e1 = Rib::new();
        self.staging.ospf_e2 = Rib::new();
        self.staging.ospf_e1.extend(candidates.e1);
        self.staging.ospf_e2.extend(candidates.e2);
        let e1 = self.ospf_e1_rib.import(&self.staging.ospf_e1);
        let e2 = self.ospf_e2_rib.import(&self.staging.ospf_e2);
        e1 || e2
    }

    /// Publish the external routes into the OSPF and main RIBs.
    pub(crate) fn finalize_ospf_external(&mut self) {
        self.ospf_rib.import(&self.ospf_e1_rib);
        self.ospf_rib.import(&self.ospf_e2_rib);
        self.main_rib.import(&self.ospf_rib);
    }
}
