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

//! # Forwarding State
//!
//! This module traces individual flows through the forwarding tables of a computed network. A
//! flow enters at a routing instance, and is forwarded hop-by-hop until it reaches a terminal
//! [`FlowDisposition`]. If the forwarding table contains multiple egress interfaces (or an
//! interface with multiple neighbors), the trace branches, and one [`FlowTrace`] is reported for
//! each branch.

use std::{
    collections::{BTreeSet, HashSet},
    fmt,
    net::Ipv4Addr,
};

use log::*;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    acl::LineAction,
    config::{Interface, DEFAULT_VRF_NAME, NULL_INTERFACE_NAME},
    network::Network,
    route::Route,
    topology::Edge,
    types::NetworkError,
};

/// Name of the virtual node at the end of a hop that leaves the modeled network.
pub const NODE_NONE_NAME: &str = "(none)";

/// A packet header together with its ingress location.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Flow {
    /// Device at which the flow enters
    pub ingress_node: String,
    /// VRF at which the flow enters
    #[serde(default = "default_vrf")]
    pub ingress_vrf: String,
    /// Source address
    pub src_ip: Ipv4Addr,
    /// Destination address
    pub dst_ip: Ipv4Addr,
    /// IP protocol number
    #[serde(default)]
    pub ip_protocol: u8,
    /// Source port
    #[serde(default)]
    pub src_port: Option<u16>,
    /// Destination port
    #[serde(default)]
    pub dst_port: Option<u16>,
}

fn default_vrf() -> String {
    DEFAULT_VRF_NAME.to_string()
}

impl Flow {
    /// Create a flow entering the default VRF of `ingress_node`.
    pub fn new(ingress_node: impl Into<String>, src_ip: Ipv4Addr, dst_ip: Ipv4Addr) -> Self {
        Self {
            ingress_node: ingress_node.into(),
            ingress_vrf: default_vrf(),
            src_ip,
            dst_ip,
            ip_protocol: 0,
            src_port: None,
            dst_port: None,
        }
    }

    /// Enter the network in a different VRF.
    pub fn vrf(mut self, vrf: impl Into<String>) -> Self {
        self.ingress_vrf = vrf.into();
        self
    }

    /// Set the protocol and the ports.
    pub fn transport(mut self, ip_protocol: u8, src_port: u16, dst_port: u16) -> Self {
        self.ip_protocol = ip_protocol;
        self.src_port = Some(src_port);
        self.dst_port = Some(dst_port);
        self
    }
}

/// Terminal state of a flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlowDisposition {
    /// The destination is owned by the device, or the flow leaves through a flow sink.
    Accepted,
    /// No route matches the destination.
    NoRoute,
    /// The flow is forwarded to the null interface.
    NullRouted,
    /// The flow is dropped by the incoming filter of the next device.
    DeniedIn,
    /// The flow is dropped by the outgoing filter of the egress interface.
    DeniedOut,
    /// The flow crosses an edge a second time.
    Loop,
    /// No neighbor answers the ARP request, or the egress interface has no neighbor.
    NeighborUnreachableOrExitsNetwork,
}

impl fmt::Display for FlowDisposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Accepted => "ACCEPTED",
            Self::NoRoute => "NO_ROUTE",
            Self::NullRouted => "NULL_ROUTED",
            Self::DeniedIn => "DENIED_IN",
            Self::DeniedOut => "DENIED_OUT",
            Self::Loop => "LOOP",
            Self::NeighborUnreachableOrExitsNetwork => "NEIGHBOR_UNREACHABLE_OR_EXITS_NETWORK",
        })
    }
}

/// A single hop of a flow trace.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FlowTraceHop {
    /// Edge over which the flow is sent
    pub edge: Edge,
    /// Routes that forward the flow over this edge
    pub routes: BTreeSet<Route>,
}

/// The path of a flow until it reaches a terminal disposition.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FlowTrace {
    /// Terminal disposition
    pub disposition: FlowDisposition,
    /// Traversed hops
    pub hops: Vec<FlowTraceHop>,
    /// Diagnostic notes. For filtered flows, this contains the filter and the matched line.
    pub notes: String,
}

impl FlowTrace {
    fn new(disposition: FlowDisposition, hops: Vec<FlowTraceHop>) -> Self {
        Self {
            disposition,
            hops,
            notes: disposition.to_string(),
        }
    }
}

/// Outcome of applying the filter of an interface.
enum FilterOutcome {
    Permit,
    Deny(String),
}

/// # Forwarding State
///
/// Read-only view on the forwarding tables of a [`Network`] whose data plane was computed. Obtain
/// it with [`Network::get_forwarding_state`].
#[derive(Debug, Clone, Copy)]
pub struct ForwardingState<'a> {
    net: &'a Network,
}

impl<'a> ForwardingState<'a> {
    pub(crate) fn new(net: &'a Network) -> Self {
        Self { net }
    }

    /// Trace a flow through the network. Returns one trace per forwarding branch, sorted.
    pub fn trace(&self, flow: &Flow) -> Result<Vec<FlowTrace>, NetworkError> {
        let mut traces = BTreeSet::new();
        self.collect_traces(
            flow,
            &flow.ingress_node,
            &flow.ingress_vrf,
            &HashSet::new(),
            &[],
            &mut traces,
        )?;
        Ok(traces.into_iter().collect())
    }

    /// Trace many independent flows in parallel.
    pub fn trace_all(&self, flows: &[Flow]) -> Result<Vec<(Flow, Vec<FlowTrace>)>, NetworkError> {
        flows
            .par_iter()
            .map(|f| self.trace(f).map(|traces| (f.clone(), traces)))
            .collect()
    }

    fn interface(&self, node: &str, iface: &str) -> Option<&'a Interface> {
        self.net.configs.get(node)?.interfaces.get(iface)
    }

    fn owns(&self, ip: &Ipv4Addr, node: &str) -> bool {
        self.net
            .ip_owners
            .get(ip)
            .map(|o| o.contains(node))
            .unwrap_or(false)
    }

    /// Apply the incoming or outgoing filter of an interface. A filter that does not exist lets
    /// every packet pass.
    fn apply_filter(
        &self,
        flow: &Flow,
        node: &str,
        iface: &str,
        outgoing: bool,
    ) -> FilterOutcome {
        let Some(i) = self.interface(node, iface) else {
            return FilterOutcome::Permit;
        };
        let name = if outgoing {
            i.outgoing_filter.as_ref()
        } else {
            i.incoming_filter.as_ref()
        };
        let Some(name) = name else {
            return FilterOutcome::Permit;
        };
        let Some(acl) = self
            .net
            .configs
            .get(node)
            .and_then(|c| c.ip_access_lists.get(name))
        else {
            return FilterOutcome::Permit;
        };
        let result = acl.filter(flow);
        match result.action {
            LineAction::Permit => FilterOutcome::Permit,
            LineAction::Reject => {
                FilterOutcome::Deny(format!("{{{name}}}{{{}}}", acl.describe(&result)))
            }
        }
    }

    /// A flow sink is an active interface that is neither a loopback nor part of the topology.
    fn is_flow_sink(&self, node: &str, iface: &str) -> bool {
        self.interface(node, iface)
            .map(|i| i.active)
            .unwrap_or(false)
            && !Interface::is_loopback(iface)
            && !self.net.topology.contains_interface(node, iface)
    }

    fn collect_traces(
        &self,
        flow: &Flow,
        node: &str,
        vrf: &str,
        visited: &HashSet<Edge>,
        hops: &[FlowTraceHop],
        traces: &mut BTreeSet<FlowTrace>,
    ) -> Result<(), NetworkError> {
        if self.owns(&flow.dst_ip, node) {
            traces.insert(FlowTrace::new(FlowDisposition::Accepted, hops.to_vec()));
            return Ok(());
        }

        let router = self.net.get_router(node, vrf)?;
        let fib = router.fib().ok_or(NetworkError::FibNotComputed)?;
        let by_interface = fib.next_hop_interfaces(flow.dst_ip);
        if by_interface.is_empty() {
            traces.insert(FlowTrace::new(FlowDisposition::NoRoute, hops.to_vec()));
            return Ok(());
        }
        let by_route = fib.next_hop_interfaces_by_route(flow.dst_ip);

        for (iface, routes) in by_interface {
            let next_hop_ip_route = by_route
                .iter()
                .filter(|(_, next_hops)| next_hops.iter().any(|nh| nh.interface == iface))
                .any(|(route, _)| route.next_hop_ip.is_some());
            let exit_hop = |hops: &[FlowTraceHop]| {
                let mut hops = hops.to_vec();
                hops.push(FlowTraceHop {
                    edge: Edge::new(node, &iface, NODE_NONE_NAME, NULL_INTERFACE_NAME),
                    routes: routes.clone(),
                });
                hops
            };

            if iface == NULL_INTERFACE_NAME {
                traces.insert(FlowTrace::new(FlowDisposition::NullRouted, exit_hop(hops)));
                continue;
            }

            let edges = self.net.topology.interface_edges(node, &iface);
            if edges.is_empty() {
                let disposition = if self.is_flow_sink(node, &iface) {
                    FlowDisposition::Accepted
                } else {
                    FlowDisposition::NeighborUnreachableOrExitsNetwork
                };
                let trace = match self.apply_filter(flow, node, &iface, true) {
                    FilterOutcome::Deny(note) => FlowTrace {
                        disposition: FlowDisposition::DeniedOut,
                        hops: exit_hop(hops),
                        notes: format!("{}{note}", FlowDisposition::DeniedOut),
                    },
                    FilterOutcome::Permit => FlowTrace::new(disposition, exit_hop(hops)),
                };
                traces.insert(trace);
                continue;
            }

            let mut potential_neighbors = 0;
            let mut unreachable_neighbors = 0;
            for edge in edges {
                if edge.is_self_loop() {
                    return Err(NetworkError::SelfLoop(edge.clone()));
                }
                potential_neighbors += 1;
                let mut new_hops = hops.to_vec();
                new_hops.push(FlowTraceHop {
                    edge: edge.clone(),
                    routes: routes.clone(),
                });

                // with interface-only routes, the destination itself is resolved with ARP. The
                // neighbor only answers for its own addresses, or with proxy-ARP for addresses
                // outside of the receiving subnet.
                if !next_hop_ip_route && !self.owns(&flow.dst_ip, &edge.node2) {
                    let answers = self
                        .interface(&edge.node2, &edge.int2)
                        .map(|i| {
                            i.proxy_arp && !i.networks().any(|p| p.contains_ip(&flow.dst_ip))
                        })
                        .unwrap_or(false);
                    if !answers {
                        unreachable_neighbors += 1;
                        continue;
                    }
                }

                if visited.contains(edge) {
                    traces.insert(FlowTrace::new(FlowDisposition::Loop, new_hops));
                    potential_neighbors -= 1;
                    continue;
                }

                if let FilterOutcome::Deny(note) = self.apply_filter(flow, node, &iface, true) {
                    traces.insert(FlowTrace {
                        disposition: FlowDisposition::DeniedOut,
                        hops: new_hops,
                        notes: format!("{}{note}", FlowDisposition::DeniedOut),
                    });
                    potential_neighbors -= 1;
                    continue;
                }
                if let FilterOutcome::Deny(note) =
                    self.apply_filter(flow, &edge.node2, &edge.int2, false)
                {
                    traces.insert(FlowTrace {
                        disposition: FlowDisposition::DeniedIn,
                        hops: new_hops,
                        notes: format!("{}{note}", FlowDisposition::DeniedIn),
                    });
                    potential_neighbors -= 1;
                    continue;
                }

                let next = self
                    .interface(&edge.node2, &edge.int2)
                    .ok_or_else(|| NetworkError::InterfaceNotFound(edge.head()))?;
                trace!("{flow:?}: {edge}");
                let mut new_visited = visited.clone();
                new_visited.insert(edge.clone());
                self.collect_traces(
                    flow,
                    &edge.node2,
                    &next.vrf,
                    &new_visited,
                    &new_hops,
                    traces,
                )?;
            }

            if unreachable_neighbors > 0 && unreachable_neighbors == potential_neighbors {
                traces.insert(FlowTrace::new(
                    FlowDisposition::NeighborUnreachableOrExitsNetwork,
                    exit_hop(hops),
                ));
            }
        }
        Ok(())
    }
}
