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

//! # Routing Instance
//!
//! A [`VirtualRouter`] is the routing state of a single VRF on a single device. It owns one RIB per
//! protocol and stage. The network drives all instances through the propagation rounds:
//!
//! - Routes of other instances are only ever read from their *committed* RIBs (or from the RIBs of
//!   the *previous* round), never from their staging RIBs.
//! - Candidate routes are computed on `&self`, and only afterwards committed on `&mut self`. This
//!   allows computing the candidates of all instances in parallel.
//!
//! The OSPF and BGP specific parts are implemented in [`crate::ospf`] and [`crate::bgp`].

use std::{collections::BTreeSet, net::Ipv4Addr, sync::Arc};

use log::*;

use crate::{
    bgp::BgpPeer,
    config::{Configuration, Interface, Vrf, NULL_INTERFACE_NAME},
    fib::Fib,
    ospf::OspfAdjacency,
    rib::{
        BgpPreference, MainPreference, OspfE1Preference, OspfE2Preference, OspfIntraPreference,
        OspfPreference, Rib,
    },
    route::{Route, RouteBuilder, RoutingProtocol},
    route_map::{PolicyContext, RoutingPolicy},
    types::{NetworkError, Prefix, RouterId},
};

/// RIBs into which the candidates of a propagation round are written before they are committed.
#[derive(Debug, Clone, Default)]
pub(crate) struct StagingRibs {
    pub(crate) ospf_intra: Rib<OspfIntraPreference>,
    pub(crate) ospf_inter: Rib<OspfIntraPreference>,
    pub(crate) ospf_e1: Rib<OspfE1Preference>,
    pub(crate) ospf_e2: Rib<OspfE2Preference>,
    pub(crate) ebgp: Rib<BgpPreference>,
    pub(crate) ibgp: Rib<BgpPreference>,
}

/// Snapshot of the RIBs at the end of the previous round of the outer fixed point.
#[derive(Debug, Clone, Default)]
pub(crate) struct PreviousRibs {
    pub(crate) main: Rib<MainPreference>,
    pub(crate) ospf_e1: Rib<OspfE1Preference>,
    pub(crate) ospf_e2: Rib<OspfE2Preference>,
    pub(crate) bgp: Rib<BgpPreference>,
    pub(crate) ebgp: Rib<BgpPreference>,
    pub(crate) ibgp: Rib<BgpPreference>,
}

/// Result of looking up a policy by name.
pub(crate) enum PolicyRef<'a> {
    /// No policy is configured.
    Unset,
    /// The policy is configured but does not exist.
    Missing,
    /// The policy exists.
    Found(&'a RoutingPolicy),
}

/// Routing instance of a single VRF on a single device.
#[derive(Debug, Clone)]
pub struct VirtualRouter {
    pub(crate) id: RouterId,
    pub(crate) hostname: String,
    pub(crate) vrf_name: String,
    pub(crate) config: Arc<Configuration>,
    pub(crate) vrf: Vrf,
    pub(crate) ospf_adjacencies: Vec<OspfAdjacency>,
    pub(crate) bgp_peers: std::collections::BTreeMap<Ipv4Addr, BgpPeer>,

    pub(crate) connected_rib: Rib<MainPreference>,
    /// Static routes with a next-hop IP, waiting to be activated.
    pub(crate) static_rib: Rib<MainPreference>,
    pub(crate) static_interface_rib: Rib<MainPreference>,
    /// Routes that do not depend on any other instance except through OSPF internal routes.
    pub(crate) independent_rib: Rib<MainPreference>,
    pub(crate) generated_rib: Rib<MainPreference>,
    pub(crate) main_rib: Rib<MainPreference>,

    pub(crate) ospf_intra_rib: Rib<OspfIntraPreference>,
    pub(crate) ospf_inter_rib: Rib<OspfIntraPreference>,
    pub(crate) ospf_e1_rib: Rib<OspfE1Preference>,
    pub(crate) ospf_e2_rib: Rib<OspfE2Preference>,
    pub(crate) ospf_rib: Rib<OspfPreference>,

    pub(crate) base_ebgp_rib: Rib<BgpPreference>,
    pub(crate) base_ibgp_rib: Rib<BgpPreference>,
    pub(crate) ebgp_rib: Rib<BgpPreference>,
    pub(crate) ibgp_rib: Rib<BgpPreference>,
    pub(crate) bgp_rib: Rib<BgpPreference>,

    pub(crate) staging: StagingRibs,
    pub(crate) prev: PreviousRibs,

    pub(crate) fib: Option<Fib>,
}

impl VirtualRouter {
    pub(crate) fn new(
        id: RouterId,
        config: Arc<Configuration>,
        vrf_name: impl Into<String>,
        vrf: Vrf,
    ) -> Self {
        Self {
            id,
            hostname: config.hostname.clone(),
            vrf_name: vrf_name.into(),
            config,
            vrf,
            ospf_adjacencies: Vec::new(),
            bgp_peers: Default::default(),
            connected_rib: Rib::new(),
            static_rib: Rib::new(),
            static_interface_rib: Rib::new(),
            independent_rib: Rib::new(),
            generated_rib: Rib::new(),
            main_rib: Rib::new(),
            ospf_intra_rib: Rib::new(),
            ospf_inter_rib: Rib::new(),
            ospf_e1_rib: Rib::new(),
            ospf_e2_rib: Rib::new(),
            ospf_rib: Rib::new(),
            base_ebgp_rib: Rib::new(),
            base_ibgp_rib: Rib::new(),
            ebgp_rib: Rib::new(),
            ibgp_rib: Rib::new(),
            bgp_rib: Rib::new(),
            staging: Default::default(),
            prev: Default::default(),
            fib: None,
        }
    }

    /// Index of the instance in the network
    pub fn id(&self) -> RouterId {
        self.id
    }

    /// Hostname of the device
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Name of the VRF
    pub fn vrf_name(&self) -> &str {
        &self.vrf_name
    }

    /// Configuration of the device
    pub fn config(&self) -> &Configuration {
        &self.config
    }

    /// Converged main RIB
    pub fn main_rib(&self) -> &Rib<MainPreference> {
        &self.main_rib
    }

    /// BGP RIB (best eBGP, iBGP and aggregate routes)
    pub fn bgp_rib(&self) -> &Rib<BgpPreference> {
        &self.bgp_rib
    }

    /// Combined OSPF RIB
    pub fn ospf_rib(&self) -> &Rib<OspfPreference> {
        &self.ospf_rib
    }

    /// Forwarding table, available once the data plane is computed.
    pub fn fib(&self) -> Option<&Fib> {
        self.fib.as_ref()
    }

    /// Established BGP sessions, indexed by the address of the neighbor.
    pub fn bgp_peers(&self) -> &std::collections::BTreeMap<Ipv4Addr, BgpPeer> {
        &self.bgp_peers
    }

    /// Interfaces of the device that belong to this VRF.
    pub fn interfaces(&self) -> impl Iterator<Item = (&String, &Interface)> + '_ {
        self.config.interfaces_in_vrf(&self.vrf_name)
    }

    pub(crate) fn policy(&self, name: Option<&String>) -> PolicyRef<'_> {
        match name {
            None => PolicyRef::Unset,
            Some(name) => match self.config.routing_policies.get(name) {
                Some(p) => PolicyRef::Found(p),
                None => PolicyRef::Missing,
            },
        }
    }

    /// Apply an import or export policy. Without a policy, every route is permitted. A policy that
    /// does not exist denies every route.
    pub(crate) fn apply_policy(
        &self,
        name: Option<&String>,
        input: &Route,
        output: &mut RouteBuilder,
        peer: Option<Ipv4Addr>,
    ) -> bool {
        match self.policy(name) {
            PolicyRef::Unset => true,
            PolicyRef::Missing => false,
            PolicyRef::Found(p) => p.process(
                input,
                output,
                &PolicyContext {
                    config: &self.config,
                    peer_address: peer,
                },
            ),
        }
    }

    /// Reset all RIBs. This is done at the beginning of every data plane computation.
    pub(crate) fn reset(&mut self) {
        let id = self.id;
        let config = self.config.clone();
        let vrf_name = std::mem::take(&mut self.vrf_name);
        let vrf = std::mem::take(&mut self.vrf);
        let adjacencies = std::mem::take(&mut self.ospf_adjacencies);
        let peers = std::mem::take(&mut self.bgp_peers);
        *self = Self::new(id, config, vrf_name, vrf);
        self.ospf_adjacencies = adjacencies;
        self.bgp_peers = peers;
    }

    /// Initialize the connected RIB from the addresses of all active interfaces.
    pub(crate) fn init_connected_rib(&mut self) {
        let routes: Vec<Route> = self
            .interfaces()
            .filter(|(_, iface)| iface.active)
            .flat_map(|(name, iface)| {
                iface.networks().map(move |net| {
                    RouteBuilder::new(net, RoutingProtocol::Connected)
                        .next_hop_interface(name.clone())
                        .build()
                })
            })
            .collect();
        self.connected_rib.extend(routes);
        self.independent_rib.import(&self.connected_rib);
        self.main_rib.import(&self.connected_rib);
    }

    /// Initialize the static RIBs. Routes with a next-hop interface are usable right away, if the
    /// interface is active (or the null interface). Routes with only a next-hop IP must be
    /// activated in every round.
    pub(crate) fn init_static_rib(&mut self) -> Result<(), NetworkError> {
        for sr in self.vrf.static_routes.iter() {
            match (&sr.next_hop_interface, sr.next_hop_ip) {
                (Some(iface), _) => {
                    let usable = iface == NULL_INTERFACE_NAME
                        || self
                            .config
                            .interfaces
                            .get(iface)
                            .map(|i| i.active && i.vrf == self.vrf_name)
                            .unwrap_or(false);
                    if usable {
                        self.static_interface_rib.merge_route(sr.to_route());
                    } else {
                        debug!(
                            "{}:{}: static route {} uses an inactive interface {iface}",
                            self.hostname, self.vrf_name, sr.network
                        );
                    }
                }
                (None, Some(_)) => {
                    self.static_rib.merge_route(sr.to_route());
                }
                (None, None) => {
                    return Err(NetworkError::ConfigError(
                        crate::types::ConfigError::InvalidStaticRoute(
                            self.hostname.clone(),
                            sr.network,
                        ),
                    ))
                }
            }
        }
        self.independent_rib.import(&self.static_interface_rib);
        self.main_rib.import(&self.static_interface_rib);
        Ok(())
    }

    /// Prepare the RIBs for the next round of the outer fixed point.
    pub(crate) fn reinit_dependent(&mut self) {
        self.prev.main = std::mem::replace(&mut self.main_rib, self.independent_rib.clone());
        self.prev.ospf_e1 = std::mem::take(&mut self.ospf_e1_rib);
        self.prev.ospf_e2 = std::mem::take(&mut self.ospf_e2_rib);
        self.prev.bgp = std::mem::take(&mut self.bgp_rib);
        self.prev.ebgp = std::mem::replace(&mut self.ebgp_rib, self.base_ebgp_rib.clone());
        self.prev.ibgp = std::mem::replace(&mut self.ibgp_rib, self.base_ibgp_rib.clone());

        self.ospf_rib = Rib::new();
        self.ospf_rib.import(&self.ospf_intra_rib);
        self.ospf_rib.import(&self.ospf_inter_rib);

        self.staging = StagingRibs::default();
    }

    /// Activate static routes whose next-hop IP is resolvable in the previous main RIB through a
    /// route that does not contain the static route itself. Returns `true` if the main RIB has
    /// changed.
    pub(crate) fn activate_static_routes(&mut self) -> bool {
        let mut changed = false;
        for sr in self.static_rib.iter() {
            let Some(nh) = sr.next_hop_ip else { continue };
            let resolvable = self
                .prev
                .main
                .longest_prefix_match(nh)
                .iter()
                .any(|m| !m.network.contains_prefix(&sr.network));
            if resolvable {
                changed |= self.main_rib.merge_route(sr.clone());
            }
        }
        changed
    }

    /// Activate generated routes based on the previous main RIB. Returns `true` if the generated
    /// RIB has changed.
    pub(crate) fn activate_generated_routes(&mut self) -> bool {
        let mut new_routes = Vec::new();
        for gr in self.vrf.generated_routes.iter() {
            // a missing attribute policy disables the route
            if let PolicyRef::Missing = self.policy(gr.attribute_policy.as_ref()) {
                continue;
            }
            let mut b = RouteBuilder::new(gr.network, RoutingProtocol::Aggregate);
            b.admin(gr.admin).metric(gr.metric.unwrap_or(0));
            if gr.discard {
                b.next_hop_interface(NULL_INTERFACE_NAME);
            }

            let contributor = match self.policy(gr.generation_policy.as_ref()) {
                PolicyRef::Unset => None,
                PolicyRef::Missing => continue,
                PolicyRef::Found(policy) => {
                    let ctx = PolicyContext::new(&self.config);
                    let accepted = self.prev.main.iter().find_map(|r| {
                        let mut candidate = b.clone();
                        policy
                            .process(r, &mut candidate, &ctx)
                            .then_some((r, candidate))
                    });
                    let Some((r, candidate)) = accepted else {
                        continue;
                    };
                    b = candidate;
                    if !gr.discard {
                        b.next_hop_ip = r.next_hop_ip;
                    }
                    Some(r)
                }
            };

            if gr.attribute_policy.is_some() {
                let input = contributor.cloned().unwrap_or_else(|| b.build());
                // only the set actions of the attribute policy are relevant.
                self.apply_policy(gr.attribute_policy.as_ref(), &input, &mut b, None);
            }
            new_routes.push(b.build());
        }
        self.generated_rib.extend(new_routes)
    }

    /// Compute generated routes to a local fixed point and merge them into the main RIB.
    pub(crate) fn recompute_generated_routes(&mut self) {
        self.generated_rib = Rib::new();
        while self.activate_generated_routes() {}
        self.main_rib.import(&self.generated_rib);
    }

    /// Returns `true` if the main RIB, the OSPF external RIBs and the BGP RIBs are equal to the
    /// ones of the previous round.
    pub(crate) fn has_converged(&self) -> bool {
        self.main_rib == self.prev.main
            && self.ospf_e1_rib == self.prev.ospf_e1
            && self.ospf_e2_rib == self.prev.ospf_e2
            && self.bgp_rib == self.prev.bgp
            && self.ebgp_rib == self.prev.ebgp
            && self.ibgp_rib == self.prev.ibgp
    }

    /// Build the forwarding table from the main RIB.
    pub(crate) fn compute_fib(&mut self) -> Result<(), NetworkError> {
        self.fib = Some(Fib::new(&self.hostname, &self.main_rib)?);
        Ok(())
    }

    /// Returns `true` if any active interface of this VRF owns `ip`.
    pub fn owns_ip(&self, ip: &Ipv4Addr) -> bool {
        self.interfaces()
            .any(|(_, i)| i.active && i.addresses.iter().any(|a| a.addr() == *ip))
    }

    /// All networks of active interfaces in this VRF.
    pub fn interface_networks(&self) -> BTreeSet<Prefix> {
        self.interfaces()
            .filter(|(_, i)| i.active)
            .flat_map(|(_, i)| i.networks())
            .collect()
    }
}
