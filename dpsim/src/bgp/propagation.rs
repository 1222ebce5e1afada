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

//! Computation of BGP routes exchanged over established sessions.

use std::net::Ipv4Addr;

use log::*;

use crate::{
    config::BgpNeighbor,
    rib::Rib,
    route::{Route, RouteBuilder, RoutingProtocol},
    router::VirtualRouter,
    types::{AsId, NetworkError},
};

use super::DEFAULT_LOCAL_PREF;

/// The receiving end of a session, as needed to import a route.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Session<'a> {
    /// Address of the neighbor, which is the key of its configuration.
    pub(crate) addr: Ipv4Addr,
    pub(crate) neighbor: &'a BgpNeighbor,
    pub(crate) local_as: AsId,
    pub(crate) ebgp: bool,
}

impl Session<'_> {
    fn protocol(&self) -> RoutingProtocol {
        if self.ebgp {
            RoutingProtocol::Bgp
        } else {
            RoutingProtocol::Ibgp
        }
    }
}

/// Candidate routes computed in one round of BGP propagation.
#[derive(Debug, Default)]
pub(crate) struct BgpCandidates {
    pub(crate) ebgp: Vec<Route>,
    pub(crate) ibgp: Vec<Route>,
}

impl VirtualRouter {
    /// BGP router-id of the instance, if configured.
    pub(crate) fn bgp_router_id(&self) -> Option<Ipv4Addr> {
        self.vrf.bgp.as_ref().and_then(|p| p.router_id)
    }

    fn require_router_id(&self) -> Result<Ipv4Addr, NetworkError> {
        self.bgp_router_id().ok_or_else(|| {
            NetworkError::MissingRouterId(self.hostname.clone(), self.vrf_name.clone())
        })
    }

    /// Cluster ID used towards a neighbor. Falls back to the router-id.
    fn cluster_id(&self, neighbor: &BgpNeighbor) -> Option<u32> {
        neighbor
            .cluster_id
            .or_else(|| self.bgp_router_id().map(u32::from))
    }

    /// Transform a route sent over the session into the route received by this instance. The
    /// route is subject to the AS-loop check and the import policy. Returns `None` if the route is
    /// rejected.
    pub(crate) fn receive_bgp_route(
        &self,
        session: &Session,
        outgoing: &Route,
        next_hop: Option<Ipv4Addr>,
    ) -> Option<Route> {
        let attrs = outgoing.bgp().cloned().unwrap_or_default();

        if session.ebgp
            && attrs.as_path.contains(&session.local_as)
            && !session.neighbor.allow_local_as_in
        {
            return None;
        }

        let mut b = RouteBuilder::new(outgoing.network, session.protocol());
        b.originator_ip = attrs.originator_ip;
        b.cluster_list = attrs.cluster_list;
        b.received_from_rr_client = attrs.received_from_rr_client;
        b.as_path = attrs.as_path;
        b.communities = attrs.communities;
        b.local_pref = attrs.local_pref;
        b.metric = outgoing.metric;
        b.next_hop_ip = next_hop;
        b.src_protocol = Some(session.protocol());

        self.apply_policy(
            session.neighbor.import_policy.as_ref(),
            outgoing,
            &mut b,
            Some(session.addr),
        )
        .then(|| b.build())
    }

    /// Compute the routes received from all peers, based on the RIBs of the previous round.
    pub(crate) fn bgp_candidates(
        &self,
        routers: &[VirtualRouter],
    ) -> Result<BgpCandidates, NetworkError> {
        let mut candidates = BgpCandidates::default();
        let Some(process) = self.vrf.bgp.as_ref() else {
            return Ok(candidates);
        };
        let router_id = self.bgp_router_id();

        for (addr, neighbor) in process.neighbors.iter() {
            let Some(peer) = self.bgp_peers.get(addr) else {
                continue;
            };
            let remote = &routers[peer.router];
            let Some(remote_neighbor) = remote
                .vrf
                .bgp
                .as_ref()
                .and_then(|p| p.neighbors.get(&peer.remote_neighbor))
            else {
                warn!(
                    "{}: remote neighbor {} of {addr} disappeared",
                    self.hostname, peer.remote_neighbor
                );
                continue;
            };
            let session = Session {
                addr: *addr,
                neighbor,
                local_as: peer.local_as,
                ebgp: peer.session_type.is_ebgp(),
            };
            let ebgp = session.ebgp;

            let mut sources: Vec<&Route> = remote.prev.main.iter().collect();
            if !ebgp && remote_neighbor.advertise_external {
                sources.extend(remote.prev.ebgp.iter());
            }
            if remote_neighbor.advertise_inactive {
                sources.extend(remote.prev.bgp.iter());
            }

            for r in sources {
                let remote_attrs = r.bgp();

                let originator_ip = if ebgp {
                    None
                } else {
                    match remote_attrs
                        .filter(|_| r.protocol == RoutingProtocol::Ibgp)
                        .and_then(|a| a.originator_ip)
                    {
                        Some(ip) => Some(ip),
                        None => Some(remote.require_router_id()?),
                    }
                };

                if r.protocol.is_bgp() {
                    let as_path_loop = remote_attrs
                        .map(|a| a.as_path.contains(&remote_neighbor.remote_as))
                        .unwrap_or(false);
                    if ebgp && as_path_loop && !remote_neighbor.allow_remote_as_out {
                        continue;
                    }
                    if router_id.is_some() && originator_ip == router_id {
                        continue;
                    }
                }

                let mut cluster_list = Default::default();
                if !ebgp && r.protocol == RoutingProtocol::Ibgp {
                    let from_client = remote_attrs
                        .map(|a| a.received_from_rr_client)
                        .unwrap_or(false);
                    let to_client = remote_neighbor.route_reflector_client;
                    if !from_client && !to_client {
                        continue;
                    }
                    if let Some(a) = remote_attrs {
                        cluster_list = a.cluster_list.clone();
                    }
                    if to_client {
                        let remote_cluster_id = remote
                            .cluster_id(remote_neighbor)
                            .ok_or_else(|| {
                                NetworkError::MissingRouterId(
                                    remote.hostname.clone(),
                                    remote.vrf_name.clone(),
                                )
                            })?;
                        cluster_list.insert(remote_cluster_id);
                    }
                    if let Some(own) = self.cluster_id(neighbor) {
                        if cluster_list.contains(&own) {
                            continue;
                        }
                    }
                }

                let mut out = RouteBuilder::new(r.network, session.protocol());
                out.originator_ip = originator_ip;
                out.cluster_list = cluster_list;
                out.received_from_rr_client = !ebgp && neighbor.route_reflector_client;
                if let Some(a) = remote_attrs {
                    out.as_path = a.as_path.clone();
                    if remote_neighbor.send_community {
                        out.communities = a.communities.clone();
                    }
                }
                if ebgp {
                    out.as_path.insert(0, neighbor.remote_as);
                }
                if r.protocol.is_bgp() {
                    out.metric = r.metric;
                }
                let pre_policy_next_hop = if ebgp || !r.protocol.is_bgp() {
                    out.local_pref = DEFAULT_LOCAL_PREF;
                    remote_neighbor.local_ip
                } else {
                    out.local_pref = remote_attrs
                        .map(|a| a.local_pref)
                        .unwrap_or(DEFAULT_LOCAL_PREF);
                    r.next_hop_ip.or(remote_neighbor.local_ip)
                };
                out.next_hop_ip = pre_policy_next_hop;
                out.src_protocol = Some(r.protocol);

                if !remote.apply_policy(
                    remote_neighbor.export_policy.as_ref(),
                    r,
                    &mut out,
                    Some(peer.remote_neighbor),
                ) {
                    continue;
                }
                let outgoing = out.build();

                let next_hop = if ebgp {
                    pre_policy_next_hop
                } else {
                    outgoing.next_hop_ip
                };
                if let Some(route) = self.receive_bgp_route(&session, &outgoing, next_hop) {
                    if ebgp {
                        candidates.ebgp.push(route);
                    } else {
                        candidates.ibgp.push(route);
                    }
                }
            }
        }
        Ok(candidates)
    }

    /// Merge the received routes. Returns `true` if the eBGP or iBGP RIB changed.
    pub(crate) fn commit_bgp(&mut self, candidates: BgpCandidates) -> bool {
        self.staging.ebgp = Rib::new();
        self.staging.ibgp = Rib::new();
        self.staging.ebgp.extend(candidates.ebgp);
        self.staging.ibgp.extend(candidates.ibgp);
        let ebgp = self.ebgp_rib.import(&self.staging.ebgp);
        let ibgp = self.ibgp_rib.import(&self.staging.ibgp);
        self.bgp_rib.import(&self.ebgp_rib);
        self.bgp_rib.import(&self.ibgp_rib);
        self.main_rib.import(&self.bgp_rib);
        ebgp || ibgp
    }

    /// Add every active generated route to the BGP RIB as a non-routing aggregate.
    pub(crate) fn init_bgp_aggregates(&mut self) {
        if self.vrf.bgp.is_none() {
            return;
        }
        let aggregates: Vec<Route> = self
            .generated_rib
            .iter()
            .map(|r| {
                let mut b = r.to_builder();
                b.protocol = RoutingProtocol::Aggregate;
                b.non_routing().build()
            })
            .collect();
        self.bgp_rib.extend(aggregates);
    }
}
