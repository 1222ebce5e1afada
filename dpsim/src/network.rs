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

//! # Top-level Network module
//!
//! This module combines the configurations of all devices with the physical topology, and drives
//! all routing instances to a fixed point. The computation is structured in phases. In each phase,
//! the candidate routes of all instances are computed in parallel on an immutable view of the
//! network, and afterwards, each instance commits its own candidates, again in parallel.
//!
//! 1. Initialize every instance (connected routes, static routes, OSPF base routes, and external
//!    BGP advertisements).
//! 2. Propagate OSPF intra-area and inter-area routes until no RIB changes anymore.
//! 3. Repeat until no instance changes anymore (the *dependent routes* loop):
//!    - Activate static routes and generated routes based on the previous round.
//!    - Redistribute routes into OSPF, and propagate external routes until they are stable.
//!    - Propagate BGP routes until they are stable.
//! 4. Build the forwarding table of every instance.

use std::{
    collections::{BTreeMap, BTreeSet},
    net::Ipv4Addr,
    sync::Arc,
};

use log::*;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    bgp::{BgpAdvertisement, BgpPeer, BgpSessionType},
    config::Configuration,
    forwarding_state::ForwardingState,
    ospf::OspfAdjacency,
    route::Route,
    router::VirtualRouter,
    topology::{Edge, Topology},
    types::{ConfigError, NetworkError, RouterId},
};

/// Maximum number of iterations of each fixed point, if nothing else is configured.
pub const DEFAULT_MAX_ITERATIONS: usize = 1000;

/// Statistics of a data plane computation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvergenceReport {
    /// Number of routes in all main RIBs
    pub total_routes: usize,
    /// Number of rounds until OSPF internal routes were stable
    pub ospf_internal_iterations: usize,
    /// Number of rounds of the dependent routes loop
    pub dependent_routes_iterations: usize,
    /// Number of OSPF external rounds, for each round of the dependent routes loop
    pub ospf_external_iterations: BTreeMap<usize, usize>,
    /// Number of BGP rounds, for each round of the dependent routes loop
    pub bgp_iterations: BTreeMap<usize, usize>,
    /// Configuration gaps that were treated as having no effect, indexed by `hostname:vrf`.
    pub warnings: BTreeMap<String, BTreeSet<String>>,
}

/// # Network struct
/// The network owns one [`VirtualRouter`] for every VRF of every device, the physical topology,
/// and the external BGP advertisements.
///
/// ```
/// use dpsim::prelude::*;
///
/// fn main() -> Result<(), NetworkError> {
///     let mut r1 = Configuration::new("r1");
///     r1.add_interface("eth0", Interface::new(prefix!("10.0.0.1/30")));
///     let mut r2 = Configuration::new("r2");
///     r2.add_interface("eth0", Interface::new(prefix!("10.0.0.2/30")));
///
///     let mut net = Network::new([r1, r2], [Edge::new("r1", "eth0", "r2", "eth0")])?;
///     let report = net.compute_data_plane()?;
///     assert_eq!(report.total_routes, 2);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Network {
    pub(crate) configs: BTreeMap<String, Arc<Configuration>>,
    pub(crate) routers: Vec<VirtualRouter>,
    pub(crate) index: BTreeMap<(String, String), RouterId>,
    pub(crate) topology: Topology,
    pub(crate) ip_owners: BTreeMap<Ipv4Addr, BTreeSet<String>>,
    pub(crate) external_adverts: Vec<BgpAdvertisement>,
    pub(crate) max_iterations: usize,
    pub(crate) warnings: BTreeMap<String, BTreeSet<String>>,
    pub(crate) report: Option<ConvergenceReport>,
}

impl Network {
    /// Create a network from the configuration of every device and the physical topology. Every
    /// edge is used in both directions. Edges between unknown devices or interfaces are dropped.
    pub fn new(
        configs: impl IntoIterator<Item = Configuration>,
        edges: impl IntoIterator<Item = Edge>,
    ) -> Result<Self, NetworkError> {
        let mut config_map = BTreeMap::new();
        for c in configs {
            c.validate()?;
            if config_map.contains_key(&c.hostname) {
                return Err(ConfigError::DuplicateHostname(c.hostname).into());
            }
            config_map.insert(c.hostname.clone(), Arc::new(c));
        }

        let mut ip_owners: BTreeMap<Ipv4Addr, BTreeSet<String>> = BTreeMap::new();
        for (hostname, c) in config_map.iter() {
            for iface in c.interfaces.values().filter(|i| i.active) {
                for addr in iface.addresses.iter() {
                    ip_owners
                        .entry(addr.addr())
                        .or_default()
                        .insert(hostname.clone());
                }
            }
        }

        let mut routers = Vec::new();
        let mut index = BTreeMap::new();
        let mut warnings = BTreeMap::new();
        for (hostname, c) in config_map.iter() {
            for (vrf_name, vrf) in c.vrfs.iter() {
                let id = routers.len();
                routers.push(VirtualRouter::new(id, c.clone(), vrf_name, vrf.clone()));
                index.insert((hostname.clone(), vrf_name.clone()), id);
                let missing = c.missing_references(vrf_name);
                for w in missing.iter() {
                    warn!("{hostname}:{vrf_name}: {w}");
                }
                if !missing.is_empty() {
                    warnings.insert(format!("{hostname}:{vrf_name}"), missing);
                }
            }
        }

        let mut topology = Topology::bidirectional(edges);
        topology.retain(|e| {
            let valid = [(&e.node1, &e.int1), (&e.node2, &e.int2)]
                .into_iter()
                .all(|(n, i)| {
                    config_map
                        .get(n)
                        .map(|c| c.interfaces.contains_key(i))
                        .unwrap_or(false)
                });
            if !valid {
                warn!("Drop edge {e}: unknown device or interface");
            }
            valid
        });

        let mut net = Self {
            configs: config_map,
            routers,
            index,
            topology,
            ip_owners,
            external_adverts: Vec::new(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            warnings,
            report: None,
        };
        net.establish_ospf_adjacencies();
        net.establish_bgp_sessions()?;
        Ok(net)
    }

    /// Set the maximum number of iterations of each fixed point.
    pub fn set_max_iterations(&mut self, max_iterations: usize) -> &mut Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Add BGP advertisements of routers outside of the modeled network. This invalidates the
    /// computed data plane.
    pub fn add_external_advertisements(
        &mut self,
        adverts: impl IntoIterator<Item = BgpAdvertisement>,
    ) -> &mut Self {
        self.external_adverts.extend(adverts);
        self.report = None;
        self
    }

    fn warn(&mut self, id: RouterId, msg: String) {
        let r = &self.routers[id];
        warn!("{}:{}: {msg}", r.hostname, r.vrf_name);
        self.warnings
            .entry(format!("{}:{}", r.hostname, r.vrf_name))
            .or_default()
            .insert(msg);
    }

    /// Find the routing instance of the VRF to which an interface belongs.
    fn interface_router(&self, node: &str, iface: &str) -> Option<RouterId> {
        let c = self.configs.get(node)?;
        let vrf = &c.interfaces.get(iface)?.vrf;
        self.index.get(&(node.to_string(), vrf.clone())).copied()
    }

    /// Create an OSPF adjacency for every edge whose interfaces are both active, OSPF-enabled, not
    /// passive and in the same area.
    fn establish_ospf_adjacencies(&mut self) {
        let mut adjacencies: Vec<(RouterId, OspfAdjacency)> = Vec::new();
        for e in self.topology.edges().filter(|e| !e.is_self_loop()) {
            let (Some(c1), Some(c2)) = (self.configs.get(&e.node1), self.configs.get(&e.node2))
            else {
                continue;
            };
            let (Some(i1), Some(i2)) = (c1.interfaces.get(&e.int1), c2.interfaces.get(&e.int2))
            else {
                continue;
            };
            if !(i1.active && i2.active) || i1.ospf_passive || i2.ospf_passive {
                continue;
            }
            let area = match (i1.ospf_area, i2.ospf_area) {
                (Some(a1), Some(a2)) if a1 == a2 => a1,
                _ => continue,
            };
            let (Some(local), Some(neighbor)) = (
                self.interface_router(&e.node1, &e.int1),
                self.interface_router(&e.node2, &e.int2),
            ) else {
                continue;
            };
            let (Some(process), Some(_)) = (
                self.routers[local].vrf.ospf.as_ref(),
                self.routers[neighbor].vrf.ospf.as_ref(),
            ) else {
                continue;
            };
            let Some(neighbor_ip) = i2.primary_address() else {
                continue;
            };
            trace!("OSPF adjacency {e} in {area}");
            adjacencies.push((
                local,
                OspfAdjacency {
                    edge: e.clone(),
                    neighbor,
                    area,
                    cost: process.interface_cost(i1),
                    neighbor_ip,
                },
            ));
        }
        for (id, adj) in adjacencies {
            self.routers[id].ospf_adjacencies.push(adj);
        }
    }

    /// Pair every BGP neighbor with the unique remote neighbor whose local address is the address
    /// of the neighbor, and vice versa. Neighbors without a matching remote neighbor have no
    /// session.
    fn establish_bgp_sessions(&mut self) -> Result<(), NetworkError> {
        let mut sessions: Vec<(RouterId, Ipv4Addr, BgpPeer)> = Vec::new();
        let mut gaps: Vec<(RouterId, String)> = Vec::new();

        for r in self.routers.iter() {
            let Some(process) = r.vrf.bgp.as_ref() else {
                continue;
            };
            for (addr, n) in process.neighbors.iter() {
                let Some(local_ip) = n.local_ip else {
                    gaps.push((r.id, format!("BGP neighbor {addr} has no local address")));
                    continue;
                };
                if !self.owned_by(&local_ip, &r.hostname) {
                    gaps.push((
                        r.id,
                        format!("local address {local_ip} of BGP neighbor {addr} is not owned"),
                    ));
                    continue;
                }
                let local_as = n
                    .local_as
                    .or(process.local_as)
                    .ok_or_else(|| NetworkError::MissingLocalAs(r.hostname.clone(), *addr))?;

                let candidates: Vec<RouterId> = self
                    .routers
                    .iter()
                    .filter(|q| self.owned_by(addr, &q.hostname))
                    .filter(|q| {
                        q.vrf
                            .bgp
                            .as_ref()
                            .and_then(|p| p.neighbors.get(&local_ip))
                            .map(|remote| remote.local_ip == Some(*addr))
                            .unwrap_or(false)
                    })
                    .map(|q| q.id)
                    .collect();

                match candidates.as_slice() {
                    [remote] => {
                        let session_type =
                            BgpSessionType::new(local_as, n.remote_as, n.route_reflector_client);
                        debug!(
                            "{}: {session_type} session with {addr} ({})",
                            r.hostname, self.routers[*remote].hostname
                        );
                        sessions.push((
                            r.id,
                            *addr,
                            BgpPeer {
                                router: *remote,
                                remote_neighbor: local_ip,
                                local_as,
                                session_type,
                            },
                        ));
                    }
                    [] => gaps.push((r.id, format!("no remote peer for BGP neighbor {addr}"))),
                    _ => gaps.push((
                        r.id,
                        format!("multiple remote peers for BGP neighbor {addr}"),
                    )),
                }
            }
        }

        for (id, msg) in gaps {
            self.warn(id, msg);
        }
        for (id, addr, peer) in sessions {
            self.routers[id].bgp_peers.insert(addr, peer);
        }
        Ok(())
    }

    fn owned_by(&self, ip: &Ipv4Addr, hostname: &str) -> bool {
        self.ip_owners
            .get(ip)
            .map(|o| o.contains(hostname))
            .unwrap_or(false)
    }

    /// Compute the converged RIBs and the forwarding tables of all routing instances. Calling this
    /// function again recomputes everything from scratch, and yields the same result.
    pub fn compute_data_plane(&mut self) -> Result<ConvergenceReport, NetworkError> {
        let mut report = ConvergenceReport {
            warnings: self.warnings.clone(),
            ..Default::default()
        };
        let max_iterations = self.max_iterations;

        info!("Initialize {} routing instances", self.routers.len());
        let adverts = &self.external_adverts;
        let ip_owners = &self.ip_owners;
        self.routers.par_iter_mut().try_for_each(|r| {
            r.reset();
            r.init_connected_rib();
            r.init_static_rib()?;
            r.init_ospf_rib();
            r.init_base_bgp_ribs(adverts, ip_owners)
        })?;

        report.ospf_internal_iterations = self.fixed_point(
            "OSPF internal",
            |r, routers| Ok(r.ospf_internal_candidates(routers)),
            VirtualRouter::commit_ospf_internal,
        )?;
        self.routers
            .par_iter_mut()
            .for_each(VirtualRouter::finalize_ospf_internal);
        info!(
            "OSPF internal routes converged after {} iterations",
            report.ospf_internal_iterations
        );

        loop {
            report.dependent_routes_iterations += 1;
            let round = report.dependent_routes_iterations;
            if round > max_iterations {
                return Err(NetworkError::NoConvergence(max_iterations));
            }

            self.routers.par_iter_mut().for_each(|r| {
                r.reinit_dependent();
                while r.activate_static_routes() {}
                r.recompute_generated_routes();
                r.init_ospf_exports();
            });

            let ospf_external = self.fixed_point(
                "OSPF external",
                |r, routers| Ok(r.ospf_external_candidates(routers)),
                VirtualRouter::commit_ospf_external,
            )?;
            report.ospf_external_iterations.insert(round, ospf_external);

            self.routers.par_iter_mut().for_each(|r| {
                r.finalize_ospf_external();
                r.init_bgp_aggregates();
            });

            let bgp = self.fixed_point(
                "BGP",
                |r, routers| r.bgp_candidates(routers),
                VirtualRouter::commit_bgp,
            )?;
            report.bgp_iterations.insert(round, bgp);

            let converged = self.routers.par_iter().all(|r| r.has_converged());
            info!(
                "Dependent routes iteration {round}: {ospf_external} OSPF external and {bgp} BGP \
                 iterations (converged: {converged})"
            );
            if converged {
                break;
            }
        }

        self.routers
            .par_iter_mut()
            .try_for_each(VirtualRouter::compute_fib)?;
        report.total_routes = self.routers.iter().map(|r| r.main_rib.len()).sum();
        info!("Computed the data plane with {} routes", report.total_routes);

        self.report = Some(report.clone());
        Ok(report)
    }

    /// Repeat a propagation phase until no instance changes anymore. In each iteration, `compute`
    /// is evaluated for every instance on an immutable view of the network, and `commit` merges
    /// the result into the instance itself. Returns the number of iterations.
    fn fixed_point<C, F, G>(
        &mut self,
        name: &str,
        compute: F,
        commit: G,
    ) -> Result<usize, NetworkError>
    where
        C: Send,
        F: Fn(&VirtualRouter, &[VirtualRouter]) -> Result<C, NetworkError> + Sync,
        G: Fn(&mut VirtualRouter, C) -> bool + Sync,
    {
        let mut iterations = 0;
        loop {
            iterations += 1;
            if iterations > self.max_iterations {
                return Err(NetworkError::NoConvergence(self.max_iterations));
            }
            let routers = &self.routers;
            let candidates = routers
                .par_iter()
                .map(|r| compute(r, routers))
                .collect::<Result<Vec<C>, NetworkError>>()?;
            let changed = self
                .routers
                .par_iter_mut()
                .zip(candidates)
                .map(|(r, c)| commit(r, c))
                .reduce(|| false, |a, b| a || b);
            debug!("{name} iteration {iterations}: changed = {changed}");
            if !changed {
                return Ok(iterations);
            }
        }
    }

    /// Statistics of the last data plane computation, if any.
    pub fn report(&self) -> Option<&ConvergenceReport> {
        self.report.as_ref()
    }

    /// Configuration gaps that were treated as having no effect, indexed by `hostname:vrf`.
    pub fn warnings(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.warnings
    }

    /// The physical topology (containing every valid edge in both directions)
    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Map from each address to the devices with an active interface holding it.
    pub fn ip_owners(&self) -> &BTreeMap<Ipv4Addr, BTreeSet<String>> {
        &self.ip_owners
    }

    /// Get the configuration of a device.
    pub fn get_config(&self, hostname: &str) -> Option<&Configuration> {
        self.configs.get(hostname).map(|c| c.as_ref())
    }

    /// Iterate over all routing instances.
    pub fn routers(&self) -> impl Iterator<Item = &VirtualRouter> + '_ {
        self.routers.iter()
    }

    /// Get the routing instance of a VRF on a device.
    pub fn get_router(&self, hostname: &str, vrf: &str) -> Result<&VirtualRouter, NetworkError> {
        self.index
            .get(&(hostname.to_string(), vrf.to_string()))
            .map(|id| &self.routers[*id])
            .ok_or_else(|| NetworkError::RouterNotFound(hostname.to_string(), vrf.to_string()))
    }

    /// Get the converged main RIB of a VRF on a device.
    pub fn get_routes(&self, hostname: &str, vrf: &str) -> Result<BTreeSet<Route>, NetworkError> {
        Ok(self.get_router(hostname, vrf)?.main_rib.routes())
    }

    /// Get the converged main RIBs of all instances, indexed by hostname and VRF.
    pub fn all_routes(&self) -> BTreeMap<String, BTreeMap<String, BTreeSet<Route>>> {
        let mut result: BTreeMap<String, BTreeMap<String, BTreeSet<Route>>> = BTreeMap::new();
        for r in self.routers.iter() {
            result
                .entry(r.hostname.clone())
                .or_default()
                .insert(r.vrf_name.clone(), r.main_rib.routes());
        }
        result
    }

    /// Get the forwarding state used to trace flows. Fails if the data plane was not computed.
    pub fn get_forwarding_state(&self) -> Result<ForwardingState<'_>, NetworkError> {
        if self.report.is_none() {
            return Err(NetworkError::FibNotComputed);
        }
        Ok(ForwardingState::new(self))
    }
}
