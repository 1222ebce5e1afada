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

//! # Forwarding Information Base
//!
//! The [`Fib`] is computed once from a converged main RIB. For every route, it resolves the
//! next-hop IP recursively (through the same RIB) until a route with a next-hop interface is
//! found. Routes that cannot be resolved do not appear in the FIB.
//!
//! Besides the egress interface, the FIB remembers the *final next-hop IP*: the last address that
//! was looked up before reaching an interface route. This is the address for which the device
//! sends an ARP request. Routes that directly point to an interface have no final next-hop, and
//! the destination itself is resolved.

use std::{
    collections::{BTreeMap, BTreeSet},
    net::Ipv4Addr,
};

use log::*;
use serde::{Deserialize, Serialize};

use crate::{
    rib::{MainPreference, Rib},
    route::Route,
    types::{NetworkError, Prefix},
};

/// Maximum number of recursive lookups while resolving the next-hop of a single route.
pub const MAX_RESOLUTION_DEPTH: usize = 10;

/// Resolved egress of a route.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResolvedNextHop {
    /// Egress interface
    pub interface: String,
    /// Final next-hop IP, or `None` if the route points directly to the interface.
    pub final_next_hop_ip: Option<Ipv4Addr>,
}

/// Forwarding table of a single routing instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fib {
    rib: Rib<MainPreference>,
    next_hops: BTreeMap<Route, BTreeSet<ResolvedNextHop>>,
    routes_by_interface: BTreeMap<String, BTreeSet<Route>>,
}

impl Fib {
    /// Build the forwarding table of the given main RIB. Returns
    /// [`NetworkError::FibRecursionLimit`] if the next-hop of a route cannot be resolved within
    /// [`MAX_RESOLUTION_DEPTH`] lookups.
    pub fn new(hostname: &str, rib: &Rib<MainPreference>) -> Result<Self, NetworkError> {
        let mut next_hops = BTreeMap::new();
        let mut routes_by_interface: BTreeMap<String, BTreeSet<Route>> = BTreeMap::new();

        for route in rib.iter() {
            let mut resolved = BTreeSet::new();
            let mut visited = BTreeSet::new();
            resolve(hostname, rib, route, None, &mut visited, 0, &mut resolved)?;
            if resolved.is_empty() {
                trace!("{hostname}: next hop of {route} cannot be resolved");
                continue;
            }
            for nh in resolved.iter() {
                routes_by_interface
                    .entry(nh.interface.clone())
                    .or_default()
                    .insert(route.clone());
            }
            next_hops.insert(route.clone(), resolved);
        }

        Ok(Self {
            rib: rib.clone(),
            next_hops,
            routes_by_interface,
        })
    }

    /// Get the egress interfaces towards `ip`, together with the routes that lead to each of them.
    pub fn next_hop_interfaces(&self, ip: Ipv4Addr) -> BTreeMap<String, BTreeSet<Route>> {
        let mut result: BTreeMap<String, BTreeSet<Route>> = BTreeMap::new();
        for (route, next_hops) in self.next_hop_interfaces_by_route(ip) {
            for nh in next_hops {
                result.entry(nh.interface).or_default().insert(route.clone());
            }
        }
        result
    }

    /// Get the longest-prefix-match routes for `ip` that could be resolved, each with its set of
    /// resolved next-hops.
    pub fn next_hop_interfaces_by_route(
        &self,
        ip: Ipv4Addr,
    ) -> BTreeMap<Route, BTreeSet<ResolvedNextHop>> {
        self.rib
            .longest_prefix_match(ip)
            .into_iter()
            .filter_map(|r| {
                let next_hops = self.next_hops.get(&r)?.clone();
                Some((r, next_hops))
            })
            .collect()
    }

    /// Get all resolved routes with their next-hops.
    pub fn routes(&self) -> &BTreeMap<Route, BTreeSet<ResolvedNextHop>> {
        &self.next_hops
    }

    /// Get all routes that forward traffic out of `iface`.
    pub fn routes_by_interface(&self, iface: &str) -> Option<&BTreeSet<Route>> {
        self.routes_by_interface.get(iface)
    }

    /// Number of resolved routes
    pub fn len(&self) -> usize {
        self.next_hops.len()
    }

    /// Returns `true` if no route could be resolved.
    pub fn is_empty(&self) -> bool {
        self.next_hops.is_empty()
    }
}

/// Resolve the egress of `route`. `visited` contains the prefixes on the current resolution path.
/// Revisiting one of them contributes nothing. `via` is the address whose lookup produced `route`.
fn resolve(
    hostname: &str,
    rib: &Rib<MainPreference>,
    route: &Route,
    via: Option<Ipv4Addr>,
    visited: &mut BTreeSet<Prefix>,
    depth: usize,
    resolved: &mut BTreeSet<ResolvedNextHop>,
) -> Result<(), NetworkError> {
    if let Some(iface) = route.next_hop_interface.as_ref() {
        resolved.insert(ResolvedNextHop {
            interface: iface.clone(),
            final_next_hop_ip: route.next_hop_ip.or(via),
        });
        return Ok(());
    }
    let Some(next_hop) = route.next_hop_ip else {
        return Ok(());
    };
    if depth >= MAX_RESOLUTION_DEPTH {
        return Err(NetworkError::FibRecursionLimit(
            hostname.to_string(),
            route.network,
        ));
    }
    if !visited.insert(route.network) {
        return Ok(());
    }
    for next in rib.longest_prefix_match(next_hop) {
        resolve(
            hostname,
            rib,
            &next,
            Some(next_hop),
            visited,
            depth + 1,
            resolved,
        )?;
    }
    visited.remove(&route.network);
    Ok(())
}
