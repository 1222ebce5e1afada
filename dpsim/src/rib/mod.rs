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

//! # Routing Information Base
//!
//! A [`Rib`] stores, for every prefix, the set of currently preferred routes. Which route is
//! preferred is decided by the [`RibPreference`] strategy that parameterizes the RIB. Insertion is
//! monotonic:
//!
//! - a strictly better route evicts all routes stored for the same prefix,
//! - an equally preferred route is added next to the existing ones (multipath),
//! - a strictly worse route is rejected.
//!
//! Routes are stored in a binary trie over the address bits, which allows longest-prefix-match
//! lookups.
//!
//! ```
//! # use dpsim::prelude::*;
//! # use dpsim::prefix;
//! let mut rib: Rib<MainPreference> = Rib::new();
//! let r8 = RouteBuilder::new(prefix!("10.0.0.0/8" as), RoutingProtocol::Static)
//!     .next_hop_interface("eth0")
//!     .build();
//! let r16 = RouteBuilder::new(prefix!("10.1.0.0/16" as), RoutingProtocol::Static)
//!     .next_hop_interface("eth1")
//!     .build();
//! rib.merge_route(r8.clone());
//! rib.merge_route(r16.clone());
//! assert!(rib.longest_prefix_match("10.1.2.3".parse().unwrap()).contains(&r16));
//! assert!(rib.longest_prefix_match("10.2.2.3".parse().unwrap()).contains(&r8));
//! assert!(rib.longest_prefix_match("11.0.0.0".parse().unwrap()).is_empty());
//! ```

use std::{cmp::Ordering, collections::BTreeSet, fmt, marker::PhantomData, net::Ipv4Addr};

use crate::{
    bgp::DEFAULT_LOCAL_PREF,
    route::{Route, RoutingProtocol},
    types::Prefix,
};

mod trie;
use trie::RouteTrie;

/// Strategy deciding which of two routes for the same prefix is preferred.
pub trait RibPreference: Send + Sync + 'static {
    /// Whether routes marked as non-routing may be stored.
    const ACCEPTS_NON_ROUTING: bool = true;

    /// Compare a `candidate` with an `existing` route. `Ordering::Greater` means that the candidate
    /// is strictly preferred, `Ordering::Equal` that both are equally preferred.
    fn compare(candidate: &Route, existing: &Route) -> Ordering;
}

/// Preference of the main RIB and of all RIBs that combine different protocols: lower
/// administrative distance, then lower metric. Non-routing routes are rejected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MainPreference;

impl RibPreference for MainPreference {
    const ACCEPTS_NON_ROUTING: bool = false;

    fn compare(candidate: &Route, existing: &Route) -> Ordering {
        existing
            .admin
            .cmp(&candidate.admin)
            .then(existing.metric.cmp(&candidate.metric))
    }
}

/// BGP route preference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BgpPreference;

impl RibPreference for BgpPreference {
    fn compare(candidate: &Route, existing: &Route) -> Ordering {
        let local_pref = |r: &Route| r.bgp().map(|a| a.local_pref).unwrap_or(DEFAULT_LOCAL_PREF);
        let path_len = |r: &Route| r.bgp().map(|a| a.as_path.len()).unwrap_or_default();
        let is_aggregate = |r: &Route| r.protocol == RoutingProtocol::Aggregate;
        let is_ebgp = |r: &Route| r.protocol == RoutingProtocol::Bgp;

        local_pref(candidate)
            .cmp(&local_pref(existing))
            .then(is_aggregate(candidate).cmp(&is_aggregate(existing)))
            .then(path_len(existing).cmp(&path_len(candidate)))
            .then(existing.metric.cmp(&candidate.metric))
            .then(is_ebgp(candidate).cmp(&is_ebgp(existing)))
    }
}

/// Preference of OSPF intra-area and inter-area RIBs: lower metric.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OspfIntraPreference;

impl RibPreference for OspfIntraPreference {
    fn compare(candidate: &Route, existing: &Route) -> Ordering {
        existing.metric.cmp(&candidate.metric)
    }
}

/// Preference of OSPF external type 1 RIBs: lower metric.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OspfE1Preference;

impl RibPreference for OspfE1Preference {
    fn compare(candidate: &Route, existing: &Route) -> Ordering {
        existing.metric.cmp(&candidate.metric)
    }
}

/// Preference of OSPF external type 2 RIBs: lower metric, then lower cost to the advertiser.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OspfE2Preference;

impl RibPreference for OspfE2Preference {
    fn compare(candidate: &Route, existing: &Route) -> Ordering {
        existing
            .metric
            .cmp(&candidate.metric)
            .then(cost_to_advertiser(existing).cmp(&cost_to_advertiser(candidate)))
    }
}

/// Preference of the combined OSPF RIB: intra-area before inter-area before type 1 before type 2,
/// then lower metric, then lower cost to the advertiser.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OspfPreference;

impl RibPreference for OspfPreference {
    fn compare(candidate: &Route, existing: &Route) -> Ordering {
        fn rank(r: &Route) -> u8 {
            match r.protocol {
                RoutingProtocol::Ospf => 0,
                RoutingProtocol::OspfIa => 1,
                RoutingProtocol::OspfE1 => 2,
                RoutingProtocol::OspfE2 => 3,
                _ => 4,
            }
        }
        rank(existing)
            .cmp(&rank(candidate))
            .then(existing.metric.cmp(&candidate.metric))
            .then(cost_to_advertiser(existing).cmp(&cost_to_advertiser(candidate)))
    }
}

fn cost_to_advertiser(r: &Route) -> u32 {
    r.ospf().map(|a| a.cost_to_advertiser).unwrap_or_default()
}

/// Routing information base, parameterized by the preference strategy `P`.
pub struct Rib<P> {
    trie: RouteTrie,
    pref: PhantomData<P>,
}

impl<P: RibPreference> Rib<P> {
    /// Create an empty RIB.
    pub fn new() -> Self {
        Self {
            trie: RouteTrie::default(),
            pref: PhantomData,
        }
    }

    /// Merge a route into the RIB. Returns `true` if the RIB has changed.
    pub fn merge_route(&mut self, route: Route) -> bool {
        if route.non_routing && !P::ACCEPTS_NON_ROUTING {
            return false;
        }
        let routes = self.trie.entry(route.network);
        match routes.iter().next().map(|e| P::compare(&route, e)) {
            None | Some(Ordering::Equal) => routes.insert(route),
            Some(Ordering::Greater) => {
                routes.clear();
                routes.insert(route);
                true
            }
            Some(Ordering::Less) => false,
        }
    }

    /// Merge all routes of another RIB. Returns `true` if the RIB has changed.
    pub fn import<Q>(&mut self, other: &Rib<Q>) -> bool {
        other
            .iter()
            .fold(false, |changed, r| self.merge_route(r.clone()) || changed)
    }

    /// Merge all routes of an iterator. Returns `true` if the RIB has changed.
    pub fn extend<I: IntoIterator<Item = Route>>(&mut self, routes: I) -> bool {
        routes
            .into_iter()
            .fold(false, |changed, r| self.merge_route(r) || changed)
    }
}

impl<P> Rib<P> {
    /// Get the routes for the most specific prefix containing `ip`. Routes of less specific
    /// prefixes are never part of the result.
    pub fn longest_prefix_match(&self, ip: Ipv4Addr) -> BTreeSet<Route> {
        self.trie
            .longest_prefix_match(ip)
            .cloned()
            .unwrap_or_default()
    }

    /// Get the routes stored for exactly this prefix.
    pub fn get(&self, prefix: Prefix) -> Option<&BTreeSet<Route>> {
        self.trie.get(prefix).filter(|r| !r.is_empty())
    }

    /// Iterate over all routes in a deterministic order.
    pub fn iter(&self) -> impl Iterator<Item = &Route> + '_ {
        self.trie.iter()
    }

    /// Get all routes.
    pub fn routes(&self) -> BTreeSet<Route> {
        self.iter().cloned().collect()
    }

    /// Get all prefixes for which at least one route is stored.
    pub fn prefixes(&self) -> BTreeSet<Prefix> {
        self.iter().map(|r| r.network).collect()
    }

    /// Number of routes stored.
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// Returns `true` if no route is stored.
    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }
}

impl<P: RibPreference> Default for Rib<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> Clone for Rib<P> {
    fn clone(&self) -> Self {
        Self {
            trie: self.trie.clone(),
            pref: PhantomData,
        }
    }
}

impl<P> PartialEq for Rib<P> {
    fn eq(&self, other: &Self) -> bool {
        self.iter().eq(other.iter())
    }
}

impl<P> Eq for Rib<P> {}

impl<P> fmt::Debug for Rib<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}
