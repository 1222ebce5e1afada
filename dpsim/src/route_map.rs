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

//! # Routing Policies
//!
//! A [`RoutingPolicy`] is an ordered list of route maps ([`RouteMap`]). The engine invokes a policy
//! whenever a route is imported, exported or used to generate another route. The policy matches on
//! the *input* route and writes its set actions into the *output* [`RouteBuilder`]. It returns
//! whether the route is permitted. A route that matches no `allow` route map is denied.
//!
//! This module also contains [`RouteFilterList`], an ordered list of prefix ranges used by policies
//! and by OSPF summary filters.

use std::{
    cmp::Ordering,
    collections::{BTreeMap, BTreeSet},
    fmt,
    net::Ipv4Addr,
};

use serde::{Deserialize, Serialize};

use crate::{
    acl::LineAction,
    config::Configuration,
    ospf::OspfMetricType,
    route::{Route, RouteBuilder, RoutingProtocol},
    types::{AsId, Prefix},
};

/// Context in which a policy is evaluated.
#[derive(Debug, Clone, Copy)]
pub struct PolicyContext<'a> {
    /// Configuration of the device evaluating the policy. Used to resolve named route filter lists.
    pub config: &'a Configuration,
    /// Address of the BGP peer that sends or receives the route, if any.
    pub peer_address: Option<Ipv4Addr>,
}

impl<'a> PolicyContext<'a> {
    /// Create a context without a peer.
    pub fn new(config: &'a Configuration) -> Self {
        Self {
            config,
            peer_address: None,
        }
    }

    /// Create a context for a BGP session with the given peer.
    pub fn peer(config: &'a Configuration, peer_address: Ipv4Addr) -> Self {
        Self {
            config,
            peer_address: Some(peer_address),
        }
    }
}

/// Ordered sequence of route maps.
///
/// ```
/// # use dpsim::route_map::*;
/// # use dpsim::route::*;
/// # use dpsim::config::Configuration;
/// # use dpsim::prefix;
/// let policy = RoutingPolicy::new([
///     RouteMapBuilder::new()
///         .order(10)
///         .deny()
///         .match_prefix(prefix!("10.0.0.0/8" as))
///         .build(),
///     RouteMapBuilder::new()
///         .order(20)
///         .allow()
///         .set_local_pref(200)
///         .build(),
/// ]);
/// assert!(policy.validate().is_ok());
///
/// let config = Configuration::new("r1");
/// let ctx = PolicyContext::new(&config);
/// let route = RouteBuilder::new(prefix!("20.0.0.0/8" as), RoutingProtocol::Bgp).build();
/// let mut out = route.to_builder();
/// assert!(policy.process(&route, &mut out, &ctx));
/// assert_eq!(out.local_pref, 200);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingPolicy {
    /// Route maps, sorted by their order
    pub clauses: Vec<RouteMap>,
}

impl RoutingPolicy {
    /// Create a policy from a set of route maps. The route maps are sorted by their order.
    pub fn new(clauses: impl IntoIterator<Item = RouteMap>) -> Self {
        let mut clauses: Vec<RouteMap> = clauses.into_iter().collect();
        clauses.sort_by_key(|c| c.order);
        Self { clauses }
    }

    /// A policy that permits every route without modification.
    pub fn permit_all() -> Self {
        Self::new([RouteMapBuilder::new().order(10).allow().build()])
    }

    /// Check that the control flow of the policy is consistent: the route maps must have distinct
    /// orders in increasing sequence, and every `continue_at` must point to a later route map.
    pub fn validate(&self) -> Result<(), String> {
        for w in self.clauses.windows(2) {
            if w[0].order >= w[1].order {
                return Err(format!(
                    "route maps are not strictly ordered ({} before {})",
                    w[0].order, w[1].order
                ));
            }
        }
        for c in self.clauses.iter() {
            if let RouteMapFlow::ContinueAt(target) = c.flow {
                if target <= c.order {
                    return Err(format!(
                        "route map {} continues at earlier route map {target}",
                        c.order
                    ));
                }
                if !self.clauses.iter().any(|x| x.order == target) {
                    return Err(format!(
                        "route map {} continues at missing route map {target}",
                        c.order
                    ));
                }
            }
        }
        Ok(())
    }

    /// Evaluate the policy. Match conditions are evaluated on `input`, set actions are written into
    /// `output`. Returns `true` if the route is permitted.
    pub fn process(&self, input: &Route, output: &mut RouteBuilder, ctx: &PolicyContext) -> bool {
        let mut permitted = false;
        let mut wait_for = None;
        for map in self.clauses.iter() {
            if let Some(x) = wait_for {
                match map.order.cmp(&x) {
                    Ordering::Less => continue,
                    Ordering::Equal => wait_for = None,
                    Ordering::Greater => break,
                }
            }
            match map.apply(input, output, ctx) {
                None => {}
                Some(RouteMapState::Deny) => return false,
                Some(RouteMapState::Allow) => {
                    permitted = true;
                    match map.flow {
                        RouteMapFlow::Exit => break,
                        RouteMapFlow::Continue => {}
                        RouteMapFlow::ContinueAt(x) => wait_for = Some(x),
                    }
                }
            }
        }
        permitted
    }

    /// Names of all route filter lists referenced by the policy.
    pub fn route_filter_lists(&self) -> impl Iterator<Item = &String> + '_ {
        self.clauses.iter().flat_map(|c| {
            c.conds.iter().filter_map(|m| match m {
                RouteMapMatch::RouteFilter(name) => Some(name),
                _ => None,
            })
        })
    }
}

/// # Route Map
/// A route map matches on a route to change some attributes of the output route, or to deny it.
/// Use the [`RouteMapBuilder`] to conveniently build a route map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteMap {
    /// In which order should the route maps be checked. Lower values mean that they are checked
    /// earlier.
    pub order: i16,
    /// Either Allow or Deny.
    pub state: RouteMapState,
    /// Match statements of the RouteMap, connected in an and
    #[serde(default)]
    pub conds: Vec<RouteMapMatch>,
    /// Set actions of the RouteMap
    #[serde(default)]
    pub set: Vec<RouteMapSet>,
    /// What to do after an `allow` route map matched.
    #[serde(default)]
    pub flow: RouteMapFlow,
}

impl RouteMap {
    /// Apply the route map. Returns `None` if the route map does not match. Otherwise, the set
    /// actions are applied (for `allow` route maps) and the state is returned.
    pub fn apply(
        &self,
        input: &Route,
        output: &mut RouteBuilder,
        ctx: &PolicyContext,
    ) -> Option<RouteMapState> {
        if !self.matches(input, ctx) {
            return None;
        }
        if self.state.is_allow() {
            self.set.iter().for_each(|s| s.apply(output));
        }
        Some(self.state)
    }

    /// Returns wether the route map matches the given route
    pub fn matches(&self, route: &Route, ctx: &PolicyContext) -> bool {
        self.conds.iter().all(|c| c.matches(route, ctx))
    }
}

/// # Route Map Builder
///
/// Convenience type to build a route map. Without any match condition, the route map matches every
/// route. The default state is `allow`, and the default flow is [`RouteMapFlow::Exit`].
///
/// ```
/// # use dpsim::route_map::*;
/// # use dpsim::prefix;
/// let map = RouteMapBuilder::new()
///     .order(10)
///     .allow()
///     .match_prefix(prefix!("10.0.0.0/8" as))
///     .set_community(1)
///     .continue_next()
///     .build();
/// ```
#[derive(Debug, Default)]
pub struct RouteMapBuilder {
    order: i16,
    state: RouteMapState,
    conds: Vec<RouteMapMatch>,
    set: Vec<RouteMapSet>,
    prefix_conds: BTreeSet<Prefix>,
    flow: RouteMapFlow,
}

impl RouteMapBuilder {
    /// Create an empty RouteMapBuilder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the order of the Route-Map.
    pub fn order(&mut self, order: i16) -> &mut Self {
        self.order = order;
        self
    }

    /// Set the state of the Route-Map to allow.
    pub fn allow(&mut self) -> &mut Self {
        self.state = RouteMapState::Allow;
        self
    }

    /// Set the state of the Route-Map to deny.
    pub fn deny(&mut self) -> &mut Self {
        self.state = RouteMapState::Deny;
        self
    }

    /// Add a match condition to the Route-Map.
    pub fn cond(&mut self, cond: RouteMapMatch) -> &mut Self {
        self.conds.push(cond);
        self
    }

    /// Match on the exact prefix. If you call this function multiple times with different
    /// prefixes, then any of them will be matched.
    pub fn match_prefix(&mut self, prefix: Prefix) -> &mut Self {
        self.prefix_conds.insert(prefix);
        self
    }

    /// Match on the prefix using a named route filter list.
    pub fn match_route_filter(&mut self, name: impl Into<String>) -> &mut Self {
        self.cond(RouteMapMatch::RouteFilter(name.into()))
    }

    /// Match on the protocol of the route.
    pub fn match_protocol(&mut self, protocol: RoutingProtocol) -> &mut Self {
        self.cond(RouteMapMatch::Protocol(protocol))
    }

    /// Match if the AS path contains `as_id`.
    pub fn match_as_path_contains(&mut self, as_id: impl Into<AsId>) -> &mut Self {
        self.cond(RouteMapMatch::AsPath(RouteMapMatchAsPath::Contains(
            as_id.into(),
        )))
    }

    /// Match on the length of the AS path.
    pub fn match_as_path_length(&mut self, len: usize) -> &mut Self {
        self.cond(RouteMapMatch::AsPath(RouteMapMatchAsPath::Length(
            RouteMapMatchClause::Equal(len),
        )))
    }

    /// Match if the route carries the community.
    pub fn match_community(&mut self, community: u32) -> &mut Self {
        self.cond(RouteMapMatch::Community(community))
    }

    /// Match if the route does not carry the community.
    pub fn match_deny_community(&mut self, community: u32) -> &mut Self {
        self.cond(RouteMapMatch::DenyCommunity(community))
    }

    /// Match on the tag of the route.
    pub fn match_tag(&mut self, tag: u32) -> &mut Self {
        self.cond(RouteMapMatch::Tag(tag))
    }

    /// Match on the address of the BGP peer.
    pub fn match_neighbor(&mut self, peer: Ipv4Addr) -> &mut Self {
        self.cond(RouteMapMatch::Neighbor(peer))
    }

    /// Add a set action.
    pub fn add_set(&mut self, set: RouteMapSet) -> &mut Self {
        self.set.push(set);
        self
    }

    /// Set the next-hop IP.
    pub fn set_next_hop(&mut self, next_hop: Ipv4Addr) -> &mut Self {
        self.add_set(RouteMapSet::NextHop(next_hop))
    }

    /// Set the local preference.
    pub fn set_local_pref(&mut self, local_pref: u32) -> &mut Self {
        self.add_set(RouteMapSet::LocalPref(Some(local_pref)))
    }

    /// Reset the local preference to its default value.
    pub fn reset_local_pref(&mut self) -> &mut Self {
        self.add_set(RouteMapSet::LocalPref(None))
    }

    /// Set the metric (MED for BGP routes).
    pub fn set_metric(&mut self, metric: u32) -> &mut Self {
        self.add_set(RouteMapSet::Metric(Some(metric)))
    }

    /// Add a community.
    pub fn set_community(&mut self, community: u32) -> &mut Self {
        self.add_set(RouteMapSet::SetCommunity(community))
    }

    /// Remove a community.
    pub fn remove_community(&mut self, community: u32) -> &mut Self {
        self.add_set(RouteMapSet::DelCommunity(community))
    }

    /// Set the tag.
    pub fn set_tag(&mut self, tag: u32) -> &mut Self {
        self.add_set(RouteMapSet::Tag(tag))
    }

    /// Prepend AS numbers to the AS path.
    pub fn prepend_as_path<A>(&mut self, path: A) -> &mut Self
    where
        A: IntoIterator,
        A::Item: Into<AsId>,
    {
        self.add_set(RouteMapSet::PrependAsPath(
            path.into_iter().map(|x| x.into()).collect(),
        ))
    }

    /// Set the metric type of exported OSPF external routes.
    pub fn set_ospf_metric_type(&mut self, metric_type: OspfMetricType) -> &mut Self {
        self.add_set(RouteMapSet::OspfMetricType(metric_type))
    }

    /// Set the administrative distance.
    pub fn set_admin(&mut self, admin: u32) -> &mut Self {
        self.add_set(RouteMapSet::Admin(admin))
    }

    /// On a match, apply the set actions and stop.
    pub fn exit(&mut self) -> &mut Self {
        self.flow = RouteMapFlow::Exit;
        self
    }

    /// On a match, apply the set actions and continue with the next route map.
    pub fn continue_next(&mut self) -> &mut Self {
        self.flow = RouteMapFlow::Continue;
        self
    }

    /// On a match, apply the set actions and continue with the route map of the given order.
    pub fn continue_at(&mut self, order: i16) -> &mut Self {
        self.flow = RouteMapFlow::ContinueAt(order);
        self
    }

    /// Build the route-map.
    pub fn build(&self) -> RouteMap {
        let mut conds = self.conds.clone();
        if !self.prefix_conds.is_empty() {
            conds.push(RouteMapMatch::Prefix(self.prefix_conds.clone()));
        }
        let set = if self.state.is_deny() {
            vec![]
        } else {
            self.set.clone()
        };
        RouteMap {
            order: self.order,
            state: self.state,
            conds,
            set,
            flow: self.flow,
        }
    }
}

/// State of a route map, which can either be allow or deny
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteMapState {
    /// Permit the route
    #[default]
    Allow,
    /// Deny the route
    Deny,
}

impl RouteMapState {
    /// Returns `true` if the state is set to `Allow`.
    pub fn is_allow(&self) -> bool {
        self == &Self::Allow
    }

    /// Returns `true` if the state is set to `Deny`.
    pub fn is_deny(&self) -> bool {
        self == &Self::Deny
    }
}

/// Match statement of the route map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteMapMatch {
    /// Matches on the exact prefix
    Prefix(BTreeSet<Prefix>),
    /// Matches if the named route filter list permits the prefix. A missing list matches nothing.
    RouteFilter(String),
    /// Matches on the protocol
    Protocol(RoutingProtocol),
    /// Matches on the As Path (either if it contains an as, or on the length of the path)
    AsPath(RouteMapMatchAsPath),
    /// Matches if the community is present
    Community(u32),
    /// Matches if the community is absent
    DenyCommunity(u32),
    /// Matches on the route tag
    Tag(u32),
    /// Matches on the address of the BGP peer
    Neighbor(Ipv4Addr),
    /// Matches on the next-hop IP
    NextHop(Ipv4Addr),
}

impl RouteMapMatch {
    /// Returns true if the route matches the expression
    pub fn matches(&self, route: &Route, ctx: &PolicyContext) -> bool {
        let has_community = |c: &u32| route.bgp().map(|a| a.communities.contains(c)) == Some(true);
        match self {
            Self::Prefix(prefixes) => prefixes.contains(&route.network),
            Self::RouteFilter(name) => ctx
                .config
                .route_filter_lists
                .get(name)
                .map(|l| l.permits(&route.network))
                .unwrap_or(false),
            Self::Protocol(p) => route.protocol == *p,
            Self::AsPath(clause) => {
                clause.matches(route.bgp().map(|a| a.as_path.as_slice()).unwrap_or(&[]))
            }
            Self::Community(c) => has_community(c),
            Self::DenyCommunity(c) => !has_community(c),
            Self::Tag(t) => route.tag == Some(*t),
            Self::Neighbor(n) => ctx.peer_address == Some(*n),
            Self::NextHop(nh) => route.next_hop_ip == Some(*nh),
        }
    }
}

/// Generic RouteMapMatchClause to match on a range or on a specific element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteMapMatchClause<T> {
    /// Matches a range of values (inclusive)
    Range(T, T),
    /// Matches a range of values (exclusive)
    RangeExclusive(T, T),
    /// Matches the exact value
    Equal(T),
}

impl<T> RouteMapMatchClause<T>
where
    T: PartialOrd + PartialEq,
{
    /// Returns true if the value matches the clause.
    pub fn matches(&self, val: &T) -> bool {
        match self {
            Self::Range(min, max) => val >= min && val <= max,
            Self::RangeExclusive(min, max) => val >= min && val < max,
            Self::Equal(x) => val == x,
        }
    }
}

impl<T> fmt::Display for RouteMapMatchClause<T>
where
    T: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteMapMatchClause::Range(a, b) => write!(f, "in ({a}..{b})"),
            RouteMapMatchClause::RangeExclusive(a, b) => write!(f, "in ({a}..{b}])"),
            RouteMapMatchClause::Equal(a) => write!(f, "== {a}"),
        }
    }
}

/// Clause to match on the as path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteMapMatchAsPath {
    /// Contains a specific AsId
    Contains(AsId),
    /// Match on the length of the As Path
    Length(RouteMapMatchClause<usize>),
}

impl RouteMapMatchAsPath {
    /// Returns true if the value matches the clause
    pub fn matches(&self, path: &[AsId]) -> bool {
        match self {
            Self::Contains(as_id) => path.contains(as_id),
            Self::Length(clause) => clause.matches(&path.len()),
        }
    }
}

impl fmt::Display for RouteMapMatchAsPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteMapMatchAsPath::Contains(as_id) => write!(f, "{} in AsPath", as_id.0),
            RouteMapMatchAsPath::Length(c) => write!(f, "len(AsPath) {c}"),
        }
    }
}

/// Set action, if a route map matches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteMapSet {
    /// overwrite the next hop
    NextHop(Ipv4Addr),
    /// overwrite the local preference (None means reset to 100)
    LocalPref(Option<u32>),
    /// overwrite the metric (None means reset to 0)
    Metric(Option<u32>),
    /// Set the community value
    SetCommunity(u32),
    /// Remove the community value
    DelCommunity(u32),
    /// overwrite the tag
    Tag(u32),
    /// Prepend the AS numbers to the AS path
    PrependAsPath(Vec<AsId>),
    /// Metric type of exported OSPF routes
    OspfMetricType(OspfMetricType),
    /// overwrite the administrative distance
    Admin(u32),
}

impl RouteMapSet {
    /// Apply the set statement to the output route
    pub fn apply(&self, route: &mut RouteBuilder) {
        match self {
            Self::NextHop(nh) => route.next_hop_ip = Some(*nh),
            Self::LocalPref(lp) => {
                route.local_pref = lp.unwrap_or(crate::bgp::DEFAULT_LOCAL_PREF);
            }
            Self::Metric(m) => route.metric = m.unwrap_or(0),
            Self::SetCommunity(c) => {
                route.communities.insert(*c);
            }
            Self::DelCommunity(c) => {
                route.communities.remove(c);
            }
            Self::Tag(t) => route.tag = Some(*t),
            Self::PrependAsPath(path) => {
                route.as_path.splice(0..0, path.iter().copied());
            }
            Self::OspfMetricType(t) => route.ospf_metric_type = *t,
            Self::Admin(a) => route.admin = Some(*a),
        }
    }
}

/// Description of the control-flow of route maps. It changes what happens when an `allow` route
/// map matches the given route.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteMapFlow {
    /// If a route matches this route-map, apply the set actions and stop.
    #[default]
    Exit,
    /// If a route matches this route-map, apply the set actions and continue to the next entry in
    /// the list.
    Continue,
    /// If a route matches this route-map, apply the set actions and continue to the route-map with
    /// the given order.
    ContinueAt(i16),
}

impl fmt::Display for RouteMapFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteMapFlow::Exit => write!(f, "break"),
            RouteMapFlow::Continue => write!(f, "continue"),
            RouteMapFlow::ContinueAt(c) => write!(f, "continue at {c}"),
        }
    }
}

/// A single line of a [`RouteFilterList`]. It matches every prefix contained in `prefix` whose
/// length is within `min_len..=max_len`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteFilterLine {
    /// Action if the line matches
    pub action: LineAction,
    /// Covering prefix
    pub prefix: Prefix,
    /// Minimum prefix length (defaults to the length of `prefix`)
    #[serde(default)]
    pub min_len: Option<u8>,
    /// Maximum prefix length (defaults to the length of `prefix`)
    #[serde(default)]
    pub max_len: Option<u8>,
}

impl RouteFilterLine {
    /// Match exactly this prefix
    pub fn exact(action: LineAction, prefix: Prefix) -> Self {
        Self {
            action,
            prefix,
            min_len: None,
            max_len: None,
        }
    }

    /// Match this prefix and every more specific prefix
    pub fn or_longer(action: LineAction, prefix: Prefix) -> Self {
        Self {
            action,
            prefix,
            min_len: None,
            max_len: Some(crate::types::MAX_PREFIX_LENGTH),
        }
    }

    /// Returns `true` if the line matches the network.
    pub fn matches(&self, network: &Prefix) -> bool {
        let min = self.min_len.unwrap_or(self.prefix.len());
        let max = self.max_len.unwrap_or(self.prefix.len());
        self.prefix.contains_prefix(network) && (min..=max).contains(&network.len())
    }
}

/// Ordered list of prefix ranges. The first matching line decides; no match means deny.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteFilterList {
    /// Lines of the list
    pub lines: Vec<RouteFilterLine>,
}

impl RouteFilterList {
    /// Create a new list.
    pub fn new(lines: impl IntoIterator<Item = RouteFilterLine>) -> Self {
        Self {
            lines: lines.into_iter().collect(),
        }
    }

    /// Returns `true` if the network is permitted.
    pub fn permits(&self, network: &Prefix) -> bool {
        self.lines
            .iter()
            .find(|l| l.matches(network))
            .map(|l| l.action == LineAction::Permit)
            .unwrap_or(false)
    }
}

/// Collect the names of all route filter lists referenced by a set of policies.
pub(crate) fn referenced_filter_lists(
    policies: &BTreeMap<String, RoutingPolicy>,
) -> BTreeSet<&String> {
    policies
        .values()
        .flat_map(|p| p.route_filter_lists())
        .collect()
}
