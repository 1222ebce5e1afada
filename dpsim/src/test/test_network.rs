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

use maplit::btreeset;
use pretty_assertions::assert_eq;

use crate::{
    config::*,
    ip,
    network::Network,
    prefix,
    route::{RouteBuilder, RoutingProtocol},
    route_map::{RouteMapBuilder, RoutingPolicy},
    test::{enable_ospf, routes_for, two_routers, two_routers_edges},
    topology::Edge,
    types::{AsId, ConfigError, NetworkError},
};

#[test]
fn connected_routes() {
    let (r1, r2) = two_routers();
    let mut net = Network::new([r1, r2], two_routers_edges()).unwrap();
    let report = net.compute_data_plane().unwrap();
    assert_eq!(report.total_routes, 4);
    assert_eq!(
        net.get_routes("r1", DEFAULT_VRF_NAME).unwrap(),
        btreeset! {
            RouteBuilder::new(prefix!("10.0.0.0/30" as), RoutingProtocol::Connected)
                .next_hop_interface("eth0")
                .build(),
            RouteBuilder::new(prefix!("1.1.1.1/32" as), RoutingProtocol::Connected)
                .next_hop_interface("lo")
                .build(),
        }
    );
}

#[test]
fn idempotent() {
    let (mut r1, mut r2) = two_routers();
    enable_ospf(&mut r1);
    enable_ospf(&mut r2);
    // a recursive static route, resolved through OSPF
    r1.vrf_mut(DEFAULT_VRF_NAME)
        .static_routes
        .push(StaticRoute::via_ip(prefix!("3.3.3.0/24" as), ip!("2.2.2.2")));
    // an eBGP session that redistributes the main RIBs
    for (c, router_id, local_as, peer, remote_as, local_ip) in [
        (&mut r1, ip!("1.1.1.1"), 65001, ip!("10.0.0.2"), 65002, ip!("10.0.0.1")),
        (&mut r2, ip!("2.2.2.2"), 65002, ip!("10.0.0.1"), 65001, ip!("10.0.0.2")),
    ] {
        let mut bgp = BgpProcess {
            router_id: Some(router_id),
            local_as: Some(AsId(local_as)),
            neighbors: Default::default(),
        };
        bgp.neighbors
            .insert(peer, BgpNeighbor::new(remote_as, local_ip));
        c.vrf_mut(DEFAULT_VRF_NAME).bgp = Some(bgp);
    }
    let mut net = Network::new([r1, r2], two_routers_edges()).unwrap();
    let fibs = |net: &Network| {
        net.routers()
            .map(|r| r.fib().cloned())
            .collect::<Vec<_>>()
    };

    let first = net.compute_data_plane().unwrap();
    let first_routes = net.all_routes();
    let first_fibs = fibs(&net);
    assert!(first_fibs.iter().all(Option::is_some));
    assert!(first.bgp_iterations.values().any(|i| *i > 1));
    assert_eq!(
        routes_for(
            first_routes["r2"][DEFAULT_VRF_NAME].clone(),
            prefix!("3.3.3.0/24" as)
        )
        .len(),
        1
    );

    let second = net.compute_data_plane().unwrap();
    assert_eq!(first, second);
    assert_eq!(first_routes, net.all_routes());
    assert_eq!(first_fibs, fibs(&net));
    assert_eq!(net.report(), Some(&second));
}

#[test]
fn no_convergence() {
    let (mut r1, mut r2) = two_routers();
    enable_ospf(&mut r1);
    enable_ospf(&mut r2);
    let mut net = Network::new([r1, r2], two_routers_edges()).unwrap();
    net.set_max_iterations(1);
    assert_eq!(net.compute_data_plane(), Err(NetworkError::NoConvergence(1)));
    assert!(net.report().is_none());
}

#[test]
fn queries_before_computation() {
    let (r1, r2) = two_routers();
    let net = Network::new([r1, r2], two_routers_edges()).unwrap();
    assert_eq!(
        net.get_forwarding_state().err(),
        Some(NetworkError::FibNotComputed)
    );
    assert!(net.report().is_none());
    assert_eq!(
        net.get_routes("r3", DEFAULT_VRF_NAME).err(),
        Some(NetworkError::RouterNotFound(
            "r3".to_string(),
            DEFAULT_VRF_NAME.to_string()
        ))
    );
}

#[test]
fn invalid_configurations() {
    let (r1, _) = two_routers();
    assert_eq!(
        Network::new([r1.clone(), r1.clone()], []).err(),
        Some(NetworkError::ConfigError(ConfigError::DuplicateHostname(
            "r1".to_string()
        )))
    );

    let mut broken = r1;
    broken
        .vrf_mut(DEFAULT_VRF_NAME)
        .static_routes
        .push(StaticRoute {
            next_hop_ip: None,
            ..StaticRoute::via_ip(prefix!("20.0.0.0/8" as), ip!("10.0.0.2"))
        });
    assert_eq!(
        Network::new([broken], []).err(),
        Some(NetworkError::ConfigError(ConfigError::InvalidStaticRoute(
            "r1".to_string(),
            prefix!("20.0.0.0/8" as)
        )))
    );
}

#[test]
fn topology() {
    let (r1, r2) = two_routers();
    let net = Network::new(
        [r1, r2],
        [
            Edge::new("r1", "eth0", "r2", "eth0"),
            Edge::new("r1", "eth0", "r3", "eth0"),
            Edge::new("r1", "eth5", "r2", "eth0"),
        ],
    )
    .unwrap();
    assert_eq!(
        net.topology().edges().cloned().collect::<Vec<_>>(),
        vec![
            Edge::new("r1", "eth0", "r2", "eth0"),
            Edge::new("r2", "eth0", "r1", "eth0"),
        ]
    );
    assert_eq!(net.ip_owners()[&ip!("10.0.0.2")], btreeset! {"r2".to_string()});
}

#[test]
fn static_route_activation() {
    let (mut r1, r2) = two_routers();
    let vrf = r1.vrf_mut(DEFAULT_VRF_NAME);
    vrf.static_routes.extend([
        StaticRoute::via_ip(prefix!("20.0.0.0/8" as), ip!("10.0.0.2")),
        // only resolvable through itself
        StaticRoute::via_ip(prefix!("30.0.0.0/8" as), ip!("30.1.1.1")),
        // not resolvable at all
        StaticRoute::via_ip(prefix!("40.0.0.0/8" as), ip!("50.0.0.1")),
        // resolvable through another static route
        StaticRoute::via_ip(prefix!("60.0.0.0/8" as), ip!("20.1.1.1")),
        StaticRoute::via_interface(prefix!("70.0.0.0/8" as), NULL_INTERFACE_NAME),
    ]);
    let mut net = Network::new([r1, r2], two_routers_edges()).unwrap();
    let report = net.compute_data_plane().unwrap();
    assert!(report.dependent_routes_iterations >= 3);

    let statics = net
        .get_routes("r1", DEFAULT_VRF_NAME)
        .unwrap()
        .into_iter()
        .filter(|r| r.protocol == RoutingProtocol::Static)
        .map(|r| r.network)
        .collect::<std::collections::BTreeSet<_>>();
    assert_eq!(
        statics,
        btreeset! {
            prefix!("20.0.0.0/8" as),
            prefix!("60.0.0.0/8" as),
            prefix!("70.0.0.0/8" as),
        }
    );
}

#[test]
fn static_route_on_inactive_interface() {
    let (mut r1, r2) = two_routers();
    let mut eth1 = Interface::new(prefix!("172.16.0.1/24"));
    eth1.active = false;
    r1.add_interface("eth1", eth1);
    r1.vrf_mut(DEFAULT_VRF_NAME)
        .static_routes
        .push(StaticRoute::via_interface(prefix!("80.0.0.0/8" as), "eth1"));
    let mut net = Network::new([r1, r2], two_routers_edges()).unwrap();
    net.compute_data_plane().unwrap();

    let routes = net.get_routes("r1", DEFAULT_VRF_NAME).unwrap();
    assert!(routes_for(routes.clone(), prefix!("80.0.0.0/8" as)).is_empty());
    assert!(routes_for(routes, prefix!("172.16.0.0/24" as)).is_empty());
    assert!(!net.ip_owners().contains_key(&ip!("172.16.0.1")));
}

fn generated_route_network(contributor: &str) -> Network {
    let (mut r1, r2) = two_routers();
    r1.routing_policies.insert(
        "contributors".to_string(),
        RoutingPolicy::new([RouteMapBuilder::new()
            .order(10)
            .allow()
            .match_prefix(contributor.parse().unwrap())
            .build()]),
    );
    let vrf = r1.vrf_mut(DEFAULT_VRF_NAME);
    vrf.static_routes.push(StaticRoute::via_interface(
        prefix!("10.1.0.0/16" as),
        NULL_INTERFACE_NAME,
    ));
    vrf.generated_routes.push(GeneratedRoute {
        generation_policy: Some("contributors".to_string()),
        discard: true,
        ..GeneratedRoute::new(prefix!("10.0.0.0/8" as))
    });
    vrf.generated_routes
        .push(GeneratedRoute::new(prefix!("0.0.0.0/0" as)));
    Network::new([r1, r2], two_routers_edges()).unwrap()
}

#[test]
fn generated_routes() {
    let mut net = generated_route_network("10.1.0.0/16");
    net.compute_data_plane().unwrap();
    let routes = net.get_routes("r1", DEFAULT_VRF_NAME).unwrap();

    let aggregate = routes_for(routes.clone(), prefix!("10.0.0.0/8" as));
    assert_eq!(
        aggregate,
        vec![
            RouteBuilder::new(prefix!("10.0.0.0/8" as), RoutingProtocol::Aggregate)
                .next_hop_interface(NULL_INTERFACE_NAME)
                .build()
        ]
    );
    // routes without a generation policy are always active
    assert_eq!(routes_for(routes, prefix!("0.0.0.0/0" as)).len(), 1);

    let mut net = generated_route_network("10.2.0.0/16");
    net.compute_data_plane().unwrap();
    let routes = net.get_routes("r1", DEFAULT_VRF_NAME).unwrap();
    assert!(routes_for(routes, prefix!("10.0.0.0/8" as)).is_empty());
}

#[test]
fn vrfs() {
    let (mut r1, r2) = two_routers();
    r1.add_interface(
        "eth1",
        Interface::new(prefix!("192.168.0.1/24")).in_vrf("blue"),
    );
    let mut net = Network::new([r1, r2], two_routers_edges()).unwrap();
    net.compute_data_plane().unwrap();

    let all = net.all_routes();
    assert_eq!(
        all["r1"].keys().collect::<Vec<_>>(),
        vec!["blue", DEFAULT_VRF_NAME]
    );
    assert_eq!(
        all["r1"]["blue"]
            .iter()
            .map(|r| r.network)
            .collect::<Vec<_>>(),
        vec![prefix!("192.168.0.0/24" as)]
    );
    assert!(routes_for(all["r1"][DEFAULT_VRF_NAME].clone(), prefix!("192.168.0.0/24" as))
        .is_empty());
    assert_eq!(net.routers().count(), 3);
}

#[test]
fn missing_references_are_warnings() {
    let (mut r1, r2) = two_routers();
    r1.interfaces.get_mut("eth0").unwrap().outgoing_filter = Some("acl".to_string());
    r1.vrf_mut(DEFAULT_VRF_NAME)
        .generated_routes
        .push(GeneratedRoute {
            attribute_policy: Some("attributes".to_string()),
            ..GeneratedRoute::new(prefix!("0.0.0.0/0" as))
        });
    let mut net = Network::new([r1, r2], two_routers_edges()).unwrap();
    let report = net.compute_data_plane().unwrap();
    assert_eq!(
        report.warnings,
        maplit::btreemap! {
            "r1:default".to_string() => btreeset! {
                "missing ip access list acl (on eth0)".to_string(),
                "missing routing policy attributes (attribute policy of 0.0.0.0/0)".to_string(),
            }
        }
    );
    // the generated route is not activated without its attribute policy
    let routes = net.get_routes("r1", DEFAULT_VRF_NAME).unwrap();
    assert!(routes_for(routes, prefix!("0.0.0.0/0" as)).is_empty());
}

#[test]
fn external_advertisements_invalidate_the_data_plane() {
    let (r1, r2) = two_routers();
    let mut net = Network::new([r1, r2], two_routers_edges()).unwrap();
    net.compute_data_plane().unwrap();
    assert!(net.get_forwarding_state().is_ok());
    net.add_external_advertisements([]);
    assert!(net.get_forwarding_state().is_err());
}
