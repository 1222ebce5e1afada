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

use pretty_assertions::assert_eq;

use crate::{
    acl::LineAction,
    config::*,
    ip,
    network::Network,
    ospf::{OspfArea, OspfMetricType},
    prefix,
    route::{RouteBuilder, RoutingProtocol},
    route_map::{RouteFilterLine, RouteFilterList, RouteMapBuilder, RoutingPolicy},
    test::{enable_ospf, routes_for, two_routers, two_routers_edges},
    topology::Edge,
};

#[test]
fn intra_area() {
    let (mut r1, mut r2) = two_routers();
    enable_ospf(&mut r1);
    enable_ospf(&mut r2);
    let mut net = Network::new([r1, r2], two_routers_edges()).unwrap();
    let report = net.compute_data_plane().unwrap();
    assert!(report.ospf_internal_iterations >= 2);

    let routes = net.get_routes("r1", DEFAULT_VRF_NAME).unwrap();
    assert_eq!(routes.len(), 3);
    assert_eq!(
        routes_for(routes, prefix!("2.2.2.2/32" as)),
        vec![RouteBuilder::new(prefix!("2.2.2.2/32" as), RoutingProtocol::Ospf)
            .metric(2)
            .area(0)
            .next_hop_ip(ip!("10.0.0.2"))
            .build()]
    );

    // the connected route is preferred over the OSPF route of the same network
    let ospf = net.get_router("r1", DEFAULT_VRF_NAME).unwrap().ospf_rib();
    assert!(ospf.get(prefix!("10.0.0.0/30" as)).is_some());
    let main = net.get_router("r1", DEFAULT_VRF_NAME).unwrap().main_rib();
    assert!(main
        .get(prefix!("10.0.0.0/30" as))
        .unwrap()
        .iter()
        .all(|r| r.protocol == RoutingProtocol::Connected));
}

#[test]
fn passive_and_area_mismatch() {
    let (mut r1, mut r2) = two_routers();
    enable_ospf(&mut r1);
    enable_ospf(&mut r2);
    r2.interfaces.get_mut("eth0").unwrap().ospf_passive = true;
    let mut net = Network::new([r1.clone(), r2], two_routers_edges()).unwrap();
    net.compute_data_plane().unwrap();
    assert!(routes_for(
        net.get_routes("r1", DEFAULT_VRF_NAME).unwrap(),
        prefix!("2.2.2.2/32" as)
    )
    .is_empty());

    let (_, mut r2) = two_routers();
    enable_ospf(&mut r2);
    r2.interfaces.get_mut("eth0").unwrap().ospf_area = Some(OspfArea::from(1));
    let mut net = Network::new([r1, r2], two_routers_edges()).unwrap();
    net.compute_data_plane().unwrap();
    assert!(routes_for(
        net.get_routes("r1", DEFAULT_VRF_NAME).unwrap(),
        prefix!("2.2.2.2/32" as)
    )
    .is_empty());
}

/// `r1` (area 1) -- `r2` (area border router) -- `r3` (backbone)
fn abr_network(summary_filter: bool) -> Network {
    let mut r1 = Configuration::new("r1");
    r1.add_interface("eth0", Interface::new(prefix!("10.0.0.1/30")).ospf(1, 1));
    r1.add_interface("lo", Interface::new(prefix!("1.1.1.1/32")).ospf(1, 1));
    r1.vrf_mut(DEFAULT_VRF_NAME).ospf = Some(OspfProcess::default());

    let mut r2 = Configuration::new("r2");
    r2.add_interface("eth0", Interface::new(prefix!("10.0.0.2/30")).ospf(1, 1));
    r2.add_interface("eth1", Interface::new(prefix!("10.0.0.5/30")).ospf(0, 1));
    let mut process = OspfProcess::default();
    if summary_filter {
        r2.route_filter_lists.insert(
            "no-r3".to_string(),
            RouteFilterList::new([
                RouteFilterLine::exact(LineAction::Reject, prefix!("3.3.3.3/32" as)),
                RouteFilterLine::or_longer(LineAction::Permit, prefix!("0.0.0.0/0" as)),
            ]),
        );
        process.areas.insert(
            OspfArea::from(1),
            OspfAreaConfig {
                summary_filter: Some("no-r3".to_string()),
            },
        );
    }
    r2.vrf_mut(DEFAULT_VRF_NAME).ospf = Some(process);

    let mut r3 = Configuration::new("r3");
    r3.add_interface("eth1", Interface::new(prefix!("10.0.0.6/30")).ospf(0, 1));
    r3.add_interface("lo", Interface::new(prefix!("3.3.3.3/32")).ospf(0, 1));
    r3.vrf_mut(DEFAULT_VRF_NAME).ospf = Some(OspfProcess::default());

    Network::new(
        [r1, r2, r3],
        [
            Edge::new("r1", "eth0", "r2", "eth0"),
            Edge::new("r2", "eth1", "r3", "eth1"),
        ],
    )
    .unwrap()
}

#[test]
fn inter_area() {
    let mut net = abr_network(false);
    net.compute_data_plane().unwrap();

    let r3 = routes_for(
        net.get_routes("r3", DEFAULT_VRF_NAME).unwrap(),
        prefix!("1.1.1.1/32" as),
    );
    assert_eq!(r3.len(), 1);
    assert_eq!(r3[0].protocol, RoutingProtocol::OspfIa);
    assert_eq!(r3[0].metric, 3);
    assert_eq!(r3[0].next_hop_ip, Some(ip!("10.0.0.5")));

    let r1 = routes_for(
        net.get_routes("r1", DEFAULT_VRF_NAME).unwrap(),
        prefix!("3.3.3.3/32" as),
    );
    assert_eq!(r1.len(), 1);
    assert_eq!(r1[0].protocol, RoutingProtocol::OspfIa);
    assert_eq!(r1[0].metric, 3);

    // the area border router knows both as intra-area routes
    let r2 = net.get_routes("r2", DEFAULT_VRF_NAME).unwrap();
    for p in [prefix!("1.1.1.1/32" as), prefix!("3.3.3.3/32" as)] {
        let routes = routes_for(r2.clone(), p);
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].protocol, RoutingProtocol::Ospf);
    }
}

#[test]
fn summary_filter() {
    let mut net = abr_network(true);
    net.compute_data_plane().unwrap();

    let r1 = net.get_routes("r1", DEFAULT_VRF_NAME).unwrap();
    assert!(routes_for(r1.clone(), prefix!("3.3.3.3/32" as)).is_empty());
    assert_eq!(routes_for(r1, prefix!("10.0.0.4/30" as)).len(), 1);

    // the filter only applies to routes sent into area 1
    let r3 = net.get_routes("r3", DEFAULT_VRF_NAME).unwrap();
    assert_eq!(routes_for(r3, prefix!("1.1.1.1/32" as)).len(), 1);
}

fn external_network(metric_type: OspfMetricType) -> Network {
    let (mut r1, mut r2) = two_routers();
    enable_ospf(&mut r1);
    enable_ospf(&mut r2);
    r2.vrf_mut(DEFAULT_VRF_NAME)
        .static_routes
        .push(StaticRoute::via_interface(
            prefix!("99.0.0.0/8" as),
            NULL_INTERFACE_NAME,
        ));
    r2.routing_policies.insert(
        "redistribute".to_string(),
        RoutingPolicy::new([RouteMapBuilder::new()
            .order(10)
            .allow()
            .match_protocol(RoutingProtocol::Static)
            .set_ospf_metric_type(metric_type)
            .build()]),
    );
    if let Some(process) = r2.vrf_mut(DEFAULT_VRF_NAME).ospf.as_mut() {
        process.export_policy = Some("redistribute".to_string());
    }
    Network::new([r1, r2], two_routers_edges()).unwrap()
}

#[test]
fn external_type_2() {
    let mut net = external_network(OspfMetricType::E2);
    net.compute_data_plane().unwrap();

    let routes = routes_for(
        net.get_routes("r1", DEFAULT_VRF_NAME).unwrap(),
        prefix!("99.0.0.0/8" as),
    );
    assert_eq!(routes.len(), 1);
    assert_eq!(routes[0].protocol, RoutingProtocol::OspfE2);
    assert_eq!(routes[0].metric, 20);
    assert_eq!(routes[0].admin, 110);
    assert_eq!(routes[0].next_hop_ip, Some(ip!("10.0.0.2")));
    assert_eq!(routes[0].ospf().unwrap().cost_to_advertiser, 1);
    assert_eq!(routes[0].ospf().unwrap().advertiser.as_deref(), Some("r2"));

    // the exporting router keeps its static route
    let routes = routes_for(
        net.get_routes("r2", DEFAULT_VRF_NAME).unwrap(),
        prefix!("99.0.0.0/8" as),
    );
    assert_eq!(routes.len(), 1);
    assert_eq!(routes[0].protocol, RoutingProtocol::Static);
}

#[test]
fn external_type_1() {
    let mut net = external_network(OspfMetricType::E1);
    net.compute_data_plane().unwrap();

    let routes = routes_for(
        net.get_routes("r1", DEFAULT_VRF_NAME).unwrap(),
        prefix!("99.0.0.0/8" as),
    );
    assert_eq!(routes.len(), 1);
    assert_eq!(routes[0].protocol, RoutingProtocol::OspfE1);
    assert_eq!(routes[0].metric, 21);
}

#[test]
fn interface_cost_from_bandwidth() {
    let process = OspfProcess::default();
    let mut iface = Interface::new(prefix!("10.0.0.1/30"));
    assert_eq!(process.interface_cost(&iface), 1);
    iface.bandwidth = Some(10e6);
    assert_eq!(process.interface_cost(&iface), 10);
    iface.bandwidth = Some(1e9);
    assert_eq!(process.interface_cost(&iface), 1);
    iface.ospf_cost = Some(42);
    assert_eq!(process.interface_cost(&iface), 42);
}
