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

use std::net::Ipv4Addr;

use maplit::{btreemap, btreeset};
use pretty_assertions::assert_eq;

use crate::{
    fib::*,
    ip, prefix,
    rib::{MainPreference, Rib},
    route::{RouteBuilder, RoutingProtocol},
    test::static_route,
    types::{NetworkError, Prefix},
};

fn connected(network: Prefix, iface: &str) -> crate::route::Route {
    RouteBuilder::new(network, RoutingProtocol::Connected)
        .next_hop_interface(iface)
        .build()
}

/// A chain of `n` static routes for `100.0.0.k/32` that point to `100.0.0.(k+1)`, ending at a
/// connected route for `100.0.0.n/32`.
fn chain(n: u8) -> Rib<MainPreference> {
    let mut rib = Rib::new();
    for k in 0..n {
        rib.merge_route(
            static_route(Prefix::host(Ipv4Addr::new(100, 0, 0, k)))
                .next_hop_ip(Ipv4Addr::new(100, 0, 0, k + 1))
                .build(),
        );
    }
    rib.merge_route(connected(Prefix::host(Ipv4Addr::new(100, 0, 0, n)), "eth0"));
    rib
}

#[test]
fn recursive_resolution() {
    let mut rib = Rib::new();
    let conn = connected(prefix!("10.0.0.0/30" as), "eth0");
    let via_ip = static_route(prefix!("20.0.0.0/8" as))
        .next_hop_ip(ip!("10.0.0.2"))
        .build();
    let recursive = static_route(prefix!("30.0.0.0/8" as))
        .next_hop_ip(ip!("20.1.1.1"))
        .build();
    rib.extend([conn.clone(), via_ip.clone(), recursive.clone()]);

    let fib = Fib::new("r1", &rib).unwrap();
    assert_eq!(fib.len(), 3);

    assert_eq!(
        fib.next_hop_interfaces_by_route(ip!("30.1.2.3")),
        btreemap! {
            recursive.clone() => btreeset! {ResolvedNextHop {
                interface: "eth0".to_string(),
                final_next_hop_ip: Some(ip!("10.0.0.2")),
            }}
        }
    );
    assert_eq!(
        fib.next_hop_interfaces(ip!("10.0.0.2")),
        btreemap! {"eth0".to_string() => btreeset! {conn.clone()}}
    );
    assert_eq!(
        fib.routes_by_interface("eth0"),
        Some(&btreeset! {conn, via_ip, recursive})
    );
    assert!(fib.next_hop_interfaces(ip!("40.0.0.1")).is_empty());
}

#[test]
fn interface_route_has_no_final_next_hop() {
    let mut rib = Rib::new();
    let r = static_route(prefix!("20.0.0.0/8" as))
        .next_hop_interface("eth1")
        .build();
    rib.merge_route(r.clone());
    let fib = Fib::new("r1", &rib).unwrap();
    assert_eq!(
        fib.routes().get(&r),
        Some(&btreeset! {ResolvedNextHop {
            interface: "eth1".to_string(),
            final_next_hop_ip: None
        }})
    );
}

#[test]
fn unresolvable_routes_are_dropped() {
    let mut rib = Rib::new();
    rib.merge_route(
        static_route(prefix!("20.0.0.0/8" as))
            .next_hop_ip(ip!("10.0.0.2"))
            .build(),
    );
    let fib = Fib::new("r1", &rib).unwrap();
    assert!(fib.is_empty());
    assert!(fib.next_hop_interfaces(ip!("20.0.0.1")).is_empty());
}

#[test]
fn resolution_loop() {
    let mut rib = Rib::new();
    let a = static_route(prefix!("20.0.0.0/8" as))
        .next_hop_ip(ip!("30.0.0.1"))
        .build();
    let b = static_route(prefix!("30.0.0.0/8" as))
        .next_hop_ip(ip!("20.0.0.1"))
        .build();
    rib.extend([a, b]);
    let fib = Fib::new("r1", &rib).unwrap();
    assert!(fib.is_empty());
}

#[test]
fn multipath_resolution() {
    let mut rib = Rib::new();
    let r = static_route(prefix!("20.0.0.0/8" as))
        .next_hop_ip(ip!("10.0.0.2"))
        .build();
    rib.extend([
        r.clone(),
        static_route(prefix!("10.0.0.0/24" as))
            .next_hop_interface("eth0")
            .build(),
        static_route(prefix!("10.0.0.0/24" as))
            .next_hop_interface("eth1")
            .build(),
    ]);
    let fib = Fib::new("r1", &rib).unwrap();
    assert_eq!(
        fib.next_hop_interfaces(ip!("20.0.0.1")),
        btreemap! {
            "eth0".to_string() => btreeset! {r.clone()},
            "eth1".to_string() => btreeset! {r},
        }
    );
}

#[test]
fn recursion_limit() {
    // ten indirections resolve
    let fib = Fib::new("r1", &chain(MAX_RESOLUTION_DEPTH as u8)).unwrap();
    assert_eq!(fib.len(), MAX_RESOLUTION_DEPTH + 1);

    // eleven indirections do not
    match Fib::new("r1", &chain(MAX_RESOLUTION_DEPTH as u8 + 1)) {
        Err(NetworkError::FibRecursionLimit(host, _)) => assert_eq!(host, "r1"),
        x => panic!("unexpected result: {x:?}"),
    }
}
