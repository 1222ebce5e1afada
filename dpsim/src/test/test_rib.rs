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
    ip, prefix,
    rib::*,
    route::{RouteBuilder, RoutingProtocol::*},
    test::static_route,
    types::{AsId, Prefix},
};

#[generic_tests::define]
mod generic {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn multipath<P: RibPreference>() {
        let mut rib: Rib<P> = Rib::new();
        let a = static_route(prefix!("10.0.0.0/8" as))
            .next_hop_interface("eth0")
            .build();
        let b = static_route(prefix!("10.0.0.0/8" as))
            .next_hop_interface("eth1")
            .build();
        assert!(rib.merge_route(a.clone()));
        assert!(rib.merge_route(b.clone()));
        assert!(!rib.merge_route(a.clone()));
        assert_eq!(rib.get(prefix!("10.0.0.0/8" as)), Some(&btreeset! {a, b}));
        assert_eq!(rib.len(), 2);
        assert_eq!(rib.prefixes(), btreeset! {prefix!("10.0.0.0/8" as)});
    }

    #[test]
    fn longest_prefix_match<P: RibPreference>() {
        let mut rib: Rib<P> = Rib::new();
        let default = static_route(prefix!("0.0.0.0/0" as))
            .next_hop_interface("eth0")
            .build();
        let r8 = static_route(prefix!("10.0.0.0/8" as))
            .next_hop_interface("eth1")
            .build();
        let r24 = static_route(prefix!("10.1.2.0/24" as))
            .next_hop_interface("eth2")
            .build();
        let host = static_route(Prefix::host(ip!("10.1.2.3")))
            .next_hop_interface("eth3")
            .build();
        assert!(rib.extend([default.clone(), r8.clone(), r24.clone(), host.clone()]));

        assert_eq!(rib.longest_prefix_match(ip!("10.1.2.3")), btreeset! {host});
        assert_eq!(rib.longest_prefix_match(ip!("10.1.2.4")), btreeset! {r24});
        assert_eq!(rib.longest_prefix_match(ip!("10.200.0.1")), btreeset! {r8});
        assert_eq!(rib.longest_prefix_match(ip!("192.168.0.1")), btreeset! {default});
    }

    #[test]
    fn empty<P: RibPreference>() {
        let rib: Rib<P> = Rib::new();
        assert!(rib.is_empty());
        assert!(rib.longest_prefix_match(ip!("1.2.3.4")).is_empty());
        assert_eq!(rib.get(prefix!("1.0.0.0/8" as)), None);
    }

    #[test]
    fn import<P: RibPreference>() {
        let mut a: Rib<P> = Rib::new();
        let mut b: Rib<MainPreference> = Rib::new();
        b.merge_route(
            static_route(prefix!("10.0.0.0/8" as))
                .next_hop_interface("eth0")
                .build(),
        );
        assert!(a.import(&b));
        assert!(!a.import(&b));
        assert_eq!(a.routes(), b.routes());
    }

    #[instantiate_tests(<MainPreference>)]
    mod main {}

    #[instantiate_tests(<BgpPreference>)]
    mod bgp {}

    #[instantiate_tests(<OspfPreference>)]
    mod ospf {}

    #[instantiate_tests(<OspfE2Preference>)]
    mod ospf_e2 {}
}

#[test]
fn main_admin_then_metric() {
    let mut rib: Rib<MainPreference> = Rib::new();
    let p = prefix!("10.0.0.0/8" as);
    let ospf = RouteBuilder::new(p, Ospf)
        .metric(10)
        .next_hop_ip(ip!("1.0.0.1"))
        .build();
    let ospf_better = RouteBuilder::new(p, Ospf)
        .metric(5)
        .next_hop_ip(ip!("1.0.0.2"))
        .build();
    let stat = static_route(p).next_hop_ip(ip!("1.0.0.3")).build();

    assert!(rib.merge_route(ospf.clone()));
    assert!(rib.merge_route(ospf_better.clone()));
    assert_eq!(rib.get(p), Some(&btreeset! {ospf_better.clone()}));
    assert!(!rib.merge_route(ospf));
    assert!(rib.merge_route(stat.clone()));
    assert_eq!(rib.get(p), Some(&btreeset! {stat}));
    assert!(!rib.merge_route(ospf_better));
}

#[test]
fn main_rejects_non_routing() {
    let p = prefix!("10.0.0.0/8" as);
    let aggregate = RouteBuilder::new(p, Aggregate).non_routing().build();

    let mut main: Rib<MainPreference> = Rib::new();
    assert!(!main.merge_route(aggregate.clone()));
    assert!(main.is_empty());

    let mut bgp: Rib<BgpPreference> = Rib::new();
    assert!(bgp.merge_route(aggregate.clone()));
    assert_eq!(bgp.routes(), btreeset! {aggregate});
}

#[test]
fn bgp_local_pref_before_as_path() {
    let p = prefix!("100.0.0.0/24" as);
    let short = RouteBuilder::new(p, Bgp)
        .as_path([AsId(1)])
        .next_hop_ip(ip!("1.0.0.1"))
        .build();
    let long_preferred = RouteBuilder::new(p, Bgp)
        .as_path([AsId(2), AsId(3), AsId(4)])
        .local_pref(200)
        .next_hop_ip(ip!("1.0.0.2"))
        .build();

    let mut rib: Rib<BgpPreference> = Rib::new();
    rib.merge_route(short.clone());
    assert!(rib.merge_route(long_preferred.clone()));
    assert_eq!(rib.get(p), Some(&btreeset! {long_preferred.clone()}));

    // order of insertion does not matter
    let mut rib: Rib<BgpPreference> = Rib::new();
    rib.merge_route(long_preferred.clone());
    assert!(!rib.merge_route(short));
    assert_eq!(rib.get(p), Some(&btreeset! {long_preferred}));
}

#[test]
fn bgp_tie_breaks() {
    let p = prefix!("100.0.0.0/24" as);
    let long = RouteBuilder::new(p, Bgp)
        .as_path([AsId(1), AsId(2)])
        .next_hop_ip(ip!("1.0.0.1"))
        .build();
    let short = RouteBuilder::new(p, Bgp)
        .as_path([AsId(3)])
        .next_hop_ip(ip!("1.0.0.2"))
        .build();
    let short_high_med = RouteBuilder::new(p, Bgp)
        .as_path([AsId(4)])
        .metric(50)
        .next_hop_ip(ip!("1.0.0.3"))
        .build();
    let short_ibgp = RouteBuilder::new(p, Ibgp)
        .as_path([AsId(5)])
        .next_hop_ip(ip!("1.0.0.4"))
        .build();

    let mut rib: Rib<BgpPreference> = Rib::new();
    rib.extend([
        long.clone(),
        short_high_med.clone(),
        short_ibgp.clone(),
        short.clone(),
    ]);
    assert_eq!(rib.get(p), Some(&btreeset! {short}));

    // aggregates are preferred over learned routes with the same local-pref
    let aggregate = RouteBuilder::new(p, Aggregate).non_routing().build();
    assert!(rib.merge_route(aggregate.clone()));
    assert_eq!(rib.get(p), Some(&btreeset! {aggregate}));
}

#[test]
fn ospf_protocol_rank() {
    let p = prefix!("10.0.0.0/24" as);
    let intra = RouteBuilder::new(p, Ospf)
        .metric(100)
        .next_hop_ip(ip!("1.0.0.1"))
        .build();
    let inter = RouteBuilder::new(p, OspfIa)
        .metric(1)
        .next_hop_ip(ip!("1.0.0.2"))
        .build();
    let e1 = RouteBuilder::new(p, OspfE1)
        .metric(1)
        .next_hop_ip(ip!("1.0.0.3"))
        .build();

    let mut rib: Rib<OspfPreference> = Rib::new();
    rib.extend([e1.clone(), inter.clone()]);
    assert_eq!(rib.get(p), Some(&btreeset! {inter}));
    rib.merge_route(intra.clone());
    assert_eq!(rib.get(p), Some(&btreeset! {intra}));
}

#[test]
fn ospf_e2_cost_to_advertiser() {
    let p = prefix!("10.0.0.0/24" as);
    let far = RouteBuilder::new(p, OspfE2)
        .metric(20)
        .cost_to_advertiser(10)
        .next_hop_ip(ip!("1.0.0.1"))
        .build();
    let near = RouteBuilder::new(p, OspfE2)
        .metric(20)
        .cost_to_advertiser(2)
        .next_hop_ip(ip!("1.0.0.2"))
        .build();
    let low_metric = RouteBuilder::new(p, OspfE2)
        .metric(10)
        .cost_to_advertiser(50)
        .next_hop_ip(ip!("1.0.0.3"))
        .build();

    let mut rib: Rib<OspfE2Preference> = Rib::new();
    rib.extend([far, near.clone()]);
    assert_eq!(rib.get(p), Some(&btreeset! {near}));
    rib.merge_route(low_metric.clone());
    assert_eq!(rib.get(p), Some(&btreeset! {low_metric}));
}
