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

use crate::{
    config::{Configuration, Interface, OspfProcess, DEFAULT_VRF_NAME},
    prefix,
    route::{Route, RouteBuilder, RoutingProtocol},
    topology::Edge,
    types::Prefix,
};

mod test_fib;
mod test_network;
mod test_ospf;
mod test_rib;

/// Two routers `r1` and `r2`, connected on `eth0` over `10.0.0.0/30`. Each has a loopback
/// `lo` with the address `X.X.X.X/32`.
pub(crate) fn two_routers() -> (Configuration, Configuration) {
    let mut r1 = Configuration::new("r1");
    r1.add_interface("eth0", Interface::new(prefix!("10.0.0.1/30")));
    r1.add_interface("lo", Interface::new(prefix!("1.1.1.1/32")));
    let mut r2 = Configuration::new("r2");
    r2.add_interface("eth0", Interface::new(prefix!("10.0.0.2/30")));
    r2.add_interface("lo", Interface::new(prefix!("2.2.2.2/32")));
    (r1, r2)
}

pub(crate) fn two_routers_edges() -> Vec<Edge> {
    vec![Edge::new("r1", "eth0", "r2", "eth0")]
}

/// Enable OSPF on all interfaces of the configuration in area 0 with cost 1.
pub(crate) fn enable_ospf(c: &mut Configuration) {
    for iface in c.interfaces.values_mut() {
        *iface = iface.clone().ospf(0, 1);
    }
    c.vrf_mut(DEFAULT_VRF_NAME).ospf = Some(OspfProcess::default());
}

pub(crate) fn static_route(network: Prefix) -> RouteBuilder {
    RouteBuilder::new(network, RoutingProtocol::Static)
}

/// Find the routes of a specific prefix in a set of routes.
pub(crate) fn routes_for(routes: impl IntoIterator<Item = Route>, network: Prefix) -> Vec<Route> {
    routes.into_iter().filter(|r| r.network == network).collect()
}
