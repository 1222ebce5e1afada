// Dataplane: Computing the converged data plane from network snapshots
// Copyright (C) 2023 Tibor Schneider <sctibor@ethz.ch>
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

//! Test loading and analyzing snapshots.

use dpsim::prelude::*;
use maplit::btreeset;
use pretty_assertions::assert_eq;
use test_log::test;

use super::{two_routers, TWO_ROUTERS};
use crate::{AnalysisSettings, Snapshot, SnapshotError};

#[test]
fn load_snapshot() {
    let snapshot = two_routers();
    assert_eq!(snapshot.configurations.len(), 2);
    assert_eq!(snapshot.edges, vec![Edge::new("r1", "eth0", "r2", "eth0")]);
    assert!(snapshot.external_bgp_advertisements.is_empty());
    assert_eq!(
        snapshot.flows[0],
        Flow::new("r1", ip!("1.1.1.1"), ip!("2.2.2.2"))
    );

    let r1 = &snapshot.configurations[0];
    assert_eq!(r1.hostname, "r1");
    assert_eq!(
        r1.vrfs[DEFAULT_VRF_NAME].static_routes,
        vec![StaticRoute::via_ip(
            prefix!("2.2.2.2/32" as),
            ip!("10.0.0.2")
        )]
    );
    assert_eq!(
        r1.interfaces["eth0"],
        Interface::new(prefix!("10.0.0.1/30"))
    );
}

#[test]
fn missing_sections() {
    assert_eq!(Snapshot::from_json("{}").unwrap(), Snapshot::default());
    let snapshot = Snapshot::from_json(r#"{"configurations": [{"hostname": "r1"}]}"#).unwrap();
    assert_eq!(snapshot.configurations[0].hostname, "r1");
    assert!(snapshot.edges.is_empty());
    assert!(snapshot.flows.is_empty());
}

#[test]
fn invalid_snapshot() {
    assert!(matches!(
        Snapshot::from_json(r#"{"edges": 3}"#),
        Err(SnapshotError::Json(_))
    ));
    assert!(matches!(
        Snapshot::from_json("{"),
        Err(SnapshotError::Json(_))
    ));
    assert!(matches!(
        Snapshot::from_file("/this/snapshot/does/not/exist.json"),
        Err(SnapshotError::Io(_))
    ));
}

#[test]
fn load_from_file() {
    let path = std::env::temp_dir().join(format!("dataplane-snapshot-{}.json", std::process::id()));
    std::fs::write(&path, TWO_ROUTERS).unwrap();
    let snapshot = Snapshot::from_file(&path);
    std::fs::remove_file(&path).unwrap();
    assert_eq!(snapshot.unwrap(), two_routers());
}

#[test]
fn analyze() {
    let analysis = two_routers().analyze(&AnalysisSettings::default()).unwrap();
    assert_eq!(analysis.report.total_routes, 6);
    assert!(analysis.report.warnings.is_empty());
    assert!(analysis.routes.is_empty());
    assert_eq!(analysis.traces.len(), 2);

    let t = &analysis.traces[0];
    assert_eq!(t.flow.ingress_node, "r1");
    assert_eq!(t.traces.len(), 1);
    assert_eq!(t.traces[0].disposition, FlowDisposition::Accepted);
    assert_eq!(
        t.traces[0]
            .hops
            .iter()
            .map(|h| h.edge.clone())
            .collect::<Vec<_>>(),
        vec![Edge::new("r1", "eth0", "r2", "eth0")]
    );

    let t = &analysis.traces[1];
    assert_eq!(t.flow.ingress_node, "r2");
    assert_eq!(t.traces.len(), 1);
    assert_eq!(t.traces[0].disposition, FlowDisposition::NoRoute);
    assert!(t.traces[0].hops.is_empty());
}

#[test]
fn routes_of_a_single_node() {
    let settings = AnalysisSettings {
        routes: true,
        node: Some("r2".to_string()),
        ..Default::default()
    };
    let analysis = two_routers().analyze(&settings).unwrap();
    assert_eq!(
        analysis.routes.keys().cloned().collect::<Vec<_>>(),
        vec!["r2".to_string()]
    );
    assert_eq!(
        analysis.routes["r2"][DEFAULT_VRF_NAME]
            .iter()
            .map(|r| (r.network, r.protocol))
            .collect::<std::collections::BTreeSet<_>>(),
        btreeset! {
            (prefix!("10.0.0.0/30" as), RoutingProtocol::Connected),
            (prefix!("2.2.2.2/32" as), RoutingProtocol::Connected),
            (prefix!("1.1.1.1/32" as), RoutingProtocol::Static),
        }
    );
    // the report still covers the entire network
    assert_eq!(analysis.report.total_routes, 6);
    assert_eq!(analysis.traces.len(), 1);
    assert_eq!(analysis.traces[0].flow.ingress_node, "r2");
}

#[test]
fn unknown_node() {
    let settings = AnalysisSettings {
        node: Some("r3".to_string()),
        ..Default::default()
    };
    assert!(matches!(
        two_routers().analyze(&settings),
        Err(SnapshotError::UnknownNode(n)) if n == "r3"
    ));
}

#[test]
fn invalid_configuration() {
    let snapshot = Snapshot::from_json(
        r#"{"configurations": [{
            "hostname": "r1",
            "vrfs": {"default": {"static_routes": [{"network": "2.2.2.2/32"}]}}
        }]}"#,
    )
    .unwrap();
    assert!(matches!(
        snapshot.analyze(&AnalysisSettings::default()),
        Err(SnapshotError::Network(NetworkError::ConfigError(
            ConfigError::InvalidStaticRoute(h, _)
        ))) if h == "r1"
    ));
}

#[test]
fn no_convergence() {
    let settings = AnalysisSettings {
        max_iterations: 0,
        ..Default::default()
    };
    assert!(matches!(
        two_routers().analyze(&settings),
        Err(SnapshotError::Network(NetworkError::NoConvergence(0)))
    ));
}

#[test]
fn external_advertisements() {
    let mut r1 = Configuration::new("r1");
    r1.add_interface("eth0", Interface::new(prefix!("10.0.0.1/30")));
    let mut bgp = BgpProcess {
        router_id: Some(ip!("1.1.1.1")),
        local_as: Some(AsId(65001)),
        neighbors: Default::default(),
    };
    bgp.neighbors
        .insert(ip!("10.0.0.2"), BgpNeighbor::new(65100, ip!("10.0.0.1")));
    r1.vrf_mut(DEFAULT_VRF_NAME).bgp = Some(bgp);

    let snapshot = Snapshot {
        configurations: vec![r1],
        edges: Vec::new(),
        external_bgp_advertisements: vec![BgpAdvertisement::new(
            AdvertisementType::EbgpSent,
            prefix!("100.0.0.0/24" as),
            ip!("10.0.0.2"),
            "r1",
            ip!("10.0.0.1"),
        )
        .as_path([65100])],
        flows: vec![Flow::new("r1", ip!("10.0.0.1"), ip!("100.0.0.1"))],
    };
    let snapshot = Snapshot::from_json(&snapshot.to_json().unwrap()).unwrap();

    let settings = AnalysisSettings {
        routes: true,
        ..Default::default()
    };
    let analysis = snapshot.analyze(&settings).unwrap();
    let bgp_routes = analysis.routes["r1"][DEFAULT_VRF_NAME]
        .iter()
        .filter(|r| r.protocol == RoutingProtocol::Bgp)
        .collect::<Vec<_>>();
    assert_eq!(bgp_routes.len(), 1);
    assert_eq!(bgp_routes[0].network, prefix!("100.0.0.0/24" as));
    assert_eq!(bgp_routes[0].next_hop_ip, Some(ip!("10.0.0.2")));

    // eth0 has no neighbor in the snapshot, so the flow leaves the network through a flow sink
    assert_eq!(
        analysis.traces[0].traces[0].disposition,
        FlowDisposition::Accepted
    );
}
