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

//! Tests of the snapshot analysis and the output formatting.

use crate::Snapshot;

mod test_snapshot;

/// Two routers `r1` and `r2`, connected on `eth0` over `10.0.0.0/30`. Each has a loopback
/// address and a static route towards the loopback of the other one.
pub(crate) const TWO_ROUTERS: &str = r#"{
    "configurations": [
        {
            "hostname": "r1",
            "vrfs": {
                "default": {
                    "static_routes": [{"network": "2.2.2.2/32", "next_hop_ip": "10.0.0.2"}]
                }
            },
            "interfaces": {
                "eth0": {"addresses": ["10.0.0.1/30"]},
                "lo": {"addresses": ["1.1.1.1/32"]}
            }
        },
        {
            "hostname": "r2",
            "vrfs": {
                "default": {
                    "static_routes": [{"network": "1.1.1.1/32", "next_hop_ip": "10.0.0.1"}]
                }
            },
            "interfaces": {
                "eth0": {"addresses": ["10.0.0.2/30"]},
                "lo": {"addresses": ["2.2.2.2/32"]}
            }
        }
    ],
    "edges": [{"node1": "r1", "int1": "eth0", "node2": "r2", "int2": "eth0"}],
    "flows": [
        {"ingress_node": "r1", "src_ip": "1.1.1.1", "dst_ip": "2.2.2.2"},
        {"ingress_node": "r2", "src_ip": "2.2.2.2", "dst_ip": "3.3.3.3"}
    ]
}"#;

/// Parse [`TWO_ROUTERS`].
pub(crate) fn two_routers() -> Snapshot {
    Snapshot::from_json(TWO_ROUTERS).unwrap()
}
