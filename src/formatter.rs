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

//! Formatting things.

use std::collections::{BTreeMap, BTreeSet};

use dpsim::{
    forwarding_state::{FlowTrace, FlowTraceHop},
    network::ConvergenceReport,
    route::Route,
};
use itertools::Itertools;

use crate::{Analysis, FlowTraces};

/// Trait to format things using appropriate indentation.
pub trait IndentedFormatter {
    /// Format something using some specific indent.
    fn fmt(&self, indent: usize) -> String;
}

/// Format the number of iterations of an inner fixed point, for each round of the outer one.
fn fmt_rounds(rounds: &BTreeMap<usize, usize>) -> String {
    format!(
        "[{}]",
        rounds
            .iter()
            .map(|(round, iterations)| format!("{round}: {iterations}"))
            .join(", ")
    )
}

impl IndentedFormatter for ConvergenceReport {
    fn fmt(&self, indent: usize) -> String {
        let tab: String = " ".repeat(indent);
        let mut s = format!(
            "{tab}total routes: {}\n\
             {tab}OSPF internal iterations: {}\n\
             {tab}dependent routes iterations: {}\n\
             {tab}OSPF external iterations: {}\n\
             {tab}BGP iterations: {}",
            self.total_routes,
            self.ospf_internal_iterations,
            self.dependent_routes_iterations,
            fmt_rounds(&self.ospf_external_iterations),
            fmt_rounds(&self.bgp_iterations),
        );
        if !self.warnings.is_empty() {
            s.push_str(&format!(
                "\n{tab}warnings:\n{}",
                self.warnings
                    .iter()
                    .map(|(instance, msgs)| format!(
                        "{tab}  {instance}\n{}",
                        msgs.iter().map(|m| format!("{tab}    {m}")).join("\n")
                    ))
                    .join("\n")
            ));
        }
        s
    }
}

impl IndentedFormatter for BTreeMap<String, BTreeMap<String, BTreeSet<Route>>> {
    fn fmt(&self, indent: usize) -> String {
        let tab: String = " ".repeat(indent);
        self.iter()
            .flat_map(|(hostname, vrfs)| vrfs.iter().map(move |(vrf, routes)| (hostname, vrf, routes)))
            .map(|(hostname, vrf, routes)| {
                if routes.is_empty() {
                    format!("{tab}{hostname}:{vrf} (no routes)")
                } else {
                    format!(
                        "{tab}{hostname}:{vrf}\n{}",
                        routes.iter().map(|r| format!("{tab}  {r}")).join("\n")
                    )
                }
            })
            .join("\n")
    }
}

impl IndentedFormatter for FlowTraceHop {
    fn fmt(&self, indent: usize) -> String {
        let tab: String = " ".repeat(indent);
        format!(
            "{tab}{}\n{}",
            self.edge,
            self.routes.iter().map(|r| format!("{tab}  {r}")).join("\n")
        )
    }
}

impl IndentedFormatter for FlowTrace {
    fn fmt(&self, indent: usize) -> String {
        let tab: String = " ".repeat(indent);
        // notes start with the disposition, followed by details about the drop
        let header = if self.notes.is_empty() {
            format!("{tab}{}", self.disposition)
        } else {
            format!("{tab}{}", self.notes)
        };
        if self.hops.is_empty() {
            header
        } else {
            format!(
                "{header}\n{}",
                self.hops.iter().map(|h| h.fmt(indent + 2)).join("\n")
            )
        }
    }
}

impl IndentedFormatter for FlowTraces {
    fn fmt(&self, indent: usize) -> String {
        let tab: String = " ".repeat(indent);
        let f = &self.flow;
        let mut header = format!(
            "{tab}{}:{} {} -> {}",
            f.ingress_node, f.ingress_vrf, f.src_ip, f.dst_ip
        );
        if f.ip_protocol != 0 || f.src_port.is_some() || f.dst_port.is_some() {
            header.push_str(&format!(" proto {}", f.ip_protocol));
        }
        if let Some(port) = f.src_port {
            header.push_str(&format!(" sport {port}"));
        }
        if let Some(port) = f.dst_port {
            header.push_str(&format!(" dport {port}"));
        }
        format!(
            "{header}\n{}",
            self.traces.iter().map(|t| t.fmt(indent + 2)).join("\n")
        )
    }
}

impl IndentedFormatter for Analysis {
    fn fmt(&self, indent: usize) -> String {
        let tab: String = " ".repeat(indent);
        let mut parts = vec![format!(
            "{tab}Convergence report:\n{}",
            self.report.fmt(indent + 2)
        )];
        if !self.routes.is_empty() {
            parts.push(format!("{tab}Routes:\n{}", self.routes.fmt(indent + 2)));
        }
        if !self.traces.is_empty() {
            parts.push(format!(
                "{tab}Flow traces:\n{}",
                self.traces.iter().map(|t| t.fmt(indent + 2)).join("\n")
            ));
        }
        parts.join("\n")
    }
}
