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

//! Packet filters (IP access lists). Lines are evaluated in order, and the first matching line
//! decides. A packet that matches no line is rejected.

use std::ops::RangeInclusive;

use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};

use crate::forwarding_state::Flow;

/// Action of a filter line
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum LineAction {
    /// Let the packet pass
    Permit,
    /// Drop the packet
    #[default]
    Reject,
}

/// Single line of an access list. Empty match lists match everything.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IpAccessListLine {
    /// Name of the line used in diagnostics
    pub name: Option<String>,
    /// Action if the line matches
    pub action: LineAction,
    /// Source networks
    pub src_ips: Vec<Ipv4Net>,
    /// Destination networks
    pub dst_ips: Vec<Ipv4Net>,
    /// IP protocol numbers
    pub ip_protocols: Vec<u8>,
    /// Source port ranges
    pub src_ports: Vec<RangeInclusive<u16>>,
    /// Destination port ranges
    pub dst_ports: Vec<RangeInclusive<u16>>,
}

impl IpAccessListLine {
    /// Create a line matching everything.
    pub fn new(action: LineAction) -> Self {
        Self {
            action,
            ..Default::default()
        }
    }

    /// Name the line.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Only match packets towards this network.
    pub fn dst(mut self, net: Ipv4Net) -> Self {
        self.dst_ips.push(net);
        self
    }

    /// Only match packets from this network.
    pub fn src(mut self, net: Ipv4Net) -> Self {
        self.src_ips.push(net);
        self
    }

    /// Check whether the line matches the flow.
    pub fn matches(&self, flow: &Flow) -> bool {
        fn any_or_empty<T>(xs: &[T], f: impl Fn(&T) -> bool) -> bool {
            xs.is_empty() || xs.iter().any(f)
        }
        fn port_matches(ranges: &[RangeInclusive<u16>], port: Option<u16>) -> bool {
            ranges.is_empty() || port.map(|p| ranges.iter().any(|r| r.contains(&p))) == Some(true)
        }
        any_or_empty(&self.src_ips, |n| n.contains(&flow.src_ip))
            && any_or_empty(&self.dst_ips, |n| n.contains(&flow.dst_ip))
            && any_or_empty(&self.ip_protocols, |p| *p == flow.ip_protocol)
            && port_matches(&self.src_ports, flow.src_port)
            && port_matches(&self.dst_ports, flow.dst_port)
    }
}

/// Result of filtering a packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterResult {
    /// Action applied to the packet
    pub action: LineAction,
    /// Index of the matching line, or `None` if no line matched.
    pub match_line: Option<usize>,
}

/// Ordered list of filter lines.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IpAccessList {
    /// Lines of the access list
    pub lines: Vec<IpAccessListLine>,
}

impl IpAccessList {
    /// Create an access list from its lines.
    pub fn new(lines: impl IntoIterator<Item = IpAccessListLine>) -> Self {
        Self {
            lines: lines.into_iter().collect(),
        }
    }

    /// Filter a packet.
    pub fn filter(&self, flow: &Flow) -> FilterResult {
        self.lines
            .iter()
            .position(|l| l.matches(flow))
            .map(|i| FilterResult {
                action: self.lines[i].action,
                match_line: Some(i),
            })
            .unwrap_or(FilterResult {
                action: LineAction::Reject,
                match_line: None,
            })
    }

    /// Describe the outcome of a filter for diagnostics: the line name, `line:N`, or `no-match`.
    pub fn describe(&self, result: &FilterResult) -> String {
        match result.match_line {
            Some(i) => match self.lines.get(i).and_then(|l| l.name.as_ref()) {
                Some(name) => name.clone(),
                None => format!("line:{i}"),
            },
            None => "no-match".to_string(),
        }
    }
}
