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

//! Physical topology: directed edges between interfaces of devices.

use std::collections::{BTreeMap, BTreeSet};

use petgraph::{graph::NodeIndex, Directed, Graph};
use serde::{Deserialize, Serialize};

use crate::types::NodeInterfacePair;

/// Directed edge from `node1:int1` to `node2:int2`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Edge {
    /// Sending device
    pub node1: String,
    /// Interface on the sending device
    pub int1: String,
    /// Receiving device
    pub node2: String,
    /// Interface on the receiving device
    pub int2: String,
}

impl Edge {
    /// Create a new edge
    pub fn new(
        node1: impl Into<String>,
        int1: impl Into<String>,
        node2: impl Into<String>,
        int2: impl Into<String>,
    ) -> Self {
        Self {
            node1: node1.into(),
            int1: int1.into(),
            node2: node2.into(),
            int2: int2.into(),
        }
    }

    /// The sending interface
    pub fn tail(&self) -> NodeInterfacePair {
        NodeInterfacePair::new(&self.node1, &self.int1)
    }

    /// The receiving interface
    pub fn head(&self) -> NodeInterfacePair {
        NodeInterfacePair::new(&self.node2, &self.int2)
    }

    /// The same edge in the opposite direction
    pub fn reverse(&self) -> Self {
        Self::new(&self.node2, &self.int2, &self.node1, &self.int1)
    }

    /// Returns `true` if both ends are on the same device.
    pub fn is_self_loop(&self) -> bool {
        self.node1 == self.node2
    }
}

impl std::fmt::Display for Edge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{} -> {}:{}",
            self.node1, self.int1, self.node2, self.int2
        )
    }
}

/// Directed graph of devices, where each edge connects two interfaces.
#[derive(Debug, Clone, Default)]
pub struct Topology {
    graph: Graph<String, Edge, Directed>,
    nodes: BTreeMap<String, NodeIndex>,
    edges: BTreeSet<Edge>,
}

impl Topology {
    /// Create a topology from a set of directed edges. Duplicate edges are ignored.
    pub fn new(edges: impl IntoIterator<Item = Edge>) -> Self {
        let mut topo = Self::default();
        for e in edges {
            topo.add_edge(e);
        }
        topo
    }

    /// Create a topology that contains every edge in both directions.
    pub fn bidirectional(edges: impl IntoIterator<Item = Edge>) -> Self {
        Self::new(edges.into_iter().flat_map(|e| [e.reverse(), e]))
    }

    fn node(&mut self, name: &str) -> NodeIndex {
        if let Some(idx) = self.nodes.get(name) {
            return *idx;
        }
        let idx = self.graph.add_node(name.to_string());
        self.nodes.insert(name.to_string(), idx);
        idx
    }

    /// Add a single directed edge. Returns `false` if the edge already exists.
    pub fn add_edge(&mut self, edge: Edge) -> bool {
        if self.edges.contains(&edge) {
            return false;
        }
        let a = self.node(&edge.node1);
        let b = self.node(&edge.node2);
        self.graph.add_edge(a, b, edge.clone());
        self.edges.insert(edge)
    }

    /// All edges in a deterministic order.
    pub fn edges(&self) -> impl Iterator<Item = &Edge> + '_ {
        self.edges.iter()
    }

    /// Number of edges
    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    /// All edges leaving `node`, sorted.
    pub fn node_edges(&self, node: &str) -> Vec<&Edge> {
        let mut edges: Vec<&Edge> = self
            .nodes
            .get(node)
            .map(|idx| self.graph.edges(*idx).map(|e| e.weight()).collect())
            .unwrap_or_default();
        edges.sort();
        edges
    }

    /// All edges leaving the interface `iface` of `node`, sorted.
    pub fn interface_edges(&self, node: &str, iface: &str) -> Vec<&Edge> {
        let mut edges = self.node_edges(node);
        edges.retain(|e| e.int1 == iface);
        edges
    }

    /// Returns `true` if any edge starts or ends at this interface.
    pub fn contains_interface(&self, node: &str, iface: &str) -> bool {
        self.edges.iter().any(|e| {
            (e.node1 == node && e.int1 == iface) || (e.node2 == node && e.int2 == iface)
        })
    }

    /// Retain only the edges for which `f` returns `true`.
    pub fn retain(&mut self, mut f: impl FnMut(&Edge) -> bool) {
        let edges = std::mem::take(&mut self.edges);
        *self = Self::new(edges.into_iter().filter(|e| f(e)));
    }
}
