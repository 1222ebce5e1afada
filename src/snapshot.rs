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

//! Module for loading and analyzing network snapshots.

use std::{
    collections::{BTreeMap, BTreeSet},
    path::Path,
};

use dpsim::{
    bgp::BgpAdvertisement,
    config::Configuration,
    forwarding_state::{Flow, FlowTrace},
    network::{ConvergenceReport, Network, DEFAULT_MAX_ITERATIONS},
    route::Route,
    topology::Edge,
    types::NetworkError,
};
use log::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that may occur while loading or analyzing a snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The snapshot file could not be read.
    #[error("Cannot read the snapshot: {0}")]
    Io(#[from] std::io::Error),
    /// The snapshot is no valid JSON document.
    #[error("Cannot parse the snapshot: {0}")]
    Json(#[from] serde_json::Error),
    /// The data plane could not be computed.
    #[error("{0}")]
    Network(#[from] NetworkError),
    /// The output was restricted to a device that is not part of the snapshot.
    #[error("Device {0} is not part of the snapshot")]
    UnknownNode(String),
}

/// The input to the data plane computation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    /// Configuration of every device
    pub configurations: Vec<Configuration>,
    /// Physical links between the interfaces of the devices
    pub edges: Vec<Edge>,
    /// BGP advertisements exchanged with routers outside of the snapshot
    pub external_bgp_advertisements: Vec<BgpAdvertisement>,
    /// Flows to trace once the data plane is computed
    pub flows: Vec<Flow>,
}

/// Parameters of [`Snapshot::analyze`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisSettings {
    /// Upper bound on the number of iterations of each fixed point
    pub max_iterations: usize,
    /// Whether to collect the main routing table of every routing instance
    pub routes: bool,
    /// Restrict routes and flows to a single device
    pub node: Option<String>,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            routes: false,
            node: None,
        }
    }
}

/// All traces of a single flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowTraces {
    /// The traced flow
    pub flow: Flow,
    /// One trace per forwarding branch
    pub traces: Vec<FlowTrace>,
}

/// Result of analyzing a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Analysis {
    /// Statistics of the data plane computation
    pub report: ConvergenceReport,
    /// Main routing table of every routing instance, indexed by hostname and VRF. Empty unless
    /// [`AnalysisSettings::routes`] is set.
    pub routes: BTreeMap<String, BTreeMap<String, BTreeSet<Route>>>,
    /// Traces of all flows of the snapshot
    pub traces: Vec<FlowTraces>,
}

impl Snapshot {
    /// Read a snapshot from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SnapshotError> {
        let path = path.as_ref();
        debug!("Reading the snapshot from {}", path.display());
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parse a snapshot from a JSON string.
    pub fn from_json(s: &str) -> Result<Self, SnapshotError> {
        let snapshot: Self = serde_json::from_str(s)?;
        info!(
            "Loaded a snapshot with {} devices, {} edges, {} external advertisements, and {} flows",
            snapshot.configurations.len(),
            snapshot.edges.len(),
            snapshot.external_bgp_advertisements.len(),
            snapshot.flows.len()
        );
        Ok(snapshot)
    }

    /// Serialize the snapshot as a JSON string.
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Create the network of the snapshot, including all external advertisements. The data plane
    /// is not yet computed.
    pub fn build_network(&self) -> Result<Network, SnapshotError> {
        let mut net = Network::new(self.configurations.iter().cloned(), self.edges.iter().cloned())?;
        net.add_external_advertisements(self.external_bgp_advertisements.iter().cloned());
        Ok(net)
    }

    /// Compute the data plane of the snapshot and trace all of its flows.
    pub fn analyze(&self, settings: &AnalysisSettings) -> Result<Analysis, SnapshotError> {
        if let Some(node) = settings.node.as_ref() {
            if !self.configurations.iter().any(|c| &c.hostname == node) {
                return Err(SnapshotError::UnknownNode(node.clone()));
            }
        }
        let selected = |hostname: &str| settings.node.as_deref().map_or(true, |n| n == hostname);

        let mut net = self.build_network()?;
        net.set_max_iterations(settings.max_iterations);
        let report = net.compute_data_plane()?;

        let routes = if settings.routes {
            net.all_routes()
                .into_iter()
                .filter(|(hostname, _)| selected(hostname))
                .collect()
        } else {
            BTreeMap::new()
        };

        let flows: Vec<Flow> = self
            .flows
            .iter()
            .filter(|f| selected(&f.ingress_node))
            .cloned()
            .collect();
        let traces = net
            .get_forwarding_state()?
            .trace_all(&flows)?
            .into_iter()
            .map(|(flow, traces)| FlowTraces { flow, traces })
            .collect();
        info!("Traced {} flows", flows.len());

        Ok(Analysis {
            report,
            routes,
            traces,
        })
    }
}
