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

//! # Dataplane: Computing the converged data plane from network snapshots
//!
//! This crate wraps the data-plane engine [`dpsim`] into a tool that operates on network
//! snapshots. A [`Snapshot`] is a JSON document that contains the configuration of every device,
//! the physical topology, the BGP advertisements received from (or sent to) routers outside of the
//! network, and a list of flows to trace.
//!
//! ## Structure
//! - The module [`snapshot`] defines the [`Snapshot`] and how it is loaded, turned into a
//!   [`dpsim::network::Network`], and analyzed ([`Snapshot::analyze`]).
//! - The module [`formatter`] renders the [`Analysis`] as human-readable text.
//! - The binary `dataplane` reads a snapshot from disk, computes the data plane using all
//!   available cores, and prints the convergence report, the routing tables, and all flow traces.
//!
//! ```
//! use dataplane::Snapshot;
//!
//! # fn main() -> Result<(), dataplane::SnapshotError> {
//! let snapshot = Snapshot::from_json(r#"{
//!     "configurations": [
//!         {"hostname": "r1", "vrfs": {"default": {}},
//!          "interfaces": {"eth0": {"addresses": ["10.0.0.1/30"]}}}
//!     ],
//!     "edges": [],
//!     "flows": [{"ingress_node": "r1", "src_ip": "10.0.0.1", "dst_ip": "10.0.0.1"}]
//! }"#)?;
//! let analysis = snapshot.analyze(&Default::default())?;
//! assert_eq!(analysis.report.total_routes, 1);
//! assert_eq!(analysis.traces.len(), 1);
//! # Ok(())
//! # }
//! ```

#![deny(
    missing_docs,
    clippy::missing_docs_in_private_items,
    missing_debug_implementations,
    rust_2018_idioms
)]
#![allow(clippy::result_large_err)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod formatter;
pub mod snapshot;
#[cfg(test)]
mod test;

pub use snapshot::{Analysis, AnalysisSettings, FlowTraces, Snapshot, SnapshotError};
