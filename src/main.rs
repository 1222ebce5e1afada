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

use std::path::PathBuf;

use clap::Parser;
use dataplane::{formatter::IndentedFormatter, AnalysisSettings, Snapshot};
use dpsim::network::DEFAULT_MAX_ITERATIONS;
use log::*;

/// Compute the converged data plane of a network snapshot and trace its flows.
#[derive(Debug, Parser)]
struct Cli {
    /// Path to the snapshot (JSON).
    snapshot: PathBuf,
    /// Number of workers to use in parallel. If not specified, it will use all available workers.
    #[clap(short, long)]
    threads: Option<usize>,
    /// Maximum number of iterations of each fixed point before giving up.
    #[clap(short, long, default_value_t = DEFAULT_MAX_ITERATIONS)]
    max_iterations: usize,
    /// Print the main routing table of every routing instance.
    #[clap(short, long)]
    routes: bool,
    /// Only print the routes and flows of this device.
    #[clap(short, long)]
    node: Option<String>,
    /// Print the result as JSON instead of text.
    #[clap(short, long)]
    json: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init_timed();

    let args = Cli::parse();

    let threads = args.threads.unwrap_or_else(num_cpus::get);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()?;
    info!("Using {threads} worker threads");

    let snapshot = Snapshot::from_file(&args.snapshot)?;
    let settings = AnalysisSettings {
        max_iterations: args.max_iterations,
        routes: args.routes,
        node: args.node,
    };
    let analysis = snapshot.analyze(&settings)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&analysis)?);
    } else {
        println!("{}", analysis.fmt(0));
    }

    Ok(())
}
