//! CLI commands for ef-assign

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ef_bush::{Assignment, AssignmentConfig, AssignmentReport};
use ef_network::{tntp, Demand, Network};
use serde::Serialize;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "ef-assign")]
#[command(version, about = "Bush-based user-equilibrium traffic assignment", long_about = None)]
pub struct Cli {
    /// Log as JSON lines instead of human-readable text
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the assignment and report link flows
    Run {
        /// TNTP network file
        #[arg(long)]
        network: PathBuf,

        /// TNTP trips file
        #[arg(long)]
        trips: PathBuf,

        /// TOML file with assignment settings
        #[arg(long)]
        config: Option<PathBuf>,

        /// Destination cost gap accepted per bush (overrides config)
        #[arg(long)]
        tolerance: Option<f64>,

        /// Outer sweeps over all origins (overrides config)
        #[arg(long)]
        max_iterations: Option<usize>,

        /// Write the report and link flows as JSON here
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Parse the inputs and report sizes and unreachable OD pairs
    Check {
        /// TNTP network file
        #[arg(long)]
        network: PathBuf,

        /// TNTP trips file
        #[arg(long)]
        trips: PathBuf,
    },
}

/// One link in the output file; node numbers are 1-based as in TNTP
#[derive(Debug, Serialize)]
pub struct LinkRecord {
    pub init_node: u32,
    pub term_node: u32,
    pub flow: f64,
    pub cost: f64,
}

#[derive(Debug, Serialize)]
pub struct FlowFile<'a> {
    pub report: &'a AssignmentReport,
    pub links: Vec<LinkRecord>,
}

fn load_inputs(network: &Path, trips: &Path) -> Result<(Network, Demand)> {
    let net = tntp::read_network(network)
        .with_context(|| format!("reading network {}", network.display()))?;
    let demand = tntp::read_trips(trips, net.n_vertices())
        .with_context(|| format!("reading trips {}", trips.display()))?;
    Ok((net, demand))
}

pub fn run(
    network: &Path,
    trips: &Path,
    config: Option<&Path>,
    tolerance: Option<f64>,
    max_iterations: Option<usize>,
    output: Option<&Path>,
) -> Result<()> {
    let mut settings = match config {
        Some(path) => AssignmentConfig::from_path(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => AssignmentConfig::default(),
    };
    if let Some(tolerance) = tolerance {
        settings.tolerance = tolerance;
    }
    if let Some(max_iterations) = max_iterations {
        settings.max_iterations = max_iterations;
    }

    let start = Instant::now();
    let (net, demand) = load_inputs(network, trips)?;
    info!(
        vertices = net.n_vertices(),
        links = net.n_links(),
        pairs = demand.n_pairs(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "inputs loaded"
    );

    let mut assignment = Assignment::new(net, &demand, settings).context("setting up assignment")?;
    let report = assignment.run();

    println!("Iterations:     {}", report.iterations);
    println!("Converged:      {}", report.converged);
    println!("Relative gap:   {:.3e}", report.relative_gap);
    println!("Max bush gap:   {:.3e}", report.max_gap);
    println!("Total cost:     {:.6}", report.total_cost);
    if !report.unreachable_pairs.is_empty() {
        println!("Unreachable OD: {}", report.unreachable_pairs.len());
    }
    println!("Elapsed:        {:.2}s", start.elapsed().as_secs_f64());

    if let Some(path) = output {
        let net = assignment.network();
        let links = net
            .iter_links()
            .map(|(_, link)| LinkRecord {
                init_node: link.from + 1,
                term_node: link.to + 1,
                flow: link.flow(),
                cost: link.cost(),
            })
            .collect();
        let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(
            &mut writer,
            &FlowFile {
                report: &report,
                links,
            },
        )
        .with_context(|| format!("writing {}", path.display()))?;
        writer.flush()?;
        info!(path = %path.display(), "wrote link flows");
    }

    Ok(())
}

pub fn check(network: &Path, trips: &Path) -> Result<()> {
    let (net, demand) = load_inputs(network, trips)?;
    demand
        .validate(net.n_vertices())
        .context("trips reference vertices outside the network")?;

    let mut unreachable = 0usize;
    for origin in demand.origins() {
        let sp = net.shortest_path_order(origin.origin());
        for &(dest, _) in origin.destinations() {
            if !sp.is_reachable(dest) {
                warn!(origin = origin.origin(), destination = dest, "unreachable destination");
                unreachable += 1;
            }
        }
    }

    println!("Vertices:       {}", net.n_vertices());
    println!("Links:          {}", net.n_links());
    println!("Origins:        {}", demand.origins().len());
    println!("OD pairs:       {}", demand.n_pairs());
    println!("Total demand:   {:.3}", demand.total_demand());
    println!("Unreachable OD: {unreachable}");
    Ok(())
}
