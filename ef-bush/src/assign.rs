//! Outer assignment loop
//!
//! One bush per origin, built in demand order against a single network.
//! Each sweep fixes every bush in turn, then measures the whole network:
//!
//! - `total_cost`: Σ x·t(x) over all links
//! - `shortest_path_cost`: every OD volume on its network shortest path at
//!   current costs, a lower bound on `total_cost`
//! - `relative_gap`: `(total_cost - shortest_path_cost) / total_cost`
//!
//! Iteration stops when the relative gap reaches the target, when a sweep
//! moves no flow, or at `max_iterations`.

use ef_common::Result;
use ef_network::{Demand, LinkId, Network, VertexId};
use serde::Serialize;
use tracing::info;

use crate::bush::Bush;
use crate::config::AssignmentConfig;
use crate::scratch::SharedScratch;

/// Measurements taken after one sweep
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IterationStats {
    pub iteration: usize,
    /// Whether any bush moved flow during the sweep
    pub changed: bool,
    /// Worst destination gap over all bushes
    pub max_gap: f64,
    pub total_cost: f64,
    /// Σ of each bush's all-or-nothing cost over its own edges
    pub bush_lower_bound: f64,
    pub shortest_path_cost: f64,
    pub relative_gap: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssignmentReport {
    pub iterations: usize,
    pub converged: bool,
    pub max_gap: f64,
    pub relative_gap: f64,
    pub total_cost: f64,
    /// OD pairs excluded because no path exists
    pub unreachable_pairs: Vec<(VertexId, VertexId)>,
    pub history: Vec<IterationStats>,
}

pub struct Assignment {
    network: Network,
    bushes: Vec<Bush>,
    scratch: SharedScratch,
    config: AssignmentConfig,
}

impl Assignment {
    /// Validate inputs, build every bush and load the initial flows
    pub fn new(mut network: Network, demand: &Demand, config: AssignmentConfig) -> Result<Self> {
        config.validate()?;
        demand.validate(network.n_vertices())?;

        let mut scratch = SharedScratch::for_network(&network);
        let mut bushes = Vec::with_capacity(demand.origins().len());
        for origin in demand.origins().iter().filter(|o| !o.is_empty()) {
            let mut bush = Bush::new(origin, &mut network, &mut scratch);
            bush.set_pass_limit(config.max_equilibration_passes);
            bushes.push(bush);
        }

        info!(
            vertices = network.n_vertices(),
            links = network.n_links(),
            bushes = bushes.len(),
            total_demand = demand.total_demand(),
            "initial assignment loaded"
        );

        Ok(Self {
            network,
            bushes,
            scratch,
            config,
        })
    }

    /// Fix every bush once and measure the result
    pub fn sweep(&mut self, iteration: usize) -> IterationStats {
        let mut changed = false;
        for bush in &mut self.bushes {
            changed |= bush.fix(&mut self.network, &mut self.scratch, self.config.tolerance);
        }
        self.measure(iteration, changed)
    }

    fn measure(&mut self, iteration: usize, changed: bool) -> IterationStats {
        let mut max_gap = 0.0f64;
        let mut bush_lower_bound = 0.0;
        for bush in &self.bushes {
            max_gap = max_gap.max(bush.max_difference(&self.network, &mut self.scratch));
            bush_lower_bound += bush.all_or_nothing_cost(&self.network, &mut self.scratch);
        }
        let total_cost = self.network.total_cost();
        let shortest_path_cost = self.shortest_path_cost();
        let relative_gap = if total_cost > 0.0 {
            ((total_cost - shortest_path_cost) / total_cost).max(0.0)
        } else {
            0.0
        };

        IterationStats {
            iteration,
            changed,
            max_gap,
            total_cost,
            bush_lower_bound,
            shortest_path_cost,
            relative_gap,
        }
    }

    /// Every reachable OD volume on its shortest path over the full network
    pub fn shortest_path_cost(&self) -> f64 {
        self.bushes
            .iter()
            .map(|bush| {
                let sp = self.network.shortest_path_order(bush.origin());
                bush.destinations()
                    .iter()
                    .map(|&(dest, volume)| volume * sp.dist[dest as usize])
                    .sum::<f64>()
            })
            .sum()
    }

    /// Sweep until converged, stalled or out of iterations
    pub fn run(&mut self) -> AssignmentReport {
        let mut history = Vec::new();
        let mut converged = false;

        for iteration in 1..=self.config.max_iterations {
            let stats = self.sweep(iteration);
            info!(
                iteration,
                max_gap = stats.max_gap,
                relative_gap = stats.relative_gap,
                total_cost = stats.total_cost,
                "sweep complete"
            );
            let done = stats.relative_gap <= self.config.target_relative_gap;
            let stalled = !stats.changed;
            history.push(stats);
            if done || stalled {
                converged = done || history.last().is_some_and(|s| s.max_gap <= self.config.tolerance);
                break;
            }
        }

        let last = history.last().cloned();
        let report = AssignmentReport {
            iterations: history.len(),
            converged,
            max_gap: last.as_ref().map_or(0.0, |s| s.max_gap),
            relative_gap: last.as_ref().map_or(0.0, |s| s.relative_gap),
            total_cost: last.as_ref().map_or(self.network.total_cost(), |s| s.total_cost),
            unreachable_pairs: self.unreachable_pairs(),
            history,
        };
        info!(
            iterations = report.iterations,
            converged = report.converged,
            relative_gap = report.relative_gap,
            "assignment finished"
        );
        report
    }

    pub fn unreachable_pairs(&self) -> Vec<(VertexId, VertexId)> {
        self.bushes
            .iter()
            .flat_map(|b| b.unreachable_destinations().iter().map(move |&d| (b.origin(), d)))
            .collect()
    }

    /// Largest difference between a link's network flow and the sum of its
    /// bush flows
    pub fn attribution_error(&self) -> f64 {
        let mut sums = vec![0.0f64; self.network.n_links()];
        for bush in &self.bushes {
            for (link, flow) in bush.link_flows() {
                sums[link as usize] += flow;
            }
        }
        self.network
            .links()
            .iter()
            .zip(&sums)
            .map(|(link, &sum)| (link.flow() - sum).abs())
            .fold(0.0, f64::max)
    }

    /// `(link, flow, cost)` for every link
    pub fn link_flows(&self) -> impl Iterator<Item = (LinkId, f64, f64)> + '_ {
        self.network
            .iter_links()
            .map(|(id, link)| (id, link.flow(), link.cost()))
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn bushes(&self) -> &[Bush] {
        &self.bushes
    }
}
