//! Per-origin bush: an acyclic subnetwork carrying all of one origin's demand
//!
//! # Lifecycle
//!
//! 1. [`Bush::new`] runs Dijkstra from the origin, admits every link that
//!    points forward in settle order and loads all demand onto the min tree.
//! 2. [`Bush::fix`] alternates equilibration passes with reversal batches
//!    until a pass flags no inconsistent edge.
//! 3. Diagnostics ([`Bush::max_difference`], [`Bush::all_or_nothing_cost`],
//!    [`Bush::active_node_count`]) rebuild the trees into the shared scratch
//!    and read from it; they never touch flows.
//!
//! Every operation takes the network and the scratch explicitly. Bushes of
//! different origins share both and must be driven one at a time.

use ef_network::{LinkId, Network, Origin, VertexId};
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::edge::BushEdge;
use crate::equilibrate::{equilibrate_node, NewtonShift, ShiftPolicy};
use crate::node::NodeDistance;
use crate::scratch::SharedScratch;
use crate::topo;

/// Rebuild/scan rounds allowed inside one call before giving up
pub const DEFAULT_PASS_LIMIT: usize = 10_000;

/// Broken bush invariant, reported by [`Bush::check_invariants`]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InvariantViolation {
    #[error("in-edge {from} -> {to} points backwards in the topological order")]
    BackwardEdge { from: VertexId, to: VertexId },

    #[error("in-edge list of vertex {vertex} holds an edge ending at {to}")]
    MisplacedEdge { vertex: VertexId, to: VertexId },

    #[error("link {link} appears more than once in the bush")]
    DuplicateLink { link: LinkId },

    #[error("vertex {vertex} is in the order but has no in-edge")]
    Unreached { vertex: VertexId },

    #[error("link {link} carries negative bush flow {flow}")]
    NegativeFlow { link: LinkId, flow: f64 },

    #[error("bush flow {bush} on link {link} exceeds network flow {network}")]
    FlowExceedsNetwork { link: LinkId, bush: f64, network: f64 },

    #[error("vertex {vertex} is out of balance by {excess}")]
    Imbalance { vertex: VertexId, excess: f64 },
}

/// Counts from one reversal batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReversalStats {
    /// Edges turned onto their counterpart link
    pub reversed: usize,
    /// One-way edges dropped from the bush
    pub pruned: usize,
}

/// Acyclic set of in-edges carrying one origin's demand, kept in topological order
#[derive(Debug, Clone)]
pub struct Bush<P = NewtonShift> {
    origin: VertexId,
    /// Reachable destinations and their demand
    destinations: Vec<(VertexId, f64)>,
    unreachable: Vec<VertexId>,
    /// Vertex -> in-edges currently in the bush
    in_edges: Vec<Vec<BushEdge>>,
    /// Reachable vertices, origin first, every in-edge pointing forward
    order: Vec<VertexId>,
    /// `(to vertex, in-edge index)` flagged by the last tree build, grouped by vertex
    pending: Vec<(VertexId, u32)>,
    pass_limit: usize,
    policy: P,
}

impl Bush {
    /// Build a bush for `origin` and load its all-or-nothing flow onto `net`.
    ///
    /// The origin and every destination must be vertices of `net`.
    pub fn new(origin: &Origin, net: &mut Network, scratch: &mut SharedScratch) -> Self {
        Self::with_policy(origin, net, scratch, NewtonShift)
    }
}

impl<P: ShiftPolicy> Bush<P> {
    pub fn with_policy(
        origin: &Origin,
        net: &mut Network,
        scratch: &mut SharedScratch,
        policy: P,
    ) -> Self {
        debug_assert_eq!(scratch.n_vertices(), net.n_vertices());
        let root = origin.origin();
        let sp = net.shortest_path_order(root);

        let mut destinations = Vec::with_capacity(origin.destinations().len());
        let mut unreachable = Vec::new();
        for &(dest, volume) in origin.destinations() {
            if sp.is_reachable(dest) {
                destinations.push((dest, volume));
            } else {
                warn!(origin = root, destination = dest, volume, "unreachable destination");
                unreachable.push(dest);
            }
        }

        let mut in_edges: Vec<Vec<BushEdge>> = vec![Vec::new(); net.n_vertices()];
        for (id, link) in net.iter_links() {
            if let (Some(rf), Some(rt)) = (sp.rank(link.from), sp.rank(link.to)) {
                if rf < rt {
                    in_edges[link.to as usize].push(BushEdge::new(id, link.from, link.to));
                }
            }
        }

        let mut bush = Self {
            origin: root,
            destinations,
            unreachable,
            in_edges,
            order: sp.order,
            pending: Vec::new(),
            pass_limit: DEFAULT_PASS_LIMIT,
            policy,
        };
        bush.load_all_or_nothing(net, scratch);

        debug!(
            origin = root,
            vertices = bush.order.len(),
            edges = bush.n_edges(),
            destinations = bush.destinations.len(),
            "built bush"
        );
        bush
    }

    /// Route every destination's demand along the current min tree.
    ///
    /// Bush flows are accumulated first and each used link is charged to the
    /// network once. The tree does not move while loading, so the result is
    /// the same as charging the network along every walk.
    fn load_all_or_nothing(&mut self, net: &mut Network, scratch: &mut SharedScratch) {
        self.compute_labels(net, &mut scratch.nodes);

        for &(dest, volume) in &self.destinations {
            let mut v = dest;
            while v != self.origin {
                let Some(idx) = scratch.nodes[v as usize].min_pred else {
                    debug_assert!(false, "reachable vertex {v} has no min predecessor");
                    break;
                };
                let edge = &mut self.in_edges[v as usize][idx as usize];
                edge.add_local_flow(volume);
                v = edge.from();
            }
        }

        for edge in self.in_edges.iter().flatten() {
            if edge.is_used() {
                net.add_flow(edge.link(), edge.flow());
            }
        }
    }

    /// Min/max labels for every bush vertex, in topological order
    fn compute_labels(&self, net: &Network, nodes: &mut [NodeDistance]) {
        for (pos, &v) in self.order.iter().enumerate() {
            let label = if v == self.origin {
                NodeDistance {
                    position: pos as u32,
                    ..NodeDistance::origin()
                }
            } else {
                NodeDistance::from_in_edges(&self.in_edges[v as usize], nodes, net, pos as u32)
            };
            nodes[v as usize] = label;
        }
    }

    /// Rebuild the min and max trees into `scratch` and collect the unused
    /// in-edges whose tail now sits further from the origin (by max
    /// distance) than their head. Ties are never flagged.
    pub fn build_trees(&mut self, net: &Network, scratch: &mut SharedScratch) {
        self.compute_labels(net, &mut scratch.nodes);

        let nodes = &scratch.nodes;
        self.pending.clear();
        for &v in &self.order {
            let max_v = nodes[v as usize].max_dist;
            for (idx, edge) in self.in_edges[v as usize].iter().enumerate() {
                if !edge.is_used() && nodes[edge.from() as usize].max_dist > max_v {
                    self.pending.push((v, idx as u32));
                }
            }
        }
    }

    /// Move every flagged in-edge onto the list of its old tail.
    ///
    /// Edges on links without a counterpart are dropped instead; they carry
    /// no flow and their head keeps a used in-edge. Untouched edges keep
    /// their relative order and moved edges land at the end of their new
    /// list. The topological order is stale afterwards until
    /// [`Bush::resort`] runs.
    pub fn apply_pending_reversals(&mut self, net: &Network) -> ReversalStats {
        let mut stats = ReversalStats::default();
        let pending = std::mem::take(&mut self.pending);

        for group in pending.chunk_by(|a, b| a.0 == b.0) {
            let v = group[0].0 as usize;
            let list = std::mem::take(&mut self.in_edges[v]);
            let mut keep = Vec::with_capacity(list.len() - group.len());
            let mut moved = Vec::with_capacity(group.len());
            let mut flagged = group.iter().map(|&(_, idx)| idx as usize).peekable();

            for (idx, edge) in list.into_iter().enumerate() {
                if flagged.peek() == Some(&idx) {
                    flagged.next();
                    moved.push(edge);
                } else {
                    keep.push(edge);
                }
            }
            self.in_edges[v] = keep;

            for mut edge in moved {
                if edge.reverse(net) {
                    self.in_edges[edge.to() as usize].push(edge);
                    stats.reversed += 1;
                } else {
                    stats.pruned += 1;
                }
            }
        }

        trace!(
            origin = self.origin,
            reversed = stats.reversed,
            pruned = stats.pruned,
            "applied reversal batch"
        );
        stats
    }

    /// Restore the topological order after a reversal batch.
    ///
    /// Sorts by the max distances of the last [`Bush::build_trees`], which
    /// must have run over the same flows that flagged the reversals.
    pub fn resort(&mut self, scratch: &mut SharedScratch) {
        topo::sort_by_max_distance(&mut self.order, &scratch.nodes, &mut scratch.sort_buf);
        debug_assert_eq!(
            topo::find_backward_edge(&self.order, &self.in_edges, &mut Vec::new()),
            None,
            "bush of origin {} is not topologically ordered after resort",
            self.origin
        );
    }

    fn update_edges(&mut self, net: &Network, scratch: &mut SharedScratch) -> ReversalStats {
        let stats = self.apply_pending_reversals(net);
        self.resort(scratch);
        stats
    }

    /// One equilibration pass.
    ///
    /// Scans the destinations whose gap exceeds `tolerance`, shifting flow
    /// at each, and rebuilds the trees after every scan that moved flow.
    /// Ends on a scan without change, leaving fresh trees and pending
    /// reversals behind. Returns whether any bush flow changed.
    pub fn equilibrate_flows(
        &mut self,
        net: &mut Network,
        scratch: &mut SharedScratch,
        tolerance: f64,
    ) -> bool {
        self.build_trees(net, scratch);

        let mut changed = false;
        for _ in 0..self.pass_limit {
            let mut scan_changed = false;
            for &(dest, _) in &self.destinations {
                if scratch.nodes[dest as usize].difference() > tolerance {
                    scan_changed |= equilibrate_node(
                        self.origin,
                        dest,
                        &mut self.in_edges,
                        scratch,
                        net,
                        &self.policy,
                    );
                }
            }
            if !scan_changed {
                return changed;
            }
            changed = true;
            self.build_trees(net, scratch);
        }

        warn!(
            origin = self.origin,
            passes = self.pass_limit,
            "equilibration stopped at pass limit"
        );
        changed
    }

    /// Equilibrate until a pass leaves no edge to reverse.
    ///
    /// Returns whether any flow changed; reversals alone do not count.
    pub fn fix(&mut self, net: &mut Network, scratch: &mut SharedScratch, tolerance: f64) -> bool {
        let mut changed = false;
        let mut batches = 0usize;
        let mut totals = ReversalStats::default();

        loop {
            changed |= self.equilibrate_flows(net, scratch, tolerance);
            if self.pending.is_empty() {
                break;
            }
            if batches >= self.pass_limit {
                warn!(
                    origin = self.origin,
                    batches,
                    pending = self.pending.len(),
                    "reversal loop stopped at pass limit"
                );
                break;
            }
            let stats = self.update_edges(net, scratch);
            totals.reversed += stats.reversed;
            totals.pruned += stats.pruned;
            batches += 1;
        }

        debug!(
            origin = self.origin,
            changed,
            batches,
            reversed = totals.reversed,
            pruned = totals.pruned,
            "fixed bush"
        );
        changed
    }

    /// Largest max-min cost gap over the reachable destinations
    pub fn max_difference(&self, net: &Network, scratch: &mut SharedScratch) -> f64 {
        self.compute_labels(net, &mut scratch.nodes);
        self.destinations
            .iter()
            .map(|&(dest, _)| scratch.nodes[dest as usize].difference())
            .fold(0.0, f64::max)
    }

    /// Cost of sending every destination's demand along its cheapest bush
    /// path at current link costs. Never exceeds [`Bush::total_cost`].
    pub fn all_or_nothing_cost(&self, net: &Network, scratch: &mut SharedScratch) -> f64 {
        self.compute_labels(net, &mut scratch.nodes);
        self.destinations
            .iter()
            .map(|&(dest, volume)| volume * scratch.nodes[dest as usize].min_dist)
            .sum()
    }

    /// Heuristic size of the bush in active use: vertices that share their
    /// max distance with the vertex before them in topological order.
    pub fn active_node_count(&self, net: &Network, scratch: &mut SharedScratch) -> usize {
        self.compute_labels(net, &mut scratch.nodes);
        topo::count_tied_positions(&self.order, &scratch.nodes)
    }

    /// Σ bush flow × current link cost
    pub fn total_cost(&self, net: &Network) -> f64 {
        self.in_edges
            .iter()
            .flatten()
            .map(|e| e.flow() * net.cost(e.link()))
            .sum()
    }

    /// Links this bush sends flow over, with the flow it sends
    pub fn link_flows(&self) -> impl Iterator<Item = (LinkId, f64)> + '_ {
        self.in_edges
            .iter()
            .flatten()
            .filter(|e| e.is_used())
            .map(|e| (e.link(), e.flow()))
    }

    #[inline]
    pub fn origin(&self) -> VertexId {
        self.origin
    }

    /// Reachable destinations with their demand
    pub fn destinations(&self) -> &[(VertexId, f64)] {
        &self.destinations
    }

    pub fn unreachable_destinations(&self) -> &[VertexId] {
        &self.unreachable
    }

    pub fn in_edges(&self, v: VertexId) -> &[BushEdge] {
        &self.in_edges[v as usize]
    }

    pub fn topological_order(&self) -> &[VertexId] {
        &self.order
    }

    pub fn pending_reversals(&self) -> &[(VertexId, u32)] {
        &self.pending
    }

    pub fn n_edges(&self) -> usize {
        self.in_edges.iter().map(Vec::len).sum()
    }

    pub fn set_pass_limit(&mut self, limit: usize) {
        self.pass_limit = limit.max(1);
    }

    /// Check placement, link uniqueness, reachability, ordering, flow signs,
    /// attribution against the network and conservation at every vertex.
    pub fn check_invariants(&self, net: &Network) -> Result<(), InvariantViolation> {
        let mut seen = vec![false; net.n_links()];
        for (v, list) in self.in_edges.iter().enumerate() {
            for edge in list {
                if edge.to() as usize != v {
                    return Err(InvariantViolation::MisplacedEdge {
                        vertex: v as VertexId,
                        to: edge.to(),
                    });
                }
                let slot = &mut seen[edge.link() as usize];
                if *slot {
                    return Err(InvariantViolation::DuplicateLink { link: edge.link() });
                }
                *slot = true;
            }
        }

        if let Some(&vertex) = self
            .order
            .iter()
            .find(|&&v| v != self.origin && self.in_edges[v as usize].is_empty())
        {
            return Err(InvariantViolation::Unreached { vertex });
        }

        if let Some((from, to)) =
            topo::find_backward_edge(&self.order, &self.in_edges, &mut Vec::new())
        {
            return Err(InvariantViolation::BackwardEdge { from, to });
        }

        let mut balance = vec![0.0f64; self.in_edges.len()];
        let mut scale = 1.0f64;
        for edge in self.in_edges.iter().flatten() {
            let flow = edge.flow();
            if flow < 0.0 {
                return Err(InvariantViolation::NegativeFlow {
                    link: edge.link(),
                    flow,
                });
            }
            let network = net.link(edge.link()).flow();
            if flow > network + 1e-9 * network.abs().max(1.0) {
                return Err(InvariantViolation::FlowExceedsNetwork {
                    link: edge.link(),
                    bush: flow,
                    network,
                });
            }
            balance[edge.to() as usize] += flow;
            balance[edge.from() as usize] -= flow;
            scale = scale.max(flow);
        }
        for &(dest, volume) in &self.destinations {
            balance[dest as usize] -= volume;
            balance[self.origin as usize] += volume;
        }

        let eps = 1e-9 * scale;
        if let Some((v, &excess)) = balance
            .iter()
            .enumerate()
            .find(|(_, excess)| excess.abs() > eps)
        {
            return Err(InvariantViolation::Imbalance {
                vertex: v as VertexId,
                excess,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ef_network::{CostFunction, NetworkBuilder};

    /// O(0) -> A(1) -> B(2) plus O -> B, with A -> B either a two-way road
    /// or a one-way link. Demand 10 to A and 1 to B.
    fn triangle(two_way: bool) -> (Network, Origin) {
        let mut b = NetworkBuilder::new(3);
        b.add_link(0, 1, CostFunction::linear(1.0, 1.0)).unwrap();
        b.add_link(0, 2, CostFunction::Constant(3.0)).unwrap();
        if two_way {
            b.add_road(1, 2, CostFunction::Constant(1.0)).unwrap();
        } else {
            b.add_link(1, 2, CostFunction::Constant(1.0)).unwrap();
        }
        let origin = Origin::new(0, [(1, 10.0), (2, 1.0)]).unwrap();
        (b.build(), origin)
    }

    #[test]
    fn test_construction_admits_forward_links_only() {
        let (mut net, origin) = triangle(true);
        let mut scratch = SharedScratch::for_network(&net);
        let bush = Bush::new(&origin, &mut net, &mut scratch);

        assert_eq!(bush.topological_order(), &[0, 1, 2]);
        // B -> A points backwards in settle order and stays out
        assert_eq!(bush.n_edges(), 3);
        assert!(bush.in_edges(1).iter().all(|e| e.from() == 0));
        assert!(bush.check_invariants(&net).is_ok());
    }

    #[test]
    fn test_initial_load_follows_min_tree() {
        let (mut net, origin) = triangle(true);
        let mut scratch = SharedScratch::for_network(&net);
        let bush = Bush::new(&origin, &mut net, &mut scratch);

        assert_eq!(net.link(0).flow(), 11.0);
        assert_eq!(net.link(1).flow(), 0.0);
        assert_eq!(net.link(2).flow(), 1.0);
        assert_eq!(net.cost(0), 12.0);
        let mut flows: Vec<_> = bush.link_flows().collect();
        flows.sort_by_key(|&(id, _)| id);
        assert_eq!(flows, vec![(0, 11.0), (2, 1.0)]);
    }

    #[test]
    fn test_fix_reverses_unused_edge() {
        let (mut net, origin) = triangle(true);
        let mut scratch = SharedScratch::for_network(&net);
        let mut bush = Bush::new(&origin, &mut net, &mut scratch);

        assert!(bush.fix(&mut net, &mut scratch, 0.0));

        // A -> B turned into B -> A and B now precedes A
        assert_eq!(bush.topological_order(), &[0, 2, 1]);
        assert!(bush.in_edges(2).iter().all(|e| e.from() == 0));
        assert_eq!(bush.in_edges(1).len(), 2);
        assert_eq!(net.link(0).flow(), 3.0);
        assert_eq!(net.link(1).flow(), 8.0);
        assert_eq!(net.link(2).flow(), 0.0);
        assert_eq!(net.link(3).flow(), 7.0);
        assert_eq!(bush.max_difference(&net, &mut scratch), 0.0);
        assert!(bush.check_invariants(&net).is_ok());
    }

    #[test]
    fn test_fix_prunes_one_way_edge() {
        let (mut net, origin) = triangle(false);
        let mut scratch = SharedScratch::for_network(&net);
        let mut bush = Bush::new(&origin, &mut net, &mut scratch);

        assert!(bush.fix(&mut net, &mut scratch, 0.0));

        assert_eq!(bush.n_edges(), 2);
        assert_eq!(net.link(0).flow(), 10.0);
        assert_eq!(net.link(1).flow(), 1.0);
        assert_eq!(net.link(2).flow(), 0.0);
        assert!(bush.check_invariants(&net).is_ok());
    }

    #[test]
    fn test_fix_reverses_one_parallel_link_and_prunes_the_other() {
        // Two A -> D links share a single D -> A counterpart
        let mut b = NetworkBuilder::new(3);
        b.add_link(0, 1, CostFunction::linear(1.0, 1.0)).unwrap();
        b.add_link(0, 2, CostFunction::Constant(1.5)).unwrap();
        b.add_link(1, 2, CostFunction::Constant(1.0)).unwrap();
        b.add_link(1, 2, CostFunction::Constant(1.0)).unwrap();
        b.add_link(2, 1, CostFunction::Constant(1.0)).unwrap();
        let mut net = b.build();
        let origin = Origin::new(0, [(1, 10.0), (2, 1.0)]).unwrap();
        let mut scratch = SharedScratch::for_network(&net);
        let mut bush = Bush::new(&origin, &mut net, &mut scratch);
        assert_eq!(bush.n_edges(), 4);

        assert!(bush.fix(&mut net, &mut scratch, 1e-9));

        let mut links: Vec<LinkId> = (0..3)
            .flat_map(|v| bush.in_edges(v).iter().map(BushEdge::link))
            .collect();
        links.sort_unstable();
        assert_eq!(links, vec![0, 1, 4]);
        assert_eq!(bush.topological_order(), &[0, 2, 1]);
        assert_eq!(net.link(0).flow(), 1.5);
        assert_eq!(net.link(1).flow(), 9.5);
        assert_eq!(net.link(2).flow(), 0.0);
        assert_eq!(net.link(3).flow(), 0.0);
        assert_eq!(net.link(4).flow(), 8.5);
        assert_eq!(bush.max_difference(&net, &mut scratch), 0.0);
        assert!(bush.check_invariants(&net).is_ok());
    }

    #[test]
    fn test_invariants_catch_duplicate_link() {
        let (mut net, origin) = triangle(true);
        let mut scratch = SharedScratch::for_network(&net);
        let mut bush = Bush::new(&origin, &mut net, &mut scratch);

        let copy = bush.in_edges[2][0].clone();
        let link = copy.link();
        bush.in_edges[2].push(copy);
        assert_eq!(
            bush.check_invariants(&net),
            Err(InvariantViolation::DuplicateLink { link })
        );
    }

    #[test]
    fn test_invariants_catch_vertex_without_in_edge() {
        let (mut net, origin) = triangle(true);
        let mut scratch = SharedScratch::for_network(&net);
        let mut bush = Bush::new(&origin, &mut net, &mut scratch);

        bush.in_edges[1].clear();
        assert_eq!(
            bush.check_invariants(&net),
            Err(InvariantViolation::Unreached { vertex: 1 })
        );
    }

    #[test]
    fn test_reversal_keeps_untouched_edge_order() {
        // Three links into D(3) from O, A, B; only the middle one gets flagged
        let mut b = NetworkBuilder::new(4);
        b.add_link(0, 1, CostFunction::Constant(1.0)).unwrap();
        b.add_link(0, 2, CostFunction::Constant(2.0)).unwrap();
        b.add_link(0, 3, CostFunction::Constant(9.0)).unwrap();
        b.add_road(1, 3, CostFunction::Constant(9.0)).unwrap();
        b.add_link(2, 3, CostFunction::Constant(9.0)).unwrap();
        let mut net = b.build();
        let origin = Origin::new(0, [(3, 1.0)]).unwrap();
        let mut scratch = SharedScratch::for_network(&net);
        let mut bush = Bush::new(&origin, &mut net, &mut scratch);

        let before: Vec<VertexId> = bush.in_edges(3).iter().map(BushEdge::from).collect();
        assert_eq!(before, vec![0, 1, 2]);

        bush.pending = vec![(3, 1)];
        let stats = bush.apply_pending_reversals(&net);
        assert_eq!(stats, ReversalStats { reversed: 1, pruned: 0 });

        let after: Vec<VertexId> = bush.in_edges(3).iter().map(BushEdge::from).collect();
        assert_eq!(after, vec![0, 2]);
        assert_eq!(bush.in_edges(1).last().map(BushEdge::from), Some(3));
        assert!(bush.pending_reversals().is_empty());
    }

    #[test]
    fn test_diagnostics_do_not_move_flow() {
        let (mut net, origin) = triangle(true);
        let mut scratch = SharedScratch::for_network(&net);
        let bush = Bush::new(&origin, &mut net, &mut scratch);
        let before: Vec<f64> = net.links().iter().map(|l| l.flow()).collect();

        // A at 12, B at min 3 / max 13
        assert_eq!(bush.max_difference(&net, &mut scratch), 10.0);
        assert_eq!(bush.all_or_nothing_cost(&net, &mut scratch), 10.0 * 12.0 + 3.0);
        assert_eq!(bush.active_node_count(&net, &mut scratch), 0);
        assert_eq!(bush.total_cost(&net), 11.0 * 12.0 + 1.0);

        let after: Vec<f64> = net.links().iter().map(|l| l.flow()).collect();
        assert_eq!(before, after);
    }
}
