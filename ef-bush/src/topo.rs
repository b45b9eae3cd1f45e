//! Incremental topological order repair
//!
//! After reversals the order is restored by a stable sort on each vertex's
//! max distance instead of a zero in-degree traversal. Reversals are few and
//! local, so the sort's constant factor wins over an O(V + E) rebuild on
//! road networks.
//!
//! # Contract
//!
//! Call only right after a tree build over the current in-edge lists, with
//! reversed edges already moved. Every in-edge `(u -> v)` must then satisfy
//! `max(u) <= max(v)`, with equality only where `u` already precedes `v`;
//! the stable sort keeps those pairs in place.

use ef_network::VertexId;

use crate::edge::BushEdge;
use crate::node::NodeDistance;

/// Reorder `order` by ascending max distance, ties kept in current order.
/// `buf` is reused across calls and its contents are discarded.
pub fn sort_by_max_distance(
    order: &mut [VertexId],
    nodes: &[NodeDistance],
    buf: &mut Vec<(f64, VertexId)>,
) {
    buf.clear();
    buf.extend(order.iter().map(|&v| (nodes[v as usize].max_dist, v)));
    // slice::sort_by is stable
    buf.sort_by(|a, b| a.0.total_cmp(&b.0));
    for (slot, &(_, v)) in order.iter_mut().zip(buf.iter()) {
        *slot = v;
    }
}

/// First in-edge that points backwards in `order`, as `(from, to)`.
///
/// `positions` is scratch space of at least the largest vertex id + 1.
pub fn find_backward_edge(
    order: &[VertexId],
    in_edges: &[Vec<BushEdge>],
    positions: &mut Vec<u32>,
) -> Option<(VertexId, VertexId)> {
    positions.clear();
    positions.resize(in_edges.len(), u32::MAX);
    for (pos, &v) in order.iter().enumerate() {
        positions[v as usize] = pos as u32;
    }
    in_edges.iter().flatten().find_map(|edge| {
        let from = positions[edge.from() as usize];
        let to = positions[edge.to() as usize];
        (from == u32::MAX || to == u32::MAX || from >= to).then_some((edge.from(), edge.to()))
    })
}

/// Number of vertices sharing a max distance with their predecessor in
/// `order`. A cheap proxy for how much of the bush is in active use.
pub fn count_tied_positions(order: &[VertexId], nodes: &[NodeDistance]) -> usize {
    order
        .windows(2)
        .filter(|w| nodes[w[0] as usize].max_dist == nodes[w[1] as usize].max_dist)
        .count()
}
