//! Flow shifting between diverging min and max tree segments
//!
//! For a destination, both trees are followed back toward the origin. Where
//! they share an edge nothing can be gained, so the shared stretch is
//! skipped. Where they diverge, both are walked back to their latest common
//! vertex (always stepping the side that is later in topological order) and
//! flow moves from the max segment onto the min segment. The walk then
//! continues from the common vertex, so every diverging stretch of the path
//! is treated once per call.
//!
//! Segment costs, derivatives and flows are read live from the network and
//! the bush, so shifts made earlier in the same scan are taken into account
//! even though the tree labels are stale.

use ef_network::{Network, VertexId};

use crate::edge::BushEdge;
use crate::scratch::SharedScratch;

/// Live measurements of one pair of diverging segments
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentSummary {
    /// Current cost of the min-tree segment
    pub min_cost: f64,
    /// Current cost of the max-tree segment
    pub max_cost: f64,
    /// Sum of link cost derivatives over both segments
    pub derivative_sum: f64,
    /// Smallest bush flow on the max-tree segment
    pub max_segment_flow: f64,
}

impl SegmentSummary {
    #[inline]
    pub fn gap(&self) -> f64 {
        self.max_cost - self.min_cost
    }
}

/// How much flow to move from the max segment to the min segment.
///
/// Implementations must return a value in `0..=max_segment_flow` and should
/// move the segment cost gap toward zero.
pub trait ShiftPolicy {
    fn shift(&self, segments: &SegmentSummary) -> f64;
}

/// Newton step on the segment gap: `gap / derivative_sum`, capped by the
/// flow available on the max segment. Flow-independent segments move
/// everything at once.
#[derive(Debug, Clone, Copy, Default)]
pub struct NewtonShift;

impl ShiftPolicy for NewtonShift {
    fn shift(&self, s: &SegmentSummary) -> f64 {
        let gap = s.gap();
        if gap <= 0.0 || s.max_segment_flow <= 0.0 {
            return 0.0;
        }
        if s.derivative_sum <= 0.0 || !s.derivative_sum.is_finite() {
            return s.max_segment_flow;
        }
        (gap / s.derivative_sum).min(s.max_segment_flow)
    }
}

/// Measure a segment given as `(to vertex, in-edge index)` pairs
fn measure(segment: &[(VertexId, u32)], in_edges: &[Vec<BushEdge>], net: &Network) -> (f64, f64, f64) {
    let mut cost = 0.0;
    let mut derivative = 0.0;
    let mut min_flow = f64::INFINITY;
    for &(v, idx) in segment {
        let edge = &in_edges[v as usize][idx as usize];
        cost += net.cost(edge.link());
        derivative += net.derivative(edge.link());
        min_flow = min_flow.min(edge.flow());
    }
    (cost, derivative, min_flow)
}

fn apply(
    segment: &[(VertexId, u32)],
    in_edges: &mut [Vec<BushEdge>],
    net: &mut Network,
    delta: f64,
) -> bool {
    let mut changed = false;
    for &(v, idx) in segment {
        changed |= in_edges[v as usize][idx as usize].add_flow(net, delta);
    }
    changed
}

/// Equilibrate every diverging stretch between `dest` and `origin`.
///
/// Tree labels in `scratch` must come from a build over the current in-edge
/// lists. Returns whether any bush flow changed.
pub fn equilibrate_node<P: ShiftPolicy + ?Sized>(
    origin: VertexId,
    dest: VertexId,
    in_edges: &mut [Vec<BushEdge>],
    scratch: &mut SharedScratch,
    net: &mut Network,
    policy: &P,
) -> bool {
    let SharedScratch {
        nodes,
        min_segment,
        max_segment,
        ..
    } = scratch;

    let mut changed = false;
    let mut node = dest;

    while node != origin {
        let label = nodes[node as usize];
        let (Some(min_idx), Some(max_idx)) = (label.min_pred, label.max_pred) else {
            break;
        };

        if min_idx == max_idx {
            node = in_edges[node as usize][min_idx as usize].from();
            continue;
        }

        min_segment.clear();
        max_segment.clear();
        min_segment.push((node, min_idx));
        max_segment.push((node, max_idx));
        let mut a = in_edges[node as usize][min_idx as usize].from();
        let mut b = in_edges[node as usize][max_idx as usize].from();

        let mut broken = false;
        while a != b {
            if nodes[a as usize].position > nodes[b as usize].position {
                match nodes[a as usize].min_pred {
                    Some(idx) => {
                        min_segment.push((a, idx));
                        a = in_edges[a as usize][idx as usize].from();
                    }
                    None => {
                        broken = true;
                        break;
                    }
                }
            } else {
                match nodes[b as usize].max_pred {
                    Some(idx) => {
                        max_segment.push((b, idx));
                        b = in_edges[b as usize][idx as usize].from();
                    }
                    None => {
                        broken = true;
                        break;
                    }
                }
            }
        }
        if broken {
            break;
        }

        let (min_cost, min_deriv, _) = measure(min_segment, in_edges, net);
        let (max_cost, max_deriv, max_flow) = measure(max_segment, in_edges, net);
        let summary = SegmentSummary {
            min_cost,
            max_cost,
            derivative_sum: min_deriv + max_deriv,
            max_segment_flow: max_flow,
        };

        let delta = policy.shift(&summary).clamp(0.0, max_flow.max(0.0));
        if delta > 0.0 {
            changed |= apply(min_segment, in_edges, net, delta);
            changed |= apply(max_segment, in_edges, net, -delta);
        }

        node = a;
    }

    changed
}
