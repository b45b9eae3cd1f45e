//! Per-vertex min/max distance bookkeeping
//!
//! Recomputed on every tree build, vertex by vertex in topological order.
//! Predecessors are indices into the vertex's in-edge list, valid until the
//! next reversal batch touches that list.

use ef_network::Network;

use crate::edge::BushEdge;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeDistance {
    /// Cheapest bush path cost from the origin
    pub min_dist: f64,
    /// Costliest used bush path cost from the origin
    pub max_dist: f64,
    /// In-edge index achieving `min_dist`
    pub min_pred: Option<u32>,
    /// In-edge index achieving `max_dist`
    pub max_pred: Option<u32>,
    /// Position in the bush's topological order
    pub position: u32,
}

impl Default for NodeDistance {
    fn default() -> Self {
        Self {
            min_dist: f64::INFINITY,
            max_dist: f64::INFINITY,
            min_pred: None,
            max_pred: None,
            position: u32::MAX,
        }
    }
}

impl NodeDistance {
    pub fn origin() -> Self {
        Self {
            min_dist: 0.0,
            max_dist: 0.0,
            min_pred: None,
            max_pred: None,
            position: 0,
        }
    }

    /// Cost gap between the costliest used path and the cheapest path
    #[inline]
    pub fn difference(&self) -> f64 {
        self.max_dist - self.min_dist
    }

    /// Relax a vertex over its in-edges.
    ///
    /// Min is taken over every in-edge. Max is taken over in-edges carrying
    /// flow; a vertex without any falls back to the max over all in-edges,
    /// which keeps `max(from) <= max(to)` for every in-edge of an unused
    /// vertex. Ties keep the first edge found.
    pub fn from_in_edges(
        in_edges: &[BushEdge],
        nodes: &[NodeDistance],
        net: &Network,
        position: u32,
    ) -> Self {
        let mut min_dist = f64::INFINITY;
        let mut min_pred = None;
        let mut used_max = f64::NEG_INFINITY;
        let mut used_pred = None;
        let mut any_max = f64::NEG_INFINITY;
        let mut any_pred = None;

        for (idx, edge) in in_edges.iter().enumerate() {
            let from = &nodes[edge.from() as usize];
            let cost = net.cost(edge.link());

            let via_min = from.min_dist + cost;
            if via_min < min_dist {
                min_dist = via_min;
                min_pred = Some(idx as u32);
            }

            let via_max = from.max_dist + cost;
            if edge.is_used() && via_max > used_max {
                used_max = via_max;
                used_pred = Some(idx as u32);
            }
            if via_max > any_max {
                any_max = via_max;
                any_pred = Some(idx as u32);
            }
        }

        let (max_dist, max_pred) = match used_pred {
            Some(_) => (used_max, used_pred),
            None if any_pred.is_some() => (any_max, any_pred),
            None => (f64::INFINITY, None),
        };

        Self {
            min_dist,
            max_dist,
            min_pred,
            max_pred,
            position,
        }
    }
}
