//! Single-source shortest paths on current link costs
//!
//! Dijkstra with a binary heap. Besides distances the result records the
//! position at which each vertex was settled. Settle positions form a valid
//! topological order of the shortest-path DAG, zero-cost links included,
//! which is what a bush needs to pick its initial acyclic edge set.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::network::{Network, VertexId};

#[derive(Debug, Clone)]
pub struct ShortestPathOrder {
    /// Vertex -> settle position (`None` = unreachable)
    pub rank: Vec<Option<u32>>,
    /// Settle position -> vertex (origin first, reachable vertices only)
    pub order: Vec<VertexId>,
    /// Vertex -> distance from the origin (`f64::INFINITY` = unreachable)
    pub dist: Vec<f64>,
}

impl ShortestPathOrder {
    #[inline]
    pub fn is_reachable(&self, v: VertexId) -> bool {
        self.rank[v as usize].is_some()
    }

    #[inline]
    pub fn rank(&self, v: VertexId) -> Option<u32> {
        self.rank[v as usize]
    }

    pub fn n_reachable(&self) -> usize {
        self.order.len()
    }
}

#[derive(Debug, Clone, Copy)]
struct HeapEntry {
    dist: f64,
    vertex: VertexId,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap; lower vertex id wins ties
        other
            .dist
            .total_cmp(&self.dist)
            .then_with(|| other.vertex.cmp(&self.vertex))
    }
}

impl Network {
    /// Dijkstra from `origin` over current link costs
    pub fn shortest_path_order(&self, origin: VertexId) -> ShortestPathOrder {
        let n = self.n_vertices();
        let mut dist = vec![f64::INFINITY; n];
        let mut rank: Vec<Option<u32>> = vec![None; n];
        let mut order = Vec::with_capacity(n);
        let mut heap = BinaryHeap::new();

        dist[origin as usize] = 0.0;
        heap.push(HeapEntry {
            dist: 0.0,
            vertex: origin,
        });

        while let Some(HeapEntry { dist: d, vertex: u }) = heap.pop() {
            // Skip if stale
            if rank[u as usize].is_some() || d > dist[u as usize] {
                continue;
            }
            rank[u as usize] = Some(order.len() as u32);
            order.push(u);

            for &link_id in self.out_links(u) {
                let link = self.link(link_id);
                let v = link.to;
                if rank[v as usize].is_some() {
                    continue;
                }
                let candidate = d + link.cost();
                if candidate < dist[v as usize] {
                    dist[v as usize] = candidate;
                    heap.push(HeapEntry {
                        dist: candidate,
                        vertex: v,
                    });
                }
            }
        }

        ShortestPathOrder { rank, order, dist }
    }
}
