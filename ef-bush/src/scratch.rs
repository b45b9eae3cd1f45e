//! Working memory shared by every bush of one network
//!
//! Distance labels are rebuilt by each bush before use, so one arena serves
//! all origins processed sequentially. Sized once to the network's vertex
//! count; bushes never grow it.

use ef_network::{Network, VertexId};

use crate::node::NodeDistance;

#[derive(Debug, Clone)]
pub struct SharedScratch {
    pub(crate) nodes: Vec<NodeDistance>,
    pub(crate) sort_buf: Vec<(f64, VertexId)>,
    pub(crate) min_segment: Vec<(VertexId, u32)>,
    pub(crate) max_segment: Vec<(VertexId, u32)>,
}

impl SharedScratch {
    pub fn new(n_vertices: usize) -> Self {
        Self {
            nodes: vec![NodeDistance::default(); n_vertices],
            sort_buf: Vec::with_capacity(n_vertices),
            min_segment: Vec::new(),
            max_segment: Vec::new(),
        }
    }

    pub fn for_network(net: &Network) -> Self {
        Self::new(net.n_vertices())
    }

    pub fn n_vertices(&self) -> usize {
        self.nodes.len()
    }

    /// Labels from the most recent tree build of whichever bush ran last
    #[inline]
    pub fn node(&self, v: VertexId) -> &NodeDistance {
        &self.nodes[v as usize]
    }
}
