//! Bush-local view of a network link

use ef_network::{LinkId, Network, VertexId};

/// A link as one bush sees it: a fixed direction consistent with the bush's
/// topological order and the share of the link's flow this origin sends.
#[derive(Debug, Clone, PartialEq)]
pub struct BushEdge {
    link: LinkId,
    from: VertexId,
    to: VertexId,
    flow: f64,
}

impl BushEdge {
    pub fn new(link: LinkId, from: VertexId, to: VertexId) -> Self {
        Self {
            link,
            from,
            to,
            flow: 0.0,
        }
    }

    #[inline]
    pub fn link(&self) -> LinkId {
        self.link
    }

    #[inline]
    pub fn from(&self) -> VertexId {
        self.from
    }

    #[inline]
    pub fn to(&self) -> VertexId {
        self.to
    }

    /// This origin's flow on the link
    #[inline]
    pub fn flow(&self) -> f64 {
        self.flow
    }

    #[inline]
    pub fn is_used(&self) -> bool {
        self.flow > 0.0
    }

    /// Current cost of the underlying link
    #[inline]
    pub fn cost(&self, net: &Network) -> f64 {
        net.cost(self.link)
    }

    /// Change bush flow without touching the network. Only used while the
    /// initial load is accumulated.
    pub(crate) fn add_local_flow(&mut self, delta: f64) {
        self.flow += delta;
    }

    /// Change this bush's flow and forward the same delta to the network
    /// link, refreshing its cost. Returns whether the bush flow changed.
    pub fn add_flow(&mut self, net: &mut Network, delta: f64) -> bool {
        let before = self.flow;
        self.flow = (before + delta).max(0.0);
        let applied = self.flow - before;
        if applied == 0.0 {
            return false;
        }
        net.add_flow(self.link, applied);
        true
    }

    /// Turn the edge around onto the link's counterpart.
    ///
    /// Only unused edges are turned. Returns false when the link has no
    /// counterpart, leaving the edge unchanged.
    pub fn reverse(&mut self, net: &Network) -> bool {
        debug_assert_eq!(self.flow, 0.0, "reversing link {} with flow", self.link);
        match net.reverse(self.link) {
            Some(counterpart) => {
                self.link = counterpart;
                std::mem::swap(&mut self.from, &mut self.to);
                true
            }
            None => false,
        }
    }
}
