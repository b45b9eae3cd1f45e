//! Vertices, directed links and their shared flow state
//!
//! Links are stored flat and addressed by dense `LinkId`. Every link knows
//! its reverse counterpart (the link running the other way between the same
//! two vertices) when one exists; bushes use it to turn an edge around.
//! Out-adjacency is a CSR layout (offsets + link ids) built once.

use ef_common::{Error, Result};
use rustc_hash::FxHashMap;

use crate::cost::CostFunction;

pub type VertexId = u32;
pub type LinkId = u32;

/// Flows this close below zero are rounding noise and get clamped.
const FLOW_EPS: f64 = 1e-6;

#[derive(Debug, Clone)]
pub struct Link {
    pub from: VertexId,
    pub to: VertexId,
    pub cost_fn: CostFunction,
    flow: f64,
    cost: f64,
    reverse: Option<LinkId>,
}

impl Link {
    /// Total flow from all bushes
    #[inline]
    pub fn flow(&self) -> f64 {
        self.flow
    }

    /// Cost at the current total flow
    #[inline]
    pub fn cost(&self) -> f64 {
        self.cost
    }

    #[inline]
    pub fn derivative(&self) -> f64 {
        self.cost_fn.derivative(self.flow)
    }

    /// Counterpart link running `to -> from`, if the network has one
    #[inline]
    pub fn reverse(&self) -> Option<LinkId> {
        self.reverse
    }
}

/// Collects links before the adjacency and link pairing are frozen
#[derive(Debug)]
pub struct NetworkBuilder {
    n_vertices: usize,
    links: Vec<Link>,
}

impl NetworkBuilder {
    pub fn new(n_vertices: usize) -> Self {
        Self {
            n_vertices,
            links: Vec::new(),
        }
    }

    pub fn with_capacity(n_vertices: usize, n_links: usize) -> Self {
        Self {
            n_vertices,
            links: Vec::with_capacity(n_links),
        }
    }

    pub fn add_link(
        &mut self,
        from: VertexId,
        to: VertexId,
        cost_fn: CostFunction,
    ) -> Result<LinkId> {
        if from as usize >= self.n_vertices || to as usize >= self.n_vertices {
            return Err(Error::invalid(format!(
                "link {from} -> {to} references a vertex outside 0..{}",
                self.n_vertices
            )));
        }
        if from == to {
            return Err(Error::invalid(format!("self-loop on vertex {from}")));
        }
        cost_fn.validate()?;

        let id = self.links.len() as LinkId;
        self.links.push(Link {
            from,
            to,
            cost_fn,
            flow: 0.0,
            cost: cost_fn.cost(0.0),
            reverse: None,
        });
        Ok(id)
    }

    /// Add `a -> b` and `b -> a` with the same cost function
    pub fn add_road(
        &mut self,
        a: VertexId,
        b: VertexId,
        cost_fn: CostFunction,
    ) -> Result<(LinkId, LinkId)> {
        let ab = self.add_link(a, b, cost_fn)?;
        let ba = self.add_link(b, a, cost_fn)?;
        Ok((ab, ba))
    }

    /// Pair links with their counterparts and build out-adjacency.
    ///
    /// Pairing is one-to-one: the k-th `a -> b` link added is paired with
    /// the k-th `b -> a` link. Surplus parallel links have no counterpart.
    pub fn build(mut self) -> Network {
        let mut by_pair: FxHashMap<(VertexId, VertexId), Vec<LinkId>> = FxHashMap::default();
        let mut nth = Vec::with_capacity(self.links.len());
        for (id, link) in self.links.iter().enumerate() {
            let group = by_pair.entry((link.from, link.to)).or_default();
            nth.push(group.len());
            group.push(id as LinkId);
        }
        for (link, k) in self.links.iter_mut().zip(nth) {
            link.reverse = by_pair
                .get(&(link.to, link.from))
                .and_then(|group| group.get(k))
                .copied();
        }

        let mut out_offsets = vec![0usize; self.n_vertices + 1];
        for link in &self.links {
            out_offsets[link.from as usize + 1] += 1;
        }
        for v in 0..self.n_vertices {
            out_offsets[v + 1] += out_offsets[v];
        }
        let mut fill = out_offsets.clone();
        let mut out_links = vec![0 as LinkId; self.links.len()];
        for (id, link) in self.links.iter().enumerate() {
            let slot = &mut fill[link.from as usize];
            out_links[*slot] = id as LinkId;
            *slot += 1;
        }

        Network {
            n_vertices: self.n_vertices,
            links: self.links,
            out_offsets,
            out_links,
        }
    }
}

/// The road network shared by every bush
#[derive(Debug, Clone)]
pub struct Network {
    n_vertices: usize,
    links: Vec<Link>,
    out_offsets: Vec<usize>,
    out_links: Vec<LinkId>,
}

impl Network {
    pub fn n_vertices(&self) -> usize {
        self.n_vertices
    }

    pub fn n_links(&self) -> usize {
        self.links.len()
    }

    #[inline]
    pub fn link(&self, id: LinkId) -> &Link {
        &self.links[id as usize]
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// Iterate `(LinkId, &Link)` pairs
    pub fn iter_links(&self) -> impl Iterator<Item = (LinkId, &Link)> + '_ {
        self.links
            .iter()
            .enumerate()
            .map(|(id, link)| (id as LinkId, link))
    }

    /// Links leaving `v`
    #[inline]
    pub fn out_links(&self, v: VertexId) -> &[LinkId] {
        let start = self.out_offsets[v as usize];
        let end = self.out_offsets[v as usize + 1];
        &self.out_links[start..end]
    }

    #[inline]
    pub fn endpoints(&self, id: LinkId) -> (VertexId, VertexId) {
        let link = self.link(id);
        (link.from, link.to)
    }

    #[inline]
    pub fn reverse(&self, id: LinkId) -> Option<LinkId> {
        self.link(id).reverse
    }

    #[inline]
    pub fn cost(&self, id: LinkId) -> f64 {
        self.link(id).cost
    }

    #[inline]
    pub fn derivative(&self, id: LinkId) -> f64 {
        self.link(id).derivative()
    }

    /// Add `delta` to a link's total flow and refresh its cost
    pub fn add_flow(&mut self, id: LinkId, delta: f64) {
        let link = &mut self.links[id as usize];
        link.flow += delta;
        if link.flow < 0.0 {
            debug_assert!(
                link.flow > -FLOW_EPS * delta.abs().max(1.0),
                "link {id} flow went negative: {}",
                link.flow
            );
            link.flow = 0.0;
        }
        link.cost = link.cost_fn.cost(link.flow);
    }

    /// Sum over links of flow times cost
    pub fn total_cost(&self) -> f64 {
        self.links.iter().map(|l| l.flow * l.cost).sum()
    }
}
