//! Origin-destination demand

use ef_common::{Error, Result};
use rustc_hash::FxHashMap;

use crate::network::VertexId;

/// One origin and the volume it sends to each destination
#[derive(Debug, Clone, PartialEq)]
pub struct Origin {
    origin: VertexId,
    destinations: Vec<(VertexId, f64)>,
}

impl Origin {
    /// Zero volumes and trips back to the origin are dropped; repeated
    /// destinations are summed, keeping first-seen order.
    pub fn new(
        origin: VertexId,
        destinations: impl IntoIterator<Item = (VertexId, f64)>,
    ) -> Result<Self> {
        let mut index: FxHashMap<VertexId, usize> = FxHashMap::default();
        let mut merged: Vec<(VertexId, f64)> = Vec::new();

        for (dest, volume) in destinations {
            if !volume.is_finite() || volume < 0.0 {
                return Err(Error::invalid(format!(
                    "demand {origin} -> {dest} must be a non-negative number, got {volume}"
                )));
            }
            if dest == origin || volume == 0.0 {
                continue;
            }
            match index.get(&dest) {
                Some(&slot) => merged[slot].1 += volume,
                None => {
                    index.insert(dest, merged.len());
                    merged.push((dest, volume));
                }
            }
        }

        Ok(Self {
            origin,
            destinations: merged,
        })
    }

    #[inline]
    pub fn origin(&self) -> VertexId {
        self.origin
    }

    #[inline]
    pub fn destinations(&self) -> &[(VertexId, f64)] {
        &self.destinations
    }

    pub fn total_demand(&self) -> f64 {
        self.destinations.iter().map(|&(_, v)| v).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.destinations.is_empty()
    }
}

/// Demand for every origin in a network
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Demand {
    origins: Vec<Origin>,
}

impl Demand {
    pub fn new(origins: Vec<Origin>) -> Self {
        Self { origins }
    }

    pub fn origins(&self) -> &[Origin] {
        &self.origins
    }

    pub fn push(&mut self, origin: Origin) {
        self.origins.push(origin);
    }

    pub fn total_demand(&self) -> f64 {
        self.origins.iter().map(Origin::total_demand).sum()
    }

    pub fn n_pairs(&self) -> usize {
        self.origins.iter().map(|o| o.destinations().len()).sum()
    }

    /// Check every vertex id against a network of `n_vertices`
    pub fn validate(&self, n_vertices: usize) -> Result<()> {
        for o in &self.origins {
            if o.origin() as usize >= n_vertices {
                return Err(Error::invalid(format!(
                    "origin {} outside network of {n_vertices} vertices",
                    o.origin()
                )));
            }
            if let Some(&(dest, _)) = o
                .destinations()
                .iter()
                .find(|&&(d, _)| d as usize >= n_vertices)
            {
                return Err(Error::invalid(format!(
                    "destination {dest} of origin {} outside network of {n_vertices} vertices",
                    o.origin()
                )));
            }
        }
        Ok(())
    }
}
