//! Random grid networks for the bush tests
#![allow(dead_code)]

use ef_network::{CostFunction, Demand, Network, NetworkBuilder, Origin, VertexId};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// `w x h` grid of BPR links. Most neighbours get a two-way road, the rest
/// a one-way link in a random direction, so some vertices may be
/// unreachable from some origins.
pub fn grid(seed: u64, w: u32, h: u32) -> Network {
    grid_with(seed, w, h, 0.8)
}

/// Like [`grid`] with `two_way` as the chance that a neighbour pair gets a road
pub fn grid_with(seed: u64, w: u32, h: u32, two_way: f64) -> Network {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut b = NetworkBuilder::new((w * h) as usize);
    let id = |x: u32, y: u32| y * w + x;

    for y in 0..h {
        for x in 0..w {
            let mut neighbours = Vec::new();
            if x + 1 < w {
                neighbours.push(id(x + 1, y));
            }
            if y + 1 < h {
                neighbours.push(id(x, y + 1));
            }
            for n in neighbours {
                let cost = CostFunction::bpr(rng.random_range(1.0..4.0), rng.random_range(5.0..20.0));
                let here = id(x, y);
                if rng.random_bool(two_way) {
                    b.add_road(here, n, cost).unwrap();
                } else if rng.random_bool(0.5) {
                    b.add_link(here, n, cost).unwrap();
                } else {
                    b.add_link(n, here, cost).unwrap();
                }
            }
        }
    }
    b.build()
}

/// `n_origins` distinct origins with `n_dests` random destinations each
pub fn demand(seed: u64, n_vertices: usize, n_origins: usize, n_dests: usize) -> Demand {
    let mut rng = StdRng::seed_from_u64(seed ^ 0x5eed);
    let mut origins: Vec<VertexId> = Vec::new();
    while origins.len() < n_origins.min(n_vertices) {
        let o = rng.random_range(0..n_vertices) as VertexId;
        if !origins.contains(&o) {
            origins.push(o);
        }
    }

    let mut demand = Demand::default();
    for o in origins {
        let dests: Vec<(VertexId, f64)> = (0..n_dests)
            .map(|_| (rng.random_range(0..n_vertices) as VertexId, rng.random_range(1.0..20.0)))
            .collect();
        demand.push(Origin::new(o, dests).unwrap());
    }
    demand
}
