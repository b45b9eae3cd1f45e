//! Shared road network for bush-based traffic assignment
//!
//! The network owns every link's total flow and cached cost. Bushes read
//! costs and push flow deltas through `&mut Network`, one bush at a time.

pub mod cost;
pub mod demand;
pub mod network;
pub mod shortest;
pub mod tntp;

pub use cost::CostFunction;
pub use demand::{Demand, Origin};
pub use network::{Link, LinkId, Network, NetworkBuilder, VertexId};
pub use shortest::ShortestPathOrder;
