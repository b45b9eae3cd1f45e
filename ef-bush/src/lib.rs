//! Bush-based user-equilibrium traffic assignment
//!
//! Each origin keeps a [`Bush`]: an acyclic subset of the network's links
//! that carries all of its demand. Flow moves inside a bush from the
//! costliest used path to the cheapest one until every destination's paths
//! cost the same, and links flip direction as costs change.
//!
//! # Example
//!
//! ```
//! use ef_bush::{Bush, SharedScratch};
//! use ef_network::{CostFunction, NetworkBuilder, Origin};
//!
//! let mut b = NetworkBuilder::new(2);
//! b.add_link(0, 1, CostFunction::linear(1.0, 1.0)).unwrap();
//! b.add_link(0, 1, CostFunction::linear(3.0, 1.0)).unwrap();
//! let mut net = b.build();
//!
//! let origin = Origin::new(0, [(1, 10.0)]).unwrap();
//! let mut scratch = SharedScratch::for_network(&net);
//! let mut bush = Bush::new(&origin, &mut net, &mut scratch);
//!
//! bush.fix(&mut net, &mut scratch, 1e-9);
//! assert!(bush.max_difference(&net, &mut scratch) <= 1e-9);
//! ```

pub mod assign;
pub mod bush;
pub mod config;
pub mod edge;
pub mod equilibrate;
pub mod node;
pub mod scratch;
pub mod topo;

pub use assign::{Assignment, AssignmentReport, IterationStats};
pub use bush::{Bush, InvariantViolation, ReversalStats, DEFAULT_PASS_LIMIT};
pub use config::AssignmentConfig;
pub use edge::BushEdge;
pub use equilibrate::{NewtonShift, SegmentSummary, ShiftPolicy};
pub use node::NodeDistance;
pub use scratch::SharedScratch;
