use ef_bush::{Bush, NodeDistance, SharedScratch};
use ef_network::{CostFunction, Network, NetworkBuilder, Origin};

mod common;

/// O(0) -> A(1) -> D(3) and O -> B(2) -> D. Empty, the A route costs 2 and
/// the B route 2.5.
fn diamond() -> Network {
    let mut b = NetworkBuilder::new(4);
    b.add_link(0, 1, CostFunction::linear(1.0, 1.0)).unwrap();
    b.add_link(0, 2, CostFunction::linear(1.5, 1.0)).unwrap();
    b.add_link(1, 3, CostFunction::Constant(1.0)).unwrap();
    b.add_link(2, 3, CostFunction::Constant(1.0)).unwrap();
    b.build()
}

#[test]
fn test_diamond_all_or_nothing_then_equal_costs() {
    let mut net = diamond();
    let origin = Origin::new(0, [(3, 10.0)]).unwrap();
    let mut scratch = SharedScratch::for_network(&net);
    let mut bush = Bush::new(&origin, &mut net, &mut scratch);

    assert_eq!(net.link(0).flow(), 10.0);
    assert_eq!(net.link(2).flow(), 10.0);
    assert_eq!(net.link(1).flow(), 0.0);
    assert_eq!(net.link(3).flow(), 0.0);
    assert_eq!(bush.max_difference(&net, &mut scratch), 9.5);

    assert!(bush.fix(&mut net, &mut scratch, 0.0));

    assert!(bush.max_difference(&net, &mut scratch) <= 0.0);
    assert!((net.link(0).flow() - 5.25).abs() < 1e-12);
    assert!((net.link(1).flow() - 4.75).abs() < 1e-12);
    let via_a = net.cost(0) + net.cost(2);
    let via_b = net.cost(1) + net.cost(3);
    assert!((via_a - via_b).abs() < 1e-12);
    assert!(bush.check_invariants(&net).is_ok());
}

#[test]
fn test_unreachable_destination_gets_no_flow() {
    let mut b = NetworkBuilder::new(3);
    b.add_link(0, 1, CostFunction::linear(1.0, 0.5)).unwrap();
    b.add_link(2, 1, CostFunction::Constant(1.0)).unwrap();
    let mut net = b.build();

    let origin = Origin::new(0, [(1, 5.0), (2, 3.0)]).unwrap();
    let mut scratch = SharedScratch::for_network(&net);
    let mut bush = Bush::new(&origin, &mut net, &mut scratch);

    assert_eq!(bush.unreachable_destinations(), &[2]);
    assert_eq!(bush.destinations(), &[(1, 5.0)]);
    assert_eq!(net.link(0).flow(), 5.0);
    assert_eq!(net.link(1).flow(), 0.0);
    assert!(!bush.topological_order().contains(&2));

    assert!(!bush.fix(&mut net, &mut scratch, 1e-9));
    assert_eq!(bush.max_difference(&net, &mut scratch), 0.0);
    assert!(bush.check_invariants(&net).is_ok());
}

fn labels(bush: &Bush, scratch: &SharedScratch) -> Vec<NodeDistance> {
    bush.topological_order()
        .iter()
        .map(|&v| *scratch.node(v))
        .collect()
}

#[test]
fn test_build_trees_is_deterministic() {
    let mut net = common::grid(7, 6, 5);
    let demand = common::demand(7, net.n_vertices(), 1, 8);
    let mut scratch = SharedScratch::for_network(&net);
    let mut bush = Bush::new(&demand.origins()[0], &mut net, &mut scratch);

    bush.build_trees(&net, &mut scratch);
    let first = labels(&bush, &scratch);
    let pending = bush.pending_reversals().to_vec();
    bush.build_trees(&net, &mut scratch);
    assert_eq!(first, labels(&bush, &scratch));
    assert_eq!(pending, bush.pending_reversals());

    bush.fix(&mut net, &mut scratch, 1e-6);
    bush.build_trees(&net, &mut scratch);
    let first = labels(&bush, &scratch);
    bush.build_trees(&net, &mut scratch);
    assert_eq!(first, labels(&bush, &scratch));
}

#[test]
fn test_shared_scratch_across_origins() {
    let mut net = diamond();
    let mut scratch = SharedScratch::for_network(&net);
    let from_o = Origin::new(0, [(3, 10.0)]).unwrap();
    let from_a = Origin::new(1, [(3, 4.0)]).unwrap();

    let mut bush_o = Bush::new(&from_o, &mut net, &mut scratch);
    let mut bush_a = Bush::new(&from_a, &mut net, &mut scratch);
    assert_eq!(net.link(2).flow(), 14.0);

    for _ in 0..3 {
        bush_o.fix(&mut net, &mut scratch, 1e-9);
        bush_a.fix(&mut net, &mut scratch, 1e-9);
    }
    // A's own demand can only use A -> D; O's bush still balances its routes
    assert_eq!(bush_a.link_flows().collect::<Vec<_>>(), vec![(2, 4.0)]);
    assert!(bush_o.max_difference(&net, &mut scratch) <= 1e-9);
    assert!(bush_o.check_invariants(&net).is_ok());
    assert!(bush_a.check_invariants(&net).is_ok());
}
