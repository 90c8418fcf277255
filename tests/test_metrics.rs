use approx::assert_abs_diff_eq;
use fcnet::metrics::{global_efficiency, pagerank, shortest_paths, transitivity};
use fcnet::{compute_metrics, AdjacencyGraph, Diagnostic};

/// Triangle 0-1-2 with a pendant node 3 attached to 2, plus isolated node 4.
fn kite() -> AdjacencyGraph {
    AdjacencyGraph::from_edges(5, &[(0, 1), (1, 2), (0, 2), (2, 3)])
}

#[test]
fn node_metrics_on_kite() {
    let m = compute_metrics(&kite(), 0.85);
    let n = &m.nodes;

    assert_eq!(n.degree, vec![Some(2.0), Some(2.0), Some(3.0), Some(1.0), None]);

    assert_eq!(n.clustering[0], Some(1.0));
    assert_abs_diff_eq!(n.clustering[2].unwrap(), 1.0 / 3.0, epsilon = 1e-12);
    assert_eq!(n.clustering[3], None);
    assert_eq!(n.clustering[4], None);

    // Node 0 reaches 1, 2 in one hop and 3 in two.
    assert_abs_diff_eq!(n.mean_path_length[0].unwrap(), 4.0 / 3.0, epsilon = 1e-12);
    assert_eq!(n.mean_path_length[4], None);

    // Neighbours of 2 are {0, 1, 3}: only 0-1 linked inside the subgraph.
    assert_abs_diff_eq!(n.local_efficiency[2].unwrap(), 1.0 / 3.0, epsilon = 1e-12);
    assert_eq!(n.local_efficiency[0], Some(1.0));
    assert_eq!(n.local_efficiency[3], None);

    assert!(n.pagerank[2].is_some());
    assert_eq!(n.pagerank[3], None);
    assert_eq!(n.pagerank[4], None);
}

#[test]
fn undefined_values_are_left_out_of_summaries() {
    let m = compute_metrics(&kite(), 0.85);
    let summaries = m.summaries();
    let (_, degree) = summaries.iter().find(|(name, _)| *name == "degree").unwrap();
    assert_eq!(degree.n_defined, 4);
    assert_abs_diff_eq!(degree.mean.unwrap(), 2.0, epsilon = 1e-12);
}

#[test]
fn disconnected_pairs_are_infinite_and_reported() {
    let g = AdjacencyGraph::from_edges(4, &[(0, 1), (2, 3)]);
    let m = compute_metrics(&g, 0.85);
    assert!(m.distances[[0, 2]].is_infinite());
    assert_eq!(m.diagnostics, vec![Diagnostic::DisconnectedGraph { disconnected_pairs: 4 }]);
    // Only the 4 ordered pairs at distance 1 count.
    assert_abs_diff_eq!(m.global_efficiency.unwrap(), 1.0, epsilon = 1e-12);
}

#[test]
fn isolated_node_does_not_count_as_disconnected() {
    let m = compute_metrics(&kite(), 0.85);
    assert!(m.diagnostics.is_empty());
}

#[test]
fn pagerank_is_a_distribution() {
    let pr = pagerank(&kite(), 0.85);
    assert_abs_diff_eq!(pr.iter().sum::<f64>(), 1.0, epsilon = 1e-9);
    assert!(pr[2] > pr[0]);
    assert_abs_diff_eq!(pr[0], pr[1], epsilon = 1e-12);
}

#[test]
fn pagerank_uniform_on_regular_graph() {
    let ring = AdjacencyGraph::from_edges(6, &[(0, 1), (1, 2), (2, 3), (3, 4), (4, 5), (5, 0)]);
    for p in pagerank(&ring, 0.85) {
        assert_abs_diff_eq!(p, 1.0 / 6.0, epsilon = 1e-10);
    }
}

#[test]
fn complete_graph_is_fully_efficient_and_clustered() {
    let edges: Vec<_> = (0..5).flat_map(|a| (a + 1..5).map(move |b| (a, b))).collect();
    let g = AdjacencyGraph::from_edges(5, &edges);
    let d = shortest_paths(&g);
    assert_abs_diff_eq!(global_efficiency(&d).unwrap(), 1.0, epsilon = 1e-12);
    assert_abs_diff_eq!(transitivity(&g).unwrap(), 1.0, epsilon = 1e-12);
}

#[test]
fn empty_graph_has_no_global_metrics() {
    let m = compute_metrics(&AdjacencyGraph::from_edges(3, &[]), 0.85);
    assert_eq!(m.global_efficiency, None);
    assert_eq!(m.global_clustering, None);
    assert!(m.nodes.degree.iter().all(Option::is_none));
}
