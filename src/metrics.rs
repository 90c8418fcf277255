//! Node- and graph-level topology statistics.
//!
//! Undefined values are `None`, never zero:
//!
//! | metric              | undefined when            |
//! |---------------------|---------------------------|
//! | degree              | degree 0 (isolated node)  |
//! | clustering          | degree < 2                |
//! | mean path length    | no other node reachable   |
//! | local efficiency    | degree < 2                |
//! | page-rank           | degree < 2                |
//!
//! Page-rank is computed on the whole graph and then masked for degree < 2
//! so that every node metric is defined on the same node set.
//!
//! Shortest paths are hop counts found by breadth-first search;
//! disconnected pairs have distance `+∞` and are left out of every mean.
use std::collections::VecDeque;

use ndarray::Array2;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::Diagnostic;
use crate::network::AdjacencyGraph;

/// Per-node metrics, indexed like the graph nodes.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct NodeMetrics {
    pub degree: Vec<Option<f64>>,
    pub clustering: Vec<Option<f64>>,
    pub mean_path_length: Vec<Option<f64>>,
    pub local_efficiency: Vec<Option<f64>>,
    pub pagerank: Vec<Option<f64>>,
}

/// Summary of a node metric over its defined values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricSummary {
    pub mean: Option<f64>,
    /// Population standard deviation.
    pub std: Option<f64>,
    pub n_defined: usize,
}

/// Mean and standard deviation of the `Some` entries.
pub fn summarize(values: &[Option<f64>]) -> MetricSummary {
    let defined: Vec<f64> = values.iter().flatten().copied().collect();
    let n = defined.len();
    if n == 0 {
        return MetricSummary { mean: None, std: None, n_defined: 0 };
    }
    let mean = defined.iter().sum::<f64>() / n as f64;
    let var = defined.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;
    MetricSummary { mean: Some(mean), std: Some(var.sqrt()), n_defined: n }
}

/// All metrics of one graph.
#[derive(Debug, Clone)]
pub struct GraphMetrics {
    pub nodes: NodeMetrics,
    /// Hop distances; `+∞` for disconnected pairs, 0 on the diagonal.
    pub distances: Array2<f64>,
    /// Mean of `1/d` over finite-distance pairs.
    pub global_efficiency: Option<f64>,
    /// Closed triplets / all connected triplets.
    pub global_clustering: Option<f64>,
    pub diagnostics: Vec<Diagnostic>,
}

impl GraphMetrics {
    /// Node metric summaries by name, in a fixed order.
    pub fn summaries(&self) -> Vec<(&'static str, MetricSummary)> {
        let n = &self.nodes;
        vec![
            ("degree", summarize(&n.degree)),
            ("clustering", summarize(&n.clustering)),
            ("mean_path_length", summarize(&n.mean_path_length)),
            ("local_efficiency", summarize(&n.local_efficiency)),
            ("pagerank", summarize(&n.pagerank)),
        ]
    }
}

/// Compute every metric for `graph`.
pub fn compute_metrics(graph: &AdjacencyGraph, damping: f64) -> GraphMetrics {
    let n = graph.n_nodes();
    let distances = shortest_paths(graph);

    let degree = (0..n)
        .map(|v| match graph.degree(v) {
            0 => None,
            k => Some(k as f64),
        })
        .collect();
    let clustering = (0..n).map(|v| local_clustering(graph, v)).collect();
    let mean_path_length = (0..n)
        .map(|v| {
            let row: Vec<f64> = (0..n)
                .filter(|&u| u != v)
                .map(|u| distances[[v, u]])
                .filter(|d| d.is_finite())
                .collect();
            (!row.is_empty()).then(|| row.iter().sum::<f64>() / row.len() as f64)
        })
        .collect();
    let local_efficiency = (0..n).map(|v| local_efficiency(graph, v)).collect();
    let pr = pagerank(graph, damping);
    let pagerank = (0..n)
        .map(|v| (graph.degree(v) >= 2).then(|| pr[v]))
        .collect();

    // Pairs of non-isolated nodes without a path.
    let mut disconnected_pairs = 0usize;
    for a in 0..n {
        for b in a + 1..n {
            if graph.degree(a) > 0 && graph.degree(b) > 0 && !distances[[a, b]].is_finite() {
                disconnected_pairs += 1;
            }
        }
    }
    let mut diagnostics = Vec::new();
    if disconnected_pairs > 0 {
        let d = Diagnostic::DisconnectedGraph { disconnected_pairs };
        warn!("{d}");
        diagnostics.push(d);
    }

    let metrics = GraphMetrics {
        nodes: NodeMetrics { degree, clustering, mean_path_length, local_efficiency, pagerank },
        global_efficiency: global_efficiency(&distances),
        global_clustering: transitivity(graph),
        distances,
        diagnostics,
    };
    debug!(
        nodes = n,
        edges = graph.edge_count(),
        global_efficiency = ?metrics.global_efficiency,
        global_clustering = ?metrics.global_clustering,
        "graph metrics computed"
    );
    metrics
}

/// All-pairs hop distances by BFS from every node.
pub fn shortest_paths(graph: &AdjacencyGraph) -> Array2<f64> {
    let n = graph.n_nodes();
    let mut dist = Array2::from_elem((n, n), f64::INFINITY);
    for s in 0..n {
        for (v, d) in bfs(graph, s, |_| true).into_iter().enumerate() {
            if let Some(d) = d {
                dist[[s, v]] = d as f64;
            }
        }
    }
    dist
}

/// Hop distance from `source` to every node, moving only through nodes
/// accepted by `allowed`.
fn bfs(graph: &AdjacencyGraph, source: usize, allowed: impl Fn(usize) -> bool) -> Vec<Option<usize>> {
    let mut dist = vec![None; graph.n_nodes()];
    dist[source] = Some(0);
    let mut queue = VecDeque::from([source]);
    while let Some(v) = queue.pop_front() {
        let dv = dist[v].unwrap_or(0);
        for &w in graph.neighbors(v) {
            if dist[w].is_none() && allowed(w) {
                dist[w] = Some(dv + 1);
                queue.push_back(w);
            }
        }
    }
    dist
}

/// Number of edges among the neighbours of `v`.
fn neighbor_links(graph: &AdjacencyGraph, v: usize) -> usize {
    let ns = graph.neighbors(v);
    let mut links = 0;
    for (i, &a) in ns.iter().enumerate() {
        for &b in &ns[i + 1..] {
            if graph.has_edge(a, b) {
                links += 1;
            }
        }
    }
    links
}

/// Fraction of neighbour pairs of `v` that are themselves connected.
pub fn local_clustering(graph: &AdjacencyGraph, v: usize) -> Option<f64> {
    let k = graph.degree(v);
    if k < 2 {
        return None;
    }
    Some(2.0 * neighbor_links(graph, v) as f64 / (k * (k - 1)) as f64)
}

/// Efficiency of the subgraph induced by the neighbours of `v`.
///
/// `2 / (k(k−1)) · Σ 1/d(i, j)` over neighbour pairs, distances measured
/// inside the induced subgraph (which excludes `v`).
pub fn local_efficiency(graph: &AdjacencyGraph, v: usize) -> Option<f64> {
    let ns = graph.neighbors(v);
    let k = ns.len();
    if k < 2 {
        return None;
    }
    let in_sub = |u: usize| u != v && ns.binary_search(&u).is_ok();
    let mut sum = 0.0;
    for (i, &a) in ns.iter().enumerate() {
        let d = bfs(graph, a, in_sub);
        for &b in &ns[i + 1..] {
            if let Some(h) = d[b] {
                sum += 1.0 / h as f64;
            }
        }
    }
    Some(2.0 * sum / (k * (k - 1)) as f64)
}

/// Damped random-walk page-rank.  Isolated nodes spread their mass
/// uniformly.  Scores sum to 1.
pub fn pagerank(graph: &AdjacencyGraph, damping: f64) -> Vec<f64> {
    const MAX_ITER: usize = 1000;
    const TOL: f64 = 1e-12;

    let n = graph.n_nodes();
    if n == 0 {
        return vec![];
    }
    let base = (1.0 - damping) / n as f64;
    let mut rank = vec![1.0 / n as f64; n];
    for _ in 0..MAX_ITER {
        let dangling: f64 = (0..n).filter(|&v| graph.degree(v) == 0).map(|v| rank[v]).sum();
        let mut next = vec![base + damping * dangling / n as f64; n];
        for v in 0..n {
            let k = graph.degree(v);
            if k == 0 {
                continue;
            }
            let share = damping * rank[v] / k as f64;
            for &w in graph.neighbors(v) {
                next[w] += share;
            }
        }
        let delta: f64 = next.iter().zip(&rank).map(|(a, b)| (a - b).abs()).sum();
        rank = next;
        if delta < TOL {
            break;
        }
    }
    rank
}

/// Mean of `1/d` over ordered pairs `i ≠ j` with finite distance.
pub fn global_efficiency(distances: &Array2<f64>) -> Option<f64> {
    let n = distances.nrows();
    let mut sum = 0.0;
    let mut count = 0usize;
    for i in 0..n {
        for j in 0..n {
            let d = distances[[i, j]];
            if i != j && d.is_finite() {
                sum += 1.0 / d;
                count += 1;
            }
        }
    }
    (count > 0).then(|| sum / count as f64)
}

/// Global clustering coefficient (transitivity).
pub fn transitivity(graph: &AdjacencyGraph) -> Option<f64> {
    let mut closed = 0usize;
    let mut triplets = 0usize;
    for v in 0..graph.n_nodes() {
        let k = graph.degree(v);
        triplets += k * k.saturating_sub(1) / 2;
        closed += neighbor_links(graph, v);
    }
    (triplets > 0).then(|| closed as f64 / triplets as f64)
}
