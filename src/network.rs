//! Correlation network construction.
//!
//! 1. Pearson correlation between ROI time courses (good frames only),
//!    diagonal and missing-ROI rows/columns set to zero.
//! 2. Binarisation at a fixed edge density: with `E = n(n−1)/2` node pairs,
//!    the `⌊d·E⌋` strongest pairs among non-missing ROIs become edges.
//! 3. Pruning to the largest connected component; nodes outside it stay in
//!    the graph with no edges.
//!
//! Graphs are immutable values: pruning returns a new [`AdjacencyGraph`].
use std::collections::VecDeque;

use ndarray::Array2;
use tracing::debug;

use crate::error::{FcError, Result};

/// Undirected, unweighted graph over a fixed node set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdjacencyGraph {
    /// Sorted neighbour lists.
    neighbors: Vec<Vec<usize>>,
}

impl AdjacencyGraph {
    /// Graph on `n` nodes with the given undirected edges.  Self-loops and
    /// duplicates are ignored.
    pub fn from_edges(n: usize, edges: &[(usize, usize)]) -> Self {
        let mut neighbors = vec![Vec::new(); n];
        for &(a, b) in edges {
            if a == b {
                continue;
            }
            neighbors[a].push(b);
            neighbors[b].push(a);
        }
        for list in &mut neighbors {
            list.sort_unstable();
            list.dedup();
        }
        Self { neighbors }
    }

    /// Graph from a symmetric 0/1 (or boolean-like) matrix; non-zero = edge.
    pub fn from_matrix(adj: &Array2<u8>) -> Self {
        let n = adj.nrows();
        let mut edges = Vec::new();
        for i in 0..n {
            for j in i + 1..n {
                if adj[[i, j]] != 0 || adj[[j, i]] != 0 {
                    edges.push((i, j));
                }
            }
        }
        Self::from_edges(n, &edges)
    }

    #[inline]
    pub fn n_nodes(&self) -> usize {
        self.neighbors.len()
    }

    pub fn neighbors(&self, node: usize) -> &[usize] {
        &self.neighbors[node]
    }

    #[inline]
    pub fn degree(&self, node: usize) -> usize {
        self.neighbors[node].len()
    }

    pub fn has_edge(&self, a: usize, b: usize) -> bool {
        self.neighbors[a].binary_search(&b).is_ok()
    }

    pub fn edge_count(&self) -> usize {
        self.neighbors.iter().map(Vec::len).sum::<usize>() / 2
    }

    /// Edge pairs `(a, b)` with `a < b`, in lexicographic order.
    pub fn edges(&self) -> Vec<(usize, usize)> {
        self.neighbors
            .iter()
            .enumerate()
            .flat_map(|(a, ns)| ns.iter().filter(move |&&b| b > a).map(move |&b| (a, b)))
            .collect()
    }

    /// Fraction of all node pairs that are edges.
    pub fn density(&self) -> f64 {
        let n = self.n_nodes();
        if n < 2 {
            return 0.0;
        }
        self.edge_count() as f64 / (n * (n - 1) / 2) as f64
    }

    /// Symmetric 0/1 adjacency matrix.
    pub fn to_matrix(&self) -> Array2<u8> {
        let n = self.n_nodes();
        let mut m = Array2::<u8>::zeros((n, n));
        for (a, b) in self.edges() {
            m[[a, b]] = 1;
            m[[b, a]] = 1;
        }
        m
    }

    /// Connected components (isolated nodes are singleton components),
    /// each sorted, in order of their smallest node.
    pub fn components(&self) -> Vec<Vec<usize>> {
        let n = self.n_nodes();
        let mut seen = vec![false; n];
        let mut out = Vec::new();
        let mut queue = VecDeque::new();
        for start in 0..n {
            if seen[start] {
                continue;
            }
            seen[start] = true;
            queue.push_back(start);
            let mut comp = Vec::new();
            while let Some(v) = queue.pop_front() {
                comp.push(v);
                for &w in &self.neighbors[v] {
                    if !seen[w] {
                        seen[w] = true;
                        queue.push_back(w);
                    }
                }
            }
            comp.sort_unstable();
            out.push(comp);
        }
        out
    }

    /// Keep only edges inside the largest component (ties: the component
    /// with the smallest node index).  All nodes are retained.
    pub fn largest_component(&self) -> Self {
        let comps = self.components();
        let mut keep = vec![false; self.n_nodes()];
        if let Some(best) = comps
            .iter()
            .enumerate()
            .max_by(|(ia, a), (ib, b)| a.len().cmp(&b.len()).then(ib.cmp(ia)))
            .map(|(_, c)| c)
        {
            for &v in best {
                keep[v] = true;
            }
        }
        let neighbors = self
            .neighbors
            .iter()
            .enumerate()
            .map(|(v, ns)| if keep[v] { ns.clone() } else { Vec::new() })
            .collect();
        Self { neighbors }
    }
}

/// Pearson correlation between the columns of `[T, n]` ROI signals.
///
/// Diagonal entries, rows/columns of `missing` ROIs, and pairs involving a
/// constant time course are zero.
pub fn correlation_matrix(signals: &Array2<f64>, missing: &[bool]) -> Result<Array2<f64>> {
    let (n_t, n) = signals.dim();
    if missing.len() != n {
        return Err(FcError::ShapeMismatch {
            what: "missing flags vs ROI count",
            expected: n,
            got: missing.len(),
        });
    }
    if n_t < 2 {
        return Err(FcError::InsufficientData { context: "correlation", got: n_t, need: 2 });
    }

    // Column-standardise; constant or missing columns become zero.
    let mut z = signals.clone();
    for (j, mut col) in z.columns_mut().into_iter().enumerate() {
        let mean = col.sum() / n_t as f64;
        col.mapv_inplace(|v| v - mean);
        let norm = col.mapv(|v| v * v).sum().sqrt();
        if missing[j] || norm <= f64::EPSILON {
            col.fill(0.0);
        } else {
            col.mapv_inplace(|v| v / norm);
        }
    }

    let mut corr = z.t().dot(&z);
    for i in 0..n {
        corr[[i, i]] = 0.0;
    }
    corr.mapv_inplace(|v| v.clamp(-1.0, 1.0));
    Ok(corr)
}

/// Result of density thresholding.
#[derive(Debug, Clone, PartialEq)]
pub struct Thresholded {
    pub graph: AdjacencyGraph,
    /// Smallest retained correlation; `None` when no edge was kept.
    pub threshold: Option<f64>,
    /// `⌊d·E⌋`, the number of edges requested.
    pub target_edges: usize,
}

/// Keep the `⌊density · n(n−1)/2⌋` strongest pairs among non-missing ROIs.
///
/// Ties are broken by pair order (row, then column), so the edge count is
/// exact whenever enough candidate pairs exist.  As a consequence, pairs
/// whose correlation equals the returned `threshold` may be left out: an
/// edge implies `r ≥ threshold`, but `r ≥ threshold` does not imply an edge
/// when several pairs tie at the cut.
pub fn threshold_by_density(corr: &Array2<f64>, missing: &[bool], density: f64) -> Result<Thresholded> {
    let n = corr.nrows();
    if corr.ncols() != n || missing.len() != n {
        return Err(FcError::ShapeMismatch {
            what: "correlation matrix vs ROI count",
            expected: n,
            got: if corr.ncols() != n { corr.ncols() } else { missing.len() },
        });
    }
    if !(density > 0.0 && density <= 1.0) {
        return Err(FcError::InvalidConfig(format!("density must lie in (0, 1], got {density}")));
    }

    let n_pairs = n * n.saturating_sub(1) / 2;
    let target_edges = (density * n_pairs as f64 + 1e-9).floor() as usize;

    let mut candidates: Vec<(f64, usize, usize)> = Vec::with_capacity(n_pairs);
    for i in 0..n {
        if missing[i] {
            continue;
        }
        for j in i + 1..n {
            if !missing[j] {
                candidates.push((corr[[i, j]], i, j));
            }
        }
    }
    candidates.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));
    candidates.truncate(target_edges);

    let threshold = candidates.last().map(|c| c.0);
    let edges: Vec<(usize, usize)> = candidates.iter().map(|&(_, i, j)| (i, j)).collect();
    debug!(pairs = n_pairs, target_edges, kept = edges.len(), ?threshold, "density threshold");
    Ok(Thresholded { graph: AdjacencyGraph::from_edges(n, &edges), threshold, target_edges })
}

/// Full network-construction stage output.
#[derive(Debug, Clone)]
pub struct Network {
    pub correlation: Array2<f64>,
    pub thresholded: Thresholded,
    /// Graph restricted to its largest connected component.
    pub graph: AdjacencyGraph,
    /// Sizes of all components of the thresholded graph that have an edge,
    /// descending.
    pub component_sizes: Vec<usize>,
}

/// Correlate, threshold and prune.
pub fn build_network(signals: &Array2<f64>, missing: &[bool], density: f64) -> Result<Network> {
    let correlation = correlation_matrix(signals, missing)?;
    let thresholded = threshold_by_density(&correlation, missing, density)?;
    let graph = thresholded.graph.largest_component();

    let mut component_sizes: Vec<usize> = thresholded
        .graph
        .components()
        .into_iter()
        .map(|c| c.len())
        .filter(|&s| s > 1)
        .collect();
    component_sizes.sort_unstable_by(|a, b| b.cmp(a));

    debug!(
        edges_before = thresholded.graph.edge_count(),
        edges_after = graph.edge_count(),
        components = component_sizes.len(),
        "largest component kept"
    );
    Ok(Network { correlation, thresholded, graph, component_sizes })
}
