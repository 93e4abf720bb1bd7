use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::debug;

use crate::model::reductions::SnnGraph;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LouvainParams {
    pub resolution: f64,
    pub n_starts: usize,
    pub n_iterations: usize,
    pub seed: u64,
    pub group_singletons: bool,
}

/// Community labels renumbered by size, largest community is 0.
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    pub labels: Vec<u32>,
    pub n_clusters: usize,
    pub modularity: f64,
}

impl Partition {
    pub fn sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0usize; self.n_clusters];
        for &l in &self.labels {
            sizes[l as usize] += 1;
        }
        sizes
    }
}

/// Weighted undirected network; self loops are kept apart from the adjacency.
#[derive(Debug, Clone)]
struct Network {
    node_weight: Vec<f64>,
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
    weights: Vec<f64>,
    self_weight: Vec<f64>,
}

impl Network {
    fn from_snn(graph: &SnnGraph) -> Self {
        let node_weight = (0..graph.n_nodes)
            .map(|i| graph.neighbors(i).map(|(_, w)| w).sum())
            .collect();
        Self {
            node_weight,
            row_ptr: graph.row_ptr.clone(),
            col_idx: graph.col_idx.iter().map(|&c| c as usize).collect(),
            weights: graph.weights.clone(),
            self_weight: vec![0.0; graph.n_nodes],
        }
    }

    fn n_nodes(&self) -> usize {
        self.node_weight.len()
    }

    fn total_weight(&self) -> f64 {
        self.node_weight.iter().sum()
    }

    fn edges(&self, node: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        let r = self.row_ptr[node]..self.row_ptr[node + 1];
        self.col_idx[r.clone()]
            .iter()
            .copied()
            .zip(self.weights[r].iter().copied())
    }

    /// Collapses each cluster into one node. Node weights add up, edges inside a
    /// cluster become its self loop.
    fn reduce(&self, cluster: &[usize], n_clusters: usize) -> Self {
        let mut node_weight = vec![0.0; n_clusters];
        let mut self_weight = vec![0.0; n_clusters];
        let mut members: Vec<Vec<usize>> = vec![Vec::new(); n_clusters];
        for (node, &c) in cluster.iter().enumerate() {
            node_weight[c] += self.node_weight[node];
            self_weight[c] += self.self_weight[node];
            members[c].push(node);
        }

        let mut row_ptr = Vec::with_capacity(n_clusters + 1);
        let mut col_idx = Vec::new();
        let mut weights = Vec::new();
        let mut acc = vec![0.0f64; n_clusters];
        let mut touched: Vec<usize> = Vec::new();
        row_ptr.push(0);
        for (c, nodes) in members.iter().enumerate() {
            for &node in nodes {
                for (nb, w) in self.edges(node) {
                    let d = cluster[nb];
                    if d == c {
                        self_weight[c] += w;
                        continue;
                    }
                    if acc[d] == 0.0 {
                        touched.push(d);
                    }
                    acc[d] += w;
                }
            }
            touched.sort_unstable();
            for &d in &touched {
                col_idx.push(d);
                weights.push(acc[d]);
                acc[d] = 0.0;
            }
            touched.clear();
            row_ptr.push(col_idx.len());
        }

        Self {
            node_weight,
            row_ptr,
            col_idx,
            weights,
            self_weight,
        }
    }
}

/// Modularity of `labels` on `graph` with resolution `gamma`.
pub fn modularity(graph: &SnnGraph, labels: &[u32], gamma: f64) -> f64 {
    let net = Network::from_snn(graph);
    let cluster: Vec<usize> = labels.iter().map(|&l| l as usize).collect();
    quality(&net, &cluster, gamma)
}

fn quality(net: &Network, cluster: &[usize], gamma: f64) -> f64 {
    let two_m = net.total_weight();
    if two_m <= 0.0 {
        return 0.0;
    }
    let n_clusters = cluster.iter().copied().max().map_or(0, |m| m + 1);
    let mut inside = net.self_weight.iter().sum::<f64>();
    let mut cluster_weight = vec![0.0; n_clusters];
    for node in 0..net.n_nodes() {
        let c = cluster[node];
        cluster_weight[c] += net.node_weight[node];
        inside += net
            .edges(node)
            .filter(|&(nb, _)| cluster[nb] == c)
            .map(|(_, w)| w)
            .sum::<f64>();
    }
    let expected: f64 = cluster_weight.iter().map(|w| w * w).sum::<f64>() * gamma / two_m;
    (inside - expected) / two_m
}

/// Moves nodes to the neighbouring cluster with the best modularity gain until
/// every node is stable. Returns whether any node moved; clusters are renumbered
/// densely on return.
fn local_moving(net: &Network, cluster: &mut [usize], gamma: f64, rng: &mut StdRng) -> bool {
    let n = net.n_nodes();
    if n <= 1 {
        return false;
    }
    let two_m = net.total_weight();
    if two_m <= 0.0 {
        return false;
    }
    let scale = gamma / two_m;

    let mut cluster_weight = vec![0.0; n];
    let mut cluster_size = vec![0usize; n];
    for node in 0..n {
        cluster_weight[cluster[node]] += net.node_weight[node];
        cluster_size[cluster[node]] += 1;
    }
    let mut unused: Vec<usize> = (0..n).filter(|&c| cluster_size[c] == 0).collect();

    let mut order: Vec<usize> = (0..n).collect();
    order.shuffle(rng);

    let mut edge_weight_per_cluster = vec![0.0f64; n];
    let mut neighbor_clusters: Vec<usize> = Vec::new();
    let mut stable = 0usize;
    let mut pos = 0usize;
    let mut update = false;

    while stable < n {
        let node = order[pos];
        let current = cluster[node];

        cluster_weight[current] -= net.node_weight[node];
        cluster_size[current] -= 1;
        if cluster_size[current] == 0 {
            unused.push(current);
        }

        for (nb, w) in net.edges(node) {
            let c = cluster[nb];
            if edge_weight_per_cluster[c] == 0.0 {
                neighbor_clusters.push(c);
            }
            edge_weight_per_cluster[c] += w;
        }

        // Ties keep the node where it is; an empty cluster scores zero.
        let gain_of = |c: usize, edge_weight: f64| {
            edge_weight - net.node_weight[node] * cluster_weight[c] * scale
        };
        let mut target = current;
        let mut best_gain = gain_of(current, edge_weight_per_cluster[current]);
        if let Some(&empty) = unused.last() {
            if best_gain < 0.0 {
                target = empty;
                best_gain = 0.0;
            }
        }
        for &c in &neighbor_clusters {
            let gain = gain_of(c, edge_weight_per_cluster[c]);
            if gain > best_gain {
                best_gain = gain;
                target = c;
            }
            edge_weight_per_cluster[c] = 0.0;
        }
        neighbor_clusters.clear();
        if unused.last() == Some(&target) {
            unused.pop();
        }

        cluster_weight[target] += net.node_weight[node];
        cluster_size[target] += 1;
        if target == current {
            stable += 1;
        } else {
            cluster[node] = target;
            stable = 1;
            update = true;
        }

        pos = if pos + 1 < n { pos + 1 } else { 0 };
    }

    renumber(cluster);
    update
}

/// Relabels clusters densely in order of first appearance. Returns the count.
fn renumber(cluster: &mut [usize]) -> usize {
    let bound = cluster.iter().copied().max().map_or(0, |m| m + 1);
    let mut map = vec![usize::MAX; bound];
    let mut next = 0usize;
    for c in cluster.iter_mut() {
        if map[*c] == usize::MAX {
            map[*c] = next;
            next += 1;
        }
        *c = map[*c];
    }
    next
}

fn run_level(net: &Network, cluster: &mut [usize], gamma: f64, rng: &mut StdRng) -> bool {
    let mut update = local_moving(net, cluster, gamma, rng);
    let n_clusters = cluster.iter().copied().max().map_or(0, |m| m + 1);
    if n_clusters < net.n_nodes() {
        let reduced = net.reduce(cluster, n_clusters);
        let mut reduced_cluster: Vec<usize> = (0..n_clusters).collect();
        update |= run_level(&reduced, &mut reduced_cluster, gamma, rng);
        for c in cluster.iter_mut() {
            *c = reduced_cluster[*c];
        }
    }
    update
}

/// Multi-level Louvain modularity optimisation. Every start begins from singletons
/// and repeats the algorithm up to `n_iterations` times while it improves; the start
/// with the highest modularity wins, the earliest one on ties.
pub fn louvain(graph: &SnnGraph, params: &LouvainParams) -> Partition {
    let net = Network::from_snn(graph);
    let n = net.n_nodes();
    let mut rng = StdRng::seed_from_u64(params.seed);

    let mut best: Option<(Vec<usize>, f64)> = None;
    for start in 0..params.n_starts.max(1) {
        let mut cluster: Vec<usize> = (0..n).collect();
        let mut iterations = 0;
        loop {
            let update = run_level(&net, &mut cluster, params.resolution, &mut rng);
            iterations += 1;
            if !update || iterations >= params.n_iterations.max(1) {
                break;
            }
        }
        let q = quality(&net, &cluster, params.resolution);
        debug!(start, iterations, modularity = q, "louvain start finished");
        if best.as_ref().is_none_or(|(_, bq)| q > *bq) {
            best = Some((cluster, q));
        }
    }

    let (mut cluster, _) = best.unwrap_or_else(|| ((0..n).collect(), 0.0));
    if params.group_singletons {
        group_singletons(&net, &mut cluster);
    }
    let n_clusters = relabel_by_size(&mut cluster);
    let modularity = quality(&net, &cluster, params.resolution);
    Partition {
        labels: cluster.into_iter().map(|c| c as u32).collect(),
        n_clusters,
        modularity,
    }
}

/// Merges every single-member cluster into the multi-member cluster it is most
/// connected to on average. Isolated cells stay on their own.
fn group_singletons(net: &Network, cluster: &mut [usize]) {
    let n_clusters = renumber(cluster);
    let mut sizes = vec![0usize; n_clusters];
    for &c in cluster.iter() {
        sizes[c] += 1;
    }
    if sizes.iter().all(|&s| s == 1) {
        return;
    }
    let singletons: Vec<usize> = (0..cluster.len())
        .filter(|&node| sizes[cluster[node]] == 1)
        .collect();

    let mut conn = vec![0.0f64; n_clusters];
    for node in singletons {
        for (nb, w) in net.edges(node) {
            let c = cluster[nb];
            if sizes[c] > 1 {
                conn[c] += w;
            }
        }
        let mut target = None;
        let mut best = 0.0;
        for (c, &total) in conn.iter().enumerate() {
            if total > 0.0 {
                let mean = total / sizes[c] as f64;
                if mean > best {
                    best = mean;
                    target = Some(c);
                }
            }
        }
        conn.iter_mut().for_each(|v| *v = 0.0);
        if let Some(c) = target {
            cluster[node] = c;
        }
    }
    renumber(cluster);
}

/// Renumbers clusters by size, largest first; equal sizes are ordered by their
/// smallest member index. Returns the number of clusters.
pub fn relabel_by_size(cluster: &mut [usize]) -> usize {
    let n_clusters = renumber(cluster);
    let mut sizes = vec![0usize; n_clusters];
    let mut first = vec![usize::MAX; n_clusters];
    for (node, &c) in cluster.iter().enumerate() {
        sizes[c] += 1;
        first[c] = first[c].min(node);
    }
    let mut order: Vec<usize> = (0..n_clusters).collect();
    order.sort_by(|&a, &b| sizes[b].cmp(&sizes[a]).then(first[a].cmp(&first[b])));
    let mut new_label = vec![0usize; n_clusters];
    for (rank, &c) in order.iter().enumerate() {
        new_label[c] = rank;
    }
    for c in cluster.iter_mut() {
        *c = new_label[*c];
    }
    n_clusters
}

#[cfg(test)]
#[path = "../../tests/src_inline/graph/louvain.rs"]
mod tests;
