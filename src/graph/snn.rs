use rayon::prelude::*;

use crate::graph::knn::Knn;
use crate::model::reductions::SnnGraph;

/// Shared-nearest-neighbour graph from neighbour lists that include each cell.
/// Weight is the Jaccard index of the two neighbour sets, `s / (2k - s)`; pairs
/// below `prune` and self pairs are dropped.
pub fn build_snn(knn: &Knn, prune: f64) -> SnnGraph {
    let n = knn.n_points();
    let k = knn.k;

    // reverse[m] lists every cell whose neighbour set contains m
    let mut reverse: Vec<Vec<u32>> = vec![Vec::new(); n];
    for i in 0..n {
        for &m in knn.row(i).0 {
            reverse[m as usize].push(i as u32);
        }
    }

    let rows: Vec<Vec<(u32, f64)>> = (0..n)
        .into_par_iter()
        .map(|i| {
            let mut hits: Vec<u32> = knn
                .row(i)
                .0
                .iter()
                .flat_map(|&m| reverse[m as usize].iter().copied())
                .collect();
            hits.sort_unstable();

            let mut out = Vec::new();
            let mut pos = 0;
            while pos < hits.len() {
                let j = hits[pos];
                let mut end = pos;
                while end < hits.len() && hits[end] == j {
                    end += 1;
                }
                let shared = (end - pos) as f64;
                pos = end;
                if j as usize == i {
                    continue;
                }
                let w = shared / (2.0 * k as f64 - shared);
                if w >= prune {
                    out.push((j, w));
                }
            }
            out
        })
        .collect();

    let mut row_ptr = Vec::with_capacity(n + 1);
    let mut col_idx = Vec::new();
    let mut weights = Vec::new();
    row_ptr.push(0);
    for row in rows {
        for (j, w) in row {
            col_idx.push(j);
            weights.push(w);
        }
        row_ptr.push(col_idx.len());
    }

    SnnGraph {
        n_nodes: n,
        row_ptr,
        col_idx,
        weights,
    }
}

#[cfg(test)]
#[path = "../../tests/src_inline/graph/snn.rs"]
mod tests;
