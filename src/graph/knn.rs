use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::simd;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Euclidean,
    Cosine,
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Metric::Euclidean => write!(f, "euclidean"),
            Metric::Cosine => write!(f, "cosine"),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum KnnError {
    #[error("point buffer of length {len} is not a multiple of dimension {dim}")]
    Shape { len: usize, dim: usize },
    #[error("k = {k} exceeds the {available} candidate neighbours")]
    TooLarge { k: usize, available: usize },
    #[error("k must be at least 1")]
    ZeroK,
}

/// Exact neighbour lists, `k` per point, nearest first. Row-major `n x k`.
#[derive(Debug, Clone, PartialEq)]
pub struct Knn {
    pub k: usize,
    pub indices: Vec<u32>,
    pub distances: Vec<f64>,
}

impl Knn {
    pub fn n_points(&self) -> usize {
        self.indices.len() / self.k.max(1)
    }

    pub fn row(&self, i: usize) -> (&[u32], &[f64]) {
        let r = i * self.k..(i + 1) * self.k;
        (&self.indices[r.clone()], &self.distances[r])
    }
}

/// Brute-force k nearest neighbours over row-major `points` of width `dim`.
/// With `include_self`, every point is its own first neighbour at distance 0.
/// Equal distances are ordered by point index.
pub fn exact_knn(
    points: &[f64],
    dim: usize,
    k: usize,
    metric: Metric,
    include_self: bool,
) -> Result<Knn, KnnError> {
    if dim == 0 || points.len() % dim != 0 {
        return Err(KnnError::Shape {
            len: points.len(),
            dim,
        });
    }
    if k == 0 {
        return Err(KnnError::ZeroK);
    }
    let n = points.len() / dim;
    let available = if include_self { n } else { n.saturating_sub(1) };
    if k > available {
        return Err(KnnError::TooLarge { k, available });
    }

    let prepared: Vec<f64> = match metric {
        Metric::Euclidean => points.to_vec(),
        Metric::Cosine => normalize_rows(points, dim),
    };
    let row = |i: usize| &prepared[i * dim..(i + 1) * dim];
    let others = if include_self { k - 1 } else { k };

    let rows: Vec<(Vec<u32>, Vec<f64>)> = (0..n)
        .into_par_iter()
        .map(|i| {
            let xi = row(i);
            let mut cand: Vec<(f64, u32)> = (0..n)
                .filter(|&j| j != i)
                .map(|j| {
                    let xj = row(j);
                    let d = match metric {
                        Metric::Euclidean => simd::sq_dist_f64(xi, xj),
                        Metric::Cosine => (1.0 - simd::dot_f64(xi, xj)).max(0.0),
                    };
                    (d, j as u32)
                })
                .collect();
            let cmp = |a: &(f64, u32), b: &(f64, u32)| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1));
            if others > 0 && others < cand.len() {
                cand.select_nth_unstable_by(others - 1, cmp);
                cand.truncate(others);
            }
            cand.sort_unstable_by(cmp);
            cand.truncate(others);

            let mut idx = Vec::with_capacity(k);
            let mut dist = Vec::with_capacity(k);
            if include_self {
                idx.push(i as u32);
                dist.push(0.0);
            }
            for (d, j) in cand {
                idx.push(j);
                dist.push(match metric {
                    Metric::Euclidean => d.sqrt(),
                    Metric::Cosine => d,
                });
            }
            (idx, dist)
        })
        .collect();

    let mut indices = Vec::with_capacity(n * k);
    let mut distances = Vec::with_capacity(n * k);
    for (idx, dist) in rows {
        indices.extend(idx);
        distances.extend(dist);
    }
    Ok(Knn {
        k,
        indices,
        distances,
    })
}

fn normalize_rows(points: &[f64], dim: usize) -> Vec<f64> {
    let mut out = points.to_vec();
    for row in out.chunks_mut(dim) {
        let norm = simd::dot_f64(row, row).sqrt();
        if norm > 0.0 {
            row.iter_mut().for_each(|v| *v /= norm);
        }
    }
    out
}

#[cfg(test)]
#[path = "../../tests/src_inline/graph/knn.rs"]
mod tests;
