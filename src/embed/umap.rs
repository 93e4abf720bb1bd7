use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;
use tracing::{debug, warn};

use crate::graph::knn::{Knn, KnnError, Metric, exact_knn};

const SMOOTH_K_TOLERANCE: f64 = 1e-5;
const MIN_K_DIST_SCALE: f64 = 1e-3;
const GRAD_CLIP: f64 = 4.0;

#[derive(Debug, Error, PartialEq)]
pub enum UmapError {
    #[error("umap needs at least 2 points, got {0}")]
    TooFewPoints(usize),
    #[error("initial layout has {found} rows for {expected} points")]
    InitMismatch { expected: usize, found: usize },
    #[error("knn: {0}")]
    Knn(#[from] KnnError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct UmapParams {
    pub n_neighbors: usize,
    pub metric: Metric,
    pub min_dist: f64,
    pub spread: f64,
    pub n_epochs: Option<usize>,
    pub learning_rate: f64,
    pub negative_sample_rate: usize,
    pub a: Option<f64>,
    pub b: Option<f64>,
    pub seed: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UmapOutput {
    pub coords: Vec<[f64; 2]>,
    pub n_neighbors: usize,
    pub n_epochs: usize,
    pub a: f64,
    pub b: f64,
}

/// One directed edge of the symmetric fuzzy graph.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct FuzzyEdge {
    pub head: u32,
    pub tail: u32,
    pub weight: f64,
}

pub fn default_epochs(n_points: usize) -> usize {
    if n_points <= 10_000 { 500 } else { 200 }
}

/// Two-dimensional UMAP layout of row-major `points` (width `dim`), started from `init`.
pub fn umap(
    points: &[f64],
    dim: usize,
    init: &[[f64; 2]],
    params: &UmapParams,
) -> Result<UmapOutput, UmapError> {
    let n = if dim == 0 { 0 } else { points.len() / dim };
    if n < 2 {
        return Err(UmapError::TooFewPoints(n));
    }
    if init.len() != n {
        return Err(UmapError::InitMismatch {
            expected: n,
            found: init.len(),
        });
    }

    let mut k = params.n_neighbors;
    if k > n {
        warn!(n_neighbors = k, points = n, "n_neighbors exceeds point count, clamping");
        k = n;
    }

    let knn = exact_knn(points, dim, k, params.metric, true)?;
    let (rho, sigma) = smooth_knn_dist(&knn);
    let edges = fuzzy_union(&knn, &rho, &sigma);

    let (a, b) = match (params.a, params.b) {
        (Some(a), Some(b)) => (a, b),
        _ => fit_ab(params.min_dist, params.spread),
    };
    let n_epochs = params.n_epochs.unwrap_or_else(|| default_epochs(n));
    debug!(edges = edges.len(), a, b, n_epochs, "umap graph ready");

    let mut embedding = scale_init(init);
    optimize_layout(&mut embedding, &edges, a, b, n_epochs, params);

    Ok(UmapOutput {
        coords: embedding,
        n_neighbors: k,
        n_epochs,
        a,
        b,
    })
}

/// Per-point `rho` (distance to the nearest distinct neighbour) and `sigma` such that
/// the membership strengths of the non-self neighbours sum to `log2(k)`.
pub(crate) fn smooth_knn_dist(knn: &Knn) -> (Vec<f64>, Vec<f64>) {
    let n = knn.n_points();
    let target = (knn.k as f64).log2();
    let mean_all = if knn.distances.is_empty() {
        0.0
    } else {
        knn.distances.iter().sum::<f64>() / knn.distances.len() as f64
    };

    let mut rhos = Vec::with_capacity(n);
    let mut sigmas = Vec::with_capacity(n);
    for i in 0..n {
        let dists = &knn.row(i).1[1..];
        let rho = dists.iter().copied().find(|&d| d > 0.0).unwrap_or(0.0);

        let mut lo = 0.0;
        let mut hi = f64::INFINITY;
        let mut mid = 1.0;
        for _ in 0..64 {
            let psum: f64 = dists
                .iter()
                .map(|&d| {
                    let d = d - rho;
                    if d > 0.0 { (-d / mid).exp() } else { 1.0 }
                })
                .sum();
            if (psum - target).abs() < SMOOTH_K_TOLERANCE {
                break;
            }
            if psum > target {
                hi = mid;
                mid = (lo + hi) / 2.0;
            } else {
                lo = mid;
                mid = if hi.is_infinite() { mid * 2.0 } else { (lo + hi) / 2.0 };
            }
        }

        let floor = if rho > 0.0 {
            let mean_i = dists.iter().sum::<f64>() / dists.len().max(1) as f64;
            MIN_K_DIST_SCALE * mean_i
        } else {
            MIN_K_DIST_SCALE * mean_all
        };
        rhos.push(rho);
        sigmas.push(mid.max(floor));
    }
    (rhos, sigmas)
}

/// Directed memberships symmetrised by fuzzy union `w + w' - w * w'`. Both
/// directions of every pair are returned, ordered by (head, tail).
pub(crate) fn fuzzy_union(knn: &Knn, rho: &[f64], sigma: &[f64]) -> Vec<FuzzyEdge> {
    let n = knn.n_points();
    let mut entries: Vec<(u32, u32, f64, f64)> = Vec::with_capacity(2 * n * knn.k);
    for i in 0..n {
        let (idx, dists) = knn.row(i);
        for (&j, &d) in idx.iter().zip(dists) {
            if j as usize == i {
                continue;
            }
            let shifted = d - rho[i];
            let w = if shifted <= 0.0 || sigma[i] <= 0.0 {
                1.0
            } else {
                (-shifted / sigma[i]).exp()
            };
            entries.push((i as u32, j, w, 0.0));
            entries.push((j, i as u32, 0.0, w));
        }
    }
    entries.sort_by(|x, y| (x.0, x.1).cmp(&(y.0, y.1)));

    let mut edges: Vec<FuzzyEdge> = Vec::new();
    let mut pos = 0;
    while pos < entries.len() {
        let (head, tail, mut fwd, mut back) = entries[pos];
        pos += 1;
        while pos < entries.len() && (entries[pos].0, entries[pos].1) == (head, tail) {
            fwd += entries[pos].2;
            back += entries[pos].3;
            pos += 1;
        }
        let weight = fwd + back - fwd * back;
        if weight > 0.0 {
            edges.push(FuzzyEdge { head, tail, weight });
        }
    }
    edges
}

/// Least-squares fit of `1 / (1 + a d^(2b))` to the target membership curve
/// (1 below `min_dist`, exponential decay with scale `spread` above), sampled on
/// 300 points over `[0, 3 * spread]` and solved by Levenberg-Marquardt.
pub fn fit_ab(min_dist: f64, spread: f64) -> (f64, f64) {
    let n_points = 300;
    let xs: Vec<f64> = (0..n_points)
        .map(|i| 3.0 * spread * i as f64 / (n_points - 1) as f64)
        .collect();
    let ys: Vec<f64> = xs
        .iter()
        .map(|&x| {
            if x < min_dist {
                1.0
            } else {
                (-(x - min_dist) / spread).exp()
            }
        })
        .collect();

    let sse = |a: f64, b: f64| -> f64 {
        xs.iter()
            .zip(&ys)
            .map(|(&x, &y)| {
                let r = 1.0 / (1.0 + a * x.powf(2.0 * b)) - y;
                r * r
            })
            .sum()
    };

    let (mut a, mut b) = (1.0f64, 1.0f64);
    let mut lambda = 1e-3;
    let mut current = sse(a, b);
    for _ in 0..500 {
        let mut jtj = [0.0f64; 3];
        let mut jtr = [0.0f64; 2];
        for (&x, &y) in xs.iter().zip(&ys) {
            if x <= 0.0 {
                continue;
            }
            let x2b = x.powf(2.0 * b);
            let denom = 1.0 + a * x2b;
            let r = 1.0 / denom - y;
            let da = -x2b / (denom * denom);
            let db = -2.0 * a * x2b * x.ln() / (denom * denom);
            jtj[0] += da * da;
            jtj[1] += da * db;
            jtj[2] += db * db;
            jtr[0] += da * r;
            jtr[1] += db * r;
        }

        let m00 = jtj[0] * (1.0 + lambda);
        let m11 = jtj[2] * (1.0 + lambda);
        let det = m00 * m11 - jtj[1] * jtj[1];
        if det.abs() < f64::MIN_POSITIVE {
            break;
        }
        let step_a = -(m11 * jtr[0] - jtj[1] * jtr[1]) / det;
        let step_b = -(m00 * jtr[1] - jtj[1] * jtr[0]) / det;
        let (na, nb) = (a + step_a, b + step_b);
        let candidate = if na > 0.0 && nb > 0.0 {
            sse(na, nb)
        } else {
            f64::INFINITY
        };

        if candidate < current {
            let converged = (current - candidate) <= 1e-15 * current.max(1e-300)
                || (step_a.abs() < 1e-12 && step_b.abs() < 1e-12);
            a = na;
            b = nb;
            current = candidate;
            lambda = (lambda / 10.0).max(1e-12);
            if converged {
                break;
            }
        } else {
            lambda *= 10.0;
            if lambda > 1e12 {
                break;
            }
        }
    }
    (a, b)
}

/// Rescales the initial layout so its largest absolute coordinate is 10.
fn scale_init(init: &[[f64; 2]]) -> Vec<[f64; 2]> {
    let max_abs = init
        .iter()
        .flat_map(|p| p.iter())
        .fold(0.0f64, |m, v| m.max(v.abs()));
    if max_abs > 0.0 {
        let s = 10.0 / max_abs;
        init.iter().map(|p| [p[0] * s, p[1] * s]).collect()
    } else {
        init.to_vec()
    }
}

fn clip(v: f64) -> f64 {
    v.clamp(-GRAD_CLIP, GRAD_CLIP)
}

/// Epoch-sampled stochastic gradient descent on the fuzzy cross entropy.
fn optimize_layout(
    embedding: &mut [[f64; 2]],
    edges: &[FuzzyEdge],
    a: f64,
    b: f64,
    n_epochs: usize,
    params: &UmapParams,
) {
    let n = embedding.len();
    let max_w = edges.iter().map(|e| e.weight).fold(0.0f64, f64::max);
    if max_w <= 0.0 || n_epochs == 0 {
        return;
    }
    // Edges too weak to be sampled even once are dropped.
    let threshold = max_w / n_epochs as f64;
    let edges: Vec<FuzzyEdge> = edges
        .iter()
        .copied()
        .filter(|e| e.weight >= threshold)
        .collect();

    let epochs_per_sample: Vec<f64> = edges.iter().map(|e| max_w / e.weight).collect();
    let neg_rate = params.negative_sample_rate as f64;
    let epochs_per_negative: Vec<f64> = epochs_per_sample
        .iter()
        .map(|e| if neg_rate > 0.0 { e / neg_rate } else { f64::INFINITY })
        .collect();
    let mut next_sample = epochs_per_sample.clone();
    let mut next_negative = epochs_per_negative.clone();

    let mut rng = StdRng::seed_from_u64(params.seed);

    for epoch in 0..n_epochs {
        let alpha = params.learning_rate * (1.0 - epoch as f64 / n_epochs as f64);
        let now = epoch as f64;
        for (e, edge) in edges.iter().enumerate() {
            if next_sample[e] > now {
                continue;
            }
            let i = edge.head as usize;
            let j = edge.tail as usize;

            let dx = embedding[i][0] - embedding[j][0];
            let dy = embedding[i][1] - embedding[j][1];
            let dist2 = dx * dx + dy * dy;
            if dist2 > 0.0 {
                let coeff = -2.0 * a * b * dist2.powf(b - 1.0) / (a * dist2.powf(b) + 1.0);
                let gx = clip(coeff * dx) * alpha;
                let gy = clip(coeff * dy) * alpha;
                embedding[i][0] += gx;
                embedding[i][1] += gy;
                embedding[j][0] -= gx;
                embedding[j][1] -= gy;
            }
            next_sample[e] += epochs_per_sample[e];

            let n_neg = ((now - next_negative[e]) / epochs_per_negative[e]).floor();
            let n_neg = if n_neg > 0.0 { n_neg as usize } else { 0 };
            for _ in 0..n_neg {
                let other = rng.random_range(0..n);
                if other == i {
                    continue;
                }
                let dx = embedding[i][0] - embedding[other][0];
                let dy = embedding[i][1] - embedding[other][1];
                let dist2 = dx * dx + dy * dy;
                if dist2 > 0.0 {
                    let coeff = 2.0 * b / ((0.001 + dist2) * (a * dist2.powf(b) + 1.0));
                    embedding[i][0] += clip(coeff * dx) * alpha;
                    embedding[i][1] += clip(coeff * dy) * alpha;
                }
            }
            next_negative[e] += n_neg as f64 * epochs_per_negative[e];
        }
    }
}

#[cfg(test)]
#[path = "../../tests/src_inline/embed/umap.rs"]
mod tests;
