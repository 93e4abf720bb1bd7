use nalgebra::DMatrix;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, PartialEq)]
pub enum SvdError {
    #[error("cannot decompose an empty {0}x{1} matrix")]
    Empty(usize, usize),
    #[error("requested rank must be at least 1")]
    ZeroRank,
    #[error("matrix contains non-finite values")]
    NonFinite,
    #[error("svd of the projected matrix did not converge")]
    NoConvergence,
}

/// Truncated decomposition `X ~ U diag(s) V^T`, singular values non-increasing.
#[derive(Debug, Clone)]
pub struct TruncatedSvd {
    /// rows x rank
    pub u: DMatrix<f64>,
    pub s: Vec<f64>,
    /// cols x rank
    pub v: DMatrix<f64>,
}

#[derive(Debug, Clone, Copy)]
pub struct RsvdParams {
    pub rank: usize,
    pub oversample: usize,
    pub power_iterations: usize,
    pub seed: u64,
}

/// Randomized truncated SVD (Halko, Martinsson & Tropp, algorithm 4.4): a Gaussian
/// sketch refined by power iterations, re-orthonormalized by QR at every step.
///
/// Each component is sign-normalized so that its largest-magnitude entry in `v`
/// is positive, which makes the output independent of the sketch's signs.
pub fn randomized_svd(x: &DMatrix<f64>, params: RsvdParams) -> Result<TruncatedSvd, SvdError> {
    let (nr, nc) = x.shape();
    if nr == 0 || nc == 0 {
        return Err(SvdError::Empty(nr, nc));
    }
    if params.rank == 0 {
        return Err(SvdError::ZeroRank);
    }
    if x.iter().any(|v| !v.is_finite()) {
        return Err(SvdError::NonFinite);
    }

    let max_rank = nr.min(nc);
    let rank = params.rank.min(max_rank);
    let sketch = (rank + params.oversample).min(max_rank);

    let mut rng = StdRng::seed_from_u64(params.seed);
    let omega = DMatrix::<f64>::from_fn(nc, sketch, |_, _| rng.sample(StandardNormal));

    let mut q = orthonormal_basis(&(x * omega), sketch);
    for it in 0..params.power_iterations {
        let z = orthonormal_basis(&(x.transpose() * &q), sketch);
        q = orthonormal_basis(&(x * z), sketch);
        debug!(iteration = it + 1, basis = q.ncols(), "rsvd power iteration");
    }

    let b = q.transpose() * x;
    let svd = b.svd(true, true);
    let (u_b, v_t) = match (svd.u, svd.v_t) {
        (Some(u), Some(v_t)) => (u, v_t),
        _ => return Err(SvdError::NoConvergence),
    };

    let mut order: Vec<usize> = (0..svd.singular_values.len()).collect();
    order.sort_by(|&a, &b| {
        svd.singular_values[b]
            .total_cmp(&svd.singular_values[a])
            .then(a.cmp(&b))
    });
    let rank = rank.min(order.len());

    let u_full = &q * u_b;
    let mut u = DMatrix::<f64>::zeros(nr, rank);
    let mut v = DMatrix::<f64>::zeros(nc, rank);
    let mut s = Vec::with_capacity(rank);
    for (dst, &src) in order.iter().take(rank).enumerate() {
        s.push(svd.singular_values[src]);
        u.set_column(dst, &u_full.column(src));
        v.set_column(dst, &v_t.row(src).transpose());
    }

    for j in 0..rank {
        let mut pivot = 0usize;
        for i in 1..nc {
            if v[(i, j)].abs() > v[(pivot, j)].abs() {
                pivot = i;
            }
        }
        if v[(pivot, j)] < 0.0 {
            v.column_mut(j).neg_mut();
            u.column_mut(j).neg_mut();
        }
    }

    Ok(TruncatedSvd { u, s, v })
}

fn orthonormal_basis(y: &DMatrix<f64>, max_cols: usize) -> DMatrix<f64> {
    let qr = y.clone().qr();
    let q = qr.q();
    let k = max_cols.min(q.ncols());
    q.columns(0, k).into_owned()
}

#[cfg(test)]
#[path = "../../tests/src_inline/linalg/rsvd.rs"]
mod tests;
