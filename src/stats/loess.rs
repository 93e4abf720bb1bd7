use nalgebra::{Matrix2, Matrix3, Vector2, Vector3};
use rayon::prelude::*;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum LoessError {
    #[error("x and y lengths differ: {0} vs {1}")]
    LengthMismatch(usize, usize),
    #[error("loess needs at least 3 points, got {0}")]
    TooFewPoints(usize),
    #[error("span must be in (0, 1], got {0}")]
    InvalidSpan(f64),
    #[error("non-finite input at index {0}")]
    NonFinite(usize),
}

/// Local quadratic regression with tricube weights, evaluated at every input `x`.
/// Each fit uses the `floor(n * span)` nearest points (at least 3).
pub fn loess_fit(x: &[f64], y: &[f64], span: f64) -> Result<Vec<f64>, LoessError> {
    if x.len() != y.len() {
        return Err(LoessError::LengthMismatch(x.len(), y.len()));
    }
    let n = x.len();
    if n < 3 {
        return Err(LoessError::TooFewPoints(n));
    }
    if !(span > 0.0 && span <= 1.0) {
        return Err(LoessError::InvalidSpan(span));
    }
    if let Some(i) = (0..n).find(|&i| !x[i].is_finite() || !y[i].is_finite()) {
        return Err(LoessError::NonFinite(i));
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| x[a].total_cmp(&x[b]).then(a.cmp(&b)));
    let xs: Vec<f64> = order.iter().map(|&i| x[i]).collect();
    let ys: Vec<f64> = order.iter().map(|&i| y[i]).collect();

    let q = ((n as f64 * span).floor() as usize).clamp(3, n);

    // Window start of the q nearest neighbours; moves monotonically with x.
    let mut windows = Vec::with_capacity(n);
    let mut lo = 0usize;
    for &x0 in &xs {
        while lo + q < n && xs[lo + q] - x0 < x0 - xs[lo] {
            lo += 1;
        }
        windows.push(lo);
    }

    let fitted_sorted: Vec<f64> = (0..n)
        .into_par_iter()
        .map(|i| local_fit(&xs, &ys, windows[i], q, xs[i]))
        .collect();

    let mut fitted = vec![0.0; n];
    for (pos, &orig) in order.iter().enumerate() {
        fitted[orig] = fitted_sorted[pos];
    }
    Ok(fitted)
}

fn local_fit(xs: &[f64], ys: &[f64], lo: usize, q: usize, x0: f64) -> f64 {
    let window = lo..lo + q;
    let h = (x0 - xs[lo]).abs().max((xs[lo + q - 1] - x0).abs());

    let mut s = [0.0f64; 5];
    let mut t = [0.0f64; 3];
    let mut w_sum = 0.0;
    let mut wy_sum = 0.0;
    for j in window {
        let u = xs[j] - x0;
        let w = if h > 0.0 { tricube(u.abs() / h) } else { 1.0 };
        if w == 0.0 {
            continue;
        }
        let mut p = w;
        for (k, sk) in s.iter_mut().enumerate() {
            *sk += p;
            if k < 3 {
                t[k] += p * ys[j];
            }
            p *= u;
        }
        w_sum += w;
        wy_sum += w * ys[j];
    }

    let a = Matrix3::new(s[0], s[1], s[2], s[1], s[2], s[3], s[2], s[3], s[4]);
    if let Some(beta) = a.lu().solve(&Vector3::new(t[0], t[1], t[2])) {
        if beta[0].is_finite() {
            return beta[0];
        }
    }
    let a = Matrix2::new(s[0], s[1], s[1], s[2]);
    if let Some(beta) = a.lu().solve(&Vector2::new(t[0], t[1])) {
        if beta[0].is_finite() {
            return beta[0];
        }
    }
    if w_sum > 0.0 { wy_sum / w_sum } else { ys[lo] }
}

fn tricube(d: f64) -> f64 {
    if d >= 1.0 {
        0.0
    } else {
        let c = 1.0 - d * d * d;
        c * c * c
    }
}

#[cfg(test)]
#[path = "../../tests/src_inline/stats/loess.rs"]
mod tests;
