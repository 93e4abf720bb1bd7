pub mod avx2;
pub mod neon;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Scalar,
    Avx2,
    Neon,
}

#[cfg(all(target_arch = "x86_64", target_feature = "avx2"))]
pub const BACKEND: Backend = Backend::Avx2;

#[cfg(all(
    not(all(target_arch = "x86_64", target_feature = "avx2")),
    target_arch = "aarch64",
    target_feature = "neon"
))]
pub const BACKEND: Backend = Backend::Neon;

#[cfg(not(any(
    all(target_arch = "x86_64", target_feature = "avx2"),
    all(target_arch = "aarch64", target_feature = "neon")
)))]
pub const BACKEND: Backend = Backend::Scalar;

pub fn backend_name() -> &'static str {
    match BACKEND {
        Backend::Scalar => "scalar",
        Backend::Avx2 => "avx2",
        Backend::Neon => "neon",
    }
}

/// Library size of one cell.
pub fn sum_u32(values: &[u32]) -> u64 {
    match BACKEND {
        Backend::Avx2 => avx2::sum_u32(values),
        Backend::Neon => neon::sum_u32(values),
        Backend::Scalar => values.iter().map(|v| *v as u64).sum(),
    }
}

/// Squared Euclidean distance between two equally sized rows.
///
/// Lane-wise accumulation means the result can differ from the scalar sum in
/// the last bits; it is still deterministic for a given build.
pub fn sq_dist_f64(a: &[f64], b: &[f64]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    match BACKEND {
        Backend::Avx2 => avx2::sq_dist_f64(a, b),
        Backend::Neon => neon::sq_dist_f64(a, b),
        Backend::Scalar => scalar_sq_dist_f64(a, b),
    }
}

pub fn dot_f64(a: &[f64], b: &[f64]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

pub(crate) fn scalar_sq_dist_f64(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

#[cfg(test)]
#[path = "../../tests/src_inline/simd/mod.rs"]
mod tests;
