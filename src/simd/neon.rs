#[cfg(all(target_arch = "aarch64", target_feature = "neon"))]
use std::arch::aarch64::*;

#[cfg(all(target_arch = "aarch64", target_feature = "neon"))]
pub fn sum_u32(values: &[u32]) -> u64 {
    // SAFETY: function uses NEON intrinsics and is compiled for aarch64+neon.
    unsafe { sum_u32_neon(values) }
}

#[cfg(not(all(target_arch = "aarch64", target_feature = "neon")))]
pub fn sum_u32(values: &[u32]) -> u64 {
    values.iter().map(|v| *v as u64).sum()
}

#[cfg(all(target_arch = "aarch64", target_feature = "neon"))]
pub fn sq_dist_f64(a: &[f64], b: &[f64]) -> f64 {
    // SAFETY: function uses NEON intrinsics and is compiled for aarch64+neon.
    unsafe { sq_dist_f64_neon(a, b) }
}

#[cfg(not(all(target_arch = "aarch64", target_feature = "neon")))]
pub fn sq_dist_f64(a: &[f64], b: &[f64]) -> f64 {
    super::scalar_sq_dist_f64(a, b)
}

#[cfg(all(target_arch = "aarch64", target_feature = "neon"))]
unsafe fn sum_u32_neon(values: &[u32]) -> u64 {
    let len = values.len();
    let mut i = 0usize;
    let mut acc = unsafe { vdupq_n_u64(0) };

    while i + 4 <= len {
        let v = unsafe { vld1q_u32(values.as_ptr().add(i)) };
        acc = unsafe { vaddq_u64(acc, vpaddlq_u32(v)) };
        i += 4;
    }

    let mut sum = unsafe { vaddvq_u64(acc) };
    for v in &values[i..] {
        sum += *v as u64;
    }
    sum
}

#[cfg(all(target_arch = "aarch64", target_feature = "neon"))]
unsafe fn sq_dist_f64_neon(a: &[f64], b: &[f64]) -> f64 {
    let len = a.len().min(b.len());
    let mut i = 0usize;
    let mut acc = unsafe { vdupq_n_f64(0.0) };

    while i + 2 <= len {
        let d = unsafe { vsubq_f64(vld1q_f64(a.as_ptr().add(i)), vld1q_f64(b.as_ptr().add(i))) };
        acc = unsafe { vfmaq_f64(acc, d, d) };
        i += 2;
    }

    let mut sum = unsafe { vaddvq_f64(acc) };
    while i < len {
        let d = a[i] - b[i];
        sum += d * d;
        i += 1;
    }
    sum
}
