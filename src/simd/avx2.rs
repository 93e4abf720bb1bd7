#[cfg(all(target_arch = "x86_64", target_feature = "avx2"))]
use std::arch::x86_64::*;

#[cfg(all(target_arch = "x86_64", target_feature = "avx2"))]
pub fn sum_u32(values: &[u32]) -> u64 {
    // SAFETY: this function is compiled only when target includes AVX2.
    unsafe { sum_u32_avx2(values) }
}

#[cfg(not(all(target_arch = "x86_64", target_feature = "avx2")))]
pub fn sum_u32(values: &[u32]) -> u64 {
    values.iter().map(|v| *v as u64).sum()
}

#[cfg(all(target_arch = "x86_64", target_feature = "avx2"))]
pub fn sq_dist_f64(a: &[f64], b: &[f64]) -> f64 {
    // SAFETY: this function is compiled only when target includes AVX2.
    unsafe { sq_dist_f64_avx2(a, b) }
}

#[cfg(not(all(target_arch = "x86_64", target_feature = "avx2")))]
pub fn sq_dist_f64(a: &[f64], b: &[f64]) -> f64 {
    super::scalar_sq_dist_f64(a, b)
}

#[cfg(all(target_arch = "x86_64", target_feature = "avx2"))]
#[target_feature(enable = "avx2")]
unsafe fn sum_u32_avx2(values: &[u32]) -> u64 {
    let len = values.len();
    let mut i = 0usize;
    let mut acc_lo = _mm256_setzero_si256();
    let mut acc_hi = _mm256_setzero_si256();

    while i + 8 <= len {
        // SAFETY: i + 8 <= len keeps the unaligned load inside the slice.
        let v = unsafe { _mm256_loadu_si256(values.as_ptr().add(i) as *const __m256i) };
        acc_lo = _mm256_add_epi64(acc_lo, _mm256_cvtepu32_epi64(_mm256_castsi256_si128(v)));
        acc_hi = _mm256_add_epi64(acc_hi, _mm256_cvtepu32_epi64(_mm256_extracti128_si256(v, 1)));
        i += 8;
    }

    let mut lanes = [0u64; 8];
    // SAFETY: lanes has room for two 256-bit stores.
    unsafe {
        _mm256_storeu_si256(lanes.as_mut_ptr() as *mut __m256i, acc_lo);
        _mm256_storeu_si256(lanes.as_mut_ptr().add(4) as *mut __m256i, acc_hi);
    }
    let mut sum: u64 = lanes.iter().sum();
    for v in &values[i..] {
        sum += *v as u64;
    }
    sum
}

#[cfg(all(target_arch = "x86_64", target_feature = "avx2"))]
#[target_feature(enable = "avx2")]
unsafe fn sq_dist_f64_avx2(a: &[f64], b: &[f64]) -> f64 {
    let len = a.len().min(b.len());
    let mut i = 0usize;
    let mut acc = _mm256_setzero_pd();

    while i + 4 <= len {
        // SAFETY: i + 4 <= len for both slices.
        let (va, vb) = unsafe {
            (
                _mm256_loadu_pd(a.as_ptr().add(i)),
                _mm256_loadu_pd(b.as_ptr().add(i)),
            )
        };
        let d = _mm256_sub_pd(va, vb);
        acc = _mm256_add_pd(acc, _mm256_mul_pd(d, d));
        i += 4;
    }

    let mut lanes = [0f64; 4];
    // SAFETY: lanes holds exactly one 256-bit vector.
    unsafe { _mm256_storeu_pd(lanes.as_mut_ptr(), acc) };
    let mut sum = (lanes[0] + lanes[1]) + (lanes[2] + lanes[3]);
    while i < len {
        let d = a[i] - b[i];
        sum += d * d;
        i += 1;
    }
    sum
}
