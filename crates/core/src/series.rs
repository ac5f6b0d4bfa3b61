//! Bailey-Borwein-Plouffe series
//!
//! π = Σ (1/16^k) · (4/(8k+1) − 2/(8k+4) − 1/(8k+5) − 1/(8k+6)), k ≥ 0
//!
//! Everything here is plain `f64` arithmetic. Terms are always added in
//! increasing `k`, so `partial_sum(0, n)` and `approximate(n)` agree bit for
//! bit and a sum split into consecutive ranges only differs from the direct
//! sum by the rounding of the range boundaries.

/// Iteration count used by the `bbpi` binary when none is given
pub const DEFAULT_ITERATIONS: i64 = 10_000;

/// `1 / 16^k` as an exact power of two.
///
/// The value is `2^(-4k)`, built directly from its bit pattern: normal down
/// to `2^-1022`, subnormal down to `2^-1072`, and `0.0` past that. This is
/// what repeated multiplication by `1/16` produces, without the O(k) loop and
/// without ever forming `16^k` as an integer.
#[inline]
pub fn inverse_power_of_16(k: u64) -> f64 {
    match k.checked_mul(4) {
        Some(e) if e <= 1022 => f64::from_bits((1023 - e) << 52),
        Some(e) if e <= 1074 => f64::from_bits(1u64 << (1074 - e)),
        _ => 0.0,
    }
}

/// The `k`-th series term
#[inline]
pub fn term(k: u64) -> f64 {
    let k8 = 8.0 * k as f64;
    inverse_power_of_16(k)
        * (4.0 / (k8 + 1.0) - 2.0 / (k8 + 4.0) - 1.0 / (k8 + 5.0) - 1.0 / (k8 + 6.0))
}

/// Sum of `term(k)` for `k` in `first..first + count`, accumulated from 0.0
/// in increasing `k`.
pub fn partial_sum(first: u64, count: u64) -> f64 {
    let end = first.saturating_add(count);
    // Explicit fold: `Iterator::sum` for floats starts from -0.0.
    (first..end).fold(0.0, |acc, k| acc + term(k))
}

/// Approximate π with the first `n` terms of the series.
///
/// `n <= 0` is an empty sum and returns `0.0`.
pub fn approximate(n: i64) -> f64 {
    let mut pi = 0.0;
    for k in 0..n {
        pi += term(k as u64);
    }
    pi
}
