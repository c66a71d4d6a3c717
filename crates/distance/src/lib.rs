//! Distance kernels and the packed triangular inter-centroid distance cache.
//!
//! Contract-only: kernels are pure, thread-safe, and free of hidden state.
//! No SIMD specialization lives here; that's an implementation detail a
//! caller could drop in later without touching the signatures below.

use rayon::prelude::*;

/// An element type a vector row can be stored in: `f32`, `u8`, or `i8`.
pub trait Scalar: Copy + Send + Sync + 'static {
    fn to_f32(self) -> f32;
    fn from_f32(v: f32) -> Self;
}

impl Scalar for f32 {
    fn to_f32(self) -> f32 {
        self
    }
    fn from_f32(v: f32) -> Self {
        v
    }
}
impl Scalar for u8 {
    fn to_f32(self) -> f32 {
        self as f32
    }
    fn from_f32(v: f32) -> Self {
        v.round().clamp(0.0, u8::MAX as f32) as u8
    }
}
impl Scalar for i8 {
    fn to_f32(self) -> f32 {
        self as f32
    }
    fn from_f32(v: f32) -> Self {
        v.round().clamp(i8::MIN as f32, i8::MAX as f32) as i8
    }
}

/// An accumulator type a distance sum is collected in: `f32` or `f64`.
pub trait Accum:
    Copy + Default + Send + Sync + std::ops::AddAssign + From<f32> + Into<f64> + 'static
{
}
impl Accum for f32 {}
impl Accum for f64 {}

/// `Σ (x_i − y_i)²`, accumulated in `R`.
pub fn l2sqr<A: Scalar, B: Scalar, R: Accum>(x: &[A], y: &[B], n: usize) -> R {
    let mut acc = R::default();
    for i in 0..n {
        let d = x[i].to_f32() - y[i].to_f32();
        acc += R::from(d * d);
    }
    acc
}

/// `Σ x_i · y_i`, accumulated in `R`.
pub fn ip<A: Scalar, B: Scalar, R: Accum>(x: &[A], y: &[B], n: usize) -> R {
    let mut acc = R::default();
    for i in 0..n {
        acc += R::from(x[i].to_f32() * y[i].to_f32());
    }
    acc
}

/// `r_i = x_i − c_i`.
pub fn compute_residual<A: Scalar, B: Scalar>(x: &[A], c: &[B], r: &mut [f32], n: usize) {
    for i in 0..n {
        r[i] = x[i].to_f32() - c[i].to_f32();
    }
}

/// `out[k] = ⟨q, C[k]⟩` for each of the `k_count` sub-centroids of one
/// subspace, each of width `d_sub`. `codebook` is row-major `(k_count ×
/// d_sub)`.
pub fn compute_lookuptable_ip(q: &[f32], codebook: &[f32], out: &mut [f32], d_sub: usize, k_count: usize) {
    for k in 0..k_count {
        let row = &codebook[k * d_sub..(k + 1) * d_sub];
        out[k] = ip::<f32, f32, f32>(q, row, d_sub);
    }
}

/// `i < j` row-major index into the packed upper triangle of a `k × k`
/// symmetric matrix with a zero diagonal.
#[inline]
fn tri_index(i: usize, j: usize, k: usize) -> usize {
    debug_assert!(i != j);
    let (a, b) = if i < j { (i, j) } else { (j, i) };
    a * k - a * (a + 1) / 2 + (b - a - 1)
}

/// Packed upper-triangle cache of pairwise squared L2 distances between `k`
/// centroids. Used by Elkan-pruned assignment (§4.2.1) and by R's
/// per-subspace sub-centroid triangle (§4.4), generalized from a
/// compile-time-sized array to a runtime `Vec` since `k` is a config value
/// here rather than a fixed constant.
pub struct Distances {
    k: usize,
    data: Vec<f32>,
}

impl Distances {
    /// Builds the triangle for `centroids` (row-major `k × d`), computing
    /// rows of the triangle in parallel.
    pub fn build(centroids: &[f32], k: usize, d: usize) -> Self {
        let len = k * k.saturating_sub(1) / 2;
        let mut data = vec![0.0f32; len];
        data.par_iter_mut().enumerate().for_each(|(idx, slot)| {
            let (i, j) = unindex(idx, k);
            let xi = &centroids[i * d..(i + 1) * d];
            let xj = &centroids[j * d..(j + 1) * d];
            *slot = l2sqr::<f32, f32, f32>(xi, xj, d);
        });
        Self { k, data }
    }

    pub fn k(&self) -> usize {
        self.k
    }

    /// Squared distance between centroids `i` and `j`. Zero when `i == j`.
    pub fn get(&self, i: usize, j: usize) -> f32 {
        if i == j {
            0.0
        } else {
            self.data[tri_index(i, j, self.k)]
        }
    }

    pub fn set(&mut self, i: usize, j: usize, value: f32) {
        if i != j {
            let idx = tri_index(i, j, self.k);
            self.data[idx] = value;
        }
    }

    /// `s(c) = min_{c' ≠ c} d(c, c') / 2` for every centroid — the Elkan
    /// exclusion midpoint used by `can_exclude`.
    pub fn midpoints(&self) -> Vec<f32> {
        (0..self.k)
            .map(|i| {
                (0..self.k)
                    .filter(|&j| j != i)
                    .map(|j| self.get(i, j))
                    .fold(f32::INFINITY, f32::min)
                    * 0.5
            })
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, f32)> + '_ {
        (0..self.data.len()).map(move |idx| {
            let (i, j) = unindex(idx, self.k);
            (i, j, self.data[idx])
        })
    }
}

/// Inverse of `tri_index`: recovers `(i, j)` with `i < j` from a packed
/// triangle offset.
fn unindex(idx: usize, k: usize) -> (usize, usize) {
    let mut i = 0usize;
    let mut offset = idx;
    loop {
        let row_len = k - i - 1;
        if offset < row_len {
            return (i, i + 1 + offset);
        }
        offset -= row_len;
        i += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn l2sqr_matches_naive() {
        let x = [1.0f32, 2.0, 3.0];
        let y = [1.0f32, 0.0, 3.0];
        let got: f32 = l2sqr(&x, &y, 3);
        assert!((got - 4.0).abs() < 1e-6);
    }

    #[test]
    fn ip_mixed_element_types() {
        let x = [1.0f32, 2.0, 3.0];
        let y = [2u8, 2u8, 2u8];
        let got: f32 = ip(&x, &y, 3);
        assert!((got - 12.0).abs() < 1e-6);
    }

    #[test]
    fn residual_subtracts_centroid() {
        let x = [3.0f32, 4.0];
        let c = [1.0f32, 1.0];
        let mut r = [0.0f32; 2];
        compute_residual(&x, &c, &mut r, 2);
        assert_eq!(r, [2.0, 3.0]);
    }

    #[test]
    fn triangle_roundtrips_all_pairs() {
        let k = 5;
        let d = 2;
        let centroids: Vec<f32> = (0..k * d).map(|i| i as f32).collect();
        let dist = Distances::build(&centroids, k, d);
        for i in 0..k {
            for j in 0..k {
                if i == j {
                    assert_eq!(dist.get(i, j), 0.0);
                    continue;
                }
                let xi = &centroids[i * d..(i + 1) * d];
                let xj = &centroids[j * d..(j + 1) * d];
                let expect: f32 = l2sqr(xi, xj, d);
                assert!((dist.get(i, j) - expect).abs() < 1e-6);
                assert_eq!(dist.get(i, j), dist.get(j, i));
            }
        }
    }

    #[test]
    fn midpoints_are_half_min_distance() {
        let k = 3;
        let d = 1;
        let centroids = [0.0f32, 1.0, 4.0];
        let dist = Distances::build(&centroids, k, d);
        let mids = dist.midpoints();
        // centroid 0: nearest neighbor is 1.0 away, sqr = 1.0 -> mid 0.5
        assert!((mids[0] - 0.5).abs() < 1e-6);
    }
}
