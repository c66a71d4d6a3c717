//! Encoding (§4.4 `encode_vectors`): per-subspace Elkan-pruned subcode
//! assignment, plus a second L2-only pass writing the `term2` tail.

use idx_distance::{compute_residual, ip, l2sqr, Distances, Scalar};
use rayon::prelude::*;

use crate::codebook::Codebook;
use crate::codeword::{f32_tail_width, pack_f32_tail, CodeWord};
use crate::config::Metric;

/// One triangle per subspace, built once and reused across every row in
/// the encode call — the reference trainer's "skip rebuilding on repeat
/// calls" optimization, generalized here to "build once per call" since
/// this port encodes the whole corpus in a single pass rather than
/// per-bucket.
pub struct SubspaceTriangles(Vec<(Distances, Vec<f32>)>);

impl SubspaceTriangles {
    pub fn build(codebook: &Codebook) -> Self {
        let triangles = (0..codebook.m)
            .map(|i| {
                let triangle = Distances::build(codebook.subspace(i), codebook.k, codebook.d_sub);
                let midpoints = triangle.midpoints();
                (triangle, midpoints)
            })
            .collect();
        Self(triangles)
    }
}

/// Encodes every row of `x` against its own bucket centroid in
/// `sample_centroids` (row-major `n × d`, same layout as training).
/// Returns row-major `(n × code_width)` codes, `code_width = m` for IP,
/// `m + f32_tail_width::<U>()` for L2.
pub fn encode_vectors<T: Scalar + Sync, U: CodeWord>(
    x: &[T],
    n: usize,
    d: usize,
    sample_centroids: &[f32],
    codebook: &Codebook,
    triangles: &SubspaceTriangles,
    metric: Metric,
) -> Vec<U> {
    let tail = match metric {
        Metric::L2 => f32_tail_width::<U>(),
        Metric::Ip => 0,
    };
    let code_width = codebook.m + tail;

    let rows: Vec<Vec<U>> = (0..n)
        .into_par_iter()
        .map(|j| {
            let mut row_codes = vec![U::default(); code_width];
            let x_row = &x[j * d..(j + 1) * d];
            let c_row = &sample_centroids[j * d..(j + 1) * d];
            for i in 0..codebook.m {
                let sub_x = &x_row[i * codebook.d_sub..(i + 1) * codebook.d_sub];
                let sub_c = &c_row[i * codebook.d_sub..(i + 1) * codebook.d_sub];
                let mut residual = vec![0.0f32; codebook.d_sub];
                compute_residual(sub_x, sub_c, &mut residual, codebook.d_sub);

                let (triangle, midpoints) = &triangles.0[i];
                let code = assign_one(&residual, codebook.subspace(i), codebook.d_sub, codebook.k, triangle, midpoints);
                row_codes[i] = U::from_index(code);
            }

            if metric == Metric::L2 {
                let reconstructed = reconstruct(codebook, &row_codes[..codebook.m]);
                let rr: f32 = ip(&reconstructed, &reconstructed, d);
                let cr: f32 = ip(c_row, &reconstructed, d);
                let term2 = rr + 2.0 * cr;
                for (slot, word) in row_codes[codebook.m..].iter_mut().zip(pack_f32_tail::<U>(term2, tail)) {
                    *slot = word;
                }
            }
            row_codes
        })
        .collect();

    let mut out = Vec::with_capacity(n * code_width);
    for row in rows {
        out.extend(row);
    }
    out
}

/// Two-phase partial distance (§4.2.1's shortcut): bail out after the
/// first half of dimensions if already no better than `best`, same
/// block-accumulation pattern as K's `assign::partial_distance`.
fn partial_distance(residual: &[f32], sub_centroid: &[f32], d_sub: usize, best: f32) -> f32 {
    let half = d_sub / 2;
    let first: f32 = l2sqr(&residual[..half], &sub_centroid[..half], half);
    if first >= best {
        return first;
    }
    let rest: f32 = l2sqr(&residual[half..], &sub_centroid[half..], d_sub - half);
    first + rest
}

/// Elkan-pruned nearest-sub-centroid search for a single residual row,
/// reusing the block assignment routine from K with a one-row dataset:
/// the triangle-inequality lower bound skips whole sub-centroids, the
/// two-phase partial distance bails out early on the ones it can't skip,
/// and `midpoints` stops the scan outright once the current best is
/// already closer than any sub-centroid's nearest neighbor allows.
fn assign_one(
    residual: &[f32],
    codebook_subspace: &[f32],
    d_sub: usize,
    k: usize,
    triangle: &Distances,
    midpoints: &[f32],
) -> usize {
    // Brute two-phase scan using the precomputed triangle directly, since
    // a one-row call into elkan_assign would rebuild the same triangle on
    // every invocation; here we already have it built once per subspace.
    let mut best = 0usize;
    let mut best_val: f32 = l2sqr(residual, &codebook_subspace[..d_sub], d_sub);
    for j in 1..k {
        if 4.0 * best_val <= triangle.get(best, j) {
            continue;
        }
        let cj = &codebook_subspace[j * d_sub..(j + 1) * d_sub];
        let candidate = partial_distance(residual, cj, d_sub, best_val);
        if candidate < best_val {
            best_val = candidate;
            best = j;
            if best_val <= midpoints[best] {
                break;
            }
        }
    }
    best
}

/// Reconstructs a full `d`-dimensional residual from its `m` subcodes.
pub fn reconstruct<U: CodeWord>(codebook: &Codebook, codes: &[U]) -> Vec<f32> {
    let mut out = Vec::with_capacity(codebook.m * codebook.d_sub);
    for (i, &code) in codes.iter().enumerate() {
        out.extend_from_slice(codebook.sub_centroid(i, code.to_index()));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codebook::train;
    use crate::config::RpqConfig;

    #[test]
    fn encode_round_trip_is_close_to_original_residual() {
        let d = 8;
        let m = 4;
        let n = 64;
        let x: Vec<f32> = (0..n * d).map(|i| ((i * 37) % 11) as f32).collect();
        let centroids = vec![0.0f32; n * d];
        let cfg = RpqConfig {
            m,
            nbits: 5,
            metric: Metric::L2,
            seed: 2,
            niter: 8,
        };
        let codebook = train(&x, n, d, &centroids, &cfg).unwrap();
        let triangles = SubspaceTriangles::build(&codebook);
        let codes: Vec<u8> = encode_vectors(&x, n, d, &centroids, &codebook, &triangles, Metric::L2);
        let code_width = m + f32_tail_width::<u8>();
        assert_eq!(codes.len(), n * code_width);

        for j in 0..n {
            let row = &codes[j * code_width..j * code_width + m];
            let reconstructed = reconstruct(&codebook, row);
            let x_row = &x[j * d..(j + 1) * d];
            let c_row = &centroids[j * d..(j + 1) * d];
            let mut full_residual = vec![0.0f32; d];
            compute_residual(x_row, c_row, &mut full_residual, d);
            let before: f32 = l2sqr(x_row, c_row, d);
            let mut reconstructed_point = vec![0.0f32; d];
            for i in 0..d {
                reconstructed_point[i] = c_row[i] + reconstructed[i];
            }
            let after: f32 = l2sqr(x_row, &reconstructed_point, d);
            assert!(after <= before + 1e-3);
        }
    }

    /// `assign_one`'s triangle-pruned, two-phase-scored search must pick
    /// the same sub-centroid as an unpruned brute-force scan.
    #[test]
    fn assign_one_matches_brute_force_nearest_sub_centroid() {
        let d_sub = 6;
        let k = 16;
        let codebook_subspace: Vec<f32> = (0..k * d_sub).map(|i| ((i * 29) % 13) as f32 * 0.1).collect();
        let triangle = Distances::build(&codebook_subspace, k, d_sub);
        let midpoints = triangle.midpoints();

        let residuals: Vec<Vec<f32>> = (0..20)
            .map(|row| (0..d_sub).map(|i| ((row * 7 + i * 3) % 11) as f32 * 0.1).collect())
            .collect();

        for residual in &residuals {
            let got = assign_one(residual, &codebook_subspace, d_sub, k, &triangle, &midpoints);
            let mut want = 0usize;
            let mut want_val = f32::INFINITY;
            for j in 0..k {
                let cj = &codebook_subspace[j * d_sub..(j + 1) * d_sub];
                let d: f32 = l2sqr(residual, cj, d_sub);
                if d < want_val {
                    want_val = d;
                    want = j;
                }
            }
            assert_eq!(got, want);
        }
    }
}
