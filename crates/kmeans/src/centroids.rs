//! Centroid update, normalization, and empty-cluster repair.

use idx_distance::Scalar;
use rand::Rng;

/// Recomputes `k` centroids from `assign` by partitioning the centroid
/// index space across threads: each thread scans the full assignment array
/// but only accumulates rows belonging to its own disjoint centroid slice,
/// so no two threads ever write the same output slot (no locking needed).
/// Empty centroids are left untouched and reported in the returned
/// histogram as zero.
pub fn compute_centroids<T: Scalar>(
    x: &[T],
    n: usize,
    d: usize,
    assign: &[u32],
    centroids: &mut [f32],
    k: usize,
    avg_len: f32,
) -> Vec<usize> {
    let mut histogram = vec![0usize; k];
    rayon::scope(|scope| {
        let threads = rayon::current_num_threads().max(1);
        let chunk = (k + threads - 1) / threads;
        for (t, (centroid_chunk, hist_chunk)) in centroids
            .chunks_mut(chunk * d)
            .zip(histogram.chunks_mut(chunk))
            .enumerate()
        {
            let lo = t * chunk;
            let hi = (lo + hist_chunk.len()).min(k);
            scope.spawn(move |_| {
                for p in 0..n {
                    let c = assign[p] as usize;
                    if c < lo || c >= hi {
                        continue;
                    }
                    let slot = c - lo;
                    hist_chunk[slot] += 1;
                    let row = &x[p * d..(p + 1) * d];
                    let out = &mut centroid_chunk[slot * d..(slot + 1) * d];
                    for i in 0..d {
                        out[i] += row[i].to_f32();
                    }
                }
            });
        }
    });
    normalize_centroids(centroids, &histogram, d, avg_len);
    histogram
}

/// Normalizes accumulated centroid sums: either rescaled to L2 length
/// `avg_len` (cosine-style regime) when `avg_len > 0`, or divided by count
/// otherwise. Empty centroids are left at zero.
pub fn normalize_centroids(centroids: &mut [f32], histogram: &[usize], d: usize, avg_len: f32) {
    for (c, &count) in histogram.iter().enumerate() {
        if count == 0 {
            continue;
        }
        let row = &mut centroids[c * d..(c + 1) * d];
        if avg_len > 0.0 {
            let norm: f32 = row.iter().map(|v| v * v).sum::<f32>().sqrt();
            if norm > 0.0 {
                let scale = avg_len / norm;
                row.iter_mut().for_each(|v| *v *= scale);
            }
        } else {
            let scale = 1.0 / count as f32;
            row.iter_mut().for_each(|v| *v *= scale);
        }
    }
}

/// Recomputes a single centroid's value from the rows currently assigned to
/// it, in place. Used by `split_clusters_half` to recompute both halves of
/// a donor/recipient split without a full `compute_centroids` pass.
fn recompute_one<T: Scalar>(x: &[T], d: usize, rows: &[usize], centroid: &mut [f32], avg_len: f32) {
    centroid.iter_mut().for_each(|v| *v = 0.0);
    for &p in rows {
        let row = &x[p * d..(p + 1) * d];
        for i in 0..d {
            centroid[i] += row[i].to_f32();
        }
    }
    let histogram = [rows.len()];
    normalize_centroids(centroid, &histogram, d, avg_len);
}

/// Empty-cluster repair (§4.2.2). For each empty centroid `ci`, picks a
/// donor `cj` by rejection sampling with acceptance probability
/// `(H[cj] - 1) / (N - k)`, then reassigns `⌊H[cj]/2⌋` of the donor's
/// points (in scan order) to `ci`, recomputing both centroids from their
/// resulting point sets. Returns the number of splits performed.
///
/// Never called with `N < k` or `N == k`: the caller's pre-conditions rule
/// those cases out before the main iteration loop begins, which is what
/// keeps the rejection-sampling loop below guaranteed to terminate (it
/// would spin forever if every histogram entry were empty or `N == k`).
pub fn split_clusters_half<T: Scalar>(
    x: &[T],
    n: usize,
    d: usize,
    centroids: &mut [f32],
    histogram: &mut [usize],
    assign: &mut [u32],
    avg_len: f32,
    rng: &mut impl Rng,
) -> usize {
    let k = histogram.len();
    let mut splits = 0usize;
    for ci in 0..k {
        if histogram[ci] != 0 {
            continue;
        }
        let cj = loop {
            let candidate = rng.random_range(0..k);
            if histogram[candidate] <= 1 {
                continue;
            }
            let accept = (histogram[candidate] - 1) as f64 / (n - k) as f64;
            if rng.random::<f64>() < accept {
                break candidate;
            }
        };

        let donor_rows: Vec<usize> = (0..n).filter(|&p| assign[p] as usize == cj).collect();
        let take = donor_rows.len() / 2;
        let (moved, kept) = donor_rows.split_at(take);
        for &p in moved {
            assign[p] = ci as u32;
        }

        let (lo, hi) = centroids.split_at_mut(ci.max(cj) * d);
        let (ci_slot, cj_slot) = if ci < cj {
            (&mut lo[ci * d..(ci + 1) * d], &mut hi[..d])
        } else {
            (&mut hi[..d], &mut lo[cj * d..(cj + 1) * d])
        };
        recompute_one(x, d, moved, ci_slot, avg_len);
        recompute_one(x, d, kept, cj_slot, avg_len);

        histogram[ci] = moved.len();
        histogram[cj] = kept.len();
        splits += 1;
    }
    splits
}
