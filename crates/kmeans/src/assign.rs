//! Elkan-pruned nearest-centroid assignment (§4.2.1).
//!
//! Centroids are processed in blocks of up to 1024: each block's inter-
//! centroid distance triangle is precomputed in parallel, then every point
//! is swept against just that block with triangle-inequality pruning and a
//! two-phase partial-distance shortcut. The best `(id, val)` found in any
//! block wins; blocks are otherwise independent so the final pass is a
//! plain per-point minimum.

use idx_distance::{l2sqr, Distances, Scalar};
use rayon::prelude::*;

const BLOCK: usize = 1024;

/// Per-row nearest centroid id and squared distance to it.
pub struct Assignment {
    pub id: Vec<u32>,
    pub dist: Vec<f32>,
}

/// Brute-force two-phase partial distance from one row to one centroid,
/// bailing out after the first half of dimensions if already no better
/// than `best`.
fn partial_distance<T: Scalar>(row: &[T], centroid: &[f32], d: usize, best: f32) -> f32 {
    let half = d / 2;
    let first: f32 = l2sqr(&row[..half], &centroid[..half], half);
    if first >= best {
        return first;
    }
    let rest: f32 = l2sqr(&row[half..], &centroid[half..], d - half);
    first + rest
}

/// Assigns every one of `n` rows (row-major `n × d` in `x`) to its nearest
/// of `k` centroids (row-major `k × d`), Elkan-pruned within each 1024-wide
/// centroid block.
pub fn elkan_assign<T: Scalar + Sync>(x: &[T], n: usize, d: usize, centroids: &[f32], k: usize) -> Assignment {
    let mut best_id = vec![0u32; n];
    let mut best_val = vec![f32::INFINITY; n];

    let mut block_start = 0usize;
    while block_start < k {
        let block_end = (block_start + BLOCK).min(k);
        let block_k = block_end - block_start;
        let block_centroids = &centroids[block_start * d..block_end * d];
        let triangle = Distances::build(block_centroids, block_k, d);
        let midpoints = triangle.midpoints();

        let block_results: Vec<(u32, f32)> = (0..n)
            .into_par_iter()
            .map(|p| {
                let row = &x[p * d..(p + 1) * d];
                let mut id = 0usize;
                let mut val: f32 = l2sqr(row, &block_centroids[..d], d);
                for j in 1..block_k {
                    if 4.0 * val <= triangle.get(id, j) {
                        continue;
                    }
                    let cj = &block_centroids[j * d..(j + 1) * d];
                    let candidate = partial_distance(row, cj, d, val);
                    if candidate < val {
                        val = candidate;
                        id = j;
                        // s(id) = half the distance from id to its nearest
                        // neighbor centroid: once val drops to or below that,
                        // no remaining centroid in the block can be closer.
                        if val <= midpoints[id] {
                            break;
                        }
                    }
                }
                ((block_start + id) as u32, val)
            })
            .collect();

        for (p, (id, val)) in block_results.into_iter().enumerate() {
            if val < best_val[p] {
                best_val[p] = val;
                best_id[p] = id;
            }
        }
        block_start = block_end;
    }

    Assignment {
        id: best_id,
        dist: best_val,
    }
}

/// Brute-force reference assignment, for equivalence testing against
/// `elkan_assign`. Ties break on lowest centroid index (scan order).
pub fn brute_force_assign<T: Scalar + Sync>(x: &[T], n: usize, d: usize, centroids: &[f32], k: usize) -> Assignment {
    let results: Vec<(u32, f32)> = (0..n)
        .into_par_iter()
        .map(|p| {
            let row = &x[p * d..(p + 1) * d];
            let mut id = 0usize;
            let mut val: f32 = l2sqr(row, &centroids[..d], d);
            for j in 1..k {
                let cj = &centroids[j * d..(j + 1) * d];
                let cand: f32 = l2sqr(row, cj, d);
                if cand < val {
                    val = cand;
                    id = j;
                }
            }
            (id as u32, val)
        })
        .collect();
    let (id, dist) = results.into_iter().unzip();
    Assignment { id, dist }
}
