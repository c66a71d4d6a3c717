//! `merge_clusters` (§4.3.1): collapses under-occupied buckets into their
//! nearest surviving large (or middle) bucket, or into one merge centroid
//! if nothing survives.

use idx_distance::{l2sqr, Scalar};
use idx_kmeans::compute_centroids;

use crate::level::{Level, FIRST};

pub struct MergeResult {
    pub centroids: Vec<f32>,
    pub k: usize,
    pub histogram: Vec<usize>,
    pub assign: Vec<u32>,
}

/// Reclassifies the `old_k` buckets implied by `assign`/`histogram` into
/// Large / Middle / Small tiers and produces a new, denser labeling.
///
/// The "nearest surviving bucket" search for points whose bucket was
/// dropped only ever scans the large-bucket prefix of the new centroid
/// array when large buckets exist, even if middle buckets also survive —
/// this reproduces an ambiguity confirmed against the reference
/// implementation (see DESIGN.md's Open Question log) rather than quietly
/// making middle buckets reachable too.
pub fn merge_clusters<T: Scalar + Sync>(
    x: &[T],
    n: usize,
    d: usize,
    old_centroids: &[f32],
    old_k: usize,
    assign: &[u32],
    histogram: &[usize],
    level: Level,
    max_same_size_threshold: usize,
    min_same_size_threshold: usize,
    avg_len: f32,
) -> MergeResult {
    let (large_min, small_max) = if level == FIRST {
        (max_same_size_threshold, max_same_size_threshold)
    } else {
        (max_same_size_threshold, min_same_size_threshold)
    };

    // transform_table[i] = Some(new_index) for surviving buckets, None for
    // dropped ("small") ones.
    let mut transform_table: Vec<Option<usize>> = vec![None; old_k];
    let mut next_large = 0usize;
    for i in 0..old_k {
        if histogram[i] >= large_min {
            transform_table[i] = Some(next_large);
            next_large += 1;
        }
    }
    let num_large = next_large;
    let mut next_middle = num_large;
    if small_max < large_min {
        for i in 0..old_k {
            if histogram[i] >= small_max && histogram[i] < large_min {
                transform_table[i] = Some(next_middle);
                next_middle += 1;
            }
        }
    }
    let num_middle = next_middle - num_large;
    let surviving = num_large + num_middle;

    if surviving == old_k {
        // nothing dropped: pure relabeling, no nearest-bucket search needed
        let new_assign: Vec<u32> = assign
            .iter()
            .map(|&a| transform_table[a as usize].unwrap() as u32)
            .collect();
        let mut new_centroids = vec![0.0f32; surviving * d];
        let new_histogram = compute_centroids(x, n, d, &new_assign, &mut new_centroids, surviving, avg_len);
        return MergeResult {
            centroids: new_centroids,
            k: surviving,
            histogram: new_histogram,
            assign: new_assign,
        };
    }

    // Stage-1 centroid matrix: surviving old centroids copied verbatim
    // into their new slots, used only as the search target below.
    let mut stage1 = vec![0.0f32; surviving.max(1) * d];
    for i in 0..old_k {
        if let Some(new_idx) = transform_table[i] {
            stage1[new_idx * d..(new_idx + 1) * d].copy_from_slice(&old_centroids[i * d..(i + 1) * d]);
        }
    }

    let new_k = if surviving == 0 { 1 } else { surviving };
    let mut new_assign = vec![0u32; n];
    for p in 0..n {
        let old_bucket = assign[p] as usize;
        if let Some(new_idx) = transform_table[old_bucket] {
            new_assign[p] = new_idx as u32;
            continue;
        }
        let row = &x[p * d..(p + 1) * d];
        let target = if num_large > 0 {
            nearest(row, d, &stage1[..num_large * d], num_large)
        } else if num_middle > 0 {
            nearest(row, d, &stage1[..num_middle * d], num_middle)
        } else {
            0
        };
        new_assign[p] = target as u32;
    }

    let mut new_centroids = vec![0.0f32; new_k * d];
    let new_histogram = compute_centroids(x, n, d, &new_assign, &mut new_centroids, new_k, avg_len);

    MergeResult {
        centroids: new_centroids,
        k: new_k,
        histogram: new_histogram,
        assign: new_assign,
    }
}

/// Exhaustive nearest-centroid search among `count` candidates. Ties break
/// on lowest index (scan order) via strict `<`.
fn nearest<T: Scalar>(row: &[T], d: usize, candidates: &[f32], count: usize) -> usize {
    let mut best = 0usize;
    let mut best_dist: f32 = l2sqr(row, &candidates[..d], d);
    for j in 1..count {
        let cj = &candidates[j * d..(j + 1) * d];
        let dist: f32 = l2sqr(row, cj, d);
        if dist < best_dist {
            best_dist = dist;
            best = j;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_drops_small_buckets_and_reassigns() {
        // bucket 0: 10 points near 0.0 (large); bucket 1: 1 point near 100.0 (small)
        let mut x = vec![0.0f32; 10];
        x.push(100.0);
        let n = 11;
        let d = 1;
        let assign = [0u32; 11].iter().enumerate().map(|(i, _)| if i == 10 { 1 } else { 0 }).collect::<Vec<_>>();
        let histogram = [10usize, 1];
        let centroids = [0.0f32, 100.0];

        let result = merge_clusters(&x, n, d, &centroids, 2, &assign, &histogram, FIRST, 5, 0, 0.0);
        assert_eq!(result.k, 1);
        assert!(result.assign.iter().all(|&a| a == 0));
    }

    #[test]
    fn merge_noop_when_all_buckets_survive() {
        let x = vec![0.0f32, 1.0, 2.0, 3.0];
        let n = 4;
        let d = 1;
        let assign = [0u32, 0, 1, 1];
        let histogram = [2usize, 2];
        let centroids = [0.5f32, 2.5];
        let result = merge_clusters(&x, n, d, &centroids, 2, &assign, &histogram, FIRST, 1, 0, 0.0);
        assert_eq!(result.k, 2);
    }
}
