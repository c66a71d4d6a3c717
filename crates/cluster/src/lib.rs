//! Hierarchical balanced clustering (component H): recursively partitions
//! a corpus, reusing K at each node, until every leaf fits one block; at
//! the terminal level an equal-size variant packs vectors into fixed-size
//! blocks.

mod block;
mod config;
mod id;
mod level;
mod merge;
mod reorder;
mod same_size;

pub use block::{write_block, Packable};
pub use config::ClusterConfig;
pub use id::{gen_global_block_id, split_global_block_id};
pub use level::{Level, BALANCE, FIRST, SECOND, THIRD};
pub use merge::{merge_clusters, MergeResult};
pub use reorder::{bucket_offsets, bucket_sort_reorder};
pub use same_size::{same_size_kmeans, PackingResult};

use idx_core::BuildError;
use idx_kmeans::uniform_indices;
use rand::rngs::SmallRng;
use std::io::Write;

/// The three append-only output streams a node writes into as it emits
/// leaf blocks: data, centroids, and centroid ids, kept in lockstep order
/// per §5's ordering guarantees.
pub struct Sinks<'a> {
    pub data: &'a mut dyn Write,
    pub centroids: &'a mut dyn Write,
    pub centroid_ids: &'a mut dyn Write,
}

fn histogram_of(assign: &[u32], k: usize) -> Vec<usize> {
    let mut histogram = vec![0usize; k];
    for &a in assign {
        histogram[a as usize] += 1;
    }
    histogram
}

/// Deterministic seeded sample of `take` distinct row indices out of `n`,
/// used both for free-regime training downsampling and for the `k > 1000`
/// rule in K.
fn sample_indices(n: usize, take: usize, rng: &mut SmallRng) -> Vec<usize> {
    uniform_indices(n, take.min(n), rng)
}

fn write_leaf_block<T: Packable>(
    k1_id: u32,
    rows: &[T],
    ids: &[u32],
    d: usize,
    centroid: &[f32],
    blk_size: usize,
    blk_num: &mut u32,
    sinks: &mut Sinks,
) -> Result<(), BuildError> {
    let row_refs: Vec<&[T]> = (0..ids.len()).map(|p| &rows[p * d..(p + 1) * d]).collect();
    block::write_block(sinks.data, &row_refs, ids, d, blk_size)?;
    for &v in centroid {
        sinks
            .centroids
            .write_all(&v.to_le_bytes())
            .map_err(|source| BuildError::Io(idx_core::IoError { context: "write centroid".into(), source }))?;
    }
    let global_id = id::gen_global_block_id(k1_id, *blk_num);
    sinks
        .centroid_ids
        .write_all(&global_id.to_le_bytes())
        .map_err(|source| BuildError::Io(idx_core::IoError { context: "write centroid id".into(), source }))?;
    *blk_num += 1;
    Ok(())
}

fn write_same_size_leaves<T: Packable>(
    k1_id: u32,
    x_view: &[T],
    ids_view: &[u32],
    d: usize,
    packing: &PackingResult,
    blk_size: usize,
    blk_num: &mut u32,
    sinks: &mut Sinks,
) -> Result<(), BuildError> {
    for (b, members) in packing.buckets.iter().enumerate() {
        let rows: Vec<&[T]> = members.iter().map(|&p| &x_view[p * d..(p + 1) * d]).collect();
        let ids: Vec<u32> = members.iter().map(|&p| ids_view[p]).collect();
        block::write_block(sinks.data, &rows, &ids, d, blk_size)?;
        let centroid = &packing.centroids[b * d..(b + 1) * d];
        for &v in centroid {
            sinks
                .centroids
                .write_all(&v.to_le_bytes())
                .map_err(|source| BuildError::Io(idx_core::IoError { context: "write centroid".into(), source }))?;
        }
        let global_id = id::gen_global_block_id(k1_id, *blk_num);
        sinks
            .centroid_ids
            .write_all(&global_id.to_le_bytes())
            .map_err(|source| BuildError::Io(idx_core::IoError { context: "write centroid id".into(), source }))?;
        *blk_num += 1;
    }
    Ok(())
}

/// Recursively partitions `(x_view, ids_view)` — a working view already
/// scoped to one top-level (`k1_id`) cluster — until every leaf fits one
/// block. Reorders both views in place.
pub fn recursive_kmeans<T: Packable + Sync>(
    k1_id: u32,
    x_view: &mut [T],
    ids_view: &mut [u32],
    d: usize,
    level: Level,
    cfg: &ClusterConfig,
    rng: &mut SmallRng,
    blk_num: &mut u32,
    sinks: &mut Sinks,
) -> Result<(), BuildError> {
    let size = ids_view.len();
    let entry_num = cfg.entries_per_block::<T>(d);

    if level::is_balanced_regime(level, size, cfg.min_same_size_threshold, cfg.max_same_size_threshold) {
        let k2 = ((size + cfg.threshold - 1) / cfg.threshold).max(1);
        let packing = same_size::same_size_kmeans(x_view, size, d, k2, &cfg.kmeans, entry_num);
        write_same_size_leaves(k1_id, x_view, ids_view, d, &packing, cfg.blk_size, blk_num, sinks)?;
        return Ok(());
    }

    let k2 = (((size as f64 / cfg.threshold as f64).sqrt() as usize) + 1).min(cfg.max_cluster_k2).max(1);

    let train_cap = k2 * cfg.k2_max_points_per_centroid;
    let (train_x, train_n): (Vec<T>, usize) = if size > train_cap && train_cap > 0 {
        let idx = sample_indices(size, train_cap, rng);
        let mut buf = Vec::with_capacity(idx.len() * d);
        for &i in &idx {
            buf.extend_from_slice(&x_view[i * d..(i + 1) * d]);
        }
        let n = idx.len();
        (buf, n)
    } else {
        (x_view.to_vec(), size)
    };

    let centroids = idx_kmeans::kmeans(&train_x, train_n, d, k2, &cfg.kmeans)?;
    let assignment = idx_kmeans::elkan_assign(x_view, size, d, &centroids, k2);
    let histogram = histogram_of(&assignment.id, k2);

    let merged = merge::merge_clusters(
        x_view,
        size,
        d,
        &centroids,
        k2,
        &assignment.id,
        &histogram,
        level,
        cfg.max_same_size_threshold,
        cfg.min_same_size_threshold,
        cfg.kmeans.avg_len,
    );

    let child_histogram = reorder::bucket_sort_reorder(x_view, ids_view, &merged.assign, merged.k, d);
    let offsets = reorder::bucket_offsets(&child_histogram);

    for b in 0..merged.k {
        let lo = offsets[b];
        let hi = offsets[b + 1];
        let child_size = hi - lo;
        if child_size == 0 {
            continue;
        }
        let child_x = &mut x_view[lo * d..hi * d];
        let child_ids = &mut ids_view[lo..hi];
        if child_size <= cfg.threshold {
            write_leaf_block(
                k1_id,
                child_x,
                child_ids,
                d,
                &merged.centroids[b * d..(b + 1) * d],
                cfg.blk_size,
                blk_num,
                sinks,
            )?;
        } else {
            recursive_kmeans(k1_id, child_x, child_ids, d, level + 1, cfg, rng, blk_num, sinks)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use idx_kmeans::KmeansConfig;
    use rand::SeedableRng;

    fn test_config() -> ClusterConfig {
        ClusterConfig {
            threshold: 4,
            blk_size: 4 + 4 * (2 * 4 + 4), // header + 4 entries of d=2 f32 rows
            max_same_size_threshold: 6,
            min_same_size_threshold: 2,
            max_cluster_k2: 16,
            k2_max_points_per_centroid: 256,
            kmeans: KmeansConfig {
                kmpp: false,
                avg_len: 0.0,
                niter: 20,
                seed: 1,
                ..KmeansConfig::default()
            },
        }
    }

    #[test]
    fn tiny_deterministic_partition_produces_two_leaf_blocks() {
        let mut x: Vec<f32> = vec![
            0.0, 0.0, 0.0, 1.0, 1.0, 0.0, 1.0, 1.0, 10.0, 10.0, 10.0, 11.0, 11.0, 10.0, 11.0, 11.0,
        ];
        let mut ids: Vec<u32> = (0..8).collect();
        let cfg = test_config();
        let mut rng = SmallRng::seed_from_u64(1);
        let mut blk_num = 0u32;
        let mut data = Vec::new();
        let mut centroids = Vec::new();
        let mut centroid_ids = Vec::new();
        let mut sinks = Sinks {
            data: &mut data,
            centroids: &mut centroids,
            centroid_ids: &mut centroid_ids,
        };
        recursive_kmeans(0, &mut x, &mut ids, 2, FIRST, &cfg, &mut rng, &mut blk_num, &mut sinks).unwrap();
        assert_eq!(blk_num, 2);
        assert_eq!(data.len(), 2 * cfg.blk_size);

        let mut seen: Vec<u32> = Vec::new();
        for block in data.chunks(cfg.blk_size) {
            let count = u32::from_le_bytes(block[0..4].try_into().unwrap());
            let mut offset = 4usize;
            for _ in 0..count {
                offset += 2 * 4;
                let id = u32::from_le_bytes(block[offset..offset + 4].try_into().unwrap());
                seen.push(id);
                offset += 4;
            }
        }
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2, 3, 4, 5, 6, 7]);
    }
}
