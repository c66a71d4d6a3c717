//! Plain Lloyd k-means with k-means++/random seeding, Elkan-pruned
//! assignment, and empty-cluster repair.

mod assign;
mod centroids;
mod seed;

pub use assign::{brute_force_assign, elkan_assign, Assignment};
pub use centroids::{compute_centroids, normalize_centroids, split_clusters_half};
pub use seed::{kmeanspp_indices, uniform_indices};

use idx_core::{BuildError, DataShortage};
use idx_distance::Scalar;
use rand::rngs::SmallRng;
use rand::SeedableRng;

/// Default cutoff above which `kmeans` truncates its training set to
/// `downsample_factor * k` rows (explicit downsampling rule, preserved for
/// parity with the reference trainer rather than silently dropped). Kept
/// configurable per config field rather than a hidden constant, per the
/// reference trainer's `KMEANS_THRESHOLD` knob.
pub const LARGE_K_THRESHOLD: usize = 1000;
pub const DOWNSAMPLE_FACTOR: usize = 40;

/// Convergence tolerance on the relative change in total assignment error.
const CONVERGENCE_TOLERANCE: f32 = 0.01;

#[derive(Debug, Clone)]
pub struct KmeansConfig {
    pub kmpp: bool,
    pub avg_len: f32,
    pub niter: usize,
    pub seed: u64,
    /// `k` above which the training set is truncated (`KMEANS_THRESHOLD`
    /// in spec.md §6's config enumeration).
    pub large_k_threshold: usize,
    /// Truncated training set size is `downsample_factor * k`.
    pub downsample_factor: usize,
}

impl Default for KmeansConfig {
    fn default() -> Self {
        Self {
            kmpp: true,
            avg_len: 0.0,
            niter: 25,
            seed: 0,
            large_k_threshold: LARGE_K_THRESHOLD,
            downsample_factor: DOWNSAMPLE_FACTOR,
        }
    }
}

/// Runs Lloyd k-means to convergence (or `niter` iterations, whichever
/// comes first) and returns the trained `k * d` centroid matrix.
///
/// Pre-condition: `n >= k`. Returns `DataShortage` otherwise rather than
/// writing any centroids, matching the "emit warning, no centroids, fatal
/// for that node" handling of the DataShortage error kind.
pub fn kmeans<T: Scalar + Sync>(
    x: &[T],
    n: usize,
    d: usize,
    k: usize,
    cfg: &KmeansConfig,
) -> Result<Vec<f32>, BuildError> {
    if n < k {
        log::warn!("kmeans: only {n} rows for {k} centroids");
        return Err(BuildError::DataShortage(DataShortage { n, k }));
    }
    if n == k {
        // Every row is its own centroid; no iteration needed.
        let mut centroids = vec![0.0f32; k * d];
        for p in 0..n {
            let row = &x[p * d..(p + 1) * d];
            let out = &mut centroids[p * d..(p + 1) * d];
            for i in 0..d {
                out[i] = row[i].to_f32();
            }
        }
        return Ok(centroids);
    }

    let mut rng = SmallRng::seed_from_u64(cfg.seed);

    let cap = cfg.downsample_factor * k;
    let (train_x, train_n): (&[T], usize) = if k > cfg.large_k_threshold && n > cap {
        log::info!("kmeans: downsampling {n} rows to {cap} for k={k}");
        // caller-visible truncation: operate on the row-major prefix after a
        // seeded shuffle-free prefix selection would require an owned copy,
        // so instead we simply cap how many leading rows participate in
        // training. Rows are assumed pre-shuffled/representative by the
        // caller; see idx-cluster's sampler for the representative case.
        (&x[..cap * d], cap)
    } else {
        (x, n)
    };

    let mut centroids = vec![0.0f32; k * d];
    let seed_indices = if cfg.kmpp {
        seed::kmeanspp_indices(train_x, train_n, d, k, &mut rng)
    } else {
        seed::uniform_indices(train_n, k, &mut rng)
    };
    for (slot, &row_idx) in seed_indices.iter().enumerate() {
        let row = &train_x[row_idx * d..(row_idx + 1) * d];
        let out = &mut centroids[slot * d..(slot + 1) * d];
        for i in 0..d {
            out[i] = row[i].to_f32();
        }
    }

    let mut prev_err = f32::INFINITY;
    for iteration in 0..cfg.niter {
        let assignment = assign::elkan_assign(train_x, train_n, d, &centroids, k);
        let mut assign_u32 = assignment.id;
        let mut histogram = centroids::compute_centroids(train_x, train_n, d, &assign_u32, &mut centroids, k, cfg.avg_len);

        let splits = centroids::split_clusters_half(
            train_x,
            train_n,
            d,
            &mut centroids,
            &mut histogram,
            &mut assign_u32,
            cfg.avg_len,
            &mut rng,
        );
        if splits > 0 {
            log::debug!("kmeans: iteration {iteration} repaired {splits} empty clusters");
        }

        let err: f32 = assignment.dist.iter().sum();
        if splits == 0 {
            if prev_err.is_finite() && (err - prev_err).abs() < CONVERGENCE_TOLERANCE * prev_err {
                log::debug!("kmeans: converged at iteration {iteration}, err={err}");
                break;
            }
        }
        prev_err = err;
    }

    Ok(centroids)
}
