//! CLI argument parsing and the `BuildConfig` that enumerates every field
//! of spec.md §6's "Inputs" list, validated before any work starts.

use idx_cluster::ClusterConfig;
use idx_core::ConfigError;
use idx_kmeans::KmeansConfig;
use idx_rpq::{Metric, RpqConfig};

/// Every knob spec.md §6 enumerates, gathered into one struct so it can be
/// constructed programmatically (library use) or from CLI flags (this
/// binary). `BuildConfig::validate` runs the fail-fast checks from §7's
/// error taxonomy; everything else is absorbed locally at the call site
/// that hits it (empty clusters, underpopulated training sets, ...).
#[derive(Debug, Clone)]
pub struct BuildConfig {
    pub d: usize,
    pub threshold: usize,
    pub blk_size: usize,
    pub metric: Metric,
    pub m: usize,
    pub nbits: usize,
    pub niter: usize,
    pub seed: u64,
    pub kmpp: bool,
    pub avg_len: f32,
    pub max_same_size_threshold: usize,
    pub min_same_size_threshold: usize,
    pub max_cluster_k2: usize,
    pub k2_max_points_per_centroid: usize,
    pub kmeans_threshold: usize,
    pub downsample_factor: usize,
}

impl BuildConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.cluster_config().validate::<f32>(self.d)?;
        self.rpq_config().validate(self.d)?;
        Ok(())
    }

    pub fn kmeans_config(&self) -> KmeansConfig {
        KmeansConfig {
            kmpp: self.kmpp,
            avg_len: self.avg_len,
            niter: self.niter,
            seed: self.seed,
            large_k_threshold: self.kmeans_threshold,
            downsample_factor: self.downsample_factor,
        }
    }

    pub fn cluster_config(&self) -> ClusterConfig {
        ClusterConfig {
            threshold: self.threshold,
            blk_size: self.blk_size,
            max_same_size_threshold: self.max_same_size_threshold,
            min_same_size_threshold: self.min_same_size_threshold,
            max_cluster_k2: self.max_cluster_k2,
            k2_max_points_per_centroid: self.k2_max_points_per_centroid,
            kmeans: self.kmeans_config(),
        }
    }

    pub fn rpq_config(&self) -> RpqConfig {
        RpqConfig {
            m: self.m,
            nbits: self.nbits,
            metric: self.metric,
            seed: self.seed,
            niter: self.niter,
        }
    }

    /// Top-level (`k1`) cluster count, ahead of H's own recursion. Not
    /// named as a distinct config field in spec.md §6; this pins it down
    /// by reusing H's own free-regime sizing formula (§4.3) against the
    /// full corpus size, treating the top-level split as level-`-1` of the
    /// same recursion rather than inventing a separate rule. See
    /// DESIGN.md's Open Question log.
    pub fn k1(&self, n: usize) -> usize {
        (((n as f64 / self.threshold as f64).sqrt() as usize) + 1).min(self.max_cluster_k2).max(1)
    }
}

impl From<&Cli> for BuildConfig {
    fn from(cli: &Cli) -> Self {
        Self {
            d: cli.d,
            threshold: cli.threshold,
            blk_size: cli.blk_size,
            metric: if cli.ip { Metric::Ip } else { Metric::L2 },
            m: cli.m,
            nbits: cli.nbits,
            niter: cli.niter,
            seed: cli.seed,
            kmpp: !cli.no_kmpp,
            avg_len: cli.avg_len,
            max_same_size_threshold: cli.max_same_size_threshold,
            min_same_size_threshold: cli.min_same_size_threshold,
            max_cluster_k2: cli.max_cluster_k2,
            k2_max_points_per_centroid: cli.k2_max_points_per_centroid,
            kmeans_threshold: cli.kmeans_threshold,
            downsample_factor: cli.downsample_factor,
        }
    }
}

/// `indexbuild` — offline hierarchical RPQ index builder.
///
/// Reads a raw `(n × d)` row-major `f32` matrix and a parallel `u32` id
/// vector, runs the clustering + residual product quantization pipeline,
/// and writes the four output streams of spec.md §6.
#[derive(clap::Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the input matrix: `u32 n | u32 d | f32[n*d]` row-major.
    #[arg(long)]
    pub matrix: std::path::PathBuf,
    /// Path to the parallel id vector: `u32[n]`, no header.
    #[arg(long)]
    pub ids: std::path::PathBuf,
    /// Directory the four output streams are written into.
    #[arg(long)]
    pub out_dir: std::path::PathBuf,

    /// Vector dimensionality. Must match the matrix file's header.
    #[arg(long)]
    pub d: usize,
    /// Leaf capacity in rows (`T_leaf`).
    #[arg(long, default_value_t = 256)]
    pub threshold: usize,
    /// Bytes per block (`B`).
    #[arg(long, default_value_t = 65536)]
    pub blk_size: usize,
    /// Score with inner product instead of L2.
    #[arg(long, default_value_t = false)]
    pub ip: bool,
    /// RPQ subspace count (`m`); must divide `d` evenly.
    #[arg(long, default_value_t = 8)]
    pub m: usize,
    /// RPQ bits per subcode (`K = 2^nbits`, must be a multiple of 32).
    #[arg(long, default_value_t = 8)]
    pub nbits: usize,
    /// K-means iteration cap.
    #[arg(long, default_value_t = 25)]
    pub niter: usize,
    /// Deterministic RNG seed.
    #[arg(long, default_value_t = 0)]
    pub seed: u64,
    /// Disable k-means++ seeding in favor of uniform random.
    #[arg(long, default_value_t = false)]
    pub no_kmpp: bool,
    /// Unit-norm centroid length; 0 disables normalization.
    #[arg(long, default_value_t = 0.0)]
    pub avg_len: f32,
    #[arg(long, default_value_t = 1536)]
    pub max_same_size_threshold: usize,
    #[arg(long, default_value_t = 64)]
    pub min_same_size_threshold: usize,
    #[arg(long, default_value_t = 4096)]
    pub max_cluster_k2: usize,
    #[arg(long, default_value_t = 256)]
    pub k2_max_points_per_centroid: usize,
    /// `k` above which a k-means call downsamples its training set
    /// (`KMEANS_THRESHOLD`).
    #[arg(long, default_value_t = idx_kmeans::LARGE_K_THRESHOLD)]
    pub kmeans_threshold: usize,
    /// Downsampled training-set size is `downsample_factor * k`.
    #[arg(long, default_value_t = idx_kmeans::DOWNSAMPLE_FACTOR)]
    pub downsample_factor: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> BuildConfig {
        BuildConfig {
            d: 16,
            threshold: 256,
            blk_size: 65536,
            metric: Metric::L2,
            m: 8,
            nbits: 8,
            niter: 25,
            seed: 0,
            kmpp: true,
            avg_len: 0.0,
            max_same_size_threshold: 1536,
            min_same_size_threshold: 64,
            max_cluster_k2: 4096,
            k2_max_points_per_centroid: 256,
            kmeans_threshold: 1000,
            downsample_factor: 40,
        }
    }

    #[test]
    fn well_formed_config_validates() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn subspace_mismatch_is_rejected() {
        let mut cfg = valid_config();
        cfg.m = 7; // 16 % 7 != 0
        assert!(matches!(cfg.validate(), Err(ConfigError::SubspaceMismatch { .. })));
    }

    #[test]
    fn codebook_not_multiple_of_32_is_rejected() {
        let mut cfg = valid_config();
        cfg.nbits = 3; // K = 8, not a multiple of 32
        assert!(matches!(cfg.validate(), Err(ConfigError::CodebookNotMultipleOf32 { .. })));
    }

    #[test]
    fn k1_respects_max_cluster_k2_cap() {
        let cfg = valid_config();
        assert!(cfg.k1(10_000_000) <= cfg.max_cluster_k2);
    }
}
