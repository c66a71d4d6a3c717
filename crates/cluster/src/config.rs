//! Configuration for the hierarchical balanced clusterer.

use idx_core::ConfigError;
use idx_kmeans::KmeansConfig;

#[derive(Debug, Clone)]
pub struct ClusterConfig {
    /// Target leaf capacity in rows (`T_leaf`).
    pub threshold: usize,
    /// Bytes per block (`B`).
    pub blk_size: usize,
    pub max_same_size_threshold: usize,
    pub min_same_size_threshold: usize,
    pub max_cluster_k2: usize,
    pub k2_max_points_per_centroid: usize,
    pub kmeans: KmeansConfig,
}

impl ClusterConfig {
    /// Fails fast on the config-only checks from the error taxonomy that
    /// apply to this component: a zero leaf threshold, or a block too
    /// small to hold even one entry.
    pub fn validate<T>(&self, d: usize) -> Result<(), ConfigError> {
        if self.threshold == 0 {
            return Err(ConfigError::ZeroThreshold);
        }
        let entry_size = d * std::mem::size_of::<T>() + 4;
        if self.blk_size < entry_size + 4 {
            return Err(ConfigError::BlockTooSmall {
                blk_size: self.blk_size,
                entry_size,
            });
        }
        Ok(())
    }

    /// `⌊B / (d·sizeof(T) + 4)⌋` — how many entries fit in one block.
    pub fn entries_per_block<T>(&self, d: usize) -> usize {
        self.blk_size / (d * std::mem::size_of::<T>() + 4)
    }
}
