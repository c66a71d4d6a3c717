//! Per-subspace codebook training (§4.4 `train`).

use idx_core::BuildError;
use idx_distance::{compute_residual, Scalar};
use idx_kmeans::KmeansConfig;

use crate::config::RpqConfig;

/// Trained sub-centroids: row-major `(m × K × d_sub)` f32.
pub struct Codebook {
    pub m: usize,
    pub k: usize,
    pub d_sub: usize,
    pub data: Vec<f32>,
}

impl Codebook {
    pub fn subspace(&self, i: usize) -> &[f32] {
        let span = self.k * self.d_sub;
        &self.data[i * span..(i + 1) * span]
    }

    pub fn sub_centroid(&self, i: usize, code: usize) -> &[f32] {
        let span = self.k * self.d_sub;
        let base = i * span + code * self.d_sub;
        &self.data[base..base + self.d_sub]
    }
}

/// Deduplicates residual rows by exact byte equality, preserving the first
/// occurrence of each distinct value (linear scan, as in the reference
/// trainer — training sets here are bounded samples, not the full corpus).
fn dedup_residuals(residuals: &[f32], n: usize, d_sub: usize) -> Vec<f32> {
    let mut kept: Vec<&[f32]> = Vec::new();
    'rows: for j in 0..n {
        let row = &residuals[j * d_sub..(j + 1) * d_sub];
        for prior in &kept {
            if *prior == row {
                continue 'rows;
            }
        }
        kept.push(row);
    }
    kept.into_iter().flatten().copied().collect()
}

/// Trains one codebook for every subspace. `sample_centroids` is row-major
/// `(n × d)`, the bucket centroid each training row will be encoded
/// against.
pub fn train<T: Scalar + Sync>(
    x: &[T],
    n: usize,
    d: usize,
    sample_centroids: &[f32],
    cfg: &RpqConfig,
) -> Result<Codebook, BuildError> {
    cfg.validate(d)?;
    let d_sub = cfg.d_sub(d);
    let k = cfg.k();
    let mut data = vec![0.0f32; cfg.m * k * d_sub];

    for i in 0..cfg.m {
        let mut residuals = vec![0.0f32; n * d_sub];
        for j in 0..n {
            let row = &x[j * d..(j + 1) * d];
            let centroid_row = &sample_centroids[j * d..(j + 1) * d];
            let sub_x = &row[i * d_sub..(i + 1) * d_sub];
            let sub_c = &centroid_row[i * d_sub..(i + 1) * d_sub];
            compute_residual(sub_x, sub_c, &mut residuals[j * d_sub..(j + 1) * d_sub], d_sub);
        }

        let deduped = dedup_residuals(&residuals, n, d_sub);
        let deduped_n = deduped.len() / d_sub;

        let kmeans_cfg = KmeansConfig {
            kmpp: true,
            avg_len: 0.0,
            niter: cfg.niter,
            seed: cfg.seed.wrapping_add(i as u64),
            ..KmeansConfig::default()
        };
        let sub_centroids = idx_kmeans::kmeans(&deduped, deduped_n, d_sub, k, &kmeans_cfg)?;
        data[i * k * d_sub..(i + 1) * k * d_sub].copy_from_slice(&sub_centroids);
    }

    Ok(Codebook { m: cfg.m, k, d_sub, data })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_preserves_first_occurrence_only() {
        let residuals = vec![1.0f32, 2.0, 1.0, 2.0, 3.0, 4.0];
        let deduped = dedup_residuals(&residuals, 3, 2);
        assert_eq!(deduped, vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn train_produces_expected_shape() {
        let d = 8;
        let m = 4;
        let d_sub = 2;
        let n = 64;
        let x: Vec<f32> = (0..n * d).map(|i| (i % 7) as f32).collect();
        let centroids = vec![0.0f32; n * d];
        let cfg = RpqConfig {
            m,
            nbits: 5, // K=32, a multiple of 32
            metric: crate::config::Metric::L2,
            seed: 1,
            niter: 5,
        };
        let codebook = train(&x, n, d, &centroids, &cfg).unwrap();
        assert_eq!(codebook.m, m);
        assert_eq!(codebook.d_sub, d_sub);
        assert_eq!(codebook.data.len(), m * cfg.k() * d_sub);
    }
}
