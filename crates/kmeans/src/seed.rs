//! Initial centroid selection: uniform random or k-means++.

use idx_distance::{l2sqr, Scalar};
use rand::Rng;

/// Seeded Fisher–Yates prefix of length `k`: picks `k` distinct row indices
/// uniformly at random, without materializing a full permutation.
pub fn uniform_indices(n: usize, k: usize, rng: &mut impl Rng) -> Vec<usize> {
    let mut pool: Vec<usize> = (0..n).collect();
    for i in 0..k {
        let j = rng.random_range(i..n);
        pool.swap(i, j);
    }
    pool.truncate(k);
    pool
}

/// k-means++: first centroid uniform, each subsequent centroid sampled with
/// probability proportional to its squared distance to the nearest centroid
/// chosen so far. Linear reservoir-style scan rather than building a
/// weighted-index structure per draw.
pub fn kmeanspp_indices<T: Scalar>(x: &[T], n: usize, d: usize, k: usize, rng: &mut impl Rng) -> Vec<usize> {
    let mut chosen = Vec::with_capacity(k);
    let first = rng.random_range(0..n);
    chosen.push(first);

    let mut dist = vec![f32::INFINITY; n];
    let row = |i: usize| -> &[T] { &x[i * d..(i + 1) * d] };

    for _ in 1..k {
        let last = *chosen.last().unwrap();
        let last_row = row(last);
        for i in 0..n {
            let d2: f32 = l2sqr(row(i), last_row, d);
            if d2 < dist[i] {
                dist[i] = d2;
            }
        }
        let total: f64 = dist.iter().map(|&v| v as f64).sum();
        if total <= 0.0 {
            // degenerate: every remaining point coincides with a chosen
            // centroid; fall back to uniform pick among the untouched rows.
            let next = rng.random_range(0..n);
            chosen.push(next);
            continue;
        }
        let mut target = rng.random::<f64>() * total;
        let mut picked = n - 1;
        for i in 0..n {
            target -= dist[i] as f64;
            if target <= 0.0 {
                picked = i;
                break;
            }
        }
        chosen.push(picked);
    }
    chosen
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    #[test]
    fn uniform_indices_are_distinct() {
        let mut rng = SmallRng::seed_from_u64(7);
        let idx = uniform_indices(20, 5, &mut rng);
        assert_eq!(idx.len(), 5);
        let mut sorted = idx.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), 5);
    }

    #[test]
    fn kmeanspp_picks_k_indices_in_range() {
        let mut rng = SmallRng::seed_from_u64(11);
        let x: Vec<f32> = (0..40).map(|i| i as f32).collect();
        let idx = kmeanspp_indices(&x, 20, 2, 4, &mut rng);
        assert_eq!(idx.len(), 4);
        assert!(idx.iter().all(|&i| i < 20));
    }
}
