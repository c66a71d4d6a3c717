//! Asymmetric top-k scoring (§4.4 `search`). Scores `n` entries of one
//! bucket against one query, combining a bucket-centroid term with decoded
//! residual terms looked up from a precomputed per-query table.

use idx_distance::{compute_lookuptable_ip, ip, l2sqr};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::codebook::Codebook;
use crate::codeword::{f32_tail_width, unpack_f32_tail, CodeWord};
use crate::config::Metric;
use crate::id::gen_refine_id;

#[derive(Clone, Copy, PartialEq)]
struct Scored {
    value: f32,
    id: u64,
}
impl Eq for Scored {}
impl PartialOrd for Scored {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
/// For L2 we keep the smallest `topk` scores: the heap root should be the
/// *largest* kept value (the one evicted first), so plain value ordering
/// makes `BinaryHeap`'s default max-heap behavior correct as-is.
impl Ord for Scored {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value.partial_cmp(&other.value).unwrap_or(Ordering::Equal)
    }
}

#[derive(Clone, Copy, PartialEq)]
struct ReverseScored(Scored);
impl Eq for ReverseScored {}
impl PartialOrd for ReverseScored {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
/// For IP we keep the largest `topk` scores: the heap root should be the
/// *smallest* kept value, so the ordering is reversed relative to `Scored`.
impl Ord for ReverseScored {
    fn cmp(&self, other: &Self) -> Ordering {
        other.0.value.partial_cmp(&self.0.value).unwrap_or(Ordering::Equal)
    }
}

/// The two heap variants the search routine can be closed over — a
/// min-heap (IP, descending scores kept) or max-heap (L2, ascending
/// scores kept), per §9's `C` comparator abstraction.
///
/// One `TopK` is thread-local per query (`search`'s docs, §9): a caller
/// scanning many buckets for the same query builds one `TopK` with
/// `heapify=true` on the first bucket and passes the same instance, by
/// `&mut`, to every subsequent bucket's `search` call with `heapify=false`
/// so candidates keep accumulating into the same heap instead of being
/// thrown away and rebuilt per bucket.
pub enum TopK {
    L2(BinaryHeap<Scored>, usize),
    Ip(BinaryHeap<ReverseScored>, usize),
}

impl TopK {
    pub fn new(metric: Metric, topk: usize) -> Self {
        let mut heap = match metric {
            Metric::L2 => TopK::L2(BinaryHeap::with_capacity(topk), topk),
            Metric::Ip => TopK::Ip(BinaryHeap::with_capacity(topk), topk),
        };
        heap.reset();
        heap
    }

    /// Reinitializes the heap to `topk` sentinel entries in place, keeping
    /// its metric/capacity. This is what `search`'s `heapify=true` triggers
    /// on the first bucket of a query; later buckets pass `heapify=false`
    /// and this is skipped so the heap keeps what it already holds.
    fn reset(&mut self) {
        match self {
            TopK::L2(heap, topk) => {
                *heap = (0..*topk).map(|_| Scored { value: f32::INFINITY, id: u64::MAX }).collect();
            }
            TopK::Ip(heap, topk) => {
                *heap = (0..*topk)
                    .map(|_| ReverseScored(Scored { value: f32::NEG_INFINITY, id: u64::MAX }))
                    .collect();
            }
        }
    }

    /// Offers one scored candidate; replaces the current worst kept entry
    /// if the candidate improves on it.
    fn offer(&mut self, value: f32, id: u64) {
        match self {
            TopK::L2(heap, _) => {
                if let Some(top) = heap.peek() {
                    if value < top.value {
                        heap.pop();
                        heap.push(Scored { value, id });
                    }
                }
            }
            TopK::Ip(heap, _) => {
                if let Some(top) = heap.peek() {
                    if value > top.0.value {
                        heap.pop();
                        heap.push(ReverseScored(Scored { value, id }));
                    }
                }
            }
        }
    }

    /// Drains the heap. If `reorder`, ascending for L2 / descending for IP.
    /// Called once, after the last bucket of a query has been scanned.
    pub fn finish(self, reorder: bool) -> (Vec<f32>, Vec<u64>) {
        let mut out: Vec<(f32, u64)> = match self {
            TopK::L2(heap, _) => heap.into_iter().map(|s| (s.value, s.id)).collect(),
            TopK::Ip(heap, _) => heap.into_iter().map(|s| (s.0.value, s.0.id)).collect(),
        };
        if reorder {
            out.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());
        }
        out.into_iter().unzip()
    }
}

/// Precomputed per-query lookup table: `table[i][code] = ⟨q_i, C[i,
/// code]⟩` for each subspace `i`.
pub struct PrecomputeTable {
    m: usize,
    k: usize,
    data: Vec<f32>,
}

impl PrecomputeTable {
    pub fn build(q: &[f32], codebook: &Codebook) -> Self {
        let mut data = vec![0.0f32; codebook.m * codebook.k];
        for i in 0..codebook.m {
            let q_sub = &q[i * codebook.d_sub..(i + 1) * codebook.d_sub];
            compute_lookuptable_ip(q_sub, codebook.subspace(i), &mut data[i * codebook.k..(i + 1) * codebook.k], codebook.d_sub, codebook.k);
        }
        Self { m: codebook.m, k: codebook.k, data }
    }

    fn entry(&self, subspace: usize, code: usize) -> f32 {
        self.data[subspace * self.k + code]
    }
}

/// Scores `n` codes (row-major `n × code_width`) of one bucket against one
/// query, offering every candidate into `heap`. `centroid` is that
/// bucket's centroid. `heap` is caller-owned and threaded by `&mut` across
/// every bucket scanned for the same query: pass `heapify=true` on the
/// first bucket (resets `heap` to fresh sentinels) and `heapify=false` on
/// every subsequent bucket so candidates keep accumulating into the same
/// heap. Call `heap.finish(reorder)` once, after the last bucket, to read
/// out the `(values, ids)` pairs.
#[allow(clippy::too_many_arguments)]
pub fn search<U: CodeWord>(
    heap: &mut TopK,
    table: &PrecomputeTable,
    q: &[f32],
    centroid: &[f32],
    codes: &[U],
    n: usize,
    d: usize,
    m: usize,
    metric: Metric,
    heapify: bool,
    cid: u32,
    off: u32,
    qid: u32,
) {
    if heapify {
        heap.reset();
    }
    let tail = match metric {
        Metric::L2 => f32_tail_width::<U>(),
        Metric::Ip => 0,
    };
    let code_width = m + tail;

    let term1: f32 = match metric {
        Metric::L2 => l2sqr(q, centroid, d),
        Metric::Ip => 0.0,
    };
    let qc: f32 = match metric {
        Metric::Ip => ip(q, centroid, d),
        Metric::L2 => 0.0,
    };

    for j in 0..n {
        let row = &codes[j * code_width..(j + 1) * code_width];
        let mut term3 = 0.0f32;
        for i in 0..m {
            term3 += table.entry(i, row[i].to_index());
        }

        let value = match metric {
            Metric::L2 => {
                let term2 = unpack_f32_tail::<U>(&row[m..]);
                term1 - 2.0 * term3 + term2
            }
            Metric::Ip => qc + term3,
        };

        let refine_id = gen_refine_id(cid, off + j as u32, qid);
        heap.offer(value, refine_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codebook::train;
    use crate::encode::{encode_vectors, SubspaceTriangles};
    use idx_distance::l2sqr;

    #[test]
    fn l2_search_matches_brute_force_within_tolerance() {
        let d = 8;
        let m = 4;
        let n = 64;
        let x: Vec<f32> = (0..n * d).map(|i| ((i * 13) % 9) as f32 * 0.1).collect();
        let centroids = vec![0.0f32; n * d];
        let cfg = crate::config::RpqConfig {
            m,
            nbits: 5,
            metric: Metric::L2,
            seed: 4,
            niter: 10,
        };
        let codebook = train(&x, n, d, &centroids, &cfg).unwrap();
        let triangles = SubspaceTriangles::build(&codebook);
        let codes: Vec<u8> = encode_vectors(&x, n, d, &centroids, &codebook, &triangles, Metric::L2);

        let q = vec![0.05f32; d];
        let centroid = vec![0.0f32; d];
        let table = PrecomputeTable::build(&q, &codebook);
        let mut heap = TopK::new(Metric::L2, n);
        search(&mut heap, &table, &q, &centroid, &codes, n, d, m, Metric::L2, true, 0, 0, 0);
        let (values, ids) = heap.finish(true);
        assert_eq!(values.len(), n);
        assert_eq!(ids.len(), n);
        for w in values.windows(2) {
            assert!(w[0] <= w[1] + 1e-4);
        }

        // spot-check the best match against a brute-force reconstruction
        let code_width = m + f32_tail_width::<u8>();
        let mut brute = Vec::with_capacity(n);
        for j in 0..n {
            let row = &codes[j * code_width..j * code_width + m];
            let residual = crate::encode::reconstruct(&codebook, row);
            let mut point = vec![0.0f32; d];
            for i in 0..d {
                point[i] = centroid[i] + residual[i];
            }
            let dist: f32 = l2sqr(&q, &point, d);
            brute.push(dist);
        }
        brute.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert!((values[0] - brute[0]).abs() / brute[0].max(1e-6) < 1e-2);
    }

    /// A query scanning several buckets keeps one heap alive across all of
    /// them (`heapify=true` only on the first); the accumulated top-k must
    /// match scanning every row in a single bucket call.
    #[test]
    fn accumulates_top_k_across_multiple_bucket_calls() {
        let d = 8;
        let m = 4;
        let n = 64;
        let x: Vec<f32> = (0..n * d).map(|i| ((i * 13) % 9) as f32 * 0.1).collect();
        let centroids = vec![0.0f32; n * d];
        let cfg = crate::config::RpqConfig { m, nbits: 5, metric: Metric::L2, seed: 4, niter: 10 };
        let codebook = train(&x, n, d, &centroids, &cfg).unwrap();
        let triangles = SubspaceTriangles::build(&codebook);
        let codes: Vec<u8> = encode_vectors(&x, n, d, &centroids, &codebook, &triangles, Metric::L2);

        let q = vec![0.05f32; d];
        let centroid = vec![0.0f32; d];
        let table = PrecomputeTable::build(&q, &codebook);
        let topk = 5;

        let mut single_bucket_heap = TopK::new(Metric::L2, topk);
        search(&mut single_bucket_heap, &table, &q, &centroid, &codes, n, d, m, Metric::L2, true, 0, 0, 0);
        let (single_values, _) = single_bucket_heap.finish(true);

        let code_width = m + f32_tail_width::<u8>();
        let half = n / 2;
        let first_half = &codes[..half * code_width];
        let second_half = &codes[half * code_width..];

        let mut multi_bucket_heap = TopK::new(Metric::L2, topk);
        search(&mut multi_bucket_heap, &table, &q, &centroid, first_half, half, d, m, Metric::L2, true, 0, 0, 0);
        search(&mut multi_bucket_heap, &table, &q, &centroid, second_half, half, d, m, Metric::L2, false, 1, half as u32, 0);
        let (multi_values, _) = multi_bucket_heap.finish(true);

        assert_eq!(single_values, multi_values);
    }
}
