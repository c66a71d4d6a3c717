//! Residual product quantization: per-subspace codebook training,
//! encoding against a sample centroid, and asymmetric top-k search over
//! the resulting codes.

mod codebook;
mod codeword;
mod config;
mod encode;
mod id;
mod search;

pub use codebook::{train, Codebook};
pub use codeword::{f32_tail_width, pack_f32_tail, unpack_f32_tail, CodeWord};
pub use config::{Metric, RpqConfig};
pub use encode::{encode_vectors, reconstruct, SubspaceTriangles};
pub use id::{gen_refine_id, split_refine_id};
pub use search::{search, PrecomputeTable, TopK};
