//! `gen_refine_id(cid, off, qid)` — a pure, reversible bit-packing helper
//! used to tag each scored result with the bucket, in-bucket offset, and
//! query it came from.
//!
//! Field widths are an implementation choice (spec leaves them open):
//! 20 bits for `cid` (up to ~1M buckets, matching the block-id range used
//! in idx-cluster), 24 bits for `off` (up to 16M rows per bucket), 20 bits
//! for `qid` (up to ~1M concurrent queries per search call) — 64 bits
//! total, returned as `u64` since a 32-bit packing cannot hold all three
//! fields at any useful width.
const CID_BITS: u32 = 20;
const OFF_BITS: u32 = 24;
const QID_BITS: u32 = 20;

const OFF_MASK: u64 = (1 << OFF_BITS) - 1;
const QID_MASK: u64 = (1 << QID_BITS) - 1;
const CID_MASK: u64 = (1 << CID_BITS) - 1;

pub fn gen_refine_id(cid: u32, off: u32, qid: u32) -> u64 {
    debug_assert!((cid as u64) <= CID_MASK);
    debug_assert!((off as u64) <= OFF_MASK);
    debug_assert!((qid as u64) <= QID_MASK);
    ((cid as u64) << (OFF_BITS + QID_BITS)) | ((off as u64) << QID_BITS) | (qid as u64)
}

pub fn split_refine_id(id: u64) -> (u32, u32, u32) {
    let qid = (id & QID_MASK) as u32;
    let off = ((id >> QID_BITS) & OFF_MASK) as u32;
    let cid = (id >> (OFF_BITS + QID_BITS)) as u32;
    (cid, off, qid)
}
