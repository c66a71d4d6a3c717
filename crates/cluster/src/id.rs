//! Global block id composition (§4.3.2).
//!
//! Packs the level-0 (`k1`) cluster id with a node-local monotonically
//! increasing block counter into 32 bits. Field widths are an
//! implementation choice (not specified): 12 bits for `k1_id` (up to 4096
//! top-level clusters) and 20 bits for `local_blk_num` (up to ~1M blocks
//! per top-level cluster), which comfortably covers realistic corpus
//! sizes while keeping the pair trivially recoverable.
const K1_BITS: u32 = 12;
const LOCAL_BITS: u32 = 32 - K1_BITS;
const LOCAL_MASK: u32 = (1 << LOCAL_BITS) - 1;

/// Packs `(k1_id, local_blk_num)` into a single 32-bit global block id.
pub fn gen_global_block_id(k1_id: u32, local_blk_num: u32) -> u32 {
    debug_assert!(k1_id < (1 << K1_BITS), "k1_id overflows its field width");
    debug_assert!(local_blk_num <= LOCAL_MASK, "local_blk_num overflows its field width");
    (k1_id << LOCAL_BITS) | (local_blk_num & LOCAL_MASK)
}

/// Recovers `(k1_id, local_blk_num)` from a global block id.
pub fn split_global_block_id(id: u32) -> (u32, u32) {
    (id >> LOCAL_BITS, id & LOCAL_MASK)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_unpack_roundtrips() {
        for k1 in [0u32, 1, 42, 4095] {
            for local in [0u32, 1, 17, 1_048_575] {
                let id = gen_global_block_id(k1, local);
                assert_eq!(split_global_block_id(id), (k1, local));
            }
        }
    }
}
