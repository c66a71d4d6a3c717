//! Fixed-size block serialization: `u32 count | count × (T[d], u32 id) |
//! zero padding`.

use idx_core::{Assertion, BuildError};
use idx_distance::Scalar;
use std::io::Write;

/// Little-endian byte packing for one element of a stored vector. Element
/// types are `f32`, `u8`, `i8` — the same trio `Scalar` covers.
pub trait Packable: Scalar {
    const SIZE: usize;
    fn pack(self, out: &mut Vec<u8>);
}

impl Packable for f32 {
    const SIZE: usize = 4;
    fn pack(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }
}
impl Packable for u8 {
    const SIZE: usize = 1;
    fn pack(self, out: &mut Vec<u8>) {
        out.push(self);
    }
}
impl Packable for i8 {
    const SIZE: usize = 1;
    fn pack(self, out: &mut Vec<u8>) {
        out.push(self as u8);
    }
}

/// Writes one block: a `u32` row count, then each row's `(vector, id)`
/// pair back to back, then zero padding out to `blk_size`. Asserts the
/// serialized payload actually fits.
pub fn write_block<T: Packable, W: Write>(
    writer: &mut W,
    rows: &[&[T]],
    ids: &[u32],
    d: usize,
    blk_size: usize,
) -> Result<(), BuildError> {
    debug_assert_eq!(rows.len(), ids.len());
    let entry_size = d * T::SIZE + 4;
    let used = 4 + rows.len() * entry_size;
    if used > blk_size {
        return Err(BuildError::Assertion(Assertion {
            message: format!(
                "block overflow: {} entries of {} bytes plus header exceed blk_size {}",
                rows.len(),
                entry_size,
                blk_size
            ),
        }));
    }

    let mut buf = Vec::with_capacity(blk_size);
    buf.extend_from_slice(&(rows.len() as u32).to_le_bytes());
    for (row, &id) in rows.iter().zip(ids.iter()) {
        for &v in row.iter() {
            v.pack(&mut buf);
        }
        buf.extend_from_slice(&id.to_le_bytes());
    }
    buf.resize(blk_size, 0);

    writer.write_all(&buf).map_err(|source| {
        BuildError::Io(idx_core::IoError {
            context: "write block".into(),
            source,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_layout_matches_contract() {
        let rows: Vec<&[f32]> = vec![&[1.0, 2.0], &[3.0, 4.0]];
        let ids = [10u32, 20u32];
        let mut out = Vec::new();
        write_block(&mut out, &rows, &ids, 2, 64).unwrap();
        assert_eq!(out.len(), 64);
        assert_eq!(u32::from_le_bytes(out[0..4].try_into().unwrap()), 2);
        let entry_size = 2 * 4 + 4;
        let tail_start = 4 + 2 * entry_size;
        assert!(out[tail_start..].iter().all(|&b| b == 0));
    }

    #[test]
    fn block_overflow_is_rejected() {
        let rows: Vec<&[f32]> = vec![&[1.0, 2.0]; 5];
        let ids = [0u32; 5];
        let mut out = Vec::new();
        assert!(write_block(&mut out, &rows, &ids, 2, 16).is_err());
    }
}
