//! Input/output glue the library crates treat as an external collaborator
//! (spec.md §1's scope note): loading the raw matrix and id vector, and
//! serializing the two RPQ artifacts of §6. The bucketed block store and
//! centroid streams are written directly by `idx_cluster::Sinks`; this
//! module only adds the matrix/id loader and the two RPQ file formats,
//! plus a reader that walks the block store back out for RPQ training.

use idx_core::{BuildError, IoError};
use idx_rpq::{CodeWord, Codebook};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

fn io_err(context: &str, source: std::io::Error) -> BuildError {
    BuildError::Io(IoError { context: context.to_string(), source })
}

/// Loads a raw `u32 n | u32 d | f32[n*d]` row-major matrix. `expected_d`
/// is cross-checked against the header.
pub fn load_matrix(path: &Path, expected_d: usize) -> Result<(Vec<f32>, usize), BuildError> {
    let mut reader = BufReader::new(File::open(path).map_err(|e| io_err("open matrix file", e))?);
    let mut header = [0u8; 8];
    reader.read_exact(&mut header).map_err(|e| io_err("read matrix header", e))?;
    let n = u32::from_le_bytes(header[0..4].try_into().unwrap()) as usize;
    let d = u32::from_le_bytes(header[4..8].try_into().unwrap()) as usize;
    if d != expected_d {
        return Err(BuildError::Assertion(idx_core::Assertion {
            message: format!("matrix file dimension {d} does not match configured d {expected_d}"),
        }));
    }
    let mut bytes = vec![0u8; n * d * 4];
    reader.read_exact(&mut bytes).map_err(|e| io_err("read matrix body", e))?;
    let mut x = vec![0.0f32; n * d];
    for (slot, chunk) in x.iter_mut().zip(bytes.chunks_exact(4)) {
        *slot = f32::from_le_bytes(chunk.try_into().unwrap());
    }
    Ok((x, n))
}

/// Loads the `u32[n]` parallel id vector; length is inferred from `n`.
pub fn load_ids(path: &Path, n: usize) -> Result<Vec<u32>, BuildError> {
    let mut reader = BufReader::new(File::open(path).map_err(|e| io_err("open ids file", e))?);
    let mut bytes = vec![0u8; n * 4];
    reader.read_exact(&mut bytes).map_err(|e| io_err("read ids body", e))?;
    Ok(bytes.chunks_exact(4).map(|c| u32::from_le_bytes(c.try_into().unwrap())).collect())
}

/// One leaf block's worth of rows read back from the block store, paired
/// with the centroid of the block they came from (by block order, per
/// §5's 1:1 centroid/block pairing).
pub struct LeafRows {
    pub centroid: Vec<f32>,
    pub rows: Vec<f32>,
    pub ids: Vec<u32>,
}

/// Walks the data stream + centroid stream back out block by block. Both
/// streams were written in lockstep order by `idx_cluster`, so the `i`-th
/// block in the data stream pairs with the `i`-th `d`-float row in the
/// centroid stream.
pub fn read_blocks(data_path: &Path, centroids_path: &Path, d: usize, blk_size: usize) -> Result<Vec<LeafRows>, BuildError> {
    let data = std::fs::read(data_path).map_err(|e| io_err("read data stream", e))?;
    let centroid_bytes = std::fs::read(centroids_path).map_err(|e| io_err("read centroid stream", e))?;
    let centroid_floats: Vec<f32> = centroid_bytes.chunks_exact(4).map(|c| f32::from_le_bytes(c.try_into().unwrap())).collect();

    let num_blocks = data.len() / blk_size;
    let mut out = Vec::with_capacity(num_blocks);
    for b in 0..num_blocks {
        let block = &data[b * blk_size..(b + 1) * blk_size];
        let count = u32::from_le_bytes(block[0..4].try_into().unwrap()) as usize;
        let entry_size = d * 4 + 4;
        let mut rows = Vec::with_capacity(count * d);
        let mut ids = Vec::with_capacity(count);
        let mut offset = 4usize;
        for _ in 0..count {
            let entry = &block[offset..offset + entry_size];
            for chunk in entry[..d * 4].chunks_exact(4) {
                rows.push(f32::from_le_bytes(chunk.try_into().unwrap()));
            }
            ids.push(u32::from_le_bytes(entry[d * 4..entry_size].try_into().unwrap()));
            offset += entry_size;
        }
        let centroid = centroid_floats[b * d..(b + 1) * d].to_vec();
        out.push(LeafRows { centroid, rows, ids });
    }
    Ok(out)
}

/// Writes the RPQ codebook file: `u32 num = m*K | u32 dim = d_sub |
/// f32[m*K*d_sub] payload`, each subspace's `(K x d_sub)` matrix
/// transposed to `(d_sub x K)` on disk (one contiguous run per dimension,
/// across all K codes) rather than the encoder's native `(K x d_sub)`
/// row-major layout — the on-load transpose spec.md §6 calls out.
pub fn write_rpq_centroids(path: &Path, codebook: &Codebook) -> Result<(), BuildError> {
    let mut writer = BufWriter::new(File::create(path).map_err(|e| io_err("create rpq centroids file", e))?);
    let num = (codebook.m * codebook.k) as u32;
    let dim = codebook.d_sub as u32;
    writer.write_all(&num.to_le_bytes()).map_err(|e| io_err("write rpq centroids header", e))?;
    writer.write_all(&dim.to_le_bytes()).map_err(|e| io_err("write rpq centroids header", e))?;
    for i in 0..codebook.m {
        let subspace = codebook.subspace(i);
        for dim_idx in 0..codebook.d_sub {
            for code in 0..codebook.k {
                let v = subspace[code * codebook.d_sub + dim_idx];
                writer.write_all(&v.to_le_bytes()).map_err(|e| io_err("write rpq centroids payload", e))?;
            }
        }
    }
    Ok(())
}

/// Inverse of `write_rpq_centroids`: reads the transposed on-disk layout
/// back into the encoder-native `(m x K x d_sub)` row-major `Codebook`.
pub fn read_rpq_centroids(path: &Path, m: usize, k: usize) -> Result<Codebook, BuildError> {
    let bytes = std::fs::read(path).map_err(|e| io_err("read rpq centroids file", e))?;
    let num = u32::from_le_bytes(bytes[0..4].try_into().unwrap()) as usize;
    let d_sub = u32::from_le_bytes(bytes[4..8].try_into().unwrap()) as usize;
    if num != m * k {
        return Err(BuildError::Assertion(idx_core::Assertion {
            message: format!("rpq centroids file has num={num}, expected m*K={}", m * k),
        }));
    }
    let floats: Vec<f32> = bytes[8..].chunks_exact(4).map(|c| f32::from_le_bytes(c.try_into().unwrap())).collect();
    let mut data = vec![0.0f32; m * k * d_sub];
    let mut cursor = 0usize;
    for i in 0..m {
        for dim_idx in 0..d_sub {
            for code in 0..k {
                data[i * k * d_sub + code * d_sub + dim_idx] = floats[cursor];
                cursor += 1;
            }
        }
    }
    Ok(Codebook { m, k, d_sub, data })
}

/// Writes the RPQ codes file: `u32 n | u32 code_width | U[n*code_width]`.
pub fn write_rpq_codes<U: CodeWord>(path: &Path, n: usize, code_width: usize, codes: &[U]) -> Result<(), BuildError> {
    let mut writer = BufWriter::new(File::create(path).map_err(|e| io_err("create rpq codes file", e))?);
    writer.write_all(&(n as u32).to_le_bytes()).map_err(|e| io_err("write rpq codes header", e))?;
    writer.write_all(&(code_width as u32).to_le_bytes()).map_err(|e| io_err("write rpq codes header", e))?;
    let mut buf = Vec::with_capacity(n * code_width * U::SIZE);
    for &c in codes {
        c.write_le(&mut buf);
    }
    writer.write_all(&buf).map_err(|e| io_err("write rpq codes payload", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rpq_centroids_round_trip_transpose() {
        let m = 2;
        let k = 4;
        let d_sub = 2;
        // distinct values so a transpose bug would be caught by equality
        let data: Vec<f32> = (0..m * k * d_sub).map(|i| i as f32).collect();
        let codebook = Codebook { m, k, d_sub, data: data.clone() };

        let dir = std::env::temp_dir().join(format!("idx-build-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("rpq_centroids.bin");
        write_rpq_centroids(&path, &codebook).unwrap();
        let loaded = read_rpq_centroids(&path, m, k).unwrap();
        assert_eq!(loaded.data, data);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn matrix_round_trip() {
        let n = 3usize;
        let d = 2usize;
        let x: Vec<f32> = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let dir = std::env::temp_dir().join(format!("idx-build-test-mat-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("matrix.bin");
        {
            let mut w = BufWriter::new(File::create(&path).unwrap());
            w.write_all(&(n as u32).to_le_bytes()).unwrap();
            w.write_all(&(d as u32).to_le_bytes()).unwrap();
            for v in &x {
                w.write_all(&v.to_le_bytes()).unwrap();
            }
        }
        let (loaded, loaded_n) = load_matrix(&path, d).unwrap();
        assert_eq!(loaded_n, n);
        assert_eq!(loaded, x);
        std::fs::remove_file(&path).ok();
    }
}
