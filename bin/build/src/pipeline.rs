//! Wires the library crates together end to end: top-level k-means, H's
//! recursion per top-level bucket, and R's train/encode pass over the
//! resulting leaf blocks. This is the "minimum CLI needed to drive the
//! library crates end to end against an in-memory matrix" SPEC_FULL.md §6
//! describes — not a production ingestion service.

use idx_cluster::{bucket_offsets, bucket_sort_reorder, recursive_kmeans, Sinks, FIRST};
use idx_core::{Assertion, BuildError, IoError, Progress};
use idx_rpq::{encode_vectors, f32_tail_width, train, Metric, SubspaceTriangles};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use crate::config::BuildConfig;
use crate::io;

fn create(path: &Path, context: &str) -> Result<BufWriter<File>, BuildError> {
    File::create(path)
        .map(BufWriter::new)
        .map_err(|source| BuildError::Io(IoError { context: context.to_string(), source }))
}

/// Runs the full pipeline. `matrix_path`/`ids_path` are the input files
/// (§6's "Inputs"); the four output streams land in `out_dir`.
pub fn run(cfg: &BuildConfig, matrix_path: &Path, ids_path: &Path, out_dir: &Path) -> Result<(), BuildError> {
    cfg.validate()?;
    std::fs::create_dir_all(out_dir).map_err(|source| BuildError::Io(IoError { context: "create output directory".into(), source }))?;

    let (mut x, n) = io::load_matrix(matrix_path, cfg.d)?;
    let mut ids = io::load_ids(ids_path, n)?;
    log::info!("loaded matrix: n={n} d={}", cfg.d);

    let k1 = cfg.k1(n);
    log::info!("top-level k-means: k1={k1}");
    let top_centroids = idx_kmeans::kmeans(&x, n, cfg.d, k1, &cfg.kmeans_config())?;
    let top_assign = idx_kmeans::elkan_assign(&x, n, cfg.d, &top_centroids, k1);

    let histogram = bucket_sort_reorder(&mut x, &mut ids, &top_assign.id, k1, cfg.d);
    let offsets = bucket_offsets(&histogram);

    let data_path = out_dir.join("data.bin");
    let centroids_path = out_dir.join("centroids.bin");
    let centroid_ids_path = out_dir.join("centroid_ids.bin");
    {
        let mut data_file = create(&data_path, "create data stream")?;
        let mut centroids_file = create(&centroids_path, "create centroids stream")?;
        let mut centroid_ids_file = create(&centroid_ids_path, "create centroid-id stream")?;

        let progress = Progress::new("leaf clusters", k1);
        for k1_id in 0..k1 {
            let lo = offsets[k1_id];
            let hi = offsets[k1_id + 1];
            if hi == lo {
                progress.tick();
                continue;
            }
            let child_x = &mut x[lo * cfg.d..hi * cfg.d];
            let child_ids = &mut ids[lo..hi];
            let mut rng = SmallRng::seed_from_u64(cfg.seed.wrapping_add(k1_id as u64));
            let mut blk_num = 0u32;
            let mut sinks = Sinks {
                data: &mut data_file,
                centroids: &mut centroids_file,
                centroid_ids: &mut centroid_ids_file,
            };
            recursive_kmeans(k1_id as u32, child_x, child_ids, cfg.d, FIRST, &cfg.cluster_config(), &mut rng, &mut blk_num, &mut sinks)?;
            progress.tick();
        }
    }
    log::info!("wrote block store to {}", out_dir.display());

    train_and_encode_rpq(cfg, &data_path, &centroids_path, out_dir)
}

/// Reads the just-written block store back out, trains the RPQ codebook
/// on every leaf residual, encodes every row, and writes both RPQ output
/// streams. Splits the subcode storage type at `nbits <= 8` (u8) vs wider
/// (u16), per DESIGN NOTES §9's `{u8, u16}` code-word monomorphization.
fn train_and_encode_rpq(cfg: &BuildConfig, data_path: &Path, centroids_path: &Path, out_dir: &Path) -> Result<(), BuildError> {
    let leaves = io::read_blocks(data_path, centroids_path, cfg.d, cfg.blk_size)?;
    let total: usize = leaves.iter().map(|l| l.ids.len()).sum();
    if total == 0 {
        return Err(BuildError::Assertion(Assertion { message: "no rows were written to the block store".into() }));
    }

    let mut train_x = Vec::with_capacity(total * cfg.d);
    let mut sample_centroids = Vec::with_capacity(total * cfg.d);
    for leaf in &leaves {
        let rows_in_leaf = leaf.ids.len();
        train_x.extend_from_slice(&leaf.rows);
        for _ in 0..rows_in_leaf {
            sample_centroids.extend_from_slice(&leaf.centroid);
        }
    }

    let rpq_cfg = cfg.rpq_config();
    log::info!("training rpq codebook: m={} nbits={} rows={total}", rpq_cfg.m, rpq_cfg.nbits);
    let codebook = train(&train_x, total, cfg.d, &sample_centroids, &rpq_cfg)?;
    let triangles = SubspaceTriangles::build(&codebook);

    let rpq_centroids_path = out_dir.join("rpq_centroids.bin");
    let rpq_codes_path = out_dir.join("rpq_codes.bin");
    io::write_rpq_centroids(&rpq_centroids_path, &codebook)?;

    if cfg.nbits <= 8 {
        let codes: Vec<u8> = encode_vectors(&train_x, total, cfg.d, &sample_centroids, &codebook, &triangles, rpq_cfg.metric);
        let code_width = codebook.m + match rpq_cfg.metric {
            Metric::L2 => f32_tail_width::<u8>(),
            Metric::Ip => 0,
        };
        io::write_rpq_codes(&rpq_codes_path, total, code_width, &codes)?;
    } else {
        let codes: Vec<u16> = encode_vectors(&train_x, total, cfg.d, &sample_centroids, &codebook, &triangles, rpq_cfg.metric);
        let code_width = codebook.m + match rpq_cfg.metric {
            Metric::L2 => f32_tail_width::<u16>(),
            Metric::Ip => 0,
        };
        io::write_rpq_codes(&rpq_codes_path, total, code_width, &codes)?;
    }

    log::info!("wrote rpq codebook + codes to {}", out_dir.display());
    Ok(())
}
