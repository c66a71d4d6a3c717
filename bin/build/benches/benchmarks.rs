criterion::criterion_main!(benches);
criterion::criterion_group! {
    name = benches;
    config = criterion::Criterion::default()
        .without_plots()
        .noise_threshold(3.0)
        .significance_level(0.01)
        .sample_size(10)
        .measurement_time(std::time::Duration::from_secs(1));
    targets =
        assigning_elkan_pruned_centroids,
        assigning_brute_force_centroids,
        encoding_rpq_vectors,
}

const D: usize = 32;
const N: usize = 4_000;
const K: usize = 64;

fn synthetic_rows(n: usize, d: usize, seed: u64) -> Vec<f32> {
    use rand::Rng;
    use rand::SeedableRng;
    let mut rng = rand::rngs::SmallRng::seed_from_u64(seed);
    (0..n * d).map(|_| rng.random_range(-1.0f32..1.0)).collect()
}

fn assigning_elkan_pruned_centroids(c: &mut criterion::Criterion) {
    let x = synthetic_rows(N, D, 1);
    let cfg = idx_kmeans::KmeansConfig { kmpp: true, avg_len: 0.0, niter: 1, seed: 2, ..idx_kmeans::KmeansConfig::default() };
    let centroids = idx_kmeans::kmeans(&x, N, D, K, &cfg).expect("trained centroids");

    c.bench_function("elkan-assign 4000 rows to 64 centroids", |b| {
        b.iter(|| idx_kmeans::elkan_assign(&x, N, D, &centroids, K))
    });
}

fn assigning_brute_force_centroids(c: &mut criterion::Criterion) {
    let x = synthetic_rows(N, D, 1);
    let cfg = idx_kmeans::KmeansConfig { kmpp: true, avg_len: 0.0, niter: 1, seed: 2, ..idx_kmeans::KmeansConfig::default() };
    let centroids = idx_kmeans::kmeans(&x, N, D, K, &cfg).expect("trained centroids");

    c.bench_function("brute-force-assign 4000 rows to 64 centroids (baseline)", |b| {
        b.iter(|| idx_kmeans::brute_force_assign(&x, N, D, &centroids, K))
    });
}

fn encoding_rpq_vectors(c: &mut criterion::Criterion) {
    let x = synthetic_rows(N, D, 3);
    let sample_centroids = synthetic_rows(N, D, 4);
    let rpq_cfg = idx_rpq::RpqConfig { m: 8, nbits: 8, metric: idx_rpq::Metric::L2, seed: 5, niter: 5 };
    let codebook = idx_rpq::train(&x, N, D, &sample_centroids, &rpq_cfg).expect("trained codebook");
    let triangles = idx_rpq::SubspaceTriangles::build(&codebook);

    c.bench_function("encode 4000 residual vectors against an 8x256 rpq codebook", |b| {
        b.iter(|| -> Vec<u8> { idx_rpq::encode_vectors(&x, N, D, &sample_centroids, &codebook, &triangles, rpq_cfg.metric) })
    });
}
