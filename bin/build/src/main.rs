//! `indexbuild` — CLI entry point wiring kmeans → cluster → rpq against an
//! in-memory matrix, per SPEC_FULL.md §0.

mod config;
mod io;
mod pipeline;

use clap::Parser;
use config::{BuildConfig, Cli};

fn main() -> anyhow::Result<()> {
    idx_core::init_logging()?;
    let cli = Cli::parse();
    let cfg = BuildConfig::from(&cli);

    cfg.validate().map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;
    log::info!("starting index build: d={} threshold={} blk_size={}", cfg.d, cfg.threshold, cfg.blk_size);

    pipeline::run(&cfg, &cli.matrix, &cli.ids, &cli.out_dir)
        .map_err(|e| anyhow::anyhow!("index build failed: {e}"))?;

    log::info!("index build complete");
    Ok(())
}
