//! Shared type aliases, error taxonomy, and runtime bootstrap for the
//! index builder workspace.
#![allow(dead_code)]

use std::fmt;

// ============================================================================
// TYPE ALIASES
// ============================================================================
/// Distance values, convergence thresholds, and smoothing terms.
pub type Energy = f32;
/// Row/column counts, cluster sizes, histogram entries.
pub type Count = usize;
/// 32-bit identifier carried alongside every vector row.
pub type RowId = u32;
/// Global block identifier: `(k1_id, local_blk_num)` packed into 32 bits.
pub type BlockId = u32;

// ============================================================================
// ERROR TAXONOMY
// ============================================================================
/// Configuration is rejected before any work starts.
///
/// Mirrors the "fail fast" row of the error taxonomy: every variant here is
/// checkable from config alone, with no data dependency.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// `d mod m != 0` — dimension does not divide evenly into subspaces.
    SubspaceMismatch { d: usize, m: usize },
    /// Codebook size `K = 2^nbits` is not a multiple of 32.
    CodebookNotMultipleOf32 { k: usize },
    /// `d_sub > 8`.
    SubspaceTooWide { d_sub: usize },
    /// Leaf capacity of zero can never be satisfied.
    ZeroThreshold,
    /// `blk_size` cannot hold even one entry given `d` and element size.
    BlockTooSmall { blk_size: usize, entry_size: usize },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::SubspaceMismatch { d, m } => {
                write!(f, "dimension {d} is not divisible by subspace count {m}")
            }
            ConfigError::CodebookNotMultipleOf32 { k } => {
                write!(f, "codebook size {k} is not a multiple of 32")
            }
            ConfigError::SubspaceTooWide { d_sub } => {
                write!(f, "subspace width {d_sub} exceeds the maximum of 8")
            }
            ConfigError::ZeroThreshold => write!(f, "leaf capacity threshold must be nonzero"),
            ConfigError::BlockTooSmall { blk_size, entry_size } => write!(
                f,
                "block size {blk_size} cannot hold a single entry of {entry_size} bytes"
            ),
        }
    }
}
impl std::error::Error for ConfigError {}

/// A k-means call was given fewer rows than requested centroids.
#[derive(Debug, Clone, PartialEq)]
pub struct DataShortage {
    pub n: usize,
    pub k: usize,
}
impl fmt::Display for DataShortage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "only {} rows available for {} requested centroids",
            self.n, self.k
        )
    }
}
impl std::error::Error for DataShortage {}

/// Fatal IO failure: any write failure aborts the job.
#[derive(Debug)]
pub struct IoError {
    pub context: String,
    pub source: std::io::Error,
}
impl fmt::Display for IoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.context, self.source)
    }
}
impl std::error::Error for IoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// An internal invariant was violated; always a programmer error.
#[derive(Debug, Clone, PartialEq)]
pub struct Assertion {
    pub message: String,
}
impl fmt::Display for Assertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invariant violated: {}", self.message)
    }
}
impl std::error::Error for Assertion {}

/// Top-level error union for anything that can abort the build.
#[derive(Debug)]
pub enum BuildError {
    Config(ConfigError),
    Io(IoError),
    Assertion(Assertion),
    DataShortage(DataShortage),
}
impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::Config(e) => write!(f, "{e}"),
            BuildError::Io(e) => write!(f, "{e}"),
            BuildError::Assertion(e) => write!(f, "{e}"),
            BuildError::DataShortage(e) => write!(f, "{e}"),
        }
    }
}
impl std::error::Error for BuildError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BuildError::Config(e) => Some(e),
            BuildError::Io(e) => Some(e),
            BuildError::Assertion(e) => Some(e),
            BuildError::DataShortage(e) => Some(e),
        }
    }
}
impl From<ConfigError> for BuildError {
    fn from(e: ConfigError) -> Self {
        BuildError::Config(e)
    }
}
impl From<Assertion> for BuildError {
    fn from(e: Assertion) -> Self {
        BuildError::Assertion(e)
    }
}
impl From<DataShortage> for BuildError {
    fn from(e: DataShortage) -> Self {
        BuildError::DataShortage(e)
    }
}

// ============================================================================
// RUNTIME UTILITIES
// ============================================================================
/// Initialize dual logging (terminal + file) with a timestamped log file
/// under `logs/`. File sink at DEBUG, terminal sink at INFO.
pub fn init_logging() -> Result<(), BuildError> {
    std::fs::create_dir_all("logs").map_err(|source| {
        BuildError::Io(IoError {
            context: "create logs directory".into(),
            source,
        })
    })?;
    let config = simplelog::ConfigBuilder::new()
        .set_location_level(log::LevelFilter::Off)
        .set_target_level(log::LevelFilter::Off)
        .set_thread_level(log::LevelFilter::Off)
        .build();
    let time = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("time moves slow")
        .as_secs();
    let file = std::fs::File::create(format!("logs/{time}.log")).map_err(|source| {
        BuildError::Io(IoError {
            context: "create log file".into(),
            source,
        })
    })?;
    let file_logger = simplelog::WriteLogger::new(log::LevelFilter::Debug, config.clone(), file);
    let term_logger = simplelog::TermLogger::new(
        log::LevelFilter::Info,
        config,
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    );
    simplelog::CombinedLogger::init(vec![term_logger, file_logger]).map_err(|e| {
        BuildError::Assertion(Assertion {
            message: format!("logger already initialized: {e}"),
        })
    })
}

/// Aligned progress ticker for long-running batch stages. Logs at INFO
/// every `step` completions rather than on every row.
pub struct Progress {
    label: &'static str,
    total: usize,
    step: usize,
    done: std::sync::atomic::AtomicUsize,
}

impl Progress {
    pub fn new(label: &'static str, total: usize) -> Self {
        let step = (total / 20).max(1);
        Self {
            label,
            total,
            step,
            done: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Record one unit of work completed. Safe to call from any thread.
    pub fn tick(&self) {
        let n = self
            .done
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed)
            + 1;
        if n % self.step == 0 || n == self.total {
            log::info!("{:<24} {:>8}/{:<8}", self.label, n, self.total);
        }
    }
}
