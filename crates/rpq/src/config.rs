//! Residual product quantizer configuration.

use idx_core::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    L2,
    Ip,
}

#[derive(Debug, Clone)]
pub struct RpqConfig {
    /// Subspace count (`m`); must divide `d` evenly.
    pub m: usize,
    /// Bits per subcode; codebook size is `K = 2^nbits`, must be a
    /// multiple of 32.
    pub nbits: usize,
    pub metric: Metric,
    pub seed: u64,
    pub niter: usize,
}

impl RpqConfig {
    pub fn k(&self) -> usize {
        1 << self.nbits
    }

    pub fn d_sub(&self, d: usize) -> usize {
        d / self.m
    }

    /// Fail-fast checks from the error taxonomy that apply to R:
    /// `d mod m != 0`, `K` not a multiple of 32, `d_sub > 8`.
    pub fn validate(&self, d: usize) -> Result<(), ConfigError> {
        if d % self.m != 0 {
            return Err(ConfigError::SubspaceMismatch { d, m: self.m });
        }
        let k = self.k();
        if k % 32 != 0 {
            return Err(ConfigError::CodebookNotMultipleOf32 { k });
        }
        let d_sub = self.d_sub(d);
        if d_sub > 8 {
            return Err(ConfigError::SubspaceTooWide { d_sub });
        }
        Ok(())
    }
}
