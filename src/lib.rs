//! A Locally Repairable Code (LRC) over a Cauchy Reed-Solomon GF(256)
//! erasure code.
//!
//! Original data shards are laid out in a rectangular grid. Every row and
//! column gets its own cheap local parity (a plain XOR for rows, a
//! Cauchy-coded parity for columns), and a configurable number of global
//! Cauchy parities cover the whole original set, with one extra parity
//! covering the globals themselves. A single lost shard is usually
//! recoverable from just its row or column; rarer multi-shard losses fall
//! back to mobilizing the global parities.
//!
//! ```
//! use cauchy_lrc::LrcConfig;
//!
//! let config = LrcConfig::new(3).unwrap();
//! let shard_size = 9; // 1 index byte + 8 payload bytes
//! let originals: Vec<Vec<u8>> = (0u8..4)
//!     .map(|row| (0u8..8).map(|b| row * 0x10 + b).collect())
//!     .collect();
//! let refs: Vec<&[u8]> = originals.iter().map(|v| v.as_slice()).collect();
//!
//! let recovery = config.encode(&refs, shard_size).unwrap();
//! assert_eq!(recovery.len() % shard_size, 0);
//! ```

mod cauchy;
mod decoder;
mod encoder;
mod error;
mod gf256;
mod params;
mod rebuilder;
mod shard;

pub use decoder::{DecodeStatus, LrcDecoder};
pub use error::Error;
pub use params::LrcParams;
pub use rebuilder::{LrcRebuilder, RebuildStatus};

/// Immutable, shareable configuration: the single piece of process-wide
/// state the original library kept in a global (`globalRecoveryCount`),
/// threaded explicitly instead.
#[derive(Debug, Clone, Copy)]
pub struct LrcConfig {
    global_recovery_count: usize,
}

impl LrcConfig {
    /// `global_recovery_count` must be at least 3.
    pub fn new(global_recovery_count: usize) -> Result<LrcConfig, Error> {
        gf256::ensure_init();
        if global_recovery_count < params::MIN_GLOBAL_RECOVERY_COUNT {
            return Err(Error::TooFewGlobalRecoveryShards);
        }
        Ok(LrcConfig {
            global_recovery_count,
        })
    }

    pub fn global_recovery_count(&self) -> usize {
        self.global_recovery_count
    }

    fn params(&self, original_count: usize, shard_size: usize) -> Result<LrcParams, Error> {
        LrcParams::new(original_count, self.global_recovery_count, shard_size)
    }

    /// Encodes `originals` (each exactly `shard_size - 1` bytes) and
    /// returns every recovery shard, index-prefixed, concatenated in the
    /// order row -> column -> global -> local-of-globals.
    pub fn encode(&self, originals: &[&[u8]], shard_size: usize) -> Result<Vec<u8>, Error> {
        let params = self.params(originals.len().max(1), shard_size)?;
        encoder::encode(&params, originals)
    }

    /// Begins a bulk decode over `original_count` originals. `out_buf`
    /// must hold at least `original_count * (shard_size - 1)` bytes;
    /// recovered originals are written there directly.
    pub fn begin_decode<'out>(
        &self,
        original_count: usize,
        shard_size: usize,
        out_buf: &'out mut [u8],
    ) -> Result<LrcDecoder<'out>, Error> {
        let params = self.params(original_count, shard_size)?;
        LrcDecoder::new(params, out_buf)
    }

    /// Begins a single-shard rebuild for wire index `lost_index`.
    /// `out_buf` must hold at least `shard_size - 1` bytes.
    pub fn begin_rebuild<'out>(
        &self,
        original_count: usize,
        lost_index: usize,
        shard_size: usize,
        out_buf: &'out mut [u8],
    ) -> Result<LrcRebuilder<'out>, Error> {
        let params = self.params(original_count, shard_size)?;
        LrcRebuilder::new(params, lost_index, out_buf)
    }
}
