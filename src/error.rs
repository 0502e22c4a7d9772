//! Crate-wide error type. Kept dependency-light (manual `Display`/`Error`
//! impls) rather than pulling in `thiserror`, matching how the rest of this
//! codec stack reports failures.

use std::fmt;

/// Everything that can go wrong building an [`crate::LrcConfig`] or driving
/// an encode/decode/rebuild.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// `globalRecoveryCount` must be at least 3 for the Cauchy submatrix
    /// construction to have a usable parity row plus at least two real
    /// columns.
    TooFewGlobalRecoveryShards,
    /// `originalCount` must be at least 1.
    TooFewOriginalShards,
    /// `originalCount` must be at most 230 (leaves room for recoveries
    /// within the 256-index wire budget).
    TooManyOriginalShards,
    /// `originalCount + totalRecoveryCount` would exceed 256, the limit
    /// imposed by the single-byte shard index.
    TooManyTotalShards,
    /// A shard buffer's payload length didn't match `blockBytes`.
    ShardSizeMismatch,
    /// `shardSize` (index byte + payload) must be at least 2.
    ShardSizeTooSmall,
    /// An empty `originals` slice was passed to `encode`.
    NullOriginalsBuffer,
    /// The caller-supplied output buffer is smaller than required.
    OutputBufferTooSmall,
    /// A shard arrived whose index doesn't correspond to any slot in the
    /// current `LrcParams` layout.
    InvalidShardIndex,
    /// During rebuild, a shard arrived for a slot that was never placed in
    /// `Request` state.
    ShardNotRequested,
    /// Two provided block records claimed the same logical grid slot
    /// inside a single CM256 sub-decode.
    DuplicateLrcIndex,
    /// The decoder or rebuilder determined that more shards are missing
    /// than its recovery capacity can ever replace; the handle should be
    /// dropped.
    Unrecoverable,
    /// A buffer allocation needed to escalate a rebuild failed.
    AllocationFailed,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::TooFewGlobalRecoveryShards => {
                write!(f, "globalRecoveryCount must be at least 3")
            }
            Error::TooFewOriginalShards => write!(f, "originalCount must be at least 1"),
            Error::TooManyOriginalShards => write!(f, "originalCount must be at most 230"),
            Error::TooManyTotalShards => {
                write!(f, "originalCount + totalRecoveryCount exceeds 256")
            }
            Error::ShardSizeMismatch => write!(f, "shard payload length does not match blockBytes"),
            Error::ShardSizeTooSmall => write!(f, "shardSize must be at least 2"),
            Error::NullOriginalsBuffer => write!(f, "no original shards were provided"),
            Error::OutputBufferTooSmall => write!(f, "output buffer is too small"),
            Error::InvalidShardIndex => write!(f, "shard index is outside the valid range"),
            Error::ShardNotRequested => write!(f, "shard was not in the requested set"),
            Error::DuplicateLrcIndex => {
                write!(f, "two block records claim the same grid slot")
            }
            Error::Unrecoverable => write!(f, "too many shards missing to recover"),
            Error::AllocationFailed => write!(f, "buffer allocation failed during rebuild"),
        }
    }
}

impl std::error::Error for Error {}
