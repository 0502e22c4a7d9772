//! Derivation of the LRC grid/index-space layout from `originalCount` and
//! the configured `globalRecoveryCount`.

use crate::error::Error;

/// Minimum allowed `originalCount`.
pub const MIN_ORIGINAL_COUNT: usize = 1;
/// Maximum allowed `originalCount` — leaves index space for recoveries
/// within the single-byte wire index.
pub const MAX_ORIGINAL_COUNT: usize = 230;
/// Minimum allowed `globalRecoveryCount`: needs at least a parity row plus
/// two real columns in the Cauchy submatrix.
pub const MIN_GLOBAL_RECOVERY_COUNT: usize = 3;
/// Total wire-index budget (single byte).
pub const MAX_TOTAL_SHARDS: usize = 256;

/// Immutable, derived layout of one LRC geometry. Produced once per
/// encode/decode/rebuild and never mutated afterward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LrcParams {
    pub original_count: usize,
    pub hor_local_count: usize,
    pub ver_local_count: usize,
    pub total_original_count: usize,
    pub global_recovery_count: usize,
    pub first_hor_recovery_index: usize,
    pub first_ver_recovery_index: usize,
    pub first_global_recovery_index: usize,
    pub local_recovery_of_global_recovery_index: usize,
    pub total_recovery_count: usize,
    pub block_bytes: usize,
}

/// `horLocalCount = 8` once `originalCount >= 64`, else `floor(sqrt(originalCount))`.
fn hor_local_count(original_count: usize) -> usize {
    if original_count >= 64 {
        8
    } else {
        (original_count as f64).sqrt().floor() as usize
    }
}

impl LrcParams {
    pub fn new(
        original_count: usize,
        global_recovery_count: usize,
        shard_size: usize,
    ) -> Result<LrcParams, Error> {
        if original_count < MIN_ORIGINAL_COUNT {
            return Err(Error::TooFewOriginalShards);
        }
        if original_count > MAX_ORIGINAL_COUNT {
            return Err(Error::TooManyOriginalShards);
        }
        if global_recovery_count < MIN_GLOBAL_RECOVERY_COUNT {
            return Err(Error::TooFewGlobalRecoveryShards);
        }
        if shard_size < 2 {
            return Err(Error::ShardSizeTooSmall);
        }

        let hor_local_count = hor_local_count(original_count).max(1);
        let ver_local_count = (original_count + hor_local_count - 1) / hor_local_count;
        let total_original_count = hor_local_count * ver_local_count;

        let first_hor_recovery_index = 0usize;
        let first_ver_recovery_index = ver_local_count;
        let first_global_recovery_index = ver_local_count + hor_local_count;
        let local_recovery_of_global_recovery_index =
            first_global_recovery_index + global_recovery_count;
        let total_recovery_count = local_recovery_of_global_recovery_index + 1;

        if original_count + total_recovery_count > MAX_TOTAL_SHARDS {
            return Err(Error::TooManyTotalShards);
        }

        Ok(LrcParams {
            original_count,
            hor_local_count,
            ver_local_count,
            total_original_count,
            global_recovery_count,
            first_hor_recovery_index,
            first_ver_recovery_index,
            first_global_recovery_index,
            local_recovery_of_global_recovery_index,
            total_recovery_count,
            block_bytes: shard_size - 1,
        })
    }

    /// Row (`y`) and column (`x`) of linear grid index `i = y*horLocalCount + x`.
    #[inline]
    pub fn grid_pos(&self, i: usize) -> (usize, usize) {
        (i / self.hor_local_count, i % self.hor_local_count)
    }

    #[inline]
    pub fn linear_index(&self, x: usize, y: usize) -> usize {
        y * self.hor_local_count + x
    }

    /// `true` if grid slot `i` is an implicit zero pad cell (beyond the real
    /// originals but within the rectangular grid).
    #[inline]
    pub fn is_pad_cell(&self, i: usize) -> bool {
        i >= self.original_count && i < self.total_original_count
    }

    /// Wire index of the row parity for row `y`.
    #[inline]
    pub fn row_parity_index(&self, y: usize) -> usize {
        self.original_count + self.first_hor_recovery_index + y
    }

    /// Wire index of the column parity for column `x`.
    #[inline]
    pub fn col_parity_index(&self, x: usize) -> usize {
        self.original_count + self.first_ver_recovery_index + x
    }

    /// Wire index of global parity `i` (`0..globalRecoveryCount`).
    #[inline]
    pub fn global_index(&self, i: usize) -> usize {
        self.original_count + self.first_global_recovery_index + i
    }

    /// Wire index of the local-of-globals parity.
    #[inline]
    pub fn local_of_globals_index(&self) -> usize {
        self.original_count + self.local_recovery_of_global_recovery_index
    }

    /// Decode row for the horizontal (row) parity.
    #[inline]
    pub fn hor_decode_row(&self) -> u8 {
        self.total_original_count as u8
    }

    /// Decode row for the vertical (column) parity.
    #[inline]
    pub fn ver_decode_row(&self) -> u8 {
        (self.total_original_count + 1) as u8
    }

    /// Decode row for global parity `i`.
    #[inline]
    pub fn global_decode_row(&self, i: usize) -> u8 {
        (self.total_original_count + i + 2) as u8
    }

    /// Classifies a wire `shard_index` into logical grid position info.
    pub fn classify(&self, shard_index: usize) -> Option<ShardClass> {
        if shard_index < self.original_count {
            let (y, x) = self.grid_pos(shard_index);
            return Some(ShardClass::Original { i: shard_index, x, y });
        }
        let rel = shard_index.checked_sub(self.original_count)?;
        if rel >= self.total_recovery_count {
            return None;
        }
        if rel < self.first_ver_recovery_index {
            Some(ShardClass::RowParity { y: rel })
        } else if rel < self.first_global_recovery_index {
            Some(ShardClass::ColParity {
                x: rel - self.first_ver_recovery_index,
            })
        } else if rel < self.local_recovery_of_global_recovery_index {
            Some(ShardClass::Global {
                i: rel - self.first_global_recovery_index,
            })
        } else {
            Some(ShardClass::LocalOfGlobals)
        }
    }
}

/// The logical class a wire index belongs to, per [`LrcParams::classify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShardClass {
    Original { i: usize, x: usize, y: usize },
    RowParity { y: usize },
    ColParity { x: usize },
    Global { i: usize },
    LocalOfGlobals,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_scenario_one() {
        let p = LrcParams::new(4, 3, 9).unwrap();
        assert_eq!(p.hor_local_count, 2);
        assert_eq!(p.ver_local_count, 2);
        assert_eq!(p.total_original_count, 4);
        assert_eq!(p.first_hor_recovery_index, 0);
        assert_eq!(p.first_ver_recovery_index, 2);
        assert_eq!(p.first_global_recovery_index, 4);
        assert_eq!(p.local_recovery_of_global_recovery_index, 7);
        assert_eq!(p.total_recovery_count, 8);
    }

    #[test]
    fn large_grid_uses_fixed_hor_local_count() {
        let p = LrcParams::new(110, 10, 16385).unwrap();
        assert_eq!(p.hor_local_count, 8);
        assert_eq!(p.ver_local_count, 14);
        assert_eq!(p.total_original_count, 112);
        assert_eq!(p.row_parity_index(0), 110);
    }

    #[test]
    fn rejects_bad_params() {
        assert_eq!(
            LrcParams::new(0, 10, 9).unwrap_err(),
            Error::TooFewOriginalShards
        );
        assert_eq!(
            LrcParams::new(231, 10, 9).unwrap_err(),
            Error::TooManyOriginalShards
        );
        assert_eq!(
            LrcParams::new(4, 2, 9).unwrap_err(),
            Error::TooFewGlobalRecoveryShards
        );
        assert_eq!(
            LrcParams::new(4, 3, 1).unwrap_err(),
            Error::ShardSizeTooSmall
        );
    }

    #[test]
    fn classify_matches_layout() {
        let p = LrcParams::new(4, 3, 9).unwrap();
        assert_eq!(
            p.classify(0),
            Some(ShardClass::Original { i: 0, x: 0, y: 0 })
        );
        assert_eq!(p.classify(4), Some(ShardClass::RowParity { y: 0 }));
        assert_eq!(p.classify(5), Some(ShardClass::RowParity { y: 1 }));
        assert_eq!(p.classify(6), Some(ShardClass::ColParity { x: 0 }));
        assert_eq!(p.classify(7), Some(ShardClass::ColParity { x: 1 }));
        assert_eq!(p.classify(8), Some(ShardClass::Global { i: 0 }));
        assert_eq!(p.classify(11), Some(ShardClass::LocalOfGlobals));
        assert_eq!(p.classify(12), None);
    }
}
