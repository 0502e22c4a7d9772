//! Wire-format helpers shared by the encoder, decoder, and rebuilder.
//!
//! Every shard travels as `[index byte][payload bytes]`, matching the
//! `1 + blockBytes`-byte layout `cm256.h` documents for `CM256Block`.

use crate::error::Error;

/// Splits an index-prefixed shard into its `(index, payload)` parts.
/// Returns an error if the buffer is empty.
pub fn split_index(shard: &[u8]) -> Result<(u8, &[u8]), Error> {
    match shard.split_first() {
        Some((&index, payload)) => Ok((index, payload)),
        None => Err(Error::ShardSizeTooSmall),
    }
}

/// Writes `index` followed by `payload` into `dst`. `dst` must be exactly
/// `payload.len() + 1` bytes.
pub fn write_indexed(dst: &mut [u8], index: u8, payload: &[u8]) {
    debug_assert_eq!(dst.len(), payload.len() + 1);
    dst[0] = index;
    dst[1..].copy_from_slice(payload);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let mut buf = vec![0u8; 5];
        write_indexed(&mut buf, 42, &[1, 2, 3, 4]);
        let (idx, payload) = split_index(&buf).unwrap();
        assert_eq!(idx, 42);
        assert_eq!(payload, &[1, 2, 3, 4]);
    }

    #[test]
    fn empty_shard_errors() {
        assert_eq!(split_index(&[]).unwrap_err(), Error::ShardSizeTooSmall);
    }
}
