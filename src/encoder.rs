//! LRC encoder: three CM256 encode passes (row, column, global) plus the
//! XOR-of-globals local parity.

use smallvec::SmallVec;

use crate::cauchy;
use crate::error::Error;
use crate::params::LrcParams;
use crate::shard;

/// Runs the full LRC encode and returns every recovery shard, each already
/// index-prefixed, concatenated in the order row -> column -> global ->
/// local-of-globals.
pub fn encode(
    params: &LrcParams,
    originals: &[&[u8]],
) -> Result<Vec<u8>, Error> {
    if originals.is_empty() {
        return Err(Error::NullOriginalsBuffer);
    }
    for o in originals {
        if o.len() != params.block_bytes {
            return Err(Error::ShardSizeMismatch);
        }
    }

    let bb = params.block_bytes;
    let zero_buf = vec![0u8; bb];
    let x0 = params.total_original_count as u8;

    let original_at = |i: usize| -> &[u8] {
        if i < originals.len() {
            originals[i]
        } else {
            &zero_buf
        }
    };

    let shard_size = bb + 1;
    let mut out = vec![0u8; params.total_recovery_count * shard_size];
    let mut cursor = 0usize;

    log::debug!(
        "encoder: originalCount={} horLocal={} verLocal={}",
        params.original_count,
        params.hor_local_count,
        params.ver_local_count
    );

    // Row parities: XOR each row (decode row == x0, the parity row).
    for y in 0..params.ver_local_count {
        let columns: SmallVec<[(u8, &[u8]); 16]> = (0..params.hor_local_count)
            .map(|x| {
                let i = params.linear_index(x, y);
                (i as u8, original_at(i))
            })
            .collect();
        let dst = &mut out[cursor..cursor + shard_size];
        let (idx_byte, payload) = dst.split_at_mut(1);
        cauchy::encode_block(x0, &columns, x0, payload);
        idx_byte[0] = params.row_parity_index(y) as u8;
        cursor += shard_size;
    }

    // Column parities: Cauchy-coded along the VER decode row.
    let ver_row = params.ver_decode_row();
    for x in 0..params.hor_local_count {
        let columns: SmallVec<[(u8, &[u8]); 16]> = (0..params.ver_local_count)
            .map(|y| {
                let i = params.linear_index(x, y);
                (i as u8, original_at(i))
            })
            .collect();
        let dst = &mut out[cursor..cursor + shard_size];
        let (idx_byte, payload) = dst.split_at_mut(1);
        cauchy::encode_block(x0, &columns, ver_row, payload);
        idx_byte[0] = params.col_parity_index(x) as u8;
        cursor += shard_size;
    }

    // Global parities: Cauchy-coded over the real originals only (padding
    // cells are zero and would contribute nothing).
    let real_columns: SmallVec<[(u8, &[u8]); 32]> = (0..params.original_count)
        .map(|i| (i as u8, originals[i]))
        .collect();
    let mut globals_xor = vec![0u8; bb];
    for i in 0..params.global_recovery_count {
        let row = params.global_decode_row(i);
        let dst = &mut out[cursor..cursor + shard_size];
        let (idx_byte, payload) = dst.split_at_mut(1);
        cauchy::encode_block(x0, &real_columns, row, payload);
        idx_byte[0] = params.global_index(i) as u8;
        crate::gf256::add_mem(&mut globals_xor, payload);
        cursor += shard_size;
    }

    // Local-of-globals: XOR of every global parity above.
    {
        let dst = &mut out[cursor..cursor + shard_size];
        shard::write_indexed(dst, params.local_of_globals_index() as u8, &globals_xor);
        cursor += shard_size;
    }

    debug_assert_eq!(cursor, out.len());
    Ok(out)
}
