//! LRC decoder state machine: ingest shards one at a time, track deficits
//! per row/column/globally, and opportunistically recover missing
//! originals via the cheapest available route before escalating to a
//! full Cauchy decode.

use crate::cauchy::{self, LduCache};
use crate::error::Error;
use crate::params::{LrcParams, ShardClass};
use crate::shard;

/// Result of feeding one shard to [`LrcDecoder::decode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStatus {
    /// Every original has been recovered; `out_buf` holds the full set.
    Success,
    /// More shards are required before anything further can be deduced.
    NeedMore,
    /// The shard's slot was already filled; nothing changed.
    Ignored,
}

/// The decoder's output storage: either the caller's buffer (the public
/// `begin_decode` entry point) or a buffer the decoder allocated itself
/// (the rebuilder's nested escalation decoder, which needs a scratch slot
/// beyond `originalCount` to synthesize the local-of-globals parity and
/// therefore cannot reuse a caller-sized buffer).
enum OutBuf<'out> {
    Borrowed(&'out mut [u8]),
    Owned(Box<[u8]>),
}

impl<'out> OutBuf<'out> {
    fn as_slice(&self) -> &[u8] {
        match self {
            OutBuf::Borrowed(b) => b,
            OutBuf::Owned(b) => b,
        }
    }

    fn as_mut_slice(&mut self) -> &mut [u8] {
        match self {
            OutBuf::Borrowed(b) => b,
            OutBuf::Owned(b) => b,
        }
    }
}

/// Borrows (or owns) its output buffer for its whole lifetime. Recovered
/// (and originally-delivered) shards land directly in `out_buf`; no
/// separate "decoded output" copy exists.
pub struct LrcDecoder<'out> {
    params: LrcParams,
    out_buf: OutBuf<'out>,
    zero_buf: Box<[u8]>,

    original_known: Vec<bool>,
    row_parity: Vec<Option<Box<[u8]>>>,
    col_parity: Vec<Option<Box<[u8]>>>,
    global: Vec<Option<Box<[u8]>>>,
    local_of_globals: Option<Box<[u8]>>,
    virtual_from_rows: Option<Box<[u8]>>,
    virtual_from_cols: Option<Box<[u8]>>,

    hor_missed: Vec<i32>,
    ver_missed: Vec<i32>,
    global_missed: i32,
    num_hor_recovery: usize,
    num_ver_recovery: usize,
    num_global_recovery: usize,
    total_global_recovery: usize,

    cache: LduCache,
    done: bool,
}

impl<'out> LrcDecoder<'out> {
    pub(crate) fn new(
        params: LrcParams,
        out_buf: &'out mut [u8],
    ) -> Result<LrcDecoder<'out>, Error> {
        if out_buf.len() < params.original_count * params.block_bytes {
            return Err(Error::OutputBufferTooSmall);
        }
        Self::new_with_storage(params, OutBuf::Borrowed(out_buf))
    }

    /// Builds a decoder over a freshly allocated, decoder-owned buffer.
    /// Used by the rebuilder's `GlobalRebuild` escalation stage, which
    /// needs `(totalOriginalCount + 1) * blockBytes` bytes of scratch that
    /// no caller-supplied buffer is sized for.
    pub(crate) fn new_owned(
        params: LrcParams,
        buf_len: usize,
    ) -> Result<LrcDecoder<'static>, Error> {
        if buf_len < params.original_count * params.block_bytes {
            return Err(Error::AllocationFailed);
        }
        let buf = vec![0u8; buf_len].into_boxed_slice();
        LrcDecoder::new_with_storage(params, OutBuf::Owned(buf))
    }

    fn new_with_storage(
        params: LrcParams,
        out_buf: OutBuf<'out>,
    ) -> Result<LrcDecoder<'out>, Error> {
        let mut original_known = vec![false; params.total_original_count];
        for i in params.original_count..params.total_original_count {
            original_known[i] = true;
        }

        let mut hor_missed = vec![0i32; params.ver_local_count];
        let mut ver_missed = vec![0i32; params.hor_local_count];
        for i in 0..params.original_count {
            let (y, x) = params.grid_pos(i);
            hor_missed[y] += 1;
            ver_missed[x] += 1;
        }
        let global_missed = params.original_count as i32;

        Ok(LrcDecoder {
            zero_buf: vec![0u8; params.block_bytes].into_boxed_slice(),
            total_global_recovery: params.global_recovery_count + 2,
            original_known,
            row_parity: vec![None; params.ver_local_count],
            col_parity: vec![None; params.hor_local_count],
            global: vec![None; params.global_recovery_count],
            local_of_globals: None,
            virtual_from_rows: None,
            virtual_from_cols: None,
            hor_missed,
            ver_missed,
            global_missed,
            num_hor_recovery: 0,
            num_ver_recovery: 0,
            num_global_recovery: 0,
            cache: LduCache::new(),
            done: false,
            params,
            out_buf,
        })
    }

    fn original_slot(&self, i: usize) -> &[u8] {
        if i < self.params.original_count {
            let bb = self.params.block_bytes;
            &self.out_buf.as_slice()[i * bb..(i + 1) * bb]
        } else {
            &self.zero_buf
        }
    }

    fn write_original(&mut self, i: usize, payload: &[u8]) {
        let bb = self.params.block_bytes;
        self.out_buf.as_mut_slice()[i * bb..(i + 1) * bb].copy_from_slice(payload);
    }

    /// The recovered originals, `[0, originalCount) * blockBytes` bytes.
    pub(crate) fn recovered_originals(&self) -> &[u8] {
        &self.out_buf.as_slice()[..self.params.original_count * self.params.block_bytes]
    }

    /// Feeds one index-prefixed shard to the decoder.
    pub fn decode(&mut self, shard: &[u8]) -> Result<DecodeStatus, Error> {
        if self.done {
            return Ok(DecodeStatus::Success);
        }

        let (index, payload) = shard::split_index(shard)?;
        if payload.len() != self.params.block_bytes {
            return Err(Error::ShardSizeMismatch);
        }
        let index = index as usize;
        let class = self
            .params
            .classify(index)
            .ok_or(Error::InvalidShardIndex)?;

        log::trace!("decoder: ingest index={} class={:?}", index, class);

        match class {
            ShardClass::Original { i, x, y } => {
                if self.original_known[i] {
                    return Ok(DecodeStatus::Ignored);
                }
                self.write_original(i, payload);
                self.original_known[i] = true;
                self.hor_missed[y] -= 1;
                self.ver_missed[x] -= 1;
                self.global_missed -= 1;
            }
            ShardClass::RowParity { y } => {
                if self.row_parity[y].is_some() {
                    return Ok(DecodeStatus::Ignored);
                }
                self.row_parity[y] = Some(payload.into());
                self.num_hor_recovery += 1;
            }
            ShardClass::ColParity { x } => {
                if self.col_parity[x].is_some() {
                    return Ok(DecodeStatus::Ignored);
                }
                self.col_parity[x] = Some(payload.into());
                self.num_ver_recovery += 1;
            }
            ShardClass::Global { i } => {
                if self.global[i].is_some() {
                    return Ok(DecodeStatus::Ignored);
                }
                self.global[i] = Some(payload.into());
                self.num_global_recovery += 1;
            }
            ShardClass::LocalOfGlobals => {
                if self.local_of_globals.is_some() {
                    return Ok(DecodeStatus::Ignored);
                }
                self.local_of_globals = Some(payload.into());
            }
        }

        self.cascade_recover();
        self.augment_globals();

        if self.global_missed <= 0 {
            self.done = true;
            return Ok(DecodeStatus::Success);
        }
        if self.global_missed > self.total_global_recovery as i32 {
            return Ok(DecodeStatus::NeedMore);
        }

        match self.try_global_escalation()? {
            true => {
                self.done = true;
                Ok(DecodeStatus::Success)
            }
            false => Ok(DecodeStatus::NeedMore),
        }
    }

    /// Row/column cascade: whenever a row or column has exactly one
    /// missing cell and its parity is present, recover it, which may
    /// enable a neighboring column/row in turn. Runs until no progress.
    fn cascade_recover(&mut self) {
        loop {
            let mut progress = false;
            for y in 0..self.params.ver_local_count {
                if self.try_recover_row(y) {
                    progress = true;
                }
            }
            for x in 0..self.params.hor_local_count {
                if self.try_recover_col(x) {
                    progress = true;
                }
            }
            if !progress {
                break;
            }
        }
    }

    fn try_recover_row(&mut self, y: usize) -> bool {
        if self.hor_missed[y] != 1 {
            return false;
        }
        let parity = match &self.row_parity[y] {
            Some(p) => p.clone(),
            None => return false,
        };

        let hor = self.params.hor_local_count;
        let mut missing_x = None;
        let mut present: Vec<(u8, Vec<u8>)> = Vec::with_capacity(hor - 1);
        for x in 0..hor {
            let i = self.params.linear_index(x, y);
            if self.original_known[i] {
                present.push((i as u8, self.original_slot(i).to_vec()));
            } else {
                missing_x = Some(x);
            }
        }
        let missing_x = match missing_x {
            Some(x) => x,
            None => return false,
        };
        let i_miss = self.params.linear_index(missing_x, y);

        let present_refs: Vec<(u8, &[u8])> =
            present.iter().map(|(i, d)| (*i, d.as_slice())).collect();
        let recoveries = [(self.params.hor_decode_row(), parity.as_ref())];
        let mut recovered = vec![0u8; self.params.block_bytes];
        let mut out_slices: Vec<&mut [u8]> = vec![&mut recovered];

        if cauchy::decode(
            self.params.total_original_count as u8,
            &present_refs,
            &[i_miss as u8],
            &recoveries,
            &mut out_slices,
            &mut self.cache,
        )
        .is_err()
        {
            return false;
        }

        log::debug!("decoder: recovered original {} via row {}", i_miss, y);
        self.write_original(i_miss, &recovered);
        self.original_known[i_miss] = true;
        self.hor_missed[y] -= 1;
        self.ver_missed[missing_x] -= 1;
        self.global_missed -= 1;
        true
    }

    fn try_recover_col(&mut self, x: usize) -> bool {
        if self.ver_missed[x] != 1 {
            return false;
        }
        let parity = match &self.col_parity[x] {
            Some(p) => p.clone(),
            None => return false,
        };

        let ver = self.params.ver_local_count;
        let mut missing_y = None;
        let mut present: Vec<(u8, Vec<u8>)> = Vec::with_capacity(ver - 1);
        for y in 0..ver {
            let i = self.params.linear_index(x, y);
            if self.original_known[i] {
                present.push((i as u8, self.original_slot(i).to_vec()));
            } else {
                missing_y = Some(y);
            }
        }
        let missing_y = match missing_y {
            Some(y) => y,
            None => return false,
        };
        let i_miss = self.params.linear_index(x, missing_y);

        let present_refs: Vec<(u8, &[u8])> =
            present.iter().map(|(i, d)| (*i, d.as_slice())).collect();
        let recoveries = [(self.params.ver_decode_row(), parity.as_ref())];
        let mut recovered = vec![0u8; self.params.block_bytes];
        let mut out_slices: Vec<&mut [u8]> = vec![&mut recovered];

        if cauchy::decode(
            self.params.total_original_count as u8,
            &present_refs,
            &[i_miss as u8],
            &recoveries,
            &mut out_slices,
            &mut self.cache,
        )
        .is_err()
        {
            return false;
        }

        log::debug!("decoder: recovered original {} via column {}", i_miss, x);
        self.write_original(i_miss, &recovered);
        self.original_known[i_miss] = true;
        self.hor_missed[missing_y] -= 1;
        self.ver_missed[x] -= 1;
        self.global_missed -= 1;
        true
    }

    /// Synthesizes extra global-equivalent parities from whatever's fully
    /// present: a missing real global from the local-of-globals parity, or
    /// a "virtual global" from a complete set of row or column parities.
    fn augment_globals(&mut self) {
        if self.num_global_recovery == self.params.global_recovery_count.saturating_sub(1)
            && self.local_of_globals.is_some()
        {
            if let Some(missing_i) = (0..self.params.global_recovery_count)
                .find(|&i| self.global[i].is_none())
            {
                let mut synthesized = self.local_of_globals.as_ref().unwrap().to_vec();
                for g in self.global.iter().flatten() {
                    crate::gf256::add_mem(&mut synthesized, g);
                }
                log::debug!("decoder: synthesized global {} from local-of-globals", missing_i);
                self.global[missing_i] = Some(synthesized.into());
                self.num_global_recovery += 1;
            }
        }

        if self.virtual_from_rows.is_none()
            && self.num_hor_recovery == self.params.ver_local_count
        {
            let mut buf = vec![0u8; self.params.block_bytes];
            for p in self.row_parity.iter().flatten() {
                crate::gf256::add_mem(&mut buf, p);
            }
            log::debug!("decoder: synthesized virtual global from rows");
            self.virtual_from_rows = Some(buf.into());
        }

        if self.virtual_from_cols.is_none()
            && self.num_ver_recovery == self.params.hor_local_count
        {
            let mut buf = vec![0u8; self.params.block_bytes];
            for p in self.col_parity.iter().flatten() {
                crate::gf256::add_mem(&mut buf, p);
            }
            log::debug!("decoder: synthesized virtual global from columns");
            self.virtual_from_cols = Some(buf.into());
        }
    }

    /// Collects available global-equivalent spares, ascending by index,
    /// and — if there are enough to cover every remaining missing
    /// original — runs the full Cauchy decode over `[0, originalCount)`.
    fn try_global_escalation(&mut self) -> Result<bool, Error> {
        let missing: Vec<u8> = (0..self.params.original_count)
            .filter(|&i| !self.original_known[i])
            .map(|i| i as u8)
            .collect();
        if missing.is_empty() {
            return Ok(true);
        }

        let mut spares: Vec<(u8, Vec<u8>)> = Vec::new();
        for (i, g) in self.global.iter().enumerate() {
            if let Some(payload) = g {
                spares.push((self.params.global_decode_row(i), payload.to_vec()));
            }
        }
        if let Some(p) = &self.virtual_from_rows {
            spares.push((self.params.hor_decode_row(), p.to_vec()));
        }
        if let Some(p) = &self.virtual_from_cols {
            spares.push((self.params.ver_decode_row(), p.to_vec()));
        }

        if spares.len() < missing.len() {
            return Ok(false);
        }
        spares.truncate(missing.len());

        let present: Vec<(u8, Vec<u8>)> = (0..self.params.original_count)
            .filter(|&i| self.original_known[i])
            .map(|i| (i as u8, self.original_slot(i).to_vec()))
            .collect();
        let present_refs: Vec<(u8, &[u8])> =
            present.iter().map(|(i, d)| (*i, d.as_slice())).collect();
        let recovery_refs: Vec<(u8, &[u8])> =
            spares.iter().map(|(r, d)| (*r, d.as_slice())).collect();

        let bb = self.params.block_bytes;
        let mut outputs = vec![vec![0u8; bb]; missing.len()];
        let mut out_slices: Vec<&mut [u8]> = outputs.iter_mut().map(|v| v.as_mut_slice()).collect();

        cauchy::decode(
            self.params.total_original_count as u8,
            &present_refs,
            &missing,
            &recovery_refs,
            &mut out_slices,
            &mut self.cache,
        )?;

        log::debug!(
            "decoder: escalated to full CM256 decode, recovered {} originals",
            missing.len()
        );

        for (&i_u8, buf) in missing.iter().zip(outputs.into_iter()) {
            let i = i_u8 as usize;
            let (y, x) = self.params.grid_pos(i);
            self.write_original(i, &buf);
            self.original_known[i] = true;
            self.hor_missed[y] -= 1;
            self.ver_missed[x] -= 1;
        }
        self.global_missed = 0;

        Ok(true)
    }
}
