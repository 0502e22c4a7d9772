//! LRC rebuilder state machine: reconstruct exactly one lost shard using
//! the cheapest helper set, escalating through row -> column -> full
//! Cauchy decode routes as each proves insufficient.

use crate::cauchy;
use crate::decoder::LrcDecoder;
use crate::error::Error;
use crate::params::{LrcParams, ShardClass};
use crate::shard;

/// Result of feeding one shard to [`LrcRebuilder::one_shard_for_rebuild`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildStatus {
    /// `out_buf` now holds the rebuilt shard's payload.
    Success,
    /// More of the currently requested shards are needed.
    NeedMore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Init,
    HorRebuild,
    VerRebuild,
    HorRecoveryRebuild,
    VerRecoveryRebuild,
    GlobalRecoveryRebuild,
    GlobalRebuild,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ShardStatus {
    Unknown,
    Request,
}

pub struct LrcRebuilder<'out> {
    params: LrcParams,
    lost_index: usize,
    out_buf: &'out mut [u8],

    stage: Stage,
    status: Vec<ShardStatus>,
    requested: Vec<usize>,
    remaining: usize,
    /// Every payload ever delivered, by wire index — carried forward into
    /// the nested decoder if the rebuild escalates to `GlobalRebuild`.
    received: Vec<(usize, Vec<u8>)>,

    nested: Option<LrcDecoder<'static>>,
    unrecoverable: bool,
    done: bool,
}

impl<'out> LrcRebuilder<'out> {
    pub(crate) fn new(
        params: LrcParams,
        lost_index: usize,
        out_buf: &'out mut [u8],
    ) -> Result<LrcRebuilder<'out>, Error> {
        if out_buf.len() < params.block_bytes {
            return Err(Error::OutputBufferTooSmall);
        }
        let total_wire = params.original_count + params.total_recovery_count;
        if lost_index >= total_wire {
            return Err(Error::InvalidShardIndex);
        }

        Ok(LrcRebuilder {
            status: vec![ShardStatus::Unknown; total_wire],
            requested: Vec::new(),
            remaining: 0,
            received: Vec::new(),
            nested: None,
            unrecoverable: false,
            done: false,
            params,
            lost_index,
            out_buf,
        })
    }

    fn class_of(&self, wire_index: usize) -> ShardClass {
        self.params
            .classify(wire_index)
            .expect("wire_index validated in constructor/requests")
    }

    /// Returns the request list for the current stage, writing wire
    /// indices into `out_indices` and returning the count. A second call
    /// without an intervening success signals "the previous batch failed"
    /// and causes escalation to the next-cheapest route.
    pub fn next_request_list(&mut self, out_indices: &mut [u8]) -> Result<usize, Error> {
        if self.unrecoverable {
            return Ok(0);
        }
        if self.stage == Stage::Init {
            self.enter_init_route();
        } else if self.remaining > 0 {
            // Previous batch never completed: the caller is telling us a
            // requested shard is unobtainable. Escalate.
            self.escalate()?;
        }

        for &idx in &self.requested {
            self.status[idx] = ShardStatus::Request;
        }

        let n = self.requested.len();
        if out_indices.len() < n {
            return Err(Error::OutputBufferTooSmall);
        }
        for (slot, &idx) in out_indices.iter_mut().zip(self.requested.iter()) {
            *slot = idx as u8;
        }
        log::debug!(
            "rebuilder: stage={:?} requesting {} shards for lost index {}",
            self.stage,
            n,
            self.lost_index
        );
        Ok(n)
    }

    fn enter_init_route(&mut self) {
        match self.class_of(self.lost_index) {
            ShardClass::Original { i: _, x, y } => {
                self.requested = (0..self.params.hor_local_count)
                    .map(|cx| self.params.linear_index(cx, y))
                    .filter(|&i| i != self.lost_index && i < self.params.original_count)
                    .collect();
                self.requested.push(self.params.row_parity_index(y));
                let _ = x;
                self.stage = Stage::HorRebuild;
            }
            ShardClass::RowParity { y } => {
                self.requested = (0..self.params.hor_local_count)
                    .map(|x| self.params.linear_index(x, y))
                    .filter(|&i| i < self.params.original_count)
                    .collect();
                self.stage = Stage::HorRecoveryRebuild;
            }
            ShardClass::ColParity { x } => {
                self.requested = (0..self.params.ver_local_count)
                    .map(|y| self.params.linear_index(x, y))
                    .filter(|&i| i < self.params.original_count)
                    .collect();
                self.stage = Stage::VerRecoveryRebuild;
            }
            ShardClass::Global { i } => {
                let mut req: Vec<usize> = (0..self.params.global_recovery_count)
                    .filter(|&gi| gi != i)
                    .map(|gi| self.params.global_index(gi))
                    .collect();
                req.push(self.params.local_of_globals_index());
                self.requested = req;
                self.stage = Stage::GlobalRecoveryRebuild;
            }
            ShardClass::LocalOfGlobals => {
                self.requested = (0..self.params.global_recovery_count)
                    .map(|gi| self.params.global_index(gi))
                    .collect();
                self.stage = Stage::GlobalRecoveryRebuild;
            }
        }
        self.remaining = self.requested.len();
    }

    fn escalate(&mut self) -> Result<(), Error> {
        match self.stage {
            Stage::HorRebuild => {
                let (_, _, y) = self.lost_grid_pos();
                self.requested = (0..self.params.ver_local_count)
                    .map(|ry| self.params.linear_index(self.lost_col(), ry))
                    .filter(|&i| i != self.lost_index && i < self.params.original_count)
                    .collect();
                self.requested.push(self.params.col_parity_index(self.lost_col()));
                self.stage = Stage::VerRebuild;
                self.remaining = self.requested.len();
                let _ = y;
                Ok(())
            }
            Stage::VerRebuild
            | Stage::HorRecoveryRebuild
            | Stage::VerRecoveryRebuild
            | Stage::GlobalRecoveryRebuild => self.enter_global_rebuild(),
            Stage::GlobalRebuild => {
                self.unrecoverable = true;
                Err(Error::Unrecoverable)
            }
            Stage::Init => unreachable!(),
        }
    }

    fn enter_global_rebuild(&mut self) -> Result<(), Error> {
        let received_indices: std::collections::HashSet<usize> =
            self.received.iter().map(|(i, _)| *i).collect();
        let total_wire = self.params.original_count + self.params.total_recovery_count;
        let needed: Vec<usize> = (0..total_wire)
            .filter(|&i| i != self.lost_index && !received_indices.contains(&i))
            .collect();

        if needed.len() > self.params.total_recovery_count {
            self.unrecoverable = true;
            self.requested.clear();
            self.remaining = 0;
            return Ok(());
        }

        self.requested = needed;
        self.remaining = self.requested.len();
        self.stage = Stage::GlobalRebuild;

        let buf_len = (self.params.total_original_count + 1) * self.params.block_bytes;
        let mut nested = LrcDecoder::new_owned(self.params, buf_len)?;
        for (idx, payload) in &self.received {
            if *idx < self.params.original_count + self.params.total_recovery_count {
                let mut shard_buf = vec![0u8; payload.len() + 1];
                shard::write_indexed(&mut shard_buf, *idx as u8, payload);
                let _ = nested.decode(&shard_buf);
            }
        }
        self.nested = Some(nested);
        Ok(())
    }

    fn lost_col(&self) -> usize {
        match self.class_of(self.lost_index) {
            ShardClass::Original { x, .. } => x,
            _ => 0,
        }
    }

    fn lost_grid_pos(&self) -> (usize, usize, usize) {
        match self.class_of(self.lost_index) {
            ShardClass::Original { i, x, y } => (i, x, y),
            _ => (0, 0, 0),
        }
    }

    /// Feeds one index-prefixed shard into the rebuild.
    pub fn one_shard_for_rebuild(&mut self, shard_buf: &[u8]) -> Result<RebuildStatus, Error> {
        if self.unrecoverable {
            return Err(Error::Unrecoverable);
        }
        if self.done {
            return Ok(RebuildStatus::Success);
        }

        let (index, payload) = shard::split_index(shard_buf)?;
        let index = index as usize;
        if payload.len() != self.params.block_bytes {
            return Err(Error::ShardSizeMismatch);
        }
        if self.status[index] != ShardStatus::Request {
            return Err(Error::ShardNotRequested);
        }

        self.received.push((index, payload.to_vec()));
        self.status[index] = ShardStatus::Unknown;

        match self.stage {
            Stage::HorRebuild | Stage::HorRecoveryRebuild | Stage::GlobalRecoveryRebuild => {
                if self.remaining == self.requested.len() {
                    self.out_buf.fill(0);
                }
                crate::gf256::add_mem(self.out_buf, payload);
                self.remaining -= 1;
                if self.remaining == 0 {
                    self.done = true;
                    return Ok(RebuildStatus::Success);
                }
            }
            Stage::VerRebuild => {
                self.ingest_ver_rebuild_shard(index, payload)?;
                self.remaining -= 1;
                if self.remaining == 0 {
                    self.done = true;
                    return Ok(RebuildStatus::Success);
                }
            }
            Stage::VerRecoveryRebuild => {
                let col_x = index;
                let coeff = cauchy::matrix_element(
                    self.params.ver_decode_row(),
                    self.params.total_original_count as u8,
                    col_x as u8,
                );
                if self.remaining == self.requested.len() {
                    self.out_buf.fill(0);
                }
                crate::gf256::muladd_mem(self.out_buf, coeff, payload);
                self.remaining -= 1;
                if self.remaining == 0 {
                    self.done = true;
                    return Ok(RebuildStatus::Success);
                }
            }
            Stage::GlobalRebuild => {
                let mut shard_bytes = vec![0u8; payload.len() + 1];
                shard::write_indexed(&mut shard_bytes, index as u8, payload);
                let nested = self.nested.as_mut().expect("set on entering GlobalRebuild");
                match nested.decode(&shard_bytes) {
                    Ok(crate::decoder::DecodeStatus::Success) => {
                        self.finalize_from_nested()?;
                        self.done = true;
                        return Ok(RebuildStatus::Success);
                    }
                    Ok(_) => {
                        self.remaining = self.remaining.saturating_sub(1);
                    }
                    Err(e) => return Err(e),
                }
            }
            Stage::Init => unreachable!("next_request_list always leaves Init first"),
        }

        Ok(RebuildStatus::NeedMore)
    }

    /// `VerRebuild`: after the lost cell's column (minus itself) and its
    /// column parity all arrive, run a single-erasure Cauchy decode.
    fn ingest_ver_rebuild_shard(&mut self, _index: usize, _payload: &[u8]) -> Result<(), Error> {
        if self.remaining != 1 {
            return Ok(());
        }
        let (lost_i, x, y) = self.lost_grid_pos();
        let _ = y;

        // `self.received` may still carry shards from the earlier HorRebuild
        // stage (other cells in the lost cell's row, all in different
        // columns). Only originals actually in the lost cell's column are
        // valid contributors to this column's Cauchy elimination.
        let mut present: Vec<(u8, Vec<u8>)> = Vec::new();
        let mut col_parity: Option<&[u8]> = None;
        for (idx, payload) in &self.received {
            match self.class_of(*idx) {
                ShardClass::Original { i, x: cx, .. } if cx == x => {
                    present.push((i as u8, payload.clone()))
                }
                ShardClass::ColParity { .. } => col_parity = Some(payload.as_slice()),
                _ => {}
            }
        }
        let col_parity = col_parity.expect("column parity must have been requested");

        let present_refs: Vec<(u8, &[u8])> =
            present.iter().map(|(i, d)| (*i, d.as_slice())).collect();
        let recoveries = [(self.params.ver_decode_row(), col_parity)];
        let mut recovered = vec![0u8; self.params.block_bytes];
        {
            let mut out_slices: Vec<&mut [u8]> = vec![&mut recovered];
            let mut cache = cauchy::LduCache::new();
            cauchy::decode(
                self.params.total_original_count as u8,
                &present_refs,
                &[lost_i as u8],
                &recoveries,
                &mut out_slices,
                &mut cache,
            )?;
        }
        self.out_buf.copy_from_slice(&recovered);
        Ok(())
    }

    fn finalize_from_nested(&mut self) -> Result<(), Error> {
        let nested = self.nested.as_ref().expect("present in GlobalRebuild");
        let originals = nested.recovered_originals();
        let x0 = self.params.total_original_count as u8;
        let bb = self.params.block_bytes;
        let zero = vec![0u8; bb];

        let original_at = |i: usize| -> &[u8] {
            if i < self.params.original_count {
                &originals[i * bb..(i + 1) * bb]
            } else {
                &zero
            }
        };

        match self.class_of(self.lost_index) {
            ShardClass::Original { i, .. } => {
                self.out_buf.copy_from_slice(original_at(i));
            }
            ShardClass::RowParity { y } => {
                let columns: Vec<(u8, &[u8])> = (0..self.params.hor_local_count)
                    .map(|x| {
                        let i = self.params.linear_index(x, y);
                        (i as u8, original_at(i))
                    })
                    .collect();
                cauchy::encode_block(x0, &columns, x0, self.out_buf);
            }
            ShardClass::ColParity { x } => {
                let columns: Vec<(u8, &[u8])> = (0..self.params.ver_local_count)
                    .map(|y| {
                        let i = self.params.linear_index(x, y);
                        (i as u8, original_at(i))
                    })
                    .collect();
                cauchy::encode_block(x0, &columns, self.params.ver_decode_row(), self.out_buf);
            }
            ShardClass::Global { i } => {
                let columns: Vec<(u8, &[u8])> = (0..self.params.original_count)
                    .map(|j| (j as u8, original_at(j)))
                    .collect();
                cauchy::encode_block(x0, &columns, self.params.global_decode_row(i), self.out_buf);
            }
            ShardClass::LocalOfGlobals => {
                let columns: Vec<(u8, &[u8])> = (0..self.params.original_count)
                    .map(|j| (j as u8, original_at(j)))
                    .collect();
                self.out_buf.fill(0);
                let mut one_global = vec![0u8; bb];
                for i in 0..self.params.global_recovery_count {
                    cauchy::encode_block(
                        x0,
                        &columns,
                        self.params.global_decode_row(i),
                        &mut one_global,
                    );
                    crate::gf256::add_mem(self.out_buf, &one_global);
                }
            }
        }
        Ok(())
    }
}
