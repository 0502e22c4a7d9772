//! Randomized property checks for the round-trip, order-independence, and
//! idempotence laws from the design doc's testable-properties section.

use quickcheck_macros::quickcheck;

use cauchy_lrc::{DecodeStatus, LrcConfig};

const BLOCK_BYTES: usize = 13;
const SHARD_SIZE: usize = BLOCK_BYTES + 1;

fn make_originals(original_count: usize, seed: u64) -> Vec<Vec<u8>> {
    let mut state = seed ^ 0x9E3779B97F4A7C15;
    let mut next_byte = || {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
        (state >> 33) as u8
    };
    (0..original_count)
        .map(|_| (0..BLOCK_BYTES).map(|_| next_byte()).collect())
        .collect()
}

/// Drives an encode, drops `lose` originals (by index, deduplicated and
/// clamped into range), and decodes from whatever's left. Returns `true`
/// iff every original came back byte-identical.
fn roundtrip_with_losses(original_count: u8, global_recovery: u8, lose_seed: u64) -> bool {
    let original_count = (original_count as usize % 40) + 1;
    let global_recovery = (global_recovery as usize % 20) + 3;

    let config = match LrcConfig::new(global_recovery) {
        Ok(c) => c,
        Err(_) => return true,
    };
    let originals = make_originals(original_count, lose_seed);
    let refs: Vec<&[u8]> = originals.iter().map(|v| v.as_slice()).collect();
    let recovery = match config.encode(&refs, SHARD_SIZE) {
        Ok(r) => r,
        Err(_) => return true,
    };

    // Deterministically pick a loss pattern from the seed: drop up to
    // `global_recovery` originals (guaranteed recoverable via globals
    // alone per the design doc's capacity law) at pseudo-random positions.
    let mut state = lose_seed;
    let mut next = || {
        state = state.wrapping_mul(2862933555777941757).wrapping_add(3037000493);
        state
    };
    let lose_count = (next() as usize % global_recovery.min(original_count)).max(1);
    let mut lost: Vec<usize> = Vec::new();
    while lost.len() < lose_count {
        let idx = (next() as usize) % original_count;
        if !lost.contains(&idx) {
            lost.push(idx);
        }
    }

    let mut out = vec![0u8; original_count * BLOCK_BYTES];
    let mut decoder = config
        .begin_decode(original_count, SHARD_SIZE, &mut out)
        .unwrap();

    for (i, original) in originals.iter().enumerate() {
        if lost.contains(&i) {
            continue;
        }
        let mut shard = vec![i as u8];
        shard.extend_from_slice(original);
        let _ = decoder.decode(&shard).unwrap();
    }

    let mut status = DecodeStatus::NeedMore;
    for chunk in recovery.chunks(SHARD_SIZE) {
        status = match decoder.decode(chunk) {
            Ok(s) => s,
            Err(_) => return false,
        };
        if status == DecodeStatus::Success {
            break;
        }
    }

    if status != DecodeStatus::Success {
        return false;
    }
    for (i, original) in originals.iter().enumerate() {
        if &out[i * BLOCK_BYTES..(i + 1) * BLOCK_BYTES] != original.as_slice() {
            return false;
        }
    }
    true
}

#[quickcheck]
fn decode_recovers_losses_up_to_global_capacity(
    original_count: u8,
    global_recovery: u8,
    lose_seed: u64,
) -> bool {
    roundtrip_with_losses(original_count, global_recovery, lose_seed)
}

#[quickcheck]
fn decode_is_order_independent(original_count: u8, global_recovery: u8, shuffle_seed: u64) -> bool {
    let original_count = (original_count as usize % 30) + 4;
    let global_recovery = (global_recovery as usize % 15) + 3;

    let config = match LrcConfig::new(global_recovery) {
        Ok(c) => c,
        Err(_) => return true,
    };
    let originals = make_originals(original_count, shuffle_seed);
    let refs: Vec<&[u8]> = originals.iter().map(|v| v.as_slice()).collect();
    let recovery = match config.encode(&refs, SHARD_SIZE) {
        Ok(r) => r,
        Err(_) => return true,
    };

    // Build the full shard stream (originals + recoveries) and decode it
    // twice, once forward and once reversed: the final buffer must match
    // regardless of arrival order.
    let mut all_shards: Vec<Vec<u8>> = Vec::new();
    for (i, original) in originals.iter().enumerate() {
        let mut shard = vec![i as u8];
        shard.extend_from_slice(original);
        all_shards.push(shard);
    }
    for chunk in recovery.chunks(SHARD_SIZE) {
        all_shards.push(chunk.to_vec());
    }

    let decode_all = |shards: &[Vec<u8>]| -> Vec<u8> {
        let mut out = vec![0u8; original_count * BLOCK_BYTES];
        let mut decoder = config
            .begin_decode(original_count, SHARD_SIZE, &mut out)
            .unwrap();
        for s in shards {
            let _ = decoder.decode(s).unwrap();
        }
        out
    };

    let forward = decode_all(&all_shards);
    let mut reversed = all_shards.clone();
    reversed.reverse();
    let backward = decode_all(&reversed);

    forward == backward
}

#[quickcheck]
fn duplicate_shard_is_a_no_op(original_count: u8, global_recovery: u8, seed: u64) -> bool {
    let original_count = (original_count as usize % 20) + 1;
    let global_recovery = (global_recovery as usize % 10) + 3;

    let config = match LrcConfig::new(global_recovery) {
        Ok(c) => c,
        Err(_) => return true,
    };
    let originals = make_originals(original_count, seed);

    let mut out = vec![0u8; original_count * BLOCK_BYTES];
    let mut decoder = config
        .begin_decode(original_count, SHARD_SIZE, &mut out)
        .unwrap();

    let mut shard = vec![0u8];
    shard.extend_from_slice(&originals[0]);
    let first = decoder.decode(&shard).unwrap();
    let second = decoder.decode(&shard).unwrap();

    second == DecodeStatus::Ignored && first != DecodeStatus::Ignored
}

#[quickcheck]
fn encode_is_deterministic(original_count: u8, global_recovery: u8, seed: u64) -> bool {
    let original_count = (original_count as usize % 30) + 1;
    let global_recovery = (global_recovery as usize % 15) + 3;

    let config = match LrcConfig::new(global_recovery) {
        Ok(c) => c,
        Err(_) => return true,
    };
    let originals = make_originals(original_count, seed);
    let refs: Vec<&[u8]> = originals.iter().map(|v| v.as_slice()).collect();

    let first = config.encode(&refs, SHARD_SIZE).unwrap();
    let second = config.encode(&refs, SHARD_SIZE).unwrap();
    first == second
}
