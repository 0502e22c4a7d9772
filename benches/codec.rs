//! Throughput benchmarks for the encode / bulk-decode / single-shard
//! rebuild paths, replacing the teacher crate's ISA-L-oriented
//! `min_shards` bench (this crate has no FFI backend to tune a crossover
//! point for).

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::rngs::SmallRng;
use rand::{RngCore, SeedableRng};

use cauchy_lrc::LrcConfig;

const BLOCK_BYTES: usize = 4096;
const SHARD_SIZE: usize = BLOCK_BYTES + 1;

fn make_originals(original_count: usize) -> Vec<Vec<u8>> {
    let mut rng = SmallRng::seed_from_u64(0xC0FFEE);
    (0..original_count)
        .map(|_| {
            let mut buf = vec![0u8; BLOCK_BYTES];
            rng.fill_bytes(&mut buf);
            buf
        })
        .collect()
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");
    for &original_count in &[16usize, 64, 110] {
        let originals = make_originals(original_count);
        let refs: Vec<&[u8]> = originals.iter().map(|v| v.as_slice()).collect();
        let config = LrcConfig::new(10).unwrap();

        group.throughput(Throughput::Bytes((original_count * BLOCK_BYTES) as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(original_count),
            &original_count,
            |b, _| {
                b.iter(|| {
                    let recovery = config.encode(black_box(&refs), SHARD_SIZE).unwrap();
                    black_box(recovery);
                });
            },
        );
    }
    group.finish();
}

fn bench_decode_single_loss(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_single_loss");
    for &original_count in &[16usize, 64, 110] {
        let originals = make_originals(original_count);
        let refs: Vec<&[u8]> = originals.iter().map(|v| v.as_slice()).collect();
        let config = LrcConfig::new(10).unwrap();
        let recovery = config.encode(&refs, SHARD_SIZE).unwrap();

        group.throughput(Throughput::Bytes((original_count * BLOCK_BYTES) as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(original_count),
            &original_count,
            |b, _| {
                b.iter(|| {
                    let mut out = vec![0u8; original_count * BLOCK_BYTES];
                    let mut decoder = config
                        .begin_decode(original_count, SHARD_SIZE, &mut out)
                        .unwrap();
                    // Lose original 0; feed every other original plus its
                    // row parity (the cheapest recovery route).
                    for (i, original) in originals.iter().enumerate().skip(1) {
                        let mut shard = vec![i as u8];
                        shard.extend_from_slice(original);
                        let _ = decoder.decode(&shard).unwrap();
                    }
                    for chunk in recovery.chunks(SHARD_SIZE) {
                        if decoder.decode(chunk).unwrap() == cauchy_lrc::DecodeStatus::Success {
                            break;
                        }
                    }
                    black_box(out);
                });
            },
        );
    }
    group.finish();
}

fn bench_rebuild_single_shard(c: &mut Criterion) {
    let mut group = c.benchmark_group("rebuild_single_shard");
    for &original_count in &[16usize, 64, 110] {
        let originals = make_originals(original_count);
        let refs: Vec<&[u8]> = originals.iter().map(|v| v.as_slice()).collect();
        let config = LrcConfig::new(10).unwrap();
        let recovery = config.encode(&refs, SHARD_SIZE).unwrap();
        let lost_index = original_count / 2;

        group.bench_with_input(
            BenchmarkId::from_parameter(original_count),
            &original_count,
            |b, _| {
                b.iter(|| {
                    let mut out = vec![0u8; BLOCK_BYTES];
                    let mut rebuilder = config
                        .begin_rebuild(original_count, lost_index, SHARD_SIZE, &mut out)
                        .unwrap();
                    let mut indices = vec![0u8; 256];
                    let n = rebuilder.next_request_list(&mut indices).unwrap();
                    for &idx in &indices[..n] {
                        let idx = idx as usize;
                        let payload: &[u8] = if idx < original_count {
                            &originals[idx]
                        } else {
                            let chunk = idx - original_count;
                            &recovery[chunk * SHARD_SIZE..chunk * SHARD_SIZE + SHARD_SIZE][1..]
                        };
                        let mut shard = vec![idx as u8];
                        shard.extend_from_slice(payload);
                        let _ = rebuilder.one_shard_for_rebuild(&shard).unwrap();
                    }
                    black_box(out);
                });
            },
        );
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_encode,
    bench_decode_single_loss,
    bench_rebuild_single_shard
);
criterion_main!(benches);
