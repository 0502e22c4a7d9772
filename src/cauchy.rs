//! Cauchy matrix element oracle and the CM256 encoder/decoder: the GF(256)
//! erasure code that the LRC layer runs three times (row, column, global)
//! and once more at full width when local recovery runs out of options.
//!
//! Block records identify a payload by `(lrc_index, decode_index)`:
//! `lrc_index` is the logical grid slot a block occupies (or would occupy,
//! once recovered); `decode_index` is the Cauchy row that produced it.
//! Three virtual decode rows beyond the real originals exist per
//! `LrcParams`: `HOR`, `VER`, and one `GLOBAL(i)` per global parity — see
//! `params::LrcParams`.

use std::num::NonZeroUsize;

use lru::LruCache;
use smallvec::SmallVec;

use crate::error::Error;
use crate::gf256;

/// A logical block identity inside one CM256 sub-decode: which grid slot it
/// is (or will become), and which Cauchy row produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRecord {
    pub lrc_index: u16,
    pub decode_index: u8,
}

/// `M(x, x0, y) = (y + x0) / (x + y)`. `x0` is always `totalOriginalCount`;
/// `x` is a decode row, `y` an original column. Never call this with
/// `x == x0` (the parity row) — callers take the XOR fast path instead,
/// though the formula degenerates to `1` there (numerator == denominator)
/// so no caller is *required* to special-case it for correctness.
#[inline]
pub fn matrix_element(x: u8, x0: u8, y: u8) -> u8 {
    let num = gf256::add(y, x0);
    let den = gf256::add(x, y);
    gf256::div(num, den)
}

/// Encodes one recovery block from a list of `(column, payload)` pairs.
///
/// `x0` is the sub-geometry's `totalOriginalCount` (the Cauchy matrix
/// width constant, shared across every CM256 call an LRC instance makes,
/// not necessarily the number of columns in *this* call). `recovery_row`
/// is the decode row this recovery block is being produced for.
pub fn encode_block(x0: u8, columns: &[(u8, &[u8])], recovery_row: u8, out: &mut [u8]) {
    debug_assert!(!columns.is_empty());
    if columns.len() == 1 {
        out.copy_from_slice(columns[0].1);
        return;
    }
    if recovery_row == x0 {
        let (first, rest) = columns.split_first().unwrap();
        out.copy_from_slice(first.1);
        for (_, data) in rest {
            gf256::add_mem(out, data);
        }
        return;
    }
    let (first, rest) = columns.split_first().unwrap();
    let c0 = matrix_element(recovery_row, x0, first.0);
    gf256::mul_mem(out, first.1, c0);
    for (y, data) in rest {
        let c = matrix_element(recovery_row, x0, *y);
        gf256::muladd_mem(out, c, data);
    }
}

/// Lower/diagonal/upper factorization of the `n x n` Cauchy matrix defined
/// by decode rows `xs` and erasure columns `ys`, in the canonical (sorted)
/// order used as the cache key. `l`/`u` are stored densely (`n*n`) even
/// though only the strict triangle is meaningful; `n` here is always small
/// (bounded by `globalRecoveryCount` or a local group size) so this is not
/// a memory concern.
#[derive(Debug, Clone)]
struct Ldu {
    n: usize,
    l: Vec<u8>,
    d: Vec<u8>,
    u: Vec<u8>,
}

impl Ldu {
    fn build(x0: u8, xs: &[u8], ys: &[u8]) -> Ldu {
        let n = xs.len();
        debug_assert_eq!(ys.len(), n);

        let mut g = vec![1u8; n];
        let mut b = vec![1u8; n];
        let mut l = vec![0u8; n * n];
        let mut u = vec![0u8; n * n];
        let mut d = vec![0u8; n];

        for k in 0..n {
            let c_kk = matrix_element(xs[k], x0, ys[k]);
            let d_kk = gf256::mul(gf256::mul(c_kk, g[k]), b[k]);
            d[k] = d_kk;

            for i in (k + 1)..n {
                let c_ik = matrix_element(xs[i], x0, ys[k]);
                let val = gf256::mul(gf256::mul(c_ik, g[i]), b[k]);
                l[i * n + k] = gf256::div(val, d_kk);
            }
            for j in (k + 1)..n {
                let c_kj = matrix_element(xs[k], x0, ys[j]);
                let val = gf256::mul(gf256::mul(c_kj, g[k]), b[j]);
                u[k * n + j] = gf256::div(val, d_kk);
            }

            // Schur complement of a Cauchy matrix is again Cauchy, scaled
            // row-wise and column-wise by these factors — see DESIGN.md
            // for the identity this recursion is built on.
            for i in (k + 1)..n {
                let num = gf256::add(xs[i], xs[k]);
                let den = gf256::add(xs[i], ys[k]);
                g[i] = gf256::mul(g[i], gf256::div(num, den));
            }
            for j in (k + 1)..n {
                let num = gf256::add(ys[j], ys[k]);
                let den = gf256::add(ys[j], xs[k]);
                b[j] = gf256::mul(b[j], gf256::div(num, den));
            }
        }

        Ldu { n, l, d, u }
    }

    /// Solves `M x = rhs` in place: forward substitution against `L`,
    /// element-wise division by `D`, back substitution against `U`.
    fn solve(&self, rhs: &mut [Vec<u8>]) {
        let n = self.n;
        debug_assert_eq!(rhs.len(), n);

        for i in 0..n {
            for k in 0..i {
                let coeff = self.l[i * n + k];
                if coeff != 0 {
                    let (lo, hi) = rhs.split_at_mut(i);
                    gf256::muladd_mem(&mut hi[0], coeff, &lo[k]);
                }
            }
        }
        for i in 0..n {
            let d_i = self.d[i];
            let snapshot = rhs[i].clone();
            gf256::div_mem(&mut rhs[i], &snapshot, d_i);
        }
        for k in (0..n).rev() {
            for j in (k + 1)..n {
                let coeff = self.u[k * n + j];
                if coeff != 0 {
                    let (lo, hi) = rhs.split_at_mut(j);
                    gf256::muladd_mem(&mut lo[k], coeff, &hi[0]);
                }
            }
        }
    }
}

type LduKey = (u8, SmallVec<[u8; 16]>, SmallVec<[u8; 16]>);

/// Caches LDU factorizations across repeated decodes over the same loss
/// pattern (the LRC decoder's opportunistic loop tends to re-enter CM256
/// with identical row/column shapes many times in a row). Purely a
/// performance layer: a miss always falls back to [`Ldu::build`], and
/// results are bit-identical either way.
pub struct LduCache {
    inner: LruCache<LduKey, Ldu>,
}

impl LduCache {
    pub fn new() -> LduCache {
        LduCache {
            inner: LruCache::new(NonZeroUsize::new(64).unwrap().get()),
        }
    }

    fn get_or_build(&mut self, x0: u8, xs: &[u8], ys: &[u8]) -> &Ldu {
        let key: LduKey = (x0, SmallVec::from_slice(xs), SmallVec::from_slice(ys));
        if self.inner.get(&key).is_none() {
            log::trace!("cauchy: LDU cache miss for n={}", xs.len());
            let ldu = Ldu::build(x0, xs, ys);
            self.inner.put(key.clone(), ldu);
        } else {
            log::trace!("cauchy: LDU cache hit for n={}", xs.len());
        }
        self.inner.get(&key).expect("just inserted")
    }
}

impl Default for LduCache {
    fn default() -> LduCache {
        LduCache::new()
    }
}

fn argsort(v: &[u8]) -> Vec<usize> {
    let mut idx: Vec<usize> = (0..v.len()).collect();
    idx.sort_by_key(|&i| v[i]);
    idx
}

/// Reconstructs `erasures.len()` missing originals given:
/// - `x0`: the sub-geometry's `totalOriginalCount`.
/// - `present`: `(column, payload)` pairs for originals that survived.
/// - `erasures`: the missing originals' columns.
/// - `recoveries`: `(decode_row, payload)` pairs, one per erasure, in any
///   order (need not align positionally with `erasures`).
/// - `out`: receives recovered payloads in the same order as `erasures`.
///
/// Returns `Error::DuplicateLrcIndex` if `recoveries.len() != erasures.len()`
/// (two recoveries would otherwise have to share one erased slot).
pub fn decode(
    x0: u8,
    present: &[(u8, &[u8])],
    erasures: &[u8],
    recoveries: &[(u8, &[u8])],
    out: &mut [&mut [u8]],
    cache: &mut LduCache,
) -> Result<(), Error> {
    let n = erasures.len();
    if recoveries.len() != n || out.len() != n {
        return Err(Error::DuplicateLrcIndex);
    }
    if n == 0 {
        return Ok(());
    }

    let block_bytes = recoveries[0].1.len();

    // Fast path: a single erasure recovered by the plain XOR (parity) row
    // needs no Cauchy machinery at all.
    if n == 1 && recoveries[0].0 == x0 {
        out[0].copy_from_slice(recoveries[0].1);
        for (_, data) in present {
            gf256::add_mem(out[0], data);
        }
        return Ok(());
    }

    // Eliminate the contribution of every known original from each
    // recovery row, leaving a pure function of the missing originals.
    let mut rhs: Vec<Vec<u8>> = recoveries
        .iter()
        .map(|(_, payload)| payload.to_vec())
        .collect();
    for (row_idx, (decode_row, _)) in recoveries.iter().enumerate() {
        for (y, data) in present {
            if *decode_row == x0 {
                gf256::add_mem(&mut rhs[row_idx], data);
            } else {
                let c = matrix_element(*decode_row, x0, *y);
                gf256::muladd_mem(&mut rhs[row_idx], c, data);
            }
        }
    }

    let xs: Vec<u8> = recoveries.iter().map(|(r, _)| *r).collect();
    let ys: Vec<u8> = erasures.to_vec();

    let row_perm = argsort(&xs);
    let col_perm = argsort(&ys);
    let sorted_xs: Vec<u8> = row_perm.iter().map(|&i| xs[i]).collect();
    let sorted_ys: Vec<u8> = col_perm.iter().map(|&j| ys[j]).collect();

    let mut sorted_rhs: Vec<Vec<u8>> = row_perm
        .iter()
        .map(|&i| std::mem::take(&mut rhs[i]))
        .collect();
    debug_assert!(sorted_rhs.iter().all(|v| v.len() == block_bytes));

    let ldu = cache.get_or_build(x0, &sorted_xs, &sorted_ys);
    ldu.solve(&mut sorted_rhs);

    for (sorted_j, buf) in sorted_rhs.into_iter().enumerate() {
        let original_j = col_perm[sorted_j];
        out[original_j].copy_from_slice(&buf);
    }

    Ok(())
}
