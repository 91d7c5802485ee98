use crate::ramgrid::errors::{RamGridError, Result};
use crate::ramgrid::kmer_codec::PackedKmer;
use rayon::prelude::*;

// Metric dispatch at the inner-search entry lives in
// `searcher::InnerMetric`; these kernels stay metric-agnostic.

/// Hamming distance between equal-length code slices.
pub fn hamming(a: &[u8], b: &[u8]) -> Result<u32> {
    if a.len() != b.len() {
        return Err(RamGridError::InvalidInput(format!(
            "hamming distance needs equal lengths, got {} and {}",
            a.len(),
            b.len()
        )));
    }
    Ok(a.iter().zip(b.iter()).filter(|(x, y)| x != y).count() as u32)
}

/// Hamming distance on packed k-mers.
pub fn hamming_packed(a: &PackedKmer, b: &PackedKmer) -> Result<u32> {
    hamming(&a.codes(), &b.codes())
}

/// Needleman–Wunsch edit distance with uniform cost 1 for
/// insert/delete/substitute. Two-row dynamic program.
pub fn needle(a: &[u8], b: &[u8]) -> u32 {
    needle_bounded(a, b, u32::MAX)
}

/// Edit distance divided by the longer length.
pub fn needle_normalized(a: &[u8], b: &[u8]) -> f64 {
    let max_len = a.len().max(b.len());
    if max_len == 0 {
        return 0.0;
    }
    needle(a, b) as f64 / max_len as f64
}

/// Bounded Needleman–Wunsch: once every cell of a row is at or above
/// `max_cost` no completion can do better, so the kernel returns the
/// current row minimum (a value ≥ `max_cost`) without finishing the table.
pub fn needle_bounded(a: &[u8], b: &[u8], max_cost: u32) -> u32 {
    if a.is_empty() {
        return b.len() as u32;
    }
    if b.is_empty() {
        return a.len() as u32;
    }

    let cols = b.len() + 1;
    let mut prev: Vec<u32> = (0..cols as u32).collect();
    let mut cur: Vec<u32> = vec![0; cols];

    for (i, &ca) in a.iter().enumerate() {
        cur[0] = i as u32 + 1;
        let mut row_min = cur[0];
        for (j, &cb) in b.iter().enumerate() {
            let sub = prev[j] + u32::from(ca != cb);
            let del = prev[j + 1] + 1;
            let ins = cur[j] + 1;
            cur[j + 1] = sub.min(del).min(ins);
            row_min = row_min.min(cur[j + 1]);
        }
        if row_min >= max_cost {
            return row_min;
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev[b.len()]
}

/// Bounded normalized distance: `max_frac` in `[0, 1]` caps the
/// edit fraction; the absolute bound handed to the kernel is the smallest
/// integer cost that exceeds the cap.
pub fn needle_bounded_normalized(a: &[u8], b: &[u8], max_frac: f64) -> f64 {
    let max_len = a.len().max(b.len());
    if max_len == 0 {
        return 0.0;
    }
    let max_cost = (max_frac * max_len as f64).floor() as u32 + 1;
    needle_bounded(a, b, max_cost) as f64 / max_len as f64
}

/// Edit distance on packed k-mers.
pub fn needle_packed(a: &PackedKmer, b: &PackedKmer) -> u32 {
    needle(&a.codes(), &b.codes())
}

/// All pairwise distances within one batch, row-major over `(i, j)` with
/// `i < j`. Returns `(i, j, dist)` triples.
pub fn needle_pairwise(kmers: &[PackedKmer], normalize: bool) -> Vec<(usize, usize, f64)> {
    let codes: Vec<Vec<u8>> = kmers.iter().map(|k| k.codes()).collect();
    let pairs: Vec<(usize, usize)> = (0..kmers.len())
        .flat_map(|i| ((i + 1)..kmers.len()).map(move |j| (i, j)))
        .collect();
    pairs
        .into_par_iter()
        .map(|(i, j)| {
            let d = needle(&codes[i], &codes[j]) as f64;
            let d = if normalize {
                d / codes[i].len().max(codes[j].len()).max(1) as f64
            } else {
                d
            };
            (i, j, d)
        })
        .collect()
}

/// Named distances between one pair of k-mers, used by the calibration
/// verbs to dump side-by-side metric columns.
#[derive(Debug, Clone, Copy)]
pub struct DistanceFactory {
    k: usize,
}

impl DistanceFactory {
    pub fn new(k: usize) -> Self {
        DistanceFactory { k }
    }

    /// Column labels, in the order `all_dists` emits values.
    pub fn names(&self) -> &'static [&'static str] {
        &["hamming", "needle", "needle_norm"]
    }

    /// All metric values for one pair. Hamming is absent (NaN) when the
    /// lengths differ.
    pub fn all_dists(&self, a: &PackedKmer, b: &PackedKmer) -> Result<Vec<f64>> {
        if a.len() != self.k || b.len() != self.k {
            return Err(RamGridError::InvalidInput(format!(
                "distance table is calibrated for {}-mers",
                self.k
            )));
        }
        let (ca, cb) = (a.codes(), b.codes());
        let ham = match hamming(&ca, &cb) {
            Ok(d) => d as f64,
            Err(_) => f64::NAN,
        };
        let nw = needle(&ca, &cb) as f64;
        Ok(vec![ham, nw, nw / self.k.max(1) as f64])
    }
}

/// Distances between every pair drawn from two sets, row-major over the
/// first set. Returns `(i, j, dist)` triples with `i` indexing `a`.
pub fn needle_cross(a: &[PackedKmer], b: &[PackedKmer], normalize: bool) -> Vec<(usize, usize, f64)> {
    let a_codes: Vec<Vec<u8>> = a.iter().map(|k| k.codes()).collect();
    let b_codes: Vec<Vec<u8>> = b.iter().map(|k| k.codes()).collect();
    let pairs: Vec<(usize, usize)> = (0..a.len())
        .flat_map(|i| (0..b.len()).map(move |j| (i, j)))
        .collect();
    pairs
        .into_par_iter()
        .map(|(i, j)| {
            let d = needle(&a_codes[i], &b_codes[j]) as f64;
            let d = if normalize {
                d / a_codes[i].len().max(b_codes[j].len()).max(1) as f64
            } else {
                d
            };
            (i, j, d)
        })
        .collect()
}
