use crate::ramgrid::errors::{RamGridError, Result};
use crate::ramgrid::kmer_codec::PackedKmer;
use smallvec::SmallVec;

const MASK_63: u64 = (1 << 63) - 1;

/// 63-bit base hash of a sub-k-mer's per-base codes.
#[inline]
fn base_hash(key: &[u8]) -> u64 {
    fxhash::hash64(key) & MASK_63
}

/// Cheap independent mix for the i-th hash function.
#[inline]
fn mix(hash: u64, i: u32) -> u64 {
    // splitmix64 finalizer over the seeded input
    let mut z = hash.wrapping_add((i as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    (z ^ (z >> 31)) & MASK_63
}

/// Reduce a 63-bit hash to `[0, m)` without a modulo.
#[inline]
pub fn fast_range(hash: u64, m: usize) -> usize {
    ((hash as u128 * m as u128) >> 63) as usize
}

/// Shared bloom sizing: `m = ceil(−n·ln(p) / (ln 2)²)`,
/// `h = round((m/n)·ln 2)`, at least one of each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BloomParams {
    pub n_bits: usize,
    pub n_hashes: u32,
}

impl BloomParams {
    pub fn from_probs(expected_n: usize, target_fp: f64) -> Self {
        let n = expected_n.max(1) as f64;
        let ln2 = std::f64::consts::LN_2;
        let m = (-n * target_fp.ln() / (ln2 * ln2)).ceil().max(1.0) as usize;
        let h = ((m as f64 / n) * ln2).round().max(1.0) as u32;
        BloomParams {
            n_bits: m,
            n_hashes: h,
        }
    }
}

#[inline]
fn word_count(n_bits: usize) -> usize {
    (n_bits + 63) / 64
}

/// Plain bloom filter over sub-k-mer keys.
#[derive(Debug, Clone)]
pub struct BloomFilter {
    params: BloomParams,
    bits: Vec<u64>,
    n_elements: u64,
}

impl BloomFilter {
    pub fn new(params: BloomParams) -> Self {
        BloomFilter {
            bits: vec![0u64; word_count(params.n_bits)],
            params,
            n_elements: 0,
        }
    }

    pub fn build_from_probs(expected_n: usize, target_fp: f64) -> Self {
        Self::new(BloomParams::from_probs(expected_n, target_fp))
    }

    pub fn params(&self) -> BloomParams {
        self.params
    }

    pub fn n_elements(&self) -> u64 {
        self.n_elements
    }

    /// Bit positions the key maps to, one per hash function.
    fn positions(&self, key: &[u8]) -> SmallVec<[usize; 8]> {
        let h = base_hash(key);
        (0..self.params.n_hashes)
            .map(|i| fast_range(mix(h, i), self.params.n_bits))
            .collect()
    }

    pub fn add(&mut self, key: &[u8]) {
        for pos in self.positions(key) {
            self.bits[pos / 64] |= 1u64 << (pos % 64);
        }
        self.n_elements += 1;
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        self.positions(key)
            .iter()
            .all(|&pos| self.bits[pos / 64] & (1u64 << (pos % 64)) != 0)
    }

    pub fn count_set_bits(&self) -> u64 {
        self.bits.iter().map(|w| w.count_ones() as u64).sum()
    }

    /// Classical element-count estimate `−(m/h)·ln(1 − bits_set/m)`.
    pub fn estimate_elements(&self) -> f64 {
        estimate_from_bits(self.count_set_bits(), self.params)
    }

    /// Estimated size of the union of two filters with identical
    /// parameters.
    pub fn union(&self, other: &BloomFilter) -> Result<f64> {
        self.check_params(other)?;
        let set: u64 = self
            .bits
            .iter()
            .zip(other.bits.iter())
            .map(|(a, b)| (a | b).count_ones() as u64)
            .sum();
        Ok(estimate_from_bits(set, self.params))
    }

    /// Estimated intersection size via inclusion–exclusion.
    pub fn intersection(&self, other: &BloomFilter) -> Result<f64> {
        let union = self.union(other)?;
        Ok(self.estimate_elements() + other.estimate_elements() - union)
    }

    fn check_params(&self, other: &BloomFilter) -> Result<()> {
        if self.params != other.params {
            return Err(RamGridError::ParameterMismatch(format!(
                "bloom parameters differ: {:?} vs {:?}",
                self.params, other.params
            )));
        }
        Ok(())
    }
}

fn estimate_from_bits(set_bits: u64, params: BloomParams) -> f64 {
    let m = params.n_bits as f64;
    let frac = (set_bits as f64 / m).min(1.0 - 1e-12);
    -(m / params.n_hashes as f64) * (1.0 - frac).ln()
}

/// Two-level bloom structure attached to a cluster: an array bloom over
/// every length-`sub_k` window present anywhere in the cluster, plus a
/// per-member grid recording which windows each member contains.
#[derive(Debug, Clone)]
pub struct BloomGrid {
    k: usize,
    sub_k: usize,
    n_rows: usize,
    params: BloomParams,
    array_bits: Vec<u64>,
    /// Row-major `n_rows × word_count(n_bits)` bit matrix.
    grid_bits: Vec<u64>,
}

impl BloomGrid {
    pub fn new(k: usize, sub_k: usize, n_rows: usize, params: BloomParams) -> Self {
        let words = word_count(params.n_bits);
        BloomGrid {
            k,
            sub_k,
            n_rows,
            params,
            array_bits: vec![0u64; words],
            grid_bits: vec![0u64; words * n_rows],
        }
    }

    /// Derive parameters from the expected number of distinct sub-k-mers
    /// and a false-positive target, then allocate.
    pub fn build_from_probs(
        k: usize,
        sub_k: usize,
        n_rows: usize,
        expected_n: usize,
        target_fp: f64,
    ) -> Self {
        Self::new(k, sub_k, n_rows, BloomParams::from_probs(expected_n, target_fp))
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn sub_k(&self) -> usize {
        self.sub_k
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn params(&self) -> BloomParams {
        self.params
    }

    /// Number of sub-k-mer windows in a full k-mer.
    pub fn n_windows(&self) -> usize {
        self.k - self.sub_k + 1
    }

    fn positions(&self, key: &[u8]) -> SmallVec<[usize; 8]> {
        let h = base_hash(key);
        (0..self.params.n_hashes)
            .map(|i| fast_range(mix(h, i), self.params.n_bits))
            .collect()
    }

    #[inline]
    fn row_words(&self) -> usize {
        word_count(self.params.n_bits)
    }

    /// Register every sub-k-mer window of `member` under grid row `row`
    /// (and in the shared array bloom).
    pub fn add(&mut self, row: usize, member: &PackedKmer) {
        debug_assert!(row < self.n_rows);
        let codes = member.codes();
        let words = self.row_words();
        for window in codes.windows(self.sub_k) {
            for pos in self.positions(window) {
                self.array_bits[pos / 64] |= 1u64 << (pos % 64);
                self.grid_bits[row * words + pos / 64] |= 1u64 << (pos % 64);
            }
        }
    }

    /// Membership of one sub-k-mer in the cluster-wide array bloom.
    pub fn array_contains(&self, sub_codes: &[u8]) -> bool {
        self.positions(sub_codes)
            .iter()
            .all(|&pos| self.array_bits[pos / 64] & (1u64 << (pos % 64)) != 0)
    }

    /// Per-row membership of one sub-k-mer.
    pub fn grid_contains(&self, sub_codes: &[u8]) -> Vec<bool> {
        let positions = self.positions(sub_codes);
        let words = self.row_words();
        (0..self.n_rows)
            .map(|row| {
                positions
                    .iter()
                    .all(|&pos| self.grid_bits[row * words + pos / 64] & (1u64 << (pos % 64)) != 0)
            })
            .collect()
    }

    /// For each row, how many of the query's sub-k-mer windows match.
    pub fn count_grid_contains(&self, query: &PackedKmer) -> Vec<u32> {
        let codes = query.codes();
        let mut counts = vec![0u32; self.n_rows];
        if codes.len() < self.sub_k {
            return counts;
        }
        for window in codes.windows(self.sub_k) {
            // The array bloom screens the window before the row scan
            if !self.array_contains(window) {
                continue;
            }
            for (row, hit) in self.grid_contains(window).into_iter().enumerate() {
                if hit {
                    counts[row] += 1;
                }
            }
        }
        counts
    }

    // -- persistence ------------------------------------------------------

    pub fn array_bytes(&self) -> Vec<u8> {
        words_to_bytes(&self.array_bits)
    }

    pub fn grid_bytes(&self) -> Vec<u8> {
        words_to_bytes(&self.grid_bits)
    }

    pub fn from_stored(
        k: usize,
        sub_k: usize,
        n_rows: usize,
        n_bits: usize,
        n_hashes: u32,
        array_bytes: &[u8],
        grid_bytes: &[u8],
    ) -> Result<Self> {
        let params = BloomParams { n_bits, n_hashes };
        let words = word_count(n_bits);
        let array_bits = bytes_to_words(array_bytes);
        let grid_bits = bytes_to_words(grid_bytes);
        if array_bits.len() != words || grid_bits.len() != words * n_rows {
            return Err(RamGridError::InvalidInput(format!(
                "stored bloom grid has {}/{} words, expected {}/{}",
                array_bits.len(),
                grid_bits.len(),
                words,
                words * n_rows
            )));
        }
        Ok(BloomGrid {
            k,
            sub_k,
            n_rows,
            params,
            array_bits,
            grid_bits,
        })
    }
}

fn words_to_bytes(words: &[u64]) -> Vec<u8> {
    words.iter().flat_map(|w| w.to_le_bytes()).collect()
}

fn bytes_to_words(bytes: &[u8]) -> Vec<u64> {
    bytes
        .chunks(8)
        .map(|chunk| {
            let mut buf = [0u8; 8];
            buf[..chunk.len()].copy_from_slice(chunk);
            u64::from_le_bytes(buf)
        })
        .collect()
}
