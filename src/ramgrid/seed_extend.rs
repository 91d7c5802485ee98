use crate::ramgrid::dists::needle;
use crate::ramgrid::errors::{RamGridError, Result};
use crate::ramgrid::kmer_codec::{canonical_windows, PackedKmer};
use crate::ramgrid::searcher::GridSearcher;
use fxhash::FxHashMap;
use log::debug;

/// A matching interval in query/target coordinates (half-open), with the
/// aligned identity of the final alignment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchingInterval {
    pub q_start: usize,
    pub q_end: usize,
    pub t_start: usize,
    pub t_end: usize,
    pub identity: f64,
}

/// A run of collinear k-mer hits on one target, before extension.
#[derive(Debug, Clone)]
pub struct SeedChain {
    pub q_start: usize,
    pub q_end: usize,
    pub t_start: usize,
    pub t_end: usize,
    pub diagonal: i64,
    pub n_hits: usize,
}

/// A reported contig hit.
#[derive(Debug, Clone)]
pub struct ContigHit {
    pub score: f64,
    pub genome_name: String,
    pub contig_name: String,
    pub contig_id: i64,
    pub interval: MatchingInterval,
}

/// Group `(q_offset, t_offset)` hits by their diagonal `t − q`, then
/// cluster each diagonal's hits into runs whose query offsets advance by
/// at most `max_gap`. Chains come back ordered by descending hit count,
/// then ascending `(q_start, t_start)`, which is the processing order of
/// the extension stage.
pub fn chain_hits(hits: &[(i64, i64)], k: usize, max_gap: i64) -> Vec<SeedChain> {
    let mut by_diag: FxHashMap<i64, Vec<i64>> = FxHashMap::default();
    for &(q, t) in hits {
        by_diag.entry(t - q).or_default().push(q);
    }

    let mut chains = Vec::new();
    let mut diagonals: Vec<i64> = by_diag.keys().copied().collect();
    diagonals.sort_unstable();
    for diagonal in diagonals {
        let mut qs = by_diag.remove(&diagonal).unwrap_or_default();
        qs.sort_unstable();
        qs.dedup();
        let mut run_start = 0usize;
        for i in 1..=qs.len() {
            let run_ends = i == qs.len() || qs[i] - qs[i - 1] > max_gap;
            if run_ends {
                let (q0, q1) = (qs[run_start], qs[i - 1]);
                chains.push(SeedChain {
                    q_start: q0 as usize,
                    q_end: q1 as usize + k,
                    t_start: (q0 + diagonal) as usize,
                    t_end: (q1 + diagonal) as usize + k,
                    diagonal,
                    n_hits: i - run_start,
                });
                run_start = i;
            }
        }
    }

    chains.sort_by(|a, b| {
        b.n_hits
            .cmp(&a.n_hits)
            .then(a.q_start.cmp(&b.q_start))
            .then(a.t_start.cmp(&b.t_start))
    });
    chains
}

/// Extend a seed chain in both directions by block alignment, one k-sized
/// block at a time, stopping when a block's identity falls below
/// `min_identity` or the target bounds `[t_min, t_max)` would be crossed.
/// The returned interval carries the identity of the full final alignment.
pub fn extend_chain(
    query: &[u8],
    target: &[u8],
    chain: &SeedChain,
    k: usize,
    min_identity: f64,
    t_min: usize,
    t_max: usize,
) -> MatchingInterval {
    let (mut q0, mut q1) = (chain.q_start, chain.q_end.min(query.len()));
    let (mut t0, mut t1) = (chain.t_start.max(t_min), chain.t_end.min(t_max));

    // leftward
    while q0 > 0 && t0 > t_min {
        let step = k.min(q0).min(t0 - t_min);
        let block_q = &query[q0 - step..q0];
        let block_t = &target[t0 - step..t0];
        let identity = 1.0 - needle(block_q, block_t) as f64 / step as f64;
        if identity < min_identity {
            break;
        }
        q0 -= step;
        t0 -= step;
    }
    // rightward
    while q1 < query.len() && t1 < t_max {
        let step = k.min(query.len() - q1).min(t_max - t1);
        let block_q = &query[q1..q1 + step];
        let block_t = &target[t1..t1 + step];
        let identity = 1.0 - needle(block_q, block_t) as f64 / step as f64;
        if identity < min_identity {
            break;
        }
        q1 += step;
        t1 += step;
    }

    let span = (q1 - q0).max(t1 - t0).max(1);
    let dist = needle(&query[q0..q1], &target[t0..t1]);
    MatchingInterval {
        q_start: q0,
        q_end: q1,
        t_start: t0,
        t_end: t1,
        identity: 1.0 - dist as f64 / span as f64,
    }
}

/// Collapse intervals of identical score that overlap or touch on the
/// target into one interval whose endpoints are the union.
pub fn merge_equal_score_overlaps(mut intervals: Vec<MatchingInterval>) -> Vec<MatchingInterval> {
    intervals.sort_by(|a, b| {
        (a.t_start, a.t_end)
            .cmp(&(b.t_start, b.t_end))
            .then(a.q_start.cmp(&b.q_start))
    });
    let mut merged: Vec<MatchingInterval> = Vec::new();
    for iv in intervals {
        match merged.last_mut() {
            Some(last)
                if iv.t_start <= last.t_end
                    && (last.identity - iv.identity).abs() < 1e-9 =>
            {
                last.q_start = last.q_start.min(iv.q_start);
                last.q_end = last.q_end.max(iv.q_end);
                last.t_start = last.t_start.min(iv.t_start);
                last.t_end = last.t_end.max(iv.t_end);
            }
            _ => merged.push(iv),
        }
    }
    merged
}

/// Run the extension stage over a chained hit list: best seed first, an
/// interval that clears `min_identity` blocks later seeds from crossing
/// it, failed extensions block nothing.
fn extend_all(
    query: &[u8],
    target: &[u8],
    chains: &[SeedChain],
    k: usize,
    min_identity: f64,
) -> Vec<MatchingInterval> {
    let mut accepted: Vec<(usize, usize)> = Vec::new();
    let mut intervals = Vec::new();
    for chain in chains {
        let seed_t0 = chain.t_start;
        let seed_t1 = chain.t_end.min(target.len());
        // The seed is consumed when a passing interval already covers it
        if accepted.iter().any(|&(a0, a1)| seed_t0 < a1 && a0 < seed_t1) {
            continue;
        }
        let t_min = accepted
            .iter()
            .filter(|&&(_, a1)| a1 <= seed_t0)
            .map(|&(_, a1)| a1)
            .max()
            .unwrap_or(0);
        let t_max = accepted
            .iter()
            .filter(|&&(a0, _)| a0 >= seed_t1)
            .map(|&(a0, _)| a0)
            .min()
            .unwrap_or(target.len());
        let interval = extend_chain(query, target, chain, k, min_identity, t_min, t_max);
        if interval.identity >= min_identity {
            accepted.push((interval.t_start, interval.t_end));
            intervals.push(interval);
        }
    }
    merge_equal_score_overlaps(intervals)
}

/// Self-contained seed-and-extend between two sequences: exact canonical
/// k-mer seeds, diagonal chaining, block extension. Used for calibration
/// and direct alignment checks; the database path goes through
/// `GridSearcher::contig_search`.
pub fn seed_extend(
    query: &[u8],
    target: &[u8],
    k: usize,
    max_gap: i64,
    min_identity: f64,
) -> Result<Vec<MatchingInterval>> {
    if query.len() < k || target.len() < k {
        return Err(RamGridError::InvalidInput(format!(
            "seed-and-extend needs both sequences at least k={} long",
            k
        )));
    }
    let mut target_index: FxHashMap<PackedKmer, Vec<usize>> = FxHashMap::default();
    for (t_off, kmer) in canonical_windows(target, k) {
        target_index.entry(kmer).or_default().push(t_off);
    }
    let mut hits: Vec<(i64, i64)> = Vec::new();
    for (q_off, kmer) in canonical_windows(query, k) {
        if let Some(t_offs) = target_index.get(&kmer) {
            for &t_off in t_offs {
                hits.push((q_off as i64, t_off as i64));
            }
        }
    }

    let query_codes = PackedKmer::from_ascii(query)?.codes();
    let target_codes = PackedKmer::from_ascii(target)?.codes();
    let chains = chain_hits(&hits, k, max_gap);
    Ok(extend_all(
        &query_codes,
        &target_codes,
        &chains,
        k,
        min_identity,
    ))
}

impl GridSearcher {
    /// Seed-and-extend search of a long query against the contig tables.
    ///
    /// Every stride-1 query window is coarse-searched with `outer_radius`;
    /// hits carrying contig provenance are grouped per contig block and
    /// diagonal, chained, extended by bounded block alignment, and
    /// reported when the query-window coverage reaches `kmer_fraction`
    /// and the aligned identity reaches `seq_identity`. Ordered by
    /// descending score, then ascending `(contig_id, t_start)`.
    pub fn contig_search(
        &mut self,
        query: &[u8],
        outer_radius: f64,
        kmer_fraction: f64,
        seq_identity: f64,
    ) -> Result<Vec<ContigHit>> {
        let k = self.k();
        if query.len() < k {
            return Err(RamGridError::InvalidInput(format!(
                "query of {} bases is shorter than k={}",
                query.len(),
                k
            )));
        }

        // Collect per-contig hit lists via coarse search
        let mut hits_by_contig: FxHashMap<i64, Vec<(i64, i64)>> = FxHashMap::default();
        let mut record_cache: FxHashMap<i64, Vec<(Option<i64>, Option<i64>)>> =
            FxHashMap::default();
        for (q_off, kmer) in canonical_windows(query, k) {
            let candidates = self.coarse_search(&kmer, outer_radius)?;
            for centroid_id in candidates {
                if !record_cache.contains_key(&centroid_id) {
                    let provenance = self
                        .db()
                        .get_kmer_records(centroid_id)?
                        .into_iter()
                        .map(|rec| (rec.contig_id, rec.contig_offset))
                        .collect();
                    record_cache.insert(centroid_id, provenance);
                }
                for &(contig_id, t_off) in &record_cache[&centroid_id] {
                    if let (Some(contig_id), Some(t_off)) = (contig_id, t_off) {
                        hits_by_contig
                            .entry(contig_id)
                            .or_default()
                            .push((q_off as i64, t_off));
                    }
                }
            }
        }
        debug!("seed hits on {} contig blocks", hits_by_contig.len());

        let query_codes = PackedKmer::from_ascii(query)?.codes();
        let n_query_windows = (query.len() - k + 1) as f64;
        let max_gap = (3 * k) as i64;

        let mut contig_ids: Vec<i64> = hits_by_contig.keys().copied().collect();
        contig_ids.sort_unstable();

        let mut results = Vec::new();
        for contig_id in contig_ids {
            let contig = self.db().get_contig(contig_id)?;
            let target_codes = contig.seq.codes();
            let hits = hits_by_contig.remove(&contig_id).unwrap_or_default();
            let chains = chain_hits(&hits, k, max_gap);
            let intervals = extend_all(&query_codes, &target_codes, &chains, k, seq_identity);
            for interval in intervals {
                let covered_windows =
                    (interval.q_end - interval.q_start).saturating_sub(k - 1) as f64;
                let coverage = covered_windows / n_query_windows;
                if coverage >= kmer_fraction && interval.identity >= seq_identity {
                    results.push(ContigHit {
                        score: interval.identity,
                        genome_name: contig.genome_name.clone(),
                        contig_name: contig.contig_name.clone(),
                        contig_id,
                        interval,
                    });
                }
            }
        }

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.contig_id.cmp(&b.contig_id))
                .then(a.interval.t_start.cmp(&b.interval.t_start))
        });
        Ok(results)
    }
}
