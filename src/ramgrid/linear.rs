use crate::ramgrid::db::GridDb;
use crate::ramgrid::dists::{hamming, needle_normalized};
use crate::ramgrid::errors::Result;
use crate::ramgrid::kmer_codec::PackedKmer;
use crate::ramgrid::searcher::InnerMetric;
use std::path::Path;

/// Brute-force searcher that walks every stored k-mer, bypassing the grid
/// index entirely. Used to calibrate radii and to sanity-check the
/// multi-stage pipeline against ground truth.
pub struct LinearSearcher {
    db: GridDb,
}

impl LinearSearcher {
    pub fn new(db: GridDb) -> Self {
        LinearSearcher { db }
    }

    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::new(GridDb::open(path)?))
    }

    pub fn db(&mut self) -> &mut GridDb {
        &mut self.db
    }

    /// Distance from the query to every stored k-mer, insertion order.
    /// Hamming distances for length-mismatched pairs come back as the
    /// length difference plus the overlap mismatches (the same floor the
    /// edit distance obeys); `none` reports zero for everything.
    pub fn search(&mut self, query: &str, metric: InnerMetric) -> Result<Vec<(String, f64)>> {
        let query = PackedKmer::encode(query)?.canonical();
        let query_codes = query.codes();
        let mut out = Vec::new();
        for (_, kmer) in self.db.get_kmers()? {
            let member_codes = kmer.codes();
            let dist = match metric {
                InnerMetric::Hamming => {
                    let overlap = query_codes.len().min(member_codes.len());
                    let tail = query_codes.len().abs_diff(member_codes.len());
                    hamming(&query_codes[..overlap], &member_codes[..overlap])? as f64
                        + tail as f64
                }
                InnerMetric::Needle => needle_normalized(&query_codes, &member_codes),
                InnerMetric::None => 0.0,
            };
            out.push((kmer.decode(), dist));
        }
        Ok(out)
    }
}
