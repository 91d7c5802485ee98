use crate::ramgrid::cluster::Cluster;
use crate::ramgrid::db::GridDb;
use crate::ramgrid::dists::{hamming, needle_bounded_normalized};
use crate::ramgrid::errors::{RamGridError, Result};
use crate::ramgrid::kmer_codec::PackedKmer;
use fxhash::FxHashMap;
use log::debug;
use ndarray::{Array1, ArrayView1};
use std::fmt;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

/// Metric used to refine cluster members against the query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InnerMetric {
    /// Absolute mismatch count, equal lengths only.
    Hamming,
    /// Normalized Needleman–Wunsch distance (cost / max length).
    Needle,
    /// Accept every member that survives the bloom pre-filter.
    None,
}

impl FromStr for InnerMetric {
    type Err = RamGridError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "hamming" => Ok(InnerMetric::Hamming),
            "needle" => Ok(InnerMetric::Needle),
            "none" => Ok(InnerMetric::None),
            other => Err(RamGridError::Protocol(format!(
                "unknown inner metric {:?}",
                other
            ))),
        }
    }
}

impl fmt::Display for InnerMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InnerMetric::Hamming => write!(f, "hamming"),
            InnerMetric::Needle => write!(f, "needle"),
            InnerMetric::None => write!(f, "none"),
        }
    }
}

/// Multi-stage searcher over a grid database: coarse centroid enumeration
/// followed by bloom-screened edit-distance refinement.
///
/// Keeps an in-memory cache of recently fetched clusters; that cache is
/// the only state beyond the storage handle.
pub struct GridSearcher {
    db: GridDb,
    cluster_cache: FxHashMap<i64, Cluster>,
}

impl GridSearcher {
    pub fn new(db: GridDb) -> Self {
        GridSearcher {
            db,
            cluster_cache: FxHashMap::default(),
        }
    }

    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::new(GridDb::open(path)?))
    }

    pub fn db(&mut self) -> &mut GridDb {
        &mut self.db
    }

    pub fn k(&self) -> usize {
        self.db.k()
    }

    pub fn dims(&self) -> usize {
        self.db.dims()
    }

    /// Candidate centroid ids for a query embedding: every centroid whose
    /// L1 distance is within `outer_radius` plus the box diameter. The
    /// walk over `centroids()` is linear; centroid counts stay far below
    /// k-mer counts. Ascending id order.
    pub fn coarse_search_vector(&self, query: ArrayView1<'_, f64>, outer_radius: f64) -> Vec<i64> {
        let centroids = self.db.centroids();
        let box_diameter = self.db.box_side() * self.db.dims() as f64;
        let threshold = outer_radius + box_diameter;
        let mut hits = Vec::new();
        for (id, center) in centroids.rows().into_iter().enumerate() {
            let dist: f64 = query
                .iter()
                .zip(center.iter())
                .map(|(q, c)| (q - c).abs())
                .sum();
            if dist <= threshold {
                hits.push(id as i64);
            }
        }
        hits
    }

    /// Coarse search from a k-mer (canonicalized before embedding).
    pub fn coarse_search(&self, query: &PackedKmer, outer_radius: f64) -> Result<Vec<i64>> {
        let vector = self.db.ramifier().ramify(&query.canonical())?;
        Ok(self.coarse_search_vector(vector.view(), outer_radius))
    }

    fn cluster(&mut self, centroid_id: i64) -> Result<&Cluster> {
        if !self.cluster_cache.contains_key(&centroid_id) {
            let members = self.db.get_cluster_members(centroid_id)?;
            let mut cluster = Cluster::new(centroid_id, members);
            cluster.bloom_grid = self.db.get_bloom_grid(centroid_id)?;
            self.cluster_cache.insert(centroid_id, cluster);
        }
        Ok(&self.cluster_cache[&centroid_id])
    }

    /// Full search: coarse candidates, bloom pre-filter, then the inner
    /// metric. Results are ordered by ascending `(centroid_id,
    /// member_index)`; duplicates are the caller's concern.
    pub fn search(
        &mut self,
        query: &PackedKmer,
        outer_radius: f64,
        inner_radius: f64,
        inner_metric: InnerMetric,
        max_filter_misses: Option<u32>,
    ) -> Result<Vec<PackedKmer>> {
        let query = query.canonical();
        let candidates = self.coarse_search(&query, outer_radius)?;
        debug!("coarse search found {} candidate clusters", candidates.len());
        let query_codes = query.codes();
        let mut results = Vec::new();
        for centroid_id in candidates {
            let cluster = self.cluster(centroid_id)?;
            let surviving: Vec<usize> = match max_filter_misses {
                Some(max_misses) if cluster.bloom_grid.is_some() => {
                    cluster.filter_members(&query, max_misses)
                }
                _ => (0..cluster.members.len()).collect(),
            };
            for idx in surviving {
                let member = &cluster.members[idx];
                let keep = match inner_metric {
                    InnerMetric::Hamming => match hamming(&query_codes, &member.codes()) {
                        Ok(d) => d as f64 <= inner_radius,
                        // Length mismatch: hamming cannot apply, skip
                        Err(_) => false,
                    },
                    InnerMetric::Needle => {
                        needle_bounded_normalized(&query_codes, &member.codes(), inner_radius)
                            <= inner_radius
                    }
                    InnerMetric::None => true,
                };
                if keep {
                    results.push(member.clone());
                }
            }
        }
        Ok(results)
    }

    /// Search returning decoded strings, the wire-facing form.
    pub fn search_decoded(
        &mut self,
        query: &str,
        outer_radius: f64,
        inner_radius: f64,
        inner_metric: InnerMetric,
        max_filter_misses: Option<u32>,
    ) -> Result<Vec<String>> {
        let packed = PackedKmer::encode(query)?;
        Ok(self
            .search(&packed, outer_radius, inner_radius, inner_metric, max_filter_misses)?
            .into_iter()
            .map(|kmer| kmer.decode())
            .collect())
    }

    /// Search every query in `query_path` (k-mer table format: first
    /// comma-separated field per line), appending `query result` lines to
    /// `result_path`. Invalid queries are skipped.
    pub fn file_search(
        &mut self,
        query_path: &Path,
        result_path: &Path,
        outer_radius: f64,
        inner_radius: f64,
        inner_metric: InnerMetric,
        max_filter_misses: Option<u32>,
    ) -> Result<u64> {
        let reader = BufReader::new(std::fs::File::open(query_path)?);
        let mut writer = BufWriter::new(std::fs::File::create(result_path)?);
        let mut n_results = 0u64;
        for line in reader.lines() {
            let line = line?;
            let query = match line.split(',').next() {
                Some(q) if !q.trim().is_empty() => q.trim().to_string(),
                _ => continue,
            };
            let results = match self.search_decoded(
                &query,
                outer_radius,
                inner_radius,
                inner_metric,
                max_filter_misses,
            ) {
                Ok(results) => results,
                Err(RamGridError::InvalidInput(_)) => continue,
                Err(e) => return Err(e),
            };
            for result in results {
                writeln!(writer, "{} {}", query, result)?;
                n_results += 1;
            }
        }
        writer.flush()?;
        Ok(n_results)
    }

    /// Embedding of an arbitrary k-mer under this database's ramifier.
    pub fn ramify(&self, kmer: &PackedKmer) -> Result<Array1<f64>> {
        self.db.ramifier().ramify(kmer)
    }
}
