use crate::cli::counters::{ContigIngestCounters, KmerIngestCounters};
use crate::ramgrid::cluster::Cluster;
use crate::ramgrid::db::GridDb;
use crate::ramgrid::errors::{RamGridError, Result};
use crate::ramgrid::kmer_codec::PackedKmer;
use log::info;
use rayon::prelude::*;

/// Feeds k-mers and contigs into a `GridDb`, tracking what was skipped.
///
/// Insertion order is deterministic for a single thread: two k-mers
/// landing in the same new box allocate the earlier one's centroid first.
pub struct GridBuilder {
    pub db: GridDb,
    pub kmer_counters: KmerIngestCounters,
    pub contig_counters: ContigIngestCounters,
}

impl GridBuilder {
    pub fn new(db: GridDb) -> Self {
        GridBuilder {
            db,
            kmer_counters: KmerIngestCounters::default(),
            contig_counters: ContigIngestCounters::default(),
        }
    }

    /// Add one k-mer string in canonical form. Non-ACGT input is a skip,
    /// not an error.
    pub fn add_kmer_str(&mut self, kmer: &str) -> Result<()> {
        self.kmer_counters.total += 1;
        let packed = match PackedKmer::encode(kmer) {
            Ok(packed) => packed.canonical(),
            Err(RamGridError::InvalidInput(_)) => {
                self.kmer_counters.ambiguous += 1;
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        if packed.len() != self.db.k() {
            self.kmer_counters.wrong_length += 1;
            return Ok(());
        }
        self.db.add_kmer(packed, None)?;
        self.kmer_counters.counted += 1;
        Ok(())
    }

    /// Bulk-add k-mer strings, e.g. from a k-mer table. `num_to_add` of 0
    /// means no limit; `start_offset` skips that many leading records.
    pub fn add_kmers<I>(&mut self, kmers: I, start_offset: usize, num_to_add: usize) -> Result<u64>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let before = self.kmer_counters.counted;
        for (i, kmer) in kmers.into_iter().enumerate() {
            if i < start_offset {
                continue;
            }
            if num_to_add > 0 && i >= start_offset + num_to_add {
                break;
            }
            self.add_kmer_str(kmer.as_ref())?;
        }
        Ok(self.kmer_counters.counted - before)
    }

    /// Add a contig, indexing a canonical k-mer every `gap` bases.
    pub fn add_contig(
        &mut self,
        genome_name: &str,
        contig_name: &str,
        seq: &[u8],
        gap: usize,
    ) -> Result<u64> {
        self.contig_counters.contigs += 1;
        match self.db.add_contig(genome_name, contig_name, seq, gap) {
            Ok((n_added, n_skipped)) => {
                self.contig_counters.kmers += n_added;
                self.contig_counters.blocks_skipped += n_skipped;
                Ok(n_added)
            }
            Err(RamGridError::InvalidInput(_)) => {
                self.contig_counters.too_short += 1;
                Ok(0)
            }
            Err(e) => Err(e),
        }
    }

    pub fn commit(&mut self) -> Result<()> {
        self.db.commit()
    }

    /// Post-build pass: build and persist a bloom grid for every cluster.
    /// Grid construction is CPU-bound and runs on the rayon pool; the
    /// writes stay serial on the storage handle.
    pub fn build_blooms(&mut self, sub_k: usize, target_fp: f64) -> Result<u64> {
        let n_centroids = self.db.n_centroids() as i64;
        let k = self.db.k();
        let mut clusters = Vec::with_capacity(n_centroids as usize);
        for centroid_id in 0..n_centroids {
            let members = self.db.get_cluster_members(centroid_id)?;
            if !members.is_empty() {
                clusters.push(Cluster::new(centroid_id, members));
            }
        }
        clusters
            .par_iter_mut()
            .for_each(|cluster| cluster.build_bloom_grid(k, sub_k, target_fp));
        let n_built = clusters.len() as u64;
        for cluster in clusters {
            if let Some(grid) = &cluster.bloom_grid {
                self.db.store_bloom_grid(cluster.centroid_id, grid)?;
            }
        }
        info!("built {} bloom grids (sub_k={})", n_built, sub_k);
        Ok(n_built)
    }

    pub fn into_db(self) -> GridDb {
        self.db
    }
}
