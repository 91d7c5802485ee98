use crate::ramgrid::bloom::BloomGrid;
use crate::ramgrid::errors::{RamGridError, Result};
use crate::ramgrid::kmer_codec::{strided_canonical_windows, PackedKmer};
use crate::ramgrid::ramify::{RotatingRamifier, RotationArtifact};
use fxhash::FxHashMap;
use log::debug;
use ndarray::Array2;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// Bump when the on-disk layout changes; mismatched files are rejected
/// at load.
pub const SCHEMA_VERSION: i64 = 1;

/// Long contigs are stored in blocks of this many bases (plus a k−1
/// overlap so no window is lost at a block boundary).
pub const CONTIG_BLOCK_LEN: usize = 10_000;

/// Default sub-k-mer length for bloom grids.
pub const DEFAULT_SUB_K: usize = 7;

/// Default bloom false-positive target.
pub const DEFAULT_BLOOM_FP: f64 = 0.01;

/// A stored contig block.
#[derive(Debug, Clone)]
pub struct ContigRecord {
    pub id: i64,
    pub genome_name: String,
    pub contig_name: String,
    pub start_coord: i64,
    pub end_coord: i64,
    pub seq: PackedKmer,
}

/// A stored k-mer with its provenance, when it came from a contig.
#[derive(Debug, Clone)]
pub struct KmerRecord {
    pub centroid_id: i64,
    pub kmer: PackedKmer,
    pub contig_id: Option<i64>,
    pub contig_offset: Option<i64>,
}

/// Durable table of centroids, k-mers, contigs, and bloom grids, plus the
/// in-memory box-key map that makes repeated inserts O(1).
///
/// Writes are buffered and flushed inside a single transaction by
/// `commit`; bulk loads may drop the secondary indices and rebuild them
/// afterwards. Every read entry point restores missing indices first, so
/// readers never observe a partially indexed file.
pub struct GridDb {
    conn: Connection,
    ramifier: RotatingRamifier,
    box_side: f64,
    /// integer box key → centroid id, mirroring the `centroids` table
    centroid_ids: FxHashMap<Vec<i64>, i64>,
    /// centroid centers in id order, mirroring the `centroids` table
    centroid_centers: Vec<Vec<f64>>,
    pending_kmers: Vec<KmerRecord>,
    pending_centroids: Vec<(i64, Vec<f64>)>,
    current_seq_coord: i64,
    indices_ready: bool,
}

impl GridDb {
    /// Create a fresh database at `path`.
    pub fn create(path: &Path, ramifier: RotatingRamifier, box_side: f64) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::init(conn, ramifier, box_side)
    }

    /// Create a fresh in-memory database (tests, scratch builds).
    pub fn in_memory(ramifier: RotatingRamifier, box_side: f64) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn, ramifier, box_side)
    }

    fn init(conn: Connection, ramifier: RotatingRamifier, box_side: f64) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS centroids (
                 id INTEGER PRIMARY KEY,
                 vector BLOB NOT NULL
             );
             CREATE TABLE IF NOT EXISTS kmers (
                 centroid_id INTEGER NOT NULL,
                 kmer BLOB NOT NULL,
                 kmer_len INTEGER NOT NULL,
                 contig_id INTEGER,
                 contig_offset INTEGER
             );
             CREATE TABLE IF NOT EXISTS contigs (
                 id INTEGER PRIMARY KEY,
                 genome_name TEXT NOT NULL,
                 contig_name TEXT NOT NULL,
                 start_coord INTEGER NOT NULL,
                 end_coord INTEGER NOT NULL,
                 seq BLOB NOT NULL,
                 seq_len INTEGER NOT NULL
             );
             CREATE TABLE IF NOT EXISTS bloom_grids (
                 centroid_id INTEGER PRIMARY KEY,
                 array_bits BLOB NOT NULL,
                 grid_bits BLOB NOT NULL,
                 n_rows INTEGER NOT NULL,
                 n_bits INTEGER NOT NULL,
                 n_hashes INTEGER NOT NULL,
                 sub_k INTEGER NOT NULL
             );
             CREATE TABLE IF NOT EXISTS meta (
                 key TEXT PRIMARY KEY,
                 value TEXT NOT NULL
             );",
        )?;
        let mut db = GridDb {
            conn,
            ramifier,
            box_side,
            centroid_ids: FxHashMap::default(),
            centroid_centers: Vec::new(),
            pending_kmers: Vec::new(),
            pending_centroids: Vec::new(),
            current_seq_coord: 0,
            indices_ready: false,
        };
        db.write_meta()?;
        db.build_indices()?;
        Ok(db)
    }

    /// Open an existing database, restoring the ramifier and the box-key
    /// map from disk. Incompatible schema versions are rejected.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        let version: i64 = Self::read_meta(&conn, "version")?
            .parse()
            .map_err(|_| RamGridError::InvalidInput("unreadable schema version".into()))?;
        if version != SCHEMA_VERSION {
            return Err(RamGridError::InvalidInput(format!(
                "database schema version {} is incompatible with {}",
                version, SCHEMA_VERSION
            )));
        }
        let dims: usize = Self::read_meta(&conn, "dims")?
            .parse()
            .map_err(|_| RamGridError::InvalidInput("unreadable dims".into()))?;
        let box_side: f64 = Self::read_meta(&conn, "box_side")?
            .parse()
            .map_err(|_| RamGridError::InvalidInput("unreadable box_side".into()))?;
        let artifact: RotationArtifact =
            serde_json::from_str(&Self::read_meta(&conn, "ramifier")?)?;
        let ramifier = RotatingRamifier::from_artifact(dims, &artifact)?;
        let current_seq_coord: i64 = Self::read_meta(&conn, "current_seq_coord")?
            .parse()
            .unwrap_or(0);

        let mut db = GridDb {
            conn,
            ramifier,
            box_side,
            centroid_ids: FxHashMap::default(),
            centroid_centers: Vec::new(),
            pending_kmers: Vec::new(),
            pending_centroids: Vec::new(),
            current_seq_coord,
            indices_ready: false,
        };
        db.reload_centroid_map()?;
        db.build_indices()?;
        Ok(db)
    }

    fn write_meta(&mut self) -> Result<()> {
        let artifact = RotationArtifact {
            k: self.ramifier.k(),
            center: self.ramifier.center().to_vec(),
            scale: self.ramifier.scale().to_vec(),
            rotation: self
                .ramifier
                .rotation()
                .rows()
                .into_iter()
                .map(|r| r.to_vec())
                .collect(),
        };
        let tx = self.conn.transaction()?;
        {
            let mut stmt =
                tx.prepare("INSERT OR REPLACE INTO meta (key, value) VALUES (?1, ?2)")?;
            stmt.execute(params!["version", SCHEMA_VERSION.to_string()])?;
            stmt.execute(params!["k", self.ramifier.k().to_string()])?;
            stmt.execute(params!["dims", self.ramifier.d().to_string()])?;
            stmt.execute(params!["box_side", self.box_side.to_string()])?;
            stmt.execute(params!["ramifier", serde_json::to_string(&artifact)?])?;
            stmt.execute(params![
                "current_seq_coord",
                self.current_seq_coord.to_string()
            ])?;
        }
        tx.commit()?;
        Ok(())
    }

    fn read_meta(conn: &Connection, key: &str) -> Result<String> {
        conn.query_row("SELECT value FROM meta WHERE key = ?1", params![key], |row| {
            row.get(0)
        })
        .optional()?
        .ok_or_else(|| RamGridError::NotFound(format!("meta key {:?}", key)))
    }

    fn reload_centroid_map(&mut self) -> Result<()> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, vector FROM centroids ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            let id: i64 = row.get(0)?;
            let blob: Vec<u8> = row.get(1)?;
            Ok((id, blob))
        })?;
        for row in rows {
            let (id, blob) = row?;
            let center = blob_to_vector(&blob);
            let key = self.key_of(&center);
            self.centroid_ids.insert(key, id);
            self.centroid_centers.push(center);
        }
        Ok(())
    }

    // -- accessors --------------------------------------------------------

    pub fn ramifier(&self) -> &RotatingRamifier {
        &self.ramifier
    }

    pub fn k(&self) -> usize {
        self.ramifier.k()
    }

    pub fn dims(&self) -> usize {
        self.ramifier.d()
    }

    pub fn box_side(&self) -> f64 {
        self.box_side
    }

    pub fn n_centroids(&self) -> usize {
        self.centroid_centers.len()
    }

    // -- point insertion --------------------------------------------------

    /// Integer box key of an embedding: `floor(v / box_side)` with IEEE
    /// floor, so negatives round toward −∞.
    pub fn key_of(&self, vector: &[f64]) -> Vec<i64> {
        vector
            .iter()
            .map(|v| (v / self.box_side).floor() as i64)
            .collect()
    }

    /// Geometric center of the box addressed by `key`.
    fn center_of_key(&self, key: &[i64]) -> Vec<f64> {
        key.iter()
            .map(|&k| (k as f64 + 0.5) * self.box_side)
            .collect()
    }

    /// Locate or allocate the centroid for an embedding and buffer the
    /// k-mer record under it. Returns the centroid id.
    pub fn add_point(
        &mut self,
        vector: &[f64],
        kmer: PackedKmer,
        provenance: Option<(i64, i64)>,
    ) -> Result<i64> {
        let key = self.key_of(vector);
        let centroid_id = match self.centroid_ids.get(&key) {
            Some(&id) => id,
            None => {
                let id = self.centroid_centers.len() as i64;
                let center = self.center_of_key(&key);
                self.centroid_centers.push(center.clone());
                self.centroid_ids.insert(key, id);
                self.pending_centroids.push((id, center));
                id
            }
        };
        let (contig_id, contig_offset) = match provenance {
            Some((c, o)) => (Some(c), Some(o)),
            None => (None, None),
        };
        self.pending_kmers.push(KmerRecord {
            centroid_id,
            kmer,
            contig_id,
            contig_offset,
        });
        Ok(centroid_id)
    }

    /// Ramify a k-mer and insert it in one step.
    pub fn add_kmer(&mut self, kmer: PackedKmer, provenance: Option<(i64, i64)>) -> Result<i64> {
        let vector = self.ramifier.ramify(&kmer)?.to_vec();
        self.add_point(&vector, kmer, provenance)
    }

    /// Flush buffered centroids and k-mers inside one transaction.
    pub fn commit(&mut self) -> Result<()> {
        if self.pending_centroids.is_empty() && self.pending_kmers.is_empty() {
            return Ok(());
        }
        let tx = self.conn.transaction()?;
        {
            let mut c_stmt =
                tx.prepare("INSERT INTO centroids (id, vector) VALUES (?1, ?2)")?;
            for (id, center) in self.pending_centroids.drain(..) {
                c_stmt.execute(params![id, vector_to_blob(&center)])?;
            }
            let mut k_stmt = tx.prepare(
                "INSERT INTO kmers (centroid_id, kmer, kmer_len, contig_id, contig_offset)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for rec in self.pending_kmers.drain(..) {
                k_stmt.execute(params![
                    rec.centroid_id,
                    rec.kmer.as_bytes(),
                    rec.kmer.len() as i64,
                    rec.contig_id,
                    rec.contig_offset,
                ])?;
            }
        }
        tx.commit()?;
        self.write_meta()?;
        Ok(())
    }

    // -- index management -------------------------------------------------

    /// Drop the secondary indices for a bulk load.
    pub fn drop_indices(&mut self) -> Result<()> {
        self.conn.execute_batch(
            "DROP INDEX IF EXISTS idx_centroid_vector;
             DROP INDEX IF EXISTS idx_kmer_centroid;",
        )?;
        self.indices_ready = false;
        Ok(())
    }

    /// (Re)create the secondary indices.
    pub fn build_indices(&mut self) -> Result<()> {
        self.conn.execute_batch(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_centroid_vector ON centroids (vector);
             CREATE INDEX IF NOT EXISTS idx_kmer_centroid ON kmers (centroid_id);",
        )?;
        self.indices_ready = true;
        Ok(())
    }

    fn ensure_indices(&mut self) -> Result<()> {
        if !self.indices_ready {
            self.build_indices()?;
        }
        Ok(())
    }

    // -- reads ------------------------------------------------------------

    /// Dense `(n_centroids, D)` array of centroid centers, id order.
    pub fn centroids(&self) -> Array2<f64> {
        let d = self.dims();
        let n = self.centroid_centers.len();
        let mut out = Array2::<f64>::zeros((n, d));
        for (i, center) in self.centroid_centers.iter().enumerate() {
            for (j, v) in center.iter().enumerate() {
                out[(i, j)] = *v;
            }
        }
        out
    }

    /// Packed members of one cluster, insertion order. Unknown ids yield
    /// an empty vector: search treats missing centroids as empty results.
    pub fn get_cluster_members(&mut self, centroid_id: i64) -> Result<Vec<PackedKmer>> {
        Ok(self
            .get_kmer_records(centroid_id)?
            .into_iter()
            .map(|rec| rec.kmer)
            .collect())
    }

    /// Full k-mer records of one cluster, insertion order.
    pub fn get_kmer_records(&mut self, centroid_id: i64) -> Result<Vec<KmerRecord>> {
        self.ensure_indices()?;
        let mut stmt = self.conn.prepare(
            "SELECT kmer, kmer_len, contig_id, contig_offset FROM kmers
             WHERE centroid_id = ?1 ORDER BY rowid",
        )?;
        let rows = stmt.query_map(params![centroid_id], |row| {
            let bytes: Vec<u8> = row.get(0)?;
            let len: i64 = row.get(1)?;
            let contig_id: Option<i64> = row.get(2)?;
            let contig_offset: Option<i64> = row.get(3)?;
            Ok((bytes, len, contig_id, contig_offset))
        })?;
        let mut out = Vec::new();
        for row in rows {
            let (bytes, len, contig_id, contig_offset) = row?;
            out.push(KmerRecord {
                centroid_id,
                kmer: PackedKmer::from_bytes(bytes, len as usize)?,
                contig_id,
                contig_offset,
            });
        }
        Ok(out)
    }

    /// Every stored `(centroid_id, kmer)` pair, insertion order.
    pub fn get_kmers(&mut self) -> Result<Vec<(i64, PackedKmer)>> {
        self.ensure_indices()?;
        let mut stmt = self
            .conn
            .prepare("SELECT centroid_id, kmer, kmer_len FROM kmers ORDER BY rowid")?;
        let rows = stmt.query_map([], |row| {
            let id: i64 = row.get(0)?;
            let bytes: Vec<u8> = row.get(1)?;
            let len: i64 = row.get(2)?;
            Ok((id, bytes, len))
        })?;
        let mut out = Vec::new();
        for row in rows {
            let (id, bytes, len) = row?;
            out.push((id, PackedKmer::from_bytes(bytes, len as usize)?));
        }
        Ok(out)
    }

    pub fn n_kmers(&mut self) -> Result<u64> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM kmers", [], |row| row.get(0))?;
        Ok(n as u64)
    }

    // -- contigs ----------------------------------------------------------

    /// Append a contig: store it in 10 kb blocks (overlapping by k−1) and
    /// index a canonical k-mer every `gap` bases. Blocks containing a
    /// non-ACGT base are skipped; the caller counts them. Returns
    /// `(n_kmers_added, n_blocks_skipped)`.
    pub fn add_contig(
        &mut self,
        genome_name: &str,
        contig_name: &str,
        seq: &[u8],
        gap: usize,
    ) -> Result<(u64, u64)> {
        let k = self.k();
        if seq.len() < k {
            return Err(RamGridError::InvalidInput(format!(
                "contig {:?} is shorter than k={}",
                contig_name, k
            )));
        }
        let contig_base = self.current_seq_coord;
        let mut n_added = 0u64;
        let mut n_skipped = 0u64;
        let mut block_start = 0usize;
        while block_start < seq.len() {
            let block_end = (block_start + CONTIG_BLOCK_LEN + k - 1).min(seq.len());
            let block = &seq[block_start..block_end];
            match PackedKmer::from_ascii(block) {
                Ok(packed) => {
                    let contig_id = self.insert_contig_record(
                        genome_name,
                        contig_name,
                        contig_base + block_start as i64,
                        contig_base + block_end as i64,
                        &packed,
                    )?;
                    for (offset, kmer) in strided_canonical_windows(block, k, gap) {
                        self.add_kmer(kmer, Some((contig_id, offset as i64)))?;
                        n_added += 1;
                    }
                }
                Err(_) => {
                    n_skipped += 1;
                }
            }
            block_start += CONTIG_BLOCK_LEN;
        }
        self.current_seq_coord += seq.len() as i64;
        Ok((n_added, n_skipped))
    }

    fn insert_contig_record(
        &mut self,
        genome_name: &str,
        contig_name: &str,
        start_coord: i64,
        end_coord: i64,
        seq: &PackedKmer,
    ) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO contigs (genome_name, contig_name, start_coord, end_coord, seq, seq_len)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                genome_name,
                contig_name,
                start_coord,
                end_coord,
                seq.as_bytes(),
                seq.len() as i64
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_all_contigs(&mut self) -> Result<Vec<ContigRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, genome_name, contig_name, start_coord, end_coord, seq, seq_len
             FROM contigs ORDER BY id",
        )?;
        let rows = stmt.query_map([], contig_from_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row??);
        }
        Ok(out)
    }

    /// One contig block by id; `NotFound` when absent (introspection
    /// callers surface this, search callers treat it as empty).
    pub fn get_contig(&mut self, contig_id: i64) -> Result<ContigRecord> {
        let rec = self
            .conn
            .query_row(
                "SELECT id, genome_name, contig_name, start_coord, end_coord, seq, seq_len
                 FROM contigs WHERE id = ?1",
                params![contig_id],
                contig_from_row,
            )
            .optional()?;
        match rec {
            Some(rec) => rec,
            None => Err(RamGridError::NotFound(format!("contig id {}", contig_id))),
        }
    }

    /// Decoded slice `[start, end)` of a stored contig block, clamped to
    /// the block.
    pub fn get_sequence(&mut self, contig_id: i64, start: usize, end: usize) -> Result<String> {
        let rec = self.get_contig(contig_id)?;
        let text = rec.seq.decode();
        let end = end.min(text.len());
        let start = start.min(end);
        Ok(text[start..end].to_string())
    }

    // -- bloom grids ------------------------------------------------------

    /// Build and persist the bloom grid for one cluster.
    pub fn build_bloom_grid(&mut self, centroid_id: i64, sub_k: usize, target_fp: f64) -> Result<()> {
        let members = self.get_cluster_members(centroid_id)?;
        if members.is_empty() {
            return Err(RamGridError::NotFound(format!(
                "centroid id {}",
                centroid_id
            )));
        }
        let mut cluster = crate::ramgrid::cluster::Cluster::new(centroid_id, members);
        cluster.build_bloom_grid(self.k(), sub_k, target_fp);
        match cluster.bloom_grid.take() {
            Some(grid) => self.store_bloom_grid(centroid_id, &grid),
            None => Ok(()),
        }
    }

    pub(crate) fn store_bloom_grid(&mut self, centroid_id: i64, grid: &BloomGrid) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO bloom_grids
             (centroid_id, array_bits, grid_bits, n_rows, n_bits, n_hashes, sub_k)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                centroid_id,
                grid.array_bytes(),
                grid.grid_bytes(),
                grid.n_rows() as i64,
                grid.params().n_bits as i64,
                grid.params().n_hashes as i64,
                grid.sub_k() as i64
            ],
        )?;
        Ok(())
    }

    /// Load a stored bloom grid; `None` when the cluster has none (merges
    /// discard them until rebuilt).
    pub fn get_bloom_grid(&mut self, centroid_id: i64) -> Result<Option<BloomGrid>> {
        let k = self.k();
        let row = self
            .conn
            .query_row(
                "SELECT array_bits, grid_bits, n_rows, n_bits, n_hashes, sub_k
                 FROM bloom_grids WHERE centroid_id = ?1",
                params![centroid_id],
                |row| {
                    let array_bits: Vec<u8> = row.get(0)?;
                    let grid_bits: Vec<u8> = row.get(1)?;
                    let n_rows: i64 = row.get(2)?;
                    let n_bits: i64 = row.get(3)?;
                    let n_hashes: i64 = row.get(4)?;
                    let sub_k: i64 = row.get(5)?;
                    Ok((array_bits, grid_bits, n_rows, n_bits, n_hashes, sub_k))
                },
            )
            .optional()?;
        match row {
            Some((array_bits, grid_bits, n_rows, n_bits, n_hashes, sub_k)) => {
                Ok(Some(BloomGrid::from_stored(
                    k,
                    sub_k as usize,
                    n_rows as usize,
                    n_bits as usize,
                    n_hashes as u32,
                    &array_bits,
                    &grid_bits,
                )?))
            }
            None => Ok(None),
        }
    }

    // -- merge ------------------------------------------------------------

    /// Merge another database into this one.
    ///
    /// Clusters sharing an integer box key are unioned and their bloom
    /// grids discarded; other centroids are appended under fresh ids.
    /// Contig ids are remapped. Idempotent modulo id reassignment.
    pub fn load_other(&mut self, other: &mut GridDb) -> Result<()> {
        if other.k() != self.k()
            || other.dims() != self.dims()
            || (other.box_side() - self.box_side()).abs() > f64::EPSILON
        {
            return Err(RamGridError::ParameterMismatch(format!(
                "cannot merge (k={}, dims={}, box_side={}) into (k={}, dims={}, box_side={})",
                other.k(),
                other.dims(),
                other.box_side(),
                self.k(),
                self.dims(),
                self.box_side()
            )));
        }

        self.drop_indices()?;

        // Contig blocks first so k-mer provenance can be remapped
        let mut contig_map: FxHashMap<i64, i64> = FxHashMap::default();
        for contig in other.get_all_contigs()? {
            let new_id = self.insert_contig_record(
                &contig.genome_name,
                &contig.contig_name,
                self.current_seq_coord + contig.start_coord,
                self.current_seq_coord + contig.end_coord,
                &contig.seq,
            )?;
            contig_map.insert(contig.id, new_id);
        }
        self.current_seq_coord += other.current_seq_coord;

        let n_other = other.centroids().nrows();
        for other_id in 0..n_other as i64 {
            let center = other.centroid_centers[other_id as usize].clone();
            let key = self.key_of(&center);
            let (local_id, unioned) = match self.centroid_ids.get(&key) {
                Some(&id) => (id, true),
                None => {
                    let id = self.centroid_centers.len() as i64;
                    self.centroid_centers.push(center.clone());
                    self.centroid_ids.insert(key, id);
                    self.pending_centroids.push((id, center));
                    (id, false)
                }
            };
            for rec in other.get_kmer_records(other_id)? {
                let contig_id = rec.contig_id.and_then(|c| contig_map.get(&c).copied());
                let provenance = match (contig_id, rec.contig_offset) {
                    (Some(c), Some(o)) => Some((c, o)),
                    _ => None,
                };
                self.pending_kmers.push(KmerRecord {
                    centroid_id: local_id,
                    kmer: rec.kmer,
                    contig_id: provenance.map(|p| p.0),
                    contig_offset: provenance.map(|p| p.1),
                });
            }
            if unioned {
                // The union invalidates the stored filter; it must be rebuilt
                self.conn.execute(
                    "DELETE FROM bloom_grids WHERE centroid_id = ?1",
                    params![local_id],
                )?;
            } else if let Some(grid) = other.get_bloom_grid(other_id)? {
                // Appended wholesale: membership is unchanged, the stored
                // filter stays valid under the new id
                self.store_bloom_grid(local_id, &grid)?;
            }
        }
        debug!(
            "merged {} centroids / {} contig blocks",
            n_other,
            contig_map.len()
        );
        self.commit()?;
        self.build_indices()?;
        Ok(())
    }
}

fn contig_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Result<ContigRecord>> {
    let id: i64 = row.get(0)?;
    let genome_name: String = row.get(1)?;
    let contig_name: String = row.get(2)?;
    let start_coord: i64 = row.get(3)?;
    let end_coord: i64 = row.get(4)?;
    let bytes: Vec<u8> = row.get(5)?;
    let seq_len: i64 = row.get(6)?;
    Ok(PackedKmer::from_bytes(bytes, seq_len as usize).map(|seq| ContigRecord {
        id,
        genome_name,
        contig_name,
        start_coord,
        end_coord,
        seq,
    }))
}

fn vector_to_blob(vector: &[f64]) -> Vec<u8> {
    vector.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn blob_to_vector(blob: &[u8]) -> Vec<f64> {
    blob.chunks_exact(8)
        .map(|chunk| {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(chunk);
            f64::from_le_bytes(buf)
        })
        .collect()
}
