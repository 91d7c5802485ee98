use crate::ramgrid::errors::{RamGridError, Result};
use crate::ramgrid::kmer_codec::PackedKmer;
use fxhash::FxHashMap;
use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::path::Path;
use std::sync::{Arc, LazyLock, Mutex};

/// Euler's totient of `n`.
fn phi(n: usize) -> usize {
    (1..=n).filter(|k| gcd(n, *k) == 1).count()
}

fn gcd(a: usize, b: usize) -> usize {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

/// Real part of the Ramanujan sum c_q(n):
/// sum of exp(2πi·n·p/q) over 1 ≤ p ≤ q with gcd(p, q) = 1.
fn ram_sum(n: usize, q: usize) -> f64 {
    (1..=q)
        .filter(|p| gcd(*p, q) == 1)
        .map(|p| (2.0 * PI * n as f64 * p as f64 / q as f64).cos())
        .sum()
}

/// Build the normalized Ramanujan-sum matrix for size `n`:
/// `RS[q, j] = (1 / (φ(q)·N)) · c_q(1 + (j−1) mod q)` with q, j 1-based.
fn build_rs_matrix(n: usize) -> Array2<f64> {
    Array2::from_shape_fn((n, n), |(qi, ji)| {
        let (q, j) = (qi + 1, ji + 1);
        ram_sum(1 + (j - 1) % q, q) / (phi(q) as f64 * n as f64)
    })
}

// The matrix is a per-N constant; computed lazily once per process and
// shared read-only afterwards.
static RS_CACHE: LazyLock<Mutex<FxHashMap<usize, Arc<Array2<f64>>>>> =
    LazyLock::new(|| Mutex::new(FxHashMap::default()));

/// Fetch (building on first use) the shared RS matrix for size `n`.
pub fn rs_matrix(n: usize) -> Arc<Array2<f64>> {
    let mut cache = RS_CACHE.lock().unwrap_or_else(|e| e.into_inner());
    cache
        .entry(n)
        .or_insert_with(|| Arc::new(build_rs_matrix(n)))
        .clone()
}

/// Embeds a k-mer into a 4k-dimensional real vector by multiplying its
/// one-hot indicator expansion with the Ramanujan-sum matrix.
///
/// Safe to share across threads once constructed.
#[derive(Clone)]
pub struct Ramifier {
    k: usize,
    rs: Arc<Array2<f64>>,
}

impl Ramifier {
    pub fn new(k: usize) -> Self {
        Ramifier {
            k,
            rs: rs_matrix(4 * k),
        }
    }

    pub fn k(&self) -> usize {
        self.k
    }

    /// Full 4k-dimensional embedding.
    pub fn ramify(&self, kmer: &PackedKmer) -> Result<Array1<f64>> {
        if kmer.len() != self.k {
            return Err(RamGridError::InvalidInput(format!(
                "expected a {}-mer, got {} bases",
                self.k,
                kmer.len()
            )));
        }
        // One-hot indicator: position i contributes a 1 at 4i + code.
        // RS·onehot collapses to summing one RS column per position.
        let n = 4 * self.k;
        let mut out = Array1::<f64>::zeros(n);
        for i in 0..self.k {
            let col = 4 * i + kmer.code_at(i) as usize;
            out += &self.rs.column(col);
        }
        Ok(out)
    }
}

/// On-disk rotation artifact: precomputed centering, scaling, and PCA
/// rotation for a fixed k. Only the first D rows of `rotation` are used
/// at load time.
#[derive(Debug, Serialize, Deserialize)]
pub struct RotationArtifact {
    pub k: usize,
    pub center: Vec<f64>,
    pub scale: Vec<f64>,
    pub rotation: Vec<Vec<f64>>,
}

/// A `Ramifier` composed with centering, scaling, and a projection down to
/// `d` dimensions. This is the embedding the grid index is built on.
#[derive(Clone)]
pub struct RotatingRamifier {
    ramifier: Ramifier,
    d: usize,
    center: Array1<f64>,
    scale: Array1<f64>,
    /// d × 4k projection.
    rotation: Array2<f64>,
}

impl RotatingRamifier {
    pub fn new(
        k: usize,
        d: usize,
        center: Array1<f64>,
        scale: Array1<f64>,
        rotation: Array2<f64>,
    ) -> Result<Self> {
        let n = 4 * k;
        if center.len() != n || scale.len() != n {
            return Err(RamGridError::InvalidInput(format!(
                "center/scale must have length {}, got {}/{}",
                n,
                center.len(),
                scale.len()
            )));
        }
        if rotation.nrows() < d || rotation.ncols() != n {
            return Err(RamGridError::InvalidInput(format!(
                "rotation of shape {}x{} cannot project {} dims to {}",
                rotation.nrows(),
                rotation.ncols(),
                n,
                d
            )));
        }
        let rotation = rotation.slice(ndarray::s![..d, ..]).to_owned();
        Ok(RotatingRamifier {
            ramifier: Ramifier::new(k),
            d,
            center,
            scale,
            rotation,
        })
    }

    /// Load from a rotation artifact JSON file, keeping `d` dimensions.
    pub fn from_file(d: usize, path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let artifact: RotationArtifact = serde_json::from_str(&text)?;
        Self::from_artifact(d, &artifact)
    }

    pub fn from_artifact(d: usize, artifact: &RotationArtifact) -> Result<Self> {
        let n = 4 * artifact.k;
        let mut rotation = Array2::<f64>::zeros((artifact.rotation.len(), n));
        for (r, row) in artifact.rotation.iter().enumerate() {
            if row.len() != n {
                return Err(RamGridError::InvalidInput(format!(
                    "rotation row {} has length {}, expected {}",
                    r,
                    row.len(),
                    n
                )));
            }
            for (c, v) in row.iter().enumerate() {
                rotation[(r, c)] = *v;
            }
        }
        Self::new(
            artifact.k,
            d,
            Array1::from_vec(artifact.center.clone()),
            Array1::from_vec(artifact.scale.clone()),
            rotation,
        )
    }

    /// Identity projection with zero center and unit scale. Deterministic
    /// stand-in used by tests and calibration runs.
    pub fn identity(k: usize, d: usize) -> Self {
        let n = 4 * k;
        let mut rotation = Array2::<f64>::zeros((d, n));
        for i in 0..d.min(n) {
            rotation[(i, i)] = 1.0;
        }
        RotatingRamifier {
            ramifier: Ramifier::new(k),
            d,
            center: Array1::zeros(n),
            scale: Array1::ones(n),
            rotation,
        }
    }

    pub fn k(&self) -> usize {
        self.ramifier.k()
    }

    pub fn d(&self) -> usize {
        self.d
    }

    pub fn center(&self) -> ArrayView1<'_, f64> {
        self.center.view()
    }

    pub fn scale(&self) -> ArrayView1<'_, f64> {
        self.scale.view()
    }

    pub fn rotation(&self) -> &Array2<f64> {
        &self.rotation
    }

    /// D-dimensional embedding: ramify, center, scale, rotate.
    pub fn ramify(&self, kmer: &PackedKmer) -> Result<Array1<f64>> {
        let rft = self.ramifier.ramify(kmer)?;
        let standardized = (rft - &self.center) / &self.scale;
        Ok(self.rotation.dot(&standardized))
    }
}

/// Accumulates ramified training k-mers and derives the rotation artifact:
/// per-coordinate center (mean) and scale (stddev), plus a PCA rotation of
/// the standardized embeddings.
pub struct StatisticalRam {
    ramifier: Ramifier,
    rfts: Vec<Array1<f64>>,
}

impl StatisticalRam {
    pub fn new(k: usize) -> Self {
        StatisticalRam {
            ramifier: Ramifier::new(k),
            rfts: Vec::new(),
        }
    }

    pub fn k(&self) -> usize {
        self.ramifier.k()
    }

    pub fn len(&self) -> usize {
        self.rfts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rfts.is_empty()
    }

    pub fn add_kmer(&mut self, kmer: &PackedKmer) -> Result<()> {
        self.rfts.push(self.ramifier.ramify(kmer)?);
        Ok(())
    }

    pub fn get_centers(&self) -> Array1<f64> {
        let n = 4 * self.ramifier.k();
        let mut sum = Array1::<f64>::zeros(n);
        for rft in &self.rfts {
            sum += rft;
        }
        sum / self.rfts.len().max(1) as f64
    }

    pub fn get_scales(&self) -> Array1<f64> {
        let centers = self.get_centers();
        let n = 4 * self.ramifier.k();
        let mut sq = Array1::<f64>::zeros(n);
        for rft in &self.rfts {
            let diff = rft - &centers;
            sq += &(&diff * &diff);
        }
        sq /= self.rfts.len().max(1) as f64;
        // Guard flat coordinates so standardization never divides by zero
        sq.mapv(|v| if v.sqrt() > 1e-12 { v.sqrt() } else { 1.0 })
    }

    /// PCA rotation of the standardized embeddings: eigenvectors of the
    /// covariance matrix as rows, ordered by descending eigenvalue.
    pub fn get_rotation(&self) -> Array2<f64> {
        let centers = self.get_centers();
        let scales = self.get_scales();
        let n = 4 * self.ramifier.k();
        let m = self.rfts.len().max(1) as f64;

        let mut cov = Array2::<f64>::zeros((n, n));
        for rft in &self.rfts {
            let z = (rft - &centers) / &scales;
            for i in 0..n {
                for j in i..n {
                    cov[(i, j)] += z[i] * z[j];
                }
            }
        }
        for i in 0..n {
            for j in i..n {
                cov[(i, j)] /= m;
                cov[(j, i)] = cov[(i, j)];
            }
        }

        let (eigvals, eigvecs) = jacobi_eigen(&cov);
        // Sort eigenvector rows by descending eigenvalue
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| {
            eigvals[b]
                .partial_cmp(&eigvals[a])
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let mut rotation = Array2::<f64>::zeros((n, n));
        for (row, &src) in order.iter().enumerate() {
            for c in 0..n {
                rotation[(row, c)] = eigvecs[(c, src)];
            }
        }
        rotation
    }

    pub fn to_artifact(&self) -> RotationArtifact {
        RotationArtifact {
            k: self.ramifier.k(),
            center: self.get_centers().to_vec(),
            scale: self.get_scales().to_vec(),
            rotation: self
                .get_rotation()
                .rows()
                .into_iter()
                .map(|r| r.to_vec())
                .collect(),
        }
    }
}

/// Cyclic Jacobi eigendecomposition of a symmetric matrix. Returns
/// (eigenvalues, eigenvectors-as-columns).
fn jacobi_eigen(mat: &Array2<f64>) -> (Vec<f64>, Array2<f64>) {
    let n = mat.nrows();
    let mut a = mat.clone();
    let mut v = Array2::<f64>::eye(n);

    for _sweep in 0..64 {
        let mut off = 0.0;
        for i in 0..n {
            for j in (i + 1)..n {
                off += a[(i, j)] * a[(i, j)];
            }
        }
        if off.sqrt() < 1e-12 {
            break;
        }
        for p in 0..n {
            for q in (p + 1)..n {
                if a[(p, q)].abs() < 1e-15 {
                    continue;
                }
                let theta = (a[(q, q)] - a[(p, p)]) / (2.0 * a[(p, q)]);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;
                for i in 0..n {
                    let aip = a[(i, p)];
                    let aiq = a[(i, q)];
                    a[(i, p)] = c * aip - s * aiq;
                    a[(i, q)] = s * aip + c * aiq;
                }
                for j in 0..n {
                    let apj = a[(p, j)];
                    let aqj = a[(q, j)];
                    a[(p, j)] = c * apj - s * aqj;
                    a[(q, j)] = s * apj + c * aqj;
                }
                for i in 0..n {
                    let vip = v[(i, p)];
                    let viq = v[(i, q)];
                    v[(i, p)] = c * vip - s * viq;
                    v[(i, q)] = s * vip + c * viq;
                }
            }
        }
    }

    let eigvals = (0..n).map(|i| a[(i, i)]).collect();
    (eigvals, v)
}
