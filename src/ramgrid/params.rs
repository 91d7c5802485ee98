//! Calibration constants mapping a tolerated edit count to a recommended
//! coarse-search radius and a recommended minimum sub-k-mer filter
//! overlap. Measured offline over the training corpus; the `-1` row is
//! the fallback for edit counts past the calibrated range.

/// `(edit_count, r-space radius)` rows for embeddings with `D = 8`,
/// `k = 64`.
static COARSE_RADIUS_D8_K64: &[(i32, f64)] = &[
    (0, 0.001000),
    (1, 0.012450),
    (2, 0.033463),
    (3, 0.047159),
    (4, 0.047159),
    (5, 0.047159),
    (6, 0.051325),
    (7, 0.051325),
    (8, 0.055019),
    (9, 0.055019),
    (10, 0.055019),
    (11, 0.055275),
    (12, 0.063451),
    (13, 0.063451),
    (14, 0.063451),
    (15, 0.071191),
    (16, 0.071191),
    (17, 0.071191),
    (18, 0.071191),
    (19, 0.071191),
    (20, 0.091198),
    (21, 0.091198),
    (22, 0.091198),
    (24, 0.091198),
    (25, 0.091198),
    (26, 0.091198),
    (27, 0.091198),
    (28, 0.128071),
    (29, 0.147524),
    (30, 0.151455),
    (31, 0.162224),
    (32, 0.194233),
    (33, 0.194233),
    (34, 0.194233),
    (35, 0.214527),
    (36, 0.235639),
    (37, 0.235639),
    (38, 0.237776),
    (39, 0.247015),
    (40, 0.247015),
    (41, 0.272538),
    (42, 0.281231),
    (43, 0.296970),
    (-1, 0.3),
];

/// `(edit_count, minimum filter overlap fraction)` rows for `sub_k = 6`,
/// `k = 64`.
static SUBK_FILTER_S6_K64: &[(i32, f64)] = &[
    (0, 0.950000),
    (1, 0.851724),
    (2, 0.753448),
    (3, 0.655172),
    (4, 0.573276),
    (5, 0.499153),
    (6, 0.450847),
    (7, 0.450847),
    (8, 0.386441),
    (9, 0.305932),
    (10, 0.229310),
    (11, 0.193220),
    (12, 0.177119),
    (13, 0.177119),
    (14, 0.177119),
    (15, 0.144915),
    (16, 0.144915),
    (17, 0.144915),
    (18, 0.144915),
    (19, 0.144915),
    (21, 0.064407),
    (22, 0.064407),
    (23, 0.016102),
    (24, 0.016102),
    (25, 0.016102),
    (26, 0.016102),
    (27, 0.000000),
    (-1, 0.000000),
];

/// `(edit_count, minimum filter overlap fraction)` rows for `sub_k = 7`,
/// `k = 64`.
static SUBK_FILTER_S7_K64: &[(i32, f64)] = &[
    (0, 0.950000),
    (1, 0.835345),
    (2, 0.720690),
    (3, 0.606034),
    (4, 0.491379),
    (5, 0.433333),
    (6, 0.409483),
    (7, 0.360345),
    (8, 0.327586),
    (9, 0.245690),
    (10, 0.147414),
    (11, 0.114655),
    (12, 0.098276),
    (13, 0.098276),
    (14, 0.098276),
    (15, 0.065517),
    (16, 0.065517),
    (17, 0.065517),
    (18, 0.065517),
    (19, 0.065517),
    (20, 0.016379),
    (21, 0.016379),
    (22, 0.016379),
    (23, 0.000000),
    (-1, 0.000000),
];

fn lookup(table: &[(i32, f64)], edit_count: i32) -> f64 {
    table
        .iter()
        .find(|(count, _)| *count == edit_count)
        .or_else(|| table.iter().find(|(count, _)| *count == -1))
        .map(|(_, value)| *value)
        .unwrap_or(0.0)
}

fn coarse_table(ram_dim: usize, k_len: usize) -> Option<&'static [(i32, f64)]> {
    match (ram_dim, k_len) {
        (8, 64) => Some(COARSE_RADIUS_D8_K64),
        _ => None,
    }
}

fn subk_table(sub_k_len: usize, k_len: usize) -> Option<&'static [(i32, f64)]> {
    match (sub_k_len, k_len) {
        (6, 64) => Some(SUBK_FILTER_S6_K64),
        (7, 64) => Some(SUBK_FILTER_S7_K64),
        _ => None,
    }
}

/// Picks search parameters from the calibration tables for a database's
/// `(D, k, sub_k)` triple. Combinations with no table yield `None` and
/// the caller keeps its explicit parameters.
#[derive(Debug, Clone, Copy)]
pub struct ParameterPicker {
    pub ram_dim: usize,
    pub k_len: usize,
    pub sub_k_len: usize,
}

impl ParameterPicker {
    pub fn new(ram_dim: usize, k_len: usize, sub_k_len: usize) -> Self {
        ParameterPicker {
            ram_dim,
            k_len,
            sub_k_len,
        }
    }

    fn max_diffs(&self, max_diff_rate: f64) -> i32 {
        (max_diff_rate * self.k_len as f64).ceil() as i32
    }

    /// Recommended coarse-search radius for a tolerated edit fraction.
    pub fn coarse_radius(&self, max_diff_rate: f64) -> Option<f64> {
        coarse_table(self.ram_dim, self.k_len).map(|t| lookup(t, self.max_diffs(max_diff_rate)))
    }

    /// Recommended minimum sub-k-mer overlap fraction for a tolerated
    /// edit fraction.
    pub fn min_filter_overlap(&self, max_diff_rate: f64) -> Option<f64> {
        subk_table(self.sub_k_len, self.k_len).map(|t| lookup(t, self.max_diffs(max_diff_rate)))
    }

    /// Allowed filter misses implied by the recommended overlap: the
    /// complement of the overlap fraction applied to the window count.
    pub fn max_filter_misses(&self, max_diff_rate: f64) -> Option<u32> {
        let overlap = self.min_filter_overlap(max_diff_rate)?;
        let n_windows = (self.k_len - self.sub_k_len + 1) as f64;
        Some(((1.0 - overlap) * n_windows).floor() as u32)
    }
}
