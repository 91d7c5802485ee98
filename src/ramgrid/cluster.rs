use crate::ramgrid::bloom::BloomGrid;
use crate::ramgrid::kmer_codec::PackedKmer;

/// One centroid's k-mers held in memory, with the optional bloom grid used
/// to pre-screen members before the edit-distance pass.
#[derive(Debug, Clone)]
pub struct Cluster {
    pub centroid_id: i64,
    pub members: Vec<PackedKmer>,
    pub bloom_grid: Option<BloomGrid>,
}

impl Cluster {
    pub fn new(centroid_id: i64, members: Vec<PackedKmer>) -> Self {
        Cluster {
            centroid_id,
            members,
            bloom_grid: None,
        }
    }

    /// Build the cluster's bloom grid: one row per member, sized for the
    /// distinct sub-k-mers the cluster is expected to hold.
    pub fn build_bloom_grid(&mut self, k: usize, sub_k: usize, target_fp: f64) {
        let expected_n = self.members.len().max(1) * (k - sub_k + 1);
        let mut grid = BloomGrid::build_from_probs(k, sub_k, self.members.len(), expected_n, target_fp);
        for (row, member) in self.members.iter().enumerate() {
            grid.add(row, member);
        }
        self.bloom_grid = Some(grid);
    }

    /// Per-member count of query sub-k-mer windows found in the grid.
    /// Without a bloom grid every member counts as fully matched.
    pub fn count_membership(&self, query: &PackedKmer) -> Vec<u32> {
        match &self.bloom_grid {
            Some(grid) => grid.count_grid_contains(query),
            None => {
                let full = query
                    .len()
                    .saturating_sub(self.sub_k().saturating_sub(1)) as u32;
                vec![full; self.members.len()]
            }
        }
    }

    /// Member indices whose missed-window count stays within
    /// `max_filter_misses`.
    pub fn filter_members(&self, query: &PackedKmer, max_filter_misses: u32) -> Vec<usize> {
        let grid = match &self.bloom_grid {
            Some(grid) => grid,
            // No grid built for this cluster: nothing to screen on
            None => return (0..self.members.len()).collect(),
        };
        let n_windows = grid.n_windows() as u32;
        grid.count_grid_contains(query)
            .into_iter()
            .enumerate()
            .filter(|&(_, count)| n_windows.saturating_sub(count) <= max_filter_misses)
            .map(|(idx, _)| idx)
            .collect()
    }

    /// Whether `member_idx` passes the filter for this query.
    pub fn test_membership(&self, query: &PackedKmer, member_idx: usize, max_filter_misses: u32) -> bool {
        self.filter_members(query, max_filter_misses)
            .contains(&member_idx)
    }

    fn sub_k(&self) -> usize {
        self.bloom_grid.as_ref().map(|g| g.sub_k()).unwrap_or(1)
    }
}
