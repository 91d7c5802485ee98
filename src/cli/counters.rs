#[derive(Debug, Default)]
pub struct KmerIngestCounters {
    pub total: u64,
    pub ambiguous: u64,
    pub wrong_length: u64,
    pub counted: u64,
}

impl std::ops::AddAssign for KmerIngestCounters {
    fn add_assign(&mut self, other: Self) {
        self.total += other.total;
        self.ambiguous += other.ambiguous;
        self.wrong_length += other.wrong_length;
        self.counted += other.counted;
    }
}

#[derive(Debug, Default)]
pub struct ContigIngestCounters {
    pub contigs: u64,
    pub kmers: u64,
    pub blocks_skipped: u64,
    pub too_short: u64,
}

impl std::ops::AddAssign for ContigIngestCounters {
    fn add_assign(&mut self, other: Self) {
        self.contigs += other.contigs;
        self.kmers += other.kmers;
        self.blocks_skipped += other.blocks_skipped;
        self.too_short += other.too_short;
    }
}
