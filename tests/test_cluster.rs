#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use ramgrid::ramgrid::cluster::Cluster;
    use ramgrid::ramgrid::db::GridDb;
    use ramgrid::ramgrid::grid::GridBuilder;
    use ramgrid::ramgrid::kmer_codec::{PackedKmer, BASES};
    use ramgrid::ramgrid::ramify::RotatingRamifier;

    fn random_kmer(rng: &mut StdRng, k: usize) -> String {
        (0..k).map(|_| BASES[rng.gen_range(0..4)]).collect()
    }

    /* --------------------------------------------------------------------- */
    /*  cluster membership                                                   */
    /* --------------------------------------------------------------------- */

    #[test]
    fn own_members_pass_the_filter_with_zero_misses() {
        let (k, sub_k) = (31usize, 7usize);
        let mut rng = StdRng::seed_from_u64(157);
        let members: Vec<PackedKmer> = (0..100)
            .map(|_| PackedKmer::encode(&random_kmer(&mut rng, k)).unwrap())
            .collect();
        let mut cluster = Cluster::new(0, members.clone());
        cluster.build_bloom_grid(k, sub_k, 0.01);

        let counts = cluster.count_membership(&members[0]);
        assert_eq!(counts[0], (k - sub_k + 1) as u32);
        assert!(cluster.test_membership(&members[0], 0, 0));

        let surviving = cluster.filter_members(&members[0], 0);
        assert!(surviving.contains(&0));
    }

    #[test]
    fn random_queries_mostly_fail_a_strict_filter() {
        let (k, sub_k) = (31usize, 7usize);
        let mut rng = StdRng::seed_from_u64(163);
        let members: Vec<PackedKmer> = (0..100)
            .map(|_| PackedKmer::encode(&random_kmer(&mut rng, k)).unwrap())
            .collect();
        let mut cluster = Cluster::new(0, members);
        cluster.build_bloom_grid(k, sub_k, 0.01);

        let probe = PackedKmer::encode(&random_kmer(&mut rng, k)).unwrap();
        let counts = cluster.count_membership(&probe);
        let full = (k - sub_k + 1) as u32;
        assert!(counts.iter().all(|&c| c < full));
        assert!(!cluster.test_membership(&probe, 0, 0));
    }

    #[test]
    fn cluster_without_a_grid_screens_nothing() {
        let members = vec![PackedKmer::encode("ACGTACGTACGTACGTACGTACGTACGTACG").unwrap()];
        let cluster = Cluster::new(0, members);
        assert_eq!(cluster.filter_members(&PackedKmer::encode("AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA").unwrap(), 0), vec![0]);
    }

    /* --------------------------------------------------------------------- */
    /*  builder counters                                                     */
    /* --------------------------------------------------------------------- */

    #[test]
    fn builder_counts_skips_and_keeps() {
        let db = GridDb::in_memory(RotatingRamifier::identity(31, 4), 0.5).unwrap();
        let mut builder = GridBuilder::new(db);
        let mut rng = StdRng::seed_from_u64(167);
        builder.add_kmer_str(&random_kmer(&mut rng, 31)).unwrap();
        builder.add_kmer_str("ACGTNACGTNACGTNACGTNACGTNACGTNA").unwrap();
        builder.add_kmer_str("ACGT").unwrap();
        builder.commit().unwrap();

        assert_eq!(builder.kmer_counters.total, 3);
        assert_eq!(builder.kmer_counters.counted, 1);
        assert_eq!(builder.kmer_counters.ambiguous, 1);
        assert_eq!(builder.kmer_counters.wrong_length, 1);
        assert_eq!(builder.db.n_kmers().unwrap(), 1);
    }

    #[test]
    fn builder_offset_and_limit_select_a_slice() {
        let db = GridDb::in_memory(RotatingRamifier::identity(31, 4), 0.5).unwrap();
        let mut builder = GridBuilder::new(db);
        let mut rng = StdRng::seed_from_u64(173);
        let kmers: Vec<String> = (0..10).map(|_| random_kmer(&mut rng, 31)).collect();
        let added = builder.add_kmers(kmers.iter(), 2, 5).unwrap();
        builder.commit().unwrap();
        assert_eq!(added, 5);
        assert_eq!(builder.db.n_kmers().unwrap(), 5);
    }

    #[test]
    fn bloom_pass_covers_every_cluster() {
        let db = GridDb::in_memory(RotatingRamifier::identity(31, 4), 0.5).unwrap();
        let mut builder = GridBuilder::new(db);
        let mut rng = StdRng::seed_from_u64(179);
        for _ in 0..40 {
            builder.add_kmer_str(&random_kmer(&mut rng, 31)).unwrap();
        }
        builder.commit().unwrap();
        let n_built = builder.build_blooms(6, 0.01).unwrap();
        assert_eq!(n_built as usize, builder.db.n_centroids());
        for centroid_id in 0..builder.db.n_centroids() as i64 {
            assert!(builder.db.get_bloom_grid(centroid_id).unwrap().is_some());
        }
    }
}
