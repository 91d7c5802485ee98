#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use ramgrid::ramgrid::bloom::{fast_range, BloomFilter, BloomGrid, BloomParams};
    use ramgrid::ramgrid::kmer_codec::{PackedKmer, BASES};
    use std::collections::HashSet;

    fn random_kmer(rng: &mut StdRng, k: usize) -> String {
        (0..k).map(|_| BASES[rng.gen_range(0..4)]).collect()
    }

    fn splitmix64(mut z: u64) -> u64 {
        z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        (z ^ (z >> 31)) & ((1 << 63) - 1)
    }

    /* --------------------------------------------------------------------- */
    /*  fast-range reduction                                                 */
    /* --------------------------------------------------------------------- */

    #[test]
    fn fast_range_stays_in_bounds() {
        for m in [1usize, 2, 8, 77, 4096] {
            for i in 0..1000u64 {
                assert!(fast_range(splitmix64(i), m) < m);
            }
            assert!(fast_range((1u64 << 63) - 1, m) < m);
        }
    }

    #[test]
    fn fast_range_is_uniform_within_a_factor_of_two() {
        let m = 8usize;
        let n_vals = m * 10_000;
        let mut buckets = vec![0u64; m];
        for i in 0..n_vals as u64 {
            buckets[fast_range(splitmix64(i), m)] += 1;
        }
        let per_bucket = (n_vals / m) as u64;
        for &count in &buckets {
            assert!(count >= per_bucket / 2);
            assert!(count <= per_bucket * 2);
        }
    }

    /* --------------------------------------------------------------------- */
    /*  parameter derivation                                                 */
    /* --------------------------------------------------------------------- */

    #[test]
    fn params_follow_the_classic_formulas() {
        let params = BloomParams::from_probs(500, 0.01);
        // m = ceil(-n ln p / (ln 2)^2) = 4793 for n=500, p=0.01
        assert_eq!(params.n_bits, 4793);
        // h = round((m/n) ln 2) = 7
        assert_eq!(params.n_hashes, 7);
    }

    /* --------------------------------------------------------------------- */
    /*  array bloom                                                          */
    /* --------------------------------------------------------------------- */

    #[test]
    fn added_keys_are_always_found() {
        // A bloom filter never returns false negatives
        let mut rng = StdRng::seed_from_u64(5);
        let mut bf = BloomFilter::build_from_probs(500, 0.01);
        let mut keys = Vec::new();
        for _ in 0..100 {
            let kmer = PackedKmer::encode(&random_kmer(&mut rng, 31)).unwrap();
            bf.add(&kmer.codes());
            keys.push(kmer);
        }
        assert_eq!(bf.n_elements(), 100);
        for kmer in &keys {
            assert!(bf.contains(&kmer.codes()));
        }
    }

    #[test]
    fn absent_keys_are_mostly_rejected() {
        let mut rng = StdRng::seed_from_u64(29);
        let mut bf = BloomFilter::build_from_probs(200, 0.01);
        let mut added = HashSet::new();
        for _ in 0..100 {
            let kmer = random_kmer(&mut rng, 31);
            bf.add(&PackedKmer::encode(&kmer).unwrap().codes());
            added.insert(kmer);
        }
        let mut false_positives = 0;
        for _ in 0..100 {
            let probe = random_kmer(&mut rng, 31);
            if !added.contains(&probe)
                && bf.contains(&PackedKmer::encode(&probe).unwrap().codes())
            {
                false_positives += 1;
            }
        }
        assert!(false_positives <= 5);
    }

    #[test]
    fn union_and_intersection_estimates_are_sane() {
        let mut rng = StdRng::seed_from_u64(41);
        let mut bf1 = BloomFilter::build_from_probs(500, 0.01);
        let mut bf2 = BloomFilter::build_from_probs(500, 0.01);
        for _ in 0..100 {
            let shared = PackedKmer::encode(&random_kmer(&mut rng, 40)).unwrap();
            bf1.add(&shared.codes());
            bf2.add(&shared.codes());
        }
        for _ in 0..100 {
            bf1.add(&PackedKmer::encode(&random_kmer(&mut rng, 40)).unwrap().codes());
            bf2.add(&PackedKmer::encode(&random_kmer(&mut rng, 40)).unwrap().codes());
        }
        let union = bf1.union(&bf2).unwrap();
        assert!(union >= 290.0);
        assert!(union <= 410.0);
        let intersection = bf1.intersection(&bf2).unwrap();
        assert!(intersection >= -10.0);
        assert!(intersection <= 110.0);
    }

    #[test]
    fn mismatched_parameters_cannot_combine() {
        let bf1 = BloomFilter::build_from_probs(500, 0.01);
        let bf2 = BloomFilter::build_from_probs(100, 0.01);
        assert!(bf1.union(&bf2).is_err());
        assert!(bf1.intersection(&bf2).is_err());
    }

    /* --------------------------------------------------------------------- */
    /*  bloom grid                                                           */
    /* --------------------------------------------------------------------- */

    #[test]
    fn grid_remembers_every_member_window() {
        let (k, sub_k) = (31usize, 6usize);
        let mut rng = StdRng::seed_from_u64(47);
        let mut grid = BloomGrid::build_from_probs(k, sub_k, 10, 500, 0.01);
        let members: Vec<PackedKmer> = (0..10)
            .map(|_| PackedKmer::encode(&random_kmer(&mut rng, k)).unwrap())
            .collect();
        for (row, member) in members.iter().enumerate() {
            grid.add(row, member);
        }
        let n_windows = (k - sub_k + 1) as u32;
        for (row, member) in members.iter().enumerate() {
            let codes = member.codes();
            for window in codes.windows(sub_k) {
                assert!(grid.array_contains(window));
                assert!(grid.grid_contains(window)[row]);
            }
            // A member sees all of its own windows in its row
            assert_eq!(grid.count_grid_contains(member)[row], n_windows);
        }
    }

    #[test]
    fn grid_rarely_confirms_absent_sub_kmers() {
        let (k, sub_k) = (31usize, 6usize);
        let mut rng = StdRng::seed_from_u64(53);
        let mut grid = BloomGrid::build_from_probs(k, sub_k, 10, 500, 0.01);
        let mut added_windows: HashSet<Vec<u8>> = HashSet::new();
        for row in 0..10 {
            let member = PackedKmer::encode(&random_kmer(&mut rng, k)).unwrap();
            for window in member.codes().windows(sub_k) {
                added_windows.insert(window.to_vec());
            }
            grid.add(row, &member);
        }
        let mut false_positives = 0;
        for _ in 0..100 {
            let probe = PackedKmer::encode(&random_kmer(&mut rng, sub_k)).unwrap();
            let codes = probe.codes();
            if !added_windows.contains(&codes) && grid.array_contains(&codes) {
                false_positives += 1;
            }
        }
        assert!(false_positives < 5);
    }

    #[test]
    fn grid_roundtrips_through_stored_bytes() {
        let (k, sub_k) = (31usize, 7usize);
        let mut rng = StdRng::seed_from_u64(59);
        let mut grid = BloomGrid::build_from_probs(k, sub_k, 4, 200, 0.01);
        let members: Vec<PackedKmer> = (0..4)
            .map(|_| PackedKmer::encode(&random_kmer(&mut rng, k)).unwrap())
            .collect();
        for (row, member) in members.iter().enumerate() {
            grid.add(row, member);
        }
        let restored = BloomGrid::from_stored(
            k,
            sub_k,
            grid.n_rows(),
            grid.params().n_bits,
            grid.params().n_hashes,
            &grid.array_bytes(),
            &grid.grid_bytes(),
        )
        .unwrap();
        for member in &members {
            assert_eq!(
                restored.count_grid_contains(member),
                grid.count_grid_contains(member)
            );
        }
    }

    #[test]
    fn short_query_counts_nothing() {
        let grid = BloomGrid::build_from_probs(31, 6, 3, 100, 0.01);
        let short = PackedKmer::encode("ACGT").unwrap();
        assert_eq!(grid.count_grid_contains(&short), vec![0, 0, 0]);
    }
}
