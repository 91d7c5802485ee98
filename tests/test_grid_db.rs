#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use ramgrid::ramgrid::db::{GridDb, KmerRecord};
    use ramgrid::ramgrid::kmer_codec::{PackedKmer, BASES};
    use ramgrid::ramgrid::ramify::RotatingRamifier;

    const KMER_31: &str = "ATCGATCGATCGATCGATCGATCGATCGATG";
    const KMER_30: &str = "TTCGATCGATCGATCGATCGATCGATCGAC";

    fn test_db() -> GridDb {
        GridDb::in_memory(RotatingRamifier::identity(31, 4), 0.5).unwrap()
    }

    fn random_seq(rng: &mut StdRng, len: usize) -> Vec<u8> {
        (0..len).map(|_| BASES[rng.gen_range(0..4)] as u8).collect()
    }

    fn sorted_keys(db: &GridDb) -> Vec<Vec<i64>> {
        let centroids = db.centroids();
        let mut keys: Vec<Vec<i64>> = centroids
            .rows()
            .into_iter()
            .map(|row| db.key_of(&row.to_vec()))
            .collect();
        keys.sort();
        keys
    }

    fn sorted_kmers(db: &mut GridDb) -> Vec<String> {
        let mut kmers: Vec<String> = db
            .get_kmers()
            .unwrap()
            .into_iter()
            .map(|(_, kmer)| kmer.decode())
            .collect();
        kmers.sort();
        kmers
    }

    /* --------------------------------------------------------------------- */
    /*  point insertion                                                      */
    /* --------------------------------------------------------------------- */

    #[test]
    fn add_point_allocates_a_cluster() {
        let mut db = test_db();
        let kmer = PackedKmer::encode(KMER_31).unwrap();
        db.add_point(&[0.0, 0.0, 0.0, 0.0], kmer, None).unwrap();
        db.commit().unwrap();
        let members = db.get_cluster_members(0).unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].decode(), KMER_31);
    }

    #[test]
    fn same_box_shares_a_centroid() {
        let mut db = test_db();
        let a = PackedKmer::encode(&format!("{}A", KMER_30)).unwrap();
        let b = PackedKmer::encode(&format!("{}T", KMER_30)).unwrap();
        let c = PackedKmer::encode(&format!("{}C", KMER_30)).unwrap();
        db.add_point(&[0.0, 0.0, 0.0, 0.0], a, None).unwrap();
        db.add_point(&[0.2, 0.1, 0.0, 0.3], b, None).unwrap();
        db.add_point(&[1.0, 0.0, 0.0, 0.0], c, None).unwrap();
        db.commit().unwrap();
        assert_eq!(db.centroids().dim(), (2, 4));
        assert_eq!(db.get_cluster_members(0).unwrap().len(), 2);
        assert_eq!(db.get_cluster_members(1).unwrap().len(), 1);
    }

    #[test]
    fn centroid_ids_follow_insertion_order() {
        let mut db = test_db();
        let kmer = PackedKmer::encode(KMER_31).unwrap();
        let first = db.add_point(&[0.0; 4], kmer.clone(), None).unwrap();
        let second = db.add_point(&[2.0, 0.0, 0.0, 0.0], kmer.clone(), None).unwrap();
        let again = db.add_point(&[0.1, 0.1, 0.1, 0.1], kmer, None).unwrap();
        assert_eq!(first, 0);
        assert_eq!(second, 1);
        assert_eq!(again, 0);
    }

    #[test]
    fn negative_coordinates_floor_toward_minus_infinity() {
        let db = test_db();
        assert_eq!(db.key_of(&[-0.1, 0.1, 0.6, -0.6]), vec![-1, 0, 1, -2]);
    }

    #[test]
    fn missing_centroid_reads_as_empty() {
        let mut db = test_db();
        assert!(db.get_cluster_members(99).unwrap().is_empty());
    }

    /* --------------------------------------------------------------------- */
    /*  save / reload                                                        */
    /* --------------------------------------------------------------------- */

    #[test]
    fn save_and_reload_preserves_clusters() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db_save_temp.sqlite");
        {
            let mut db =
                GridDb::create(&path, RotatingRamifier::identity(31, 4), 0.5).unwrap();
            db.add_point(&[0.0; 4], PackedKmer::encode(KMER_31).unwrap(), None)
                .unwrap();
            db.commit().unwrap();
        }
        let mut db = GridDb::open(&path).unwrap();
        assert_eq!(db.k(), 31);
        assert_eq!(db.dims(), 4);
        assert_eq!(db.box_side(), 0.5);
        let members = db.get_cluster_members(0).unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].decode(), KMER_31);
    }

    /* --------------------------------------------------------------------- */
    /*  merge                                                                */
    /* --------------------------------------------------------------------- */

    #[test]
    fn merge_unions_shared_boxes_and_appends_the_rest() {
        let mut db1 = test_db();
        db1.add_point(&[0.0; 4], PackedKmer::encode(&format!("{}A", KMER_30)).unwrap(), None)
            .unwrap();
        db1.add_point(
            &[1.0, 0.0, 0.0, 0.0],
            PackedKmer::encode(&format!("{}T", KMER_30)).unwrap(),
            None,
        )
        .unwrap();
        db1.commit().unwrap();

        let mut db2 = test_db();
        db2.add_point(&[0.0; 4], PackedKmer::encode(&format!("{}C", KMER_30)).unwrap(), None)
            .unwrap();
        db2.add_point(
            &[1.0, 1.0, 0.0, 0.0],
            PackedKmer::encode(&format!("{}G", KMER_30)).unwrap(),
            None,
        )
        .unwrap();
        db2.commit().unwrap();

        db1.load_other(&mut db2).unwrap();
        assert_eq!(db1.centroids().dim(), (3, 4));
        let kmers = sorted_kmers(&mut db1);
        assert_eq!(kmers.len(), 4);
        for base in ["A", "C", "G", "T"] {
            assert!(kmers.contains(&format!("{}{}", KMER_30, base)));
        }
    }

    #[test]
    fn merge_is_order_independent_up_to_ids() {
        // Same logical contents whichever direction the merge runs
        let build_pair = || {
            let mut a = test_db();
            a.add_point(&[0.0; 4], PackedKmer::encode(&format!("{}A", KMER_30)).unwrap(), None)
                .unwrap();
            a.add_point(
                &[1.0, 0.0, 0.0, 0.0],
                PackedKmer::encode(&format!("{}T", KMER_30)).unwrap(),
                None,
            )
            .unwrap();
            a.commit().unwrap();
            let mut b = test_db();
            b.add_point(&[0.0; 4], PackedKmer::encode(&format!("{}C", KMER_30)).unwrap(), None)
                .unwrap();
            b.add_point(
                &[0.0, 1.0, 0.0, 0.0],
                PackedKmer::encode(&format!("{}G", KMER_30)).unwrap(),
                None,
            )
            .unwrap();
            b.commit().unwrap();
            (a, b)
        };

        let (mut ab, mut b) = build_pair();
        ab.load_other(&mut b).unwrap();
        let (mut a2, mut ba) = build_pair();
        ba.load_other(&mut a2).unwrap();

        assert_eq!(sorted_keys(&ab), sorted_keys(&ba));
        assert_eq!(sorted_kmers(&mut ab), sorted_kmers(&mut ba));
    }

    #[test]
    fn merge_discards_bloom_grids_of_unioned_clusters() {
        let mut db1 = test_db();
        db1.add_point(&[0.0; 4], PackedKmer::encode(KMER_31).unwrap(), None)
            .unwrap();
        db1.commit().unwrap();
        db1.build_bloom_grid(0, 6, 0.01).unwrap();
        assert!(db1.get_bloom_grid(0).unwrap().is_some());

        let mut db2 = test_db();
        db2.add_point(&[0.1; 4], PackedKmer::encode(KMER_31).unwrap(), None)
            .unwrap();
        db2.commit().unwrap();

        db1.load_other(&mut db2).unwrap();
        assert!(db1.get_bloom_grid(0).unwrap().is_none());
        assert_eq!(db1.get_cluster_members(0).unwrap().len(), 2);
    }

    #[test]
    fn merge_keeps_bloom_grids_of_appended_clusters() {
        let mut db1 = test_db();
        db1.add_point(&[0.0; 4], PackedKmer::encode(KMER_31).unwrap(), None)
            .unwrap();
        db1.commit().unwrap();

        // db2's cluster lands in a different box, so it is appended intact
        let mut db2 = test_db();
        db2.add_point(&[1.0, 0.0, 0.0, 0.0], PackedKmer::encode(KMER_31).unwrap(), None)
            .unwrap();
        db2.commit().unwrap();
        db2.build_bloom_grid(0, 6, 0.01).unwrap();

        db1.load_other(&mut db2).unwrap();
        assert_eq!(db1.centroids().dim(), (2, 4));
        let grid = db1.get_bloom_grid(1).unwrap();
        assert!(grid.is_some());
        // The copied filter still answers for the cluster's member
        let member = PackedKmer::encode(KMER_31).unwrap();
        let counts = grid.unwrap().count_grid_contains(&member);
        assert_eq!(counts, vec![31 - 6 + 1]);
    }

    #[test]
    fn merge_rejects_parameter_mismatch() {
        let mut db1 = test_db();
        let mut other_box = GridDb::in_memory(RotatingRamifier::identity(31, 4), 0.25).unwrap();
        assert!(db1.load_other(&mut other_box).is_err());
        let mut other_dims = GridDb::in_memory(RotatingRamifier::identity(31, 8), 0.5).unwrap();
        assert!(db1.load_other(&mut other_dims).is_err());
    }

    /* --------------------------------------------------------------------- */
    /*  contigs                                                              */
    /* --------------------------------------------------------------------- */

    #[test]
    fn long_contigs_split_into_blocks() {
        let mut rng = StdRng::seed_from_u64(61);
        let mut db = test_db();
        let contig = random_seq(&mut rng, 20_000);
        db.add_contig("test_genome", "test_contig", &contig, 100).unwrap();
        db.commit().unwrap();
        let stored = db.get_all_contigs().unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].start_coord, 0);
        assert_eq!(stored[1].start_coord, 10_000);
        assert_eq!(stored[1].end_coord, 20_000);
    }

    #[test]
    fn contig_kmers_carry_provenance() {
        let mut rng = StdRng::seed_from_u64(67);
        let mut db = test_db();
        let contig = random_seq(&mut rng, 200);
        db.add_contig("genome", "contig", &contig, 10).unwrap();
        db.commit().unwrap();
        let n_centroids = db.n_centroids() as i64;
        let mut n_with_provenance = 0;
        for centroid_id in 0..n_centroids {
            for KmerRecord {
                contig_id,
                contig_offset,
                ..
            } in db.get_kmer_records(centroid_id).unwrap()
            {
                assert!(contig_id.is_some());
                assert!(contig_offset.is_some());
                n_with_provenance += 1;
            }
        }
        // 200 bases, k = 31, one k-mer every 10 bases
        assert_eq!(n_with_provenance, 17);
    }

    #[test]
    fn get_sequence_slices_a_stored_block() {
        let mut db = test_db();
        let contig: Vec<u8> = b"ACGT".repeat(20);
        db.add_contig("genome", "contig", &contig, 1).unwrap();
        db.commit().unwrap();
        let stored = db.get_all_contigs().unwrap();
        let id = stored[0].id;
        assert_eq!(db.get_sequence(id, 0, 4).unwrap(), "ACGT");
        assert_eq!(db.get_sequence(id, 2, 6).unwrap(), "GTAC");
    }

    #[test]
    fn too_short_contig_is_invalid_input() {
        let mut db = test_db();
        assert!(db.add_contig("genome", "contig", b"ACGT", 1).is_err());
    }
}
