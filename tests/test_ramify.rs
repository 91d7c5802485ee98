#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use ramgrid::ramgrid::dists::needle;
    use ramgrid::ramgrid::kmer_codec::{PackedKmer, BASES};
    use ramgrid::ramgrid::ramify::{rs_matrix, Ramifier, RotatingRamifier, StatisticalRam};
    use std::io::Write;

    fn random_kmer(rng: &mut StdRng, k: usize) -> String {
        (0..k).map(|_| BASES[rng.gen_range(0..4)]).collect()
    }

    /* --------------------------------------------------------------------- */
    /*  Ramanujan-sum matrix                                                 */
    /* --------------------------------------------------------------------- */

    #[test]
    fn rs_matrix_matches_hand_computed_entries() {
        let rs = rs_matrix(4);
        // Row q=1: c_1(n) = 1, phi(1) = 1, so every entry is 1/N
        for j in 0..4 {
            assert!((rs[(0, j)] - 0.25).abs() < 1e-12);
        }
        // Row q=2: c_2(n) alternates -1, +1 with n = 1 + (j-1) mod 2
        assert!((rs[(1, 0)] + 0.25).abs() < 1e-12);
        assert!((rs[(1, 1)] - 0.25).abs() < 1e-12);
        assert!((rs[(1, 2)] + 0.25).abs() < 1e-12);
        assert!((rs[(1, 3)] - 0.25).abs() < 1e-12);
    }

    #[test]
    fn rs_matrix_is_shared_per_size() {
        let a = rs_matrix(8);
        let b = rs_matrix(8);
        assert!(std::sync::Arc::ptr_eq(&a, &b));
    }

    /* --------------------------------------------------------------------- */
    /*  Ramifier                                                             */
    /* --------------------------------------------------------------------- */

    #[test]
    fn ramify_has_full_dimension() {
        let ramifier = Ramifier::new(32);
        let kmer = PackedKmer::encode(&"ATCG".repeat(8)).unwrap();
        let rft = ramifier.ramify(&kmer).unwrap();
        assert_eq!(rft.len(), 4 * 32);
    }

    #[test]
    fn ramify_equals_explicit_matrix_product() {
        // The column-sum shortcut must agree with RS * onehot
        let k = 4;
        let ramifier = Ramifier::new(k);
        let kmer = PackedKmer::encode("ACGT").unwrap();
        let rft = ramifier.ramify(&kmer).unwrap();

        let rs = rs_matrix(4 * k);
        let mut onehot = vec![0.0f64; 4 * k];
        for (i, code) in kmer.codes().iter().enumerate() {
            onehot[4 * i + *code as usize] = 1.0;
        }
        for row in 0..4 * k {
            let expected: f64 = (0..4 * k).map(|col| rs[(row, col)] * onehot[col]).sum();
            assert!((rft[row] - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn ramify_is_deterministic() {
        let ramifier = Ramifier::new(31);
        let kmer = PackedKmer::encode(&random_kmer(&mut StdRng::seed_from_u64(3), 31)).unwrap();
        assert_eq!(ramifier.ramify(&kmer).unwrap(), ramifier.ramify(&kmer).unwrap());
    }

    #[test]
    fn ramify_is_safe_to_share_across_threads() {
        let ramifier = Ramifier::new(16);
        let kmer = PackedKmer::encode(&"ACGT".repeat(4)).unwrap();
        let expected = ramifier.ramify(&kmer).unwrap();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let ramifier = ramifier.clone();
                let kmer = kmer.clone();
                std::thread::spawn(move || ramifier.ramify(&kmer).unwrap())
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), expected);
        }
    }

    #[test]
    fn ramify_rejects_wrong_length() {
        let ramifier = Ramifier::new(31);
        let kmer = PackedKmer::encode("ACGT").unwrap();
        assert!(ramifier.ramify(&kmer).is_err());
    }

    /* --------------------------------------------------------------------- */
    /*  RotatingRamifier                                                     */
    /* --------------------------------------------------------------------- */

    #[test]
    fn identity_rotation_projects_to_leading_coordinates() {
        let k = 8;
        let full = Ramifier::new(k);
        let rotating = RotatingRamifier::identity(k, 4);
        let kmer = PackedKmer::encode("ACGTACGT").unwrap();
        let rft = full.ramify(&kmer).unwrap();
        let projected = rotating.ramify(&kmer).unwrap();
        assert_eq!(projected.len(), 4);
        for d in 0..4 {
            assert!((projected[d] - rft[d]).abs() < 1e-12);
        }
    }

    #[test]
    fn rotation_artifact_loads_from_file() {
        let k = 4usize;
        let n = 4 * k;
        let center: Vec<String> = vec!["0.0".to_string(); n];
        let scale: Vec<String> = vec!["1.0".to_string(); n];
        let rows: Vec<String> = (0..n)
            .map(|r| {
                let row: Vec<String> = (0..n)
                    .map(|c| if r == c { "1.0".to_string() } else { "0.0".to_string() })
                    .collect();
                format!("[{}]", row.join(","))
            })
            .collect();
        let json = format!(
            "{{\"k\":{},\"center\":[{}],\"scale\":[{}],\"rotation\":[{}]}}",
            k,
            center.join(","),
            scale.join(","),
            rows.join(",")
        );
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let loaded = RotatingRamifier::from_file(3, file.path()).unwrap();
        let reference = RotatingRamifier::identity(k, 3);
        let kmer = PackedKmer::encode("ACGT").unwrap();
        assert_eq!(
            loaded.ramify(&kmer).unwrap(),
            reference.ramify(&kmer).unwrap()
        );
    }

    #[test]
    fn artifact_shape_mismatch_is_rejected() {
        let json = "{\"k\":4,\"center\":[0.0],\"scale\":[1.0],\"rotation\":[[1.0]]}";
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();
        assert!(RotatingRamifier::from_file(1, file.path()).is_err());
    }

    /* --------------------------------------------------------------------- */
    /*  StatisticalRam                                                       */
    /* --------------------------------------------------------------------- */

    #[test]
    fn statistical_ram_produces_well_shaped_artifact() {
        let k = 10;
        let mut rng = StdRng::seed_from_u64(17);
        let mut stat_ram = StatisticalRam::new(k);
        for _ in 0..100 {
            let kmer = PackedKmer::encode(&random_kmer(&mut rng, k)).unwrap();
            stat_ram.add_kmer(&kmer).unwrap();
        }
        assert_eq!(stat_ram.get_centers().len(), 4 * k);
        assert_eq!(stat_ram.get_scales().len(), 4 * k);
        let rotation = stat_ram.get_rotation();
        assert_eq!(rotation.dim(), (4 * k, 4 * k));
        // Eigenvector rows come back orthonormal
        for row in rotation.rows() {
            let norm: f64 = row.iter().map(|v| v * v).sum::<f64>().sqrt();
            assert!((norm - 1.0).abs() < 1e-6);
        }
        // Scales never collapse to zero
        for s in stat_ram.get_scales().iter() {
            assert!(*s > 0.0);
        }
    }

    /* --------------------------------------------------------------------- */
    /*  L1 lower-bound property                                              */
    /* --------------------------------------------------------------------- */

    #[test]
    fn embedding_distance_lower_bounds_edit_distance() {
        // |R(x) - R(y)|_1 <= C * edit(x, y) with C from calibration
        let c = 8.0;
        let k = 31;
        let rotating = RotatingRamifier::identity(k, 8);
        let mut rng = StdRng::seed_from_u64(23);
        for _ in 0..50 {
            let a = PackedKmer::encode(&random_kmer(&mut rng, k)).unwrap();
            let b = PackedKmer::encode(&random_kmer(&mut rng, k)).unwrap();
            if a == b {
                continue;
            }
            let ra = rotating.ramify(&a).unwrap();
            let rb = rotating.ramify(&b).unwrap();
            let l1: f64 = ra.iter().zip(rb.iter()).map(|(x, y)| (x - y).abs()).sum();
            let edit = needle(&a.codes(), &b.codes()) as f64;
            assert!(l1 <= c * edit);
        }
    }
}
