use single_enrichment::cluster::{ClusterConfig, Linkage, cluster_sets, hclust};
use single_enrichment::sets::{SetCollection, SimilarityKind, min_cluster_size, pairwise_similarity};
use single_enrichment::testing::correction::{AdjustMethod, adjust_p_values};

#[cfg(test)]
mod cluster_tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::Array2;
    use proptest::prelude::*;

    fn pathways() -> SetCollection {
        SetCollection::new(vec![
            ("glycolysis", vec!["HK1", "PFKM", "ALDOA", "GAPDH", "PGK1", "ENO1"]),
            ("glycolysis_core", vec!["HK1", "PFKM", "ALDOA", "GAPDH", "PGK1"]),
            ("tca_cycle", vec!["CS", "ACO2", "IDH3A", "OGDH", "SDHA", "FH", "MDH2"]),
            ("tca_short", vec!["CS", "ACO2", "IDH3A", "OGDH", "SDHA", "FH"]),
            ("heme", vec!["ALAS1", "HMBS"]),
        ])
        .unwrap()
    }

    #[test]
    fn test_redundant_pathways_are_grouped() {
        // Jaccard 5/6 and 6/7 both reach 0.8
        let config = ClusterConfig::new().with_cutoff(0.8);
        let clusters = cluster_sets(&pathways(), &config).unwrap();

        let by_name = |name: &str| clusters.iter().find(|c| c.set == name).unwrap().cluster;
        assert_eq!(by_name("glycolysis"), by_name("glycolysis_core"));
        assert_eq!(by_name("tca_cycle"), by_name("tca_short"));
        assert_ne!(by_name("glycolysis"), by_name("tca_cycle"));
        assert_eq!(by_name("heme"), 3);

        let order: Vec<&str> = clusters.iter().map(|c| c.set.as_str()).collect();
        assert_eq!(
            order,
            vec!["glycolysis", "glycolysis_core", "tca_cycle", "tca_short", "heme"]
        );
    }

    #[test]
    fn test_cutoff_between_pair_similarities() {
        // 5/6 = 0.833 < 0.85 <= 6/7 = 0.857
        let clusters = cluster_sets(&pathways(), &ClusterConfig::default()).unwrap();
        let by_name = |name: &str| clusters.iter().find(|c| c.set == name).unwrap().cluster;

        assert_eq!(by_name("tca_cycle"), 1);
        assert_eq!(by_name("tca_short"), 1);
        // isolated sets follow in collection order
        assert_eq!(by_name("glycolysis"), 2);
        assert_eq!(by_name("glycolysis_core"), 3);
        assert_eq!(by_name("heme"), 4);
    }

    #[test]
    fn test_overlap_links_subsets() {
        let config = ClusterConfig::new()
            .with_similarity(SimilarityKind::Overlap)
            .with_cutoff(1.0);
        let clusters = cluster_sets(&pathways(), &config).unwrap();
        let by_name = |name: &str| clusters.iter().find(|c| c.set == name).unwrap().cluster;

        assert_eq!(by_name("glycolysis"), by_name("glycolysis_core"));
        assert_eq!(by_name("tca_cycle"), by_name("tca_short"));
    }

    #[test]
    fn test_set_size_reported() {
        let clusters = cluster_sets(&pathways(), &ClusterConfig::default()).unwrap();
        let heme = clusters.iter().find(|c| c.set == "heme").unwrap();
        assert_eq!(heme.set_size, 2);
    }

    #[test]
    fn test_similarity_matrix_symmetry() {
        for kind in [SimilarityKind::Jaccard, SimilarityKind::Overlap, SimilarityKind::Otsuka] {
            let sim = pairwise_similarity(&pathways(), kind).unwrap();
            assert_eq!(sim.dim(), (5, 5));
            for i in 0..5 {
                assert_relative_eq!(sim[[i, i]], 1.0);
                for j in 0..5 {
                    assert_relative_eq!(sim[[i, j]], sim[[j, i]]);
                    assert!((0.0..=1.0).contains(&sim[[i, j]]));
                }
            }
        }
    }

    #[test]
    fn test_min_cluster_size_predicts_singletons() {
        let threshold = min_cluster_size(SimilarityKind::Jaccard, 0.85).unwrap();
        assert_eq!(threshold.min_set_size, 6);

        // a five-gene set can only reach 0.85 with a duplicate
        let sets = SetCollection::new(vec![
            ("five", vec!["a", "b", "c", "d", "e"]),
            ("five_plus", vec!["a", "b", "c", "d", "e", "f"]),
        ])
        .unwrap();
        let clusters = cluster_sets(&sets, &ClusterConfig::default()).unwrap();
        assert_ne!(clusters[0].cluster, clusters[1].cluster);
    }

    #[test]
    fn test_ward_d2_heights_are_distances() {
        let d = Array2::from_shape_vec((3, 3), vec![0.0, 0.3, 0.9, 0.3, 0.0, 0.8, 0.9, 0.8, 0.0]).unwrap();
        let tree = hclust(&d, Linkage::WardD2).unwrap();
        assert_relative_eq!(tree.merges()[0].height, 0.3, epsilon = 1e-12);
        assert_eq!(tree.n_observations(), 3);
    }

    #[test]
    fn test_centroid_non_monotone_cut_fails() {
        // equilateral triangle: the centroid of a merged pair is closer to the third point
        let d = Array2::from_shape_vec((3, 3), vec![0.0, 1.0, 1.0, 1.0, 0.0, 1.0, 1.0, 1.0, 0.0]).unwrap();
        let tree = hclust(&d, Linkage::Centroid).unwrap();
        assert_relative_eq!(tree.merges()[1].height, 0.75, epsilon = 1e-12);
        assert!(tree.cut_height(0.9).is_err());
    }

    fn arb_sets() -> impl Strategy<Value = Vec<Vec<u8>>> {
        prop::collection::vec(prop::collection::vec(0u8..12, 1..8), 1..10)
    }

    proptest! {
        #[test]
        fn prop_every_set_gets_one_cluster(raw in arb_sets(), cutoff in 0.0f64..=1.0) {
            let sets = SetCollection::new(raw.iter().enumerate().map(|(i, members)| {
                (format!("set{}", i), members.iter().map(|m| format!("g{}", m)).collect::<Vec<_>>())
            }))
            .unwrap();

            let clusters = cluster_sets(&sets, &ClusterConfig::new().with_cutoff(cutoff)).unwrap();
            prop_assert_eq!(clusters.len(), sets.len());

            let mut names: Vec<&str> = clusters.iter().map(|c| c.set.as_str()).collect();
            names.sort_unstable();
            names.dedup();
            prop_assert_eq!(names.len(), sets.len());

            // ids are contiguous from 1 and output is sorted
            let max_id = clusters.iter().map(|c| c.cluster).max().unwrap();
            for id in 1..=max_id {
                prop_assert!(clusters.iter().any(|c| c.cluster == id));
            }
            for w in clusters.windows(2) {
                let ordered = (w[0].cluster, std::cmp::Reverse(w[0].set_size), &w[0].set)
                    <= (w[1].cluster, std::cmp::Reverse(w[1].set_size), &w[1].set);
                prop_assert!(ordered);
            }
        }
    }
}

#[cfg(test)]
mod correction_tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_methods_parse_and_dispatch() {
        let p = [0.01, 0.04, 0.03, 0.2];
        let bh = adjust_p_values(&p, "fdr".parse::<AdjustMethod>().unwrap()).unwrap();
        assert_relative_eq!(bh[0], 0.04, epsilon = 1e-12);
        assert_relative_eq!(bh[1], 0.16 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(bh[2], 0.16 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(bh[3], 0.2, epsilon = 1e-12);

        let holm = adjust_p_values(&p, AdjustMethod::Holm).unwrap();
        assert_relative_eq!(holm[0], 0.04, epsilon = 1e-12);
        assert_relative_eq!(holm[2], 0.09, epsilon = 1e-12);
        assert_relative_eq!(holm[1], 0.09, epsilon = 1e-12);

        assert!("sidak".parse::<AdjustMethod>().is_err());
    }
}
