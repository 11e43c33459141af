//! Tests for data preparation, splitting, encoding and the forest

#[cfg(test)]
mod tests {
    use crate::dataset::loader::{read_table_from, reader_from_str};
    use crate::dataset::sample::{SAMPLE_CROPS, synthesize};
    use crate::dataset::{Row, Table, stratified_folds, stratified_split};
    use crate::error::ModelError;
    use crate::forest::{ForestParams, RandomForest, argmax};
    use crate::metrics::{accuracy, classification_report, mean_std};
    use crate::model::LabelEncoder;
    use crate::schema::Feature;
    use ndarray::array;
    use std::collections::HashSet;

    fn row(values: [f64; 7], label: &str) -> Row {
        let mut cells = [None; 8];
        for (i, v) in values.iter().enumerate() {
            cells[i] = Some(*v);
        }
        Row::new(cells, Some(label.to_string()))
    }

    fn labels(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    // ============================================================================
    // Label encoder
    // ============================================================================

    #[test]
    fn test_label_encoder_sorted_and_bijective() {
        let encoder = LabelEncoder::fit(&labels(&["rice", "apple", "maize", "apple"])).unwrap();
        assert_eq!(encoder.classes(), &["apple", "maize", "rice"]);
        for (i, class) in encoder.classes().iter().enumerate() {
            assert_eq!(encoder.encode(class), Some(i));
            assert_eq!(encoder.decode(i), Some(class.as_str()));
        }
        assert_eq!(encoder.encode("banana"), None);
        assert_eq!(encoder.decode(3), None);
    }

    #[test]
    fn test_label_encoder_transform_unknown_label() {
        let encoder = LabelEncoder::fit(&labels(&["rice", "apple"])).unwrap();
        assert_eq!(
            encoder.transform(&labels(&["rice", "apple", "rice"])).unwrap(),
            vec![1, 0, 1]
        );
        assert!(matches!(
            encoder.transform(&labels(&["jute"])),
            Err(ModelError::Classifier(_))
        ));
    }

    #[test]
    fn test_label_encoder_empty() {
        assert!(matches!(
            LabelEncoder::fit(&[]),
            Err(ModelError::TrainingData(_))
        ));
    }

    // ============================================================================
    // Cleaning
    // ============================================================================

    #[test]
    fn test_clean_removes_duplicates_missing_and_out_of_range() {
        let base = [90.0, 42.0, 43.0, 20.8, 82.0, 6.5, 202.9];
        let mut missing = row(base, "rice");
        missing.values[Feature::Rainfall.index()] = None;

        let mut bad_ph = base;
        bad_ph[Feature::Ph.index()] = 15.0;
        let mut bad_humidity = base;
        bad_humidity[Feature::Humidity.index()] = 120.0;
        // Nitrogen is not range-filtered during cleaning
        let mut high_nitrogen = base;
        high_nitrogen[Feature::Nitrogen.index()] = 500.0;

        let mut table = Table::new(
            false,
            vec![
                row(base, "rice"),
                row(base, "rice"),
                row(base, "wheat"),
                missing,
                row(bad_ph, "rice"),
                row(bad_humidity, "rice"),
                row(high_nitrogen, "rice"),
                Row::new([Some(1.0); 8], None),
            ],
        );
        table.clean();

        assert_eq!(table.len(), 3);
        let kept: Vec<&str> = table
            .rows
            .iter()
            .filter_map(|r| r.label.as_deref())
            .collect();
        assert_eq!(kept, vec!["rice", "wheat", "rice"]);
        assert_eq!(table.rows[2].get(Feature::Nitrogen), Some(500.0));
    }

    #[test]
    fn test_union_keeps_vegetation_only_when_shared() {
        let mut with_ndvi = row([1.0, 1.0, 1.0, 20.0, 50.0, 6.0, 100.0], "rice");
        with_ndvi.values[Feature::VegetationIndex.index()] = Some(0.4);

        let both = Table::union(vec![
            Table::new(true, vec![with_ndvi.clone()]),
            Table::new(true, vec![with_ndvi.clone()]),
        ]);
        assert!(both.has_vegetation_index);

        let mixed = Table::union(vec![
            Table::new(true, vec![with_ndvi]),
            Table::new(false, vec![row([2.0, 2.0, 2.0, 21.0, 51.0, 6.1, 101.0], "corn")]),
        ]);
        assert!(!mixed.has_vegetation_index);
        assert_eq!(mixed.len(), 2);
        assert!(mixed.rows.iter().all(|r| r.get(Feature::VegetationIndex).is_none()));
    }

    #[test]
    fn test_attach_vegetation_index_positional_then_synthesized() {
        let mut table = Table::new(
            false,
            (0..4)
                .map(|i| row([i as f64, 1.0, 1.0, 20.0, 50.0, 6.0, 100.0], "rice"))
                .collect(),
        );
        table.attach_vegetation_index(&[0.2, 7.0, -0.3], 42);

        assert!(table.has_vegetation_index);
        let values: Vec<f64> = table
            .rows
            .iter()
            .filter_map(|r| r.get(Feature::VegetationIndex))
            .collect();
        assert_eq!(values.len(), 4);
        assert_eq!(values[0], 0.2);
        assert_eq!(values[1], -0.3);
        assert!(values[2..].iter().all(|v| (0.1..0.9).contains(v)));
    }

    #[test]
    fn test_attach_vegetation_index_ignored_when_present() {
        let mut present = row([1.0, 1.0, 1.0, 20.0, 50.0, 6.0, 100.0], "rice");
        present.values[Feature::VegetationIndex.index()] = Some(0.7);
        let mut table = Table::new(true, vec![present]);
        table.attach_vegetation_index(&[0.1], 1);
        assert_eq!(table.rows[0].get(Feature::VegetationIndex), Some(0.7));
    }

    #[test]
    fn test_into_dataset_column_order() {
        let table = Table::new(false, vec![row([1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0], "rice")]);
        let dataset = table.into_dataset().unwrap();
        assert_eq!(
            dataset.columns(),
            &["N", "P", "K", "temperature", "humidity", "ph", "rainfall"]
        );
        assert_eq!(dataset.records().row(0).to_vec(), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
        assert_eq!(dataset.labels(), &["rice"]);
    }

    // ============================================================================
    // CSV loading
    // ============================================================================

    #[test]
    fn test_read_table_parses_cells() {
        let data = "N,P,K,temperature,humidity,ph,rainfall,label,extra\n\
                    90,42,43,20.8,82,6.5,202.9,rice,x\n\
                    85, ,41,21.7,80,7.0,226.6,rice,y\n\
                    60,55,44,23.0,82.3,nan,263.9, ,z\n";
        let table = read_table_from(reader_from_str(data), "inline").unwrap();
        assert!(!table.has_vegetation_index);
        assert_eq!(table.len(), 3);
        assert_eq!(table.rows[0].get(Feature::Temperature), Some(20.8));
        assert_eq!(table.rows[1].get(Feature::Phosphorus), None);
        assert_eq!(table.rows[2].get(Feature::Ph), None);
        assert_eq!(table.rows[2].label, None);
    }

    #[test]
    fn test_read_table_requires_columns() {
        let data = "N,P,K,temperature,humidity,ph,label\n1,2,3,4,5,6,rice\n";
        let err = read_table_from(reader_from_str(data), "inline").unwrap_err();
        match err {
            ModelError::TrainingData(message) => assert!(message.contains("rainfall")),
            other => panic!("unexpected error: {other:?}"),
        }

        let data = "N,P,K,temperature,humidity,ph,rainfall\n1,2,3,4,5,6,7\n";
        let err = read_table_from(reader_from_str(data), "inline").unwrap_err();
        assert!(err.to_string().contains("label"));
    }

    #[test]
    fn test_read_table_detects_vegetation_column() {
        let data = "label,ndvi,N,P,K,temperature,humidity,ph,rainfall\n\
                    rice,0.61,90,42,43,20.8,82,6.5,202.9\n";
        let table = read_table_from(reader_from_str(data), "inline").unwrap();
        assert!(table.has_vegetation_index);
        assert_eq!(table.rows[0].get(Feature::VegetationIndex), Some(0.61));
        assert_eq!(table.rows[0].get(Feature::Nitrogen), Some(90.0));
    }

    // ============================================================================
    // Sample data
    // ============================================================================

    #[test]
    fn test_synthesize_is_deterministic_and_in_range() {
        let a = synthesize(200, 42);
        let b = synthesize(200, 42);
        assert_eq!(a, b);
        assert_ne!(a, synthesize(200, 7));
        assert!(!a.has_vegetation_index);

        let crops: HashSet<&str> = SAMPLE_CROPS.into_iter().collect();
        for r in &a.rows {
            let n = r.get(Feature::Nitrogen).unwrap();
            assert!((0.0..150.0).contains(&n) && n.fract() == 0.0);
            assert!((0.0..210.0).contains(&r.get(Feature::Potassium).unwrap()));
            assert!((8.0..45.0).contains(&r.get(Feature::Temperature).unwrap()));
            assert!((14.0..100.0).contains(&r.get(Feature::Humidity).unwrap()));
            assert!((3.5..10.0).contains(&r.get(Feature::Ph).unwrap()));
            assert!((20.0..300.0).contains(&r.get(Feature::Rainfall).unwrap()));
            assert!(crops.contains(r.label.as_deref().unwrap()));
        }
    }

    // ============================================================================
    // Splitting
    // ============================================================================

    #[test]
    fn test_stratified_split_keeps_class_proportions() {
        let targets: Vec<usize> = (0..100).map(|i| i % 4).collect();
        let split = stratified_split(&targets, 0.2, 42).unwrap();
        assert_eq!(split.test.len(), 20);
        assert_eq!(split.train.len(), 80);
        for class in 0..4 {
            let in_test = split.test.iter().filter(|i| targets[**i] == class).count();
            assert_eq!(in_test, 5);
        }

        let all: HashSet<usize> = split.train.iter().chain(&split.test).copied().collect();
        assert_eq!(all.len(), 100);
        assert_eq!(split, stratified_split(&targets, 0.2, 42).unwrap());
    }

    #[test]
    fn test_stratified_split_small_classes() {
        // Singleton classes stay in training, pairs contribute one test row
        let targets = vec![0, 1, 1, 2, 2, 2];
        let split = stratified_split(&targets, 0.1, 0).unwrap();
        assert_eq!(split.test.len(), 2);
        assert!(split.train.contains(&0));
    }

    #[test]
    fn test_stratified_split_rejects_bad_test_size() {
        let targets = vec![0, 0, 1, 1];
        for size in [0.0, 1.0, -0.5, f64::NAN] {
            assert!(matches!(
                stratified_split(&targets, size, 1),
                Err(ModelError::InvalidParameter(_))
            ));
        }
        assert!(matches!(
            stratified_split(&[0, 1, 2], 0.5, 1),
            Err(ModelError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_stratified_folds_partition_rows() {
        let targets: Vec<usize> = (0..53).map(|i| i % 3).collect();
        let folds = stratified_folds(&targets, 5).unwrap();
        assert_eq!(folds.len(), 5);

        let mut seen = HashSet::new();
        for fold in &folds {
            assert_eq!(fold.train.len() + fold.validation.len(), 53);
            assert!(fold.validation.len() == 10 || fold.validation.len() == 11);
            for row in &fold.validation {
                assert!(seen.insert(*row));
                assert!(!fold.train.contains(row));
            }
        }
        assert_eq!(seen.len(), 53);
    }

    #[test]
    fn test_stratified_folds_invalid() {
        assert!(stratified_folds(&[0, 1, 0], 1).is_err());
        assert!(stratified_folds(&[0, 1, 0], 5).is_err());
    }

    // ============================================================================
    // Metrics
    // ============================================================================

    #[test]
    fn test_accuracy_and_mean_std() {
        assert_eq!(accuracy(&[0, 1, 1, 2], &[0, 1, 2, 2]), 0.75);
        assert_eq!(accuracy(&[], &[]), 0.0);

        let (mean, std) = mean_std(&[0.8, 1.0]);
        assert!((mean - 0.9).abs() < 1e-12);
        assert!((std - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_classification_report_per_class() {
        let classes = labels(&["apple", "rice"]);
        let report = classification_report(&[0, 0, 1, 1], &[0, 1, 1, 1], &classes);
        assert_eq!(report[0].label, "apple");
        assert_eq!(report[0].precision, 1.0);
        assert_eq!(report[0].recall, 0.5);
        assert_eq!(report[0].support, 2);
        assert!((report[1].precision - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(report[1].recall, 1.0);
        assert!((report[1].f1_score - 0.8).abs() < 1e-12);
    }

    // ============================================================================
    // Forest
    // ============================================================================

    #[test]
    fn test_forest_separable_data() {
        let records = array![
            [1.0, 10.0, 0.0],
            [1.2, 11.0, 0.1],
            [0.9, 9.5, 0.2],
            [1.1, 10.5, 0.0],
            [8.0, 1.0, 5.0],
            [8.2, 1.5, 5.1],
            [7.9, 0.5, 4.9],
            [8.1, 1.2, 5.2],
        ];
        let targets = vec![0, 0, 0, 0, 1, 1, 1, 1];
        let params = ForestParams {
            n_trees: 15,
            min_weight_split: 2.0,
            min_weight_leaf: 1.0,
            ..ForestParams::default()
        };
        let forest = RandomForest::fit(records.view(), &targets, 2, &params, 42).unwrap();
        assert_eq!(forest.n_trees(), 15);

        let proba = forest.predict_proba(records.view()).unwrap();
        for row in proba.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-9);
        }
        assert_eq!(forest.predict(records.view()).unwrap(), targets);

        let importance = forest.feature_importance();
        assert_eq!(importance.len(), 3);
        let total: f64 = importance.iter().sum();
        assert!(total == 0.0 || (total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_forest_rejects_wrong_width() {
        let records = array![[1.0, 2.0], [3.0, 4.0]];
        let forest = RandomForest::fit(
            records.view(),
            &[0, 1],
            2,
            &ForestParams::default().with_trees(2),
            1,
        )
        .unwrap();
        let narrow = array![[1.0]];
        assert!(matches!(
            forest.predict_proba(narrow.view()),
            Err(ModelError::Classifier(_))
        ));
    }

    #[test]
    fn test_forest_params_validation() {
        assert!(ForestParams::default().with_trees(0).validate().is_err());
        assert_eq!(ForestParams::subspace_size(7), 3);
        assert_eq!(ForestParams::subspace_size(8), 3);
        assert_eq!(ForestParams::subspace_size(1), 1);
    }

    #[test]
    fn test_argmax_first_on_ties() {
        assert_eq!(argmax(&[0.2, 0.4, 0.4]), 1);
        assert_eq!(argmax(&[0.0]), 0);
    }
}
