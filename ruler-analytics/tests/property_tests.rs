//! Property-based tests for binning, matrices and graphs.
//!
//! Columns are generated from a small vocabulary of numbers, words,
//! missing-value spellings and numbers too large for `f64`, so every branch
//! of the engine gets exercised: numeric, categorical, mixed and
//! all-sentinel columns.

use proptest::prelude::*;
use ruler_analytics::analyzers::{BipartiteConnectionBuilder, HistogramBuilder, SequenceMatrixBuilder};
use ruler_analytics::binning::{BinningEngine, BinningStrategy, MAX_BIN_COUNT};
use ruler_analytics::dataset::{DataPoint, Dataset};
use ruler_analytics::normalize::{NormalizedValue, Normalizer};
use ruler_analytics::RulerError;

fn cell() -> impl Strategy<Value = String> {
    prop_oneof![
        4 => (-500i64..500).prop_map(|n| n.to_string()),
        2 => (0u32..1000).prop_map(|n| format!("{}.{}", n / 10, n % 10)),
        2 => prop::sample::select(vec!["red", "green", "blue", "cyan", "teal"]).prop_map(String::from),
        1 => prop::sample::select(vec!["", "NULL", "n/a", "none", " NA "]).prop_map(String::from),
        1 => prop::sample::select(vec!["1e999", "-2E400", "9e308"]).prop_map(String::from),
    ]
}

fn strategy() -> impl Strategy<Value = BinningStrategy> {
    prop::sample::select(BinningStrategy::ALL.to_vec())
}

fn column(raw: &[String]) -> (Vec<NormalizedValue>, Vec<DataPoint>) {
    let normalizer = Normalizer::new();
    let values = raw.iter().map(|v| normalizer.normalize(Some(v))).collect();
    let rows = raw
        .iter()
        .enumerate()
        .map(|(i, v)| DataPoint::new(v.as_str(), i, 0))
        .collect();
    (values, rows)
}

fn two_column_dataset(rows: &[(String, String)]) -> Dataset {
    Dataset::new(
        vec!["left".to_string(), "right".to_string()],
        rows.iter().map(|(l, r)| vec![l.clone(), r.clone()]).collect(),
    )
    .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_bin_count_never_exceeds_request(
        raw in prop::collection::vec(cell(), 1..80),
        requested in 1usize..=MAX_BIN_COUNT,
        strategy in strategy(),
    ) {
        let (values, rows) = column(&raw);
        let result = BinningEngine::new().bin(&values, &rows, requested, strategy).unwrap();

        prop_assert!(result.actual_bin_count >= 1);
        prop_assert!(result.actual_bin_count <= requested);
        prop_assert_eq!(result.actual_bin_count, result.ordered_labels.len());
        prop_assert_eq!(result.bins.len(), result.ordered_labels.len());
    }

    #[test]
    fn prop_every_value_lands_in_one_bin(
        raw in prop::collection::vec(cell(), 1..80),
        requested in 1usize..=MAX_BIN_COUNT,
        strategy in strategy(),
    ) {
        let (values, rows) = column(&raw);
        let result = BinningEngine::new().bin(&values, &rows, requested, strategy).unwrap();

        let members: usize = result.bins.iter().map(|b| b.len()).sum();
        prop_assert_eq!(members, values.len());
        prop_assert_eq!(result.binned_values.len(), values.len());
        for value in &values {
            let label = result.label_for(value.as_str());
            prop_assert!(label.is_some(), "{} is unmapped", value);
            prop_assert!(result.ordered_labels.iter().any(|l| Some(l.as_str()) == label));
        }
    }

    #[test]
    fn prop_binning_is_deterministic(
        raw in prop::collection::vec(cell(), 1..60),
        requested in 1usize..=20,
    ) {
        let (values, rows) = column(&raw);
        let builder = HistogramBuilder::new();

        let first = builder.build("c", &values, &rows, requested).unwrap();
        let second = builder.build("c", &values, &rows, requested).unwrap();
        prop_assert_eq!(&first, &second);
    }

    #[test]
    fn prop_rebin_only_depends_on_the_final_count(
        raw in prop::collection::vec(cell(), 1..60),
        first_count in 1usize..=20,
        second_count in 1usize..=20,
    ) {
        let (values, rows) = column(&raw);
        let builder = HistogramBuilder::new();

        let direct = builder.build("c", &values, &rows, second_count).unwrap();
        let initial = builder.build("c", &values, &rows, first_count).unwrap();
        let rebinned = builder.rebin(&initial, second_count).unwrap();
        prop_assert_eq!(&rebinned, &direct);
        prop_assert_eq!(builder.rebin(&rebinned, second_count).unwrap(), rebinned);
    }

    #[test]
    fn prop_matrix_conserves_transitions(
        raw in prop::collection::vec(cell(), 0..60),
        requested in 1usize..=20,
    ) {
        let (values, rows) = column(&raw);
        let builder = SequenceMatrixBuilder::new();
        let matrix = builder.build("c", &values, &rows, requested).unwrap();

        prop_assert_eq!(matrix.total_transitions(), raw.len().saturating_sub(1));
        prop_assert_eq!(matrix.total_sequences, raw.len().saturating_sub(1));
        prop_assert!(builder.validate(&matrix));
    }

    #[test]
    fn prop_graph_weight_matches_resolved_rows(
        rows in prop::collection::vec((cell(), cell()), 1..60),
        requested in 1usize..=12,
    ) {
        let dataset = two_column_dataset(&rows);
        let histograms = HistogramBuilder::new();
        let left = histograms.build_column(&dataset.column("left").unwrap(), requested).unwrap();
        let right = histograms.build_column(&dataset.column("right").unwrap(), requested).unwrap();

        let graphs = BipartiteConnectionBuilder::new();
        let graph = graphs.build(&dataset, &left, &right).unwrap();

        // Histograms built from the same rows resolve every row.
        prop_assert_eq!(graph.skipped_rows, 0);
        prop_assert_eq!(graph.total_weight(), dataset.row_count());
        prop_assert!(graphs.validate(&graph));
        prop_assert!(graph.links.windows(2).all(|w| w[0].weight >= w[1].weight));
    }

    #[test]
    fn prop_graph_weight_bounded_by_rows(
        earlier in prop::collection::vec((cell(), cell()), 1..40),
        later in prop::collection::vec((cell(), cell()), 1..40),
        requested in 1usize..=12,
    ) {
        let histograms = HistogramBuilder::new();
        let source = two_column_dataset(&earlier);
        let left = histograms.build_column(&source.column("left").unwrap(), requested).unwrap();
        let right = histograms.build_column(&source.column("right").unwrap(), requested).unwrap();

        let dataset = two_column_dataset(&later);
        let graph = BipartiteConnectionBuilder::new().build(&dataset, &left, &right).unwrap();

        prop_assert!(graph.total_weight() <= dataset.row_count());
        prop_assert_eq!(graph.total_weight() + graph.skipped_rows, dataset.row_count());
    }

    #[test]
    fn prop_out_of_range_counts_are_rejected(
        raw in prop::collection::vec(cell(), 1..20),
        requested in prop_oneof![Just(0usize), (MAX_BIN_COUNT + 1)..200],
    ) {
        let (values, rows) = column(&raw);
        let err = HistogramBuilder::new().build("c", &values, &rows, requested).unwrap_err();
        prop_assert!(matches!(err, RulerError::InvalidArgument(_)));
    }
}

#[test]
fn test_non_adjacent_columns_are_rejected() {
    let dataset = Dataset::new(
        vec!["a".to_string(), "b".to_string(), "c".to_string()],
        vec![
            vec!["1".to_string(), "x".to_string(), "p".to_string()],
            vec!["2".to_string(), "y".to_string(), "q".to_string()],
        ],
    )
    .unwrap();
    let histograms = HistogramBuilder::new();
    let a = histograms.build_column(&dataset.column("a").unwrap(), 3).unwrap();
    let b = histograms.build_column(&dataset.column("b").unwrap(), 3).unwrap();
    let c = histograms.build_column(&dataset.column("c").unwrap(), 3).unwrap();

    let graphs = BipartiteConnectionBuilder::new();
    assert!(graphs.build(&dataset, &a, &b).is_ok());
    assert!(graphs.build(&dataset, &b, &c).is_ok());

    let err = graphs.build(&dataset, &a, &c).unwrap_err();
    assert!(matches!(err, RulerError::InvalidArgument(_)));
    let err = graphs.build(&dataset, &a, &a).unwrap_err();
    assert!(matches!(err, RulerError::InvalidArgument(_)));
}
