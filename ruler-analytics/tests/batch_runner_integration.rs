//! Integration tests for batch generation over whole datasets.

use std::sync::{Arc, Mutex};

use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use ruler_analytics::analyzers::{BatchConfig, BatchRunner, BipartiteConnectionBuilder, HistogramBuilder};
use ruler_analytics::binning::{BinningEngine, NULL_BIN_LABEL};
use ruler_analytics::dataset::Dataset;
use ruler_analytics::logging::LogConfig;
use ruler_analytics::RulerError;

fn survey() -> Arc<Dataset> {
    let headers = ["respondent", "age", "region", "income", "satisfied"]
        .iter()
        .map(|h| h.to_string())
        .collect();
    let regions = ["north", "south", "east", "west"];
    let rows = (0..50)
        .map(|i| {
            vec![
                format!("r{i:03}"),
                if i % 11 == 0 { "n/a".to_string() } else { (18 + (i * 7) % 60).to_string() },
                regions[i % regions.len()].to_string(),
                format!("{}.{}", 20 + (i * 13) % 90, i % 10),
                if i % 3 == 0 { "no".to_string() } else { "yes".to_string() },
            ]
        })
        .collect();
    Arc::new(Dataset::new(headers, rows).unwrap())
}

#[tokio::test]
async fn test_batch_matches_single_item_builders() {
    let dataset = survey();
    let context = BatchRunner::new().bin_count(6).run(dataset.clone()).await.unwrap();

    assert!(!context.has_errors(), "{:?}", context.errors());
    assert_eq!(context.histograms().len(), 5);
    assert_eq!(context.matrices().len(), 5);
    assert_eq!(context.graphs().len(), 4);

    let histograms = HistogramBuilder::new();
    for histogram in context.histograms() {
        let column = dataset.column(&histogram.column_name).unwrap();
        assert_eq!(histogram, &histograms.build_column(&column, 6).unwrap());
        assert!(histogram.actual_bin_count <= 6);
    }

    let age = context.histogram("age").unwrap();
    assert_eq!(age.frequency(NULL_BIN_LABEL), Some(5));

    let graphs = BipartiteConnectionBuilder::new();
    for graph in context.graphs() {
        assert!(graphs.validate(graph));
        assert_eq!(graph.total_weight(), 50);
        assert_eq!(graph.skipped_rows, 0);
    }

    for matrix in context.matrices() {
        assert_eq!(matrix.total_transitions(), 49);
    }
}

#[tokio::test]
async fn test_concurrency_does_not_change_results() {
    let dataset = survey();
    let serial = BatchRunner::new()
        .max_concurrency(1)
        .run(dataset.clone())
        .await
        .unwrap();
    let parallel = BatchRunner::new()
        .max_concurrency(8)
        .run(dataset)
        .await
        .unwrap();

    assert_eq!(serial.histograms(), parallel.histograms());
    assert_eq!(serial.matrices(), parallel.matrices());
    assert_eq!(serial.graphs(), parallel.graphs());
}

#[tokio::test]
async fn test_progress_reaches_completion() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();

    BatchRunner::new()
        .build_matrices(false)
        .on_progress(move |p| sink.lock().unwrap().push(p))
        .run(survey())
        .await
        .unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 9);
    assert!(seen.windows(2).all(|w| w[0] <= w[1]));
    assert!((seen.last().unwrap() - 1.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_custom_engine_and_config() {
    let config = BatchConfig {
        bin_count: 3,
        max_concurrency: 2,
        continue_on_error: true,
        build_matrices: false,
        build_graphs: true,
        log: LogConfig::production(),
    };
    let engine = BinningEngine::builder().small_sample_size(5).build();

    let context = BatchRunner::with_config(config)
        .with_engine(engine)
        .run(survey())
        .await
        .unwrap();

    assert!(context.matrices().is_empty());
    assert!(context.histograms().iter().all(|h| h.actual_bin_count <= 3));
    assert_eq!(context.summary().graphs, 4);
}

#[tokio::test]
async fn test_rows_without_data_record_failures() {
    let dataset = Arc::new(Dataset::new(vec!["a".to_string(), "b".to_string()], Vec::new()).unwrap());

    let context = BatchRunner::new().run(dataset.clone()).await.unwrap();
    assert!(context.histograms().is_empty());
    assert!(context.errors().iter().any(|e| e.item == "histogram.a"));
    assert!(context.errors().iter().any(|e| e.item == "bipartite.a->b"));

    let err = BatchRunner::new()
        .continue_on_error(false)
        .run(dataset)
        .await
        .unwrap_err();
    assert!(matches!(err, RulerError::InvalidArgument(_)));
}

#[tokio::test]
async fn test_batch_over_record_batch() {
    let schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("price", DataType::Float64, true),
        Field::new("label", DataType::Utf8, true),
    ]));
    let columns: Vec<ArrayRef> = vec![
        Arc::new(Int64Array::from(vec![1, 2, 3, 4, 5, 6])),
        Arc::new(Float64Array::from(vec![Some(9.5), None, Some(3.25), Some(12.0), Some(7.75), None])),
        Arc::new(StringArray::from(vec![Some("a"), Some("b"), None, Some("a"), Some("N/A"), Some("c")])),
    ];
    let batch = RecordBatch::try_new(schema, columns).unwrap();
    let dataset = Dataset::from_record_batch(&batch).unwrap();

    assert_eq!(dataset.headers(), &["id", "price", "label"]);
    assert_eq!(dataset.cell(0, 1), Some("9.5"));
    assert_eq!(dataset.cell(1, 1), Some(""));

    let context = BatchRunner::new().bin_count(4).run(Arc::new(dataset)).await.unwrap();
    assert!(!context.has_errors());

    let price = context.histogram("price").unwrap();
    assert_eq!(price.frequency(NULL_BIN_LABEL), Some(2));
    let label = context.histogram("label").unwrap();
    assert_eq!(label.frequency(NULL_BIN_LABEL), Some(2));
    assert_eq!(label.frequency("a"), Some(2));
}

#[tokio::test]
async fn test_context_serializes_to_json() {
    let context = BatchRunner::new().bin_count(5).run(survey()).await.unwrap();

    let region = context.histogram("region").unwrap();
    let json = serde_json::to_value(region).unwrap();
    assert_eq!(json["strategy"], "TOP_K");
    assert_eq!(json["ordered_labels"][0], "east");

    let restored: ruler_analytics::analyzers::Histogram = serde_json::from_value(json).unwrap();
    assert_eq!(&restored, region);

    let text = serde_json::to_string(&context).unwrap();
    let restored: ruler_analytics::analyzers::BatchContext = serde_json::from_str(&text).unwrap();
    assert_eq!(restored.graphs().len(), context.graphs().len());
    for (restored, original) in restored.graphs().iter().zip(context.graphs()) {
        assert_eq!(restored.total_weight(), original.total_weight());
        assert_eq!(restored.connection_details, original.connection_details);
    }
    assert_eq!(restored.summary().histograms, 5);
}
