//! Batch generation over every column and adjacent column pair.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{error, info, instrument};

use super::bipartite::{BiPartiteGraph, BipartiteConnectionBuilder};
use super::context::BatchContext;
use super::histogram::{Histogram, HistogramBuilder};
use super::matrix::{Matrix, SequenceMatrixBuilder};
use crate::binning::{BinningEngine, DEFAULT_BIN_COUNT};
use crate::dataset::Dataset;
use crate::error::{ErrorContext, Result, RulerError};
use crate::logging::LogConfig;
use crate::{log_batch_op, log_bin_detail, perf_debug};

/// Type alias for progress callback function.
pub type ProgressCallback = Arc<dyn Fn(f64) + Send + Sync>;

/// Settings of a batch run.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Requested bin count for every column (default: 10)
    pub bin_count: usize,
    /// Maximum columns processed at once (default: number of CPUs)
    pub max_concurrency: usize,
    /// Keep going after an item fails (default: true)
    pub continue_on_error: bool,
    /// Build a transition matrix per column (default: true)
    pub build_matrices: bool,
    /// Build a graph per adjacent column pair (default: true)
    pub build_graphs: bool,
    pub log: LogConfig,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            bin_count: DEFAULT_BIN_COUNT,
            max_concurrency: num_cpus::get(),
            continue_on_error: true,
            build_matrices: true,
            build_graphs: true,
            log: LogConfig::default(),
        }
    }
}

struct ColumnOutput {
    histogram: Result<Histogram>,
    matrix: Option<Result<Matrix>>,
}

/// Generates histograms, matrices and graphs for a whole dataset.
///
/// Columns are independent, so each one runs as its own blocking task,
/// bounded by a semaphore. Graphs run once both histograms of a pair exist.
/// A failing item is recorded in the returned [`BatchContext`] and the run
/// continues, unless `continue_on_error(false)` was set.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use ruler_analytics::analyzers::BatchRunner;
///
/// let runner = BatchRunner::new()
///     .bin_count(8)
///     .max_concurrency(4)
///     .on_progress(|progress| println!("{:.0}%", progress * 100.0));
///
/// let context = runner.run(Arc::new(dataset)).await?;
/// println!("{} histograms, {} failures", context.histograms().len(), context.errors().len());
/// ```
#[derive(Clone)]
pub struct BatchRunner {
    config: BatchConfig,
    histograms: Arc<HistogramBuilder>,
    matrices: Arc<SequenceMatrixBuilder>,
    graphs: Arc<BipartiteConnectionBuilder>,
    on_progress: Option<ProgressCallback>,
}

impl Default for BatchRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchRunner {
    pub fn new() -> Self {
        Self::with_config(BatchConfig::default())
    }

    pub fn with_config(config: BatchConfig) -> Self {
        let graphs = BipartiteConnectionBuilder::new().with_log_config(config.log.clone());
        Self {
            config,
            histograms: Arc::new(HistogramBuilder::new()),
            matrices: Arc::new(SequenceMatrixBuilder::new()),
            graphs: Arc::new(graphs),
            on_progress: None,
        }
    }

    /// Uses a custom binning engine for histograms and matrices. Graphs
    /// resolve values with the engine's normalizer.
    pub fn with_engine(mut self, engine: BinningEngine) -> Self {
        let graphs = (*self.graphs).clone().with_normalizer(engine.normalizer().clone());
        self.graphs = Arc::new(graphs);
        self.histograms = Arc::new(HistogramBuilder::with_engine(engine.clone()));
        self.matrices = Arc::new(SequenceMatrixBuilder::with_engine(engine));
        self
    }

    pub fn bin_count(mut self, bin_count: usize) -> Self {
        self.config.bin_count = bin_count;
        self
    }

    pub fn max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.config.max_concurrency = max_concurrency;
        self
    }

    /// Sets whether to continue when individual items fail.
    ///
    /// Default is true (continue on error).
    pub fn continue_on_error(mut self, continue_on_error: bool) -> Self {
        self.config.continue_on_error = continue_on_error;
        self
    }

    pub fn build_matrices(mut self, enabled: bool) -> Self {
        self.config.build_matrices = enabled;
        self
    }

    pub fn build_graphs(mut self, enabled: bool) -> Self {
        self.config.build_graphs = enabled;
        self
    }

    pub fn log_config(mut self, log: LogConfig) -> Self {
        let graphs = (*self.graphs).clone().with_log_config(log.clone());
        self.graphs = Arc::new(graphs);
        self.config.log = log;
        self
    }

    /// Sets a progress callback.
    ///
    /// The callback receives a float between 0.0 and 1.0 indicating progress.
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(f64) + Send + Sync + 'static,
    {
        self.on_progress = Some(Arc::new(callback));
        self
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Runs the batch.
    ///
    /// Fails fast on a bin count outside `[1, 50]`. Other failures are
    /// isolated per item.
    #[instrument(skip(self, dataset), fields(columns = dataset.column_count(), rows = dataset.row_count(), bin_count = self.config.bin_count))]
    pub async fn run(&self, dataset: Arc<Dataset>) -> Result<BatchContext> {
        BinningEngine::validate_bin_count(self.config.bin_count)?;

        let log = &self.config.log;
        let headers = dataset.headers().to_vec();
        let pairs = if self.config.build_graphs {
            dataset.adjacent_pairs()
        } else {
            Vec::new()
        };

        log_batch_op!(
            log,
            columns = headers.len(),
            pairs = pairs.len(),
            "Starting batch generation"
        );

        let mut context = BatchContext::new();
        context.metadata_mut().column_count = headers.len();
        context.metadata_mut().row_count = dataset.row_count();
        context.metadata_mut().record_start();

        let total_items = headers.len() as f64 + pairs.len() as f64;
        let mut completed = 0.0;

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        let handles: Vec<_> = headers
            .iter()
            .map(|name| self.spawn_column(name.clone(), dataset.clone(), semaphore.clone()))
            .collect();

        // Awaited in header order so outputs keep it.
        for (name, handle) in headers.iter().zip(handles) {
            let output = handle
                .await
                .map_err(RulerError::from)
                .and_then(|inner| inner)
                .with_context(|| format!("column '{name}'"));

            match output {
                Ok(ColumnOutput { histogram, matrix }) => {
                    match histogram.with_context(|| format!("histogram for column '{name}'")) {
                        Ok(histogram) => {
                            for (label, frequency) in histogram.ordered_labels.iter().zip(&histogram.frequencies) {
                                log_bin_detail!(log, column = %name, label = %label, frequency, "Bin");
                            }
                            context.store_histogram(histogram);
                        }
                        Err(e) => self.fail(&mut context, format!("histogram.{name}"), e)?,
                    }

                    if let Some(matrix) = matrix {
                        match matrix.with_context(|| format!("matrix for column '{name}'")) {
                            Ok(matrix) => context.store_matrix(matrix),
                            Err(e) => self.fail(&mut context, format!("matrix.{name}"), e)?,
                        }
                    }
                }
                Err(e) => self.fail(&mut context, format!("column.{name}"), e)?,
            }

            perf_debug!(log, column = %name, "Column finished");
            completed += 1.0;
            self.report_progress(completed / total_items);
        }

        if !pairs.is_empty() {
            let mut pending = Vec::new();
            for (left, right) in pairs {
                let item = format!("bipartite.{left}->{right}");
                match (context.histogram(&left), context.histogram(&right)) {
                    (Some(l), Some(r)) => {
                        let handle = self.spawn_graph(dataset.clone(), l.clone(), r.clone(), semaphore.clone());
                        pending.push((item, handle));
                    }
                    _ => {
                        let e = RulerError::illegal_state(format!(
                            "histogram for '{left}' or '{right}' is unavailable"
                        ));
                        self.fail(&mut context, item, e)?;
                        completed += 1.0;
                        self.report_progress(completed / total_items);
                    }
                }
            }

            let (items, handles): (Vec<String>, Vec<_>) = pending.into_iter().unzip();
            let results = futures::future::join_all(handles).await;
            for (item, result) in items.into_iter().zip(results) {
                match result.map_err(RulerError::from).and_then(|inner| inner) {
                    Ok(graph) => context.store_graph(graph),
                    Err(e) => self.fail(&mut context, item, e)?,
                }
                completed += 1.0;
                self.report_progress(completed / total_items);
            }
        }

        context.metadata_mut().record_end();

        if let Some(duration) = context.metadata().duration() {
            info!(
                histograms = context.histograms().len(),
                matrices = context.matrices().len(),
                graphs = context.graphs().len(),
                errors = context.errors().len(),
                "Batch completed in {:.2}s",
                duration.num_milliseconds() as f64 / 1000.0
            );
        }

        Ok(context)
    }

    fn spawn_column(
        &self,
        name: String,
        dataset: Arc<Dataset>,
        semaphore: Arc<Semaphore>,
    ) -> tokio::task::JoinHandle<Result<ColumnOutput>> {
        let histograms = self.histograms.clone();
        let matrices = self.matrices.clone();
        let bin_count = self.config.bin_count;
        let build_matrix = self.config.build_matrices;

        tokio::spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .map_err(|e| RulerError::Internal(e.to_string()))?;

            let output = tokio::task::spawn_blocking(move || -> Result<ColumnOutput> {
                let column = dataset.column(&name)?;
                let histogram = histograms.build_column(&column, bin_count);
                let matrix = build_matrix.then(|| matrices.build_column(&column, bin_count));
                Ok(ColumnOutput { histogram, matrix })
            })
            .await??;

            Ok::<_, RulerError>(output)
        })
    }

    fn spawn_graph(
        &self,
        dataset: Arc<Dataset>,
        left: Histogram,
        right: Histogram,
        semaphore: Arc<Semaphore>,
    ) -> tokio::task::JoinHandle<Result<BiPartiteGraph>> {
        let graphs = self.graphs.clone();

        tokio::spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .map_err(|e| RulerError::Internal(e.to_string()))?;

            tokio::task::spawn_blocking(move || graphs.build(&dataset, &left, &right)).await?
        })
    }

    /// Records a failure, or returns it when the run should stop.
    fn fail(&self, context: &mut BatchContext, item: String, e: RulerError) -> Result<()> {
        error!(item = %item, error = %e, "Batch item failed");
        context.record_error(&item, &e);

        if !self.config.continue_on_error {
            return Err(e);
        }
        Ok(())
    }

    fn report_progress(&self, progress: f64) {
        if let Some(ref callback) = self.on_progress {
            callback(progress);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn dataset() -> Arc<Dataset> {
        let headers = vec!["id".to_string(), "grade".to_string(), "score".to_string()];
        let rows = (0..12)
            .map(|i| {
                vec![
                    i.to_string(),
                    ["A", "B", "C"][i % 3].to_string(),
                    if i == 5 { "n/a".to_string() } else { (i * 7 % 10).to_string() },
                ]
            })
            .collect();
        Arc::new(Dataset::new(headers, rows).unwrap())
    }

    #[tokio::test]
    async fn test_runs_every_item() {
        let context = BatchRunner::new().bin_count(4).run(dataset()).await.unwrap();

        assert!(!context.has_errors());
        let names: Vec<_> = context.histograms().iter().map(|h| h.column_name.as_str()).collect();
        assert_eq!(names, vec!["id", "grade", "score"]);
        assert_eq!(context.matrices().len(), 3);
        assert_eq!(context.graphs().len(), 2);
        assert!(context.graph("id", "grade").is_some());
        assert!(context.graph("grade", "score").is_some());
        assert!(context.metadata().duration().is_some());
        assert_eq!(context.metadata().row_count, 12);
    }

    #[tokio::test]
    async fn test_invalid_bin_count_fails_fast() {
        let err = BatchRunner::new().bin_count(0).run(dataset()).await.unwrap_err();
        assert!(matches!(err, RulerError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_optional_outputs() {
        let context = BatchRunner::new()
            .build_matrices(false)
            .build_graphs(false)
            .max_concurrency(1)
            .run(dataset())
            .await
            .unwrap();

        assert_eq!(context.histograms().len(), 3);
        assert!(context.matrices().is_empty());
        assert!(context.graphs().is_empty());
    }

    #[tokio::test]
    async fn test_progress_callback() {
        let progress_values = Arc::new(Mutex::new(Vec::new()));
        let progress_clone = progress_values.clone();

        let runner = BatchRunner::new().on_progress(move |progress| {
            progress_clone.lock().unwrap().push(progress);
        });
        runner.run(dataset()).await.unwrap();

        let progress = progress_values.lock().unwrap();
        // 3 columns + 2 pairs
        assert_eq!(progress.len(), 5);
        assert!(progress.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(*progress.last().unwrap(), 1.0);
    }

    #[tokio::test]
    async fn test_empty_dataset_isolates_failures() {
        let empty = Arc::new(Dataset::new(vec!["a".to_string(), "b".to_string()], vec![]).unwrap());

        let context = BatchRunner::new().run(empty.clone()).await.unwrap();
        // Histograms need values; both fail, so the pair cannot be built.
        assert_eq!(context.histograms().len(), 0);
        assert_eq!(context.matrices().len(), 2);
        assert_eq!(context.errors().len(), 3);
        assert_eq!(context.errors()[0].item, "histogram.a");
        assert_eq!(context.errors()[2].item, "bipartite.a->b");

        let result = BatchRunner::new().continue_on_error(false).run(empty).await;
        assert!(matches!(result, Err(RulerError::InvalidArgument(_))));
    }

    #[test]
    fn test_engine_and_log_config_compose_in_any_order() {
        let engine = BinningEngine::builder().numeric_threshold(0.5).build();

        let engine_first = BatchRunner::new()
            .with_engine(engine.clone())
            .log_config(LogConfig::verbose());
        let log_first = BatchRunner::new()
            .log_config(LogConfig::verbose())
            .with_engine(engine.clone());

        for runner in [engine_first, log_first] {
            assert_eq!(runner.graphs.normalizer(), engine.normalizer());
            assert_eq!(runner.graphs.log_config(), &LogConfig::verbose());
            assert_eq!(runner.config().log, LogConfig::verbose());
        }
    }
}
