//! The segmented imputer and its builder.

use crate::config::{ConfigValidationError, DmiConfig};
use crate::dataset::{Dataset, Partition, Record, RecordPartitioner, RowId};
use crate::error::{ImputationError, Result, ResultExt};
use crate::imputers::{EmRoutine, GaussianEm, ImputationCache, SegmentImputer};
use crate::pipeline::executor::{Assignments, ImputationExecutor};
use crate::pipeline::progress::{
    ClosureProgressReporter, ImputationStage, ProgressReporter, ProgressUpdate,
};
use crate::pipeline::RunContext;
use crate::segments::{AttributeSegments, SegmentBuilder};
use crate::tree::{C45Inducer, Discretizer, EqualWidthDiscretizer, TreeInducer};
use crate::types::{
    AttributePlan, AttributeSummary, FrameImputation, ImputationResult, ImputationSummary,
};
use polars::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Imputes missing values segment by segment.
///
/// Use [`DmiImputer::builder()`] to create one. The same imputer can be
/// reused across datasets: per-dataset defaults are derived on every run.
///
/// # Example
///
/// ```rust,ignore
/// use lex_imputation::{DmiConfig, DmiImputer};
///
/// let result = DmiImputer::builder()
///     .config(DmiConfig::builder().min_records_for_em(4).build()?)
///     .on_progress(|update| {
///         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
///     })
///     .build()?
///     .impute_dataframe(&df)?;
///
/// println!("{} cells imputed", result.summary.cells_imputed());
/// ```
pub struct DmiImputer {
    config: DmiConfig,
    tree_inducer: Arc<dyn TreeInducer>,
    discretizer: Arc<dyn Discretizer>,
    em_routine: Arc<dyn EmRoutine>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
}

impl std::fmt::Debug for DmiImputer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DmiImputer")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

// Ensure DmiImputer can be moved to a worker thread
static_assertions::assert_impl_all!(DmiImputer: Send, Sync);

impl DmiImputer {
    pub fn builder() -> DmiImputerBuilder {
        DmiImputerBuilder::default()
    }

    pub fn config(&self) -> &DmiConfig {
        &self.config
    }

    /// Impute every missing value of `data`.
    ///
    /// The returned dataset holds the same records in the same order.
    /// Cells no step could fill stay missing and are listed in
    /// [`ImputationSummary::unresolved`].
    ///
    /// # Errors
    ///
    /// Returns [`ImputationError::EmptyDataset`] if `data` has no records or
    /// no attributes. Collaborator failures never surface here.
    pub fn impute(&self, data: &Dataset) -> Result<ImputationResult> {
        match self.impute_internal(data) {
            Ok(result) => {
                self.report_progress(ProgressUpdate::complete(format!(
                    "Imputed {} cells",
                    result.summary.cells_imputed()
                )));
                Ok(result)
            }
            Err(e) => {
                self.report_progress(ProgressUpdate::failed(e.to_string()));
                error!("Imputation error: {}", e);
                Err(e)
            }
        }
    }

    /// Impute a polars DataFrame.
    ///
    /// Columns without missing values come back untouched; imputed columns
    /// are rebuilt from the imputed dataset.
    pub fn impute_dataframe(&self, df: &DataFrame) -> Result<FrameImputation> {
        let data = Dataset::from_dataframe(df).context("Failed to read DataFrame")?;
        let result = self.impute(&data)?;
        let dataframe = result
            .dataset
            .merge_into(df)
            .context("Failed to write imputed columns")?;
        Ok(FrameImputation {
            dataframe,
            summary: result.summary,
        })
    }

    /// Run the partition and segmentation steps only and describe, per
    /// attribute with missing values, the rules and segments that would be
    /// used.
    pub fn plan(&self, data: &Dataset) -> Result<Vec<AttributePlan>> {
        if data.is_empty() || data.schema().is_empty() {
            return Err(ImputationError::EmptyDataset);
        }
        let partition = RecordPartitioner::partition(data);
        let context = RunContext::new(data, partition.complete.len(), &self.config);
        let mut summary = ImputationSummary::new();
        let (_, plans) = self.build_segments(data, &partition, &context, &mut summary);
        Ok(plans)
    }

    /// Report progress if a reporter is configured.
    fn report_progress(&self, update: ProgressUpdate) {
        if let Some(reporter) = &self.progress_reporter {
            reporter.report(update);
        }
    }

    fn impute_internal(&self, data: &Dataset) -> Result<ImputationResult> {
        let start_time = Instant::now();

        info!("Starting segmented imputation...");
        self.report_progress(ProgressUpdate::new(
            ImputationStage::Initializing,
            0.0,
            "Starting segmented imputation...",
        ));

        if data.is_empty() || data.schema().is_empty() {
            return Err(ImputationError::EmptyDataset);
        }

        let mut summary = ImputationSummary::new();
        summary.rows_total = data.len();
        summary.missing_before = data.missing_cells();

        // Step 1: Partition
        self.report_progress(ProgressUpdate::new(
            ImputationStage::Partitioning,
            0.0,
            "Partitioning records...",
        ));
        info!("Step 1: Partitioning records...");

        let partition = RecordPartitioner::partition(data);
        let context = RunContext::new(data, partition.complete.len(), &self.config);

        summary.rows_complete = partition.complete.len();
        summary.rows_incomplete = partition.incomplete.len();
        summary.no_complete = context.no_complete;
        summary.no_merge_no_em = context.no_merge_no_em;
        summary.params = Some(context.params);
        info!(
            "{} complete, {} incomplete records (no_complete: {}, no_merge_no_em: {})",
            summary.rows_complete,
            summary.rows_incomplete,
            context.no_complete,
            context.no_merge_no_em
        );
        debug!("Resolved parameters: {:?}", context.params);

        self.report_progress(ProgressUpdate::new(
            ImputationStage::Partitioning,
            1.0,
            format!("{} incomplete records", summary.rows_incomplete),
        ));

        if partition.incomplete.is_empty() {
            info!("No missing values, nothing to impute");
            summary.duration_ms = start_time.elapsed().as_millis() as u64;
            return Ok(ImputationResult {
                dataset: data.clone(),
                summary,
            });
        }

        // Step 2: Rules and segments per attribute
        let (mut segments, mut attributes) =
            self.build_segments(data, &partition, &context, &mut summary);

        // Step 3: Assign incomplete records
        info!("Step 3: Assigning incomplete records to segments...");
        let executor = ImputationExecutor::new(
            data.schema(),
            &context,
            SegmentImputer::new(self.em_routine.as_ref(), &context),
        );
        let incomplete = partition.incomplete.records();
        let mut working: HashMap<RowId, Record> =
            incomplete.iter().map(|r| (r.id, r.clone())).collect();
        let mut assignments = Assignments::new();

        let total = segments.len();
        for (i, (attribute_segments, attribute_summary)) in
            segments.iter_mut().zip(attributes.iter_mut()).enumerate()
        {
            self.report_progress(ProgressUpdate::for_item(
                ImputationStage::AssigningRecords,
                format!("Attribute: {}", attribute_summary.name),
                i,
                total,
                format!("Assigning records missing '{}'", attribute_summary.name),
            ));
            executor.assign_attribute(
                attribute_segments,
                incomplete,
                &mut working,
                &mut assignments,
                attribute_summary,
                &mut summary,
            );
        }
        debug!("{} assignments made", assignments.len());

        // Step 4: Numeric imputation per segment
        info!("Step 4: Imputing numeric values...");
        let mut cache = ImputationCache::new();
        let numeric: Vec<usize> = (0..segments.len())
            .filter(|&i| data.schema().attribute(segments[i].attribute).is_numeric())
            .collect();
        for (n, &i) in numeric.iter().enumerate() {
            self.report_progress(ProgressUpdate::for_item(
                ImputationStage::ImputingNumeric,
                format!("Attribute: {}", attributes[i].name),
                n,
                numeric.len(),
                format!("Imputing '{}'", attributes[i].name),
            ));
            executor.impute_numeric_attribute(
                &segments[i],
                incomplete,
                &assignments,
                &mut cache,
                &mut working,
                &mut attributes[i],
                &mut summary,
            );
        }
        ImputationExecutor::record_cache_stats(&cache, &mut summary);

        // Step 5: Recombine
        self.report_progress(ProgressUpdate::new(
            ImputationStage::Recombining,
            0.0,
            "Recombining records...",
        ));
        info!("Step 5: Recombining records in original order...");

        let dataset = ImputationExecutor::recombine(data, working);
        if dataset.len() != data.len() {
            return Err(ImputationError::Internal(format!(
                "recombined {} records, expected {}",
                dataset.len(),
                data.len()
            )));
        }

        summary.missing_after = dataset.missing_cells();
        summary.attributes = attributes;
        summary.duration_ms = start_time.elapsed().as_millis() as u64;

        if !summary.unresolved.is_empty() {
            warn!("{} cells could not be imputed", summary.unresolved.len());
        }
        info!(
            "Imputation complete: {} cells filled, {} still missing ({} ms)",
            summary.cells_imputed(),
            summary.missing_after,
            summary.duration_ms
        );

        Ok(ImputationResult { dataset, summary })
    }

    fn build_segments(
        &self,
        data: &Dataset,
        partition: &Partition,
        context: &RunContext,
        summary: &mut ImputationSummary,
    ) -> (Vec<AttributeSegments>, Vec<AttributeSummary>) {
        info!("Step 2: Building rules and segments...");
        let source = if context.no_complete {
            data
        } else {
            &partition.complete
        };
        let builder = SegmentBuilder::new(
            self.tree_inducer.as_ref(),
            self.discretizer.as_ref(),
            context,
        );

        let targets = data.missing_attributes();
        let mut segments = Vec::with_capacity(targets.len());
        let mut attributes = Vec::with_capacity(targets.len());

        for (i, &attribute) in targets.iter().enumerate() {
            let target = data.schema().attribute(attribute);
            self.report_progress(ProgressUpdate::for_item(
                ImputationStage::BuildingSegments,
                format!("Attribute: {}", target.name),
                i,
                targets.len(),
                format!("Building segments for '{}'", target.name),
            ));

            let built = builder.build(attribute, &partition.complete, source);
            for warning in &built.warnings {
                summary.add_warning(warning.clone());
            }

            let kind = if target.is_numeric() {
                "numeric"
            } else {
                "categorical"
            };
            let mut attribute_summary =
                AttributeSummary::new(&target.name, kind, data.missing_count(attribute));
            attribute_summary.bins = built.bins;
            attribute_summary.induced_rules = built.induced_rules;
            attribute_summary.rules = built.rules.display(data.schema());
            attribute_summary.merged = built.merged;
            attribute_summary.universal = built.rules.is_universal();
            attribute_summary.segment_sizes = built.segment_sizes();
            debug!(
                "'{}': {} segments, sizes {:?}",
                target.name,
                built.rules.len(),
                attribute_summary.segment_sizes
            );

            segments.push(built);
            attributes.push(attribute_summary);
        }

        (segments, attributes)
    }
}

/// Builder for creating a [`DmiImputer`] instance.
///
/// Every collaborator has a default: [`C45Inducer`],
/// [`EqualWidthDiscretizer`] and [`GaussianEm`].
#[derive(Default)]
pub struct DmiImputerBuilder {
    config: Option<DmiConfig>,
    tree_inducer: Option<Arc<dyn TreeInducer>>,
    discretizer: Option<Arc<dyn Discretizer>>,
    em_routine: Option<Arc<dyn EmRoutine>>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
}

static_assertions::assert_impl_all!(DmiImputerBuilder: Send);

impl DmiImputerBuilder {
    pub fn config(mut self, config: DmiConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn tree_inducer(mut self, inducer: Arc<dyn TreeInducer>) -> Self {
        self.tree_inducer = Some(inducer);
        self
    }

    pub fn discretizer(mut self, discretizer: Arc<dyn Discretizer>) -> Self {
        self.discretizer = Some(discretizer);
        self
    }

    pub fn em_routine(mut self, em: Arc<dyn EmRoutine>) -> Self {
        self.em_routine = Some(em);
        self
    }

    /// Set a progress reporter for receiving updates during a run.
    pub fn progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.progress_reporter = Some(reporter);
        self
    }

    /// Set a progress callback closure.
    ///
    /// For more complex scenarios, use [`progress_reporter`](Self::progress_reporter).
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress_reporter = Some(Arc::new(ClosureProgressReporter::new(callback)));
        self
    }

    /// Build the imputer.
    ///
    /// Returns an error if the configuration is invalid.
    pub fn build(self) -> std::result::Result<DmiImputer, ConfigValidationError> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        Ok(DmiImputer {
            config,
            tree_inducer: self.tree_inducer.unwrap_or_else(|| Arc::new(C45Inducer)),
            discretizer: self
                .discretizer
                .unwrap_or_else(|| Arc::new(EqualWidthDiscretizer)),
            em_routine: self.em_routine.unwrap_or_else(|| Arc::new(GaussianEm)),
            progress_reporter: self.progress_reporter,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::tests::{cat, num, small_schema};
    use crate::dataset::Value;
    use crate::tree::{InductionError, Tree, TreeParams};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NeverInducer;

    impl TreeInducer for NeverInducer {
        fn induce(
            &self,
            _data: &Dataset,
            _target: usize,
            _params: &TreeParams,
        ) -> std::result::Result<Tree, InductionError> {
            Err(InductionError::EmptyTrainingSet)
        }
    }

    fn sample() -> Dataset {
        let mut rows: Vec<Vec<Value>> = (0..12)
            .map(|i| {
                vec![
                    num(20.0 + 3.0 * i as f64),
                    cat(i % 2),
                    num(1000.0 + 100.0 * i as f64),
                ]
            })
            .collect();
        rows.insert(3, vec![num(30.0), Value::Missing, num(1500.0)]);
        rows.push(vec![num(40.0), cat(1), Value::Missing]);
        Dataset::from_rows(small_schema(), rows).unwrap()
    }

    // ========================================================================
    // builder tests
    // ========================================================================

    #[test]
    fn test_builder_default() {
        let imputer = DmiImputer::builder().build().unwrap();
        assert_eq!(imputer.config(), &DmiConfig::default());
        assert!(imputer.progress_reporter.is_none());
    }

    #[test]
    fn test_builder_with_config() {
        let config = DmiConfig::builder().min_records_for_em(7).build().unwrap();
        let imputer = DmiImputer::builder().config(config).build().unwrap();
        assert_eq!(imputer.config().min_records_for_em, Some(7));
    }

    #[test]
    fn test_builder_rejects_invalid_config() {
        let config = DmiConfig {
            min_categories_for_discretization: 1,
            ..DmiConfig::default()
        };
        assert!(DmiImputer::builder().config(config).build().is_err());
    }

    #[test]
    fn test_builder_with_progress_callback() {
        let call_count = Arc::new(AtomicUsize::new(0));
        let call_count_clone = call_count.clone();

        let imputer = DmiImputer::builder()
            .on_progress(move |_update| {
                call_count_clone.fetch_add(1, Ordering::SeqCst);
            })
            .build()
            .unwrap();

        imputer.report_progress(ProgressUpdate::new(ImputationStage::Partitioning, 0.5, "Test"));

        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }

    // ========================================================================
    // impute() tests
    // ========================================================================

    #[test]
    fn test_impute_fills_everything_in_order() {
        let data = sample();
        let result = DmiImputer::builder().build().unwrap().impute(&data).unwrap();

        assert_eq!(result.dataset.len(), data.len());
        assert_eq!(result.dataset.missing_cells(), 0);
        for (before, after) in data.records().iter().zip(result.dataset.records()) {
            assert_eq!(before.id, after.id);
            if !before.has_missing() {
                assert_eq!(before, after);
            }
        }
        assert_eq!(result.summary.rows_incomplete, 2);
        assert_eq!(result.summary.cells_imputed(), 2);
        assert_eq!(result.summary.attributes.len(), 2);
        assert!(result.summary.unresolved.is_empty());
    }

    #[test]
    fn test_impute_empty_dataset() {
        let data = Dataset::from_rows(small_schema(), vec![]).unwrap();
        let err = DmiImputer::builder().build().unwrap().impute(&data).unwrap_err();
        assert!(matches!(err, ImputationError::EmptyDataset));
    }

    #[test]
    fn test_impute_without_missing_values_is_identity() {
        let data = Dataset::from_rows(
            small_schema(),
            vec![vec![num(1.0), cat(0), num(2.0)], vec![num(3.0), cat(1), num(4.0)]],
        )
        .unwrap();
        let result = DmiImputer::builder().build().unwrap().impute(&data).unwrap();
        assert_eq!(result.dataset, data);
        assert_eq!(result.summary.cells_imputed(), 0);
    }

    #[test]
    fn test_inducer_failure_is_a_warning() {
        let data = sample();
        let result = DmiImputer::builder()
            .tree_inducer(Arc::new(NeverInducer))
            .build()
            .unwrap()
            .impute(&data)
            .unwrap();

        assert_eq!(result.dataset.missing_cells(), 0);
        assert!(result.summary.attributes.iter().all(|a| a.universal));
        assert!(
            result
                .summary
                .warnings
                .iter()
                .any(|w| w.contains("tree induction failed"))
        );
    }

    #[test]
    fn test_progress_stages_in_order() {
        let stages = Arc::new(Mutex::new(Vec::new()));
        let sink = stages.clone();
        let imputer = DmiImputer::builder()
            .on_progress(move |update| {
                if let Ok(mut seen) = sink.lock() {
                    seen.push(update.stage);
                }
            })
            .build()
            .unwrap();

        imputer.impute(&sample()).unwrap();

        let seen = stages.lock().unwrap();
        assert_eq!(seen.first(), Some(&ImputationStage::Initializing));
        assert_eq!(seen.last(), Some(&ImputationStage::Complete));
        assert!(seen.contains(&ImputationStage::BuildingSegments));
        assert!(seen.contains(&ImputationStage::AssigningRecords));
        assert!(seen.contains(&ImputationStage::ImputingNumeric));
        assert!(seen.contains(&ImputationStage::Recombining));
    }

    #[test]
    fn test_failed_run_reports_failure() {
        let stages = Arc::new(Mutex::new(Vec::new()));
        let sink = stages.clone();
        let imputer = DmiImputer::builder()
            .on_progress(move |update| {
                if let Ok(mut seen) = sink.lock() {
                    seen.push(update.stage);
                }
            })
            .build()
            .unwrap();

        let empty = Dataset::from_rows(small_schema(), vec![]).unwrap();
        assert!(imputer.impute(&empty).is_err());
        assert_eq!(stages.lock().unwrap().last(), Some(&ImputationStage::Failed));
    }

    // ========================================================================
    // plan() tests
    // ========================================================================

    #[test]
    fn test_plan_describes_each_missing_attribute() {
        let data = sample();
        let plans = DmiImputer::builder().build().unwrap().plan(&data).unwrap();

        let names: Vec<&str> = plans.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["city", "income"]);
        assert_eq!(plans[1].kind, "numeric");
        assert!(plans[1].bins.is_some());
        for plan in &plans {
            assert!(!plan.rules.is_empty());
            assert_eq!(plan.rules.len(), plan.segment_sizes.len());
            assert_eq!(plan.imputed, 0);
        }
    }

    #[test]
    fn test_config_is_not_mutated_by_runs() {
        let imputer = DmiImputer::builder().build().unwrap();
        imputer.impute(&sample()).unwrap();
        assert_eq!(imputer.config(), &DmiConfig::default());
        assert_eq!(imputer.config().min_records_in_leaf, None);
    }
}
