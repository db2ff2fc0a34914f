use crate::config::{DmiConfig, ResolvedParams};
use crate::dataset::{Dataset, DatasetStats};
use crate::imputers::EmParams;
use crate::tree::TreeParams;

/// Facts fixed for one imputation run and shared by every step.
#[derive(Debug, Clone)]
pub struct RunContext {
    /// The dataset has no complete record.
    pub no_complete: bool,
    /// Too few complete records to merge rules or run EM.
    pub no_merge_no_em: bool,
    pub complete_rows: usize,
    pub numeric_attributes: Vec<usize>,
    pub params: ResolvedParams,
    /// Statistics over the whole input dataset.
    pub stats: DatasetStats,
}

impl RunContext {
    pub fn new(data: &Dataset, complete_rows: usize, config: &DmiConfig) -> Self {
        let numeric_attributes = data.schema().numeric_indices();
        let no_complete = complete_rows == 0;
        let no_merge_no_em = no_complete || complete_rows < numeric_attributes.len();

        Self {
            no_complete,
            no_merge_no_em,
            complete_rows,
            params: config.resolve(numeric_attributes.len()),
            numeric_attributes,
            stats: DatasetStats::compute(data),
        }
    }

    pub fn merge_enabled(&self) -> bool {
        !self.no_merge_no_em
    }

    /// EM runs on a segment only when the run allows it and the numeric
    /// sub-dataset has more than two attributes.
    pub fn em_applicable(&self) -> bool {
        !self.no_merge_no_em && self.numeric_attributes.len() > 2
    }

    pub fn tree_params(&self) -> TreeParams {
        TreeParams {
            min_leaf_size: self.params.min_records_in_leaf,
            confidence_factor: self.params.confidence_factor,
        }
    }

    pub fn em_params(&self) -> EmParams {
        EmParams {
            max_iterations: self.params.em_max_iterations,
            log_likelihood_threshold: self.params.em_log_likelihood_threshold,
        }
    }
}
