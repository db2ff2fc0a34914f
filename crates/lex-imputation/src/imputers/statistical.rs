//! Statistical fallbacks: column means for numeric blocks, modes for
//! categorical attributes.

use crate::dataset::{Attribute, AttributeStats, Record};
use ndarray::{Array2, Axis};

/// Statistical imputation methods for filling missing values.
pub struct StatisticalImputer;

impl StatisticalImputer {
    /// Mean of the observed (non-`NaN`) cells of every column.
    pub fn column_means(block: &Array2<f64>) -> Vec<Option<f64>> {
        block
            .axis_iter(Axis(1))
            .map(|column| {
                let observed: Vec<f64> = column.iter().copied().filter(|v| !v.is_nan()).collect();
                if observed.is_empty() {
                    None
                } else {
                    Some(observed.iter().sum::<f64>() / observed.len() as f64)
                }
            })
            .collect()
    }

    /// Apply mean imputation to every column of a numeric block.
    ///
    /// A column with no observed value takes `fallback[j]` instead; if that
    /// is `None` too, its cells stay `NaN`. Returns the number of cells
    /// filled.
    pub fn apply_numeric_mean(
        block: &mut Array2<f64>,
        names: &[String],
        fallback: &[Option<f64>],
        processing_steps: &mut Vec<String>,
    ) -> usize {
        let means = Self::column_means(block);
        let mut total = 0;

        for (j, mut column) in block.axis_iter_mut(Axis(1)).enumerate() {
            let missing = column.iter().filter(|v| v.is_nan()).count();
            if missing == 0 {
                continue;
            }
            let (fill_value, method) = match (means[j], fallback.get(j).copied().flatten()) {
                (Some(mean), _) => (mean, "mean"),
                (None, Some(global)) => (global, "global mean (fallback)"),
                (None, None) => continue,
            };

            column.mapv_inplace(|v| if v.is_nan() { fill_value } else { v });
            total += missing;

            let name = names.get(j).map(String::as_str).unwrap_or("?");
            processing_steps.push(format!(
                "Filled {} cells of '{}' with {}: {:.2}",
                missing, name, method, fill_value
            ));
        }

        total
    }

    /// Most frequent category of `attribute` over `records`, or `fallback`
    /// when none of them has a value.
    pub fn segment_mode(
        records: &[Record],
        attribute: &Attribute,
        fallback: Option<usize>,
    ) -> Option<usize> {
        AttributeStats::compute(records, attribute).mode.or(fallback)
    }
}
