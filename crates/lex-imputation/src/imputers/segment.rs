//! Per-segment imputation and the at-most-once cache.

use super::em::{EmError, EmRoutine};
use super::statistical::StatisticalImputer;
use crate::dataset::{Dataset, RowId};
use crate::pipeline::RunContext;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use tracing::{debug, warn};

/// How the numeric block of a segment was completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumericMethod {
    Em,
    MeanFallback,
}

/// The numeric sub-dataset of one segment after imputation.
#[derive(Debug, Clone)]
pub struct ImputedSegment {
    rows: HashMap<RowId, usize>,
    columns: Vec<usize>,
    block: Array2<f64>,
    pub method: NumericMethod,
    pub em_error: Option<EmError>,
    /// Cells filled by the mean pass, after EM or instead of it.
    pub mean_filled: usize,
    pub processing_steps: Vec<String>,
}

impl ImputedSegment {
    /// Imputed value of `attribute` for the record with id `row`.
    pub fn value(&self, row: RowId, attribute: usize) -> Option<f64> {
        let r = *self.rows.get(&row)?;
        let c = self.columns.iter().position(|&a| a == attribute)?;
        let v = self.block[[r, c]];
        (!v.is_nan()).then_some(v)
    }

    pub fn column_mean(&self, attribute: usize) -> Option<f64> {
        let c = self.columns.iter().position(|&a| a == attribute)?;
        let column = self.block.column(c);
        let observed: Vec<f64> = column.iter().copied().filter(|v| !v.is_nan()).collect();
        (!observed.is_empty()).then(|| observed.iter().sum::<f64>() / observed.len() as f64)
    }

    pub fn len(&self) -> usize {
        self.block.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.block.nrows() == 0
    }
}

/// Imputed numeric segments keyed by `(attribute, segment)`. Each key is
/// imputed at most once per run.
#[derive(Debug, Default)]
pub struct ImputationCache {
    entries: HashMap<(usize, usize), ImputedSegment>,
}

impl ImputationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, attribute: usize, segment: usize) -> bool {
        self.entries.contains_key(&(attribute, segment))
    }

    /// Cached segment, or the result of `impute` stored under the key.
    pub fn get_or_impute<F>(
        &mut self,
        attribute: usize,
        segment: usize,
        impute: F,
    ) -> &ImputedSegment
    where
        F: FnOnce() -> ImputedSegment,
    {
        match self.entries.entry((attribute, segment)) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(e) => {
                debug!("Imputing segment {} of attribute {}", segment, attribute);
                e.insert(impute())
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn segments(&self) -> impl Iterator<Item = &ImputedSegment> {
        self.entries.values()
    }
}

/// Fills one segment: categorical cells with the mode, numeric cells with
/// EM or the mean.
pub struct SegmentImputer<'a> {
    em: &'a dyn EmRoutine,
    context: &'a RunContext,
}

impl<'a> SegmentImputer<'a> {
    pub fn new(em: &'a dyn EmRoutine, context: &'a RunContext) -> Self {
        Self { em, context }
    }

    /// Mode of `attribute` in `segment`, the whole-dataset mode when the
    /// segment has no value for it.
    pub fn categorical_mode(&self, segment: &Dataset, attribute: usize) -> Option<usize> {
        StatisticalImputer::segment_mode(
            segment.records(),
            segment.schema().attribute(attribute),
            self.context.stats.attribute(attribute).mode,
        )
    }

    /// Impute every numeric attribute of `segment`.
    pub fn impute_segment(&self, segment: &Dataset) -> ImputedSegment {
        let columns = self.context.numeric_attributes.clone();
        let block = numeric_block(segment, &columns);
        let rows = segment
            .records()
            .iter()
            .enumerate()
            .map(|(i, record)| (record.id, i))
            .collect();

        let (mut block, method, em_error) = if self.context.em_applicable() && !segment.is_empty() {
            match self.em.impute(&block, &self.context.em_params()) {
                Ok(filled) => (filled, NumericMethod::Em, None),
                Err(e) => {
                    warn!(
                        "EM failed on a segment of {} records: {}; using mean imputation",
                        segment.len(),
                        e
                    );
                    (block, NumericMethod::MeanFallback, Some(e))
                }
            }
        } else {
            (block, NumericMethod::MeanFallback, None)
        };

        let names: Vec<String> = columns
            .iter()
            .map(|&a| segment.schema().attribute(a).name.clone())
            .collect();
        let fallback: Vec<Option<f64>> = columns
            .iter()
            .map(|&a| self.context.stats.attribute(a).mean)
            .collect();
        let mut processing_steps = Vec::new();
        let mean_filled = StatisticalImputer::apply_numeric_mean(
            &mut block,
            &names,
            &fallback,
            &mut processing_steps,
        );

        ImputedSegment {
            rows,
            columns,
            block,
            method,
            em_error,
            mean_filled,
            processing_steps,
        }
    }
}

/// Numeric attributes of `data` as a row-major block, `NaN` for missing.
pub fn numeric_block(data: &Dataset, columns: &[usize]) -> Array2<f64> {
    Array2::from_shape_fn((data.len(), columns.len()), |(i, j)| {
        data.records()[i]
            .value(columns[j])
            .as_numeric()
            .unwrap_or(f64::NAN)
    })
}
