//! Per-attribute summary statistics over a set of records.

use super::{Attribute, AttributeKind, Dataset, Record, Schema, Value};
use crate::utils::{denormalize, normalize};

/// Statistics of one attribute. Numeric fields are `None` when no value is
/// present; `mode` is only set for categorical attributes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AttributeStats {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub mode: Option<usize>,
    pub distinct: usize,
    pub missing: usize,
    pub present: usize,
}

impl AttributeStats {
    pub fn compute<'a, I>(records: I, attribute: &Attribute) -> Self
    where
        I: IntoIterator<Item = &'a Record>,
    {
        match &attribute.kind {
            AttributeKind::Numeric => Self::numeric(records, attribute.index),
            AttributeKind::Categorical { categories } => {
                Self::categorical(records, attribute.index, categories.len())
            }
        }
    }

    fn numeric<'a, I>(records: I, index: usize) -> Self
    where
        I: IntoIterator<Item = &'a Record>,
    {
        let mut stats = Self::default();
        let mut values = Vec::new();
        for record in records {
            match record.value(index) {
                Value::Numeric(v) => values.push(*v),
                _ => stats.missing += 1,
            }
        }
        if values.is_empty() {
            return stats;
        }

        stats.present = values.len();
        stats.mean = Some(values.iter().sum::<f64>() / values.len() as f64);
        values.sort_by(f64::total_cmp);
        stats.min = values.first().copied();
        stats.max = values.last().copied();
        values.dedup();
        stats.distinct = values.len();
        stats
    }

    fn categorical<'a, I>(records: I, index: usize, category_count: usize) -> Self
    where
        I: IntoIterator<Item = &'a Record>,
    {
        let mut stats = Self::default();
        let mut counts = vec![0usize; category_count];
        for record in records {
            match record.value(index) {
                Value::Category(c) if *c < category_count => {
                    counts[*c] += 1;
                    stats.present += 1;
                }
                _ => stats.missing += 1,
            }
        }

        stats.distinct = counts.iter().filter(|&&n| n > 0).count();
        // first category wins ties
        let mut best: Option<(usize, usize)> = None;
        for (category, &count) in counts.iter().enumerate() {
            if count > 0 && best.is_none_or(|(_, n)| count > n) {
                best = Some((category, count));
            }
        }
        stats.mode = best.map(|(category, _)| category);
        stats
    }

    /// Width of the observed range, 0 when unknown.
    pub fn range(&self) -> f64 {
        match (self.min, self.max) {
            (Some(min), Some(max)) => max - min,
            _ => 0.0,
        }
    }

    pub fn normalize(&self, value: f64) -> f64 {
        match (self.min, self.max) {
            (Some(min), Some(max)) => normalize(value, min, max),
            _ => 0.0,
        }
    }

    pub fn denormalize(&self, scaled: f64) -> Option<f64> {
        match (self.min, self.max) {
            (Some(min), Some(max)) => Some(denormalize(scaled, min, max)),
            _ => None,
        }
    }

    /// Numeric mean or categorical mode as a cell value.
    pub fn central_value(&self) -> Value {
        match (self.mean, self.mode) {
            (_, Some(mode)) => Value::Category(mode),
            (Some(mean), None) => Value::Numeric(mean),
            (None, None) => Value::Missing,
        }
    }
}

/// Statistics for every attribute of a schema.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetStats {
    attributes: Vec<AttributeStats>,
}

impl DatasetStats {
    pub fn compute(data: &Dataset) -> Self {
        Self::compute_records(data.schema(), data.records())
    }

    pub fn compute_records(schema: &Schema, records: &[Record]) -> Self {
        Self {
            attributes: schema
                .attributes()
                .iter()
                .map(|attribute| AttributeStats::compute(records, attribute))
                .collect(),
        }
    }

    pub fn attribute(&self, index: usize) -> &AttributeStats {
        &self.attributes[index]
    }
}
