//! Segment assignment: first matching rule, else nearest centroid.

use super::rules::RuleSet;
use crate::dataset::{AttributeKind, AttributeStats, DatasetStats, Record, Schema, Value};

/// One component of a segment centroid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CentroidValue {
    /// Segment has no value for this attribute.
    Undefined,
    /// Mean scaled into [0, 1] with the whole-dataset min and max.
    Scaled(f64),
    /// Most frequent category.
    Mode(usize),
}

/// Per-attribute summary of a segment, used only to route records that no
/// rule matches.
#[derive(Debug, Clone, PartialEq)]
pub struct CentroidVector {
    components: Vec<CentroidValue>,
}

impl CentroidVector {
    pub fn compute(records: &[Record], schema: &Schema, global: &DatasetStats) -> Self {
        let components = schema
            .attributes()
            .iter()
            .map(|attribute| {
                let local = AttributeStats::compute(records, attribute);
                match attribute.kind {
                    AttributeKind::Numeric => local
                        .mean
                        .map(|mean| {
                            CentroidValue::Scaled(global.attribute(attribute.index).normalize(mean))
                        })
                        .unwrap_or(CentroidValue::Undefined),
                    AttributeKind::Categorical { .. } => local
                        .mode
                        .map(CentroidValue::Mode)
                        .unwrap_or(CentroidValue::Undefined),
                }
            })
            .collect();
        Self { components }
    }

    pub fn component(&self, attribute: usize) -> CentroidValue {
        self.components[attribute]
    }

    /// The segment mean of a numeric attribute in original units.
    pub fn denormalized(&self, attribute: usize, global: &DatasetStats) -> Option<f64> {
        match self.components[attribute] {
            CentroidValue::Scaled(c) => global.attribute(attribute).denormalize(c),
            _ => None,
        }
    }

    /// Squared scaled difference per numeric attribute plus one per
    /// categorical mismatch, over the attributes present in `record`. An
    /// undefined component costs one.
    pub fn distance(&self, record: &Record, global: &DatasetStats) -> f64 {
        record
            .values
            .iter()
            .enumerate()
            .map(|(attribute, value)| match (value, self.components[attribute]) {
                (Value::Missing, _) => 0.0,
                (Value::Numeric(v), CentroidValue::Scaled(c)) => {
                    let diff = global.attribute(attribute).normalize(*v) - c;
                    diff * diff
                }
                (Value::Category(v), CentroidValue::Mode(m)) => {
                    if *v == m {
                        0.0
                    } else {
                        1.0
                    }
                }
                _ => 1.0,
            })
            .sum()
    }
}

/// Routes records to segments of one target attribute.
pub struct SegmentAssigner;

impl SegmentAssigner {
    /// Most specific matching rule, or `None` when no rule matches.
    pub fn assign(rules: &RuleSet, record: &Record) -> Option<usize> {
        rules.first_match(record)
    }

    /// Segment whose centroid is nearest to `record`; ties go to the lower
    /// index. `None` only when there are no centroids.
    pub fn closest_segment(
        record: &Record,
        centroids: &[CentroidVector],
        global: &DatasetStats,
    ) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (index, centroid) in centroids.iter().enumerate() {
            let distance = centroid.distance(record, global);
            if best.is_none_or(|(_, d)| distance < d) {
                best = Some((index, distance));
            }
        }
        best.map(|(index, _)| index)
    }
}
