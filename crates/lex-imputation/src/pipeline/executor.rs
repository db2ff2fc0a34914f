//! Steps 3 to 5 of a run: routing incomplete records to segments, numeric
//! imputation per segment, recombination.

use crate::dataset::{AttributeKind, Dataset, Record, RowId, Schema, Value};
use crate::imputers::{ImputationCache, ImputedSegment, NumericMethod, SegmentImputer};
use crate::pipeline::RunContext;
use crate::segments::{AttributeSegments, SegmentAssigner};
use crate::types::{AttributeSummary, ImputationSummary, UnresolvedCell};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Segment chosen for each `(record, attribute)` pair in step 3.
pub type Assignments = HashMap<(RowId, usize), usize>;

/// Executes the per-record steps of a run against prepared segments.
pub struct ImputationExecutor<'a> {
    schema: &'a Schema,
    context: &'a RunContext,
    imputer: SegmentImputer<'a>,
}

impl<'a> ImputationExecutor<'a> {
    pub fn new(schema: &'a Schema, context: &'a RunContext, imputer: SegmentImputer<'a>) -> Self {
        Self {
            schema,
            context,
            imputer,
        }
    }

    /// Step 3 for one attribute.
    ///
    /// Every incomplete record missing `segments.attribute` gets a segment:
    /// the first matching rule, else the nearest centroid. Categorical
    /// cells are filled right away with the segment mode in `working`;
    /// records missing a numeric value join the segment for step 4.
    pub fn assign_attribute(
        &self,
        segments: &mut AttributeSegments,
        incomplete: &[Record],
        working: &mut HashMap<RowId, Record>,
        assignments: &mut Assignments,
        attribute_summary: &mut AttributeSummary,
        summary: &mut ImputationSummary,
    ) {
        let attribute = segments.attribute;
        let target = self.schema.attribute(attribute);
        let mut by_centroid = 0usize;

        for record in incomplete.iter().filter(|r| r.is_missing(attribute)) {
            let segment = match SegmentAssigner::assign(&segments.rules, record) {
                Some(index) => Some(index),
                None => {
                    let closest = SegmentAssigner::closest_segment(
                        record,
                        &segments.centroids,
                        &self.context.stats,
                    );
                    if closest.is_some() {
                        by_centroid += 1;
                    }
                    closest
                }
            };
            let Some(segment) = segment else {
                leave_unresolved(summary, &target.name, record.id, None);
                continue;
            };
            assignments.insert((record.id, attribute), segment);

            match target.kind {
                AttributeKind::Categorical { .. } => {
                    let mode = self
                        .imputer
                        .categorical_mode(&segments.segments[segment], attribute);
                    match (mode, working.get_mut(&record.id)) {
                        (Some(mode), Some(row)) => {
                            row.values[attribute] = Value::Category(mode);
                            summary.categorical_filled += 1;
                            attribute_summary.imputed += 1;
                        }
                        _ => leave_unresolved(summary, &target.name, record.id, Some(segment)),
                    }
                }
                AttributeKind::Numeric => {
                    // with no complete records the segments already hold every record
                    if !self.context.no_complete {
                        segments.segments[segment].push(record.clone());
                    }
                }
            }
        }

        if by_centroid > 0 {
            warn!(
                "'{}': {} records matched no rule and were routed to the nearest centroid",
                target.name, by_centroid
            );
        }
        attribute_summary.centroid_assignments = by_centroid;
        summary.centroid_assignments += by_centroid;
        attribute_summary.segment_sizes = segments.segment_sizes();
    }

    /// Step 4 for one numeric attribute.
    ///
    /// Each touched segment is imputed once through `cache`. A record with
    /// every numeric attribute missing takes the segment's centroid mean
    /// instead of a row of the imputed block.
    pub fn impute_numeric_attribute(
        &self,
        segments: &AttributeSegments,
        incomplete: &[Record],
        assignments: &Assignments,
        cache: &mut ImputationCache,
        working: &mut HashMap<RowId, Record>,
        attribute_summary: &mut AttributeSummary,
        summary: &mut ImputationSummary,
    ) {
        let attribute = segments.attribute;
        let name = attribute_summary.name.clone();

        for record in incomplete.iter().filter(|r| r.is_missing(attribute)) {
            let Some(&segment) = assignments.get(&(record.id, attribute)) else {
                continue;
            };

            let value = if record.all_missing(&self.context.numeric_attributes) {
                let centroid_mean = segments.centroids[segment]
                    .denormalized(attribute, &self.context.stats);
                let value = match centroid_mean {
                    Some(mean) => Some(mean),
                    None => self
                        .impute_cached(segments, segment, cache)
                        .column_mean(attribute),
                };
                if value.is_some() {
                    summary.all_numeric_missing_shortcuts += 1;
                }
                value
            } else {
                let value = self
                    .impute_cached(segments, segment, cache)
                    .value(record.id, attribute);
                if value.is_some() {
                    summary.numeric_filled += 1;
                }
                value
            };

            match (value, working.get_mut(&record.id)) {
                (Some(v), Some(row)) => {
                    row.values[attribute] = Value::Numeric(v);
                    attribute_summary.imputed += 1;
                }
                _ => leave_unresolved(summary, &name, record.id, Some(segment)),
            }
        }
    }

    fn impute_cached<'c>(
        &self,
        segments: &AttributeSegments,
        segment: usize,
        cache: &'c mut ImputationCache,
    ) -> &'c ImputedSegment {
        cache.get_or_impute(segments.attribute, segment, || {
            self.imputer.impute_segment(&segments.segments[segment])
        })
    }

    /// Fold the cache into the run counters once step 4 is done.
    pub fn record_cache_stats(cache: &ImputationCache, summary: &mut ImputationSummary) {
        for segment in cache.segments() {
            match segment.method {
                NumericMethod::Em => summary.em_runs += 1,
                NumericMethod::MeanFallback => summary.mean_fallback_segments += 1,
            }
            if let Some(error) = &segment.em_error {
                summary.em_failures += 1;
                summary.add_warning(format!("EM failed on a segment: {error}; used means"));
            }
        }
        debug!(
            "{} segments imputed ({} EM, {} mean)",
            cache.len(),
            summary.em_runs,
            summary.mean_fallback_segments
        );
    }

    /// Step 5: the original records in their original order, with imputed
    /// records swapped in by id.
    pub fn recombine(original: &Dataset, mut working: HashMap<RowId, Record>) -> Dataset {
        let records = original
            .records()
            .iter()
            .map(|record| {
                working
                    .remove(&record.id)
                    .unwrap_or_else(|| record.clone())
            })
            .collect();
        Dataset::from_parts(original.shared_schema(), records)
    }
}

/// A cell that stays missing: logged, added to the warnings and listed.
fn leave_unresolved(
    summary: &mut ImputationSummary,
    name: &str,
    row: RowId,
    segment: Option<usize>,
) {
    let place = match segment {
        Some(segment) => format!("segment {segment}"),
        None => "no segment".to_string(),
    };
    warn!("No value found for '{}' of record {} ({})", name, row, place);
    summary.add_warning(format!("{name}: record {row} left missing ({place})"));
    summary.unresolved.push(UnresolvedCell {
        row,
        attribute: name.to_string(),
        segment,
    });
}
