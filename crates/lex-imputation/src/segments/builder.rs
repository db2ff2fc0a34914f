//! Rule lists, segments and centroids for one target attribute.

use super::assigner::CentroidVector;
use super::merger::RuleMerger;
use super::rules::RuleSet;
use crate::dataset::{AttributeStats, Dataset};
use crate::pipeline::RunContext;
use crate::tree::{Discretizer, TreeInducer};
use tracing::{debug, warn};

/// Everything step 2 produces for one target attribute.
#[derive(Debug, Clone)]
pub struct AttributeSegments {
    pub attribute: usize,
    /// Rules extracted from the tree, before merging.
    pub induced_rules: usize,
    /// Bins used when the target was numeric.
    pub bins: Option<usize>,
    pub merged: bool,
    pub rules: RuleSet,
    /// One working dataset per rule, same order as `rules`.
    pub segments: Vec<Dataset>,
    pub centroids: Vec<CentroidVector>,
    pub warnings: Vec<String>,
}

impl AttributeSegments {
    pub fn segment_sizes(&self) -> Vec<usize> {
        self.segments.iter().map(Dataset::len).collect()
    }
}

/// Number of bins for a numeric target: `floor(sqrt(max - min))` over the
/// whole dataset, but never fewer than `min_categories`.
pub fn bin_count(stats: &AttributeStats, min_categories: usize) -> usize {
    let by_range = stats.range().max(0.0).sqrt().floor() as usize;
    by_range.max(min_categories)
}

pub struct SegmentBuilder<'a> {
    inducer: &'a dyn TreeInducer,
    discretizer: &'a dyn Discretizer,
    context: &'a RunContext,
}

impl<'a> SegmentBuilder<'a> {
    pub fn new(
        inducer: &'a dyn TreeInducer,
        discretizer: &'a dyn Discretizer,
        context: &'a RunContext,
    ) -> Self {
        Self {
            inducer,
            discretizer,
            context,
        }
    }

    /// Build the segments of `attribute`.
    ///
    /// `complete` trains the tree. `source` supplies segment members: the
    /// complete set normally, the whole dataset when nothing is complete.
    /// Collaborator failures degrade to the universal rule.
    pub fn build(
        &self,
        attribute: usize,
        complete: &Dataset,
        source: &Dataset,
    ) -> AttributeSegments {
        let mut warnings = Vec::new();
        let mut bins = None;
        let name = &source.schema().attribute(attribute).name;

        let induced = if self.context.no_complete {
            debug!("'{}': no complete records, using a single segment", name);
            RuleSet::universal(source.len())
        } else {
            match self.induce(attribute, complete, &mut bins) {
                Ok(rules) => rules,
                Err(reason) => {
                    warn!("'{}': {}; using a single segment", name, reason);
                    warnings.push(format!("{name}: {reason}; using a single segment"));
                    RuleSet::universal(complete.len())
                }
            }
        };

        let induced_rules = induced.len();
        let merged = self.context.merge_enabled() && !induced.is_universal();
        let rules = if merged {
            RuleMerger::new(self.context.params.min_records_for_em).merge(&induced)
        } else {
            induced
        };
        debug!(
            "'{}': {} rules -> {:?}",
            name,
            induced_rules,
            rules.display(source.schema())
        );

        let segments: Vec<Dataset> = rules
            .iter()
            .map(|rule| source.filter(|record| rule.matches(record)))
            .collect();
        let centroids = segments
            .iter()
            .map(|segment| {
                CentroidVector::compute(segment.records(), source.schema(), &self.context.stats)
            })
            .collect();

        AttributeSegments {
            attribute,
            induced_rules,
            bins,
            merged,
            rules,
            segments,
            centroids,
            warnings,
        }
    }

    fn induce(
        &self,
        attribute: usize,
        complete: &Dataset,
        bins_used: &mut Option<usize>,
    ) -> Result<RuleSet, String> {
        let target = complete.schema().attribute(attribute);

        let working = if target.is_numeric() {
            let bins = bin_count(
                self.context.stats.attribute(attribute),
                self.context.params.min_categories_for_discretization,
            );
            *bins_used = Some(bins);
            self.discretizer
                .discretize(complete, attribute, bins)
                .map_err(|e| format!("discretization failed: {e}"))?
        } else {
            complete.clone()
        };

        let distinct = AttributeStats::compute(
            working.records(),
            working.schema().attribute(attribute),
        )
        .distinct;
        if distinct < 2 {
            return Ok(RuleSet::universal(complete.len()));
        }

        let tree = self
            .inducer
            .induce(&working, attribute, &self.context.tree_params())
            .map_err(|e| format!("tree induction failed: {e}"))?;
        debug!(
            "'{}': tree with {} leaves, depth {}",
            target.name,
            tree.leaf_count(),
            tree.depth()
        );
        Ok(RuleSet::from_tree(&tree))
    }
}
