//! Horizontal segmentation of a dataset per target attribute.
//!
//! For every attribute with missing values, a tree trained on the complete
//! records is turned into a [`RuleSet`]; undersized rules are merged upward by
//! [`RuleMerger`]; each rule selects a segment; incomplete records are routed
//! to segments by [`SegmentAssigner`].

mod assigner;
mod builder;
mod merger;
mod rules;

pub use assigner::{CentroidValue, CentroidVector, SegmentAssigner};
pub use builder::{AttributeSegments, SegmentBuilder, bin_count};
pub use merger::RuleMerger;
pub use rules::{Rule, RuleSet};
