//! Imputation of the values inside one segment.
//!
//! - EM imputation of numeric blocks ([`GaussianEm`] behind [`EmRoutine`])
//! - Statistical imputation (segment mean, segment mode)
//! - Per-segment orchestration with an at-most-once cache

mod em;
mod segment;
mod statistical;

pub use em::{EmError, EmParams, EmRoutine, GaussianEm};
pub use segment::{ImputationCache, ImputedSegment, NumericMethod, SegmentImputer, numeric_block};
pub use statistical::StatisticalImputer;
