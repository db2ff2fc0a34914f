//! Segmented Imputation Library
//!
//! Fills missing values in tabular data using decision-tree segments, built
//! with Rust, ndarray and Polars.
//!
//! # Overview
//!
//! For every attribute with missing values the imputer:
//!
//! - **Partitions** the records into complete and incomplete ones
//! - **Segments** the complete records with a C4.5 tree grown on that
//!   attribute (numeric attributes are discretized first), merging leaves
//!   that are too small to impute from
//! - **Assigns** each incomplete record to the first segment whose rule it
//!   satisfies, or to the segment with the closest centroid
//! - **Imputes** categorical values with the segment mode and numeric values
//!   with EM on the segment, falling back to the segment mean
//! - **Recombines** the records in their original order
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use lex_imputation::{DmiConfig, DmiImputer};
//! use polars::prelude::*;
//!
//! let df = CsvReadOptions::default()
//!     .with_has_header(true)
//!     .try_into_reader_with_file_path(Some("data.csv".into()))?
//!     .finish()?;
//!
//! let config = DmiConfig::builder()
//!     .confidence_factor(0.25)
//!     .em_max_iterations(200)
//!     .build()?;
//!
//! let result = DmiImputer::builder()
//!     .config(config)
//!     .on_progress(|update| {
//!         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
//!     })
//!     .build()?
//!     .impute_dataframe(&df)?;
//!
//! println!("{} cells imputed", result.summary.cells_imputed());
//! ```
//!
//! # Collaborators
//!
//! Tree induction, discretization and EM sit behind traits so they can be
//! replaced:
//!
//! - [`TreeInducer`] - default [`C45Inducer`]
//! - [`Discretizer`] - default [`EqualWidthDiscretizer`]
//! - [`EmRoutine`] - default [`GaussianEm`]
//!
//! A failing collaborator never aborts a run: the attribute falls back to a
//! single segment, or the segment to mean imputation, and the failure is
//! recorded in [`ImputationSummary::warnings`].

pub mod config;
pub mod dataset;
pub mod error;
pub mod imputers;
pub mod pipeline;
pub mod segments;
pub mod tree;
pub mod types;
pub mod utils;

// Re-exports for convenient access
pub use config::{ConfigValidationError, DmiConfig, DmiConfigBuilder, ResolvedParams};
pub use dataset::{
    Attribute, AttributeKind, AttributeStats, ColumnEncoding, Dataset, DatasetStats, Partition,
    Record, RecordPartitioner, RowId, Schema, Value,
};
pub use error::{ImputationError, Result as DmiResult, ResultExt};
pub use imputers::{
    EmError, EmParams, EmRoutine, GaussianEm, ImputationCache, ImputedSegment, NumericMethod,
    SegmentImputer, StatisticalImputer,
};
pub use pipeline::{
    ClosureProgressReporter, DmiImputer, DmiImputerBuilder, ImputationStage, ProgressReporter,
    ProgressUpdate, RunContext,
};
pub use segments::{AttributeSegments, CentroidVector, Rule, RuleMerger, RuleSet, SegmentBuilder};
pub use tree::{
    C45Inducer, Condition, DiscretizationError, Discretizer, EqualWidthDiscretizer,
    InductionError, Predicate, Tree, TreeInducer, TreeParams,
};
pub use types::{
    AttributePlan, AttributeSummary, FrameImputation, ImputationResult, ImputationSummary,
    UnresolvedCell,
};
pub use utils::{denormalize, normalize};
