//! Pipeline module.
//!
//! The segmented imputer, the per-run context and the executor that carries
//! the assignment and imputation steps.

mod builder;
mod context;
mod executor;
pub mod progress;

pub use builder::{DmiImputer, DmiImputerBuilder};
pub use context::RunContext;
pub use executor::{Assignments, ImputationExecutor};
pub use progress::{ClosureProgressReporter, ImputationStage, ProgressReporter, ProgressUpdate};
