//! Progress reporting for the imputation run.
//!
//! Stages run in a fixed order and each owns a slice of the overall
//! `[0, 1]` progress range; per-attribute updates inside the long stages move
//! through that slice.
//!
//! ```rust,ignore
//! let imputer = DmiImputer::builder()
//!     .on_progress(|update| eprintln!("{:>3.0}% {}", update.progress * 100.0, update.message))
//!     .build()?;
//! ```

use serde::{Deserialize, Serialize};

/// Stages of an imputation run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImputationStage {
    /// Validating input and computing dataset statistics
    Initializing,
    /// Splitting records into complete and incomplete
    Partitioning,
    /// Inducing trees, merging rules and building segments per attribute
    BuildingSegments,
    /// Routing incomplete records to segments, filling categorical values
    AssigningRecords,
    /// EM or mean imputation of numeric values per segment
    ImputingNumeric,
    /// Rebuilding the dataset in original order
    Recombining,
    Complete,
    Failed,
}

impl ImputationStage {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Initializing => "Starting",
            Self::Partitioning => "Partitioning Records",
            Self::BuildingSegments => "Building Segments",
            Self::AssigningRecords => "Assigning Records",
            Self::ImputingNumeric => "Imputing Numeric Values",
            Self::Recombining => "Recombining",
            Self::Complete => "Done",
            Self::Failed => "Failed",
        }
    }

    /// `(start, width)` of this stage within the overall progress range.
    /// Terminal stages have zero width.
    pub fn span(&self) -> (f32, f32) {
        match self {
            Self::Initializing => (0.0, 0.02),
            Self::Partitioning => (0.02, 0.05),
            Self::BuildingSegments => (0.07, 0.35),
            Self::AssigningRecords => (0.42, 0.15),
            Self::ImputingNumeric => (0.57, 0.38),
            Self::Recombining => (0.95, 0.05),
            Self::Complete => (1.0, 0.0),
            Self::Failed => (0.0, 0.0),
        }
    }

    fn overall(&self, fraction: f32) -> f32 {
        let (start, width) = self.span();
        (start + width * fraction).clamp(0.0, 1.0)
    }
}

/// One progress event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub stage: ImputationStage,

    /// Item being worked on, e.g. "Attribute: income"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_stage: Option<String>,

    /// 0.0 - 1.0 over the whole run
    pub progress: f32,

    /// 0.0 - 1.0 within `stage`
    pub stage_progress: f32,

    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub items_processed: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub items_total: Option<usize>,
}

impl ProgressUpdate {
    pub fn new(stage: ImputationStage, stage_progress: f32, message: impl Into<String>) -> Self {
        let stage_progress = stage_progress.clamp(0.0, 1.0);
        Self {
            stage,
            sub_stage: None,
            progress: stage.overall(stage_progress),
            stage_progress,
            message: message.into(),
            items_processed: None,
            items_total: None,
        }
    }

    /// Update for item `current` of `total` inside `stage`.
    pub fn for_item(
        stage: ImputationStage,
        item: impl Into<String>,
        current: usize,
        total: usize,
        message: impl Into<String>,
    ) -> Self {
        let fraction = match total {
            0 => 0.0,
            _ => current as f32 / total as f32,
        };
        let mut update = Self::new(stage, fraction, message);
        update.sub_stage = Some(item.into());
        update.items_processed = Some(current);
        update.items_total = Some(total);
        update
    }

    pub fn complete(message: impl Into<String>) -> Self {
        Self::new(ImputationStage::Complete, 1.0, message)
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(ImputationStage::Failed, 0.0, message)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.stage,
            ImputationStage::Complete | ImputationStage::Failed
        )
    }
}

/// Receives progress updates during a run.
///
/// Must be `Send + Sync` so an imputer can run on a worker thread.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, update: ProgressUpdate);
}

/// Adapts a closure into a [`ProgressReporter`].
pub struct ClosureProgressReporter<F>(F);

impl<F> ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self(callback)
    }
}

impl<F> ProgressReporter for ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    fn report(&self, update: ProgressUpdate) {
        (self.0)(update)
    }
}

static_assertions::assert_impl_all!(ProgressUpdate: Send, Sync);
