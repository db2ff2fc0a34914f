use crate::config::ResolvedParams;
use crate::dataset::{Dataset, RowId};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};

/// Output of [`DmiImputer::impute`](crate::DmiImputer::impute).
#[derive(Debug, Clone)]
pub struct ImputationResult {
    /// Same records, same order, missing values filled.
    pub dataset: Dataset,
    pub summary: ImputationSummary,
}

/// Output of [`DmiImputer::impute_dataframe`](crate::DmiImputer::impute_dataframe).
#[derive(Debug, Clone)]
pub struct FrameImputation {
    pub dataframe: DataFrame,
    pub summary: ImputationSummary,
}

/// Summary of one imputation run.
///
/// Serialized as the CLI's `--json` output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImputationSummary {
    /// Total execution time in milliseconds.
    pub duration_ms: u64,

    pub rows_total: usize,
    pub rows_complete: usize,
    pub rows_incomplete: usize,

    /// No record was complete; every attribute used one segment.
    pub no_complete: bool,
    /// Too few complete records for rule merging and EM.
    pub no_merge_no_em: bool,

    /// Options after deriving the dataset-dependent defaults.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<ResolvedParams>,

    pub missing_before: usize,
    pub missing_after: usize,

    /// Categorical cells filled with a segment mode.
    pub categorical_filled: usize,
    /// Numeric cells filled from an imputed segment.
    pub numeric_filled: usize,
    /// Numeric cells filled with a centroid mean because the record had
    /// no numeric value at all.
    pub all_numeric_missing_shortcuts: usize,

    /// Segments imputed with EM.
    pub em_runs: usize,
    /// Segments imputed with means only.
    pub mean_fallback_segments: usize,
    /// EM attempts that failed and fell back to means.
    pub em_failures: usize,

    /// (record, attribute) pairs routed by nearest centroid.
    pub centroid_assignments: usize,

    pub attributes: Vec<AttributeSummary>,

    /// Cells still missing after the run.
    pub unresolved: Vec<UnresolvedCell>,

    pub warnings: Vec<String>,
}

impl ImputationSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    pub fn add_attribute(&mut self, summary: AttributeSummary) {
        self.attributes.push(summary);
    }

    pub fn cells_imputed(&self) -> usize {
        self.categorical_filled + self.numeric_filled + self.all_numeric_missing_shortcuts
    }

    /// Percentage of the initially missing cells that were filled.
    pub fn imputed_percentage(&self) -> f32 {
        if self.missing_before == 0 {
            100.0
        } else {
            (self.missing_before.saturating_sub(self.missing_after) as f32
                / self.missing_before as f32)
                * 100.0
        }
    }
}

/// Segmentation and imputation details for one attribute with missing
/// values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AttributeSummary {
    pub name: String,
    /// "numeric" or "categorical"
    pub kind: String,
    pub missing: usize,

    /// Bins used to discretize a numeric target.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bins: Option<usize>,

    /// Rules extracted from the tree.
    pub induced_rules: usize,
    /// Rules left after merging.
    pub rules: Vec<String>,
    pub merged: bool,
    pub universal: bool,
    pub segment_sizes: Vec<usize>,

    pub centroid_assignments: usize,
    pub imputed: usize,
}

impl AttributeSummary {
    pub fn new(name: impl Into<String>, kind: impl Into<String>, missing: usize) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            missing,
            ..Self::default()
        }
    }

    pub fn imputation_percentage(&self) -> f32 {
        if self.missing == 0 {
            0.0
        } else {
            (self.imputed as f32 / self.missing as f32) * 100.0
        }
    }
}

/// What a dry run reports per attribute: the same shape as the run summary
/// with nothing imputed yet.
pub type AttributePlan = AttributeSummary;

/// A cell that no step could fill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnresolvedCell {
    pub row: RowId,
    pub attribute: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segment: Option<usize>,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_imputation_summary_default() {
        let summary = ImputationSummary::default();
        assert_eq!(summary.duration_ms, 0);
        assert_eq!(summary.rows_total, 0);
        assert!(summary.attributes.is_empty());
        assert_eq!(summary.cells_imputed(), 0);
    }

    #[test]
    fn test_imputation_summary_percentages() {
        let mut summary = ImputationSummary::new();
        summary.missing_before = 20;
        summary.missing_after = 5;
        assert!((summary.imputed_percentage() - 75.0).abs() < 0.01);

        summary.missing_before = 0;
        summary.missing_after = 0;
        assert_eq!(summary.imputed_percentage(), 100.0);
    }

    #[test]
    fn test_cells_imputed_sums_counters() {
        let summary = ImputationSummary {
            categorical_filled: 3,
            numeric_filled: 4,
            all_numeric_missing_shortcuts: 1,
            ..ImputationSummary::default()
        };
        assert_eq!(summary.cells_imputed(), 8);
    }

    #[test]
    fn test_attribute_summary_imputation_percentage() {
        let mut summary = AttributeSummary::new("income", "numeric", 10);
        summary.imputed = 8;
        assert!((summary.imputation_percentage() - 80.0).abs() < 0.01);
        assert_eq!(AttributeSummary::new("x", "numeric", 0).imputation_percentage(), 0.0);
    }

    #[test]
    fn test_imputation_summary_serialization() {
        let mut summary = ImputationSummary::new();
        summary.duration_ms = 1500;
        summary.rows_total = 110;
        summary.add_warning("EM failed");
        summary.unresolved.push(UnresolvedCell {
            row: 7,
            attribute: "income".to_string(),
            segment: None,
        });

        let json = serde_json::to_string(&summary).expect("Should serialize");
        assert!(json.contains("1500"));
        assert!(json.contains("\"attribute\":\"income\""));
        assert!(!json.contains("\"params\""));
        assert!(!json.contains("\"segment\""));
    }

    #[test]
    fn test_imputation_summary_json_roundtrip() {
        let mut summary = ImputationSummary::new();
        summary.rows_total = 100;
        summary.no_merge_no_em = true;
        let mut attribute = AttributeSummary::new("city", "categorical", 3);
        attribute.rules = vec!["age <= 30 (12)".to_string(), "all (40)".to_string()];
        attribute.segment_sizes = vec![12, 40];
        summary.add_attribute(attribute);

        let json = serde_json::to_string(&summary).expect("Should serialize");
        let deserialized: ImputationSummary =
            serde_json::from_str(&json).expect("Should deserialize");

        assert_eq!(deserialized.rows_total, 100);
        assert!(deserialized.no_merge_no_em);
        assert_eq!(deserialized.attributes[0].rules.len(), 2);
        assert_eq!(deserialized.attributes[0].segment_sizes, vec![12, 40]);
    }
}
