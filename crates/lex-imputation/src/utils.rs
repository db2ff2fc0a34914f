//! Shared helpers for dtype classification and min-max scaling.

use polars::prelude::*;

// =============================================================================
// Data Type Utilities
// =============================================================================

/// How a polars dtype maps onto the attribute model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DtypeCategory {
    /// Integer or floating point numbers
    Numeric,
    /// Boolean type
    Boolean,
    /// String or categorical text
    Text,
    /// Anything the attribute model cannot hold (dates, lists, ...)
    Other,
}

/// Check if a DataType is numeric (integer or float).
#[inline]
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Get the category of a DataType.
pub fn get_dtype_category(dtype: &DataType) -> DtypeCategory {
    if is_numeric_dtype(dtype) {
        DtypeCategory::Numeric
    } else if matches!(dtype, DataType::Boolean) {
        DtypeCategory::Boolean
    } else if matches!(dtype, DataType::String | DataType::Categorical(_, _)) {
        DtypeCategory::Text
    } else {
        DtypeCategory::Other
    }
}

// =============================================================================
// Scaling
// =============================================================================

/// Min-max scale `value` into [0, 1]. A zero-width range scales to 0.
#[inline]
pub fn normalize(value: f64, min: f64, max: f64) -> f64 {
    let range = max - min;
    if range > 0.0 { (value - min) / range } else { 0.0 }
}

/// Inverse of [`normalize`].
#[inline]
pub fn denormalize(scaled: f64, min: f64, max: f64) -> f64 {
    scaled * (max - min) + min
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dtype_categories() {
        assert_eq!(get_dtype_category(&DataType::Int32), DtypeCategory::Numeric);
        assert_eq!(get_dtype_category(&DataType::Float64), DtypeCategory::Numeric);
        assert_eq!(get_dtype_category(&DataType::Boolean), DtypeCategory::Boolean);
        assert_eq!(get_dtype_category(&DataType::String), DtypeCategory::Text);
        assert_eq!(get_dtype_category(&DataType::Date), DtypeCategory::Other);
    }

    #[test]
    fn test_normalize_round_trip() {
        let scaled = normalize(15.0, 10.0, 30.0);
        assert_eq!(scaled, 0.25);
        assert_eq!(denormalize(scaled, 10.0, 30.0), 15.0);
    }

    #[test]
    fn test_normalize_zero_range() {
        assert_eq!(normalize(5.0, 5.0, 5.0), 0.0);
        assert_eq!(denormalize(0.0, 5.0, 5.0), 5.0);
    }
}
