use crate::dataset::{Attribute, AttributeStats, Dataset, Record, Value, format_number};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiscretizationError {
    #[error("attribute '{0}' is not numeric")]
    NotNumeric(String),

    #[error("bin count must be at least 1")]
    NoBins,
}

/// Replaces a numeric attribute with ordinal bin categories.
pub trait Discretizer: Send + Sync {
    fn discretize(
        &self,
        data: &Dataset,
        attribute: usize,
        bins: usize,
    ) -> Result<Dataset, DiscretizationError>;
}

/// Equal-width bins over the observed range of the given dataset.
///
/// Cut points are `min + i * width`; bin labels read `(-inf-c1]`,
/// `(c1-c2]`, ..., `(ck-inf)`. A constant column yields one bin labelled
/// `'All'`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EqualWidthDiscretizer;

impl EqualWidthDiscretizer {
    fn cut_points(min: f64, max: f64, bins: usize) -> Vec<f64> {
        if bins < 2 || max <= min {
            return Vec::new();
        }
        let width = (max - min) / bins as f64;
        (1..bins).map(|i| min + width * i as f64).collect()
    }

    fn labels(cuts: &[f64]) -> Vec<String> {
        if cuts.is_empty() {
            return vec!["'All'".to_string()];
        }
        let mut labels = Vec::with_capacity(cuts.len() + 1);
        labels.push(format!("(-inf-{}]", format_number(cuts[0])));
        for pair in cuts.windows(2) {
            labels.push(format!(
                "({}-{}]",
                format_number(pair[0]),
                format_number(pair[1])
            ));
        }
        labels.push(format!("({}-inf)", format_number(cuts[cuts.len() - 1])));
        labels
    }

    fn bin_of(value: f64, cuts: &[f64]) -> usize {
        cuts.iter().take_while(|&&cut| value > cut).count()
    }
}

impl Discretizer for EqualWidthDiscretizer {
    fn discretize(
        &self,
        data: &Dataset,
        attribute: usize,
        bins: usize,
    ) -> Result<Dataset, DiscretizationError> {
        let source = data.schema().attribute(attribute);
        if !source.is_numeric() {
            return Err(DiscretizationError::NotNumeric(source.name.clone()));
        }
        if bins == 0 {
            return Err(DiscretizationError::NoBins);
        }

        let stats = AttributeStats::compute(data.records(), source);
        let cuts = match (stats.min, stats.max) {
            (Some(min), Some(max)) => Self::cut_points(min, max, bins),
            _ => Vec::new(),
        };
        let binned = Attribute::categorical(source.name.clone(), Self::labels(&cuts));
        let schema = Arc::new(data.schema().with_attribute(attribute, binned));

        let records = data
            .records()
            .iter()
            .map(|record| {
                let mut values = record.values.clone();
                if let Value::Numeric(v) = values[attribute] {
                    values[attribute] = Value::Category(Self::bin_of(v, &cuts));
                }
                Record::new(record.id, values)
            })
            .collect();

        Ok(Dataset::from_parts(schema, records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::tests::{cat, num, small_schema};

    fn ages(values: &[f64]) -> Dataset {
        let rows = values
            .iter()
            .map(|&v| vec![num(v), cat(0), num(1.0)])
            .collect();
        Dataset::from_rows(small_schema(), rows).unwrap()
    }

    #[test]
    fn test_equal_width_bins() {
        let data = ages(&[0.0, 2.0, 5.0, 7.5, 10.0]);
        let out = EqualWidthDiscretizer.discretize(&data, 0, 4).unwrap();

        let attribute = out.schema().attribute(0);
        assert!(!attribute.is_numeric());
        assert_eq!(
            attribute.categories(),
            &["(-inf-2.5]", "(2.5-5]", "(5-7.5]", "(7.5-inf)"]
        );

        let bins: Vec<Value> = out.records().iter().map(|r| r.values[0]).collect();
        assert_eq!(bins, vec![cat(0), cat(0), cat(1), cat(2), cat(3)]);
        // other attributes and row ids untouched
        assert_eq!(out.records()[4].values[2], num(1.0));
        assert_eq!(out.records()[4].id, 4);
    }

    #[test]
    fn test_constant_column_single_bin() {
        let data = ages(&[3.0, 3.0, 3.0]);
        let out = EqualWidthDiscretizer.discretize(&data, 0, 2).unwrap();
        assert_eq!(out.schema().attribute(0).categories().len(), 1);
        assert!(out.records().iter().all(|r| r.values[0] == cat(0)));
    }

    #[test]
    fn test_missing_stays_missing() {
        let data = Dataset::from_rows(
            small_schema(),
            vec![
                vec![Value::Missing, cat(0), num(1.0)],
                vec![num(1.0), cat(0), num(1.0)],
                vec![num(9.0), cat(0), num(1.0)],
            ],
        )
        .unwrap();
        let out = EqualWidthDiscretizer.discretize(&data, 0, 2).unwrap();
        assert!(out.records()[0].is_missing(0));
    }

    #[test]
    fn test_rejects_categorical() {
        let data = ages(&[1.0]);
        let result = EqualWidthDiscretizer.discretize(&data, 1, 2);
        assert!(matches!(result, Err(DiscretizationError::NotNumeric(_))));
    }
}
