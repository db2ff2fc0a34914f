//! Conversion between polars DataFrames and [`Dataset`].
//!
//! Numeric columns (any integer or float dtype) become numeric attributes and
//! a NaN counts as missing. String, Categorical and Boolean columns become
//! categorical attributes whose categories are numbered in order of first
//! appearance. Any other dtype is rejected.

use super::{Attribute, AttributeKind, ColumnEncoding, Dataset, Record, Schema, Value};
use crate::error::{ImputationError, Result, ResultExt};
use crate::utils::{DtypeCategory, get_dtype_category};
use polars::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;

impl Dataset {
    /// Read every column of `df` into a dataset.
    pub fn from_dataframe(df: &DataFrame) -> Result<Self> {
        let height = df.height();
        let mut attributes = Vec::with_capacity(df.width());
        let mut columns: Vec<Vec<Value>> = Vec::with_capacity(df.width());

        for column in df.get_columns() {
            let name = column.name().to_string();
            let series = column.as_materialized_series();

            let (attribute, values) = match get_dtype_category(series.dtype()) {
                DtypeCategory::Numeric => read_numeric(&name, series)?,
                DtypeCategory::Text => read_text(&name, series)?,
                DtypeCategory::Boolean => read_boolean(&name, series)?,
                DtypeCategory::Other => {
                    return Err(ImputationError::UnsupportedColumn {
                        column: name,
                        dtype: series.dtype().to_string(),
                    });
                }
            };
            attributes.push(attribute);
            columns.push(values);
        }

        let records = (0..height)
            .map(|row| Record::new(row, columns.iter().map(|col| col[row]).collect()))
            .collect();

        Dataset::new(Arc::new(Schema::new(attributes)), records)
    }

    /// Build a DataFrame holding every attribute of this dataset.
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let columns = self
            .schema()
            .attributes()
            .iter()
            .map(|attribute| self.column_series(attribute).into_column())
            .collect::<Vec<_>>();
        DataFrame::new(columns).context("Building output frame")
    }

    /// Write this dataset's values into a copy of `template`.
    ///
    /// Only columns that have a missing value in `template` are rebuilt, so
    /// complete columns keep their original dtype and values untouched.
    pub fn merge_into(&self, template: &DataFrame) -> Result<DataFrame> {
        if template.height() != self.len() {
            return Err(ImputationError::SchemaMismatch(format!(
                "frame has {} rows, dataset has {}",
                template.height(),
                self.len()
            )));
        }

        let mut out = template.clone();
        for attribute in self.schema().attributes() {
            let column = template
                .column(&attribute.name)
                .map_err(|_| ImputationError::ColumnNotFound(attribute.name.clone()))?;
            if !column_has_missing(column.as_materialized_series())? {
                continue;
            }
            out.replace(&attribute.name, self.column_series(attribute))
                .context(format!("Writing column '{}'", attribute.name))?;
        }
        Ok(out)
    }

    fn column_series(&self, attribute: &Attribute) -> Series {
        let name = attribute.name.as_str().into();
        let cells = self.records().iter().map(|r| r.value(attribute.index));

        match (&attribute.kind, attribute.encoding) {
            (AttributeKind::Numeric, _) => {
                let values: Vec<Option<f64>> = cells.map(Value::as_numeric).collect();
                Series::new(name, values)
            }
            (AttributeKind::Categorical { .. }, ColumnEncoding::Boolean) => {
                let values: Vec<Option<bool>> = cells
                    .map(|v| {
                        v.as_category()
                            .and_then(|c| attribute.category_label(c))
                            .map(|label| label == "true")
                    })
                    .collect();
                Series::new(name, values)
            }
            (AttributeKind::Categorical { .. }, _) => {
                let values: Vec<Option<&str>> = cells
                    .map(|v| v.as_category().and_then(|c| attribute.category_label(c)))
                    .collect();
                Series::new(name, values)
            }
        }
    }
}

fn column_has_missing(series: &Series) -> Result<bool> {
    if series.null_count() > 0 {
        return Ok(true);
    }
    if matches!(series.dtype(), DataType::Float32 | DataType::Float64) {
        let cast = series.cast(&DataType::Float64)?;
        return Ok(cast.f64()?.into_iter().flatten().any(f64::is_nan));
    }
    Ok(false)
}

fn read_numeric(name: &str, series: &Series) -> Result<(Attribute, Vec<Value>)> {
    let cast = series
        .cast(&DataType::Float64)
        .context(format!("Casting column '{name}' to Float64"))?;
    let values = cast
        .f64()?
        .into_iter()
        .map(|v| match v {
            Some(x) if !x.is_nan() => Value::Numeric(x),
            _ => Value::Missing,
        })
        .collect();
    Ok((Attribute::numeric(name), values))
}

fn read_text(name: &str, series: &Series) -> Result<(Attribute, Vec<Value>)> {
    let cast = series
        .cast(&DataType::String)
        .context(format!("Casting column '{name}' to String"))?;
    let mut interner = CategoryInterner::default();
    let values = cast
        .str()?
        .into_iter()
        .map(|v| match v {
            Some(label) => Value::Category(interner.intern(label)),
            None => Value::Missing,
        })
        .collect();
    Ok((Attribute::categorical(name, interner.labels), values))
}

fn read_boolean(name: &str, series: &Series) -> Result<(Attribute, Vec<Value>)> {
    let mut interner = CategoryInterner::default();
    let values = series
        .bool()?
        .into_iter()
        .map(|v| match v {
            Some(flag) => Value::Category(interner.intern(if flag { "true" } else { "false" })),
            None => Value::Missing,
        })
        .collect();
    let attribute =
        Attribute::categorical(name, interner.labels).with_encoding(ColumnEncoding::Boolean);
    Ok((attribute, values))
}

#[derive(Default)]
struct CategoryInterner {
    labels: Vec<String>,
    lookup: HashMap<String, usize>,
}

impl CategoryInterner {
    fn intern(&mut self, label: &str) -> usize {
        if let Some(&index) = self.lookup.get(label) {
            return index;
        }
        let index = self.labels.len();
        self.labels.push(label.to_string());
        self.lookup.insert(label.to_string(), index);
        index
    }
}
