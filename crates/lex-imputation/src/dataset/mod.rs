//! In-memory tabular model the imputation pipeline works on.
//!
//! A [`Dataset`] is an ordered list of [`Record`]s sharing one [`Schema`].
//! Each record carries its [`RowId`], the zero-based position it had in the
//! input, and that id is the only thing used to find a record again after it
//! has been copied into partitions and segments.

mod frame;
mod partition;
mod stats;

pub use partition::{Partition, RecordPartitioner};
pub use stats::{AttributeStats, DatasetStats};

use crate::error::{ImputationError, Result};
use std::sync::Arc;

/// Position of a record in the input dataset.
pub type RowId = usize;

/// A single cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Missing,
    Numeric(f64),
    /// Index into the attribute's category list.
    Category(usize),
}

impl Value {
    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    pub fn as_numeric(&self) -> Option<f64> {
        match self {
            Value::Numeric(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_category(&self) -> Option<usize> {
        match self {
            Value::Category(c) => Some(*c),
            _ => None,
        }
    }
}

/// The source column family, kept so imputed columns are written back with
/// a matching dtype.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnEncoding {
    Numeric,
    Text,
    Boolean,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttributeKind {
    Numeric,
    Categorical { categories: Vec<String> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub index: usize,
    pub kind: AttributeKind,
    pub encoding: ColumnEncoding,
}

impl Attribute {
    pub fn numeric(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            index: 0,
            kind: AttributeKind::Numeric,
            encoding: ColumnEncoding::Numeric,
        }
    }

    pub fn categorical<S: Into<String>>(
        name: impl Into<String>,
        categories: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            name: name.into(),
            index: 0,
            kind: AttributeKind::Categorical {
                categories: categories.into_iter().map(Into::into).collect(),
            },
            encoding: ColumnEncoding::Text,
        }
    }

    pub fn with_encoding(mut self, encoding: ColumnEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self.kind, AttributeKind::Numeric)
    }

    pub fn categories(&self) -> &[String] {
        match &self.kind {
            AttributeKind::Categorical { categories } => categories,
            AttributeKind::Numeric => &[],
        }
    }

    pub fn category_index(&self, label: &str) -> Option<usize> {
        self.categories().iter().position(|c| c == label)
    }

    pub fn category_label(&self, index: usize) -> Option<&str> {
        self.categories().get(index).map(String::as_str)
    }

    /// Render a value of this attribute for logs and rule text.
    pub fn display_value(&self, value: &Value) -> String {
        match value {
            Value::Missing => "?".to_string(),
            Value::Numeric(v) => format_number(*v),
            Value::Category(c) => self
                .category_label(*c)
                .map(str::to_string)
                .unwrap_or_else(|| format!("#{c}")),
        }
    }
}

pub(crate) fn format_number(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{v:.0}")
    } else {
        let s = format!("{v:.6}");
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

/// Ordered attribute list. Attribute `index` fields always equal their
/// position.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    attributes: Vec<Attribute>,
}

impl Schema {
    pub fn new(attributes: Vec<Attribute>) -> Self {
        let attributes = attributes
            .into_iter()
            .enumerate()
            .map(|(index, mut attribute)| {
                attribute.index = index;
                attribute
            })
            .collect();
        Self { attributes }
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn attribute(&self, index: usize) -> &Attribute {
        &self.attributes[index]
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.attributes.iter().position(|a| a.name == name)
    }

    pub fn numeric_indices(&self) -> Vec<usize> {
        self.attributes
            .iter()
            .filter(|a| a.is_numeric())
            .map(|a| a.index)
            .collect()
    }

    pub fn numeric_count(&self) -> usize {
        self.attributes.iter().filter(|a| a.is_numeric()).count()
    }

    /// Copy of this schema with one attribute swapped out.
    pub fn with_attribute(&self, index: usize, attribute: Attribute) -> Self {
        let mut attributes = self.attributes.clone();
        attributes[index] = attribute;
        Self::new(attributes)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: RowId,
    pub values: Vec<Value>,
}

impl Record {
    pub fn new(id: RowId, values: Vec<Value>) -> Self {
        Self { id, values }
    }

    pub fn value(&self, attribute: usize) -> &Value {
        &self.values[attribute]
    }

    pub fn is_missing(&self, attribute: usize) -> bool {
        self.values[attribute].is_missing()
    }

    pub fn has_missing(&self) -> bool {
        self.values.iter().any(Value::is_missing)
    }

    pub fn missing_attributes(&self) -> impl Iterator<Item = usize> + '_ {
        self.values
            .iter()
            .enumerate()
            .filter(|(_, v)| v.is_missing())
            .map(|(i, _)| i)
    }

    /// True when every listed attribute is missing (and the list is not empty).
    pub fn all_missing(&self, attributes: &[usize]) -> bool {
        !attributes.is_empty() && attributes.iter().all(|&a| self.is_missing(a))
    }
}

/// Ordered records over a shared schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    schema: Arc<Schema>,
    records: Vec<Record>,
}

impl Dataset {
    /// Build a dataset, checking every record against the schema width.
    pub fn new(schema: Arc<Schema>, records: Vec<Record>) -> Result<Self> {
        if let Some(bad) = records.iter().find(|r| r.values.len() != schema.len()) {
            return Err(ImputationError::SchemaMismatch(format!(
                "row {} has {} values, schema has {} attributes",
                bad.id,
                bad.values.len(),
                schema.len()
            )));
        }
        Ok(Self { schema, records })
    }

    /// Build a dataset from rows, numbering them from zero.
    pub fn from_rows(schema: Schema, rows: Vec<Vec<Value>>) -> Result<Self> {
        let records = rows
            .into_iter()
            .enumerate()
            .map(|(id, values)| Record::new(id, values))
            .collect();
        Self::new(Arc::new(schema), records)
    }

    pub fn empty(schema: Arc<Schema>) -> Self {
        Self {
            schema,
            records: Vec::new(),
        }
    }

    /// Records taken from a dataset with the same schema; no width check.
    pub(crate) fn from_parts(schema: Arc<Schema>, records: Vec<Record>) -> Self {
        Self { schema, records }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn shared_schema(&self) -> Arc<Schema> {
        Arc::clone(&self.schema)
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn push(&mut self, record: Record) {
        self.records.push(record);
    }

    /// Attributes with at least one missing value, in schema order.
    pub fn missing_attributes(&self) -> Vec<usize> {
        (0..self.schema.len())
            .filter(|&a| self.records.iter().any(|r| r.is_missing(a)))
            .collect()
    }

    pub fn missing_count(&self, attribute: usize) -> usize {
        self.records.iter().filter(|r| r.is_missing(attribute)).count()
    }

    /// Total missing cells.
    pub fn missing_cells(&self) -> usize {
        self.records
            .iter()
            .map(|r| r.values.iter().filter(|v| v.is_missing()).count())
            .sum()
    }

    /// Records matching `keep`, cloned, in order.
    pub fn filter<F>(&self, keep: F) -> Dataset
    where
        F: Fn(&Record) -> bool,
    {
        Self::from_parts(
            self.shared_schema(),
            self.records.iter().filter(|r| keep(r)).cloned().collect(),
        )
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// `age` numeric, `city` categorical over {Paris, Rome}, `income` numeric.
    pub(crate) fn small_schema() -> Schema {
        Schema::new(vec![
            Attribute::numeric("age"),
            Attribute::categorical("city", ["Paris", "Rome"]),
            Attribute::numeric("income"),
        ])
    }

    pub(crate) fn num(v: f64) -> Value {
        Value::Numeric(v)
    }

    pub(crate) fn cat(c: usize) -> Value {
        Value::Category(c)
    }

    #[test]
    fn test_schema_reindexes_attributes() {
        let schema = small_schema();
        let indices: Vec<usize> = schema.attributes().iter().map(|a| a.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(schema.numeric_indices(), vec![0, 2]);
        assert_eq!(schema.index_of("city"), Some(1));
    }

    #[test]
    fn test_dataset_rejects_ragged_rows() {
        let result = Dataset::from_rows(small_schema(), vec![vec![num(1.0), cat(0)]]);
        assert!(matches!(result, Err(ImputationError::SchemaMismatch(_))));
    }

    #[test]
    fn test_missing_attributes() {
        let data = Dataset::from_rows(
            small_schema(),
            vec![
                vec![num(30.0), cat(0), Value::Missing],
                vec![num(40.0), cat(1), num(10.0)],
            ],
        )
        .unwrap();

        assert_eq!(data.missing_attributes(), vec![2]);
        assert_eq!(data.missing_count(2), 1);
        assert_eq!(data.missing_cells(), 1);
        assert!(data.records()[0].has_missing());
        assert!(!data.records()[1].has_missing());
    }

    #[test]
    fn test_record_all_missing() {
        let record = Record::new(0, vec![Value::Missing, cat(1), Value::Missing]);
        assert!(record.all_missing(&[0, 2]));
        assert!(!record.all_missing(&[0, 1]));
        assert!(!record.all_missing(&[]));
    }

    #[test]
    fn test_display_value() {
        let schema = small_schema();
        assert_eq!(schema.attribute(1).display_value(&cat(1)), "Rome");
        assert_eq!(schema.attribute(0).display_value(&num(30.0)), "30");
        assert_eq!(schema.attribute(0).display_value(&num(2.5)), "2.5");
    }
}
