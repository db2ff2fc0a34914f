use super::Dataset;

/// Complete / incomplete split of a dataset. Both sides keep the input
/// order and the original [`RowId`](super::RowId)s.
#[derive(Debug, Clone)]
pub struct Partition {
    pub complete: Dataset,
    pub incomplete: Dataset,
}

/// Splits records on whether they have any missing value.
pub struct RecordPartitioner;

impl RecordPartitioner {
    pub fn partition(data: &Dataset) -> Partition {
        let (incomplete, complete): (Vec<_>, Vec<_>) =
            data.records().iter().cloned().partition(|r| r.has_missing());

        Partition {
            complete: Dataset::from_parts(data.shared_schema(), complete),
            incomplete: Dataset::from_parts(data.shared_schema(), incomplete),
        }
    }
}
