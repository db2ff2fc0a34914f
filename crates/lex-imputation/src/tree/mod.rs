//! Decision trees as navigable values.
//!
//! An inducer returns a [`Tree`] of typed split nodes. Rule extraction walks
//! it depth first and collects the branch conditions on the way to each leaf.

mod c45;
mod discretize;

pub use c45::C45Inducer;
pub use discretize::{DiscretizationError, Discretizer, EqualWidthDiscretizer};

use crate::dataset::{Dataset, Record, Schema, Value, format_number};
use thiserror::Error;

/// Comparison applied to one attribute of a record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Condition {
    /// Numeric value `<=` threshold.
    AtMost(f64),
    /// Numeric value `>` threshold.
    Above(f64),
    /// Category index equality.
    Equals(usize),
}

/// One branch condition bound to an attribute.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Predicate {
    pub attribute: usize,
    pub condition: Condition,
}

impl Predicate {
    pub fn new(attribute: usize, condition: Condition) -> Self {
        Self {
            attribute,
            condition,
        }
    }

    /// A missing value never satisfies a predicate.
    pub fn matches(&self, record: &Record) -> bool {
        match (self.condition, record.value(self.attribute)) {
            (Condition::AtMost(t), Value::Numeric(v)) => *v <= t,
            (Condition::Above(t), Value::Numeric(v)) => *v > t,
            (Condition::Equals(c), Value::Category(v)) => *v == c,
            _ => false,
        }
    }

    pub fn display(&self, schema: &Schema) -> String {
        let attribute = schema.attribute(self.attribute);
        match self.condition {
            Condition::AtMost(t) => format!("{} <= {}", attribute.name, format_number(t)),
            Condition::Above(t) => format!("{} > {}", attribute.name, format_number(t)),
            Condition::Equals(c) => format!(
                "{} = {}",
                attribute.name,
                attribute.display_value(&Value::Category(c))
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Branch {
    pub condition: Condition,
    pub child: TreeNode,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TreeNode {
    Leaf {
        /// Majority class (category index of the target).
        class: usize,
        /// Training records that reached this leaf.
        support: usize,
        /// Training records at this leaf not of the majority class.
        errors: f64,
    },
    Split {
        attribute: usize,
        branches: Vec<Branch>,
    },
}

/// A root-to-leaf path and the leaf's support.
#[derive(Debug, Clone, PartialEq)]
pub struct LeafPath {
    pub predicates: Vec<Predicate>,
    pub support: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tree {
    pub root: TreeNode,
}

impl Tree {
    pub fn new(root: TreeNode) -> Self {
        Self { root }
    }

    pub fn leaf_count(&self) -> usize {
        fn count(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 1,
                TreeNode::Split { branches, .. } => {
                    branches.iter().map(|b| count(&b.child)).sum()
                }
            }
        }
        count(&self.root)
    }

    pub fn depth(&self) -> usize {
        fn depth(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { branches, .. } => {
                    1 + branches.iter().map(|b| depth(&b.child)).max().unwrap_or(0)
                }
            }
        }
        depth(&self.root)
    }

    /// Leaves in depth-first order, each with its predicate path.
    pub fn leaves(&self) -> Vec<LeafPath> {
        let mut out = Vec::new();
        let mut path = Vec::new();
        collect_leaves(&self.root, &mut path, &mut out);
        out
    }
}

fn collect_leaves(node: &TreeNode, path: &mut Vec<Predicate>, out: &mut Vec<LeafPath>) {
    match node {
        TreeNode::Leaf { support, .. } => out.push(LeafPath {
            predicates: path.clone(),
            support: *support,
        }),
        TreeNode::Split {
            attribute,
            branches,
        } => {
            for branch in branches {
                path.push(Predicate::new(*attribute, branch.condition));
                collect_leaves(&branch.child, path, out);
                path.pop();
            }
        }
    }
}

/// Growth and pruning parameters handed to an inducer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeParams {
    pub min_leaf_size: usize,
    pub confidence_factor: f32,
}

#[derive(Debug, Error)]
pub enum InductionError {
    #[error("target attribute '{0}' is not categorical")]
    NonCategoricalTarget(String),

    #[error("no training records with a known target value")]
    EmptyTrainingSet,

    #[error("confidence factor {0} outside (0, 0.5]")]
    InvalidConfidenceFactor(f32),

    #[error("minimum leaf size must be at least 1")]
    InvalidLeafSize,
}

/// Builds a classification tree predicting `target` from the other
/// attributes of `data`.
pub trait TreeInducer: Send + Sync {
    fn induce(
        &self,
        data: &Dataset,
        target: usize,
        params: &TreeParams,
    ) -> Result<Tree, InductionError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::tests::{cat, num, small_schema};

    fn leaf(support: usize) -> TreeNode {
        TreeNode::Leaf {
            class: 0,
            support,
            errors: 0.0,
        }
    }

    fn sample_tree() -> Tree {
        // age <= 30 -> leaf(5)
        // age > 30 -> city = Paris -> leaf(3), city = Rome -> leaf(2)
        Tree::new(TreeNode::Split {
            attribute: 0,
            branches: vec![
                Branch {
                    condition: Condition::AtMost(30.0),
                    child: leaf(5),
                },
                Branch {
                    condition: Condition::Above(30.0),
                    child: TreeNode::Split {
                        attribute: 1,
                        branches: vec![
                            Branch {
                                condition: Condition::Equals(0),
                                child: leaf(3),
                            },
                            Branch {
                                condition: Condition::Equals(1),
                                child: leaf(2),
                            },
                        ],
                    },
                },
            ],
        })
    }

    #[test]
    fn test_leaves_depth_first() {
        let tree = sample_tree();
        let leaves = tree.leaves();

        assert_eq!(tree.leaf_count(), 3);
        assert_eq!(tree.depth(), 2);
        assert_eq!(leaves.len(), 3);
        assert_eq!(
            leaves[0].predicates,
            vec![Predicate::new(0, Condition::AtMost(30.0))]
        );
        assert_eq!(
            leaves[2].predicates,
            vec![
                Predicate::new(0, Condition::Above(30.0)),
                Predicate::new(1, Condition::Equals(1)),
            ]
        );
        assert_eq!(leaves[2].support, 2);
    }

    #[test]
    fn test_single_leaf_tree() {
        let tree = Tree::new(leaf(10));
        assert_eq!(tree.leaf_count(), 1);
        assert!(tree.leaves()[0].predicates.is_empty());
    }

    #[test]
    fn test_predicate_matches() {
        let record = Record::new(0, vec![num(30.0), cat(1), Value::Missing]);

        assert!(Predicate::new(0, Condition::AtMost(30.0)).matches(&record));
        assert!(!Predicate::new(0, Condition::Above(30.0)).matches(&record));
        assert!(Predicate::new(1, Condition::Equals(1)).matches(&record));
        assert!(!Predicate::new(1, Condition::Equals(0)).matches(&record));
        // missing values never match
        assert!(!Predicate::new(2, Condition::AtMost(1e9)).matches(&record));
        assert!(!Predicate::new(2, Condition::Above(-1e9)).matches(&record));
    }

    #[test]
    fn test_predicate_display() {
        let schema = small_schema();
        assert_eq!(
            Predicate::new(0, Condition::AtMost(30.5)).display(&schema),
            "age <= 30.5"
        );
        assert_eq!(
            Predicate::new(1, Condition::Equals(0)).display(&schema),
            "city = Paris"
        );
    }
}
