use crate::dataset::{Record, Schema};
use crate::tree::{Predicate, Tree};

/// A segment definition: the conjunction of a root-to-leaf path, or the
/// universal rule that matches every record.
#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    Universal { support: usize },
    Path {
        predicates: Vec<Predicate>,
        support: usize,
    },
}

impl Rule {
    pub fn path(predicates: Vec<Predicate>, support: usize) -> Self {
        Rule::Path {
            predicates,
            support,
        }
    }

    pub fn support(&self) -> usize {
        match self {
            Rule::Universal { support } | Rule::Path { support, .. } => *support,
        }
    }

    pub fn predicates(&self) -> &[Predicate] {
        match self {
            Rule::Universal { .. } => &[],
            Rule::Path { predicates, .. } => predicates,
        }
    }

    pub fn depth(&self) -> usize {
        self.predicates().len()
    }

    pub fn is_universal(&self) -> bool {
        matches!(self, Rule::Universal { .. })
    }

    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Rule::Universal { .. } => true,
            Rule::Path { predicates, .. } => predicates.iter().all(|p| p.matches(record)),
        }
    }

    /// `age <= 30 ~ city = Paris (12)`, or `all (n)` for the universal rule.
    pub fn display(&self, schema: &Schema) -> String {
        match self {
            Rule::Universal { support } => format!("all ({support})"),
            Rule::Path {
                predicates,
                support,
            } => {
                let path: Vec<String> = predicates.iter().map(|p| p.display(schema)).collect();
                format!("{} ({})", path.join(" ~ "), support)
            }
        }
    }
}

/// Ordered, non-empty list of rules for one target attribute. The first
/// matching rule decides a record's segment.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    pub fn universal(support: usize) -> Self {
        Self {
            rules: vec![Rule::Universal { support }],
        }
    }

    /// An empty list collapses to a universal rule with no support.
    pub fn new(rules: Vec<Rule>) -> Self {
        if rules.is_empty() {
            return Self::universal(0);
        }
        Self { rules }
    }

    /// One rule per leaf, in depth-first order. A tree with a single leaf
    /// gives the universal rule.
    pub fn from_tree(tree: &Tree) -> Self {
        let leaves = tree.leaves();
        if leaves.len() <= 1 {
            return Self::universal(leaves.iter().map(|l| l.support).sum());
        }
        Self::new(
            leaves
                .into_iter()
                .map(|leaf| Rule::path(leaf.predicates, leaf.support))
                .collect(),
        )
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    /// True for the single-universal-rule list.
    pub fn is_universal(&self) -> bool {
        self.rules.len() == 1 && self.rules[0].is_universal()
    }

    /// Records covered by the rule list: the universal rule's support if
    /// present, else the sum over the outermost rules.
    pub fn total_support(&self) -> usize {
        if let Some(universal) = self.rules.iter().find(|r| r.is_universal()) {
            return universal.support();
        }
        outermost_support(self.rules.iter())
    }

    /// Index of the first rule matching `record`.
    pub fn first_match(&self, record: &Record) -> Option<usize> {
        self.rules.iter().position(|rule| rule.matches(record))
    }

    pub fn display(&self, schema: &Schema) -> Vec<String> {
        self.rules.iter().map(|r| r.display(schema)).collect()
    }
}

/// Sum of supports over the rules not nested inside another rule of the
/// group. A rule's support already counts the records of rules it covers.
pub(crate) fn outermost_support<'a>(group: impl Iterator<Item = &'a Rule> + Clone) -> usize {
    group
        .clone()
        .filter(|rule| {
            !group.clone().any(|other| {
                other.depth() < rule.depth() && rule.predicates().starts_with(other.predicates())
            })
        })
        .map(Rule::support)
        .sum()
}
