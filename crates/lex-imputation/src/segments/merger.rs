//! Collapses undersized rules into their parent prefix.
//!
//! Each pass builds a new list from the previous one. Every non-universal
//! rule with support below the threshold is replaced by its prefix (its path
//! minus the last predicate, or the universal rule once no predicate is
//! left). A prefix's support is the sum over every current rule whose path
//! starts with it, nested rules included.
//! Duplicates are then dropped and the list is re-sorted most specific
//! first, universal last. Passes repeat until no rule is undersized; depth
//! strictly decreases for every replaced rule, so the loop terminates within
//! the tree depth.

use super::rules::{Rule, RuleSet};
use crate::tree::Predicate;
use std::cmp::Reverse;
use tracing::debug;

#[derive(Debug, Clone, Copy)]
pub struct RuleMerger {
    threshold: usize,
}

impl RuleMerger {
    pub fn new(threshold: usize) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    fn is_undersized(&self, rule: &Rule) -> bool {
        !rule.is_universal() && rule.support() < self.threshold
    }

    pub fn merge(&self, rules: &RuleSet) -> RuleSet {
        let total = rules.total_support();
        let mut current: Vec<Rule> = rules.rules().to_vec();
        let mut passes = 0usize;

        while current.iter().any(|r| self.is_undersized(r)) {
            current = self.merge_pass(&current, total);
            passes += 1;
        }

        sort_by_specificity(&mut current);
        debug!(
            "Merged {} rules into {} in {} passes (threshold {})",
            rules.len(),
            current.len(),
            passes,
            self.threshold
        );
        RuleSet::new(current)
    }

    fn merge_pass(&self, rules: &[Rule], total: usize) -> Vec<Rule> {
        let mut next: Vec<Rule> = Vec::with_capacity(rules.len());

        for rule in rules {
            let replacement = if self.is_undersized(rule) {
                parent_rule(rules, rule.predicates(), total)
            } else {
                rule.clone()
            };

            match next
                .iter_mut()
                .find(|kept| same_segment(kept, &replacement))
            {
                Some(kept) if kept.support() < replacement.support() => *kept = replacement,
                Some(_) => {}
                None => next.push(replacement),
            }
        }

        sort_by_specificity(&mut next);
        next
    }
}

fn parent_rule(rules: &[Rule], predicates: &[Predicate], total: usize) -> Rule {
    if predicates.len() <= 1 {
        return Rule::Universal { support: total };
    }
    let prefix = &predicates[..predicates.len() - 1];
    let support = rules
        .iter()
        .filter(|r| !r.is_universal() && r.predicates().starts_with(prefix))
        .map(Rule::support)
        .sum();
    Rule::path(prefix.to_vec(), support)
}

fn same_segment(a: &Rule, b: &Rule) -> bool {
    a.is_universal() == b.is_universal() && a.predicates() == b.predicates()
}

/// Stable: rules of equal depth keep their relative order.
fn sort_by_specificity(rules: &mut [Rule]) {
    rules.sort_by_key(|rule| (rule.is_universal(), Reverse(rule.depth())));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Condition;
    use pretty_assertions::assert_eq;

    fn p(attribute: usize, t: f64, low: bool) -> Predicate {
        let condition = if low {
            Condition::AtMost(t)
        } else {
            Condition::Above(t)
        };
        Predicate::new(attribute, condition)
    }

    /// age <= 30 (5) | age > 30 ~ city = Paris (3) | age > 30 ~ city = Rome (2)
    fn three_leaves() -> RuleSet {
        RuleSet::new(vec![
            Rule::path(vec![p(0, 30.0, true)], 5),
            Rule::path(
                vec![p(0, 30.0, false), Predicate::new(1, Condition::Equals(0))],
                3,
            ),
            Rule::path(
                vec![p(0, 30.0, false), Predicate::new(1, Condition::Equals(1))],
                2,
            ),
        ])
    }

    #[test]
    fn test_siblings_merge_into_parent() {
        let merged = RuleMerger::new(4).merge(&three_leaves());
        assert_eq!(
            merged.rules(),
            &[
                Rule::path(vec![p(0, 30.0, true)], 5),
                Rule::path(vec![p(0, 30.0, false)], 5),
            ]
        );
    }

    #[test]
    fn test_merges_up_to_universal() {
        let merged = RuleMerger::new(6).merge(&three_leaves());
        assert!(merged.is_universal());
        assert_eq!(merged.total_support(), 10);
    }

    #[test]
    fn test_nothing_undersized_only_sorts() {
        let rules = RuleSet::new(vec![
            Rule::path(vec![p(0, 30.0, true)], 5),
            Rule::path(vec![p(0, 30.0, false), p(2, 1.0, true)], 5),
            Rule::path(vec![p(0, 30.0, false), p(2, 1.0, false)], 5),
        ]);
        let merged = RuleMerger::new(5).merge(&rules);
        assert_eq!(merged.rules()[0].depth(), 2);
        assert_eq!(merged.rules()[1].depth(), 2);
        assert_eq!(merged.rules()[2], Rule::path(vec![p(0, 30.0, true)], 5));
    }

    #[test]
    fn test_prefix_support_sums_every_rule_under_it() {
        let a = p(0, 10.0, true);
        let b = p(1, 5.0, true);
        let c = p(2, 1.0, true);
        let d = p(2, 1.0, false);
        let e = p(1, 5.0, false);
        let rules = RuleSet::new(vec![
            Rule::path(vec![a, b, c], 12),
            Rule::path(vec![a, b, d], 2),
            Rule::path(vec![a, e], 1),
        ]);

        // a∧b (14) and a (15) are both undersized; a∧b folds into a with
        // 14 + 15 while a itself falls back to the universal rule
        let merged = RuleMerger::new(20).merge(&rules);
        assert_eq!(
            merged.rules(),
            &[
                Rule::path(vec![a], 29),
                Rule::Universal { support: 15 },
            ]
        );
    }

    #[test]
    fn test_nested_rules_add_to_prefix_support() {
        let a = p(0, 10.0, true);
        let b = p(0, 10.0, false);
        let c = p(2, 5.0, true);
        let d = p(2, 5.0, false);
        let e = p(0, 20.0, true);
        let f = p(0, 20.0, false);
        let rules = RuleSet::new(vec![
            Rule::path(vec![a], 10),
            Rule::path(vec![b, c], 2),
            Rule::path(vec![b, d, e], 7),
            Rule::path(vec![b, d, f], 1),
        ]);

        let first = RuleMerger::new(3).merge(&rules);
        assert_eq!(
            first.rules(),
            &[
                Rule::path(vec![b, d, e], 7),
                Rule::path(vec![b, d], 8),
                Rule::path(vec![a], 10),
                Rule::path(vec![b], 10),
            ]
        );

        let second = RuleMerger::new(9).merge(&first);
        assert_eq!(
            second.rules(),
            &[
                Rule::path(vec![b, d], 15),
                Rule::path(vec![b], 25),
                Rule::path(vec![a], 10),
            ]
        );
    }

    #[test]
    fn test_merge_is_idempotent() {
        let merger = RuleMerger::new(4);
        let once = merger.merge(&three_leaves());
        let twice = merger.merge(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_merge_never_deepens_rules() {
        let rules = three_leaves();
        let deepest = rules.iter().map(Rule::depth).max().unwrap_or(0);
        let merged = RuleMerger::new(4).merge(&rules);
        assert!(merged.iter().all(|r| r.depth() <= deepest));
    }

    #[test]
    fn test_universal_list_is_stable() {
        let merged = RuleMerger::new(100).merge(&RuleSet::universal(3));
        assert_eq!(merged, RuleSet::universal(3));
    }
}
