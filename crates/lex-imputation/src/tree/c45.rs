//! C4.5-style classification tree inducer.
//!
//! Splits are chosen by gain ratio among the admissible splits whose
//! information gain is at least the average. Numeric attributes split in two
//! at an observed value (`<= t` / `> t`) and pay the `log2(cuts) / n` penalty;
//! categorical attributes branch once per category seen at the node. A split
//! is admissible only if two of its branches hold at least the minimum leaf
//! size. Subtrees are replaced by a leaf whenever the pessimistic error
//! estimate at the configured confidence does not favour keeping them.

use super::{Branch, Condition, InductionError, Tree, TreeInducer, TreeNode, TreeParams};
use crate::dataset::{AttributeKind, Dataset, Record, Schema};

#[derive(Debug, Clone, Copy, Default)]
pub struct C45Inducer;

impl TreeInducer for C45Inducer {
    fn induce(
        &self,
        data: &Dataset,
        target: usize,
        params: &TreeParams,
    ) -> Result<Tree, InductionError> {
        let target_attribute = data.schema().attribute(target);
        let classes = match &target_attribute.kind {
            AttributeKind::Categorical { categories } => categories.len(),
            AttributeKind::Numeric => {
                return Err(InductionError::NonCategoricalTarget(
                    target_attribute.name.clone(),
                ));
            }
        };
        if params.min_leaf_size == 0 {
            return Err(InductionError::InvalidLeafSize);
        }
        if !(params.confidence_factor > 0.0 && params.confidence_factor <= 0.5) {
            return Err(InductionError::InvalidConfidenceFactor(
                params.confidence_factor,
            ));
        }

        let (records, labels): (Vec<&Record>, Vec<usize>) = data
            .records()
            .iter()
            .filter_map(|r| {
                r.value(target)
                    .as_category()
                    .filter(|&c| c < classes)
                    .map(|c| (r, c))
            })
            .unzip();
        if records.is_empty() {
            return Err(InductionError::EmptyTrainingSet);
        }

        let grower = Grower {
            schema: data.schema(),
            records,
            labels,
            target,
            classes,
            min_leaf: params.min_leaf_size,
            confidence: f64::from(params.confidence_factor),
        };
        let rows: Vec<usize> = (0..grower.records.len()).collect();
        Ok(Tree::new(grower.grow(&rows)))
    }
}

struct Grower<'a> {
    schema: &'a Schema,
    records: Vec<&'a Record>,
    labels: Vec<usize>,
    target: usize,
    classes: usize,
    min_leaf: usize,
    confidence: f64,
}

struct Candidate {
    attribute: usize,
    gain: f64,
    split_info: f64,
    partitions: Vec<(Condition, Vec<usize>)>,
}

impl Candidate {
    fn gain_ratio(&self) -> f64 {
        if self.split_info > 0.0 {
            self.gain / self.split_info
        } else {
            0.0
        }
    }
}

impl Grower<'_> {
    fn distribution<'r>(&self, rows: impl IntoIterator<Item = &'r usize>) -> Vec<usize> {
        let mut counts = vec![0usize; self.classes];
        for &row in rows {
            counts[self.labels[row]] += 1;
        }
        counts
    }

    fn grow(&self, rows: &[usize]) -> TreeNode {
        let n = rows.len();
        let (class, majority) = majority(&self.distribution(rows));
        let errors = (n - majority) as f64;
        let leaf = TreeNode::Leaf {
            class,
            support: n,
            errors,
        };

        if majority == n || n < 2 * self.min_leaf {
            return leaf;
        }
        let Some(split) = self.best_split(rows) else {
            return leaf;
        };

        let node = TreeNode::Split {
            attribute: split.attribute,
            branches: split
                .partitions
                .into_iter()
                .map(|(condition, subset)| Branch {
                    condition,
                    child: self.grow(&subset),
                })
                .collect(),
        };

        let as_leaf = errors + add_errors(n as f64, errors, self.confidence);
        if as_leaf <= subtree_errors(&node, self.confidence) + 0.1 {
            leaf
        } else {
            node
        }
    }

    fn best_split(&self, rows: &[usize]) -> Option<Candidate> {
        let candidates: Vec<Candidate> = self
            .schema
            .attributes()
            .iter()
            .filter(|a| a.index != self.target)
            .filter_map(|a| match &a.kind {
                AttributeKind::Numeric => self.numeric_split(a.index, rows),
                AttributeKind::Categorical { categories } => {
                    self.categorical_split(a.index, rows, categories.len())
                }
            })
            .collect();
        if candidates.is_empty() {
            return None;
        }

        let average = candidates.iter().map(|c| c.gain).sum::<f64>() / candidates.len() as f64;
        let mut best: Option<Candidate> = None;
        for candidate in candidates {
            if candidate.gain <= 0.0 || candidate.gain < average - 1e-3 {
                continue;
            }
            if best
                .as_ref()
                .is_none_or(|b| candidate.gain_ratio() > b.gain_ratio())
            {
                best = Some(candidate);
            }
        }
        best
    }

    fn min_split(&self, known: usize) -> f64 {
        let suggested = 0.1 * known as f64 / self.classes.max(1) as f64;
        suggested.min(25.0).max(self.min_leaf as f64)
    }

    fn numeric_split(&self, attribute: usize, rows: &[usize]) -> Option<Candidate> {
        let mut known: Vec<(f64, usize)> = rows
            .iter()
            .filter_map(|&row| {
                self.records[row]
                    .value(attribute)
                    .as_numeric()
                    .map(|v| (v, row))
            })
            .collect();
        let min_split = self.min_split(known.len());
        if (known.len() as f64) < 2.0 * min_split {
            return None;
        }
        known.sort_by(|a, b| a.0.total_cmp(&b.0));

        let total = self.distribution(known.iter().map(|(_, row)| row));
        let base = entropy(&total);
        let mut left = vec![0usize; self.classes];
        let mut right = total;
        let mut cuts = 0usize;
        let mut best: Option<(f64, usize)> = None;

        for i in 0..known.len() - 1 {
            let class = self.labels[known[i].1];
            left[class] += 1;
            right[class] -= 1;
            if known[i].0 >= known[i + 1].0 {
                continue;
            }
            let below = i + 1;
            let above = known.len() - below;
            if (below as f64) < min_split || (above as f64) < min_split {
                continue;
            }
            cuts += 1;
            let split_entropy = (below as f64 * entropy(&left) + above as f64 * entropy(&right))
                / known.len() as f64;
            let gain = base - split_entropy;
            if best.is_none_or(|(g, _)| gain > g) {
                best = Some((gain, i));
            }
        }

        let (raw_gain, position) = best?;
        let n = rows.len() as f64;
        let gain = known.len() as f64 / n * raw_gain - (cuts as f64).log2() / n;
        let threshold = known[position].0;

        let mut below = Vec::new();
        let mut above = Vec::new();
        let mut unknown = Vec::new();
        for &row in rows {
            match self.records[row].value(attribute).as_numeric() {
                Some(v) if v <= threshold => below.push(row),
                Some(_) => above.push(row),
                None => unknown.push(row),
            }
        }
        let mut partitions = vec![
            (Condition::AtMost(threshold), below),
            (Condition::Above(threshold), above),
        ];
        absorb_unknown(&mut partitions, unknown);

        Some(Candidate {
            attribute,
            gain,
            split_info: split_info(&partitions),
            partitions,
        })
    }

    fn categorical_split(
        &self,
        attribute: usize,
        rows: &[usize],
        categories: usize,
    ) -> Option<Candidate> {
        let mut groups: Vec<Vec<usize>> = vec![Vec::new(); categories];
        let mut unknown = Vec::new();
        for &row in rows {
            match self.records[row].value(attribute).as_category() {
                Some(c) if c < categories => groups[c].push(row),
                _ => unknown.push(row),
            }
        }
        if groups.iter().filter(|g| g.len() >= self.min_leaf).count() < 2 {
            return None;
        }

        let known = rows.len() - unknown.len();
        let base = entropy(&self.distribution(groups.iter().flatten()));
        let split_entropy = groups
            .iter()
            .filter(|g| !g.is_empty())
            .map(|g| g.len() as f64 * entropy(&self.distribution(g)))
            .sum::<f64>()
            / known as f64;
        let gain = known as f64 / rows.len() as f64 * (base - split_entropy);

        let mut partitions: Vec<(Condition, Vec<usize>)> = groups
            .into_iter()
            .enumerate()
            .filter(|(_, g)| !g.is_empty())
            .map(|(c, g)| (Condition::Equals(c), g))
            .collect();
        absorb_unknown(&mut partitions, unknown);

        Some(Candidate {
            attribute,
            gain,
            split_info: split_info(&partitions),
            partitions,
        })
    }
}

/// Rows with no value for the split attribute follow the largest branch.
fn absorb_unknown(partitions: &mut [(Condition, Vec<usize>)], unknown: Vec<usize>) {
    if unknown.is_empty() {
        return;
    }
    if let Some((_, largest)) = partitions.iter_mut().max_by_key(|(_, rows)| rows.len()) {
        largest.extend(unknown);
        largest.sort_unstable();
    }
}

fn majority(counts: &[usize]) -> (usize, usize) {
    let mut best = (0, 0);
    for (class, &count) in counts.iter().enumerate() {
        if count > best.1 {
            best = (class, count);
        }
    }
    best
}

fn entropy(counts: &[usize]) -> f64 {
    let total: usize = counts.iter().sum();
    if total == 0 {
        return 0.0;
    }
    let total = total as f64;
    counts
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / total;
            -p * p.log2()
        })
        .sum()
}

fn split_info(partitions: &[(Condition, Vec<usize>)]) -> f64 {
    let sizes: Vec<usize> = partitions.iter().map(|(_, rows)| rows.len()).collect();
    entropy(&sizes)
}

fn subtree_errors(node: &TreeNode, confidence: f64) -> f64 {
    match node {
        TreeNode::Leaf {
            support, errors, ..
        } => errors + add_errors(*support as f64, *errors, confidence),
        TreeNode::Split { branches, .. } => branches
            .iter()
            .map(|b| subtree_errors(&b.child, confidence))
            .sum(),
    }
}

/// Extra errors predicted for `n` records with `e` observed errors: the
/// upper confidence limit of the binomial error rate at `confidence`, times
/// `n`, minus `e`.
fn add_errors(n: f64, e: f64, confidence: f64) -> f64 {
    if n <= 0.0 {
        return 0.0;
    }
    if e < 1.0 {
        let base = n * (1.0 - confidence.powf(1.0 / n));
        if e == 0.0 {
            return base;
        }
        return base + e * (add_errors(n, 1.0, confidence) - base);
    }
    if e + 0.5 >= n {
        return (n - e).max(0.0);
    }

    let z = normal_inverse(1.0 - confidence);
    let f = (e + 0.5) / n;
    let r = (f + z * z / (2.0 * n) + z * (f / n - f * f / n + z * z / (4.0 * n * n)).sqrt())
        / (1.0 + z * z / n);
    r * n - e
}

/// Inverse of the standard normal CDF (Acklam's rational approximation).
fn normal_inverse(p: f64) -> f64 {
    const A: [f64; 6] = [
        -3.969683028665376e+01,
        2.209460984245205e+02,
        -2.759285104469687e+02,
        1.383577518672690e+02,
        -3.066479806614716e+01,
        2.506628277459239e+00,
    ];
    const B: [f64; 5] = [
        -5.447609879822406e+01,
        1.615858368580409e+02,
        -1.556989798598866e+02,
        6.680131188771972e+01,
        -1.328068155288572e+01,
    ];
    const C: [f64; 6] = [
        -7.784894002430293e-03,
        -3.223964580411365e-01,
        -2.400758277161838e+00,
        -2.549732539343734e+00,
        4.374664141464968e+00,
        2.938163982698783e+00,
    ];
    const D: [f64; 4] = [
        7.784695709041462e-03,
        3.224671290700398e-01,
        2.445134137142996e+00,
        3.754408661907416e+00,
    ];
    const LOW: f64 = 0.02425;

    let tail = |q: f64| {
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    };

    if p < LOW {
        tail((-2.0 * p.ln()).sqrt())
    } else if p <= 1.0 - LOW {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        -tail((-2.0 * (1.0 - p).ln()).sqrt())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{Attribute, Value};

    fn params(min_leaf_size: usize) -> TreeParams {
        TreeParams {
            min_leaf_size,
            confidence_factor: 0.25,
        }
    }

    /// `x` numeric, `label` over {A, B}.
    fn numeric_data(rows: &[(f64, usize)]) -> Dataset {
        let schema = Schema::new(vec![
            Attribute::numeric("x"),
            Attribute::categorical("label", ["A", "B"]),
        ]);
        let rows = rows
            .iter()
            .map(|&(x, label)| vec![Value::Numeric(x), Value::Category(label)])
            .collect();
        Dataset::from_rows(schema, rows).unwrap()
    }

    // ========================================================================
    // Growth
    // ========================================================================

    #[test]
    fn test_separable_numeric_split() {
        let rows: Vec<(f64, usize)> = (1..=20)
            .map(|x| (x as f64, if x <= 10 { 0 } else { 1 }))
            .collect();
        let tree = C45Inducer.induce(&numeric_data(&rows), 1, &params(2)).unwrap();

        let TreeNode::Split {
            attribute,
            branches,
        } = &tree.root
        else {
            panic!("expected a split, got {:?}", tree.root);
        };
        assert_eq!(*attribute, 0);
        assert_eq!(branches[0].condition, Condition::AtMost(10.0));
        assert_eq!(branches[1].condition, Condition::Above(10.0));

        let supports: Vec<usize> = tree.leaves().iter().map(|l| l.support).collect();
        assert_eq!(supports, vec![10, 10]);
    }

    #[test]
    fn test_categorical_split_uses_seen_categories() {
        let schema = Schema::new(vec![
            Attribute::categorical("color", ["red", "blue", "green"]),
            Attribute::categorical("label", ["A", "B"]),
        ]);
        // green never occurs
        let mut rows = Vec::new();
        for _ in 0..8 {
            rows.push(vec![Value::Category(0), Value::Category(0)]);
            rows.push(vec![Value::Category(1), Value::Category(1)]);
        }
        let data = Dataset::from_rows(schema, rows).unwrap();
        let tree = C45Inducer.induce(&data, 1, &params(2)).unwrap();

        let conditions: Vec<Condition> = tree
            .leaves()
            .iter()
            .map(|l| l.predicates[0].condition)
            .collect();
        assert_eq!(conditions, vec![Condition::Equals(0), Condition::Equals(1)]);
        assert_eq!(tree.leaf_count(), 2);
    }

    #[test]
    fn test_pure_target_is_single_leaf() {
        let rows: Vec<(f64, usize)> = (1..=10).map(|x| (x as f64, 1)).collect();
        let tree = C45Inducer.induce(&numeric_data(&rows), 1, &params(2)).unwrap();
        assert_eq!(tree.leaf_count(), 1);
        assert_eq!(
            tree.root,
            TreeNode::Leaf {
                class: 1,
                support: 10,
                errors: 0.0
            }
        );
    }

    #[test]
    fn test_noise_does_not_split() {
        let rows: Vec<(f64, usize)> = (1..=8).map(|x| (x as f64, x % 2)).collect();
        let tree = C45Inducer.induce(&numeric_data(&rows), 1, &params(2)).unwrap();
        assert_eq!(tree.leaf_count(), 1);
    }

    #[test]
    fn test_leaves_respect_min_leaf_size() {
        let rows: Vec<(f64, usize)> = (1..=40)
            .map(|x| (x as f64, usize::from(x % 10 < 3)))
            .collect();
        let tree = C45Inducer.induce(&numeric_data(&rows), 1, &params(4)).unwrap();
        assert!(tree.leaves().iter().all(|l| l.support >= 4));
        let total: usize = tree.leaves().iter().map(|l| l.support).sum();
        assert_eq!(total, 40);
    }

    // ========================================================================
    // Errors
    // ========================================================================

    #[test]
    fn test_numeric_target_rejected() {
        let data = numeric_data(&[(1.0, 0)]);
        let result = C45Inducer.induce(&data, 0, &params(2));
        assert!(matches!(result, Err(InductionError::NonCategoricalTarget(_))));
    }

    #[test]
    fn test_empty_training_set() {
        let schema = Schema::new(vec![
            Attribute::numeric("x"),
            Attribute::categorical("label", ["A", "B"]),
        ]);
        let data =
            Dataset::from_rows(schema, vec![vec![Value::Numeric(1.0), Value::Missing]]).unwrap();
        let result = C45Inducer.induce(&data, 1, &params(2));
        assert!(matches!(result, Err(InductionError::EmptyTrainingSet)));
    }

    // ========================================================================
    // Pessimistic error estimate
    // ========================================================================

    #[test]
    fn test_normal_inverse() {
        assert!((normal_inverse(0.5)).abs() < 1e-9);
        assert!((normal_inverse(0.75) - 0.674_489_75).abs() < 1e-6);
        assert!((normal_inverse(0.01) + 2.326_347_87).abs() < 1e-6);
    }

    #[test]
    fn test_add_errors() {
        // no observed errors: n * (1 - cf^(1/n))
        let expected = 10.0 * (1.0 - 0.25f64.powf(0.1));
        assert!((add_errors(10.0, 0.0, 0.25) - expected).abs() < 1e-12);
        // more observed errors always predicts more total errors
        let few = 2.0 + add_errors(20.0, 2.0, 0.25);
        let many = 6.0 + add_errors(20.0, 6.0, 0.25);
        assert!(many > few);
        assert!(add_errors(20.0, 6.0, 0.25) > 0.0);
    }
}
