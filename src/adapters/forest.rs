//! Random forest adapter: tree ensemble exported as parallel node arrays.
//!
//! Each tree uses the flat layout of scikit-learn's `tree_` attribute:
//! node `i` is a leaf when `children_left[i] == -1`, otherwise a row goes
//! left when `row[feature[i]] <= threshold[i]`. `value[i]` holds per-class
//! training counts (or fractions) at that node.

use serde::{Deserialize, Serialize};

use crate::ports::{check_row, Classifier, ClassifierError};

const LEAF: i64 = -1;

/// One decision tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    pub children_left: Vec<i64>,
    pub children_right: Vec<i64>,
    pub feature: Vec<i64>,
    pub threshold: Vec<f64>,
    pub value: Vec<Vec<f64>>,
}

impl DecisionTree {
    /// Check the node arrays describe a well-formed tree.
    ///
    /// Children must come after their parent, which also rules out cycles.
    fn validate(&self, n_features: usize, n_classes: usize) -> Result<(), String> {
        let n = self.children_left.len();
        if n == 0 {
            return Err("tree has no nodes".into());
        }
        if self.children_right.len() != n
            || self.feature.len() != n
            || self.threshold.len() != n
            || self.value.len() != n
        {
            return Err("tree node arrays differ in length".into());
        }

        for node in 0..n {
            let (left, right) = (self.children_left[node], self.children_right[node]);
            if left == LEAF {
                if right != LEAF {
                    return Err(format!("node {node} has only one child"));
                }
                let counts = &self.value[node];
                if counts.len() != n_classes {
                    return Err(format!(
                        "leaf {node} has {} class values, expected {n_classes}",
                        counts.len()
                    ));
                }
                if counts.iter().any(|c| !c.is_finite() || *c < 0.0) {
                    return Err(format!("leaf {node} has a negative or non-finite value"));
                }
                if counts.iter().sum::<f64>() <= 0.0 {
                    return Err(format!("leaf {node} has no samples"));
                }
                continue;
            }

            for child in [left, right] {
                if child <= node as i64 || child >= n as i64 {
                    return Err(format!("node {node} has invalid child {child}"));
                }
            }
            let feature = self.feature[node];
            if feature < 0 || feature as usize >= n_features {
                return Err(format!("node {node} splits on invalid feature {feature}"));
            }
            if self.threshold[node].is_nan() {
                return Err(format!("node {node} has a NaN threshold"));
            }
        }
        Ok(())
    }

    /// Index of the leaf reached by `row`.
    fn leaf(&self, row: &[f64]) -> usize {
        let mut node = 0usize;
        while self.children_left[node] != LEAF {
            let feature = self.feature[node] as usize;
            node = if row[feature] <= self.threshold[node] {
                self.children_left[node] as usize
            } else {
                self.children_right[node] as usize
            };
        }
        node
    }

    /// Class distribution at the leaf reached by `row`.
    fn predict_proba(&self, row: &[f64]) -> Vec<f64> {
        let counts = &self.value[self.leaf(row)];
        let total: f64 = counts.iter().sum();
        counts.iter().map(|c| c / total).collect()
    }
}

/// Random forest classifier: mean of the per-tree class distributions.
#[derive(Debug, Clone)]
pub struct RandomForest {
    classes: Vec<i64>,
    positive_class: i64,
    n_features: usize,
    trees: Vec<DecisionTree>,
}

impl RandomForest {
    /// Build a forest, validating every tree.
    ///
    /// # Errors
    /// Returns `ClassifierError::Malformed` describing the first defect.
    pub fn new(
        classes: Vec<i64>,
        positive_class: i64,
        n_features: usize,
        trees: Vec<DecisionTree>,
    ) -> Result<Self, ClassifierError> {
        if trees.is_empty() {
            return Err(ClassifierError::Malformed("forest has no trees".into()));
        }
        if n_features == 0 {
            return Err(ClassifierError::Malformed("forest has no features".into()));
        }
        for (i, tree) in trees.iter().enumerate() {
            tree.validate(n_features, classes.len())
                .map_err(|e| ClassifierError::Malformed(format!("tree {i}: {e}")))?;
        }

        Ok(Self {
            classes,
            positive_class,
            n_features,
            trees,
        })
    }

    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

impl Classifier for RandomForest {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn classes(&self) -> &[i64] {
        &self.classes
    }

    fn positive_class(&self) -> i64 {
        self.positive_class
    }

    fn predict_proba(&self, row: &[f64]) -> Result<Vec<f64>, ClassifierError> {
        check_row(row, self.n_features)?;

        let mut sum = vec![0.0; self.classes.len()];
        for tree in &self.trees {
            for (acc, p) in sum.iter_mut().zip(tree.predict_proba(row)) {
                *acc += p;
            }
        }
        let n = self.trees.len() as f64;
        Ok(sum.into_iter().map(|s| s / n).collect())
    }

    fn describe(&self) -> String {
        format!(
            "random forest: {} trees, {} features, classes {:?}, positive class {}",
            self.trees.len(),
            self.n_features,
            self.classes,
            self.positive_class
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Stump on feature 0: x <= 0.5 -> [3, 1], else [1, 3].
    fn stump() -> DecisionTree {
        DecisionTree {
            children_left: vec![1, -1, -1],
            children_right: vec![2, -1, -1],
            feature: vec![0, -2, -2],
            threshold: vec![0.5, -2.0, -2.0],
            value: vec![vec![4.0, 4.0], vec![3.0, 1.0], vec![1.0, 3.0]],
        }
    }

    /// Single leaf that always answers [1, 1].
    fn leaf_only() -> DecisionTree {
        DecisionTree {
            children_left: vec![-1],
            children_right: vec![-1],
            feature: vec![-2],
            threshold: vec![-2.0],
            value: vec![vec![1.0, 1.0]],
        }
    }

    #[test]
    fn test_tree_routes_on_threshold() {
        let tree = stump();
        assert_eq!(tree.leaf(&[0.5, 9.0]), 1);
        assert_eq!(tree.leaf(&[0.6, 9.0]), 2);
        assert_eq!(tree.predict_proba(&[0.0, 0.0]), vec![0.75, 0.25]);
    }

    #[test]
    fn test_forest_averages_trees() {
        let forest =
            RandomForest::new(vec![0, 1], 1, 2, vec![stump(), leaf_only()]).expect("Should build");
        let proba = forest.predict_proba(&[1.0, 0.0]).expect("Should predict");
        assert!((proba[0] - 0.375).abs() < 1e-12);
        assert!((proba[1] - 0.625).abs() < 1e-12);
        assert_eq!(forest.predict(&[1.0, 0.0]).expect("Should predict"), 1);
        assert_eq!(forest.predict(&[0.0, 0.0]).expect("Should predict"), 0);
    }

    #[test]
    fn test_forest_rejects_wrong_width() {
        let forest = RandomForest::new(vec![0, 1], 1, 2, vec![stump()]).expect("Should build");
        assert!(matches!(
            forest.predict_proba(&[1.0]),
            Err(ClassifierError::ShapeMismatch { expected: 2, got: 1 })
        ));
    }

    #[test]
    fn test_validate_rejects_malformed_trees() {
        let mut backwards = stump();
        backwards.children_left[0] = 0;
        assert!(RandomForest::new(vec![0, 1], 1, 2, vec![backwards]).is_err());

        let mut bad_feature = stump();
        bad_feature.feature[0] = 7;
        assert!(RandomForest::new(vec![0, 1], 1, 2, vec![bad_feature]).is_err());

        let mut short = stump();
        short.threshold.pop();
        assert!(RandomForest::new(vec![0, 1], 1, 2, vec![short]).is_err());

        let mut empty_leaf = stump();
        empty_leaf.value[1] = vec![0.0, 0.0];
        assert!(RandomForest::new(vec![0, 1], 1, 2, vec![empty_leaf]).is_err());

        assert!(RandomForest::new(vec![0, 1], 1, 2, vec![]).is_err());
    }
}
