//! Random forest over linfa decision trees
//!
//! Each tree is fit on a bootstrap sample of the rows restricted to a random
//! subspace of the columns. Class probabilities are the fraction of trees
//! voting for each class, so every row's probabilities sum to one.

use crate::error::{ModelError, Result};
use linfa::DatasetBase;
use linfa::traits::{Fit, Predict};
use linfa_trees::{DecisionTree, SplitQuality};
use ndarray::{Array1, Array2, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Fixed ensemble hyperparameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_weight_split: f32,
    pub min_weight_leaf: f32,
    pub bootstrap: bool,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: 20,
            min_weight_split: 5.0,
            min_weight_leaf: 2.0,
            bootstrap: true,
        }
    }
}

impl ForestParams {
    pub fn with_trees(mut self, n_trees: usize) -> Self {
        self.n_trees = n_trees;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.n_trees == 0 {
            return Err(ModelError::InvalidParameter(
                "forest needs at least one tree".to_string(),
            ));
        }
        if self.max_depth == 0 {
            return Err(ModelError::InvalidParameter(
                "max_depth must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Columns drawn per tree: round(sqrt(n)), at least one
    pub fn subspace_size(n_features: usize) -> usize {
        ((n_features as f64).sqrt().round() as usize).clamp(1, n_features.max(1))
    }
}

/// One member tree and the global column indices it was trained on
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubspaceTree {
    features: Vec<usize>,
    tree: DecisionTree<f64, usize>,
}

impl SubspaceTree {
    fn vote(&self, records: ArrayView2<f64>) -> Array1<usize> {
        let projected = records.select(Axis(1), &self.features);
        self.tree.predict(&projected)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<SubspaceTree>,
    n_features: usize,
    n_classes: usize,
}

impl RandomForest {
    /// Fit on `records` with class ids in `0..n_classes`.
    pub fn fit(
        records: ArrayView2<f64>,
        targets: &[usize],
        n_classes: usize,
        params: &ForestParams,
        seed: u64,
    ) -> Result<Self> {
        params.validate()?;
        let (n_rows, n_features) = records.dim();
        if n_rows == 0 || n_features == 0 {
            return Err(ModelError::TrainingData(
                "cannot fit a forest on an empty matrix".to_string(),
            ));
        }
        if targets.len() != n_rows {
            return Err(ModelError::Classifier(format!(
                "{} targets for {n_rows} rows",
                targets.len()
            )));
        }
        if let Some(bad) = targets.iter().find(|t| **t >= n_classes) {
            return Err(ModelError::Classifier(format!(
                "class id {bad} outside 0..{n_classes}"
            )));
        }

        let tree_params = DecisionTree::params()
            .split_quality(SplitQuality::Gini)
            .max_depth(Some(params.max_depth))
            .min_weight_split(params.min_weight_split)
            .min_weight_leaf(params.min_weight_leaf);
        let subspace = ForestParams::subspace_size(n_features);
        let mut rng = StdRng::seed_from_u64(seed);

        let mut trees = Vec::with_capacity(params.n_trees);
        for _ in 0..params.n_trees {
            let rows: Vec<usize> = if params.bootstrap {
                (0..n_rows).map(|_| rng.random_range(0..n_rows)).collect()
            } else {
                (0..n_rows).collect()
            };
            let mut features = rand::seq::index::sample(&mut rng, n_features, subspace).into_vec();
            features.sort_unstable();

            let x = records.select(Axis(0), &rows).select(Axis(1), &features);
            let y: Array1<usize> = rows.iter().map(|r| targets[*r]).collect();
            let ds = DatasetBase::from(x).with_targets(y);
            let tree = tree_params
                .fit(&ds)
                .map_err(|e| ModelError::Classifier(e.to_string()))?;

            trees.push(SubspaceTree { features, tree });
        }

        tracing::debug!(
            trees = trees.len(),
            rows = n_rows,
            features = n_features,
            subspace,
            "fitted random forest"
        );

        Ok(Self {
            trees,
            n_features,
            n_classes,
        })
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Vote fractions, one row per record and one column per class.
    pub fn predict_proba(&self, records: ArrayView2<f64>) -> Result<Array2<f64>> {
        if records.ncols() != self.n_features {
            return Err(ModelError::Classifier(format!(
                "expected {} feature columns, got {}",
                self.n_features,
                records.ncols()
            )));
        }

        let mut votes = Array2::<f64>::zeros((records.nrows(), self.n_classes));
        if records.nrows() == 0 || self.trees.is_empty() {
            return Ok(votes);
        }

        for tree in &self.trees {
            for (row, class) in tree.vote(records.view()).iter().enumerate() {
                if *class < self.n_classes {
                    votes[[row, *class]] += 1.0;
                }
            }
        }
        votes /= self.trees.len() as f64;
        Ok(votes)
    }

    /// Most voted class per record; ties go to the lower class id.
    pub fn predict(&self, records: ArrayView2<f64>) -> Result<Vec<usize>> {
        let proba = self.predict_proba(records)?;
        Ok(proba
            .rows()
            .into_iter()
            .map(|row| argmax(&row.to_vec()))
            .collect())
    }

    /// Impurity importance per global column, normalized to sum to one.
    pub fn feature_importance(&self) -> Vec<f64> {
        let mut totals = vec![0.0; self.n_features];
        for member in &self.trees {
            for (local, value) in member.tree.feature_importance().into_iter().enumerate() {
                if value.is_finite() {
                    if let Some(column) = member.features.get(local) {
                        totals[*column] += value;
                    }
                }
            }
        }

        let sum: f64 = totals.iter().sum();
        if sum > 0.0 {
            totals.iter_mut().for_each(|v| *v /= sum);
        }
        totals
    }
}

/// Index of the largest value, first one on ties
pub fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate() {
        if *v > values[best] {
            best = i;
        }
    }
    best
}
