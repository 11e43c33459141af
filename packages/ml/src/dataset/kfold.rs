//! Stratified K-fold cross-validation splits

use super::stratified::group_by_class;
use crate::error::{ModelError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    pub train: Vec<usize>,
    pub validation: Vec<usize>,
}

/// Deal rows to `k` folds class by class, round robin, so every fold gets
/// a near-equal share of each class. Unshuffled: same targets, same folds.
pub fn stratified_folds(targets: &[usize], k: usize) -> Result<Vec<Fold>> {
    if k < 2 {
        return Err(ModelError::InvalidParameter(format!(
            "cross-validation needs at least 2 folds, got {k}"
        )));
    }
    if targets.len() < k {
        return Err(ModelError::InvalidParameter(format!(
            "cannot split {} rows into {k} folds",
            targets.len()
        )));
    }

    let mut assignment = vec![0usize; targets.len()];
    let mut counter = 0usize;
    for rows in group_by_class(targets).into_values() {
        for row in rows {
            assignment[row] = counter % k;
            counter += 1;
        }
    }

    let folds = (0..k)
        .map(|fold| {
            let (validation, train): (Vec<usize>, Vec<usize>) =
                (0..targets.len()).partition(|row| assignment[*row] == fold);
            Fold { train, validation }
        })
        .collect();
    Ok(folds)
}
