//! Classification metrics

use serde::{Deserialize, Serialize};

/// Fraction of positions where `predicted` matches `actual`. Zero for empty input.
pub fn accuracy(actual: &[usize], predicted: &[usize]) -> f64 {
    let n = actual.len().min(predicted.len());
    if n == 0 {
        return 0.0;
    }
    let correct = actual
        .iter()
        .zip(predicted)
        .filter(|(a, p)| a == p)
        .count();
    correct as f64 / n as f64
}

/// Mean and population standard deviation
pub fn mean_std(scores: &[f64]) -> (f64, f64) {
    if scores.is_empty() {
        return (0.0, 0.0);
    }
    let mean = scores.iter().sum::<f64>() / scores.len() as f64;
    let variance = scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / scores.len() as f64;
    (mean, variance.sqrt())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub label: String,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub support: usize,
}

/// Per-class precision, recall, F1 and support from a confusion matrix
/// over `labels.len()` classes.
pub fn classification_report(
    actual: &[usize],
    predicted: &[usize],
    labels: &[String],
) -> Vec<ClassMetrics> {
    let n_classes = labels.len();
    let mut matrix = vec![vec![0usize; n_classes]; n_classes];
    for (a, p) in actual.iter().zip(predicted) {
        if *a < n_classes && *p < n_classes {
            matrix[*a][*p] += 1;
        }
    }

    (0..n_classes)
        .map(|class| {
            let true_positive = matrix[class][class];
            let predicted_total: usize = (0..n_classes).map(|i| matrix[i][class]).sum();
            let support: usize = matrix[class].iter().sum();

            let precision = ratio(true_positive, predicted_total);
            let recall = ratio(true_positive, support);
            let f1_score = if precision + recall > 0.0 {
                2.0 * precision * recall / (precision + recall)
            } else {
                0.0
            };

            ClassMetrics {
                label: labels[class].clone(),
                precision,
                recall,
                f1_score,
                support,
            }
        })
        .collect()
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator > 0 {
        numerator as f64 / denominator as f64
    } else {
        0.0
    }
}
