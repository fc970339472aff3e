use rebalance_core::{Class, Float};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign};

use crate::error::{check_lengths, MetricsError, MetricsResult};

/// Binary confusion matrix with `Positive` as the event of interest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub tp: usize,
    pub fp: usize,
    pub tn: usize,
    #[serde(rename = "fn")]
    pub fn_: usize,
}

impl ConfusionMatrix {
    /// Tally hard predictions (`true` = predicted positive) against labels.
    pub fn from_predictions(classes: &[Class], predicted: &[bool]) -> MetricsResult<Self> {
        check_lengths(predicted.len(), classes.len())?;
        let mut cm = ConfusionMatrix::default();
        for (&class, &pred) in classes.iter().zip(predicted) {
            cm.record(class, pred);
        }
        Ok(cm)
    }

    /// Tally probabilities cut at `threshold` (positive iff p >= threshold).
    pub fn at_threshold<T: Float>(probabilities: &[T], classes: &[Class], threshold: f64) -> MetricsResult<Self> {
        check_lengths(probabilities.len(), classes.len())?;
        check_finite(probabilities)?;
        let mut cm = ConfusionMatrix::default();
        for (&p, &class) in probabilities.iter().zip(classes) {
            cm.record(class, p.to_f64() >= threshold);
        }
        Ok(cm)
    }

    pub fn record(&mut self, class: Class, predicted_positive: bool) {
        match (class, predicted_positive) {
            (Class::Positive, true) => self.tp += 1,
            (Class::Positive, false) => self.fn_ += 1,
            (Class::Negative, true) => self.fp += 1,
            (Class::Negative, false) => self.tn += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.tp + self.fp + self.tn + self.fn_
    }

    pub fn actual_positive(&self) -> usize {
        self.tp + self.fn_
    }

    pub fn actual_negative(&self) -> usize {
        self.tn + self.fp
    }

    /// Fraction of correct predictions.
    pub fn accuracy(&self) -> f64 {
        ratio(self.tp + self.tn, self.total())
    }

    /// TP / (TP + FP); 0 when nothing is predicted positive.
    pub fn precision(&self) -> f64 {
        ratio(self.tp, self.tp + self.fp)
    }

    /// TP / (TP + FN), the true positive rate.
    pub fn recall(&self) -> f64 {
        ratio(self.tp, self.actual_positive())
    }

    /// TN / (TN + FP), the true negative rate.
    pub fn specificity(&self) -> f64 {
        ratio(self.tn, self.actual_negative())
    }

    /// Harmonic mean of precision and recall.
    pub fn f1(&self) -> f64 {
        self.f_beta(1.0)
    }

    /// F-beta score: (1 + β²)·P·R / (β²·P + R).
    pub fn f_beta(&self, beta: f64) -> f64 {
        let p = self.precision();
        let r = self.recall();
        let b2 = beta * beta;
        let denom = b2 * p + r;
        if denom == 0.0 {
            0.0
        } else {
            (1.0 + b2) * p * r / denom
        }
    }

    /// Mean of recall and specificity.
    pub fn balanced_accuracy(&self) -> f64 {
        (self.recall() + self.specificity()) / 2.0
    }

    /// Matthews Correlation Coefficient.
    ///
    /// MCC = (TP·TN - FP·FN) / √((TP+FP)(TP+FN)(TN+FP)(TN+FN))
    pub fn mcc(&self) -> f64 {
        let tp = self.tp as f64;
        let tn = self.tn as f64;
        let fp = self.fp as f64;
        let fn_ = self.fn_ as f64;
        let denom = ((tp + fp) * (tp + fn_) * (tn + fp) * (tn + fn_)).sqrt();
        if denom < 1e-10 {
            return 0.0;
        }
        (tp * tn - fp * fn_) / denom
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

impl Add for ConfusionMatrix {
    type Output = ConfusionMatrix;

    fn add(mut self, rhs: ConfusionMatrix) -> ConfusionMatrix {
        self += rhs;
        self
    }
}

impl AddAssign for ConfusionMatrix {
    fn add_assign(&mut self, rhs: ConfusionMatrix) {
        self.tp += rhs.tp;
        self.fp += rhs.fp;
        self.tn += rhs.tn;
        self.fn_ += rhs.fn_;
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let w = [self.tp, self.fp, self.tn, self.fn_, 9999]
            .iter()
            .map(|v| v.to_string().len())
            .max()
            .unwrap_or(4);
        writeln!(f, "{:>10} {:>w$} {:>w$}", "truth", "pos", "neg")?;
        writeln!(f, "{:>10} {:>w$} {:>w$}", "pred pos", self.tp, self.fp)?;
        write!(f, "{:>10} {:>w$} {:>w$}", "pred neg", self.fn_, self.tn)
    }
}

pub(crate) fn check_finite<T: Float>(probabilities: &[T]) -> MetricsResult<()> {
    match probabilities.iter().position(|p| !p.is_finite()) {
        Some(index) => Err(MetricsError::NonFiniteProbability { index }),
        None => Ok(()),
    }
}

/// ROC-AUC for binary classification.
///
/// Computed as the probability that a random positive scores above a random
/// negative, with tied scores counting one half (equivalent to the
/// trapezoidal area under the ROC curve). Returns 0.5 when only one class is
/// present.
pub fn roc_auc<T: Float>(probabilities: &[T], classes: &[Class]) -> MetricsResult<f64> {
    check_lengths(probabilities.len(), classes.len())?;
    check_finite(probabilities)?;

    let mut pairs: Vec<(f64, Class)> = probabilities
        .iter()
        .zip(classes)
        .map(|(&p, &c)| (p.to_f64(), c))
        .collect();
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

    let n_pos = pairs.iter().filter(|(_, c)| c.is_positive()).count() as f64;
    let n_neg = pairs.len() as f64 - n_pos;
    if n_pos == 0.0 || n_neg == 0.0 {
        return Ok(0.5);
    }

    // Rank-sum (Mann-Whitney U) with average ranks for ties.
    let mut rank_sum_pos = 0.0;
    let mut i = 0;
    while i < pairs.len() {
        let mut j = i;
        while j < pairs.len() && pairs[j].0 == pairs[i].0 {
            j += 1;
        }
        let avg_rank = (i + 1 + j) as f64 / 2.0;
        let pos_in_group = pairs[i..j].iter().filter(|(_, c)| c.is_positive()).count() as f64;
        rank_sum_pos += avg_rank * pos_in_group;
        i = j;
    }
    let u = rank_sum_pos - n_pos * (n_pos + 1.0) / 2.0;
    Ok(u / (n_pos * n_neg))
}

/// Log loss (binary cross-entropy) for probabilistic predictions.
///
/// L = -mean(y * log(p) + (1-y) * log(1-p))
pub fn log_loss<T: Float>(probabilities: &[T], classes: &[Class]) -> MetricsResult<f64> {
    check_lengths(probabilities.len(), classes.len())?;
    check_finite(probabilities)?;
    let eps = 1e-15;
    let total: f64 = probabilities
        .iter()
        .zip(classes)
        .map(|(&p, &c)| {
            let p = p.to_f64().clamp(eps, 1.0 - eps);
            if c.is_positive() {
                -p.ln()
            } else {
                -(1.0 - p).ln()
            }
        })
        .sum();
    Ok(total / classes.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use Class::{Negative as N, Positive as P};

    #[test]
    fn test_confusion_matrix() {
        let classes = [N, N, P, P];
        let cm = ConfusionMatrix::from_predictions(&classes, &[false, true, false, true]).unwrap();
        assert_eq!(cm, ConfusionMatrix { tp: 1, fp: 1, tn: 1, fn_: 1 });
        assert_relative_eq!(cm.accuracy(), 0.5);
    }

    #[test]
    fn test_precision_recall() {
        let classes = [P, P, N, N, P];
        let cm = ConfusionMatrix::from_predictions(&classes, &[true, false, false, true, true]).unwrap();
        // TP=2, FP=1, FN=1 → P=2/3, R=2/3
        assert_relative_eq!(cm.precision(), 2.0 / 3.0, epsilon = 1e-10);
        assert_relative_eq!(cm.recall(), 2.0 / 3.0, epsilon = 1e-10);
        assert_relative_eq!(cm.f1(), 2.0 / 3.0, epsilon = 1e-10);
        assert_relative_eq!(cm.specificity(), 0.5, epsilon = 1e-10);
        assert_relative_eq!(cm.balanced_accuracy(), (2.0 / 3.0 + 0.5) / 2.0, epsilon = 1e-10);
    }

    #[test]
    fn test_degenerate_scores_are_zero() {
        let cm = ConfusionMatrix { tp: 0, fp: 0, tn: 5, fn_: 3 };
        assert_eq!(cm.precision(), 0.0);
        assert_eq!(cm.f1(), 0.0);
        assert_eq!(cm.mcc(), 0.0);
    }

    #[test]
    fn test_f_beta_weights_recall() {
        let cm = ConfusionMatrix { tp: 4, fp: 4, tn: 10, fn_: 1 };
        assert!(cm.f_beta(2.0) > cm.f1());
        assert!(cm.f_beta(0.5) < cm.f1());
    }

    #[test]
    fn test_mcc_perfect() {
        let cm = ConfusionMatrix { tp: 3, fp: 0, tn: 7, fn_: 0 };
        assert_relative_eq!(cm.mcc(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_at_threshold_and_add() {
        let probs = [0.1, 0.4, 0.6, 0.9];
        let classes = [N, N, P, P];
        let cm = ConfusionMatrix::at_threshold(&probs, &classes, 0.4).unwrap();
        assert_eq!(cm, ConfusionMatrix { tp: 2, fp: 1, tn: 1, fn_: 0 });
        let sum = cm + cm;
        assert_eq!(sum.total(), 8);
        assert!(ConfusionMatrix::at_threshold(&[0.5, f64::NAN], &classes[..2], 0.5).is_err());
    }

    #[test]
    fn test_roc_auc() {
        let classes = [N, N, P, P];
        assert_relative_eq!(roc_auc(&[0.1, 0.4, 0.35, 0.8], &classes).unwrap(), 0.75);
        assert_relative_eq!(roc_auc(&[0.1, 0.2, 0.8, 0.9], &classes).unwrap(), 1.0);
        // all tied → chance
        assert_relative_eq!(roc_auc(&[0.5; 4], &classes).unwrap(), 0.5);
        assert_relative_eq!(roc_auc(&[0.2, 0.3], &[P, P]).unwrap(), 0.5);
    }

    #[test]
    fn test_log_loss() {
        let ll = log_loss(&[0.9, 0.1], &[P, N]).unwrap();
        assert_relative_eq!(ll, -(0.9_f64).ln(), epsilon = 1e-12);
        assert_eq!(
            log_loss::<f64>(&[], &[]).unwrap_err(),
            MetricsError::EmptyInput
        );
    }

    #[test]
    fn test_length_mismatch() {
        assert_eq!(
            ConfusionMatrix::from_predictions(&[P], &[true, false]).unwrap_err(),
            MetricsError::LengthMismatch { predictions: 2, labels: 1 }
        );
    }
}
