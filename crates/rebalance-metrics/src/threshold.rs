use rebalance_core::{Class, Float};
use serde::{Deserialize, Serialize};

use crate::classification::{check_finite, ConfusionMatrix};
use crate::error::{check_lengths, MetricsResult};

/// Scalar objective maximized when choosing a decision threshold.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdMetric {
    #[default]
    F1,
    FBeta(f64),
    Accuracy,
    BalancedAccuracy,
    Mcc,
    Precision,
    Recall,
}

impl ThresholdMetric {
    pub fn score(&self, cm: &ConfusionMatrix) -> f64 {
        match *self {
            ThresholdMetric::F1 => cm.f1(),
            ThresholdMetric::FBeta(beta) => cm.f_beta(beta),
            ThresholdMetric::Accuracy => cm.accuracy(),
            ThresholdMetric::BalancedAccuracy => cm.balanced_accuracy(),
            ThresholdMetric::Mcc => cm.mcc(),
            ThresholdMetric::Precision => cm.precision(),
            ThresholdMetric::Recall => cm.recall(),
        }
    }

    pub fn name(&self) -> String {
        match self {
            ThresholdMetric::F1 => "f1".into(),
            ThresholdMetric::FBeta(beta) => format!("f{beta}"),
            ThresholdMetric::Accuracy => "accuracy".into(),
            ThresholdMetric::BalancedAccuracy => "balanced_accuracy".into(),
            ThresholdMetric::Mcc => "mcc".into(),
            ThresholdMetric::Precision => "precision".into(),
            ThresholdMetric::Recall => "recall".into(),
        }
    }
}

/// A candidate threshold and how the predictions fare when cut there.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdPoint {
    pub threshold: f64,
    pub score: f64,
    pub confusion: ConfusionMatrix,
}

/// Score every distinct observed probability as a threshold, ascending.
///
/// A row is predicted positive iff its probability is `>=` the threshold, so
/// the lowest candidate predicts everything positive.
pub fn threshold_curve<T: Float>(
    probabilities: &[T],
    classes: &[Class],
    metric: ThresholdMetric,
) -> MetricsResult<Vec<ThresholdPoint>> {
    check_lengths(probabilities.len(), classes.len())?;
    check_finite(probabilities)?;

    let mut pairs: Vec<(f64, Class)> = probabilities
        .iter()
        .zip(classes)
        .map(|(&p, &c)| (p.to_f64(), c))
        .collect();
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

    // Start with every row predicted positive, then move each group of tied
    // probabilities to the negative side as the threshold passes it.
    let positives = pairs.iter().filter(|(_, c)| c.is_positive()).count();
    let mut cm = ConfusionMatrix {
        tp: positives,
        fp: pairs.len() - positives,
        tn: 0,
        fn_: 0,
    };

    let mut curve = Vec::new();
    let mut i = 0;
    while i < pairs.len() {
        let threshold = pairs[i].0;
        curve.push(ThresholdPoint {
            threshold,
            score: metric.score(&cm),
            confusion: cm,
        });
        while i < pairs.len() && pairs[i].0 == threshold {
            if pairs[i].1.is_positive() {
                cm.tp -= 1;
                cm.fn_ += 1;
            } else {
                cm.fp -= 1;
                cm.tn += 1;
            }
            i += 1;
        }
    }
    Ok(curve)
}

/// Best threshold by exhaustive search over observed probabilities.
///
/// Ties in score resolve to the lower threshold.
pub fn tune_threshold<T: Float>(
    probabilities: &[T],
    classes: &[Class],
    metric: ThresholdMetric,
) -> MetricsResult<ThresholdPoint> {
    let curve = threshold_curve(probabilities, classes, metric)?;
    let mut best = curve[0];
    for point in &curve[1..] {
        if point.score > best.score {
            best = *point;
        }
    }
    Ok(best)
}

/// Confusion matrices at each of a fixed set of thresholds.
pub fn confusion_at_thresholds<T: Float>(
    probabilities: &[T],
    classes: &[Class],
    thresholds: &[f64],
) -> MetricsResult<Vec<ConfusionMatrix>> {
    thresholds
        .iter()
        .map(|&t| ConfusionMatrix::at_threshold(probabilities, classes, t))
        .collect()
}
