use rebalance_core::{Float, Matrix, Schema};
use serde::{Deserialize, Serialize};

use crate::error::{NeighborsError, NeighborsResult};

/// Distance metric applied to numeric columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    #[default]
    Euclidean,
    Manhattan,
}

/// Distance over rows with mixed numeric and categorical columns.
///
/// Numeric columns contribute `(a - b) / scale`; categorical columns use the
/// overlap metric and contribute 1 on mismatch, 0 on match. Under
/// `Euclidean` the contributions are squared, summed and square-rooted.
#[derive(Debug, Clone)]
pub struct MixedDistance<T: Float> {
    metric: DistanceMetric,
    categorical: Vec<bool>,
    scales: Vec<T>,
}

impl<T: Float> MixedDistance<T> {
    pub fn new(schema: &Schema, metric: DistanceMetric) -> Self {
        let categorical: Vec<bool> = (0..schema.len()).map(|j| schema.is_categorical(j)).collect();
        MixedDistance {
            metric,
            scales: vec![T::ONE; categorical.len()],
            categorical,
        }
    }

    /// Divide each numeric column by its range (max - min) over `reference`.
    /// Constant columns keep a scale of 1.
    pub fn with_range_scaling(mut self, reference: &Matrix<T>) -> NeighborsResult<Self> {
        self.check_width(reference.ncols())?;
        for (j, scale) in self.scales.iter_mut().enumerate() {
            if self.categorical[j] {
                continue;
            }
            let mut lo = T::INFINITY;
            let mut hi = -T::INFINITY;
            for row in reference.rows() {
                lo = lo.min(row[j]);
                hi = hi.max(row[j]);
            }
            let range = hi - lo;
            *scale = if range.is_finite() && range > T::EPSILON { range } else { T::ONE };
        }
        Ok(self)
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    pub fn n_features(&self) -> usize {
        self.categorical.len()
    }

    fn check_width(&self, got: usize) -> NeighborsResult<()> {
        if got != self.categorical.len() {
            return Err(NeighborsError::FeatureMismatch {
                expected: self.categorical.len(),
                got,
            });
        }
        Ok(())
    }

    /// Distance between two rows.
    ///
    /// Finite rows always yield a finite distance: when the plain sum
    /// overflows, the terms are rescaled by their largest magnitude, and a
    /// distance beyond the float range saturates at `T::MAX`.
    pub fn distance(&self, a: &[T], b: &[T]) -> NeighborsResult<T> {
        self.check_width(a.len())?;
        self.check_width(b.len())?;

        let mut acc = T::ZERO;
        for j in 0..a.len() {
            let term = self.term(j, a[j] - b[j], a[j] == b[j]);
            acc += match self.metric {
                DistanceMetric::Euclidean => term * term,
                DistanceMetric::Manhattan => term,
            };
        }
        let dist = match self.metric {
            DistanceMetric::Euclidean => acc.sqrt(),
            DistanceMetric::Manhattan => acc,
        };
        if dist.is_finite() {
            return Ok(dist);
        }
        if a.iter().chain(b).any(|v| !v.is_finite()) {
            return Err(NeighborsError::NonFinite);
        }
        Ok(self.rescaled(a, b))
    }

    /// Absolute contribution of column `j` given the raw difference.
    fn term(&self, j: usize, diff: T, equal: bool) -> T {
        if self.categorical[j] {
            if equal { T::ZERO } else { T::ONE }
        } else {
            (diff / self.scales[j]).abs()
        }
    }

    /// Overflow-safe path for finite rows of large magnitude. Works on half
    /// differences, which cannot overflow, and divides every term by the
    /// largest one before accumulating.
    fn rescaled(&self, a: &[T], b: &[T]) -> T {
        let halves: Vec<T> = (0..a.len())
            .map(|j| {
                let t = self.term(j, a[j] * T::HALF - b[j] * T::HALF, a[j] == b[j]);
                if self.categorical[j] { t * T::HALF } else { t }
            })
            .collect();
        let peak = halves.iter().fold(T::ZERO, |m, &t| m.max(t));
        if !peak.is_finite() {
            return T::MAX;
        }
        if peak == T::ZERO {
            return T::ZERO;
        }
        let half = match self.metric {
            DistanceMetric::Euclidean => {
                let ssq: T = halves.iter().map(|&t| (t / peak) * (t / peak)).sum();
                peak * ssq.sqrt()
            }
            DistanceMetric::Manhattan => peak * halves.iter().map(|&t| t / peak).sum::<T>(),
        };
        let dist = half + half;
        if dist.is_finite() { dist } else { T::MAX }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rebalance_core::Feature;

    fn schema() -> Schema {
        Schema::new(vec![
            Feature::numeric("a"),
            Feature::numeric("b"),
            Feature::categorical("c", vec!["x".into(), "y".into()]),
        ])
    }

    #[test]
    fn test_euclidean_with_overlap() {
        let d = MixedDistance::<f64>::new(&schema(), DistanceMetric::Euclidean);
        // 3-4-5 triangle plus one categorical mismatch
        let v = d.distance(&[0.0, 0.0, 0.0], &[3.0, 4.0, 1.0]).unwrap();
        assert_relative_eq!(v, 26.0_f64.sqrt(), epsilon = 1e-12);
        let same = d.distance(&[0.0, 0.0, 1.0], &[3.0, 4.0, 1.0]).unwrap();
        assert_relative_eq!(same, 5.0, epsilon = 1e-12);
    }

    #[test]
    fn test_manhattan() {
        let d = MixedDistance::<f64>::new(&schema(), DistanceMetric::Manhattan);
        let v = d.distance(&[0.0, 0.0, 0.0], &[3.0, -4.0, 1.0]).unwrap();
        assert_relative_eq!(v, 8.0, epsilon = 1e-12);
    }

    #[test]
    fn test_range_scaling() {
        let reference = Matrix::from_rows(&[vec![0.0, 10.0, 0.0], vec![2.0, 10.0, 1.0]]).unwrap();
        let d = MixedDistance::<f64>::new(&schema(), DistanceMetric::Manhattan)
            .with_range_scaling(&reference)
            .unwrap();
        // column a has range 2, column b is constant so keeps scale 1
        let v = d.distance(&[0.0, 0.0, 0.0], &[1.0, 3.0, 0.0]).unwrap();
        assert_relative_eq!(v, 0.5 + 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_width_mismatch() {
        let d = MixedDistance::<f64>::new(&schema(), DistanceMetric::Euclidean);
        let err = d.distance(&[0.0, 0.0], &[1.0, 1.0]).unwrap_err();
        assert_eq!(err, NeighborsError::FeatureMismatch { expected: 3, got: 2 });
    }

    #[test]
    fn test_large_magnitudes_stay_finite() {
        let one = Schema::new(vec![Feature::numeric("a")]);
        let d = MixedDistance::<f64>::new(&one, DistanceMetric::Euclidean);
        let near = d.distance(&[1e200], &[5e199]).unwrap();
        let far = d.distance(&[1e200], &[-1e200]).unwrap();
        assert_relative_eq!(near, 5e199, max_relative = 1e-12);
        assert_relative_eq!(far, 2e200, max_relative = 1e-12);

        // Beyond the f64 range the distance saturates instead of failing.
        let huge = d.distance(&[f64::MAX], &[-f64::MAX]).unwrap();
        assert_eq!(huge, f64::MAX);

        let mixed = MixedDistance::<f64>::new(&schema(), DistanceMetric::Manhattan);
        let v = mixed.distance(&[1e308, 1e308, 0.0], &[-1e307, -1e308, 1.0]).unwrap();
        assert_eq!(v, f64::MAX);
        let v = mixed.distance(&[1e300, 0.0, 0.0], &[-1e300, 0.0, 1.0]).unwrap();
        assert_relative_eq!(v, 2e300, max_relative = 1e-12);
    }

    #[test]
    fn test_non_finite_input_rejected() {
        let d = MixedDistance::<f64>::new(&schema(), DistanceMetric::Euclidean);
        let err = d.distance(&[f64::INFINITY, 0.0, 0.0], &[1.0, 0.0, 0.0]).unwrap_err();
        assert_eq!(err, NeighborsError::NonFinite);
    }

    #[test]
    fn test_f32_large_values() {
        let one = Schema::new(vec![Feature::numeric("a"), Feature::numeric("b")]);
        let d = MixedDistance::<f32>::new(&one, DistanceMetric::Euclidean);
        let v = d.distance(&[3e30, 4e30], &[0.0, 0.0]).unwrap();
        assert_relative_eq!(v, 5e30, max_relative = 1e-5);
    }
}
