use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use rebalance_core::{Class, Dataset, Float, Matrix, Schema};
use rebalance_neighbors::{MixedDistance, NearestNeighbors};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::config::{CategoricalStrategy, SmoteConfig};
use crate::error::{SamplingError, SamplingResult};

/// Where a synthetic row came from. Indices refer to rows of the input dataset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub source: usize,
    pub neighbor: usize,
    /// Interpolation factor in `[0, 1)`.
    pub gap: f64,
}

/// Augmented training set: the input rows, unchanged and in order, followed
/// by the synthetic minority rows.
#[derive(Debug, Clone)]
pub struct Oversampled<T: Float> {
    pub dataset: Dataset<T>,
    /// One entry per synthetic row, in row order.
    pub provenance: Vec<Provenance>,
    n_original: usize,
}

impl<T: Float> Oversampled<T> {
    pub fn n_original(&self) -> usize {
        self.n_original
    }

    pub fn n_synthetic(&self) -> usize {
        self.provenance.len()
    }

    /// Row indices of the synthetic samples within `dataset`.
    pub fn synthetic_rows(&self) -> std::ops::Range<usize> {
        self.n_original..self.dataset.len()
    }

    pub fn into_dataset(self) -> Dataset<T> {
        self.dataset
    }
}

/// Synthetic Minority Over-sampling Technique.
///
/// Each synthetic row is interpolated between a minority (`Positive`) sample
/// and one of its `k` nearest minority neighbors. Majority rows are never
/// read for neighbor search and never modified.
#[derive(Debug, Clone)]
pub struct Smote {
    config: SmoteConfig,
}

impl Smote {
    pub fn new(config: SmoteConfig) -> SamplingResult<Self> {
        config.validate()?;
        Ok(Smote { config })
    }

    pub fn config(&self) -> &SmoteConfig {
        &self.config
    }

    #[instrument(skip_all, fields(k = self.config.k, n_samples = dataset.len()))]
    pub fn oversample<T: Float>(&self, dataset: &Dataset<T>) -> SamplingResult<Oversampled<T>> {
        if dataset.is_empty() {
            return Err(SamplingError::EmptyDataset);
        }
        self.config.validate()?;

        let k = self.config.k;
        let minority_idx = dataset.indices_of(Class::Positive);
        let n = minority_idx.len();
        if n < k + 1 {
            return Err(SamplingError::InsufficientMinoritySamples {
                required: k + 1,
                found: n,
            });
        }

        let total = self.config.rate.synthetic_count(dataset.class_counts())?;
        if total == 0 {
            warn!(rate = ?self.config.rate, n_minority = n, "rate yields no synthetic samples");
            return Ok(Oversampled {
                dataset: dataset.clone(),
                provenance: Vec::new(),
                n_original: dataset.len(),
            });
        }

        let minority = dataset.features().select_rows(&minority_idx)?;
        let mut distance = MixedDistance::new(dataset.schema(), self.config.metric);
        if self.config.scale_by_range {
            distance = distance.with_range_scaling(&minority)?;
        }
        let neighbors = NearestNeighbors::new(&minority, distance)?.kneighbors_all(k)?;

        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let per_sample = allocate(total, n, &mut rng);
        debug!(n_minority = n, total, base = total / n, "allocated synthetic samples");

        let schema = dataset.schema();
        let is_categorical: Vec<bool> = (0..schema.len()).map(|j| schema.is_categorical(j)).collect();
        let mut synthetic = Matrix::empty(dataset.n_features());
        let mut provenance = Vec::new();
        let mut values = vec![T::ZERO; dataset.n_features()];

        for (i, &count) in per_sample.iter().enumerate() {
            if count == 0 {
                continue;
            }
            let source = minority.row(i)?;
            let categories = match self.config.categorical {
                CategoricalStrategy::MajorityVote => vote_categories(schema, &minority, source, &neighbors[i])?,
                CategoricalStrategy::CopySource => source.to_vec(),
            };

            for _ in 0..count {
                let nb = neighbors[i][rng.gen_range(0..k)];
                let neighbor = minority.row(nb)?;
                let gap: f64 = rng.gen();
                let g = T::from_f64(gap);

                for j in 0..values.len() {
                    values[j] = if is_categorical[j] {
                        categories[j]
                    } else {
                        // rounding can overshoot the segment end
                        let lo = source[j].min(neighbor[j]);
                        let hi = source[j].max(neighbor[j]);
                        (source[j] + g * (neighbor[j] - source[j])).max(lo).min(hi)
                    };
                }
                synthetic.push_row(&values)?;
                provenance.push(Provenance {
                    source: minority_idx[i],
                    neighbor: minority_idx[nb],
                    gap,
                });
            }
        }

        let classes = vec![Class::Positive; synthetic.nrows()];
        let augmented = dataset.append(&synthetic, &classes)?;
        debug!(
            n_original = dataset.len(),
            n_synthetic = provenance.len(),
            "oversampling complete"
        );

        Ok(Oversampled {
            dataset: augmented,
            provenance,
            n_original: dataset.len(),
        })
    }
}

/// Oversample `dataset` with `config`.
pub fn oversample<T: Float>(dataset: &Dataset<T>, config: &SmoteConfig) -> SamplingResult<Oversampled<T>> {
    Smote::new(config.clone())?.oversample(dataset)
}

/// Spread `total` samples over `n` sources: `total / n` each, with the
/// remainder going to a random set of distinct sources.
fn allocate(total: usize, n: usize, rng: &mut StdRng) -> Vec<usize> {
    let mut counts = vec![total / n; n];
    for i in index::sample(rng, n, total % n).into_iter() {
        counts[i] += 1;
    }
    counts
}

/// Row template whose categorical columns hold the neighbors' majority value.
fn vote_categories<T: Float>(
    schema: &Schema,
    minority: &Matrix<T>,
    source: &[T],
    neighbors: &[usize],
) -> SamplingResult<Vec<T>> {
    let mut out = source.to_vec();
    for j in schema.categorical_indices() {
        let levels = schema.feature(j).and_then(|f| f.n_levels()).unwrap_or(0);
        let mut votes = vec![0usize; levels];
        for &nb in neighbors {
            let level = minority.get(nb, j)?.to_f64() as usize;
            if level < levels {
                votes[level] += 1;
            }
        }
        let best = votes.iter().copied().max().unwrap_or(0);
        let own = source[j].to_f64() as usize;
        let winner = if votes.get(own).copied() == Some(best) {
            own
        } else {
            votes.iter().position(|&v| v == best).unwrap_or(own)
        };
        out[j] = T::from_usize(winner);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Rate;
    use rebalance_core::Feature;

    fn grade_schema() -> Schema {
        Schema::new(vec![
            Feature::numeric("x"),
            Feature::numeric("y"),
            Feature::categorical("grade", vec!["A".into(), "B".into()]),
        ])
    }

    /// 12 majority rows around the origin, 5 minority rows around (10, 10).
    fn imbalanced() -> Dataset<f64> {
        let mut rows = Vec::new();
        let mut classes = Vec::new();
        for i in 0..12 {
            rows.push(vec![(i % 4) as f64, (i / 4) as f64, (i % 2) as f64]);
            classes.push(Class::Negative);
        }
        for i in 0..5 {
            rows.push(vec![10.0 + i as f64, 10.0 - i as f64, (i % 2) as f64]);
            classes.push(Class::Positive);
        }
        Dataset::new(grade_schema(), Matrix::from_rows(&rows).unwrap(), classes).unwrap()
    }

    #[test]
    fn test_majority_untouched() {
        let ds = imbalanced();
        let out = oversample(&ds, &SmoteConfig::new(Rate::Percent(200.0), 3)).unwrap();
        let before = ds.class_counts();
        let after = out.dataset.class_counts();
        assert_eq!(after.negative, before.negative);
        for i in 0..ds.len() {
            assert_eq!(out.dataset.sample(i).unwrap().values, ds.sample(i).unwrap().values);
            assert_eq!(out.dataset.classes()[i], ds.classes()[i]);
        }
    }

    #[test]
    fn test_minority_delta_matches_rate() {
        let ds = imbalanced();
        for (rate, expected) in [
            (Rate::Percent(200.0), 10),
            (Rate::Percent(130.0), 7),
            (Rate::Factor(2.0), 5),
            (Rate::Balance, 7),
        ] {
            let out = oversample(&ds, &SmoteConfig::new(rate, 2)).unwrap();
            assert_eq!(out.n_synthetic(), expected, "rate {rate:?}");
            assert_eq!(out.dataset.class_counts().positive, 5 + expected);
            assert!(out
                .synthetic_rows()
                .all(|i| out.dataset.classes()[i] == Class::Positive));
        }
    }

    #[test]
    fn test_synthetic_within_parents() {
        let ds = imbalanced();
        let out = oversample(&ds, &SmoteConfig::new(Rate::Percent(500.0), 4).with_seed(7)).unwrap();
        for (row, prov) in out.synthetic_rows().zip(&out.provenance) {
            let synth = out.dataset.sample(row).unwrap().values;
            let a = ds.sample(prov.source).unwrap().values;
            let b = ds.sample(prov.neighbor).unwrap().values;
            assert!((0.0..1.0).contains(&prov.gap));
            assert_ne!(prov.source, prov.neighbor);
            for j in 0..2 {
                let (lo, hi) = (a[j].min(b[j]), a[j].max(b[j]));
                assert!(synth[j] >= lo && synth[j] <= hi, "col {j}: {} not in [{lo}, {hi}]", synth[j]);
            }
        }
    }

    #[test]
    fn test_neighbors_only_from_minority() {
        let ds = imbalanced();
        let out = oversample(&ds, &SmoteConfig::new(Rate::Percent(300.0), 4)).unwrap();
        for prov in &out.provenance {
            assert_eq!(ds.classes()[prov.source], Class::Positive);
            assert_eq!(ds.classes()[prov.neighbor], Class::Positive);
        }
    }

    #[test]
    fn test_deterministic_with_seed() {
        let ds = imbalanced();
        let cfg = SmoteConfig::new(Rate::Percent(170.0), 3).with_seed(1234);
        let a = oversample(&ds, &cfg).unwrap();
        let b = oversample(&ds, &cfg).unwrap();
        assert_eq!(a.dataset, b.dataset);
        assert_eq!(a.provenance, b.provenance);

        let c = oversample(&ds, &cfg.clone().with_seed(99)).unwrap();
        assert_ne!(a.dataset, c.dataset);
    }

    fn two_points() -> Dataset<f64> {
        let features = Matrix::from_rows(&[vec![0.0, 0.0, 0.0], vec![10.0, 10.0, 0.0]]).unwrap();
        Dataset::new(grade_schema(), features, vec![Class::Positive; 2]).unwrap()
    }

    #[test]
    fn test_two_points_half_rate_gives_single_sample() {
        let ds = two_points();
        let out = oversample(&ds, &SmoteConfig::new(Rate::Percent(50.0), 1)).unwrap();
        assert_eq!(out.n_synthetic(), 1);
        let row = out.dataset.sample(2).unwrap().values;
        assert!(row[0] > 0.0 && row[0] < 10.0);
        assert!(row[1] > 0.0 && row[1] < 10.0);
        assert_eq!(row[0], row[1]);
        assert_eq!(row[2], 0.0, "grade stays A");
    }

    #[test]
    fn test_two_points_full_rate_gives_one_per_source() {
        let ds = two_points();
        let out = oversample(&ds, &SmoteConfig::new(Rate::Percent(100.0), 1)).unwrap();
        assert_eq!(out.n_synthetic(), 2);
        let sources: Vec<usize> = out.provenance.iter().map(|p| p.source).collect();
        assert_eq!(sources, vec![0, 1]);
        for row in out.synthetic_rows() {
            let values = out.dataset.sample(row).unwrap().values;
            assert!(values[0] > 0.0 && values[0] < 10.0);
            assert_eq!(values[2], 0.0);
        }
    }

    #[test]
    fn test_huge_rate_is_rejected() {
        let ds = two_points();
        assert!(matches!(
            oversample(&ds, &SmoteConfig::new(Rate::Percent(1e30), 1)),
            Err(SamplingError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_large_magnitude_minority() {
        let schema = Schema::new(vec![Feature::numeric("x")]);
        let features = Matrix::from_rows(&[vec![1e200], vec![-1e200], vec![5e199]]).unwrap();
        let ds = Dataset::new(schema, features, vec![Class::Positive; 3]).unwrap();
        let out = oversample(&ds, &SmoteConfig::new(Rate::Percent(100.0), 1)).unwrap();
        assert_eq!(out.n_synthetic(), 3);
        for (row, prov) in out.synthetic_rows().zip(&out.provenance) {
            let v = out.dataset.sample(row).unwrap().values[0];
            assert!(v.is_finite());
            // 1e200 and 5e199 are mutual nearest neighbors; -1e200 is closer to 5e199
            assert_eq!(prov.neighbor, [2, 2, 0][prov.source]);
        }
    }

    #[test]
    fn test_majority_vote_categorical() {
        // Row 0 is grade A; both of its nearest minority neighbors are grade B.
        let features = Matrix::from_rows(&[
            vec![0.0, 0.0, 0.0],
            vec![1.0, 0.0, 1.0],
            vec![2.0, 0.0, 1.0],
            vec![50.0, 0.0, 0.0],
        ])
        .unwrap();
        let ds = Dataset::new(grade_schema(), features, vec![Class::Positive; 4]).unwrap();

        let voted = oversample(&ds, &SmoteConfig::new(Rate::Percent(300.0), 2)).unwrap();
        let copied = oversample(
            &ds,
            &SmoteConfig::new(Rate::Percent(300.0), 2).with_categorical(CategoricalStrategy::CopySource),
        )
        .unwrap();

        for (out, expected) in [(&voted, 1.0), (&copied, 0.0)] {
            let from_row0: Vec<_> = out
                .synthetic_rows()
                .zip(&out.provenance)
                .filter(|(_, p)| p.source == 0)
                .map(|(r, _)| out.dataset.sample(r).unwrap().values[2])
                .collect();
            assert_eq!(from_row0.len(), 3);
            assert!(from_row0.iter().all(|&g| g == expected));
        }
    }

    #[test]
    fn test_error_cases() {
        let ds = imbalanced();
        assert_eq!(
            oversample(&ds, &SmoteConfig::new(Rate::Percent(100.0), 5)).unwrap_err(),
            SamplingError::InsufficientMinoritySamples { required: 6, found: 5 }
        );
        assert!(matches!(
            oversample(&ds, &SmoteConfig::new(Rate::Percent(-1.0), 2)),
            Err(SamplingError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            oversample(&ds, &SmoteConfig::new(Rate::Percent(100.0), 0)),
            Err(SamplingError::InvalidConfiguration(_))
        ));

        let empty: Dataset<f64> = Dataset::new(grade_schema(), Matrix::empty(3), vec![]).unwrap();
        let smote = Smote::new(SmoteConfig::default()).unwrap();
        assert_eq!(smote.oversample(&empty).unwrap_err(), SamplingError::EmptyDataset);

        let no_minority = ds.subset(&[0, 1, 2]).unwrap();
        assert_eq!(
            oversample(&no_minority, &SmoteConfig::new(Rate::Percent(100.0), 1)).unwrap_err(),
            SamplingError::InsufficientMinoritySamples { required: 2, found: 0 }
        );
    }

    #[test]
    fn test_zero_rate_returns_input() {
        let ds = imbalanced();
        let out = oversample(&ds, &SmoteConfig::new(Rate::Percent(1.0), 2)).unwrap();
        assert_eq!(out.n_synthetic(), 0);
        assert_eq!(out.dataset, ds);
    }

    #[test]
    fn test_allocate_spreads_remainder() {
        let mut rng = StdRng::seed_from_u64(3);
        let counts = allocate(11, 4, &mut rng);
        assert_eq!(counts.iter().sum::<usize>(), 11);
        assert!(counts.iter().all(|&c| c == 2 || c == 3));
        assert_eq!(counts.iter().filter(|&&c| c == 3).count(), 3);
    }
}
