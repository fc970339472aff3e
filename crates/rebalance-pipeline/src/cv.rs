use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rebalance_core::Class;
use rebalance_preprocessing::stratified_holdout_indices;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{PipelineError, PipelineResult};

/// How rows are partitioned into train/test splits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum CvStrategy {
    /// One stratified train/test split.
    Holdout { test_ratio: f64 },
    /// Shuffled folds ignoring the class labels.
    KFold { folds: usize },
    /// Folds preserving the class proportions.
    StratifiedKFold { folds: usize },
    /// Stratified folds reshuffled `repeats` times.
    RepeatedStratifiedKFold { folds: usize, repeats: usize },
}

impl Default for CvStrategy {
    fn default() -> Self {
        CvStrategy::StratifiedKFold { folds: 5 }
    }
}

impl CvStrategy {
    /// Number of splits this strategy yields.
    pub fn n_splits(&self) -> usize {
        match *self {
            CvStrategy::Holdout { .. } => 1,
            CvStrategy::KFold { folds } | CvStrategy::StratifiedKFold { folds } => folds,
            CvStrategy::RepeatedStratifiedKFold { folds, repeats } => folds * repeats,
        }
    }
}

/// One train/test partition, as row indices into the evaluated dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Split {
    pub repeat: usize,
    pub fold: usize,
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Seeded split generator.
#[derive(Debug, Clone)]
pub struct CrossValidator {
    strategy: CvStrategy,
    seed: u64,
}

impl CrossValidator {
    pub fn new(strategy: CvStrategy, seed: u64) -> Self {
        CrossValidator { strategy, seed }
    }

    pub fn strategy(&self) -> CvStrategy {
        self.strategy
    }

    /// Partition rows labeled `classes`. Within a repeat, every row is in
    /// exactly one test fold. Index lists are sorted ascending.
    pub fn splits(&self, classes: &[Class]) -> PipelineResult<Vec<Split>> {
        let n = classes.len();
        match self.strategy {
            CvStrategy::Holdout { test_ratio } => {
                let (train, test) = stratified_holdout_indices(classes, test_ratio, self.seed)?;
                if train.is_empty() || test.is_empty() {
                    return Err(PipelineError::TooFewSamples { n_samples: n, folds: 2 });
                }
                Ok(vec![Split {
                    repeat: 0,
                    fold: 0,
                    train,
                    test,
                }])
            }
            CvStrategy::KFold { folds } => {
                check_folds(n, folds)?;
                let mut rng = StdRng::seed_from_u64(self.seed);
                let mut indices: Vec<usize> = (0..n).collect();
                indices.shuffle(&mut rng);
                Ok(contiguous_folds(&indices, folds, 0))
            }
            CvStrategy::StratifiedKFold { folds } => {
                check_folds(n, folds)?;
                let mut rng = StdRng::seed_from_u64(self.seed);
                Ok(stratified_folds(classes, folds, 0, &mut rng))
            }
            CvStrategy::RepeatedStratifiedKFold { folds, repeats } => {
                check_folds(n, folds)?;
                if repeats == 0 {
                    return Err(PipelineError::InvalidConfiguration(
                        "repeats must be at least 1".into(),
                    ));
                }
                let mut master = StdRng::seed_from_u64(self.seed);
                let mut splits = Vec::with_capacity(folds * repeats);
                for repeat in 0..repeats {
                    let mut rng = StdRng::seed_from_u64(master.gen());
                    splits.extend(stratified_folds(classes, folds, repeat, &mut rng));
                }
                Ok(splits)
            }
        }
    }
}

fn check_folds(n_samples: usize, folds: usize) -> PipelineResult<()> {
    if folds < 2 {
        return Err(PipelineError::InvalidFolds { folds });
    }
    if n_samples < folds {
        return Err(PipelineError::TooFewSamples { n_samples, folds });
    }
    Ok(())
}

/// Cut `order` into `folds` consecutive chunks; the first `n % folds` chunks
/// get one extra row.
fn contiguous_folds(order: &[usize], folds: usize, repeat: usize) -> Vec<Split> {
    let n = order.len();
    let base = n / folds;
    let remainder = n % folds;
    let mut splits = Vec::with_capacity(folds);
    let mut start = 0;
    for fold in 0..folds {
        let size = if fold < remainder { base + 1 } else { base };
        let mut test = order[start..start + size].to_vec();
        let mut train: Vec<usize> = order[..start]
            .iter()
            .chain(&order[start + size..])
            .copied()
            .collect();
        test.sort_unstable();
        train.sort_unstable();
        splits.push(Split {
            repeat,
            fold,
            train,
            test,
        });
        start += size;
    }
    splits
}

/// Shuffle each class separately, then deal rows to folds round-robin. The
/// deal continues across classes so fold sizes differ by at most one.
fn stratified_folds(classes: &[Class], folds: usize, repeat: usize, rng: &mut StdRng) -> Vec<Split> {
    let mut assignment = vec![0usize; classes.len()];
    let mut dealt = 0;
    for class in [Class::Positive, Class::Negative] {
        let mut idx: Vec<usize> = classes
            .iter()
            .enumerate()
            .filter(|(_, &c)| c == class)
            .map(|(i, _)| i)
            .collect();
        if !idx.is_empty() && idx.len() < folds {
            warn!(%class, count = idx.len(), folds, "class has fewer rows than folds");
        }
        idx.shuffle(rng);
        for i in idx {
            assignment[i] = dealt % folds;
            dealt += 1;
        }
    }

    (0..folds)
        .map(|fold| {
            let (test, train): (Vec<usize>, Vec<usize>) =
                (0..classes.len()).partition(|&i| assignment[i] == fold);
            Split {
                repeat,
                fold,
                train,
                test,
            }
        })
        .collect()
}
