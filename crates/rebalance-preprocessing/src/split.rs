use rebalance_core::{Class, CoreError, CoreResult, Dataset, Float};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Shuffle row indices of each class separately and send
/// `round(n_class * test_ratio)` of each to the test side.
///
/// Returns `(train, test)` index lists, each sorted ascending.
pub fn stratified_holdout_indices(
    classes: &[Class],
    test_ratio: f64,
    seed: u64,
) -> CoreResult<(Vec<usize>, Vec<usize>)> {
    if !(test_ratio > 0.0 && test_ratio < 1.0) {
        return Err(CoreError::InvalidParameter(format!(
            "test_ratio must be in (0, 1), got {test_ratio}"
        )));
    }
    if classes.is_empty() {
        return Err(CoreError::EmptyDataset);
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(classes.len());
    let mut test = Vec::new();

    for class in [Class::Negative, Class::Positive] {
        let mut idx: Vec<usize> = classes
            .iter()
            .enumerate()
            .filter(|(_, &c)| c == class)
            .map(|(i, _)| i)
            .collect();
        idx.shuffle(&mut rng);
        let n_test = (idx.len() as f64 * test_ratio).round() as usize;
        test.extend_from_slice(&idx[..n_test]);
        train.extend_from_slice(&idx[n_test..]);
    }

    train.sort_unstable();
    test.sort_unstable();
    Ok((train, test))
}

/// Holdout split preserving class proportions.
///
/// Returns `(train, test)`.
pub fn stratified_split<T: Float>(
    data: &Dataset<T>,
    test_ratio: f64,
    seed: u64,
) -> CoreResult<(Dataset<T>, Dataset<T>)> {
    let (train, test) = stratified_holdout_indices(data.classes(), test_ratio, seed)?;
    Ok((data.subset(&train)?, data.subset(&test)?))
}
