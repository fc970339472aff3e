use rebalance_core::{Classifier, CoreError, CoreResult, Dataset, Float, Model};
use rebalance_sampling::{SamplingResult, Smote, SmoteConfig};
use tracing::{debug, instrument};

/// A classifier that oversamples its training data with SMOTE before
/// fitting the wrapped learner.
///
/// Because oversampling happens inside `fit`, cross-validation only ever
/// hands it the training partition of a split; synthetic rows never leak
/// into the rows it is scored on.
pub struct SmoteClassifier<T: Float> {
    inner: Box<dyn Classifier<T>>,
    config: SmoteConfig,
}

impl<T: Float> SmoteClassifier<T> {
    pub fn new(inner: Box<dyn Classifier<T>>, config: SmoteConfig) -> SamplingResult<Self> {
        config.validate()?;
        Ok(SmoteClassifier { inner, config })
    }

    pub fn config(&self) -> &SmoteConfig {
        &self.config
    }
}

/// Combine two seeds into one (SplitMix64 finaliser over the xor).
pub fn mix_seeds(a: u64, b: u64) -> u64 {
    let mut z = (a ^ b.rotate_left(32)).wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

impl<T: Float> Classifier<T> for SmoteClassifier<T> {
    fn name(&self) -> String {
        format!("{}+smote", self.inner.name())
    }

    #[instrument(skip_all, fields(learner = %self.name(), n_samples = data.len()))]
    fn fit(&self, data: &Dataset<T>, seed: u64) -> CoreResult<Box<dyn Model<T>>> {
        // Same data and fit seed give the same synthetic rows; different folds
        // get different ones.
        let config = self.config.clone().with_seed(mix_seeds(self.config.seed, seed));
        let augmented = Smote::new(config)
            .and_then(|smote| smote.oversample(data))
            .map_err(|e| CoreError::component("oversampling failed", e))?;
        debug!(
            n_original = augmented.n_original(),
            n_synthetic = augmented.n_synthetic(),
            "training on oversampled partition"
        );
        self.inner.fit(&augmented.dataset, seed)
    }
}
