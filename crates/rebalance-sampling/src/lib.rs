//! Synthetic minority oversampling.
//!
//! [`Smote`] grows the positive (minority) class of a [`rebalance_core::Dataset`]
//! by interpolating between minority samples and their nearest minority
//! neighbors. It is meant to run on a training partition only, once per
//! cross-validation fold.

pub mod config;
pub mod error;
pub mod smote;

pub use config::{CategoricalStrategy, Rate, SmoteConfig, MAX_SYNTHETIC};
pub use error::{SamplingError, SamplingResult};
pub use smote::{oversample, Oversampled, Provenance, Smote};
