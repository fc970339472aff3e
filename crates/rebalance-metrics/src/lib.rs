pub mod classification;
pub mod error;
pub mod threshold;

pub use classification::*;
pub use error::{MetricsError, MetricsResult};
pub use threshold::*;
