pub mod encoder;
pub mod scaler;
pub mod split;

pub use encoder::*;
pub use scaler::*;
pub use split::*;
