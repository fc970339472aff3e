pub mod distance;
pub mod error;
pub mod knn;

pub use distance::{DistanceMetric, MixedDistance};
pub use error::{NeighborsError, NeighborsResult};
pub use knn::{NearestNeighbors, Neighbor};
