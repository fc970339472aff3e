use std::cmp::Ordering;
use std::collections::BinaryHeap;

use rebalance_core::{Float, Matrix};

use crate::distance::MixedDistance;
use crate::error::{NeighborsError, NeighborsResult};

/// One search hit: reference row index and its distance to the query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor<T: Float> {
    pub index: usize,
    pub distance: T,
}

/// Heap entry ordered by (distance, index) so the worst candidate sits on top.
struct Candidate<T: Float>(T, usize);

impl<T: Float> PartialEq for Candidate<T> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl<T: Float> Eq for Candidate<T> {}
impl<T: Float> PartialOrd for Candidate<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl<T: Float> Ord for Candidate<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0).then(self.1.cmp(&other.1))
    }
}

/// Brute-force k-nearest-neighbor index over the rows of a reference matrix.
///
/// Results are ordered by increasing distance; equal distances resolve to the
/// lower row index, so searches are fully deterministic.
pub struct NearestNeighbors<'a, T: Float> {
    reference: &'a Matrix<T>,
    distance: MixedDistance<T>,
}

impl<'a, T: Float> NearestNeighbors<'a, T> {
    pub fn new(reference: &'a Matrix<T>, distance: MixedDistance<T>) -> NeighborsResult<Self> {
        if reference.ncols() != distance.n_features() {
            return Err(NeighborsError::FeatureMismatch {
                expected: distance.n_features(),
                got: reference.ncols(),
            });
        }
        Ok(NearestNeighbors { reference, distance })
    }

    pub fn len(&self) -> usize {
        self.reference.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.reference.is_empty()
    }

    /// The `k` nearest reference rows to `point`, skipping row `exclude`.
    pub fn query(&self, point: &[T], k: usize, exclude: Option<usize>) -> NeighborsResult<Vec<Neighbor<T>>> {
        let available = self.len() - usize::from(exclude.is_some_and(|e| e < self.len()));
        if k == 0 || k > available {
            return Err(NeighborsError::InvalidK { k, available });
        }

        let mut heap: BinaryHeap<Candidate<T>> = BinaryHeap::with_capacity(k + 1);
        for (i, row) in self.reference.rows().enumerate() {
            if Some(i) == exclude {
                continue;
            }
            let candidate = Candidate(self.distance.distance(point, row)?, i);
            if heap.len() < k {
                heap.push(candidate);
            } else if heap.peek().is_some_and(|worst| candidate < *worst) {
                heap.pop();
                heap.push(candidate);
            }
        }

        Ok(heap
            .into_sorted_vec()
            .into_iter()
            .map(|Candidate(distance, index)| Neighbor { index, distance })
            .collect())
    }

    /// The `k` nearest neighbors of reference row `index`, excluding itself.
    pub fn kneighbors(&self, index: usize, k: usize) -> NeighborsResult<Vec<Neighbor<T>>> {
        let point = self.reference.row(index).map_err(|_| NeighborsError::QueryOutOfRange {
            index,
            size: self.len(),
        })?;
        self.query(point, k, Some(index))
    }

    /// Neighbor indices for every reference row.
    pub fn kneighbors_all(&self, k: usize) -> NeighborsResult<Vec<Vec<usize>>> {
        (0..self.len())
            .map(|i| {
                self.kneighbors(i, k)
                    .map(|hits| hits.into_iter().map(|n| n.index).collect())
            })
            .collect()
    }
}
