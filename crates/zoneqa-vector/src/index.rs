//! Exact flat index.
//!
//! Rows are stored contiguously in insertion order. Search scans every row,
//! so results are exact and deterministic: ascending squared Euclidean
//! distance, ties broken by the smaller row.

use crate::distance::{is_finite, squared_euclidean};
use crate::error::{Error, Result};
use crate::types::SearchHit;
use std::cmp::Ordering;
use tracing::{debug, instrument, trace};

/// Flat L2² index keyed implicitly by insertion position.
///
/// Build once with [`FlatIndex::build`], then search many times. There is no
/// update or delete: row `i` always holds the `i`-th vector that was added.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatIndex {
    /// Vector dimensions.
    dimensions: usize,
    /// Row-major vector data, `len() * dimensions` floats.
    data: Vec<f32>,
}

impl FlatIndex {
    /// Create an empty index for vectors of the given dimensionality.
    pub fn new(dimensions: usize) -> Result<Self> {
        if dimensions == 0 {
            return Err(Error::InvalidArgument(
                "Dimensions must be > 0".to_string(),
            ));
        }

        Ok(Self {
            dimensions,
            data: Vec::new(),
        })
    }

    /// Build an index from an ordered sequence of vectors.
    ///
    /// Row `i` of the result corresponds to `vectors[i]`. Fails with
    /// [`Error::DimensionMismatch`] as soon as one vector does not have
    /// `dimensions` components; nothing is returned in that case.
    #[instrument(skip(vectors), fields(count = vectors.len()))]
    pub fn build<V: AsRef<[f32]>>(dimensions: usize, vectors: &[V]) -> Result<Self> {
        let mut index = Self::new(dimensions)?;
        index.data.reserve(vectors.len() * dimensions);

        for vector in vectors {
            index.add(vector.as_ref())?;
        }

        debug!(rows = index.len(), dimensions, "Built flat index");
        Ok(index)
    }

    /// Append a vector and return its row.
    pub fn add(&mut self, vector: &[f32]) -> Result<usize> {
        if vector.len() != self.dimensions {
            return Err(Error::DimensionMismatch {
                expected: self.dimensions,
                actual: vector.len(),
            });
        }

        if !is_finite(vector) {
            return Err(Error::InvalidVector(
                "Vector contains NaN or Inf".to_string(),
            ));
        }

        let row = self.len();
        self.data.extend_from_slice(vector);
        trace!(row, "Added vector");
        Ok(row)
    }

    /// Get the vector dimensions.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Get the number of rows in the index.
    pub fn len(&self) -> usize {
        self.data.len() / self.dimensions
    }

    /// Check if the index is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Get the vector stored at `row`.
    pub fn vector(&self, row: usize) -> Option<&[f32]> {
        let start = row.checked_mul(self.dimensions)?;
        self.data.get(start..start + self.dimensions)
    }

    /// Iterate over rows in insertion order.
    pub fn rows(&self) -> impl Iterator<Item = &[f32]> {
        self.data.chunks_exact(self.dimensions)
    }

    /// Search for the `k` nearest rows to `query`.
    ///
    /// Results are sorted by ascending squared Euclidean distance, ties broken
    /// by the smaller row. If `k` exceeds the number of rows, every row is
    /// returned exactly once.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] if `k == 0`.
    /// - [`Error::EmptyIndex`] if the index has no rows.
    /// - [`Error::DimensionMismatch`] if the query has the wrong length.
    /// - [`Error::InvalidVector`] if the query contains NaN or Inf.
    #[instrument(skip(self, query), fields(rows = self.len(), k))]
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if k == 0 {
            return Err(Error::InvalidArgument("k must be >= 1".to_string()));
        }

        if self.is_empty() {
            return Err(Error::EmptyIndex);
        }

        if query.len() != self.dimensions {
            return Err(Error::DimensionMismatch {
                expected: self.dimensions,
                actual: query.len(),
            });
        }

        if !is_finite(query) {
            return Err(Error::InvalidVector(
                "Query contains NaN or Inf".to_string(),
            ));
        }

        let mut hits: Vec<SearchHit> = self
            .rows()
            .enumerate()
            .map(|(row, vector)| SearchHit::new(row, squared_euclidean(query, vector)))
            .collect();

        let k = k.min(hits.len());
        if k < hits.len() {
            hits.select_nth_unstable_by(k - 1, compare_hits);
            hits.truncate(k);
        }
        hits.sort_unstable_by(compare_hits);

        debug!(returned = hits.len(), "Search completed");
        Ok(hits)
    }

    pub(crate) fn from_raw_parts(dimensions: usize, data: Vec<f32>) -> Result<Self> {
        if dimensions == 0 || data.len() % dimensions != 0 {
            return Err(Error::Persistence(format!(
                "{} floats cannot form rows of {} dimensions",
                data.len(),
                dimensions
            )));
        }

        Ok(Self { dimensions, data })
    }

    pub(crate) fn raw_data(&self) -> &[f32] {
        &self.data
    }
}

fn compare_hits(a: &SearchHit, b: &SearchHit) -> Ordering {
    a.distance
        .total_cmp(&b.distance)
        .then_with(|| a.row.cmp(&b.row))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_index() -> FlatIndex {
        FlatIndex::build(
            3,
            &[
                vec![1.0, 0.0, 0.0],
                vec![0.0, 1.0, 0.0],
                vec![0.9, 0.1, 0.0],
                vec![0.0, 0.0, 1.0],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_build_preserves_row_order() {
        let index = sample_index();

        assert_eq!(index.len(), 4);
        assert_eq!(index.dimensions(), 3);
        assert_eq!(index.vector(1).unwrap(), &[0.0, 1.0, 0.0]);
        assert_eq!(index.vector(3).unwrap(), &[0.0, 0.0, 1.0]);
        assert!(index.vector(4).is_none());
    }

    #[test]
    fn test_search_nearest_first() {
        let index = sample_index();

        let hits = index.search(&[1.0, 0.0, 0.0], 2).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].row, 0);
        assert_eq!(hits[1].row, 2);
        assert!(hits[0].distance <= hits[1].distance);
    }

    #[test]
    fn test_search_k_larger_than_rows_returns_each_row_once() {
        let index = sample_index();

        let hits = index.search(&[0.2, 0.3, 0.4], 100).unwrap();
        assert_eq!(hits.len(), 4);

        let mut rows: Vec<usize> = hits.iter().map(|h| h.row).collect();
        rows.sort_unstable();
        assert_eq!(rows, vec![0, 1, 2, 3]);

        for pair in hits.windows(2) {
            assert!(pair[0].distance <= pair[1].distance);
        }
    }

    #[test]
    fn test_ties_broken_by_smaller_row() {
        let index = FlatIndex::build(
            2,
            &[vec![1.0, 0.0], vec![0.0, 1.0], vec![-1.0, 0.0], vec![0.0, -1.0]],
        )
        .unwrap();

        // The origin is equidistant from every row
        let hits = index.search(&[0.0, 0.0], 4).unwrap();
        let rows: Vec<usize> = hits.iter().map(|h| h.row).collect();
        assert_eq!(rows, vec![0, 1, 2, 3]);

        let hits = index.search(&[0.0, 0.0], 2).unwrap();
        let rows: Vec<usize> = hits.iter().map(|h| h.row).collect();
        assert_eq!(rows, vec![0, 1]);
    }

    #[test]
    fn test_every_row_is_its_own_nearest_neighbor() {
        let vectors: Vec<Vec<f32>> = (0..16)
            .map(|i| {
                let x = i as f32;
                vec![x, (x * 0.5).sin(), (x * 0.25).cos(), x * x * 0.01]
            })
            .collect();
        let index = FlatIndex::build(4, &vectors).unwrap();

        for (j, v) in vectors.iter().enumerate() {
            let hits = index.search(v, 1).unwrap();
            assert_eq!(hits[0].row, j);
            assert!(hits[0].distance.abs() < 1e-6);
        }
    }

    #[test]
    fn test_build_dimension_mismatch() {
        let result = FlatIndex::build(3, &[vec![1.0, 0.0, 0.0], vec![1.0, 0.0]]);
        assert!(matches!(
            result,
            Err(Error::DimensionMismatch {
                expected: 3,
                actual: 2
            })
        ));
    }

    #[test]
    fn test_search_errors() {
        let empty = FlatIndex::new(3).unwrap();
        assert!(matches!(
            empty.search(&[0.0, 0.0, 0.0], 1),
            Err(Error::EmptyIndex)
        ));

        let index = sample_index();
        assert!(matches!(
            index.search(&[0.0, 0.0, 0.0], 0),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            index.search(&[0.0, 0.0], 1),
            Err(Error::DimensionMismatch { .. })
        ));
        assert!(matches!(
            index.search(&[f32::NAN, 0.0, 0.0], 1),
            Err(Error::InvalidVector(_))
        ));
    }

    #[test]
    fn test_zero_dimensions_rejected() {
        assert!(matches!(FlatIndex::new(0), Err(Error::InvalidArgument(_))));
    }
}
